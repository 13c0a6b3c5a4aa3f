//! Leaf nodes: free variables and bound constants.

use crate::error::{ExprError, Result};
use crate::expr::Expr;
use crate::render::{format_value, RenderSettings};
use crate::traits::{Evaluate, Expression};
use crate::value::{Kind, Tensor, Value};
use serde::{Deserialize, Serialize};

/// A named placeholder. Identity is the single-character tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    tag: char,
    kind: Kind,
}

impl Variable {
    pub fn new(tag: char, kind: Kind) -> Self {
        Self { tag, kind }
    }

    pub fn scalar(tag: char) -> Self {
        Self::new(tag, Kind::Scalar)
    }

    pub fn tensor(tag: char) -> Self {
        Self::new(tag, Kind::Tensor)
    }

    pub fn tag(&self) -> char {
        self.tag
    }

    /// Pairs this variable with a concrete value for `substitute`.
    pub fn bind(&self, value: impl Into<Value>) -> Binding {
        Binding::new(self.tag, value)
    }
}

impl Expression for Variable {
    fn kind(&self) -> Kind {
        self.kind
    }

    fn depends_on(&self, var: &Variable) -> bool {
        self.tag == var.tag
    }

    fn substitute(&self, bindings: &[Binding]) -> Result<Expr> {
        match bindings.iter().find(|b| b.tag == self.tag) {
            Some(binding) => {
                let found = binding.value.kind();
                if found != self.kind {
                    return Err(ExprError::BindingKind {
                        tag: self.tag,
                        expected: self.kind,
                        found,
                    });
                }
                Ok(Expr::Constant(Constant::new(binding.value)))
            }
            None => Ok(Expr::Variable(*self)),
        }
    }

    fn differentiate(&self, var: &Variable, direction: &Variable) -> Result<Expr> {
        if direction.tag == self.tag {
            return Err(ExprError::DirectionCollision { tag: direction.tag });
        }
        if var.tag != self.tag {
            return Ok(Expr::zero(self.kind));
        }
        if var.kind != self.kind {
            return Err(ExprError::VariableKindConflict {
                tag: self.tag,
                first: self.kind,
                second: var.kind,
            });
        }
        if direction.kind != self.kind {
            return Err(ExprError::DirectionKind {
                target: self.tag,
                direction: direction.tag,
                expected: self.kind,
                found: direction.kind,
            });
        }
        Ok(Expr::Variable(*direction))
    }

    fn render_with(&self, _settings: &RenderSettings) -> String {
        self.tag.to_string()
    }
}

/// A fixed value embedded in a tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constant {
    value: Value,
}

impl Constant {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> Value {
        self.value
    }
}

impl Evaluate for Constant {
    fn evaluate(&self) -> Result<Value> {
        Ok(self.value)
    }
}

impl Expression for Constant {
    fn kind(&self) -> Kind {
        self.value.kind()
    }

    fn depends_on(&self, _var: &Variable) -> bool {
        false
    }

    fn substitute(&self, _bindings: &[Binding]) -> Result<Expr> {
        Ok(Expr::Constant(*self))
    }

    fn differentiate(&self, _var: &Variable, _direction: &Variable) -> Result<Expr> {
        Ok(Expr::zero(self.kind()))
    }

    fn render_with(&self, settings: &RenderSettings) -> String {
        format_value(&self.value, settings)
    }
}

impl From<f64> for Constant {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Tensor> for Constant {
    fn from(value: Tensor) -> Self {
        Self::new(value)
    }
}

/// A `(tag, value)` pair consumed by `substitute`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub tag: char,
    pub value: Value,
}

impl Binding {
    pub fn new(tag: char, value: impl Into<Value>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }
}
