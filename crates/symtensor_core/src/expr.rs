//! Expression trees.
//!
//! `Expr` is a closed set of node variants. Composite nodes cache their
//! result kind and the set of variables below them when they are built, so
//! kind checks and dependency queries never walk the tree.

use crate::builder;
use crate::diff;
use crate::error::{ExprError, Result};
use crate::leaf::{Binding, Constant, Variable};
use crate::operators::{BinaryOp, UnaryOp};
use crate::render::RenderSettings;
use crate::traits::{Evaluate, Expression};
use crate::value::{Kind, Tensor, Value};
use std::collections::BTreeMap;
use std::ops::{Add, Mul, Sub};
use tracing::debug;

/// Free variables of a subtree, keyed by tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableSet(BTreeMap<char, Kind>);

impl VariableSet {
    pub fn single(var: &Variable) -> Self {
        let mut map = BTreeMap::new();
        map.insert(var.tag(), var.kind());
        Self(map)
    }

    pub fn contains(&self, tag: char) -> bool {
        self.0.contains_key(&tag)
    }

    pub fn kind_of(&self, tag: char) -> Option<Kind> {
        self.0.get(&tag).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tags in ascending order.
    pub fn tags(&self) -> impl Iterator<Item = char> + '_ {
        self.0.keys().copied()
    }

    /// A tag may only ever carry one kind within a tree.
    pub(crate) fn union(&self, other: &VariableSet) -> Result<VariableSet> {
        let mut merged = self.0.clone();
        for (&tag, &kind) in &other.0 {
            match merged.get(&tag) {
                Some(&first) if first != kind => {
                    return Err(ExprError::VariableKindConflict {
                        tag,
                        first,
                        second: kind,
                    });
                }
                Some(_) => {}
                None => {
                    merged.insert(tag, kind);
                }
            }
        }
        Ok(VariableSet(merged))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    op: UnaryOp,
    operand: Box<Expr>,
    kind: Kind,
    variables: VariableSet,
}

impl UnaryExpression {
    pub(crate) fn new(op: UnaryOp, operand: Expr) -> Result<Self> {
        let kind = op.result_kind(operand.kind())?;
        let variables = operand.variables();
        Ok(Self {
            op,
            operand: Box::new(operand),
            kind,
            variables,
        })
    }

    pub fn op(&self) -> UnaryOp {
        self.op
    }

    pub fn operand(&self) -> &Expr {
        &self.operand
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    op: BinaryOp,
    left: Box<Expr>,
    right: Box<Expr>,
    kind: Kind,
    variables: VariableSet,
}

impl BinaryExpression {
    pub(crate) fn new(op: BinaryOp, left: Expr, right: Expr) -> Result<Self> {
        let kind = op.result_kind(left.kind(), right.kind())?;
        let variables = left.variables().union(&right.variables())?;
        Ok(Self {
            op,
            left: Box::new(left),
            right: Box::new(right),
            kind,
            variables,
        })
    }

    pub fn op(&self) -> BinaryOp {
        self.op
    }

    pub fn left(&self) -> &Expr {
        &self.left
    }

    pub fn right(&self) -> &Expr {
        &self.right
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }
}

/// An immutable expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Variable(Variable),
    Constant(Constant),
    Unary(UnaryExpression),
    Binary(BinaryExpression),
}

impl Expr {
    pub fn scalar(value: f64) -> Self {
        Expr::Constant(Constant::new(value))
    }

    pub fn tensor(value: Tensor) -> Self {
        Expr::Constant(Constant::new(value))
    }

    /// Zero element of `kind`.
    pub fn zero(kind: Kind) -> Self {
        Expr::Constant(Constant::new(Value::zero(kind)))
    }

    pub(crate) fn unary(op: UnaryOp, operand: Expr) -> Result<Self> {
        Ok(Expr::Unary(UnaryExpression::new(op, operand)?))
    }

    pub(crate) fn binary(op: BinaryOp, left: Expr, right: Expr) -> Result<Self> {
        Ok(Expr::Binary(BinaryExpression::new(op, left, right)?))
    }

    pub fn variables(&self) -> VariableSet {
        match self {
            Expr::Variable(v) => VariableSet::single(v),
            Expr::Constant(_) => VariableSet::default(),
            Expr::Unary(node) => node.variables.clone(),
            Expr::Binary(node) => node.variables.clone(),
        }
    }

    pub fn is_bound(&self) -> bool {
        match self {
            Expr::Variable(_) => false,
            Expr::Constant(_) => true,
            Expr::Unary(node) => node.variables.is_empty(),
            Expr::Binary(node) => node.variables.is_empty(),
        }
    }

    pub fn node_count(&self) -> usize {
        match self {
            Expr::Variable(_) | Expr::Constant(_) => 1,
            Expr::Unary(node) => 1 + node.operand.node_count(),
            Expr::Binary(node) => 1 + node.left.node_count() + node.right.node_count(),
        }
    }

    fn substitute_node(&self, bindings: &[Binding]) -> Result<Expr> {
        match self {
            Expr::Variable(v) => v.substitute(bindings),
            Expr::Constant(c) => c.substitute(bindings),
            // Nothing left to bind below this node.
            _ if self.is_bound() => Ok(self.clone()),
            Expr::Unary(node) => Expr::unary(node.op, node.operand.substitute_node(bindings)?),
            Expr::Binary(node) => Expr::binary(
                node.op,
                node.left.substitute_node(bindings)?,
                node.right.substitute_node(bindings)?,
            ),
        }
    }

    fn evaluate_node(&self) -> Result<Value> {
        match self {
            Expr::Variable(v) => Err(ExprError::Unbound {
                tags: v.tag().to_string(),
            }),
            Expr::Constant(c) => c.evaluate(),
            Expr::Unary(node) => node.op.apply(node.operand.evaluate_node()?),
            Expr::Binary(node) => node
                .op
                .apply(node.left.evaluate_node()?, node.right.evaluate_node()?),
        }
    }
}

impl Expression for Expr {
    fn kind(&self) -> Kind {
        match self {
            Expr::Variable(v) => v.kind(),
            Expr::Constant(c) => c.kind(),
            Expr::Unary(node) => node.kind,
            Expr::Binary(node) => node.kind,
        }
    }

    fn depends_on(&self, var: &Variable) -> bool {
        match self {
            Expr::Variable(v) => v.depends_on(var),
            Expr::Constant(_) => false,
            Expr::Unary(node) => node.variables.contains(var.tag()),
            Expr::Binary(node) => node.variables.contains(var.tag()),
        }
    }

    fn substitute(&self, bindings: &[Binding]) -> Result<Expr> {
        debug!(
            bindings = bindings.len(),
            nodes = self.node_count(),
            "substituting expression"
        );
        self.substitute_node(bindings)
    }

    fn differentiate(&self, var: &Variable, direction: &Variable) -> Result<Expr> {
        diff::differentiate(self, var, direction)
    }

    fn render_with(&self, settings: &RenderSettings) -> String {
        match self {
            Expr::Variable(v) => v.render_with(settings),
            Expr::Constant(c) => c.render_with(settings),
            Expr::Unary(node) => node.op.render(&node.operand.render_with(settings)),
            Expr::Binary(node) => node.op.render(
                &node.left.render_with(settings),
                &node.right.render_with(settings),
            ),
        }
    }
}

impl Evaluate for Expr {
    /// Fails before doing any arithmetic if a free variable remains.
    fn evaluate(&self) -> Result<Value> {
        let free = self.variables();
        if !free.is_empty() {
            let tags: Vec<String> = free.tags().map(|t| t.to_string()).collect();
            return Err(ExprError::Unbound {
                tags: tags.join(", "),
            });
        }
        self.evaluate_node()
    }
}

impl From<Variable> for Expr {
    fn from(value: Variable) -> Self {
        Expr::Variable(value)
    }
}

impl From<&Variable> for Expr {
    fn from(value: &Variable) -> Self {
        Expr::Variable(*value)
    }
}

impl From<Constant> for Expr {
    fn from(value: Constant) -> Self {
        Expr::Constant(value)
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Expr::Constant(Constant::new(value))
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::scalar(value)
    }
}

impl From<Tensor> for Expr {
    fn from(value: Tensor) -> Self {
        Expr::tensor(value)
    }
}

impl From<&Expr> for Expr {
    fn from(value: &Expr) -> Self {
        value.clone()
    }
}

// Operators return `Result` because composition is where kind contracts
// are enforced.

impl Add for Expr {
    type Output = Result<Expr>;

    fn add(self, rhs: Expr) -> Result<Expr> {
        builder::add(self, rhs)
    }
}

impl Sub for Expr {
    type Output = Result<Expr>;

    fn sub(self, rhs: Expr) -> Result<Expr> {
        builder::sub(self, rhs)
    }
}

impl Mul for Expr {
    type Output = Result<Expr>;

    fn mul(self, rhs: Expr) -> Result<Expr> {
        builder::mul(self, rhs)
    }
}

impl Add for &Expr {
    type Output = Result<Expr>;

    fn add(self, rhs: &Expr) -> Result<Expr> {
        builder::add(self, rhs)
    }
}

impl Sub for &Expr {
    type Output = Result<Expr>;

    fn sub(self, rhs: &Expr) -> Result<Expr> {
        builder::sub(self, rhs)
    }
}

impl Mul for &Expr {
    type Output = Result<Expr>;

    fn mul(self, rhs: &Expr) -> Result<Expr> {
        builder::mul(self, rhs)
    }
}
