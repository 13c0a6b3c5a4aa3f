//! Numeric values carried by constants and produced by evaluation.
//!
//! All dense 3x3 arithmetic is delegated to `nalgebra`; this module only
//! decides which kernel applies to which pair of value kinds.

use crate::error::{ExprError, Result};
use nalgebra::Matrix3;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rank-2 tensor in three dimensions.
pub type Tensor = Matrix3<f64>;

/// Element kind of an expression node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Scalar,
    Tensor,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Scalar => write!(f, "scalar"),
            Kind::Tensor => write!(f, "tensor"),
        }
    }
}

/// A concrete scalar or tensor value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Scalar(f64),
    Tensor(Tensor),
}

impl Value {
    /// Additive identity for the given kind.
    pub fn zero(kind: Kind) -> Self {
        match kind {
            Kind::Scalar => Value::Scalar(f64::zero()),
            Kind::Tensor => Value::Tensor(Tensor::zero()),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Scalar(_) => Kind::Scalar,
            Value::Tensor(_) => Kind::Tensor,
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Tensor(_) => None,
        }
    }

    pub fn as_tensor(&self) -> Option<Tensor> {
        match self {
            Value::Tensor(m) => Some(*m),
            Value::Scalar(_) => None,
        }
    }

    pub(crate) fn scalar(self, op: &'static str) -> Result<f64> {
        self.as_scalar().ok_or(ExprError::OperandKind {
            op,
            expected: Kind::Scalar,
            found: Kind::Tensor,
        })
    }

    pub(crate) fn tensor(self, op: &'static str) -> Result<Tensor> {
        self.as_tensor().ok_or(ExprError::OperandKind {
            op,
            expected: Kind::Tensor,
            found: Kind::Scalar,
        })
    }

    pub(crate) fn add(self, rhs: Value) -> Result<Value> {
        match (self, rhs) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(a + b)),
            (Value::Tensor(a), Value::Tensor(b)) => Ok(Value::Tensor(a + b)),
            (l, r) => Err(ExprError::KindMismatch {
                op: "add",
                left: l.kind(),
                right: r.kind(),
            }),
        }
    }

    pub(crate) fn sub(self, rhs: Value) -> Result<Value> {
        match (self, rhs) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(a - b)),
            (Value::Tensor(a), Value::Tensor(b)) => Ok(Value::Tensor(a - b)),
            (l, r) => Err(ExprError::KindMismatch {
                op: "sub",
                left: l.kind(),
                right: r.kind(),
            }),
        }
    }

    /// Scaling when one side is a scalar, matrix product for two tensors.
    pub(crate) fn mul(self, rhs: Value) -> Value {
        match (self, rhs) {
            (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(a * b),
            (Value::Scalar(a), Value::Tensor(b)) => Value::Tensor(b * a),
            (Value::Tensor(a), Value::Scalar(b)) => Value::Tensor(a * b),
            (Value::Tensor(a), Value::Tensor(b)) => Value::Tensor(a * b),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Scalar(value)
    }
}

impl From<Tensor> for Value {
    fn from(value: Tensor) -> Self {
        Value::Tensor(value)
    }
}

/// Frobenius inner product `A : B`.
pub fn frobenius(a: &Tensor, b: &Tensor) -> f64 {
    a.component_mul(b).sum()
}

pub fn invert(m: &Tensor) -> Result<Tensor> {
    m.try_inverse().ok_or(ExprError::SingularTensor)
}

/// Trace-free part `X - tr(X)/3 I`.
pub fn deviatoric(m: &Tensor) -> Tensor {
    m - Tensor::identity() * (m.trace() / 3.0)
}

/// Volume-normalised part `X / cbrt(det X)`.
pub fn unimodular(m: &Tensor) -> Result<Tensor> {
    let det = m.determinant();
    if det == 0.0 {
        return Err(ExprError::SingularTensor);
    }
    Ok(m / det.cbrt())
}

/// `-X^-1 dX X^-1`
pub fn inverse_derivative(x: &Tensor, dx: &Tensor) -> Result<Tensor> {
    let x_inv = invert(x)?;
    Ok(-(x_inv * dx * x_inv))
}

/// `det(X)^(-1/3) (dX - 1/3 (X^-T : dX) X)`
pub fn unimodular_derivative(x: &Tensor, dx: &Tensor) -> Result<Tensor> {
    let x_inv_t = invert(x)?.transpose();
    let scale = 1.0 / x.determinant().cbrt();
    Ok((dx - x * (frobenius(&x_inv_t, dx) / 3.0)) * scale)
}
