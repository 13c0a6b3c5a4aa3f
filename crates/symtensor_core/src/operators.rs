//! Operator catalog.
//!
//! Each operator is a plain tag; its kind rule, evaluation, rendering and
//! differentiability live in the `match` arms below. The derivative rules
//! themselves are in `diff`.

use crate::error::{ExprError, Result};
use crate::value::{self, Kind, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Transpose,
    Deviatoric,
    Trace,
    Inverse,
    Cbrt,
    Unimodular,
    Determinant,
    Exp,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Transpose => "transpose",
            UnaryOp::Deviatoric => "dev",
            UnaryOp::Trace => "trace",
            UnaryOp::Inverse => "inverse",
            UnaryOp::Cbrt => "cbrt",
            UnaryOp::Unimodular => "unimod",
            UnaryOp::Determinant => "det",
            UnaryOp::Exp => "exp",
        }
    }

    /// Kind the operand must have.
    pub fn operand_kind(self) -> Kind {
        match self {
            UnaryOp::Cbrt | UnaryOp::Exp => Kind::Scalar,
            _ => Kind::Tensor,
        }
    }

    pub fn result_kind(self, operand: Kind) -> Result<Kind> {
        let expected = self.operand_kind();
        if operand != expected {
            return Err(ExprError::OperandKind {
                op: self.name(),
                expected,
                found: operand,
            });
        }
        Ok(match self {
            UnaryOp::Transpose | UnaryOp::Deviatoric | UnaryOp::Inverse | UnaryOp::Unimodular => {
                Kind::Tensor
            }
            UnaryOp::Trace | UnaryOp::Cbrt | UnaryOp::Determinant | UnaryOp::Exp => Kind::Scalar,
        })
    }

    pub fn is_differentiable(self) -> bool {
        !matches!(self, UnaryOp::Cbrt)
    }

    pub fn apply(self, operand: Value) -> Result<Value> {
        let name = self.name();
        Ok(match self {
            UnaryOp::Transpose => Value::Tensor(operand.tensor(name)?.transpose()),
            UnaryOp::Deviatoric => Value::Tensor(value::deviatoric(&operand.tensor(name)?)),
            UnaryOp::Trace => Value::Scalar(operand.tensor(name)?.trace()),
            UnaryOp::Inverse => Value::Tensor(value::invert(&operand.tensor(name)?)?),
            UnaryOp::Cbrt => Value::Scalar(operand.scalar(name)?.cbrt()),
            UnaryOp::Unimodular => Value::Tensor(value::unimodular(&operand.tensor(name)?)?),
            UnaryOp::Determinant => Value::Scalar(operand.tensor(name)?.determinant()),
            UnaryOp::Exp => Value::Scalar(operand.scalar(name)?.exp()),
        })
    }

    pub fn render(self, operand: &str) -> String {
        match self {
            UnaryOp::Transpose => format!("{operand}^T"),
            UnaryOp::Deviatoric => format!("{operand}^D"),
            UnaryOp::Trace => format!("tr({operand})"),
            UnaryOp::Inverse => format!("{operand}^-1"),
            UnaryOp::Cbrt => format!("cbrt({operand})"),
            UnaryOp::Unimodular => format!("{operand}^U"),
            UnaryOp::Determinant => format!("det({operand})"),
            UnaryOp::Exp => format!("exp({operand})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Frobenius inner product.
    Dot,
    /// Closed form of `d(X^-1)`; left is `X`, right is `dX`.
    InverseDerivative,
    /// Closed form of `d(X^U)`; left is `X`, right is `dX`.
    UnimodularDerivative,
}

impl BinaryOp {
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Dot => "dot",
            BinaryOp::InverseDerivative => "inverse derivative",
            BinaryOp::UnimodularDerivative => "unimodular derivative",
        }
    }

    pub fn result_kind(self, left: Kind, right: Kind) -> Result<Kind> {
        match self {
            BinaryOp::Add | BinaryOp::Sub => {
                if left != right {
                    return Err(ExprError::KindMismatch {
                        op: self.name(),
                        left,
                        right,
                    });
                }
                Ok(left)
            }
            BinaryOp::Mul => {
                if left == Kind::Tensor || right == Kind::Tensor {
                    Ok(Kind::Tensor)
                } else {
                    Ok(Kind::Scalar)
                }
            }
            BinaryOp::Dot | BinaryOp::InverseDerivative | BinaryOp::UnimodularDerivative => {
                for found in [left, right] {
                    if found != Kind::Tensor {
                        return Err(ExprError::OperandKind {
                            op: self.name(),
                            expected: Kind::Tensor,
                            found,
                        });
                    }
                }
                if self == BinaryOp::Dot {
                    Ok(Kind::Scalar)
                } else {
                    Ok(Kind::Tensor)
                }
            }
        }
    }

    pub fn is_differentiable(self) -> bool {
        matches!(self, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul)
    }

    pub fn apply(self, left: Value, right: Value) -> Result<Value> {
        let name = self.name();
        match self {
            BinaryOp::Add => left.add(right),
            BinaryOp::Sub => left.sub(right),
            BinaryOp::Mul => Ok(left.mul(right)),
            BinaryOp::Dot => Ok(Value::Scalar(value::frobenius(
                &left.tensor(name)?,
                &right.tensor(name)?,
            ))),
            BinaryOp::InverseDerivative => Ok(Value::Tensor(value::inverse_derivative(
                &left.tensor(name)?,
                &right.tensor(name)?,
            )?)),
            BinaryOp::UnimodularDerivative => Ok(Value::Tensor(value::unimodular_derivative(
                &left.tensor(name)?,
                &right.tensor(name)?,
            )?)),
        }
    }

    pub fn render(self, left: &str, right: &str) -> String {
        match self {
            BinaryOp::Add => format!("({left}+{right})"),
            BinaryOp::Sub => format!("({left}-{right})"),
            BinaryOp::Mul => format!("({left}*{right})"),
            BinaryOp::Dot => format!("({left}:{right})"),
            BinaryOp::InverseDerivative => format!("(-{left}^-1*{right}*{left}^-1)"),
            BinaryOp::UnimodularDerivative => {
                format!("(det({left})^(-1/3)*({right}-1/3*({left}^-T:{right})*{left}))")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Tensor;

    #[test]
    fn unary_kind_rules() {
        assert_eq!(UnaryOp::Trace.result_kind(Kind::Tensor), Ok(Kind::Scalar));
        assert_eq!(UnaryOp::Inverse.result_kind(Kind::Tensor), Ok(Kind::Tensor));
        assert_eq!(UnaryOp::Exp.result_kind(Kind::Scalar), Ok(Kind::Scalar));
        assert!(UnaryOp::Determinant.result_kind(Kind::Scalar).is_err());
        assert!(UnaryOp::Transpose.result_kind(Kind::Scalar).is_err());
        assert!(UnaryOp::Cbrt.result_kind(Kind::Tensor).is_err());
    }

    #[test]
    fn binary_kind_rules() {
        assert_eq!(BinaryOp::Mul.result_kind(Kind::Scalar, Kind::Tensor), Ok(Kind::Tensor));
        assert_eq!(BinaryOp::Mul.result_kind(Kind::Scalar, Kind::Scalar), Ok(Kind::Scalar));
        assert_eq!(BinaryOp::Dot.result_kind(Kind::Tensor, Kind::Tensor), Ok(Kind::Scalar));
        assert!(BinaryOp::Dot.result_kind(Kind::Tensor, Kind::Scalar).is_err());
        assert!(BinaryOp::Add.result_kind(Kind::Tensor, Kind::Scalar).is_err());
    }

    #[test]
    fn differentiability_markers() {
        assert!(!UnaryOp::Cbrt.is_differentiable());
        assert!(UnaryOp::Determinant.is_differentiable());
        assert!(!BinaryOp::Dot.is_differentiable());
        assert!(!BinaryOp::InverseDerivative.is_differentiable());
        assert!(!BinaryOp::UnimodularDerivative.is_differentiable());
        assert!(BinaryOp::Mul.is_differentiable());
    }

    #[test]
    fn dot_is_frobenius_product() {
        let a = Tensor::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        let value = BinaryOp::Dot
            .apply(Value::Tensor(a), Value::Tensor(Tensor::identity()))
            .expect("dot should evaluate");
        assert_eq!(value, Value::Scalar(15.0));
    }

    #[test]
    fn renders_fixed_forms() {
        assert_eq!(UnaryOp::Transpose.render("A"), "A^T");
        assert_eq!(UnaryOp::Deviatoric.render("A"), "A^D");
        assert_eq!(UnaryOp::Unimodular.render("A"), "A^U");
        assert_eq!(UnaryOp::Determinant.render("A"), "det(A)");
        assert_eq!(BinaryOp::Add.render("A", "B"), "(A+B)");
        assert_eq!(BinaryOp::Dot.render("A", "B"), "(A:B)");
    }
}
