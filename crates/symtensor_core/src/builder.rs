//! Construction API. Every function checks the operator's kind contract
//! and fails instead of building an ill-typed node.

use crate::error::Result;
use crate::expr::Expr;
use crate::operators::{BinaryOp, UnaryOp};

pub fn add(left: impl Into<Expr>, right: impl Into<Expr>) -> Result<Expr> {
    Expr::binary(BinaryOp::Add, left.into(), right.into())
}

pub fn sub(left: impl Into<Expr>, right: impl Into<Expr>) -> Result<Expr> {
    Expr::binary(BinaryOp::Sub, left.into(), right.into())
}

/// Matrix product for two tensors, scaling when one side is a scalar.
pub fn mul(left: impl Into<Expr>, right: impl Into<Expr>) -> Result<Expr> {
    Expr::binary(BinaryOp::Mul, left.into(), right.into())
}

/// Frobenius inner product `A : B`. Not differentiable.
pub fn dot(left: impl Into<Expr>, right: impl Into<Expr>) -> Result<Expr> {
    Expr::binary(BinaryOp::Dot, left.into(), right.into())
}

pub fn transpose(operand: impl Into<Expr>) -> Result<Expr> {
    Expr::unary(UnaryOp::Transpose, operand.into())
}

/// Deviatoric (trace-free) part.
pub fn dev(operand: impl Into<Expr>) -> Result<Expr> {
    Expr::unary(UnaryOp::Deviatoric, operand.into())
}

pub fn trace(operand: impl Into<Expr>) -> Result<Expr> {
    Expr::unary(UnaryOp::Trace, operand.into())
}

pub fn inverse(operand: impl Into<Expr>) -> Result<Expr> {
    Expr::unary(UnaryOp::Inverse, operand.into())
}

/// Cube root of a scalar. Not differentiable.
pub fn cbrt(operand: impl Into<Expr>) -> Result<Expr> {
    Expr::unary(UnaryOp::Cbrt, operand.into())
}

/// Isochoric part `X / cbrt(det X)`.
pub fn unimod(operand: impl Into<Expr>) -> Result<Expr> {
    Expr::unary(UnaryOp::Unimodular, operand.into())
}

pub fn det(operand: impl Into<Expr>) -> Result<Expr> {
    Expr::unary(UnaryOp::Determinant, operand.into())
}

pub fn exp(operand: impl Into<Expr>) -> Result<Expr> {
    Expr::unary(UnaryOp::Exp, operand.into())
}
