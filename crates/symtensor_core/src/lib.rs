//! The `symtensor_core` crate builds algebraic expressions over scalars and
//! 3x3 tensors and differentiates them exactly, in a chosen symbolic
//! direction, for constitutive modeling.
//!
//! Key components:
//! - **Leaves**: `Variable` (tagged placeholder) and `Constant`.
//! - **Operators**: `UnaryOp` / `BinaryOp` kind rules, evaluation and rendering.
//! - **Expressions**: immutable `Expr` trees with cached kinds and dependencies.
//! - **Diff**: Gateaux derivatives with dependency-based zero elimination and
//!   closed-form helpers for `inverse` and `unimod`.
//! - **Models**: Neo-Hookean strain energy and stress derived with the engine.
pub mod builder;
pub mod diff;
pub mod error;
pub mod expr;
pub mod leaf;
pub mod models;
pub mod operators;
pub mod render;
pub mod traits;
pub mod value;
