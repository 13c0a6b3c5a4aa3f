use crate::value::Kind;
use thiserror::Error;

/// Failures raised while composing, differentiating, substituting or
/// evaluating expressions. Every failure is immediate; no partially built
/// tree is ever returned alongside an error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("{op} expects a {expected} operand, got a {found}")]
    OperandKind {
        op: &'static str,
        expected: Kind,
        found: Kind,
    },
    #[error("{op} requires operands of the same kind, got {left} and {right}")]
    KindMismatch {
        op: &'static str,
        left: Kind,
        right: Kind,
    },
    #[error("variable '{tag}' is used both as a {first} and as a {second}")]
    VariableKindConflict { tag: char, first: Kind, second: Kind },
    #[error("{op} is not differentiable")]
    NotDifferentiable { op: &'static str },
    #[error("direction variable '{tag}' must not occur in the expression or coincide with the target")]
    DirectionCollision { tag: char },
    #[error("direction '{direction}' is a {found} but target '{target}' is a {expected}")]
    DirectionKind {
        target: char,
        direction: char,
        expected: Kind,
        found: Kind,
    },
    #[error("binding for '{tag}' holds a {found} but the variable is a {expected}")]
    BindingKind { tag: char, expected: Kind, found: Kind },
    #[error("cannot evaluate expression with free variables: {tags}")]
    Unbound { tags: String },
    #[error("tensor is singular and cannot be inverted")]
    SingularTensor,
}

pub type Result<T> = std::result::Result<T, ExprError>;
