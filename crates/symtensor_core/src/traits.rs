use crate::error::Result;
use crate::expr::Expr;
use crate::leaf::{Binding, Variable};
use crate::render::RenderSettings;
use crate::value::{Kind, Value};

/// The capability shared by every node of an expression tree
/// (variables, constants and composite nodes).
///
/// All methods are pure: substitution and differentiation return new trees
/// and never touch `self`.
pub trait Expression {
    /// Result kind, known without evaluating.
    fn kind(&self) -> Kind;

    /// Whether `var` (matched by tag) occurs anywhere below this node.
    fn depends_on(&self, var: &Variable) -> bool;

    /// Replaces every variable with a matching binding by a constant.
    /// The first binding with a matching tag wins.
    fn substitute(&self, bindings: &[Binding]) -> Result<Expr>;

    /// Directional derivative with respect to `var` along `direction`.
    /// `direction` must be a tag that does not occur in the tree.
    fn differentiate(&self, var: &Variable, direction: &Variable) -> Result<Expr>;

    fn render_with(&self, settings: &RenderSettings) -> String;

    fn render(&self) -> String {
        self.render_with(&RenderSettings::default())
    }
}

/// Numeric evaluation. Not implemented for `Variable`:
/// a free variable has no value.
pub trait Evaluate {
    fn evaluate(&self) -> Result<Value>;
}
