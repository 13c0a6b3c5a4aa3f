//! Directional (Gateaux) differentiation.
//!
//! `differentiate(f, x, d)` builds a new tree for `d/dt f(x + t d)` at
//! `t = 0`, with `d` left as a free variable. Subtrees that do not depend on
//! `x` are never visited; their contribution is the zero element.
//! `inverse` and `unimod` are differentiated into single closed-form helper
//! nodes so repeated differentiation does not blow up the tree.

use crate::builder::{add, det, dev, dot, exp, inverse, mul, trace, transpose};
use crate::error::{ExprError, Result};
use crate::expr::{BinaryExpression, Expr, UnaryExpression};
use crate::leaf::{Binding, Variable};
use crate::operators::{BinaryOp, UnaryOp};
use crate::traits::{Evaluate, Expression};
use crate::value::{Kind, Tensor, Value};
use tracing::debug;

/// Validates the direction and differentiates `expr`.
pub fn differentiate(expr: &Expr, var: &Variable, direction: &Variable) -> Result<Expr> {
    check_direction(expr, var, direction)?;
    debug!(
        target_tag = %var.tag(),
        direction = %direction.tag(),
        nodes = expr.node_count(),
        "differentiating expression"
    );
    let derivative = derive(expr, var, direction)?;
    debug!(nodes = derivative.node_count(), "derivative built");
    Ok(derivative)
}

fn check_direction(expr: &Expr, var: &Variable, direction: &Variable) -> Result<()> {
    let variables = expr.variables();
    if direction.tag() == var.tag() || variables.contains(direction.tag()) {
        return Err(ExprError::DirectionCollision {
            tag: direction.tag(),
        });
    }
    if direction.kind() != var.kind() {
        return Err(ExprError::DirectionKind {
            target: var.tag(),
            direction: direction.tag(),
            expected: var.kind(),
            found: direction.kind(),
        });
    }
    match variables.kind_of(var.tag()) {
        Some(kind) if kind != var.kind() => Err(ExprError::VariableKindConflict {
            tag: var.tag(),
            first: kind,
            second: var.kind(),
        }),
        _ => Ok(()),
    }
}

// A subtree that does not depend on `var` is zero whatever its operators
// are; the differentiability marker only matters for dependent nodes.
fn derive(expr: &Expr, var: &Variable, direction: &Variable) -> Result<Expr> {
    match expr {
        Expr::Variable(v) => v.differentiate(var, direction),
        Expr::Constant(c) => Ok(Expr::zero(c.kind())),
        _ if !expr.depends_on(var) => Ok(Expr::zero(expr.kind())),
        Expr::Unary(node) => derive_unary(node, var, direction),
        Expr::Binary(node) => derive_binary(node, var, direction),
    }
}

fn derive_unary(node: &UnaryExpression, var: &Variable, direction: &Variable) -> Result<Expr> {
    let op = node.op();
    if !op.is_differentiable() {
        return Err(ExprError::NotDifferentiable { op: op.name() });
    }
    let x = node.operand();
    let dx = derive(x, var, direction)?;
    match op {
        UnaryOp::Transpose => transpose(dx),
        UnaryOp::Deviatoric => dev(dx),
        UnaryOp::Trace => trace(dx),
        UnaryOp::Inverse => Expr::binary(BinaryOp::InverseDerivative, x.clone(), dx),
        UnaryOp::Unimodular => Expr::binary(BinaryOp::UnimodularDerivative, x.clone(), dx),
        // Jacobi: det(X) (X^-T : dX)
        UnaryOp::Determinant => mul(det(x)?, dot(transpose(inverse(x)?)?, dx)?),
        UnaryOp::Exp => mul(exp(x)?, dx),
        UnaryOp::Cbrt => Err(ExprError::NotDifferentiable { op: op.name() }),
    }
}

fn derive_binary(node: &BinaryExpression, var: &Variable, direction: &Variable) -> Result<Expr> {
    let op = node.op();
    if !op.is_differentiable() {
        return Err(ExprError::NotDifferentiable { op: op.name() });
    }
    let (left, right) = (node.left(), node.right());
    let d = |e: &Expr| derive(e, var, direction);

    match (left.depends_on(var), right.depends_on(var)) {
        (true, false) => match op {
            BinaryOp::Add | BinaryOp::Sub => d(left),
            BinaryOp::Mul => mul(d(left)?, right),
            _ => Err(ExprError::NotDifferentiable { op: op.name() }),
        },
        (false, true) => match op {
            BinaryOp::Add => d(right),
            BinaryOp::Sub => mul(-1.0, d(right)?),
            BinaryOp::Mul => mul(left, d(right)?),
            _ => Err(ExprError::NotDifferentiable { op: op.name() }),
        },
        (true, true) => match op {
            BinaryOp::Add => add(d(left)?, d(right)?),
            BinaryOp::Sub => Expr::binary(BinaryOp::Sub, d(left)?, d(right)?),
            BinaryOp::Mul => add(mul(d(left)?, right)?, mul(left, d(right)?)?),
            _ => Err(ExprError::NotDifferentiable { op: op.name() }),
        },
        (false, false) => Ok(Expr::zero(node.kind())),
    }
}

/// Ordinary derivative of a scalar expression at a point.
///
/// Differentiates once, binds `bindings`, then evaluates the directional
/// derivative along every basis direction of `var`: `1` for a scalar,
/// `E_ij` for a tensor. The result has the kind of `var`.
pub fn gradient(
    expr: &Expr,
    var: &Variable,
    direction: &Variable,
    bindings: &[Binding],
) -> Result<Value> {
    if expr.kind() != Kind::Scalar {
        return Err(ExprError::OperandKind {
            op: "gradient",
            expected: Kind::Scalar,
            found: expr.kind(),
        });
    }
    if bindings.iter().any(|b| b.tag == direction.tag()) {
        return Err(ExprError::DirectionCollision {
            tag: direction.tag(),
        });
    }

    let derivative = differentiate(expr, var, direction)?.substitute(bindings)?;
    debug!(
        target_tag = %var.tag(),
        nodes = derivative.node_count(),
        "evaluating gradient"
    );

    match var.kind() {
        Kind::Scalar => derivative.substitute(&[direction.bind(1.0)])?.evaluate(),
        Kind::Tensor => {
            let mut out = Tensor::zeros();
            for i in 0..3 {
                for j in 0..3 {
                    let mut basis = Tensor::zeros();
                    basis[(i, j)] = 1.0;
                    let component = derivative
                        .substitute(&[direction.bind(basis)])?
                        .evaluate()?
                        .scalar("gradient")?;
                    tracing::trace!(i, j, component, "gradient component");
                    out[(i, j)] = component;
                }
            }
            Ok(Value::Tensor(out))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{cbrt, sub, unimod};
    use crate::value::{deviatoric, frobenius};

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    fn eval_scalar(expr: &Expr, bindings: &[Binding]) -> f64 {
        expr.substitute(bindings)
            .expect("substitute")
            .evaluate()
            .expect("evaluate")
            .as_scalar()
            .expect("scalar result")
    }

    fn eval_tensor(expr: &Expr, bindings: &[Binding]) -> Tensor {
        expr.substitute(bindings)
            .expect("substitute")
            .evaluate()
            .expect("evaluate")
            .as_tensor()
            .expect("tensor result")
    }

    fn sample_x() -> Tensor {
        Tensor::new(1.2, 0.1, 0.0, 0.3, 0.9, 0.2, 0.0, 0.4, 1.1)
    }

    fn sample_dx() -> Tensor {
        Tensor::new(0.5, -0.2, 0.1, 0.0, 0.3, 0.7, -0.4, 0.2, 0.6)
    }

    #[test]
    fn square_derivative_at_three_is_six() {
        let x = Variable::scalar('x');
        let d = Variable::scalar('d');
        let f = mul(&x, &x).expect("mul");
        let df = f.differentiate(&x, &d).expect("derivative");
        assert_eq!(eval_scalar(&df, &[x.bind(3.0), d.bind(1.0)]), 6.0);
    }

    #[test]
    fn scalar_expressions_match_finite_differences() {
        let x = Variable::scalar('x');
        let d = Variable::scalar('d');
        // exp(x*x) - 3x + x*exp(x)
        let f = add(
            sub(exp(mul(&x, &x).expect("mul")).expect("exp"), mul(3.0, &x).expect("mul"))
                .expect("sub"),
            mul(&x, exp(&x).expect("exp")).expect("mul"),
        )
        .expect("add");
        let df = f.differentiate(&x, &d).expect("derivative");

        let h = 1e-6;
        for x0 in [-1.0, 0.0, 0.4, 1.3] {
            let analytic = eval_scalar(&df, &[x.bind(x0), d.bind(1.0)]);
            let numeric = (eval_scalar(&f, &[x.bind(x0 + h)]) - eval_scalar(&f, &[x.bind(x0 - h)]))
                / (2.0 * h);
            assert!(
                (analytic - numeric).abs() < 1e-5,
                "x0 = {x0}: analytic {analytic}, numeric {numeric}"
            );
        }
    }

    #[test]
    fn derivative_is_linear() {
        let x = Variable::scalar('x');
        let d = Variable::scalar('d');
        let f = mul(&x, exp(&x).expect("exp")).expect("mul");
        let g = mul(mul(&x, &x).expect("mul"), &x).expect("mul");
        let sum = add(&f, &g).expect("add");

        let d_sum = sum.differentiate(&x, &d).expect("derivative");
        let d_f = f.differentiate(&x, &d).expect("derivative");
        let d_g = g.differentiate(&x, &d).expect("derivative");

        let bindings = [x.bind(0.7), d.bind(2.5)];
        let lhs = eval_scalar(&d_sum, &bindings);
        let rhs = eval_scalar(&d_f, &bindings) + eval_scalar(&d_g, &bindings);
        assert!((lhs - rhs).abs() < 1e-12);
    }

    #[test]
    fn independent_expression_has_zero_derivative() {
        let x = Variable::scalar('x');
        let y = Variable::scalar('y');
        let d = Variable::scalar('d');
        let f = mul(exp(&y).expect("exp"), add(&y, 2.0).expect("add")).expect("mul");
        assert!(!f.depends_on(&x));
        let df = f.differentiate(&x, &d).expect("derivative");
        assert_eq!(df, Expr::zero(Kind::Scalar));

        let m = Variable::tensor('M');
        let dm = Variable::tensor('N');
        let g = inverse(&m).expect("inverse");
        let dg = g.differentiate(&Variable::tensor('X'), &dm).expect("derivative");
        assert_eq!(dg, Expr::zero(Kind::Tensor));
    }

    #[test]
    fn product_rule_matches_factors() {
        let x = Variable::scalar('x');
        let d = Variable::scalar('d');
        let a = add(mul(&x, &x).expect("mul"), 1.0).expect("add");
        let b = exp(&x).expect("exp");
        let f = mul(&a, &b).expect("mul");

        let df = f.differentiate(&x, &d).expect("derivative");
        let da = a.differentiate(&x, &d).expect("derivative");
        let db = b.differentiate(&x, &d).expect("derivative");

        let bindings = [x.bind(-0.3), d.bind(1.7)];
        let expected = eval_scalar(&da, &bindings) * eval_scalar(&b, &bindings)
            + eval_scalar(&a, &bindings) * eval_scalar(&db, &bindings);
        assert!((eval_scalar(&df, &bindings) - expected).abs() < 1e-12);
    }

    #[test]
    fn subtraction_negates_right_only_derivative() {
        let x = Variable::scalar('x');
        let d = Variable::scalar('d');
        let f = sub(5.0, mul(&x, &x).expect("mul")).expect("sub");
        let df = f.differentiate(&x, &d).expect("derivative");
        assert_eq!(eval_scalar(&df, &[x.bind(2.0), d.bind(1.0)]), -4.0);
        assert!(df.render().starts_with("(-1.000000*"));
    }

    #[test]
    fn tensor_product_rule_keeps_order() {
        let a = Variable::tensor('A');
        let h = Variable::tensor('H');
        let f = mul(transpose(&a).expect("transpose"), &a).expect("mul");
        let df = f.differentiate(&a, &h).expect("derivative");
        let (x, dx) = (sample_x(), sample_dx());
        let expected = dx.transpose() * x + x.transpose() * dx;
        let got = eval_tensor(&df, &[a.bind(x), h.bind(dx)]);
        assert!((got - expected).norm() < 1e-12);
    }

    #[test]
    fn determinant_of_identity_and_its_derivative() {
        let x = Variable::tensor('X');
        let dx = Variable::tensor('D');
        let f = det(&x).expect("det");
        assert_eq!(eval_scalar(&f, &[x.bind(Tensor::identity())]), 1.0);

        let df = f.differentiate(&x, &dx).expect("derivative");
        let value = eval_scalar(&df, &[x.bind(Tensor::identity()), dx.bind(Tensor::identity())]);
        assert!((value - 3.0).abs() < 1e-12);
    }

    #[test]
    fn determinant_derivative_follows_jacobi() {
        let x = Variable::tensor('X');
        let dx = Variable::tensor('D');
        let df = det(&x)
            .expect("det")
            .differentiate(&x, &dx)
            .expect("derivative");
        let (m, dm) = (sample_x(), sample_dx());
        let m_inv_t = m.try_inverse().expect("invertible").transpose();
        let expected = m.determinant() * frobenius(&m_inv_t, &dm);
        let got = eval_scalar(&df, &[x.bind(m), dx.bind(dm)]);
        assert!((got - expected).abs() < 1e-12);
    }

    #[test]
    fn inverse_derivative_uses_closed_form() {
        let x = Variable::tensor('X');
        let dx = Variable::tensor('D');
        let df = inverse(&x)
            .expect("inverse")
            .differentiate(&x, &dx)
            .expect("derivative");
        match &df {
            Expr::Binary(node) => assert_eq!(node.op(), BinaryOp::InverseDerivative),
            other => panic!("expected helper node, got {other:?}"),
        }
        let (m, dm) = (sample_x(), sample_dx());
        let m_inv = m.try_inverse().expect("invertible");
        let expected = -(m_inv * dm * m_inv);
        let got = eval_tensor(&df, &[x.bind(m), dx.bind(dm)]);
        assert!((got - expected).norm() < 1e-12);
    }

    #[test]
    fn unimodular_derivative_uses_closed_form() {
        let x = Variable::tensor('X');
        let dx = Variable::tensor('D');
        let df = unimod(&x)
            .expect("unimod")
            .differentiate(&x, &dx)
            .expect("derivative");
        let (m, dm) = (sample_x(), sample_dx());
        let m_inv_t = m.try_inverse().expect("invertible").transpose();
        let expected =
            (dm - m * (frobenius(&m_inv_t, &dm) / 3.0)) * (1.0 / m.determinant().cbrt());
        let got = eval_tensor(&df, &[x.bind(m), dx.bind(dm)]);
        assert!((got - expected).norm() < 1e-12);
    }

    #[test]
    fn deviatoric_and_trace_commute_with_derivative() {
        let x = Variable::tensor('X');
        let dx = Variable::tensor('D');
        let f = trace(dev(mul(&x, &x).expect("mul")).expect("dev")).expect("trace");
        let df = f.differentiate(&x, &dx).expect("derivative");
        let value = eval_scalar(&df, &[x.bind(sample_x()), dx.bind(sample_dx())]);
        assert!(value.abs() < 1e-12);
    }

    #[test]
    fn deviatoric_derivative_matches_reference() {
        let x = Variable::tensor('X');
        let dx = Variable::tensor('D');
        let f = dev(mul(&x, &x).expect("mul")).expect("dev");
        let df = f.differentiate(&x, &dx).expect("derivative");
        let (m, dm) = (sample_x(), sample_dx());
        let expected = deviatoric(&(dm * m + m * dm));
        let got = eval_tensor(&df, &[x.bind(m), dx.bind(dm)]);
        assert!(expected.norm() > 1e-3);
        assert!((got - expected).norm() < 1e-12);
    }

    #[test]
    fn independent_non_differentiable_nodes_are_zero_bare_or_nested() {
        let x = Variable::scalar('x');
        let y = Variable::scalar('y');
        let d = Variable::scalar('d');
        let m = Variable::tensor('M');

        let root = cbrt(&y).expect("cbrt");
        let bare = root.differentiate(&x, &d).expect("bare derivative");
        let nested = add(&root, 1.0)
            .expect("add")
            .differentiate(&x, &d)
            .expect("nested derivative");
        assert_eq!(bare, Expr::zero(Kind::Scalar));
        assert_eq!(nested, bare);

        let inner = dot(&m, &m).expect("dot");
        let bare = inner.differentiate(&x, &d).expect("bare derivative");
        let nested = add(&x, &inner)
            .expect("add")
            .differentiate(&x, &d)
            .expect("nested derivative");
        assert_eq!(bare, Expr::zero(Kind::Scalar));
        assert_eq!(nested, Expr::Variable(d));
    }

    #[test]
    fn non_differentiable_operators_fail() {
        let x = Variable::scalar('x');
        let d = Variable::scalar('d');
        let m = Variable::tensor('M');
        let dm = Variable::tensor('N');

        assert_err_contains(
            cbrt(&x).expect("cbrt").differentiate(&x, &d),
            "cbrt is not differentiable",
        );
        assert_err_contains(
            dot(&m, &m).expect("dot").differentiate(&m, &dm),
            "dot is not differentiable",
        );

        let first = inverse(&m)
            .expect("inverse")
            .differentiate(&m, &dm)
            .expect("derivative");
        let dn = Variable::tensor('P');
        assert_err_contains(
            first.differentiate(&m, &dn),
            "inverse derivative is not differentiable",
        );

        // The Jacobi form contains an inner product, so det has no second derivative.
        let first = det(&m).expect("det").differentiate(&m, &dm).expect("derivative");
        assert_err_contains(first.differentiate(&m, &dn), "dot is not differentiable");
    }

    #[test]
    fn independent_non_differentiable_factor_is_pruned() {
        let x = Variable::scalar('x');
        let y = Variable::scalar('y');
        let d = Variable::scalar('d');
        let f = mul(&x, cbrt(&y).expect("cbrt")).expect("mul");
        let df = f.differentiate(&x, &d).expect("derivative");
        assert!((eval_scalar(&df, &[y.bind(8.0), d.bind(1.0)]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn direction_must_be_fresh() {
        let x = Variable::scalar('x');
        let y = Variable::scalar('y');
        let f = mul(&x, &y).expect("mul");
        assert_err_contains(f.differentiate(&x, &y), "direction variable 'y'");
        assert_err_contains(f.differentiate(&x, &x), "direction variable 'x'");
        assert_err_contains(
            f.differentiate(&x, &Variable::tensor('D')),
            "direction 'D' is a tensor",
        );
        assert_err_contains(
            f.differentiate(&Variable::tensor('x'), &Variable::tensor('D')),
            "variable 'x' is used both",
        );
    }

    #[test]
    fn repeated_differentiation_of_polynomial() {
        let x = Variable::scalar('x');
        let d = Variable::scalar('d');
        let e = Variable::scalar('e');
        let f = mul(mul(&x, &x).expect("mul"), &x).expect("mul");
        let ddf = f
            .differentiate(&x, &d)
            .expect("derivative")
            .differentiate(&x, &e)
            .expect("second derivative");
        let value = eval_scalar(&ddf, &[x.bind(2.0), d.bind(1.0), e.bind(1.0)]);
        assert!((value - 12.0).abs() < 1e-12);
    }

    #[test]
    fn independent_differentiations_share_a_tree_across_threads() {
        let x = Variable::tensor('X');
        let f = det(unimod(&x).expect("unimod")).expect("det");
        let derivatives: Vec<Expr> = std::thread::scope(|scope| {
            let handles: Vec<_> = ['A', 'B']
                .into_iter()
                .map(|tag| {
                    let f = &f;
                    let x = &x;
                    scope.spawn(move || {
                        f.differentiate(x, &Variable::tensor(tag))
                            .expect("derivative")
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("thread should finish"))
                .collect()
        });
        let a = Variable::tensor('A');
        let b = Variable::tensor('B');
        let (m, dm) = (sample_x(), sample_dx());
        let first = eval_scalar(&derivatives[0], &[x.bind(m), a.bind(dm)]);
        let second = eval_scalar(&derivatives[1], &[x.bind(m), b.bind(dm)]);
        assert_eq!(first, second);
        // det of the unimodular part is constant.
        assert!(first.abs() < 1e-12);
    }

    #[test]
    fn gradient_of_determinant_is_cofactor() {
        let x = Variable::tensor('X');
        let dx = Variable::tensor('D');
        let f = det(&x).expect("det");
        let m = sample_x();
        let grad = gradient(&f, &x, &dx, &[x.bind(m)])
            .expect("gradient")
            .as_tensor()
            .expect("tensor gradient");
        let cofactor = m.try_inverse().expect("invertible").transpose() * m.determinant();
        assert!((grad - cofactor).norm() < 1e-12);
    }

    #[test]
    fn gradient_of_scalar_function() {
        let x = Variable::scalar('x');
        let d = Variable::scalar('d');
        let f = mul(&x, &x).expect("mul");
        assert_eq!(gradient(&f, &x, &d, &[x.bind(3.0)]), Ok(Value::Scalar(6.0)));
    }

    #[test]
    fn gradient_rejects_tensor_expression_and_bound_direction() {
        let x = Variable::tensor('X');
        let d = Variable::tensor('D');
        assert_err_contains(
            gradient(&Expr::from(x), &x, &d, &[]),
            "gradient expects a scalar",
        );
        let f = trace(&x).expect("trace");
        assert_err_contains(
            gradient(&f, &x, &d, &[d.bind(Tensor::identity())]),
            "direction variable 'D'",
        );
    }
}
