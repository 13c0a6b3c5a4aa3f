//! Hyperelastic material models built on the expression engine.
//!
//! Stresses are obtained by differentiating the strain-energy expression
//! symbolically and evaluating the derivative along each basis direction.

use crate::builder::{add, det, mul, sub, trace, transpose, unimod};
use crate::diff::gradient;
use crate::expr::Expr;
use crate::leaf::Variable;
use crate::traits::{Evaluate, Expression};
use crate::value::Tensor;
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Material constants for the compressible Neo-Hookean model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NeoHookeanParams {
    pub shear_modulus: f64,
    pub bulk_modulus: f64,
}

impl Default for NeoHookeanParams {
    fn default() -> Self {
        Self {
            shear_modulus: 1.0,
            bulk_modulus: 10.0,
        }
    }
}

impl NeoHookeanParams {
    fn validate(&self) -> Result<()> {
        if self.shear_modulus < 0.0 {
            bail!("shear_modulus must be non-negative.");
        }
        if self.bulk_modulus < 0.0 {
            bail!("bulk_modulus must be non-negative.");
        }
        Ok(())
    }
}

/// `W(F) = mu/2 (tr((F^T F)^U) - 3) + kappa/2 (det F - 1)^2`
pub fn neo_hookean_energy(params: &NeoHookeanParams, deformation: &Variable) -> Result<Expr> {
    params.validate()?;
    let f = Expr::from(deformation);
    let right_cauchy_green = mul(transpose(&f)?, &f)?;
    let isochoric = sub(trace(unimod(right_cauchy_green)?)?, 3.0)?;
    let dilation = sub(det(&f)?, 1.0)?;
    let volumetric = mul(&dilation, &dilation)?;
    let energy = add(
        mul(0.5 * params.shear_modulus, isochoric)?,
        mul(0.5 * params.bulk_modulus, volumetric)?,
    )?;
    Ok(energy)
}

fn check_deformation(deformation_gradient: &Tensor) -> Result<()> {
    let jacobian = deformation_gradient.determinant();
    if jacobian <= 0.0 {
        bail!(
            "Deformation gradient must have positive determinant (got {}).",
            jacobian
        );
    }
    Ok(())
}

/// Strain energy density at `deformation_gradient`.
pub fn strain_energy(params: &NeoHookeanParams, deformation_gradient: &Tensor) -> Result<f64> {
    check_deformation(deformation_gradient)?;
    let f = Variable::tensor('F');
    let energy = neo_hookean_energy(params, &f)?;
    energy
        .substitute(&[f.bind(*deformation_gradient)])?
        .evaluate()
        .context("Failed to evaluate strain energy.")?
        .as_scalar()
        .ok_or_else(|| anyhow!("Strain energy did not evaluate to a scalar."))
}

/// First Piola-Kirchhoff stress `P = dW/dF`.
pub fn first_piola_kirchhoff(
    params: &NeoHookeanParams,
    deformation_gradient: &Tensor,
) -> Result<Tensor> {
    check_deformation(deformation_gradient)?;
    let f = Variable::tensor('F');
    let h = Variable::tensor('H');
    let energy = neo_hookean_energy(params, &f)?;
    debug!(nodes = energy.node_count(), "assembling first Piola-Kirchhoff stress");

    gradient(&energy, &f, &h, &[f.bind(*deformation_gradient)])
        .context("Failed to differentiate strain energy.")?
        .as_tensor()
        .ok_or_else(|| anyhow!("Stress did not evaluate to a tensor."))
}
