use crate::value::{Tensor, Value};
use serde::{Deserialize, Serialize};

/// Controls how constants are printed by `render_with`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Digits after the decimal point for every printed number.
    pub precision: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self { precision: 6 }
    }
}

pub fn format_value(value: &Value, settings: &RenderSettings) -> String {
    match value {
        Value::Scalar(v) => format_scalar(*v, settings),
        Value::Tensor(m) => format_tensor(m, settings),
    }
}

fn format_scalar(v: f64, settings: &RenderSettings) -> String {
    format!("{:.*}", settings.precision, v)
}

// Row-major: [[a00,a01,a02],[a10,a11,a12],[a20,a21,a22]]
fn format_tensor(m: &Tensor, settings: &RenderSettings) -> String {
    let rows: Vec<String> = (0..3)
        .map(|i| {
            let row: Vec<String> = (0..3).map(|j| format_scalar(m[(i, j)], settings)).collect();
            format!("[{}]", row.join(","))
        })
        .collect();
    format!("[{}]", rows.join(","))
}
