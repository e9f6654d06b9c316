use serde::{Deserialize, Serialize};

use crate::layout::InnerOrder;

/// How two element values are judged equal in `compare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tolerance {
    /// `|a - b| <= epsilon`.
    #[default]
    Absolute,
    /// Exact matches pass; otherwise epsilon is scaled by `|reference|`
    /// when that exceeds one, then compared as `Absolute`.
    Scaled,
}

impl Tolerance {
    pub fn within(self, val: f64, reference: f64, epsilon: f64) -> bool {
        if val == reference {
            return true;
        }
        let eps = match self {
            Tolerance::Absolute => epsilon,
            Tolerance::Scaled if reference.abs() > 1.0 => (reference * epsilon).abs(),
            Tolerance::Scaled => epsilon,
        };
        (val - reference).abs() <= eps
    }
}

/// Engine-wide settings, resolved once by the host and passed in explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub inner_order: InnerOrder,
    pub tolerance: Tolerance,
}

impl EngineConfig {
    pub fn with_inner_order(mut self, order: InnerOrder) -> Self {
        self.inner_order = order;
        self
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }
}
