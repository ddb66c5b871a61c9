use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

/// Parameters of the layout pipeline.
///
/// Every field has a default, so partial configurations deserialize cleanly:
///
/// ```
/// use chemdepict::LayoutOptions;
///
/// let opts = LayoutOptions {
///     bond_length: 25.0,
///     ..LayoutOptions::default()
/// };
/// assert!(opts.validate().is_ok());
/// assert_eq!(opts.force_layout.max_inner_iterations, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Length of every drawn bond. Base unit for all distances and springs.
    pub bond_length: f64,
    /// Draw hydrogens bonded to a single heavy atom as separate vertices.
    pub explicit_hydrogens: bool,
    /// Per-vertex overlap score above which a vertex counts as colliding.
    pub overlap_sensitivity: f64,
    /// Number of passes over the rotatable bonds.
    pub overlap_resolution_iterations: usize,
    /// Maximum number of trial rotations the overlap resolver may evaluate.
    pub overlap_max_steps: usize,
    /// Wall-clock budget of the overlap resolver in milliseconds.
    pub overlap_time_budget_ms: u64,
    /// Angular increment of the secondary pass, in degrees.
    pub secondary_rotation_step_deg: f64,
    /// Number of increments tried on each side by the secondary pass.
    pub secondary_rotation_increments: usize,
    pub force_layout: ForceLayoutOptions,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            bond_length: 30.0,
            explicit_hydrogens: false,
            overlap_sensitivity: 0.42,
            overlap_resolution_iterations: 1,
            overlap_max_steps: 10_000,
            overlap_time_budget_ms: 2_000,
            secondary_rotation_step_deg: 20.0,
            secondary_rotation_increments: 3,
            force_layout: ForceLayoutOptions::default(),
        }
    }
}

impl LayoutOptions {
    pub fn overlap_time_budget(&self) -> Duration {
        Duration::from_millis(self.overlap_time_budget_ms)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if !self.bond_length.is_finite() || self.bond_length <= 0.0 {
            return Err(LayoutError::invalid_option(
                "bond_length",
                format!("must be a positive finite number, got {}", self.bond_length),
            ));
        }
        if !self.overlap_sensitivity.is_finite() || self.overlap_sensitivity < 0.0 {
            return Err(LayoutError::invalid_option(
                "overlap_sensitivity",
                format!("must be non-negative, got {}", self.overlap_sensitivity),
            ));
        }
        if !self.secondary_rotation_step_deg.is_finite() {
            return Err(LayoutError::invalid_option(
                "secondary_rotation_step_deg",
                "must be finite",
            ));
        }
        self.force_layout.validate()
    }
}

/// Thresholds and iteration caps of the Kamada–Kawai solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceLayoutOptions {
    /// Stop selecting vertices once the largest residual force is below this.
    pub threshold: f64,
    /// Stop moving the selected vertex once its residual force is below this.
    pub inner_threshold: f64,
    pub max_iterations: usize,
    pub max_inner_iterations: usize,
}

impl Default for ForceLayoutOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            inner_threshold: 0.1,
            max_iterations: 20_000,
            max_inner_iterations: 50,
        }
    }
}

impl ForceLayoutOptions {
    pub fn validate(&self) -> Result<(), LayoutError> {
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(LayoutError::invalid_option(
                "force_layout.threshold",
                format!("must be positive, got {}", self.threshold),
            ));
        }
        if !(self.inner_threshold.is_finite() && self.inner_threshold > 0.0) {
            return Err(LayoutError::invalid_option(
                "force_layout.inner_threshold",
                format!("must be positive, got {}", self.inner_threshold),
            ));
        }
        Ok(())
    }
}
