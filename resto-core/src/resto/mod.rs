//! Feasibility restoration: elastic problem construction, per-attempt
//! option derivation, outcome taxonomy, multiplier recovery, and the
//! controller tying them together.

use thiserror::Error;

use crate::options::OptionsError;
use crate::vector::LayoutError;

pub mod adapter;
pub mod controller;
pub mod mult_step;
pub mod options_override;
pub mod outcome;

pub use adapter::{build_restoration_setup, RestoNlp, RestoSetup};
pub use controller::{RestorationPhase, RestorationSettings};
pub use mult_step::{bound_multiplier_step, step_scaled};
pub use options_override::{derive_options, BudgetError, DeriveInputs};
pub use outcome::{classify, ClassifyMetrics, ClassifyThresholds, Outcome};

/// Option-name prefix of the nested restoration run.
pub const RESTO_PREFIX: &str = "resto.";

/// Programming-error conditions of a restoration attempt. Expected failure
/// modes are [`Outcome`] tags, not errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RestorationError {
    #[error("restoration vector layout: {0}")]
    Layout(#[from] LayoutError),

    #[error("restoration options: {0}")]
    Options(#[from] OptionsError),
}
