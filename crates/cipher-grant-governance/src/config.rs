//! Governance parameters.

use crate::error::GovernanceError;
use serde::{Deserialize, Serialize};

/// Tunables for voting and proposal validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Minimum share of eligible weight that must vote (0.0 - 1.0)
    pub default_quorum: f64,
    /// Share of decisive weight that must approve (0.0 - 1.0)
    pub default_approval_threshold: f64,
    /// Maximum title length in characters
    pub max_title_len: usize,
    /// Maximum researcher name length in characters
    pub max_researcher_len: usize,
    /// Maximum description length in characters
    pub max_description_len: usize,
    /// Maximum vote comment length in characters
    pub max_comment_len: usize,
    /// Longest allowed research duration
    pub max_duration_months: u32,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            default_quorum: 0.04,
            default_approval_threshold: 0.5,
            max_title_len: 200,
            max_researcher_len: 120,
            max_description_len: 10_000,
            max_comment_len: 2_000,
            max_duration_months: 120,
        }
    }
}

impl GovernanceConfig {
    pub fn validate(&self) -> Result<(), GovernanceError> {
        check_ratio("default_quorum", self.default_quorum)?;
        check_ratio("default_approval_threshold", self.default_approval_threshold)?;

        if self.max_title_len == 0 || self.max_researcher_len == 0 || self.max_description_len == 0 {
            return Err(GovernanceError::InvalidParameter(
                "text length limits must be positive".to_string(),
            ));
        }
        if self.max_duration_months == 0 {
            return Err(GovernanceError::InvalidParameter(
                "max_duration_months must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Check that `value` is a finite ratio in `[0, 1]`.
pub(crate) fn check_ratio(name: &str, value: f64) -> Result<(), GovernanceError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(GovernanceError::Validation(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}
