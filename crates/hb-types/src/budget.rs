//! Search budgets, optimizer names with budget multipliers, and the
//! virtual-budget expansion of a recorded trajectory.
//!
//! An optimizer granted `k` times the nominal budget records its trajectory
//! against the multiplied budget. When results are compared, the same run is
//! expanded into `k` curves: dividing positions by `k` gives the real curve,
//! dividing by a smaller speedup gives a virtual curve showing where the run
//! stood after a proportionally smaller share of its budget.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{HbError, HbResult};
use crate::trajectory::{ResampleGrid, Trajectory};

/// Which resource the budget limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetAxis {
    /// Number of configuration evaluations.
    Iterations,
    /// Wall-clock seconds.
    Time,
}

impl BudgetAxis {
    pub fn from_time_based(time_based: bool) -> Self {
        if time_based {
            Self::Time
        } else {
            Self::Iterations
        }
    }

    pub fn is_time_based(self) -> bool {
        matches!(self, Self::Time)
    }
}

impl fmt::Display for BudgetAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iterations => write!(f, "iterations"),
            Self::Time => write!(f, "time"),
        }
    }
}

/// Resource limit for one search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub amount: f64,
    pub axis: BudgetAxis,
}

impl Budget {
    pub fn iterations(count: u64) -> Self {
        Self {
            amount: count as f64,
            axis: BudgetAxis::Iterations,
        }
    }

    pub fn seconds(seconds: f64) -> Self {
        Self {
            amount: seconds,
            axis: BudgetAxis::Time,
        }
    }

    /// The budget an optimizer with `multiplier` actually receives.
    pub fn scaled(&self, multiplier: u32) -> Self {
        Self {
            amount: self.amount * f64::from(multiplier.max(1)),
            axis: self.axis,
        }
    }

    pub fn validate(&self) -> HbResult<()> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(HbError::Config(format!(
                "budget must be positive, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

const MULTIPLIER_MARKER: &str = "_x";

/// Parse the budget multiplier encoded as a trailing `_x<k>` suffix.
/// Only the canonical form `k >= 2` without leading zeros counts; anything
/// else yields 1 and stays part of the base name.
pub fn parse_multiplier(name: &str) -> u32 {
    split_multiplier(name).1
}

fn split_multiplier(name: &str) -> (&str, u32) {
    match suffix_digits(name) {
        Some((base, digits)) if !digits.starts_with('0') => match digits.parse::<u32>() {
            Ok(k) if k >= 2 => (base, k),
            _ => (name, 1),
        },
        _ => (name, 1),
    }
}

/// `(base, digits)` for any trailing `_x<digits>`, canonical or not.
fn suffix_digits(name: &str) -> Option<(&str, &str)> {
    let (base, digits) = name.rsplit_once(MULTIPLIER_MARKER)?;
    (!base.is_empty() && !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .then_some((base, digits))
}

/// Optimizer identity: a base name plus an explicit budget multiplier.
///
/// The on-disk name is `<base>` for multiplier 1 and `<base>_x<k>` otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptimizerName {
    base: String,
    budget_multiplier: u32,
}

impl OptimizerName {
    pub fn new(base: impl Into<String>, budget_multiplier: u32) -> HbResult<Self> {
        let base = base.into();
        if base.is_empty() || base.contains(|c| c == '/' || c == '\\') {
            return Err(HbError::Config(format!("invalid optimizer name {base:?}")));
        }
        if suffix_digits(&base).is_some() {
            return Err(HbError::Config(format!(
                "optimizer name {base} already carries a multiplier suffix"
            )));
        }
        if budget_multiplier == 0 {
            return Err(HbError::Config(format!(
                "budget multiplier for {base} must be at least 1"
            )));
        }
        Ok(Self {
            base,
            budget_multiplier,
        })
    }

    /// Parse a directory name such as `roar_x2`. Displaying the result gives
    /// back `name` unchanged.
    pub fn parse(name: &str) -> Self {
        let (base, budget_multiplier) = split_multiplier(name);
        Self {
            base: base.to_string(),
            budget_multiplier,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn budget_multiplier(&self) -> u32 {
        self.budget_multiplier
    }

    /// Label of the curve reconstructed at `speedup`.
    pub fn variant_label(&self, speedup: u32) -> String {
        if speedup == self.budget_multiplier {
            self.to_string()
        } else {
            format!("{}{MULTIPLIER_MARKER}{speedup}", self.base)
        }
    }
}

impl fmt::Display for OptimizerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.budget_multiplier == 1 {
            write!(f, "{}", self.base)
        } else {
            write!(f, "{}{MULTIPLIER_MARKER}{}", self.base, self.budget_multiplier)
        }
    }
}

/// One resampled curve of a (possibly budget-multiplied) run.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantCurve {
    pub label: String,
    pub speedup: u32,
    /// True for reconstructed curves; only `speedup == multiplier` is real.
    pub is_virtual: bool,
    pub values: Vec<f64>,
}

/// Expand a trajectory recorded under `optimizer`'s multiplier into one curve
/// per speedup `1..=k`.
pub fn expand_virtual_budget(
    trajectory: &Trajectory,
    optimizer: &OptimizerName,
    grid: &ResampleGrid,
) -> Vec<VariantCurve> {
    let multiplier = optimizer.budget_multiplier();
    (1..=multiplier)
        .map(|speedup| VariantCurve {
            label: optimizer.variant_label(speedup),
            speedup,
            is_virtual: speedup != multiplier,
            values: trajectory.resample(grid, speedup),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::Configuration;
    use crate::trajectory::Entry;

    #[test]
    fn test_multiplier_parsing() {
        assert_eq!(parse_multiplier("roar_x2"), 2);
        assert_eq!(parse_multiplier("smac_x10"), 10);
        assert_eq!(parse_multiplier("smac"), 1);
        assert_eq!(parse_multiplier("smac_x"), 1);
        assert_eq!(parse_multiplier("smac_x0"), 1);
        assert_eq!(parse_multiplier("smac_xfast"), 1);
        assert_eq!(parse_multiplier("_x3"), 1);
        assert_eq!(parse_multiplier("my_xgb_x3"), 3);
        assert_eq!(parse_multiplier("smac_x1"), 1);
        assert_eq!(parse_multiplier("smac_x02"), 1);
    }

    #[test]
    fn test_optimizer_name_round_trip() {
        let name = OptimizerName::new("roar", 2).unwrap();
        assert_eq!(name.to_string(), "roar_x2");
        assert_eq!(OptimizerName::parse("roar_x2"), name);
        assert_eq!(OptimizerName::parse("smac").budget_multiplier(), 1);
        assert_eq!(OptimizerName::parse("smac").to_string(), "smac");
        assert!(OptimizerName::new("bad/name", 1).is_err());
        assert!(OptimizerName::new("roar", 0).is_err());
        assert!(OptimizerName::new("roar_x2", 1).is_err());
    }

    #[test]
    fn test_non_canonical_suffixes_keep_their_name() {
        for name in ["opt_x1", "opt_x01", "opt_x02", "opt_x0"] {
            assert!(OptimizerName::new(name, 1).is_err(), "{name} accepted");
            let parsed = OptimizerName::parse(name);
            assert_eq!(parsed.budget_multiplier(), 1);
            assert_eq!(parsed.to_string(), name);
            assert_eq!(parsed.variant_label(1), name);
        }
    }

    #[test]
    fn test_variant_labels() {
        let name = OptimizerName::parse("roar_x3");
        assert_eq!(name.variant_label(1), "roar_x1");
        assert_eq!(name.variant_label(2), "roar_x2");
        assert_eq!(name.variant_label(3), "roar_x3");
    }

    #[test]
    fn test_budget_validation_and_scaling() {
        assert!(Budget::iterations(0).validate().is_err());
        assert!(Budget::seconds(f64::NAN).validate().is_err());
        let budget = Budget::iterations(50);
        budget.validate().unwrap();
        assert_eq!(budget.scaled(2).amount, 100.0);
        assert_eq!(budget.scaled(0).amount, 50.0);
    }

    fn recorded_under_x2() -> Trajectory {
        // a 2x run over a nominal budget of 10 evaluations
        Trajectory::new(vec![
            Entry::new(Configuration::new(), 0.8, 1.0, 0.1, [1]),
            Entry::new(Configuration::new(), 0.5, 6.0, 0.6, [1]),
            Entry::new(Configuration::new(), 0.3, 14.0, 1.4, [1]),
            Entry::new(Configuration::new(), 0.2, 20.0, 2.0, [1]),
        ])
    }

    #[test]
    fn test_expansion_marks_only_the_full_multiplier_as_real() {
        let name = OptimizerName::parse("opt_b_x2");
        let grid = ResampleGrid::new(BudgetAxis::Iterations, 10.0);
        let curves = expand_virtual_budget(&recorded_under_x2(), &name, &grid);

        assert_eq!(curves.len(), 2);
        assert_eq!(curves[0].label, "opt_b_x1");
        assert!(curves[0].is_virtual);
        assert_eq!(curves[1].label, "opt_b_x2");
        assert!(!curves[1].is_virtual);
    }

    #[test]
    fn test_virtual_and_real_curves_agree_at_the_origin() {
        let name = OptimizerName::parse("opt_b_x2");
        let grid = ResampleGrid::new(BudgetAxis::Iterations, 10.0);
        let curves = expand_virtual_budget(&recorded_under_x2(), &name, &grid);
        let (virtual_curve, real_curve) = (&curves[0].values, &curves[1].values);

        assert!(virtual_curve[0].is_nan() && real_curve[0].is_nan());
        // the virtual run only sees evaluations up to the nominal budget
        assert_eq!(virtual_curve[9], 0.5);
        assert_eq!(real_curve[9], 0.3);
        // real curve: 0.5, 3, 7, 10 -> last entry sits exactly on the budget edge
        assert_eq!(real_curve[3], 0.5);
        assert_eq!(real_curve[7], 0.3);
    }

    #[test]
    fn test_unmultiplied_optimizer_yields_one_real_curve() {
        let name = OptimizerName::parse("opt_a");
        let grid = ResampleGrid::new(BudgetAxis::Time, 3.0);
        let curves = expand_virtual_budget(&recorded_under_x2(), &name, &grid);
        assert_eq!(curves.len(), 1);
        assert_eq!(curves[0].label, "opt_a");
        assert!(!curves[0].is_virtual);
    }
}
