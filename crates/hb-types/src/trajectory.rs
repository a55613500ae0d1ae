//! Incumbent trajectories and their resampling onto a comparison grid.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::budget::BudgetAxis;
use crate::space::Configuration;

/// One incumbent-update event in a search trajectory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    #[serde(rename = "conf")]
    pub configuration: Configuration,
    /// Validation loss, lower is better.
    pub loss: f64,
    /// Evaluations consumed when this incumbent became current.
    pub at_iteration: f64,
    /// Wall-clock seconds elapsed when this incumbent became current.
    pub at_time: f64,
    /// Seeds under which this configuration was evaluated during search.
    pub seeds: BTreeSet<u64>,
}

impl Entry {
    pub fn new(
        configuration: Configuration,
        loss: f64,
        at_iteration: f64,
        at_time: f64,
        seeds: impl IntoIterator<Item = u64>,
    ) -> Self {
        Self {
            configuration,
            loss,
            at_iteration,
            at_time,
            seeds: seeds.into_iter().collect(),
        }
    }

    /// Position of this entry on the given budget axis.
    pub fn position(&self, axis: BudgetAxis) -> f64 {
        match axis {
            BudgetAxis::Iterations => self.at_iteration,
            BudgetAxis::Time => self.at_time,
        }
    }

    /// Same entry with a replaced loss.
    pub fn with_loss(&self, loss: f64) -> Self {
        Self {
            loss,
            ..self.clone()
        }
    }
}

// Wall-clock time depends on the machine, so it takes no part in equality.
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.configuration == other.configuration
            && self.loss == other.loss
            && self.at_iteration == other.at_iteration
            && self.seeds == other.seeds
    }
}

/// A fixed comparison grid `0, step, 2*step, ..` below `max_budget`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResampleGrid {
    pub axis: BudgetAxis,
    pub max_budget: f64,
    pub step_size: f64,
}

impl ResampleGrid {
    pub fn new(axis: BudgetAxis, max_budget: f64) -> Self {
        Self {
            axis,
            max_budget,
            step_size: 1.0,
        }
    }

    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        if !(self.max_budget > 0.0) || !(self.step_size > 0.0) {
            return 0;
        }
        (self.max_budget / self.step_size - SNAP).ceil().max(0.0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First grid index whose budget point is at or after `position`.
    fn bucket(&self, position: f64) -> usize {
        (position / self.step_size - SNAP).ceil().max(0.0) as usize
    }
}

/// Absorbs float noise such as `0.3 / 0.1 = 3.0000000000000004`.
const SNAP: f64 = 1e-9;

/// Ordered sequence of incumbent updates for one run and stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trajectory {
    entries: Vec<Entry>,
}

impl Trajectory {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Entry> {
        self.entries.last()
    }

    /// Entries are ordered by non-decreasing iteration and time.
    pub fn is_sorted(&self) -> bool {
        self.entries
            .windows(2)
            .all(|w| w[0].at_iteration <= w[1].at_iteration && w[0].at_time <= w[1].at_time)
    }

    /// Largest recorded position on `axis`, if any.
    pub fn max_position(&self, axis: BudgetAxis) -> Option<f64> {
        self.entries
            .iter()
            .map(|e| e.position(axis))
            .fold(None, |acc, p| Some(acc.map_or(p, |a: f64| a.max(p))))
    }

    /// Same iteration/time axis, losses replaced one-for-one.
    pub fn with_losses(&self, losses: &[f64]) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .zip(losses)
                .map(|(entry, loss)| entry.with_loss(*loss))
                .collect(),
        }
    }

    /// Loss of the latest incumbent known at or before each grid point, with
    /// positions divided by `speedup`. Points before the first incumbent stay
    /// `NaN`. Resampling stops at the first entry past `max_budget`.
    pub fn resample(&self, grid: &ResampleGrid, speedup: u32) -> Vec<f64> {
        let len = grid.len();
        let mut y = vec![f64::NAN; len];
        let speedup = f64::from(speedup.max(1));

        for entry in &self.entries {
            let position = entry.position(grid.axis) / speedup;
            if position > grid.max_budget {
                break;
            }
            let start = grid.bucket(position).min(len);
            for value in &mut y[start..] {
                *value = entry.loss;
            }
        }
        y
    }
}

impl FromIterator<Entry> for Trajectory {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
