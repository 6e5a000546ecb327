//! Agreement statistics between simulated and observed change.
//!
//! Evaluation is restricted to cells that were non-urban at the start --
//! the frozen baseline from the *initial* grid, not the working state --
//! because cells urban from the outset carry no information about the
//! allocator's choices. Over that population the simulated end state is
//! compared to the observed future state on the 0/1 urban indicator.
//!
//! All five scores derive from one [`ConfusionCounts`] pass, so they are
//! mutually consistent by construction: five independent sweeps could
//! disagree after state changes, a single count table cannot.

use serde::{Deserialize, Serialize};
use sprawl_types::is_urban;

use crate::state::LandCoverState;

/// Confusion counts over the initially-non-urban cell population.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    /// Simulated urban, observed urban.
    pub true_positive: usize,
    /// Simulated urban, observed non-urban.
    pub false_positive: usize,
    /// Simulated non-urban, observed urban.
    pub false_negative: usize,
    /// Simulated non-urban, observed non-urban.
    pub true_negative: usize,
}

impl ConfusionCounts {
    /// Count agreement over the initially-non-urban cells of a state.
    pub fn from_state(state: &LandCoverState) -> Self {
        let current = state.current().values();
        let observed = state.observed_future().values();

        let mut counts = Self::default();
        for idx in state.non_urban_at_start().iter_ones() {
            let simulated = current.get(idx).copied().map(is_urban).unwrap_or(false);
            let actual = observed.get(idx).copied().map(is_urban).unwrap_or(false);
            match (simulated, actual) {
                (true, true) => counts.true_positive = counts.true_positive.saturating_add(1),
                (true, false) => counts.false_positive = counts.false_positive.saturating_add(1),
                (false, true) => counts.false_negative = counts.false_negative.saturating_add(1),
                (false, false) => counts.true_negative = counts.true_negative.saturating_add(1),
            }
        }
        counts
    }

    /// Total population size.
    pub const fn total(&self) -> usize {
        self.true_positive
            .saturating_add(self.false_positive)
            .saturating_add(self.false_negative)
            .saturating_add(self.true_negative)
    }
}

/// Agreement scores derived from one confusion table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgreementReport {
    /// `TP / (TP + FP)`; 0 when nothing was simulated urban.
    pub precision: f64,
    /// `TP / (TP + FN)`; 0 when nothing was observed urban.
    pub recall: f64,
    /// Harmonic mean of precision and recall; 0 when both are 0.
    pub f1: f64,
    /// Intersection over union of the urban indicators:
    /// `TP / (TP + FP + FN)`.
    pub iou: f64,
    /// Cohen's kappa: agreement beyond chance; 0 when chance agreement
    /// saturates.
    pub kappa: f64,
    /// The counts the scores were derived from.
    pub counts: ConfusionCounts,
}

impl AgreementReport {
    /// Derive all scores from one confusion table.
    pub fn from_counts(counts: ConfusionCounts) -> Self {
        let tp = counts.true_positive;
        let fp = counts.false_positive;
        let fn_count = counts.false_negative;
        let tn = counts.true_negative;

        let precision = ratio(tp, tp.saturating_add(fp));
        let recall = ratio(tp, tp.saturating_add(fn_count));
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        let iou = ratio(tp, tp.saturating_add(fp).saturating_add(fn_count));

        let total = counts.total();
        let kappa = if total == 0 {
            0.0
        } else {
            let n = to_f64(total);
            let observed = (to_f64(tp) + to_f64(tn)) / n;
            let simulated_urban = to_f64(tp.saturating_add(fp));
            let actual_urban = to_f64(tp.saturating_add(fn_count));
            let simulated_other = to_f64(fn_count.saturating_add(tn));
            let actual_other = to_f64(fp.saturating_add(tn));
            let chance =
                (simulated_urban * actual_urban + simulated_other * actual_other) / (n * n);
            if (1.0 - chance).abs() < f64::EPSILON {
                0.0
            } else {
                (observed - chance) / (1.0 - chance)
            }
        };

        Self {
            precision,
            recall,
            f1,
            iou,
            kappa,
            counts,
        }
    }
}

/// Evaluate the final state of a run against the observed future.
pub fn evaluate(state: &LandCoverState) -> AgreementReport {
    AgreementReport::from_counts(ConfusionCounts::from_state(state))
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        to_f64(numerator) / to_f64(denominator)
    }
}

// Counts are bounded by the cell count; safe to represent as f64.
#[allow(clippy::cast_precision_loss)]
fn to_f64(count: usize) -> f64 {
    count as f64
}
