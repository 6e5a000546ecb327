//! Built-in logistic oracle.
//!
//! A weighted logistic combination of the normalized driver factors,
//! configured with a per-factor weight table and an intercept. It exists to
//! make the engine runnable end-to-end without an external predictive
//! backend, and doubles as proof that the oracle contract is a capability
//! set, not a model family: any per-tile probability source fits.

use sprawl_core::{FeatureBatch, OracleError, UrbanizationOracle};
use sprawl_core::config::OracleConfig;
use sprawl_types::FactorId;
use tracing::warn;

/// A logistic classifier over the factor feature vector.
#[derive(Debug, Clone)]
pub struct LogisticOracle {
    /// Intercept of the linear combination.
    bias: f32,
    /// Weights aligned to the stack's ascending factor-id order.
    weights: Vec<f32>,
}

impl LogisticOracle {
    /// Build the oracle from configuration, aligning weights to the
    /// stack's canonical factor order. Factors without a configured weight
    /// weigh zero; configured weights naming no stack factor are ignored
    /// with a warning.
    pub fn from_config(config: &OracleConfig, factor_ids: &[FactorId]) -> Self {
        for &id in config.weights.keys() {
            if !factor_ids.contains(&FactorId::new(id)) {
                warn!(factor = id, "oracle weight names no configured factor, ignoring");
            }
        }
        let weights = factor_ids
            .iter()
            .map(|id| {
                config
                    .weights
                    .get(&id.into_inner())
                    .copied()
                    .unwrap_or(0.0)
            })
            .collect();
        Self {
            bias: config.bias,
            weights,
        }
    }
}

impl UrbanizationOracle for LogisticOracle {
    fn predict(&self, batch: &FeatureBatch) -> Result<Vec<f32>, OracleError> {
        if batch.factor_count != self.weights.len() {
            return Err(OracleError::Backend {
                message: format!(
                    "feature width {} does not match {} configured weights",
                    batch.factor_count,
                    self.weights.len()
                ),
            });
        }
        Ok(batch
            .features
            .chunks(batch.factor_count.max(1))
            .map(|cell| {
                let score = self
                    .weights
                    .iter()
                    .zip(cell.iter())
                    .fold(self.bias, |acc, (&w, &f)| acc + w * f);
                1.0 / (1.0 + (-score).exp())
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeMap;

    use sprawl_types::TileRect;

    use super::*;

    fn ids(raw: &[u16]) -> Vec<FactorId> {
        raw.iter().copied().map(FactorId::new).collect()
    }

    #[test]
    fn zero_weights_give_the_sigmoid_midpoint() {
        let oracle = LogisticOracle::from_config(&OracleConfig::default(), &ids(&[1, 2]));
        let batch = FeatureBatch {
            features: vec![0.3, 0.9, 0.1, 0.4],
            factor_count: 2,
            tile: TileRect::new(0, 0, 1, 2),
        };
        let surface = oracle.predict(&batch).unwrap();
        assert_eq!(surface.len(), 2);
        assert!(surface.iter().all(|p| (p - 0.5).abs() < 1e-6));
    }

    #[test]
    fn positive_weight_makes_likelihood_increase_with_the_factor() {
        let mut weights = BTreeMap::new();
        weights.insert(1, 3.0);
        let config = OracleConfig { bias: -1.5, weights };
        let oracle = LogisticOracle::from_config(&config, &ids(&[1]));

        let batch = FeatureBatch {
            features: vec![0.0, 0.5, 1.0],
            factor_count: 1,
            tile: TileRect::new(0, 0, 1, 3),
        };
        let surface = oracle.predict(&batch).unwrap();
        assert!(surface[0] < surface[1]);
        assert!(surface[1] < surface[2]);
        // Midpoint: bias + 3 * 0.5 = 0 -> 0.5.
        assert!((surface[1] - 0.5).abs() < 1e-6);
        // Everything stays a probability.
        assert!(surface.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn mismatched_feature_width_is_a_backend_error() {
        let oracle = LogisticOracle::from_config(&OracleConfig::default(), &ids(&[1, 2]));
        let batch = FeatureBatch {
            features: vec![0.1; 3],
            factor_count: 3,
            tile: TileRect::new(0, 0, 1, 1),
        };
        assert!(oracle.predict(&batch).is_err());
    }
}
