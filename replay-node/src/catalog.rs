//! The scored replay sequence, built once at startup and shared read-only by
//! every stream session.

use std::sync::Arc;
use tracing::info;

use flowguard_common::{Label, PredictionEvent};

use crate::config::ReplayConfig;
use crate::dataset::{self, FeatureMatrix};
use crate::error::{ReplayError, Result};
use crate::inference::{InferenceEngine, ScoringSummary};

/// Immutable, cheaply cloneable sequence of prediction events
#[derive(Debug, Clone)]
pub struct EventCatalog {
    events: Arc<[PredictionEvent]>,
    summary: Arc<ScoringSummary>,
}

impl EventCatalog {
    /// Load the configured dataset and model, score every record once and build the catalog
    pub fn prepare(config: &ReplayConfig) -> Result<Self> {
        let matrix = dataset::load(&config.dataset)?;
        let engine = InferenceEngine::load(&config.model.path)?;
        let predictions = engine.score(&matrix)?;
        let catalog = Self::build(&matrix, &predictions)?;

        let summary = catalog.summary();
        info!(
            events = summary.total,
            predicted_benign = summary.predicted_benign,
            predicted_attack = summary.predicted_attack,
            accuracy = summary.accuracy,
            "Replay sequence scored"
        );

        Ok(catalog)
    }

    /// Pair every record with its prediction, in row order
    pub fn build(matrix: &FeatureMatrix, predictions: &[Label]) -> Result<Self> {
        if predictions.len() != matrix.len() {
            return Err(ReplayError::InvalidState(format!(
                "{} predictions for {} records",
                predictions.len(),
                matrix.len()
            )));
        }

        let events: Arc<[PredictionEvent]> = matrix
            .records
            .iter()
            .zip(predictions)
            .enumerate()
            .map(|(index, (features, prediction))| PredictionEvent {
                index: index as u64,
                features: *features,
                prediction: *prediction,
            })
            .collect();

        let summary = ScoringSummary::compute(predictions, &matrix.labels);

        Ok(Self {
            events,
            summary: Arc::new(summary),
        })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PredictionEvent> {
        self.events.get(index)
    }

    pub fn events(&self) -> &[PredictionEvent] {
        &self.events
    }

    pub fn summary(&self) -> &ScoringSummary {
        &self.summary
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flowguard_common::{FeatureRecord, FEATURE_COUNT};

    pub(crate) fn catalog_of(predictions: &[Label]) -> EventCatalog {
        let records = (0..predictions.len())
            .map(|i| FeatureRecord::from_values(&[i as f64; FEATURE_COUNT]).unwrap())
            .collect();
        let matrix = FeatureMatrix::from_records(records, predictions.to_vec()).unwrap();
        EventCatalog::build(&matrix, predictions).unwrap()
    }

    #[test]
    fn test_events_follow_row_order() {
        let catalog = catalog_of(&[Label::Benign, Label::Attack, Label::Benign]);
        assert_eq!(catalog.len(), 3);
        for (i, event) in catalog.events().iter().enumerate() {
            assert_eq!(event.index, i as u64);
            assert_eq!(event.features.average_packet_size, i as f64);
        }
        assert_eq!(catalog.get(1).unwrap().prediction, Label::Attack);
        assert!(catalog.get(3).is_none());
        assert_eq!(catalog.summary().accuracy, 1.0);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let records = vec![FeatureRecord::from_values(&[1.0; FEATURE_COUNT]).unwrap()];
        let matrix = FeatureMatrix::from_records(records, vec![Label::Benign]).unwrap();
        assert!(EventCatalog::build(&matrix, &[]).is_err());
    }

    #[test]
    fn test_clones_share_storage() {
        let catalog = catalog_of(&[Label::Attack]);
        let clone = catalog.clone();
        assert!(std::ptr::eq(catalog.events(), clone.events()));
    }
}
