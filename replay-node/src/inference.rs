// Inference Engine
//
// Scores the whole feature matrix once at startup. The classifier sits behind
// the `Classifier` trait so the engine does not care which model produced the
// class probabilities; `LstmClassifier` evaluates the exported sequence model.
//
// Every record is a sequence of exactly one timestep, so the LSTM runs with a
// zero initial state and the recurrent kernel never contributes.

use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use flowguard_common::Label;

use crate::dataset::FeatureMatrix;
use crate::error::{ModelError, ReplayError, Result};

/// Number of output classes (benign, attack)
pub const CLASS_COUNT: usize = 2;

/// Artifact format understood by `LstmClassifier`
pub const LSTM_FORMAT: &str = "lstm-dense-v1";

/// A trained binary classifier
pub trait Classifier: Send + Sync {
    /// Human-readable model name (for logs)
    fn name(&self) -> &str;

    /// Number of features per record the model was trained on
    fn input_width(&self) -> usize;

    /// Class probabilities for every row of `batch` (N x CLASS_COUNT)
    fn predict_proba(&self, batch: ArrayView2<'_, f64>) -> std::result::Result<Array2<f64>, ModelError>;
}

/// Dense layer activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Softmax,
}

/// Serialized LSTM layer weights (Keras layout, gate order i, f, c, o)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmLayerSpec {
    pub units: usize,
    /// input_width x 4*units
    pub kernel: Vec<Vec<f64>>,
    /// units x 4*units (unused for single-timestep input, validated when present)
    #[serde(default)]
    pub recurrent_kernel: Option<Vec<Vec<f64>>>,
    /// 4*units
    pub bias: Vec<f64>,
}

/// Serialized dense layer weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayerSpec {
    /// inputs x outputs
    pub kernel: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    pub activation: Activation,
}

/// On-disk model artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format: String,
    #[serde(default = "default_model_name")]
    pub name: String,
    pub input_width: usize,
    pub lstm: LstmLayerSpec,
    pub dense: Vec<DenseLayerSpec>,
}

fn default_model_name() -> String {
    "lstm_model".to_string()
}

#[derive(Debug, Clone)]
struct DenseLayer {
    kernel: Array2<f64>,
    bias: Array1<f64>,
    activation: Activation,
}

/// Single-layer LSTM followed by a dense head, evaluated with ndarray
#[derive(Debug, Clone)]
pub struct LstmClassifier {
    name: String,
    input_width: usize,
    units: usize,
    kernel: Array2<f64>,
    bias: Array1<f64>,
    dense: Vec<DenseLayer>,
}

fn shape_error(tensor: impl Into<String>, expected: String, got: String) -> ModelError {
    ModelError::Shape {
        tensor: tensor.into(),
        expected,
        got,
    }
}

/// Convert nested rows into a matrix, checking the expected shape
fn to_matrix(
    tensor: &str,
    rows: &[Vec<f64>],
    expected_rows: usize,
    expected_cols: usize,
) -> std::result::Result<Array2<f64>, ModelError> {
    let expected = format!("{expected_rows}x{expected_cols}");
    if rows.len() != expected_rows {
        return Err(shape_error(tensor, expected, format!("{} rows", rows.len())));
    }
    if let Some(bad) = rows.iter().find(|r| r.len() != expected_cols) {
        return Err(shape_error(tensor, expected, format!("row of {}", bad.len())));
    }

    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((expected_rows, expected_cols), flat)
        .map_err(|e| shape_error(tensor, format!("{expected_rows}x{expected_cols}"), e.to_string()))
}

fn to_vector(
    tensor: &str,
    values: &[f64],
    expected: usize,
) -> std::result::Result<Array1<f64>, ModelError> {
    if values.len() != expected {
        return Err(shape_error(tensor, expected.to_string(), values.len().to_string()));
    }
    Ok(Array1::from(values.to_vec()))
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Row-wise softmax, shifted by the row max for stability
fn softmax_rows(mut z: Array2<f64>) -> Array2<f64> {
    for mut row in z.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
    z
}

impl LstmClassifier {
    /// Build from a parsed artifact, validating every tensor shape
    pub fn from_artifact(artifact: ModelArtifact) -> std::result::Result<Self, ModelError> {
        if artifact.format != LSTM_FORMAT {
            return Err(ModelError::UnsupportedFormat(artifact.format));
        }

        let units = artifact.lstm.units;
        if units == 0 {
            return Err(shape_error("lstm.units", ">0".to_string(), "0".to_string()));
        }
        let gates = 4 * units;
        let kernel = to_matrix("lstm.kernel", &artifact.lstm.kernel, artifact.input_width, gates)?;
        let bias = to_vector("lstm.bias", &artifact.lstm.bias, gates)?;
        if let Some(recurrent) = &artifact.lstm.recurrent_kernel {
            to_matrix("lstm.recurrent_kernel", recurrent, units, gates)?;
        }

        if artifact.dense.is_empty() {
            return Err(shape_error("dense", "at least one layer".to_string(), "0".to_string()));
        }

        let mut dense = Vec::with_capacity(artifact.dense.len());
        let mut width = units;
        for (i, layer) in artifact.dense.iter().enumerate() {
            let outputs = layer.bias.len();
            let kernel = to_matrix(&format!("dense[{i}].kernel"), &layer.kernel, width, outputs)?;
            let bias = to_vector(&format!("dense[{i}].bias"), &layer.bias, outputs)?;
            dense.push(DenseLayer {
                kernel,
                bias,
                activation: layer.activation,
            });
            width = outputs;
        }

        if width != CLASS_COUNT {
            return Err(shape_error(
                "output",
                format!("{CLASS_COUNT} classes"),
                format!("{width} classes"),
            ));
        }

        Ok(Self {
            name: artifact.name,
            input_width: artifact.input_width,
            units,
            kernel,
            bias,
            dense,
        })
    }

    /// Load a JSON model artifact from disk
    pub fn from_file(path: &Path) -> std::result::Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path)?;
        let artifact: ModelArtifact = serde_json::from_str(&raw)?;
        Self::from_artifact(artifact)
    }

    /// Hidden state after one timestep from zero state
    fn lstm_step(&self, batch: ArrayView2<'_, f64>) -> Array2<f64> {
        let h = self.units;
        let z = batch.dot(&self.kernel) + &self.bias;

        let input_gate = z.slice(s![.., 0..h]).mapv(sigmoid);
        let candidate = z.slice(s![.., 2 * h..3 * h]).mapv(f64::tanh);
        let output_gate = z.slice(s![.., 3 * h..4 * h]).mapv(sigmoid);

        // Forget gate multiplies the zero initial cell state
        let cell = input_gate * candidate;
        output_gate * cell.mapv(f64::tanh)
    }
}

impl Classifier for LstmClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_width(&self) -> usize {
        self.input_width
    }

    fn predict_proba(&self, batch: ArrayView2<'_, f64>) -> std::result::Result<Array2<f64>, ModelError> {
        if batch.ncols() != self.input_width {
            return Err(shape_error(
                "input",
                format!("{} features", self.input_width),
                format!("{} features", batch.ncols()),
            ));
        }

        let mut activations = self.lstm_step(batch);
        for layer in &self.dense {
            let z = activations.dot(&layer.kernel) + &layer.bias;
            activations = match layer.activation {
                Activation::Linear => z,
                Activation::Relu => z.mapv(|v| v.max(0.0)),
                Activation::Sigmoid => z.mapv(sigmoid),
                Activation::Softmax => softmax_rows(z),
            };
        }
        Ok(activations)
    }
}

/// Predicted-label statistics for the scored dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoringSummary {
    pub total: usize,
    pub predicted_benign: usize,
    pub predicted_attack: usize,
    pub actual_attack: usize,
    /// Fraction of predictions matching ground truth (0.0 - 1.0)
    pub accuracy: f64,
}

impl ScoringSummary {
    pub fn compute(predictions: &[Label], actual: &[Label]) -> Self {
        let total = predictions.len();
        let predicted_attack = predictions.iter().filter(|l| **l == Label::Attack).count();
        let actual_attack = actual.iter().filter(|l| **l == Label::Attack).count();
        let correct = predictions
            .iter()
            .zip(actual)
            .filter(|(p, a)| p == a)
            .count();

        Self {
            total,
            predicted_benign: total - predicted_attack,
            predicted_attack,
            actual_attack,
            accuracy: if total > 0 {
                correct as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

/// Highest-probability class; ties resolve to the lower class index
fn argmax(row: ndarray::ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    for (i, &p) in row.iter().enumerate().skip(1) {
        if p > row[best] {
            best = i;
        }
    }
    best
}

/// Batch scorer over a loaded classifier
pub struct InferenceEngine {
    classifier: Box<dyn Classifier>,
}

impl std::fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("classifier", &self.classifier.name())
            .field("input_width", &self.classifier.input_width())
            .finish()
    }
}

impl InferenceEngine {
    pub fn new(classifier: impl Classifier + 'static) -> Self {
        Self {
            classifier: Box::new(classifier),
        }
    }

    /// Load the LSTM artifact at `path`
    pub fn load(path: &Path) -> Result<Self> {
        info!(path = %path.display(), "Loading model artifact");
        let classifier = LstmClassifier::from_file(path)?;
        info!(
            model = classifier.name(),
            input_width = classifier.input_width(),
            "Model loaded"
        );
        Ok(Self::new(classifier))
    }

    pub fn input_width(&self) -> usize {
        self.classifier.input_width()
    }

    /// Score every row of the matrix in one pass, returning labels in row order
    pub fn score(&self, matrix: &FeatureMatrix) -> Result<Vec<Label>> {
        self.score_batch(matrix.scaled.view())
    }

    pub fn score_batch(&self, batch: ArrayView2<'_, f64>) -> Result<Vec<Label>> {
        let expected = self.classifier.input_width();
        if batch.ncols() != expected {
            return Err(ReplayError::ArityMismatch {
                expected,
                got: batch.ncols(),
            });
        }

        let started = Instant::now();
        let probabilities = self.classifier.predict_proba(batch)?;
        if probabilities.dim() != (batch.nrows(), CLASS_COUNT) {
            return Err(ModelError::Output(format!(
                "expected {}x{}, got {}x{}",
                batch.nrows(),
                CLASS_COUNT,
                probabilities.nrows(),
                probabilities.ncols()
            ))
            .into());
        }

        let labels = probabilities
            .axis_iter(Axis(0))
            .map(|row| Label::from_class_index(argmax(row)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(
            rows = labels.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Batch scored"
        );

        Ok(labels)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::array;

    /// Artifact whose attack logit follows the sign of the first feature
    pub(crate) fn sign_of_first_feature_artifact(input_width: usize) -> ModelArtifact {
        let units = 1;
        // Large input and candidate weights saturate the gates so h ~= tanh(tanh(x0 * 10))
        let mut kernel = vec![vec![0.0; 4 * units]; input_width];
        kernel[0] = vec![0.0, 0.0, 10.0, 0.0];
        ModelArtifact {
            format: LSTM_FORMAT.to_string(),
            name: "sign-test".to_string(),
            input_width,
            lstm: LstmLayerSpec {
                units,
                kernel,
                recurrent_kernel: Some(vec![vec![0.0; 4 * units]; units]),
                // i and o gates forced open
                bias: vec![20.0, 0.0, 0.0, 20.0],
            },
            dense: vec![DenseLayerSpec {
                kernel: vec![vec![-5.0, 5.0]],
                bias: vec![0.0, 0.0],
                activation: Activation::Softmax,
            }],
        }
    }

    #[test]
    fn test_lstm_follows_sign_of_first_feature() {
        let classifier = LstmClassifier::from_artifact(sign_of_first_feature_artifact(3)).unwrap();
        let batch = array![[2.0, 0.0, 0.0], [-2.0, 9.0, 9.0]];
        let proba = classifier.predict_proba(batch.view()).unwrap();

        assert_eq!(proba.dim(), (2, 2));
        assert!(proba[[0, 1]] > 0.99);
        assert!(proba[[1, 0]] > 0.99);
        for row in proba.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_shape_validation() {
        let mut artifact = sign_of_first_feature_artifact(3);
        artifact.lstm.bias.pop();
        assert!(matches!(
            LstmClassifier::from_artifact(artifact),
            Err(ModelError::Shape { .. })
        ));

        let mut artifact = sign_of_first_feature_artifact(3);
        artifact.dense[0].kernel = vec![vec![1.0, 1.0, 1.0]];
        artifact.dense[0].bias = vec![0.0, 0.0, 0.0];
        assert!(matches!(
            LstmClassifier::from_artifact(artifact),
            Err(ModelError::Shape { .. })
        ));

        let mut artifact = sign_of_first_feature_artifact(3);
        artifact.format = "keras-h5".to_string();
        assert!(matches!(
            LstmClassifier::from_artifact(artifact),
            Err(ModelError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_argmax_ties_resolve_to_benign() {
        assert_eq!(argmax(array![0.5, 0.5].view()), 0);
        assert_eq!(argmax(array![0.4, 0.6].view()), 1);
    }

    #[test]
    fn test_scoring_summary() {
        let predicted = [Label::Benign, Label::Attack, Label::Attack, Label::Benign];
        let actual = [Label::Benign, Label::Attack, Label::Benign, Label::Benign];
        let summary = ScoringSummary::compute(&predicted, &actual);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.predicted_attack, 2);
        assert_eq!(summary.predicted_benign, 2);
        assert_eq!(summary.actual_attack, 1);
        assert!((summary.accuracy - 0.75).abs() < 1e-12);
    }
}
