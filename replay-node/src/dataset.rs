// Feature Matrix Builder
//
// Turns the labeled CSV dataset into the ordered feature matrix the classifier
// scores. Rows with a missing, unparseable or non-finite feature, or without
// a label, are dropped here and never reach scoring or the stream. Short rows
// are read as-is so their absent cells count as missing.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use flowguard_common::{FeatureRecord, Label, FEATURE_COLUMNS, FEATURE_COUNT};

use crate::config::DatasetConfig;
use crate::error::DatasetError;

/// Ordered, filtered dataset ready for scoring
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Raw feature values, one per surviving row
    pub records: Vec<FeatureRecord>,
    /// Ground-truth labels aligned with `records`
    pub labels: Vec<Label>,
    /// Standardized features (N x FEATURE_COUNT) fed to the classifier
    pub scaled: Array2<f64>,
    /// Rows removed for missing or non-finite features
    pub dropped_rows: usize,
}

impl FeatureMatrix {
    /// Build from already-clean records, fitting the scaler on them
    pub fn from_records(
        records: Vec<FeatureRecord>,
        labels: Vec<Label>,
    ) -> Result<Self, DatasetError> {
        if records.is_empty() {
            return Err(DatasetError::Empty);
        }

        let mut raw = Array2::<f64>::zeros((records.len(), FEATURE_COUNT));
        for (mut row, record) in raw.outer_iter_mut().zip(&records) {
            row.assign(&Array1::from(record.to_vector().to_vec()));
        }

        let scaled = StandardScaler::fit(&raw).transform(&raw);

        Ok(Self {
            records,
            labels,
            scaled,
            dropped_rows: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of feature columns in the scaled matrix
    pub fn width(&self) -> usize {
        self.scaled.ncols()
    }
}

/// Column-wise standardization: zero mean, unit population variance.
/// Constant columns keep a scale of 1 so they map to 0 instead of NaN.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(data: &Array2<f64>) -> Self {
        let n = data.nrows().max(1) as f64;
        let mean = data.sum_axis(Axis(0)) / n;
        let variance = data
            .outer_iter()
            .map(|row| (&row - &mean).mapv(|d| d * d))
            .fold(Array1::<f64>::zeros(data.ncols()), |acc, sq| acc + sq)
            / n;
        let scale = variance.mapv(|v| {
            let std = v.sqrt();
            if std == 0.0 {
                1.0
            } else {
                std
            }
        });

        Self { mean, scale }
    }

    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.mean) / &self.scale
    }
}

/// Load the dataset described by `config` from disk
pub fn load(config: &DatasetConfig) -> Result<FeatureMatrix, DatasetError> {
    info!(path = %config.path.display(), "Loading dataset");
    let reader = csv_reader_for(&config.path)?;
    build(reader, config)
}

fn csv_reader_for(path: &Path) -> Result<csv::Reader<std::fs::File>, DatasetError> {
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_path(path)?)
}

/// Load the dataset from any CSV source (used by tests and tools)
pub fn from_reader<R: Read>(reader: R, config: &DatasetConfig) -> Result<FeatureMatrix, DatasetError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(reader);
    build(reader, config)
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, DatasetError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
}

/// Parse one feature cell; `None` for empty, unparseable or non-finite values
fn parse_feature(cell: Option<&str>) -> Option<f64> {
    let value: f64 = cell?.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

fn build<R: Read>(
    mut reader: csv::Reader<R>,
    config: &DatasetConfig,
) -> Result<FeatureMatrix, DatasetError> {
    let headers = reader.headers()?.clone();

    let mut feature_idx = [0usize; FEATURE_COUNT];
    for (slot, column) in feature_idx.iter_mut().zip(FEATURE_COLUMNS) {
        *slot = column_index(&headers, column)?;
    }
    let label_idx = column_index(&headers, &config.label_column)?;

    let mut rows = reader.records().collect::<Result<Vec<_>, _>>()?;
    let total_rows = rows.len();

    if config.shuffle {
        let mut rng = StdRng::seed_from_u64(config.shuffle_seed);
        rows.shuffle(&mut rng);
        debug!(seed = config.shuffle_seed, "Dataset rows shuffled");
    }

    let mut records = Vec::with_capacity(rows.len());
    let mut labels = Vec::with_capacity(rows.len());
    let mut values = [0.0f64; FEATURE_COUNT];

    'rows: for row in &rows {
        for (value, idx) in values.iter_mut().zip(feature_idx) {
            match parse_feature(row.get(idx)) {
                Some(v) => *value = v,
                None => continue 'rows,
            }
        }

        let Some(raw_label) = row.get(label_idx).map(str::trim).filter(|l| !l.is_empty()) else {
            continue;
        };

        // Values were checked above, so construction cannot fail on finiteness
        let Ok(record) = FeatureRecord::from_values(&values) else {
            continue;
        };
        records.push(record);
        labels.push(Label::from_ground_truth(raw_label, &config.benign_marker));
    }

    let dropped_rows = total_rows - records.len();
    let mut matrix = FeatureMatrix::from_records(records, labels)?;
    matrix.dropped_rows = dropped_rows;

    info!(
        rows = matrix.len(),
        dropped_rows,
        "Feature matrix built"
    );

    Ok(matrix)
}
