// FlowGuard Common - Shared types between the replay node and the dashboard
// Everything that crosses the push channel is defined here so both ends
// agree on one schema.

pub mod error;
pub mod frame;
pub mod schema;

pub use error::{Result, SchemaError};
pub use frame::{encode_frame, FrameDecoder};
pub use schema::{FeatureRecord, Label, PredictionEvent, StreamMessage};

/// Number of numeric features per record (classifier input width)
pub const FEATURE_COUNT: usize = 10;

/// Feature column names, in classifier input order.
/// Order matters! Must be consistent across scaling, scoring and display.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "Average Packet Size",
    "Flow Bytes/s",
    "Max Packet Length",
    "Fwd Packet Length Mean",
    "Fwd IAT Min",
    "Total Length of Fwd Packets",
    "Flow IAT Mean",
    "Fwd IAT Std",
    "Fwd Packet Length Max",
    "Flow Packets/s",
];

/// Current version of the stream message schema
pub const SCHEMA_VERSION: u32 = 1;

/// Fixed prefix of every data line on the push channel
pub const DATA_PREFIX: &str = "data:";
