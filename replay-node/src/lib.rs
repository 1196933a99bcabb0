//! Replay Node Library
//!
//! Replays a labeled traffic dataset through a trained classifier and pushes
//! the paced per-record predictions to dashboard clients:
//! dataset -> inference (once, at startup) -> per-connection generator -> push stream.

pub mod catalog;
pub mod config;
pub mod dataset;
pub mod error;
pub mod inference;
pub mod server;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use catalog::EventCatalog;
pub use config::ReplayConfig;
pub use dataset::FeatureMatrix;
pub use error::{ReplayError, Result};
pub use inference::{Classifier, InferenceEngine, LstmClassifier, ScoringSummary};
pub use server::{create_router, serve, AppState};
pub use session::{EventGenerator, GeneratorState, SessionCursor};
pub use transport::{open_session, SessionCounter, SessionStream, TransportSettings};
