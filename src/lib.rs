// BIN Scope - Core Library
// BIN resolution and timer-driven batch classification, used by the CLI,
// the terminal dashboard and the HTTP server.

pub mod bin_table;
pub mod lookup;
pub mod classifier;
pub mod batch;
pub mod error;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use bin_table::{BinRecord, BinTable, PrefixBounds};
pub use lookup::{lookup, normalize_query, truncate_input, LookupOutcome};
pub use classifier::{
    classifier_fn, ClassificationResult, Classifier, FnClassifier, WeightedClassifier,
};
pub use batch::{
    BatchEvent, BatchRunner, RunMode, RunSnapshot, RunStatus, RunSummary, RunnerConfig,
    Tallies, Tally, TickSchedule,
};
pub use error::{BatchError, BatchResult};
pub use config::{ClassifierSettings, Settings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
