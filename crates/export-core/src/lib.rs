//! Export Core Library
//!
//! Business logic for the campaign export pipeline: template validation,
//! per-lead variable resolution, destination adapters, deployment
//! orchestration, and export-record persistence.

pub mod classifier;
pub mod config;
pub mod destinations;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod repository;
pub mod resolver;
pub mod validation;

// Re-export main types for easy access
pub use config::ExportConfig;
pub use error::{ExportError, Result};

// Re-export destination adapters
pub use destinations::{
    ClipboardDestination, CsvFileDestination, ExportDestination, ExportOutput,
    InstantlyDestination, SmartleadDestination,
};

// Re-export pipeline types
pub use classifier::ClassifiedError;
pub use orchestrator::{CancelFlag, ExportJob, ExportOrchestrator, ExportOutcome, StepReporter};
pub use repository::ExportRepository;
pub use validation::ValidationSummary;

#[cfg(test)]
mod tests {
    #[test]
    fn it_works() {
        // Basic smoke test
        assert_eq!(2 + 2, 4);
    }
}
