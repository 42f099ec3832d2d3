//! Prescription intake pipeline.
//!
//! ```text
//! images → ExtractionGateway → StagingStore → (operator picks patient) → LinkingCoordinator → record store
//! ```

pub mod error;
pub mod gateway;
pub mod intake;
pub mod linking;
pub mod staging;

pub use error::{ExtractionError, LinkError};
pub use gateway::ExtractionGateway;
pub use intake::IntakePipeline;
pub use linking::{
    LinkFailure, LinkReport, LinkStatus, LinkedEntry, LinkingCoordinator, PendingDrugs, ResumeReport,
};
pub use staging::{SessionId, StagingStore};
