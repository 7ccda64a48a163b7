mod document;
mod error;
mod plan;
mod record;
mod tier;

pub use document::{ConfigurationDocument, DocumentMetadata, ServiceSpec};
pub use error::MigrationError;
pub use plan::{
    ChangeDirection, DependencyAction, DependencyChange, MigrationPlan, ResourceChange,
    ServiceAction, ServiceChange,
};
pub use record::{
    CheckStatus, MigrationStatus, RollbackReport, StepOutcome, StepState, TransactionRecord,
    ValidationCheck, ValidationResult,
};
pub use tier::CapacityTier;
