use crate::CapacityTier;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("no configuration document found for tier '{tier}'")]
    TierNotFound { tier: CapacityTier },

    #[error("malformed configuration document {path}: {reason}")]
    MalformedDocument { path: String, reason: String },

    #[error("no installation present")]
    NotInstalled,

    #[error("an installation is already present")]
    AlreadyInstalled,

    #[error("invalid migration: {0}")]
    InvalidMigration(String),

    #[error("migration from '{from}' to '{to}' is a downgrade; pass the downgrade opt-in to proceed")]
    DowngradeNotAllowed {
        from: CapacityTier,
        to: CapacityTier,
    },

    #[error("backup failed before mutation: {0}")]
    BackupFailed(String),

    #[error("a migration is already in progress (txid={txid})")]
    MigrationInProgress { txid: String },

    #[error("no backup available for tier '{tier}'")]
    NoBackupAvailable { tier: CapacityTier },

    #[error("failed to persist configuration document: {0}")]
    Persistence(String),
}
