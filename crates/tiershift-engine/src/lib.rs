mod backup;
mod executor;
mod fs_utils;
mod integrity;
mod migrate;
mod rollback;
mod validator;

pub use backup::{
    create_backup, list_all_backups, list_backups, read_backup_metadata, BackupFileEntry,
    BackupFileState, BackupMetadata,
};
pub use executor::{
    execute_plan, parse_dependency_receipt, plan_touched_paths, DependencyReceipt, ExecutionReport,
};
pub use integrity::{sha256_hex, verify_sha256};
pub use migrate::{
    preview_migration, run_install, run_manual_rollback, run_migration, run_uninstall,
    MigrationRequest, UninstallOutcome, UninstallStatus,
};
pub use rollback::{restore_backup, restore_latest_backup};
pub use validator::{validate, HEALTH_CHECK_TIMEOUT};
