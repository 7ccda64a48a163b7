use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use tiershift_core::{
    CapacityTier, ConfigurationDocument, MigrationError, MigrationPlan, MigrationStatus,
    RollbackReport, TransactionRecord,
};
use tiershift_diff::{diff, PlanOptions};
use tiershift_store::{
    claim_migration_lock, clear_migration_lock, current_unix_timestamp,
    remove_migration_manifest, write_migration_manifest, write_transaction_record, ConfigStore,
    MigrationManifest, StateLayout,
};

use crate::backup::{create_backup, list_all_backups, BackupMetadata};
use crate::executor::{execute_plan, plan_touched_paths};
use crate::rollback::{restore_backup, restore_latest_backup};
use crate::validator::validate;

static TXID_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationRequest {
    pub target: CapacityTier,
    pub options: PlanOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallStatus {
    NotInstalled,
    Uninstalled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallOutcome {
    pub status: UninstallStatus,
    pub tier: Option<CapacityTier>,
    pub backup_id: Option<String>,
    pub removed_paths: Vec<String>,
}

pub fn preview_migration(store: &ConfigStore, request: &MigrationRequest) -> Result<MigrationPlan> {
    let current = store.load_current()?;
    let target = store.load(request.target)?;
    diff(&current, &target, &request.options)
}

pub fn run_migration(store: &ConfigStore, request: &MigrationRequest) -> Result<TransactionRecord> {
    let layout = store.layout();
    layout.ensure_base_dirs()?;

    let started_at_unix = current_unix_timestamp()?;
    let txid = next_txid(started_at_unix);
    claim_migration_lock(layout, &txid)?;

    // Everything up to the backup propagates as an error: nothing has been
    // mutated yet, so the lock is simply released. From the first executed
    // step onward, failures are captured into the record instead of thrown.
    let prepared = (|| {
        let current = store.load_current()?;
        let target = store.load(request.target)?;
        let plan = diff(&current, &target, &request.options)?;
        Ok::<_, anyhow::Error>((current, target, plan))
    })();
    let (current, target, plan) = match prepared {
        Ok(value) => value,
        Err(err) => {
            let _ = clear_migration_lock(layout);
            return Err(err);
        }
    };

    if plan.is_empty() {
        let record = empty_success_record(&txid, "migrate", started_at_unix, plan);
        let write_result = write_transaction_record(layout, &record);
        clear_migration_lock(layout)?;
        write_result?;
        return Ok(record);
    }

    let touched = plan_touched_paths(layout, &plan);
    let backup = match create_backup(layout, current.tier(), &touched, Some(&current)) {
        Ok(backup) => backup,
        Err(err) => {
            let _ = clear_migration_lock(layout);
            return Err(err);
        }
    };

    run_transaction(store, "migrate", &txid, started_at_unix, backup, &target, plan)
}

pub fn run_install(store: &ConfigStore, tier: CapacityTier) -> Result<TransactionRecord> {
    let layout = store.layout();
    layout.ensure_base_dirs()?;

    let started_at_unix = current_unix_timestamp()?;
    let txid = next_txid(started_at_unix);
    claim_migration_lock(layout, &txid)?;

    let prepared = (|| {
        if store.is_installed() {
            return Err(MigrationError::AlreadyInstalled.into());
        }
        let target = store.load(tier)?;
        let baseline = ConfigurationDocument::baseline(tier);
        let plan = diff(&baseline, &target, &PlanOptions::default())?;
        Ok::<_, anyhow::Error>((target, plan))
    })();
    let (target, plan) = match prepared {
        Ok(value) => value,
        Err(err) => {
            let _ = clear_migration_lock(layout);
            return Err(err);
        }
    };

    if plan.is_empty() {
        let commit = store.save_current(&target);
        let record = empty_success_record(&txid, "install", started_at_unix, plan);
        let write_result = write_transaction_record(layout, &record);
        clear_migration_lock(layout)?;
        commit?;
        write_result?;
        return Ok(record);
    }

    let touched = plan_touched_paths(layout, &plan);
    let backup = match create_backup(layout, tier, &touched, None) {
        Ok(backup) => backup,
        Err(err) => {
            let _ = clear_migration_lock(layout);
            return Err(err);
        }
    };

    run_transaction(store, "install", &txid, started_at_unix, backup, &target, plan)
}

pub fn run_uninstall(store: &ConfigStore) -> Result<UninstallOutcome> {
    let layout = store.layout();
    layout.ensure_base_dirs()?;

    let started_at_unix = current_unix_timestamp()?;
    let txid = next_txid(started_at_unix);
    claim_migration_lock(layout, &txid)?;

    let result: Result<UninstallOutcome> = (|| {
        if !store.is_installed() {
            return Ok(UninstallOutcome {
                status: UninstallStatus::NotInstalled,
                tier: None,
                backup_id: None,
                removed_paths: Vec::new(),
            });
        }

        let current = store.load_current()?;
        let files = collect_app_files(layout)?;
        let backup = create_backup(layout, current.tier(), &files, Some(&current))?;

        let mut removed_paths = Vec::with_capacity(files.len());
        for file in &files {
            if let Ok(rel) = layout.relativize(file) {
                removed_paths.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }

        let app_dir = layout.app_dir();
        if app_dir.exists() {
            fs::remove_dir_all(&app_dir).with_context(|| {
                format!("failed to remove application tree: {}", app_dir.display())
            })?;
        }
        store.remove_current()?;
        remove_migration_manifest(layout)?;

        Ok(UninstallOutcome {
            status: UninstallStatus::Uninstalled,
            tier: Some(current.tier()),
            backup_id: Some(backup.id),
            removed_paths,
        })
    })();

    let cleared = clear_migration_lock(layout);
    let outcome = result?;
    cleared?;
    Ok(outcome)
}

// Manual rollback is the operator intervention after an unrecoverable
// migration; it does not claim the lock and releases a held one once the
// restore has been confirmed. Without an explicit tier it restores the most
// recent backup regardless of tier.
pub fn run_manual_rollback(
    store: &ConfigStore,
    tier: Option<CapacityTier>,
) -> Result<RollbackReport> {
    let layout = store.layout();
    layout.ensure_base_dirs()?;

    let report = match tier {
        Some(tier) => restore_latest_backup(store, tier)?,
        None => {
            let backups = list_all_backups(layout)?;
            let Some(backup) = backups.into_iter().next() else {
                let tier = store.load_current().map(|doc| doc.tier()).unwrap_or(CapacityTier::Nano);
                return Err(MigrationError::NoBackupAvailable { tier }.into());
            };
            restore_backup(store, &backup)?
        }
    };

    if report.restored {
        clear_migration_lock(layout)?;
    }
    Ok(report)
}

fn run_transaction(
    store: &ConfigStore,
    operation: &str,
    txid: &str,
    started_at_unix: u64,
    backup: BackupMetadata,
    target: &ConfigurationDocument,
    plan: MigrationPlan,
) -> Result<TransactionRecord> {
    let layout = store.layout();

    let execution = match execute_plan(layout, &plan) {
        Ok(execution) => execution,
        Err(err) => {
            let _ = clear_migration_lock(layout);
            return Err(err.context("transaction execution aborted"));
        }
    };

    let mut failure_notes = Vec::new();
    let manifest = MigrationManifest {
        version: 1,
        txid: txid.to_string(),
        written_at_unix: current_unix_timestamp().unwrap_or(started_at_unix),
        paths: execution.touched.clone(),
    };
    if let Err(err) = write_migration_manifest(layout, &manifest) {
        failure_notes.push(format!("failed to write migration manifest: {err:#}"));
    }

    let validation = validate(layout, target, &plan);

    let mut rollback_report = None;
    let committed = validation.passed
        && failure_notes.is_empty()
        && match store.save_current(target) {
            Ok(()) => true,
            Err(err) => {
                failure_notes.push(format!("failed to persist new configuration: {err:#}"));
                false
            }
        };

    let status = if committed {
        MigrationStatus::Success
    } else {
        match restore_latest_backup(store, plan.from_tier) {
            Ok(mut report) => {
                let restored = report.restored;
                report.errors.splice(0..0, failure_notes.drain(..));
                rollback_report = Some(report);
                if restored {
                    MigrationStatus::RolledBack
                } else {
                    MigrationStatus::FailedUnrecoverable
                }
            }
            Err(err) => {
                let mut errors: Vec<String> = failure_notes.drain(..).collect();
                errors.push(format!("{err:#}"));
                rollback_report = Some(RollbackReport {
                    restored: false,
                    backup_used: None,
                    errors,
                });
                MigrationStatus::FailedUnrecoverable
            }
        }
    };

    let record = TransactionRecord {
        version: 1,
        txid: txid.to_string(),
        operation: operation.to_string(),
        from_tier: plan.from_tier,
        to_tier: plan.to_tier,
        started_at_unix,
        finished_at_unix: current_unix_timestamp().unwrap_or(started_at_unix),
        backup_id: Some(backup.id.clone()),
        plan,
        steps: execution.steps,
        validation: Some(validation),
        rollback: rollback_report,
        status,
    };

    let write_result = write_transaction_record(layout, &record)
        .with_context(|| format!("failed to persist transaction record {txid}"));

    // An unrecoverable outcome keeps the lock so further migration attempts
    // fail fast until an operator has inspected the installation.
    if record.status != MigrationStatus::FailedUnrecoverable {
        clear_migration_lock(layout)?;
    }
    write_result?;

    Ok(record)
}

fn empty_success_record(
    txid: &str,
    operation: &str,
    started_at_unix: u64,
    plan: MigrationPlan,
) -> TransactionRecord {
    TransactionRecord {
        version: 1,
        txid: txid.to_string(),
        operation: operation.to_string(),
        from_tier: plan.from_tier,
        to_tier: plan.to_tier,
        started_at_unix,
        finished_at_unix: current_unix_timestamp().unwrap_or(started_at_unix),
        backup_id: None,
        plan,
        steps: Vec::new(),
        validation: None,
        rollback: None,
        status: MigrationStatus::Success,
    }
}

fn next_txid(started_at_unix: u64) -> String {
    let seq = TXID_SEQ.fetch_add(1, Ordering::SeqCst);
    format!("tx-{started_at_unix}-{}-{seq:04}", std::process::id())
}

fn collect_app_files(layout: &StateLayout) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_files_recursive(&layout.app_dir(), &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in
        fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files_recursive(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}
