use std::collections::HashSet;
use std::fs;

use anyhow::{Context, Result};
use tiershift_core::{CapacityTier, ConfigurationDocument, MigrationError, RollbackReport};
use tiershift_store::{read_migration_manifest, ConfigStore};

use crate::backup::{list_backups, BackupFileState, BackupMetadata};
use crate::fs_utils::remove_file_if_exists;
use crate::integrity::verify_sha256;

pub fn restore_latest_backup(store: &ConfigStore, tier: CapacityTier) -> Result<RollbackReport> {
    let backups = list_backups(store.layout(), tier)?;
    let Some(backup) = backups.into_iter().next() else {
        return Err(MigrationError::NoBackupAvailable { tier }.into());
    };
    restore_backup(store, &backup)
}

pub fn restore_backup(store: &ConfigStore, backup: &BackupMetadata) -> Result<RollbackReport> {
    let layout = store.layout();
    let mut errors = Vec::new();

    for entry in &backup.files {
        let target = layout.root().join(&entry.path);
        match entry.state {
            BackupFileState::Present => {
                let source = layout.backup_files_dir(&backup.id).join(&entry.path);
                let bytes = match fs::read(&source) {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        errors.push(format!(
                            "failed to read backup copy of {}: {err}",
                            entry.path
                        ));
                        continue;
                    }
                };

                if let Some(expected) = &entry.sha256 {
                    if !verify_sha256(&bytes, expected) {
                        errors.push(format!(
                            "backup copy of {} failed digest verification",
                            entry.path
                        ));
                        continue;
                    }
                }

                if let Some(parent) = target.parent() {
                    if let Err(err) = fs::create_dir_all(parent) {
                        errors.push(format!("failed to create {}: {err}", parent.display()));
                        continue;
                    }
                }
                if let Err(err) = fs::write(&target, &bytes) {
                    errors.push(format!("failed to restore {}: {err}", entry.path));
                }
            }
            BackupFileState::Absent => {
                if let Err(err) = remove_file_if_exists(&target) {
                    errors.push(format!("failed to remove {}: {err}", entry.path));
                }
            }
        }
    }

    // The manifest records what the failed attempt touched even when the
    // backup listing is incomplete; anything the attempt created is removed.
    let covered: HashSet<&str> = backup
        .files
        .iter()
        .map(|entry| entry.path.as_str())
        .collect();
    match read_migration_manifest(layout) {
        Ok(Some(manifest)) => {
            for touched in &manifest.paths {
                if touched.preexisting || covered.contains(touched.path.as_str()) {
                    continue;
                }
                let target = layout.root().join(&touched.path);
                if let Err(err) = remove_file_if_exists(&target) {
                    errors.push(format!("failed to remove {}: {err}", touched.path));
                }
            }
        }
        Ok(None) => {}
        Err(err) => errors.push(format!("failed to read migration manifest: {err:#}")),
    }

    if backup.has_config {
        let config_path = layout.backup_config_path(&backup.id);
        let restored_document = fs::read_to_string(&config_path)
            .with_context(|| {
                format!(
                    "failed to read backup configuration: {}",
                    config_path.display()
                )
            })
            .and_then(|raw| ConfigurationDocument::from_toml_str(&raw));
        match restored_document {
            Ok(document) => {
                if let Err(err) = store.save_current(&document) {
                    errors.push(format!("failed to restore configuration document: {err:#}"));
                }
            }
            Err(err) => errors.push(format!("failed to load backup configuration: {err:#}")),
        }
    } else if let Err(err) = store.remove_current() {
        errors.push(format!("failed to clear configuration document: {err:#}"));
    }

    // Confirm the restore before reporting success. A failed re-check is
    // surfaced for manual intervention; there is no rollback-of-rollback.
    for entry in &backup.files {
        let target = layout.root().join(&entry.path);
        match entry.state {
            BackupFileState::Present if !target.exists() => {
                errors.push(format!("restored file is missing: {}", entry.path));
            }
            BackupFileState::Absent if target.exists() => {
                errors.push(format!(
                    "file should not exist after restore: {}",
                    entry.path
                ));
            }
            _ => {}
        }
    }

    Ok(RollbackReport {
        restored: errors.is_empty(),
        backup_used: Some(backup.id.clone()),
        errors,
    })
}
