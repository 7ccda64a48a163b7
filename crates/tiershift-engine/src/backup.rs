use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tiershift_core::{CapacityTier, ConfigurationDocument, MigrationError};
use tiershift_store::{current_unix_timestamp, StateLayout};

use crate::integrity::sha256_hex;

static BACKUP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub version: u32,
    pub id: String,
    pub tier: CapacityTier,
    pub created_at_unix: u64,
    pub has_config: bool,
    pub files: Vec<BackupFileEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupFileEntry {
    pub path: String,
    pub state: BackupFileState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupFileState {
    Present,
    Absent,
}

pub fn create_backup(
    layout: &StateLayout,
    tier: CapacityTier,
    paths: &[PathBuf],
    current: Option<&ConfigurationDocument>,
) -> Result<BackupMetadata> {
    create_backup_inner(layout, tier, paths, current)
        .map_err(|err| MigrationError::BackupFailed(format!("{err:#}")).into())
}

fn create_backup_inner(
    layout: &StateLayout,
    tier: CapacityTier,
    paths: &[PathBuf],
    current: Option<&ConfigurationDocument>,
) -> Result<BackupMetadata> {
    let created_at_unix = current_unix_timestamp()?;
    let seq = BACKUP_SEQ.fetch_add(1, Ordering::SeqCst);
    let id = format!("{tier}-{created_at_unix}-{}-{seq:04}", std::process::id());

    let backup_dir = layout.backup_dir(&id);
    if backup_dir.exists() {
        return Err(anyhow!(
            "backup directory already exists: {}",
            backup_dir.display()
        ));
    }

    let files_dir = layout.backup_files_dir(&id);
    fs::create_dir_all(&files_dir)
        .with_context(|| format!("failed to create {}", files_dir.display()))?;

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let rel = layout.relativize(path)?;
        let rel_str = rel.to_string_lossy().replace('\\', "/");

        if !path.exists() {
            files.push(BackupFileEntry {
                path: rel_str,
                state: BackupFileState::Absent,
                sha256: None,
            });
            continue;
        }

        let bytes = fs::read(path)
            .with_context(|| format!("failed to read {} for backup", path.display()))?;
        let digest = sha256_hex(&bytes);

        let dest = files_dir.join(&rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&dest, &bytes)
            .with_context(|| format!("failed to copy {} into backup", path.display()))?;

        files.push(BackupFileEntry {
            path: rel_str,
            state: BackupFileState::Present,
            sha256: Some(digest),
        });
    }

    let has_config = if let Some(document) = current {
        let config_path = layout.backup_config_path(&id);
        let payload = document.to_toml_string()?;
        fs::write(&config_path, payload.as_bytes()).with_context(|| {
            format!(
                "failed to store pre-migration configuration: {}",
                config_path.display()
            )
        })?;
        true
    } else {
        false
    };

    let metadata = BackupMetadata {
        version: 1,
        id,
        tier,
        created_at_unix,
        has_config,
        files,
    };
    write_backup_metadata(layout, &metadata)?;
    Ok(metadata)
}

fn write_backup_metadata(layout: &StateLayout, metadata: &BackupMetadata) -> Result<()> {
    let path = layout.backup_metadata_path(&metadata.id);
    let content = serde_json::to_string_pretty(metadata)
        .with_context(|| format!("failed serializing backup metadata: {}", path.display()))?;
    fs::write(&path, content)
        .with_context(|| format!("failed writing backup metadata: {}", path.display()))
}

pub fn read_backup_metadata(
    layout: &StateLayout,
    backup_id: &str,
) -> Result<Option<BackupMetadata>> {
    let path = layout.backup_metadata_path(backup_id);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed reading backup metadata: {}", path.display()));
        }
    };

    let metadata = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing backup metadata: {}", path.display()))?;
    Ok(Some(metadata))
}

pub fn list_backups(layout: &StateLayout, tier: CapacityTier) -> Result<Vec<BackupMetadata>> {
    let mut backups = list_all_backups(layout)?;
    backups.retain(|metadata| metadata.tier == tier);
    Ok(backups)
}

pub fn list_all_backups(layout: &StateLayout) -> Result<Vec<BackupMetadata>> {
    let dir = layout.backups_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut backups = Vec::new();
    for entry in fs::read_dir(&dir)
        .with_context(|| format!("failed to read backup directory: {}", dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let Some(backup_id) = entry.file_name().to_str().map(ToOwned::to_owned) else {
            continue;
        };
        let Some(metadata) = read_backup_metadata(layout, &backup_id).ok().flatten() else {
            continue;
        };
        backups.push(metadata);
    }

    backups.sort_by(|a, b| {
        b.created_at_unix
            .cmp(&a.created_at_unix)
            .then_with(|| b.id.cmp(&a.id))
    });
    Ok(backups)
}
