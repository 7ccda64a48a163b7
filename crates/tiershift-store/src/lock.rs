use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use tiershift_core::MigrationError;

use crate::StateLayout;

pub fn claim_migration_lock(layout: &StateLayout, txid: &str) -> Result<PathBuf> {
    let path = layout.lock_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
    {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            let holder = read_migration_lock(layout)
                .ok()
                .flatten()
                .unwrap_or_else(|| "unknown".to_string());
            return Err(MigrationError::MigrationInProgress { txid: holder }.into());
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to claim migration lock: {}", path.display()));
        }
    };

    file.write_all(format!("{txid}\n").as_bytes())
        .with_context(|| format!("failed to write migration lock: {}", path.display()))?;
    file.flush()
        .with_context(|| format!("failed to flush migration lock: {}", path.display()))?;

    Ok(path)
}

pub fn read_migration_lock(layout: &StateLayout) -> Result<Option<String>> {
    let path = layout.lock_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read migration lock: {}", path.display()));
        }
    };

    let txid = raw.trim();
    if txid.is_empty() {
        return Ok(None);
    }

    Ok(Some(txid.to_string()))
}

pub fn clear_migration_lock(layout: &StateLayout) -> Result<()> {
    let path = layout.lock_path();
    if path.exists() {
        fs::remove_file(&path)
            .with_context(|| format!("failed to clear migration lock: {}", path.display()))?;
    }
    Ok(())
}
