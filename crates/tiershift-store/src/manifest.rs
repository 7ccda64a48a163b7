use std::fs;
use std::io;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::StateLayout;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationManifest {
    pub version: u32,
    pub txid: String,
    pub written_at_unix: u64,
    pub paths: Vec<TouchedPath>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchedPath {
    pub path: String,
    pub preexisting: bool,
}

pub fn write_migration_manifest(layout: &StateLayout, manifest: &MigrationManifest) -> Result<()> {
    let path = layout.manifest_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(manifest)
        .with_context(|| format!("failed serializing migration manifest: {}", path.display()))?;
    fs::write(&path, content)
        .with_context(|| format!("failed writing migration manifest: {}", path.display()))
}

pub fn read_migration_manifest(layout: &StateLayout) -> Result<Option<MigrationManifest>> {
    let path = layout.manifest_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed reading migration manifest: {}", path.display()));
        }
    };

    let manifest = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing migration manifest: {}", path.display()))?;
    Ok(Some(manifest))
}

pub fn remove_migration_manifest(layout: &StateLayout) -> Result<()> {
    let path = layout.manifest_path();
    if path.exists() {
        fs::remove_file(&path)
            .with_context(|| format!("failed removing migration manifest: {}", path.display()))?;
    }
    Ok(())
}
