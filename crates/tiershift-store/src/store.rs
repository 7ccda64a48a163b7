use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use tiershift_core::{CapacityTier, ConfigurationDocument, MigrationError};

use crate::StateLayout;

#[derive(Debug, Clone)]
pub struct ConfigStore {
    layout: StateLayout,
}

impl ConfigStore {
    pub fn new(layout: StateLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }

    pub fn load(&self, tier: CapacityTier) -> Result<ConfigurationDocument> {
        let path = self.layout.tier_path(tier);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(MigrationError::TierNotFound { tier }.into());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read tier document: {}", path.display()));
            }
        };

        let document =
            ConfigurationDocument::from_toml_str(&raw).map_err(|err| malformed(&path, &err))?;
        document
            .ensure_tier(tier)
            .map_err(|err| malformed(&path, &err))?;
        Ok(document)
    }

    pub fn is_installed(&self) -> bool {
        self.layout.install_marker_path().exists() && self.layout.current_config_path().exists()
    }

    pub fn load_current(&self) -> Result<ConfigurationDocument> {
        let path = self.layout.current_config_path();
        if !self.layout.install_marker_path().exists() {
            return Err(MigrationError::NotInstalled.into());
        }

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(MigrationError::NotInstalled.into());
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read current configuration: {}", path.display())
                });
            }
        };

        ConfigurationDocument::from_toml_str(&raw).map_err(|err| malformed(&path, &err))
    }

    pub fn save_current(&self, document: &ConfigurationDocument) -> Result<()> {
        let path = self.layout.current_config_path();
        let payload = document
            .to_toml_string()
            .map_err(|err| MigrationError::Persistence(format!("{err:#}")))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                persistence(format!("failed to create {}: {err}", parent.display()))
            })?;
        }

        // Write-to-temp-then-rename so a crash never leaves a partial
        // current document behind.
        let tmp_path = path.with_extension(format!("toml.tmp-{}", std::process::id()));
        fs::write(&tmp_path, payload.as_bytes()).map_err(|err| {
            persistence(format!(
                "failed to stage current configuration {}: {err}",
                tmp_path.display()
            ))
        })?;
        if let Err(err) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(persistence(format!(
                "failed to commit current configuration {}: {err}",
                path.display()
            )));
        }

        let marker_path = self.layout.install_marker_path();
        fs::write(&marker_path, format!("{}\n", document.tier())).map_err(|err| {
            persistence(format!(
                "failed to write install marker {}: {err}",
                marker_path.display()
            ))
        })?;

        Ok(())
    }

    pub fn remove_current(&self) -> Result<()> {
        for path in [
            self.layout.current_config_path(),
            self.layout.install_marker_path(),
        ] {
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("failed to remove {}", path.display()))?;
            }
        }
        Ok(())
    }
}

fn malformed(path: &Path, err: &anyhow::Error) -> anyhow::Error {
    MigrationError::MalformedDocument {
        path: path.display().to_string(),
        reason: format!("{err:#}"),
    }
    .into()
}

fn persistence(reason: String) -> anyhow::Error {
    MigrationError::Persistence(reason).into()
}
