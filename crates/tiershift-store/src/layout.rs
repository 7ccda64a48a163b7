use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tiershift_core::CapacityTier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tiers_dir(&self) -> PathBuf {
        self.root.join("tiers")
    }

    pub fn tier_path(&self, tier: CapacityTier) -> PathBuf {
        self.tiers_dir().join(format!("{tier}.toml"))
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    pub fn current_config_path(&self) -> PathBuf {
        self.state_dir().join("current.toml")
    }

    pub fn install_marker_path(&self) -> PathBuf {
        self.state_dir().join("installed")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join("migration.lock")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.state_dir().join("manifest.json")
    }

    pub fn transactions_dir(&self) -> PathBuf {
        self.state_dir().join("transactions")
    }

    pub fn transaction_record_path(&self, txid: &str) -> PathBuf {
        self.transactions_dir().join(format!("{txid}.json"))
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    pub fn backup_dir(&self, backup_id: &str) -> PathBuf {
        self.backups_dir().join(backup_id)
    }

    pub fn backup_metadata_path(&self, backup_id: &str) -> PathBuf {
        self.backup_dir(backup_id).join("backup.json")
    }

    pub fn backup_files_dir(&self, backup_id: &str) -> PathBuf {
        self.backup_dir(backup_id).join("files")
    }

    pub fn backup_config_path(&self, backup_id: &str) -> PathBuf {
        self.backup_dir(backup_id).join("config.toml")
    }

    pub fn app_dir(&self) -> PathBuf {
        self.root.join("app")
    }

    pub fn resources_path(&self) -> PathBuf {
        self.app_dir().join("resources.toml")
    }

    pub fn services_dir(&self) -> PathBuf {
        self.app_dir().join("services")
    }

    pub fn service_path(&self, service: &str) -> PathBuf {
        self.services_dir().join(format!("{service}.toml"))
    }

    pub fn deps_dir(&self) -> PathBuf {
        self.app_dir().join("deps")
    }

    pub fn dependency_path(&self, dependency: &str) -> PathBuf {
        self.deps_dir().join(format!("{dependency}.dep"))
    }

    pub fn relativize(&self, path: &Path) -> Result<PathBuf> {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .with_context(|| {
                format!(
                    "path {} is outside the installation root {}",
                    path.display(),
                    self.root.display()
                )
            })
    }

    // The backup directory is deliberately absent here: backup storage is
    // owned by the backup manager, which must observe creation failures
    // itself so a migration can abort before mutating anything.
    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [
            self.tiers_dir(),
            self.state_dir(),
            self.transactions_dir(),
            self.app_dir(),
            self.services_dir(),
            self.deps_dir(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn default_root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var("TIERSHIFT_ROOT") {
        if !root.trim().is_empty() {
            return Ok(PathBuf::from(root));
        }
    }

    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows installation root")?;
        return Ok(PathBuf::from(app_data).join("Tiershift"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve installation root")?;
    Ok(PathBuf::from(home).join(".tiershift"))
}

pub fn current_unix_timestamp() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time is before unix epoch")?
        .as_secs())
}
