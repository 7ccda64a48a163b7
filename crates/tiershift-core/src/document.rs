use std::collections::{BTreeMap, HashSet};

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::CapacityTier;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigurationDocument {
    pub dependencies: Vec<String>,
    pub metadata: DocumentMetadata,
    pub resources: IndexMap<String, u64>,
    pub services: IndexMap<String, ServiceSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub tier: CapacityTier,
    pub schema_version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceSpec {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl ConfigurationDocument {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let document: Self =
            toml::from_str(input).context("failed to parse configuration document")?;
        document.validate()?;
        Ok(document)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize configuration document")
    }

    pub fn baseline(tier: CapacityTier) -> Self {
        Self {
            dependencies: Vec::new(),
            metadata: DocumentMetadata {
                tier,
                schema_version: Version::new(1, 0, 0),
                description: None,
                health_endpoint: None,
            },
            resources: IndexMap::new(),
            services: IndexMap::new(),
        }
    }

    pub fn tier(&self) -> CapacityTier {
        self.metadata.tier
    }

    pub fn ensure_tier(&self, expected: CapacityTier) -> Result<()> {
        if self.metadata.tier != expected {
            return Err(anyhow!(
                "document declares tier '{}' but is stored under tier '{expected}'",
                self.metadata.tier
            ));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for dependency in &self.dependencies {
            if dependency.trim().is_empty() {
                return Err(anyhow!("dependency name must not be empty"));
            }
            if !seen.insert(dependency.as_str()) {
                return Err(anyhow!("duplicate dependency declaration '{dependency}'"));
            }
        }

        for name in self.resources.keys() {
            if name.trim().is_empty() {
                return Err(anyhow!("resource name must not be empty"));
            }
        }

        for (name, spec) in &self.services {
            if name.trim().is_empty() {
                return Err(anyhow!("service name must not be empty"));
            }
            for required in &spec.requires {
                if required.trim().is_empty() {
                    return Err(anyhow!(
                        "service '{name}' declares an empty dependency reference"
                    ));
                }
            }
        }

        Ok(())
    }
}
