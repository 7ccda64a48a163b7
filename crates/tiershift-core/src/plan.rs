use serde::{Deserialize, Serialize};

use crate::{CapacityTier, ServiceSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDirection {
    Increase,
    Decrease,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub resource: String,
    pub from: u64,
    pub to: u64,
    pub direction: ChangeDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    Enable,
    Update,
    Disable,
}

impl ServiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Update => "update",
            Self::Disable => "disable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceChange {
    pub action: ServiceAction,
    pub service: String,
    pub spec: ServiceSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyAction {
    Install,
    Remove,
}

impl DependencyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Remove => "remove",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyChange {
    pub action: DependencyAction,
    pub dependency: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub from_tier: CapacityTier,
    pub to_tier: CapacityTier,
    pub resource_changes: Vec<ResourceChange>,
    pub service_changes: Vec<ServiceChange>,
    pub dependency_changes: Vec<DependencyChange>,
    pub estimated_downtime: String,
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.resource_changes.is_empty()
            && self.service_changes.is_empty()
            && self.dependency_changes.is_empty()
    }

    pub fn is_downgrade(&self) -> bool {
        self.to_tier < self.from_tier
    }

    pub fn change_count(&self) -> usize {
        self.resource_changes.len() + self.service_changes.len() + self.dependency_changes.len()
    }
}
