use std::collections::HashSet;

use anyhow::Result;
use tiershift_core::{
    ChangeDirection, ConfigurationDocument, DependencyAction, DependencyChange, MigrationError,
    MigrationPlan, ResourceChange, ServiceAction, ServiceChange, ServiceSpec,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    pub allow_downgrade: bool,
    pub disable_missing_services: bool,
}

pub fn diff(
    from: &ConfigurationDocument,
    to: &ConfigurationDocument,
    options: &PlanOptions,
) -> Result<MigrationPlan> {
    if to.resources.is_empty() && to.services.is_empty() {
        return Err(MigrationError::InvalidMigration(format!(
            "target document for tier '{}' declares no resources and no services",
            to.tier()
        ))
        .into());
    }

    if to.tier() < from.tier() && !options.allow_downgrade {
        return Err(MigrationError::DowngradeNotAllowed {
            from: from.tier(),
            to: to.tier(),
        }
        .into());
    }

    let resource_changes = diff_resources(from, to);
    let service_changes = diff_services(from, to, options);
    let dependency_changes = diff_dependencies(from, to);
    let estimated_downtime =
        estimate_downtime(&resource_changes, &service_changes, &dependency_changes);

    Ok(MigrationPlan {
        from_tier: from.tier(),
        to_tier: to.tier(),
        resource_changes,
        service_changes,
        dependency_changes,
        estimated_downtime,
    })
}

fn diff_resources(from: &ConfigurationDocument, to: &ConfigurationDocument) -> Vec<ResourceChange> {
    let mut changes = Vec::new();
    for (resource, to_value) in &to.resources {
        let from_value = from.resources.get(resource).copied().unwrap_or(0);
        if from_value == *to_value {
            continue;
        }

        let direction = if *to_value > from_value {
            ChangeDirection::Increase
        } else {
            ChangeDirection::Decrease
        };
        changes.push(ResourceChange {
            resource: resource.clone(),
            from: from_value,
            to: *to_value,
            direction,
        });
    }
    changes
}

fn diff_services(
    from: &ConfigurationDocument,
    to: &ConfigurationDocument,
    options: &PlanOptions,
) -> Vec<ServiceChange> {
    let mut changes = Vec::new();
    for (service, to_spec) in &to.services {
        match from.services.get(service) {
            None => changes.push(ServiceChange {
                action: ServiceAction::Enable,
                service: service.clone(),
                spec: to_spec.clone(),
            }),
            Some(from_spec) if from_spec != to_spec => changes.push(ServiceChange {
                action: ServiceAction::Update,
                service: service.clone(),
                spec: to_spec.clone(),
            }),
            Some(_) => {}
        }
    }

    // Services missing from the target stay running unless explicitly opted in.
    if options.disable_missing_services {
        for (service, from_spec) in &from.services {
            if to.services.contains_key(service) {
                continue;
            }
            changes.push(ServiceChange {
                action: ServiceAction::Disable,
                service: service.clone(),
                spec: ServiceSpec {
                    enabled: false,
                    requires: from_spec.requires.clone(),
                    params: from_spec.params.clone(),
                },
            });
        }
    }

    changes
}

fn diff_dependencies(
    from: &ConfigurationDocument,
    to: &ConfigurationDocument,
) -> Vec<DependencyChange> {
    let from_set: HashSet<&str> = from.dependencies.iter().map(String::as_str).collect();
    let to_set: HashSet<&str> = to.dependencies.iter().map(String::as_str).collect();

    let mut changes = Vec::new();
    for dependency in &to.dependencies {
        if !from_set.contains(dependency.as_str()) {
            changes.push(DependencyChange {
                action: DependencyAction::Install,
                dependency: dependency.clone(),
            });
        }
    }
    for dependency in &from.dependencies {
        if !to_set.contains(dependency.as_str()) {
            changes.push(DependencyChange {
                action: DependencyAction::Remove,
                dependency: dependency.clone(),
            });
        }
    }
    changes
}

fn estimate_downtime(
    resource_changes: &[ResourceChange],
    service_changes: &[ServiceChange],
    dependency_changes: &[DependencyChange],
) -> String {
    if resource_changes.is_empty() && service_changes.is_empty() && dependency_changes.is_empty() {
        return "none".to_string();
    }

    let resource_seconds = if resource_changes.is_empty() { 0 } else { 2 };
    let seconds = 5 * service_changes.len() + 3 * dependency_changes.len() + resource_seconds;
    format!("~{seconds}s")
}
