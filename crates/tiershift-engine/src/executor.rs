use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use tiershift_core::{
    DependencyAction, MigrationPlan, ResourceChange, ServiceChange, StepOutcome, StepState,
};
use tiershift_store::{current_unix_timestamp, StateLayout, TouchedPath};

use crate::fs_utils::remove_file_if_exists;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub steps: Vec<StepOutcome>,
    pub touched: Vec<TouchedPath>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyReceipt {
    pub name: String,
    pub installed_at_unix: u64,
}

pub fn plan_touched_paths(layout: &StateLayout, plan: &MigrationPlan) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for change in &plan.dependency_changes {
        paths.push(layout.dependency_path(&change.dependency));
    }
    for change in &plan.service_changes {
        paths.push(layout.service_path(&change.service));
    }
    if !plan.resource_changes.is_empty() {
        paths.push(layout.resources_path());
    }
    paths
}

// Dependencies land before the services that require them are configured;
// resource limits are applied last so they reflect the final service set.
// A failed step never stops the remaining steps: the full post-state must be
// visible to the validator, and the verdict is the validator's alone.
pub fn execute_plan(layout: &StateLayout, plan: &MigrationPlan) -> Result<ExecutionReport> {
    let mut steps = Vec::new();
    let mut touched = Vec::new();
    let mut seq = 1_u64;

    for change in &plan.dependency_changes {
        if change.action != DependencyAction::Install {
            continue;
        }
        let path = layout.dependency_path(&change.dependency);
        let rel = record_touch(layout, &mut touched, &path);
        let result = apply_dependency_install(layout, &change.dependency);
        push_step(
            &mut steps,
            &mut seq,
            format!("install_dependency:{}", change.dependency),
            rel,
            result,
        )?;
    }

    for change in &plan.dependency_changes {
        if change.action != DependencyAction::Remove {
            continue;
        }
        let path = layout.dependency_path(&change.dependency);
        let rel = record_touch(layout, &mut touched, &path);
        let result = remove_file_if_exists(&path)
            .with_context(|| format!("failed to remove dependency receipt: {}", path.display()));
        push_step(
            &mut steps,
            &mut seq,
            format!("remove_dependency:{}", change.dependency),
            rel,
            result,
        )?;
    }

    for change in &plan.service_changes {
        let path = layout.service_path(&change.service);
        let rel = record_touch(layout, &mut touched, &path);
        let result = apply_service_change(layout, change);
        push_step(
            &mut steps,
            &mut seq,
            format!("{}_service:{}", change.action.as_str(), change.service),
            rel,
            result,
        )?;
    }

    if !plan.resource_changes.is_empty() {
        let path = layout.resources_path();
        let rel = record_touch(layout, &mut touched, &path);
        let result = apply_resource_changes(layout, &plan.resource_changes);
        push_step(
            &mut steps,
            &mut seq,
            "apply_resources".to_string(),
            rel,
            result,
        )?;
    }

    Ok(ExecutionReport { steps, touched })
}

fn record_touch(layout: &StateLayout, touched: &mut Vec<TouchedPath>, path: &Path) -> String {
    let rel = match layout.relativize(path) {
        Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
        Err(_) => path.display().to_string(),
    };
    if !touched.iter().any(|entry| entry.path == rel) {
        touched.push(TouchedPath {
            path: rel.clone(),
            preexisting: path.exists(),
        });
    }
    rel
}

fn push_step(
    steps: &mut Vec<StepOutcome>,
    seq: &mut u64,
    step: String,
    rel_path: String,
    result: Result<()>,
) -> Result<()> {
    let completed_at_unix = current_unix_timestamp()?;
    let outcome = match result {
        Ok(()) => StepOutcome {
            seq: *seq,
            step,
            state: StepState::Done,
            path: Some(rel_path),
            error: None,
            completed_at_unix,
        },
        Err(err) => StepOutcome {
            seq: *seq,
            step,
            state: StepState::Failed,
            path: Some(rel_path),
            error: Some(format!("{err:#}")),
            completed_at_unix,
        },
    };
    steps.push(outcome);
    *seq += 1;
    Ok(())
}

fn apply_dependency_install(layout: &StateLayout, dependency: &str) -> Result<()> {
    let path = layout.dependency_path(dependency);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut payload = String::new();
    payload.push_str(&format!("name={dependency}\n"));
    payload.push_str(&format!(
        "installed_at_unix={}\n",
        current_unix_timestamp()?
    ));
    fs::write(&path, payload.as_bytes())
        .with_context(|| format!("failed to write dependency receipt: {}", path.display()))
}

fn apply_service_change(layout: &StateLayout, change: &ServiceChange) -> Result<()> {
    let path = layout.service_path(&change.service);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let payload = toml::to_string_pretty(&change.spec).with_context(|| {
        format!("failed to serialize service configuration for '{}'", change.service)
    })?;
    fs::write(&path, payload.as_bytes())
        .with_context(|| format!("failed to write service configuration: {}", path.display()))
}

fn apply_resource_changes(layout: &StateLayout, changes: &[ResourceChange]) -> Result<()> {
    let path = layout.resources_path();
    let mut resources: IndexMap<String, u64> = match fs::read_to_string(&path) {
        Ok(raw) => toml::from_str(&raw)
            .with_context(|| format!("failed to parse resource limits: {}", path.display()))?,
        Err(err) if err.kind() == io::ErrorKind::NotFound => IndexMap::new(),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read resource limits: {}", path.display()));
        }
    };

    for change in changes {
        resources.insert(change.resource.clone(), change.to);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let payload = toml::to_string_pretty(&resources)
        .with_context(|| format!("failed to serialize resource limits: {}", path.display()))?;
    fs::write(&path, payload.as_bytes())
        .with_context(|| format!("failed to write resource limits: {}", path.display()))
}

pub fn parse_dependency_receipt(raw: &str) -> Result<DependencyReceipt> {
    let mut name = None;
    let mut installed_at_unix = None;

    for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key {
            "name" => name = Some(value.to_string()),
            "installed_at_unix" => {
                installed_at_unix = Some(value.parse().context("installed_at_unix must be u64")?)
            }
            _ => {}
        }
    }

    Ok(DependencyReceipt {
        name: name.context("missing name")?,
        installed_at_unix: installed_at_unix.context("missing installed_at_unix")?,
    })
}
