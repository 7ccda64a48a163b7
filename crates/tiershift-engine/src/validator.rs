use std::fs;
use std::time::Duration;

use indexmap::IndexMap;
use tiershift_core::{
    CheckStatus, ConfigurationDocument, DependencyAction, MigrationPlan, ServiceSpec,
    ValidationCheck, ValidationResult,
};
use tiershift_store::StateLayout;

use crate::executor::parse_dependency_receipt;

pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

// Checks run in a fixed order and independently: one failing check never
// skips the rest, so the report always shows the full post-migration state.
pub fn validate(
    layout: &StateLayout,
    target: &ConfigurationDocument,
    plan: &MigrationPlan,
) -> ValidationResult {
    let checks = vec![
        check_artifacts_exist(layout, plan),
        check_artifacts_parse(layout, plan),
        check_service_references(layout, target),
        check_runtime_health(target),
    ];
    ValidationResult::from_checks(checks)
}

fn check_artifacts_exist(layout: &StateLayout, plan: &MigrationPlan) -> ValidationCheck {
    let mut problems = Vec::new();

    for change in &plan.dependency_changes {
        let path = layout.dependency_path(&change.dependency);
        match change.action {
            DependencyAction::Install if !path.exists() => {
                problems.push(format!("dependency receipt missing: {}", change.dependency));
            }
            DependencyAction::Remove if path.exists() => {
                problems.push(format!(
                    "dependency receipt still present: {}",
                    change.dependency
                ));
            }
            _ => {}
        }
    }

    for change in &plan.service_changes {
        if !layout.service_path(&change.service).exists() {
            problems.push(format!("service configuration missing: {}", change.service));
        }
    }

    if !plan.resource_changes.is_empty() && !layout.resources_path().exists() {
        problems.push("resource limits file missing".to_string());
    }

    check_from_problems("artifacts-exist", problems, "all expected artifacts present")
}

fn check_artifacts_parse(layout: &StateLayout, plan: &MigrationPlan) -> ValidationCheck {
    let mut problems = Vec::new();

    for change in &plan.dependency_changes {
        if change.action != DependencyAction::Install {
            continue;
        }
        let path = layout.dependency_path(&change.dependency);
        match fs::read_to_string(&path) {
            Ok(raw) => {
                if let Err(err) = parse_dependency_receipt(&raw) {
                    problems.push(format!(
                        "dependency receipt unreadable for '{}': {err:#}",
                        change.dependency
                    ));
                }
            }
            Err(err) => problems.push(format!(
                "dependency receipt unreadable for '{}': {err}",
                change.dependency
            )),
        }
    }

    for change in &plan.service_changes {
        let path = layout.service_path(&change.service);
        match fs::read_to_string(&path) {
            Ok(raw) => {
                if let Err(err) = toml::from_str::<ServiceSpec>(&raw) {
                    problems.push(format!(
                        "service configuration malformed for '{}': {err}",
                        change.service
                    ));
                }
            }
            Err(err) => problems.push(format!(
                "service configuration unreadable for '{}': {err}",
                change.service
            )),
        }
    }

    if !plan.resource_changes.is_empty() {
        let path = layout.resources_path();
        match fs::read_to_string(&path) {
            Ok(raw) => {
                if let Err(err) = toml::from_str::<IndexMap<String, u64>>(&raw) {
                    problems.push(format!("resource limits malformed: {err}"));
                }
            }
            Err(err) => problems.push(format!("resource limits unreadable: {err}")),
        }
    }

    check_from_problems("artifacts-parse", problems, "all written artifacts parse")
}

fn check_service_references(layout: &StateLayout, target: &ConfigurationDocument) -> ValidationCheck {
    let mut problems = Vec::new();

    for (service, spec) in &target.services {
        if !spec.enabled {
            continue;
        }
        for required in &spec.requires {
            if !layout.dependency_path(required).exists() {
                problems.push(format!(
                    "service '{service}' requires '{required}' but no dependency receipt exists"
                ));
            }
        }
    }

    check_from_problems(
        "service-references",
        problems,
        "all service dependency references resolve",
    )
}

fn check_runtime_health(target: &ConfigurationDocument) -> ValidationCheck {
    let name = "runtime-health";
    let Some(endpoint) = target.metadata.health_endpoint.as_deref() else {
        return ValidationCheck {
            name: name.to_string(),
            status: CheckStatus::Skipped,
            message: "no health endpoint configured".to_string(),
        };
    };

    let client = match reqwest::blocking::Client::builder()
        .timeout(HEALTH_CHECK_TIMEOUT)
        .connect_timeout(HEALTH_CHECK_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            return ValidationCheck {
                name: name.to_string(),
                status: CheckStatus::Failed,
                message: format!("failed to build health check client: {err}"),
            };
        }
    };

    match client.get(endpoint).send() {
        Ok(response) if response.status().is_success() => ValidationCheck {
            name: name.to_string(),
            status: CheckStatus::Passed,
            message: format!("{endpoint} responded {}", response.status()),
        },
        Ok(response) => ValidationCheck {
            name: name.to_string(),
            status: CheckStatus::Failed,
            message: format!("{endpoint} responded {}", response.status()),
        },
        Err(err) if err.is_timeout() => ValidationCheck {
            name: name.to_string(),
            status: CheckStatus::Failed,
            message: format!(
                "{endpoint} did not respond within {}s",
                HEALTH_CHECK_TIMEOUT.as_secs()
            ),
        },
        // Nothing listening is a deployment without a live runtime, not a
        // failed migration.
        Err(err) if err.is_connect() => ValidationCheck {
            name: name.to_string(),
            status: CheckStatus::Skipped,
            message: format!("no runtime reachable at {endpoint}"),
        },
        Err(err) => ValidationCheck {
            name: name.to_string(),
            status: CheckStatus::Failed,
            message: format!("health check failed: {err}"),
        },
    }
}

fn check_from_problems(name: &str, problems: Vec<String>, ok_message: &str) -> ValidationCheck {
    if problems.is_empty() {
        ValidationCheck {
            name: name.to_string(),
            status: CheckStatus::Passed,
            message: ok_message.to_string(),
        }
    } else {
        ValidationCheck {
            name: name.to_string(),
            status: CheckStatus::Failed,
            message: problems.join("; "),
        }
    }
}
