use tiershift_core::{
    CapacityTier, ChangeDirection, ConfigurationDocument, DependencyAction, MigrationError,
    ServiceAction,
};

use crate::{diff, PlanOptions};

fn small_document() -> ConfigurationDocument {
    ConfigurationDocument::from_toml_str(
        r#"
dependencies = ["redis"]

[metadata]
tier = "small"
schema_version = "1.0.0"

[resources]
memory_mb = 4096
cpu_cores = 2

[services.cache]
enabled = true
requires = ["redis"]
"#,
    )
    .expect("small document should parse")
}

fn medium_document() -> ConfigurationDocument {
    ConfigurationDocument::from_toml_str(
        r#"
dependencies = ["redis", "queue-broker"]

[metadata]
tier = "medium"
schema_version = "1.0.0"

[resources]
memory_mb = 8192
cpu_cores = 4

[services.cache]
enabled = true
requires = ["redis"]

[services.queue]
enabled = true
requires = ["queue-broker"]
"#,
    )
    .expect("medium document should parse")
}

#[test]
fn diff_on_equal_documents_is_empty() {
    let document = medium_document();
    let plan = diff(&document, &document, &PlanOptions::default()).expect("diff must succeed");
    assert!(plan.is_empty());
    assert_eq!(plan.estimated_downtime, "none");
}

#[test]
fn diff_is_deterministic() {
    let from = small_document();
    let to = medium_document();
    let first = diff(&from, &to, &PlanOptions::default()).expect("diff must succeed");
    let second = diff(&from, &to, &PlanOptions::default()).expect("diff must succeed");
    assert_eq!(first, second);
}

#[test]
fn upgrade_plan_covers_resources_services_and_dependencies() {
    let plan = diff(&small_document(), &medium_document(), &PlanOptions::default())
        .expect("diff must succeed");

    assert_eq!(plan.from_tier, CapacityTier::Small);
    assert_eq!(plan.to_tier, CapacityTier::Medium);
    assert!(!plan.is_downgrade());

    assert_eq!(plan.resource_changes.len(), 2);
    let memory = &plan.resource_changes[0];
    assert_eq!(memory.resource, "memory_mb");
    assert_eq!(memory.from, 4096);
    assert_eq!(memory.to, 8192);
    assert_eq!(memory.direction, ChangeDirection::Increase);
    let cpu = &plan.resource_changes[1];
    assert_eq!(cpu.resource, "cpu_cores");
    assert_eq!(cpu.from, 2);
    assert_eq!(cpu.to, 4);

    assert_eq!(plan.service_changes.len(), 1);
    assert_eq!(plan.service_changes[0].action, ServiceAction::Enable);
    assert_eq!(plan.service_changes[0].service, "queue");

    assert_eq!(plan.dependency_changes.len(), 1);
    assert_eq!(plan.dependency_changes[0].action, DependencyAction::Install);
    assert_eq!(plan.dependency_changes[0].dependency, "queue-broker");
}

#[test]
fn resource_missing_in_from_is_treated_as_zero() {
    let from = small_document();
    let mut to = medium_document();
    to.resources.insert("disk_gb".to_string(), 100);

    let plan = diff(&from, &to, &PlanOptions::default()).expect("diff must succeed");
    let disk = plan
        .resource_changes
        .iter()
        .find(|change| change.resource == "disk_gb")
        .expect("disk change must be planned");
    assert_eq!(disk.from, 0);
    assert_eq!(disk.to, 100);
    assert_eq!(disk.direction, ChangeDirection::Increase);
}

#[test]
fn unchanged_resources_are_omitted() {
    let from = small_document();
    let mut to = medium_document();
    to.resources.insert("memory_mb".to_string(), 4096);
    to.resources.insert("cpu_cores".to_string(), 2);

    let plan = diff(&from, &to, &PlanOptions::default()).expect("diff must succeed");
    assert!(plan.resource_changes.is_empty());
}

#[test]
fn changed_service_params_produce_update_action() {
    let from = medium_document();
    let mut to = medium_document();
    to.services
        .get_mut("cache")
        .expect("cache service")
        .params
        .insert("max_entries".to_string(), "50000".to_string());

    let plan = diff(&from, &to, &PlanOptions::default()).expect("diff must succeed");
    assert_eq!(plan.service_changes.len(), 1);
    assert_eq!(plan.service_changes[0].action, ServiceAction::Update);
    assert_eq!(plan.service_changes[0].service, "cache");
}

#[test]
fn services_missing_from_target_are_kept_by_default() {
    let plan = diff(&medium_document(), &small_document(), &PlanOptions {
        allow_downgrade: true,
        disable_missing_services: false,
    })
    .expect("diff must succeed");

    assert!(plan
        .service_changes
        .iter()
        .all(|change| change.action != ServiceAction::Disable));
}

#[test]
fn disable_opt_in_plans_disable_actions() {
    let plan = diff(&medium_document(), &small_document(), &PlanOptions {
        allow_downgrade: true,
        disable_missing_services: true,
    })
    .expect("diff must succeed");

    let disable = plan
        .service_changes
        .iter()
        .find(|change| change.action == ServiceAction::Disable)
        .expect("queue must be planned for disable");
    assert_eq!(disable.service, "queue");
    assert!(!disable.spec.enabled);
}

#[test]
fn downgrade_requires_opt_in() {
    let err = diff(&medium_document(), &small_document(), &PlanOptions::default())
        .expect_err("downgrade without opt-in must fail");
    match err.downcast_ref::<MigrationError>() {
        Some(MigrationError::DowngradeNotAllowed { from, to }) => {
            assert_eq!(*from, CapacityTier::Medium);
            assert_eq!(*to, CapacityTier::Small);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    diff(&medium_document(), &small_document(), &PlanOptions {
        allow_downgrade: true,
        disable_missing_services: false,
    })
    .expect("downgrade with opt-in must plan");
}

#[test]
fn downgrade_plans_dependency_removal_in_from_order() {
    let plan = diff(&medium_document(), &small_document(), &PlanOptions {
        allow_downgrade: true,
        disable_missing_services: false,
    })
    .expect("diff must succeed");

    assert_eq!(plan.dependency_changes.len(), 1);
    assert_eq!(plan.dependency_changes[0].action, DependencyAction::Remove);
    assert_eq!(plan.dependency_changes[0].dependency, "queue-broker");
}

#[test]
fn empty_target_document_is_rejected() {
    let from = small_document();
    let empty_target = ConfigurationDocument::from_toml_str(
        r#"
dependencies = []

[metadata]
tier = "medium"
schema_version = "1.0.0"

[resources]

[services]
"#,
    )
    .expect("empty target should parse");

    let err = diff(&from, &empty_target, &PlanOptions::default())
        .expect_err("empty target must be rejected");
    assert!(matches!(
        err.downcast_ref::<MigrationError>(),
        Some(MigrationError::InvalidMigration(_))
    ));
}

#[test]
fn plan_preserves_target_declaration_order() {
    let from = ConfigurationDocument::baseline(CapacityTier::Small);
    let to = medium_document();
    let plan = diff(&from, &to, &PlanOptions::default()).expect("diff must succeed");

    let services: Vec<&str> = plan
        .service_changes
        .iter()
        .map(|change| change.service.as_str())
        .collect();
    assert_eq!(services, vec!["cache", "queue"]);

    let dependencies: Vec<&str> = plan
        .dependency_changes
        .iter()
        .map(|change| change.dependency.as_str())
        .collect();
    assert_eq!(dependencies, vec!["redis", "queue-broker"]);
}
