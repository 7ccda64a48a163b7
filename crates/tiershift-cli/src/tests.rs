use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use clap::Parser;
use tiershift_core::{
    CapacityTier, CheckStatus, MigrationPlan, MigrationStatus, RollbackReport, StepOutcome,
    StepState, TransactionRecord, ValidationCheck, ValidationResult,
};
use tiershift_store::{ConfigStore, StateLayout};

use crate::dispatch::run_cli;
use crate::render::{
    render_plan_lines, render_record_lines, render_status_line, OutputStyle,
};
use crate::{Cli, Commands};

static TEST_DIR_SEQ: AtomicU64 = AtomicU64::new(0);

const SMALL_TIER: &str = r#"
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
"#;

const MEDIUM_TIER: &str = r#"
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
"#;

const MEDIUM_TIER_BROKEN_REFERENCE: &str = r#"
dependencies = ["redis", "queue-broker"]

[metadata]
tier = "medium"
schema_version = "1.0.0"

[resources]
memory_mb = 8192

[services.queue]
enabled = true
requires = ["rabbitmq"]
"#;

fn test_root() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let seq = TEST_DIR_SEQ.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!("tiershift-cli-test-{nanos}-{seq}"))
}

fn seed_tiers(root: &PathBuf, medium_content: &str) {
    let layout = StateLayout::new(root.clone());
    fs::create_dir_all(layout.tiers_dir()).expect("must create tiers dir");
    fs::write(layout.tier_path(CapacityTier::Small), SMALL_TIER)
        .expect("must write small tier");
    fs::write(layout.tier_path(CapacityTier::Medium), medium_content)
        .expect("must write medium tier");
}

fn sample_plan() -> MigrationPlan {
    MigrationPlan {
        from_tier: CapacityTier::Small,
        to_tier: CapacityTier::Medium,
        resource_changes: vec![tiershift_core::ResourceChange {
            resource: "memory_mb".to_string(),
            from: 4096,
            to: 8192,
            direction: tiershift_core::ChangeDirection::Increase,
        }],
        service_changes: vec![tiershift_core::ServiceChange {
            action: tiershift_core::ServiceAction::Enable,
            service: "queue".to_string(),
            spec: tiershift_core::ServiceSpec {
                enabled: true,
                requires: vec!["queue-broker".to_string()],
                params: Default::default(),
            },
        }],
        dependency_changes: vec![tiershift_core::DependencyChange {
            action: tiershift_core::DependencyAction::Install,
            dependency: "queue-broker".to_string(),
        }],
        estimated_downtime: "~10s".to_string(),
    }
}

#[test]
fn parse_migrate_arguments() {
    let cli = Cli::try_parse_from([
        "tiershift",
        "migrate",
        "medium",
        "--allow-downgrade",
        "--dry-run",
    ])
    .expect("arguments must parse");

    match cli.command {
        Commands::Migrate {
            target,
            allow_downgrade,
            disable_removed_services,
            dry_run,
            json,
        } => {
            assert_eq!(target, "medium");
            assert!(allow_downgrade);
            assert!(!disable_removed_services);
            assert!(dry_run);
            assert!(!json);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_rollback_with_optional_tier() {
    let cli = Cli::try_parse_from(["tiershift", "rollback"]).expect("arguments must parse");
    assert!(matches!(cli.command, Commands::Rollback { tier: None }));

    let cli =
        Cli::try_parse_from(["tiershift", "rollback", "small"]).expect("arguments must parse");
    match cli.command {
        Commands::Rollback { tier } => assert_eq!(tier.as_deref(), Some("small")),
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parse_rejects_unknown_subcommand() {
    assert!(Cli::try_parse_from(["tiershift", "teleport"]).is_err());
}

#[test]
fn status_line_plain_format() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "migration complete"),
        "[ok] migration complete"
    );
}

#[test]
fn plan_lines_cover_every_change() {
    let lines = render_plan_lines(&sample_plan());
    assert_eq!(lines[0], "plan: small -> medium");
    assert!(lines.contains(&"  resource memory_mb: 4096 -> 8192 (increase)".to_string()));
    assert!(lines.contains(&"  service queue: enable".to_string()));
    assert!(lines.contains(&"  dependency queue-broker: install".to_string()));
    assert!(lines.contains(&"  estimated downtime: ~10s".to_string()));
}

#[test]
fn record_lines_include_steps_checks_and_rollback() {
    let record = TransactionRecord {
        version: 1,
        txid: "tx-1-1".to_string(),
        operation: "migrate".to_string(),
        from_tier: CapacityTier::Small,
        to_tier: CapacityTier::Medium,
        started_at_unix: 1,
        finished_at_unix: 2,
        backup_id: Some("small-1-1-0000".to_string()),
        plan: sample_plan(),
        steps: vec![StepOutcome {
            seq: 1,
            step: "install_dependency:queue-broker".to_string(),
            state: StepState::Done,
            path: Some("app/deps/queue-broker.dep".to_string()),
            error: None,
            completed_at_unix: 1,
        }],
        validation: Some(ValidationResult::from_checks(vec![ValidationCheck {
            name: "service-references".to_string(),
            status: CheckStatus::Failed,
            message: "service 'queue' requires 'rabbitmq'".to_string(),
        }])),
        rollback: Some(RollbackReport {
            restored: true,
            backup_used: Some("small-1-1-0000".to_string()),
            errors: Vec::new(),
        }),
        status: MigrationStatus::RolledBack,
    };

    let lines = render_record_lines(&record);
    assert_eq!(lines[0], "transaction tx-1-1 (migrate)");
    assert!(lines.contains(&"  step 1 install_dependency:queue-broker: done".to_string()));
    assert!(lines
        .iter()
        .any(|line| line.contains("check service-references: failed")));
    assert!(lines
        .iter()
        .any(|line| line.contains("rollback: restored=true backup=small-1-1-0000")));
    assert_eq!(lines.last().map(String::as_str), Some("  status: rolled_back"));
}

#[test]
fn install_then_migrate_through_cli() {
    let root = test_root();
    seed_tiers(&root, MEDIUM_TIER);

    run_cli(Cli {
        root: Some(root.clone()),
        command: Commands::Install {
            tier: "small".to_string(),
        },
    })
    .expect("install must succeed");

    run_cli(Cli {
        root: Some(root.clone()),
        command: Commands::Migrate {
            target: "medium".to_string(),
            allow_downgrade: false,
            disable_removed_services: false,
            dry_run: false,
            json: false,
        },
    })
    .expect("migration must succeed");

    let store = ConfigStore::new(StateLayout::new(root.clone()));
    assert_eq!(
        store.load_current().expect("must load current").tier(),
        CapacityTier::Medium
    );

    run_cli(Cli {
        root: Some(root.clone()),
        command: Commands::Status { json: false },
    })
    .expect("status must succeed");

    let _ = fs::remove_dir_all(root);
}

#[test]
fn dry_run_migrate_does_not_mutate() {
    let root = test_root();
    seed_tiers(&root, MEDIUM_TIER);

    run_cli(Cli {
        root: Some(root.clone()),
        command: Commands::Install {
            tier: "small".to_string(),
        },
    })
    .expect("install must succeed");

    run_cli(Cli {
        root: Some(root.clone()),
        command: Commands::Migrate {
            target: "medium".to_string(),
            allow_downgrade: false,
            disable_removed_services: false,
            dry_run: true,
            json: false,
        },
    })
    .expect("dry run must succeed");

    let store = ConfigStore::new(StateLayout::new(root.clone()));
    assert_eq!(
        store.load_current().expect("must load current").tier(),
        CapacityTier::Small
    );

    let _ = fs::remove_dir_all(root);
}

#[test]
fn rolled_back_migration_exits_with_error() {
    let root = test_root();
    seed_tiers(&root, MEDIUM_TIER_BROKEN_REFERENCE);

    run_cli(Cli {
        root: Some(root.clone()),
        command: Commands::Install {
            tier: "small".to_string(),
        },
    })
    .expect("install must succeed");

    let err = run_cli(Cli {
        root: Some(root.clone()),
        command: Commands::Migrate {
            target: "medium".to_string(),
            allow_downgrade: false,
            disable_removed_services: false,
            dry_run: false,
            json: false,
        },
    })
    .expect_err("rolled back migration must exit non-zero");
    assert!(err.to_string().contains("rolled_back"));

    let store = ConfigStore::new(StateLayout::new(root.clone()));
    assert_eq!(
        store.load_current().expect("must load current").tier(),
        CapacityTier::Small
    );

    let _ = fs::remove_dir_all(root);
}

#[test]
fn uninstall_then_status_reports_no_installation() {
    let root = test_root();
    seed_tiers(&root, MEDIUM_TIER);

    run_cli(Cli {
        root: Some(root.clone()),
        command: Commands::Install {
            tier: "small".to_string(),
        },
    })
    .expect("install must succeed");

    run_cli(Cli {
        root: Some(root.clone()),
        command: Commands::Uninstall,
    })
    .expect("uninstall must succeed");

    let store = ConfigStore::new(StateLayout::new(root.clone()));
    assert!(!store.is_installed());

    run_cli(Cli {
        root: Some(root.clone()),
        command: Commands::Status { json: true },
    })
    .expect("status must succeed");

    let _ = fs::remove_dir_all(root);
}
