use anyhow::{anyhow, Result};
use tiershift_core::{CapacityTier, MigrationStatus, TransactionRecord};
use tiershift_diff::PlanOptions;
use tiershift_engine::{
    list_all_backups, preview_migration, run_install, run_manual_rollback, run_migration,
    run_uninstall, MigrationRequest, UninstallStatus,
};
use tiershift_store::{
    default_root, list_transaction_records, read_migration_lock, read_transaction_record,
    ConfigStore, StateLayout,
};

use crate::render::{
    render_backup_lines, render_plan_lines, render_record_lines, render_rollback_lines,
    TerminalRenderer,
};
use crate::{completion, Cli, Commands};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let root = match cli.root {
        Some(root) => root,
        None => default_root()?,
    };
    let layout = StateLayout::new(root);
    let store = ConfigStore::new(layout.clone());
    let renderer = TerminalRenderer::current();

    match cli.command {
        Commands::Install { tier } => {
            let tier = CapacityTier::parse(&tier)?;
            let spinner = renderer.start_spinner(&format!("installing tier '{tier}'"));
            let result = run_install(&store, tier);
            spinner.finish();
            let record = result?;
            renderer.print_lines(&render_record_lines(&record));
            ensure_success(&record)?;
        }
        Commands::Plan {
            target,
            allow_downgrade,
            disable_removed_services,
        } => {
            let request = build_request(&target, allow_downgrade, disable_removed_services)?;
            let plan = preview_migration(&store, &request)?;
            renderer.print_lines(&render_plan_lines(&plan));
        }
        Commands::Migrate {
            target,
            allow_downgrade,
            disable_removed_services,
            dry_run,
            json,
        } => {
            let request = build_request(&target, allow_downgrade, disable_removed_services)?;
            let plan = preview_migration(&store, &request)?;
            if !json {
                renderer.print_lines(&render_plan_lines(&plan));
            }
            if dry_run {
                return Ok(());
            }

            let spinner = renderer.start_spinner(&format!("migrating to tier '{}'", request.target));
            let result = run_migration(&store, &request);
            spinner.finish();
            let record = result?;

            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                renderer.print_lines(&render_record_lines(&record));
            }
            ensure_success(&record)?;
        }
        Commands::Rollback { tier } => {
            let tier = tier.map(|value| CapacityTier::parse(&value)).transpose()?;
            let report = run_manual_rollback(&store, tier)?;
            renderer.print_lines(&render_rollback_lines(&report));
            if !report.restored {
                return Err(anyhow!(
                    "rollback did not restore the installation; manual intervention required"
                ));
            }
        }
        Commands::Backups => {
            let backups = list_all_backups(&layout)?;
            if backups.is_empty() {
                renderer.print_status("step", "no backups recorded");
            } else {
                renderer.print_lines(&render_backup_lines(&backups));
            }
        }
        Commands::Uninstall => {
            let outcome = run_uninstall(&store)?;
            match outcome.status {
                UninstallStatus::NotInstalled => {
                    renderer.print_status("step", "no installation present");
                }
                UninstallStatus::Uninstalled => {
                    let tier = outcome
                        .tier
                        .map(|tier| tier.to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    let backup = outcome.backup_id.as_deref().unwrap_or("none");
                    renderer.print_status(
                        "ok",
                        &format!(
                            "uninstalled tier '{tier}' ({} files backed up as {backup})",
                            outcome.removed_paths.len()
                        ),
                    );
                }
            }
        }
        Commands::Status { json } => {
            if json {
                println!("{}", status_json(&store, &layout)?);
            } else {
                renderer.print_lines(&status_lines(&store, &layout)?);
            }
        }
        Commands::Doctor => {
            renderer.print_lines(&doctor_lines(&store, &layout)?);
        }
        Commands::Completions { shell } => {
            completion::write_completions_script(shell, &mut std::io::stdout())?;
        }
    }

    Ok(())
}

fn build_request(
    target: &str,
    allow_downgrade: bool,
    disable_removed_services: bool,
) -> Result<MigrationRequest> {
    Ok(MigrationRequest {
        target: CapacityTier::parse(target)?,
        options: PlanOptions {
            allow_downgrade,
            disable_missing_services: disable_removed_services,
        },
    })
}

fn ensure_success(record: &TransactionRecord) -> Result<()> {
    if record.status == MigrationStatus::Success {
        Ok(())
    } else {
        Err(anyhow!(
            "transaction {} finished with status {}",
            record.txid,
            record.status.as_str()
        ))
    }
}

fn status_lines(store: &ConfigStore, layout: &StateLayout) -> Result<Vec<String>> {
    let mut lines = vec![format!("root: {}", layout.root().display())];

    if store.is_installed() {
        let current = store.load_current()?;
        lines.push(format!("installed tier: {}", current.tier()));
        lines.push(format!(
            "schema version: {}",
            current.metadata.schema_version
        ));
    } else {
        lines.push("installed tier: none".to_string());
    }

    match read_migration_lock(layout)? {
        Some(txid) => lines.push(format!("active migration: {txid}")),
        None => lines.push("active migration: none".to_string()),
    }

    if let Some(record) = list_transaction_records(layout)?.into_iter().next() {
        lines.push(format!(
            "last transaction: {} ({} -> {}, {})",
            record.txid,
            record.from_tier,
            record.to_tier,
            record.status.as_str()
        ));
    }

    Ok(lines)
}

fn status_json(store: &ConfigStore, layout: &StateLayout) -> Result<String> {
    let tier = if store.is_installed() {
        Some(store.load_current()?.tier().to_string())
    } else {
        None
    };
    let last = list_transaction_records(layout)?.into_iter().next();

    let value = serde_json::json!({
        "root": layout.root().display().to_string(),
        "installed": tier.is_some(),
        "tier": tier,
        "active_migration": read_migration_lock(layout)?,
        "last_transaction": last.map(|record| serde_json::json!({
            "txid": record.txid,
            "from_tier": record.from_tier,
            "to_tier": record.to_tier,
            "status": record.status.as_str(),
        })),
    });
    Ok(serde_json::to_string_pretty(&value)?)
}

fn doctor_lines(store: &ConfigStore, layout: &StateLayout) -> Result<Vec<String>> {
    let mut lines = status_lines(store, layout)?;
    lines.push(format!("backups: {}", list_all_backups(layout)?.len()));

    if let Some(txid) = read_migration_lock(layout)? {
        match read_transaction_record(layout, &txid)? {
            Some(record) if record.status == MigrationStatus::FailedUnrecoverable => {
                lines.push(format!(
                    "lock held by unrecoverable transaction {txid}; inspect state, then run 'tiershift rollback'"
                ));
            }
            Some(record) => lines.push(format!(
                "lock held by transaction {txid} (status {})",
                record.status.as_str()
            )),
            None => lines.push(format!(
                "lock held by unknown transaction {txid}; if no migration is running, remove {}",
                layout.lock_path().display()
            )),
        }
    }

    Ok(lines)
}
