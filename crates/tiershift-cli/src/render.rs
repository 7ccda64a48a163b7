use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Style};
use indicatif::{ProgressBar, ProgressStyle};
use tiershift_core::{
    ChangeDirection, CheckStatus, MigrationPlan, RollbackReport, StepState, TransactionRecord,
};
use tiershift_engine::BackupMetadata;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn current_output_style() -> OutputStyle {
    if std::env::var_os("TIERSHIFT_PLAIN").is_some() || !std::io::stdout().is_terminal() {
        OutputStyle::Plain
    } else {
        OutputStyle::Rich
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

impl TerminalRenderer {
    pub(crate) fn current() -> Self {
        Self {
            style: current_output_style(),
        }
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }

    pub(crate) fn start_spinner(self, label: &str) -> TerminalSpinner {
        let progress_bar = if self.style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg}") {
                progress_bar.set_style(style);
            }
            progress_bar.set_message(label.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };
        TerminalSpinner { progress_bar }
    }
}

pub(crate) struct TerminalSpinner {
    progress_bar: Option<ProgressBar>,
}

impl TerminalSpinner {
    pub(crate) fn finish(self) {
        if let Some(progress_bar) = self.progress_bar {
            progress_bar.finish_and_clear();
        }
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => format!("[{status}] {message}"),
        OutputStyle::Rich => format!("{} {message}", colorize(status_style(status), status)),
    }
}

fn status_style(status: &str) -> Style {
    match status {
        "ok" => Style::new().fg_color(Some(AnsiColor::Green.into())).bold(),
        "error" => Style::new().fg_color(Some(AnsiColor::Red.into())).bold(),
        "warn" => Style::new().fg_color(Some(AnsiColor::Yellow.into())).bold(),
        _ => Style::new().fg_color(Some(AnsiColor::Cyan.into())),
    }
}

fn colorize(style: Style, value: &str) -> String {
    format!("{style}{value}{style:#}")
}

pub(crate) fn render_plan_lines(plan: &MigrationPlan) -> Vec<String> {
    let mut lines = vec![format!("plan: {} -> {}", plan.from_tier, plan.to_tier)];
    if plan.is_empty() {
        lines.push("  no changes; migration is a no-op".to_string());
        return lines;
    }

    for change in &plan.resource_changes {
        lines.push(format!(
            "  resource {}: {} -> {} ({})",
            change.resource,
            change.from,
            change.to,
            direction_label(change.direction)
        ));
    }
    for change in &plan.service_changes {
        lines.push(format!(
            "  service {}: {}",
            change.service,
            change.action.as_str()
        ));
    }
    for change in &plan.dependency_changes {
        lines.push(format!(
            "  dependency {}: {}",
            change.dependency,
            change.action.as_str()
        ));
    }
    lines.push(format!("  estimated downtime: {}", plan.estimated_downtime));
    lines
}

fn direction_label(direction: ChangeDirection) -> &'static str {
    match direction {
        ChangeDirection::Increase => "increase",
        ChangeDirection::Decrease => "decrease",
    }
}

pub(crate) fn render_record_lines(record: &TransactionRecord) -> Vec<String> {
    let mut lines = vec![format!("transaction {} ({})", record.txid, record.operation)];

    for step in &record.steps {
        let marker = match step.state {
            StepState::Done => "done",
            StepState::Failed => "failed",
        };
        let mut line = format!("  step {} {}: {marker}", step.seq, step.step);
        if let Some(error) = &step.error {
            line.push_str(&format!(" ({error})"));
        }
        lines.push(line);
    }

    if let Some(validation) = &record.validation {
        for check in &validation.checks {
            let marker = match check.status {
                CheckStatus::Passed => "passed",
                CheckStatus::Failed => "failed",
                CheckStatus::Skipped => "skipped",
            };
            lines.push(format!(
                "  check {}: {marker} ({})",
                check.name, check.message
            ));
        }
    }

    if let Some(rollback) = &record.rollback {
        lines.push(format!(
            "  rollback: restored={} backup={}",
            rollback.restored,
            rollback.backup_used.as_deref().unwrap_or("none")
        ));
        for error in &rollback.errors {
            lines.push(format!("    rollback error: {error}"));
        }
    }

    lines.push(format!("  status: {}", record.status.as_str()));
    lines
}

pub(crate) fn render_rollback_lines(report: &RollbackReport) -> Vec<String> {
    let mut lines = vec![format!(
        "rollback: restored={} backup={}",
        report.restored,
        report.backup_used.as_deref().unwrap_or("none")
    )];
    for error in &report.errors {
        lines.push(format!("  rollback error: {error}"));
    }
    lines
}

pub(crate) fn render_backup_lines(backups: &[BackupMetadata]) -> Vec<String> {
    backups
        .iter()
        .map(|backup| {
            format!(
                "{}  tier={} files={} created_at_unix={}",
                backup.id,
                backup.tier,
                backup.files.len(),
                backup.created_at_unix
            )
        })
        .collect()
}
