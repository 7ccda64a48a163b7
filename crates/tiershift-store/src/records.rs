use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tiershift_core::TransactionRecord;

use crate::StateLayout;

pub fn write_transaction_record(
    layout: &StateLayout,
    record: &TransactionRecord,
) -> Result<PathBuf> {
    let path = layout.transaction_record_path(&record.txid);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(record)
        .with_context(|| format!("failed serializing transaction record: {}", path.display()))?;
    fs::write(&path, content)
        .with_context(|| format!("failed writing transaction record: {}", path.display()))?;
    Ok(path)
}

pub fn read_transaction_record(
    layout: &StateLayout,
    txid: &str,
) -> Result<Option<TransactionRecord>> {
    let path = layout.transaction_record_path(txid);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed reading transaction record: {}", path.display()));
        }
    };

    let record = serde_json::from_str(&raw)
        .with_context(|| format!("failed parsing transaction record: {}", path.display()))?;
    Ok(Some(record))
}

pub fn list_transaction_records(layout: &StateLayout) -> Result<Vec<TransactionRecord>> {
    let dir = layout.transactions_dir();
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    for entry in fs::read_dir(&dir)
        .with_context(|| format!("failed to read transactions directory: {}", dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|v| v.to_str()) != Some("json") {
            continue;
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading transaction record: {}", path.display()))?;
        let record: TransactionRecord = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing transaction record: {}", path.display()))?;
        records.push(record);
    }

    records.sort_by(|a, b| {
        b.started_at_unix
            .cmp(&a.started_at_unix)
            .then_with(|| b.txid.cmp(&a.txid))
    });
    Ok(records)
}
