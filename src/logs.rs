use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::Path,
};

use anyhow::{Context, Result};
use chrono::prelude::*;
use quadsim::Snapshot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Deserialize, Serialize)]
pub struct SnapshotLog {
    pub timestamp: i64,
    pub snapshot: Snapshot,
}

// Append the current snapshot to this hour's log file
pub fn write_log(dir: &str, snapshot: &Snapshot) -> Result<()> {
    write_log_at(dir, Utc::now(), snapshot)
}

fn write_log_at(dir: &str, now: DateTime<Utc>, snapshot: &Snapshot) -> Result<()> {
    fs::create_dir_all(dir)?;
    let path = Path::new(dir).join(filename(&now));
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{},{}", now.timestamp(), serde_json::to_string(snapshot)?)?;
    Ok(())
}

// Read logs for a given day and hour
pub fn read_logs(dir: &str, date: &str, hour: &str) -> Result<Vec<SnapshotLog>> {
    let path = Path::new(dir).join(format!("{}-{}", date, hour));
    let file = File::open(&path).with_context(|| format!("no log at {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut logs: Vec<SnapshotLog> = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let (timestamp, snapshot) = line.split_once(',').context("invalid log format")?;
        logs.push(SnapshotLog {
            timestamp: timestamp.parse()?,
            snapshot: serde_json::from_str(snapshot)?,
        });
    }
    Ok(logs)
}

// One file per hour, e.g. 2021-05-01-13
fn filename(now: &DateTime<Utc>) -> String {
    now.format("%Y-%m-%d-%H").to_string()
}
