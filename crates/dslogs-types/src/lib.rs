//! Shared types for dslogs
//!
//! This crate contains data structures used across multiple dslogs crates.

use serde::Serialize;
use serde_json::{Map, Value};
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::path::{Path, PathBuf};

// ============================================================================
// Discovery Types
// ============================================================================

/// One scheduler-iteration output tree
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RunDirectory {
    pub path: PathBuf,
    pub name: String,
}

impl RunDirectory {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    /// Output directory for this run (`<run_dir>/<out_subdir>`)
    pub fn output_dir(&self, out_subdir: &str) -> PathBuf {
        self.path.join(out_subdir)
    }
}

/// A per-node log file found under a run directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub node: u64,
}

impl LogFile {
    pub fn new(path: PathBuf, node: u64) -> Self {
        Self { path, node }
    }
}

// ============================================================================
// Record Types
// ============================================================================

/// Payload keys copied into flat record fields when present
pub const CORRELATION_KEYS: [&str; 7] = [
    "epoch",
    "round",
    "reason",
    "remote_peer",
    "block_round",
    "block_epoch",
    "block_author",
];

/// Well-known consensus fields lifted out of the embedded payload.
///
/// Values are copied verbatim, so their JSON type is whatever the node logged.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CorrelationFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epoch: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_peer: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_round: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_epoch: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_author: Option<Value>,
}

impl CorrelationFields {
    /// Copy the allow-listed keys present at the top level of `payload`
    pub fn from_payload(payload: &Map<String, Value>) -> Self {
        Self {
            epoch: payload.get("epoch").cloned(),
            round: payload.get("round").cloned(),
            reason: payload.get("reason").cloned(),
            remote_peer: payload.get("remote_peer").cloned(),
            block_round: payload.get("block_round").cloned(),
            block_epoch: payload.get("block_epoch").cloned(),
            block_author: payload.get("block_author").cloned(),
        }
    }

    /// Look up a field by its payload key
    pub fn get(&self, key: &str) -> Option<&Value> {
        match key {
            "epoch" => self.epoch.as_ref(),
            "round" => self.round.as_ref(),
            "reason" => self.reason.as_ref(),
            "remote_peer" => self.remote_peer.as_ref(),
            "block_round" => self.block_round.as_ref(),
            "block_epoch" => self.block_epoch.as_ref(),
            "block_author" => self.block_author.as_ref(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        CORRELATION_KEYS.iter().all(|k| self.get(k).is_none())
    }
}

/// A log line that passed relevance filtering
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogRecord {
    /// ISO-8601 UTC timestamp, as written by the node
    pub ts: String,

    /// Thread or component label (e.g. `consensus-4`)
    pub thread: String,

    /// Level as written (INFO, DEBUG, WARN, ERROR, ...)
    pub level: String,

    /// Source module path
    pub target: String,

    /// Source line number
    pub line: u64,

    /// Raw message text
    pub msg: String,

    /// Embedded JSON payload (if one decoded)
    #[serde(rename = "json", skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,

    /// `event` string from the payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    #[serde(flatten)]
    pub fields: CorrelationFields,
}

impl LogRecord {
    /// Pretty text form: timestamp and raw message only
    pub fn pretty_line(&self) -> String {
        format!("{} {}", self.ts, self.msg)
    }
}

/// A record plus provenance, built right before it is written
#[derive(Clone, Copy, Debug, Serialize)]
pub struct EnrichedRecord<'a> {
    #[serde(flatten)]
    pub record: &'a LogRecord,

    #[serde(serialize_with = "serialize_path")]
    pub source_file: &'a Path,

    pub run_dir: &'a str,

    pub node: u64,
}

impl<'a> EnrichedRecord<'a> {
    pub fn new(record: &'a LogRecord, source_file: &'a Path, run_dir: &'a str, node: u64) -> Self {
        Self {
            record,
            source_file,
            run_dir,
            node,
        }
    }
}

fn serialize_path<S>(path: &&Path, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&path.to_string_lossy())
}

// ============================================================================
// Counting
// ============================================================================

/// Lines read vs records written
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    pub scanned: u64,
    pub kept: u64,
}

impl Counts {
    pub fn new(scanned: u64, kept: u64) -> Self {
        Self { scanned, kept }
    }
}

impl Add for Counts {
    type Output = Counts;

    fn add(self, rhs: Counts) -> Counts {
        Counts {
            scanned: self.scanned + rhs.scanned,
            kept: self.kept + rhs.kept,
        }
    }
}

impl AddAssign for Counts {
    fn add_assign(&mut self, rhs: Counts) {
        *self = *self + rhs;
    }
}

impl Sum for Counts {
    fn sum<I: Iterator<Item = Counts>>(iter: I) -> Counts {
        iter.fold(Counts::default(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> LogRecord {
        LogRecord {
            ts: "2026-02-17T11:09:41.177185Z".to_string(),
            thread: "consensus-4".to_string(),
            level: "INFO".to_string(),
            target: "consensus/src/round_manager.rs".to_string(),
            line: 1023,
            msg: r#"vote sent {"event":"Vote","epoch":2,"round":51}"#.to_string(),
            payload: None,
            event: None,
            fields: CorrelationFields::default(),
        }
    }

    #[test]
    fn test_correlation_fields_from_payload() {
        let payload = json!({"event": "Vote", "epoch": 2, "round": 51, "other": true});
        let fields = CorrelationFields::from_payload(payload.as_object().unwrap());
        assert_eq!(fields.epoch, Some(json!(2)));
        assert_eq!(fields.round, Some(json!(51)));
        assert!(fields.reason.is_none());
        assert!(fields.get("other").is_none());
    }

    #[test]
    fn test_null_correlation_value_is_kept() {
        let payload = json!({"block_author": null});
        let fields = CorrelationFields::from_payload(payload.as_object().unwrap());
        assert_eq!(fields.block_author, Some(Value::Null));
        assert!(!fields.is_empty());
    }

    #[test]
    fn test_enriched_record_serialization() {
        let mut rec = record();
        let payload = json!({"event": "Vote", "epoch": 2, "round": 51});
        rec.fields = CorrelationFields::from_payload(payload.as_object().unwrap());
        rec.payload = payload.as_object().cloned();
        rec.event = Some("Vote".to_string());

        let path = Path::new("/runs/a/stdout_3.log");
        let enriched = EnrichedRecord::new(&rec, path, "a", 3);
        let value = serde_json::to_value(enriched).unwrap();

        assert_eq!(value["ts"], "2026-02-17T11:09:41.177185Z");
        assert_eq!(value["line"], 1023);
        assert_eq!(value["event"], "Vote");
        assert_eq!(value["epoch"], 2);
        assert_eq!(value["round"], 51);
        assert_eq!(value["json"]["event"], "Vote");
        assert_eq!(value["source_file"], "/runs/a/stdout_3.log");
        assert_eq!(value["run_dir"], "a");
        assert_eq!(value["node"], 3);
        assert!(value.get("reason").is_none());
    }

    #[test]
    fn test_absent_payload_is_omitted() {
        let rec = record();
        let path = Path::new("stdout_0.log");
        let line = serde_json::to_string(&EnrichedRecord::new(&rec, path, "run", 0)).unwrap();
        assert!(!line.contains("\"json\""));
        assert!(!line.contains("\"event\""));
        assert!(line.starts_with(r#"{"ts":"#));
    }

    #[test]
    fn test_pretty_line() {
        let rec = record();
        assert_eq!(
            rec.pretty_line(),
            r#"2026-02-17T11:09:41.177185Z vote sent {"event":"Vote","epoch":2,"round":51}"#
        );
    }

    #[test]
    fn test_counts_sum() {
        let total: Counts = [Counts::new(10, 2), Counts::new(5, 5), Counts::default()]
            .into_iter()
            .sum();
        assert_eq!(total, Counts::new(15, 7));
    }

    #[test]
    fn test_run_directory_name() {
        let run = RunDirectory::new(PathBuf::from("/out/aptos-localnet_pct_0"));
        assert_eq!(run.name, "aptos-localnet_pct_0");
        assert_eq!(
            run.output_dir("filtered"),
            PathBuf::from("/out/aptos-localnet_pct_0/filtered")
        );
    }
}
