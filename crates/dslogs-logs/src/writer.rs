use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use dslogs_types::{EnrichedRecord, LogRecord};

use crate::error::SinkError;

/// Combined JSONL output name
pub const ALL_NODES_JSONL: &str = "all_nodes.jsonl";

/// Combined pretty output name
pub const ALL_NODES_LOG: &str = "all_nodes.log";

pub fn node_jsonl_name(node: u64) -> String {
    format!("node{node}.jsonl")
}

pub fn node_log_name(node: u64) -> String {
    format!("node{node}.log")
}

/// One truncated, buffered output file
struct Sink {
    path: PathBuf,
    out: BufWriter<File>,
}

impl Sink {
    fn create(path: PathBuf) -> Result<Self, SinkError> {
        match File::create(&path) {
            Ok(file) => Ok(Self {
                out: BufWriter::new(file),
                path,
            }),
            Err(source) => Err(SinkError::Open { path, source }),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
        self.out
            .write_all(line.as_bytes())
            .and_then(|()| self.out.write_all(b"\n"))
            .map_err(|source| SinkError::Write {
                path: self.path.clone(),
                source,
            })
    }

    fn close(mut self) -> Result<(), SinkError> {
        self.out.flush().map_err(|source| SinkError::Flush {
            path: self.path.clone(),
            source,
        })
    }
}

/// JSONL + pretty pair
struct SinkPair {
    jsonl: Sink,
    pretty: Sink,
}

impl SinkPair {
    fn create(dir: &Path, jsonl: &str, pretty: &str) -> Result<Self, SinkError> {
        Ok(Self {
            jsonl: Sink::create(dir.join(jsonl))?,
            pretty: Sink::create(dir.join(pretty))?,
        })
    }

    fn write(&mut self, json_line: &str, pretty_line: &str) -> Result<(), SinkError> {
        self.jsonl.write_line(json_line)?;
        self.pretty.write_line(pretty_line)
    }

    fn close(self) -> Result<(), SinkError> {
        let jsonl = self.jsonl.close();
        let pretty = self.pretty.close();
        jsonl.and(pretty)
    }
}

/// Fans each record out to its node's outputs and the combined outputs of
/// one run directory.
///
/// Dropping the writer closes every sink; call [`MultiplexedWriter::finish`]
/// to observe flush errors.
pub struct MultiplexedWriter {
    out_dir: PathBuf,
    run_name: String,
    combined: SinkPair,
    nodes: HashMap<u64, SinkPair>,
}

impl MultiplexedWriter {
    /// Create `out_dir` (and parents) and open the combined outputs
    pub fn create(out_dir: impl Into<PathBuf>, run_name: impl Into<String>) -> Result<Self, SinkError> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir).map_err(|source| SinkError::CreateDir {
            path: out_dir.clone(),
            source,
        })?;
        let combined = SinkPair::create(&out_dir, ALL_NODES_JSONL, ALL_NODES_LOG)?;

        Ok(Self {
            out_dir,
            run_name: run_name.into(),
            combined,
            nodes: HashMap::new(),
        })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Nodes that have received at least one record
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Write one record to the node's outputs and the combined outputs.
    ///
    /// Both lines are rendered before any sink is touched; the first sink
    /// error aborts the fan-out and is returned.
    pub fn write(&mut self, record: &LogRecord, source: &Path, node: u64) -> Result<(), SinkError> {
        let enriched = EnrichedRecord::new(record, source, &self.run_name, node);
        let json_line = serde_json::to_string(&enriched)?;
        let pretty_line = record.pretty_line();

        let node_sinks = match self.nodes.entry(node) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => e.insert(SinkPair::create(
                &self.out_dir,
                &node_jsonl_name(node),
                &node_log_name(node),
            )?),
        };
        node_sinks.write(&json_line, &pretty_line)?;
        self.combined.write(&json_line, &pretty_line)
    }

    /// Flush and close every sink, reporting the first failure
    pub fn finish(self) -> Result<(), SinkError> {
        let mut first_err = None;
        for (_, pair) in self.nodes {
            if let Err(e) = pair.close() {
                first_err.get_or_insert(e);
            }
        }
        if let Err(e) = self.combined.close() {
            first_err.get_or_insert(e);
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dslogs_types::CorrelationFields;

    fn record(msg: &str) -> LogRecord {
        LogRecord {
            ts: "2026-02-17T11:09:41.177185Z".to_string(),
            thread: "consensus-1".to_string(),
            level: "INFO".to_string(),
            target: "consensus/src/lib.rs".to_string(),
            line: 7,
            msg: msg.to_string(),
            payload: None,
            event: None,
            fields: CorrelationFields::default(),
        }
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_combined_outputs_exist_without_records() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run").join("filtered");
        let writer = MultiplexedWriter::create(&out, "run").unwrap();
        writer.finish().unwrap();

        assert_eq!(fs::read_to_string(out.join(ALL_NODES_JSONL)).unwrap(), "");
        assert_eq!(fs::read_to_string(out.join(ALL_NODES_LOG)).unwrap(), "");
        assert!(!out.join("node0.jsonl").exists());
    }

    #[test]
    fn test_fan_out_per_node_and_combined() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = MultiplexedWriter::create(dir.path(), "run_a").unwrap();
        let src0 = dir.path().join("stdout_0.log");
        let src1 = dir.path().join("stderr_1.log");

        writer.write(&record("NewRound 1"), &src0, 0).unwrap();
        writer.write(&record("Vote 1"), &src1, 1).unwrap();
        writer.write(&record("NewRound 2"), &src0, 0).unwrap();
        assert_eq!(writer.node_count(), 2);
        writer.finish().unwrap();

        assert_eq!(
            read_lines(&dir.path().join("node0.log")),
            vec![
                "2026-02-17T11:09:41.177185Z NewRound 1",
                "2026-02-17T11:09:41.177185Z NewRound 2"
            ]
        );
        assert_eq!(read_lines(&dir.path().join("node1.log")).len(), 1);
        assert_eq!(read_lines(&dir.path().join(ALL_NODES_LOG)).len(), 3);

        let combined = read_lines(&dir.path().join(ALL_NODES_JSONL));
        assert_eq!(combined.len(), 3);
        let second: serde_json::Value = serde_json::from_str(&combined[1]).unwrap();
        assert_eq!(second["node"], 1);
        assert_eq!(second["run_dir"], "run_a");
        assert_eq!(second["msg"], "Vote 1");
        assert_eq!(second["source_file"], src1.to_string_lossy().into_owned());
    }

    #[test]
    fn test_existing_outputs_are_truncated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("node0.log"), "stale\nstale\n").unwrap();
        fs::write(dir.path().join(ALL_NODES_LOG), "stale\n").unwrap();

        let mut writer = MultiplexedWriter::create(dir.path(), "run").unwrap();
        writer
            .write(&record("NewEpoch"), &dir.path().join("stdout_0.log"), 0)
            .unwrap();
        writer.finish().unwrap();

        assert_eq!(
            read_lines(&dir.path().join("node0.log")),
            vec!["2026-02-17T11:09:41.177185Z NewEpoch"]
        );
        assert_eq!(read_lines(&dir.path().join(ALL_NODES_LOG)).len(), 1);
    }

    #[test]
    fn test_out_dir_blocked_by_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("filtered");
        fs::write(&blocker, "not a dir").unwrap();

        let err = MultiplexedWriter::create(&blocker, "run").err().unwrap();
        assert!(matches!(err, SinkError::CreateDir { .. }));
    }

    #[test]
    fn test_node_sink_open_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        // A directory squatting on the node output name
        fs::create_dir_all(dir.path().join("node5.jsonl")).unwrap();

        let mut writer = MultiplexedWriter::create(dir.path(), "run").unwrap();
        let err = writer
            .write(&record("Vote"), &dir.path().join("stdout_5.log"), 5)
            .unwrap_err();
        assert!(matches!(err, SinkError::Open { .. }));
        writer.finish().unwrap();

        // Nothing reached the combined output for the failed record
        assert_eq!(fs::read_to_string(dir.path().join(ALL_NODES_JSONL)).unwrap(), "");
    }
}
