//! JSON-lines result sinks.
//!
//! Every worker owns exactly one sink for the scenario it is driving and
//! appends one serialized [`Outcome`](crate::attack::Outcome) per line as
//! the attack progresses. File names embed the run id, scenario name and
//! connection index, so no two workers ever share a stream.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::attack::Outcome;

/// Errors raised while writing result records.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("result file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding result record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Builds the per-worker output file name.
pub fn output_file_name(run_id: &str, scenario: &str, connection_index: usize) -> String {
    format!("{run_id}_{scenario}_{connection_index}.json")
}

/// Append-only JSON-lines writer for attack outcomes.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    /// Creates the output directory if needed and opens the result file.
    pub fn create(directory: &Path, file_name: &str) -> Result<Self, SinkError> {
        fs::create_dir_all(directory)?;
        let path = directory.join(file_name);
        let writer = BufWriter::new(File::create(&path)?);
        Ok(Self { path, writer })
    }

    /// Appends one outcome as a single JSON line.
    pub fn write(&mut self, outcome: &Outcome) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, outcome)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn outcome(seq: u64) -> Outcome {
        Outcome {
            attack: "list-clusters".to_string(),
            seq,
            code: 200,
            timestamp: Utc::now(),
            latency: 2_000_000,
            bytes_out: 0,
            bytes_in: 128,
            error: String::new(),
        }
    }

    #[test]
    fn test_output_file_name_embeds_worker_identity() {
        assert_eq!(
            output_file_name("abc123", "list-clusters", 2),
            "abc123_list-clusters_2.json"
        );
    }

    #[test]
    fn test_write_appends_one_line_per_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = JsonLinesSink::create(dir.path(), "run_list-clusters_0.json").unwrap();
        sink.write(&outcome(0)).unwrap();
        sink.write(&outcome(1)).unwrap();
        sink.flush().unwrap();

        let contents = fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for (expected_seq, line) in lines.iter().enumerate() {
            let parsed: Outcome = serde_json::from_str(line).unwrap();
            assert_eq!(parsed.seq, expected_seq as u64);
            assert_eq!(parsed.attack, "list-clusters");
        }
    }

    #[test]
    fn test_create_builds_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("results").join("nightly");
        let sink = JsonLinesSink::create(&nested, "run_create-cluster_0.json").unwrap();
        assert!(sink.path().exists());
    }
}
