//! Per-run artifacts: the delimited sample log, the JSON summary the external
//! tool's report generator writes, and the tool's own run log.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

/// Aggregate entry from `statistics.json`; the `Total` key sums the run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatEntry {
    pub transaction: String,
    pub sample_count: i64,
    pub error_count: i64,
    pub error_pct: f64,
    pub mean_res_time: f64,
    pub min_res_time: f64,
    pub max_res_time: f64,
    pub pct1_res_time: f64,
    pub pct2_res_time: f64,
    pub pct3_res_time: f64,
    pub throughput: f64,
    #[serde(rename = "receivedKBytesPerSec")]
    pub received_kbytes_per_sec: f64,
    #[serde(rename = "sentKBytesPerSec")]
    pub sent_kbytes_per_sec: f64,
}

/// Decoded `statistics.json`: transaction label to aggregate entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Statistics(pub HashMap<String, StatEntry>);

impl Statistics {
    pub fn total(&self) -> Option<&StatEntry> {
        self.0.get("Total")
    }
}

/// One row of the delimited result log. Field names mirror the header the
/// external tool writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleRecord {
    #[serde(rename = "timeStamp")]
    pub time_stamp: i64,
    pub elapsed: i64,
    pub label: String,
    #[serde(rename = "responseCode")]
    pub response_code: String,
    #[serde(rename = "responseMessage")]
    pub response_message: String,
    #[serde(rename = "threadName")]
    pub thread_name: String,
    #[serde(rename = "dataType", default)]
    pub data_type: String,
    pub success: bool,
    #[serde(rename = "failureMessage", default)]
    pub failure_message: String,
    pub bytes: i64,
    #[serde(rename = "sentBytes")]
    pub sent_bytes: i64,
    #[serde(rename = "grpThreads", default)]
    pub grp_threads: i64,
    #[serde(rename = "allThreads")]
    pub all_threads: i64,
    #[serde(rename = "URL", default)]
    pub url: String,
    #[serde(rename = "Latency", default)]
    pub latency: i64,
    #[serde(rename = "IdleTime", default)]
    pub idle_time: i64,
    #[serde(rename = "Connect", default)]
    pub connect: i64,
}

/// Per-request projection served to the dashboard's summary table.
#[derive(Debug, Clone, Serialize)]
pub struct RequestSummary {
    pub label: String,
    pub response_code: String,
    pub response_message: String,
    pub thread_name: String,
    pub failure_message: String,
    pub bytes: i64,
    pub sent_bytes: i64,
    pub all_threads: i64,
    pub url: String,
}

impl From<&SampleRecord> for RequestSummary {
    fn from(r: &SampleRecord) -> Self {
        Self {
            label: r.label.clone(),
            response_code: r.response_code.clone(),
            response_message: r.response_message.clone(),
            thread_name: r.thread_name.clone(),
            failure_message: r.failure_message.clone(),
            bytes: r.bytes,
            sent_bytes: r.sent_bytes,
            all_threads: r.all_threads,
            url: r.url.clone(),
        }
    }
}

/// Path helpers and readers for the `<root>/<plan>/{report,log}/<task>` trees.
#[derive(Debug, Clone)]
pub struct TaskArtifacts {
    root: PathBuf,
}

impl TaskArtifacts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn report_dir(&self, plan: &str, task: &str) -> PathBuf {
        self.root.join(plan).join("report").join(task)
    }

    pub fn log_dir(&self, plan: &str, task: &str) -> PathBuf {
        self.root.join(plan).join("log").join(task)
    }

    pub fn result_file(&self, plan: &str, task: &str) -> PathBuf {
        self.report_dir(plan, task).join("result.jtl")
    }

    pub fn statistics_file(&self, plan: &str, task: &str) -> PathBuf {
        self.report_dir(plan, task).join("statistics.json")
    }

    pub fn run_log_file(&self, plan: &str, task: &str) -> PathBuf {
        self.log_dir(plan, task).join("result.log")
    }

    /// `None` when the report generator never produced the file (failed or
    /// remote run).
    pub async fn read_statistics(&self, plan: &str, task: &str) -> Result<Option<Statistics>> {
        let path = self.statistics_file(plan, task);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let stats = serde_json::from_str(&content)
                    .with_context(|| format!("parsing {}", path.display()))?;
                Ok(Some(stats))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Samples ordered by timestamp. Malformed rows are logged and skipped.
    pub async fn read_samples(&self, plan: &str, task: &str) -> Result<Option<Vec<SampleRecord>>> {
        let path = self.result_file(plan, task);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        Ok(Some(parse_samples(&content)))
    }

    pub async fn read_summaries(&self, plan: &str, task: &str) -> Result<Option<Vec<RequestSummary>>> {
        let samples = self.read_samples(plan, task).await?;
        Ok(samples.map(|s| s.iter().map(RequestSummary::from).collect()))
    }

    pub async fn read_run_log(&self, plan: &str, task: &str) -> Result<Option<String>> {
        let path = self.run_log_file(plan, task);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }
}

fn parse_samples(content: &str) -> Vec<SampleRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut samples: Vec<SampleRecord> = Vec::new();
    for (i, row) in reader.deserialize::<SampleRecord>().enumerate() {
        match row {
            Ok(sample) => samples.push(sample),
            Err(e) => warn!(row = i + 1, error = %e, "skipping malformed result row"),
        }
    }
    samples.sort_by_key(|s| s.time_stamp);
    samples
}
