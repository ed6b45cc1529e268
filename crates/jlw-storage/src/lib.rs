//! Rate-limited HTTP JSON transport + staging-file I/O for JLW.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tracing::{debug, warn};

pub const CRATE_NAME: &str = "jlw-storage";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("decoding response body for {url}: {message}")]
    Decode { url: String, message: String },
}

impl TransportError {
    /// A 404 on a detail endpoint means "posting gone", not a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::Status { status: 404, .. })
    }
}

/// Single-request JSON GET capability consumed by the pagination walker
/// and the detail fetcher. Implementations are injected so the walkers
/// can be exercised against canned responses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    /// Courtesy delay applied before every request, uniformly.
    pub request_delay: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
            request_delay: Duration::from_secs(1),
        }
    }
}

/// Blocking-style sequential transport: one GET at a time, a fixed sleep
/// before each, no retries. A non-2xx status is returned as
/// [`TransportError::Status`]; callers decide what is fatal.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    request_delay: Duration,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            request_delay: config.request_delay,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, TransportError> {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }
        debug!(url, "GET");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let final_url = resp.url().to_string();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: final_url,
            });
        }
        resp.json().await.map_err(|err| TransportError::Decode {
            url: final_url,
            message: err.to_string(),
        })
    }
}

/// Escape one field for the staging files: backslash-escape `\` and `"`,
/// then wrap in double quotes.
pub fn escape_field(field: &str) -> String {
    let escaped = field.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Render one staging-file line: every field quoted, comma-separated,
/// Unix line ending.
pub fn staging_line(fields: &[&str]) -> String {
    let mut line = fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

/// Append-only delimited sink with a fixed column schema. The header row
/// is written once, when the sink opens an empty file; rows are padded or
/// truncated to the column count and flushed immediately so partial
/// progress survives a crash mid-run.
pub struct StagingSink {
    path: PathBuf,
    columns: Vec<String>,
    file: fs::File,
}

impl StagingSink {
    pub async fn open(path: impl Into<PathBuf>, columns: &[&str]) -> anyhow::Result<Self> {
        let path = path.into();
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("opening staging file {}", path.display()))?;

        let len = file
            .metadata()
            .await
            .with_context(|| format!("inspecting staging file {}", path.display()))?
            .len();
        if len == 0 {
            let header = staging_line(columns);
            file.write_all(header.as_bytes())
                .await
                .with_context(|| format!("writing header to {}", path.display()))?;
            file.flush().await?;
        }

        Ok(Self {
            path,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one row. Extra fields beyond the column schema are dropped;
    /// missing ones become empty strings.
    pub async fn write_row(&mut self, fields: &[String]) -> anyhow::Result<()> {
        let mut row: Vec<&str> = fields
            .iter()
            .take(self.columns.len())
            .map(String::as_str)
            .collect();
        while row.len() < self.columns.len() {
            row.push("");
        }
        let line = staging_line(&row);
        self.file
            .write_all(line.as_bytes())
            .await
            .with_context(|| format!("appending row to {}", self.path.display()))?;
        self.file
            .flush()
            .await
            .with_context(|| format!("flushing {}", self.path.display()))
    }
}

/// Line-by-line reader over an identifiers staging file. Skips the header
/// row, strips quoting, and ignores lines that do not parse as ids.
pub struct IdFileReader {
    path: PathBuf,
    lines: Lines<BufReader<fs::File>>,
    seen_header: bool,
}

impl IdFileReader {
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let file = fs::File::open(&path)
            .await
            .with_context(|| format!("opening id file {}", path.display()))?;
        Ok(Self {
            path,
            lines: BufReader::new(file).lines(),
            seen_header: false,
        })
    }

    pub async fn next_id(&mut self) -> anyhow::Result<Option<i64>> {
        loop {
            let Some(line) = self
                .lines
                .next_line()
                .await
                .with_context(|| format!("reading {}", self.path.display()))?
            else {
                return Ok(None);
            };
            if !self.seen_header {
                self.seen_header = true;
                continue;
            }
            let raw = line.trim().trim_matches('"');
            if raw.is_empty() {
                continue;
            }
            match raw.parse::<i64>() {
                Ok(id) => return Ok(Some(id)),
                Err(_) => {
                    warn!(line = raw, file = %self.path.display(), "skipping unparsable id line");
                }
            }
        }
    }
}

/// Clear the per-run staging workspace: create the directory if missing,
/// then delete every regular file inside it.
pub async fn reset_staging_dir(dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating staging directory {}", dir.display()))?;
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("listing staging directory {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() {
            fs::remove_file(&path)
                .await
                .with_context(|| format!("deleting {}", path.display()))?;
            debug!(file = %path.display(), "deleted staging file");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fields_are_quoted_and_backslash_escaped() {
        assert_eq!(escape_field("plain"), "\"plain\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \\\"hi\\\"\"");
        assert_eq!(escape_field("back\\slash"), "\"back\\\\slash\"");
    }

    #[test]
    fn staging_line_joins_with_commas_and_unix_ending() {
        assert_eq!(staging_line(&["a", "b"]), "\"a\",\"b\"\n");
    }

    #[tokio::test]
    async fn sink_writes_header_once_and_flushes_rows() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("ids.csv");

        let mut sink = StagingSink::open(&path, &["job_id"]).await.expect("open");
        sink.write_row(&["1".to_string()]).await.expect("row 1");
        drop(sink);

        // Reopening in append mode must not duplicate the header.
        let mut sink = StagingSink::open(&path, &["job_id"]).await.expect("reopen");
        sink.write_row(&["2".to_string()]).await.expect("row 2");
        drop(sink);

        let content = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(content, "\"job_id\"\n\"1\"\n\"2\"\n");
    }

    #[tokio::test]
    async fn sink_pads_missing_fields_and_drops_extras() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("jobs.csv");

        let mut sink = StagingSink::open(&path, &["a", "b", "c"]).await.expect("open");
        sink.write_row(&["1".to_string()]).await.expect("short row");
        sink.write_row(&["1".into(), "2".into(), "3".into(), "4".into()])
            .await
            .expect("long row");
        drop(sink);

        let content = std::fs::read_to_string(&path).expect("read back");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[1], "\"1\",\"\",\"\"");
        assert_eq!(lines[2], "\"1\",\"2\",\"3\"");
    }

    #[tokio::test]
    async fn id_reader_skips_header_and_quotes() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("missing_ids.csv");
        std::fs::write(&path, "\"job_id\"\n\"17\"\n42\n\nnot-a-number\n\"7\"\n")
            .expect("write fixture");

        let mut reader = IdFileReader::open(&path).await.expect("open");
        let mut ids = Vec::new();
        while let Some(id) = reader.next_id().await.expect("read") {
            ids.push(id);
        }
        assert_eq!(ids, vec![17, 42, 7]);
    }

    #[tokio::test]
    async fn reset_clears_files_but_keeps_directory() {
        let dir = tempdir().expect("tempdir");
        let staging = dir.path().join("tmp_data");
        std::fs::create_dir_all(&staging).expect("mkdir");
        std::fs::write(staging.join("ids.csv"), "stale").expect("seed file");

        reset_staging_dir(&staging).await.expect("reset");
        assert!(staging.exists());
        assert_eq!(std::fs::read_dir(&staging).expect("list").count(), 0);

        // A second reset on an already-clean directory is a no-op.
        reset_staging_dir(&staging).await.expect("reset again");
    }
}
