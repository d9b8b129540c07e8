//! Collector capability
//!
//! A collector knows how to pull one provider's records. It returns a lazy,
//! finite stream; calling [`Collector::fetch`] again restarts the sequence
//! from the beginning. Collectors never normalize values or touch the catalog.

use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, info};

use crate::catalog::{reference, SourceDescriptor};

use super::types::RawRecord;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectorError {
    /// Worth retrying: timeouts, 5xx, interrupted reads
    #[error("transient fetch failure: {0}")]
    Transient(String),

    #[error("fetch failed: {0}")]
    Permanent(String),

    /// One record could not be decoded; the stream continues after it
    #[error("malformed record: {0}")]
    Malformed(String),
}

pub type RecordStream = BoxStream<'static, Result<RawRecord, CollectorError>>;

pub trait Collector: Send + Sync {
    fn descriptor(&self) -> SourceDescriptor;

    /// Records for the inclusive year range
    ///
    /// Range filtering is best effort; the orchestrator does not rely on it.
    fn fetch(&self, start_year: i32, end_year: i32) -> RecordStream;
}

/// Collectors by upper-case source code
#[derive(Clone, Default)]
pub struct CollectorRegistry {
    collectors: HashMap<String, Arc<dyn Collector>>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, collector: Arc<dyn Collector>) {
        let code = collector.descriptor().code.to_uppercase();
        debug!(source = %code, "Registered collector");
        self.collectors.insert(code, collector);
    }

    pub fn with(mut self, collector: Arc<dyn Collector>) -> Self {
        self.register(collector);
        self
    }

    pub fn get(&self, source_code: &str) -> Option<Arc<dyn Collector>> {
        self.collectors
            .get(&source_code.trim().to_uppercase())
            .cloned()
    }

    /// Registered codes, sorted
    pub fn codes(&self) -> Vec<String> {
        let mut codes: Vec<_> = self.collectors.keys().cloned().collect();
        codes.sort();
        codes
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// One [`JsonLinesCollector`] per `<CODE>.jsonl` file in `dir`
    pub fn from_directory(dir: &Path) -> io::Result<Self> {
        let mut registry = Self::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let collector = JsonLinesCollector::new(reference::source_descriptor(stem), &path);
            registry.register(Arc::new(collector));
        }
        info!(dir = %dir.display(), sources = ?registry.codes(), "Loaded collectors");
        Ok(registry)
    }
}

/// Reads one JSON object per line from a provider dump
///
/// Blank lines are ignored. A line that is not a valid record is reported as
/// [`CollectorError::Malformed`] and reading continues.
#[derive(Debug, Clone)]
pub struct JsonLinesCollector {
    descriptor: SourceDescriptor,
    path: PathBuf,
}

impl JsonLinesCollector {
    pub fn new(descriptor: SourceDescriptor, path: impl AsRef<Path>) -> Self {
        Self {
            descriptor,
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

enum ReadState {
    Unopened(PathBuf),
    Reading {
        path: PathBuf,
        lines: Lines<BufReader<File>>,
        line_no: usize,
    },
    Done,
}

type ReadStep = Option<(Result<RawRecord, CollectorError>, ReadState)>;

impl Collector for JsonLinesCollector {
    fn descriptor(&self) -> SourceDescriptor {
        self.descriptor.clone()
    }

    fn fetch(&self, start_year: i32, end_year: i32) -> RecordStream {
        let range = (start_year, end_year);
        stream::unfold(ReadState::Unopened(self.path.clone()), move |state| async move {
            match state {
                ReadState::Done => None,
                ReadState::Unopened(path) => match File::open(&path).await {
                    Ok(file) => {
                        let lines = BufReader::new(file).lines();
                        next_line_record(path, lines, 0, range).await
                    }
                    Err(err) => {
                        let message = format!("{}: {err}", path.display());
                        let err = if err.kind() == io::ErrorKind::NotFound {
                            CollectorError::Permanent(message)
                        } else {
                            CollectorError::Transient(message)
                        };
                        Some((Err(err), ReadState::Done))
                    }
                },
                ReadState::Reading {
                    path,
                    lines,
                    line_no,
                } => next_line_record(path, lines, line_no, range).await,
            }
        })
        .boxed()
    }
}

async fn next_line_record(
    path: PathBuf,
    mut lines: Lines<BufReader<File>>,
    mut line_no: usize,
    (start_year, end_year): (i32, i32),
) -> ReadStep {
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return None,
            Err(err) => {
                let message = format!("{}:{}: {err}", path.display(), line_no + 1);
                return Some((Err(CollectorError::Transient(message)), ReadState::Done));
            }
        };
        line_no += 1;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let item = match serde_json::from_str::<RawRecord>(trimmed) {
            Ok(record) => {
                if year_hint(&record.year)
                    .is_some_and(|y| y < i64::from(start_year) || y > i64::from(end_year))
                {
                    continue;
                }
                Ok(record)
            }
            Err(err) => Err(CollectorError::Malformed(format!(
                "{}:{line_no}: {err}",
                path.display()
            ))),
        };

        return Some((
            item,
            ReadState::Reading {
                path,
                lines,
                line_no,
            },
        ));
    }
}

fn year_hint(year: &Value) -> Option<i64> {
    match year {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Replays a fixed list of results on every fetch
#[derive(Debug, Clone)]
pub struct StaticCollector {
    descriptor: SourceDescriptor,
    items: Vec<Result<RawRecord, CollectorError>>,
}

impl StaticCollector {
    pub fn new(descriptor: SourceDescriptor, records: Vec<RawRecord>) -> Self {
        Self {
            descriptor,
            items: records.into_iter().map(Ok).collect(),
        }
    }

    pub fn from_results(
        descriptor: SourceDescriptor,
        items: Vec<Result<RawRecord, CollectorError>>,
    ) -> Self {
        Self { descriptor, items }
    }
}

impl Collector for StaticCollector {
    fn descriptor(&self) -> SourceDescriptor {
        self.descriptor.clone()
    }

    fn fetch(&self, _start_year: i32, _end_year: i32) -> RecordStream {
        stream::iter(self.items.clone()).boxed()
    }
}
