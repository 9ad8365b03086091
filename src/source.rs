use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::ValueEnum;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

use sessionize::RawRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Pick by file extension (`.json`, `.tsv`/`.tab`, anything else is CSV)
    #[default]
    Auto,
    Csv,
    Tsv,
    Json,
}

/// Concrete layout of an input after `Auto` has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    Delimited(char),
    Json,
}

impl InputFormat {
    pub fn resolve(self, path: Option<&Path>) -> RecordFormat {
        match self {
            InputFormat::Csv => RecordFormat::Delimited(','),
            InputFormat::Tsv => RecordFormat::Delimited('\t'),
            InputFormat::Json => RecordFormat::Json,
            InputFormat::Auto => {
                let ext = path
                    .and_then(|p| p.extension())
                    .map(|e| e.to_string_lossy().to_lowercase());
                match ext.as_deref() {
                    Some("json") => RecordFormat::Json,
                    Some("tsv") | Some("tab") => RecordFormat::Delimited('\t'),
                    _ => RecordFormat::Delimited(','),
                }
            }
        }
    }
}

/// A producer of raw records.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Name used in error messages and logs
    fn display_name(&self) -> String;

    /// Read every record this source holds, in source order
    async fn read_records(&self) -> Result<Vec<RawRecord>>;
}

pub struct FileSource {
    pub path: PathBuf,
    pub format: RecordFormat,
}

impl FileSource {
    pub fn new(path: PathBuf, format: InputFormat) -> Self {
        let format = format.resolve(Some(&path));
        Self { path, format }
    }
}

#[async_trait]
impl RecordSource for FileSource {
    fn display_name(&self) -> String {
        self.path.display().to_string()
    }

    async fn read_records(&self) -> Result<Vec<RawRecord>> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        parse_records(text, self.format)
    }
}

pub struct StdinSource {
    pub format: RecordFormat,
}

#[async_trait]
impl RecordSource for StdinSource {
    fn display_name(&self) -> String {
        "<stdin>".to_string()
    }

    async fn read_records(&self) -> Result<Vec<RawRecord>> {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read standard input")?;
        parse_records(text, self.format)
    }
}

pub fn parse_records(text: String, format: RecordFormat) -> Result<Vec<RawRecord>> {
    match format {
        RecordFormat::Delimited(delimiter) => Ok(parse_delimited(&text, delimiter)),
        RecordFormat::Json => parse_json(text),
    }
}

/// One record per line. Blank lines and `#` comments are skipped; fields are
/// trimmed but otherwise left for the normalizer to judge. Quoting is not
/// supported: a quoted field containing the delimiter is split like any other.
pub fn parse_delimited(text: &str, delimiter: char) -> Vec<RawRecord> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| RawRecord::new(line.split(delimiter).map(str::trim)))
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonField {
    Text(String),
    Unsigned(u64),
    Integer(i64),
    Float(f64),
}

impl JsonField {
    fn into_string(self) -> String {
        match self {
            JsonField::Text(s) => s,
            JsonField::Unsigned(n) => n.to_string(),
            JsonField::Integer(n) => n.to_string(),
            // Debug keeps the fraction (`7.0`), so the normalizer still rejects it.
            JsonField::Float(x) => format!("{x:?}"),
        }
    }
}

/// A JSON array of records, each an array of strings. Numbers are accepted
/// and stringified so the timestamp check stays in the normalizer.
pub fn parse_json(text: String) -> Result<Vec<RawRecord>> {
    let mut bytes = text.into_bytes();
    let rows: Vec<Vec<JsonField>> = simd_json::serde::from_slice(&mut bytes)
        .context("Expected a JSON array of [kind, timestamp, product id] arrays")?;

    Ok(rows
        .into_iter()
        .map(|row| RawRecord::new(row.into_iter().map(JsonField::into_string)))
        .collect())
}

/// Registry of every source a run reads from
#[derive(Default)]
pub struct SourceRegistry {
    sources: Vec<Box<dyn RecordSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register<S: RecordSource + 'static>(&mut self, source: S) {
        self.sources.push(Box::new(source));
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Read all sources concurrently. Records are concatenated in
    /// registration order regardless of which read finishes first.
    pub async fn load_all(&self) -> Result<Vec<RawRecord>> {
        if self.is_empty() {
            return Ok(Vec::new());
        }

        let batches = try_join_all(self.sources.iter().map(|source| async move {
            let records = source
                .read_records()
                .await
                .with_context(|| format!("Failed to load records from {}", source.display_name()))?;
            crate::debug_log::log(
                "SOURCE",
                "READ",
                &format!("{}: {} records", source.display_name(), records.len()),
            );
            Ok::<_, anyhow::Error>(records)
        }))
        .await?;

        Ok(batches.into_iter().flatten().collect())
    }
}

fn is_glob_pattern(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

/// Turn CLI inputs into sources. No inputs, or `-`, means standard input.
/// Glob patterns expand to their matching files in sorted order.
///
/// Standard input can be read only once, so `-` may appear at most once.
pub fn discover_sources(inputs: &[String], format: InputFormat) -> Result<SourceRegistry> {
    let mut registry = SourceRegistry::new();

    if inputs.iter().filter(|input| input.as_str() == "-").count() > 1 {
        anyhow::bail!("Standard input (`-`) can only be given once");
    }

    if inputs.is_empty() {
        registry.register(StdinSource {
            format: format.resolve(None),
        });
        return Ok(registry);
    }

    for input in inputs {
        if input == "-" {
            registry.register(StdinSource {
                format: format.resolve(None),
            });
        } else if is_glob_pattern(input) {
            let mut paths = Vec::new();
            for entry in glob::glob(input).with_context(|| format!("Invalid glob pattern {input}"))? {
                let path = entry?;
                if path.is_file() {
                    paths.push(path);
                }
            }
            if paths.is_empty() {
                anyhow::bail!("No input files match {input}");
            }
            paths.sort();
            for path in paths {
                registry.register(FileSource::new(path, format));
            }
        } else {
            registry.register(FileSource::new(PathBuf::from(input), format));
        }
    }

    Ok(registry)
}
