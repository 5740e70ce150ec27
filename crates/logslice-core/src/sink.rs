//! Output sinks for retrieved log content.
//!
//! This module provides:
//! - [`LogSink`] — Append-only destination for a run's output
//! - [`RunHeader`] — The framed block written before any content
//! - [`FileSink`] — Text file destination, one entry per line
//! - [`MemorySink`] — In-memory destination for tests and embedding

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{QueryFilter, TimeInterval, Timestamp, format_timestamp};

/// Banner printed on start and written at the top of every output file.
pub const BANNER: &str = r"
     ____ ____ ____ ____ ____ ____ ____ ____
    ||l |||o |||g |||s |||l |||i |||c |||e ||
    ||__|||__|||__|||__|||__|||__|||__|||__||
    |/__\|/__\|/__\|/__\|/__\|/__\|/__\|/__\|

";

const BORDER: char = '#';
const BORDER_WIDTH: usize = 3;
const PADDING: usize = 3;

/// Append-only destination of a run.
///
/// The header is written once, before the first window; each accepted
/// window's entries are appended as soon as they are extracted.
pub trait LogSink {
    /// Writes the header block.
    fn write_header(&mut self, header: &RunHeader) -> Result<()>;

    /// Appends the entries of one window, in order.
    fn append(&mut self, entries: &[String]) -> Result<()>;
}

/// Describes a run at the top of its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHeader {
    /// Namespace the logs come from.
    pub namespace: String,
    /// Pod restriction, if any.
    pub pod: Option<String>,
    /// Log source identifier.
    pub source: String,
    /// Whole retrieval interval.
    pub interval: TimeInterval,
    /// Filter sent with every request.
    pub filter: QueryFilter,
    /// When the run started.
    pub started_at: Timestamp,
    /// Where the output was first written.
    pub destination: String,
}

impl RunHeader {
    /// Renders the banner and run details inside a `#` frame.
    ///
    /// Every line is padded to the widest one, surrounded by three spaces and
    /// three border characters per side, with a full border line above and
    /// below and one blank line after.
    #[must_use]
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = BANNER.lines().map(str::to_string).collect();
        lines.push(format!("SOURCE NAMESPACE:         {}", self.namespace));
        if let Some(pod) = &self.pod {
            lines.push(format!("SOURCE POD:               {pod}"));
        }
        lines.push(format!("SOURCE LOG FILE:          {}", self.source));
        lines.push(format!("TIME INTERVAL:            {}", self.interval));
        lines.push(format!("QUERY:                    {}", self.filter));
        lines.push(format!(
            "RUN STARTED:              {}",
            format_timestamp(&self.started_at)
        ));
        lines.push(format!("ORIGINALLY WRITTEN TO:    {}", self.destination));
        lines.push(String::new());

        let columns = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let edge = BORDER.to_string().repeat(BORDER_WIDTH);
        let gap = " ".repeat(PADDING);
        let border: String = BORDER
            .to_string()
            .repeat(columns + 2 * (PADDING + BORDER_WIDTH));

        let mut out = String::new();
        out.push_str(&border);
        out.push('\n');
        for line in &lines {
            let fill = " ".repeat(columns - line.chars().count());
            out.push_str(&format!("{edge}{gap}{line}{fill}{gap}{edge}\n"));
        }
        out.push_str(&border);
        out.push_str("\n\n");
        out
    }
}

/// Writes a run to a text file, truncating any previous content.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileSink {
    /// Creates `directory` if needed and opens `directory/file` for writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be created.
    pub fn create(directory: impl AsRef<Path>, file: impl AsRef<Path>) -> Result<Self> {
        let directory = directory.as_ref();
        fs::create_dir_all(directory)?;
        let path = directory.join(file);
        let writer = BufWriter::new(File::create(&path)?);
        Ok(Self { path, writer })
    }

    /// Path of the output file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileSink {
    fn write_header(&mut self, header: &RunHeader) -> Result<()> {
        self.writer.write_all(header.render().as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    fn append(&mut self, entries: &[String]) -> Result<()> {
        for entry in entries {
            self.writer.write_all(entry.as_bytes())?;
            self.writer.write_all(b"\n")?;
        }
        // Flush per window so an aborted run keeps everything retrieved so far.
        self.writer.flush()?;
        Ok(())
    }
}

/// Collects a run in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    header: Option<String>,
    entries: Vec<String>,
    batches: usize,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The rendered header, if one was written.
    #[must_use]
    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    /// Every appended entry, in order.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Number of `append` calls.
    #[must_use]
    pub const fn batches(&self) -> usize {
        self.batches
    }
}

impl LogSink for MemorySink {
    fn write_header(&mut self, header: &RunHeader) -> Result<()> {
        self.header = Some(header.render());
        Ok(())
    }

    fn append(&mut self, entries: &[String]) -> Result<()> {
        self.entries.extend_from_slice(entries);
        self.batches += 1;
        Ok(())
    }
}
