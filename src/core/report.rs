use crate::domain::model::{ReportEntry, ReportLevel};
use crate::utils::error::Result;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const DELIMITER: &str = " - ";

/// Human readable log of one run.
///
/// Every event is mirrored to `tracing` and, when the log is backed by a
/// file, appended as `<timestamp> - <LEVEL> - <message>`. Write failures do
/// not interrupt the checks; the first one is kept and returned by
/// [`ReportLog::finish`].
pub struct ReportLog {
    path: Option<PathBuf>,
    file: Option<File>,
    entries: Vec<(ReportLevel, String)>,
    write_error: Option<io::Error>,
}

impl ReportLog {
    /// Start a new log file, replacing any file already at `path`.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if path.exists() {
            fs::remove_file(&path)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path: Some(path),
            file: Some(file),
            entries: Vec::new(),
            write_error: None,
        })
    }

    /// A log that only keeps entries in memory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            file: None,
            entries: Vec::new(),
            write_error: None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Raw lines written before the first event.
    pub fn header(&mut self, lines: &[String]) {
        for line in lines {
            self.write_line(line);
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.record(ReportLevel::Info, message.into());
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.record(ReportLevel::Warning, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.record(ReportLevel::Error, message.into());
    }

    pub fn critical(&mut self, message: impl Into<String>) {
        self.record(ReportLevel::Critical, message.into());
    }

    fn record(&mut self, level: ReportLevel, message: String) {
        match level {
            ReportLevel::Info => tracing::info!("{}", message.trim_start()),
            ReportLevel::Warning => tracing::warn!("{}", message.trim_start()),
            ReportLevel::Error | ReportLevel::Critical => {
                tracing::error!(severity = %level, "{}", message.trim_start())
            }
        }

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("{}{}{}{}{}", timestamp, DELIMITER, level, DELIMITER, message);
        self.write_line(&line);
        self.entries.push((level, message));
    }

    fn write_line(&mut self, line: &str) {
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = writeln!(file, "{}", line) {
                tracing::warn!("Could not write to the report log: {}", e);
                self.write_error.get_or_insert(e);
            }
        }
    }

    pub fn entries(&self) -> &[(ReportLevel, String)] {
        &self.entries
    }

    pub fn count(&self, level: ReportLevel) -> usize {
        self.entries.iter().filter(|(l, _)| *l == level).count()
    }

    /// True when some recorded message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|(_, m)| m.contains(needle))
    }

    /// Entries as they would be parsed back from the log file.
    pub fn reports(&self) -> Vec<ReportEntry> {
        self.entries
            .iter()
            .map(|(level, message)| ReportEntry {
                level: level.to_string(),
                report_message: message.clone(),
            })
            .collect()
    }

    /// Flush and close the file, then read the reports back from it.
    pub fn finish(mut self) -> Result<Vec<ReportEntry>> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        if let Some(e) = self.write_error.take() {
            return Err(e.into());
        }
        match &self.path {
            Some(path) => read_reports(path),
            None => Ok(self.reports()),
        }
    }
}

pub fn read_reports(path: &Path) -> Result<Vec<ReportEntry>> {
    let content = fs::read_to_string(path)?;
    Ok(parse_reports(&content))
}

/// Split each log line into level and message. Lines without the delimiter
/// (the header) are reported as INFO.
pub fn parse_reports(content: &str) -> Vec<ReportEntry> {
    content
        .lines()
        .map(|line| {
            let pieces: Vec<&str> = line.splitn(3, DELIMITER).collect();
            match pieces.as_slice() {
                [_, level, message] => ReportEntry {
                    level: level.to_string(),
                    report_message: message.to_string(),
                },
                [_, level] => ReportEntry {
                    level: level.to_string(),
                    report_message: String::new(),
                },
                _ => ReportEntry {
                    level: ReportLevel::Info.to_string(),
                    report_message: line.to_string(),
                },
            }
        })
        .collect()
}
