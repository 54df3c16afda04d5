//! Batch progress reporting.
//!
//! `validate-all` and `enrich` report after every batch. Progress goes to
//! **stderr** so the summary on stdout stays parseable.

use std::io::Write;

/// Progress after one batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchProgress {
    pub command: &'static str,
    pub processed: usize,
    pub total: usize,
    pub validated: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl BatchProgress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.processed as f64 * 100.0 / self.total as f64
        }
    }
}

pub trait BatchProgressReporter: Send + Sync {
    fn report(&self, progress: &BatchProgress);
}

/// `validate-all  1,200 / 5,000 ideas (24.00%)  1,150 validated, 50 skipped, 0 errors`
pub struct StderrProgress;

impl BatchProgressReporter for StderrProgress {
    fn report(&self, p: &BatchProgress) {
        let line = format!(
            "{}  {} / {} ideas ({:.2}%)  {} validated, {} skipped, {} errors\n",
            p.command,
            format_number(p.processed as u64),
            format_number(p.total as u64),
            p.percent(),
            format_number(p.validated as u64),
            format_number(p.skipped as u64),
            format_number(p.errors as u64),
        );
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// One JSON object per line on stderr.
pub struct JsonProgress;

impl BatchProgressReporter for JsonProgress {
    fn report(&self, p: &BatchProgress) {
        let obj = serde_json::json!({
            "event": "progress",
            "command": p.command,
            "processed": p.processed,
            "total": p.total,
            "validated": p.validated,
            "skipped": p.skipped,
            "errors": p.errors,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

pub struct NoProgress;

impl BatchProgressReporter for NoProgress {
    fn report(&self, _progress: &BatchProgress) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn BatchProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn percent_of_empty_run_is_complete() {
        let p = BatchProgress {
            command: "enrich",
            processed: 0,
            total: 0,
            validated: 0,
            skipped: 0,
            errors: 0,
        };
        assert_eq!(p.percent(), 100.0);
    }
}
