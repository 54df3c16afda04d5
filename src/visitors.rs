//! Visitor counters, persisted as a small JSON file.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::repository::write_json_atomic;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VisitorData {
    #[serde(default)]
    total_visitors: u64,
    #[serde(default)]
    unique_visitors: Vec<String>,
    #[serde(default)]
    last_reset: Option<DateTime<Utc>>,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorCount {
    pub total_visitors: u64,
    pub unique_visitors: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

pub struct VisitorCounter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl VisitorCounter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<VisitorData> {
        if !self.path.exists() {
            return Ok(VisitorData {
                last_reset: Some(Utc::now()),
                ..Default::default()
            });
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read visitor data: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse visitor data: {}", self.path.display()))
    }

    fn summary(data: &VisitorData) -> VisitorCount {
        VisitorCount {
            total_visitors: data.total_visitors,
            unique_visitors: data.unique_visitors.len(),
            last_updated: data.last_updated.or(data.last_reset),
        }
    }

    pub fn count(&self) -> Result<VisitorCount> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        Ok(Self::summary(&self.load()?))
    }

    /// Counts one visit; `ip` is recorded once for the unique count.
    pub fn increment(&self, ip: Option<&str>) -> Result<VisitorCount> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut data = self.load()?;
        data.total_visitors += 1;
        if let Some(ip) = ip.filter(|ip| !ip.is_empty()) {
            if !data.unique_visitors.iter().any(|seen| seen == ip) {
                data.unique_visitors.push(ip.to_string());
            }
        }
        data.last_updated = Some(Utc::now());
        write_json_atomic(&self.path, &data)?;
        Ok(Self::summary(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_total_and_unique() {
        let dir = tempfile::tempdir().unwrap();
        let counter = VisitorCounter::new(dir.path().join("visitors.json"));

        let empty = counter.count().unwrap();
        assert_eq!(empty.total_visitors, 0);
        assert!(empty.last_updated.is_some());

        counter.increment(Some("10.0.0.1")).unwrap();
        counter.increment(Some("10.0.0.1")).unwrap();
        let after = counter.increment(Some("10.0.0.2")).unwrap();
        assert_eq!(after.total_visitors, 3);
        assert_eq!(after.unique_visitors, 2);

        let reread = VisitorCounter::new(dir.path().join("visitors.json")).count().unwrap();
        assert_eq!(reread, after);
    }
}
