//! Append-only log of user-submitted corrections.
//!
//! Contributions are stored as `{ "contributions": [...] }` and are never
//! fed back into validation. Every append rewrites the file under a
//! process-local lock.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::repository::write_json_atomic;

/// `ideaId` as submitted: clients send either a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdeaRef {
    Number(u64),
    Text(String),
}

impl IdeaRef {
    /// Zero and the empty string count as absent.
    fn present(self) -> Option<Self> {
        match &self {
            IdeaRef::Number(0) => None,
            IdeaRef::Text(s) if s.trim().is_empty() => None,
            _ => Some(self),
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            IdeaRef::Number(n) => n.to_string() == value,
            IdeaRef::Text(s) => s == value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContributionKind {
    #[serde(rename_all = "camelCase")]
    Verification {
        exists: Option<bool>,
        #[serde(default)]
        competitor_links: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Competitor {
        #[serde(default)]
        competitor_name: String,
        #[serde(default)]
        competitor_link: String,
    },
    #[serde(rename_all = "camelCase")]
    Saturation {
        saturation_level: Option<String>,
        competitor_count: Option<u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub id: String,
    #[serde(flatten)]
    pub kind: ContributionKind,
    pub idea_id: Option<IdeaRef>,
    #[serde(default)]
    pub idea_name: String,
    #[serde(default)]
    pub notes: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub ip: Option<String>,
}

/// Fields shared by every submission.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default)]
    pub idea_id: Option<IdeaRef>,
    #[serde(default)]
    pub idea_name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Contribution {
    /// Builds a new entry, or `None` when the submission names no idea.
    pub fn new(
        submission: Submission,
        kind: ContributionKind,
        ip: Option<String>,
    ) -> Option<Self> {
        let idea_id = submission.idea_id.and_then(IdeaRef::present);
        let idea_name = submission
            .idea_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_default();
        if idea_id.is_none() && idea_name.is_empty() {
            return None;
        }
        Some(Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            idea_id,
            idea_name,
            notes: submission.notes.unwrap_or_default(),
            timestamp: Utc::now(),
            ip,
        })
    }

    /// True when the entry's id equals `value` or its name contains it.
    pub fn concerns(&self, value: &str) -> bool {
        self.idea_id.as_ref().is_some_and(|id| id.matches(value))
            || self.idea_name.contains(value)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LogFile {
    #[serde(default)]
    contributions: Vec<Contribution>,
}

pub struct ContributionLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ContributionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<LogFile> {
        if !self.path.exists() {
            return Ok(LogFile::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read contributions: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse contributions: {}", self.path.display()))
    }

    pub fn append(&self, contribution: Contribution) -> Result<Contribution> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut log = self.load()?;
        log.contributions.push(contribution.clone());
        write_json_atomic(&self.path, &log)?;
        tracing::info!(id = %contribution.id, "recorded contribution");
        Ok(contribution)
    }

    pub fn all(&self) -> Result<Vec<Contribution>> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        Ok(self.load()?.contributions)
    }

    pub fn for_idea(&self, value: &str) -> Result<Vec<Contribution>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|c| c.concerns(value))
            .collect())
    }
}
