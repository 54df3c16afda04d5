//! Validation progress report for `ideavoid progress`.
//!
//! Reads the ideas file and summarises how much of the catalog has been
//! validated, the status and saturation distributions, the last batch run
//! recorded in `metadata.validation`, and the most recent verdicts.

use anyhow::Result;
use std::fmt::Write;

use crate::config::Config;
use crate::progress::format_number;
use crate::repository::{load_document, CatalogStats, IdeaDocument};

const BAR_WIDTH: usize = 50;
const RECENT: usize = 5;

pub struct RecentIdea {
    pub name: String,
    pub status: String,
    pub competitors: usize,
    pub level: String,
}

pub struct ProgressReport {
    pub stats: CatalogStats,
    pub last_run: Option<serde_json::Value>,
    pub recent: Vec<RecentIdea>,
}

impl ProgressReport {
    pub fn from_document(doc: &IdeaDocument) -> Self {
        let validated: Vec<_> = doc.ideas.iter().filter(|i| i.is_validated()).collect();
        let recent = validated[validated.len().saturating_sub(RECENT)..]
            .iter()
            .map(|idea| RecentIdea {
                name: idea.name.chars().take(40).collect(),
                status: idea
                    .validation
                    .as_ref()
                    .map(|v| v.status.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
                competitors: idea.saturation.as_ref().map_or(0, |s| s.competitor_count),
                level: idea
                    .saturation
                    .as_ref()
                    .map(|s| s.level.as_str())
                    .unwrap_or("unknown")
                    .to_string(),
            })
            .collect();

        Self {
            stats: CatalogStats::compute(&doc.ideas),
            last_run: doc.metadata.get("validation").cloned(),
            recent,
        }
    }

    pub fn percent(&self) -> f64 {
        if self.stats.total_ideas == 0 {
            0.0
        } else {
            self.stats.validated_ideas as f64 * 100.0 / self.stats.total_ideas as f64
        }
    }

    pub fn bar(&self) -> String {
        let filled = ((self.percent() / 100.0) * BAR_WIDTH as f64).floor() as usize;
        let filled = filled.min(BAR_WIDTH);
        format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
    }

    pub fn render(&self) -> String {
        let s = &self.stats;
        let n = |v: usize| format_number(v as u64);
        let mut out = String::new();

        let _ = writeln!(out, "IdeaAvoid Validation Progress");
        let _ = writeln!(out, "{}", "=".repeat(60));
        let _ = writeln!(out, "  Total ideas:  {}", n(s.total_ideas));
        let _ = writeln!(out, "  Validated:    {} ({:.2}%)", n(s.validated_ideas), self.percent());
        let _ = writeln!(
            out,
            "  Remaining:    {}",
            n(s.total_ideas.saturating_sub(s.validated_ideas))
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "  Validation status:");
        let _ = writeln!(out, "    verified:    {}", n(s.validation_status.verified));
        let _ = writeln!(out, "    pending:     {}", n(s.validation_status.pending));
        let _ = writeln!(out, "    unverified:  {}", n(s.validation_status.unverified));
        let _ = writeln!(out);
        let _ = writeln!(out, "  Saturation levels:");
        let _ = writeln!(out, "    high:        {}", n(s.saturation_levels.high));
        let _ = writeln!(out, "    medium:      {}", n(s.saturation_levels.medium));
        let _ = writeln!(out, "    low:         {}", n(s.saturation_levels.low));

        if let Some(run) = self.last_run.as_ref().filter(|r| r.get("processed").is_some()) {
            let count = |key: &str| run.get(key).and_then(|v| v.as_u64()).unwrap_or(0);
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "  Last run:     {}",
                run["processed"].as_str().unwrap_or("unknown")
            );
            let _ = writeln!(out, "    validated:   {}", format_number(count("validatedIdeas")));
            let _ = writeln!(out, "    skipped:     {}", format_number(count("skippedIdeas")));
            let _ = writeln!(out, "    errors:      {}", format_number(count("errors")));
            if run.get("inProgress").and_then(|v| v.as_bool()) == Some(true) {
                let _ = writeln!(out, "    (still in progress)");
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "  [{}] {:.2}%", self.bar(), self.percent());

        if !self.recent.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "  Recently validated:");
            for (i, idea) in self.recent.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "    {}. {:<42} | {:<10} | {} competitors | {}",
                    i + 1,
                    idea.name,
                    idea.status,
                    idea.competitors,
                    idea.level
                );
            }
        }

        out
    }
}

pub fn run_progress(config: &Config) -> Result<()> {
    let doc = load_document(&config.data.ideas_path)?;
    print!("{}", ProgressReport::from_document(&doc).render());
    Ok(())
}
