//! Idea repository: the catalog document loaded into an immutable snapshot.
//!
//! The catalog lives in one JSON document `{ "ideas": [...], "metadata": {...} }`.
//! [`IdeaRepository`] loads it once into an [`Arc<Catalog>`] snapshot;
//! readers clone the `Arc` and never observe a partial update.
//! [`IdeaRepository::reload`] re-reads the file and swaps the snapshot.
//!
//! Writes only happen from batch commands, which rewrite the whole
//! document with [`save_document`] and assume exclusive access to the file.

use anyhow::{Context, Result};
use ideavoid_core::models::{Idea, SaturationLevel, ValidationStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub const DEFAULT_ITEMS_PER_PAGE: usize = 25;

/// The on-disk catalog document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdeaDocument {
    #[serde(default)]
    pub ideas: Vec<Idea>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl IdeaDocument {
    /// Normalizes every idea and assigns `index + 1` to ideas without an id.
    pub fn normalize(&mut self) {
        for (index, idea) in self.ideas.iter_mut().enumerate() {
            idea.normalize();
            if idea.id.is_none() {
                idea.id = Some(index as u64 + 1);
            }
        }
    }
}

pub fn load_document(path: &Path) -> Result<IdeaDocument> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read ideas file: {}", path.display()))?;
    let mut doc: IdeaDocument = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse ideas file: {}", path.display()))?;
    doc.normalize();
    Ok(doc)
}

/// Rewrites the whole document.
pub fn save_document(path: &Path, doc: &IdeaDocument) -> Result<()> {
    write_json_atomic(path, doc)
}

/// Pretty JSON to a sibling temp file, then rename over `path`.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .with_context(|| format!("Failed to write file: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace file: {}", path.display()))?;
    Ok(())
}

/// List/search filters, as accepted by `GET /api/ideas`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub items_per_page: Option<String>,
}

fn positive(value: Option<&str>, default: usize) -> usize {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(default)
}

impl IdeaQuery {
    pub fn page(&self) -> usize {
        positive(self.page.as_deref(), 1)
    }

    pub fn items_per_page(&self) -> usize {
        positive(self.items_per_page.as_deref(), DEFAULT_ITEMS_PER_PAGE)
    }
}

/// One page of matching ideas.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaPage<'a> {
    pub ideas: Vec<&'a Idea>,
    pub total: usize,
    pub page: usize,
    pub total_pages: usize,
    pub items_per_page: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LevelCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusCounts {
    pub verified: usize,
    pub pending: usize,
    pub unverified: usize,
}

/// Aggregate counters for `GET /api/ideas/stats/summary`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total_ideas: usize,
    pub unique_tags: usize,
    pub ideas_with_tags: usize,
    pub total_tags: usize,
    pub validated_ideas: usize,
    pub validation_status: StatusCounts,
    pub saturation_levels: LevelCounts,
    pub categories: BTreeMap<String, usize>,
}

impl CatalogStats {
    pub fn compute(ideas: &[Idea]) -> Self {
        let mut stats = CatalogStats {
            total_ideas: ideas.len(),
            ..Default::default()
        };
        let mut tags: HashMap<&str, usize> = HashMap::new();

        for idea in ideas {
            if !idea.tags.is_empty() {
                stats.ideas_with_tags += 1;
                for tag in &idea.tags {
                    *tags.entry(tag.as_str()).or_insert(0) += 1;
                }
            }
            if idea.is_validated() {
                stats.validated_ideas += 1;
            }
            match idea.validation.as_ref().map(|v| v.status) {
                Some(ValidationStatus::Verified) => stats.validation_status.verified += 1,
                Some(ValidationStatus::Pending) => stats.validation_status.pending += 1,
                Some(ValidationStatus::Unverified) => stats.validation_status.unverified += 1,
                None => {}
            }
            match idea.saturation.as_ref().map(|s| s.level) {
                Some(SaturationLevel::Low) => stats.saturation_levels.low += 1,
                Some(SaturationLevel::Medium) => stats.saturation_levels.medium += 1,
                Some(SaturationLevel::High) => stats.saturation_levels.high += 1,
                None => {}
            }
            if let Some(category) = idea.category.as_deref().filter(|c| !c.is_empty()) {
                *stats.categories.entry(category.to_string()).or_insert(0) += 1;
            }
        }

        stats.unique_tags = tags.len();
        stats.total_tags = tags.values().sum();
        stats
    }
}

/// An immutable, indexed view of the catalog.
pub struct Catalog {
    ideas: Arc<[Idea]>,
    metadata: serde_json::Map<String, serde_json::Value>,
    stats: CatalogStats,
    by_id: HashMap<u64, usize>,
}

impl Catalog {
    pub fn new(doc: IdeaDocument) -> Self {
        let by_id = doc
            .ideas
            .iter()
            .enumerate()
            .map(|(index, idea)| (idea.id.unwrap_or(index as u64 + 1), index))
            .collect();
        let stats = CatalogStats::compute(&doc.ideas);
        Self {
            ideas: doc.ideas.into(),
            metadata: doc.metadata,
            stats,
            by_id,
        }
    }

    pub fn empty() -> Self {
        Self::new(IdeaDocument::default())
    }

    pub fn ideas(&self) -> &[Idea] {
        &self.ideas
    }

    /// Shared handle to the ideas, for validation work off the request task.
    pub fn corpus(&self) -> Arc<[Idea]> {
        Arc::clone(&self.ideas)
    }

    pub fn metadata(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.metadata
    }

    pub fn stats(&self) -> &CatalogStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.ideas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ideas.is_empty()
    }

    pub fn get(&self, id: u64) -> Option<&Idea> {
        self.by_id.get(&id).map(|&i| &self.ideas[i])
    }

    pub fn query(&self, query: &IdeaQuery) -> IdeaPage<'_> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let tag = query.tag.as_deref().filter(|t| !t.is_empty());
        let category = query.category.as_deref().filter(|c| !c.is_empty());

        let matches: Vec<&Idea> = self
            .ideas
            .iter()
            .filter(|idea| match &search {
                Some(needle) => searchable_text(idea).contains(needle.as_str()),
                None => true,
            })
            .filter(|idea| match tag {
                Some(t) => idea.tags.iter().any(|it| it == t),
                None => true,
            })
            .filter(|idea| match category {
                Some(c) => idea.category.as_deref() == Some(c),
                None => true,
            })
            .collect();

        let page = query.page();
        let per_page = query.items_per_page();
        let total = matches.len();
        let start = (page - 1).saturating_mul(per_page);

        IdeaPage {
            ideas: matches.into_iter().skip(start).take(per_page).collect(),
            total,
            page,
            total_pages: total.div_ceil(per_page),
            items_per_page: per_page,
        }
    }

    /// Distinct tags, sorted, optionally filtered by a case-insensitive substring.
    pub fn tags(&self, search: Option<&str>) -> Vec<String> {
        let needle = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let all: BTreeSet<&str> = self
            .ideas
            .iter()
            .flat_map(|i| i.tags.iter().map(String::as_str))
            .collect();
        all.into_iter()
            .filter(|t| match &needle {
                Some(n) => t.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .map(str::to_string)
            .collect()
    }
}

fn searchable_text(idea: &Idea) -> String {
    format!(
        "{} {} {}",
        idea.name,
        idea.description,
        idea.tags.join(" ")
    )
    .to_lowercase()
}

/// Holds the current catalog snapshot and knows where it came from.
pub struct IdeaRepository {
    path: Option<PathBuf>,
    current: RwLock<Arc<Catalog>>,
}

impl IdeaRepository {
    pub fn open(path: &Path) -> Result<Self> {
        let doc = load_document(path)?;
        tracing::info!(ideas = doc.ideas.len(), path = %path.display(), "loaded ideas");
        Ok(Self {
            path: Some(path.to_path_buf()),
            current: RwLock::new(Arc::new(Catalog::new(doc))),
        })
    }

    /// Like [`open`](Self::open), but starts empty when the file cannot be
    /// read. Validation then runs without the internal corpus.
    pub fn open_or_empty(path: &Path) -> Self {
        match Self::open(path) {
            Ok(repo) => repo,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "starting with an empty idea catalog");
                Self {
                    path: Some(path.to_path_buf()),
                    current: RwLock::new(Arc::new(Catalog::empty())),
                }
            }
        }
    }

    /// An in-memory repository, not backed by a file.
    pub fn from_ideas(ideas: Vec<Idea>) -> Self {
        let mut doc = IdeaDocument {
            ideas,
            metadata: Default::default(),
        };
        doc.normalize();
        Self {
            path: None,
            current: RwLock::new(Arc::new(Catalog::new(doc))),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn snapshot(&self) -> Arc<Catalog> {
        let guard = self.current.read().unwrap_or_else(|p| p.into_inner());
        Arc::clone(&guard)
    }

    /// Re-reads the backing file and swaps in the new snapshot.
    ///
    /// Returns the number of ideas loaded. In-memory repositories keep
    /// their snapshot.
    pub fn reload(&self) -> Result<usize> {
        let Some(path) = &self.path else {
            return Ok(self.snapshot().len());
        };
        let catalog = Catalog::new(load_document(path)?);
        let count = catalog.len();
        *self.current.write().unwrap_or_else(|p| p.into_inner()) = Arc::new(catalog);
        tracing::info!(ideas = count, "reloaded idea catalog");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> Vec<Idea> {
        (1..=n)
            .map(|i| {
                Idea::new(
                    format!("Idea {}", i),
                    format!("Description {}", i),
                    vec![if i % 2 == 0 { "even" } else { "odd" }.to_string()],
                )
            })
            .collect()
    }

    fn query(page: &str, per_page: &str) -> IdeaQuery {
        IdeaQuery {
            page: Some(page.to_string()),
            items_per_page: Some(per_page.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_pagination_second_page() {
        let repo = IdeaRepository::from_ideas(numbered(60));
        let catalog = repo.snapshot();
        let page = catalog.query(&query("2", "25"));
        assert_eq!(page.ideas.len(), 25);
        assert_eq!(page.total, 60);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 2);
        assert_eq!(page.ideas[0].id, Some(26));
    }

    #[test]
    fn test_pagination_last_and_out_of_range() {
        let repo = IdeaRepository::from_ideas(numbered(60));
        let catalog = repo.snapshot();
        assert_eq!(catalog.query(&query("3", "25")).ideas.len(), 10);
        assert!(catalog.query(&query("9", "25")).ideas.is_empty());
    }

    #[test]
    fn test_invalid_paging_falls_back_to_defaults() {
        let repo = IdeaRepository::from_ideas(numbered(30));
        let page = repo.snapshot().query(&query("abc", "0")).total_pages;
        assert_eq!(page, 2);
    }

    #[test]
    fn test_search_tag_and_category_filters() {
        let mut ideas = numbered(10);
        ideas[2].category = Some("food".to_string());
        ideas[3].category = Some("food".to_string());
        let repo = IdeaRepository::from_ideas(ideas);
        let catalog = repo.snapshot();

        let q = IdeaQuery {
            search: Some("IDEA 1".to_string()),
            ..Default::default()
        };
        // "idea 1" and "idea 10"
        assert_eq!(catalog.query(&q).total, 2);

        let q = IdeaQuery {
            tag: Some("even".to_string()),
            ..Default::default()
        };
        assert_eq!(catalog.query(&q).total, 5);

        let q = IdeaQuery {
            category: Some("food".to_string()),
            tag: Some("even".to_string()),
            ..Default::default()
        };
        let page = catalog.query(&q);
        assert_eq!(page.total, 1);
        assert_eq!(page.ideas[0].id, Some(4));
    }

    #[test]
    fn test_ids_assigned_by_position() {
        let mut ideas = numbered(3);
        ideas[1].id = Some(42);
        let repo = IdeaRepository::from_ideas(ideas);
        let catalog = repo.snapshot();
        assert_eq!(catalog.get(1).map(|i| i.name.as_str()), Some("Idea 1"));
        assert_eq!(catalog.get(42).map(|i| i.name.as_str()), Some("Idea 2"));
        assert_eq!(catalog.get(3).map(|i| i.name.as_str()), Some("Idea 3"));
        assert!(catalog.get(2).is_none());
    }

    #[test]
    fn test_tags_sorted_and_filtered() {
        let ideas = vec![
            Idea::new("a", "", vec!["SaaS".into(), "AI".into()]),
            Idea::new("b", "", vec!["ai".into(), "Health".into()]),
        ];
        let repo = IdeaRepository::from_ideas(ideas);
        let catalog = repo.snapshot();
        assert_eq!(catalog.tags(None), vec!["AI", "Health", "SaaS", "ai"]);
        assert_eq!(catalog.tags(Some("A")), vec!["AI", "Health", "SaaS", "ai"]);
        assert_eq!(catalog.tags(Some("saa")), vec!["SaaS"]);
    }

    #[test]
    fn test_stats() {
        let mut ideas = numbered(4);
        ideas[0].tags.clear();
        ideas[1].category = Some("tech".into());
        let stats = CatalogStats::compute(&ideas);
        assert_eq!(stats.total_ideas, 4);
        assert_eq!(stats.ideas_with_tags, 3);
        assert_eq!(stats.unique_tags, 2);
        assert_eq!(stats.total_tags, 3);
        assert_eq!(stats.categories.get("tech"), Some(&1));
    }

    #[test]
    fn test_load_save_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ideas.json");
        std::fs::write(
            &path,
            r#"{"ideas": [{"title": "First", "tags": ["x"]}, {"id": 9, "name": "Second"}], "metadata": {"source": "test"}}"#,
        )
        .unwrap();

        let repo = IdeaRepository::open(&path).unwrap();
        let catalog = repo.snapshot();
        assert_eq!(catalog.get(1).map(|i| i.name.as_str()), Some("First"));
        assert_eq!(catalog.get(9).map(|i| i.name.as_str()), Some("Second"));

        let mut doc = load_document(&path).unwrap();
        doc.ideas.push(Idea::new("Third", "", vec![]));
        doc.normalize();
        save_document(&path, &doc).unwrap();

        assert_eq!(repo.reload().unwrap(), 3);
        let reloaded = repo.snapshot();
        assert_eq!(reloaded.get(3).map(|i| i.name.as_str()), Some("Third"));
        assert_eq!(reloaded.metadata().get("source").and_then(|v| v.as_str()), Some("test"));
        // The old snapshot is unaffected.
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_open_or_empty_missing_file() {
        let repo = IdeaRepository::open_or_empty(Path::new("/nonexistent/ideas.json"));
        assert!(repo.snapshot().is_empty());
    }
}
