//! Result-page parsing and the relevance filter.

use scraper::{ElementRef, Html, Selector};

/// Product words that make a result count as a competitor even when the
/// idea name does not appear in it. Checked against the title only.
const PRODUCT_WORDS: &[&str] = &["app", "software", "platform", "service"];

/// One organic search result as scraped from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Container layouts, tried in order until one yields results.
struct Layout {
    container: &'static str,
    title: &'static str,
    link: &'static str,
    snippet: &'static [&'static str],
}

const LAYOUTS: &[Layout] = &[
    // Google
    Layout {
        container: "div.g",
        title: "h3",
        link: "a[href]",
        snippet: &["div[data-sncf]", "span"],
    },
    // DuckDuckGo HTML endpoint
    Layout {
        container: "div.result",
        title: "a.result__a",
        link: "a.result__a[href]",
        snippet: &[".result__snippet"],
    },
];

/// Extracts at most `limit` results from a results page.
///
/// Containers without both a title and a link are skipped.
pub fn parse_results(html: &str, limit: usize) -> Vec<RawResult> {
    let document = Html::parse_document(html);

    for layout in LAYOUTS {
        let (Ok(container), Ok(title), Ok(link)) = (
            Selector::parse(layout.container),
            Selector::parse(layout.title),
            Selector::parse(layout.link),
        ) else {
            continue;
        };
        let snippets: Vec<Selector> = layout
            .snippet
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .collect();

        let results: Vec<RawResult> = document
            .select(&container)
            .take(limit)
            .filter_map(|el| {
                let title = compact_text(el.select(&title).next()?);
                let href = el.select(&link).next()?.value().attr("href")?;
                let snippet = snippets
                    .iter()
                    .find_map(|sel| el.select(sel).next())
                    .map(compact_text)
                    .unwrap_or_default();
                Some(RawResult {
                    title,
                    url: normalize_href(href),
                    snippet,
                })
            })
            .collect();

        if !results.is_empty() {
            return results;
        }
    }

    Vec::new()
}

fn compact_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unwraps search-engine redirect links (`/url?q=...`, `//duckduckgo.com/l/?uddg=...`).
pub fn normalize_href(href: &str) -> String {
    let href = href.trim();
    let absolute = if let Some(rest) = href.strip_prefix("//") {
        format!("https://{}", rest)
    } else if href.starts_with('/') {
        format!("https://www.google.com{}", href)
    } else {
        href.to_string()
    };

    let Ok(url) = reqwest::Url::parse(&absolute) else {
        return href.to_string();
    };
    let redirect_param = match url.path() {
        "/url" => "q",
        "/l/" => "uddg",
        _ => return absolute,
    };
    url.query_pairs()
        .find(|(k, _)| k == redirect_param)
        .map(|(_, v)| v.into_owned())
        .filter(|v| v.starts_with("http"))
        .unwrap_or(absolute)
}

/// Keeps results that mention the idea name, or whose title contains a
/// product word.
///
/// An empty name never matches on its own; only the product words apply.
pub fn filter_relevant(results: &[RawResult], idea_name: &str) -> Vec<RawResult> {
    let name = idea_name.trim().to_lowercase();
    results
        .iter()
        .filter(|r| {
            let title = r.title.to_lowercase();
            let snippet = r.snippet.to_lowercase();
            let mentions_name =
                !name.is_empty() && (title.contains(&name) || snippet.contains(&name));
            mentions_name || PRODUCT_WORDS.iter().any(|w| title.contains(w))
        })
        .cloned()
        .collect()
}
