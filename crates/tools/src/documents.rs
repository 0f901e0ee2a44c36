//! Document search tool: keyword retrieval over a local directory of
//! text files.
//!
//! Files are scored by how often the query terms occur; the best matches
//! are returned with the first matching line as a snippet. Only the
//! `local` source is backed by an index; `vector` and `web` are declared
//! so the model sees the full interface, and report that they are not
//! configured.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use wikiagent_core::error::ToolError;
use wikiagent_core::memory::MessageLog;
use wikiagent_core::message::Role;
use wikiagent_core::tool::{ToolArguments, ToolDefinition, ToolHandler, ToolParameter};

pub const TOOL_NAME: &str = "search_documents";

const MODULE: &str = "documents";
const MAX_RESULTS: usize = 5;
const MAX_FILES: usize = 1000;
const MAX_DEPTH: usize = 8;
const MAX_FILE_BYTES: u64 = 1024 * 1024;
const SNIPPET_CHARS: usize = 240;
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "csv", "json", "toml", "yaml", "yml", "html", "htm", "log", "xml",
];

/// Answers `search_documents` from files under `root`.
pub struct DocumentSearchHandler {
    root: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
struct DocumentHit {
    path: PathBuf,
    score: usize,
    snippet: String,
}

impl DocumentSearchHandler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Text files under the root, breadth-first, bounded in count and depth.
    async fn collect_files(&self) -> Result<Vec<PathBuf>, ToolError> {
        let mut files = Vec::new();
        let mut pending = VecDeque::from([(self.root.clone(), 0usize)]);

        while let Some((dir, depth)) = pending.pop_front() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| ToolError::ExecutionFailed {
                tool_name: TOOL_NAME.into(),
                reason: format!("cannot read {}: {e}", dir.display()),
            })?;

            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                let Ok(file_type) = entry.file_type().await else {
                    continue;
                };
                if file_type.is_dir() {
                    if depth + 1 < MAX_DEPTH {
                        pending.push_back((path, depth + 1));
                    }
                } else if file_type.is_file() && is_text_file(&path) {
                    files.push(path);
                    if files.len() >= MAX_FILES {
                        return Ok(files);
                    }
                }
            }
        }
        Ok(files)
    }

    async fn search_local(&self, query: &str) -> Result<Vec<DocumentHit>, ToolError> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Err(ToolError::InvalidArguments(
                "query must contain at least one word of two or more characters".into(),
            ));
        }

        let mut hits = Vec::new();
        for path in self.collect_files().await? {
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.len() <= MAX_FILE_BYTES => {}
                _ => continue,
            }
            // Non-UTF-8 files are skipped
            let Ok(content) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            if let Some((score, snippet)) = score_document(&content, &terms) {
                let relative = path.strip_prefix(&self.root).unwrap_or(&path).to_path_buf();
                hits.push(DocumentHit {
                    path: relative,
                    score,
                    snippet,
                });
            }
        }

        hits.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.path.cmp(&b.path)));
        hits.truncate(MAX_RESULTS);
        Ok(hits)
    }
}

#[async_trait]
impl ToolHandler for DocumentSearchHandler {
    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                TOOL_NAME,
                "Search local documents for passages matching a query. Returns file names and snippets.",
            )
            .param(ToolParameter::string("query", "Search query").required())
            .param(
                ToolParameter::string("source", "Where to search: 'local', 'vector' or 'web'")
                    .one_of(["local", "vector", "web"]),
            ),
        ]
    }

    async fn execute(
        &self,
        _tool_name: &str,
        arguments: &ToolArguments,
        log: &MessageLog,
    ) -> Result<String, ToolError> {
        let query = arguments
            .get_string("query")
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let source = arguments.get_str_or("source", "local");

        log.append_module(MODULE, Role::System, format!("search '{query}' in {source}"));

        match source.as_str() {
            "local" => {
                let hits = self.search_local(&query).await?;
                debug!(query = %query, hits = hits.len(), "Document search finished");
                Ok(format_hits(&query, &hits))
            }
            "vector" | "web" => Ok(format!(
                "Source '{source}' is not configured. Use source 'local', or search_wikipedia_titles for encyclopedic topics."
            )),
            other => Err(ToolError::InvalidArguments(format!(
                "unknown source '{other}', expected local, vector or web"
            ))),
        }
    }
}

fn is_text_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| TEXT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Lowercased, de-duplicated words of at least two characters.
fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(|t| t.to_lowercase())
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

/// Total term occurrences plus the first matching line, or `None` when no
/// term occurs.
fn score_document(content: &str, terms: &[String]) -> Option<(usize, String)> {
    let lower = content.to_lowercase();
    let score: usize = terms.iter().map(|t| lower.matches(t.as_str()).count()).sum();
    if score == 0 {
        return None;
    }

    let snippet = content
        .lines()
        .find(|line| {
            let line = line.to_lowercase();
            terms.iter().any(|t| line.contains(t.as_str()))
        })
        .map(|line| truncate_chars(line.trim(), SNIPPET_CHARS))
        .unwrap_or_default();

    Some((score, snippet))
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max).collect();
        out.push_str("...");
        out
    }
}

fn format_hits(query: &str, hits: &[DocumentHit]) -> String {
    if hits.is_empty() {
        return format!("No documents match '{query}'.");
    }
    let mut out = format!("Found {} document(s) matching '{query}':\n\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} (score {})\n   {}\n\n",
            i + 1,
            hit.path.display(),
            hit.score,
            hit.snippet
        ));
    }
    out.trim_end().to_string()
}
