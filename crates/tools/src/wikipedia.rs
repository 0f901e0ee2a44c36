//! Wikipedia tools: title search through Wikidata and article summaries
//! through the Wikipedia REST API.
//!
//! One handler answers for two tool names; the model is expected to call
//! `search_wikipedia_titles` first and then `get_wikipedia_article` with an
//! exact title.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use wikiagent_core::error::ToolError;
use wikiagent_core::memory::MessageLog;
use wikiagent_core::message::Role;
use wikiagent_core::tool::{ToolArguments, ToolDefinition, ToolHandler, ToolParameter};

pub const SEARCH_TOOL: &str = "search_wikipedia_titles";
pub const ARTICLE_TOOL: &str = "get_wikipedia_article";

const MAX_RESULTS: usize = 5;
const WIKIDATA_API: &str = "https://www.wikidata.org/w/api.php";
const USER_AGENT: &str = concat!("wikiagent/", env!("CARGO_PKG_VERSION"));
const MODULE: &str = "wikipedia";

/// Answers `search_wikipedia_titles` and `get_wikipedia_article`.
pub struct WikipediaHandler {
    client: reqwest::Client,
    default_language: String,
    timeout_secs: u64,
}

impl WikipediaHandler {
    pub fn new(default_language: impl Into<String>, timeout_secs: u64) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: MODULE.into(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            default_language: default_language.into(),
            timeout_secs,
        })
    }

    /// The requested language, or the default. Only short ASCII language
    /// codes are accepted since the code becomes part of a host name.
    fn language(&self, arguments: &ToolArguments) -> Result<String, ToolError> {
        let language = arguments
            .get_str_or("language", &self.default_language)
            .trim()
            .to_ascii_lowercase();
        let valid = (2..=12).contains(&language.len())
            && language.chars().all(|c| c.is_ascii_lowercase() || c == '-');
        if valid {
            Ok(language)
        } else {
            Err(ToolError::InvalidArguments(format!(
                "'{language}' is not a Wikipedia language code"
            )))
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        tool_name: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ToolError> {
        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: tool_name.to_string(),
            reason,
        };
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Timeout {
                    tool_name: tool_name.to_string(),
                    timeout_secs: self.timeout_secs,
                }
            } else {
                failed(e.to_string())
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {status}")));
        }
        response.json::<T>().await.map_err(|e| failed(e.to_string()))
    }

    async fn search_titles(&self, query: &str, language: &str) -> Result<Vec<TitleMatch>, ToolError> {
        let limit = MAX_RESULTS.to_string();
        let search: WikidataSearchResponse = self
            .get_json(
                SEARCH_TOOL,
                self.client.get(WIKIDATA_API).query(&[
                    ("action", "wbsearchentities"),
                    ("search", query),
                    ("language", language),
                    ("limit", limit.as_str()),
                    ("format", "json"),
                ]),
            )
            .await?;

        let mut matches = Vec::new();
        for entity in search.search {
            match self.sitelink_title(&entity.id, language).await {
                Ok(Some(title)) => {
                    debug!(title = %title, id = %entity.id, "Wikidata match");
                    matches.push(TitleMatch {
                        title,
                        description: entity.description.unwrap_or_default(),
                    });
                }
                Ok(None) => {}
                Err(e) => debug!(id = %entity.id, error = %e, "Sitelink lookup failed, skipping"),
            }
        }
        Ok(matches)
    }

    /// The article title linked from a Wikidata entity in one language edition.
    async fn sitelink_title(&self, id: &str, language: &str) -> Result<Option<String>, ToolError> {
        let site = format!("{language}wiki");
        let entities: WikidataEntityResponse = self
            .get_json(
                SEARCH_TOOL,
                self.client.get(WIKIDATA_API).query(&[
                    ("action", "wbgetentities"),
                    ("ids", id),
                    ("props", "sitelinks"),
                    ("sitefilter", site.as_str()),
                    ("format", "json"),
                ]),
            )
            .await?;
        Ok(sitelink_from(entities, &site))
    }

    async fn article_summary(&self, title: &str, language: &str) -> Result<String, ToolError> {
        let url = summary_url(title, language)?;
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: ARTICLE_TOOL.into(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(title, %status, "Wikipedia summary request failed");
            return Ok(format!(
                "Could not fetch '{title}' (HTTP {}). Check the exact title or try another language.",
                status.as_u16()
            ));
        }

        let summary: SummaryResponse = response.json().await.map_err(|e| ToolError::ExecutionFailed {
            tool_name: ARTICLE_TOOL.into(),
            reason: format!("unreadable summary: {e}"),
        })?;
        Ok(format_summary(&summary))
    }
}

#[async_trait]
impl ToolHandler for WikipediaHandler {
    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                SEARCH_TOOL,
                "Search Wikipedia article titles. Use this FIRST to find the exact title.",
            )
            .param(ToolParameter::string("query", "Term to search for").required())
            .param(ToolParameter::string("language", "Language code (es, en, ...)")),
            ToolDefinition::new(
                ARTICLE_TOOL,
                "Get the summary of a Wikipedia article. Use after search_wikipedia_titles.",
            )
            .param(ToolParameter::string("title", "Exact article title").required())
            .param(ToolParameter::string("language", "Language code (es, en, ...)")),
        ]
    }

    async fn execute(
        &self,
        tool_name: &str,
        arguments: &ToolArguments,
        log: &MessageLog,
    ) -> Result<String, ToolError> {
        let language = self.language(arguments)?;
        match tool_name {
            SEARCH_TOOL => {
                let query = required(arguments, "query")?;
                log.append_module(MODULE, Role::System, format!("search '{query}' ({language})"));
                let matches = self.search_titles(&query, &language).await?;
                Ok(format_search_results(&query, &matches))
            }
            ARTICLE_TOOL => {
                let title = required(arguments, "title")?;
                log.append_module(MODULE, Role::System, format!("article '{title}' ({language})"));
                self.article_summary(&title, &language).await
            }
            other => Err(ToolError::NotFound(other.into())),
        }
    }
}

fn required(arguments: &ToolArguments, key: &str) -> Result<String, ToolError> {
    arguments
        .get_string(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

fn summary_url(title: &str, language: &str) -> Result<reqwest::Url, ToolError> {
    let mut url = reqwest::Url::parse(&format!("https://{language}.wikipedia.org/api/rest_v1/page/summary/"))
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| ToolError::InvalidArguments("invalid summary URL".into()))?
        .pop_if_empty()
        .push(&title.trim().replace(' ', "_"));
    Ok(url)
}

fn sitelink_from(response: WikidataEntityResponse, site: &str) -> Option<String> {
    response
        .entities
        .into_values()
        .next()
        .and_then(|mut e| e.sitelinks.remove(site))
        .map(|s| s.title)
        .filter(|t| !t.is_empty())
}

#[derive(Debug, Clone, PartialEq)]
struct TitleMatch {
    title: String,
    description: String,
}

fn format_search_results(query: &str, matches: &[TitleMatch]) -> String {
    if matches.is_empty() {
        return format!("No results found for '{query}'. Try other terms or another language.");
    }

    let mut out = format!("Found {} article(s) about '{query}':\n\n", matches.len());
    for (i, m) in matches.iter().enumerate() {
        out.push_str(&format!("{}. **{}**\n", i + 1, m.title));
        if !m.description.is_empty() {
            out.push_str(&format!("   {}\n", m.description));
        }
        out.push('\n');
    }
    out.push_str(&format!("Use {ARTICLE_TOOL} with the exact title."));
    out
}

fn format_summary(summary: &SummaryResponse) -> String {
    let mut out = format!("**{}**\n\n", summary.title);
    if let Some(description) = summary.description.as_deref().filter(|d| !d.is_empty()) {
        out.push_str(&format!("**Description:** {description}\n\n"));
    }
    if let Some(extract) = summary.extract.as_deref().filter(|e| !e.is_empty()) {
        out.push_str(extract);
        out.push_str("\n\n");
    }
    if let Some(page) = summary
        .content_urls
        .as_ref()
        .and_then(|u| u.desktop.as_ref())
        .and_then(|d| d.page.as_deref())
    {
        out.push_str(page);
    }
    out.trim_end().to_string()
}

// --- Wikidata / Wikipedia wire types ---

#[derive(Debug, Deserialize)]
struct WikidataSearchResponse {
    #[serde(default)]
    search: Vec<WikidataSearchResult>,
}

#[derive(Debug, Deserialize)]
struct WikidataSearchResult {
    id: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WikidataEntityResponse {
    #[serde(default)]
    entities: std::collections::HashMap<String, WikidataEntity>,
}

#[derive(Debug, Deserialize)]
struct WikidataEntity {
    #[serde(default)]
    sitelinks: std::collections::HashMap<String, WikidataSitelink>,
}

#[derive(Debug, Deserialize)]
struct WikidataSitelink {
    title: String,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    extract: Option<String>,
    #[serde(default)]
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    #[serde(default)]
    desktop: Option<DesktopUrl>,
}

#[derive(Debug, Deserialize)]
struct DesktopUrl {
    #[serde(default)]
    page: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> WikipediaHandler {
        WikipediaHandler::new("es", 5).unwrap()
    }

    #[test]
    fn exposes_two_tools() {
        let defs = handler().tool_definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec![SEARCH_TOOL, ARTICLE_TOOL]);
        assert_eq!(defs[0].json_schema()["required"], serde_json::json!(["query"]));
        assert_eq!(defs[1].json_schema()["required"], serde_json::json!(["title"]));
    }

    #[test]
    fn language_defaults_and_validation() {
        let h = handler();
        assert_eq!(h.language(&ToolArguments::new()).unwrap(), "es");
        assert_eq!(h.language(&ToolArguments::new().with("language", "EN")).unwrap(), "en");
        assert!(h.language(&ToolArguments::new().with("language", "evil.com/x")).is_err());
    }

    #[test]
    fn summary_url_encodes_title() {
        let url = summary_url("Rust (lenguaje de programación)", "es").unwrap();
        assert_eq!(url.host_str(), Some("es.wikipedia.org"));
        assert!(url.path().starts_with("/api/rest_v1/page/summary/Rust_"));
        assert!(!url.path().contains(' '));
        assert!(url.path().contains("%C3%B3"));
    }

    #[test]
    fn sitelink_extraction() {
        let json = r#"{"entities": {"Q575650": {"sitelinks": {"eswiki": {"site": "eswiki", "title": "Rust (lenguaje de programación)"}}}}}"#;
        let response: WikidataEntityResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            sitelink_from(response, "eswiki").as_deref(),
            Some("Rust (lenguaje de programación)")
        );

        let empty: WikidataEntityResponse = serde_json::from_str(r#"{"entities": {"Q1": {}}}"#).unwrap();
        assert_eq!(sitelink_from(empty, "eswiki"), None);
    }

    #[test]
    fn search_results_formatting() {
        let matches = vec![
            TitleMatch {
                title: "Rust".into(),
                description: "programming language".into(),
            },
            TitleMatch {
                title: "Óxido".into(),
                description: String::new(),
            },
        ];
        let out = format_search_results("rust", &matches);
        assert!(out.starts_with("Found 2 article(s) about 'rust'"));
        assert!(out.contains("1. **Rust**\n   programming language"));
        assert!(out.contains("2. **Óxido**"));
        assert!(out.ends_with("Use get_wikipedia_article with the exact title."));

        assert!(format_search_results("zzz", &[]).starts_with("No results found for 'zzz'"));
    }

    #[test]
    fn summary_formatting() {
        let json = r#"{
            "title": "Rust",
            "description": "lenguaje de programación",
            "extract": "Rust es un lenguaje de programación compilado.",
            "content_urls": {"desktop": {"page": "https://es.wikipedia.org/wiki/Rust"}}
        }"#;
        let summary: SummaryResponse = serde_json::from_str(json).unwrap();
        let out = format_summary(&summary);
        assert!(out.starts_with("**Rust**"));
        assert!(out.contains("**Description:** lenguaje de programación"));
        assert!(out.contains("compilado."));
        assert!(out.ends_with("https://es.wikipedia.org/wiki/Rust"));
    }

    #[tokio::test]
    async fn missing_query_is_invalid_arguments() {
        let h = handler();
        let log = MessageLog::new();
        let err = h.execute(SEARCH_TOOL, &ToolArguments::new(), &log).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(log.module(MODULE).is_empty());
    }

    #[tokio::test]
    async fn unknown_tool_name_is_not_found() {
        let err = handler()
            .execute("other", &ToolArguments::new(), &MessageLog::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
