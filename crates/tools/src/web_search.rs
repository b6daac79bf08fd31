//! Web search tool: read-only queries against the DuckDuckGo instant
//! answer API. No API key required.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use ironmind_core::error::ToolError;
use ironmind_core::schema::ObjectSchema;
use ironmind_core::tool::{DangerClass, Tool, ToolResult};

const API_URL: &str = "https://api.duckduckgo.com/";

pub struct WebSearchTool {
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct DdgResponse {
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<DdgTopic>,
}

#[derive(Deserialize)]
struct DdgTopic {
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(rename = "FirstURL", default)]
    first_url: String,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Returns a summary and related results."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        ObjectSchema::new()
            .string("query", "The search query")
            .integer("max_results", "Maximum related results to return (default 5)")
            .required(&["query"])
            .build()
    }

    fn danger_class(&self) -> DangerClass {
        DangerClass::Safe
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("missing 'query' argument".into()))?;
        let max_results = arguments["max_results"].as_u64().unwrap_or(5) as usize;

        debug!(query = %query, "Web search");

        let response = self
            .client
            .get(API_URL)
            .query(&[("q", query), ("format", "json"), ("no_html", "1")])
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "web_search".into(),
                reason: format!("connection failed: {e}"),
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(ToolError::ExecutionFailed {
                tool_name: "web_search".into(),
                reason: format!("HTTP {status} returned"),
            });
        }

        let parsed: DdgResponse =
            response.json().await.map_err(|e| ToolError::ExecutionFailed {
                tool_name: "web_search".into(),
                reason: format!("failed to parse search response: {e}"),
            })?;

        let mut lines = Vec::new();
        if !parsed.abstract_text.is_empty() {
            lines.push(format!("{} ({})", parsed.abstract_text, parsed.abstract_url));
        }
        for topic in parsed.related_topics.iter().take(max_results) {
            if !topic.text.is_empty() {
                lines.push(format!("- {} ({})", topic.text, topic.first_url));
            }
        }

        if lines.is_empty() {
            lines.push(format!("No results found for '{query}'"));
        }

        Ok(ToolResult::success(lines.join("\n"))
            .with_meta("query", query)
            .with_meta("result_count", lines.len() as u64))
    }
}
