//! O*NET Web Services client
//!
//! Combines the occupation summary with its skills, technology skills and
//! work-activity detail endpoints into one [`OccupationTaxonomy`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::TaxonomyConfig;
use crate::error::{Error, Result};

use super::payload::{OccupationTaxonomy, TaxonomyRecord};
use super::source::TaxonomySource;

/// Keys under which detail endpoints return their element arrays
const LIST_KEYS: [&str; 6] = [
    "element",
    "skills",
    "work_activities",
    "technology",
    "task",
    "tasks",
];

/// Keys that may carry an element's display name, most specific first
const NAME_KEYS: [&str; 5] = ["element_name", "name", "statement", "example", "title"];

#[derive(Clone)]
pub struct OnetClient {
    http_client: HttpClient,
    base_url: String,
    credentials: Option<(String, String)>,
}

impl std::fmt::Debug for OnetClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnetClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}

impl OnetClient {
    pub fn new(
        base_url: impl Into<String>,
        credentials: Option<(String, String)>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Build from configuration, reading credentials from the environment
    pub fn from_config(config: &TaxonomyConfig) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            config.resolved_credentials(),
            config.timeout_secs,
        )
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    async fn get_json(&self, code: &str, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Calling taxonomy API");

        let mut request = self
            .http_client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, Some(password));
        }

        let response = request.send().await.map_err(Error::NetworkError)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::TaxonomyApi(
                code.to_string(),
                format!("{} returned {}", path, status),
            ));
        }

        response.json().await.map_err(|e| {
            Error::TaxonomyApi(code.to_string(), format!("invalid JSON from {}: {}", path, e))
        })
    }

    /// A detail endpoint's elements, or nothing if the endpoint fails
    async fn detail_records(&self, code: &str, detail: &str) -> Vec<TaxonomyRecord> {
        let path = format!("/online/occupations/{}/details/{}", code, detail);
        match self.get_json(code, &path).await {
            Ok(body) => records_from_body(&body),
            Err(e) => {
                warn!(
                    code = %code,
                    detail = %detail,
                    error = %e,
                    "Taxonomy detail unavailable, using empty list"
                );
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl TaxonomySource for OnetClient {
    async fn fetch_occupation(&self, code: &str) -> Result<OccupationTaxonomy> {
        info!(code = %code, "Fetching occupation taxonomy");

        let summary = self
            .get_json(code, &format!("/online/occupations/{}", code))
            .await?;

        let skills = self.detail_records(code, "skills").await;
        let technologies = self.detail_records(code, "technology_skills").await;
        let activities = self.detail_records(code, "work_activities").await;
        let tasks = match summary.get("tasks") {
            Some(tasks) => records_from_array(tasks),
            None => self.detail_records(code, "tasks").await,
        };

        Ok(OccupationTaxonomy {
            code: Some(code.to_string()),
            title: summary.get("title").and_then(Value::as_str).map(str::to_string),
            description: summary
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            skills,
            technologies,
            tasks,
            activities,
        })
    }
}

fn records_from_body(body: &Value) -> Vec<TaxonomyRecord> {
    if body.is_array() {
        return records_from_array(body);
    }
    LIST_KEYS
        .iter()
        .find_map(|key| body.get(*key).filter(|v| v.is_array()))
        .map(records_from_array)
        .unwrap_or_default()
}

fn records_from_array(array: &Value) -> Vec<TaxonomyRecord> {
    array
        .as_array()
        .map(|items| items.iter().map(record_from_element).collect())
        .unwrap_or_default()
}

fn record_from_element(element: &Value) -> TaxonomyRecord {
    if let Some(name) = element.as_str() {
        return TaxonomyRecord::named(name);
    }

    let name = NAME_KEYS.iter().find_map(|key| match element.get(*key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(inner)) => inner.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    });

    let score = element
        .get("scale_value")
        .or_else(|| element.get("importance"))
        .or_else(|| element.get("score").and_then(|s| s.get("value")))
        .and_then(Value::as_f64);

    TaxonomyRecord {
        name,
        level: None,
        importance: score,
        category: element
            .get("category")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}
