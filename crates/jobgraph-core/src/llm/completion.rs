//! Text-completion seam used by the analysis pipeline

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// A service that answers a prompt with JSON text.
///
/// The pipeline only ever asks for one of its fixed JSON shapes; transport,
/// retries and model choice are the implementor's business.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Pull the JSON body out of a completion that may wrap it in prose or a
/// fenced code block
pub fn extract_json_from_response(response: &str) -> &str {
    if let Some(start) = response.find("```json") {
        let json_start = start + 7;
        if let Some(end) = response[json_start..].find("```") {
            return response[json_start..json_start + end].trim();
        }
    }

    if let Some(start) = response.find("```") {
        let potential_start = start + 3;
        if let Some(newline) = response[potential_start..].find('\n') {
            let json_start = potential_start + newline + 1;
            if let Some(end) = response[json_start..].find("```") {
                return response[json_start..json_start + end].trim();
            }
        }
    }

    // whichever bracket opens first decides object vs array
    let object = response.find('{').zip(response.rfind('}'));
    let array = response.find('[').zip(response.rfind(']'));
    let span = match (object, array) {
        (Some(o), Some(a)) => Some(if a.0 < o.0 { a } else { o }),
        (o, a) => o.or(a),
    };

    match span {
        Some((start, end)) if start < end => &response[start..=end],
        _ => response.trim(),
    }
}

/// Parse a completion into one of the fixed response shapes.
/// Malformed JSON is a hard failure for the calling step.
pub fn parse_completion<T: DeserializeOwned>(response: &str, shape: &'static str) -> Result<T> {
    serde_json::from_str(extract_json_from_response(response))
        .map_err(|e| Error::MalformedResponse(shape, e.to_string()))
}
