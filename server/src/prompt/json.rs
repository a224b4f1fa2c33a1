use crate::error::{AppError, AppResult};

/// Pulls the JSON object out of a model reply. Models often wrap the
/// object in markdown fences or prefix it with a sentence, so everything
/// outside the outermost braces is dropped before parsing.
pub fn extract_json(response_text: &str) -> AppResult<serde_json::Value> {
    let text = response_text
        .replace("```json", "")
        .replace("```", "");
    let text = text.trim();

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        return Ok(value);
    }

    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str(&text[start..=end]).map_err(|e| {
                AppError::LlmFormat(format!("Error decoding JSON: {} in: {}", e, response_text))
            })
        }
        _ => Err(AppError::LlmFormat(format!(
            "No JSON object in: {}",
            response_text
        ))),
    }
}
