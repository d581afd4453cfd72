use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const HTTP_API_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            hint: None,
        }
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DescribeResponse {
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub index_size: usize,
    pub api_version: u32,
}

impl HealthResponse {
    #[must_use]
    pub fn ok(index_size: usize) -> Self {
        Self {
            status: "ok".to_string(),
            index_size,
            api_version: HTTP_API_VERSION,
        }
    }
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

pub fn serialize_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn envelope_omits_missing_hint() {
        let raw = serialize_json(&ErrorEnvelope::new("empty_index", "Index is empty.")).unwrap();
        assert_eq!(raw, r#"{"code":"empty_index","message":"Index is empty."}"#);

        let hinted = ErrorEnvelope::new("empty_index", "Index is empty.")
            .with_hint("POST /add-image first");
        let parsed: ErrorEnvelope =
            serde_json::from_str(&serialize_json(&hinted).unwrap()).unwrap();
        assert_eq!(parsed, hinted);
    }

    #[test]
    fn health_reports_size() {
        let value: serde_json::Value =
            serde_json::from_str(&serialize_json(&HealthResponse::ok(15)).unwrap()).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["index_size"], 15);
    }
}
