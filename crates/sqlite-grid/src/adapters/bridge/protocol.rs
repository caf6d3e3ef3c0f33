use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;

/// One NDJSON request line: `{ "v": 1, "id": "...", "cmd": "...", "payload": {...} }`.
#[derive(Debug, Deserialize)]
pub struct BridgeRequest {
    pub v: u32,
    pub id: String,
    pub cmd: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Answer to one request, echoing its `v` and `id`.
///
/// `details` is only set for failed `grid` calls, where it carries the
/// `{success: false, message}` grid envelope.
#[derive(Debug, Serialize)]
pub struct BridgeResponse<T> {
    pub v: u32,
    pub id: String,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl<T> BridgeResponse<T> {
    fn new(v: u32, id: String, status: ResponseStatus) -> Self {
        Self {
            v,
            id,
            status,
            data: None,
            error: None,
            code: None,
            details: None,
        }
    }

    pub fn ok(v: u32, id: String, data: T) -> Self {
        Self {
            data: Some(data),
            ..Self::new(v, id, ResponseStatus::Ok)
        }
    }

    pub fn err(v: u32, id: String, code: &'static str, error: String) -> Self {
        Self {
            error: Some(error),
            code: Some(code),
            ..Self::new(v, id, ResponseStatus::Error)
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

// Payloads. Missing optional fields deserialize as `None`; a missing `path`
// means "the connected database".

#[derive(Debug, Deserialize)]
pub struct ConnectPayload {
    pub path: String,
}

/// Page size is clamped by the handler before it reaches the grid.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPayload {
    pub table: String,
    pub page: Option<i64>,
    pub page_size: Option<usize>,
    pub search_term: Option<String>,
    pub search_column: Option<String>,
    pub sort_field: Option<String>,
    pub sort_direction: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TablesPayload {
    pub path: Option<String>,
}

/// Shared by `describe` and `table_exists`.
#[derive(Debug, Deserialize)]
pub struct TablePayload {
    pub table: String,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ColumnPayload {
    pub table: String,
    pub column: String,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPayload {
    pub table: String,
    pub id: i64,
    pub path: Option<String>,
}
