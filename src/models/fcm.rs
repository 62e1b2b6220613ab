use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_ids: Option<Vec<String>>,

    pub data: Map<String, Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Map<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapse_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmResponse {
    #[serde(default)]
    pub success: u32,

    #[serde(default)]
    pub failure: u32,

    #[serde(default)]
    pub canonical_ids: u32,

    #[serde(default)]
    pub results: Vec<FcmResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmResult {
    pub message_id: Option<String>,
    pub registration_id: Option<String>,
    pub error: Option<String>,
}
