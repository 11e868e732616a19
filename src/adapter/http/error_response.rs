//! Google API error response
//!
//! Google API 共通のエラーレスポンス

use serde::Deserialize;

/// `{"error": {...}}` の形式で返るエラー
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct GoogleErrorResponse {
    #[serde(default)]
    pub error: GoogleError,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct GoogleError {
    pub code: i64,
    pub message: String,
    pub errors: Vec<GoogleErrorDetail>,
    pub status: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct GoogleErrorDetail {
    pub domain: String,
    pub message: String,
    pub reason: String,
    pub location: String,
    pub location_type: String,
}

impl GoogleErrorResponse {
    /// レスポンスボディを解析（Google形式でなければ `None`）
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    /// 空でないエラーメッセージ
    pub fn message(&self) -> Option<&str> {
        Some(self.error.message.as_str()).filter(|m| !m.is_empty())
    }
}
