//! # Credentials Value Object
//!
//! サービスアカウントの認証情報とプロジェクトID

use serde_json::Value;

/// 認証情報
///
/// サービスアカウントJSONをそのまま保持する（中身は解釈しない）
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    service_account: Value,
    project_id: String,
}

impl Credentials {
    /// 新しい認証情報を作成
    ///
    /// # Arguments
    ///
    /// * `service_account` - サービスアカウントJSON
    /// * `project_id` - GCPプロジェクトID
    pub fn new(service_account: Value, project_id: impl Into<String>) -> Self {
        Self {
            service_account,
            project_id: project_id.into(),
        }
    }

    /// JSON文字列から作成
    pub fn from_json_str(json: &str, project_id: impl Into<String>) -> serde_json::Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?, project_id))
    }

    pub fn service_account(&self) -> &Value {
        &self.service_account
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// 認証情報とプロジェクトIDが揃っているか
    ///
    /// 空のオブジェクトや空のプロジェクトIDは無効
    pub fn is_valid(&self) -> bool {
        let has_blob = match &self.service_account {
            Value::Object(map) => !map.is_empty(),
            _ => false,
        };
        has_blob && !self.project_id.is_empty()
    }
}
