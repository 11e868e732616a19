//! # Table Schema
//!
//! テーブルスキーマとモデル定義

use serde::Serialize;

/// カラム型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Int64,
    Float64,
    Numeric,
    Bool,
    Timestamp,
    Date,
    Time,
    DateTime,
    Bytes,
    Json,
}

impl FieldType {
    /// REST API 上の型名
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "STRING",
            FieldType::Int64 => "INTEGER",
            FieldType::Float64 => "FLOAT",
            FieldType::Numeric => "NUMERIC",
            FieldType::Bool => "BOOLEAN",
            FieldType::Timestamp => "TIMESTAMP",
            FieldType::Date => "DATE",
            FieldType::Time => "TIME",
            FieldType::DateTime => "DATETIME",
            FieldType::Bytes => "BYTES",
            FieldType::Json => "JSON",
        }
    }
}

/// カラムモード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    Nullable,
    Required,
    Repeated,
}

impl FieldMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldMode::Nullable => "NULLABLE",
            FieldMode::Required => "REQUIRED",
            FieldMode::Repeated => "REPEATED",
        }
    }
}

/// カラム定義
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub name: String,
    pub field_type: FieldType,
    pub mode: FieldMode,
}

impl FieldSchema {
    /// NULL 許容カラム
    pub fn nullable(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            mode: FieldMode::Nullable,
        }
    }

    /// 必須カラム
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            mode: FieldMode::Required,
        }
    }

    /// REST API のテーブルスキーマ表現
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "type": self.field_type.as_str(),
            "mode": self.mode.as_str(),
        })
    }
}

/// テーブルモデル
///
/// 行の型がカラム定義を提供する（スキーマ推論の代わり）
pub trait TableModel: Serialize {
    fn schema() -> Vec<FieldSchema>;

    fn field_names() -> Vec<String> {
        Self::schema().into_iter().map(|f| f.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Order {
        id: i64,
    }

    impl TableModel for Order {
        fn schema() -> Vec<FieldSchema> {
            vec![
                FieldSchema::required("Id", FieldType::Int64),
                FieldSchema::nullable("Amount", FieldType::Float64),
            ]
        }
    }

    #[test]
    fn test_field_names_follow_schema_order() {
        assert_eq!(Order::field_names(), vec!["Id", "Amount"]);
    }

    #[test]
    fn test_field_to_json() {
        let field = FieldSchema::nullable("Expiry", FieldType::Timestamp);
        assert_eq!(
            field.to_json(),
            json!({"name": "Expiry", "type": "TIMESTAMP", "mode": "NULLABLE"})
        );
    }
}
