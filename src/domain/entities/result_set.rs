//! # Result Set
//!
//! クエリ結果（カラム名と文字列セル）

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// クエリ結果
///
/// セルは API が返す文字列表現のまま保持し、NULL は `None`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub total_rows: u64,
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 先頭行の先頭セル
    pub fn first_value(&self) -> Option<&str> {
        self.rows
            .first()
            .and_then(|row| row.first())
            .and_then(|cell| cell.as_deref())
    }

    /// 全セルを行順に並べる（NULL は空文字）
    pub fn flatten(&self) -> Vec<String> {
        self.rows
            .iter()
            .flat_map(|row| row.iter().map(|cell| cell.clone().unwrap_or_default()))
            .collect()
    }

    /// 行をカラム名をキーにしたJSONオブジェクトに変換
    pub fn row_object(&self, index: usize) -> Option<Value> {
        let row = self.rows.get(index)?;
        let mut object = Map::new();
        for (column, cell) in self.columns.iter().zip(row.iter()) {
            let value = match cell {
                Some(s) => Value::String(s.clone()),
                None => Value::Null,
            };
            object.insert(column.clone(), value);
        }
        Some(Value::Object(object))
    }

    /// 行をモデルにデコード
    pub fn decode_row<T: DeserializeOwned>(&self, index: usize) -> serde_json::Result<Option<T>> {
        match self.row_object(index) {
            Some(object) => serde_json::from_value(object).map(Some),
            None => Ok(None),
        }
    }
}
