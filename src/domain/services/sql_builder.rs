//! # SQL Builder Service
//!
//! SELECT / DELETE / MERGE 文の組み立て

use crate::domain::entities::select_config::SelectConfig;

/// 末尾が `Json` のフィールドはマージ対象外
const JSON_FIELD_SUFFIX: &str = "Json";
/// 行単位でマージを除外するフラグカラム
const IGNORE_FIELD: &str = "Ignore";

/// SQLビルダー
pub struct SqlBuilder;

impl SqlBuilder {
    /// 文字列リテラルとしてクォートする（`\` と `'` をエスケープ）
    pub fn quote_literal(value: &str) -> String {
        let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
        format!("'{}'", escaped)
    }

    /// バッククォートで囲んだテーブル参照
    ///
    /// データセット名が空の場合はテーブル名のみ
    pub fn table_ref(dataset_name: &str, table_name: &str) -> String {
        if dataset_name.is_empty() {
            format!("`{}`", table_name)
        } else {
            format!("`{}.{}`", dataset_name, table_name)
        }
    }

    /// 句の先頭にキーワードが無ければ付与する
    fn with_keyword(clause: &str, keyword: &str) -> Option<String> {
        let clause = clause.trim();
        if clause.is_empty() {
            return None;
        }
        let prefix = format!("{} ", keyword);
        if clause.to_ascii_uppercase().starts_with(&prefix) {
            Some(clause.to_string())
        } else {
            Some(format!("{}{}", prefix, clause))
        }
    }

    /// SELECT 文を組み立てる
    ///
    /// # Arguments
    ///
    /// * `config` - SELECT 設定
    ///
    /// # Returns
    ///
    /// `SELECT <select|*> FROM `ds.table` [WHERE ..] [ORDER BY ..] [LIMIT n]`
    pub fn build_select(config: &SelectConfig) -> String {
        let select = if config.sql_select.trim().is_empty() {
            "*"
        } else {
            config.sql_select.trim()
        };

        let mut parts = vec![
            format!("SELECT {}", select),
            format!(
                "FROM {}",
                Self::table_ref(&config.dataset_name, &config.table_or_view_name)
            ),
        ];

        if let Some(where_clause) = Self::with_keyword(&config.sql_where, "WHERE") {
            parts.push(where_clause);
        }
        if let Some(order_by) = config
            .sql_order_by
            .as_deref()
            .and_then(|o| Self::with_keyword(o, "ORDER BY"))
        {
            parts.push(order_by);
        }
        if let Some(limit) = config.sql_limit {
            parts.push(format!("LIMIT {}", limit));
        }

        parts.join(" ")
    }

    /// DELETE 文を組み立てる
    ///
    /// WHERE 句が空の場合は全行削除（`WHERE TRUE`）
    pub fn build_delete(dataset_name: &str, table_name: &str, sql_where: &str) -> String {
        let where_clause =
            Self::with_keyword(sql_where, "WHERE").unwrap_or_else(|| "WHERE TRUE".to_string());
        format!(
            "DELETE FROM {} {}",
            Self::table_ref(dataset_name, table_name),
            where_clause
        )
    }

    /// MERGE 文を組み立てる
    ///
    /// # Arguments
    ///
    /// * `fields` - モデルのフィールド名（`Json` サフィックスと `Ignore` は除外）
    /// * `source_table` - ソーステーブル（`dataset.table`）
    /// * `target_table` - ターゲットテーブル（`dataset.table`）
    /// * `id_field` - 突き合わせに使うフィールド
    /// * `has_ignore_field` - `SOURCE.Ignore` が真の行を除外するか
    pub fn build_merge(
        fields: &[String],
        source_table: &str,
        target_table: &str,
        id_field: &str,
        has_ignore_field: bool,
    ) -> String {
        let columns: Vec<String> = fields
            .iter()
            .filter(|f| !f.ends_with(JSON_FIELD_SUFFIX) && f.as_str() != IGNORE_FIELD)
            .map(|f| format!("`{}`", f))
            .collect();

        let update = columns
            .iter()
            .map(|c| format!("TARGET.{} = SOURCE.{}", c, c))
            .collect::<Vec<_>>()
            .join(",");
        let insert = columns.join(",");
        let values = columns
            .iter()
            .map(|c| format!("SOURCE.{}", c))
            .collect::<Vec<_>>()
            .join(",");

        let ignore = if has_ignore_field {
            " AND SOURCE.Ignore IS FALSE"
        } else {
            ""
        };

        format!(
            "MERGE `{target}` AS TARGET USING `{source}` AS SOURCE \
             ON TARGET.{id} = SOURCE.{id} \
             WHEN MATCHED{ignore} THEN UPDATE SET {update} \
             WHEN NOT MATCHED BY TARGET{ignore} THEN INSERT({insert}) VALUES({values})",
            target = target_table,
            source = source_table,
            id = id_field,
            ignore = ignore,
            update = update,
            insert = insert,
            values = values,
        )
    }
}
