//! # Select Configuration
//!
//! SELECT 文の組み立てパラメータ

/// SELECT 設定
///
/// 呼び出しごとに作成して使い捨てる
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectConfig {
    /// データセット名（空の場合はテーブル名のみで参照）
    pub dataset_name: String,
    /// テーブルまたはビュー名
    pub table_or_view_name: String,
    /// SELECT 句（空の場合は `*`）
    pub sql_select: String,
    /// WHERE 句
    pub sql_where: String,
    pub sql_order_by: Option<String>,
    pub sql_limit: Option<u64>,
}

impl SelectConfig {
    pub fn new(dataset_name: impl Into<String>, table_or_view_name: impl Into<String>) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            table_or_view_name: table_or_view_name.into(),
            ..Default::default()
        }
    }

    pub fn select(mut self, sql_select: impl Into<String>) -> Self {
        self.sql_select = sql_select.into();
        self
    }

    pub fn filter(mut self, sql_where: impl Into<String>) -> Self {
        self.sql_where = sql_where.into();
        self
    }

    pub fn order_by(mut self, sql_order_by: impl Into<String>) -> Self {
        self.sql_order_by = Some(sql_order_by.into());
        self
    }

    pub fn limit(mut self, sql_limit: u64) -> Self {
        self.sql_limit = Some(sql_limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_methods() {
        let config = SelectConfig::new("sales", "orders")
            .select("Id, Amount")
            .filter("Amount > 10")
            .order_by("Id")
            .limit(5);

        assert_eq!(config.dataset_name, "sales");
        assert_eq!(config.table_or_view_name, "orders");
        assert_eq!(config.sql_select, "Id, Amount");
        assert_eq!(config.sql_where, "Amount > 10");
        assert_eq!(config.sql_order_by.as_deref(), Some("Id"));
        assert_eq!(config.sql_limit, Some(5));
    }
}
