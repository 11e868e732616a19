//! # Token SQL Service
//!
//! トークンテーブルの読み書きSQL

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::sql_builder::SqlBuilder;
use crate::domain::entities::nullable::{NullString, NullTimestamp};
use crate::domain::entities::select_config::SelectConfig;
use crate::domain::entities::token::Token;

/// 既定のトークンテーブル名（`dataset.table`）
pub const DEFAULT_TOKEN_TABLE: &str = "oauth2.tokens";

/// 読み込むカラム
pub const TOKEN_COLUMNS: &str = "TokenType, AccessToken, RefreshToken, Expiry, Scope";

/// 空文字列・未設定の文字列カラム
const NULL_STRING: &str = "NULLIF('','')";
/// 未設定の有効期限
const NULL_TIMESTAMP: &str = "TIMESTAMP(NULL)";
const EXPIRY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// トークンテーブルの1行
#[derive(Debug, Default, Deserialize)]
pub struct TokenRow {
    #[serde(rename = "AccessToken", default)]
    pub access_token: NullString,
    #[serde(rename = "Scope", default)]
    pub scope: NullString,
    #[serde(rename = "TokenType", default)]
    pub token_type: NullString,
    #[serde(rename = "RefreshToken", default)]
    pub refresh_token: NullString,
    #[serde(rename = "Expiry", default)]
    pub expiry: NullTimestamp,
}

impl From<TokenRow> for Token {
    fn from(row: TokenRow) -> Self {
        Token::new(
            row.access_token.into_option(),
            row.scope.into_option(),
            row.token_type.into_option(),
            row.refresh_token.into_option(),
            row.expiry.into_option(),
        )
    }
}

/// トークンSQLサービス
pub struct TokenSql;

impl TokenSql {
    /// (Api, ClientID) で1行を選択する設定
    pub fn select_config(token_table: &str, api_name: &str, client_id: &str) -> SelectConfig {
        SelectConfig::new("", token_table)
            .select(TOKEN_COLUMNS)
            .filter(format!(
                "Api = {} AND ClientID = {}",
                SqlBuilder::quote_literal(api_name),
                SqlBuilder::quote_literal(client_id)
            ))
    }

    fn string_or_null(value: Option<&str>) -> Option<String> {
        value
            .filter(|v| !v.is_empty())
            .map(SqlBuilder::quote_literal)
    }

    fn expiry_literal(expiry: Option<DateTime<Utc>>) -> String {
        match expiry {
            Some(e) => format!("TIMESTAMP('{}')", e.format(EXPIRY_FORMAT)),
            None => NULL_TIMESTAMP.to_string(),
        }
    }

    /// トークンを保存する MERGE 文
    ///
    /// 更新時は AccessToken と Expiry を常に上書きし、
    /// TokenType / RefreshToken / Scope は値がある場合のみ上書きする
    pub fn merge(token_table: &str, api_name: &str, client_id: &str, token: &Token) -> String {
        let mut update = vec![
            "AccessToken = SOURCE.AccessToken".to_string(),
            "Expiry = SOURCE.Expiry".to_string(),
        ];

        let token_type = Self::string_or_null(token.token_type.as_deref());
        if token_type.is_some() {
            update.push("TokenType = SOURCE.TokenType".to_string());
        }
        let access_token = Self::string_or_null(token.access_token.as_deref());
        let refresh_token = Self::string_or_null(token.refresh_token.as_deref());
        if refresh_token.is_some() {
            update.push("RefreshToken = SOURCE.RefreshToken".to_string());
        }
        let scope = Self::string_or_null(token.scope.as_deref());
        if scope.is_some() {
            update.push("Scope = SOURCE.Scope".to_string());
        }

        let or_null = |v: Option<String>| v.unwrap_or_else(|| NULL_STRING.to_string());

        format!(
            "MERGE {table} AS TARGET \
             USING (SELECT {api} AS Api, {client} AS ClientID, {token_type} AS TokenType, \
             {access_token} AS AccessToken, {refresh_token} AS RefreshToken, \
             {expiry} AS Expiry, {scope} AS Scope) AS SOURCE \
             ON TARGET.Api = SOURCE.Api AND TARGET.ClientID = SOURCE.ClientID \
             WHEN MATCHED THEN UPDATE SET {update} \
             WHEN NOT MATCHED BY TARGET THEN \
             INSERT (Api, ClientID, TokenType, AccessToken, RefreshToken, Expiry, Scope) \
             VALUES (SOURCE.Api, SOURCE.ClientID, SOURCE.TokenType, SOURCE.AccessToken, \
             SOURCE.RefreshToken, SOURCE.Expiry, SOURCE.Scope)",
            table = SqlBuilder::table_ref("", token_table),
            api = SqlBuilder::quote_literal(api_name),
            client = SqlBuilder::quote_literal(client_id),
            token_type = or_null(token_type),
            access_token = or_null(access_token),
            refresh_token = or_null(refresh_token),
            expiry = Self::expiry_literal(token.expiry),
            scope = or_null(scope),
            update = update.join(", "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn full_token() -> Token {
        Token {
            access_token: Some("ya29.a0".to_string()),
            scope: Some("https://www.googleapis.com/auth/webmasters".to_string()),
            token_type: Some("Bearer".to_string()),
            refresh_token: Some("1//0g".to_string()),
            expiry: Some(Utc.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap()),
        }
    }

    #[test]
    fn test_select_config() {
        let config = TokenSql::select_config(DEFAULT_TOKEN_TABLE, "searchconsole", "123.apps");
        let sql = SqlBuilder::build_select(&config);

        assert_eq!(
            sql,
            "SELECT TokenType, AccessToken, RefreshToken, Expiry, Scope \
             FROM `oauth2.tokens` WHERE Api = 'searchconsole' AND ClientID = '123.apps'"
        );
    }

    #[test]
    fn test_merge_full_token() {
        let sql = TokenSql::merge(DEFAULT_TOKEN_TABLE, "searchconsole", "123.apps", &full_token());

        assert!(sql.starts_with("MERGE `oauth2.tokens` AS TARGET USING (SELECT 'searchconsole' AS Api, '123.apps' AS ClientID, 'Bearer' AS TokenType, 'ya29.a0' AS AccessToken, '1//0g' AS RefreshToken, TIMESTAMP('2024-06-01T10:30:00') AS Expiry, 'https://www.googleapis.com/auth/webmasters' AS Scope) AS SOURCE"));
        assert!(sql.contains(
            "UPDATE SET AccessToken = SOURCE.AccessToken, Expiry = SOURCE.Expiry, \
             TokenType = SOURCE.TokenType, RefreshToken = SOURCE.RefreshToken, Scope = SOURCE.Scope \
             WHEN NOT MATCHED"
        ));
        assert!(sql.ends_with(
            "INSERT (Api, ClientID, TokenType, AccessToken, RefreshToken, Expiry, Scope) \
             VALUES (SOURCE.Api, SOURCE.ClientID, SOURCE.TokenType, SOURCE.AccessToken, \
             SOURCE.RefreshToken, SOURCE.Expiry, SOURCE.Scope)"
        ));
    }

    #[test]
    fn test_merge_absent_fields_use_null_sentinels() {
        let token = Token {
            access_token: Some("ya29.a0".to_string()),
            refresh_token: Some(String::new()),
            ..Default::default()
        };

        let sql = TokenSql::merge(DEFAULT_TOKEN_TABLE, "api", "client", &token);

        assert!(sql.contains("NULLIF('','') AS TokenType"));
        assert!(sql.contains("NULLIF('','') AS RefreshToken"));
        assert!(sql.contains("TIMESTAMP(NULL) AS Expiry"));
        assert!(sql.contains("NULLIF('','') AS Scope"));
        assert!(sql.contains(
            "UPDATE SET AccessToken = SOURCE.AccessToken, Expiry = SOURCE.Expiry WHEN"
        ));
    }

    #[test]
    fn test_merge_escapes_quotes() {
        let sql = TokenSql::merge(DEFAULT_TOKEN_TABLE, "it's", "client", &Token::default());
        assert!(sql.contains(r"'it\'s' AS Api"));
    }

    #[test]
    fn test_token_row_into_token() {
        let row: TokenRow = serde_json::from_value(json!({
            "TokenType": "Bearer",
            "AccessToken": "ya29.a0",
            "RefreshToken": null,
            "Expiry": "1.7172396E9",
            "Scope": null,
        }))
        .unwrap();

        let token: Token = row.into();

        assert_eq!(token.token_type.as_deref(), Some("Bearer"));
        assert_eq!(token.access_token.as_deref(), Some("ya29.a0"));
        assert!(token.refresh_token.is_none());
        assert!(token.scope.is_none());
        assert_eq!(
            token.expiry,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 11, 0, 0).unwrap())
        );
    }
}
