//! BigQuery Token Table Implementation
//!
//! TokenSourceのBigQuery実装（トークンを (Api, ClientID) ごとに1行で永続化）

use async_trait::async_trait;
use log::{debug, info};
use std::sync::Arc;

use crate::adapter::bigquery::Service;
use crate::domain::entities::token::Token;
use crate::domain::repositories::token_source::TokenSource;
use crate::domain::services::token_sql::{TokenRow, TokenSql, DEFAULT_TOKEN_TABLE};
use crate::error::Result;

/// BigQueryのトークンテーブル
pub struct BigQueryTokenTable {
    api_name: String,
    client_id: String,
    token_table: String,
    token: Option<Token>,
    service: Arc<Service>,
}

impl BigQueryTokenTable {
    /// 新しいトークンテーブルを作成
    ///
    /// # Arguments
    ///
    /// * `api_name` - API名（キーの一部）
    /// * `client_id` - OAuth2クライアントID（キーの一部）
    /// * `service` - BigQueryサービス
    pub fn new(api_name: impl Into<String>, client_id: impl Into<String>, service: Arc<Service>) -> Self {
        Self {
            api_name: api_name.into(),
            client_id: client_id.into(),
            token_table: DEFAULT_TOKEN_TABLE.to_string(),
            token: None,
            service,
        }
    }

    /// トークンテーブル名（`dataset.table`）を変更
    pub fn with_table(mut self, token_table: impl Into<String>) -> Self {
        self.token_table = token_table.into();
        self
    }

    pub fn token_table(&self) -> &str {
        &self.token_table
    }
}

#[async_trait]
impl TokenSource for BigQueryTokenTable {
    fn token(&self) -> Option<Token> {
        self.token.clone()
    }

    async fn new_token(&mut self) -> Result<Option<Token>> {
        Ok(None)
    }

    async fn set_token(&mut self, token: Option<Token>, save: bool) -> Result<()> {
        self.token = token;

        if !save {
            return Ok(());
        }
        self.save_token().await
    }

    async fn retrieve_token(&mut self) -> Result<()> {
        let config = TokenSql::select_config(&self.token_table, &self.api_name, &self.client_id);
        let (_, row) = self.service.get_struct::<TokenRow>(&config).await?;

        // Expiry は TokenRow -> Token の変換で UTC に揃う
        self.token = row.map(Token::from);

        match &self.token {
            Some(_) => debug!("Retrieved token for {} / {}", self.api_name, self.client_id),
            None => info!("No stored token for {} / {}", self.api_name, self.client_id),
        }
        Ok(())
    }

    async fn save_token(&mut self) -> Result<()> {
        let token = match &self.token {
            Some(token) => token,
            None => return Ok(()),
        };

        let sql = TokenSql::merge(&self.token_table, &self.api_name, &self.client_id, token);
        self.service.run(&sql, "saving token").await
    }
}
