//! Workflow Orchestration
//!
//! 設定からサービスを組み立ててコマンドを実行する

use anyhow::{Context, Result};
use log::info;
use std::sync::Arc;

use crate::adapter::auth::load_credentials;
use crate::adapter::bigquery::Service;
use crate::adapter::config::Config;
use crate::adapter::http::GoogleService;
use crate::adapter::repositories::bigquery_token_table::BigQueryTokenTable;
use crate::application::dto::service_config::ServiceWithOAuth2Config;
use crate::domain::entities::result_set::ResultSet;
use crate::domain::entities::token::Token;
use crate::domain::repositories::token_source::TokenSource;

use super::cli::{Args, Command, TableCommand, TokenCommand};

/// 表示用にシークレットを伏せる（先頭8文字のみ）
pub fn mask_secret(secret: &str) -> String {
    if secret.chars().count() <= 8 {
        return "*".repeat(secret.chars().count());
    }
    let head: String = secret.chars().take(8).collect();
    format!("{}...", head)
}

/// トークンの表示用テキスト
pub fn format_token(token: &Token) -> String {
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "(none)".to_string());
    let secret = |v: &Option<String>| {
        v.as_deref()
            .map(mask_secret)
            .unwrap_or_else(|| "(none)".to_string())
    };
    let expiry = token
        .expiry
        .map(|e| e.to_rfc3339())
        .unwrap_or_else(|| "(none)".to_string());

    format!(
        "  Token type: {}\n  Access token: {}\n  Refresh token: {}\n  Expiry: {}\n  Scope: {}",
        field(&token.token_type),
        secret(&token.access_token),
        secret(&token.refresh_token),
        expiry,
        field(&token.scope)
    )
}

/// 結果をタブ区切りで整形（1行目はカラム名、NULL は `NULL`）
pub fn format_result_set(result: &ResultSet) -> String {
    let mut lines = vec![result.columns.join("\t")];
    for row in &result.rows {
        let cells: Vec<&str> = row
            .iter()
            .map(|cell| cell.as_deref().unwrap_or("NULL"))
            .collect();
        lines.push(cells.join("\t"));
    }
    lines.join("\n")
}

/// コマンド実行ワークフロー
pub struct BqkitWorkflow {
    config: Config,
}

impl BqkitWorkflow {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn warehouse(&self) -> Result<Arc<Service>> {
        let credentials = load_credentials(
            &self.config.service_account_key_path,
            &self.config.project_id,
        )
        .context("Failed to load service account key")?;
        Ok(Arc::new(Service::new(credentials)))
    }

    fn token_table(&self, service: Arc<Service>) -> BigQueryTokenTable {
        BigQueryTokenTable::new(&self.config.api_name, &self.config.client_id, service)
            .with_table(self.config.token_table())
    }

    fn google_service(&self) -> Result<GoogleService> {
        let token_source = self.token_table(self.warehouse()?);
        let service = GoogleService::new_with_oauth2(ServiceWithOAuth2Config {
            api_name: self.config.api_name.clone(),
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret.clone(),
            token_source: Box::new(token_source),
            redirect_url: self.config.redirect_url.clone(),
            refresh_margin: self.config.refresh_margin(),
        })?;
        Ok(service)
    }

    /// コマンドを実行
    pub async fn execute(&self, args: Args) -> Result<()> {
        info!("Using project {}", self.config.project_id);

        match args.command {
            Command::Token(command) => self.token(command).await,
            Command::Table(command) => self.table(command).await,
            Command::Query { sql } => {
                let result = self
                    .warehouse()?
                    .select_raw(&sql)
                    .await
                    .context("Query failed")?;
                println!("{}", format_result_set(&result));
                println!("✓ {} rows", result.total_rows);
                Ok(())
            }
        }
    }

    async fn token(&self, command: TokenCommand) -> Result<()> {
        match command {
            TokenCommand::Show => {
                let mut table = self.token_table(self.warehouse()?);
                table
                    .retrieve_token()
                    .await
                    .context("Failed to read token table")?;
                match table.token() {
                    Some(token) => {
                        println!("✓ Token for {} ({})", self.config.api_name, table.token_table());
                        println!("{}", format_token(&token));
                    }
                    None => println!("⚠ No token stored for {}", self.config.api_name),
                }
            }
            TokenCommand::AuthorizeUrl {
                scope,
                access_type,
                prompt,
                state,
            } => {
                let url = self.google_service()?.init_token(
                    &scope,
                    Some(&access_type),
                    Some(&prompt),
                    state.as_deref(),
                )?;
                println!("{}", url);
            }
            TokenCommand::Exchange { code } => {
                let token = self
                    .google_service()?
                    .get_token_from_code(&code)
                    .await
                    .context("Failed to exchange authorization code")?;
                println!("✓ Token stored");
                println!("{}", format_token(&token));
            }
            TokenCommand::Refresh => {
                let token = self
                    .google_service()?
                    .validate_token()
                    .await
                    .context("Failed to validate token")?;
                println!("✓ Token valid");
                println!("{}", format_token(&token));
            }
        }
        Ok(())
    }

    async fn table(&self, command: TableCommand) -> Result<()> {
        let service = self.warehouse()?;
        match command {
            TableCommand::List { dataset } => {
                for table in service.get_tables(&dataset).await? {
                    println!("{}", table);
                }
            }
            TableCommand::Exists { dataset, table } => {
                let exists = service.table_exists(&dataset, &table).await?;
                println!("{}.{}: {}", dataset, table, if exists { "exists" } else { "missing" });
            }
            TableCommand::Delete { dataset, table } => {
                service
                    .delete_table(&dataset, &table)
                    .await
                    .with_context(|| format!("Failed to delete {}.{}", dataset, table))?;
                println!("✓ Deleted {}.{}", dataset, table);
            }
        }
        Ok(())
    }
}
