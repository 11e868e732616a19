//! # Token Source Trait
//!
//! OAuth2トークンの取得と永続化を抽象化

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::domain::entities::token::Token;
use crate::error::Result;

/// トークンソース
///
/// HTTPクライアントがトークンのリフレッシュ時に読み書きする保存先
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// 現在保持しているトークン
    fn token(&self) -> Option<Token>;

    /// 新しいトークンを発行する（発行できない場合は `None`）
    async fn new_token(&mut self) -> Result<Option<Token>>;

    /// トークンを設定し、`save` が真なら永続化する
    async fn set_token(&mut self, token: Option<Token>, save: bool) -> Result<()>;

    /// 永続化先からトークンを読み込む
    async fn retrieve_token(&mut self) -> Result<()>;

    /// 保持しているトークンを永続化する
    async fn save_token(&mut self) -> Result<()>;
}

/// メモリ上だけでトークンを保持するソース
#[derive(Debug, Default, Clone)]
pub struct MemoryTokenSource {
    token: Option<Token>,
}

impl MemoryTokenSource {
    pub fn new(token: Option<Token>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenSource for MemoryTokenSource {
    fn token(&self) -> Option<Token> {
        self.token.clone()
    }

    async fn new_token(&mut self) -> Result<Option<Token>> {
        Ok(None)
    }

    async fn set_token(&mut self, token: Option<Token>, _save: bool) -> Result<()> {
        self.token = token;
        Ok(())
    }

    async fn retrieve_token(&mut self) -> Result<()> {
        Ok(())
    }

    async fn save_token(&mut self) -> Result<()> {
        Ok(())
    }
}
