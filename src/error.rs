//! Error type
//!
//! ライブラリ全体で使う単一のエラー型（メッセージ付き）

use oauth2::basic::BasicErrorResponse;
use oauth2::RequestTokenError;
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    /// 汎用メッセージ
    #[error("{0}")]
    Message(String),

    /// BigQuery SDK のエラー（メッセージはそのまま保持）
    #[error("{context}: {message}")]
    Warehouse { context: String, message: String },

    /// BigQuery ジョブの失敗
    #[error("Job failed with error {0}")]
    JobFailed(String),

    /// テーブル作成後のポーリング上限到達
    #[error("table {0} not visible after creation")]
    TableNotVisible(String),

    /// HTTP API のエラー（Google エラーレスポンスのメッセージを優先）
    #[error("{message}")]
    Api {
        status: Option<u16>,
        message: String,
    },

    #[error("OAuth2 error: {0}")]
    OAuth2(String),

    /// トークンエンドポイントのエラー応答（`error` はOAuth2のエラーコード）
    #[error("OAuth2 error: {message}")]
    OAuth2Server {
        status: Option<u16>,
        error: String,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn message_of(message: impl Into<String>) -> Self {
        Error::Message(message.into())
    }

    /// Wraps a vendor error, keeping its text verbatim.
    pub fn warehouse(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Error::Warehouse {
            context: context.into(),
            message: err.to_string(),
        }
    }

    /// エラーメッセージを返す
    pub fn message(&self) -> String {
        match self {
            Error::Message(m) => m.clone(),
            Error::Warehouse { message, .. } => message.clone(),
            Error::Api { message, .. } => message.clone(),
            Error::OAuth2(m) => m.clone(),
            Error::OAuth2Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// エラーメッセージを書き換える
    ///
    /// Google のエラーレスポンスにメッセージが含まれる場合に使用
    pub fn set_message(&mut self, new_message: impl Into<String>) {
        let new_message = new_message.into();
        match self {
            Error::Warehouse { message, .. }
            | Error::Api { message, .. }
            | Error::OAuth2Server { message, .. } => *message = new_message,
            Error::Message(m) | Error::OAuth2(m) | Error::JobFailed(m) => *m = new_message,
            other => *other = Error::Message(new_message),
        }
    }

    /// HTTP ステータスコード（API / トークンエンドポイントのエラーのみ）
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } | Error::OAuth2Server { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Api {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

/// トークンエンドポイントへの送信は crate の Error を返すトランスポートを使う
impl From<RequestTokenError<Error, BasicErrorResponse>> for Error {
    fn from(e: RequestTokenError<Error, BasicErrorResponse>) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => {
                let error = err.error().to_string();
                let message = match err.error_description() {
                    Some(description) => format!("{}: {}", error, description),
                    None => error.clone(),
                };
                Error::OAuth2Server {
                    status: None,
                    error,
                    message,
                }
            }
            RequestTokenError::Request(err) => err,
            RequestTokenError::Parse(parse_err, _body) => Error::Json(parse_err.into_inner()),
            RequestTokenError::Other(s) => Error::OAuth2(s),
        }
    }
}
