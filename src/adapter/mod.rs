//! Adapter Layer
//!
//! 外部システム（BigQuery, Google API, 設定ファイル）との統合

pub mod auth;
pub mod bigquery;
pub mod config;
pub mod http;
pub mod repositories;
