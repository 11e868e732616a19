//! # bqkit
//!
//! BigQuery のテーブル/クエリ操作と、BigQuery テーブルに保存する OAuth2 トークンを使った
//! Google API クライアント
//!
//! このプロジェクトはクリーンアーキテクチャを採用しており、以下の4層で構成されています：
//!
//! - **Domain層**: エンティティ、SQL組み立て、トークンソースのトレイト（外部依存なし）
//! - **Application層**: サービス構築用の設定
//! - **Adapter層**: 外部システムとの統合（BigQuery, Google API, 設定ファイル）
//! - **Driver層**: CLI、依存性注入

// coverage_nightly cfg が設定されている場合のみ coverage_attribute を有効化
// カバレッジ計測時に外部サービス依存コードを除外するために使用
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod error;

// Domain層（純粋なビジネスロジック）
pub mod domain;

// Application層
pub mod application;

// Adapter層（Infrastructure）
pub mod adapter;

// Driver層（Presentation）
pub mod driver;

pub use error::{Error, Result};
