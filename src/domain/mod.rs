//! # Domain Layer
//!
//! このモジュールはライブラリの核心的なルールとエンティティを定義します。
//!
//! ## 特徴
//!
//! - BigQuery SDK や HTTP クライアントに依存しない
//! - SQL 文字列の組み立てはここで完結する
//! - 純粋なビジネスロジック
//!
//! ## 構成要素
//!
//! - **entities**: エンティティ（Token, Credentials, Null型など）
//! - **repositories**: Repository trait（TokenSource）
//! - **services**: Domain Service（SQLビルダー）

pub mod entities;
pub mod repositories;
pub mod services;
