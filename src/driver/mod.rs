//! # Driver Layer (Presentation)
//!
//! CLIやその他の外部インターフェースを提供
//!
//! ## 特徴
//!
//! - 設定ファイルからサービスを組み立てる（依存性注入）
//! - ユーザーとのインターフェース
//!
//! ## 構成要素
//!
//! - **cli**: CLI引数のパース
//! - **workflow**: コマンド実行のオーケストレーション

pub mod cli;
pub mod workflow;

pub use cli::Args;
pub use workflow::BqkitWorkflow;
