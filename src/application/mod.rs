//! # Application Layer
//!
//! アプリケーション固有の設定とサービス構築の入力
//!
//! ## 構成要素
//!
//! - **dto**: Data Transfer Object（HTTPサービスの認可モード別設定）

pub mod dto;
