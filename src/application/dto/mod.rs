//! # Data Transfer Objects
//!
//! サービス構築用の設定

pub mod service_config;
