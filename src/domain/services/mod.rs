//! # Domain Services
//!
//! SQL組み立てなどのドメインサービス

pub mod sql_builder;
pub mod token_sql;
