//! # Domain Entities
//!
//! ドメインエンティティとバリューオブジェクト

pub mod credentials;
pub mod nullable;
pub mod result_set;
pub mod select_config;
pub mod table_schema;
pub mod token;
