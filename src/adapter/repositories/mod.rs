//! Repository Implementations
//!
//! Domain層のRepositoryトレイトの実装

pub mod bigquery_token_table;
