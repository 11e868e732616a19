//! CLI Argument Parsing
//!
//! CLIの引数解析

use clap::{Parser, Subcommand};

/// BigQueryのテーブル操作とOAuth2トークン管理のCLI
#[derive(Parser, Debug, Clone)]
#[command(name = "bqkit")]
#[command(about = "BigQuery table helper and OAuth2 token store", long_about = None)]
pub struct Args {
    /// Config file path
    #[arg(short, long, default_value = "./bqkit.json")]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Manage the stored OAuth2 token
    #[command(subcommand)]
    Token(TokenCommand),

    /// Inspect or drop tables
    #[command(subcommand)]
    Table(TableCommand),

    /// Run a query and print the rows
    Query {
        #[arg(long)]
        sql: String,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum TokenCommand {
    /// Print the stored token
    Show,

    /// Print the consent screen URL
    AuthorizeUrl {
        /// Space separated scopes
        #[arg(long)]
        scope: String,

        #[arg(long, default_value = "offline")]
        access_type: String,

        #[arg(long, default_value = "consent")]
        prompt: String,

        #[arg(long)]
        state: Option<String>,
    },

    /// Exchange an authorization code and store the token
    Exchange {
        #[arg(long)]
        code: String,
    },

    /// Refresh the stored token if it is about to expire
    Refresh,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum TableCommand {
    /// List the tables of a dataset
    List {
        #[arg(long)]
        dataset: String,
    },

    /// Check whether a table exists
    Exists {
        #[arg(long)]
        dataset: String,
        #[arg(long)]
        table: String,
    },

    /// Delete a table
    Delete {
        #[arg(long)]
        dataset: String,
        #[arg(long)]
        table: String,
    },
}
