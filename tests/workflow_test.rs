//! Workflow tests
//!
//! 設定ファイルとCLI引数からワークフローを組み立てて実行する

use clap::Parser;
use std::fs;
use tempfile::TempDir;

use bqkit::adapter::config::Config;
use bqkit::driver::cli::{Command, TableCommand, TokenCommand};
use bqkit::driver::workflow::format_result_set;
use bqkit::driver::{Args, BqkitWorkflow};
use bqkit::domain::entities::result_set::ResultSet;

/// テスト用の設定ファイルを作成するヘルパー
fn create_test_config(temp_dir: &TempDir, key_path: &str) -> String {
    let config_path = temp_dir.path().join("bqkit.json");
    let config = serde_json::json!({
        "project_id": "test-project",
        "service_account_key_path": key_path,
        "api_name": "searchconsole",
        "client_id": "123456.apps.googleusercontent.com",
        "client_secret": "test-secret",
    });
    fs::write(&config_path, config.to_string()).unwrap();
    config_path.to_str().unwrap().to_string()
}

#[test]
fn test_load_fixture_config() {
    let config = Config::load("tests/fixtures/config.json").unwrap();

    assert_eq!(config.project_id, "test-project");
    assert_eq!(config.token_table(), "auth.tokens");
    assert_eq!(config.refresh_margin(), Some(chrono::Duration::seconds(60)));
}

#[test]
fn test_args_point_to_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_test_config(&temp_dir, "/nonexistent/key.json");

    let args = Args::parse_from(["bqkit", "--config", &config_path, "table", "list", "--dataset", "sales"]);
    let config = Config::load(&args.config).unwrap();

    assert_eq!(config.api_name, "searchconsole");
    assert_eq!(config.token_table(), "oauth2.tokens");
    assert_eq!(
        args.command,
        Command::Table(TableCommand::List {
            dataset: "sales".to_string()
        })
    );
}

#[tokio::test]
async fn test_workflow_fails_without_key_file() {
    let temp_dir = TempDir::new().unwrap();
    let missing_key = temp_dir.path().join("missing.json");
    let config_path = create_test_config(&temp_dir, missing_key.to_str().unwrap());

    let config = Config::load(&config_path).unwrap();
    let workflow = BqkitWorkflow::new(config);
    let args = Args::parse_from(["bqkit", "token", "show"]);
    assert_eq!(args.command, Command::Token(TokenCommand::Show));

    let err = workflow.execute(args).await.unwrap_err();

    assert!(err.to_string().contains("Failed to load service account key"));
}

#[tokio::test]
async fn test_workflow_rejects_invalid_key_json() {
    let temp_dir = TempDir::new().unwrap();
    let key_path = temp_dir.path().join("key.json");
    fs::write(&key_path, "{ not json").unwrap();
    let config_path = create_test_config(&temp_dir, key_path.to_str().unwrap());

    let workflow = BqkitWorkflow::new(Config::load(&config_path).unwrap());
    let args = Args::parse_from(["bqkit", "query", "--sql", "SELECT 1"]);

    let err = workflow.execute(args).await.unwrap_err();

    assert!(err.to_string().contains("Failed to load service account key"));
}

#[test]
fn test_format_empty_result_set() {
    let result = ResultSet {
        columns: vec!["Api".to_string(), "ClientID".to_string()],
        ..Default::default()
    };

    assert_eq!(format_result_set(&result), "Api\tClientID");
}
