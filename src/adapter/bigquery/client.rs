//! BigQuery Client Abstractions
//!
//! クライアントの抽象化と実装

use async_trait::async_trait;
use google_cloud_bigquery::client::Client;
use google_cloud_bigquery::http::job::get::GetJobRequest;
use google_cloud_bigquery::http::job::get_query_results::GetQueryResultsRequest;
use google_cloud_bigquery::http::job::query::QueryRequest;
use google_cloud_bigquery::http::job::{
    CreateDisposition, Job, JobConfiguration, JobConfigurationLoad, JobReference, JobState,
    JobType, WriteDisposition,
};
use google_cloud_bigquery::http::table::list::ListTablesRequest;
use google_cloud_bigquery::http::table::{SourceFormat, Table, TableReference, TableSchema};
use google_cloud_bigquery::http::tabledata::insert_all::{InsertAllRequest, Row};
use google_cloud_bigquery::http::tabledata::list::{Cell, Tuple, Value as CellValue};
use google_cloud_token::{TokenSource, TokenSourceProvider};
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use super::models::{JobHandle, JobStatus, LoadRequest};
use crate::adapter::http::error_response::GoogleErrorResponse;
use crate::domain::entities::credentials::Credentials;
use crate::domain::entities::result_set::ResultSet;
use crate::domain::entities::table_schema::FieldSchema;
use crate::error::{Error, Result};

/// Trait for the warehouse calls the service needs
/// This enables mocking in tests while using the real client in production
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Table ids of a dataset
    async fn list_tables(&self, dataset: &str) -> Result<Vec<String>>;

    async fn create_table(&self, dataset: &str, table: &str, schema: &[FieldSchema])
        -> Result<()>;

    async fn delete_table(&self, dataset: &str, table: &str) -> Result<()>;

    /// Start a query job without waiting for it
    async fn start_query(&self, sql: &str) -> Result<JobHandle>;

    async fn job_status(&self, job: &JobHandle) -> Result<JobStatus>;

    /// Run a query and collect every result row
    async fn read_query(&self, sql: &str) -> Result<ResultSet>;

    /// Stream rows into a table
    async fn insert_rows(&self, dataset: &str, table: &str, rows: &[Value]) -> Result<()>;

    /// Start a load job from Cloud Storage
    async fn start_load(&self, request: &LoadRequest) -> Result<JobHandle>;

    /// Delete a Cloud Storage object
    async fn delete_object(&self, bucket: &str, object: &str) -> Result<()>;
}

/// getQueryResults にサーバー側で待たせる時間
const RESULT_WAIT_MS: i64 = 10_000;
/// 未完了の応答を待つ上限回数
pub const RESULT_POLL_LIMIT: usize = 1000;
pub const DEFAULT_RESULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const STORAGE_API: &str = "https://storage.googleapis.com/storage/v1";

/// BigQuery client that owns the Client instance
pub struct OwnedBigQueryClient {
    client: Client,
    project_id: String,
    poll_interval: Duration,
    storage_credentials: Option<Credentials>,
    http: reqwest::Client,
}

impl OwnedBigQueryClient {
    pub fn new(client: Client, project_id: impl Into<String>) -> Self {
        Self {
            client,
            project_id: project_id.into(),
            poll_interval: DEFAULT_RESULT_POLL_INTERVAL,
            storage_credentials: None,
            http: reqwest::Client::new(),
        }
    }

    /// 未完了のクエリ結果を再取得するまでの間隔
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Cloud Storage の操作に使う認証情報
    pub fn with_storage(mut self, credentials: Credentials) -> Self {
        self.storage_credentials = Some(credentials);
        self
    }

    fn handle(reference: JobReference) -> JobHandle {
        JobHandle {
            project_id: reference.project_id,
            job_id: reference.job_id,
            location: reference.location,
        }
    }
}

/// Extract the message of an API error proto
fn proto_message<T: Serialize>(proto: &T) -> String {
    let value = serde_json::to_value(proto).unwrap_or(Value::Null);
    value
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| value.get("reason").and_then(Value::as_str))
        .unwrap_or("unknown error")
        .to_string()
}

/// Render a result cell as the string the REST API would give for a scalar
fn cell_to_string(value: &CellValue) -> Option<String> {
    match value {
        CellValue::Null => None,
        CellValue::String(s) => Some(s.clone()),
        other => Some(cell_to_json(other).to_string()),
    }
}

fn cell_to_json(value: &CellValue) -> Value {
    match value {
        CellValue::Null => Value::Null,
        CellValue::String(s) => Value::String(s.clone()),
        CellValue::Array(cells) => Value::Array(cells.iter().map(|c| cell_to_json(&c.v)).collect()),
        CellValue::Struct(tuple) => Value::Array(tuple.f.iter().map(|c| cell_to_json(&c.v)).collect()),
    }
}

fn tuple_to_row(tuple: &Tuple) -> Vec<Option<String>> {
    tuple.f.iter().map(|c: &Cell| cell_to_string(&c.v)).collect()
}

fn schema_columns(schema: &Option<TableSchema>) -> Vec<String> {
    schema
        .as_ref()
        .map(|s| s.fields.iter().map(|f| f.name.clone()).collect())
        .unwrap_or_default()
}

/// 未完了の getQueryResults 応答ごとに待機し、上限でエラーにする
struct PendingPolls {
    limit: usize,
    remaining: usize,
    interval: Duration,
}

impl PendingPolls {
    fn new(limit: usize, interval: Duration) -> Self {
        Self {
            limit,
            remaining: limit,
            interval,
        }
    }

    async fn wait(&mut self, job_id: &str) -> Result<()> {
        if self.remaining == 0 {
            return Err(Error::warehouse(
                "BigQuery get query results failed",
                format!("job {} not complete after {} polls", job_id, self.limit),
            ));
        }
        self.remaining -= 1;
        sleep(self.interval).await;
        Ok(())
    }
}

/// `<base>/b/<bucket>/o/<object>`（オブジェクト名の `/` はエンコードする）
fn storage_object_url(base: &str, bucket: &str, object: &str) -> Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| Error::message_of(format!("invalid storage url {}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| Error::message_of(format!("invalid storage url {}", base)))?
        .extend(["b", bucket, "o", object]);
    Ok(url)
}

fn to_table_schema(schema: &[FieldSchema]) -> Result<TableSchema> {
    let fields: Vec<Value> = schema.iter().map(FieldSchema::to_json).collect();
    Ok(serde_json::from_value(serde_json::json!({ "fields": fields }))?)
}

#[async_trait]
impl WarehouseClient for OwnedBigQueryClient {
    async fn list_tables(&self, dataset: &str) -> Result<Vec<String>> {
        let tables = self
            .client
            .table()
            .list(&self.project_id, dataset, &ListTablesRequest::default())
            .await
            .map_err(|e| Error::warehouse("BigQuery list tables failed", e))?;

        Ok(tables
            .into_iter()
            .map(|t| t.table_reference.table_id)
            .collect())
    }

    async fn create_table(
        &self,
        dataset: &str,
        table: &str,
        schema: &[FieldSchema],
    ) -> Result<()> {
        let metadata = Table {
            table_reference: TableReference {
                project_id: self.project_id.clone(),
                dataset_id: dataset.to_string(),
                table_id: table.to_string(),
            },
            schema: Some(to_table_schema(schema)?),
            ..Default::default()
        };

        self.client
            .table()
            .create(&metadata)
            .await
            .map_err(|e| Error::warehouse("BigQuery create table failed", e))?;
        Ok(())
    }

    async fn delete_table(&self, dataset: &str, table: &str) -> Result<()> {
        self.client
            .table()
            .delete(&self.project_id, dataset, table)
            .await
            .map_err(|e| Error::warehouse("BigQuery delete table failed", e))
    }

    async fn start_query(&self, sql: &str) -> Result<JobHandle> {
        debug!("Starting query: {}", sql);
        let request = QueryRequest {
            query: sql.to_string(),
            ..Default::default()
        };
        let response = self
            .client
            .job()
            .query(&self.project_id, &request)
            .await
            .map_err(|e| Error::warehouse("BigQuery query failed", e))?;

        Ok(Self::handle(response.job_reference))
    }

    async fn job_status(&self, job: &JobHandle) -> Result<JobStatus> {
        let request = GetJobRequest {
            location: job.location.clone(),
        };
        let fetched = self
            .client
            .job()
            .get(&job.project_id, &job.job_id, &request)
            .await
            .map_err(|e| Error::warehouse("BigQuery get job failed", e))?;

        let status = fetched.status;
        Ok(match status.state {
            JobState::Pending => JobStatus::Pending,
            JobState::Running => JobStatus::Running,
            JobState::Done => JobStatus::Done {
                error_result: status.error_result.as_ref().map(proto_message),
                errors: status
                    .errors
                    .as_ref()
                    .map(|errs| errs.iter().map(proto_message).collect())
                    .unwrap_or_default(),
            },
        })
    }

    async fn read_query(&self, sql: &str) -> Result<ResultSet> {
        debug!("Reading query: {}", sql);
        let request = QueryRequest {
            query: sql.to_string(),
            ..Default::default()
        };
        let response = self
            .client
            .job()
            .query(&self.project_id, &request)
            .await
            .map_err(|e| Error::warehouse("BigQuery query failed", e))?;

        let mut result = ResultSet::default();
        let job = Self::handle(response.job_reference);

        if response.job_complete && response.page_token.is_none() {
            result.columns = schema_columns(&response.schema);
            result.rows = response
                .rows
                .unwrap_or_default()
                .iter()
                .map(tuple_to_row)
                .collect();
            result.total_rows = result.rows.len() as u64;
            return Ok(result);
        }

        // Incomplete or paged: read every page through getQueryResults
        let mut page_token: Option<String> = None;
        let mut pending = PendingPolls::new(RESULT_POLL_LIMIT, self.poll_interval);
        loop {
            let request = GetQueryResultsRequest {
                page_token: page_token.clone(),
                location: job.location.clone(),
                timeout_ms: Some(RESULT_WAIT_MS),
                ..Default::default()
            };
            let page = self
                .client
                .job()
                .get_query_results(&job.project_id, &job.job_id, &request)
                .await
                .map_err(|e| Error::warehouse("BigQuery get query results failed", e))?;

            if !page.job_complete {
                debug!("Query job {} still running", job.job_id);
                pending.wait(&job.job_id).await?;
                continue;
            }
            if result.columns.is_empty() {
                result.columns = schema_columns(&page.schema);
            }
            if let Some(rows) = page.rows {
                result.rows.extend(rows.iter().map(tuple_to_row));
            }
            match page.page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        result.total_rows = result.rows.len() as u64;
        Ok(result)
    }

    async fn insert_rows(&self, dataset: &str, table: &str, rows: &[Value]) -> Result<()> {
        let request = InsertAllRequest {
            rows: rows
                .iter()
                .map(|json| Row {
                    insert_id: None,
                    json: json.clone(),
                })
                .collect(),
            skip_invalid_rows: None,
            ignore_unknown_values: None,
            template_suffix: None,
            trace_id: None,
        };

        let response = self
            .client
            .tabledata()
            .insert(&self.project_id, dataset, table, &request)
            .await
            .map_err(|e| Error::warehouse("BigQuery insert failed", e))?;

        match response.insert_errors {
            Some(errors) if !errors.is_empty() => Err(Error::message_of(format!(
                "BigQuery insert had {} row errors",
                errors.len()
            ))),
            _ => Ok(()),
        }
    }

    async fn start_load(&self, request: &LoadRequest) -> Result<JobHandle> {
        let write_disposition = if request.truncate {
            WriteDisposition::WriteTruncate
        } else {
            WriteDisposition::WriteAppend
        };

        let job = Job {
            job_reference: JobReference {
                project_id: self.project_id.clone(),
                job_id: format!("load_{}", uuid::Uuid::new_v4().simple()),
                location: None,
            },
            configuration: JobConfiguration {
                job: JobType::Load(JobConfigurationLoad {
                    source_uris: vec![request.source_uri.clone()],
                    source_format: Some(SourceFormat::NewlineDelimitedJson),
                    schema: Some(to_table_schema(&request.schema)?),
                    create_disposition: Some(CreateDisposition::CreateIfNeeded),
                    write_disposition: Some(write_disposition),
                    destination_table: TableReference {
                        project_id: self.project_id.clone(),
                        dataset_id: request.dataset.clone(),
                        table_id: request.table.clone(),
                    },
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };

        let created = self
            .client
            .job()
            .create(&job)
            .await
            .map_err(|e| Error::warehouse("BigQuery load job failed", e))?;

        Ok(Self::handle(created.job_reference))
    }

    async fn delete_object(&self, bucket: &str, object: &str) -> Result<()> {
        let credentials = self
            .storage_credentials
            .as_ref()
            .ok_or_else(|| Error::message_of("Cloud Storage credentials not set"))?;
        let provider = crate::adapter::auth::storage_token_provider(credentials).await?;
        let token_source = provider.token_source();
        let bearer = token_source
            .token()
            .await
            .map_err(|e| Error::warehouse("Cloud Storage authentication failed", e))?;

        let url = storage_object_url(STORAGE_API, bucket, object)?;
        debug!("DELETE {}", url);
        let response = self
            .http
            .delete(url)
            .header(reqwest::header::AUTHORIZATION, bearer)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let message = GoogleErrorResponse::parse(&body)
            .as_ref()
            .and_then(GoogleErrorResponse::message)
            .map(str::to_string)
            .unwrap_or_else(|| format!("delete gs://{}/{} returned {}", bucket, object, status));
        Err(Error::Api {
            status: Some(status.as_u16()),
            message,
        })
    }
}

/// Factory for creating warehouse clients
#[async_trait]
pub trait WarehouseClientFactory: Send + Sync {
    async fn create_client(&self) -> Result<Arc<dyn WarehouseClient>>;
}

/// Production implementation of WarehouseClientFactory
pub struct RealClientFactory {
    credentials: Credentials,
    poll_interval: Duration,
}

impl RealClientFactory {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            poll_interval: DEFAULT_RESULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl WarehouseClientFactory for RealClientFactory {
    async fn create_client(&self) -> Result<Arc<dyn WarehouseClient>> {
        let client = crate::adapter::auth::create_bigquery_client(&self.credentials).await?;
        Ok(Arc::new(
            OwnedBigQueryClient::new(client, self.credentials.project_id())
                .with_poll_interval(self.poll_interval)
                .with_storage(self.credentials.clone()),
        ))
    }
}
