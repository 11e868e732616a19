//! BigQuery Table/Query Service
//!
//! テーブル操作・クエリ実行・ジョブのポーリング

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::client::{RealClientFactory, WarehouseClient, WarehouseClientFactory};
use super::models::{JobHandle, JobStatus, LoadRequest};
use crate::domain::entities::credentials::Credentials;
use crate::domain::entities::result_set::ResultSet;
use crate::domain::entities::select_config::SelectConfig;
use crate::domain::entities::table_schema::TableModel;
use crate::domain::services::sql_builder::SqlBuilder;
use crate::error::{Error, Result};

/// Streaming insert batch size
pub const INSERT_BATCH_SIZE: usize = 1000;
/// Max iterations waiting for a created table to become visible
pub const TABLE_POLL_LIMIT: usize = 1000;
/// Prefix of generated table names
pub const TEMP_TABLE_PREFIX: &str = "temp_";

/// ポーリング間隔
#[derive(Debug, Clone, Copy)]
pub struct PollIntervals {
    /// クエリジョブ
    pub query: Duration,
    /// ロードジョブ
    pub load: Duration,
    /// テーブル作成後の存在確認
    pub table: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            query: Duration::from_secs(1),
            load: Duration::from_secs(5),
            table: Duration::from_millis(100),
        }
    }
}

/// テーブル/クエリサービス
///
/// 操作ごとにクライアントを作成し、SQLを組み立てて実行する
pub struct Service {
    credentials: Credentials,
    factory: Arc<dyn WarehouseClientFactory>,
    intervals: PollIntervals,
}

impl Service {
    /// 認証情報から作成（本番用のクライアントファクトリを使用）
    pub fn new(credentials: Credentials) -> Self {
        let factory = Arc::new(
            RealClientFactory::new(credentials.clone())
                .with_poll_interval(PollIntervals::default().query),
        );
        Self::with_factory(credentials, factory)
    }

    /// クライアントファクトリを指定して作成
    pub fn with_factory(credentials: Credentials, factory: Arc<dyn WarehouseClientFactory>) -> Self {
        Self {
            credentials,
            factory,
            intervals: PollIntervals::default(),
        }
    }

    pub fn with_intervals(mut self, intervals: PollIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn project_id(&self) -> &str {
        self.credentials.project_id()
    }

    /// 認証情報とプロジェクトIDが設定済みか確認
    pub fn is_valid(&self) -> Result<()> {
        if self.credentials.is_valid() {
            Ok(())
        } else {
            Err(Error::message_of("credentials and/or project id not set"))
        }
    }

    /// クライアントを作成
    pub async fn create_client(&self) -> Result<Arc<dyn WarehouseClient>> {
        self.is_valid()?;
        self.factory.create_client().await
    }

    /// データセットのテーブル一覧
    pub async fn get_tables(&self, dataset: &str) -> Result<Vec<String>> {
        let client = self.create_client().await?;
        client.list_tables(dataset).await
    }

    pub async fn table_exists(&self, dataset: &str, table: &str) -> Result<bool> {
        let client = self.create_client().await?;
        Self::exists_with(client.as_ref(), dataset, table).await
    }

    async fn exists_with(client: &dyn WarehouseClient, dataset: &str, table: &str) -> Result<bool> {
        let tables = client.list_tables(dataset).await?;
        Ok(tables.iter().any(|t| t == table))
    }

    /// モデルのスキーマでテーブルを作成
    ///
    /// `recreate` が真なら既存テーブルを削除してから作成する。
    /// 作成後はテーブルが見えるまでポーリングする
    pub async fn create_table<T: TableModel>(
        &self,
        dataset: &str,
        table: &str,
        recreate: bool,
    ) -> Result<()> {
        let client = self.create_client().await?;
        let exists = Self::exists_with(client.as_ref(), dataset, table).await?;

        if exists && recreate {
            info!("Deleting table {}.{} before recreating", dataset, table);
            client.delete_table(dataset, table).await?;
        }

        if !exists || recreate {
            info!("Creating table {}.{}", dataset, table);
            client.create_table(dataset, table, &T::schema()).await?;
        }

        for _ in 0..TABLE_POLL_LIMIT {
            if Self::exists_with(client.as_ref(), dataset, table).await? {
                return Ok(());
            }
            sleep(self.intervals.table).await;
        }

        Err(Error::TableNotVisible(format!("{}.{}", dataset, table)))
    }

    pub async fn delete_table(&self, dataset: &str, table: &str) -> Result<()> {
        let client = self.create_client().await?;
        client.delete_table(dataset, table).await
    }

    /// クエリジョブを実行し、完了までポーリングする
    ///
    /// # Arguments
    ///
    /// * `sql` - 実行するSQL
    /// * `pending_message` - 完了待ちの間に出力するメッセージ
    pub async fn run(&self, sql: &str, pending_message: &str) -> Result<()> {
        let client = self.create_client().await?;
        debug!("Running SQL: {}", sql);

        let job = client.start_query(sql).await?;
        self.wait_query(client.as_ref(), &job, pending_message).await
    }

    async fn wait_query(
        &self,
        client: &dyn WarehouseClient,
        job: &JobHandle,
        pending_message: &str,
    ) -> Result<()> {
        loop {
            let status = client.job_status(job).await?;
            if status.is_done() {
                return match status.error() {
                    Some(message) => Err(Error::message_of(message)),
                    None => Ok(()),
                };
            }
            info!("{}", pending_message);
            sleep(self.intervals.query).await;
        }
    }

    /// 行を `INSERT_BATCH_SIZE` ごとにストリーミング挿入
    pub async fn insert<T: Serialize>(&self, dataset: &str, table: &str, rows: &[T]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let client = self.create_client().await?;

        let values = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<_>>>()?;

        for (batch_num, chunk) in values.chunks(INSERT_BATCH_SIZE).enumerate() {
            debug!(
                "Inserting batch {} ({} rows) into {}.{}",
                batch_num + 1,
                chunk.len(),
                dataset,
                table
            );
            client.insert_rows(dataset, table, chunk).await?;
        }
        Ok(())
    }

    /// テーブルを（必要なら）作成して行を挿入する
    ///
    /// テーブル名が空なら `temp_<uuid>` を生成する。
    ///
    /// # Returns
    ///
    /// 使用したテーブル名
    pub async fn insert_slice<T: TableModel>(
        &self,
        dataset: &str,
        rows: &[T],
        table_name: &str,
    ) -> Result<String> {
        let table = if table_name.is_empty() {
            temp_table_name()
        } else {
            table_name.to_string()
        };

        self.create_table::<T>(dataset, &table, false).await?;
        self.insert(dataset, &table, rows).await?;
        Ok(table)
    }

    pub async fn select(&self, config: &SelectConfig) -> Result<ResultSet> {
        self.select_raw(&SqlBuilder::build_select(config)).await
    }

    pub async fn select_raw(&self, sql: &str) -> Result<ResultSet> {
        let client = self.create_client().await?;
        debug!("Selecting: {}", sql);
        client.read_query(sql).await
    }

    /// WHERE 句に一致する行を削除（空なら全行）
    pub async fn delete(&self, dataset: &str, table: &str, sql_where: &str) -> Result<()> {
        let sql = SqlBuilder::build_delete(dataset, table, sql_where);
        self.run(&sql, &format!("deleting from {}.{}", dataset, table))
            .await
    }

    /// ソーステーブルをターゲットテーブルへマージ
    pub async fn merge<T: TableModel>(
        &self,
        source_table: &str,
        target_table: &str,
        id_field: &str,
        has_ignore_field: bool,
    ) -> Result<()> {
        let sql = SqlBuilder::build_merge(
            &T::field_names(),
            source_table,
            target_table,
            id_field,
            has_ignore_field,
        );
        self.run(
            &sql,
            &format!("merging {} into {}", source_table, target_table),
        )
        .await
    }

    /// 先頭行の先頭カラム（NULLまたは結果なしは空文字）
    pub async fn get_value(&self, config: &SelectConfig) -> Result<String> {
        let result = self.select(config).await?;
        Ok(result.first_value().unwrap_or_default().to_string())
    }

    /// 全行の全セル
    pub async fn get_values(&self, config: &SelectConfig) -> Result<Vec<String>> {
        Ok(self.select(config).await?.flatten())
    }

    /// 先頭行をモデルにデコードする
    ///
    /// # Returns
    ///
    /// `(総行数, 先頭行)`
    pub async fn get_struct<T: DeserializeOwned>(
        &self,
        config: &SelectConfig,
    ) -> Result<(u64, Option<T>)> {
        let result = self.select(config).await?;
        let row = result.decode_row::<T>(0)?;
        Ok((result.total_rows, row))
    }

    /// Cloud Storage のオブジェクトをテーブルへロード
    ///
    /// 改行区切りJSONをモデルのスキーマで読み込む。
    /// `delete_object` ならロード成功後にオブジェクトを削除する
    pub async fn copy_object_to_table<T: TableModel>(
        &self,
        bucket: &str,
        object: &str,
        dataset: &str,
        table: &str,
        truncate: bool,
        delete_object: bool,
    ) -> Result<()> {
        let client = self.create_client().await?;
        let request = LoadRequest {
            source_uri: format!("gs://{}/{}", bucket, object),
            dataset: dataset.to_string(),
            table: table.to_string(),
            schema: T::schema(),
            truncate,
        };

        info!("Loading {} into {}.{}", request.source_uri, dataset, table);
        let job = client.start_load(&request).await?;

        loop {
            match client.job_status(&job).await? {
                JobStatus::Done {
                    error_result: Some(message),
                    errors,
                } => {
                    for error in &errors {
                        warn!("{}", error);
                    }
                    return Err(Error::JobFailed(message));
                }
                JobStatus::Done { .. } => break,
                _ => {}
            }
            info!("Waiting for load job {}", job.job_id);
            sleep(self.intervals.load).await;
        }

        if delete_object {
            client.delete_object(bucket, object).await?;
            info!("Deleted {}", request.source_uri);
        }
        Ok(())
    }
}

/// `temp_` + ハイフンなしUUID
pub fn temp_table_name() -> String {
    format!("{}{}", TEMP_TABLE_PREFIX, uuid::Uuid::new_v4().simple())
}
