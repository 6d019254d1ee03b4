//! 仓库查询客户端 - 业务能力层
//!
//! ## 职责
//! 1. 执行查询：提交 → 轮询完成 → 按令牌分页 → 物化为列式结果
//! 2. 持久化结果：确保数据集/表存在，分批 insertAll
//!
//! 每次调用都是一组独立的 HTTP 往返，客户端不持有任何持久资源。

use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, WarehouseError};
use crate::models::warehouse::{ColumnarResult, QueryJob, QueryResponse};
use crate::services::token::AccessTokenBroker;
use crate::utils::logging::truncate_text;

/// 取结果页的传输抽象
///
/// 生产实现绑定一个令牌对真实端点发 GET；测试用假实现喂入页面序列。
#[allow(async_fn_in_trait)]
pub trait QueryTransport {
    /// 取作业的一页结果；`page_token` 为 None 时取的是作业状态/首页
    async fn fetch_results(
        &self,
        job_id: &str,
        page_token: Option<&str>,
    ) -> AppResult<QueryResponse>;
}

/// 仓库查询客户端
pub struct WarehouseClient {
    http: reqwest::Client,
    broker: AccessTokenBroker,
    endpoint: String,
    project: String,
    location: String,
    max_results: u64,
    poll_interval: Duration,
    wait_ceiling: Duration,
    insert_batch_size: usize,
}

impl WarehouseClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::new();
        Self {
            broker: AccessTokenBroker::new(http.clone()),
            http,
            endpoint: config.warehouse_endpoint.trim_end_matches('/').to_string(),
            project: config.warehouse_project.clone(),
            location: config.warehouse_location.clone(),
            max_results: config.query_max_results,
            poll_interval: config.query_poll_interval(),
            wait_ceiling: config.query_wait_ceiling(),
            insert_batch_size: config.insert_batch_size,
        }
    }

    /// 执行一条 SQL 并取回全部行
    ///
    /// 内部走完整的作业生命周期：提交、轮询到完成、翻完所有分页。
    pub async fn execute(&self, sql: &str) -> AppResult<ColumnarResult> {
        let token = self.broker.token().await?;
        info!("📊 提交仓库查询 ({} 字符)", sql.chars().count());

        let mut job = self.submit(sql, &token).await?;
        debug!("作业已提交: {}", job.job_id);

        let transport = ResultsEndpoint {
            client: self,
            token: &token,
        };
        await_completion(&transport, &mut job, self.poll_interval, self.wait_ceiling).await?;
        drain_pages(&transport, &mut job).await?;

        let result = job.materialize();
        info!(
            "✓ 查询完成: {} 行 × {} 列",
            result.row_count,
            result.columns.len()
        );
        Ok(result)
    }

    async fn submit(&self, sql: &str, token: &str) -> AppResult<QueryJob> {
        let endpoint = format!("{}/projects/{}/queries", self.endpoint, self.project);
        let body = json!({
            "query": sql,
            "useLegacySql": false,
            "location": self.location,
            "maxResults": self.max_results,
        });

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::submit_failed(&endpoint, e))?;
        let response = check_status(response, &endpoint).await?;

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| AppError::submit_failed(&endpoint, e))?;
        Ok(QueryJob::from_submit(sql, parsed))
    }

    /// 确保数据集存在；已存在（409）视为成功
    pub async fn ensure_dataset(&self, dataset: &str) -> AppResult<()> {
        let token = self.broker.token().await?;
        let endpoint = format!("{}/projects/{}/datasets", self.endpoint, self.project);
        let body = json!({
            "datasetReference": { "projectId": self.project, "datasetId": dataset },
            "location": self.location,
        });

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            debug!("数据集 {} 已创建", dataset);
            return Ok(());
        }
        if status.as_u16() == 409 {
            debug!("数据集 {} 已存在", dataset);
            return Ok(());
        }
        Err(bad_response(response, &endpoint).await)
    }

    /// 确保表存在；已存在（409）视为成功
    ///
    /// `fields` 是 REST 模式的字段数组，形如 `[{"name": ..., "type": ...}, ...]`。
    pub async fn ensure_table(
        &self,
        dataset: &str,
        table: &str,
        fields: JsonValue,
    ) -> AppResult<()> {
        let token = self.broker.token().await?;
        let endpoint = format!(
            "{}/projects/{}/datasets/{}/tables",
            self.endpoint, self.project, dataset
        );
        let body = json!({
            "tableReference": {
                "projectId": self.project,
                "datasetId": dataset,
                "tableId": table,
            },
            "schema": { "fields": fields },
        });

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            debug!("表 {}.{} 已创建", dataset, table);
            return Ok(());
        }
        if status.as_u16() == 409 {
            debug!("表 {}.{} 已存在", dataset, table);
            return Ok(());
        }
        Err(bad_response(response, &endpoint).await)
    }

    /// 分批 insertAll；返回写入成功的行数
    ///
    /// 部分行被拒绝只记录并跳过；整批被拒绝按硬失败报出。
    pub async fn insert_all(
        &self,
        dataset: &str,
        table: &str,
        rows: &[JsonValue],
    ) -> AppResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let token = self.broker.token().await?;
        let endpoint = format!(
            "{}/projects/{}/datasets/{}/tables/{}/insertAll",
            self.endpoint, self.project, dataset, table
        );

        let mut inserted = 0usize;
        for batch in rows.chunks(self.insert_batch_size) {
            let wrapped: Vec<JsonValue> = batch.iter().map(|row| json!({ "json": row })).collect();
            let body = json!({
                "kind": "bigquery#tableDataInsertAllRequest",
                "rows": wrapped,
            });

            let response = self
                .http
                .post(&endpoint)
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await?;
            let response = check_status(response, &endpoint).await?;
            let parsed: InsertResponse = response.json().await?;

            let failures = parsed.insert_errors.len();
            if failures >= batch.len() {
                return Err(AppError::Warehouse(WarehouseError::InsertRejected {
                    table: format!("{}.{}", dataset, table),
                    failures,
                }));
            }
            if failures > 0 {
                warn!("⚠️ insertAll 拒绝了 {} 行 (表: {}.{})", failures, dataset, table);
            }
            inserted += batch.len() - failures;
        }

        info!("✓ 已写入 {} 行到 {}.{}", inserted, dataset, table);
        Ok(inserted)
    }
}

/// 绑定了访问令牌的取结果端点
struct ResultsEndpoint<'a> {
    client: &'a WarehouseClient,
    token: &'a str,
}

impl QueryTransport for ResultsEndpoint<'_> {
    async fn fetch_results(
        &self,
        job_id: &str,
        page_token: Option<&str>,
    ) -> AppResult<QueryResponse> {
        let endpoint = format!(
            "{}/projects/{}/queries/{}",
            self.client.endpoint, self.client.project, job_id
        );
        let mut query: Vec<(&str, String)> = vec![
            ("location", self.client.location.clone()),
            ("maxResults", self.client.max_results.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }

        let response = self
            .client
            .http
            .get(&endpoint)
            .bearer_auth(self.token)
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::poll_failed(job_id, e))?;
        let response = check_status(response, &endpoint).await?;

        response
            .json()
            .await
            .map_err(|e| AppError::poll_failed(job_id, e))
    }
}

/// 轮询到作业完成；超出上限按致命超时报出
///
/// 完成的那次响应里带的模式/行/分页令牌由 [`QueryJob::absorb_poll`] 吸收。
pub async fn await_completion<T: QueryTransport>(
    transport: &T,
    job: &mut QueryJob,
    interval: Duration,
    ceiling: Duration,
) -> AppResult<()> {
    if job.complete {
        return Ok(());
    }
    let started = Instant::now();
    loop {
        if started.elapsed() >= ceiling {
            return Err(AppError::Warehouse(WarehouseError::Timeout {
                job_id: job.job_id.clone(),
                waited_secs: ceiling.as_secs(),
            }));
        }
        sleep(interval).await;

        let response = transport.fetch_results(&job.job_id, None).await?;
        job.absorb_poll(response);
        if job.complete {
            debug!("作业 {} 已完成", job.job_id);
            return Ok(());
        }
        debug!("作业 {} 仍在运行...", job.job_id);
    }
}

/// 沿分页令牌取完剩余的行
///
/// 终止规则：响应不带令牌，或带回的令牌与刚用过的相同（不再前进），
/// 都视为结果已取完。
pub async fn drain_pages<T: QueryTransport>(transport: &T, job: &mut QueryJob) -> AppResult<()> {
    while let Some(token) = job.page_token.clone() {
        let response = transport.fetch_results(&job.job_id, Some(&token)).await?;
        debug!("取到一页 {} 行 (作业 {})", response.rows.len(), job.job_id);

        job.page_token = match response.page_token.as_deref() {
            Some(next) if next != token => Some(next.to_string()),
            _ => None,
        };
        job.rows.extend(response.rows);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct InsertResponse {
    #[serde(default, rename = "insertErrors")]
    insert_errors: Vec<JsonValue>,
}

async fn check_status(response: reqwest::Response, endpoint: &str) -> AppResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(bad_response(response, endpoint).await)
}

async fn bad_response(response: reqwest::Response, endpoint: &str) -> AppError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    AppError::Warehouse(WarehouseError::BadResponse {
        endpoint: endpoint.to_string(),
        status,
        message: truncate_text(&message, 500),
    })
}
