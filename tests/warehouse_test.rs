//! 仓库查询生命周期（轮询、分页、物化）的行为测试
//!
//! 用脚本化的假传输喂入响应序列，不碰网络。

use std::sync::Mutex;
use std::time::Duration;

use campaign_job_submit::error::{AppError, AppResult, WarehouseError};
use campaign_job_submit::models::warehouse::{
    materialize, semantic_kind, CellValue, ColumnData, FieldSchema, QueryJob, QueryResponse,
    RowValues, TableSchema, ValueKind,
};
use campaign_job_submit::services::warehouse::{await_completion, drain_pages, QueryTransport};
use serde_json::json;

/// 按脚本顺序逐个吐响应的假传输
struct ScriptedTransport {
    responses: Mutex<Vec<QueryResponse>>,
    /// 每次请求携带的分页令牌
    requests: Mutex<Vec<Option<String>>>,
}

impl ScriptedTransport {
    fn new(mut responses: Vec<QueryResponse>) -> Self {
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn seen_tokens(&self) -> Vec<Option<String>> {
        self.requests.lock().expect("锁不应中毒").clone()
    }
}

impl QueryTransport for ScriptedTransport {
    async fn fetch_results(
        &self,
        _job_id: &str,
        page_token: Option<&str>,
    ) -> AppResult<QueryResponse> {
        self.requests
            .lock()
            .expect("锁不应中毒")
            .push(page_token.map(String::from));
        self.responses
            .lock()
            .expect("锁不应中毒")
            .pop()
            .ok_or_else(|| AppError::Other("脚本响应已耗尽".to_string()))
    }
}

/// 永远报告"仍在运行"的假传输
struct AlwaysRunning;

impl QueryTransport for AlwaysRunning {
    async fn fetch_results(
        &self,
        job_id: &str,
        _page_token: Option<&str>,
    ) -> AppResult<QueryResponse> {
        Ok(response(json!({
            "jobReference": { "jobId": job_id },
            "jobComplete": false,
        })))
    }
}

fn response(body: serde_json::Value) -> QueryResponse {
    serde_json::from_value(body).expect("测试响应应该能解析")
}

fn submitted_job(body: serde_json::Value) -> QueryJob {
    QueryJob::from_submit("SELECT account_id, campaign_id FROM t", response(body))
}

#[tokio::test]
async fn polls_until_complete_then_drains_all_pages() {
    let mut job = submitted_job(json!({
        "jobReference": { "jobId": "job-1" },
        "jobComplete": false,
    }));

    let transport = ScriptedTransport::new(vec![
        // 两次轮询仍在运行
        response(json!({ "jobReference": { "jobId": "job-1" }, "jobComplete": false })),
        response(json!({ "jobReference": { "jobId": "job-1" }, "jobComplete": false })),
        // 第三次完成，带模式、首页行和分页令牌
        response(json!({
            "jobReference": { "jobId": "job-1" },
            "jobComplete": true,
            "schema": { "fields": [
                { "name": "account_id", "type": "STRING" },
                { "name": "campaign_id", "type": "INTEGER" },
            ]},
            "rows": [ { "f": [ { "v": "A-1" }, { "v": "101" } ] } ],
            "pageToken": "p1",
            "totalRows": "3",
        })),
        // 后续两页
        response(json!({
            "jobReference": { "jobId": "job-1" },
            "jobComplete": true,
            "rows": [ { "f": [ { "v": "A-2" }, { "v": "102" } ] } ],
            "pageToken": "p2",
        })),
        response(json!({
            "jobReference": { "jobId": "job-1" },
            "jobComplete": true,
            "rows": [ { "f": [ { "v": "A-3" }, { "v": "103" } ] } ],
        })),
    ]);

    await_completion(
        &transport,
        &mut job,
        Duration::from_millis(2),
        Duration::from_secs(1),
    )
    .await
    .expect("轮询应该成功");
    drain_pages(&transport, &mut job).await.expect("分页应该成功");

    let result = job.materialize();
    assert_eq!(result.row_count, 3);
    assert_eq!(
        result.text_values("account_id").expect("应有 account_id 列"),
        &[
            Some("A-1".to_string()),
            Some("A-2".to_string()),
            Some("A-3".to_string())
        ]
    );
    assert_eq!(
        result.int_values("campaign_id").expect("应有 campaign_id 列"),
        &[Some(101), Some(102), Some(103)]
    );
    // 轮询带 None，分页带各自的令牌
    assert_eq!(
        transport.seen_tokens(),
        vec![
            None,
            None,
            None,
            Some("p1".to_string()),
            Some("p2".to_string())
        ]
    );
}

#[tokio::test]
async fn stops_when_page_token_does_not_advance() {
    let mut job = submitted_job(json!({
        "jobReference": { "jobId": "job-2" },
        "jobComplete": true,
        "schema": { "fields": [ { "name": "n", "type": "INTEGER" } ] },
        "rows": [ { "f": [ { "v": "1" } ] } ],
        "pageToken": "stuck",
    }));

    // 令牌原地踏步的截断页
    let transport = ScriptedTransport::new(vec![response(json!({
        "jobReference": { "jobId": "job-2" },
        "jobComplete": true,
        "rows": [ { "f": [ { "v": "2" } ] } ],
        "pageToken": "stuck",
    }))]);

    drain_pages(&transport, &mut job).await.expect("分页应该终止");

    assert_eq!(transport.seen_tokens(), vec![Some("stuck".to_string())]);
    assert_eq!(job.materialize().row_count, 2);
}

#[tokio::test]
async fn reports_timeout_when_job_never_completes() {
    let mut job = submitted_job(json!({
        "jobReference": { "jobId": "job-3" },
        "jobComplete": false,
    }));

    let err = await_completion(
        &AlwaysRunning,
        &mut job,
        Duration::from_millis(5),
        Duration::from_millis(40),
    )
    .await
    .expect_err("应该超时");

    assert!(matches!(
        err,
        AppError::Warehouse(WarehouseError::Timeout { .. })
    ));
}

#[tokio::test]
async fn skips_polling_when_submit_already_complete() {
    let mut job = submitted_job(json!({
        "jobReference": { "jobId": "job-4" },
        "jobComplete": true,
        "schema": { "fields": [ { "name": "one", "type": "INTEGER" } ] },
        "rows": [ { "f": [ { "v": "1" } ] } ],
    }));

    let transport = ScriptedTransport::new(Vec::new());
    await_completion(
        &transport,
        &mut job,
        Duration::from_millis(2),
        Duration::from_secs(1),
    )
    .await
    .expect("已完成的作业不需要轮询");
    drain_pages(&transport, &mut job)
        .await
        .expect("没有分页令牌时直接返回");

    assert!(transport.seen_tokens().is_empty());
    assert_eq!(job.materialize().row_count, 1);
}

#[test]
fn incomplete_poll_does_not_capture_payload() {
    let mut job = submitted_job(json!({
        "jobReference": { "jobId": "job-5" },
        "jobComplete": false,
    }));

    job.absorb_poll(response(json!({
        "jobReference": { "jobId": "job-5" },
        "jobComplete": false,
        "rows": [ { "f": [ { "v": "1" } ] } ],
        "pageToken": "ghost",
    })));

    assert!(!job.complete);
    assert!(job.rows.is_empty());
    assert!(job.page_token.is_none());
}

#[test]
fn materialize_is_non_strict_about_cell_types() {
    let schema = TableSchema {
        fields: vec![
            FieldSchema {
                name: "qty".to_string(),
                field_type: "INTEGER".to_string(),
            },
            FieldSchema {
                name: "ratio".to_string(),
                field_type: "FLOAT64".to_string(),
            },
            FieldSchema {
                name: "active".to_string(),
                field_type: "BOOLEAN".to_string(),
            },
            FieldSchema {
                name: "day".to_string(),
                field_type: "DATE".to_string(),
            },
        ],
    };
    let rows = vec![
        RowValues {
            f: vec![
                CellValue { v: json!("7") },
                CellValue { v: json!("0.5") },
                CellValue { v: json!("TRUE") },
                CellValue { v: json!("2025-11-03") },
            ],
        },
        RowValues {
            f: vec![
                // 解析不了的单元格变成 None，不让整行失败
                CellValue { v: json!("abc") },
                CellValue { v: json!(null) },
                CellValue { v: json!("maybe") },
                CellValue { v: json!(null) },
            ],
        },
    ];

    let result = materialize(&schema, &rows);
    assert_eq!(result.row_count, 2);
    assert_eq!(
        result.column("qty").expect("应有 qty 列").data,
        ColumnData::Int(vec![Some(7), None])
    );
    assert_eq!(
        result.column("ratio").expect("应有 ratio 列").data,
        ColumnData::Float(vec![Some(0.5), None])
    );
    assert_eq!(
        result.column("active").expect("应有 active 列").data,
        ColumnData::Bool(vec![Some(true), None])
    );
    // 日期保留为文本，由调用方按需解析
    assert_eq!(
        result.column("day").expect("应有 day 列").data,
        ColumnData::Text(vec![Some("2025-11-03".to_string()), None])
    );
}

#[test]
fn declared_types_reduce_to_semantic_kinds() {
    assert_eq!(semantic_kind("INT64"), ValueKind::Int);
    assert_eq!(semantic_kind("integer"), ValueKind::Int);
    assert_eq!(semantic_kind("NUMERIC"), ValueKind::Float);
    assert_eq!(semantic_kind("BOOL"), ValueKind::Bool);
    assert_eq!(semantic_kind("TIMESTAMP"), ValueKind::Text);
    assert_eq!(semantic_kind("STRING"), ValueKind::Text);
}
