//! 数据仓库查询的线上模型与列式结果
//!
//! 线上形状（提交与取结果接口共用）：
//! `{jobReference.jobId, jobComplete, pageToken?, schema.fields[], rows[], totalRows}`，
//! 其中每行是 `{f: [{v: 值}, ...]}`，与 `schema.fields` 按位置对齐。

use serde::Deserialize;
use serde_json::Value as JsonValue;

/// 远程系统分配的作业引用
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub job_id: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// 一列的声明：名称 + 声明类型
#[derive(Debug, Clone, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

/// 有序的列模式
#[derive(Debug, Clone, Deserialize)]
pub struct TableSchema {
    pub fields: Vec<FieldSchema>,
}

/// 单元格：值以词法形式传输（字符串），空值为 null
#[derive(Debug, Clone, Deserialize)]
pub struct CellValue {
    #[serde(default)]
    pub v: JsonValue,
}

/// 一行：单元格按列顺序排列
#[derive(Debug, Clone, Deserialize)]
pub struct RowValues {
    #[serde(default)]
    pub f: Vec<CellValue>,
}

/// 查询提交/取结果接口的响应
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub job_reference: JobReference,
    #[serde(default)]
    pub job_complete: bool,
    #[serde(default)]
    pub schema: Option<TableSchema>,
    #[serde(default)]
    pub rows: Vec<RowValues>,
    #[serde(default)]
    pub page_token: Option<String>,
    #[serde(default)]
    pub total_rows: Option<String>,
}

/// 一次已提交的仓库查询
///
/// 提交时创建，只被轮询/分页循环修改（追加行、更新完成标志和分页令牌），
/// 物化成列式结果后即丢弃。
#[derive(Debug)]
pub struct QueryJob {
    pub sql: String,
    pub job_id: String,
    pub complete: bool,
    pub schema: Option<TableSchema>,
    pub rows: Vec<RowValues>,
    pub page_token: Option<String>,
}

impl QueryJob {
    /// 从提交响应创建
    pub fn from_submit(sql: impl Into<String>, resp: QueryResponse) -> Self {
        Self {
            sql: sql.into(),
            job_id: resp.job_reference.job_id,
            complete: resp.job_complete,
            schema: resp.schema,
            rows: resp.rows,
            page_token: resp.page_token,
        }
    }

    /// 吸收一次轮询响应；作业完成时捕获模式、首页行和分页令牌
    pub fn absorb_poll(&mut self, resp: QueryResponse) {
        self.complete = resp.job_complete;
        if resp.job_complete {
            self.schema = resp.schema;
            self.rows = resp.rows;
            self.page_token = resp.page_token;
        }
    }

    /// 物化为列式结果
    pub fn materialize(self) -> ColumnarResult {
        match self.schema {
            Some(schema) => materialize(&schema, &self.rows),
            None => ColumnarResult {
                columns: Vec::new(),
                row_count: 0,
            },
        }
    }
}

/// 声明类型归约后的语义类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Float,
    Bool,
    Text,
}

/// 声明类型 → 语义类型
///
/// 日期/时间等一律保留为字符串，由调用方按需解析。
pub fn semantic_kind(declared: &str) -> ValueKind {
    match declared.to_ascii_uppercase().as_str() {
        "INTEGER" | "INT64" => ValueKind::Int,
        "FLOAT" | "FLOAT64" | "NUMERIC" | "BIGNUMERIC" => ValueKind::Float,
        "BOOLEAN" | "BOOL" => ValueKind::Bool,
        _ => ValueKind::Text,
    }
}

/// 一列的数据，空值用 None 表示
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Text(Vec<Option<String>>),
}

/// 命名的一列
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// 列式结果集
#[derive(Debug, Clone)]
pub struct ColumnarResult {
    pub columns: Vec<Column>,
    pub row_count: usize,
}

impl ColumnarResult {
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// 按名取整数列；列不存在或类型不符时返回 None
    pub fn int_values(&self, name: &str) -> Option<&[Option<i64>]> {
        match self.column(name)? {
            Column {
                data: ColumnData::Int(values),
                ..
            } => Some(values),
            _ => None,
        }
    }

    /// 按名取文本列；列不存在或类型不符时返回 None
    pub fn text_values(&self, name: &str) -> Option<&[Option<String>]> {
        match self.column(name)? {
            Column {
                data: ColumnData::Text(values),
                ..
            } => Some(values),
            _ => None,
        }
    }
}

/// 把累积的行按列模式物化为列式结果
///
/// 类型映射是非严格的：无法解析的单元格变成 None，不让整行失败。
pub fn materialize(schema: &TableSchema, rows: &[RowValues]) -> ColumnarResult {
    let columns = schema
        .fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let cells = rows.iter().map(|row| row.f.get(i).map(|c| &c.v));
            let data = match semantic_kind(&field.field_type) {
                ValueKind::Int => ColumnData::Int(
                    cells
                        .map(|v| lexical(v).and_then(|s| s.trim().parse::<i64>().ok()))
                        .collect(),
                ),
                ValueKind::Float => ColumnData::Float(
                    cells
                        .map(|v| lexical(v).and_then(|s| s.trim().parse::<f64>().ok()))
                        .collect(),
                ),
                ValueKind::Bool => ColumnData::Bool(
                    cells
                        .map(|v| lexical(v).and_then(|s| parse_bool(&s)))
                        .collect(),
                ),
                ValueKind::Text => ColumnData::Text(cells.map(|v| lexical(v)).collect()),
            };
            Column {
                name: field.name.clone(),
                data,
            }
        })
        .collect();

    ColumnarResult {
        columns,
        row_count: rows.len(),
    }
}

/// 取单元格的词法值；null 或缺失 → None
fn lexical(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn parse_bool(lexical: &str) -> Option<bool> {
    match lexical.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}
