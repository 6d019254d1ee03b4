use std::fmt;
use std::time::Duration;

use crate::models::locator::LocatorError;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 数据仓库相关错误
    Warehouse(WarehouseError),
    /// 作业控制台相关错误
    Console(ConsoleError),
    /// 定位器规格错误（程序性错误，不可重试）
    Locator(LocatorError),
    /// 凭据错误
    Credential(CredentialError),
    /// 文件操作错误
    File(FileError),
    /// 配置错误
    Config(ConfigError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Warehouse(e) => write!(f, "数据仓库错误: {}", e),
            AppError::Console(e) => write!(f, "控制台错误: {}", e),
            AppError::Locator(e) => write!(f, "定位器错误: {}", e),
            AppError::Credential(e) => write!(f, "凭据错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Warehouse(e) => Some(e),
            AppError::Console(e) => Some(e),
            AppError::Locator(e) => Some(e),
            AppError::Credential(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// 数据仓库相关错误
#[derive(Debug)]
pub enum WarehouseError {
    /// 获取访问令牌失败（所有令牌来源均不可用）
    AuthFailed {
        detail: String,
    },
    /// 查询提交失败
    SubmitFailed {
        endpoint: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 轮询作业状态失败
    PollFailed {
        job_id: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 网络请求失败
    RequestFailed {
        endpoint: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 仓库返回错误响应
    BadResponse {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// 等待查询完成超出上限
    Timeout {
        job_id: String,
        waited_secs: u64,
    },
    /// JSON 解析失败
    JsonParseFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// insertAll 拒绝了部分行
    InsertRejected {
        table: String,
        failures: usize,
    },
}

impl fmt::Display for WarehouseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarehouseError::AuthFailed { detail } => {
                write!(f, "获取访问令牌失败: {}", detail)
            }
            WarehouseError::SubmitFailed { endpoint, source } => {
                write!(f, "查询提交失败 ({}): {}", endpoint, source)
            }
            WarehouseError::PollFailed { job_id, source } => {
                write!(f, "轮询作业 {} 失败: {}", job_id, source)
            }
            WarehouseError::RequestFailed { endpoint, source } => {
                write!(f, "仓库请求失败 ({}): {}", endpoint, source)
            }
            WarehouseError::BadResponse {
                endpoint,
                status,
                message,
            } => {
                write!(
                    f,
                    "仓库返回错误响应 ({}): status={}, message={}",
                    endpoint, status, message
                )
            }
            WarehouseError::Timeout { job_id, waited_secs } => {
                write!(f, "等待作业 {} 完成超时 (已等待 {}秒)", job_id, waited_secs)
            }
            WarehouseError::JsonParseFailed { source } => {
                write!(f, "JSON解析失败: {}", source)
            }
            WarehouseError::InsertRejected { table, failures } => {
                write!(f, "insertAll 拒绝了 {} 行 (表: {})", failures, table)
            }
        }
    }
}

impl std::error::Error for WarehouseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WarehouseError::SubmitFailed { source, .. }
            | WarehouseError::PollFailed { source, .. }
            | WarehouseError::RequestFailed { source, .. }
            | WarehouseError::JsonParseFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 作业控制台相关错误
#[derive(Debug)]
pub enum ConsoleError {
    /// 登录失败（提交后仍停留在登录页）
    LoginFailed {
        url: String,
    },
    /// 操作在截止时间内始终未成功
    ActionTimeout {
        action: String,
        deadline_ms: u64,
        attempts: usize,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 导航错误页重试次数耗尽
    InterstitialExhausted {
        retries: usize,
    },
    /// 页面命令执行失败
    PageCommandFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::LoginFailed { url } => {
                write!(f, "登录失败，仍停留在: {}", url)
            }
            ConsoleError::ActionTimeout {
                action,
                deadline_ms,
                attempts,
                source,
            } => {
                write!(
                    f,
                    "操作「{}」在 {}ms 内未成功 (尝试 {} 次): {}",
                    action, deadline_ms, attempts, source
                )
            }
            ConsoleError::InterstitialExhausted { retries } => {
                write!(f, "导航错误页恢复 {} 次后仍未成功", retries)
            }
            ConsoleError::PageCommandFailed { source } => {
                write!(f, "页面命令执行失败: {}", source)
            }
        }
    }
}

impl std::error::Error for ConsoleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConsoleError::ActionTimeout { source, .. }
            | ConsoleError::PageCommandFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 凭据错误
#[derive(Debug)]
pub enum CredentialError {
    /// 所有候选环境变量均未提供凭据
    Missing {
        keys: String,
    },
    /// 凭据值为空
    EmptyValue {
        key: String,
    },
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::Missing { keys } => {
                write!(f, "未找到控制台凭据 (候选变量: {})", keys)
            }
            CredentialError::EmptyValue { key } => {
                write!(f, "凭据 {} 的值为空", key)
            }
        }
    }
}

impl std::error::Error for CredentialError {}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 文件不存在
    NotFound {
        path: String,
    },
    /// 读取文件失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// TOML 解析失败
    TomlParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 目录不存在
    DirectoryNotFound {
        path: String,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::NotFound { path } => write!(f, "文件不存在: {}", path),
            FileError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
            FileError::TomlParseFailed { path, source } => {
                write!(f, "TOML解析失败 ({}): {}", path, source)
            }
            FileError::DirectoryNotFound { path } => write!(f, "目录不存在: {}", path),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. }
            | FileError::WriteFailed { source, .. }
            | FileError::TomlParseFailed { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置值不合法
    InvalidValue {
        name: String,
        value: String,
        expected: String,
    },
    /// 必填配置缺失
    MissingValue {
        name: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue {
                name,
                value,
                expected,
            } => {
                write!(
                    f,
                    "配置 {} 的值 '{}' 不合法，期望: {}",
                    name, value, expected
                )
            }
            ConfigError::MissingValue { name } => {
                write!(f, "缺少必填配置: {}", name)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从常见错误类型转换 ==========
// 注意：不需要手动实现 From<AppError> for anyhow::Error，
// anyhow 已经为所有实现了 std::error::Error 的类型提供了自动实现

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Console(ConsoleError::PageCommandFailed {
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Warehouse(WarehouseError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err.url().map(|u| u.to_string()).unwrap_or_default();
        AppError::Warehouse(WarehouseError::RequestFailed {
            endpoint,
            source: Box::new(err),
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: String::new(), // TOML错误通常不包含路径信息
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<LocatorError> for AppError {
    fn from(err: LocatorError) -> Self {
        AppError::Locator(err)
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建令牌获取失败错误
    pub fn auth_failed(detail: impl Into<String>) -> Self {
        AppError::Warehouse(WarehouseError::AuthFailed {
            detail: detail.into(),
        })
    }

    /// 创建查询提交失败错误
    pub fn submit_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Warehouse(WarehouseError::SubmitFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建轮询失败错误
    pub fn poll_failed(
        job_id: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Warehouse(WarehouseError::PollFailed {
            job_id: job_id.into(),
            source: Box::new(source),
        })
    }

    /// 创建操作超时错误
    pub fn action_timeout(
        action: impl Into<String>,
        deadline: Duration,
        attempts: usize,
        source: AppError,
    ) -> Self {
        AppError::Console(ConsoleError::ActionTimeout {
            action: action.into(),
            deadline_ms: deadline.as_millis() as u64,
            attempts,
            source: Box::new(source),
        })
    }

    /// 创建文件写入失败错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件读取失败错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 判断是否为操作超时（用于区分可吸收的等待失败与其他失败）
    pub fn is_action_timeout(&self) -> bool {
        matches!(self, AppError::Console(ConsoleError::ActionTimeout { .. }))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
