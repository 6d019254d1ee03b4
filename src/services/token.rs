//! 仓库访问令牌 - 业务能力层
//!
//! 令牌按链式来源获取，取到即止：
//! 1. 环境变量（CI 或容器里直接注入）
//! 2. 应用默认凭据文件（authorized_user 类型可直接刷新）
//! 3. gcloud CLI（兜底，也覆盖服务账号凭据）

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult, WarehouseError};

/// 令牌的候选环境变量，按顺序尝试
const TOKEN_ENV_KEYS: [&str; 2] = ["WAREHOUSE_ACCESS_TOKEN", "GCP_ACCESS_TOKEN"];
/// OAuth2 刷新端点
const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// 应用默认凭据文件（相关字段）
#[derive(Debug, Deserialize)]
struct AdcFile {
    #[serde(rename = "type")]
    credential_type: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// 访问令牌经纪人
///
/// 每次调用重新走一遍来源链，不缓存令牌。
pub struct AccessTokenBroker {
    http: reqwest::Client,
}

impl AccessTokenBroker {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// 取一个可用的访问令牌；所有来源都失败时报认证错误
    pub async fn token(&self) -> AppResult<String> {
        // ========== 来源 1: 环境变量 ==========
        if let Some(token) = env_token() {
            debug!("使用环境变量中的访问令牌");
            return Ok(token);
        }

        // ========== 来源 2: 应用默认凭据 ==========
        match self.refresh_default_credentials().await {
            Ok(Some(token)) => {
                debug!("使用应用默认凭据刷新出的访问令牌");
                return Ok(token);
            }
            Ok(None) => debug!("没有可直接刷新的应用默认凭据"),
            Err(e) => warn!("刷新应用默认凭据失败: {}", e),
        }

        // ========== 来源 3: gcloud CLI ==========
        match cli_token().await {
            Ok(token) => {
                debug!("使用 gcloud CLI 打印的访问令牌");
                Ok(token)
            }
            Err(e) => {
                warn!("gcloud CLI 取令牌失败: {}", e);
                Err(AppError::auth_failed(
                    "环境变量、应用默认凭据、gcloud CLI 均未提供访问令牌",
                ))
            }
        }
    }

    /// 用 authorized_user 类型的默认凭据换一个新令牌
    ///
    /// 服务账号类型需要自签 JWT，这里不做，直接落到 CLI 兜底。
    async fn refresh_default_credentials(&self) -> AppResult<Option<String>> {
        let Some(path) = default_credentials_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        let adc: AdcFile = serde_json::from_str(&content)?;

        if adc.credential_type.as_deref() != Some("authorized_user") {
            return Ok(None);
        }
        let (Some(client_id), Some(client_secret), Some(refresh_token)) =
            (adc.client_id, adc.client_secret, adc.refresh_token)
        else {
            return Ok(None);
        };

        let response = self
            .http
            .post(OAUTH_TOKEN_URL)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Warehouse(WarehouseError::BadResponse {
                endpoint: OAUTH_TOKEN_URL.to_string(),
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }));
        }

        let body: TokenResponse = response.json().await?;
        Ok(Some(body.access_token))
    }
}

fn env_token() -> Option<String> {
    TOKEN_ENV_KEYS
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

/// 默认凭据文件位置：显式指定优先，否则用 gcloud 的惯例路径
fn default_credentials_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    std::env::var("HOME").ok().map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("gcloud")
            .join("application_default_credentials.json")
    })
}

async fn cli_token() -> AppResult<String> {
    let output = tokio::process::Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .output()
        .await
        .map_err(|e| AppError::auth_failed(format!("无法执行 gcloud: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::auth_failed(format!(
            "gcloud 退出码非零: {}",
            stderr.trim()
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(AppError::auth_failed("gcloud 输出为空"));
    }
    Ok(token)
}
