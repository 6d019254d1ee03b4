//! 控制台凭据 - 业务能力层
//!
//! 凭据协作方是个黑盒：从环境变量取 (用户名, 密码)。
//! 取不到或取到空值是致命的前置条件失败，在任何活动开始前就报出。

use std::fmt;

use crate::error::{AppError, AppResult, CredentialError};

/// 用户名的候选环境变量，按顺序尝试
const USERNAME_KEYS: [&str; 2] = ["CONSOLE_USERNAME", "CONSOLE_USER"];
/// 密码的候选环境变量
const PASSWORD_KEYS: [&str; 2] = ["CONSOLE_PASSWORD", "CONSOLE_PASS"];

/// 控制台登录凭据
///
/// 只在登录时使用，驱动不持久化它。
#[derive(Clone)]
pub struct ConsoleCredentials {
    pub username: String,
    pub password: String,
}

impl ConsoleCredentials {
    /// 构造并校验；空值是硬失败
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> AppResult<Self> {
        let username = username.into();
        let password = password.into();
        if username.trim().is_empty() {
            return Err(AppError::Credential(CredentialError::EmptyValue {
                key: "username".to_string(),
            }));
        }
        if password.trim().is_empty() {
            return Err(AppError::Credential(CredentialError::EmptyValue {
                key: "password".to_string(),
            }));
        }
        Ok(Self { username, password })
    }
}

// 密码不进日志
impl fmt::Debug for ConsoleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// 从环境变量读取控制台凭据
pub fn console_credentials_from_env() -> AppResult<ConsoleCredentials> {
    let username = first_non_empty(&USERNAME_KEYS);
    let password = first_non_empty(&PASSWORD_KEYS);
    match (username, password) {
        (Some(username), Some(password)) => ConsoleCredentials::new(username, password),
        _ => Err(AppError::Credential(CredentialError::Missing {
            keys: format!("{} / {}", USERNAME_KEYS.join(", "), PASSWORD_KEYS.join(", ")),
        })),
    }
}

fn first_non_empty(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.trim().is_empty())
}
