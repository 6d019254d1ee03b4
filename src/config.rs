use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult, ConfigError, FileError};

/// 程序配置
///
/// 所有超时与轮询间隔都是显式配置值，测试可以把它们缩小。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 浏览器 ---
    /// 浏览器调试端口；设置后连接已运行的浏览器，否则自行启动
    pub browser_debug_port: Option<u16>,
    /// 是否无头模式
    pub browser_headless: bool,
    /// 浏览器可执行文件路径（不设置时用系统默认）
    pub chrome_executable: Option<String>,
    /// 窗口宽度
    pub window_width: u32,
    /// 窗口高度
    pub window_height: u32,
    // --- 作业控制台 ---
    /// 控制台根地址
    pub console_base_url: String,
    /// 登录页路径
    pub console_login_path: String,
    /// 作业页路径
    pub console_job_path: String,
    /// 活动 ID 参数在控制台上的名字
    pub campaign_parameter: String,
    /// 单个页面操作的截止时间（毫秒）
    pub action_deadline_ms: u64,
    /// 页面状态轮询间隔（毫秒）
    pub status_poll_interval_ms: u64,
    /// 等待作业终态的上限（秒）
    pub run_wait_ceiling_secs: u64,
    /// 导航错误页恢复的最大次数
    pub interstitial_max_retries: usize,
    /// 单个活动的作业尝试上限（不设置 = 不设上限，重试到成功为止）
    pub max_job_attempts: Option<usize>,
    // --- 数据仓库 ---
    /// 仓库 REST 根地址
    pub warehouse_endpoint: String,
    /// 仓库项目
    pub warehouse_project: String,
    /// 仓库位置
    pub warehouse_location: String,
    /// 源数据集
    pub source_dataset: String,
    /// 基准日期表
    pub cutoff_table: String,
    /// 人群表
    pub population_table: String,
    /// 结果数据集
    pub results_dataset: String,
    /// 结果表
    pub results_table: String,
    /// 单页最大行数提示
    pub query_max_results: u64,
    /// 查询轮询间隔（毫秒）
    pub query_poll_interval_ms: u64,
    /// 等待查询完成的上限（秒）
    pub query_wait_ceiling_secs: u64,
    /// insertAll 批大小
    pub insert_batch_size: usize,
    // --- 路径与日志 ---
    /// 活动输入文件目录
    pub input_dir: String,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: None,
            browser_headless: true,
            chrome_executable: None,
            window_width: 1920,
            window_height: 1080,
            console_base_url: String::new(),
            console_login_path: "/user/login".to_string(),
            console_job_path: String::new(),
            campaign_parameter: "CAMPAIGN_ID".to_string(),
            action_deadline_ms: 60_000,
            status_poll_interval_ms: 500,
            run_wait_ceiling_secs: 600,
            interstitial_max_retries: 5,
            max_job_attempts: None,
            warehouse_endpoint: "https://bigquery.googleapis.com/bigquery/v2".to_string(),
            warehouse_project: String::new(),
            warehouse_location: "US".to_string(),
            source_dataset: "ops".to_string(),
            cutoff_table: "cutoff_calendar".to_string(),
            population_table: "campaign_population".to_string(),
            results_dataset: "automation_results".to_string(),
            results_table: "campaign_job_runs".to_string(),
            query_max_results: 100_000,
            query_poll_interval_ms: 1_500,
            query_wait_ceiling_secs: 600,
            insert_batch_size: 1_000,
            input_dir: "input".to_string(),
            output_log_file: "output.txt".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).or(default.browser_debug_port),
            browser_headless: std::env::var("BROWSER_HEADLESS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.browser_headless),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(default.chrome_executable),
            window_width: std::env::var("WINDOW_WIDTH").ok().and_then(|v| v.parse().ok()).unwrap_or(default.window_width),
            window_height: std::env::var("WINDOW_HEIGHT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.window_height),
            console_base_url: std::env::var("CONSOLE_BASE_URL").unwrap_or(default.console_base_url),
            console_login_path: std::env::var("CONSOLE_LOGIN_PATH").unwrap_or(default.console_login_path),
            console_job_path: std::env::var("CONSOLE_JOB_PATH").unwrap_or(default.console_job_path),
            campaign_parameter: std::env::var("CAMPAIGN_PARAMETER").unwrap_or(default.campaign_parameter),
            action_deadline_ms: std::env::var("ACTION_DEADLINE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.action_deadline_ms),
            status_poll_interval_ms: std::env::var("STATUS_POLL_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.status_poll_interval_ms),
            run_wait_ceiling_secs: std::env::var("RUN_WAIT_CEILING_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.run_wait_ceiling_secs),
            interstitial_max_retries: std::env::var("INTERSTITIAL_MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.interstitial_max_retries),
            max_job_attempts: std::env::var("MAX_JOB_ATTEMPTS").ok().and_then(|v| v.parse().ok()).or(default.max_job_attempts),
            warehouse_endpoint: std::env::var("WAREHOUSE_ENDPOINT").unwrap_or(default.warehouse_endpoint),
            warehouse_project: std::env::var("WAREHOUSE_PROJECT").unwrap_or(default.warehouse_project),
            warehouse_location: std::env::var("WAREHOUSE_LOCATION").unwrap_or(default.warehouse_location),
            source_dataset: std::env::var("SOURCE_DATASET").unwrap_or(default.source_dataset),
            cutoff_table: std::env::var("CUTOFF_TABLE").unwrap_or(default.cutoff_table),
            population_table: std::env::var("POPULATION_TABLE").unwrap_or(default.population_table),
            results_dataset: std::env::var("RESULTS_DATASET").unwrap_or(default.results_dataset),
            results_table: std::env::var("RESULTS_TABLE").unwrap_or(default.results_table),
            query_max_results: std::env::var("QUERY_MAX_RESULTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.query_max_results),
            query_poll_interval_ms: std::env::var("QUERY_POLL_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.query_poll_interval_ms),
            query_wait_ceiling_secs: std::env::var("QUERY_WAIT_CEILING_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.query_wait_ceiling_secs),
            insert_batch_size: std::env::var("INSERT_BATCH_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.insert_batch_size),
            input_dir: std::env::var("INPUT_DIR").unwrap_or(default.input_dir),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        }
    }

    /// 从 TOML 文件加载配置；文件里缺省的字段取默认值
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            AppError::File(FileError::TomlParseFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })
        })?;
        Ok(config)
    }

    /// 校验运行必需的配置项
    pub fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            ("console_base_url", &self.console_base_url),
            ("console_job_path", &self.console_job_path),
            ("warehouse_project", &self.warehouse_project),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Config(ConfigError::MissingValue {
                    name: name.to_string(),
                }));
            }
        }
        Ok(())
    }

    // ========== 派生值 ==========

    pub fn login_url(&self) -> String {
        format!(
            "{}{}",
            self.console_base_url.trim_end_matches('/'),
            self.console_login_path
        )
    }

    pub fn job_url(&self) -> String {
        format!(
            "{}{}",
            self.console_base_url.trim_end_matches('/'),
            self.console_job_path
        )
    }

    /// 某个活动的输入文件路径
    pub fn partition_file(&self, campaign_id: i64) -> PathBuf {
        PathBuf::from(&self.input_dir).join(format!("{}.csv", campaign_id))
    }

    pub fn action_deadline(&self) -> Duration {
        Duration::from_millis(self.action_deadline_ms)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }

    pub fn run_wait_ceiling(&self) -> Duration {
        Duration::from_secs(self.run_wait_ceiling_secs)
    }

    pub fn query_poll_interval(&self) -> Duration {
        Duration::from_millis(self.query_poll_interval_ms)
    }

    pub fn query_wait_ceiling(&self) -> Duration {
        Duration::from_secs(self.query_wait_ceiling_secs)
    }
}
