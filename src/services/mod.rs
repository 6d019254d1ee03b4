//! 业务能力层（Services Layer）
//!
//! 描述"我能做什么"，每个服务只处理单一能力，不编排流程：
//! - `credentials` - 控制台登录凭据获取
//! - `token` - 仓库访问令牌链
//! - `warehouse` - 仓库查询与结果持久化
//! - `population` - 人群获取、分组与落盘
//! - `console_locators` / `console_driver` - 作业控制台驱动

pub mod console_driver;
pub mod console_locators;
pub mod credentials;
pub mod population;
pub mod token;
pub mod warehouse;

pub use console_driver::{ConsoleDriver, JobRequest};
pub use console_locators::ConsoleLocators;
pub use credentials::{console_credentials_from_env, ConsoleCredentials};
pub use population::{Population, PopulationService};
pub use token::AccessTokenBroker;
pub use warehouse::{await_completion, drain_pages, QueryTransport, WarehouseClient};
