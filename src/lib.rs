//! # Jwxt Auto Login
//!
//! 教务门户自动登录与会话生命周期管理
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 叶子客户端层（Clients）
//! - `clients/portal_client` - 门户的四次原始交互（抓页 / 挑战 / 取图 / 提交）
//! - `clients/captcha_client` - 外部打码服务（图片进、文本出的黑盒）
//!
//! ### ② 业务能力层（Services）
//! - `services/puzzle_solver` - 哈希谜题暴力搜索 + 大小写掩码恢复
//! - `services/session_store` - 会话持久化（30 分钟 TTL，合并写入原子）
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/login_flow` - 一轮登录的显式状态机，严格串行不可跳步
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/session_manager` - 单飞托管、有界重试、会话消费接口
//!
//! ## 模块结构

pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use clients::{CaptchaClient, PortalClient};
pub use config::Config;
pub use error::{AppError, AppResult, ErrorKind};
pub use models::{AutomationResult, CaptchaChallenge, Credentials, LoginPageContext, SessionState};
pub use orchestrator::SessionManager;
pub use services::{restore_case, solve_puzzle, SessionStore};
pub use workflow::LoginFlow;
