use serde::Deserialize;

use crate::error::{AppError, AppResult, ConfigError};

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 教务门户基地址
    pub portal_base_url: String,
    /// 门户账号
    pub username: String,
    /// 门户密码
    pub password: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 网络请求超时（秒）
    pub request_timeout_secs: u64,
    /// 整轮登录的最大重试次数
    pub max_retries: usize,
    /// 两轮重试之间的等待（秒）
    pub retry_delay_secs: u64,
    /// 哈希谜题的迭代上限
    pub max_puzzle_iterations: u64,
    /// 是否把会话 Cookie 持久化到磁盘
    pub persist_cookies: bool,
    /// 会话文件路径
    pub session_file: String,
    // --- 打码服务配置 ---
    pub captcha_api_base_url: String,
    pub captcha_api_key: String,
    /// 余额低于该值时拒绝自动打码（0 表示不检查）
    pub min_captcha_balance: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            portal_base_url: "https://jwxt.example.edu.cn".to_string(),
            username: String::new(),
            password: String::new(),
            verbose_logging: false,
            request_timeout_secs: 20,
            max_retries: 2,
            retry_delay_secs: 3,
            max_puzzle_iterations: 1_000_000,
            persist_cookies: true,
            session_file: "session.json".to_string(),
            captcha_api_base_url: "https://api.dama.example.com".to_string(),
            captcha_api_key: String::new(),
            min_captcha_balance: 1.0,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            portal_base_url: std::env::var("PORTAL_BASE_URL").unwrap_or(default.portal_base_url),
            username: std::env::var("PORTAL_USERNAME").unwrap_or(default.username),
            password: std::env::var("PORTAL_PASSWORD").unwrap_or(default.password),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_secs),
            max_retries: std::env::var("MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_retries),
            retry_delay_secs: std::env::var("RETRY_DELAY_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.retry_delay_secs),
            max_puzzle_iterations: std::env::var("MAX_PUZZLE_ITERATIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_puzzle_iterations),
            persist_cookies: std::env::var("PERSIST_COOKIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.persist_cookies),
            session_file: std::env::var("SESSION_FILE").unwrap_or(default.session_file),
            captcha_api_base_url: std::env::var("CAPTCHA_API_BASE_URL").unwrap_or(default.captcha_api_base_url),
            captcha_api_key: std::env::var("CAPTCHA_API_KEY").unwrap_or(default.captcha_api_key),
            min_captcha_balance: std::env::var("MIN_CAPTCHA_BALANCE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.min_captcha_balance),
        }
    }

    /// 从 TOML 配置文件加载
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(ConfigError::FileParseFailed {
                path: path.to_string(),
                source: Box::new(e),
            })
        })?;
        toml::from_str(&content).map_err(|e| {
            AppError::Config(ConfigError::FileParseFailed {
                path: path.to_string(),
                source: Box::new(e),
            })
        })
    }

    /// 启动前置检查：账号、密码和打码 API key 缺一不可
    ///
    /// 检查失败时不允许发起任何网络请求。
    pub fn validate(&self) -> AppResult<()> {
        if self.username.trim().is_empty() {
            return Err(AppError::missing_config("username"));
        }
        if self.password.trim().is_empty() {
            return Err(AppError::missing_config("password"));
        }
        if self.captcha_api_key.trim().is_empty() {
            return Err(AppError::missing_config("captcha_api_key"));
        }
        Ok(())
    }
}
