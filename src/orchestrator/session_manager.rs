//! 会话管理器 - 编排层
//!
//! 对下游抓取方暴露会话消费接口，对内负责：
//! 前置检查 → 单飞托管 → 有界重试 → 会话入库。

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppResult, ErrorKind};
use crate::models::result::AutomationResult;
use crate::models::session::SessionState;
use crate::services::session_store::SessionStore;
use crate::workflow::LoginFlow;

/// 会话管理器
///
/// 整个部署实例只应存在一个。并发触发（定时刷新和手动刷新
/// 挤在一起）时，后到的调用方等第一轮的结果，绝不并行跑协议。
pub struct SessionManager {
    config: Config,
    store: Arc<SessionStore>,
    flow: LoginFlow,
    /// 单飞锁：同一时刻最多一轮登录在跑
    run_guard: Mutex<()>,
    /// 最近一轮的终态结果，供诊断
    last_result: Mutex<Option<AutomationResult>>,
}

impl SessionManager {
    /// 创建会话管理器（会话存储按配置落盘）
    pub fn new(config: Config) -> AppResult<Self> {
        let store = Arc::new(SessionStore::new(
            config.session_file.clone(),
            config.persist_cookies,
        ));
        Self::with_store(config, store)
    }

    /// 注入外部会话存储（测试与组合用）
    pub fn with_store(config: Config, store: Arc<SessionStore>) -> AppResult<Self> {
        let flow = LoginFlow::new(&config)?;
        Ok(Self {
            config,
            store,
            flow,
            run_guard: Mutex::new(()),
            last_result: Mutex::new(None),
        })
    }

    // ========== 下游消费接口 ==========

    /// 当前是否持有有效会话
    pub async fn has_valid_session(&self) -> bool {
        self.store.load().await.is_some()
    }

    /// 取当前会话的 Cookie 头（无有效会话时为 None）
    pub async fn get_session_cookies(&self) -> Option<String> {
        self.store.load().await.map(|s| s.cookie_header())
    }

    /// 最近一轮自动化的终态结果
    pub async fn last_result(&self) -> Option<AutomationResult> {
        self.last_result.lock().await.clone()
    }

    /// 获取认证会话
    ///
    /// `force_refresh=false` 时优先复用库里的有效会话；
    /// `force_refresh=true` 用于受保护请求被门户拒绝后的强制重登。
    /// 返回 None 表示本周期硬失败，调用方不应继续。
    pub async fn authenticate(&self, force_refresh: bool) -> Option<SessionState> {
        // 前置检查：配置不完整直接失败，不发任何网络请求
        if let Err(e) = self.config.validate() {
            error!("❌ 配置检查未通过: {}", e);
            self.record(AutomationResult::fail(ErrorKind::ConfigInvalid, e.to_string()))
                .await;
            return None;
        }

        if !force_refresh {
            if let Some(session) = self.store.load().await {
                info!("♻️ 复用库中有效会话（账号 {}）", session.username);
                return Some(session);
            }
        }

        let wait_started = chrono::Utc::now().timestamp_millis();
        let _guard = self.run_guard.lock().await;

        // 等锁期间别的调用方可能刚完成一轮登录，直接用它的成果
        if let Some(session) = self.store.load().await {
            if session.created_at_millis >= wait_started {
                info!("♻️ 等待期间已有并发登录完成，复用其会话");
                return Some(session);
            }
            if force_refresh {
                // 被拒的旧会话作废，重新走协议
                self.store.clear().await;
            } else {
                return Some(session);
            }
        }

        // 余额前置检查：别在余额不足时白白烧掉一次挑战
        if self.config.min_captcha_balance > 0.0 {
            match self.flow.check_solver_balance().await {
                Ok(balance) if balance < self.config.min_captcha_balance => {
                    error!(
                        "❌ 打码服务余额 {:.2} 低于下限 {:.2}，停止自动登录",
                        balance, self.config.min_captcha_balance
                    );
                    self.record(AutomationResult::fail(
                        ErrorKind::SolverLowBalance,
                        format!("余额 {:.2}", balance),
                    ))
                    .await;
                    return None;
                }
                Ok(balance) => info!("💰 打码服务余额 {:.2}", balance),
                // 余额查询失败不挡路，识别时还会再暴露问题
                Err(e) => warn!("⚠️ 余额查询失败，继续尝试: {}", e),
            }
        }

        self.run_with_retries().await
    }

    /// 有界重试地跑登录流程
    ///
    /// 只有可重试的失败分类才重跑，默认最多整轮重来 2 次；
    /// 绝不无限静默重试。
    async fn run_with_retries(&self) -> Option<SessionState> {
        let max_attempts = self.config.max_retries + 1;

        for attempt in 1..=max_attempts {
            info!("🚀 第 {}/{} 轮登录开始", attempt, max_attempts);
            let result = self.flow.run().await;

            if let Some(session) = result.session.clone() {
                let stored = self.store.save(session).await;
                self.record(result).await;
                return Some(stored);
            }

            let kind = result.kind();
            let retryable = kind.map(|k| k.is_retryable()).unwrap_or(false);
            self.record(result).await;

            if !retryable {
                warn!("该失败分类不可重试，放弃");
                break;
            }
            if attempt < max_attempts {
                info!("⏳ {} 秒后重试", self.config.retry_delay_secs);
                sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
            }
        }

        error!("❌ 重试耗尽，本周期认证失败");
        None
    }

    async fn record(&self, result: AutomationResult) {
        *self.last_result.lock().await = Some(result);
    }
}
