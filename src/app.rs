use anyhow::{bail, Result};
use tracing::{error, info};

use crate::config::Config;
use crate::orchestrator::SessionManager;
use crate::utils::logging;

/// 应用主结构
pub struct App {
    config: Config,
    manager: SessionManager,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        logging::log_startup(&config.portal_base_url);
        let manager = SessionManager::new(config.clone())?;
        Ok(Self { config, manager })
    }

    /// 运行应用主逻辑：保证拿到一份有效会话
    pub async fn run(&self) -> Result<()> {
        match self.manager.authenticate(false).await {
            Some(session) => {
                print_final_stats(&session.username, session.cookies.len(), &self.config);
                Ok(())
            }
            None => {
                if let Some(result) = self.manager.last_result().await {
                    error!(
                        "认证失败: [{}] {}",
                        result
                            .error_kind
                            .map(|k| k.to_string())
                            .unwrap_or_default(),
                        result.error_message.unwrap_or_default()
                    );
                }
                bail!("本周期未能获得有效会话")
            }
        }
    }

    /// 暴露会话管理器给下游抓取方
    pub fn session_manager(&self) -> &SessionManager {
        &self.manager
    }
}

// ========== 日志辅助函数 ==========

fn print_final_stats(username: &str, cookie_count: usize, config: &Config) {
    info!("{}", "=".repeat(60));
    info!("📊 认证完成");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("✅ 账号: {}", username);
    info!("🍪 会话 Cookie: {} 条", cookie_count);
    if config.persist_cookies {
        info!("💾 会话已保存至: {}", config.session_file);
    } else {
        info!("💾 会话仅保存在内存中");
    }
    info!("{}", "=".repeat(60));
}
