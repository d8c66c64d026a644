//! 登录流程 - 流程层
//!
//! 核心职责：把一次完整的登录跑成显式状态机
//!
//! 流程顺序（严格串行，不可跳步）：
//! 抓登录页 → 取挑战参数 → 取验证码图 → 打码 → 解谜/恢复大小写
//! → 提交表单 → 判定成败
//!
//! 任何一步失败立即终止本轮，产出带分类的失败结果；
//! 重试与否由编排层决定，本层不重试。

use tracing::{debug, error, info, warn};

use crate::clients::{CaptchaClient, PortalClient};
use crate::config::Config;
use crate::error::{AppError, AppResult, PortalError, PuzzleError};
use crate::models::login::{CaptchaChallenge, Credentials, LoginPageContext, SubmitResponse};
use crate::models::result::AutomationResult;
use crate::models::session::SessionState;
use crate::services::puzzle_solver;
use crate::utils::logging::truncate_text;

/// 登录成功的响应体失败标记
///
/// 命中任意一个且没有重定向信号时判为登录被拒。
const FAILURE_MARKERS: [&str; 4] = ["Invalid", "Error", "错误", "失败"];

/// 一次登录运行的状态机
///
/// 每个状态携带后续转移所需的全部数据，转移即消费。
enum LoginPhase {
    Start,
    PageScraped {
        ctx: LoginPageContext,
    },
    ChallengeFetched {
        ctx: LoginPageContext,
        challenge: CaptchaChallenge,
    },
    ImageFetched {
        ctx: LoginPageContext,
        challenge: CaptchaChallenge,
        image: Vec<u8>,
    },
    CaptchaSolved {
        ctx: LoginPageContext,
        challenge: CaptchaChallenge,
        raw_text: String,
    },
    CaptchaConverted {
        ctx: LoginPageContext,
        converted: String,
    },
    FormSubmitted {
        ctx: LoginPageContext,
        response: SubmitResponse,
    },
}

/// 登录流程
///
/// - 编排一轮登录的全部转移
/// - 持有两个叶子客户端，不持有任何跨运行状态
/// - 运行中产生的上下文、挑战、图片、答案都不离开本轮
pub struct LoginFlow {
    portal: PortalClient,
    captcha: CaptchaClient,
    config: Config,
}

impl LoginFlow {
    /// 创建新的登录流程
    pub fn new(config: &Config) -> AppResult<Self> {
        Ok(Self {
            portal: PortalClient::new(config)?,
            captcha: CaptchaClient::new(config).map_err(AppError::Captcha)?,
            config: config.clone(),
        })
    }

    /// 跑一轮完整登录
    pub async fn run(&self) -> AutomationResult {
        match self.execute().await {
            Ok(session) => {
                info!("✅ 登录成功，会话含 {} 条 Cookie", session.cookies.len());
                AutomationResult::ok(session)
            }
            Err(e) => {
                error!("❌ 本轮登录失败 [{}]: {}", e.kind(), e);
                AutomationResult::fail(e.kind(), e.to_string())
            }
        }
    }

    async fn execute(&self) -> AppResult<SessionState> {
        let credentials =
            Credentials::new(self.config.username.clone(), self.config.password.clone());
        let mut phase = LoginPhase::Start;

        loop {
            phase = match phase {
                LoginPhase::Start => {
                    info!("🔐 步骤 1/6: 抓取登录页");
                    let ctx = self.portal.fetch_login_context().await?;
                    LoginPhase::PageScraped { ctx }
                }

                LoginPhase::PageScraped { ctx } => {
                    info!("🧩 步骤 2/6: 获取验证码挑战参数");
                    let challenge = self.portal.fetch_challenge_parameters(&ctx).await?;
                    debug!("{}", challenge);
                    LoginPhase::ChallengeFetched { ctx, challenge }
                }

                LoginPhase::ChallengeFetched { ctx, challenge } => {
                    info!("🖼️ 步骤 3/6: 获取验证码图片");
                    let image = self.portal.fetch_challenge_image(&ctx, &challenge).await?;
                    debug!("图片 {} 字节", image.len());
                    LoginPhase::ImageFetched {
                        ctx,
                        challenge,
                        image,
                    }
                }

                LoginPhase::ImageFetched {
                    ctx,
                    challenge,
                    image,
                } => {
                    info!("👁️ 步骤 4/6: 调用打码服务");
                    let raw_text = self.captcha.solve_image(&image, true).await?;
                    if self.config.verbose_logging {
                        debug!("识别结果: {}", raw_text);
                    }
                    LoginPhase::CaptchaSolved {
                        ctx,
                        challenge,
                        raw_text,
                    }
                }

                LoginPhase::CaptchaSolved {
                    ctx,
                    challenge,
                    raw_text,
                } => {
                    info!("🔢 步骤 5/6: 求解哈希谜题并恢复大小写");
                    let converted = self.convert_captcha(&challenge, &raw_text).await?;
                    LoginPhase::CaptchaConverted { ctx, converted }
                }

                LoginPhase::CaptchaConverted { ctx, converted } => {
                    info!("📤 步骤 6/6: 提交登录表单");
                    let response = self.portal.submit_login(&ctx, &converted, &credentials).await?;
                    LoginPhase::FormSubmitted { ctx, response }
                }

                LoginPhase::FormSubmitted { ctx, response } => {
                    if detect_login_success(&response) {
                        return Ok(build_session(
                            &credentials.username,
                            &ctx.bootstrap_cookies,
                            &response.set_cookies,
                        ));
                    }
                    warn!(
                        "门户拒绝登录，状态码 {}，响应体: {}",
                        response.status,
                        truncate_text(&response.body, 120)
                    );
                    return Err(AppError::Portal(PortalError::LoginRejected {
                        detail: format!("状态码 {}", response.status),
                    }));
                }
            };
        }
    }

    /// 查询打码服务余额（编排层的余额前置检查用）
    pub async fn check_solver_balance(&self) -> AppResult<f64> {
        self.captcha.balance().await.map_err(AppError::Captcha)
    }

    /// 求解谜题整数并按掩码恢复验证码答案的大小写
    ///
    /// 暴力搜索是纯 CPU 活，放到阻塞线程池里跑。
    async fn convert_captcha(
        &self,
        challenge: &CaptchaChallenge,
        raw_text: &str,
    ) -> AppResult<String> {
        let seed = challenge.seed;
        let target = challenge.target_digest.clone();
        let challenge_id = challenge.challenge_id.clone();
        let max_iterations = self.config.max_puzzle_iterations;

        let solved = tokio::task::spawn_blocking(move || {
            puzzle_solver::solve_puzzle(seed, &target, &challenge_id, max_iterations)
        })
        .await
        .map_err(|e| {
            AppError::Puzzle(PuzzleError::SearchInterrupted {
                detail: e.to_string(),
            })
        })??;

        debug!("谜题解 p={}（距起点 {}）", solved, solved - seed);
        Ok(puzzle_solver::restore_case(raw_text, solved))
    }
}

/// 判定登录是否成功
///
/// 门户的成功信号并不一致，三个信号任意一个命中即算成功，
/// 刻意保持宽松，收紧会把正常成功误判成失败：
/// 1. 重定向状态码（301/302/303/307/308）
/// 2. 存在 Location 头
/// 3. 响应体没有失败标记且不是登录页本身的重渲染
pub fn detect_login_success(response: &SubmitResponse) -> bool {
    if response.is_redirect() {
        return true;
    }
    if response.location.is_some() {
        return true;
    }
    let body = &response.body;
    let has_failure_marker = FAILURE_MARKERS.iter().any(|m| body.contains(m));
    let is_login_page = body.contains("__VIEWSTATE") && body.contains("txtUserName");
    !has_failure_marker && !is_login_page
}

/// 把整轮见到的 Set-Cookie（引导抓页 + 最终提交）合并成会话
///
/// 同名 Cookie 后写覆盖先写，提交响应的值优先。
fn build_session(
    username: &str,
    bootstrap_cookies: &[String],
    submit_cookies: &[String],
) -> SessionState {
    let mut session = SessionState::new(username, chrono::Utc::now().timestamp_millis());
    session.merge_set_cookies(bootstrap_cookies);
    session.merge_set_cookies(submit_cookies);
    session
}
