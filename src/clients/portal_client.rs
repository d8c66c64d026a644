//! 教务门户页面客户端
//!
//! 负责与门户的四次原始交互：抓登录页、取挑战参数、取验证码图、提交表单。
//! 本模块不持有任何持久状态，Cookie 原样透传给上层。
//!
//! 门户是 ASP.NET WebForms 风格：登录页埋着 __VIEWSTATE /
//! __EVENTVALIDATION 等防伪字段和一个 LBD_VCID_* 验证码实例 ID，
//! 四次请求必须复用同一组引导 Cookie 和同一个实例 ID，顺序不能乱。

use std::time::Duration;

use regex::Regex;
use reqwest::header::{COOKIE, LOCATION, SET_COOKIE};
use reqwest::Client;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult, PortalError};
use crate::models::login::{CaptchaChallenge, Credentials, LoginPageContext, SubmitResponse};
use crate::models::session::parse_set_cookie;

/// 验证码实例 ID 隐藏字段的前缀
const VCID_FIELD_PREFIX: &str = "LBD_VCID_";

/// 教务门户页面客户端
pub struct PortalClient {
    http: Client,
    base_url: String,
}

impl PortalClient {
    /// 创建新的门户客户端
    ///
    /// 重定向必须禁用：3xx + Location 是登录成功的信号，
    /// 自动跟随会吃掉 Set-Cookie 头。
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| AppError::portal_unreachable(&config.portal_base_url, e))?;
        Ok(Self {
            http,
            base_url: config.portal_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn login_url(&self) -> String {
        format!("{}/login.aspx", self.base_url)
    }

    fn captcha_url(&self) -> String {
        format!("{}/BotDetectCaptcha.ashx", self.base_url)
    }

    /// 抓取登录页，收集防伪隐藏字段和引导 Cookie
    pub async fn fetch_login_context(&self) -> AppResult<LoginPageContext> {
        let url = self.login_url();
        debug!("抓取登录页: {}", url);

        let res = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::portal_unreachable(&url, e))?;

        let bootstrap_cookies = collect_set_cookies(res.headers());
        let html = res
            .text()
            .await
            .map_err(|e| AppError::portal_unreachable(&url, e))?;

        let mut ctx = parse_login_page(&html)?;
        ctx.bootstrap_cookies = bootstrap_cookies;
        debug!(
            "登录页解析完成，验证码控件 {}，引导 Cookie {} 条",
            ctx.captcha_id,
            ctx.bootstrap_cookies.len()
        );
        Ok(ctx)
    }

    /// 获取验证码挑战参数（sp 起点 + hs 目标摘要）
    ///
    /// 必须带上引导 Cookie 和抓页时拿到的 vcid；
    /// 此处生成的时间戳会存进挑战里，取图时原样复用。
    pub async fn fetch_challenge_parameters(
        &self,
        ctx: &LoginPageContext,
    ) -> AppResult<CaptchaChallenge> {
        let issued_at = chrono::Utc::now().timestamp_millis();
        let url = format!(
            "{}?get=p&c={}&t={}&d={}",
            self.captcha_url(),
            ctx.captcha_id,
            ctx.vcid,
            issued_at
        );
        debug!("获取挑战参数: {}", url);

        let res = self
            .http
            .get(&url)
            .header(COOKIE, bootstrap_cookie_header(ctx))
            .send()
            .await
            .map_err(|e| challenge_unavailable(format!("请求失败: {}", e)))?;

        if !res.status().is_success() {
            return Err(challenge_unavailable(format!("状态码 {}", res.status())));
        }

        let payload = res
            .text()
            .await
            .map_err(|e| challenge_unavailable(format!("读取响应失败: {}", e)))?;

        let (seed, target_digest) = parse_challenge_payload(&payload)?;
        Ok(CaptchaChallenge {
            seed,
            target_digest,
            challenge_id: ctx.vcid.clone(),
            issued_at_millis: issued_at,
        })
    }

    /// 获取验证码图片
    ///
    /// `t`/`d` 必须与挑战参数请求完全一致，否则门户返回
    /// 错配或过期的图片。
    pub async fn fetch_challenge_image(
        &self,
        ctx: &LoginPageContext,
        challenge: &CaptchaChallenge,
    ) -> AppResult<Vec<u8>> {
        let url = format!(
            "{}?get=image&c={}&t={}&d={}",
            self.captcha_url(),
            ctx.captcha_id,
            challenge.challenge_id,
            challenge.issued_at_millis
        );
        debug!("获取验证码图片: {}", url);

        let res = self
            .http
            .get(&url)
            .header(COOKIE, bootstrap_cookie_header(ctx))
            .send()
            .await
            .map_err(|e| image_unavailable(format!("请求失败: {}", e)))?;

        if !res.status().is_success() {
            return Err(image_unavailable(format!("状态码 {}", res.status())));
        }

        let bytes = res
            .bytes()
            .await
            .map_err(|e| image_unavailable(format!("读取图片失败: {}", e)))?;
        if bytes.is_empty() {
            return Err(image_unavailable("图片为空".to_string()));
        }
        Ok(bytes.to_vec())
    }

    /// 提交登录表单
    ///
    /// 返回原始响应（状态码、全部 Set-Cookie、Location、响应体），
    /// 成败判定交给上层。
    pub async fn submit_login(
        &self,
        ctx: &LoginPageContext,
        converted_captcha: &str,
        credentials: &Credentials,
    ) -> AppResult<SubmitResponse> {
        let url = self.login_url();
        let vcid_field = format!("{}{}", VCID_FIELD_PREFIX, ctx.captcha_id);

        let form: Vec<(&str, &str)> = vec![
            ("__EVENTTARGET", ""),
            ("__EVENTARGUMENT", ""),
            ("__VIEWSTATE", ctx.view_state.as_str()),
            ("__VIEWSTATEGENERATOR", ctx.view_state_generator.as_str()),
            ("__EVENTVALIDATION", ctx.event_validation.as_str()),
            ("__SCROLLPOSITIONX", ctx.scroll_position_x.as_str()),
            ("__SCROLLPOSITIONY", ctx.scroll_position_y.as_str()),
            (vcid_field.as_str(), ctx.vcid.as_str()),
            ("txtUserName", credentials.username.as_str()),
            ("txtPassword", credentials.password.as_str()),
            ("txtVerifyCode", converted_captcha),
            ("btnLogin", "登录"),
        ];

        debug!("提交登录表单: {}", url);
        let res = self
            .http
            .post(&url)
            .header(COOKIE, bootstrap_cookie_header(ctx))
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                AppError::Portal(PortalError::SubmitFailed {
                    source: Box::new(e),
                })
            })?;

        let status = res.status().as_u16();
        let set_cookies = collect_set_cookies(res.headers());
        let location = res
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = res.text().await.unwrap_or_default();

        Ok(SubmitResponse {
            status,
            set_cookies,
            location,
            body,
        })
    }
}

// ========== 解析辅助函数 ==========

fn challenge_unavailable(detail: String) -> AppError {
    AppError::Portal(PortalError::ChallengeUnavailable { detail })
}

fn image_unavailable(detail: String) -> AppError {
    AppError::Portal(PortalError::ImageUnavailable { detail })
}

/// 把引导 Cookie 片段拼成请求用的 Cookie 头
fn bootstrap_cookie_header(ctx: &LoginPageContext) -> String {
    ctx.bootstrap_cookies
        .iter()
        .filter_map(|fragment| parse_set_cookie(fragment))
        .map(|(n, v)| format!("{}={}", n, v))
        .collect::<Vec<_>>()
        .join("; ")
}

/// 收集响应头里的全部 Set-Cookie 原始值
fn collect_set_cookies(headers: &reqwest::header::HeaderMap) -> Vec<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// 按 id 提取隐藏字段的 value
fn extract_hidden_field(html: &str, field_id: &str) -> Option<String> {
    let pattern = format!(r#"id="{}"[^>]*value="([^"]*)""#, regex::escape(field_id));
    let re = Regex::new(&pattern).ok()?;
    re.captures(html)
        .and_then(|cap| cap.get(1).map(|m| m.as_str().to_string()))
}

/// 提取验证码实例 ID 隐藏字段（name = LBD_VCID_<控件ID>，value = vcid）
fn extract_vcid(html: &str) -> Option<(String, String)> {
    let re = Regex::new(r#"name="LBD_VCID_([^"]+)"[^>]*value="([^"]*)""#).ok()?;
    let cap = re.captures(html)?;
    Some((cap[1].to_string(), cap[2].to_string()))
}

/// 解析登录页 HTML
///
/// 必需字段缺一即 `MalformedPage`，滚动位置字段允许缺省。
fn parse_login_page(html: &str) -> AppResult<LoginPageContext> {
    let view_state = extract_hidden_field(html, "__VIEWSTATE")
        .ok_or_else(|| AppError::malformed_page("__VIEWSTATE"))?;
    let view_state_generator = extract_hidden_field(html, "__VIEWSTATEGENERATOR")
        .ok_or_else(|| AppError::malformed_page("__VIEWSTATEGENERATOR"))?;
    let event_validation = extract_hidden_field(html, "__EVENTVALIDATION")
        .ok_or_else(|| AppError::malformed_page("__EVENTVALIDATION"))?;
    let (captcha_id, vcid) =
        extract_vcid(html).ok_or_else(|| AppError::malformed_page(VCID_FIELD_PREFIX))?;

    Ok(LoginPageContext {
        view_state,
        view_state_generator,
        event_validation,
        scroll_position_x: extract_hidden_field(html, "__SCROLLPOSITIONX")
            .unwrap_or_else(|| "0".to_string()),
        scroll_position_y: extract_hidden_field(html, "__SCROLLPOSITIONY")
            .unwrap_or_else(|| "0".to_string()),
        captcha_id,
        vcid,
        bootstrap_cookies: Vec::new(),
    })
}

/// 解析挑战参数响应
///
/// 期望 JSON 里有 `sp`（搜索起点）和 `hs`（目标摘要）两个字段。
fn parse_challenge_payload(payload: &str) -> AppResult<(u64, String)> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| challenge_unavailable(format!("响应不是 JSON: {}", e)))?;

    let seed = value
        .get("sp")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| challenge_unavailable("缺少 sp 字段".to_string()))?;
    let target_digest = value
        .get("hs")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| challenge_unavailable("缺少 hs 字段".to_string()))?;

    Ok((seed, target_digest.to_string()))
}
