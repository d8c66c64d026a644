//! 登录流程中一次运行内使用的数据结构
//!
//! 这些结构都不跨运行存活：每轮登录重新抓取、用完即弃。

use std::fmt::Display;

/// 门户账号凭据
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// 登录页抓取结果
///
/// ASP.NET 式登录页的防伪隐藏字段 + 验证码控件标识 + 引导 Cookie。
/// 抓取后不可变，只被表单提交消费一次。
#[derive(Debug, Clone)]
pub struct LoginPageContext {
    /// __VIEWSTATE 隐藏字段
    pub view_state: String,
    /// __VIEWSTATEGENERATOR 隐藏字段
    pub view_state_generator: String,
    /// __EVENTVALIDATION 隐藏字段
    pub event_validation: String,
    /// __SCROLLPOSITIONX（缺省为 "0"）
    pub scroll_position_x: String,
    /// __SCROLLPOSITIONY（缺省为 "0"）
    pub scroll_position_y: String,
    /// 验证码控件 ID（挑战请求的 c= 参数）
    pub captcha_id: String,
    /// 本次会话的验证码实例 ID（LBD_VCID_* 隐藏字段的值）
    pub vcid: String,
    /// 登录页返回的 Set-Cookie 原始片段
    pub bootstrap_cookies: Vec<String>,
}

/// 服务器下发的验证码挑战
///
/// `target_digest` 是某个 ≥ seed 的整数与 `challenge_id`
/// 拼接后的 SHA-1 摘要，需要求解器暴力搜出这个整数。
#[derive(Debug, Clone)]
pub struct CaptchaChallenge {
    /// 搜索起点（payload 的 sp 字段）
    pub seed: u64,
    /// 目标摘要，小写十六进制（payload 的 hs 字段）
    pub target_digest: String,
    /// 参与摘要拼接的挑战标识
    pub challenge_id: String,
    /// 请求挑战时生成的时间戳，取图时必须原样复用
    pub issued_at_millis: i64,
}

impl Display for CaptchaChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digest_head: String = self.target_digest.chars().take(8).collect();
        write!(
            f,
            "[挑战 seed={} hs={}… t={}]",
            self.seed, digest_head, self.issued_at_millis
        )
    }
}

/// 表单提交的原始响应
///
/// 重定向被禁用，头部原样保留，供上层判定成败并提取 Cookie。
#[derive(Debug, Clone)]
pub struct SubmitResponse {
    /// HTTP 状态码
    pub status: u16,
    /// 所有 Set-Cookie 头的原始值
    pub set_cookies: Vec<String>,
    /// Location 头（存在即视为登录成功信号之一）
    pub location: Option<String>,
    /// 响应体
    pub body: String,
}

impl SubmitResponse {
    /// 状态码是否为重定向
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_redirect_statuses() {
        for status in [301u16, 302, 303, 307, 308] {
            let resp = SubmitResponse {
                status,
                set_cookies: vec![],
                location: None,
                body: String::new(),
            };
            assert!(resp.is_redirect(), "{} 应视为重定向", status);
        }
        let resp = SubmitResponse {
            status: 200,
            set_cookies: vec![],
            location: None,
            body: String::new(),
        };
        assert!(!resp.is_redirect());
    }
}
