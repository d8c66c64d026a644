//! 打码服务客户端
//!
//! 外部识别服务是个黑盒：图片进、文本出。
//! 返回的文本此时大小写没有意义，大小写由谜题掩码另行恢复。

use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;

/// 打码服务错误
#[derive(Debug, thiserror::Error)]
pub enum CaptchaError {
    #[error("账户余额不足: {detail}")]
    LowBalance { detail: String },
    #[error("识别失败: {0}")]
    SolveFailed(String),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error("打码服务返回异常状态: {0}: {1}")]
    UnexpectedStatus(reqwest::StatusCode, String),
}

/// 服务端标记余额不足的错误码
const ERROR_CODE_LOW_BALANCE: &str = "ERROR_BALANCE";

#[derive(Debug, Deserialize)]
struct SolveResponse {
    success: bool,
    text: Option<String>,
    error: Option<String>,
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: f64,
}

/// 打码服务客户端
pub struct CaptchaClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl CaptchaClient {
    /// 创建新的打码客户端
    pub fn new(config: &Config) -> Result<Self, CaptchaError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.captcha_api_base_url.clone(),
            api_key: config.captcha_api_key.clone(),
        })
    }

    /// 识别验证码图片
    ///
    /// # 参数
    /// - `image`: 图片原始字节
    /// - `case_sensitive`: 告知服务端答案是否区分大小写
    ///
    /// # 返回
    /// 返回识别出的文本
    pub async fn solve_image(
        &self,
        image: &[u8],
        case_sensitive: bool,
    ) -> Result<String, CaptchaError> {
        let url = format!("{}/api/solve", self.base_url);
        debug!("提交验证码图片，{} 字节", image.len());

        let res = self
            .http
            .post(url)
            .header("Accept", "application/json")
            .json(&serde_json::json!({
                "apiKey": self.api_key,
                "image": general_purpose::STANDARD.encode(image),
                "caseSensitive": case_sensitive,
            }))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CaptchaError::UnexpectedStatus(status, body));
        }

        let payload: SolveResponse = res.json().await?;
        if !payload.success {
            let detail = payload.error.unwrap_or_else(|| "未知原因".to_string());
            if payload.error_code.as_deref() == Some(ERROR_CODE_LOW_BALANCE) {
                return Err(CaptchaError::LowBalance { detail });
            }
            return Err(CaptchaError::SolveFailed(detail));
        }

        payload
            .text
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| CaptchaError::SolveFailed("返回文本为空".to_string()))
    }

    /// 查询账户余额
    pub async fn balance(&self) -> Result<f64, CaptchaError> {
        let url = format!("{}/api/balance", self.base_url);

        let res = self
            .http
            .post(url)
            .header("Accept", "application/json")
            .json(&serde_json::json!({ "apiKey": self.api_key }))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CaptchaError::UnexpectedStatus(status, body));
        }

        let payload: BalanceResponse = res.json().await?;
        Ok(payload.balance)
    }
}
