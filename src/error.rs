use std::fmt;

/// 登录自动化的统一失败分类
///
/// 每次自动化运行最终都会落到其中一个分类上，
/// 调用方据此区分"稍后重试"和"需要人工处理"。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 配置缺失或非法（不发起任何网络请求）
    ConfigInvalid,
    /// 教务门户无法访问（网络/超时）
    PortalUnreachable,
    /// 登录页缺少必需的隐藏字段
    MalformedPage,
    /// 验证码挑战参数获取失败
    ChallengeUnavailable,
    /// 验证码图片获取失败
    ImageUnavailable,
    /// 打码服务识别失败
    SolverFailed,
    /// 打码服务余额不足
    SolverLowBalance,
    /// 哈希谜题在迭代上限内未找到解
    PuzzleUnsolvable,
    /// 登录表单提交失败（网络层面）
    SubmitFailed,
    /// 门户拒绝了账号密码或验证码
    InvalidCredentialsOrCaptcha,
}

impl ErrorKind {
    /// 该失败是否值得整轮重跑
    ///
    /// 传输错误、页面结构错误、谜题超限和一般识别失败换一轮
    /// 新挑战后都可能成功；配置错误和余额不足重跑没有意义，
    /// 门户明确拒绝账号密码或验证码时必须交给人工处理。
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::ConfigInvalid
            | ErrorKind::SolverLowBalance
            | ErrorKind::InvalidCredentialsOrCaptcha => false,
            ErrorKind::PortalUnreachable
            | ErrorKind::MalformedPage
            | ErrorKind::ChallengeUnavailable
            | ErrorKind::ImageUnavailable
            | ErrorKind::SolverFailed
            | ErrorKind::PuzzleUnsolvable
            | ErrorKind::SubmitFailed => true,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::PortalUnreachable => "PortalUnreachable",
            ErrorKind::MalformedPage => "MalformedPage",
            ErrorKind::ChallengeUnavailable => "ChallengeUnavailable",
            ErrorKind::ImageUnavailable => "ImageUnavailable",
            ErrorKind::SolverFailed => "SolverFailed",
            ErrorKind::SolverLowBalance => "SolverLowBalance",
            ErrorKind::PuzzleUnsolvable => "PuzzleUnsolvable",
            ErrorKind::SubmitFailed => "SubmitFailed",
            ErrorKind::InvalidCredentialsOrCaptcha => "InvalidCredentialsOrCaptcha",
        };
        write!(f, "{}", name)
    }
}

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 门户页面/协议相关错误
    Portal(PortalError),
    /// 打码服务错误
    Captcha(crate::clients::captcha_client::CaptchaError),
    /// 谜题求解错误
    Puzzle(PuzzleError),
    /// 会话持久化错误
    Session(SessionError),
    /// 配置错误
    Config(ConfigError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Portal(e) => write!(f, "门户错误: {}", e),
            AppError::Captcha(e) => write!(f, "打码服务错误: {}", e),
            AppError::Puzzle(e) => write!(f, "谜题错误: {}", e),
            AppError::Session(e) => write!(f, "会话错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Portal(e) => Some(e),
            AppError::Captcha(e) => Some(e),
            AppError::Puzzle(e) => Some(e),
            AppError::Session(e) => Some(e),
            AppError::Config(e) => Some(e),
        }
    }
}

impl AppError {
    /// 映射到统一失败分类
    pub fn kind(&self) -> ErrorKind {
        use crate::clients::captcha_client::CaptchaError;
        match self {
            AppError::Portal(e) => match e {
                PortalError::Unreachable { .. } => ErrorKind::PortalUnreachable,
                PortalError::MalformedPage { .. } => ErrorKind::MalformedPage,
                PortalError::ChallengeUnavailable { .. } => ErrorKind::ChallengeUnavailable,
                PortalError::ImageUnavailable { .. } => ErrorKind::ImageUnavailable,
                PortalError::SubmitFailed { .. } => ErrorKind::SubmitFailed,
                PortalError::LoginRejected { .. } => ErrorKind::InvalidCredentialsOrCaptcha,
            },
            AppError::Captcha(e) => match e {
                CaptchaError::LowBalance { .. } => ErrorKind::SolverLowBalance,
                _ => ErrorKind::SolverFailed,
            },
            AppError::Puzzle(_) => ErrorKind::PuzzleUnsolvable,
            // 持久化失败不会终止运行，兜底归为配置类
            AppError::Session(_) | AppError::Config(_) => ErrorKind::ConfigInvalid,
        }
    }
}

/// 门户页面/协议相关错误
#[derive(Debug)]
pub enum PortalError {
    /// 门户无法访问（网络/超时）
    Unreachable {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 登录页缺少必需的隐藏字段
    MalformedPage {
        missing_field: String,
    },
    /// 挑战参数获取失败（非 2xx 或缺少 sp/hs 字段）
    ChallengeUnavailable {
        detail: String,
    },
    /// 验证码图片获取失败
    ImageUnavailable {
        detail: String,
    },
    /// 登录表单提交失败（网络层面）
    SubmitFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 门户拒绝了本次登录（账号密码或验证码错误）
    LoginRejected {
        detail: String,
    },
}

impl fmt::Display for PortalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortalError::Unreachable { url, source } => {
                write!(f, "门户无法访问 ({}): {}", url, source)
            }
            PortalError::MalformedPage { missing_field } => {
                write!(f, "登录页缺少隐藏字段: {}", missing_field)
            }
            PortalError::ChallengeUnavailable { detail } => {
                write!(f, "挑战参数获取失败: {}", detail)
            }
            PortalError::ImageUnavailable { detail } => {
                write!(f, "验证码图片获取失败: {}", detail)
            }
            PortalError::SubmitFailed { source } => {
                write!(f, "登录表单提交失败: {}", source)
            }
            PortalError::LoginRejected { detail } => {
                write!(f, "门户拒绝登录: {}", detail)
            }
        }
    }
}

impl std::error::Error for PortalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PortalError::Unreachable { source, .. } | PortalError::SubmitFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

/// 谜题求解错误
#[derive(Debug)]
pub enum PuzzleError {
    /// 在迭代上限内没有找到匹配目标摘要的整数
    CeilingExceeded {
        seed: u64,
        max_iterations: u64,
    },
    /// 后台搜索任务异常中断（panic/取消）
    SearchInterrupted {
        detail: String,
    },
}

impl fmt::Display for PuzzleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PuzzleError::CeilingExceeded {
                seed,
                max_iterations,
            } => {
                write!(
                    f,
                    "从 {} 起搜索 {} 次仍未命中目标摘要",
                    seed, max_iterations
                )
            }
            PuzzleError::SearchInterrupted { detail } => {
                write!(f, "谜题求解任务中断: {}", detail)
            }
        }
    }
}

impl std::error::Error for PuzzleError {}

/// 会话持久化错误
#[derive(Debug)]
pub enum SessionError {
    /// 读取会话文件失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入会话文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 会话记录反序列化失败
    RecordCorrupted {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::ReadFailed { path, source } => {
                write!(f, "读取会话文件失败 ({}): {}", path, source)
            }
            SessionError::WriteFailed { path, source } => {
                write!(f, "写入会话文件失败 ({}): {}", path, source)
            }
            SessionError::RecordCorrupted { path, source } => {
                write!(f, "会话记录损坏 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::ReadFailed { source, .. }
            | SessionError::WriteFailed { source, .. }
            | SessionError::RecordCorrupted { source, .. } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
        }
    }
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 必需的配置项为空
    MissingField {
        field_name: String,
    },
    /// 配置文件解析失败
    FileParseFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingField { field_name } => {
                write!(f, "必需的配置项 {} 为空", field_name)
            }
            ConfigError::FileParseFailed { path, source } => {
                write!(f, "配置文件解析失败 ({}): {}", path, source)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ========== 从常见错误类型转换 ==========
// 注意：不需要手动实现 From<AppError> for anyhow::Error，
// 因为 anyhow 已经为所有实现了 std::error::Error 的类型提供了自动实现

impl From<crate::clients::captcha_client::CaptchaError> for AppError {
    fn from(err: crate::clients::captcha_client::CaptchaError) -> Self {
        AppError::Captcha(err)
    }
}

impl From<PortalError> for AppError {
    fn from(err: PortalError) -> Self {
        AppError::Portal(err)
    }
}

impl From<PuzzleError> for AppError {
    fn from(err: PuzzleError) -> Self {
        AppError::Puzzle(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Session(SessionError::RecordCorrupted {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Session(SessionError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建门户不可达错误
    pub fn portal_unreachable(
        url: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Portal(PortalError::Unreachable {
            url: url.into(),
            source: Box::new(source),
        })
    }

    /// 创建登录页结构错误
    pub fn malformed_page(missing_field: impl Into<String>) -> Self {
        AppError::Portal(PortalError::MalformedPage {
            missing_field: missing_field.into(),
        })
    }

    /// 创建配置缺失错误
    pub fn missing_config(field_name: impl Into<String>) -> Self {
        AppError::Config(ConfigError::MissingField {
            field_name: field_name.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        let err = AppError::malformed_page("__VIEWSTATE");
        assert_eq!(err.kind(), ErrorKind::MalformedPage);

        let err = AppError::missing_config("username");
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let err = AppError::Puzzle(PuzzleError::CeilingExceeded {
            seed: 100,
            max_iterations: 1000,
        });
        assert_eq!(err.kind(), ErrorKind::PuzzleUnsolvable);

        let err = AppError::Puzzle(PuzzleError::SearchInterrupted {
            detail: "task cancelled".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::PuzzleUnsolvable);
        assert!(err.kind().is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(!ErrorKind::ConfigInvalid.is_retryable());
        assert!(!ErrorKind::SolverLowBalance.is_retryable());
        assert!(ErrorKind::PortalUnreachable.is_retryable());
        assert!(ErrorKind::PuzzleUnsolvable.is_retryable());
    }

    #[test]
    fn test_login_rejection_is_not_retryable() {
        let err = AppError::Portal(PortalError::LoginRejected {
            detail: "用户名或密码错误".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::InvalidCredentialsOrCaptcha);
        assert!(!err.kind().is_retryable());
    }

    #[test]
    fn test_display_contains_detail() {
        let err = AppError::malformed_page("__EVENTVALIDATION");
        assert!(err.to_string().contains("__EVENTVALIDATION"));
    }
}
