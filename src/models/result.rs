//! 一轮自动化运行的终态结果

use crate::error::ErrorKind;
use crate::models::session::SessionState;

/// 自动化运行结果
///
/// 要么携带完整有效的会话，要么携带分类失败，不存在半成品。
#[derive(Debug, Clone)]
pub struct AutomationResult {
    pub success: bool,
    pub session: Option<SessionState>,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
}

impl AutomationResult {
    /// 成功结果
    pub fn ok(session: SessionState) -> Self {
        Self {
            success: true,
            session: Some(session),
            error_kind: None,
            error_message: None,
        }
    }

    /// 失败结果
    pub fn fail(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            session: None,
            error_kind: Some(kind),
            error_message: Some(message.into()),
        }
    }

    /// 取失败分类（成功时为 None）
    pub fn kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_partially_populated() {
        let ok = AutomationResult::ok(SessionState::new("u", 0));
        assert!(ok.success && ok.session.is_some());
        assert!(ok.error_kind.is_none() && ok.error_message.is_none());

        let fail = AutomationResult::fail(ErrorKind::SubmitFailed, "网络抖动");
        assert!(!fail.success && fail.session.is_none());
        assert!(fail.error_kind.is_some() && fail.error_message.is_some());
    }
}
