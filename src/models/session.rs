//! 会话状态与 Cookie 合并规则
//!
//! 会话是唯一跨运行存活的实体，由 SessionStore 独占持有。

use serde::{Deserialize, Serialize};

/// 认证后的会话状态
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// 有序 Cookie 集合，同名后写覆盖先写
    pub cookies: Vec<(String, String)>,
    /// 登录账号
    pub username: String,
    /// 创建时间（毫秒时间戳）
    pub created_at_millis: i64,
    /// 是否仍然有效
    pub valid: bool,
}

impl SessionState {
    pub fn new(username: impl Into<String>, created_at_millis: i64) -> Self {
        Self {
            cookies: Vec::new(),
            username: username.into(),
            created_at_millis,
            valid: true,
        }
    }

    /// 把一批 Set-Cookie 原始片段合并进来
    ///
    /// 同名 Cookie 就地替换（保持原有顺序），新名字追加到末尾。
    /// 重复合并同一批片段不会改变结果。
    pub fn merge_set_cookies(&mut self, fragments: &[String]) {
        for fragment in fragments {
            if let Some((name, value)) = parse_set_cookie(fragment) {
                match self.cookies.iter_mut().find(|(n, _)| *n == name) {
                    Some(entry) => entry.1 = value,
                    None => self.cookies.push((name, value)),
                }
            }
        }
    }

    /// 序列化成请求用的 Cookie 头
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(n, v)| format!("{}={}", n, v))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// 会话年龄（毫秒）
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis - self.created_at_millis
    }
}

/// 从 Set-Cookie 原始值中取出 name=value 对
///
/// 只保留第一个分号之前的部分，Path/Expires 等属性丢弃。
pub fn parse_set_cookie(fragment: &str) -> Option<(String, String)> {
    let pair = fragment.split(';').next()?.trim();
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// 磁盘上的会话记录
///
/// 字段名保持与既有记录格式兼容；读取方必须把缺少
/// `loginSuccess=true` 或 `cookies` 的记录当作不存在。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// 创建时间（毫秒时间戳）
    pub timestamp: i64,
    /// 登录账号
    pub username: String,
    /// 序列化后的 Cookie 字符串
    pub cookies: Option<String>,
    /// 有序 Cookie 列表（name=value 形式）
    #[serde(rename = "cookieArray", default)]
    pub cookie_array: Vec<String>,
    /// 登录是否成功
    #[serde(rename = "loginSuccess", default)]
    pub login_success: bool,
}

impl SessionRecord {
    /// 从内存会话生成持久化记录
    pub fn from_state(state: &SessionState) -> Self {
        Self {
            timestamp: state.created_at_millis,
            username: state.username.clone(),
            cookies: Some(state.cookie_header()),
            cookie_array: state
                .cookies
                .iter()
                .map(|(n, v)| format!("{}={}", n, v))
                .collect(),
            login_success: true,
        }
    }

    /// 还原成内存会话
    ///
    /// 记录不完整（未标记成功、缺 cookies 字段）时返回 None。
    pub fn into_state(self) -> Option<SessionState> {
        if !self.login_success {
            return None;
        }
        self.cookies.as_ref()?;
        let mut state = SessionState::new(self.username, self.timestamp);
        for pair in &self.cookie_array {
            if let Some((name, value)) = pair.split_once('=') {
                state
                    .cookies
                    .push((name.trim().to_string(), value.trim().to_string()));
            }
        }
        // 旧记录可能只有 cookies 字符串没有数组
        if state.cookies.is_empty() {
            if let Some(cookies) = &self.cookies {
                for pair in cookies.split(';') {
                    if let Some((name, value)) = pair.split_once('=') {
                        state
                            .cookies
                            .push((name.trim().to_string(), value.trim().to_string()));
                    }
                }
            }
        }
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_cookie_strips_attributes() {
        let parsed = parse_set_cookie("ASP.NET_SessionId=abc123; path=/; HttpOnly");
        assert_eq!(
            parsed,
            Some(("ASP.NET_SessionId".to_string(), "abc123".to_string()))
        );
    }

    #[test]
    fn test_parse_set_cookie_rejects_garbage() {
        assert_eq!(parse_set_cookie("no-equals-sign"), None);
        assert_eq!(parse_set_cookie("=value-without-name"), None);
    }

    #[test]
    fn test_merge_same_name_replaces() {
        let mut state = SessionState::new("2021123456", 0);
        state.merge_set_cookies(&["sid=old; path=/".to_string()]);
        state.merge_set_cookies(&["sid=new; path=/".to_string()]);
        assert_eq!(state.cookies, vec![("sid".to_string(), "new".to_string())]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let fragments = vec![
            "sid=abc; HttpOnly".to_string(),
            "route=node1".to_string(),
        ];
        let mut once = SessionState::new("u", 0);
        once.merge_set_cookies(&fragments);
        let mut twice = once.clone();
        twice.merge_set_cookies(&fragments);
        assert_eq!(once.cookies, twice.cookies);
    }

    #[test]
    fn test_merge_preserves_order() {
        let mut state = SessionState::new("u", 0);
        state.merge_set_cookies(&[
            "a=1".to_string(),
            "b=2".to_string(),
            "a=3".to_string(),
        ]);
        assert_eq!(state.cookie_header(), "a=3; b=2");
    }

    #[test]
    fn test_record_roundtrip() {
        let mut state = SessionState::new("2021123456", 1_700_000_000_000);
        state.merge_set_cookies(&["sid=abc".to_string(), "route=n1".to_string()]);

        let record = SessionRecord::from_state(&state);
        let restored = record.into_state().expect("完整记录应能还原");
        assert_eq!(restored.cookies, state.cookies);
        assert_eq!(restored.username, state.username);
        assert_eq!(restored.created_at_millis, state.created_at_millis);
    }

    #[test]
    fn test_record_without_login_success_is_absent() {
        let record = SessionRecord {
            timestamp: 0,
            username: "u".to_string(),
            cookies: Some("sid=abc".to_string()),
            cookie_array: vec!["sid=abc".to_string()],
            login_success: false,
        };
        assert!(record.into_state().is_none());
    }

    #[test]
    fn test_record_without_cookies_is_absent() {
        let record = SessionRecord {
            timestamp: 0,
            username: "u".to_string(),
            cookies: None,
            cookie_array: vec![],
            login_success: true,
        };
        assert!(record.into_state().is_none());
    }

    #[test]
    fn test_record_json_field_names() {
        let mut state = SessionState::new("u", 42);
        state.merge_set_cookies(&["sid=abc".to_string()]);
        let json = serde_json::to_value(SessionRecord::from_state(&state)).unwrap();
        assert!(json.get("loginSuccess").is_some());
        assert!(json.get("cookieArray").is_some());
        assert_eq!(json["timestamp"], 42);
    }
}
