//! 会话持久化 - 业务能力层
//!
//! 只负责会话的存、取、清三件事，不关心登录流程。
//! 持久化失败不往上抛：登录只要拿到内存会话就算成功，
//! 这个进程的生命周期内会话降级为仅存内存。

use std::fs;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::session::{SessionRecord, SessionState};

/// 会话有效期：30 分钟
pub const SESSION_TTL_MILLIS: i64 = 30 * 60 * 1000;

/// 会话存储
///
/// 每个部署实例最多物化一份会话。合并与落盘在同一把锁内完成，
/// 读取方看不到合并到一半的 Cookie 集。
pub struct SessionStore {
    /// 会话文件路径
    path: String,
    /// 是否落盘（false 时仅存内存）
    persist: bool,
    /// 进程内的唯一会话副本
    state: Mutex<Option<SessionState>>,
}

impl SessionStore {
    pub fn new(path: impl Into<String>, persist: bool) -> Self {
        Self {
            path: path.into(),
            persist,
            state: Mutex::new(None),
        }
    }

    /// 保存会话
    ///
    /// 新 Cookie 合并进已有会话（同名替换），盖上当前时间戳并标记有效。
    /// 写盘失败只记日志，不影响调用方拿到的内存会话。
    pub async fn save(&self, fresh: SessionState) -> SessionState {
        let mut guard = self.state.lock().await;

        let mut merged = match guard.take() {
            Some(mut existing) if existing.username == fresh.username => {
                let fragments: Vec<String> = fresh
                    .cookies
                    .iter()
                    .map(|(n, v)| format!("{}={}", n, v))
                    .collect();
                existing.merge_set_cookies(&fragments);
                existing
            }
            _ => fresh,
        };
        merged.created_at_millis = now_millis();
        merged.valid = true;

        if self.persist {
            let record = SessionRecord::from_state(&merged);
            if let Err(e) = self.write_record(&record) {
                warn!("⚠️ 会话写盘失败，本进程内降级为仅存内存: {}", e);
            } else {
                debug!("会话已写入 {}", self.path);
            }
        }

        *guard = Some(merged.clone());
        merged
    }

    /// 读取会话
    ///
    /// 超过 30 分钟的会话视为过期：删除磁盘记录并返回 None，
    /// 绝不把陈旧会话交给调用方。
    pub async fn load(&self) -> Option<SessionState> {
        let mut guard = self.state.lock().await;
        let now = now_millis();

        if let Some(state) = guard.as_ref() {
            if state.valid && state.age_millis(now) <= SESSION_TTL_MILLIS {
                return Some(state.clone());
            }
            // 内存副本已过期/失效，连同磁盘记录一起清掉
            *guard = None;
            self.delete_record();
        }

        if !self.persist {
            return None;
        }

        let state = self.read_record()?;
        if state.age_millis(now) > SESSION_TTL_MILLIS {
            info!("💾 磁盘会话已超过 30 分钟，删除并视为不存在");
            self.delete_record();
            return None;
        }

        *guard = Some(state.clone());
        Some(state)
    }

    /// 清除会话（内存副本和磁盘记录一起作废）
    pub async fn clear(&self) {
        let mut guard = self.state.lock().await;
        *guard = None;
        self.delete_record();
        debug!("会话已清除");
    }

    /// 将内存中的会话标记为失效（受保护请求被门户拒绝时调用）
    pub async fn invalidate(&self) {
        let mut guard = self.state.lock().await;
        if let Some(state) = guard.as_mut() {
            state.valid = false;
        }
        self.delete_record();
    }

    // ========== 磁盘读写 ==========

    fn write_record(&self, record: &SessionRecord) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&self.path, json)
    }

    fn read_record(&self) -> Option<SessionState> {
        let content = fs::read_to_string(&self.path).ok()?;
        let record: SessionRecord = match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!("⚠️ 会话记录损坏 ({}): {}，按不存在处理", self.path, e);
                self.delete_record();
                return None;
            }
        };
        record.into_state()
    }

    fn delete_record(&self) {
        if self.persist {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(dir: &tempfile::TempDir) -> SessionStore {
        let path = dir.path().join("session.json");
        SessionStore::new(path.to_string_lossy().to_string(), true)
    }

    fn state_with_cookies(pairs: &[(&str, &str)]) -> SessionState {
        let mut state = SessionState::new("2021123456", now_millis());
        for (n, v) in pairs {
            state.cookies.push((n.to_string(), v.to_string()));
        }
        state
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);

        let saved = store
            .save(state_with_cookies(&[("sid", "abc"), ("route", "n1")]))
            .await;
        let loaded = store.load().await.expect("刚保存的会话应能读回");

        assert_eq!(loaded.cookies, saved.cookies);
        assert_eq!(loaded.username, "2021123456");
        assert!(loaded.valid);
    }

    #[tokio::test]
    async fn test_save_merges_same_name_cookies() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);

        store.save(state_with_cookies(&[("sid", "old")])).await;
        let merged = store
            .save(state_with_cookies(&[("sid", "new"), ("extra", "1")]))
            .await;

        assert_eq!(
            merged.cookies,
            vec![
                ("sid".to_string(), "new".to_string()),
                ("extra".to_string(), "1".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_expired_record_is_deleted_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        // 直接写一条 31 分钟前的记录
        let mut state = state_with_cookies(&[("sid", "stale")]);
        state.created_at_millis = now_millis() - SESSION_TTL_MILLIS - 60_000;
        let record = SessionRecord::from_state(&state);
        fs::write(&path, serde_json::to_string(&record).unwrap()).unwrap();

        let store = SessionStore::new(path.to_string_lossy().to_string(), true);
        assert!(store.load().await.is_none());
        assert!(!path.exists(), "过期记录应被删除");
    }

    #[tokio::test]
    async fn test_record_without_login_success_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(
            &path,
            r#"{"timestamp": 9999999999999, "username": "u", "cookies": "sid=abc", "cookieArray": ["sid=abc"], "loginSuccess": false}"#,
        )
        .unwrap();

        let store = SessionStore::new(path.to_string_lossy().to_string(), true);
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_corrupted_record_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not-json{{{").unwrap();

        let store = SessionStore::new(path.to_string_lossy().to_string(), true);
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = SessionStore::new(path.to_string_lossy().to_string(), true);

        store.save(state_with_cookies(&[("sid", "abc")])).await;
        assert!(path.exists());

        store.clear().await;
        assert!(store.load().await.is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_memory_only_mode_never_touches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = SessionStore::new(path.to_string_lossy().to_string(), false);

        store.save(state_with_cookies(&[("sid", "abc")])).await;
        assert!(!path.exists(), "persist=false 时不应写盘");
        // 内存副本仍然可用
        assert!(store.load().await.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_voids_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir);

        store.save(state_with_cookies(&[("sid", "abc")])).await;
        store.invalidate().await;
        assert!(store.load().await.is_none());
    }
}
