//! LLM 响应缓存
//!
//! 磁盘缓存：每个 key 一个 JSON 文件，key 为请求指纹（messages + model 的 SHA-256）。
//! 读取/解析失败一律视为 miss；并发写入 last-writer-wins。缓存是纯优化，禁用只影响延迟与成本。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::llm::ChatRequest;

/// 默认 TTL：1 小时
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// 磁盘上的缓存条目：写入时间戳 + 模型文本
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    stored_at: i64,
    text: String,
}

/// 计算请求指纹：对 (messages, model) 的稳定 JSON 序列化取 SHA-256
pub fn fingerprint(request: &ChatRequest) -> String {
    let key_data = serde_json::json!({
        "messages": request.messages,
        "model": request.model,
    });
    // serde_json 对 struct 字段按声明序输出，序列化结果稳定
    let key_string = key_data.to_string();
    let mut hasher = Sha256::new();
    hasher.update(key_string.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 响应缓存：绑定目录与 TTL，可整体禁用
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
    enabled: bool,
}

impl ResponseCache {
    pub fn new(dir: impl AsRef<Path>, ttl: Duration, enabled: bool) -> Self {
        let dir = dir.as_ref().to_path_buf();
        if enabled {
            let _ = std::fs::create_dir_all(&dir);
        }
        Self { dir, ttl, enabled }
    }

    /// 便捷构造：默认 TTL，启用
    pub fn with_default_ttl(dir: impl AsRef<Path>) -> Self {
        Self::new(dir, Duration::from_secs(DEFAULT_TTL_SECS), true)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// 查询缓存；任何 IO/解析/过期问题都返回 None
    pub fn get(&self, key: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        let raw = std::fs::read_to_string(self.entry_path(key)).ok()?;
        let entry: CacheEntry = serde_json::from_str(&raw).ok()?;
        let age = chrono::Utc::now().timestamp() - entry.stored_at;
        if age < 0 || age as u64 >= self.ttl.as_secs() {
            return None;
        }
        Some(entry.text)
    }

    /// 写入缓存；写失败静默忽略（缓存不得影响主流程）
    pub fn put(&self, key: &str, text: &str) {
        if !self.enabled {
            return;
        }
        let entry = CacheEntry {
            stored_at: chrono::Utc::now().timestamp(),
            text: text.to_string(),
        };
        if let Ok(json) = serde_json::to_string(&entry) {
            let _ = std::fs::write(self.entry_path(key), json);
        }
    }

    /// 清空全部缓存条目
    pub fn clear(&self) {
        if let Ok(entries) = std::fs::read_dir(&self.dir) {
            for e in entries.flatten() {
                let _ = std::fs::remove_file(e.path());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;

    fn request(text: &str, model: &str) -> ChatRequest {
        ChatRequest::new(vec![Message::user(text)], model)
    }

    #[test]
    fn test_fingerprint_stable_and_distinct() {
        let a = fingerprint(&request("hello", "m1"));
        let b = fingerprint(&request("hello", "m1"));
        let c = fingerprint(&request("hello", "m2"));
        let d = fingerprint(&request("world", "m1"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_cache_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::with_default_ttl(dir.path());
        let key = fingerprint(&request("q", "m"));

        assert!(cache.get(&key).is_none());
        cache.put(&key, "answer");
        assert_eq!(cache.get(&key).as_deref(), Some("answer"));
    }

    #[test]
    fn test_cache_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path(), Duration::from_secs(0), true);
        let key = fingerprint(&request("q", "m"));

        cache.put(&key, "answer");
        // TTL 0：写入后立即过期
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_disabled_cache_never_hits() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path(), Duration::from_secs(3600), false);
        let key = fingerprint(&request("q", "m"));

        cache.put(&key, "answer");
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_corrupt_entry_is_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::with_default_ttl(dir.path());
        let key = fingerprint(&request("q", "m"));

        std::fs::write(dir.path().join(format!("{}.json", key)), "not json").unwrap();
        assert!(cache.get(&key).is_none());
    }
}
