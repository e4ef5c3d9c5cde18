//! # METADATA 键值存储
//!
//! 计算目录中的 `METADATA` 为 JSON 对象，保存 uuid、创建时间、
//! 推荐内存 (`recommended.memory`)、NEB 端点能量等。
//! 键对生命周期逻辑不透明，只按需读写。

use crate::error::{JaspError, Result};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

pub const METADATA_FILE: &str = "METADATA";

/// METADATA 内容
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: Map<String, Value>,
}

impl Metadata {
    /// 读取目录中的 METADATA；不存在时返回空
    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(METADATA_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path).map_err(|e| JaspError::read(&path, e))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(entries) => Ok(Metadata { entries }),
            _ => Err(JaspError::parse("METADATA", &path, "expected a JSON object")),
        }
    }

    /// 写出 METADATA
    pub fn write(&self, dir: &Path) -> Result<()> {
        let path = dir.join(METADATA_FILE);
        let text = serde_json::to_string_pretty(&Value::Object(self.entries.clone()))?;
        fs::write(&path, text).map_err(|e| JaspError::write(&path, e))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.entries.get(key).and_then(Value::as_f64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.entries.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 计算的唯一标识
    pub fn uuid(&self) -> Option<&str> {
        self.get_str("uuid")
    }

    /// 首次准备输入时写入 uuid 与创建时间；已有则保留
    pub fn ensure_identity(&mut self) {
        if self.uuid().is_none() {
            self.set("uuid", uuid::Uuid::new_v4().to_string());
        }
        if self.get("ctime").is_none() {
            self.set("ctime", chrono::Local::now().to_rfc3339());
        }
    }

    /// 克隆后的目录获得新 uuid，并记录来源
    pub fn mark_cloned(&mut self, source: &Path) {
        if let Some(old) = self.uuid().map(str::to_string) {
            self.set("cloned from uuid", old);
        }
        self.set("uuid", uuid::Uuid::new_v4().to_string());
        self.set("cloned from", source.display().to_string());
        self.set("cloned on", chrono::Local::now().to_rfc3339());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Metadata::read(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_identity_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let mut meta = Metadata::default();
        meta.ensure_identity();
        meta.set("recommended.memory", 1.25);
        meta.write(dir.path()).unwrap();

        let mut back = Metadata::read(dir.path()).unwrap();
        let id = back.uuid().map(str::to_string);
        back.ensure_identity();
        assert_eq!(back.uuid().map(str::to_string), id);
        assert_eq!(back.get_f64("recommended.memory"), Some(1.25));
    }

    #[test]
    fn test_clone_gets_new_uuid() {
        let mut meta = Metadata::default();
        meta.ensure_identity();
        let old = meta.uuid().map(str::to_string);
        meta.mark_cloned(Path::new("/tmp/src"));
        assert_ne!(meta.uuid().map(str::to_string), old);
        assert_eq!(meta.get_str("cloned from uuid").map(str::to_string), old);
    }

    #[test]
    fn test_non_object_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(METADATA_FILE), "[1, 2]").unwrap();
        assert!(Metadata::read(dir.path()).is_err());
    }
}
