// ==========================================
// 农业作业管理系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::domain::types::LotSelectionPolicy;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

/// 搜索结果条数上限的兜底值
pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// 搜索结果条数上限的硬上限
pub const MAX_SEARCH_LIMIT: usize = 200;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at)
             VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    // ===== 台账配置 =====

    /// 批次选择策略（默认 FEFO；无法识别的值回退默认并告警）
    pub fn get_lot_selection_policy(&self) -> Result<LotSelectionPolicy, Box<dyn Error>> {
        let raw = match self.get_config_value(config_keys::LOT_SELECTION_POLICY)? {
            Some(v) => v,
            None => return Ok(LotSelectionPolicy::default()),
        };
        match LotSelectionPolicy::from_str(&raw) {
            Some(policy) => Ok(policy),
            None => {
                tracing::warn!(value = %raw, "无法识别的批次选择策略，使用默认 FEFO");
                Ok(LotSelectionPolicy::default())
            }
        }
    }

    /// 是否允许使用过期批次（默认 false）
    pub fn get_allow_expired_lots(&self) -> Result<bool, Box<dyn Error>> {
        let raw = self.get_config_value(config_keys::ALLOW_EXPIRED_LOTS)?;
        Ok(raw
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false))
    }

    /// 产品搜索条数上限（默认 20，限制在 1..=200）
    pub fn get_search_limit(&self) -> Result<usize, Box<dyn Error>> {
        let raw = self.get_config_value(config_keys::SEARCH_LIMIT)?;
        let limit = raw
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_SEARCH_LIMIT);
        Ok(limit.clamp(1, MAX_SEARCH_LIMIT))
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    ///
    /// # 注意
    /// - 覆盖现有同名 global 配置；快照中没有的键保持不变
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> Result<usize, Box<dyn Error>> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            if key.starts_with("__meta_") {
                continue;
            }
            let affected = tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
            count += affected;
        }

        tx.commit()?;
        Ok(count)
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 台账
    pub const LOT_SELECTION_POLICY: &str = "ledger.lot_selection_policy";
    pub const ALLOW_EXPIRED_LOTS: &str = "ledger.allow_expired_lots";
    pub const SEARCH_LIMIT: &str = "ledger.search_limit";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cfg = setup();
        assert_eq!(cfg.get_lot_selection_policy().unwrap(), LotSelectionPolicy::Fefo);
        assert!(!cfg.get_allow_expired_lots().unwrap());
        assert_eq!(cfg.get_search_limit().unwrap(), DEFAULT_SEARCH_LIMIT);
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let cfg = setup();
        cfg.set_global_config_value(config_keys::LOT_SELECTION_POLICY, "fifo").unwrap();
        cfg.set_global_config_value(config_keys::ALLOW_EXPIRED_LOTS, "true").unwrap();
        cfg.set_global_config_value(config_keys::SEARCH_LIMIT, "5000").unwrap();
        assert_eq!(cfg.get_lot_selection_policy().unwrap(), LotSelectionPolicy::Fifo);
        assert!(cfg.get_allow_expired_lots().unwrap());
        assert_eq!(cfg.get_search_limit().unwrap(), MAX_SEARCH_LIMIT);

        cfg.set_global_config_value(config_keys::LOT_SELECTION_POLICY, "LIFO").unwrap();
        assert_eq!(cfg.get_lot_selection_policy().unwrap(), LotSelectionPolicy::Fefo);
    }

    #[test]
    fn test_snapshot_restore() {
        let cfg = setup();
        cfg.set_global_config_value(config_keys::SEARCH_LIMIT, "7").unwrap();
        let snapshot = cfg.get_config_snapshot().unwrap();

        cfg.set_global_config_value(config_keys::SEARCH_LIMIT, "50").unwrap();
        let restored = cfg.restore_config_from_snapshot(&snapshot).unwrap();
        assert_eq!(restored, 1);
        assert_eq!(cfg.get_search_limit().unwrap(), 7);
    }
}
