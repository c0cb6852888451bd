// ==========================================
// 养殖场存栏核心 - 配置管理器
// ==========================================
// 职责: 从 config_kv 表加载配置覆写，合成 FarmCoreConfig
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::core_config::FarmCoreConfig;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    pub const USE_MODULAR_SERVICES: &str = "livestock.use_modular_services";
    pub const USE_LEGACY_FALLBACK: &str = "livestock.use_legacy_fallback";
    pub const MIGRATION_BATCH_SIZE: &str = "livestock.migration_batch_size";
    pub const MORTALITY_WARNING_RATE: &str = "analytics.mortality_warning_rate";
    pub const MORTALITY_CRITICAL_RATE: &str = "analytics.mortality_critical_rate";
    pub const FCR_WARNING: &str = "analytics.fcr_warning";
    pub const EFFICIENCY_WARNING: &str = "analytics.efficiency_warning";
    pub const TARGET_FCR: &str = "analytics.target_fcr";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取全部 global 配置
    fn load_global_map(&self) -> RepositoryResult<HashMap<String, String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let mut stmt = conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global'")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// 合成核心配置: 默认值 + config_kv 覆写
    ///
    /// 解析失败的值保留默认并记录 warn，不中断启动
    pub fn load_core_config(&self) -> RepositoryResult<FarmCoreConfig> {
        let map = self.load_global_map()?;
        let mut cfg = FarmCoreConfig::default();

        override_bool(&map, config_keys::USE_MODULAR_SERVICES, &mut cfg.use_modular_services);
        override_bool(&map, config_keys::USE_LEGACY_FALLBACK, &mut cfg.use_legacy_fallback);
        override_parsed(&map, config_keys::MIGRATION_BATCH_SIZE, &mut cfg.migration_batch_size);

        let t = &mut cfg.thresholds;
        override_parsed(&map, config_keys::MORTALITY_WARNING_RATE, &mut t.mortality_warning_rate);
        override_parsed(&map, config_keys::MORTALITY_CRITICAL_RATE, &mut t.mortality_critical_rate);
        override_parsed(&map, config_keys::FCR_WARNING, &mut t.fcr_warning);
        override_parsed(&map, config_keys::EFFICIENCY_WARNING, &mut t.efficiency_warning);
        override_parsed(&map, config_keys::TARGET_FCR, &mut t.target_fcr);

        cfg.validate().map_err(RepositoryError::ValidationError)?;
        Ok(cfg)
    }
}

/// 解析布尔配置（兼容 1/0、true/false、yes/no、on/off）
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn override_bool(map: &HashMap<String, String>, key: &str, target: &mut bool) {
    if let Some(raw) = map.get(key) {
        match parse_bool(raw) {
            Some(v) => *target = v,
            None => tracing::warn!("配置值无法解析为布尔, 使用默认: key={}, value={}", key, raw),
        }
    }
}

fn override_parsed<T: std::str::FromStr + std::fmt::Debug>(
    map: &HashMap<String, String>,
    key: &str,
    target: &mut T,
) {
    if let Some(raw) = map.get(key) {
        match raw.trim().parse::<T>() {
            Ok(v) => *target = v,
            Err(_) => tracing::warn!(
                "配置值解析失败, 使用默认: key={}, value={}, default={:?}",
                key,
                raw,
                target
            ),
        }
    }
}
