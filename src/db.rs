// ==========================================
// 养殖场存栏核心 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 统一建表脚本，命令行与测试共用同一份 schema
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::time::Duration;

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "FARM_LIVESTOCK_DB_PATH";

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 建表脚本（幂等，全部使用 IF NOT EXISTS）
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS livestock (
    id TEXT PRIMARY KEY,
    farm_id TEXT NOT NULL,
    coop_id TEXT NOT NULL,
    name TEXT NOT NULL,
    initial_quantity INTEGER NOT NULL DEFAULT 0 CHECK (initial_quantity >= 0),
    quantity_depletion INTEGER NOT NULL DEFAULT 0 CHECK (quantity_depletion >= 0),
    quantity_sales INTEGER NOT NULL DEFAULT 0 CHECK (quantity_sales >= 0),
    quantity_mutated INTEGER NOT NULL DEFAULT 0 CHECK (quantity_mutated >= 0),
    start_date TEXT NOT NULL,
    closed_at TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    deleted_at TEXT,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS current_livestock (
    livestock_id TEXT PRIMARY KEY REFERENCES livestock(id),
    farm_id TEXT NOT NULL,
    coop_id TEXT NOT NULL,
    quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
    metadata TEXT,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS livestock_depletion (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    livestock_id TEXT NOT NULL REFERENCES livestock(id),
    depletion_date TEXT NOT NULL,
    jenis TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    metadata TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX IF NOT EXISTS idx_depletion_livestock_date
    ON livestock_depletion (livestock_id, depletion_date);

CREATE TABLE IF NOT EXISTS livestock_sale (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    livestock_id TEXT NOT NULL REFERENCES livestock(id),
    sale_date TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity >= 0),
    revenue REAL NOT NULL DEFAULT 0.0
);

CREATE TABLE IF NOT EXISTS livestock_mutation (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    livestock_id TEXT NOT NULL REFERENCES livestock(id),
    mutation_date TEXT NOT NULL,
    quantity INTEGER NOT NULL CHECK (quantity >= 0)
);

CREATE TABLE IF NOT EXISTS feed_usage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    livestock_id TEXT NOT NULL REFERENCES livestock(id),
    usage_date TEXT NOT NULL,
    quantity_kg REAL NOT NULL DEFAULT 0.0
);

CREATE TABLE IF NOT EXISTS livestock_recording (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    livestock_id TEXT NOT NULL REFERENCES livestock(id),
    recording_date TEXT NOT NULL,
    weight_gain_kg REAL NOT NULL DEFAULT 0.0
);

CREATE TABLE IF NOT EXISTS quantity_recalc_log (
    id TEXT PRIMARY KEY,
    livestock_id TEXT NOT NULL REFERENCES livestock(id),
    previous_quantity INTEGER,
    new_quantity INTEGER NOT NULL,
    previous_depletion INTEGER NOT NULL,
    new_depletion INTEGER NOT NULL,
    source TEXT NOT NULL,
    actor TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS daily_analytics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    farm_id TEXT NOT NULL,
    coop_id TEXT NOT NULL,
    livestock_id TEXT NOT NULL REFERENCES livestock(id),
    analysis_date TEXT NOT NULL,
    mortality_count INTEGER NOT NULL DEFAULT 0,
    mortality_rate REAL NOT NULL DEFAULT 0.0,
    current_population INTEGER NOT NULL DEFAULT 0,
    efficiency_score REAL NOT NULL DEFAULT 0.0,
    fcr REAL,
    revenue REAL NOT NULL DEFAULT 0.0,
    feed_consumed_kg REAL NOT NULL DEFAULT 0.0,
    calculated_at TEXT NOT NULL,
    UNIQUE (farm_id, coop_id, livestock_id, analysis_date)
);

CREATE TABLE IF NOT EXISTS analytics_alert (
    id TEXT PRIMARY KEY,
    livestock_id TEXT NOT NULL REFERENCES livestock(id),
    farm_id TEXT NOT NULL,
    coop_id TEXT NOT NULL,
    alert_date TEXT NOT NULL,
    alert_type TEXT NOT NULL,
    severity TEXT NOT NULL,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    metric_value REAL NOT NULL,
    threshold_value REAL NOT NULL,
    is_resolved INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    UNIQUE (livestock_id, alert_date, alert_type)
);
"#;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表并写入当前 schema_version（可重复执行）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 解析数据库路径
///
/// 优先级: 显式参数 > FARM_LIVESTOCK_DB_PATH > 用户数据目录 > 当前目录
pub fn resolve_db_path(explicit: Option<&str>) -> String {
    let from_env = std::env::var(DB_PATH_ENV).ok();
    for candidate in [explicit, from_env.as_deref()].into_iter().flatten() {
        let trimmed = candidate.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./farm_livestock.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("farm-livestock");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("farm_livestock.db");
        }
    }
    path.to_string_lossy().to_string()
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_explicit_db_path_wins() {
        assert_eq!(resolve_db_path(Some(" /tmp/x.db ")), "/tmp/x.db");
    }
}
