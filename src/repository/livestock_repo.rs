// ==========================================
// 养殖场存栏核心 - 批次/当前存栏数据仓储
// ==========================================
// 对齐: livestock / current_livestock / quantity_recalc_log 表
// 红线: Repository 不含业务逻辑, 只做数据映射
// ==========================================
// 说明: `*_in(conn, ...)` 形式的函数接受 &Connection（事务可 deref），
//       供引擎在同一事务内组合调用，避免重复加锁导致死锁。
// ==========================================

use crate::domain::livestock::{CurrentLivestock, LivestockBatch, QuantityAudit};
use crate::domain::types::LivestockStatus;
use crate::repository::error::{
    parse_date, parse_datetime, RepositoryError, RepositoryResult, DATETIME_FMT, DATE_FMT,
};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const BATCH_COLUMNS: &str = r#"
    id, farm_id, coop_id, name, initial_quantity, quantity_depletion,
    quantity_sales, quantity_mutated, start_date, closed_at, status
"#;

/// 重算日志（quantity_recalc_log 行）
#[derive(Debug, Clone)]
pub struct RecalcLogEntry {
    pub livestock_id: String,
    pub previous_quantity: Option<i64>,
    pub new_quantity: i64,
    pub previous_depletion: i64,
    pub new_depletion: i64,
    pub source: String,
    pub actor: String,
    pub created_at: NaiveDateTime,
}

// ==========================================
// LivestockRepository - 批次仓储
// ==========================================
pub struct LivestockRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LivestockRepository {
    /// 创建新的批次仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 ID 查询未删除批次
    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<LivestockBatch>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, id)
    }

    pub fn find_by_id_in(conn: &Connection, id: &str) -> RepositoryResult<Option<LivestockBatch>> {
        let sql = format!(
            "SELECT {} FROM livestock WHERE id = ?1 AND deleted_at IS NULL",
            BATCH_COLUMNS
        );
        let raw = conn
            .query_row(&sql, params![id], RawBatch::from_row)
            .optional()?;
        raw.map(RawBatch::into_batch).transpose()
    }

    /// 列出未删除批次 ID（按 ID 排序）
    pub fn list_ids(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT id FROM livestock WHERE deleted_at IS NULL ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// 列出指定日期处于饲养期的批次
    pub fn list_active_on(&self, date: NaiveDate) -> RepositoryResult<Vec<LivestockBatch>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM livestock
            WHERE deleted_at IS NULL
              AND start_date <= ?1
              AND (
                    (closed_at IS NULL AND status = 'active')
                 OR (closed_at IS NOT NULL AND closed_at >= ?1)
              )
            ORDER BY farm_id, coop_id, id
            "#,
            BATCH_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
            .query_map(params![date.format(DATE_FMT).to_string()], RawBatch::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawBatch::into_batch).collect()
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 新增批次（采购入栏）
    pub fn insert(&self, batch: &LivestockBatch) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO livestock (
                id, farm_id, coop_id, name, initial_quantity, quantity_depletion,
                quantity_sales, quantity_mutated, start_date, closed_at, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                batch.id,
                batch.farm_id,
                batch.coop_id,
                batch.name,
                batch.initial_quantity,
                batch.quantity_depletion,
                batch.quantity_sales,
                batch.quantity_mutated,
                batch.start_date.format(DATE_FMT).to_string(),
                batch.closed_at.map(|d| d.format(DATE_FMT).to_string()),
                batch.status.as_str(),
            ],
        )?;
        Ok(())
    }

    /// 软删除
    pub fn soft_delete(&self, id: &str, at: NaiveDateTime) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "UPDATE livestock SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
            params![id, at.format(DATETIME_FMT).to_string()],
        )?;
        Ok(rows)
    }

    /// 更新累计减员（事务内调用）
    pub fn update_depletion_in(
        conn: &Connection,
        id: &str,
        quantity_depletion: i64,
        updated_at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE livestock
            SET quantity_depletion = ?2, updated_at = ?3
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
            params![id, quantity_depletion, updated_at.format(DATETIME_FMT).to_string()],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Livestock".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

// ==========================================
// CurrentLivestockRepository - 当前存栏快照仓储
// ==========================================
pub struct CurrentLivestockRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CurrentLivestockRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 查询批次的当前存栏快照
    pub fn find_by_livestock_id(&self, livestock_id: &str) -> RepositoryResult<Option<CurrentLivestock>> {
        let conn = self.get_conn()?;
        Self::find_by_livestock_id_in(&conn, livestock_id)
    }

    pub fn find_by_livestock_id_in(
        conn: &Connection,
        livestock_id: &str,
    ) -> RepositoryResult<Option<CurrentLivestock>> {
        let raw = conn
            .query_row(
                r#"
                SELECT livestock_id, farm_id, coop_id, quantity, metadata, updated_at
                FROM current_livestock
                WHERE livestock_id = ?1
                "#,
                params![livestock_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((livestock_id, farm_id, coop_id, quantity, metadata, updated_at)) = raw else {
            return Ok(None);
        };

        // 历史数据的 metadata 可能不是 QuantityAudit 结构，按缺失处理
        let metadata = metadata
            .as_deref()
            .and_then(|s| serde_json::from_str::<QuantityAudit>(s).ok());

        Ok(Some(CurrentLivestock {
            livestock_id,
            farm_id,
            coop_id,
            quantity,
            metadata,
            updated_at: parse_datetime("current_livestock.updated_at", &updated_at)?,
        }))
    }

    /// 写入/覆盖快照（事务内调用）
    pub fn upsert_in(conn: &Connection, snapshot: &CurrentLivestock) -> RepositoryResult<()> {
        let metadata = snapshot
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            r#"
            INSERT INTO current_livestock (livestock_id, farm_id, coop_id, quantity, metadata, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(livestock_id) DO UPDATE SET
                farm_id = excluded.farm_id,
                coop_id = excluded.coop_id,
                quantity = excluded.quantity,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at
            "#,
            params![
                snapshot.livestock_id,
                snapshot.farm_id,
                snapshot.coop_id,
                snapshot.quantity,
                metadata,
                snapshot.updated_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// 追加重算日志（事务内调用）
    pub fn insert_recalc_log_in(conn: &Connection, entry: &RecalcLogEntry) -> RepositoryResult<String> {
        let id = Uuid::new_v4().to_string();
        conn.execute(
            r#"
            INSERT INTO quantity_recalc_log (
                id, livestock_id, previous_quantity, new_quantity,
                previous_depletion, new_depletion, source, actor, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                id,
                entry.livestock_id,
                entry.previous_quantity,
                entry.new_quantity,
                entry.previous_depletion,
                entry.new_depletion,
                entry.source,
                entry.actor,
                entry.created_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(id)
    }

    /// 批次的重算日志条数
    pub fn count_recalc_logs(&self, livestock_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let n = conn.query_row(
            "SELECT COUNT(*) FROM quantity_recalc_log WHERE livestock_id = ?1",
            params![livestock_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }
}

// ==========================================
// 行映射
// ==========================================
struct RawBatch {
    id: String,
    farm_id: String,
    coop_id: String,
    name: String,
    initial_quantity: i64,
    quantity_depletion: i64,
    quantity_sales: i64,
    quantity_mutated: i64,
    start_date: String,
    closed_at: Option<String>,
    status: String,
}

impl RawBatch {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            farm_id: row.get(1)?,
            coop_id: row.get(2)?,
            name: row.get(3)?,
            initial_quantity: row.get(4)?,
            quantity_depletion: row.get(5)?,
            quantity_sales: row.get(6)?,
            quantity_mutated: row.get(7)?,
            start_date: row.get(8)?,
            closed_at: row.get(9)?,
            status: row.get(10)?,
        })
    }

    fn into_batch(self) -> RepositoryResult<LivestockBatch> {
        Ok(LivestockBatch {
            start_date: parse_date("livestock.start_date", &self.start_date)?,
            closed_at: self
                .closed_at
                .as_deref()
                .map(|s| parse_date("livestock.closed_at", s))
                .transpose()?,
            status: LivestockStatus::from_db(&self.status),
            id: self.id,
            farm_id: self.farm_id,
            coop_id: self.coop_id,
            name: self.name,
            initial_quantity: self.initial_quantity,
            quantity_depletion: self.quantity_depletion,
            quantity_sales: self.quantity_sales,
            quantity_mutated: self.quantity_mutated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::livestock::FormulaInputs;
    use serde_json::Map;

    fn setup_test_db() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn make_batch(id: &str, start: NaiveDate) -> LivestockBatch {
        LivestockBatch {
            id: id.to_string(),
            farm_id: "F01".to_string(),
            coop_id: "K01".to_string(),
            name: format!("Batch {}", id),
            initial_quantity: 1000,
            quantity_depletion: 0,
            quantity_sales: 0,
            quantity_mutated: 0,
            start_date: start,
            closed_at: None,
            status: LivestockStatus::Active,
        }
    }

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, 1).unwrap().and_hms_opt(10, 0, 0).unwrap()
    }

    #[test]
    fn test_insert_find_and_soft_delete() {
        let conn = setup_test_db();
        let repo = LivestockRepository::new(conn);
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        repo.insert(&make_batch("LB001", start)).unwrap();
        let found = repo.find_by_id("LB001").unwrap().unwrap();
        assert_eq!(found.initial_quantity, 1000);
        assert_eq!(found.start_date, start);

        assert_eq!(repo.soft_delete("LB001", ts()).unwrap(), 1);
        assert!(repo.find_by_id("LB001").unwrap().is_none());
        assert!(repo.list_ids().unwrap().is_empty());
    }

    #[test]
    fn test_list_active_on() {
        let conn = setup_test_db();
        let repo = LivestockRepository::new(conn);
        let d = |m, day| NaiveDate::from_ymd_opt(2025, m, day).unwrap();

        repo.insert(&make_batch("LB001", d(1, 1))).unwrap();
        repo.insert(&make_batch("LB002", d(3, 1))).unwrap();
        let mut closed = make_batch("LB003", d(1, 1));
        closed.status = LivestockStatus::Closed;
        closed.closed_at = Some(d(1, 31));
        repo.insert(&closed).unwrap();

        let ids: Vec<String> = repo
            .list_active_on(d(2, 1))
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec!["LB001".to_string()]);

        let ids: Vec<String> = repo
            .list_active_on(d(1, 15))
            .unwrap()
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec!["LB001".to_string(), "LB003".to_string()]);
    }

    #[test]
    fn test_update_depletion_missing_batch() {
        let conn = setup_test_db();
        let guard = conn.lock().unwrap();
        let err = LivestockRepository::update_depletion_in(&guard, "NOPE", 5, ts()).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_snapshot_upsert_roundtrip() {
        let conn = setup_test_db();
        LivestockRepository::new(conn.clone())
            .insert(&make_batch("LB001", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()))
            .unwrap();

        let audit = QuantityAudit {
            previous_quantity: None,
            delta: 983,
            source: "test".to_string(),
            formula: FormulaInputs {
                initial_quantity: 1000,
                quantity_depletion: 17,
                quantity_sales: 0,
                quantity_mutated: 0,
            },
            computed_at: ts(),
            actor: "system".to_string(),
            extra: Map::new(),
        };
        let snapshot = CurrentLivestock {
            livestock_id: "LB001".to_string(),
            farm_id: "F01".to_string(),
            coop_id: "K01".to_string(),
            quantity: 983,
            metadata: Some(audit.clone()),
            updated_at: ts(),
        };

        {
            let guard = conn.lock().unwrap();
            CurrentLivestockRepository::upsert_in(&guard, &snapshot).unwrap();
            CurrentLivestockRepository::upsert_in(&guard, &snapshot).unwrap();
        }

        let repo = CurrentLivestockRepository::new(conn);
        let found = repo.find_by_livestock_id("LB001").unwrap().unwrap();
        assert_eq!(found.quantity, 983);
        assert_eq!(found.metadata, Some(audit));
        assert_eq!(found.updated_at, ts());
    }
}
