// ==========================================
// 养殖场存栏核心 - 减员记录数据仓储
// ==========================================
// 对齐: livestock_depletion 表
// 红线: 只允许回填 metadata，不修改原始字段
// ==========================================
// 分页: 使用 id 游标 (keyset)，不做全表加载
// ==========================================

use crate::domain::depletion::DepletionEvent;
use crate::repository::error::{parse_date, RepositoryError, RepositoryResult, DATE_FMT};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

/// 未迁移记录的选择条件（与 domain::is_metadata_blank 保持一致）
///
/// TRIM 字符集对应 METADATA_TRIM_CHARS: 空格、\t、\n、\r
const UNMIGRATED_PREDICATE: &str = "(metadata IS NULL OR LOWER(TRIM(metadata, ' ' || char(9) || char(10) || char(13))) IN ('', '{}', '[]', 'null'))";

const EVENT_COLUMNS: &str = "id, livestock_id, depletion_date, jenis, quantity, metadata";

// ==========================================
// DepletionRepository - 减员记录仓储
// ==========================================
pub struct DepletionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DepletionRepository {
    /// 创建新的减员记录仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 聚合
    // ==========================================

    /// 批次全部减员数量之和
    pub fn sum_quantity(&self, livestock_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        Self::sum_quantity_in(&conn, livestock_id)
    }

    pub fn sum_quantity_in(conn: &Connection, livestock_id: &str) -> RepositoryResult<i64> {
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(quantity), 0) FROM livestock_depletion WHERE livestock_id = ?1",
            params![livestock_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// 指定日期之前（不含当日）的减员数量之和
    pub fn sum_quantity_before(&self, livestock_id: &str, date: NaiveDate) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let total: i64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(quantity), 0) FROM livestock_depletion
            WHERE livestock_id = ?1 AND depletion_date < ?2
            "#,
            params![livestock_id, date.format(DATE_FMT).to_string()],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 批次某日的减员记录
    pub fn list_by_livestock_on(
        &self,
        livestock_id: &str,
        date: NaiveDate,
    ) -> RepositoryResult<Vec<DepletionEvent>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM livestock_depletion WHERE livestock_id = ?1 AND depletion_date = ?2 ORDER BY id",
            EVENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
            .query_map(
                params![livestock_id, date.format(DATE_FMT).to_string()],
                RawEvent::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawEvent::into_event).collect()
    }

    /// 游标分页读取一块记录（id > after_id）
    ///
    /// # 参数
    /// - `after_id`: 上一块最后一条记录的 id（首块传 0）
    /// - `limit`: 块大小
    /// - `only_unmigrated`: 是否只读取未迁移记录
    pub fn fetch_chunk_after(
        &self,
        after_id: i64,
        limit: usize,
        only_unmigrated: bool,
    ) -> RepositoryResult<Vec<DepletionEvent>> {
        let conn = self.get_conn()?;
        let filter = if only_unmigrated {
            format!(" AND {}", UNMIGRATED_PREDICATE)
        } else {
            String::new()
        };
        let sql = format!(
            "SELECT {} FROM livestock_depletion WHERE id > ?1{} ORDER BY id LIMIT ?2",
            EVENT_COLUMNS, filter
        );
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
            .query_map(params![after_id, limit as i64], RawEvent::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawEvent::into_event).collect()
    }

    /// 记录总数
    pub fn count_total(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let n = conn.query_row("SELECT COUNT(*) FROM livestock_depletion", [], |row| row.get(0))?;
        Ok(n)
    }

    /// 未迁移记录数
    pub fn count_unmigrated(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT COUNT(*) FROM livestock_depletion WHERE {}",
            UNMIGRATED_PREDICATE
        );
        let n = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(n)
    }

    /// 未迁移记录中的原始类型及条数（dry-run 预览用）
    pub fn unmigrated_type_counts(&self) -> RepositoryResult<Vec<(String, i64)>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT jenis, COUNT(*) FROM livestock_depletion
            WHERE {}
            GROUP BY jenis
            ORDER BY jenis
            "#,
            UNMIGRATED_PREDICATE
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ==========================================
    // 写入
    // ==========================================

    /// 新增减员记录，返回 id
    pub fn insert(
        &self,
        livestock_id: &str,
        depletion_date: NaiveDate,
        jenis: &str,
        quantity: i64,
        metadata: Option<&str>,
    ) -> RepositoryResult<i64> {
        if quantity <= 0 {
            return Err(RepositoryError::FieldValueError {
                field: "quantity".to_string(),
                message: format!("减员数量必须大于 0: {}", quantity),
            });
        }
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO livestock_depletion (livestock_id, depletion_date, jenis, quantity, metadata)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                livestock_id,
                depletion_date.format(DATE_FMT).to_string(),
                jenis,
                quantity,
                metadata
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// 回填 metadata（事务内调用）
    pub fn update_metadata_in(conn: &Connection, id: i64, metadata_json: &str) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE livestock_depletion SET metadata = ?2 WHERE id = ?1",
            params![id, metadata_json],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "LivestockDepletion".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// 在一个事务内执行闭包（迁移按块提交）
    pub fn with_transaction<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        F: FnOnce(&Connection) -> RepositoryResult<T>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        let out = f(&tx)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(out)
    }
}

// ==========================================
// 行映射
// ==========================================
struct RawEvent {
    id: i64,
    livestock_id: String,
    depletion_date: String,
    jenis: String,
    quantity: i64,
    metadata: Option<String>,
}

impl RawEvent {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            livestock_id: row.get(1)?,
            depletion_date: row.get(2)?,
            jenis: row.get(3)?,
            quantity: row.get(4)?,
            metadata: row.get(5)?,
        })
    }

    fn into_event(self) -> RepositoryResult<DepletionEvent> {
        Ok(DepletionEvent {
            depletion_date: parse_date("livestock_depletion.depletion_date", &self.depletion_date)?,
            id: self.id,
            livestock_id: self.livestock_id,
            jenis: self.jenis,
            quantity: self.quantity,
            metadata_raw: self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::depletion::is_metadata_blank;

    fn setup_test_db() -> Arc<Mutex<Connection>> {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO livestock (id, farm_id, coop_id, name, initial_quantity, start_date)
             VALUES ('LB001', 'F01', 'K01', 'Batch 1', 1000, '2025-01-01')",
            [],
        )
        .unwrap();
        Arc::new(Mutex::new(conn))
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    #[test]
    fn test_sum_quantity() {
        let repo = DepletionRepository::new(setup_test_db());
        assert_eq!(repo.sum_quantity("LB001").unwrap(), 0);

        repo.insert("LB001", d(2), "Mati", 5, None).unwrap();
        repo.insert("LB001", d(4), "Afkir", 10, None).unwrap();
        repo.insert("LB001", d(7), "Mati", 2, None).unwrap();

        assert_eq!(repo.sum_quantity("LB001").unwrap(), 17);
        assert_eq!(repo.sum_quantity_before("LB001", d(4)).unwrap(), 5);
        assert_eq!(repo.list_by_livestock_on("LB001", d(4)).unwrap().len(), 1);
    }

    #[test]
    fn test_insert_rejects_non_positive_quantity() {
        let repo = DepletionRepository::new(setup_test_db());
        assert!(repo.insert("LB001", d(2), "Mati", 0, None).is_err());
    }

    #[test]
    fn test_keyset_chunks_and_unmigrated_filter() {
        let repo = DepletionRepository::new(setup_test_db());
        for i in 0..5 {
            let meta = if i % 2 == 0 { None } else { Some(r#"{"normalized_type":"death"}"#) };
            repo.insert("LB001", d(2), "Mati", 1, meta).unwrap();
        }
        repo.insert("LB001", d(3), "Afkir", 1, Some("{}")).unwrap();

        assert_eq!(repo.count_total().unwrap(), 6);
        assert_eq!(repo.count_unmigrated().unwrap(), 4);

        let first = repo.fetch_chunk_after(0, 2, true).unwrap();
        assert_eq!(first.len(), 2);
        let last_id = first.last().unwrap().id;
        let second = repo.fetch_chunk_after(last_id, 2, true).unwrap();
        assert_eq!(second.len(), 2);
        assert!(second.iter().all(|e| e.id > last_id));
        let third = repo.fetch_chunk_after(second.last().unwrap().id, 2, true).unwrap();
        assert!(third.is_empty());

        assert_eq!(
            repo.unmigrated_type_counts().unwrap(),
            vec![("Afkir".to_string(), 1), ("Mati".to_string(), 3)]
        );
    }

    #[test]
    fn test_whitespace_padded_blank_metadata_is_unmigrated() {
        let repo = DepletionRepository::new(setup_test_db());
        let raws = ["\n{}\n", "\t[]", "\r\n NULL \r\n", " \n "];
        for raw in raws {
            assert!(is_metadata_blank(Some(raw)), "{:?}", raw);
            repo.insert("LB001", d(2), "Mati", 1, Some(raw)).unwrap();
        }
        repo.insert("LB001", d(2), "Mati", 1, Some("\n{\"normalized_type\":\"death\"}\n"))
            .unwrap();

        assert_eq!(repo.count_unmigrated().unwrap(), raws.len() as i64);
        let pending = repo.fetch_chunk_after(0, 10, true).unwrap();
        assert_eq!(pending.len(), raws.len());
        assert!(pending
            .iter()
            .all(|e| is_metadata_blank(e.metadata_raw.as_deref())));
    }

    #[test]
    fn test_update_metadata_in_transaction() {
        let repo = DepletionRepository::new(setup_test_db());
        let id = repo.insert("LB001", d(2), "Mati", 1, None).unwrap();

        repo.with_transaction(|tx| DepletionRepository::update_metadata_in(tx, id, r#"{"a":1}"#))
            .unwrap();
        assert_eq!(repo.count_unmigrated().unwrap(), 0);

        let err = repo
            .with_transaction(|tx| DepletionRepository::update_metadata_in(tx, 999, "{}"))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
