// ==========================================
// 养殖场存栏核心 - 饲料/销售数据仓储
// ==========================================
// 对齐: feed_usage / livestock_recording / livestock_sale / livestock_mutation 表
// 职责: 为日度分析提供外部输入（饲料消耗、增重、收入、历史流出）
// ==========================================

use crate::domain::analytics::ProductionInputs;
use crate::repository::error::{RepositoryError, RepositoryResult, DATE_FMT};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// Trait: ProductionDataRepository
// ==========================================
// 日度分析引擎只依赖此接口，测试可替换为内存实现
pub trait ProductionDataRepository {
    /// 批次某日的饲料消耗、增重与销售收入
    fn daily_inputs(&self, livestock_id: &str, date: NaiveDate) -> RepositoryResult<ProductionInputs>;

    /// 某日之前（不含当日）的累计 (销售数量, 调出数量)
    fn outflow_before(&self, livestock_id: &str, date: NaiveDate) -> RepositoryResult<(i64, i64)>;
}

// ==========================================
// SqliteProductionRepository - SQLite 实现
// ==========================================
pub struct SqliteProductionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteProductionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 记录饲料消耗
    pub fn insert_feed_usage(&self, livestock_id: &str, date: NaiveDate, quantity_kg: f64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO feed_usage (livestock_id, usage_date, quantity_kg) VALUES (?1, ?2, ?3)",
            params![livestock_id, date.format(DATE_FMT).to_string(), quantity_kg],
        )?;
        Ok(())
    }

    /// 记录增重
    pub fn insert_recording(&self, livestock_id: &str, date: NaiveDate, weight_gain_kg: f64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO livestock_recording (livestock_id, recording_date, weight_gain_kg) VALUES (?1, ?2, ?3)",
            params![livestock_id, date.format(DATE_FMT).to_string(), weight_gain_kg],
        )?;
        Ok(())
    }

    /// 记录销售
    pub fn insert_sale(&self, livestock_id: &str, date: NaiveDate, quantity: i64, revenue: f64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO livestock_sale (livestock_id, sale_date, quantity, revenue) VALUES (?1, ?2, ?3, ?4)",
            params![livestock_id, date.format(DATE_FMT).to_string(), quantity, revenue],
        )?;
        Ok(())
    }

    /// 记录调出
    pub fn insert_mutation(&self, livestock_id: &str, date: NaiveDate, quantity: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO livestock_mutation (livestock_id, mutation_date, quantity) VALUES (?1, ?2, ?3)",
            params![livestock_id, date.format(DATE_FMT).to_string(), quantity],
        )?;
        Ok(())
    }
}

impl ProductionDataRepository for SqliteProductionRepository {
    fn daily_inputs(&self, livestock_id: &str, date: NaiveDate) -> RepositoryResult<ProductionInputs> {
        let conn = self.get_conn()?;
        let day = date.format(DATE_FMT).to_string();

        let feed_consumed_kg: f64 = conn.query_row(
            "SELECT COALESCE(SUM(quantity_kg), 0.0) FROM feed_usage WHERE livestock_id = ?1 AND usage_date = ?2",
            params![livestock_id, day],
            |row| row.get(0),
        )?;
        let weight_gain_kg: f64 = conn.query_row(
            "SELECT COALESCE(SUM(weight_gain_kg), 0.0) FROM livestock_recording WHERE livestock_id = ?1 AND recording_date = ?2",
            params![livestock_id, day],
            |row| row.get(0),
        )?;
        let revenue: f64 = conn.query_row(
            "SELECT COALESCE(SUM(revenue), 0.0) FROM livestock_sale WHERE livestock_id = ?1 AND sale_date = ?2",
            params![livestock_id, day],
            |row| row.get(0),
        )?;

        Ok(ProductionInputs {
            feed_consumed_kg,
            weight_gain_kg,
            revenue,
        })
    }

    fn outflow_before(&self, livestock_id: &str, date: NaiveDate) -> RepositoryResult<(i64, i64)> {
        let conn = self.get_conn()?;
        let day = date.format(DATE_FMT).to_string();

        let sold: i64 = conn.query_row(
            "SELECT COALESCE(SUM(quantity), 0) FROM livestock_sale WHERE livestock_id = ?1 AND sale_date < ?2",
            params![livestock_id, day],
            |row| row.get(0),
        )?;
        let mutated: i64 = conn.query_row(
            "SELECT COALESCE(SUM(quantity), 0) FROM livestock_mutation WHERE livestock_id = ?1 AND mutation_date < ?2",
            params![livestock_id, day],
            |row| row.get(0),
        )?;
        Ok((sold, mutated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_daily_inputs_and_outflow() {
        let repo = SqliteProductionRepository::new(setup_test_db());
        let d = |day| NaiveDate::from_ymd_opt(2025, 1, day).unwrap();

        repo.insert_feed_usage("LB001", d(5), 120.0).unwrap();
        repo.insert_feed_usage("LB001", d(5), 30.0).unwrap();
        repo.insert_recording("LB001", d(5), 100.0).unwrap();
        repo.insert_sale("LB001", d(3), 50, 1_500_000.0).unwrap();
        repo.insert_sale("LB001", d(5), 10, 300_000.0).unwrap();
        repo.insert_mutation("LB001", d(4), 20).unwrap();

        let inputs = repo.daily_inputs("LB001", d(5)).unwrap();
        assert_eq!(inputs.feed_consumed_kg, 150.0);
        assert_eq!(inputs.weight_gain_kg, 100.0);
        assert_eq!(inputs.revenue, 300_000.0);

        assert_eq!(repo.outflow_before("LB001", d(5)).unwrap(), (50, 20));
        assert_eq!(repo.outflow_before("LB001", d(3)).unwrap(), (0, 0));
        assert_eq!(repo.daily_inputs("LB001", d(6)).unwrap(), ProductionInputs::default());
    }
}
