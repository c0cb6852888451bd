// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库初始化、批次/减员等测试数据生成
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use farm_livestock_core::db;
use farm_livestock_core::domain::{LivestockBatch, LivestockStatus};
use farm_livestock_core::repository::{DepletionRepository, LivestockRepository};
use rusqlite::Connection;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = open_test_connection(&db_path)?;
    db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开测试连接（统一 PRAGMA）
pub fn open_test_connection(db_path: &str) -> Result<Connection, Box<dyn Error>> {
    Ok(db::open_sqlite_connection(db_path)?)
}

/// 创建测试数据库并返回共享连接
pub fn setup_shared_db() -> (NamedTempFile, Arc<Mutex<Connection>>) {
    let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_test_connection(&db_path).expect("打开数据库失败");
    (temp_file, Arc::new(Mutex::new(conn)))
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 构造在养批次
pub fn make_batch(id: &str, coop_id: &str, initial_quantity: i64, start_date: NaiveDate) -> LivestockBatch {
    LivestockBatch {
        id: id.to_string(),
        farm_id: "FARM-01".to_string(),
        coop_id: coop_id.to_string(),
        name: format!("Batch {}", id),
        initial_quantity,
        quantity_depletion: 0,
        quantity_sales: 0,
        quantity_mutated: 0,
        start_date,
        closed_at: None,
        status: LivestockStatus::Active,
    }
}

/// 写入批次
pub fn insert_batch(conn: &Arc<Mutex<Connection>>, batch: &LivestockBatch) {
    LivestockRepository::new(conn.clone())
        .insert(batch)
        .expect("插入批次失败");
}

/// 批量写入减员记录: (日期, 原始类型, 数量)
pub fn insert_depletions(conn: &Arc<Mutex<Connection>>, livestock_id: &str, events: &[(NaiveDate, &str, i64)]) {
    let repo = DepletionRepository::new(conn.clone());
    for (day, jenis, quantity) in events {
        repo.insert(livestock_id, *day, jenis, *quantity, None)
            .expect("插入减员记录失败");
    }
}

/// 读取批次的累计减员
pub fn stored_depletion(conn: &Arc<Mutex<Connection>>, livestock_id: &str) -> i64 {
    conn.lock()
        .unwrap()
        .query_row(
            "SELECT quantity_depletion FROM livestock WHERE id = ?1",
            [livestock_id],
            |row| row.get(0),
        )
        .unwrap()
}
