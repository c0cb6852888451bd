// ==========================================
// 养殖场存栏核心 - 减员汇总
// ==========================================
// 输入: 批次 ID（必须存在且未删除）
// 输出: 该批次全部减员记录数量之和
// 红线: 只读，无副作用
// ==========================================

use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{DepletionRepository, LivestockRepository};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub struct DepletionAggregator {
    livestock_repo: LivestockRepository,
    depletion_repo: DepletionRepository,
}

impl DepletionAggregator {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            livestock_repo: LivestockRepository::new(conn.clone()),
            depletion_repo: DepletionRepository::new(conn),
        }
    }

    /// 批次累计减员
    ///
    /// # 返回
    /// - `Ok(total)`: 非负
    /// - `Err(NotFound)`: 批次不存在或已软删除
    pub fn total_depletion(&self, livestock_id: &str) -> EngineResult<i64> {
        if self.livestock_repo.find_by_id(livestock_id)?.is_none() {
            return Err(EngineError::not_found("Livestock", livestock_id));
        }
        let total = self.depletion_repo.sum_quantity(livestock_id)?;
        tracing::debug!("减员汇总: livestock_id={}, total={}", livestock_id, total);
        Ok(total)
    }

    /// 事务内版本（调用方已确认批次存在）
    pub(crate) fn total_depletion_in(conn: &Connection, livestock_id: &str) -> EngineResult<i64> {
        Ok(DepletionRepository::sum_quantity_in(conn, livestock_id)?)
    }
}
