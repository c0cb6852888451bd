// ==========================================
// 养殖场存栏核心 - 批次与当前存栏领域模型
// ==========================================
// 对齐: livestock / current_livestock 表
// 红线: 当前存栏 = max(0, 初始 - 减员 - 销售 - 调出)
// ==========================================

use crate::domain::types::LivestockStatus;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

// ==========================================
// LivestockBatch - 饲养批次
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivestockBatch {
    pub id: String,
    pub farm_id: String,
    pub coop_id: String,
    pub name: String,

    // ===== 累计计数（单调不减） =====
    pub initial_quantity: i64,
    pub quantity_depletion: i64,
    pub quantity_sales: i64,
    pub quantity_mutated: i64,

    pub start_date: NaiveDate,
    pub closed_at: Option<NaiveDate>,
    pub status: LivestockStatus,
}

/// 存栏公式输入（审计用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormulaInputs {
    pub initial_quantity: i64,
    pub quantity_depletion: i64,
    pub quantity_sales: i64,
    pub quantity_mutated: i64,
}

impl FormulaInputs {
    /// 未截断的原始结果
    pub fn raw_quantity(&self) -> i64 {
        self.initial_quantity - self.quantity_depletion - self.quantity_sales - self.quantity_mutated
    }

    /// 截断到 0 的当前存栏
    pub fn current_quantity(&self) -> i64 {
        self.raw_quantity().max(0)
    }

    /// 原始结果为负（数据不一致，需要截断）
    pub fn is_clamped(&self) -> bool {
        self.raw_quantity() < 0
    }
}

impl LivestockBatch {
    /// 以当前累计计数构造公式输入
    pub fn formula_inputs(&self) -> FormulaInputs {
        FormulaInputs {
            initial_quantity: self.initial_quantity,
            quantity_depletion: self.quantity_depletion,
            quantity_sales: self.quantity_sales,
            quantity_mutated: self.quantity_mutated,
        }
    }

    /// 按公式计算当前存栏
    pub fn current_quantity(&self) -> i64 {
        self.formula_inputs().current_quantity()
    }

    /// 指定日期是否处于饲养期
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        if date < self.start_date {
            return false;
        }
        match self.closed_at {
            Some(closed) => date <= closed,
            None => self.status == LivestockStatus::Active,
        }
    }
}

// ==========================================
// QuantityAudit - 当前存栏重算审计信息
// ==========================================
// 存储于 current_livestock.metadata (JSON)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityAudit {
    /// 重算前的存栏（首次生成快照时为 None）
    pub previous_quantity: Option<i64>,
    /// 新值 - 旧值
    pub delta: i64,
    /// 计算来源，例如 "quantity_depletion_reconcile"
    pub source: String,
    pub formula: FormulaInputs,
    pub computed_at: NaiveDateTime,
    pub actor: String,
    /// 预留的扩展字段
    #[serde(default, skip_serializing_if = "Map::is_empty", flatten)]
    pub extra: Map<String, JsonValue>,
}

// ==========================================
// CurrentLivestock - 当前存栏快照
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentLivestock {
    pub livestock_id: String,
    pub farm_id: String,
    pub coop_id: String,
    pub quantity: i64,
    pub metadata: Option<QuantityAudit>,
    pub updated_at: NaiveDateTime,
}
