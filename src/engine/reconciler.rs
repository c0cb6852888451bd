// ==========================================
// 养殖场存栏核心 - 当前存栏对账
// ==========================================
// 流程:
// 1. 汇总减员记录 → total_depletion
// 2. 与 livestock.quantity_depletion 比较（相等且快照一致时跳过）
// 3. 更新 quantity_depletion，按公式重算 current_livestock.quantity，写审计
// 红线: 步骤 3 的批次更新 + 快照更新 + 日志写入在同一事务内提交
// ==========================================

use crate::domain::livestock::{CurrentLivestock, FormulaInputs, QuantityAudit};
use crate::domain::operator::RoleChecker;
use crate::engine::depletion_aggregator::DepletionAggregator;
use crate::engine::error::{ensure_can_mutate, EngineError, EngineResult};
use crate::engine::report::{progress_step, UnitError};
use crate::repository::error::RepositoryError;
use crate::repository::{CurrentLivestockRepository, LivestockRepository, RecalcLogEntry};
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::sync::{Arc, Mutex};

/// 审计来源标识
pub const RECONCILE_SOURCE: &str = "quantity_depletion_reconcile";

/// 单批次对账结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    Updated,
    Skipped,
    /// dry-run，未落库
    Preview,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub livestock_id: String,
    pub status: ReconcileStatus,
    pub previous_depletion: i64,
    pub new_depletion: i64,
    /// 快照不存在时为 None
    pub previous_quantity: Option<i64>,
    pub new_quantity: i64,
    /// 公式结果为负、已截断为 0
    pub clamped: bool,
}

impl ReconcileOutcome {
    pub fn depletion_delta(&self) -> i64 {
        self.new_depletion - self.previous_depletion
    }

    pub fn quantity_delta(&self) -> i64 {
        self.new_quantity - self.previous_quantity.unwrap_or(0)
    }
}

/// 批量对账选项
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    pub dry_run: bool,
    pub force: bool,
    /// 仅处理单个批次
    pub livestock_id: Option<String>,
}

/// 批量对账汇总
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub outcomes: Vec<ReconcileOutcome>,
    pub errors: Vec<UnitError>,
}

impl ReconcileReport {
    fn count(&self, status: ReconcileStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn updated(&self) -> usize {
        self.count(ReconcileStatus::Updated)
    }

    pub fn skipped(&self) -> usize {
        self.count(ReconcileStatus::Skipped)
    }

    pub fn previewed(&self) -> usize {
        self.count(ReconcileStatus::Preview)
    }

    pub fn total(&self) -> usize {
        self.outcomes.len() + self.errors.len()
    }
}

// ==========================================
// QuantityReconciler - 当前存栏对账引擎
// ==========================================
pub struct QuantityReconciler {
    conn: Arc<Mutex<Connection>>,
    livestock_repo: LivestockRepository,
}

impl QuantityReconciler {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            livestock_repo: LivestockRepository::new(conn.clone()),
            conn,
        }
    }

    /// 对账单个批次
    ///
    /// # 参数
    /// - `force`: 即使减员数一致也重写快照与审计
    ///
    /// # 返回
    /// - `Updated`: 已在一个事务内更新批次与快照
    /// - `Skipped`: 减员数一致且快照已符合公式
    pub fn reconcile(
        &self,
        livestock_id: &str,
        force: bool,
        operator: &dyn RoleChecker,
    ) -> EngineResult<ReconcileOutcome> {
        ensure_can_mutate(operator)?;

        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn.transaction()?;

        let plan = Self::plan_in(&tx, livestock_id)?;
        if !force && plan.is_consistent() {
            // tx 在此处 drop 即回滚，无任何写入
            tracing::debug!("减员数与快照一致，跳过: livestock_id={}", livestock_id);
            return Ok(plan.outcome(ReconcileStatus::Skipped));
        }

        if plan.inputs.is_clamped() {
            tracing::warn!(
                "存栏公式结果为负，截断为 0: livestock_id={}, inputs={:?}, raw={}",
                livestock_id,
                plan.inputs,
                plan.inputs.raw_quantity()
            );
        }

        let now = Utc::now().naive_utc();
        let new_quantity = plan.inputs.current_quantity();

        LivestockRepository::update_depletion_in(&tx, livestock_id, plan.inputs.quantity_depletion, now)?;

        let audit = QuantityAudit {
            previous_quantity: plan.previous_quantity,
            delta: new_quantity - plan.previous_quantity.unwrap_or(0),
            source: RECONCILE_SOURCE.to_string(),
            formula: plan.inputs,
            computed_at: now,
            actor: operator.name().to_string(),
            extra: Map::new(),
        };
        CurrentLivestockRepository::upsert_in(
            &tx,
            &CurrentLivestock {
                livestock_id: livestock_id.to_string(),
                farm_id: plan.farm_id.clone(),
                coop_id: plan.coop_id.clone(),
                quantity: new_quantity,
                metadata: Some(audit),
                updated_at: now,
            },
        )?;
        CurrentLivestockRepository::insert_recalc_log_in(
            &tx,
            &RecalcLogEntry {
                livestock_id: livestock_id.to_string(),
                previous_quantity: plan.previous_quantity,
                new_quantity,
                previous_depletion: plan.stored_depletion,
                new_depletion: plan.inputs.quantity_depletion,
                source: RECONCILE_SOURCE.to_string(),
                actor: operator.name().to_string(),
                created_at: now,
            },
        )?;

        tx.commit()?;

        let outcome = plan.outcome(ReconcileStatus::Updated);
        tracing::info!(
            "存栏对账完成: livestock_id={}, depletion {} -> {}, quantity {:?} -> {}",
            livestock_id,
            outcome.previous_depletion,
            outcome.new_depletion,
            outcome.previous_quantity,
            outcome.new_quantity
        );
        Ok(outcome)
    }

    /// dry-run: 只计算差异，不落库，不校验角色
    pub fn preview(&self, livestock_id: &str) -> EngineResult<ReconcileOutcome> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let plan = Self::plan_in(&conn, livestock_id)?;
        Ok(plan.outcome(ReconcileStatus::Preview))
    }

    /// 批量对账
    ///
    /// # 返回
    /// - `Err`: 仅在启动阶段失败（指定批次不存在、权限不足、批次列表读取失败）
    /// - `Ok(report)`: 单批次失败记录在 `report.errors` 中，不中断后续批次
    pub fn reconcile_all(
        &self,
        options: &ReconcileOptions,
        operator: &dyn RoleChecker,
    ) -> EngineResult<ReconcileReport> {
        if !options.dry_run {
            ensure_can_mutate(operator)?;
        }

        let ids = match options.livestock_id.as_deref() {
            Some(id) => {
                if self.livestock_repo.find_by_id(id)?.is_none() {
                    return Err(EngineError::not_found("Livestock", id));
                }
                vec![id.to_string()]
            }
            None => self.livestock_repo.list_ids()?,
        };

        let total = ids.len();
        let step = progress_step(total);
        tracing::info!(
            "开始批量对账: total={}, dry_run={}, force={}",
            total,
            options.dry_run,
            options.force
        );

        let mut report = ReconcileReport::default();
        for (idx, id) in ids.iter().enumerate() {
            let result = if options.dry_run {
                self.preview(id)
            } else {
                self.reconcile(id, options.force, operator)
            };

            match result {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    tracing::error!("批次对账失败: livestock_id={}, error={}", id, e);
                    report.errors.push(UnitError::new(id.clone(), &e));
                }
            }

            if (idx + 1) % step == 0 || idx + 1 == total {
                tracing::info!("对账进度: [{}/{}]", idx + 1, total);
            }
        }

        tracing::info!(
            "批量对账结束: updated={}, skipped={}, preview={}, errors={}",
            report.updated(),
            report.skipped(),
            report.previewed(),
            report.errors.len()
        );
        Ok(report)
    }

    /// 读取当前状态并计算目标值（事务内）
    fn plan_in(conn: &Connection, livestock_id: &str) -> EngineResult<ReconcilePlan> {
        let batch = LivestockRepository::find_by_id_in(conn, livestock_id)?
            .ok_or_else(|| EngineError::not_found("Livestock", livestock_id))?;
        let total = DepletionAggregator::total_depletion_in(conn, livestock_id)?;
        let snapshot = CurrentLivestockRepository::find_by_livestock_id_in(conn, livestock_id)?;

        Ok(ReconcilePlan {
            livestock_id: batch.id.clone(),
            farm_id: batch.farm_id.clone(),
            coop_id: batch.coop_id.clone(),
            stored_depletion: batch.quantity_depletion,
            previous_quantity: snapshot.map(|s| s.quantity),
            inputs: FormulaInputs {
                quantity_depletion: total,
                ..batch.formula_inputs()
            },
        })
    }
}

/// 对账计划（读取阶段的结果）
struct ReconcilePlan {
    livestock_id: String,
    farm_id: String,
    coop_id: String,
    stored_depletion: i64,
    previous_quantity: Option<i64>,
    /// 以重新汇总的减员数代入的公式输入
    inputs: FormulaInputs,
}

impl ReconcilePlan {
    /// 计数一致且快照已等于公式结果
    fn is_consistent(&self) -> bool {
        self.stored_depletion == self.inputs.quantity_depletion
            && self.previous_quantity == Some(self.inputs.current_quantity())
    }

    fn outcome(&self, status: ReconcileStatus) -> ReconcileOutcome {
        let (new_depletion, new_quantity) = match status {
            ReconcileStatus::Skipped => (
                self.stored_depletion,
                self.previous_quantity.unwrap_or_else(|| self.inputs.current_quantity()),
            ),
            _ => (self.inputs.quantity_depletion, self.inputs.current_quantity()),
        };
        ReconcileOutcome {
            livestock_id: self.livestock_id.clone(),
            status,
            previous_depletion: self.stored_depletion,
            new_depletion,
            previous_quantity: self.previous_quantity,
            new_quantity,
            clamped: self.inputs.is_clamped(),
        }
    }
}
