// ==========================================
// 养殖场存栏核心 - 日度分析汇总
// ==========================================
// 粒度: (farm, coop, livestock, date) 每天一行
// 输入: 减员记录 + 饲料/增重/销售数据
// 输出: daily_analytics 行 + analytics_alert 告警
// 策略: 已存在的行默认跳过；force 时覆盖，告警始终去重
// ==========================================

use crate::config::FarmCoreConfig;
use crate::domain::analytics::{AnalyticsAlert, DailyAnalytics, PriorOutflow};
use crate::domain::depletion::DepletionEvent;
use crate::domain::livestock::LivestockBatch;
use crate::domain::operator::RoleChecker;
use crate::domain::types::DepletionType;
use crate::engine::alert;
use crate::engine::error::{ensure_can_mutate, EngineError, EngineResult};
use crate::engine::normalizer;
use crate::engine::report::UnitError;
use crate::repository::{
    AnalyticsRepository, DepletionRepository, LivestockRepository, ProductionDataRepository,
    SqliteProductionRepository,
};
use chrono::{Days, NaiveDate, NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// 单日汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayReport {
    pub date: NaiveDate,
    pub rows_written: usize,
    pub rows_skipped: usize,
    pub alerts_created: usize,
    pub errors: Vec<UnitError>,
}

impl DayReport {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            rows_written: 0,
            rows_skipped: 0,
            alerts_created: 0,
            errors: Vec::new(),
        }
    }
}

/// 日期区间汇总
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeReport {
    pub days: Vec<DayReport>,
    /// 整日失败（例如批次列表读取失败）
    pub errors: Vec<UnitError>,
}

impl RangeReport {
    pub fn dates_processed(&self) -> usize {
        self.days.len()
    }

    pub fn rows_written(&self) -> usize {
        self.days.iter().map(|d| d.rows_written).sum()
    }

    pub fn rows_skipped(&self) -> usize {
        self.days.iter().map(|d| d.rows_skipped).sum()
    }

    pub fn alerts_created(&self) -> usize {
        self.days.iter().map(|d| d.alerts_created).sum()
    }

    /// 整日失败 + 单批次失败
    pub fn error_count(&self) -> usize {
        self.errors.len() + self.days.iter().map(|d| d.errors.len()).sum::<usize>()
    }
}

/// 以 `end` 结尾的 `days` 天（含 `end`）
pub fn date_window(end: NaiveDate, days: u32) -> EngineResult<(NaiveDate, NaiveDate)> {
    if days == 0 {
        return Err(EngineError::Validation("days 必须大于 0".to_string()));
    }
    let start = end
        .checked_sub_days(Days::new(u64::from(days - 1)))
        .ok_or_else(|| EngineError::Validation(format!("days 超出日期范围: {}", days)))?;
    Ok((start, end))
}

// ==========================================
// DailyAnalyticsAggregator - 日度分析引擎
// ==========================================
pub struct DailyAnalyticsAggregator<P: ProductionDataRepository = SqliteProductionRepository> {
    livestock_repo: LivestockRepository,
    depletion_repo: DepletionRepository,
    analytics_repo: AnalyticsRepository,
    production: P,
    config: FarmCoreConfig,
}

impl DailyAnalyticsAggregator<SqliteProductionRepository> {
    /// 使用同库的饲料/销售表作为外部输入
    pub fn new(conn: Arc<Mutex<Connection>>, config: FarmCoreConfig) -> Self {
        let production = SqliteProductionRepository::new(conn.clone());
        Self::with_production(conn, config, production)
    }
}

impl<P: ProductionDataRepository> DailyAnalyticsAggregator<P> {
    pub fn with_production(conn: Arc<Mutex<Connection>>, config: FarmCoreConfig, production: P) -> Self {
        Self {
            livestock_repo: LivestockRepository::new(conn.clone()),
            depletion_repo: DepletionRepository::new(conn.clone()),
            analytics_repo: AnalyticsRepository::new(conn),
            production,
            config,
        }
    }

    /// 计算单日全部在养批次
    ///
    /// # 返回
    /// - `Err`: 权限不足或批次列表读取失败
    /// - `Ok(report)`: 单批次失败记录在 `report.errors`
    pub fn calculate_for_date(
        &self,
        date: NaiveDate,
        force: bool,
        operator: &dyn RoleChecker,
    ) -> EngineResult<DayReport> {
        ensure_can_mutate(operator)?;

        let batches = self.livestock_repo.list_active_on(date)?;
        tracing::info!("开始日度分析: date={}, batches={}, force={}", date, batches.len(), force);

        let mut report = DayReport::new(date);
        for (idx, batch) in batches.iter().enumerate() {
            match self.process_batch(batch, date, force) {
                Ok(None) => report.rows_skipped += 1,
                Ok(Some(created)) => {
                    report.rows_written += 1;
                    report.alerts_created += created;
                }
                Err(e) => {
                    tracing::error!("日度分析失败: livestock_id={}, date={}, error={}", batch.id, date, e);
                    report
                        .errors
                        .push(UnitError::new(format!("{}@{}", batch.id, date), &e));
                }
            }
            tracing::debug!("日度分析进度: date={}, [{}/{}]", date, idx + 1, batches.len());
        }

        tracing::info!(
            "日度分析完成: date={}, written={}, skipped={}, alerts={}, errors={}",
            date,
            report.rows_written,
            report.rows_skipped,
            report.alerts_created,
            report.errors.len()
        );
        Ok(report)
    }

    /// 计算日期区间（含首尾），按日期升序，逐日隔离失败
    pub fn calculate_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        force: bool,
        operator: &dyn RoleChecker,
    ) -> EngineResult<RangeReport> {
        if start > end {
            return Err(EngineError::Validation(format!(
                "起始日期 {} 晚于结束日期 {}",
                start, end
            )));
        }
        ensure_can_mutate(operator)?;

        let total = (end - start).num_days() + 1;
        let mut report = RangeReport::default();
        for (idx, date) in start.iter_days().take_while(|d| *d <= end).enumerate() {
            match self.calculate_for_date(date, force, operator) {
                Ok(day) => report.days.push(day),
                Err(e) => {
                    tracing::error!("日度分析整日失败: date={}, error={}", date, e);
                    report.errors.push(UnitError::new(date.to_string(), &e));
                }
            }
            tracing::info!("区间进度: [{}/{}] {}", idx + 1, total, date);
        }
        Ok(report)
    }

    /// 计算单批次单日指标与告警（不写入）
    pub fn compute(
        &self,
        batch: &LivestockBatch,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> EngineResult<(DailyAnalytics, Vec<AnalyticsAlert>)> {
        let (sold, mutated) = self.production.outflow_before(&batch.id, date)?;
        let prior = PriorOutflow {
            depleted: self.depletion_repo.sum_quantity_before(&batch.id, date)?,
            sold,
            mutated,
        };
        let population = (batch.initial_quantity - prior.total()).max(0);

        let events = self.depletion_repo.list_by_livestock_on(&batch.id, date)?;
        let mut mortality_count: i64 = events
            .iter()
            .filter(|ev| self.classify(ev) == Some(DepletionType::Death))
            .map(|ev| ev.quantity)
            .sum();
        if mortality_count > population {
            tracing::warn!(
                "死亡数超过当日存栏，截断: livestock_id={}, date={}, deaths={}, population={}",
                batch.id,
                date,
                mortality_count,
                population
            );
            mortality_count = population;
        }

        let inputs = self.production.daily_inputs(&batch.id, date)?;
        let thresholds = &self.config.thresholds;
        let rate = alert::mortality_rate(mortality_count, population);
        let fcr = alert::feed_conversion_ratio(inputs.feed_consumed_kg, inputs.weight_gain_kg);

        let row = DailyAnalytics {
            farm_id: batch.farm_id.clone(),
            coop_id: batch.coop_id.clone(),
            livestock_id: batch.id.clone(),
            analysis_date: date,
            mortality_count,
            mortality_rate: rate,
            current_population: population,
            efficiency_score: alert::efficiency_score(rate, fcr, thresholds),
            fcr,
            revenue: inputs.revenue,
            feed_consumed_kg: inputs.feed_consumed_kg,
            calculated_at: now,
        };
        let alerts = alert::evaluate(&row, thresholds, now);
        Ok((row, alerts))
    }

    /// Ok(None) = 已存在且未 force，跳过；Ok(Some(n)) = 已写入，新建 n 条告警
    fn process_batch(&self, batch: &LivestockBatch, date: NaiveDate, force: bool) -> EngineResult<Option<usize>> {
        if !force
            && self
                .analytics_repo
                .exists(&batch.farm_id, &batch.coop_id, &batch.id, date)?
        {
            tracing::debug!("分析行已存在，跳过: livestock_id={}, date={}", batch.id, date);
            return Ok(None);
        }

        let (row, alerts) = self.compute(batch, date, Utc::now().naive_utc())?;
        let created = self.analytics_repo.save_day(&row, &alerts)?;
        Ok(Some(created))
    }

    /// 减员记录分类
    ///
    /// - use_modular_services: 优先读取已迁移的 metadata
    /// - metadata 缺失/无效: use_legacy_fallback 开启时按原始字符串规范化，否则忽略
    /// - 未启用 use_modular_services: 一律按原始字符串规范化
    fn classify(&self, event: &DepletionEvent) -> Option<DepletionType> {
        if self.config.use_modular_services {
            match event.metadata() {
                Ok(Some(meta)) => return Some(meta.normalized_type),
                Ok(None) => {}
                Err(e) => tracing::warn!("减员 metadata 无法解析: id={}, error={}", event.id, e),
            }
            if !self.config.use_legacy_fallback {
                return None;
            }
        }
        Some(normalizer::normalize(&event.jenis))
    }
}
