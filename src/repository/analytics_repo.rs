// ==========================================
// 养殖场存栏核心 - 日度分析/告警数据仓储
// ==========================================
// 对齐: daily_analytics / analytics_alert 表
// 红线: 分析行按 (farm, coop, livestock, date) 唯一
//       告警按 (livestock, date, alert_type) 唯一
// ==========================================

use crate::domain::analytics::{AnalyticsAlert, DailyAnalytics};
use crate::domain::types::{AlertSeverity, AlertType};
use crate::repository::error::{
    parse_date, parse_datetime, RepositoryError, RepositoryResult, DATETIME_FMT, DATE_FMT,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// AnalyticsRepository - 日度分析仓储
// ==========================================
pub struct AnalyticsRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AnalyticsRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 分析行是否已存在
    pub fn exists(
        &self,
        farm_id: &str,
        coop_id: &str,
        livestock_id: &str,
        date: NaiveDate,
    ) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let found: Option<i64> = conn
            .query_row(
                r#"
                SELECT 1 FROM daily_analytics
                WHERE farm_id = ?1 AND coop_id = ?2 AND livestock_id = ?3 AND analysis_date = ?4
                LIMIT 1
                "#,
                params![farm_id, coop_id, livestock_id, date.format(DATE_FMT).to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// 写入分析行与告警（同一事务）
    ///
    /// # 返回
    /// - 实际新建的告警数（已存在的同类告警只刷新内容）
    pub fn save_day(&self, row: &DailyAnalytics, alerts: &[AnalyticsAlert]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Self::upsert_in(&tx, row)?;
        let mut created = 0;
        for alert in alerts {
            if Self::upsert_alert_in(&tx, alert)? {
                created += 1;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(created)
    }

    /// 写入/覆盖分析行
    pub fn upsert_in(conn: &Connection, row: &DailyAnalytics) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO daily_analytics (
                farm_id, coop_id, livestock_id, analysis_date,
                mortality_count, mortality_rate, current_population,
                efficiency_score, fcr, revenue, feed_consumed_kg, calculated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(farm_id, coop_id, livestock_id, analysis_date) DO UPDATE SET
                mortality_count = excluded.mortality_count,
                mortality_rate = excluded.mortality_rate,
                current_population = excluded.current_population,
                efficiency_score = excluded.efficiency_score,
                fcr = excluded.fcr,
                revenue = excluded.revenue,
                feed_consumed_kg = excluded.feed_consumed_kg,
                calculated_at = excluded.calculated_at
            "#,
            params![
                row.farm_id,
                row.coop_id,
                row.livestock_id,
                row.analysis_date.format(DATE_FMT).to_string(),
                row.mortality_count,
                row.mortality_rate,
                row.current_population,
                row.efficiency_score,
                row.fcr,
                row.revenue,
                row.feed_consumed_kg,
                row.calculated_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(())
    }

    /// 写入告警（同一 livestock/date/type 唯一）
    ///
    /// 已存在且未处理的告警刷新严重度、指标与文案；已处理的保持原样
    ///
    /// # 返回
    /// - true: 新建
    /// - false: 已存在
    pub fn upsert_alert_in(conn: &Connection, alert: &AnalyticsAlert) -> RepositoryResult<bool> {
        let alert_date = alert.alert_date.format(DATE_FMT).to_string();
        let existing: Option<i64> = conn
            .query_row(
                r#"
                SELECT 1 FROM analytics_alert
                WHERE livestock_id = ?1 AND alert_date = ?2 AND alert_type = ?3
                "#,
                params![alert.livestock_id, alert_date, alert.alert_type.as_str()],
                |row| row.get(0),
            )
            .optional()?;

        conn.execute(
            r#"
            INSERT INTO analytics_alert (
                id, livestock_id, farm_id, coop_id, alert_date, alert_type, severity,
                title, message, metric_value, threshold_value, is_resolved, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(livestock_id, alert_date, alert_type) DO UPDATE SET
                severity = excluded.severity,
                title = excluded.title,
                message = excluded.message,
                metric_value = excluded.metric_value,
                threshold_value = excluded.threshold_value
            WHERE analytics_alert.is_resolved = 0
            "#,
            params![
                alert.id,
                alert.livestock_id,
                alert.farm_id,
                alert.coop_id,
                alert_date,
                alert.alert_type.as_str(),
                alert.severity.as_str(),
                alert.title,
                alert.message,
                alert.metric_value,
                alert.threshold_value,
                alert.is_resolved,
                alert.created_at.format(DATETIME_FMT).to_string(),
            ],
        )?;
        Ok(existing.is_none())
    }

    /// 查询分析行
    pub fn find(&self, livestock_id: &str, date: NaiveDate) -> RepositoryResult<Option<DailyAnalytics>> {
        let conn = self.get_conn()?;
        let raw = conn
            .query_row(
                r#"
                SELECT farm_id, coop_id, livestock_id, analysis_date, mortality_count,
                       mortality_rate, current_population, efficiency_score, fcr,
                       revenue, feed_consumed_kg, calculated_at
                FROM daily_analytics
                WHERE livestock_id = ?1 AND analysis_date = ?2
                "#,
                params![livestock_id, date.format(DATE_FMT).to_string()],
                |row| {
                    Ok((
                        (
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ),
                        (
                            row.get::<_, i64>(4)?,
                            row.get::<_, f64>(5)?,
                            row.get::<_, i64>(6)?,
                            row.get::<_, f64>(7)?,
                            row.get::<_, Option<f64>>(8)?,
                            row.get::<_, f64>(9)?,
                            row.get::<_, f64>(10)?,
                            row.get::<_, String>(11)?,
                        ),
                    ))
                },
            )
            .optional()?;

        let Some((keys, metrics)) = raw else {
            return Ok(None);
        };
        let (farm_id, coop_id, livestock_id, analysis_date) = keys;
        let (
            mortality_count,
            mortality_rate,
            current_population,
            efficiency_score,
            fcr,
            revenue,
            feed_consumed_kg,
            calculated_at,
        ) = metrics;

        Ok(Some(DailyAnalytics {
            farm_id,
            coop_id,
            livestock_id,
            analysis_date: parse_date("daily_analytics.analysis_date", &analysis_date)?,
            mortality_count,
            mortality_rate,
            current_population,
            efficiency_score,
            fcr,
            revenue,
            feed_consumed_kg,
            calculated_at: parse_datetime("daily_analytics.calculated_at", &calculated_at)?,
        }))
    }

    /// 查询批次某日的告警
    pub fn list_alerts(&self, livestock_id: &str, date: NaiveDate) -> RepositoryResult<Vec<AnalyticsAlert>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, livestock_id, farm_id, coop_id, alert_date, alert_type, severity,
                   title, message, metric_value, threshold_value, is_resolved, created_at
            FROM analytics_alert
            WHERE livestock_id = ?1 AND alert_date = ?2
            ORDER BY alert_type
            "#,
        )?;
        let raws = stmt
            .query_map(params![livestock_id, date.format(DATE_FMT).to_string()], |row| {
                Ok(RawAlert {
                    id: row.get(0)?,
                    livestock_id: row.get(1)?,
                    farm_id: row.get(2)?,
                    coop_id: row.get(3)?,
                    alert_date: row.get(4)?,
                    alert_type: row.get(5)?,
                    severity: row.get(6)?,
                    title: row.get(7)?,
                    message: row.get(8)?,
                    metric_value: row.get(9)?,
                    threshold_value: row.get(10)?,
                    is_resolved: row.get(11)?,
                    created_at: row.get(12)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawAlert::into_alert).collect()
    }

    /// 告警总数
    pub fn count_alerts(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let n = conn.query_row("SELECT COUNT(*) FROM analytics_alert", [], |row| row.get(0))?;
        Ok(n)
    }
}

struct RawAlert {
    id: String,
    livestock_id: String,
    farm_id: String,
    coop_id: String,
    alert_date: String,
    alert_type: String,
    severity: String,
    title: String,
    message: String,
    metric_value: f64,
    threshold_value: f64,
    is_resolved: bool,
    created_at: String,
}

impl RawAlert {
    fn into_alert(self) -> RepositoryResult<AnalyticsAlert> {
        let alert_type = match self.alert_type.as_str() {
            "HIGH_MORTALITY" => AlertType::HighMortality,
            "POOR_FCR" => AlertType::PoorFcr,
            "LOW_EFFICIENCY" => AlertType::LowEfficiency,
            other => {
                return Err(RepositoryError::FieldValueError {
                    field: "analytics_alert.alert_type".to_string(),
                    message: format!("未知告警类型: {}", other),
                })
            }
        };
        let severity = match self.severity.as_str() {
            "CRITICAL" => AlertSeverity::Critical,
            _ => AlertSeverity::Warning,
        };

        Ok(AnalyticsAlert {
            alert_date: parse_date("analytics_alert.alert_date", &self.alert_date)?,
            created_at: parse_datetime("analytics_alert.created_at", &self.created_at)?,
            alert_type,
            severity,
            id: self.id,
            livestock_id: self.livestock_id,
            farm_id: self.farm_id,
            coop_id: self.coop_id,
            title: self.title,
            message: self.message,
            metric_value: self.metric_value,
            threshold_value: self.threshold_value,
            is_resolved: self.is_resolved,
        })
    }
}
