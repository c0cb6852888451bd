// ==========================================
// 养殖场存栏核心 - 日度指标计算与阈值告警
// ==========================================
// 纯函数: 不读写数据库
// 告警去重由仓储层的唯一约束保证
// ==========================================

use crate::config::AlertThresholds;
use crate::domain::analytics::{AnalyticsAlert, DailyAnalytics};
use crate::domain::types::{AlertSeverity, AlertType};
use chrono::NaiveDateTime;
use uuid::Uuid;

/// 效率评分中死亡率的权重（其余为 FCR）
const SURVIVAL_WEIGHT: f64 = 0.6;
const FCR_WEIGHT: f64 = 0.4;

/// 日死亡率（0-1）；存栏为 0 时为 0
pub fn mortality_rate(mortality_count: i64, population: i64) -> f64 {
    if population <= 0 {
        return 0.0;
    }
    mortality_count as f64 / population as f64
}

/// 料肉比 = 饲料消耗 / 增重；增重不大于 0 时无定义
pub fn feed_conversion_ratio(feed_consumed_kg: f64, weight_gain_kg: f64) -> Option<f64> {
    if weight_gain_kg <= 0.0 {
        return None;
    }
    Some(round2(feed_consumed_kg / weight_gain_kg))
}

/// 效率评分（0-100，保留 2 位小数）
///
/// - 存活分量: 1 - min(死亡率 / 严重阈值, 1)
/// - FCR 分量: min(目标 FCR / FCR, 1)，FCR 无定义时记满分
pub fn efficiency_score(rate: f64, fcr: Option<f64>, thresholds: &AlertThresholds) -> f64 {
    let survival = if thresholds.mortality_critical_rate > 0.0 {
        1.0 - (rate / thresholds.mortality_critical_rate).min(1.0)
    } else if rate > 0.0 {
        0.0
    } else {
        1.0
    };

    let fcr_component = match fcr {
        Some(v) if v > 0.0 => (thresholds.target_fcr / v).min(1.0),
        _ => 1.0,
    };

    round2(100.0 * (SURVIVAL_WEIGHT * survival + FCR_WEIGHT * fcr_component))
}

/// 按阈值生成告警（未落库）
pub fn evaluate(
    row: &DailyAnalytics,
    thresholds: &AlertThresholds,
    now: NaiveDateTime,
) -> Vec<AnalyticsAlert> {
    let mut alerts = Vec::new();

    if row.mortality_count > 0 && row.mortality_rate >= thresholds.mortality_warning_rate {
        let (severity, threshold) = if row.mortality_rate >= thresholds.mortality_critical_rate {
            (AlertSeverity::Critical, thresholds.mortality_critical_rate)
        } else {
            (AlertSeverity::Warning, thresholds.mortality_warning_rate)
        };
        alerts.push(make_alert(
            row,
            AlertType::HighMortality,
            severity,
            "死亡率过高".to_string(),
            format!(
                "{} 死亡 {} 只，存栏 {}，死亡率 {:.2}%（阈值 {:.2}%）",
                row.analysis_date,
                row.mortality_count,
                row.current_population,
                row.mortality_rate * 100.0,
                threshold * 100.0
            ),
            row.mortality_rate,
            threshold,
            now,
        ));
    }

    if let Some(fcr) = row.fcr {
        if fcr > thresholds.fcr_warning {
            alerts.push(make_alert(
                row,
                AlertType::PoorFcr,
                AlertSeverity::Warning,
                "料肉比偏高".to_string(),
                format!("{} FCR {:.2}（阈值 {:.2}）", row.analysis_date, fcr, thresholds.fcr_warning),
                fcr,
                thresholds.fcr_warning,
                now,
            ));
        }
    }

    if row.efficiency_score < thresholds.efficiency_warning {
        alerts.push(make_alert(
            row,
            AlertType::LowEfficiency,
            AlertSeverity::Warning,
            "综合效率偏低".to_string(),
            format!(
                "{} 效率评分 {:.2}（阈值 {:.2}）",
                row.analysis_date, row.efficiency_score, thresholds.efficiency_warning
            ),
            row.efficiency_score,
            thresholds.efficiency_warning,
            now,
        ));
    }

    alerts
}

#[allow(clippy::too_many_arguments)]
fn make_alert(
    row: &DailyAnalytics,
    alert_type: AlertType,
    severity: AlertSeverity,
    title: String,
    message: String,
    metric_value: f64,
    threshold_value: f64,
    now: NaiveDateTime,
) -> AnalyticsAlert {
    AnalyticsAlert {
        id: Uuid::new_v4().to_string(),
        livestock_id: row.livestock_id.clone(),
        farm_id: row.farm_id.clone(),
        coop_id: row.coop_id.clone(),
        alert_date: row.analysis_date,
        alert_type,
        severity,
        title,
        message,
        metric_value,
        threshold_value,
        is_resolved: false,
        created_at: now,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
