// ==========================================
// 养殖场存栏核心 - 日度分析领域模型
// ==========================================
// 对齐: daily_analytics / analytics_alert 表
// 红线: (farm, coop, livestock, date) 每天至多一行
// ==========================================

use crate::domain::types::{AlertSeverity, AlertType};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// DailyAnalytics - 日度分析行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAnalytics {
    pub farm_id: String,
    pub coop_id: String,
    pub livestock_id: String,
    pub analysis_date: NaiveDate,

    pub mortality_count: i64,
    /// 0-1 比率口径
    pub mortality_rate: f64,
    /// 当天开始时的存栏
    pub current_population: i64,
    /// 0-100
    pub efficiency_score: f64,
    /// 增重为 0 时无定义
    pub fcr: Option<f64>,
    pub revenue: f64,
    pub feed_consumed_kg: f64,

    pub calculated_at: NaiveDateTime,
}

// ==========================================
// AnalyticsAlert - 阈值告警
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsAlert {
    pub id: String,
    pub livestock_id: String,
    pub farm_id: String,
    pub coop_id: String,
    pub alert_date: NaiveDate,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub metric_value: f64,
    pub threshold_value: f64,
    pub is_resolved: bool,
    pub created_at: NaiveDateTime,
}

// ==========================================
// ProductionInputs - 外部饲料/销售数据（单日）
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductionInputs {
    pub feed_consumed_kg: f64,
    pub weight_gain_kg: f64,
    pub revenue: f64,
}

/// 某日之前（不含当日）的累计流出
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorOutflow {
    pub depleted: i64,
    pub sold: i64,
    pub mutated: i64,
}

impl PriorOutflow {
    pub fn total(&self) -> i64 {
        self.depleted + self.sold + self.mutated
    }
}
