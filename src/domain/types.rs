// ==========================================
// 养殖场存栏核心 - 领域类型定义
// ==========================================
// 序列化格式与数据库存储值保持一致
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 减员类型 (Depletion Type) - 规范化后的枚举
// ==========================================
// 红线: 所有历史原始字符串都必须落到其中之一（含 Other 兜底）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepletionType {
    Death,    // 死亡
    Culled,   // 淘汰（afkir）
    Sales,    // 出售
    Mutation, // 转群/调拨
    Other,    // 未识别
}

impl DepletionType {
    /// 全部规范值（按固定顺序）
    pub const ALL: [DepletionType; 5] = [
        DepletionType::Death,
        DepletionType::Culled,
        DepletionType::Sales,
        DepletionType::Mutation,
        DepletionType::Other,
    ];

    /// 规范键（数据库 metadata.normalized_type 的取值）
    pub fn as_str(&self) -> &'static str {
        match self {
            DepletionType::Death => "death",
            DepletionType::Culled => "culled",
            DepletionType::Sales => "sales",
            DepletionType::Mutation => "mutation",
            DepletionType::Other => "other",
        }
    }

    /// 从规范键解析（不做模糊匹配，模糊匹配见 engine::normalizer）
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == key)
    }
}

impl fmt::Display for DepletionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 减员类别 (Depletion Category)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepletionCategory {
    Mortality,  // 死亡/淘汰
    Commercial, // 销售
    Transfer,   // 调拨
    Other,
}

impl DepletionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepletionCategory::Mortality => "mortality",
            DepletionCategory::Commercial => "commercial",
            DepletionCategory::Transfer => "transfer",
            DepletionCategory::Other => "other",
        }
    }
}

impl fmt::Display for DepletionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 批次状态 (Livestock Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivestockStatus {
    Active, // 饲养中
    Closed, // 已出栏
}

impl LivestockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LivestockStatus::Active => "active",
            LivestockStatus::Closed => "closed",
        }
    }

    /// 从数据库字符串解析，未知值按 Active 处理
    pub fn from_db(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "closed" => LivestockStatus::Closed,
            _ => LivestockStatus::Active,
        }
    }
}

impl fmt::Display for LivestockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 告警类型 / 告警级别
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    HighMortality,
    PoorFcr,
    LowEfficiency,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::HighMortality => "HIGH_MORTALITY",
            AlertType::PoorFcr => "POOR_FCR",
            AlertType::LowEfficiency => "LOW_EFFICIENCY",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Warning => "WARNING",
            AlertSeverity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depletion_type_key_roundtrip() {
        for t in DepletionType::ALL {
            assert_eq!(DepletionType::from_key(t.as_str()), Some(t));
        }
        assert_eq!(DepletionType::from_key("Mati"), None);
    }

    #[test]
    fn test_depletion_type_serde_matches_key() {
        let json = serde_json::to_string(&DepletionType::Culled).unwrap();
        assert_eq!(json, "\"culled\"");
    }

    #[test]
    fn test_livestock_status_from_db() {
        assert_eq!(LivestockStatus::from_db("CLOSED"), LivestockStatus::Closed);
        assert_eq!(LivestockStatus::from_db("active"), LivestockStatus::Active);
        assert_eq!(LivestockStatus::from_db("???"), LivestockStatus::Active);
    }
}
