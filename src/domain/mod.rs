// ==========================================
// 养殖场存栏核心 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、操作人接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod analytics;
pub mod depletion;
pub mod livestock;
pub mod operator;
pub mod types;

// 重导出核心类型
pub use analytics::{AnalyticsAlert, DailyAnalytics, PriorOutflow, ProductionInputs};
pub use depletion::{is_metadata_blank, DepletionEvent, DepletionMetadata};
pub use livestock::{CurrentLivestock, FormulaInputs, LivestockBatch, QuantityAudit};
pub use operator::{NamedOperator, RoleChecker, SystemOperator, ADMIN_ROLES};
pub use types::{AlertSeverity, AlertType, DepletionCategory, DepletionType, LivestockStatus};
