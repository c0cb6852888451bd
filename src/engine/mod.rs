// ==========================================
// 养殖场存栏核心 - 引擎层
// ==========================================
// 职责: 对账、类型规范化与迁移、日度分析
// 红线: 引擎不拼 SQL；写操作需管理员类角色
// ==========================================

pub mod alert;
pub mod analytics;
pub mod depletion_aggregator;
pub mod error;
pub mod migration;
pub mod normalizer;
pub mod reconciler;
pub mod report;

// 重导出核心引擎
pub use analytics::{date_window, DailyAnalyticsAggregator, DayReport, RangeReport};
pub use depletion_aggregator::DepletionAggregator;
pub use error::{EngineError, EngineResult};
pub use migration::{
    DepletionTypeMigrator, MigrationPreview, MigrationReport, MigrationStatus, TypeMapping,
};
pub use reconciler::{
    QuantityReconciler, ReconcileOptions, ReconcileOutcome, ReconcileReport, ReconcileStatus,
};
pub use report::UnitError;
