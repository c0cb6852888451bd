// ==========================================
// 养殖场存栏核心 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 范围: 存栏对账、减员类型迁移、日度分析与告警
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 特性开关与阈值
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AlertSeverity, AlertType, DepletionCategory, DepletionType, LivestockStatus};

// 领域实体
pub use domain::{
    AnalyticsAlert, CurrentLivestock, DailyAnalytics, DepletionEvent, DepletionMetadata,
    LivestockBatch, QuantityAudit,
};

// 操作人
pub use domain::operator::{NamedOperator, RoleChecker, SystemOperator, ADMIN_ROLES};

// 配置
pub use config::{ConfigManager, FarmCoreConfig};

// 引擎
pub use engine::{
    DailyAnalyticsAggregator, DepletionAggregator, DepletionTypeMigrator, EngineError,
    EngineResult, QuantityReconciler,
};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "farm-livestock-core";
