// ==========================================
// 养殖场存栏核心 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod analytics_repo;
pub mod depletion_repo;
pub mod error;
pub mod livestock_repo;
pub mod production_repo;

// 重导出核心仓储
pub use analytics_repo::AnalyticsRepository;
pub use depletion_repo::DepletionRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use livestock_repo::{CurrentLivestockRepository, LivestockRepository, RecalcLogEntry};
pub use production_repo::{ProductionDataRepository, SqliteProductionRepository};
