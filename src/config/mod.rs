// ==========================================
// 养殖场存栏核心 - 配置层
// ==========================================
// 职责: 引擎配置结构 + config_kv 覆写加载
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod core_config;

// 重导出核心配置
pub use config_manager::{config_keys, ConfigManager};
pub use core_config::{AlertThresholds, FarmCoreConfig};
