// ==========================================
// 养殖场存栏核心 - 引擎配置
// ==========================================
// 各引擎构造时显式传入，不做全局查找
// ==========================================

use serde::{Deserialize, Serialize};

/// 告警阈值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    /// 日死亡率告警（0-1）
    pub mortality_warning_rate: f64,
    /// 日死亡率严重告警（0-1）
    pub mortality_critical_rate: f64,
    /// FCR 高于该值告警
    pub fcr_warning: f64,
    /// 效率评分低于该值告警（0-100）
    pub efficiency_warning: f64,
    /// 目标 FCR（效率评分用）
    pub target_fcr: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            mortality_warning_rate: 0.01,
            mortality_critical_rate: 0.03,
            fcr_warning: 2.0,
            efficiency_warning: 60.0,
            target_fcr: 1.6,
        }
    }
}

/// 核心配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmCoreConfig {
    /// 优先使用已迁移的规范化 metadata
    pub use_modular_services: bool,
    /// metadata 缺失时回退到原始字符串规范化
    pub use_legacy_fallback: bool,
    /// 迁移默认块大小
    pub migration_batch_size: usize,
    pub thresholds: AlertThresholds,
}

impl Default for FarmCoreConfig {
    fn default() -> Self {
        Self {
            use_modular_services: true,
            use_legacy_fallback: true,
            migration_batch_size: 100,
            thresholds: AlertThresholds::default(),
        }
    }
}

impl FarmCoreConfig {
    /// 校验阈值组合
    pub fn validate(&self) -> Result<(), String> {
        let t = &self.thresholds;
        if self.migration_batch_size == 0 {
            return Err("migration_batch_size 必须大于 0".to_string());
        }
        if !(0.0..=1.0).contains(&t.mortality_warning_rate)
            || !(0.0..=1.0).contains(&t.mortality_critical_rate)
        {
            return Err("死亡率阈值必须在 0-1 之间".to_string());
        }
        if t.mortality_critical_rate < t.mortality_warning_rate {
            return Err(format!(
                "mortality_critical_rate({}) 不能小于 mortality_warning_rate({})",
                t.mortality_critical_rate, t.mortality_warning_rate
            ));
        }
        if t.target_fcr <= 0.0 || t.fcr_warning <= 0.0 {
            return Err("FCR 阈值必须大于 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(FarmCoreConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_mortality_thresholds() {
        let mut cfg = FarmCoreConfig::default();
        cfg.thresholds.mortality_critical_rate = 0.005;
        assert!(cfg.validate().is_err());

        let mut cfg = FarmCoreConfig::default();
        cfg.migration_batch_size = 0;
        assert!(cfg.validate().is_err());
    }
}
