// ==========================================
// 养殖场存栏核心 - 批量执行汇总
// ==========================================
// 批量/区间命令逐单元隔离失败，最终统一汇总
// ==========================================

use serde::{Deserialize, Serialize};

/// 单元失败记录（单元 = 一个批次 / 一条记录 / 一个日期）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitError {
    pub unit: String,
    pub message: String,
}

impl UnitError {
    pub fn new(unit: impl Into<String>, message: impl ToString) -> Self {
        Self {
            unit: unit.into(),
            message: message.to_string(),
        }
    }
}

/// 进度日志的步长（总数较大时每 N 个单元输出一次）
pub(crate) fn progress_step(total: usize) -> usize {
    match total {
        0..=50 => 1,
        51..=1000 => 10,
        _ => 100,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_step() {
        assert_eq!(progress_step(0), 1);
        assert_eq!(progress_step(50), 1);
        assert_eq!(progress_step(51), 10);
        assert_eq!(progress_step(5000), 100);
    }
}
