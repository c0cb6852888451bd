// ==========================================
// 养殖场存栏核心 - 减员类型规范化
// ==========================================
// 职责: 历史原始字符串 → 规范类型 → 类别 → 显示名
// 红线: 纯函数、全函数（未知值落入 Other）、确定性
// ==========================================

use crate::domain::types::{DepletionCategory, DepletionType};

/// 历史原始字符串映射表（比较前统一 trim + 小写）
const LEGACY_ALIASES: &[(&str, DepletionType)] = &[
    // 死亡
    ("mati", DepletionType::Death),
    ("kematian", DepletionType::Death),
    ("death", DepletionType::Death),
    ("dead", DepletionType::Death),
    ("mortality", DepletionType::Death),
    ("mortalitas", DepletionType::Death),
    // 淘汰
    ("afkir", DepletionType::Culled),
    ("culled", DepletionType::Culled),
    ("culling", DepletionType::Culled),
    ("cull", DepletionType::Culled),
    // 销售
    ("jual", DepletionType::Sales),
    ("penjualan", DepletionType::Sales),
    ("sales", DepletionType::Sales),
    ("sale", DepletionType::Sales),
    ("sold", DepletionType::Sales),
    // 调拨
    ("mutasi", DepletionType::Mutation),
    ("mutation", DepletionType::Mutation),
    ("transfer", DepletionType::Mutation),
    ("pindah", DepletionType::Mutation),
    // 其他
    ("lainnya", DepletionType::Other),
    ("other", DepletionType::Other),
];

/// 原始字符串 → 规范类型
///
/// 大小写与首尾空白不敏感；连字符/下划线视同空格。
/// 未识别的值返回 `DepletionType::Other`。
pub fn normalize(raw: &str) -> DepletionType {
    let key = canonical_form(raw);
    LEGACY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, t)| *t)
        .unwrap_or(DepletionType::Other)
}

/// 原始字符串是否为已知写法（未知值也会规范化为 Other，此函数用于报表区分）
pub fn is_recognized(raw: &str) -> bool {
    let key = canonical_form(raw);
    LEGACY_ALIASES.iter().any(|(alias, _)| *alias == key)
}

/// 规范类型 → 类别
pub fn category(t: DepletionType) -> DepletionCategory {
    match t {
        DepletionType::Death | DepletionType::Culled => DepletionCategory::Mortality,
        DepletionType::Sales => DepletionCategory::Commercial,
        DepletionType::Mutation => DepletionCategory::Transfer,
        DepletionType::Other => DepletionCategory::Other,
    }
}

/// 规范类型 → 显示名
pub fn display_name(t: DepletionType) -> &'static str {
    match t {
        DepletionType::Death => "Kematian",
        DepletionType::Culled => "Afkir",
        DepletionType::Sales => "Penjualan",
        DepletionType::Mutation => "Mutasi",
        DepletionType::Other => "Lainnya",
    }
}

/// 规范类型 → 历史写法（向后兼容旧报表）
pub fn to_legacy(t: DepletionType) -> &'static str {
    match t {
        DepletionType::Death => "Mati",
        DepletionType::Culled => "Afkir",
        DepletionType::Sales => "Jual",
        DepletionType::Mutation => "Mutasi",
        DepletionType::Other => "Lainnya",
    }
}

fn canonical_form(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
