// ==========================================
// 养殖场存栏核心 - 减员记录领域模型
// ==========================================
// 对齐: livestock_depletion 表
// 红线: 记录创建后不可修改，仅允许回填 metadata
// ==========================================

use crate::domain::types::{DepletionCategory, DepletionType};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

// ==========================================
// DepletionEvent - 减员记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepletionEvent {
    pub id: i64,
    pub livestock_id: String,
    pub depletion_date: NaiveDate,
    /// 原始减员类型字符串（历史数据为印尼语/英语混写）
    pub jenis: String,
    pub quantity: i64,
    /// 原始 metadata 文本（未迁移时为 None 或空）
    pub metadata_raw: Option<String>,
}

impl DepletionEvent {
    /// metadata 是否缺失（迁移选择条件）
    pub fn is_unmigrated(&self) -> bool {
        is_metadata_blank(self.metadata_raw.as_deref())
    }

    /// 解析 metadata（缺失返回 Ok(None)，格式错误返回 Err）
    pub fn metadata(&self) -> Result<Option<DepletionMetadata>, serde_json::Error> {
        match self.metadata_raw.as_deref() {
            Some(raw) if !is_metadata_blank(Some(raw)) => serde_json::from_str(raw).map(Some),
            _ => Ok(None),
        }
    }
}

/// metadata 判空前剥离的字符（与 SQL 侧 TRIM 的字符集相同）
pub const METADATA_TRIM_CHARS: &[char] = &[' ', '\t', '\n', '\r'];

/// 迁移选择条件: NULL / 空串 / 空对象 / 空数组
pub fn is_metadata_blank(raw: Option<&str>) -> bool {
    match raw.map(|s| s.trim_matches(METADATA_TRIM_CHARS)) {
        None => true,
        Some(s) => s.is_empty() || s == "{}" || s == "[]" || s.eq_ignore_ascii_case("null"),
    }
}

// ==========================================
// DepletionMetadata - 规范化后的减员元数据
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepletionMetadata {
    pub normalized_type: DepletionType,
    pub depletion_category: DepletionCategory,
    pub display_name: String,
    /// 迁移前的原始字符串
    pub original_type: String,
    pub migrated_at: NaiveDateTime,
    /// 历史 metadata 中的其他键（原样保留）
    #[serde(default, skip_serializing_if = "Map::is_empty", flatten)]
    pub extra: Map<String, JsonValue>,
}
