// ==========================================
// 养殖场存栏核心 - 减员类型历史数据迁移
// ==========================================
// 输入: livestock_depletion 中 metadata 缺失的记录
// 输出: 回填 {normalized_type, depletion_category, display_name, ...}
// 分页: id 游标 + 每块一个事务
// 红线: 可重复执行；中途失败后重跑只处理剩余记录
// ==========================================

use crate::config::FarmCoreConfig;
use crate::domain::depletion::{is_metadata_blank, DepletionEvent, DepletionMetadata};
use crate::domain::operator::RoleChecker;
use crate::domain::types::{DepletionCategory, DepletionType};
use crate::engine::error::{ensure_can_mutate, EngineError, EngineResult};
use crate::engine::normalizer;
use crate::engine::report::UnitError;
use crate::repository::DepletionRepository;
use chrono::{NaiveDateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::sync::{Arc, Mutex};

/// 由迁移写入的键；--force 合并历史 metadata 时这些键以新值为准
const CANONICAL_KEYS: [&str; 5] = [
    "normalized_type",
    "depletion_category",
    "display_name",
    "original_type",
    "migrated_at",
];

/// 迁移汇总
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationReport {
    pub processed: usize,
    pub updated: usize,
    pub errors: Vec<UnitError>,
}

/// 迁移进度
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub total: i64,
    pub migrated: i64,
    pub unmigrated: i64,
    /// 0-100，保留 2 位小数；无记录时为 100
    pub percent: f64,
    pub complete: bool,
}

/// dry-run 预览中的一种原始写法
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeMapping {
    pub raw: String,
    pub count: i64,
    pub normalized: DepletionType,
    pub category: DepletionCategory,
    /// false 表示落入 Other 兜底
    pub recognized: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPreview {
    /// 实际执行时将处理的记录数
    pub pending: i64,
    /// 未迁移记录的原始写法 → 规范类型
    pub mappings: Vec<TypeMapping>,
}

// ==========================================
// DepletionTypeMigrator - 历史减员类型迁移
// ==========================================
pub struct DepletionTypeMigrator {
    depletion_repo: DepletionRepository,
    config: FarmCoreConfig,
}

impl DepletionTypeMigrator {
    pub fn new(conn: Arc<Mutex<Connection>>, config: FarmCoreConfig) -> Self {
        Self {
            depletion_repo: DepletionRepository::new(conn),
            config,
        }
    }

    /// 配置中的默认块大小
    pub fn default_batch_size(&self) -> usize {
        self.config.migration_batch_size
    }

    /// 执行迁移
    ///
    /// # 参数
    /// - `batch_size`: 每块记录数（必须 > 0）
    /// - `force`: 同时重新规范化已迁移的记录
    ///
    /// # 返回
    /// - `Err`: 参数非法、权限不足、读取失败
    /// - `Ok(report)`: 单条/单块失败记录在 `report.errors` 中
    pub fn migrate_legacy_data(
        &self,
        batch_size: usize,
        force: bool,
        operator: &dyn RoleChecker,
    ) -> EngineResult<MigrationReport> {
        if batch_size == 0 {
            return Err(EngineError::Validation("batch_size 必须大于 0".to_string()));
        }
        ensure_can_mutate(operator)?;

        let pending = if force {
            self.depletion_repo.count_total()?
        } else {
            self.depletion_repo.count_unmigrated()?
        };
        tracing::info!(
            "开始减员类型迁移: pending={}, batch_size={}, force={}",
            pending,
            batch_size,
            force
        );

        let mut report = MigrationReport::default();
        let mut last_id = 0_i64;
        let mut chunk_no = 0_usize;

        loop {
            let chunk = self
                .depletion_repo
                .fetch_chunk_after(last_id, batch_size, !force)?;
            let Some(last) = chunk.last() else {
                break;
            };
            last_id = last.id;
            chunk_no += 1;

            let now = Utc::now().naive_utc();
            let result = self.depletion_repo.with_transaction(|tx| {
                let mut updated = 0_usize;
                let mut errors = Vec::new();
                for event in &chunk {
                    // 单条失败只撤销该条语句，事务继续
                    let written = build_metadata(event, force, now).and_then(|meta| {
                        let json = serde_json::to_string(&meta).map_err(|e| e.to_string())?;
                        DepletionRepository::update_metadata_in(tx, event.id, &json)
                            .map_err(|e| e.to_string())
                    });
                    match written {
                        Ok(()) => updated += 1,
                        Err(message) => {
                            tracing::warn!("减员记录迁移失败: id={}, {}", event.id, message);
                            errors.push(UnitError::new(event.id.to_string(), message));
                        }
                    }
                }
                Ok((updated, errors))
            });

            report.processed += chunk.len();
            match result {
                Ok((updated, errors)) => {
                    report.updated += updated;
                    report.errors.extend(errors);
                }
                Err(e) => {
                    // 整块已回滚，块内记录逐条计为失败
                    tracing::error!("迁移块提交失败: chunk={}, last_id={}, error={}", chunk_no, last_id, e);
                    report
                        .errors
                        .extend(chunk.iter().map(|ev| UnitError::new(ev.id.to_string(), &e)));
                }
            }

            tracing::info!(
                "迁移进度: chunk={}, processed={}/{}, updated={}",
                chunk_no,
                report.processed,
                pending,
                report.updated
            );
        }

        tracing::info!(
            "减员类型迁移结束: processed={}, updated={}, errors={}",
            report.processed,
            report.updated,
            report.errors.len()
        );
        Ok(report)
    }

    /// dry-run 预览（不写入，不校验角色）
    pub fn preview(&self, force: bool) -> EngineResult<MigrationPreview> {
        let pending = if force {
            self.depletion_repo.count_total()?
        } else {
            self.depletion_repo.count_unmigrated()?
        };
        let mappings = self
            .depletion_repo
            .unmigrated_type_counts()?
            .into_iter()
            .map(|(raw, count)| {
                let normalized = normalizer::normalize(&raw);
                TypeMapping {
                    recognized: normalizer::is_recognized(&raw),
                    category: normalizer::category(normalized),
                    normalized,
                    raw,
                    count,
                }
            })
            .collect();
        Ok(MigrationPreview { pending, mappings })
    }

    /// 迁移进度查询
    pub fn status(&self) -> EngineResult<MigrationStatus> {
        let total = self.depletion_repo.count_total()?;
        let unmigrated = self.depletion_repo.count_unmigrated()?;
        let migrated = total - unmigrated;
        let percent = if total == 0 {
            100.0
        } else {
            (migrated as f64 / total as f64 * 10_000.0).round() / 100.0
        };
        Ok(MigrationStatus {
            total,
            migrated,
            unmigrated,
            percent,
            complete: unmigrated == 0,
        })
    }
}

/// 由原始记录构造规范化 metadata
///
/// `force` 时保留历史 metadata 中的其他键；历史 metadata 不是 JSON 对象时返回错误
fn build_metadata(
    event: &DepletionEvent,
    force: bool,
    now: NaiveDateTime,
) -> Result<DepletionMetadata, String> {
    let extra = if force {
        existing_extra(event.metadata_raw.as_deref())?
    } else {
        Map::new()
    };

    if !normalizer::is_recognized(&event.jenis) {
        tracing::warn!(
            "未识别的减员类型，归入 other: id={}, jenis={:?}",
            event.id,
            event.jenis
        );
    }

    let normalized = normalizer::normalize(&event.jenis);
    Ok(DepletionMetadata {
        normalized_type: normalized,
        depletion_category: normalizer::category(normalized),
        display_name: normalizer::display_name(normalized).to_string(),
        original_type: event.jenis.clone(),
        migrated_at: now,
        extra,
    })
}

fn existing_extra(raw: Option<&str>) -> Result<Map<String, JsonValue>, String> {
    let Some(raw) = raw.filter(|r| !is_metadata_blank(Some(r))) else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(JsonValue::Object(mut map)) => {
            for key in CANONICAL_KEYS {
                map.remove(key);
            }
            Ok(map)
        }
        Ok(_) => Err("历史 metadata 不是 JSON 对象".to_string()),
        Err(e) => Err(format!("历史 metadata 解析失败: {}", e)),
    }
}
