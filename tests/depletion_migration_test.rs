// ==========================================
// 减员类型迁移集成测试
// ==========================================
// 测试范围:
// 1. 分块迁移完成后无未迁移记录
// 2. 重跑无写入
// 3. 迁移结果与规范化函数一致
// ==========================================

mod test_helpers;

use farm_livestock_core::config::FarmCoreConfig;
use farm_livestock_core::domain::{DepletionCategory, DepletionType, SystemOperator};
use farm_livestock_core::engine::{normalizer, DepletionTypeMigrator};
use farm_livestock_core::repository::DepletionRepository;
use test_helpers::{date, insert_batch, insert_depletions, make_batch, setup_shared_db};

const RAW_TYPES: [&str; 8] = ["Mati", "AFKIR", " jual ", "Mutasi", "dead", "culling", "foo", "Lainnya"];

#[test]
fn test_chunked_migration_reaches_completion() {
    let (_tmp, conn) = setup_shared_db();
    insert_batch(&conn, &make_batch("LB-1", "K01", 10_000, date(2025, 1, 1)));
    let events: Vec<_> = (0..53)
        .map(|i| (date(2025, 1, 2), RAW_TYPES[i % RAW_TYPES.len()], 1))
        .collect();
    insert_depletions(&conn, "LB-1", &events);

    let migrator = DepletionTypeMigrator::new(conn.clone(), FarmCoreConfig::default());
    let before = migrator.status().unwrap();
    assert_eq!(before.unmigrated, 53);
    assert_eq!(before.percent, 0.0);

    let report = migrator.migrate_legacy_data(10, false, &SystemOperator).unwrap();
    assert_eq!(report.processed, 53);
    assert_eq!(report.updated, 53);
    assert!(report.errors.is_empty());

    let after = migrator.status().unwrap();
    assert!(after.complete);
    assert_eq!(after.migrated, 53);
    assert_eq!(after.percent, 100.0);

    let rerun = migrator.migrate_legacy_data(10, false, &SystemOperator).unwrap();
    assert_eq!(rerun.processed, 0);
}

#[test]
fn test_migrated_metadata_matches_normalizer() {
    let (_tmp, conn) = setup_shared_db();
    insert_batch(&conn, &make_batch("LB-1", "K01", 10_000, date(2025, 1, 1)));
    let events: Vec<_> = RAW_TYPES.iter().map(|raw| (date(2025, 1, 2), *raw, 1)).collect();
    insert_depletions(&conn, "LB-1", &events);

    DepletionTypeMigrator::new(conn.clone(), FarmCoreConfig::default())
        .migrate_legacy_data(3, false, &SystemOperator)
        .unwrap();

    let stored = DepletionRepository::new(conn)
        .fetch_chunk_after(0, 100, false)
        .unwrap();
    assert_eq!(stored.len(), RAW_TYPES.len());
    for event in &stored {
        let meta = event.metadata().unwrap().unwrap();
        let expected = normalizer::normalize(&event.jenis);
        assert_eq!(meta.normalized_type, expected);
        assert_eq!(meta.depletion_category, normalizer::category(expected));
        assert_eq!(meta.display_name, normalizer::display_name(expected));
        assert_eq!(meta.original_type, event.jenis);
    }

    let foo = stored.iter().find(|e| e.jenis == "foo").unwrap();
    let meta = foo.metadata().unwrap().unwrap();
    assert_eq!(meta.normalized_type, DepletionType::Other);
    assert_eq!(meta.depletion_category, DepletionCategory::Other);
}
