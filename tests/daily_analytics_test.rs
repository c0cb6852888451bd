// ==========================================
// 日度分析集成测试
// ==========================================
// 测试范围:
// 1. 多批次单日计算 + 告警
// 2. 区间重跑: 行唯一、告警去重
// 3. config_kv 阈值覆写生效
// 4. 迁移前后死亡数一致
// ==========================================

mod test_helpers;

use farm_livestock_core::config::{config_keys, ConfigManager, FarmCoreConfig};
use farm_livestock_core::domain::{AlertType, SystemOperator};
use farm_livestock_core::engine::{date_window, DailyAnalyticsAggregator, DepletionTypeMigrator};
use farm_livestock_core::repository::{AnalyticsRepository, SqliteProductionRepository};
use test_helpers::{date, insert_batch, insert_depletions, make_batch, setup_shared_db};

#[test]
fn test_daily_rows_per_batch_with_alerts() {
    let (_tmp, conn) = setup_shared_db();
    insert_batch(&conn, &make_batch("LB-A", "K01", 500, date(2025, 3, 1)));
    insert_batch(&conn, &make_batch("LB-B", "K02", 1000, date(2025, 3, 1)));
    insert_depletions(
        &conn,
        "LB-A",
        &[(date(2025, 3, 5), "Mati", 5), (date(2025, 3, 5), "Jual", 20)],
    );
    insert_depletions(&conn, "LB-B", &[(date(2025, 3, 5), "Mati", 40)]);

    let production = SqliteProductionRepository::new(conn.clone());
    production.insert_feed_usage("LB-A", date(2025, 3, 5), 64.0).unwrap();
    production.insert_recording("LB-A", date(2025, 3, 5), 40.0).unwrap();
    production.insert_sale("LB-A", date(2025, 3, 5), 20, 900_000.0).unwrap();

    let engine = DailyAnalyticsAggregator::new(conn.clone(), FarmCoreConfig::default());
    let report = engine
        .calculate_for_date(date(2025, 3, 5), false, &SystemOperator)
        .unwrap();
    assert_eq!(report.rows_written, 2);
    assert!(report.errors.is_empty());

    let analytics = AnalyticsRepository::new(conn);
    let a = analytics.find("LB-A", date(2025, 3, 5)).unwrap().unwrap();
    assert_eq!(a.mortality_count, 5);
    assert_eq!(a.mortality_rate, 0.01);
    assert_eq!(a.fcr, Some(1.6));
    assert_eq!(a.revenue, 900_000.0);

    let b = analytics.find("LB-B", date(2025, 3, 5)).unwrap().unwrap();
    assert_eq!(b.mortality_rate, 0.04);
    let b_alerts = analytics.list_alerts("LB-B", date(2025, 3, 5)).unwrap();
    assert!(b_alerts.iter().any(|a| a.alert_type == AlertType::HighMortality));
}

#[test]
fn test_range_rerun_keeps_one_row_and_one_alert() {
    let (_tmp, conn) = setup_shared_db();
    insert_batch(&conn, &make_batch("LB-A", "K01", 500, date(2025, 3, 1)));
    insert_depletions(
        &conn,
        "LB-A",
        &[(date(2025, 3, 2), "Mati", 10), (date(2025, 3, 4), "Mati", 1)],
    );

    let engine = DailyAnalyticsAggregator::new(conn.clone(), FarmCoreConfig::default());
    let (start, end) = date_window(date(2025, 3, 4), 4).unwrap();
    assert_eq!(start, date(2025, 3, 1));

    let first = engine.calculate_range(start, end, false, &SystemOperator).unwrap();
    assert_eq!(first.dates_processed(), 4);
    assert_eq!(first.rows_written(), 4);
    assert_eq!(first.alerts_created(), 1);

    let skipped = engine.calculate_range(start, end, false, &SystemOperator).unwrap();
    assert_eq!(skipped.rows_skipped(), 4);
    assert_eq!(skipped.rows_written(), 0);

    let forced = engine.calculate_range(start, end, true, &SystemOperator).unwrap();
    assert_eq!(forced.rows_written(), 4);
    assert_eq!(forced.alerts_created(), 0);

    let analytics = AnalyticsRepository::new(conn);
    assert_eq!(analytics.count_alerts().unwrap(), 1);
    let day4 = analytics.find("LB-A", date(2025, 3, 4)).unwrap().unwrap();
    assert_eq!(day4.current_population, 490);
    assert_eq!(day4.mortality_count, 1);
}

#[test]
fn test_threshold_override_from_config_kv() {
    let (_tmp, conn) = setup_shared_db();
    insert_batch(&conn, &make_batch("LB-A", "K01", 1000, date(2025, 3, 1)));
    insert_depletions(&conn, "LB-A", &[(date(2025, 3, 2), "Mati", 5)]);

    let manager = ConfigManager::from_connection(conn.clone());
    manager
        .set_global_config_value(config_keys::MORTALITY_WARNING_RATE, "0.004")
        .unwrap();
    let config = manager.load_core_config().unwrap();
    assert_eq!(config.thresholds.mortality_warning_rate, 0.004);

    let report = DailyAnalyticsAggregator::new(conn, config)
        .calculate_for_date(date(2025, 3, 2), false, &SystemOperator)
        .unwrap();
    assert_eq!(report.alerts_created, 1);
}

#[test]
fn test_death_count_is_stable_across_migration() {
    let (_tmp, conn) = setup_shared_db();
    insert_batch(&conn, &make_batch("LB-A", "K01", 1000, date(2025, 3, 1)));
    insert_depletions(
        &conn,
        "LB-A",
        &[
            (date(2025, 3, 2), "Mati", 4),
            (date(2025, 3, 2), "MORTALITAS", 2),
            (date(2025, 3, 2), "Afkir", 9),
        ],
    );
    let engine = DailyAnalyticsAggregator::new(conn.clone(), FarmCoreConfig::default());
    let analytics = AnalyticsRepository::new(conn.clone());

    engine.calculate_for_date(date(2025, 3, 2), false, &SystemOperator).unwrap();
    let before = analytics.find("LB-A", date(2025, 3, 2)).unwrap().unwrap();
    assert_eq!(before.mortality_count, 6);

    DepletionTypeMigrator::new(conn.clone(), FarmCoreConfig::default())
        .migrate_legacy_data(2, false, &SystemOperator)
        .unwrap();

    let strict = FarmCoreConfig {
        use_legacy_fallback: false,
        ..Default::default()
    };
    DailyAnalyticsAggregator::new(conn, strict)
        .calculate_for_date(date(2025, 3, 2), true, &SystemOperator)
        .unwrap();
    let after = analytics.find("LB-A", date(2025, 3, 2)).unwrap().unwrap();
    assert_eq!(after.mortality_count, 6);
}
