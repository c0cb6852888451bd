// ==========================================
// 存栏对账集成测试
// ==========================================
// 测试范围:
// 1. 减员汇总 → 批次累计 → 当前存栏快照
// 2. 重复执行幂等
// 3. 存栏守恒（减员 + 销售 + 调出）
// 4. 批量模式的失败隔离
// ==========================================

mod test_helpers;

use farm_livestock_core::domain::SystemOperator;
use farm_livestock_core::engine::{
    DepletionAggregator, QuantityReconciler, ReconcileOptions, ReconcileStatus,
};
use farm_livestock_core::repository::{CurrentLivestockRepository, LivestockRepository};
use test_helpers::{date, insert_batch, insert_depletions, make_batch, setup_shared_db, stored_depletion};

#[test]
fn test_reconcile_then_new_event_then_reconcile() {
    let (_tmp, conn) = setup_shared_db();
    insert_batch(&conn, &make_batch("LB-100", "K01", 1000, date(2025, 1, 1)));
    insert_depletions(
        &conn,
        "LB-100",
        &[
            (date(2025, 1, 2), "Mati", 5),
            (date(2025, 1, 3), "Afkir", 10),
            (date(2025, 1, 4), "mati", 2),
        ],
    );

    let reconciler = QuantityReconciler::new(conn.clone());
    let first = reconciler.reconcile("LB-100", false, &SystemOperator).unwrap();
    assert_eq!(first.new_depletion, 17);
    assert_eq!(first.new_quantity, 983);

    insert_depletions(&conn, "LB-100", &[(date(2025, 1, 5), "Mati", 3)]);
    let second = reconciler.reconcile("LB-100", false, &SystemOperator).unwrap();
    assert_eq!(second.status, ReconcileStatus::Updated);
    assert_eq!(stored_depletion(&conn, "LB-100"), 20);

    let snapshot = CurrentLivestockRepository::new(conn.clone())
        .find_by_livestock_id("LB-100")
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.quantity, 980);
    let audit = snapshot.metadata.unwrap();
    assert_eq!(audit.previous_quantity, Some(983));
    assert_eq!(audit.delta, -3);

    let third = reconciler.reconcile("LB-100", false, &SystemOperator).unwrap();
    assert_eq!(third.status, ReconcileStatus::Skipped);
}

#[test]
fn test_conservation_with_sales_and_mutations() {
    let (_tmp, conn) = setup_shared_db();
    let mut batch = make_batch("LB-200", "K02", 5000, date(2025, 2, 1));
    batch.quantity_sales = 1200;
    batch.quantity_mutated = 300;
    insert_batch(&conn, &batch);
    insert_depletions(
        &conn,
        "LB-200",
        &[
            (date(2025, 2, 3), "Mati", 40),
            (date(2025, 2, 9), "Afkir", 25),
            (date(2025, 2, 9), "unknown-code", 1),
        ],
    );

    let total = DepletionAggregator::new(conn.clone()).total_depletion("LB-200").unwrap();
    assert_eq!(total, 66);

    QuantityReconciler::new(conn.clone())
        .reconcile("LB-200", false, &SystemOperator)
        .unwrap();

    let stored = LivestockRepository::new(conn.clone()).find_by_id("LB-200").unwrap().unwrap();
    let snapshot = CurrentLivestockRepository::new(conn)
        .find_by_livestock_id("LB-200")
        .unwrap()
        .unwrap();
    assert_eq!(
        snapshot.quantity,
        stored.initial_quantity - stored.quantity_depletion - stored.quantity_sales - stored.quantity_mutated
    );
    assert_eq!(snapshot.quantity, 3434);
}

#[test]
fn test_batch_mode_over_all_batches() {
    let (_tmp, conn) = setup_shared_db();
    insert_batch(&conn, &make_batch("LB-1", "K01", 100, date(2025, 1, 1)));
    insert_batch(&conn, &make_batch("LB-2", "K02", 200, date(2025, 1, 1)));
    insert_batch(&conn, &make_batch("LB-3", "K03", 300, date(2025, 1, 1)));
    insert_depletions(&conn, "LB-2", &[(date(2025, 1, 2), "Mati", 7)]);

    let reconciler = QuantityReconciler::new(conn.clone());
    let preview = reconciler
        .reconcile_all(
            &ReconcileOptions {
                dry_run: true,
                ..Default::default()
            },
            &SystemOperator,
        )
        .unwrap();
    assert_eq!(preview.previewed(), 3);
    let lb2 = preview.outcomes.iter().find(|o| o.livestock_id == "LB-2").unwrap();
    assert_eq!(lb2.depletion_delta(), 7);
    assert_eq!(stored_depletion(&conn, "LB-2"), 0);

    let report = reconciler
        .reconcile_all(&ReconcileOptions::default(), &SystemOperator)
        .unwrap();
    assert_eq!(report.updated(), 3);
    assert_eq!(stored_depletion(&conn, "LB-2"), 7);

    let single = reconciler
        .reconcile_all(
            &ReconcileOptions {
                livestock_id: Some("LB-3".to_string()),
                force: true,
                ..Default::default()
            },
            &SystemOperator,
        )
        .unwrap();
    assert_eq!(single.total(), 1);
    assert_eq!(single.updated(), 1);
}

#[test]
fn test_deleted_batch_is_not_found() {
    let (_tmp, conn) = setup_shared_db();
    insert_batch(&conn, &make_batch("LB-9", "K01", 100, date(2025, 1, 1)));
    LivestockRepository::new(conn.clone())
        .soft_delete("LB-9", date(2025, 1, 3).and_hms_opt(8, 0, 0).unwrap())
        .unwrap();

    let reconciler = QuantityReconciler::new(conn.clone());
    assert!(reconciler
        .reconcile("LB-9", false, &SystemOperator)
        .unwrap_err()
        .is_not_found());

    let report = reconciler
        .reconcile_all(&ReconcileOptions::default(), &SystemOperator)
        .unwrap();
    assert_eq!(report.total(), 0);
}
