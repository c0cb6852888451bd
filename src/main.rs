// ==========================================
// 养殖场存栏核心 - 命令行入口
// ==========================================
// 子命令:
// - livestock:update-quantity-depletion   存栏对账
// - livestock:migrate-depletion-types     减员类型迁移
// - livestock:depletion-migration-status  迁移进度
// - analytics:daily-calculate             日度分析
// 退出码: 0 = 成功（含部分失败），1 = 启动/参数/目标不存在等不可恢复错误
// ==========================================

use anyhow::Context;
use chrono::{Duration, Local, NaiveDate};
use clap::{Parser, Subcommand};
use farm_livestock_core::config::ConfigManager;
use farm_livestock_core::engine::{
    date_window, DailyAnalyticsAggregator, DepletionTypeMigrator, QuantityReconciler,
    ReconcileOptions, ReconcileStatus, UnitError,
};
use farm_livestock_core::{db, logging, FarmCoreConfig, SystemOperator, APP_NAME, VERSION};
use rusqlite::Connection;
use std::process;
use std::sync::{Arc, Mutex};

#[derive(Parser)]
#[command(name = "farm-livestock")]
#[command(about = "Livestock quantity reconciliation and daily analytics")]
#[command(version)]
struct Cli {
    /// SQLite 数据库路径（默认: FARM_LIVESTOCK_DB_PATH 或用户数据目录）
    #[arg(long, global = true)]
    db: Option<String>,

    /// 输出 debug 日志
    #[arg(short, long, global = true)]
    verbose: bool,

    /// 只输出错误日志
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 重新汇总减员并重算当前存栏
    #[command(name = "livestock:update-quantity-depletion")]
    UpdateQuantityDepletion {
        /// 只显示差异，不写入
        #[arg(long)]
        dry_run: bool,

        /// 只处理指定批次
        #[arg(long)]
        livestock_id: Option<String>,

        /// 减员数一致时也重写
        #[arg(long)]
        force: bool,
    },

    /// 为历史减员记录回填规范化类型
    #[command(name = "livestock:migrate-depletion-types")]
    MigrateDepletionTypes {
        /// 每块记录数（默认读取配置）
        #[arg(long)]
        batch_size: Option<usize>,

        /// 只预览，不写入
        #[arg(long)]
        dry_run: bool,

        /// 同时重新处理已迁移记录
        #[arg(long)]
        force: bool,
    },

    /// 查看减员类型迁移进度
    #[command(name = "livestock:depletion-migration-status")]
    DepletionMigrationStatus,

    /// 计算日度分析并生成告警
    #[command(name = "analytics:daily-calculate")]
    DailyCalculate {
        /// 结束日期 YYYY-MM-DD（默认: 昨天）
        #[arg(long)]
        date: Option<NaiveDate>,

        /// 计算以 --date 结尾的 N 天
        #[arg(long, default_value = "1")]
        days: u32,

        /// 覆盖已存在的分析行
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if cli.quiet {
        logging::init_with_default("error");
    } else if cli.verbose {
        logging::init_with_default("debug");
    } else {
        logging::init();
    }
    tracing::debug!("{} v{} 启动", APP_NAME, VERSION);

    let result = open_database(cli.db.as_deref()).and_then(|(conn, config)| match cli.command {
        Commands::UpdateQuantityDepletion {
            dry_run,
            livestock_id,
            force,
        } => handle_reconcile(
            conn,
            ReconcileOptions {
                dry_run,
                force,
                livestock_id,
            },
        ),
        Commands::MigrateDepletionTypes {
            batch_size,
            dry_run,
            force,
        } => handle_migrate(conn, config, batch_size, dry_run, force),
        Commands::DepletionMigrationStatus => handle_migration_status(conn, config),
        Commands::DailyCalculate { date, days, force } => handle_daily(conn, config, date, days, force),
    });

    match result {
        Ok(()) => process::exit(0),
        Err(e) => {
            tracing::error!("命令执行失败: {:#}", e);
            eprintln!("❌ Error: {:#}", e);
            process::exit(1);
        }
    }
}

/// 打开数据库、建表并加载配置
fn open_database(explicit: Option<&str>) -> anyhow::Result<(Arc<Mutex<Connection>>, FarmCoreConfig)> {
    let db_path = db::resolve_db_path(explicit);
    tracing::info!("使用数据库: {}", db_path);

    let conn = db::open_sqlite_connection(&db_path)
        .with_context(|| format!("无法打开数据库: {}", db_path))?;
    db::init_schema(&conn).context("建表失败")?;

    let conn = Arc::new(Mutex::new(conn));
    let config = ConfigManager::from_connection(conn.clone())
        .load_core_config()
        .context("加载配置失败")?;
    tracing::debug!("核心配置: {:?}", config);
    Ok((conn, config))
}

fn handle_reconcile(conn: Arc<Mutex<Connection>>, options: ReconcileOptions) -> anyhow::Result<()> {
    let reconciler = QuantityReconciler::new(conn);
    let report = reconciler.reconcile_all(&options, &SystemOperator)?;

    println!(
        "{:<20} {:>10} {:>10} {:>10} {:>10}  {}",
        "livestock_id", "depl_old", "depl_new", "qty_old", "qty_new", "status"
    );
    for o in &report.outcomes {
        let status = match o.status {
            ReconcileStatus::Updated => "updated",
            ReconcileStatus::Skipped => "skipped",
            ReconcileStatus::Preview => "would update",
        };
        let shown = if o.status == ReconcileStatus::Preview && o.depletion_delta() == 0 {
            "unchanged"
        } else {
            status
        };
        println!(
            "{:<20} {:>10} {:>10} {:>10} {:>10}  {}{}",
            o.livestock_id,
            o.previous_depletion,
            o.new_depletion,
            o.previous_quantity.map(|q| q.to_string()).unwrap_or_else(|| "-".to_string()),
            o.new_quantity,
            shown,
            if o.clamped { " (clamped)" } else { "" }
        );
    }
    print_errors(&report.errors);

    println!();
    if options.dry_run {
        println!("Dry run: {} batches previewed, nothing written", report.previewed());
    }
    println!(
        "Total: {}  Updated: {}  Skipped: {}  Errors: {}",
        report.total(),
        report.updated(),
        report.skipped(),
        report.errors.len()
    );
    Ok(())
}

fn handle_migrate(
    conn: Arc<Mutex<Connection>>,
    config: FarmCoreConfig,
    batch_size: Option<usize>,
    dry_run: bool,
    force: bool,
) -> anyhow::Result<()> {
    let migrator = DepletionTypeMigrator::new(conn, config);
    let batch_size = batch_size.unwrap_or_else(|| migrator.default_batch_size());

    if dry_run {
        let preview = migrator.preview(force)?;
        println!("Dry run: {} records would be processed (batch size {})", preview.pending, batch_size);
        println!("{:<24} {:>8}  {:<10} {:<12}", "raw type", "count", "normalized", "category");
        for m in &preview.mappings {
            println!(
                "{:<24} {:>8}  {:<10} {:<12}{}",
                format!("{:?}", m.raw),
                m.count,
                m.normalized.as_str(),
                m.category.as_str(),
                if m.recognized { "" } else { " (unrecognized)" }
            );
        }
        return Ok(());
    }

    let report = migrator.migrate_legacy_data(batch_size, force, &SystemOperator)?;
    print_errors(&report.errors);
    println!(
        "Processed: {}  Updated: {}  Errors: {}",
        report.processed,
        report.updated,
        report.errors.len()
    );

    let status = migrator.status()?;
    println!(
        "Migrated: {}/{} ({:.2}%)",
        status.migrated, status.total, status.percent
    );
    Ok(())
}

fn handle_migration_status(conn: Arc<Mutex<Connection>>, config: FarmCoreConfig) -> anyhow::Result<()> {
    let status = DepletionTypeMigrator::new(conn, config).status()?;
    println!("Total:      {}", status.total);
    println!("Migrated:   {}", status.migrated);
    println!("Unmigrated: {}", status.unmigrated);
    println!("Progress:   {:.2}%", status.percent);
    println!("Complete:   {}", if status.complete { "yes" } else { "no" });
    Ok(())
}

fn handle_daily(
    conn: Arc<Mutex<Connection>>,
    config: FarmCoreConfig,
    date: Option<NaiveDate>,
    days: u32,
    force: bool,
) -> anyhow::Result<()> {
    let end = date.unwrap_or_else(|| Local::now().date_naive() - Duration::days(1));
    let (start, end) = date_window(end, days)?;

    let engine = DailyAnalyticsAggregator::new(conn, config);
    let report = engine.calculate_range(start, end, force, &SystemOperator)?;

    println!(
        "{:<12} {:>8} {:>8} {:>8} {:>8}",
        "date", "written", "skipped", "alerts", "errors"
    );
    for day in &report.days {
        println!(
            "{:<12} {:>8} {:>8} {:>8} {:>8}",
            day.date.to_string(),
            day.rows_written,
            day.rows_skipped,
            day.alerts_created,
            day.errors.len()
        );
    }
    for day in &report.days {
        print_errors(&day.errors);
    }
    print_errors(&report.errors);

    println!();
    println!(
        "Dates: {}  Rows written: {}  Skipped: {}  Alerts: {}  Errors: {}",
        report.dates_processed(),
        report.rows_written(),
        report.rows_skipped(),
        report.alerts_created(),
        report.error_count()
    );
    Ok(())
}

fn print_errors(errors: &[UnitError]) {
    for e in errors {
        eprintln!("  ✗ {}: {}", e.unit, e.message);
    }
}
