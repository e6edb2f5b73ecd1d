// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库初始化、基础数据（产品/批次/作业）准备
// ==========================================

#![allow(dead_code)]

use agrotic_ledger::config::ConfigManager;
use agrotic_ledger::db::{init_schema, open_sqlite_connection};
use agrotic_ledger::domain::activity::{Activity, NewActivity};
use agrotic_ledger::domain::lot::Lot;
use agrotic_ledger::domain::product::{Product, UnitOfMeasure};
use agrotic_ledger::domain::types::Quantity;
use agrotic_ledger::engine::{ActivityFulfillment, ReservationManager, StockLedger};
use agrotic_ledger::repository::{ActivityRepository, ProductRepository};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().ok_or("临时路径非UTF-8")?.to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接（与 AppState 相同的 PRAGMA）
pub fn open_shared(db_path: &str) -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(open_sqlite_connection(db_path).unwrap()))
}

pub fn q(v: i64) -> Quantity {
    Decimal::from(v)
}

pub fn qs(v: &str) -> Quantity {
    Decimal::from_str(v).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 登记产品
pub fn seed_product(conn: &Arc<Mutex<Connection>>, name: &str, divisible: bool) -> Product {
    let product = Product::new(
        name,
        Some(format!("SKU-{}", name.to_uppercase())),
        UnitOfMeasure {
            name: "Litro".to_string(),
            abbreviation: "L".to_string(),
        },
        divisible,
    );
    ProductRepository::new(conn.clone()).insert(&product).unwrap();
    product
}

/// 登记批次（经由台账，写入入库流水）
pub fn seed_lot(
    conn: &Arc<Mutex<Connection>>,
    product_id: &str,
    total: Quantity,
    expires_at: Option<NaiveDate>,
) -> Lot {
    StockLedger::new(conn.clone())
        .register_lot(Lot::new(product_id, "BODEGA-1", total, expires_at), "seed")
        .unwrap()
}

/// 新建 OPEN 作业
pub fn seed_activity(conn: &Arc<Mutex<Connection>>) -> Activity {
    let activity = Activity::from_new(NewActivity {
        description: "Fumigación lote norte".to_string(),
        assigned_users: vec!["u-1".to_string(), "u-2".to_string()],
        created_by: "u-admin".to_string(),
        ..Default::default()
    });
    ActivityRepository::new(conn.clone()).insert(&activity).unwrap();
    activity
}

/// 作业履约引擎（共享连接 + 配置）
pub fn fulfillment(conn: &Arc<Mutex<Connection>>) -> (ActivityFulfillment, Arc<ConfigManager>) {
    let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());
    (ActivityFulfillment::new(conn.clone(), config.clone()), config)
}

pub fn reservations(conn: &Arc<Mutex<Connection>>) -> ReservationManager {
    ReservationManager::new(conn.clone())
}

pub fn ledger(conn: &Arc<Mutex<Connection>>) -> StockLedger {
    StockLedger::new(conn.clone())
}
