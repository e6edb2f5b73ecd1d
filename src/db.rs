// ==========================================
// 农业作业管理系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 统一建表（init_schema 幂等），并写入 schema_version
// - 台账写操作统一使用 IMMEDIATE 事务（先拿写锁再读批次行）
// ==========================================

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// busy_timeout 覆写环境变量
pub const BUSY_TIMEOUT_ENV: &str = "AGROTIC_LEDGER_BUSY_TIMEOUT_MS";

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 数据库时间戳格式（与各仓储一致）
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 数据库日期格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

fn busy_timeout_ms() -> u64 {
    std::env::var(BUSY_TIMEOUT_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS)
}

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置；并发预留时等待方依赖它排队
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms()))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let mut conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    crate::perf::install_sqlite_tracing(&mut conn);
    Ok(conn)
}

/// 开启 IMMEDIATE 事务
///
/// 台账的“检查-修改”必须在同一临界区内：IMMEDIATE 在 BEGIN 时即获取写锁，
/// 其他连接的同类事务会在 busy_timeout 内排队，等价于行级 SELECT ... FOR UPDATE。
pub fn begin_immediate(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化数据库 schema（幂等）
///
/// 数量字段统一以 TEXT 存储十进制字符串，避免浮点误差。
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS product (
            product_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            sku TEXT,
            unit_name TEXT NOT NULL,
            unit_abbreviation TEXT NOT NULL,
            divisible INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS inventory_lot (
            lot_id TEXT PRIMARY KEY,
            product_id TEXT NOT NULL REFERENCES product(product_id),
            warehouse_id TEXT NOT NULL,
            total_quantity TEXT NOT NULL,
            reserved_quantity TEXT NOT NULL,
            partial_quantity TEXT NOT NULL,
            consumed_quantity TEXT NOT NULL,
            received_at TEXT NOT NULL,
            expires_at TEXT,
            revision INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_lot_product ON inventory_lot(product_id);

        CREATE TABLE IF NOT EXISTS activity (
            activity_id TEXT PRIMARY KEY,
            description TEXT NOT NULL,
            category_id TEXT,
            crop_zone_ref TEXT,
            assigned_date TEXT NOT NULL,
            status TEXT NOT NULL,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            hours_worked TEXT,
            hourly_rate TEXT,
            labor_cost TEXT,
            observation TEXT,
            evidence_ref TEXT,
            finalized_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_activity_date ON activity(assigned_date);

        CREATE TABLE IF NOT EXISTS activity_user (
            activity_id TEXT NOT NULL REFERENCES activity(activity_id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            PRIMARY KEY (activity_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS reservation (
            reservation_id TEXT PRIMARY KEY,
            activity_id TEXT NOT NULL REFERENCES activity(activity_id) ON DELETE CASCADE,
            lot_id TEXT NOT NULL REFERENCES inventory_lot(lot_id),
            product_id TEXT NOT NULL REFERENCES product(product_id),
            requested_quantity TEXT NOT NULL,
            source TEXT NOT NULL,
            status TEXT NOT NULL,
            confirmed_used_quantity TEXT,
            returned_quantity TEXT NOT NULL,
            surplus_drawn TEXT NOT NULL DEFAULT '0',
            created_at TEXT NOT NULL,
            settled_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_reservation_activity ON reservation(activity_id);
        CREATE INDEX IF NOT EXISTS idx_reservation_lot_status ON reservation(lot_id, status);

        -- 台账流水：仅追加，不设外键（活动删除后流水仍保留）
        CREATE TABLE IF NOT EXISTS stock_movement (
            movement_id TEXT PRIMARY KEY,
            lot_id TEXT NOT NULL,
            reservation_id TEXT,
            activity_id TEXT,
            movement_type TEXT NOT NULL,
            quantity TEXT NOT NULL,
            used_quantity TEXT,
            returned_quantity TEXT,
            reserved_after TEXT NOT NULL,
            partial_after TEXT NOT NULL,
            consumed_after TEXT NOT NULL,
            lot_revision INTEGER NOT NULL,
            actor TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_movement_lot ON stock_movement(lot_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_movement_activity ON stock_movement(activity_id, created_at);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_begin_immediate_commits() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tx = begin_immediate(&mut conn).unwrap();
        tx.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', 'k', 'v')",
            [],
        )
        .unwrap();
        tx.commit().unwrap();

        let v: String = conn
            .query_row("SELECT value FROM config_kv WHERE key = 'k'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(v, "v");
    }
}
