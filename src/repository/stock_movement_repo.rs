// ==========================================
// 农业作业管理系统 - 台账流水数据仓储
// ==========================================
// 红线: 仅追加，不提供更新/删除
// ==========================================

use crate::domain::stock_movement::StockMovement;
use crate::domain::types::MovementType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_types::{decimal_col, enum_col, fmt_ts, opt_decimal_col, ts_col};
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

const MOVEMENT_COLUMNS: &str = r#"movement_id, lot_id, reservation_id, activity_id,
       movement_type, quantity, used_quantity, returned_quantity,
       reserved_after, partial_after, consumed_after, lot_revision, actor, created_at"#;

// ==========================================
// StockMovementRepository - 流水仓储
// ==========================================
pub struct StockMovementRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StockMovementRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按批次查询流水（按 revision 升序）
    pub fn list_by_lot(&self, lot_id: &str) -> RepositoryResult<Vec<StockMovement>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM stock_movement WHERE lot_id = ? ORDER BY lot_revision, rowid",
            MOVEMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let list = stmt
            .query_map(params![lot_id], Self::map_row)?
            .collect::<Result<Vec<StockMovement>, _>>()?;
        Ok(list)
    }

    /// 按作业查询流水（写入顺序）
    pub fn list_by_activity(&self, activity_id: &str) -> RepositoryResult<Vec<StockMovement>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM stock_movement WHERE activity_id = ? ORDER BY created_at, rowid",
            MOVEMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let list = stmt
            .query_map(params![activity_id], Self::map_row)?
            .collect::<Result<Vec<StockMovement>, _>>()?;
        Ok(list)
    }

    pub(crate) fn insert_tx(conn: &Connection, m: &StockMovement) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO stock_movement (
                movement_id, lot_id, reservation_id, activity_id,
                movement_type, quantity, used_quantity, returned_quantity,
                reserved_after, partial_after, consumed_after, lot_revision, actor, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                m.movement_id,
                m.lot_id,
                m.reservation_id,
                m.activity_id,
                m.movement_type.to_db_str(),
                m.quantity.to_string(),
                m.used_quantity.map(|q| q.to_string()),
                m.returned_quantity.map(|q| q.to_string()),
                m.reserved_after.to_string(),
                m.partial_after.to_string(),
                m.consumed_after.to_string(),
                m.lot_revision,
                m.actor,
                fmt_ts(&m.created_at),
            ],
        )?;
        Ok(())
    }

    fn map_row(row: &Row) -> rusqlite::Result<StockMovement> {
        Ok(StockMovement {
            movement_id: row.get(0)?,
            lot_id: row.get(1)?,
            reservation_id: row.get(2)?,
            activity_id: row.get(3)?,
            movement_type: enum_col(row, 4, MovementType::from_db_str)?,
            quantity: decimal_col(row, 5)?,
            used_quantity: opt_decimal_col(row, 6)?,
            returned_quantity: opt_decimal_col(row, 7)?,
            reserved_after: decimal_col(row, 8)?,
            partial_after: decimal_col(row, 9)?,
            consumed_after: decimal_col(row, 10)?,
            lot_revision: row.get(11)?,
            actor: row.get(12)?,
            created_at: ts_col(row, 13)?,
        })
    }
}
