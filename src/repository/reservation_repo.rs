// ==========================================
// 农业作业管理系统 - 预留数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 排序: 按创建时间 + 插入顺序（rowid），保证同一秒内稳定
// ==========================================

use crate::domain::reservation::Reservation;
use crate::domain::types::{ReservationSource, ReservationStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_types::{
    decimal_col, enum_col, fmt_ts, opt_decimal_col, opt_ts_col, ts_col,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const RESERVATION_COLUMNS: &str = r#"reservation_id, activity_id, lot_id, product_id,
       requested_quantity, source, status, confirmed_used_quantity, returned_quantity,
       surplus_drawn, created_at, settled_at"#;

// ==========================================
// ReservationRepository - 预留仓储
// ==========================================
pub struct ReservationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReservationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn find_by_id(&self, reservation_id: &str) -> RepositoryResult<Option<Reservation>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, reservation_id)
    }

    /// 按作业列出全部预留（创建顺序）
    pub fn list_by_activity(&self, activity_id: &str) -> RepositoryResult<Vec<Reservation>> {
        let conn = self.get_conn()?;
        Self::list_by_activity_tx(&conn, activity_id)
    }

    /// 批次上的有效预留数量合计（对账用）
    pub fn count_active_by_lot(&self, lot_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM reservation WHERE lot_id = ? AND status = ?",
            params![lot_id, ReservationStatus::Active.to_db_str()],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub(crate) fn insert_tx(conn: &Connection, r: &Reservation) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO reservation (
                reservation_id, activity_id, lot_id, product_id,
                requested_quantity, source, status, confirmed_used_quantity,
                returned_quantity, surplus_drawn, created_at, settled_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                r.reservation_id,
                r.activity_id,
                r.lot_id,
                r.product_id,
                r.requested_quantity.to_string(),
                r.source.to_db_str(),
                r.status.to_db_str(),
                r.confirmed_used_quantity.map(|q| q.to_string()),
                r.returned_quantity.to_string(),
                r.surplus_drawn.to_string(),
                fmt_ts(&r.created_at),
                r.settled_at.as_ref().map(fmt_ts),
            ],
        )?;
        Ok(())
    }

    pub(crate) fn find_by_id_tx(
        conn: &Connection,
        reservation_id: &str,
    ) -> RepositoryResult<Option<Reservation>> {
        let sql = format!(
            "SELECT {} FROM reservation WHERE reservation_id = ?",
            RESERVATION_COLUMNS
        );
        let r = conn
            .query_row(&sql, params![reservation_id], Self::map_row)
            .optional()?;
        Ok(r)
    }

    pub(crate) fn list_by_activity_tx(
        conn: &Connection,
        activity_id: &str,
    ) -> RepositoryResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {} FROM reservation WHERE activity_id = ? ORDER BY created_at, rowid",
            RESERVATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let list = stmt
            .query_map(params![activity_id], Self::map_row)?
            .collect::<Result<Vec<Reservation>, _>>()?;
        Ok(list)
    }

    /// 写回结算结果（仅允许从 ACTIVE 更新）
    ///
    /// # 返回
    /// - Ok(true): 已更新
    /// - Ok(false): 记录已不是 ACTIVE（被并发结算）
    pub(crate) fn update_settlement_tx(conn: &Connection, r: &Reservation) -> RepositoryResult<bool> {
        let rows = conn.execute(
            r#"UPDATE reservation
               SET status = ?, confirmed_used_quantity = ?, returned_quantity = ?, settled_at = ?
               WHERE reservation_id = ? AND status = ?"#,
            params![
                r.status.to_db_str(),
                r.confirmed_used_quantity.map(|q| q.to_string()),
                r.returned_quantity.to_string(),
                r.settled_at.as_ref().map(fmt_ts),
                r.reservation_id,
                ReservationStatus::Active.to_db_str(),
            ],
        )?;
        Ok(rows == 1)
    }

    fn map_row(row: &Row) -> rusqlite::Result<Reservation> {
        Ok(Reservation {
            reservation_id: row.get(0)?,
            activity_id: row.get(1)?,
            lot_id: row.get(2)?,
            product_id: row.get(3)?,
            requested_quantity: decimal_col(row, 4)?,
            source: enum_col(row, 5, ReservationSource::from_db_str)?,
            status: enum_col(row, 6, ReservationStatus::from_db_str)?,
            confirmed_used_quantity: opt_decimal_col(row, 7)?,
            returned_quantity: decimal_col(row, 8)?,
            surplus_drawn: decimal_col(row, 9)?,
            created_at: ts_col(row, 10)?,
            settled_at: opt_ts_col(row, 11)?,
        })
    }
}
