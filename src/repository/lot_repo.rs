// ==========================================
// 农业作业管理系统 - 库存批次数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 数量字段只能经由 StockLedger 修改（update_quantities_tx 仅供引擎调用）
// 并发: 更新带 revision 条件（乐观锁），与 IMMEDIATE 事务双重保护
// ==========================================

use crate::domain::lot::Lot;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_types::{decimal_col, fmt_date, fmt_ts, opt_date_col, ts_col};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const LOT_COLUMNS: &str = r#"lot_id, product_id, warehouse_id,
       total_quantity, reserved_quantity, partial_quantity, consumed_quantity,
       received_at, expires_at, revision, updated_at"#;

// ==========================================
// LotRepository - 批次仓储
// ==========================================
pub struct LotRepository {
    conn: Arc<Mutex<Connection>>,
}

impl LotRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按 lot_id 查询
    pub fn find_by_id(&self, lot_id: &str) -> RepositoryResult<Option<Lot>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, lot_id)
    }

    /// 按产品列出批次（入库时间升序）
    pub fn list_by_product(&self, product_id: &str) -> RepositoryResult<Vec<Lot>> {
        let conn = self.get_conn()?;
        Self::list_by_product_tx(&conn, product_id)
    }

    // ==========================================
    // 事务内操作（由引擎在 IMMEDIATE 事务中调用）
    // ==========================================

    pub(crate) fn insert_tx(conn: &Connection, lot: &Lot) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO inventory_lot (
                lot_id, product_id, warehouse_id,
                total_quantity, reserved_quantity, partial_quantity, consumed_quantity,
                received_at, expires_at, revision, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                lot.lot_id,
                lot.product_id,
                lot.warehouse_id,
                lot.total_quantity.to_string(),
                lot.reserved_quantity.to_string(),
                lot.partial_quantity.to_string(),
                lot.consumed_quantity.to_string(),
                fmt_ts(&lot.received_at),
                lot.expires_at.as_ref().map(fmt_date),
                lot.revision,
                fmt_ts(&lot.updated_at),
            ],
        )?;
        Ok(())
    }

    pub(crate) fn find_by_id_tx(conn: &Connection, lot_id: &str) -> RepositoryResult<Option<Lot>> {
        let sql = format!("SELECT {} FROM inventory_lot WHERE lot_id = ?", LOT_COLUMNS);
        let lot = conn
            .query_row(&sql, params![lot_id], Self::map_row)
            .optional()?;
        Ok(lot)
    }

    pub(crate) fn list_by_product_tx(
        conn: &Connection,
        product_id: &str,
    ) -> RepositoryResult<Vec<Lot>> {
        let sql = format!(
            "SELECT {} FROM inventory_lot WHERE product_id = ? ORDER BY received_at, rowid",
            LOT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let lots = stmt
            .query_map(params![product_id], Self::map_row)?
            .collect::<Result<Vec<Lot>, _>>()?;
        Ok(lots)
    }

    /// 写回批次数量
    ///
    /// # 参数
    /// - `lot`: 变更后的批次（revision 已 +1）
    /// - `expected_revision`: 读取时的 revision
    pub(crate) fn update_quantities_tx(
        conn: &Connection,
        lot: &Lot,
        expected_revision: i64,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"UPDATE inventory_lot
               SET total_quantity = ?, reserved_quantity = ?, partial_quantity = ?,
                   consumed_quantity = ?, revision = ?, updated_at = ?
               WHERE lot_id = ? AND revision = ?"#,
            params![
                lot.total_quantity.to_string(),
                lot.reserved_quantity.to_string(),
                lot.partial_quantity.to_string(),
                lot.consumed_quantity.to_string(),
                lot.revision,
                fmt_ts(&lot.updated_at),
                lot.lot_id,
                expected_revision,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::RevisionConflict {
                entity: "InventoryLot".to_string(),
                id: lot.lot_id.clone(),
                expected: expected_revision,
            });
        }
        Ok(())
    }

    fn map_row(row: &Row) -> rusqlite::Result<Lot> {
        Ok(Lot {
            lot_id: row.get(0)?,
            product_id: row.get(1)?,
            warehouse_id: row.get(2)?,
            total_quantity: decimal_col(row, 3)?,
            reserved_quantity: decimal_col(row, 4)?,
            partial_quantity: decimal_col(row, 5)?,
            consumed_quantity: decimal_col(row, 6)?,
            received_at: ts_col(row, 7)?,
            expires_at: opt_date_col(row, 8)?,
            revision: row.get(9)?,
            updated_at: ts_col(row, 10)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{Product, UnitOfMeasure};
    use crate::repository::product_repo::ProductRepository;
    use rust_decimal::Decimal;

    fn setup() -> (Arc<Mutex<Connection>>, String) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let product = Product::new(
            "Urea",
            None,
            UnitOfMeasure {
                name: "Kilogramo".to_string(),
                abbreviation: "kg".to_string(),
            },
            true,
        );
        ProductRepository::new(conn.clone()).insert(&product).unwrap();
        (conn, product.product_id)
    }

    #[test]
    fn test_insert_and_roundtrip_exact_decimals() {
        let (conn, product_id) = setup();
        let mut lot = Lot::new(&product_id, "B1", Decimal::new(100_125, 3), None);
        lot.reserved_quantity = Decimal::new(5, 1);
        {
            let c = conn.lock().unwrap();
            LotRepository::insert_tx(&c, &lot).unwrap();
        }

        let repo = LotRepository::new(conn);
        let found = repo.find_by_id(&lot.lot_id).unwrap().unwrap();
        assert_eq!(found.total_quantity, Decimal::new(100_125, 3));
        assert_eq!(found.reserved_quantity, Decimal::new(5, 1));
        assert_eq!(repo.list_by_product(&product_id).unwrap().len(), 1);
    }

    #[test]
    fn test_update_with_stale_revision_fails() {
        let (conn, product_id) = setup();
        let mut lot = Lot::new(&product_id, "B1", Decimal::from(10), None);
        let c = conn.lock().unwrap();
        LotRepository::insert_tx(&c, &lot).unwrap();

        lot.reserve(Decimal::from(3)).unwrap();
        LotRepository::update_quantities_tx(&c, &lot, 0).unwrap();

        let err = LotRepository::update_quantities_tx(&c, &lot, 0).unwrap_err();
        assert!(matches!(err, RepositoryError::RevisionConflict { .. }));
    }
}
