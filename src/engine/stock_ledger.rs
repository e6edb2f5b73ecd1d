// ==========================================
// 农业作业管理系统 - 库存台账（StockLedger）
// ==========================================
// 红线: 批次数量字段只能经由本模块修改
// 红线: 每次变更 = 一个 IMMEDIATE 事务（读批次 + 校验 + 写回 + 流水）
// 组合: *_in 方法接收调用方事务，供预留/结算在同一事务内组合
// ==========================================

use crate::db::begin_immediate;
use crate::domain::lot::{Lot, LotError};
use crate::domain::product::Product;
use crate::domain::stock_movement::{MovementContext, StockMovement};
use crate::domain::types::{MovementType, Quantity};
use crate::engine::error::{LedgerError, LedgerResult};
use crate::repository::error::RepositoryError;
use crate::repository::{LotRepository, ProductRepository, StockMovementRepository};
use rusqlite::{Connection, Transaction};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// 在 IMMEDIATE 事务中执行 f；f 返回错误时回滚
pub(crate) fn run_immediate<T>(
    conn: &Arc<Mutex<Connection>>,
    f: impl FnOnce(&Transaction<'_>) -> LedgerResult<T>,
) -> LedgerResult<T> {
    let mut guard = conn
        .lock()
        .map_err(|e| RepositoryError::LockError(e.to_string()))?;
    let tx = begin_immediate(&mut guard)?;
    let out = f(&tx)?;
    tx.commit()?;
    Ok(out)
}

/// 校验数量：> 0 且满足产品可分割性
pub(crate) fn validate_quantity(product: &Product, quantity: Quantity, what: &str) -> LedgerResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::InvalidQuantity(format!(
            "{} 必须大于0: {}",
            what, quantity
        )));
    }
    validate_divisibility(product, quantity, what)
}

/// 校验可分割性（不可分割产品只接受整数）
pub(crate) fn validate_divisibility(product: &Product, quantity: Quantity, what: &str) -> LedgerResult<()> {
    if !product.accepts_quantity(quantity) {
        return Err(LedgerError::InvalidQuantity(format!(
            "产品 {} 不可分割，{} 必须为整数: {}",
            product.name, what, quantity
        )));
    }
    Ok(())
}

// ==========================================
// StockLedger - 库存台账
// ==========================================
pub struct StockLedger {
    conn: Arc<Mutex<Connection>>,
}

impl StockLedger {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 读取批次（校验不变式）
    pub fn get_lot(&self, lot_id: &str) -> LedgerResult<Lot> {
        let guard = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Self::load_checked(&guard, lot_id)
    }

    /// 可用量 = total - reserved - consumed
    pub fn get_available(&self, lot_id: &str) -> LedgerResult<Quantity> {
        Ok(self.get_lot(lot_id)?.available())
    }

    // ==========================================
    // 独立事务入口
    // ==========================================

    /// 登记新批次（初始数量记一条 RECEIVE 流水）
    pub fn register_lot(&self, lot: Lot, actor: &str) -> LedgerResult<Lot> {
        run_immediate(&self.conn, |tx| Self::register_lot_in(tx, lot, actor))
    }

    pub fn receive(&self, lot_id: &str, quantity: Quantity, ctx: &MovementContext) -> LedgerResult<Lot> {
        run_immediate(&self.conn, |tx| Self::receive_in(tx, lot_id, quantity, ctx))
    }

    pub fn reserve(&self, lot_id: &str, quantity: Quantity, ctx: &MovementContext) -> LedgerResult<Lot> {
        run_immediate(&self.conn, |tx| Self::reserve_in(tx, lot_id, quantity, ctx)).map(|(lot, _)| lot)
    }

    pub fn release(&self, lot_id: &str, quantity: Quantity, ctx: &MovementContext) -> LedgerResult<Lot> {
        run_immediate(&self.conn, |tx| Self::release_in(tx, lot_id, quantity, Decimal::ZERO, ctx))
    }

    pub fn release_to_surplus(
        &self,
        lot_id: &str,
        quantity: Quantity,
        ctx: &MovementContext,
    ) -> LedgerResult<Lot> {
        run_immediate(&self.conn, |tx| Self::release_to_surplus_in(tx, lot_id, quantity, ctx))
    }

    pub fn consume_partial(
        &self,
        lot_id: &str,
        quantity: Quantity,
        ctx: &MovementContext,
    ) -> LedgerResult<Lot> {
        run_immediate(&self.conn, |tx| Self::consume_partial_in(tx, lot_id, quantity, ctx))
    }

    /// 确认消耗；返回转为剩余库存的数量
    pub fn confirm_consumption(
        &self,
        lot_id: &str,
        reserved_qty: Quantity,
        used_qty: Quantity,
        ctx: &MovementContext,
    ) -> LedgerResult<Quantity> {
        run_immediate(&self.conn, |tx| {
            Self::confirm_consumption_in(tx, lot_id, reserved_qty, used_qty, ctx)
        })
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub(crate) fn register_lot_in(conn: &Connection, mut lot: Lot, actor: &str) -> LedgerResult<Lot> {
        let product = ProductRepository::find_by_id_tx(conn, &lot.product_id)?
            .ok_or_else(|| LedgerError::not_found("Product", &lot.product_id))?;
        if lot.total_quantity < Decimal::ZERO {
            return Err(LedgerError::InvalidQuantity(format!(
                "初始数量不能为负: {}",
                lot.total_quantity
            )));
        }
        validate_divisibility(&product, lot.total_quantity, "初始数量")?;
        lot.check_invariants()
            .map_err(|e| LedgerError::InvalidInput(e.to_string()))?;

        LotRepository::insert_tx(conn, &lot)?;
        if lot.total_quantity > Decimal::ZERO {
            let ctx = MovementContext {
                actor: actor.to_string(),
                ..Default::default()
            };
            let movement = StockMovement::after(&lot, MovementType::Receive, lot.total_quantity, &ctx);
            StockMovementRepository::insert_tx(conn, &movement)?;
        }

        debug!(lot_id = %lot.lot_id, product_id = %lot.product_id, total = %lot.total_quantity, "批次已登记");
        Ok(lot)
    }

    pub(crate) fn receive_in(
        conn: &Connection,
        lot_id: &str,
        quantity: Quantity,
        ctx: &MovementContext,
    ) -> LedgerResult<Lot> {
        let lot = Self::load_checked(conn, lot_id)?;
        let product = ProductRepository::find_by_id_tx(conn, &lot.product_id)?
            .ok_or_else(|| LedgerError::not_found("Product", &lot.product_id))?;
        validate_quantity(&product, quantity, "入库数量")?;

        let (lot, _) = Self::mutate_in(conn, lot, |l| l.receive(quantity))?;
        Self::journal(conn, &lot, MovementType::Receive, quantity, ctx, None)?;
        Ok(lot)
    }

    /// 常规预留；返回 (批次, 从剩余库存标记中占用的数量)
    pub(crate) fn reserve_in(
        conn: &Connection,
        lot_id: &str,
        quantity: Quantity,
        ctx: &MovementContext,
    ) -> LedgerResult<(Lot, Quantity)> {
        let lot = Self::load_checked(conn, lot_id)?;
        let (lot, drawn) = Self::mutate_in(conn, lot, |l| l.reserve(quantity))?;
        if drawn > Decimal::ZERO {
            debug!(lot_id = %lot_id, drawn = %drawn, "常规预留超出常规可用量，占用剩余库存");
        }
        Self::journal(conn, &lot, MovementType::Reserve, quantity, ctx, None)?;
        Ok((lot, drawn))
    }

    /// 释放常规预留；surplus_restore 为预留时占用的剩余库存标记，原样归还
    pub(crate) fn release_in(
        conn: &Connection,
        lot_id: &str,
        quantity: Quantity,
        surplus_restore: Quantity,
        ctx: &MovementContext,
    ) -> LedgerResult<Lot> {
        let lot = Self::load_checked(conn, lot_id)?;
        let (lot, _) = Self::mutate_in(conn, lot, |l| l.release(quantity, surplus_restore))?;
        Self::journal(conn, &lot, MovementType::Release, quantity, ctx, None)?;
        Ok(lot)
    }

    pub(crate) fn release_to_surplus_in(
        conn: &Connection,
        lot_id: &str,
        quantity: Quantity,
        ctx: &MovementContext,
    ) -> LedgerResult<Lot> {
        let lot = Self::load_checked(conn, lot_id)?;
        let (lot, _) = Self::mutate_in(conn, lot, |l| l.release(quantity, quantity))?;
        Self::journal(conn, &lot, MovementType::ReleaseSurplus, quantity, ctx, None)?;
        Ok(lot)
    }

    pub(crate) fn consume_partial_in(
        conn: &Connection,
        lot_id: &str,
        quantity: Quantity,
        ctx: &MovementContext,
    ) -> LedgerResult<Lot> {
        let lot = Self::load_checked(conn, lot_id)?;
        let (lot, _) = Self::mutate_in(conn, lot, |l| l.reserve_from_partial(quantity))?;
        Self::journal(conn, &lot, MovementType::ReserveSurplus, quantity, ctx, None)?;
        Ok(lot)
    }

    pub(crate) fn confirm_consumption_in(
        conn: &Connection,
        lot_id: &str,
        reserved_qty: Quantity,
        used_qty: Quantity,
        ctx: &MovementContext,
    ) -> LedgerResult<Quantity> {
        let lot = Self::load_checked(conn, lot_id)?;
        let (lot, returned) =
            Self::mutate_in(conn, lot, |l| l.confirm_consumption(reserved_qty, used_qty))?;
        Self::journal(
            conn,
            &lot,
            MovementType::Consume,
            reserved_qty,
            ctx,
            Some((used_qty, returned)),
        )?;
        Ok(returned)
    }

    // ==========================================
    // 内部
    // ==========================================

    /// 读取批次并校验不变式；不一致时报致命错误，不做修正
    pub(crate) fn load_checked(conn: &Connection, lot_id: &str) -> LedgerResult<Lot> {
        let lot = LotRepository::find_by_id_tx(conn, lot_id)?
            .ok_or_else(|| LedgerError::not_found("InventoryLot", lot_id))?;
        lot.check_invariants()
            .map_err(|e| LedgerError::from_lot(lot_id, e))?;
        Ok(lot)
    }

    fn mutate_in<R>(
        conn: &Connection,
        mut lot: Lot,
        op: impl FnOnce(&mut Lot) -> Result<R, LotError>,
    ) -> LedgerResult<(Lot, R)> {
        let expected_revision = lot.revision;
        let out = op(&mut lot).map_err(|e| {
            let err = LedgerError::from_lot(&lot.lot_id, e);
            if let Some((requested, available)) = err.shortfall() {
                warn!(lot_id = %lot.lot_id, requested = %requested, available = %available, "库存不足，拒绝变更");
            }
            err
        })?;
        LotRepository::update_quantities_tx(conn, &lot, expected_revision)?;
        Ok((lot, out))
    }

    fn journal(
        conn: &Connection,
        lot: &Lot,
        movement_type: MovementType,
        quantity: Quantity,
        ctx: &MovementContext,
        settlement: Option<(Quantity, Quantity)>,
    ) -> LedgerResult<()> {
        let mut movement = StockMovement::after(lot, movement_type, quantity, ctx);
        if let Some((used, returned)) = settlement {
            movement = movement.with_settlement(used, returned);
        }
        StockMovementRepository::insert_tx(conn, &movement)?;

        debug!(
            lot_id = %lot.lot_id,
            movement = %movement_type,
            quantity = %quantity,
            reserved = %lot.reserved_quantity,
            partial = %lot.partial_quantity,
            consumed = %lot.consumed_quantity,
            revision = lot.revision,
            "台账变更"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::UnitOfMeasure;

    fn q(v: i64) -> Quantity {
        Decimal::from(v)
    }

    fn setup(total: i64) -> (StockLedger, Arc<Mutex<Connection>>, String) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let product = Product::new(
            "Fungicida",
            None,
            UnitOfMeasure {
                name: "Litro".into(),
                abbreviation: "L".into(),
            },
            true,
        );
        ProductRepository::new(conn.clone()).insert(&product).unwrap();

        let ledger = StockLedger::new(conn.clone());
        let lot = ledger
            .register_lot(Lot::new(&product.product_id, "B1", q(total), None), "test")
            .unwrap();
        (ledger, conn, lot.lot_id)
    }

    #[test]
    fn test_reference_scenario() {
        let (ledger, _conn, lot_id) = setup(100);
        let ctx = MovementContext::system();

        ledger.reserve(&lot_id, q(30), &ctx).unwrap();
        assert_eq!(ledger.get_available(&lot_id).unwrap(), q(70));

        let returned = ledger.confirm_consumption(&lot_id, q(30), q(20), &ctx).unwrap();
        assert_eq!(returned, q(10));
        let lot = ledger.get_lot(&lot_id).unwrap();
        assert_eq!(lot.consumed_quantity, q(20));
        assert_eq!(lot.partial_quantity, q(10));
        assert_eq!(lot.reserved_quantity, q(0));
        assert_eq!(lot.available(), q(80));

        let lot = ledger.consume_partial(&lot_id, q(10), &ctx).unwrap();
        assert_eq!(lot.partial_quantity, q(0));
        assert_eq!(lot.available(), q(70));

        let err = ledger.reserve(&lot_id, q(75), &ctx).unwrap_err();
        assert_eq!(err.shortfall(), Some((q(75), q(70))));
    }

    #[test]
    fn test_failed_mutation_leaves_no_trace() {
        let (ledger, conn, lot_id) = setup(10);
        let ctx = MovementContext::system();
        assert!(ledger.reserve(&lot_id, q(11), &ctx).is_err());

        let lot = ledger.get_lot(&lot_id).unwrap();
        assert_eq!(lot.revision, 0);
        let movements = StockMovementRepository::new(conn).list_by_lot(&lot_id).unwrap();
        assert_eq!(movements.len(), 1); // 仅初始 RECEIVE
    }

    #[test]
    fn test_release_below_zero_is_invariant_violation() {
        let (ledger, _conn, lot_id) = setup(10);
        let ctx = MovementContext::system();
        ledger.reserve(&lot_id, q(4), &ctx).unwrap();
        ledger.release(&lot_id, q(4), &ctx).unwrap();
        let err = ledger.release(&lot_id, q(4), &ctx).unwrap_err();
        assert!(matches!(err, LedgerError::InvariantViolation(_)));
    }

    #[test]
    fn test_corrupted_row_is_reported_not_clamped() {
        let (ledger, conn, lot_id) = setup(10);
        conn.lock()
            .unwrap()
            .execute(
                "UPDATE inventory_lot SET consumed_quantity = '12' WHERE lot_id = ?",
                [&lot_id],
            )
            .unwrap();

        let err = ledger.get_available(&lot_id).unwrap_err();
        assert!(matches!(err, LedgerError::InconsistentLedgerState { .. }));
        let err = ledger
            .reserve(&lot_id, q(1), &MovementContext::system())
            .unwrap_err();
        assert!(matches!(err, LedgerError::InconsistentLedgerState { .. }));
    }

    #[test]
    fn test_receive_and_journal() {
        let (ledger, conn, lot_id) = setup(0);
        let ctx = MovementContext::system();
        ledger.receive(&lot_id, q(25), &ctx).unwrap();
        assert!(matches!(
            ledger.receive(&lot_id, q(0), &ctx),
            Err(LedgerError::InvalidQuantity(_))
        ));
        assert_eq!(ledger.get_available(&lot_id).unwrap(), q(25));

        let movements = StockMovementRepository::new(conn).list_by_lot(&lot_id).unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].movement_type, MovementType::Receive);
        assert_eq!(movements[0].lot_revision, 1);
    }
}
