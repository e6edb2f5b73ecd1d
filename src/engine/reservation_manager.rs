// ==========================================
// 农业作业管理系统 - 预留管理（ReservationManager）
// ==========================================
// 状态机: ACTIVE → CONFIRMED | ACTIVE → CANCELLED（两者均为终态）
// 红线: 台账变更与预留记录写入在同一事务内（失败则都不落库）
// ==========================================

use crate::domain::reservation::Reservation;
use crate::domain::stock_movement::MovementContext;
use crate::domain::types::{Quantity, ReservationSource, ReservationStatus};
use crate::engine::error::{LedgerError, LedgerResult};
use crate::engine::stock_ledger::{run_immediate, validate_divisibility, validate_quantity, StockLedger};
use crate::repository::error::RepositoryError;
use crate::repository::{ActivityRepository, LotRepository, ProductRepository, ReservationRepository};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tracing::info;

// ==========================================
// ReservationManager - 预留管理
// ==========================================
pub struct ReservationManager {
    conn: Arc<Mutex<Connection>>,
}

impl ReservationManager {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 创建预留
    ///
    /// # 参数
    /// - `source`: Standard → StockLedger.reserve；PartialStock → StockLedger.consume_partial
    ///
    /// # 返回
    /// - Ok(Reservation): ACTIVE 状态的预留
    /// - Err(InsufficientStock / InsufficientPartialStock): 台账拒绝，不创建记录
    pub fn create_reservation(
        &self,
        activity_id: &str,
        lot_id: &str,
        product_id: &str,
        quantity: Quantity,
        source: ReservationSource,
        actor: &str,
    ) -> LedgerResult<Reservation> {
        run_immediate(&self.conn, |tx| {
            Self::create_in(tx, activity_id, lot_id, product_id, quantity, source, actor)
        })
    }

    /// 取消预留（释放全部请求量）
    pub fn cancel_reservation(&self, reservation_id: &str, actor: &str) -> LedgerResult<Reservation> {
        run_immediate(&self.conn, |tx| Self::cancel_in(tx, reservation_id, actor))
    }

    /// 确认实际用量
    pub fn confirm_usage(
        &self,
        reservation_id: &str,
        used_quantity: Quantity,
        actor: &str,
    ) -> LedgerResult<Reservation> {
        run_immediate(&self.conn, |tx| Self::confirm_in(tx, reservation_id, used_quantity, actor))
    }

    /// 按作业列出预留（创建顺序）
    pub fn list_by_activity(&self, activity_id: &str) -> LedgerResult<Vec<Reservation>> {
        let guard = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        if ActivityRepository::find_by_id_tx(&guard, activity_id)?.is_none() {
            return Err(LedgerError::not_found("Activity", activity_id));
        }
        Ok(ReservationRepository::list_by_activity_tx(&guard, activity_id)?)
    }

    pub fn find_by_id(&self, reservation_id: &str) -> LedgerResult<Reservation> {
        let guard = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        ReservationRepository::find_by_id_tx(&guard, reservation_id)?
            .ok_or_else(|| LedgerError::not_found("Reservation", reservation_id))
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub(crate) fn create_in(
        conn: &Connection,
        activity_id: &str,
        lot_id: &str,
        product_id: &str,
        quantity: Quantity,
        source: ReservationSource,
        actor: &str,
    ) -> LedgerResult<Reservation> {
        let product = ProductRepository::find_by_id_tx(conn, product_id)?
            .ok_or_else(|| LedgerError::not_found("Product", product_id))?;
        validate_quantity(&product, quantity, "预留数量")?;

        let lot = LotRepository::find_by_id_tx(conn, lot_id)?
            .ok_or_else(|| LedgerError::not_found("InventoryLot", lot_id))?;
        if lot.product_id != product_id {
            return Err(LedgerError::InvalidInput(format!(
                "批次 {} 不属于产品 {}",
                lot_id, product_id
            )));
        }
        if ActivityRepository::find_by_id_tx(conn, activity_id)?.is_none() {
            return Err(LedgerError::not_found("Activity", activity_id));
        }

        let mut reservation = Reservation::new(activity_id, lot_id, product_id, quantity, source);
        let ctx = MovementContext::for_reservation(activity_id, &reservation.reservation_id, actor);
        match source {
            ReservationSource::Standard => {
                let (_, drawn) = StockLedger::reserve_in(conn, lot_id, quantity, &ctx)?;
                reservation.surplus_drawn = drawn;
            }
            ReservationSource::PartialStock => {
                StockLedger::consume_partial_in(conn, lot_id, quantity, &ctx)?;
            }
        }
        ReservationRepository::insert_tx(conn, &reservation)?;

        info!(
            reservation_id = %reservation.reservation_id,
            activity_id = %activity_id,
            lot_id = %lot_id,
            quantity = %quantity,
            source = %source,
            "预留已创建"
        );
        Ok(reservation)
    }

    pub(crate) fn cancel_in(
        conn: &Connection,
        reservation_id: &str,
        actor: &str,
    ) -> LedgerResult<Reservation> {
        let mut reservation = Self::load_active(conn, reservation_id, "cancel")?;

        let ctx = MovementContext::for_reservation(&reservation.activity_id, reservation_id, actor);
        match reservation.source {
            ReservationSource::Standard => StockLedger::release_in(
                conn,
                &reservation.lot_id,
                reservation.requested_quantity,
                reservation.surplus_drawn,
                &ctx,
            )?,
            ReservationSource::PartialStock => StockLedger::release_to_surplus_in(
                conn,
                &reservation.lot_id,
                reservation.requested_quantity,
                &ctx,
            )?,
        };

        reservation.mark_cancelled();
        Self::persist_settlement(conn, &reservation, "cancel")?;

        info!(reservation_id = %reservation_id, lot_id = %reservation.lot_id, "预留已取消");
        Ok(reservation)
    }

    pub(crate) fn confirm_in(
        conn: &Connection,
        reservation_id: &str,
        used_quantity: Quantity,
        actor: &str,
    ) -> LedgerResult<Reservation> {
        let mut reservation = Self::load_active(conn, reservation_id, "confirm_usage")?;

        if used_quantity < Decimal::ZERO || used_quantity > reservation.requested_quantity {
            return Err(LedgerError::InvalidQuantity(format!(
                "实际用量 {} 超出范围 [0, {}]",
                used_quantity, reservation.requested_quantity
            )));
        }
        let product = ProductRepository::find_by_id_tx(conn, &reservation.product_id)?
            .ok_or_else(|| LedgerError::not_found("Product", &reservation.product_id))?;
        validate_divisibility(&product, used_quantity, "实际用量")?;

        let ctx = MovementContext::for_reservation(&reservation.activity_id, reservation_id, actor);
        let returned = StockLedger::confirm_consumption_in(
            conn,
            &reservation.lot_id,
            reservation.requested_quantity,
            used_quantity,
            &ctx,
        )?;

        reservation.mark_confirmed(used_quantity);
        debug_assert_eq!(reservation.returned_quantity, returned);
        Self::persist_settlement(conn, &reservation, "confirm_usage")?;

        info!(
            reservation_id = %reservation_id,
            used = %used_quantity,
            returned = %returned,
            "预留已确认消耗"
        );
        Ok(reservation)
    }

    fn load_active(conn: &Connection, reservation_id: &str, action: &str) -> LedgerResult<Reservation> {
        let reservation = ReservationRepository::find_by_id_tx(conn, reservation_id)?
            .ok_or_else(|| LedgerError::not_found("Reservation", reservation_id))?;
        if reservation.status != ReservationStatus::Active {
            tracing::warn!(
                reservation_id = %reservation_id,
                status = %reservation.status,
                action = action,
                "预留已结算，拒绝操作"
            );
            return Err(LedgerError::invalid_transition(
                "Reservation",
                reservation_id,
                reservation.status,
                action,
            ));
        }
        Ok(reservation)
    }

    fn persist_settlement(conn: &Connection, reservation: &Reservation, action: &str) -> LedgerResult<()> {
        if !ReservationRepository::update_settlement_tx(conn, reservation)? {
            return Err(LedgerError::invalid_transition(
                "Reservation",
                &reservation.reservation_id,
                "SETTLED",
                action,
            ));
        }
        Ok(())
    }
}
