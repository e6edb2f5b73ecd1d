// ==========================================
// 农业作业管理系统 - 作业履约（ActivityFulfillment）
// ==========================================
// 生命周期: OPEN →（预留 0..N）→ FINALIZED（终态）；OPEN → 删除
// 红线: FINALIZED 作业上的任何操作 → InvalidStateTransition
// 红线: 结算先整体校验，再在同一事务内完成全部预留结算与状态变更（不存在半结算）
// 批量预留: 逐条独立提交，失败项不回滚已成功项
// ==========================================

use crate::config::ConfigManager;
use crate::domain::activity::{Activity, FinalizationInput, FinalizationRecord, NewActivity};
use crate::domain::reservation::{Reservation, ReservationDraft, ReservationReturn};
use crate::domain::types::{ActivityStatus, Quantity};
use crate::engine::error::{LedgerError, LedgerResult};
use crate::engine::lot_selector::{LotSelector, SelectionCriteria};
use crate::engine::reservation_manager::ReservationManager;
use crate::engine::stock_ledger::{run_immediate, validate_divisibility};
use crate::repository::error::RepositoryError;
use crate::repository::{ActivityRepository, LotRepository, ProductRepository, ReservationRepository};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// 结算结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizationOutcome {
    pub activity: Activity,
    /// 本次结算确认的预留（创建顺序）
    pub settled: Vec<Reservation>,
}

/// 删除结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionOutcome {
    pub activity_id: String,
    pub released_reservations: usize,
}

// ==========================================
// ActivityFulfillment - 作业履约
// ==========================================
pub struct ActivityFulfillment {
    conn: Arc<Mutex<Connection>>,
    config: Arc<ConfigManager>,
}

impl ActivityFulfillment {
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<ConfigManager>) -> Self {
        Self { conn, config }
    }

    /// 新建作业（OPEN）
    pub fn create_activity(&self, input: NewActivity) -> LedgerResult<Activity> {
        if input.description.trim().is_empty() {
            return Err(LedgerError::InvalidInput("作业描述不能为空".to_string()));
        }
        if input.created_by.trim().is_empty() {
            return Err(LedgerError::InvalidInput("创建人不能为空".to_string()));
        }

        let activity = Activity::from_new(input);
        ActivityRepository::new(self.conn.clone()).insert(&activity)?;

        info!(
            activity_id = %activity.activity_id,
            assigned_users = activity.assigned_users.len(),
            "作业已创建"
        );
        Ok(activity)
    }

    pub fn get_activity(&self, activity_id: &str) -> LedgerResult<Activity> {
        ActivityRepository::new(self.conn.clone())
            .find_by_id(activity_id)?
            .ok_or_else(|| LedgerError::not_found("Activity", activity_id))
    }

    /// 为作业添加一条预留（独立事务）
    ///
    /// 未指定批次时按配置的批次选择策略挑选
    pub fn attach_reservation(
        &self,
        activity_id: &str,
        draft: &ReservationDraft,
        actor: &str,
    ) -> LedgerResult<Reservation> {
        let criteria = self.selection_criteria()?;

        run_immediate(&self.conn, |tx| {
            Self::load_open(tx, activity_id, "attach_reservation")?;

            let lot_id = match &draft.lot_id {
                Some(id) => id.clone(),
                None => {
                    if ProductRepository::find_by_id_tx(tx, &draft.product_id)?.is_none() {
                        return Err(LedgerError::not_found("Product", &draft.product_id));
                    }
                    let lots = LotRepository::list_by_product_tx(tx, &draft.product_id)?;
                    let lot = LotSelector::select(&lots, draft.quantity, draft.source, &criteria)?;
                    lot.lot_id.clone()
                }
            };

            ReservationManager::create_in(
                tx,
                activity_id,
                &lot_id,
                &draft.product_id,
                draft.quantity,
                draft.source,
                actor,
            )
        })
    }

    /// 批量添加预留：逐条独立提交，返回逐条结果
    ///
    /// # 返回
    /// - Err: 作业不存在或不是 OPEN（一条都不处理）
    /// - Ok(results): 与 drafts 一一对应
    pub fn attach_reservations(
        &self,
        activity_id: &str,
        drafts: &[ReservationDraft],
        actor: &str,
    ) -> LedgerResult<Vec<LedgerResult<Reservation>>> {
        {
            let guard = self
                .conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            Self::load_open(&guard, activity_id, "attach_reservations")?;
        }

        let results: Vec<LedgerResult<Reservation>> = drafts
            .iter()
            .map(|draft| self.attach_reservation(activity_id, draft, actor))
            .collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            warn!(
                activity_id = %activity_id,
                total = drafts.len(),
                failed = failed,
                "批量预留部分失败"
            );
        }
        Ok(results)
    }

    /// 结算作业
    ///
    /// # 参数
    /// - `returns`: 显式退回量；未列出的有效预留按“全部用完”确认
    pub fn finalize(
        &self,
        activity_id: &str,
        input: &FinalizationInput,
        returns: &[ReservationReturn],
        actor: &str,
    ) -> LedgerResult<FinalizationOutcome> {
        let record = Self::finalization_record(input)?;

        let outcome = run_immediate(&self.conn, |tx| {
            Self::load_open(tx, activity_id, "finalize")?;

            let active: Vec<Reservation> = ReservationRepository::list_by_activity_tx(tx, activity_id)?
                .into_iter()
                .filter(|r| r.is_active())
                .collect();

            // ===== 第一步: 全量校验（不做任何变更） =====
            let returned_by_id = Self::validate_returns(tx, activity_id, &active, returns)?;

            // ===== 第二步: 逐条结算 =====
            let mut settled = Vec::with_capacity(active.len());
            for r in &active {
                let returned = returned_by_id
                    .get(r.reservation_id.as_str())
                    .copied()
                    .unwrap_or(Decimal::ZERO);
                let used = r.requested_quantity - returned;
                settled.push(ReservationManager::confirm_in(tx, &r.reservation_id, used, actor)?);
            }

            // ===== 第三步: 状态变更 =====
            if !ActivityRepository::mark_finalized_tx(tx, activity_id, &record)? {
                return Err(LedgerError::invalid_transition(
                    "Activity",
                    activity_id,
                    ActivityStatus::Finalized,
                    "finalize",
                ));
            }

            let activity = ActivityRepository::find_by_id_tx(tx, activity_id)?
                .ok_or_else(|| LedgerError::not_found("Activity", activity_id))?;
            Ok(FinalizationOutcome { activity, settled })
        })?;

        info!(
            activity_id = %activity_id,
            settled = outcome.settled.len(),
            explicit_returns = returns.len(),
            "作业已结算"
        );
        Ok(outcome)
    }

    /// 删除作业：取消全部有效预留后删除（同一事务）
    pub fn delete_activity(&self, activity_id: &str, actor: &str) -> LedgerResult<DeletionOutcome> {
        let outcome = run_immediate(&self.conn, |tx| {
            Self::load_open(tx, activity_id, "delete")?;

            let active: Vec<Reservation> = ReservationRepository::list_by_activity_tx(tx, activity_id)?
                .into_iter()
                .filter(|r| r.is_active())
                .collect();
            for r in &active {
                ReservationManager::cancel_in(tx, &r.reservation_id, actor)?;
            }

            if !ActivityRepository::delete_open_tx(tx, activity_id)? {
                return Err(LedgerError::not_found("Activity", activity_id));
            }
            Ok(DeletionOutcome {
                activity_id: activity_id.to_string(),
                released_reservations: active.len(),
            })
        })?;

        info!(
            activity_id = %activity_id,
            released = outcome.released_reservations,
            "作业已删除"
        );
        Ok(outcome)
    }

    // ==========================================
    // 内部
    // ==========================================

    fn selection_criteria(&self) -> LedgerResult<SelectionCriteria> {
        let policy = self
            .config
            .get_lot_selection_policy()
            .map_err(|e| LedgerError::Config(e.to_string()))?;
        let allow_expired = self
            .config
            .get_allow_expired_lots()
            .map_err(|e| LedgerError::Config(e.to_string()))?;
        Ok(SelectionCriteria {
            policy,
            allow_expired,
            today: chrono::Local::now().date_naive(),
        })
    }

    fn load_open(conn: &Connection, activity_id: &str, action: &str) -> LedgerResult<Activity> {
        let activity = ActivityRepository::find_by_id_tx(conn, activity_id)?
            .ok_or_else(|| LedgerError::not_found("Activity", activity_id))?;
        if !activity.is_open() {
            warn!(activity_id = %activity_id, action = action, "作业已结算，拒绝操作");
            return Err(LedgerError::invalid_transition(
                "Activity",
                activity_id,
                activity.status,
                action,
            ));
        }
        Ok(activity)
    }

    /// 校验结算入参并计算工时费（在取连接锁之前完成）
    fn finalization_record(input: &FinalizationInput) -> LedgerResult<FinalizationRecord> {
        if input.hours_worked <= Decimal::ZERO {
            return Err(LedgerError::InvalidFinalizationInput(format!(
                "工时必须大于0: {}",
                input.hours_worked
            )));
        }
        if input.hourly_rate <= Decimal::ZERO {
            return Err(LedgerError::InvalidFinalizationInput(format!(
                "工时单价必须大于0: {}",
                input.hourly_rate
            )));
        }
        FinalizationRecord::from_input(input).ok_or_else(|| {
            LedgerError::InvalidFinalizationInput(format!(
                "工时费溢出: {} × {}",
                input.hours_worked, input.hourly_rate
            ))
        })
    }

    /// 校验退回量：目标必须为本作业的有效预留，0 <= 退回量 <= 请求量，且满足可分割性
    fn validate_returns<'a>(
        conn: &Connection,
        activity_id: &str,
        active: &[Reservation],
        returns: &'a [ReservationReturn],
    ) -> LedgerResult<HashMap<&'a str, Quantity>> {
        let by_id: HashMap<&str, &Reservation> = active
            .iter()
            .map(|r| (r.reservation_id.as_str(), r))
            .collect();

        let mut returned_by_id: HashMap<&'a str, Quantity> = HashMap::new();
        for ret in returns {
            let Some(reservation) = by_id.get(ret.reservation_id.as_str()) else {
                return Err(LedgerError::InvalidInput(format!(
                    "退回目标 {} 不是作业 {} 的有效预留",
                    ret.reservation_id, activity_id
                )));
            };
            if returned_by_id.contains_key(ret.reservation_id.as_str()) {
                return Err(LedgerError::InvalidInput(format!(
                    "预留 {} 的退回量重复提交",
                    ret.reservation_id
                )));
            }
            if ret.returned_quantity < Decimal::ZERO
                || ret.returned_quantity > reservation.requested_quantity
            {
                return Err(LedgerError::InvalidQuantity(format!(
                    "预留 {} 的退回量 {} 超出范围 [0, {}]",
                    ret.reservation_id, ret.returned_quantity, reservation.requested_quantity
                )));
            }
            let product = ProductRepository::find_by_id_tx(conn, &reservation.product_id)?
                .ok_or_else(|| LedgerError::not_found("Product", &reservation.product_id))?;
            validate_divisibility(&product, ret.returned_quantity, "退回量")?;

            returned_by_id.insert(ret.reservation_id.as_str(), ret.returned_quantity);
        }
        Ok(returned_by_id)
    }
}
