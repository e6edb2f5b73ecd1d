// ==========================================
// 农业作业管理系统 - 作业 API
// ==========================================
// 职责: 作业创建/查询、预留（单条/批量）、取消、确认用量、结算、删除
// 约定: 批量预留逐条报告结果，已成功项保持提交
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::api::{actor_or_system, require_id};
use crate::domain::activity::{Activity, FinalizationInput, NewActivity};
use crate::domain::reservation::{Reservation, ReservationDraft, ReservationReturn};
use crate::domain::types::{Quantity, ReservationSource};
use crate::engine::{ActivityFulfillment, DeletionOutcome, FinalizationOutcome, ReservationManager};

/// 单条预留请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationItemRequest {
    pub product_id: String,
    /// 不指定时按批次选择策略挑选
    #[serde(default)]
    pub lot_id: Option<String>,
    pub quantity: Quantity,
    /// true: 从剩余库存预留
    #[serde(default)]
    pub use_surplus: bool,
}

impl ReservationItemRequest {
    fn to_draft(&self) -> ReservationDraft {
        ReservationDraft {
            product_id: self.product_id.trim().to_string(),
            lot_id: self
                .lot_id
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            quantity: self.quantity,
            source: ReservationSource::from_use_surplus(self.use_surplus),
        }
    }
}

/// 批量预留单项结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub index: usize,
    pub product_id: String,
    pub requested: Quantity,
    pub success: bool,
    pub reservation: Option<Reservation>,
    pub error: Option<ErrorResponse>,
}

/// 批量预留报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReservationReport {
    pub activity_id: String,
    pub succeeded: usize,
    pub failed: usize,
    pub items: Vec<BatchItemResult>,
}

/// 结算请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeActivityRequest {
    pub hours_worked: Quantity,
    pub hourly_rate: Quantity,
    #[serde(default)]
    pub observation: Option<String>,
    #[serde(default)]
    pub evidence_ref: Option<String>,
    #[serde(default)]
    pub returns: Vec<ReservationReturn>,
}

/// 作业详情（含预留）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDetail {
    pub activity: Activity,
    pub reservations: Vec<Reservation>,
}

// ==========================================
// ActivityApi - 作业 API
// ==========================================
pub struct ActivityApi {
    fulfillment: Arc<ActivityFulfillment>,
    reservations: Arc<ReservationManager>,
}

impl ActivityApi {
    pub fn new(fulfillment: Arc<ActivityFulfillment>, reservations: Arc<ReservationManager>) -> Self {
        Self {
            fulfillment,
            reservations,
        }
    }

    // ==========================================
    // 作业
    // ==========================================

    pub fn create_activity(&self, input: NewActivity) -> ApiResult<Activity> {
        Ok(self.fulfillment.create_activity(input)?)
    }

    pub fn get_activity(&self, activity_id: &str) -> ApiResult<ActivityDetail> {
        require_id(activity_id, "activity_id")?;
        let activity = self.fulfillment.get_activity(activity_id)?;
        let reservations = self.reservations.list_by_activity(activity_id)?;
        Ok(ActivityDetail {
            activity,
            reservations,
        })
    }

    pub fn list_reservations_by_activity(&self, activity_id: &str) -> ApiResult<Vec<Reservation>> {
        require_id(activity_id, "activity_id")?;
        Ok(self.reservations.list_by_activity(activity_id)?)
    }

    // ==========================================
    // 预留
    // ==========================================

    pub fn create_reservation(
        &self,
        activity_id: &str,
        item: &ReservationItemRequest,
        actor: Option<&str>,
    ) -> ApiResult<Reservation> {
        require_id(activity_id, "activity_id")?;
        require_id(&item.product_id, "product_id")?;
        let actor = actor_or_system(actor);
        Ok(self
            .fulfillment
            .attach_reservation(activity_id, &item.to_draft(), &actor)?)
    }

    /// 批量预留（逐条独立提交）
    pub fn create_reservations(
        &self,
        activity_id: &str,
        items: &[ReservationItemRequest],
        actor: Option<&str>,
    ) -> ApiResult<BatchReservationReport> {
        require_id(activity_id, "activity_id")?;
        if items.is_empty() {
            return Err(ApiError::InvalidInput("预留明细不能为空".to_string()));
        }
        let actor = actor_or_system(actor);

        // 逐条预校验（空产品ID不进入引擎），保持与请求一一对应
        let mut results: Vec<Option<ApiResult<Reservation>>> = Vec::with_capacity(items.len());
        let mut drafts = Vec::new();
        let mut slots = Vec::new();
        for (idx, item) in items.iter().enumerate() {
            match require_id(&item.product_id, "product_id") {
                Ok(()) => {
                    drafts.push(item.to_draft());
                    slots.push(idx);
                    results.push(None);
                }
                Err(e) => results.push(Some(Err(e))),
            }
        }

        let engine_results = self
            .fulfillment
            .attach_reservations(activity_id, &drafts, &actor)?;
        for (slot, result) in slots.into_iter().zip(engine_results) {
            results[slot] = Some(result.map_err(ApiError::from));
        }

        let mut report = BatchReservationReport {
            activity_id: activity_id.to_string(),
            succeeded: 0,
            failed: 0,
            items: Vec::with_capacity(items.len()),
        };
        for (idx, (item, result)) in items.iter().zip(results).enumerate() {
            let result = result.unwrap_or_else(|| {
                Err(ApiError::InternalError("批量预留结果缺失".to_string()))
            });
            let entry = match result {
                Ok(reservation) => {
                    report.succeeded += 1;
                    BatchItemResult {
                        index: idx,
                        product_id: item.product_id.clone(),
                        requested: item.quantity,
                        success: true,
                        reservation: Some(reservation),
                        error: None,
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    BatchItemResult {
                        index: idx,
                        product_id: item.product_id.clone(),
                        requested: item.quantity,
                        success: false,
                        reservation: None,
                        error: Some(err.to_response()),
                    }
                }
            };
            report.items.push(entry);
        }

        if report.failed > 0 {
            warn!(
                activity_id = %activity_id,
                succeeded = report.succeeded,
                failed = report.failed,
                "批量预留存在失败项"
            );
        }
        Ok(report)
    }

    pub fn cancel_reservation(&self, reservation_id: &str, actor: Option<&str>) -> ApiResult<Reservation> {
        require_id(reservation_id, "reservation_id")?;
        let actor = actor_or_system(actor);
        Ok(self.reservations.cancel_reservation(reservation_id, &actor)?)
    }

    pub fn confirm_usage(
        &self,
        reservation_id: &str,
        used_quantity: Quantity,
        actor: Option<&str>,
    ) -> ApiResult<Reservation> {
        require_id(reservation_id, "reservation_id")?;
        let actor = actor_or_system(actor);
        Ok(self
            .reservations
            .confirm_usage(reservation_id, used_quantity, &actor)?)
    }

    // ==========================================
    // 结算/删除
    // ==========================================

    pub fn finalize_activity(
        &self,
        activity_id: &str,
        req: FinalizeActivityRequest,
        actor: Option<&str>,
    ) -> ApiResult<FinalizationOutcome> {
        require_id(activity_id, "activity_id")?;
        let actor = actor_or_system(actor);

        let input = FinalizationInput {
            hours_worked: req.hours_worked,
            hourly_rate: req.hourly_rate,
            observation: req
                .observation
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            evidence_ref: req
                .evidence_ref
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        };
        Ok(self
            .fulfillment
            .finalize(activity_id, &input, &req.returns, &actor)?)
    }

    pub fn delete_activity(&self, activity_id: &str, actor: Option<&str>) -> ApiResult<DeletionOutcome> {
        require_id(activity_id, "activity_id")?;
        let actor = actor_or_system(actor);
        Ok(self.fulfillment.delete_activity(activity_id, &actor)?)
    }
}
