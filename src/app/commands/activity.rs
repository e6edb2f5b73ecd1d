use crate::api::{FinalizeActivityRequest, ReservationItemRequest};
use crate::app::state::AppState;
use crate::domain::activity::NewActivity;
use crate::domain::reservation::ReservationReturn;
use crate::domain::types::Quantity;
use serde::Deserialize;

use super::common::{join_error, map_api_error, to_json};

// ==========================================
// 作业相关命令
// ==========================================

#[derive(Debug, Deserialize)]
pub struct ActivityIdArgs {
    pub activity_id: String,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReservationArgs {
    pub activity_id: String,
    pub product_id: String,
    #[serde(default)]
    pub lot_id: Option<String>,
    pub quantity: Quantity,
    #[serde(default)]
    pub use_surplus: bool,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReservationsArgs {
    pub activity_id: String,
    pub items: Vec<ReservationItemRequest>,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReservationIdArgs {
    pub reservation_id: String,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmUsageArgs {
    pub reservation_id: String,
    pub used_quantity: Quantity,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FinalizeActivityArgs {
    pub activity_id: String,
    pub hours_worked: Quantity,
    pub hourly_rate: Quantity,
    #[serde(default)]
    pub observation: Option<String>,
    #[serde(default)]
    pub evidence_ref: Option<String>,
    #[serde(default)]
    pub returns: Vec<ReservationReturn>,
    #[serde(default)]
    pub actor: Option<String>,
}

/// 新建作业
pub async fn create_activity(state: &AppState, args: NewActivity) -> Result<String, String> {
    let api = state.activity_api.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _perf = crate::perf::PerfGuard::new("ipc.create_activity");
        api.create_activity(args)
    })
    .await
    .map_err(join_error)?
    .map_err(map_api_error)?;

    to_json(&result)
}

/// 作业详情（含预留）
pub async fn get_activity(state: &AppState, args: ActivityIdArgs) -> Result<String, String> {
    let api = state.activity_api.clone();
    let result = tokio::task::spawn_blocking(move || api.get_activity(&args.activity_id))
        .await
        .map_err(join_error)?
        .map_err(map_api_error)?;

    to_json(&result)
}

/// 作业预留列表
pub async fn list_reservations_by_activity(
    state: &AppState,
    args: ActivityIdArgs,
) -> Result<String, String> {
    let api = state.activity_api.clone();
    let result = tokio::task::spawn_blocking(move || {
        api.list_reservations_by_activity(&args.activity_id)
    })
    .await
    .map_err(join_error)?
    .map_err(map_api_error)?;

    to_json(&result)
}

/// 单条预留
pub async fn create_reservation(state: &AppState, args: CreateReservationArgs) -> Result<String, String> {
    let api = state.activity_api.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _perf = crate::perf::PerfGuard::new("ipc.create_reservation");
        let item = ReservationItemRequest {
            product_id: args.product_id,
            lot_id: args.lot_id,
            quantity: args.quantity,
            use_surplus: args.use_surplus,
        };
        api.create_reservation(&args.activity_id, &item, args.actor.as_deref())
    })
    .await
    .map_err(join_error)?
    .map_err(map_api_error)?;

    to_json(&result)
}

/// 批量预留（逐条报告）
pub async fn create_reservations(state: &AppState, args: CreateReservationsArgs) -> Result<String, String> {
    let api = state.activity_api.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _perf = crate::perf::PerfGuard::new("ipc.create_reservations");
        api.create_reservations(&args.activity_id, &args.items, args.actor.as_deref())
    })
    .await
    .map_err(join_error)?
    .map_err(map_api_error)?;

    to_json(&result)
}

/// 取消预留
pub async fn cancel_reservation(state: &AppState, args: ReservationIdArgs) -> Result<String, String> {
    let api = state.activity_api.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _perf = crate::perf::PerfGuard::new("ipc.cancel_reservation");
        api.cancel_reservation(&args.reservation_id, args.actor.as_deref())
    })
    .await
    .map_err(join_error)?
    .map_err(map_api_error)?;

    to_json(&result)
}

/// 确认用量
pub async fn confirm_usage(state: &AppState, args: ConfirmUsageArgs) -> Result<String, String> {
    let api = state.activity_api.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _perf = crate::perf::PerfGuard::new("ipc.confirm_usage");
        api.confirm_usage(&args.reservation_id, args.used_quantity, args.actor.as_deref())
    })
    .await
    .map_err(join_error)?
    .map_err(map_api_error)?;

    to_json(&result)
}

/// 结算作业
pub async fn finalize_activity(state: &AppState, args: FinalizeActivityArgs) -> Result<String, String> {
    let api = state.activity_api.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _perf = crate::perf::PerfGuard::new("ipc.finalize_activity");
        let req = FinalizeActivityRequest {
            hours_worked: args.hours_worked,
            hourly_rate: args.hourly_rate,
            observation: args.observation,
            evidence_ref: args.evidence_ref,
            returns: args.returns,
        };
        api.finalize_activity(&args.activity_id, req, args.actor.as_deref())
    })
    .await
    .map_err(join_error)?
    .map_err(map_api_error)?;

    to_json(&result)
}

/// 删除作业
pub async fn delete_activity(state: &AppState, args: ActivityIdArgs) -> Result<String, String> {
    let api = state.activity_api.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _perf = crate::perf::PerfGuard::new("ipc.delete_activity");
        api.delete_activity(&args.activity_id, args.actor.as_deref())
    })
    .await
    .map_err(join_error)?
    .map_err(map_api_error)?;

    to_json(&result)
}
