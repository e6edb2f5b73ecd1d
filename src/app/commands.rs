// ==========================================
// 农业作业管理系统 - 命令层（按域拆分）
// ==========================================
// 职责: JSON 命令入口，连接外部调用方与 API 层
// 约定: 成功返回结果 JSON 字符串；失败返回 ErrorResponse JSON 字符串
// ==========================================

mod activity;
mod common;
mod config;
mod inventory;

pub use activity::*;
pub use config::*;
pub use inventory::*;

pub(crate) use common::{map_api_error, parse_args};

use crate::api::error::ApiError;
use crate::app::state::AppState;

/// 全部可用命令（用于未知命令提示）
pub const COMMANDS: &[&str] = &[
    "search_products_with_availability",
    "get_product_availability",
    "get_lot",
    "register_product",
    "register_lot",
    "receive_stock",
    "list_stock_movements",
    "create_activity",
    "get_activity",
    "list_reservations_by_activity",
    "create_reservation",
    "create_reservations",
    "cancel_reservation",
    "confirm_usage",
    "finalize_activity",
    "delete_activity",
    "get_config_snapshot",
    "restore_config_from_snapshot",
    "set_config",
];

/// 按命令名分发
///
/// # 参数
/// - cmd: 命令名（见 COMMANDS）
/// - args: 命令参数对象；null 视为空对象
pub async fn dispatch(state: &AppState, cmd: &str, args: serde_json::Value) -> Result<String, String> {
    tracing::debug!(cmd = %cmd, "收到命令");

    match cmd {
        // ===== 库存 =====
        "search_products_with_availability" => {
            search_products_with_availability(state, parse_args(args)?).await
        }
        "get_product_availability" => get_product_availability(state, parse_args(args)?).await,
        "get_lot" => get_lot(state, parse_args(args)?).await,
        "register_product" => register_product(state, parse_args(args)?).await,
        "register_lot" => register_lot(state, parse_args(args)?).await,
        "receive_stock" => receive_stock(state, parse_args(args)?).await,
        "list_stock_movements" => list_stock_movements(state, parse_args(args)?).await,

        // ===== 作业与预留 =====
        "create_activity" => create_activity(state, parse_args(args)?).await,
        "get_activity" => get_activity(state, parse_args(args)?).await,
        "list_reservations_by_activity" => {
            list_reservations_by_activity(state, parse_args(args)?).await
        }
        "create_reservation" => create_reservation(state, parse_args(args)?).await,
        "create_reservations" => create_reservations(state, parse_args(args)?).await,
        "cancel_reservation" => cancel_reservation(state, parse_args(args)?).await,
        "confirm_usage" => confirm_usage(state, parse_args(args)?).await,
        "finalize_activity" => finalize_activity(state, parse_args(args)?).await,
        "delete_activity" => delete_activity(state, parse_args(args)?).await,

        // ===== 配置 =====
        "get_config_snapshot" => get_config_snapshot(state).await,
        "restore_config_from_snapshot" => {
            restore_config_from_snapshot(state, parse_args(args)?).await
        }
        "set_config" => set_config(state, parse_args(args)?).await,

        other => {
            tracing::warn!(cmd = %other, "未知命令");
            Err(map_api_error(ApiError::InvalidInput(format!(
                "未知命令: {}（可用命令: {}）",
                other,
                COMMANDS.join(", ")
            ))))
        }
    }
}
