use crate::api::{MovementQuery, RegisterLotRequest, RegisterProductRequest};
use crate::app::state::AppState;
use crate::domain::types::Quantity;
use serde::Deserialize;

use super::common::{join_error, map_api_error, to_json};

// ==========================================
// 库存相关命令
// ==========================================

#[derive(Debug, Deserialize)]
pub struct SearchProductsArgs {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ProductIdArgs {
    pub product_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LotIdArgs {
    pub lot_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReceiveStockArgs {
    pub lot_id: String,
    pub quantity: Quantity,
    #[serde(default)]
    pub actor: Option<String>,
}

/// 产品搜索（含可用量）
pub async fn search_products_with_availability(
    state: &AppState,
    args: SearchProductsArgs,
) -> Result<String, String> {
    let api = state.inventory_api.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _perf = crate::perf::PerfGuard::new("ipc.search_products_with_availability");
        api.search_products_with_availability(&args.query, args.limit)
    })
    .await
    .map_err(join_error)?
    .map_err(map_api_error)?;

    to_json(&result)
}

/// 单产品可用量
pub async fn get_product_availability(state: &AppState, args: ProductIdArgs) -> Result<String, String> {
    let api = state.inventory_api.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _perf = crate::perf::PerfGuard::new("ipc.get_product_availability");
        api.get_product_availability(&args.product_id)
    })
    .await
    .map_err(join_error)?
    .map_err(map_api_error)?;

    to_json(&result)
}

/// 查询批次
pub async fn get_lot(state: &AppState, args: LotIdArgs) -> Result<String, String> {
    let api = state.inventory_api.clone();
    let result = tokio::task::spawn_blocking(move || api.get_lot(&args.lot_id))
        .await
        .map_err(join_error)?
        .map_err(map_api_error)?;

    to_json(&result)
}

/// 登记产品
pub async fn register_product(state: &AppState, args: RegisterProductRequest) -> Result<String, String> {
    let api = state.inventory_api.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _perf = crate::perf::PerfGuard::new("ipc.register_product");
        api.register_product(args)
    })
    .await
    .map_err(join_error)?
    .map_err(map_api_error)?;

    to_json(&result)
}

/// 登记批次
pub async fn register_lot(state: &AppState, args: RegisterLotRequest) -> Result<String, String> {
    let api = state.inventory_api.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _perf = crate::perf::PerfGuard::new("ipc.register_lot");
        api.register_lot(args)
    })
    .await
    .map_err(join_error)?
    .map_err(map_api_error)?;

    to_json(&result)
}

/// 入库
pub async fn receive_stock(state: &AppState, args: ReceiveStockArgs) -> Result<String, String> {
    let api = state.inventory_api.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _perf = crate::perf::PerfGuard::new("ipc.receive_stock");
        api.receive_stock(&args.lot_id, args.quantity, args.actor.as_deref())
    })
    .await
    .map_err(join_error)?
    .map_err(map_api_error)?;

    to_json(&result)
}

/// 台账流水
pub async fn list_stock_movements(state: &AppState, args: MovementQuery) -> Result<String, String> {
    let api = state.inventory_api.clone();
    let result = tokio::task::spawn_blocking(move || {
        let _perf = crate::perf::PerfGuard::new("ipc.list_stock_movements");
        api.list_stock_movements(&args)
    })
    .await
    .map_err(join_error)?
    .map_err(map_api_error)?;

    to_json(&result)
}
