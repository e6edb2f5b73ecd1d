// ==========================================
// 农业作业管理系统 - 库存 API
// ==========================================
// 职责: 产品/批次登记、入库、可用量查询、台账流水查询
// 说明: 可用量查询仅用于展示，权威校验在 StockLedger 事务内
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::error::{ApiError, ApiResult};
use crate::api::{actor_or_system, require_id};
use crate::config::ConfigManager;
use crate::domain::lot::Lot;
use crate::domain::product::{Product, UnitOfMeasure};
use crate::domain::stock_movement::{MovementContext, StockMovement};
use crate::domain::types::Quantity;
use crate::engine::{
    AvailabilityProjector, ProductAvailability, ProductAvailabilitySummary, StockLedger,
};
use crate::repository::{ProductRepository, StockMovementRepository};

/// 登记产品请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterProductRequest {
    pub name: String,
    pub sku: Option<String>,
    pub unit_name: String,
    pub unit_abbreviation: String,
    #[serde(default = "default_divisible")]
    pub divisible: bool,
}

fn default_divisible() -> bool {
    true
}

/// 登记批次请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterLotRequest {
    pub product_id: String,
    pub warehouse_id: String,
    pub quantity: Quantity,
    pub expires_at: Option<NaiveDate>,
    #[serde(default)]
    pub actor: Option<String>,
}

/// 流水查询条件（二选一）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementQuery {
    pub lot_id: Option<String>,
    pub activity_id: Option<String>,
}

// ==========================================
// InventoryApi - 库存 API
// ==========================================
pub struct InventoryApi {
    product_repo: Arc<ProductRepository>,
    movement_repo: Arc<StockMovementRepository>,
    ledger: Arc<StockLedger>,
    projector: Arc<AvailabilityProjector>,
    config: Arc<ConfigManager>,
}

impl InventoryApi {
    pub fn new(
        product_repo: Arc<ProductRepository>,
        movement_repo: Arc<StockMovementRepository>,
        ledger: Arc<StockLedger>,
        projector: Arc<AvailabilityProjector>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            product_repo,
            movement_repo,
            ledger,
            projector,
            config,
        }
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 产品搜索（含可用量）
    ///
    /// # 参数
    /// - limit: None 时使用配置 ledger.search_limit
    pub fn search_products_with_availability(
        &self,
        query: &str,
        limit: Option<usize>,
    ) -> ApiResult<Vec<ProductAvailabilitySummary>> {
        let limit = match limit {
            Some(0) => return Err(ApiError::InvalidInput("limit必须大于0".to_string())),
            Some(n) => n.min(crate::config::config_manager::MAX_SEARCH_LIMIT),
            None => self
                .config
                .get_search_limit()
                .map_err(|e| ApiError::InternalError(format!("配置读取失败: {}", e)))?,
        };

        let rows = self.projector.search_products_with_availability(query, limit)?;
        debug!(query = %query, limit = limit, rows = rows.len(), "产品搜索完成");
        Ok(rows)
    }

    /// 单产品可用量（含批次明细）
    pub fn get_product_availability(&self, product_id: &str) -> ApiResult<ProductAvailability> {
        require_id(product_id, "product_id")?;
        Ok(self.projector.available_for_selection(product_id)?)
    }

    pub fn get_lot(&self, lot_id: &str) -> ApiResult<Lot> {
        require_id(lot_id, "lot_id")?;
        Ok(self.ledger.get_lot(lot_id)?)
    }

    /// 台账流水（按批次或按作业）
    pub fn list_stock_movements(&self, query: &MovementQuery) -> ApiResult<Vec<StockMovement>> {
        match (query.lot_id.as_deref(), query.activity_id.as_deref()) {
            (Some(lot_id), None) => {
                require_id(lot_id, "lot_id")?;
                Ok(self.movement_repo.list_by_lot(lot_id)?)
            }
            (None, Some(activity_id)) => {
                require_id(activity_id, "activity_id")?;
                Ok(self.movement_repo.list_by_activity(activity_id)?)
            }
            _ => Err(ApiError::InvalidInput(
                "lot_id 与 activity_id 必须且只能提供一个".to_string(),
            )),
        }
    }

    // ==========================================
    // 登记/入库
    // ==========================================

    /// 登记产品（目录同步/初始化）
    pub fn register_product(&self, req: RegisterProductRequest) -> ApiResult<Product> {
        if req.name.trim().is_empty() {
            return Err(ApiError::InvalidInput("产品名称不能为空".to_string()));
        }
        if req.unit_abbreviation.trim().is_empty() {
            return Err(ApiError::InvalidInput("计量单位缩写不能为空".to_string()));
        }

        let sku = req
            .sku
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let product = Product::new(
            req.name.trim(),
            sku,
            UnitOfMeasure {
                name: req.unit_name.trim().to_string(),
                abbreviation: req.unit_abbreviation.trim().to_string(),
            },
            req.divisible,
        );
        self.product_repo.insert(&product)?;

        info!(product_id = %product.product_id, name = %product.name, "产品已登记");
        Ok(product)
    }

    /// 登记批次
    pub fn register_lot(&self, req: RegisterLotRequest) -> ApiResult<Lot> {
        require_id(&req.product_id, "product_id")?;
        require_id(&req.warehouse_id, "warehouse_id")?;

        let actor = actor_or_system(req.actor.as_deref());
        let lot = Lot::new(
            req.product_id.trim(),
            req.warehouse_id.trim(),
            req.quantity,
            req.expires_at,
        );
        let lot = self.ledger.register_lot(lot, &actor)?;

        info!(lot_id = %lot.lot_id, product_id = %lot.product_id, quantity = %lot.total_quantity, "批次已登记");
        Ok(lot)
    }

    /// 入库
    pub fn receive_stock(&self, lot_id: &str, quantity: Quantity, actor: Option<&str>) -> ApiResult<Lot> {
        require_id(lot_id, "lot_id")?;
        let ctx = MovementContext {
            actor: actor_or_system(actor),
            ..Default::default()
        };
        let lot = self.ledger.receive(lot_id, quantity, &ctx)?;

        info!(lot_id = %lot_id, quantity = %quantity, total = %lot.total_quantity, "入库完成");
        Ok(lot)
    }
}
