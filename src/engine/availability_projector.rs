// ==========================================
// 农业作业管理系统 - 可用量投影（AvailabilityProjector）
// ==========================================
// 红线: 只读，不做任何台账变更
// 口径: 每批次 available = total - reserved - consumed（有效预留已包含在 reserved 中，不重复扣减）
//       standard = available - partial；partial = 剩余库存
// 过期批次: 列出但不计入合计（配置 ledger.allow_expired_lots 打开时计入）
// ==========================================

use crate::config::ConfigManager;
use crate::domain::lot::Lot;
use crate::domain::product::Product;
use crate::domain::types::Quantity;
use crate::engine::error::{LedgerError, LedgerResult};
use crate::repository::error::RepositoryError;
use crate::repository::{LotRepository, ProductRepository};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// 单批次可用量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotAvailability {
    pub lot_id: String,
    pub warehouse_id: String,
    pub expires_at: Option<NaiveDate>,
    pub expired: bool,
    pub available: Quantity,
    pub available_standard: Quantity,
    pub available_partial: Quantity,
    /// 是否计入产品合计
    pub counted: bool,
}

/// 产品可用量（含批次明细）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAvailability {
    pub product: Product,
    pub lots: Vec<LotAvailability>,
    pub total_available: Quantity,
    pub available_standard: Quantity,
    pub available_partial: Quantity,
}

/// 产品搜索行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAvailabilitySummary {
    pub product: Product,
    pub available_standard: Quantity,
    pub available_partial: Quantity,
}

// ==========================================
// AvailabilityProjector - 可用量投影
// ==========================================
pub struct AvailabilityProjector {
    conn: Arc<Mutex<Connection>>,
    config: Arc<ConfigManager>,
}

impl AvailabilityProjector {
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<ConfigManager>) -> Self {
        Self { conn, config }
    }

    /// 单产品可用量（供选择批次/数量）
    pub fn available_for_selection(&self, product_id: &str) -> LedgerResult<ProductAvailability> {
        let allow_expired = self.allow_expired()?;
        let today = chrono::Local::now().date_naive();

        let guard = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let product = ProductRepository::find_by_id_tx(&guard, product_id)?
            .ok_or_else(|| LedgerError::not_found("Product", product_id))?;
        let lots = LotRepository::list_by_product_tx(&guard, product_id)?;
        drop(guard);

        Self::project(product, &lots, allow_expired, today)
    }

    /// 产品搜索（名称/SKU），每产品一行
    pub fn search_products_with_availability(
        &self,
        query: &str,
        limit: usize,
    ) -> LedgerResult<Vec<ProductAvailabilitySummary>> {
        let allow_expired = self.allow_expired()?;
        let today = chrono::Local::now().date_naive();

        let products = ProductRepository::new(self.conn.clone()).search(query, limit)?;

        let guard = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let mut rows = Vec::with_capacity(products.len());
        for product in products {
            let lots = LotRepository::list_by_product_tx(&guard, &product.product_id)?;
            let projected = Self::project(product, &lots, allow_expired, today)?;
            rows.push(ProductAvailabilitySummary {
                product: projected.product,
                available_standard: projected.available_standard,
                available_partial: projected.available_partial,
            });
        }
        Ok(rows)
    }

    fn allow_expired(&self) -> LedgerResult<bool> {
        self.config
            .get_allow_expired_lots()
            .map_err(|e| LedgerError::Config(e.to_string()))
    }

    /// 纯计算：批次 → 产品可用量
    pub fn project(
        product: Product,
        lots: &[Lot],
        allow_expired: bool,
        today: NaiveDate,
    ) -> LedgerResult<ProductAvailability> {
        let mut details = Vec::with_capacity(lots.len());
        let mut total_available = Decimal::ZERO;
        let mut available_standard = Decimal::ZERO;
        let mut available_partial = Decimal::ZERO;

        for lot in lots {
            lot.check_invariants()
                .map_err(|e| LedgerError::from_lot(&lot.lot_id, e))?;

            let expired = lot.is_expired(today);
            let counted = allow_expired || !expired;
            if counted {
                // 多批次合计按饱和加法累加
                total_available = total_available.saturating_add(lot.available());
                available_standard = available_standard.saturating_add(lot.standard_available());
                available_partial = available_partial.saturating_add(lot.partial_quantity);
            }

            details.push(LotAvailability {
                lot_id: lot.lot_id.clone(),
                warehouse_id: lot.warehouse_id.clone(),
                expires_at: lot.expires_at,
                expired,
                available: lot.available(),
                available_standard: lot.standard_available(),
                available_partial: lot.partial_quantity,
                counted,
            });
        }

        Ok(ProductAvailability {
            product,
            lots: details,
            total_available,
            available_standard,
            available_partial,
        })
    }
}
