// ==========================================
// 农业作业管理系统 - 引擎层
// ==========================================
// 职责: 库存台账规则与作业履约编排,不拼 SQL
// 红线: 批次数量只能经由 StockLedger 修改
// 红线: 所有台账变更在 IMMEDIATE 事务内完成（检查与写入同一临界区）
// ==========================================

pub mod activity_fulfillment;
pub mod availability_projector;
pub mod error;
pub mod lot_selector;
pub mod reservation_manager;
pub mod stock_ledger;

// 重导出核心引擎
pub use activity_fulfillment::{ActivityFulfillment, DeletionOutcome, FinalizationOutcome};
pub use availability_projector::{
    AvailabilityProjector, LotAvailability, ProductAvailability, ProductAvailabilitySummary,
};
pub use error::{LedgerError, LedgerResult};
pub use lot_selector::{LotSelector, SelectionCriteria};
pub use reservation_manager::ReservationManager;
pub use stock_ledger::StockLedger;
