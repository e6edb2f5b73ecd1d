// ==========================================
// 农业作业管理系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、批次数量运算
// 红线: 不含数据访问逻辑,不含引擎编排逻辑
// ==========================================

pub mod activity;
pub mod lot;
pub mod product;
pub mod reservation;
pub mod stock_movement;
pub mod types;

// 重导出核心类型
pub use activity::{Activity, FinalizationInput, FinalizationRecord, NewActivity};
pub use lot::{Lot, LotError};
pub use product::{Product, UnitOfMeasure};
pub use reservation::{Reservation, ReservationDraft, ReservationReturn};
pub use stock_movement::{MovementContext, StockMovement};
pub use types::{
    ActivityStatus, LotSelectionPolicy, MovementType, Quantity, ReservationSource,
    ReservationStatus,
};
