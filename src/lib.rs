// ==========================================
// 农业作业管理系统 - 库存预留与消耗台账（核心库）
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 作业物料预留 / 用量确认 / 余料回收 的权威台账
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 台账规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 性能埋点（SQL 计数/耗时）
pub mod perf;

// API 层 - 业务接口
pub mod api;

// 应用层 - 状态装配与命令入口
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ActivityStatus, LotSelectionPolicy, MovementType, Quantity, ReservationSource,
    ReservationStatus,
};

// 领域实体
pub use domain::{
    Activity, FinalizationInput, Lot, Product, Reservation, ReservationDraft, ReservationReturn,
    StockMovement,
};

// 引擎
pub use engine::{
    ActivityFulfillment, AvailabilityProjector, LedgerError, LotSelector, ReservationManager,
    StockLedger,
};

// API
pub use api::{ActivityApi, ApiError, InventoryApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "农业作业管理系统 - 库存台账";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
