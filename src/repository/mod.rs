// ==========================================
// 农业作业管理系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约定: *_tx 方法接收 &Connection（可为 Transaction），供引擎组合进同一事务
// ==========================================

pub mod activity_repo;
pub mod error;
pub mod lot_repo;
pub mod product_repo;
pub mod reservation_repo;
pub mod stock_movement_repo;

pub(crate) mod sql_types;

// 重导出核心仓储
pub use activity_repo::ActivityRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use lot_repo::LotRepository;
pub use product_repo::ProductRepository;
pub use reservation_repo::ReservationRepository;
pub use stock_movement_repo::StockMovementRepository;
