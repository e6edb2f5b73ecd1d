// ==========================================
// 农业作业管理系统 - 应用层
// ==========================================
// 职责: 应用状态装配 + JSON 命令入口
// ==========================================

pub mod commands;
pub mod ipc;
pub mod state;

// 重导出
pub use commands::dispatch;
pub use ipc::handle_line;
pub use state::{get_default_db_path, AppState};
