// ==========================================
// 农业作业管理系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 连接: 单进程共享一个 Arc<Mutex<Connection>>；跨进程靠 IMMEDIATE 事务 + busy_timeout
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{ActivityApi, InventoryApi};
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection, read_schema_version, CURRENT_SCHEMA_VERSION};
use crate::engine::{ActivityFulfillment, AvailabilityProjector, ReservationManager, StockLedger};
use crate::repository::{ProductRepository, StockMovementRepository};

/// 数据库路径覆写环境变量
pub const DB_PATH_ENV: &str = "AGROTIC_LEDGER_DB_PATH";

// ==========================================
// AppState - 应用状态
// ==========================================
pub struct AppState {
    db_path: String,
    pub inventory_api: Arc<InventoryApi>,
    pub activity_api: Arc<ActivityApi>,
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 1. 打开数据库并应用统一 PRAGMA
    /// 2. 幂等建表；schema_version 不一致时告警但继续
    /// 3. 初始化 Repository / Engine / API
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        match read_schema_version(&conn) {
            Ok(Some(v)) if v != CURRENT_SCHEMA_VERSION => {
                tracing::warn!(
                    found = v,
                    expected = CURRENT_SCHEMA_VERSION,
                    "数据库 schema_version 与当前代码不一致"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("读取 schema_version 失败(将继续启动): {}", e),
        }
        init_schema(&conn).map_err(|e| format!("数据库初始化失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let product_repo = Arc::new(ProductRepository::new(conn.clone()));
        let movement_repo = Arc::new(StockMovementRepository::new(conn.clone()));
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let ledger = Arc::new(StockLedger::new(conn.clone()));
        let reservation_manager = Arc::new(ReservationManager::new(conn.clone()));
        let fulfillment = Arc::new(ActivityFulfillment::new(conn.clone(), config_manager.clone()));
        let projector = Arc::new(AvailabilityProjector::new(conn.clone(), config_manager.clone()));

        // ==========================================
        // 初始化API层
        // ==========================================
        let inventory_api = Arc::new(InventoryApi::new(
            product_repo,
            movement_repo,
            ledger,
            projector,
            config_manager.clone(),
        ));
        let activity_api = Arc::new(ActivityApi::new(fulfillment, reservation_manager));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            inventory_api,
            activity_api,
            config_manager,
        })
    }

    /// 获取数据库路径
    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// # 返回
/// - 环境变量 AGROTIC_LEDGER_DB_PATH（非空时）
/// - 开发环境: 用户数据目录/agrotic-ledger-dev/agrotic_ledger.db
/// - 生产环境: 用户数据目录/agrotic-ledger/agrotic_ledger.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./agrotic_ledger.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("agrotic-ledger-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("agrotic-ledger");
        }

        // best-effort: 目录创建失败时由打开数据库报错
        std::fs::create_dir_all(&path).ok();
        path = path.join("agrotic_ledger.db");
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_new_initializes_schema() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let db_path = file.path().to_string_lossy().to_string();

        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.get_db_path(), db_path);

        let conn = open_sqlite_connection(&db_path).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }
}
