// ==========================================
// 农业作业管理系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供命令层调用
// 约定: 入参校验在此层完成，错误统一转换为 ApiError
// ==========================================

pub mod activity_api;
pub mod error;
pub mod inventory_api;

// 重导出核心类型
pub use activity_api::{
    ActivityApi, ActivityDetail, BatchItemResult, BatchReservationReport,
    FinalizeActivityRequest, ReservationItemRequest,
};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use inventory_api::{InventoryApi, MovementQuery, RegisterLotRequest, RegisterProductRequest};

/// 操作人（缺省为 system）
pub(crate) fn actor_or_system(actor: Option<&str>) -> String {
    match actor.map(str::trim) {
        Some(a) if !a.is_empty() => a.to_string(),
        _ => "system".to_string(),
    }
}

/// 必填 ID 校验
pub(crate) fn require_id(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_defaults_to_system() {
        assert_eq!(actor_or_system(None), "system");
        assert_eq!(actor_or_system(Some("  ")), "system");
        assert_eq!(actor_or_system(Some(" ana ")), "ana");
        assert!(require_id(" ", "lot_id").is_err());
    }
}
