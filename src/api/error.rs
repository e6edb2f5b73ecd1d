// ==========================================
// 农业作业管理系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，把仓储/台账错误转换为面向调用方的错误
// 约定: 库存不足类错误必须携带 requested / available
// ==========================================

use crate::domain::types::Quantity;
use crate::engine::error::LedgerError;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 库存错误
    // ==========================================
    #[error("库存不足: 请求={requested}, 可用={available}")]
    InsufficientStock {
        lot_id: Option<String>,
        requested: Quantity,
        available: Quantity,
    },

    #[error("剩余库存不足: 请求={requested}, 可用={available}")]
    InsufficientPartialStock {
        lot_id: Option<String>,
        requested: Quantity,
        available: Quantity,
    },

    #[error("台账数据不一致: {0}")]
    InconsistentLedgerState(String),

    #[error("台账不变式违反: {0}")]
    InvariantViolation(String),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("无效数量: {0}")]
    InvalidQuantity(String),

    #[error("无效的结算参数: {0}")]
    InvalidFinalizationInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: {entity}({id}) 当前={current}, 操作={action}")]
    InvalidStateTransition {
        entity: String,
        id: String,
        current: String,
        action: String,
    },

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("乐观锁冲突: {0}")]
    OptimisticLockFailure(String),

    #[error("数据库忙: {0}")]
    DatabaseBusy(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::RevisionConflict {
                entity,
                id,
                expected,
            } => ApiError::OptimisticLockFailure(format!(
                "{}({})已被其他操作修改（期望revision={}）",
                entity, id, expected
            )),
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::LockError(msg) => {
                ApiError::InternalError(format!("连接锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseBusy(msg) => ApiError::DatabaseBusy(msg),
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InternalError(format!("字段{}数据损坏: {}", field, message))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 LedgerError 转换
// ==========================================
impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientStock {
                lot_id,
                requested,
                available,
            } => ApiError::InsufficientStock {
                lot_id,
                requested,
                available,
            },
            LedgerError::InsufficientPartialStock {
                lot_id,
                requested,
                available,
            } => ApiError::InsufficientPartialStock {
                lot_id,
                requested,
                available,
            },
            LedgerError::InvalidQuantity(msg) => ApiError::InvalidQuantity(msg),
            LedgerError::InvalidFinalizationInput(msg) => ApiError::InvalidFinalizationInput(msg),
            LedgerError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            LedgerError::InvalidStateTransition {
                entity,
                id,
                current,
                action,
            } => ApiError::InvalidStateTransition {
                entity,
                id,
                current,
                action,
            },
            LedgerError::InvariantViolation(msg) => ApiError::InvariantViolation(msg),
            LedgerError::InconsistentLedgerState { lot_id, message } => {
                ApiError::InconsistentLedgerState(format!("lot_id={}, {}", lot_id, message))
            }
            LedgerError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            LedgerError::Config(msg) => ApiError::InternalError(format!("配置读取失败: {}", msg)),
            LedgerError::Repository(e) => e.into(),
        }
    }
}

impl ApiError {
    /// 错误代码（稳定，供调用方分支处理）
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            ApiError::InsufficientPartialStock { .. } => "INSUFFICIENT_PARTIAL_STOCK",
            ApiError::InconsistentLedgerState(_) => "INCONSISTENT_LEDGER_STATE",
            ApiError::InvariantViolation(_) => "INVARIANT_VIOLATION",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::InvalidQuantity(_) => "INVALID_QUANTITY",
            ApiError::InvalidFinalizationInput(_) => "INVALID_FINALIZATION_INPUT",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BusinessRuleViolation(_) => "BUSINESS_RULE_VIOLATION",
            ApiError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            ApiError::OptimisticLockFailure(_) => "OPTIMISTIC_LOCK_FAILURE",
            ApiError::DatabaseBusy(_) => "DATABASE_BUSY",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "OTHER_ERROR",
        }
    }

    /// 结构化详情（库存不足时含 requested / available）
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ApiError::InsufficientStock {
                lot_id,
                requested,
                available,
            }
            | ApiError::InsufficientPartialStock {
                lot_id,
                requested,
                available,
            } => Some(serde_json::json!({
                "lot_id": lot_id,
                "requested": requested,
                "available": available,
            })),
            ApiError::InvalidStateTransition {
                entity,
                id,
                current,
                action,
            } => Some(serde_json::json!({
                "entity": entity,
                "id": id,
                "current": current,
                "action": action,
            })),
            _ => None,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }
}

/// 错误响应（JSON）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,

    /// 错误消息
    pub message: String,

    /// 详细信息（可选）
    pub details: Option<serde_json::Value>,
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_ledger_shortfall_keeps_details() {
        let api_err: ApiError = LedgerError::InsufficientStock {
            lot_id: Some("L1".to_string()),
            requested: Decimal::from(75),
            available: Decimal::from(70),
        }
        .into();

        let resp = api_err.to_response();
        assert_eq!(resp.code, "INSUFFICIENT_STOCK");
        let details = resp.details.unwrap();
        assert_eq!(details["requested"], serde_json::json!("75"));
        assert_eq!(details["available"], serde_json::json!("70"));
        assert_eq!(details["lot_id"], serde_json::json!("L1"));
    }

    #[test]
    fn test_repository_error_conversion() {
        let api_err: ApiError = LedgerError::Repository(RepositoryError::NotFound {
            entity: "InventoryLot".to_string(),
            id: "L404".to_string(),
        })
        .into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("InventoryLot"));
                assert!(msg.contains("L404"));
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }

        let api_err: ApiError = RepositoryError::RevisionConflict {
            entity: "InventoryLot".to_string(),
            id: "L1".to_string(),
            expected: 3,
        }
        .into();
        assert_eq!(api_err.code(), "OPTIMISTIC_LOCK_FAILURE");
    }
}
