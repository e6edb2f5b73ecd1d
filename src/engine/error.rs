// ==========================================
// 农业作业管理系统 - 台账引擎错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定:
// - 库存不足类错误始终携带请求量与可用量
// - InconsistentLedgerState 为致命错误，记录 error 日志，不做自动修正
// ==========================================

use crate::domain::lot::LotError;
use crate::domain::types::Quantity;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 台账引擎错误
#[derive(Error, Debug)]
pub enum LedgerError {
    // ===== 库存不足 =====
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

    // ===== 输入校验 =====
    #[error("无效数量: {0}")]
    InvalidQuantity(String),

    #[error("无效的结算参数: {0}")]
    InvalidFinalizationInput(String),

    #[error("无效输入: {0}")]
    InvalidInput(String),

    // ===== 状态机 =====
    #[error("无效的状态转换: {entity} id={id}, 当前状态={current}, 操作={action}")]
    InvalidStateTransition {
        entity: String,
        id: String,
        current: String,
        action: String,
    },

    // ===== 台账一致性 =====
    #[error("台账不变式违反: {0}")]
    InvariantViolation(String),

    #[error("台账数据不一致: lot_id={lot_id}, {message}")]
    InconsistentLedgerState { lot_id: String, message: String },

    // ===== 数据访问 =====
    #[error("记录未找到: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("配置读取失败: {0}")]
    Config(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::Repository(err.into())
    }
}

impl LedgerError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        LedgerError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn invalid_transition(entity: &str, id: &str, current: impl ToString, action: &str) -> Self {
        LedgerError::InvalidStateTransition {
            entity: entity.to_string(),
            id: id.to_string(),
            current: current.to_string(),
            action: action.to_string(),
        }
    }

    /// 将批次数量运算错误映射为台账错误
    pub fn from_lot(lot_id: &str, err: LotError) -> Self {
        match err {
            LotError::NonPositiveQuantity(q) => {
                LedgerError::InvalidQuantity(format!("数量必须大于0: {}", q))
            }
            LotError::InsufficientStock {
                requested,
                available,
            } => LedgerError::InsufficientStock {
                lot_id: Some(lot_id.to_string()),
                requested,
                available,
            },
            LotError::InsufficientPartialStock {
                requested,
                available,
            } => LedgerError::InsufficientPartialStock {
                lot_id: Some(lot_id.to_string()),
                requested,
                available,
            },
            LotError::ReleaseExceedsReserved { reserved, release } => {
                LedgerError::InvariantViolation(format!(
                    "lot_id={} 释放量 {} 超过已预留量 {}",
                    lot_id, release, reserved
                ))
            }
            LotError::UsageOutOfRange { reserved, used } => LedgerError::InvalidQuantity(format!(
                "用量 {} 超出范围 [0, {}]",
                used, reserved
            )),
            LotError::Overflow(message) => {
                LedgerError::InvalidQuantity(format!("lot_id={} 数量溢出: {}", lot_id, message))
            }
            LotError::Inconsistent(message) => {
                tracing::error!(lot_id = %lot_id, message = %message, "批次台账数据不一致");
                LedgerError::InconsistentLedgerState {
                    lot_id: lot_id.to_string(),
                    message,
                }
            }
        }
    }

    /// 请求量/可用量（仅库存不足类错误）
    pub fn shortfall(&self) -> Option<(Quantity, Quantity)> {
        match self {
            LedgerError::InsufficientStock {
                requested,
                available,
                ..
            }
            | LedgerError::InsufficientPartialStock {
                requested,
                available,
                ..
            } => Some((*requested, *available)),
            _ => None,
        }
    }
}

/// Result 类型别名
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_from_lot_keeps_quantities() {
        let err = LedgerError::from_lot(
            "L1",
            LotError::InsufficientStock {
                requested: Decimal::from(75),
                available: Decimal::from(70),
            },
        );
        assert_eq!(err.shortfall(), Some((Decimal::from(75), Decimal::from(70))));
        match err {
            LedgerError::InsufficientStock { lot_id, .. } => assert_eq!(lot_id.as_deref(), Some("L1")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_double_release_is_invariant_violation() {
        let err = LedgerError::from_lot(
            "L1",
            LotError::ReleaseExceedsReserved {
                reserved: Decimal::ZERO,
                release: Decimal::from(4),
            },
        );
        assert!(matches!(err, LedgerError::InvariantViolation(_)));
        assert!(err.shortfall().is_none());
    }

    #[test]
    fn test_inconsistent_maps_to_fatal_state() {
        let err = LedgerError::from_lot("L9", LotError::Inconsistent("partial > available".into()));
        assert!(matches!(err, LedgerError::InconsistentLedgerState { .. }));
    }
}
