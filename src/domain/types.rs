// ==========================================
// 农业作业管理系统 - 领域类型定义
// ==========================================
// 数量统一使用十进制（rust_decimal），禁止浮点
// 状态/来源统一使用枚举，数据库中以 SCREAMING_SNAKE_CASE 存储
// ==========================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 库存数量（十进制精确值）
pub type Quantity = Decimal;

// ==========================================
// 预留来源 (Reservation Source)
// ==========================================
// 取代前端的 isSurplus / custom 布尔标记
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationSource {
    Standard,     // 常规库存
    PartialStock, // 剩余（退回可再用）库存
}

impl fmt::Display for ReservationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl ReservationSource {
    /// 由入参的 use_surplus 标记映射
    pub fn from_use_surplus(use_surplus: bool) -> Self {
        if use_surplus {
            ReservationSource::PartialStock
        } else {
            ReservationSource::Standard
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ReservationSource::Standard => "STANDARD",
            ReservationSource::PartialStock => "PARTIAL_STOCK",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "STANDARD" => Some(ReservationSource::Standard),
            "PARTIAL_STOCK" => Some(ReservationSource::PartialStock),
            _ => None,
        }
    }
}

// ==========================================
// 预留状态 (Reservation Status)
// ==========================================
// 状态机: ACTIVE → CONFIRMED | ACTIVE → CANCELLED（均为终态）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Active,    // 已预留，未结算
    Confirmed, // 已确认用量
    Cancelled, // 已取消
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl ReservationStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "ACTIVE",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" => Some(ReservationStatus::Active),
            "CONFIRMED" => Some(ReservationStatus::Confirmed),
            "CANCELLED" => Some(ReservationStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Active)
    }
}

// ==========================================
// 作业状态 (Activity Status)
// ==========================================
// 状态机: OPEN → FINALIZED（终态）；OPEN → 删除
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    Open,
    Finalized,
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl ActivityStatus {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ActivityStatus::Open => "OPEN",
            ActivityStatus::Finalized => "FINALIZED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "OPEN" => Some(ActivityStatus::Open),
            "FINALIZED" => Some(ActivityStatus::Finalized),
            _ => None,
        }
    }
}

// ==========================================
// 台账流水类型 (Movement Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Receive,        // 入库（total 增加）
    Reserve,        // 常规预留
    ReserveSurplus, // 从剩余库存预留
    Release,        // 释放预留
    ReleaseSurplus, // 释放剩余库存预留（恢复剩余标记）
    Consume,        // 确认消耗（余量转为剩余库存）
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}

impl MovementType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            MovementType::Receive => "RECEIVE",
            MovementType::Reserve => "RESERVE",
            MovementType::ReserveSurplus => "RESERVE_SURPLUS",
            MovementType::Release => "RELEASE",
            MovementType::ReleaseSurplus => "RELEASE_SURPLUS",
            MovementType::Consume => "CONSUME",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "RECEIVE" => Some(MovementType::Receive),
            "RESERVE" => Some(MovementType::Reserve),
            "RESERVE_SURPLUS" => Some(MovementType::ReserveSurplus),
            "RELEASE" => Some(MovementType::Release),
            "RELEASE_SURPLUS" => Some(MovementType::ReleaseSurplus),
            "CONSUME" => Some(MovementType::Consume),
            _ => None,
        }
    }
}

// ==========================================
// 批次选择策略 (Lot Selection Policy)
// ==========================================
// 按产品预留且未指定批次时使用
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LotSelectionPolicy {
    #[default]
    Fefo, // 先到期先出（无到期日排最后），同到期按入库先后
    Fifo, // 先入库先出
}

impl fmt::Display for LotSelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LotSelectionPolicy::Fefo => write!(f, "FEFO"),
            LotSelectionPolicy::Fifo => write!(f, "FIFO"),
        }
    }
}

impl LotSelectionPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "FEFO" => Some(LotSelectionPolicy::Fefo),
            "FIFO" => Some(LotSelectionPolicy::Fifo),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_db_strings() {
        for status in [
            ReservationStatus::Active,
            ReservationStatus::Confirmed,
            ReservationStatus::Cancelled,
        ] {
            assert_eq!(ReservationStatus::from_db_str(status.to_db_str()), Some(status));
        }
        assert_eq!(ReservationStatus::from_db_str("BOGUS"), None);
        assert!(ReservationStatus::Confirmed.is_terminal());
        assert!(!ReservationStatus::Active.is_terminal());
    }

    #[test]
    fn test_source_from_use_surplus() {
        assert_eq!(ReservationSource::from_use_surplus(true), ReservationSource::PartialStock);
        assert_eq!(ReservationSource::from_use_surplus(false), ReservationSource::Standard);
        assert_eq!(
            serde_json::to_string(&ReservationSource::PartialStock).unwrap(),
            "\"PARTIAL_STOCK\""
        );
    }

    #[test]
    fn test_lot_selection_policy_parse() {
        assert_eq!(LotSelectionPolicy::from_str("fefo"), Some(LotSelectionPolicy::Fefo));
        assert_eq!(LotSelectionPolicy::from_str(" FIFO "), Some(LotSelectionPolicy::Fifo));
        assert_eq!(LotSelectionPolicy::from_str("LIFO"), None);
    }
}
