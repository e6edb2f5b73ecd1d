// ==========================================
// 农业作业管理系统 - 预留领域模型
// ==========================================
// 一条预留 = 一个作业 × 一个批次 × 请求数量
// 只能由 ReservationManager 修改
// ==========================================

use crate::domain::types::{Quantity, ReservationSource, ReservationStatus};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 预留
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: String,
    pub activity_id: String,
    pub lot_id: String,
    pub product_id: String,

    pub requested_quantity: Quantity,
    pub source: ReservationSource,
    pub status: ReservationStatus,
    pub confirmed_used_quantity: Option<Quantity>, // 仅确认后有值
    pub returned_quantity: Quantity,
    /// 常规预留超出常规可用量时从剩余库存标记中占用的数量（取消时归还）
    #[serde(default)]
    pub surplus_drawn: Quantity,

    pub created_at: NaiveDateTime,
    pub settled_at: Option<NaiveDateTime>, // 确认或取消时间
}

impl Reservation {
    pub fn new(
        activity_id: &str,
        lot_id: &str,
        product_id: &str,
        requested_quantity: Quantity,
        source: ReservationSource,
    ) -> Self {
        Self {
            reservation_id: uuid::Uuid::new_v4().to_string(),
            activity_id: activity_id.to_string(),
            lot_id: lot_id.to_string(),
            product_id: product_id.to_string(),
            requested_quantity,
            source,
            status: ReservationStatus::Active,
            confirmed_used_quantity: None,
            returned_quantity: Decimal::ZERO,
            surplus_drawn: Decimal::ZERO,
            created_at: chrono::Utc::now().naive_utc(),
            settled_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }

    /// 标记为已确认
    pub fn mark_confirmed(&mut self, used_quantity: Quantity) {
        self.confirmed_used_quantity = Some(used_quantity);
        self.returned_quantity = self.requested_quantity - used_quantity;
        self.status = ReservationStatus::Confirmed;
        self.settled_at = Some(chrono::Utc::now().naive_utc());
    }

    /// 标记为已取消
    pub fn mark_cancelled(&mut self) {
        self.status = ReservationStatus::Cancelled;
        self.settled_at = Some(chrono::Utc::now().naive_utc());
    }
}

/// 预留草稿（请求级数据，取代前端全局的“已选产品”映射）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationDraft {
    pub product_id: String,
    /// None: 由批次选择策略决定
    pub lot_id: Option<String>,
    pub quantity: Quantity,
    pub source: ReservationSource,
}

/// 作业结算时的单条退回
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationReturn {
    pub reservation_id: String,
    pub returned_quantity: Quantity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_confirmed_sets_returned() {
        let mut r = Reservation::new("A1", "L1", "P1", Decimal::from(5), ReservationSource::Standard);
        assert!(r.is_active());
        r.mark_confirmed(Decimal::from(3));
        assert_eq!(r.status, ReservationStatus::Confirmed);
        assert_eq!(r.confirmed_used_quantity, Some(Decimal::from(3)));
        assert_eq!(r.returned_quantity, Decimal::from(2));
        assert!(r.settled_at.is_some());
    }
}
