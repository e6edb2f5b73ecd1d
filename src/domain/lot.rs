// ==========================================
// 农业作业管理系统 - 库存批次领域模型
// ==========================================
// 数量口径:
// - total_quantity:    累计入库量（只增不减）
// - reserved_quantity: 未结算预留之和
// - consumed_quantity: 已永久消耗量
// - partial_quantity:  剩余库存（作业退回、可再用），是可用量中的带标记子集
//
// 可用量 available = total - reserved - consumed
// 常规可用 = available - partial；剩余可用 = partial
//
// 不变式（任何时刻）:
// - 四个数量均 >= 0
// - reserved + consumed <= total（蕴含 reserved + consumed <= total + partial）
// - partial <= available
// ==========================================

use crate::domain::types::Quantity;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 批次数量运算错误（由引擎层映射为台账错误）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LotError {
    #[error("数量必须大于0: {0}")]
    NonPositiveQuantity(Quantity),

    #[error("库存不足: 请求={requested}, 可用={available}")]
    InsufficientStock {
        requested: Quantity,
        available: Quantity,
    },

    #[error("剩余库存不足: 请求={requested}, 可用={available}")]
    InsufficientPartialStock {
        requested: Quantity,
        available: Quantity,
    },

    #[error("释放量超过已预留量: 已预留={reserved}, 释放={release}")]
    ReleaseExceedsReserved {
        reserved: Quantity,
        release: Quantity,
    },

    #[error("用量超出预留量: 预留={reserved}, 用量={used}")]
    UsageOutOfRange { reserved: Quantity, used: Quantity },

    #[error("数量溢出: {0}")]
    Overflow(String),

    #[error("批次数量不一致: {0}")]
    Inconsistent(String),
}

/// 库存批次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub lot_id: String,
    pub product_id: String,
    pub warehouse_id: String,

    // ===== 台账数量 =====
    pub total_quantity: Quantity,
    pub reserved_quantity: Quantity,
    pub partial_quantity: Quantity,
    pub consumed_quantity: Quantity,

    // ===== 批次属性 =====
    pub received_at: NaiveDateTime,
    pub expires_at: Option<NaiveDate>,

    /// 每次台账变更 +1
    pub revision: i64,
    pub updated_at: NaiveDateTime,
}

impl Lot {
    /// 新入库批次（仅 total 有值）
    pub fn new(
        product_id: &str,
        warehouse_id: &str,
        total_quantity: Quantity,
        expires_at: Option<NaiveDate>,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            lot_id: uuid::Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            warehouse_id: warehouse_id.to_string(),
            total_quantity,
            reserved_quantity: Decimal::ZERO,
            partial_quantity: Decimal::ZERO,
            consumed_quantity: Decimal::ZERO,
            received_at: now,
            expires_at,
            revision: 0,
            updated_at: now,
        }
    }

    /// 可用量（未校验；调用方应先 check_invariants）
    pub fn available(&self) -> Quantity {
        self.total_quantity - self.reserved_quantity - self.consumed_quantity
    }

    /// 常规可用量（不含剩余库存标记部分）
    pub fn standard_available(&self) -> Quantity {
        self.available() - self.partial_quantity
    }

    /// 是否已过期（到期日当天仍可用）
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expires_at.map(|d| d < today).unwrap_or(false)
    }

    /// 校验批次不变式
    pub fn check_invariants(&self) -> Result<(), LotError> {
        let fields = [
            ("total_quantity", self.total_quantity),
            ("reserved_quantity", self.reserved_quantity),
            ("partial_quantity", self.partial_quantity),
            ("consumed_quantity", self.consumed_quantity),
        ];
        for (name, value) in fields {
            if value < Decimal::ZERO {
                return Err(LotError::Inconsistent(format!("{}={} 为负", name, value)));
            }
        }

        let committed = self
            .reserved_quantity
            .checked_add(self.consumed_quantity)
            .ok_or_else(|| LotError::Inconsistent("reserved + consumed 溢出".to_string()))?;
        if committed > self.total_quantity {
            return Err(LotError::Inconsistent(format!(
                "reserved({}) + consumed({}) > total({})",
                self.reserved_quantity, self.consumed_quantity, self.total_quantity
            )));
        }

        if self.partial_quantity > self.available() {
            return Err(LotError::Inconsistent(format!(
                "partial({}) > available({})",
                self.partial_quantity,
                self.available()
            )));
        }

        Ok(())
    }

    fn ensure_positive(quantity: Quantity) -> Result<(), LotError> {
        if quantity <= Decimal::ZERO {
            return Err(LotError::NonPositiveQuantity(quantity));
        }
        Ok(())
    }

    fn add(current: Quantity, delta: Quantity, field: &str) -> Result<Quantity, LotError> {
        current
            .checked_add(delta)
            .ok_or_else(|| LotError::Overflow(format!("{} {} + {}", field, current, delta)))
    }

    fn bump(&mut self) -> Result<(), LotError> {
        self.check_invariants()?;
        self.revision += 1;
        self.updated_at = chrono::Utc::now().naive_utc();
        Ok(())
    }

    /// 入库
    pub fn receive(&mut self, quantity: Quantity) -> Result<(), LotError> {
        self.check_invariants()?;
        Self::ensure_positive(quantity)?;
        self.total_quantity = Self::add(self.total_quantity, quantity, "total_quantity")?;
        self.bump()
    }

    /// 常规预留
    ///
    /// 先占用常规可用量；超出部分从剩余库存标记中扣除，保持 partial <= available。
    ///
    /// # 返回
    /// - Ok(drawn_from_surplus): 从剩余库存标记中扣除的数量
    pub fn reserve(&mut self, quantity: Quantity) -> Result<Quantity, LotError> {
        self.check_invariants()?;
        Self::ensure_positive(quantity)?;

        let available = self.available();
        if quantity > available {
            return Err(LotError::InsufficientStock {
                requested: quantity,
                available,
            });
        }

        let drawn = (quantity - self.standard_available()).max(Decimal::ZERO);
        self.reserved_quantity = Self::add(self.reserved_quantity, quantity, "reserved_quantity")?;
        self.partial_quantity -= drawn;
        self.bump()?;
        Ok(drawn)
    }

    /// 从剩余库存预留
    pub fn reserve_from_partial(&mut self, quantity: Quantity) -> Result<(), LotError> {
        self.check_invariants()?;
        Self::ensure_positive(quantity)?;

        if quantity > self.partial_quantity {
            return Err(LotError::InsufficientPartialStock {
                requested: quantity,
                available: self.partial_quantity,
            });
        }

        self.reserved_quantity = Self::add(self.reserved_quantity, quantity, "reserved_quantity")?;
        self.partial_quantity -= quantity;
        self.bump()
    }

    /// 释放预留
    ///
    /// - surplus_restore: 释放量中恢复为剩余库存标记的部分（0 <= surplus_restore <= quantity）
    pub fn release(&mut self, quantity: Quantity, surplus_restore: Quantity) -> Result<(), LotError> {
        self.check_invariants()?;
        Self::ensure_positive(quantity)?;
        if surplus_restore < Decimal::ZERO || surplus_restore > quantity {
            return Err(LotError::Inconsistent(format!(
                "恢复剩余量 {} 超出释放量 {}",
                surplus_restore, quantity
            )));
        }

        if quantity > self.reserved_quantity {
            return Err(LotError::ReleaseExceedsReserved {
                reserved: self.reserved_quantity,
                release: quantity,
            });
        }

        self.partial_quantity = Self::add(self.partial_quantity, surplus_restore, "partial_quantity")?;
        self.reserved_quantity -= quantity;
        self.bump()
    }

    /// 确认消耗
    ///
    /// reserved -= reserved_qty；consumed += used_qty；余量转入剩余库存。
    ///
    /// # 返回
    /// - Ok(returned): 转为剩余库存的数量
    pub fn confirm_consumption(
        &mut self,
        reserved_qty: Quantity,
        used_qty: Quantity,
    ) -> Result<Quantity, LotError> {
        self.check_invariants()?;
        Self::ensure_positive(reserved_qty)?;

        if used_qty < Decimal::ZERO || used_qty > reserved_qty {
            return Err(LotError::UsageOutOfRange {
                reserved: reserved_qty,
                used: used_qty,
            });
        }
        if reserved_qty > self.reserved_quantity {
            return Err(LotError::ReleaseExceedsReserved {
                reserved: self.reserved_quantity,
                release: reserved_qty,
            });
        }

        let returned = (reserved_qty - used_qty).max(Decimal::ZERO);
        let consumed = Self::add(self.consumed_quantity, used_qty, "consumed_quantity")?;
        let partial = Self::add(self.partial_quantity, returned, "partial_quantity")?;
        self.reserved_quantity -= reserved_qty;
        self.consumed_quantity = consumed;
        self.partial_quantity = partial;
        self.bump()?;
        Ok(returned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(v: i64) -> Quantity {
        Decimal::from(v)
    }

    fn lot(total: i64) -> Lot {
        Lot::new("P1", "B1", q(total), None)
    }

    #[test]
    fn test_reserve_then_confirm_partial_usage() {
        let mut l = lot(10);
        l.reserve(q(5)).unwrap();
        assert_eq!(l.available(), q(5));

        let returned = l.confirm_consumption(q(5), q(3)).unwrap();
        assert_eq!(returned, q(2));
        assert_eq!(l.reserved_quantity, q(0));
        assert_eq!(l.consumed_quantity, q(3));
        assert_eq!(l.partial_quantity, q(2));
        assert_eq!(l.available(), q(7));
        assert_eq!(l.standard_available(), q(5));
        assert_eq!(l.revision, 2);
    }

    #[test]
    fn test_reserve_rejects_over_available() {
        let mut l = lot(10);
        l.reserve(q(7)).unwrap();
        let err = l.reserve(q(7)).unwrap_err();
        assert_eq!(
            err,
            LotError::InsufficientStock {
                requested: q(7),
                available: q(3)
            }
        );
        // 失败不改变批次
        assert_eq!(l.reserved_quantity, q(7));
        assert_eq!(l.revision, 1);
    }

    #[test]
    fn test_standard_reserve_spills_into_surplus_tag() {
        let mut l = lot(10);
        l.reserve(q(4)).unwrap();
        l.confirm_consumption(q(4), q(0)).unwrap();
        assert_eq!(l.partial_quantity, q(4));
        assert_eq!(l.standard_available(), q(6));

        let drawn = l.reserve(q(8)).unwrap();
        assert_eq!(drawn, q(2));
        assert_eq!(l.partial_quantity, q(2));
        assert_eq!(l.available(), q(2));
        l.check_invariants().unwrap();
    }

    #[test]
    fn test_reserve_from_partial() {
        let mut l = lot(10);
        l.reserve(q(3)).unwrap();
        l.confirm_consumption(q(3), q(1)).unwrap();

        let err = l.reserve_from_partial(q(3)).unwrap_err();
        assert_eq!(
            err,
            LotError::InsufficientPartialStock {
                requested: q(3),
                available: q(2)
            }
        );

        l.reserve_from_partial(q(2)).unwrap();
        assert_eq!(l.partial_quantity, q(0));
        assert_eq!(l.reserved_quantity, q(2));
    }

    #[test]
    fn test_release_guards_against_double_release() {
        let mut l = lot(10);
        l.reserve(q(4)).unwrap();
        l.release(q(4), q(0)).unwrap();
        let err = l.release(q(4), q(0)).unwrap_err();
        assert!(matches!(err, LotError::ReleaseExceedsReserved { .. }));
        assert_eq!(l.available(), q(10));
    }

    #[test]
    fn test_release_restores_surplus_tag() {
        let mut l = lot(10);
        l.reserve(q(5)).unwrap();
        l.confirm_consumption(q(5), q(2)).unwrap();
        l.reserve_from_partial(q(3)).unwrap();
        l.release(q(3), q(3)).unwrap();
        assert_eq!(l.partial_quantity, q(3));
        assert_eq!(l.reserved_quantity, q(0));
    }

    #[test]
    fn test_confirm_rejects_usage_above_reserved() {
        let mut l = lot(10);
        l.reserve(q(5)).unwrap();
        let err = l.confirm_consumption(q(5), q(6)).unwrap_err();
        assert!(matches!(err, LotError::UsageOutOfRange { .. }));
    }

    #[test]
    fn test_inconsistent_row_is_detected() {
        let mut l = lot(10);
        l.consumed_quantity = q(8);
        l.reserved_quantity = q(5);
        assert!(matches!(l.check_invariants(), Err(LotError::Inconsistent(_))));
        assert!(matches!(l.reserve(q(1)), Err(LotError::Inconsistent(_))));
    }

    #[test]
    fn test_non_positive_quantities_rejected() {
        let mut l = lot(10);
        assert_eq!(l.reserve(q(0)), Err(LotError::NonPositiveQuantity(q(0))));
        assert!(l.receive(q(-1)).is_err());
        l.receive(q(5)).unwrap();
        assert_eq!(l.total_quantity, q(15));
    }

    #[test]
    fn test_standard_cancel_restores_drawn_surplus() {
        let mut l = lot(10);
        l.reserve(q(4)).unwrap();
        l.confirm_consumption(q(4), q(0)).unwrap();
        let before = (l.reserved_quantity, l.partial_quantity, l.consumed_quantity);

        let drawn = l.reserve(q(8)).unwrap();
        l.release(q(8), drawn).unwrap();
        assert_eq!((l.reserved_quantity, l.partial_quantity, l.consumed_quantity), before);

        assert!(matches!(l.release(q(1), q(2)), Err(LotError::Inconsistent(_))));
    }

    #[test]
    fn test_receive_overflow_is_rejected() {
        let mut l = lot(0);
        l.total_quantity = Decimal::MAX;
        let err = l.receive(q(1)).unwrap_err();
        assert!(matches!(err, LotError::Overflow(_)));
        assert_eq!(l.total_quantity, Decimal::MAX);
        assert_eq!(l.revision, 0);
    }

    #[test]
    fn test_expiry() {
        let mut l = lot(1);
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert!(!l.is_expired(today));
        l.expires_at = Some(today);
        assert!(!l.is_expired(today));
        l.expires_at = NaiveDate::from_ymd_opt(2026, 3, 9);
        assert!(l.is_expired(today));
    }
}
