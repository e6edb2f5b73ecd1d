// ==========================================
// 农业作业管理系统 - 批次选择（LotSelector）
// ==========================================
// 场景: 按产品预留、未指定批次时，挑选一个能整单满足的批次
// 策略:
// - FEFO: 到期日早者优先（无到期日排最后），同到期按入库先后
// - FIFO: 入库早者优先
// 常规预留: 先找常规可用量足够的批次，再退而求其次找总可用量足够的批次
// 结果仅为建议，最终由 StockLedger 在事务内重新校验
// ==========================================

use crate::domain::lot::Lot;
use crate::domain::types::{LotSelectionPolicy, Quantity, ReservationSource};
use crate::engine::error::{LedgerError, LedgerResult};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// 选择参数
#[derive(Debug, Clone, Copy)]
pub struct SelectionCriteria {
    pub policy: LotSelectionPolicy,
    pub allow_expired: bool,
    pub today: NaiveDate,
}

pub struct LotSelector;

impl LotSelector {
    /// 从候选批次中挑选一个
    ///
    /// # 返回
    /// - Ok(&Lot): 选中的批次
    /// - Err(InsufficientStock / InsufficientPartialStock): 无单一批次可满足，
    ///   available 为单批次最大可用量
    pub fn select<'a>(
        lots: &'a [Lot],
        quantity: Quantity,
        source: ReservationSource,
        criteria: &SelectionCriteria,
    ) -> LedgerResult<&'a Lot> {
        for lot in lots {
            lot.check_invariants()
                .map_err(|e| LedgerError::from_lot(&lot.lot_id, e))?;
        }

        let mut candidates: Vec<&Lot> = lots
            .iter()
            .filter(|l| criteria.allow_expired || !l.is_expired(criteria.today))
            .collect();
        candidates.sort_by(|a, b| Self::compare(a, b, criteria.policy));

        let picked = match source {
            ReservationSource::Standard => candidates
                .iter()
                .find(|l| l.standard_available() >= quantity)
                .or_else(|| candidates.iter().find(|l| l.available() >= quantity)),
            ReservationSource::PartialStock => {
                candidates.iter().find(|l| l.partial_quantity >= quantity)
            }
        };

        if let Some(lot) = picked {
            return Ok(*lot);
        }

        let best = candidates
            .iter()
            .map(|l| match source {
                ReservationSource::Standard => (l.available(), &l.lot_id),
                ReservationSource::PartialStock => (l.partial_quantity, &l.lot_id),
            })
            .max_by(|a, b| a.0.cmp(&b.0));
        let (available, lot_id) = match best {
            Some((q, id)) => (q, Some(id.clone())),
            None => (Decimal::ZERO, None),
        };

        Err(match source {
            ReservationSource::Standard => LedgerError::InsufficientStock {
                lot_id,
                requested: quantity,
                available,
            },
            ReservationSource::PartialStock => LedgerError::InsufficientPartialStock {
                lot_id,
                requested: quantity,
                available,
            },
        })
    }

    fn compare(a: &Lot, b: &Lot, policy: LotSelectionPolicy) -> Ordering {
        let fifo = a
            .received_at
            .cmp(&b.received_at)
            .then_with(|| a.lot_id.cmp(&b.lot_id));
        match policy {
            LotSelectionPolicy::Fifo => fifo,
            LotSelectionPolicy::Fefo => match (a.expires_at, b.expires_at) {
                (Some(x), Some(y)) => x.cmp(&y).then(fifo),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => fifo,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn q(v: i64) -> Quantity {
        Decimal::from(v)
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 1).unwrap()
    }

    fn lot(id: &str, total: i64, days_old: i64, expires_in: Option<i64>) -> Lot {
        let mut l = Lot::new("P1", "B1", q(total), expires_in.map(|d| today() + Duration::days(d)));
        l.lot_id = id.to_string();
        l.received_at = today().and_hms_opt(8, 0, 0).unwrap() - Duration::days(days_old);
        l
    }

    fn criteria(policy: LotSelectionPolicy) -> SelectionCriteria {
        SelectionCriteria {
            policy,
            allow_expired: false,
            today: today(),
        }
    }

    #[test]
    fn test_fefo_prefers_earliest_expiry() {
        let lots = vec![
            lot("old-no-expiry", 10, 30, None),
            lot("late", 10, 20, Some(90)),
            lot("soon", 10, 1, Some(10)),
        ];
        let picked = LotSelector::select(&lots, q(5), ReservationSource::Standard, &criteria(LotSelectionPolicy::Fefo)).unwrap();
        assert_eq!(picked.lot_id, "soon");

        let picked = LotSelector::select(&lots, q(5), ReservationSource::Standard, &criteria(LotSelectionPolicy::Fifo)).unwrap();
        assert_eq!(picked.lot_id, "old-no-expiry");
    }

    #[test]
    fn test_expired_lots_skipped_unless_allowed() {
        let lots = vec![lot("expired", 10, 40, Some(-1)), lot("fresh", 3, 1, None)];
        let mut c = criteria(LotSelectionPolicy::Fefo);

        let err = LotSelector::select(&lots, q(5), ReservationSource::Standard, &c).unwrap_err();
        assert_eq!(err.shortfall(), Some((q(5), q(3))));

        c.allow_expired = true;
        let picked = LotSelector::select(&lots, q(5), ReservationSource::Standard, &c).unwrap();
        assert_eq!(picked.lot_id, "expired");
    }

    #[test]
    fn test_standard_prefers_lot_without_touching_surplus() {
        let mut a = lot("a", 10, 5, None);
        a.partial_quantity = q(6); // 常规可用 4
        let b = lot("b", 10, 1, None);
        let lots = vec![a, b];
        let picked = LotSelector::select(&lots, q(5), ReservationSource::Standard, &criteria(LotSelectionPolicy::Fifo)).unwrap();
        assert_eq!(picked.lot_id, "b");
    }

    #[test]
    fn test_partial_pool_and_empty_product() {
        let mut a = lot("a", 10, 5, None);
        a.partial_quantity = q(2);
        let lots = vec![a];
        let err = LotSelector::select(&lots, q(3), ReservationSource::PartialStock, &criteria(LotSelectionPolicy::Fefo)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientPartialStock { .. }));
        assert_eq!(err.shortfall(), Some((q(3), q(2))));

        let err = LotSelector::select(&[], q(1), ReservationSource::Standard, &criteria(LotSelectionPolicy::Fefo)).unwrap_err();
        assert_eq!(err.shortfall(), Some((q(1), Decimal::ZERO)));
    }
}
