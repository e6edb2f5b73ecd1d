// ==========================================
// 农业作业管理系统 - 台账流水领域模型
// ==========================================
// 红线: 每一次批次数量变更都必须写一条流水（与变更同事务）
// 用途: 审计追踪、按作业/批次回溯
// ==========================================

use crate::domain::lot::Lot;
use crate::domain::types::{MovementType, Quantity};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 台账流水
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub movement_id: String,
    pub lot_id: String,
    pub reservation_id: Option<String>,
    pub activity_id: Option<String>,
    pub movement_type: MovementType,
    pub quantity: Quantity,

    // ===== 消耗确认专用 =====
    pub used_quantity: Option<Quantity>,
    pub returned_quantity: Option<Quantity>,

    // ===== 变更后批次快照 =====
    pub reserved_after: Quantity,
    pub partial_after: Quantity,
    pub consumed_after: Quantity,
    pub lot_revision: i64,

    pub actor: String,
    pub created_at: NaiveDateTime,
}

/// 流水关联上下文（哪个作业/预留、谁操作）
#[derive(Debug, Clone, Default)]
pub struct MovementContext {
    pub reservation_id: Option<String>,
    pub activity_id: Option<String>,
    pub actor: String,
}

impl MovementContext {
    pub fn system() -> Self {
        Self {
            actor: "system".to_string(),
            ..Default::default()
        }
    }

    pub fn for_reservation(activity_id: &str, reservation_id: &str, actor: &str) -> Self {
        Self {
            reservation_id: Some(reservation_id.to_string()),
            activity_id: Some(activity_id.to_string()),
            actor: actor.to_string(),
        }
    }
}

impl StockMovement {
    /// 以变更后的批次状态生成流水
    pub fn after(lot: &Lot, movement_type: MovementType, quantity: Quantity, ctx: &MovementContext) -> Self {
        Self {
            movement_id: uuid::Uuid::new_v4().to_string(),
            lot_id: lot.lot_id.clone(),
            reservation_id: ctx.reservation_id.clone(),
            activity_id: ctx.activity_id.clone(),
            movement_type,
            quantity,
            used_quantity: None,
            returned_quantity: None,
            reserved_after: lot.reserved_quantity,
            partial_after: lot.partial_quantity,
            consumed_after: lot.consumed_quantity,
            lot_revision: lot.revision,
            actor: ctx.actor.clone(),
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// 附加消耗明细
    pub fn with_settlement(mut self, used: Quantity, returned: Quantity) -> Self {
        self.used_quantity = Some(used);
        self.returned_quantity = Some(returned);
        self
    }
}
