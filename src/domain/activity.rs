// ==========================================
// 农业作业管理系统 - 作业（工单）领域模型
// ==========================================
// 生命周期: OPEN →（预留 0..N）→ FINALIZED（终态，只读）
//           OPEN → 删除（需先释放全部有效预留）
// ==========================================

use crate::domain::types::{ActivityStatus, Quantity};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// 作业结算记录（仅在结算时写入）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizationRecord {
    pub hours_worked: Quantity,
    pub hourly_rate: Quantity,
    pub labor_cost: Quantity, // hours_worked × hourly_rate
    pub observation: Option<String>,
    pub evidence_ref: Option<String>, // 证据文件引用（上传由外部服务处理）
    pub finalized_at: NaiveDateTime,
}

/// 作业
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub activity_id: String,
    pub description: String,
    pub category_id: Option<String>,
    pub crop_zone_ref: Option<String>, // 作物-品种-区域引用（外部目录）
    pub assigned_date: NaiveDate,
    pub assigned_users: Vec<String>,
    pub status: ActivityStatus,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub finalization: Option<FinalizationRecord>,
}

/// 新建作业入参
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewActivity {
    pub description: String,
    pub category_id: Option<String>,
    pub crop_zone_ref: Option<String>,
    pub assigned_date: Option<NaiveDate>,
    #[serde(default)]
    pub assigned_users: Vec<String>,
    pub created_by: String,
}

/// 结算入参
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizationInput {
    pub hours_worked: Quantity,
    pub hourly_rate: Quantity,
    pub observation: Option<String>,
    pub evidence_ref: Option<String>,
}

impl Activity {
    /// 由入参创建 OPEN 状态作业（指派人员去重、保持顺序）
    pub fn from_new(input: NewActivity) -> Self {
        let now = chrono::Utc::now().naive_utc();
        let mut users: Vec<String> = Vec::new();
        for u in input.assigned_users {
            let u = u.trim().to_string();
            if !u.is_empty() && !users.contains(&u) {
                users.push(u);
            }
        }

        Self {
            activity_id: uuid::Uuid::new_v4().to_string(),
            description: input.description.trim().to_string(),
            category_id: input.category_id,
            crop_zone_ref: input.crop_zone_ref,
            assigned_date: input.assigned_date.unwrap_or_else(|| now.date()),
            assigned_users: users,
            status: ActivityStatus::Open,
            created_by: input.created_by,
            created_at: now,
            finalization: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ActivityStatus::Open
    }
}

impl FinalizationRecord {
    /// 由结算入参生成记录；工时费溢出时返回 None
    pub fn from_input(input: &FinalizationInput) -> Option<Self> {
        let labor_cost = input.hours_worked.checked_mul(input.hourly_rate)?;
        Some(Self {
            hours_worked: input.hours_worked,
            hourly_rate: input.hourly_rate,
            labor_cost,
            observation: input.observation.clone(),
            evidence_ref: input.evidence_ref.clone(),
            finalized_at: chrono::Utc::now().naive_utc(),
        })
    }
}
