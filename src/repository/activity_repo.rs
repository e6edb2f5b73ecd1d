// ==========================================
// 农业作业管理系统 - 作业数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 表: activity + activity_user（指派人员，级联删除）
// ==========================================

use crate::domain::activity::{Activity, FinalizationRecord};
use crate::domain::types::ActivityStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_types::{
    date_col, enum_col, fmt_date, fmt_ts, opt_decimal_col, ts_col,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const ACTIVITY_COLUMNS: &str = r#"activity_id, description, category_id, crop_zone_ref,
       assigned_date, status, created_by, created_at,
       hours_worked, hourly_rate, labor_cost, observation, evidence_ref, finalized_at"#;

// ==========================================
// ActivityRepository - 作业仓储
// ==========================================
pub struct ActivityRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActivityRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建作业（含指派人员）
    pub fn insert(&self, activity: &Activity) -> RepositoryResult<String> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        Self::insert_tx(&tx, activity)?;
        tx.commit()?;
        Ok(activity.activity_id.clone())
    }

    pub fn find_by_id(&self, activity_id: &str) -> RepositoryResult<Option<Activity>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, activity_id)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    pub(crate) fn insert_tx(conn: &Connection, activity: &Activity) -> RepositoryResult<()> {
        let fin = activity.finalization.as_ref();
        conn.execute(
            r#"INSERT INTO activity (
                activity_id, description, category_id, crop_zone_ref,
                assigned_date, status, created_by, created_at,
                hours_worked, hourly_rate, labor_cost, observation, evidence_ref, finalized_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                activity.activity_id,
                activity.description,
                activity.category_id,
                activity.crop_zone_ref,
                fmt_date(&activity.assigned_date),
                activity.status.to_db_str(),
                activity.created_by,
                fmt_ts(&activity.created_at),
                fin.map(|f| f.hours_worked.to_string()),
                fin.map(|f| f.hourly_rate.to_string()),
                fin.map(|f| f.labor_cost.to_string()),
                fin.and_then(|f| f.observation.clone()),
                fin.and_then(|f| f.evidence_ref.clone()),
                fin.map(|f| fmt_ts(&f.finalized_at)),
            ],
        )?;

        let mut stmt =
            conn.prepare("INSERT INTO activity_user (activity_id, user_id) VALUES (?, ?)")?;
        for user_id in &activity.assigned_users {
            stmt.execute(params![activity.activity_id, user_id])?;
        }
        Ok(())
    }

    pub(crate) fn find_by_id_tx(
        conn: &Connection,
        activity_id: &str,
    ) -> RepositoryResult<Option<Activity>> {
        let sql = format!("SELECT {} FROM activity WHERE activity_id = ?", ACTIVITY_COLUMNS);
        let activity = conn
            .query_row(&sql, params![activity_id], Self::map_row)
            .optional()?;

        let Some(mut activity) = activity else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT user_id FROM activity_user WHERE activity_id = ? ORDER BY rowid",
        )?;
        activity.assigned_users = stmt
            .query_map(params![activity_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(Some(activity))
    }

    /// 写入结算记录并置为 FINALIZED（仅允许从 OPEN 更新）
    ///
    /// # 返回
    /// - Ok(false): 作业已不是 OPEN
    pub(crate) fn mark_finalized_tx(
        conn: &Connection,
        activity_id: &str,
        fin: &FinalizationRecord,
    ) -> RepositoryResult<bool> {
        let rows = conn.execute(
            r#"UPDATE activity
               SET status = ?, hours_worked = ?, hourly_rate = ?, labor_cost = ?,
                   observation = ?, evidence_ref = ?, finalized_at = ?
               WHERE activity_id = ? AND status = ?"#,
            params![
                ActivityStatus::Finalized.to_db_str(),
                fin.hours_worked.to_string(),
                fin.hourly_rate.to_string(),
                fin.labor_cost.to_string(),
                fin.observation,
                fin.evidence_ref,
                fmt_ts(&fin.finalized_at),
                activity_id,
                ActivityStatus::Open.to_db_str(),
            ],
        )?;
        Ok(rows == 1)
    }

    /// 删除作业（预留、指派人员级联删除；仅允许 OPEN）
    pub(crate) fn delete_open_tx(conn: &Connection, activity_id: &str) -> RepositoryResult<bool> {
        let rows = conn.execute(
            "DELETE FROM activity WHERE activity_id = ? AND status = ?",
            params![activity_id, ActivityStatus::Open.to_db_str()],
        )?;
        Ok(rows == 1)
    }

    fn map_row(row: &Row) -> rusqlite::Result<Activity> {
        let status = enum_col(row, 5, ActivityStatus::from_db_str)?;

        let finalization = match (opt_decimal_col(row, 8)?, opt_decimal_col(row, 9)?) {
            (Some(hours_worked), Some(hourly_rate)) => Some(FinalizationRecord {
                hours_worked,
                hourly_rate,
                labor_cost: opt_decimal_col(row, 10)?.unwrap_or(hours_worked * hourly_rate),
                observation: row.get(11)?,
                evidence_ref: row.get(12)?,
                finalized_at: ts_col(row, 13)?,
            }),
            _ => None,
        };

        Ok(Activity {
            activity_id: row.get(0)?,
            description: row.get(1)?,
            category_id: row.get(2)?,
            crop_zone_ref: row.get(3)?,
            assigned_date: date_col(row, 4)?,
            assigned_users: Vec::new(),
            status,
            created_by: row.get(6)?,
            created_at: ts_col(row, 7)?,
            finalization,
        })
    }
}
