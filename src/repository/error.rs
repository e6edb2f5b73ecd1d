// ==========================================
// 农业作业管理系统 - 仓储层错误类型
// ==========================================
// 红线: 仓储层只报告数据访问失败，不表达台账规则
// ==========================================

use rusqlite::ffi;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 批次 revision 与读取时不一致（并发写入）
    #[error("版本冲突: {entity} id={id}, 期望 revision={expected}")]
    RevisionConflict {
        entity: String,
        id: String,
        expected: i64,
    },

    #[error("记录不存在: {entity} id={id}")]
    NotFound { entity: String, id: String },

    #[error("连接锁获取失败: {0}")]
    LockError(String),

    /// busy_timeout 内未拿到写锁
    #[error("数据库忙: {0}")]
    DatabaseBusy(String),

    #[error("SQL 执行失败: {0}")]
    DatabaseQueryError(String),

    #[error("唯一约束冲突: {0}")]
    UniqueConstraintViolation(String),

    #[error("外键约束冲突: {0}")]
    ForeignKeyViolation(String),

    /// 存储值无法解析（数量/时间/枚举）
    #[error("字段 {field} 取值非法: {message}")]
    FieldValueError { field: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, msg) => {
                let msg = msg.unwrap_or_else(|| e.to_string());
                match e.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        RepositoryError::UniqueConstraintViolation(msg)
                    }
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => RepositoryError::ForeignKeyViolation(msg),
                    _ if matches!(
                        e.code,
                        rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                    ) =>
                    {
                        RepositoryError::DatabaseBusy(msg)
                    }
                    _ => RepositoryError::DatabaseQueryError(msg),
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "row".to_string(),
                id: "-".to_string(),
            },
            rusqlite::Error::FromSqlConversionFailure(idx, _, e) => RepositoryError::FieldValueError {
                field: format!("column#{}", idx),
                message: e.to_string(),
            },
            other => RepositoryError::DatabaseQueryError(other.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn conn_with_fk() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE parent (id TEXT PRIMARY KEY);
             CREATE TABLE child (id TEXT PRIMARY KEY, parent_id TEXT NOT NULL REFERENCES parent(id));
             INSERT INTO parent VALUES ('p1');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_constraint_errors_are_classified() {
        let conn = conn_with_fk();

        let err: RepositoryError = conn
            .execute("INSERT INTO parent VALUES ('p1')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));

        let err: RepositoryError = conn
            .execute("INSERT INTO child VALUES ('c1', 'missing')", [])
            .unwrap_err()
            .into();
        assert!(matches!(err, RepositoryError::ForeignKeyViolation(_)));
    }

    #[test]
    fn test_no_rows_maps_to_not_found() {
        let err: RepositoryError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
