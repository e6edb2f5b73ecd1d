// ==========================================
// 农业作业管理系统 - 产品目录数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 产品目录对核心只读；insert 仅用于目录同步/初始化
// ==========================================

use crate::domain::product::{Product, UnitOfMeasure};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sql_types::{fmt_ts, ts_col};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const PRODUCT_COLUMNS: &str = r#"product_id, name, sku, unit_name, unit_abbreviation,
       divisible, created_at"#;

// ==========================================
// ProductRepository - 产品仓储
// ==========================================
pub struct ProductRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProductRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入产品
    pub fn insert(&self, product: &Product) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO product (
                product_id, name, sku, unit_name, unit_abbreviation, divisible, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)"#,
            params![
                product.product_id,
                product.name,
                product.sku,
                product.unit.name,
                product.unit.abbreviation,
                product.divisible,
                fmt_ts(&product.created_at),
            ],
        )?;
        Ok(product.product_id.clone())
    }

    /// 按 product_id 查询
    pub fn find_by_id(&self, product_id: &str) -> RepositoryResult<Option<Product>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, product_id)
    }

    /// 事务内按 product_id 查询
    pub(crate) fn find_by_id_tx(
        conn: &Connection,
        product_id: &str,
    ) -> RepositoryResult<Option<Product>> {
        let sql = format!("SELECT {} FROM product WHERE product_id = ?", PRODUCT_COLUMNS);
        let product = conn
            .query_row(&sql, params![product_id], Self::map_row)
            .optional()?;
        Ok(product)
    }

    /// 名称/SKU 子串搜索（不区分大小写），按名称排序
    ///
    /// 空查询返回前 limit 个产品
    pub fn search(&self, query: &str, limit: usize) -> RepositoryResult<Vec<Product>> {
        let conn = self.get_conn()?;
        let pattern = format!("%{}%", escape_like(query.trim()));
        let sql = format!(
            r#"SELECT {} FROM product
               WHERE name LIKE ?1 ESCAPE '\' OR IFNULL(sku, '') LIKE ?1 ESCAPE '\'
               ORDER BY name COLLATE NOCASE, product_id
               LIMIT ?2"#,
            PRODUCT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let products = stmt
            .query_map(params![pattern, limit as i64], Self::map_row)?
            .collect::<Result<Vec<Product>, _>>()?;
        Ok(products)
    }

    fn map_row(row: &Row) -> rusqlite::Result<Product> {
        Ok(Product {
            product_id: row.get(0)?,
            name: row.get(1)?,
            sku: row.get(2)?,
            unit: UnitOfMeasure {
                name: row.get(3)?,
                abbreviation: row.get(4)?,
            },
            divisible: row.get(5)?,
            created_at: ts_col(row, 6)?,
        })
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
