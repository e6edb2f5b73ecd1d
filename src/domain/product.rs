// ==========================================
// 农业作业管理系统 - 产品（目录）领域模型
// ==========================================
// 产品目录由外部目录服务维护，本模块只读使用
// ==========================================

use crate::domain::types::Quantity;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 计量单位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOfMeasure {
    pub name: String,         // 名称，如 "Kilogramo"
    pub abbreviation: String, // 缩写，如 "kg"
}

/// 产品
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: String,
    pub name: String,
    pub sku: Option<String>,
    pub unit: UnitOfMeasure,
    pub divisible: bool, // false: 只允许整数数量（如工具、袋装）
    pub created_at: NaiveDateTime,
}

impl Product {
    pub fn new(name: &str, sku: Option<String>, unit: UnitOfMeasure, divisible: bool) -> Self {
        Self {
            product_id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            sku,
            unit,
            divisible,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    /// 数量是否满足该产品的可分割性
    pub fn accepts_quantity(&self, quantity: Quantity) -> bool {
        self.divisible || quantity.fract().is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn unit() -> UnitOfMeasure {
        UnitOfMeasure {
            name: "Unidad".to_string(),
            abbreviation: "und".to_string(),
        }
    }

    #[test]
    fn test_indivisible_product_rejects_fractions() {
        let tool = Product::new("Pala", None, unit(), false);
        assert!(tool.accepts_quantity(Decimal::from(3)));
        assert!(!tool.accepts_quantity(Decimal::new(25, 1)));

        let fertilizer = Product::new("Urea", Some("URE-50".into()), unit(), true);
        assert!(fertilizer.accepts_quantity(Decimal::new(25, 1)));
    }
}
