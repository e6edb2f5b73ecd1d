// ==========================================
// 可用量投影测试
// ==========================================
// 职责: 产品搜索 + 单产品可用量（常规/剩余拆分、过期批次口径）
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod availability_projector_test {
    use agrotic_ledger::config::{config_keys, ConfigManager};
    use agrotic_ledger::domain::types::ReservationSource;
    use agrotic_ledger::engine::{AvailabilityProjector, LedgerError};
    use std::sync::Arc;

    use crate::test_helpers::*;

    #[test]
    fn test_product_availability_splits_standard_and_partial() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let conn = open_shared(&db_path);
        let product = seed_product(&conn, "Mancozeb", true);
        let lot_a = seed_lot(&conn, &product.product_id, q(100), None);
        let lot_b = seed_lot(&conn, &product.product_id, q(40), Some(date(2000, 1, 1)));
        let activity = seed_activity(&conn);
        let manager = reservations(&conn);

        // lot_a: 预留 30 → 确认 20 → 剩余 10，可用 80（常规 70 + 剩余 10）
        let r = manager
            .create_reservation(&activity.activity_id, &lot_a.lot_id, &product.product_id, q(30), ReservationSource::Standard, "u-1")
            .unwrap();
        manager.confirm_usage(&r.reservation_id, q(20), "u-1").unwrap();
        // 再预留 5 → 可用 75
        manager
            .create_reservation(&activity.activity_id, &lot_a.lot_id, &product.product_id, q(5), ReservationSource::Standard, "u-1")
            .unwrap();

        let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());
        let projector = AvailabilityProjector::new(conn.clone(), config.clone());

        let availability = projector.available_for_selection(&product.product_id).unwrap();
        assert_eq!(availability.lots.len(), 2);
        assert_eq!(availability.total_available, q(75));
        assert_eq!(availability.available_standard, q(65));
        assert_eq!(availability.available_partial, q(10));

        let a = availability.lots.iter().find(|l| l.lot_id == lot_a.lot_id).unwrap();
        assert!(a.counted);
        assert!(!a.expired);
        let b = availability.lots.iter().find(|l| l.lot_id == lot_b.lot_id).unwrap();
        assert!(b.expired);
        assert!(!b.counted);
        assert_eq!(b.available, q(40));

        // 允许过期批次后计入合计
        config
            .set_global_config_value(config_keys::ALLOW_EXPIRED_LOTS, "true")
            .unwrap();
        let availability = projector.available_for_selection(&product.product_id).unwrap();
        assert_eq!(availability.total_available, q(115));
        assert_eq!(availability.available_standard, q(105));
    }

    #[test]
    fn test_search_products_with_availability() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let conn = open_shared(&db_path);
        let urea = seed_product(&conn, "Urea granulada", true);
        let urea_liquida = seed_product(&conn, "Urea liquida", true);
        let _cal = seed_product(&conn, "Cal agricola", true);
        seed_lot(&conn, &urea.product_id, q(12), None);
        seed_lot(&conn, &urea.product_id, q(8), None);

        let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());
        let projector = AvailabilityProjector::new(conn.clone(), config);

        let rows = projector.search_products_with_availability("urea", 20).unwrap();
        assert_eq!(rows.len(), 2);
        // 按名称排序
        assert_eq!(rows[0].product.product_id, urea.product_id);
        assert_eq!(rows[0].available_standard, q(20));
        assert_eq!(rows[0].available_partial, q(0));
        // 无批次的产品可用量为 0
        assert_eq!(rows[1].product.product_id, urea_liquida.product_id);
        assert_eq!(rows[1].available_standard, q(0));

        // SKU 也可命中；limit 生效
        let rows = projector.search_products_with_availability("SKU-CAL", 20).unwrap();
        assert_eq!(rows.len(), 1);
        let rows = projector.search_products_with_availability("", 2).unwrap();
        assert_eq!(rows.len(), 2);

        // LIKE 通配符按字面处理
        let rows = projector.search_products_with_availability("%", 20).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_unknown_product_is_not_found() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let conn = open_shared(&db_path);
        let config = Arc::new(ConfigManager::from_connection(conn.clone()).unwrap());
        let projector = AvailabilityProjector::new(conn.clone(), config);

        let err = projector.available_for_selection("missing").unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }
}
