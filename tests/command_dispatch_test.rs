// ==========================================
// 命令层测试
// ==========================================
// 职责: 经由 JSON 命令入口走通 登记 → 预留 → 结算，并校验错误 JSON 结构
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod command_dispatch_test {
    use agrotic_ledger::app::{dispatch, handle_line, AppState};
    use serde_json::{json, Value};

    use crate::test_helpers::*;

    async fn call(state: &AppState, cmd: &str, args: Value) -> Value {
        let raw = dispatch(state, cmd, args)
            .await
            .unwrap_or_else(|e| panic!("命令 {} 失败: {}", cmd, e));
        serde_json::from_str(&raw).unwrap()
    }

    async fn call_err(state: &AppState, cmd: &str, args: Value) -> Value {
        let raw = dispatch(state, cmd, args).await.unwrap_err();
        serde_json::from_str(&raw).unwrap()
    }

    fn new_state() -> (tempfile::NamedTempFile, AppState) {
        let (tmp, db_path) = create_test_db().unwrap();
        let state = AppState::new(db_path).unwrap();
        (tmp, state)
    }

    #[tokio::test]
    async fn test_full_flow_through_commands() {
        let (_tmp, state) = new_state();

        let product = call(
            &state,
            "register_product",
            json!({"name": "Mancozeb", "sku": "MZ-80", "unit_name": "Kilogramo", "unit_abbreviation": "kg"}),
        )
        .await;
        let product_id = product["product_id"].as_str().unwrap().to_string();

        let lot = call(
            &state,
            "register_lot",
            json!({"product_id": product_id, "warehouse_id": "BODEGA-1", "quantity": "100"}),
        )
        .await;
        let lot_id = lot["lot_id"].as_str().unwrap().to_string();

        let activity = call(
            &state,
            "create_activity",
            json!({"description": "Fumigación", "created_by": "u-admin", "assigned_users": ["u-1"]}),
        )
        .await;
        let activity_id = activity["activity_id"].as_str().unwrap().to_string();

        let reservation = call(
            &state,
            "create_reservation",
            json!({"activity_id": activity_id, "product_id": product_id, "lot_id": lot_id, "quantity": "30"}),
        )
        .await;
        assert_eq!(reservation["status"], "ACTIVE");
        let reservation_id = reservation["reservation_id"].as_str().unwrap().to_string();

        // 库存不足 → 错误 JSON 含 requested / available
        let err = call_err(
            &state,
            "create_reservation",
            json!({"activity_id": activity_id, "product_id": product_id, "lot_id": lot_id, "quantity": "75"}),
        )
        .await;
        assert_eq!(err["code"], "INSUFFICIENT_STOCK");
        assert_eq!(err["details"]["requested"], "75");
        assert_eq!(err["details"]["available"], "70");

        let availability = call(&state, "get_product_availability", json!({"product_id": product_id})).await;
        assert_eq!(availability["total_available"], "70");

        let search = call(&state, "search_products_with_availability", json!({"query": "manco"})).await;
        assert_eq!(search.as_array().unwrap().len(), 1);
        assert_eq!(search[0]["available_standard"], "70");

        let outcome = call(
            &state,
            "finalize_activity",
            json!({
                "activity_id": activity_id,
                "hours_worked": "4",
                "hourly_rate": "12.5",
                "returns": [{"reservation_id": reservation_id, "returned_quantity": "10"}]
            }),
        )
        .await;
        assert_eq!(outcome["activity"]["status"], "FINALIZED");
        assert_eq!(outcome["settled"][0]["returned_quantity"], "10");

        let lot = call(&state, "get_lot", json!({"lot_id": lot_id})).await;
        assert_eq!(lot["consumed_quantity"], "20");
        assert_eq!(lot["partial_quantity"], "10");
        assert_eq!(lot["reserved_quantity"], "0");

        let movements = call(&state, "list_stock_movements", json!({"activity_id": activity_id})).await;
        assert_eq!(movements.as_array().unwrap().len(), 2);

        // 已结算作业拒绝删除
        let err = call_err(&state, "delete_activity", json!({"activity_id": activity_id})).await;
        assert_eq!(err["code"], "INVALID_STATE_TRANSITION");
    }

    #[tokio::test]
    async fn test_batch_reservations_report() {
        let (_tmp, state) = new_state();
        let product = call(
            &state,
            "register_product",
            json!({"name": "Urea", "unit_name": "Kilogramo", "unit_abbreviation": "kg"}),
        )
        .await;
        let product_id = product["product_id"].as_str().unwrap().to_string();
        call(
            &state,
            "register_lot",
            json!({"product_id": product_id, "warehouse_id": "B1", "quantity": "10"}),
        )
        .await;
        let activity = call(
            &state,
            "create_activity",
            json!({"description": "Abonado", "created_by": "u-admin"}),
        )
        .await;
        let activity_id = activity["activity_id"].as_str().unwrap();

        let report = call(
            &state,
            "create_reservations",
            json!({
                "activity_id": activity_id,
                "items": [
                    {"product_id": product_id, "quantity": "6"},
                    {"product_id": product_id, "quantity": "6"},
                    {"product_id": "", "quantity": "1"}
                ]
            }),
        )
        .await;
        assert_eq!(report["succeeded"], 1);
        assert_eq!(report["failed"], 2);
        assert_eq!(report["items"][0]["success"], true);
        assert_eq!(report["items"][1]["error"]["code"], "INSUFFICIENT_STOCK");
        assert_eq!(report["items"][2]["error"]["code"], "INVALID_INPUT");

        let listed = call(&state, "list_reservations_by_activity", json!({"activity_id": activity_id})).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_config_commands() {
        let (_tmp, state) = new_state();

        call(&state, "set_config", json!({"key": "ledger.lot_selection_policy", "value": "FIFO"})).await;
        let err = call_err(&state, "set_config", json!({"key": "ledger.lot_selection_policy", "value": "LIFO"})).await;
        assert_eq!(err["code"], "INVALID_INPUT");
        let err = call_err(&state, "set_config", json!({"key": "other.key", "value": "1"})).await;
        assert_eq!(err["code"], "INVALID_INPUT");

        let snapshot = dispatch(&state, "get_config_snapshot", Value::Null).await.unwrap();
        assert!(snapshot.contains("FIFO"));

        call(&state, "set_config", json!({"key": "ledger.lot_selection_policy", "value": "FEFO"})).await;
        let restored = call(&state, "restore_config_from_snapshot", json!({"snapshot_json": snapshot})).await;
        assert!(restored["restored"].as_u64().unwrap() >= 1);
        assert_eq!(
            state.config_manager.get_global_config_value("ledger.lot_selection_policy").unwrap(),
            Some("FIFO".to_string())
        );
    }

    #[tokio::test]
    async fn test_line_protocol() {
        let (_tmp, state) = new_state();

        let out: Value = serde_json::from_str(
            &handle_line(&state, r#"{"id": 7, "cmd": "search_products_with_availability", "args": {}}"#).await,
        )
        .unwrap();
        assert_eq!(out["id"], 7);
        assert_eq!(out["ok"], true);
        assert!(out["data"].as_array().unwrap().is_empty());

        let out: Value = serde_json::from_str(&handle_line(&state, r#"{"cmd": "no_such_cmd"}"#).await).unwrap();
        assert_eq!(out["ok"], false);
        assert_eq!(out["error"]["code"], "INVALID_INPUT");

        let out: Value = serde_json::from_str(&handle_line(&state, "not json").await).unwrap();
        assert_eq!(out["ok"], false);
        assert_eq!(out["error"]["code"], "INVALID_INPUT");

        let out: Value = serde_json::from_str(
            &handle_line(&state, r#"{"id": "x", "cmd": "cancel_reservation", "args": {"reservation_id": "missing"}}"#).await,
        )
        .unwrap();
        assert_eq!(out["id"], "x");
        assert_eq!(out["error"]["code"], "NOT_FOUND");
    }
}
