use crate::api::error::ApiError;
use crate::app::state::AppState;
use crate::config::config_keys;
use serde::{Deserialize, Serialize};

use super::common::{join_error, map_api_error, to_json};

// ==========================================
// 配置相关命令
// ==========================================

const KNOWN_KEYS: &[&str] = &[
    config_keys::LOT_SELECTION_POLICY,
    config_keys::ALLOW_EXPIRED_LOTS,
    config_keys::SEARCH_LIMIT,
];

#[derive(Debug, Deserialize)]
pub struct SetConfigArgs {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct RestoreConfigArgs {
    pub snapshot_json: String,
}

#[derive(Debug, Serialize)]
struct RestoreResult {
    restored: usize,
}

/// 配置值预校验（与 ConfigManager 的解析规则保持一致）
fn validate_config_value(key: &str, value: &str) -> Result<(), ApiError> {
    let value = value.trim();
    let ok = match key {
        config_keys::LOT_SELECTION_POLICY => {
            crate::domain::types::LotSelectionPolicy::from_str(value).is_some()
        }
        config_keys::ALLOW_EXPIRED_LOTS => {
            matches!(
                value.to_ascii_lowercase().as_str(),
                "1" | "0" | "true" | "false" | "yes" | "no" | "on" | "off"
            )
        }
        config_keys::SEARCH_LIMIT => value.parse::<usize>().map(|n| n > 0).unwrap_or(false),
        _ => {
            return Err(ApiError::InvalidInput(format!("未知配置项: {}", key)));
        }
    };

    if ok {
        Ok(())
    } else {
        Err(ApiError::InvalidInput(format!("配置值非法: {}={}", key, value)))
    }
}

/// 获取配置快照（JSON）
pub async fn get_config_snapshot(state: &AppState) -> Result<String, String> {
    let config = state.config_manager.clone();
    let snapshot = tokio::task::spawn_blocking(move || {
        config
            .get_config_snapshot()
            .map_err(|e| ApiError::InternalError(format!("配置快照失败: {}", e)))
    })
    .await
    .map_err(join_error)?
    .map_err(map_api_error)?;

    Ok(snapshot)
}

/// 从快照恢复配置
pub async fn restore_config_from_snapshot(
    state: &AppState,
    args: RestoreConfigArgs,
) -> Result<String, String> {
    let config = state.config_manager.clone();
    let restored = tokio::task::spawn_blocking(move || {
        let _perf = crate::perf::PerfGuard::new("ipc.restore_config_from_snapshot");
        config
            .restore_config_from_snapshot(&args.snapshot_json)
            .map_err(|e| ApiError::InvalidInput(format!("配置快照恢复失败: {}", e)))
    })
    .await
    .map_err(join_error)?
    .map_err(map_api_error)?;

    tracing::info!(restored = restored, "配置已从快照恢复");
    to_json(&RestoreResult { restored })
}

/// 设置单个配置项
pub async fn set_config(state: &AppState, args: SetConfigArgs) -> Result<String, String> {
    let key = args.key.trim().to_string();
    if !KNOWN_KEYS.contains(&key.as_str()) {
        return Err(map_api_error(ApiError::InvalidInput(format!("未知配置项: {}", key))));
    }
    validate_config_value(&key, &args.value).map_err(map_api_error)?;

    let config = state.config_manager.clone();
    let value = args.value.trim().to_string();
    let stored_key = key.clone();
    tokio::task::spawn_blocking(move || {
        config
            .set_global_config_value(&stored_key, &value)
            .map_err(|e| ApiError::InternalError(format!("配置写入失败: {}", e)))
    })
    .await
    .map_err(join_error)?
    .map_err(map_api_error)?;

    tracing::info!(key = %key, "配置已更新");
    to_json(&serde_json::json!({ "key": key }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_config_value() {
        assert!(validate_config_value(config_keys::LOT_SELECTION_POLICY, "FIFO").is_ok());
        assert!(validate_config_value(config_keys::LOT_SELECTION_POLICY, "LIFO").is_err());
        assert!(validate_config_value(config_keys::ALLOW_EXPIRED_LOTS, "TRUE").is_ok());
        assert!(validate_config_value(config_keys::ALLOW_EXPIRED_LOTS, "maybe").is_err());
        assert!(validate_config_value(config_keys::SEARCH_LIMIT, "50").is_ok());
        assert!(validate_config_value(config_keys::SEARCH_LIMIT, "0").is_err());
        assert!(validate_config_value("ledger.unknown", "1").is_err());
    }
}
