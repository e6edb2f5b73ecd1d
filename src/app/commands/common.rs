use crate::api::error::ApiError;
use serde::de::DeserializeOwned;
use serde::Serialize;

// ==========================================
// 公共工具：错误映射、参数解析、结果序列化
// ==========================================

/// 将ApiError转换为JSON字符串（ErrorResponse）
pub(crate) fn map_api_error(err: ApiError) -> String {
    let response = err.to_response();
    serde_json::to_string(&response).unwrap_or_else(|_| err.to_string())
}

/// 解析命令参数
pub(crate) fn parse_args<T: DeserializeOwned>(args: serde_json::Value) -> Result<T, String> {
    let args = if args.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args)
        .map_err(|e| map_api_error(ApiError::InvalidInput(format!("参数解析失败: {}", e))))
}

/// 序列化命令结果
pub(super) fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| {
        map_api_error(ApiError::InternalError(format!("序列化失败: {}", e)))
    })
}

/// spawn_blocking 失败（panic / 取消）
pub(super) fn join_error(e: tokio::task::JoinError) -> String {
    map_api_error(ApiError::InternalError(format!("任务执行失败: {}", e)))
}
