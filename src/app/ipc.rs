// ==========================================
// 农业作业管理系统 - 行协议（stdin/stdout JSON Lines）
// ==========================================
// 请求: {"id": 可选, "cmd": "...", "args": {...}}
// 响应: {"id": 原样回传, "ok": true, "data": ...}
//      {"id": 原样回传, "ok": false, "error": {"code", "message", "details"}}
// ==========================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::error::ApiError;
use crate::app::commands::{dispatch, map_api_error};
use crate::app::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IpcRequest {
    #[serde(default)]
    pub id: Option<Value>,
    pub cmd: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Serialize)]
pub struct IpcResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl IpcResponse {
    fn success(id: Option<Value>, data: Value) -> Self {
        Self {
            id,
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    fn failure(id: Option<Value>, error: Value) -> Self {
        Self {
            id,
            ok: false,
            data: None,
            error: Some(error),
        }
    }
}

/// 命令返回的字符串解析回 JSON；非 JSON 文本按字符串原样保留
fn as_json(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

/// 处理一行请求，返回一行响应（不含换行）
pub async fn handle_line(state: &AppState, line: &str) -> String {
    let response = match serde_json::from_str::<IpcRequest>(line) {
        Ok(req) => match dispatch(state, &req.cmd, req.args).await {
            Ok(data) => IpcResponse::success(req.id, as_json(data)),
            Err(err) => IpcResponse::failure(req.id, as_json(err)),
        },
        Err(e) => {
            tracing::warn!("请求行解析失败: {}", e);
            let err = map_api_error(ApiError::InvalidInput(format!("请求格式错误: {}", e)));
            IpcResponse::failure(None, as_json(err))
        }
    };

    serde_json::to_string(&response).unwrap_or_else(|e| {
        format!(
            r#"{{"ok":false,"error":{{"code":"INTERNAL_ERROR","message":"响应序列化失败: {}"}}}}"#,
            e
        )
    })
}
