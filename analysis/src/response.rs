//! Lambda からエージェントへ返すレスポンス
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::event::ActionGroupEvent;

/// エージェントが期待するメッセージバージョン
pub const MESSAGE_VERSION: &str = "1.0";
const JSON_MEDIA_TYPE: &str = "application/json";

/// 関数定義型アクショングループでの処理結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseState {
    Failure,
    Reprompt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyText {
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponseBody {
    #[serde(rename = "TEXT")]
    pub text: BodyText,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_state: Option<ResponseState>,
    pub response_body: FunctionResponseBody,
}

/// 関数定義型の `response` 部分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResult {
    pub action_group: String,
    pub function: String,
    pub function_response: FunctionResponse,
}

/// OpenAPI 型の `response` 部分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResult {
    pub action_group: String,
    pub api_path: String,
    pub http_method: String,
    pub http_status_code: u16,
    pub response_body: HashMap<String, BodyText>,
}

/// アクショングループ呼び出しへの応答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse<R> {
    pub message_version: String,
    pub response: R,
    #[serde(default)]
    pub session_attributes: HashMap<String, String>,
    #[serde(default)]
    pub prompt_session_attributes: HashMap<String, String>,
}

/// 直接呼び出しへの応答
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectResponse {
    pub status_code: u16,
    pub body: String,
}

/// ハンドラーの出力
///
/// 呼び出し元イベントの形に合わせて3種類のいずれかを返す。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HandlerOutput {
    Function(AgentResponse<FunctionResult>),
    Api(AgentResponse<ApiResult>),
    Direct(DirectResponse),
}

/// イベント側に値が無い場合に使うルーティング既定値
#[derive(Debug, Clone, Copy)]
pub struct RouteDefaults {
    pub action_group: &'static str,
    pub api_path: &'static str,
}

impl HandlerOutput {
    /// 成功レスポンスを組み立てる
    pub fn success(event: &ActionGroupEvent, defaults: RouteDefaults, body: String) -> Self {
        Self::build(event, defaults, body, true)
    }

    /// 失敗レスポンスを組み立てる
    ///
    /// 本文は `{"error": message}`。
    pub fn failure(event: &ActionGroupEvent, defaults: RouteDefaults, message: &str) -> Self {
        let body = serde_json::json!({ "error": message }).to_string();
        Self::build(event, defaults, body, false)
    }

    fn build(event: &ActionGroupEvent, defaults: RouteDefaults, body: String, ok: bool) -> Self {
        let action_group = event
            .action_group
            .clone()
            .unwrap_or_else(|| defaults.action_group.to_string());

        if let Some(function) = &event.function {
            return HandlerOutput::Function(AgentResponse {
                message_version: MESSAGE_VERSION.to_string(),
                response: FunctionResult {
                    action_group,
                    function: function.clone(),
                    function_response: FunctionResponse {
                        response_state: (!ok).then_some(ResponseState::Failure),
                        response_body: FunctionResponseBody {
                            text: BodyText { body },
                        },
                    },
                },
                session_attributes: event.session_attributes.clone(),
                prompt_session_attributes: event.prompt_session_attributes.clone(),
            });
        }

        let status_code = if ok { 200 } else { 500 };

        if event.api_path.is_some() || event.http_method.is_some() {
            let mut response_body = HashMap::new();
            response_body.insert(JSON_MEDIA_TYPE.to_string(), BodyText { body });
            return HandlerOutput::Api(AgentResponse {
                message_version: MESSAGE_VERSION.to_string(),
                response: ApiResult {
                    action_group,
                    api_path: event
                        .api_path
                        .clone()
                        .unwrap_or_else(|| defaults.api_path.to_string()),
                    http_method: event
                        .http_method
                        .clone()
                        .unwrap_or_else(|| "POST".to_string()),
                    http_status_code: status_code,
                    response_body,
                },
                session_attributes: event.session_attributes.clone(),
                prompt_session_attributes: event.prompt_session_attributes.clone(),
            });
        }

        HandlerOutput::Direct(DirectResponse { status_code, body })
    }

    /// レスポンス本文（JSON 文字列）
    pub fn body(&self) -> &str {
        match self {
            HandlerOutput::Function(r) => &r.response.function_response.response_body.text.body,
            HandlerOutput::Api(r) => r
                .response
                .response_body
                .get(JSON_MEDIA_TYPE)
                .map(|b| b.body.as_str())
                .unwrap_or_default(),
            HandlerOutput::Direct(r) => &r.body,
        }
    }

    /// 失敗レスポンスかどうか
    pub fn is_failure(&self) -> bool {
        match self {
            HandlerOutput::Function(r) => r.response.function_response.response_state.is_some(),
            HandlerOutput::Api(r) => r.response.http_status_code >= 400,
            HandlerOutput::Direct(r) => r.status_code >= 400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DEFAULTS: RouteDefaults = RouteDefaults {
        action_group: "market-demand",
        api_path: "/analyze-demand",
    };

    #[test]
    fn test_function_response_shape() {
        let event: ActionGroupEvent = serde_json::from_value(json!({
            "actionGroup": "product-analysis",
            "function": "analyze_market_demand",
            "sessionAttributes": {"user": "u1"}
        }))
        .unwrap();

        let output = HandlerOutput::success(&event, DEFAULTS, "{\"ok\":true}".to_string());
        let value = serde_json::to_value(&output).unwrap();

        assert_eq!(value["messageVersion"], "1.0");
        assert_eq!(value["response"]["actionGroup"], "product-analysis");
        assert_eq!(value["response"]["function"], "analyze_market_demand");
        assert_eq!(
            value["response"]["functionResponse"]["responseBody"]["TEXT"]["body"],
            "{\"ok\":true}"
        );
        assert!(value["response"]["functionResponse"].get("responseState").is_none());
        assert_eq!(value["sessionAttributes"]["user"], "u1");
    }

    #[test]
    fn test_api_failure_response_shape() {
        let event: ActionGroupEvent =
            serde_json::from_value(json!({"apiPath": "/analyze-demand"})).unwrap();

        let output = HandlerOutput::failure(&event, DEFAULTS, "boom");
        let value = serde_json::to_value(&output).unwrap();

        assert!(output.is_failure());
        assert_eq!(value["response"]["actionGroup"], "market-demand");
        assert_eq!(value["response"]["httpMethod"], "POST");
        assert_eq!(value["response"]["httpStatusCode"], 500);
        assert_eq!(
            value["response"]["responseBody"]["application/json"]["body"],
            "{\"error\":\"boom\"}"
        );
    }

    #[test]
    fn test_direct_response_shape() {
        let event = ActionGroupEvent::default();
        let output = HandlerOutput::success(&event, DEFAULTS, "{}".to_string());
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value, json!({"statusCode": 200, "body": "{}"}));
        assert_eq!(output.body(), "{}");
    }

    #[test]
    fn test_function_failure_sets_state() {
        let event: ActionGroupEvent =
            serde_json::from_value(json!({"function": "analyze_competition"})).unwrap();
        let output = HandlerOutput::failure(&event, DEFAULTS, "bad");
        let value = serde_json::to_value(&output).unwrap();
        assert_eq!(value["response"]["functionResponse"]["responseState"], "FAILURE");
        assert_eq!(value["response"]["actionGroup"], "market-demand");
    }
}
