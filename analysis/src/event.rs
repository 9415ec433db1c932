//! Bedrock エージェントのアクショングループから Lambda に渡されるイベント
//!
//! 関数定義（function schema）型と OpenAPI 型の両方、およびエージェントを
//! 介さない直接呼び出し（`{"query": "..."}`）を同じ構造体で受け付ける。
//! `parameters` は `{name, type, value}` の配列と名前→値のマップ、
//! `requestBody` は `content` 形式・フラットなオブジェクト・JSON 文字列のいずれも読める。
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// クエリが見つからなかった場合の既定値
pub const DEFAULT_QUERY: &str = "product";

/// イベント内のパラメータ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: Option<String>,
    #[serde(default)]
    pub value: Value,
}

/// イベント内のパラメータ一覧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parameters {
    /// Bedrock の `[{name, type, value}]` 形式
    List(Vec<Parameter>),
    /// `{"query": "...", "category": "..."}` 形式
    Map(Map<String, Value>),
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters::List(Vec::new())
    }
}

impl Parameters {
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Parameters::List(items) => items.iter().find(|p| p.name == name).map(|p| &p.value),
            Parameters::Map(fields) => fields.get(name),
        }
    }
}

/// 呼び出し元エージェントの情報
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// リクエストボディ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestBody {
    /// OpenAPI 型アクショングループの `content[media].properties`
    Content {
        content: HashMap<String, MediaContent>,
    },
    /// `{"query": "..."}` のようなフラットなオブジェクト
    Fields(Map<String, Value>),
    /// オブジェクトとして読めなかった文字列
    Text(String),
}

impl RequestBody {
    /// JSON 文字列で渡されたボディを中身の形に展開する
    fn expand(self) -> Self {
        match self {
            RequestBody::Text(raw) => match serde_json::from_str::<RequestBody>(&raw) {
                Ok(RequestBody::Text(_)) | Err(_) => RequestBody::Text(raw),
                Ok(body) => body,
            },
            other => other,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            RequestBody::Content { content } => content
                .values()
                .flat_map(|media| media.properties.iter())
                .find(|p| p.name == name)
                .map(|p| &p.value),
            RequestBody::Fields(fields) => fields.get(name),
            RequestBody::Text(_) => None,
        }
    }
}

fn deserialize_request_body<'de, D>(deserializer: D) -> Result<Option<RequestBody>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RequestBody>::deserialize(deserializer)?.map(RequestBody::expand))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaContent {
    #[serde(default)]
    pub properties: Vec<Parameter>,
}

/// アクショングループ Lambda の入力イベント
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionGroupEvent {
    #[serde(default)]
    pub message_version: Option<String>,
    #[serde(default)]
    pub agent: Option<AgentInfo>,
    #[serde(default)]
    pub input_text: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub action_group: Option<String>,
    /// 関数定義型のときに呼ばれた関数名
    #[serde(default)]
    pub function: Option<String>,
    /// OpenAPI 型のときのパス
    #[serde(default)]
    pub api_path: Option<String>,
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default, deserialize_with = "deserialize_request_body")]
    pub request_body: Option<RequestBody>,
    #[serde(default)]
    pub session_attributes: HashMap<String, String>,
    #[serde(default)]
    pub prompt_session_attributes: HashMap<String, String>,
    /// 直接呼び出し時のトップレベルフィールド
    #[serde(flatten)]
    pub direct: Map<String, Value>,
}

impl ActionGroupEvent {
    /// 名前でパラメータ値を探す
    ///
    /// `parameters` → `requestBody` → トップレベルのフィールドの順に探索し、
    /// 最初に見つかった値を返す。
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters
            .get(name)
            .or_else(|| self.request_body.as_ref().and_then(|body| body.get(name)))
            .or_else(|| self.direct.get(name))
    }

    /// パラメータを文字列として取得する（空文字列は `None`）
    pub fn string_parameter(&self, name: &str) -> Option<String> {
        let value = match self.parameter(name)? {
            Value::String(s) => s.trim().to_string(),
            Value::Null => return None,
            other => other.to_string(),
        };
        (!value.is_empty()).then_some(value)
    }

    /// パラメータを文字列リストとして取得する
    ///
    /// Bedrock は配列パラメータも文字列で渡すため、JSON 配列表記
    /// (`["a","b"]`) とカンマ区切り (`a, b`) の両方を受け付ける。
    pub fn list_parameter(&self, name: &str) -> Vec<String> {
        match self.parameter(name) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str())
                .map(str::to_string)
                .collect(),
            Some(Value::String(raw)) => parse_list(raw),
            _ => Vec::new(),
        }
    }

    /// 分析対象のクエリ
    ///
    /// `query` パラメータ、`inputText`、既定値 `product` の順に決める。
    pub fn query(&self) -> String {
        self.string_parameter("query")
            .or_else(|| {
                self.input_text
                    .as_deref()
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_QUERY.to_string())
    }

    /// エージェント経由の呼び出しかどうか
    pub fn is_agent_invocation(&self) -> bool {
        self.function.is_some() || self.api_path.is_some() || self.http_method.is_some()
    }

    /// レスポンスの形を決めるフィールドだけを生の JSON から拾う
    ///
    /// イベント全体が読めなかった場合でも、呼び出し元が期待する形で
    /// 失敗を返すために使う。
    pub fn routing_only(raw: &Value) -> Self {
        let field = |key: &str| raw.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            message_version: field("messageVersion"),
            session_id: field("sessionId"),
            action_group: field("actionGroup"),
            function: field("function"),
            api_path: field("apiPath"),
            http_method: field("httpMethod"),
            ..Self::default()
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Ok(items) = serde_json::from_str::<Vec<String>>(trimmed) {
            return items;
        }
    }
    trimmed
        .trim_matches(|c| c == '[' || c == ']')
        .split(',')
        .map(|item| item.trim().trim_matches('"').trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_function_event_parameters() {
        let event: ActionGroupEvent = serde_json::from_value(json!({
            "messageVersion": "1.0",
            "agent": {"name": "analyzer", "id": "AGENT1", "alias": "TSTALIASID", "version": "DRAFT"},
            "inputText": "Analyze smart fitness tracker opportunity",
            "sessionId": "s-1",
            "actionGroup": "product-analysis",
            "function": "analyze_market_demand",
            "parameters": [
                {"name": "query", "type": "string", "value": "smart fitness tracker"},
                {"name": "region", "type": "string", "value": "EU"}
            ]
        }))
        .unwrap();

        assert!(event.is_agent_invocation());
        assert_eq!(event.query(), "smart fitness tracker");
        assert_eq!(event.string_parameter("region").as_deref(), Some("EU"));
        assert!(event.direct.is_empty());
    }

    #[test]
    fn test_openapi_request_body() {
        let event: ActionGroupEvent = serde_json::from_value(json!({
            "actionGroup": "market-demand",
            "apiPath": "/analyze-demand",
            "httpMethod": "POST",
            "requestBody": {
                "content": {
                    "application/json": {
                        "properties": [{"name": "query", "type": "string", "value": "yoga mat"}]
                    }
                }
            }
        }))
        .unwrap();

        assert_eq!(event.query(), "yoga mat");
        assert_eq!(event.api_path.as_deref(), Some("/analyze-demand"));
    }

    #[test]
    fn test_direct_invocation_and_fallbacks() {
        let event: ActionGroupEvent =
            serde_json::from_value(json!({"query": "desk lamp", "category": "home"})).unwrap();
        assert!(!event.is_agent_invocation());
        assert_eq!(event.query(), "desk lamp");
        assert_eq!(event.string_parameter("category").as_deref(), Some("home"));

        let event: ActionGroupEvent =
            serde_json::from_value(json!({"inputText": "  eco bottle "})).unwrap();
        assert_eq!(event.query(), "eco bottle");

        let event: ActionGroupEvent = serde_json::from_value(json!({})).unwrap();
        assert_eq!(event.query(), DEFAULT_QUERY);
    }

    #[test]
    fn test_parameters_as_map() {
        let event: ActionGroupEvent = serde_json::from_value(json!({
            "parameters": {"query": "smart ring", "category": "wearables"}
        }))
        .unwrap();

        assert_eq!(event.query(), "smart ring");
        assert_eq!(event.string_parameter("category").as_deref(), Some("wearables"));
    }

    #[test]
    fn test_flat_request_body() {
        let event: ActionGroupEvent =
            serde_json::from_value(json!({"requestBody": {"query": "yoga mat"}})).unwrap();
        assert_eq!(event.query(), "yoga mat");
        assert!(matches!(event.request_body, Some(RequestBody::Fields(_))));
    }

    #[test]
    fn test_request_body_as_json_string() {
        let event: ActionGroupEvent = serde_json::from_value(json!({
            "requestBody": "{\"query\": \"standing desk\", \"region\": \"JP\"}"
        }))
        .unwrap();
        assert_eq!(event.query(), "standing desk");
        assert_eq!(event.string_parameter("region").as_deref(), Some("JP"));

        // JSON でない文字列はクエリとして扱わない
        let event: ActionGroupEvent =
            serde_json::from_value(json!({"requestBody": "not json"})).unwrap();
        assert_eq!(event.request_body, Some(RequestBody::Text("not json".to_string())));
        assert_eq!(event.query(), DEFAULT_QUERY);
    }

    #[test]
    fn test_routing_only_keeps_response_fields() {
        let raw = json!({
            "actionGroup": "product-analysis",
            "function": "analyze_competition",
            "sessionAttributes": {"turn": 1}
        });
        assert!(serde_json::from_value::<ActionGroupEvent>(raw.clone()).is_err());

        let event = ActionGroupEvent::routing_only(&raw);
        assert_eq!(event.function.as_deref(), Some("analyze_competition"));
        assert_eq!(event.action_group.as_deref(), Some("product-analysis"));
        assert!(event.is_agent_invocation());
        assert!(event.session_attributes.is_empty());
    }

    #[test]
    fn test_list_parameter_formats() {
        let event: ActionGroupEvent = serde_json::from_value(json!({
            "parameters": [
                {"name": "required_skills", "type": "array", "value": "[\"ai_ml\", \"marketing\"]"},
                {"name": "other", "type": "string", "value": "a, b ,c"}
            ],
            "direct_list": ["x", "y"]
        }))
        .unwrap();

        assert_eq!(event.list_parameter("required_skills"), vec!["ai_ml", "marketing"]);
        assert_eq!(event.list_parameter("other"), vec!["a", "b", "c"]);
        assert_eq!(event.list_parameter("direct_list"), vec!["x", "y"]);
        assert!(event.list_parameter("missing").is_empty());
    }
}
