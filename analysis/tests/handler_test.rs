/// アクショングループハンドラーの結合テスト
///
/// Bedrock エージェントから届く実際の形のイベントを渡し、
/// 振り分けとレスポンス形式を検証します。
use analysis::handler::{AnalysisKind, handle_event};
use analysis::{CapabilityReport, CompetitionReport, DemandReport, HandlerOutput};
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
}

fn function_event(function: &str, query: &str) -> Value {
    json!({
        "messageVersion": "1.0",
        "agent": {"name": "product-opportunity-analyzer", "id": "AGENT", "alias": "TSTALIASID", "version": "DRAFT"},
        "inputText": format!("Analyze {query}"),
        "sessionId": "session-1",
        "actionGroup": "product-analysis-functions",
        "function": function,
        "parameters": [{"name": "query", "type": "string", "value": query}],
        "sessionAttributes": {},
        "promptSessionAttributes": {}
    })
}

#[test]
fn test_single_lambda_routes_by_function_name() {
    // 需要分析 Lambda に競合分析の関数呼び出しが来ても競合分析を返す
    let output = handle_event(
        AnalysisKind::Demand,
        function_event("analyze_competition", "smart ring"),
        now(),
    );

    assert!(matches!(output, HandlerOutput::Function(_)));
    assert!(!output.is_failure());

    let report: CompetitionReport = serde_json::from_str(output.body()).unwrap();
    assert_eq!(report.feature_gaps[0], "Advanced AI features");

    let value = serde_json::to_value(&output).unwrap();
    assert_eq!(value["response"]["actionGroup"], "product-analysis-functions");
    assert_eq!(value["response"]["function"], "analyze_competition");
}

#[test]
fn test_unknown_function_falls_back_to_default_kind() {
    let output = handle_event(
        AnalysisKind::Capability,
        function_event("analyze_everything", "coffee grinder"),
        now(),
    );

    let report: CapabilityReport = serde_json::from_str(output.body()).unwrap();
    assert_eq!(report.capability_score, 68.25);
}

#[test]
fn test_openapi_event_routes_by_path() {
    let event = json!({
        "actionGroup": "market-demand",
        "apiPath": "/analyze-demand",
        "httpMethod": "POST",
        "requestBody": {
            "content": {
                "application/json": {
                    "properties": [
                        {"name": "query", "type": "string", "value": "eco bottle"},
                        {"name": "region", "type": "string", "value": "EU"}
                    ]
                }
            }
        }
    });

    let output = handle_event(AnalysisKind::Competition, event, now());
    let value = serde_json::to_value(&output).unwrap();
    assert_eq!(value["response"]["httpStatusCode"], 200);
    assert_eq!(value["response"]["apiPath"], "/analyze-demand");

    let report: DemandReport = serde_json::from_str(output.body()).unwrap();
    assert_eq!(report.region, "EU");
    assert_eq!(report.trending_topics[0], "sustainable eco bottle");
}

#[test]
fn test_direct_invocation() {
    let output = handle_event(
        AnalysisKind::Capability,
        json!({"query": "smart speaker", "required_skills": ["acoustics"]}),
        now(),
    );

    match &output {
        HandlerOutput::Direct(direct) => assert_eq!(direct.status_code, 200),
        other => panic!("直接呼び出しのレスポンスになるべき: {:?}", other),
    }

    let report: CapabilityReport = serde_json::from_str(output.body()).unwrap();
    assert_eq!(report.skill_gaps[0], "acoustics");
}

#[test]
fn test_malformed_event_returns_error_body() {
    // parameters が配列でない
    let output = handle_event(AnalysisKind::Demand, json!({"parameters": "oops"}), now());

    assert!(output.is_failure());
    let body: Value = serde_json::from_str(output.body()).unwrap();
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("Invalid action group event")
    );
}

#[test]
fn test_malformed_function_event_keeps_function_shape() {
    // sessionAttributes の値が文字列でないためイベント全体は読めない
    let mut event = function_event("analyze_competition", "smart ring");
    event["sessionAttributes"] = json!({"turn": 1});

    let output = handle_event(AnalysisKind::Demand, event, now());

    assert!(matches!(output, HandlerOutput::Function(_)), "関数定義型の形で返すべき");
    assert!(output.is_failure());
    let value = serde_json::to_value(&output).unwrap();
    assert_eq!(value["response"]["function"], "analyze_competition");
    assert_eq!(value["response"]["actionGroup"], "product-analysis-functions");
    assert_eq!(value["response"]["functionResponse"]["responseState"], "FAILURE");
}

#[test]
fn test_malformed_openapi_event_keeps_api_shape() {
    let event = json!({
        "apiPath": "/analyze-capability",
        "httpMethod": "POST",
        "parameters": 42
    });

    let output = handle_event(AnalysisKind::Demand, event, now());

    let value = serde_json::to_value(&output).unwrap();
    assert!(matches!(output, HandlerOutput::Api(_)));
    assert_eq!(value["response"]["httpStatusCode"], 500);
    assert_eq!(value["response"]["actionGroup"], "capability-match");
}

#[test]
fn test_parameters_map_event() {
    let output = handle_event(
        AnalysisKind::Competition,
        json!({"parameters": {"query": "smart ring", "category": "wearables"}}),
        now(),
    );

    assert!(!output.is_failure(), "マップ形式の parameters も受け付けるべき");
    let report: CompetitionReport = serde_json::from_str(output.body()).unwrap();
    assert_eq!(report.category, "wearables");
}

#[test]
fn test_flat_request_body_event() {
    let output = handle_event(
        AnalysisKind::Demand,
        json!({"requestBody": {"query": "yoga mat"}}),
        now(),
    );

    let report: DemandReport = serde_json::from_str(output.body()).unwrap();
    assert!(
        report.trending_topics.iter().any(|topic| topic.contains("yoga mat")),
        "requestBody のクエリが使われるべき: {:?}",
        report.trending_topics
    );
}

#[test]
fn test_same_query_same_report() {
    let first = handle_event(
        AnalysisKind::Competition,
        function_event("analyze_competition", "standing desk"),
        now(),
    );
    let second = handle_event(
        AnalysisKind::Competition,
        function_event("analyze_competition", "standing desk"),
        now(),
    );
    assert_eq!(first.body(), second.body());
}
