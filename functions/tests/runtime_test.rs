/// Lambda ランタイム経由のハンドラー呼び出しテスト
use analysis::HandlerOutput;
use analysis::handler::AnalysisKind;
use lambda_runtime::{Context, LambdaEvent};
use opportunity_functions::handle_request;
use serde_json::json;

#[tokio::test]
async fn test_handle_request_function_event() {
    let payload = json!({
        "messageVersion": "1.0",
        "actionGroup": "product-analysis-functions",
        "function": "analyze_market_demand",
        "parameters": [{"name": "query", "type": "string", "value": "smart fitness tracker"}]
    });

    let output = handle_request(
        AnalysisKind::Demand,
        LambdaEvent::new(payload, Context::default()),
    )
    .await
    .expect("ハンドラーはエラー本文を含むレスポンスを返すべき");

    assert!(matches!(output, HandlerOutput::Function(_)));
    assert!(!output.is_failure());
    assert!(output.body().contains("\"demand_score\""));
}

#[tokio::test]
async fn test_handle_request_never_errors_on_bad_payload() {
    let output = handle_request(
        AnalysisKind::Competition,
        LambdaEvent::new(json!({"parameters": 42}), Context::default()),
    )
    .await
    .expect("不正なイベントでも Err は返さない");

    assert!(output.is_failure());
}
