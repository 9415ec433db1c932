//! 製品機会分析アクショングループの Lambda ランタイム統合
//!
//! 各バイナリはここで定義した `serve` に既定の分析種類を渡すだけ。
use analysis::handler::{AnalysisKind, handle_event};
use analysis::HandlerOutput;
use chrono::Utc;
use lambda_runtime::{Error, LambdaEvent, service_fn};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Lambda 向けにログ出力を初期化する
///
/// CloudWatch Logs で扱いやすいよう JSON 形式・ANSI なしで出力する。
/// レベルは `RUST_LOG` で指定し、未指定なら `info`。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .with_current_span(false)
        .init();
}

/// 1件のイベントを処理する
pub async fn handle_request(
    kind: AnalysisKind,
    event: LambdaEvent<Value>,
) -> Result<HandlerOutput, Error> {
    tracing::debug!(request_id = %event.context.request_id, "received event");
    Ok(handle_event(kind, event.payload, Utc::now()))
}

/// Lambda ランタイムのイベントループを開始する
pub async fn serve(kind: AnalysisKind) -> Result<(), Error> {
    init_tracing();
    lambda_runtime::run(service_fn(move |event| handle_request(kind, event))).await
}
