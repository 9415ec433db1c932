//! アクショングループ Lambda の共通ハンドラー
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::capability::analyze_capability;
use crate::competition::analyze_competition;
use crate::demand::analyze_demand;
use crate::event::ActionGroupEvent;
use crate::response::{HandlerOutput, RouteDefaults};

/// 分析ハンドラーのエラー型
#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error("Invalid action group event: {0}")]
    InvalidEvent(#[from] serde_json::Error),

    #[error("Failed to serialize report: {0}")]
    SerializationError(String),
}

/// 3種類の分析
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    Demand,
    Competition,
    Capability,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 3] = [
        AnalysisKind::Demand,
        AnalysisKind::Competition,
        AnalysisKind::Capability,
    ];

    /// 関数定義スキーマ上の関数名
    pub fn function_name(&self) -> &'static str {
        match self {
            AnalysisKind::Demand => "analyze_market_demand",
            AnalysisKind::Competition => "analyze_competition",
            AnalysisKind::Capability => "analyze_capability",
        }
    }

    /// 関数の説明（スキーマに載る）
    pub fn description(&self) -> &'static str {
        match self {
            AnalysisKind::Demand => "Analyze market demand for a product",
            AnalysisKind::Competition => "Analyze competition for a product",
            AnalysisKind::Capability => "Analyze capability to build a product",
        }
    }

    /// 任意パラメータ（名前, 説明）
    pub fn optional_parameters(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            AnalysisKind::Demand => &[("region", "Geographic region")],
            AnalysisKind::Competition => &[("category", "Product category")],
            AnalysisKind::Capability => &[(
                "required_skills",
                "Comma separated list of skills the product requires",
            )],
        }
    }

    pub fn route_defaults(&self) -> RouteDefaults {
        match self {
            AnalysisKind::Demand => RouteDefaults {
                action_group: "market-demand",
                api_path: "/analyze-demand",
            },
            AnalysisKind::Competition => RouteDefaults {
                action_group: "competition-scan",
                api_path: "/analyze-competition",
            },
            AnalysisKind::Capability => RouteDefaults {
                action_group: "capability-match",
                api_path: "/analyze-capability",
            },
        }
    }

    pub fn from_function_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.function_name() == name)
    }

    pub fn from_api_path(path: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.route_defaults().api_path == path)
    }
}

/// 生のイベントを処理してレスポンスを返す
///
/// イベントの `function` / `apiPath` が別の分析を指していればそちらを実行する。
/// 1つの Lambda に複数の関数を束ねたアクショングループでも正しく振り分けるため。
/// 失敗はエラー本文を持つレスポンスとして返し、`Err` にはしない。
/// イベントが読めない場合も、`function` / `apiPath` などから呼び出し元の形を決めて返す。
///
/// # Arguments
/// * `default_kind` - イベントから種類を決められない場合の分析
/// * `raw` - Lambda が受け取ったイベント JSON
/// * `now` - 現在時刻
pub fn handle_event(default_kind: AnalysisKind, raw: Value, now: DateTime<Utc>) -> HandlerOutput {
    let event = match ActionGroupEvent::deserialize(&raw) {
        Ok(event) => event,
        Err(e) => {
            let error = AnalysisError::InvalidEvent(e);
            let routing = ActionGroupEvent::routing_only(&raw);
            let kind = resolve_kind(&routing).unwrap_or(default_kind);
            warn!(
                error = %error,
                via_agent = routing.is_agent_invocation(),
                "rejecting malformed event"
            );
            return HandlerOutput::failure(&routing, kind.route_defaults(), &error.to_string());
        }
    };

    let kind = resolve_kind(&event).unwrap_or(default_kind);
    let defaults = kind.route_defaults();

    match run_analysis(kind, &event, now) {
        Ok(body) => {
            info!(
                kind = ?kind,
                query = %event.query(),
                via_agent = event.is_agent_invocation(),
                session = event.session_id.as_deref().unwrap_or("-"),
                "analysis completed"
            );
            HandlerOutput::success(&event, defaults, body)
        }
        Err(error) => {
            warn!(kind = ?kind, error = %error, "analysis failed");
            HandlerOutput::failure(&event, defaults, &error.to_string())
        }
    }
}

fn resolve_kind(event: &ActionGroupEvent) -> Option<AnalysisKind> {
    event
        .function
        .as_deref()
        .and_then(AnalysisKind::from_function_name)
        .or_else(|| event.api_path.as_deref().and_then(AnalysisKind::from_api_path))
}

/// イベントから分析を実行し、レポートを JSON 文字列で返す
pub fn run_analysis(
    kind: AnalysisKind,
    event: &ActionGroupEvent,
    now: DateTime<Utc>,
) -> Result<String, AnalysisError> {
    let query = event.query();
    match kind {
        AnalysisKind::Demand => {
            let region = event.string_parameter("region");
            to_body(&analyze_demand(&query, region.as_deref(), now))
        }
        AnalysisKind::Competition => {
            let category = event.string_parameter("category");
            to_body(&analyze_competition(&query, category.as_deref()))
        }
        AnalysisKind::Capability => {
            let required = event.list_parameter("required_skills");
            to_body(&analyze_capability(&query, &required))
        }
    }
}

fn to_body<T: Serialize>(report: &T) -> Result<String, AnalysisError> {
    serde_json::to_string(report).map_err(|e| AnalysisError::SerializationError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_lookup() {
        assert_eq!(
            AnalysisKind::from_function_name("analyze_competition"),
            Some(AnalysisKind::Competition)
        );
        assert_eq!(
            AnalysisKind::from_api_path("/analyze-capability"),
            Some(AnalysisKind::Capability)
        );
        assert_eq!(AnalysisKind::from_function_name("get_weather"), None);
    }
}
