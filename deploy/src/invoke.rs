use aws_sdk_bedrockagentruntime::operation::invoke_agent::InvokeAgentOutput;
use aws_sdk_bedrockagentruntime::types::ResponseStream;
use chrono::Utc;
use serde::Serialize;

use crate::client::{DeployClient, DeployError, aws_error};

/// エージェントとの会話セッション
#[derive(Debug, Clone)]
pub struct AgentSession {
    pub agent_id: String,
    pub alias_id: String,
    pub session_id: String,
}

impl AgentSession {
    /// 新しいセッション ID でセッションを作る
    pub fn new(agent_id: impl Into<String>, alias_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            alias_id: alias_id.into(),
            session_id: format!("session-{}", Utc::now().timestamp_millis()),
        }
    }
}

/// 応答にどの分析の結果が含まれているか
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisCoverage {
    pub demand: bool,
    pub competition: bool,
    pub capability: bool,
}

impl AnalysisCoverage {
    pub fn is_complete(&self) -> bool {
        self.demand && self.competition && self.capability
    }
}

/// エージェントの応答文から、3種類の分析が言及されているかを判定する
pub fn detect_analyses(response: &str) -> AnalysisCoverage {
    let lower = response.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|word| lower.contains(word));

    AnalysisCoverage {
        demand: mentions(&["demand", "interest", "trends"]),
        competition: mentions(&["competition", "competitors", "market saturation"]),
        capability: mentions(&["capability", "skills", "readiness"]),
    }
}

impl DeployClient {
    /// エージェントにメッセージを送り、応答ストリームを返す
    ///
    /// # Returns
    /// * `Ok(InvokeAgentOutput)` - `completion` からチャンクを受信できる
    /// * `Err(DeployError)` - 呼び出しに失敗した場合
    pub async fn send_to_agent(
        &self,
        session: &AgentSession,
        input_text: &str,
    ) -> Result<InvokeAgentOutput, DeployError> {
        self.agent_runtime
            .invoke_agent()
            .agent_id(&session.agent_id)
            .agent_alias_id(&session.alias_id)
            .session_id(&session.session_id)
            .input_text(input_text)
            .send()
            .await
            .map_err(aws_error("Bedrock Agent Runtime"))
    }

    /// エージェントにメッセージを送り、応答全文を返す
    pub async fn ask_agent(
        &self,
        session: &AgentSession,
        input_text: &str,
    ) -> Result<String, DeployError> {
        let mut output = self.send_to_agent(session, input_text).await?;
        let mut text = String::new();

        while let Some(event) = output
            .completion
            .recv()
            .await
            .map_err(aws_error("Bedrock Agent Runtime"))?
        {
            if let Some(chunk) = chunk_text(&event) {
                text.push_str(&chunk);
            }
        }
        Ok(text)
    }
}

/// ストリームイベントがテキストチャンクならその文字列を返す
pub fn chunk_text(event: &ResponseStream) -> Option<String> {
    if let ResponseStream::Chunk(part) = event
        && let Some(bytes) = part.bytes()
    {
        Some(String::from_utf8_lossy(bytes.as_ref()).into_owned())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_all_analyses() {
        let text = "Demand is strong (score 82). Competition: 45 with medium market saturation. \
                    Capability readiness is Medium.";
        let coverage = detect_analyses(text);
        assert!(coverage.is_complete());
    }

    #[test]
    fn test_detect_partial_analyses() {
        let coverage = detect_analyses("Current interest is high, but I need approval to continue.");
        assert!(coverage.demand);
        assert!(!coverage.competition);
        assert!(!coverage.capability);
        assert!(!coverage.is_complete());
    }

    #[test]
    fn test_session_ids_are_prefixed() {
        let session = AgentSession::new("AGENT", "ALIAS");
        assert!(session.session_id.starts_with("session-"));
        assert_eq!(session.alias_id, "ALIAS");
    }
}
