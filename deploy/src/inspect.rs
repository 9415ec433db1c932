use aws_sdk_bedrockruntime::types::{ContentBlock, ConversationRole, InferenceConfiguration, Message};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use crate::action_groups::ActionGroupBinding;
use crate::agent::AliasRef;
use crate::client::{DeployClient, DeployError, aws_error};

/// エージェントの構成情報
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDetails {
    pub agent_id: String,
    pub name: String,
    pub status: String,
    pub foundation_model: Option<String>,
    pub instruction: Option<String>,
    pub role_arn: String,
    pub aliases: Vec<AliasRef>,
    pub action_groups: Vec<ActionGroupBinding>,
}

/// Lambda ログの1行
#[derive(Debug, Clone, Serialize)]
pub struct LogLine {
    pub timestamp: Option<DateTime<Utc>>,
    pub message: String,
}

/// モデルアクセスの確認結果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelAccess {
    pub foundation_model_count: usize,
    pub claude_models: Vec<String>,
    pub model_id: String,
    pub invocation_error: Option<String>,
}

impl ModelAccess {
    pub fn can_invoke(&self) -> bool {
        self.invocation_error.is_none()
    }
}

impl DeployClient {
    /// エージェントの構成（状態、モデル、エイリアス、アクショングループ）を取得する
    pub async fn describe_agent(&self, agent_id: &str) -> Result<AgentDetails, DeployError> {
        let output = self
            .agent
            .get_agent()
            .agent_id(agent_id)
            .send()
            .await
            .map_err(aws_error("Bedrock Agent"))?;

        let agent = output
            .agent()
            .ok_or_else(|| DeployError::NotFound(format!("agent {agent_id}")))?;

        Ok(AgentDetails {
            agent_id: agent.agent_id().to_string(),
            name: agent.agent_name().to_string(),
            status: agent.agent_status().as_str().to_string(),
            foundation_model: agent.foundation_model().map(str::to_string),
            instruction: agent.instruction().map(str::to_string),
            role_arn: agent.agent_resource_role_arn().to_string(),
            aliases: self.list_aliases(agent_id).await?,
            action_groups: self.action_group_bindings(agent_id).await?,
        })
    }

    /// 関数の直近のログを取得する
    ///
    /// # Arguments
    /// * `function_name` - Lambda 関数名（ロググループは `/aws/lambda/<name>`）
    /// * `window` - 遡る期間
    /// * `limit` - 返す最大件数（新しいものから）
    pub async fn recent_function_logs(
        &self,
        function_name: &str,
        window: Duration,
        limit: usize,
    ) -> Result<Vec<LogLine>, DeployError> {
        let end = Utc::now();
        let start = end - window;

        // FilterLogEvents は古い順に、空のページを挟みながら返すので最後まで読む
        let mut pages = self
            .logs
            .filter_log_events()
            .log_group_name(format!("/aws/lambda/{function_name}"))
            .start_time(start.timestamp_millis())
            .end_time(end.timestamp_millis())
            .into_paginator()
            .send();

        let mut tail = VecDeque::with_capacity(limit);
        while let Some(page) = pages.next().await {
            let page = page.map_err(aws_error("CloudWatch Logs"))?;
            for event in page.events() {
                push_tail(
                    &mut tail,
                    LogLine {
                        timestamp: event.timestamp().and_then(DateTime::from_timestamp_millis),
                        message: event.message().unwrap_or_default().trim_end().to_string(),
                    },
                    limit,
                );
            }
        }
        Ok(tail.into())
    }

    /// Bedrock のモデル一覧と、指定モデルへの直接呼び出しを確認する
    ///
    /// モデルの呼び出しに失敗してもエラーにはせず、結果に理由を残す。
    pub async fn check_model_access(&self, model_id: &str) -> Result<ModelAccess, DeployError> {
        let models = self
            .bedrock
            .list_foundation_models()
            .send()
            .await
            .map_err(aws_error("Bedrock"))?;

        let summaries = models.model_summaries();
        let claude_models = summaries
            .iter()
            .map(|summary| summary.model_id())
            .filter(|id| id.to_lowercase().contains("claude"))
            .map(str::to_string)
            .collect();

        let message = Message::builder()
            .role(ConversationRole::User)
            .content(ContentBlock::Text("Hello, say hi back".to_string()))
            .build()
            .map_err(|e| DeployError::BuildError(format!("Failed to build message: {}", e)))?;

        let invocation_error = self
            .runtime
            .converse()
            .model_id(model_id)
            .messages(message)
            .inference_config(InferenceConfiguration::builder().max_tokens(100).build())
            .send()
            .await
            .err()
            .map(|e| aws_error("Bedrock Runtime")(e).to_string());

        Ok(ModelAccess {
            foundation_model_count: summaries.len(),
            claude_models,
            model_id: model_id.to_string(),
            invocation_error,
        })
    }
}

/// 最新 `limit` 件だけを残して末尾に追加する
fn push_tail<T>(tail: &mut VecDeque<T>, item: T, limit: usize) {
    if limit == 0 {
        return;
    }
    if tail.len() == limit {
        tail.pop_front();
    }
    tail.push_back(item);
}
