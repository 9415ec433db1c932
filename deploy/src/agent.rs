use aws_sdk_bedrockagent::types::AgentStatus;
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::client::{DeployClient, DeployError, aws_error};
use crate::config::{AgentSpec, AliasSpec, PollSettings};

/// エイリアスが取得できない場合に使うテスト用エイリアス
pub const TEST_ALIAS_ID: &str = "TSTALIASID";

/// 作業中のエージェントバージョン
pub const DRAFT_VERSION: &str = "DRAFT";

/// エージェントエイリアスの参照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasRef {
    pub id: String,
    pub name: String,
}

/// 状態遷移の途中かどうか（待てば別の状態になる）
pub fn is_transitional(status: &AgentStatus) -> bool {
    matches!(
        status,
        AgentStatus::Creating
            | AgentStatus::Preparing
            | AgentStatus::Updating
            | AgentStatus::Versioning
    )
}

/// エイリアス一覧から使用するエイリアス ID を選ぶ
///
/// 同名のエイリアス、先頭のエイリアス、テスト用エイリアスの順に採用する。
pub fn choose_alias(aliases: &[AliasRef], preferred_name: &str) -> String {
    aliases
        .iter()
        .find(|alias| alias.name == preferred_name)
        .or_else(|| aliases.first())
        .map(|alias| alias.id.clone())
        .unwrap_or_else(|| TEST_ALIAS_ID.to_string())
}

impl DeployClient {
    /// 名前でエージェントを探す
    pub async fn find_agent_by_name(&self, name: &str) -> Result<Option<String>, DeployError> {
        let mut next_token: Option<String> = None;
        loop {
            let page = self
                .agent
                .list_agents()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(aws_error("Bedrock Agent"))?;

            if let Some(summary) = page
                .agent_summaries()
                .iter()
                .find(|summary| summary.agent_name() == name)
            {
                return Ok(Some(summary.agent_id().to_string()));
            }

            match page.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => return Ok(None),
            }
        }
    }

    /// エージェントを作成する（同名のエージェントがあればそれを使う）
    ///
    /// # Returns
    /// エージェント ID
    pub async fn create_agent(&self, spec: &AgentSpec, role_arn: &str) -> Result<String, DeployError> {
        if let Some(agent_id) = self.find_agent_by_name(&spec.name).await? {
            info!(agent = %spec.name, %agent_id, "using existing agent");
            return Ok(agent_id);
        }

        let output = self
            .agent
            .create_agent()
            .agent_name(&spec.name)
            .description(&spec.description)
            .foundation_model(&spec.foundation_model)
            .instruction(&spec.instruction)
            .agent_resource_role_arn(role_arn)
            .idle_session_ttl_in_seconds(spec.idle_session_ttl_seconds)
            .send()
            .await
            .map_err(aws_error("Bedrock Agent"))?;

        let agent_id = output
            .agent()
            .map(|agent| agent.agent_id().to_string())
            .ok_or_else(|| DeployError::NotFound(format!("agent {}", spec.name)))?;

        info!(agent = %spec.name, %agent_id, "created agent");
        Ok(agent_id)
    }

    /// エージェントの指示・モデル・ロールを設定ファイルの内容で更新する
    pub async fn update_agent_instruction(
        &self,
        agent_id: &str,
        spec: &AgentSpec,
        role_arn: &str,
    ) -> Result<(), DeployError> {
        self.agent
            .update_agent()
            .agent_id(agent_id)
            .agent_name(&spec.name)
            .description(&spec.description)
            .foundation_model(&spec.foundation_model)
            .instruction(&spec.instruction)
            .agent_resource_role_arn(role_arn)
            .idle_session_ttl_in_seconds(spec.idle_session_ttl_seconds)
            .send()
            .await
            .map_err(aws_error("Bedrock Agent"))?;

        info!(%agent_id, "updated agent definition");
        Ok(())
    }

    /// エージェントの現在の状態を取得する
    pub async fn agent_status(&self, agent_id: &str) -> Result<AgentStatus, DeployError> {
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

        if matches!(agent.agent_status(), AgentStatus::Failed) {
            return Err(DeployError::AgentFailed(
                agent_id.to_string(),
                agent.failure_reasons().join("; "),
            ));
        }
        Ok(agent.agent_status().clone())
    }

    /// エージェントが遷移中の状態を抜けるまで待つ
    ///
    /// `settings.interval_secs` 間隔で最大 `settings.max_attempts` 回確認する。
    ///
    /// # Returns
    /// 待機後の状態
    pub async fn wait_for_agent(
        &self,
        agent_id: &str,
        settings: &PollSettings,
    ) -> Result<AgentStatus, DeployError> {
        for attempt in 1..=settings.max_attempts.max(1) {
            let status = self.agent_status(agent_id).await?;
            info!(%agent_id, status = status.as_str(), attempt, "agent status");

            if matches!(status, AgentStatus::Deleting) {
                return Err(DeployError::AgentFailed(
                    agent_id.to_string(),
                    "agent is being deleted".to_string(),
                ));
            }
            if !is_transitional(&status) {
                return Ok(status);
            }
            sleep(Duration::from_secs(settings.interval_secs)).await;
        }

        Err(DeployError::Timeout(format!("agent {agent_id}")))
    }

    /// DRAFT バージョンを準備（ビルド）する
    pub async fn prepare_agent(&self, agent_id: &str) -> Result<(), DeployError> {
        self.agent
            .prepare_agent()
            .agent_id(agent_id)
            .send()
            .await
            .map_err(aws_error("Bedrock Agent"))?;

        info!(%agent_id, "agent preparation started");
        Ok(())
    }

    /// エイリアス一覧を取得する
    pub async fn list_aliases(&self, agent_id: &str) -> Result<Vec<AliasRef>, DeployError> {
        let output = self
            .agent
            .list_agent_aliases()
            .agent_id(agent_id)
            .send()
            .await
            .map_err(aws_error("Bedrock Agent"))?;

        Ok(output
            .agent_alias_summaries()
            .iter()
            .map(|summary| AliasRef {
                id: summary.agent_alias_id().to_string(),
                name: summary.agent_alias_name().to_string(),
            })
            .collect())
    }

    /// エイリアスを用意する
    ///
    /// 同名のエイリアスがあればそれを使う。無ければ作成し、作成に失敗した場合は
    /// `choose_alias` の規則で既存のエイリアスかテスト用エイリアスに切り替える。
    ///
    /// # Returns
    /// エイリアス ID
    pub async fn ensure_alias(&self, agent_id: &str, spec: &AliasSpec) -> Result<String, DeployError> {
        let existing = self.list_aliases(agent_id).await?;
        if let Some(alias) = existing.iter().find(|alias| alias.name == spec.name) {
            info!(%agent_id, alias = %alias.id, "using existing alias");
            return Ok(alias.id.clone());
        }

        let created = self
            .agent
            .create_agent_alias()
            .agent_id(agent_id)
            .agent_alias_name(&spec.name)
            .description(&spec.description)
            .send()
            .await;

        match created {
            Ok(output) => {
                let alias_id = output
                    .agent_alias()
                    .map(|alias| alias.agent_alias_id().to_string())
                    .ok_or_else(|| DeployError::NotFound(format!("alias {}", spec.name)))?;
                info!(%agent_id, alias = %alias_id, "created alias");
                Ok(alias_id)
            }
            Err(e) => {
                let error = aws_error("Bedrock Agent")(e);
                warn!(%agent_id, %error, "alias creation failed, falling back");
                let alias_id = choose_alias(&existing, &spec.name);
                info!(%agent_id, alias = %alias_id, "using fallback alias");
                Ok(alias_id)
            }
        }
    }
}
