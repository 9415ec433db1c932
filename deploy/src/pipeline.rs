use chrono::Utc;
use std::collections::BTreeMap;
use tracing::info;

use crate::client::{DeployClient, DeployError};
use crate::config::DeployConfig;
use crate::record::{DeploymentRecord, FunctionRecord};

impl DeployClient {
    /// 製品機会エージェント一式をデプロイする
    ///
    /// ロール → Lambda 関数 → エージェント → アクショングループと呼び出し許可 →
    /// 準備 → エイリアスの順に実行し、結果を `config.output_path` に保存する。
    /// どの段階も既存リソースを再利用するので、途中で失敗しても再実行できる。
    pub async fn deploy_all(&self, config: &DeployConfig) -> Result<DeploymentRecord, DeployError> {
        let problems = config.problems();
        if !problems.is_empty() {
            return Err(DeployError::ConfigError(problems.join("; ")));
        }

        let lambda_role_arn = self.ensure_role(&config.lambda_role).await?;
        let agent_role_arn = self.ensure_role(&config.agent_role).await?;
        self.wait_for_role_propagation(&config.polling).await;

        let mut function_arns = Vec::with_capacity(config.functions.len());
        for function in &config.functions {
            let arn = self.ensure_function(function, &lambda_role_arn).await?;
            function_arns.push(arn);
        }

        let agent_id = self.create_agent(&config.agent, &agent_role_arn).await?;
        self.wait_for_agent(&agent_id, &config.polling).await?;

        let mut functions = BTreeMap::new();
        for (function, arn) in config.functions.iter().zip(function_arns) {
            let action_group_id = self
                .ensure_action_group(
                    &agent_id,
                    &function.action_group,
                    &function.description,
                    &arn,
                    &function.analyses,
                )
                .await?;
            self.grant_bedrock_invoke(&function.name, &agent_id).await?;

            functions.insert(
                function.name.clone(),
                FunctionRecord {
                    arn,
                    action_group_id: Some(action_group_id),
                },
            );
        }

        let alias_id = self.complete_deployment(&agent_id, config).await?;

        let record = DeploymentRecord {
            agent_id,
            alias_id,
            region: self.region().to_string(),
            functions,
            deployed_at: Some(Utc::now().to_rfc3339()),
        };
        record.save(&config.output_path)?;
        info!(path = %config.output_path.display(), "saved deployment record");

        Ok(record)
    }

    /// 既存エージェントの準備とエイリアス作成を行う
    ///
    /// # Returns
    /// エイリアス ID
    pub async fn complete_deployment(
        &self,
        agent_id: &str,
        config: &DeployConfig,
    ) -> Result<String, DeployError> {
        self.wait_for_agent(agent_id, &config.polling).await?;
        self.prepare_agent(agent_id).await?;
        self.wait_for_agent(agent_id, &config.polling).await?;
        self.ensure_alias(agent_id, &config.alias).await
    }
}
