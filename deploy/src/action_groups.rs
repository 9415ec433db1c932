use analysis::AnalysisKind;
use aws_sdk_bedrockagent::types::{
    ActionGroupExecutor, ActionGroupState, Function, FunctionSchema, ParameterDetail,
    RequireConfirmation, Type,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::agent::DRAFT_VERSION;
use crate::client::{DeployClient, DeployError, aws_error};
use crate::policy::function_name_from_arn;

/// アクショングループと、その実体となる Lambda の対応
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionGroupBinding {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub lambda_arn: Option<String>,
}

impl ActionGroupBinding {
    /// 実行先 Lambda の関数名
    pub fn function_name(&self) -> Option<&str> {
        self.lambda_arn.as_deref().map(function_name_from_arn)
    }
}

/// 同じ Lambda 関数を呼ぶ重複アクショングループを探す
///
/// 関数ごとに最初のアクショングループを残し、2つ目以降を返す。
pub fn find_duplicate_bindings(bindings: &[ActionGroupBinding]) -> Vec<&ActionGroupBinding> {
    let mut seen = HashSet::new();
    bindings
        .iter()
        .filter(|binding| match binding.function_name() {
            Some(function) => !seen.insert(function.to_string()),
            None => false,
        })
        .collect()
}

/// 分析関数の関数定義スキーマを作る
///
/// 各関数は必須の `query` と分析ごとの任意パラメータを持つ。
/// 実行前のユーザー確認は無効にする（有効だとエージェントが毎回承認を求める）。
pub fn function_schema(kinds: &[AnalysisKind]) -> Result<FunctionSchema, DeployError> {
    let functions = kinds
        .iter()
        .map(|kind| {
            let mut parameters = HashMap::new();
            parameters.insert("query".to_string(), string_parameter("Product name to analyze", true)?);
            for (name, description) in kind.optional_parameters() {
                parameters.insert(name.to_string(), string_parameter(description, false)?);
            }

            Function::builder()
                .name(kind.function_name())
                .description(kind.description())
                .set_parameters(Some(parameters))
                .require_confirmation(RequireConfirmation::Disabled)
                .build()
                .map_err(|e| DeployError::BuildError(format!("Failed to build function: {}", e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FunctionSchema::Functions(functions))
}

fn string_parameter(description: &str, required: bool) -> Result<ParameterDetail, DeployError> {
    ParameterDetail::builder()
        .description(description)
        .r#type(Type::String)
        .required(required)
        .build()
        .map_err(|e| DeployError::BuildError(format!("Failed to build parameter: {}", e)))
}

impl DeployClient {
    /// DRAFT バージョンのアクショングループと実行先を列挙する
    pub async fn action_group_bindings(
        &self,
        agent_id: &str,
    ) -> Result<Vec<ActionGroupBinding>, DeployError> {
        let mut bindings = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = self
                .agent
                .list_agent_action_groups()
                .agent_id(agent_id)
                .agent_version(DRAFT_VERSION)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(aws_error("Bedrock Agent"))?;

            for summary in page.action_group_summaries() {
                let details = self
                    .agent
                    .get_agent_action_group()
                    .agent_id(agent_id)
                    .agent_version(DRAFT_VERSION)
                    .action_group_id(summary.action_group_id())
                    .send()
                    .await
                    .map_err(aws_error("Bedrock Agent"))?;

                let lambda_arn = details
                    .agent_action_group()
                    .and_then(|group| group.action_group_executor())
                    .and_then(|executor| match executor {
                        ActionGroupExecutor::Lambda(arn) => Some(arn.clone()),
                        _ => None,
                    });

                bindings.push(ActionGroupBinding {
                    id: summary.action_group_id().to_string(),
                    name: summary.action_group_name().to_string(),
                    enabled: matches!(summary.action_group_state(), ActionGroupState::Enabled),
                    lambda_arn,
                });
            }

            match page.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(bindings)
    }

    /// アクショングループを作成する（同名のものがあれば作成しない）
    ///
    /// # Arguments
    /// * `agent_id` - エージェント ID
    /// * `name` - アクショングループ名
    /// * `description` - 説明
    /// * `lambda_arn` - 実行先 Lambda の ARN
    /// * `kinds` - 公開する分析関数
    ///
    /// # Returns
    /// アクショングループ ID
    pub async fn ensure_action_group(
        &self,
        agent_id: &str,
        name: &str,
        description: &str,
        lambda_arn: &str,
        kinds: &[AnalysisKind],
    ) -> Result<String, DeployError> {
        let existing = self.action_group_bindings(agent_id).await?;
        if let Some(binding) = existing.iter().find(|binding| binding.name == name) {
            info!(%agent_id, action_group = %name, "action group already exists");
            return Ok(binding.id.clone());
        }

        let output = self
            .agent
            .create_agent_action_group()
            .agent_id(agent_id)
            .agent_version(DRAFT_VERSION)
            .action_group_name(name)
            .description(description)
            .action_group_executor(ActionGroupExecutor::Lambda(lambda_arn.to_string()))
            .function_schema(function_schema(kinds)?)
            .action_group_state(ActionGroupState::Enabled)
            .send()
            .await
            .map_err(aws_error("Bedrock Agent"))?;

        let id = output
            .agent_action_group()
            .map(|group| group.action_group_id().to_string())
            .ok_or_else(|| DeployError::NotFound(format!("action group {name}")))?;

        info!(%agent_id, action_group = %name, %id, "created action group");
        Ok(id)
    }

    /// アクショングループを削除する
    pub async fn delete_action_group(
        &self,
        agent_id: &str,
        action_group_id: &str,
    ) -> Result<(), DeployError> {
        self.agent
            .delete_agent_action_group()
            .agent_id(agent_id)
            .agent_version(DRAFT_VERSION)
            .action_group_id(action_group_id)
            .skip_resource_in_use_check(true)
            .send()
            .await
            .map_err(aws_error("Bedrock Agent"))?;
        Ok(())
    }

    /// 同じ Lambda を呼ぶ重複アクショングループを削除し、エージェントを再準備する
    ///
    /// # Returns
    /// 削除したアクショングループ
    pub async fn remove_duplicate_action_groups(
        &self,
        agent_id: &str,
    ) -> Result<Vec<ActionGroupBinding>, DeployError> {
        let bindings = self.action_group_bindings(agent_id).await?;
        let duplicates: Vec<ActionGroupBinding> = find_duplicate_bindings(&bindings)
            .into_iter()
            .cloned()
            .collect();

        for duplicate in &duplicates {
            self.delete_action_group(agent_id, &duplicate.id).await?;
            info!(
                %agent_id,
                action_group = %duplicate.name,
                function = duplicate.function_name().unwrap_or("-"),
                "deleted duplicate action group"
            );
        }

        if !duplicates.is_empty() {
            self.prepare_agent(agent_id).await?;
        }
        Ok(duplicates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(id: &str, name: &str, function: Option<&str>) -> ActionGroupBinding {
        ActionGroupBinding {
            id: id.to_string(),
            name: name.to_string(),
            enabled: true,
            lambda_arn: function
                .map(|f| format!("arn:aws:lambda:us-east-1:123456789012:function:{f}")),
        }
    }

    #[test]
    fn test_find_duplicate_bindings_keeps_first() {
        let bindings = vec![
            binding("1", "market-demand", Some("market-demand-agent")),
            binding("2", "competition-scan", Some("competitor-scan-agent")),
            binding("3", "demand-analyzer", Some("market-demand-agent")),
            binding("4", "user-input", None),
            binding("5", "product-analysis", Some("market-demand-agent")),
        ];

        let duplicates = find_duplicate_bindings(&bindings);
        let ids: Vec<&str> = duplicates.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "5"]);
    }

    #[test]
    fn test_no_duplicates() {
        let bindings = vec![
            binding("1", "a", Some("f1")),
            binding("2", "b", Some("f2")),
        ];
        assert!(find_duplicate_bindings(&bindings).is_empty());
    }

    #[test]
    fn test_function_schema_disables_confirmation() {
        let schema = function_schema(&AnalysisKind::ALL).unwrap();
        let FunctionSchema::Functions(functions) = schema else {
            panic!("関数定義スキーマであるべき");
        };

        assert_eq!(functions.len(), 3);
        let names: Vec<&str> = functions.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec!["analyze_market_demand", "analyze_competition", "analyze_capability"]
        );

        for function in &functions {
            assert_eq!(
                function.require_confirmation(),
                Some(&RequireConfirmation::Disabled)
            );
            let query = function.parameters().unwrap().get("query").unwrap();
            assert_eq!(query.required(), Some(true));
        }

        let demand_params = functions[0].parameters().unwrap();
        assert_eq!(demand_params.get("region").unwrap().required(), Some(false));
    }
}
