use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{Architecture, Environment, FunctionCode, Runtime};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::client::{DeployClient, DeployError, aws_error};
use crate::config::FunctionSpec;
use crate::policy::agent_arn;

/// Bedrock からの呼び出し許可に使うステートメント ID
pub const BEDROCK_STATEMENT_ID: &str = "bedrock-invoke";

const BEDROCK_PRINCIPAL: &str = "bedrock.amazonaws.com";
const BOOTSTRAP_HANDLER: &str = "bootstrap";

/// デプロイ済み関数の概要
#[derive(Debug, Clone, Serialize)]
pub struct FunctionSummary {
    pub name: String,
    pub arn: String,
    pub runtime: Option<String>,
    pub handler: Option<String>,
    pub last_modified: Option<String>,
}

impl DeployClient {
    /// Lambda 関数を作成する（既に存在する場合はコードを更新する）
    ///
    /// # Arguments
    /// * `spec` - 関数定義。`spec.package` の zip をアップロードする
    /// * `role_arn` - 実行ロールの ARN
    ///
    /// # Returns
    /// 関数の ARN
    pub async fn ensure_function(
        &self,
        spec: &FunctionSpec,
        role_arn: &str,
    ) -> Result<String, DeployError> {
        let package = tokio::fs::read(&spec.package).await.map_err(|e| {
            DeployError::ConfigError(format!(
                "failed to read package {} for {}: {}",
                spec.package.display(),
                spec.name,
                e
            ))
        })?;

        let environment = Environment::builder()
            .set_variables(Some(spec.environment.clone()))
            .build();

        let created = self
            .lambda
            .create_function()
            .function_name(&spec.name)
            .runtime(Runtime::Providedal2023)
            .architectures(Architecture::Arm64)
            .handler(BOOTSTRAP_HANDLER)
            .role(role_arn)
            .code(
                FunctionCode::builder()
                    .zip_file(Blob::new(package.clone()))
                    .build(),
            )
            .description(&spec.description)
            .timeout(spec.timeout_seconds)
            .memory_size(spec.memory_mb)
            .environment(environment)
            .send()
            .await;

        match created {
            Ok(output) => {
                let arn = output
                    .function_arn()
                    .map(str::to_string)
                    .ok_or_else(|| DeployError::NotFound(format!("function {}", spec.name)))?;
                info!(function = %spec.name, %arn, "created Lambda function");
                Ok(arn)
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|err| err.is_resource_conflict_exception()) =>
            {
                let updated = self
                    .lambda
                    .update_function_code()
                    .function_name(&spec.name)
                    .architectures(Architecture::Arm64)
                    .zip_file(Blob::new(package))
                    .send()
                    .await
                    .map_err(aws_error("Lambda"))?;

                let arn = match updated.function_arn() {
                    Some(arn) => arn.to_string(),
                    None => self.function_arn(&spec.name).await?,
                };
                info!(function = %spec.name, %arn, "updated code of existing Lambda function");
                Ok(arn)
            }
            Err(e) => Err(aws_error("Lambda")(e)),
        }
    }

    /// 既存関数の ARN を取得する
    pub async fn function_arn(&self, function_name: &str) -> Result<String, DeployError> {
        Ok(self.function_summary(function_name).await?.arn)
    }

    /// 関数の設定概要を取得する
    pub async fn function_summary(&self, function_name: &str) -> Result<FunctionSummary, DeployError> {
        let output = self
            .lambda
            .get_function()
            .function_name(function_name)
            .send()
            .await
            .map_err(aws_error("Lambda"))?;

        let configuration = output
            .configuration()
            .ok_or_else(|| DeployError::NotFound(format!("function {function_name}")))?;

        Ok(FunctionSummary {
            name: function_name.to_string(),
            arn: configuration
                .function_arn()
                .map(str::to_string)
                .ok_or_else(|| DeployError::NotFound(format!("ARN of {function_name}")))?,
            runtime: configuration.runtime().map(|r| r.as_str().to_string()),
            handler: configuration.handler().map(str::to_string),
            last_modified: configuration.last_modified().map(str::to_string),
        })
    }

    /// エージェントから関数を呼び出せるようにリソースポリシーを付け直す
    ///
    /// 古い `bedrock-invoke` ステートメントを削除してから、
    /// 指定エージェントの ARN に限定した許可を追加する。
    pub async fn grant_bedrock_invoke(
        &self,
        function_name: &str,
        agent_id: &str,
    ) -> Result<(), DeployError> {
        let account_id = self.account_id().await?;
        let source_arn = agent_arn(self.region(), &account_id, agent_id);

        match self
            .lambda
            .remove_permission()
            .function_name(function_name)
            .statement_id(BEDROCK_STATEMENT_ID)
            .send()
            .await
        {
            Ok(_) => info!(function = %function_name, "removed previous bedrock permission"),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|err| err.is_resource_not_found_exception()) => {}
            Err(e) => {
                let error = aws_error("Lambda")(e);
                warn!(function = %function_name, %error, "could not remove previous bedrock permission");
            }
        }

        self.lambda
            .add_permission()
            .function_name(function_name)
            .statement_id(BEDROCK_STATEMENT_ID)
            .action("lambda:InvokeFunction")
            .principal(BEDROCK_PRINCIPAL)
            .source_account(&account_id)
            .source_arn(&source_arn)
            .send()
            .await
            .map_err(aws_error("Lambda"))?;

        info!(function = %function_name, agent = %source_arn, "granted bedrock invoke permission");
        Ok(())
    }

    /// 関数のリソースポリシーを取得する（未設定なら `None`）
    pub async fn function_policy(&self, function_name: &str) -> Result<Option<Value>, DeployError> {
        match self
            .lambda
            .get_policy()
            .function_name(function_name)
            .send()
            .await
        {
            Ok(output) => match output.policy() {
                Some(policy) => Ok(Some(serde_json::from_str(policy)?)),
                None => Ok(None),
            },
            Err(e)
                if e.as_service_error()
                    .is_some_and(|err| err.is_resource_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(e) => Err(aws_error("Lambda")(e)),
        }
    }
}
