use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

use crate::client::{DeployClient, DeployError, aws_error};
use crate::config::{PollSettings, RoleSpec};
use crate::policy::{PolicyDocument, customer_policy_arn, user_name_from_arn};

/// CLI を実行する IAM ユーザーに付与するポリシー名
pub const USER_POLICY_NAME: &str = "BedrockUserAccess";

/// エージェントの呼び出しとモデル確認に必要な操作
pub const USER_ACTIONS: [&str; 5] = [
    "bedrock:InvokeModel",
    "bedrock:InvokeModelWithResponseStream",
    "bedrock:InvokeAgent",
    "bedrock:ListFoundationModels",
    "bedrock:GetFoundationModel",
];

/// ユーザーへの権限付与の結果
#[derive(Debug, Clone, Serialize)]
pub struct UserGrant {
    pub user_name: String,
    pub policy_arn: String,
}

/// ロールに付与されているポリシー
#[derive(Debug, Clone, Default, Serialize)]
pub struct RolePolicies {
    pub managed: Vec<String>,
    pub inline: Vec<String>,
}

impl DeployClient {
    /// IAM ロールを作成する（既に存在する場合は既存のロールを使う）
    ///
    /// 管理ポリシーのアタッチとインラインポリシーの設定は毎回行う。
    /// どちらも同じ内容での再実行は上書きになるだけなので、権限の修復にも使える。
    ///
    /// # Returns
    /// ロールの ARN
    pub async fn ensure_role(&self, spec: &RoleSpec) -> Result<String, DeployError> {
        let trust_policy = PolicyDocument::trust(&spec.service_principal).to_json()?;

        let created = self
            .iam
            .create_role()
            .role_name(&spec.name)
            .assume_role_policy_document(trust_policy)
            .description(format!("Assumed by {}", spec.service_principal))
            .send()
            .await;

        let role_arn = match created {
            Ok(output) => {
                let arn = output
                    .role()
                    .map(|role| role.arn().to_string())
                    .ok_or_else(|| DeployError::NotFound(format!("role {}", spec.name)))?;
                info!(role = %spec.name, %arn, "created IAM role");
                arn
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|err| err.is_entity_already_exists_exception()) =>
            {
                let arn = self.role_arn(&spec.name).await?;
                info!(role = %spec.name, %arn, "using existing IAM role");
                arn
            }
            Err(e) => return Err(aws_error("IAM")(e)),
        };

        for policy_arn in &spec.managed_policy_arns {
            self.iam
                .attach_role_policy()
                .role_name(&spec.name)
                .policy_arn(policy_arn)
                .send()
                .await
                .map_err(aws_error("IAM"))?;
            info!(role = %spec.name, policy = %policy_arn, "attached managed policy");
        }

        if let Some(inline) = &spec.inline_policy {
            let document = PolicyDocument::allow_all_resources(&inline.actions).to_json()?;
            self.iam
                .put_role_policy()
                .role_name(&spec.name)
                .policy_name(&inline.name)
                .policy_document(document)
                .send()
                .await
                .map_err(aws_error("IAM"))?;
            info!(role = %spec.name, policy = %inline.name, "put inline policy");
        }

        Ok(role_arn)
    }

    /// 作成したロールが他サービスから見えるようになるまで待つ
    ///
    /// IAM には伝播を確認する API がないため、設定された秒数だけ待つ。
    pub async fn wait_for_role_propagation(&self, polling: &PollSettings) {
        info!(
            seconds = polling.role_propagation_secs,
            "waiting for IAM role propagation"
        );
        sleep(Duration::from_secs(polling.role_propagation_secs)).await;
    }

    /// 呼び出し元の IAM ユーザーに Bedrock の利用権限を付与する
    ///
    /// 管理ポリシー `policy_name` を作成（既存なら再利用）してユーザーにアタッチする。
    /// ロールを引き受けている場合はユーザーが特定できないのでエラーにする。
    pub async fn grant_user_access(&self, policy_name: &str) -> Result<UserGrant, DeployError> {
        let identity = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(aws_error("STS"))?;
        let caller_arn = identity.arn().unwrap_or_default();
        let user_name = user_name_from_arn(caller_arn)
            .ok_or_else(|| {
                DeployError::ConfigError(format!("caller {caller_arn} is not an IAM user"))
            })?
            .to_string();
        let account_id = identity
            .account()
            .ok_or_else(|| DeployError::NotFound("caller account id".to_string()))?;

        let document = PolicyDocument::allow_all_resources(&USER_ACTIONS).to_json()?;
        let created = self
            .iam
            .create_policy()
            .policy_name(policy_name)
            .policy_document(document)
            .description("Bedrock access for the opportunity CLI user")
            .send()
            .await;

        let policy_arn = match created {
            Ok(output) => output
                .policy()
                .and_then(|policy| policy.arn())
                .map(str::to_string)
                .ok_or_else(|| DeployError::NotFound(format!("policy {policy_name}")))?,
            Err(e)
                if e.as_service_error()
                    .is_some_and(|err| err.is_entity_already_exists_exception()) =>
            {
                customer_policy_arn(account_id, policy_name)
            }
            Err(e) => return Err(aws_error("IAM")(e)),
        };

        // 同じポリシーの再アタッチは成功扱いになる
        self.iam
            .attach_user_policy()
            .user_name(&user_name)
            .policy_arn(&policy_arn)
            .send()
            .await
            .map_err(aws_error("IAM"))?;
        info!(user = %user_name, policy = %policy_arn, "attached user policy");

        Ok(UserGrant {
            user_name,
            policy_arn,
        })
    }

    /// 既存ロールの ARN を取得する
    pub async fn role_arn(&self, role_name: &str) -> Result<String, DeployError> {
        let output = self
            .iam
            .get_role()
            .role_name(role_name)
            .send()
            .await
            .map_err(aws_error("IAM"))?;

        output
            .role()
            .map(|role| role.arn().to_string())
            .ok_or_else(|| DeployError::NotFound(format!("role {role_name}")))
    }

    /// ロールに付与されている管理ポリシーとインラインポリシーを列挙する
    pub async fn role_policies(&self, role_name: &str) -> Result<RolePolicies, DeployError> {
        let attached = self
            .iam
            .list_attached_role_policies()
            .role_name(role_name)
            .send()
            .await
            .map_err(aws_error("IAM"))?;

        let inline = self
            .iam
            .list_role_policies()
            .role_name(role_name)
            .send()
            .await
            .map_err(aws_error("IAM"))?;

        Ok(RolePolicies {
            managed: attached
                .attached_policies()
                .iter()
                .filter_map(|policy| policy.policy_arn().map(str::to_string))
                .collect(),
            inline: inline.policy_names().to_vec(),
        })
    }
}
