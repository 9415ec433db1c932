use aws_config::meta::region::RegionProviderChain;
use aws_config::{self, BehaviorVersion};
use aws_smithy_types::error::display::DisplayErrorContext;
use tracing::debug;

/// リージョンが決まらない場合の既定値
pub const DEFAULT_REGION: &str = "us-east-1";

/// DeployClient のエラー型
#[derive(thiserror::Error, Debug)]
pub enum DeployError {
    #[error("AWS {0} API error: {1}")]
    AwsSdkError(&'static str, String),

    #[error("Request building error: {0}")]
    BuildError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Agent {0} failed: {1}")]
    AgentFailed(String, String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// SDK エラーを `DeployError` に変換するクロージャを返す
///
/// `DisplayErrorContext` でエラーチェーン全体を文字列化する。
pub(crate) fn aws_error<E>(service: &'static str) -> impl FnOnce(E) -> DeployError
where
    E: std::error::Error,
{
    move |e| DeployError::AwsSdkError(service, DisplayErrorContext(&e).to_string())
}

/// デプロイ用クライアント構造体
///
/// 製品機会エージェントを構成する AWS リソース（IAM ロール、Lambda 関数、
/// Bedrock エージェント、アクショングループ、エイリアス）の作成・修復・
/// 確認を担当する。各操作は再実行しても同じ結果になるように作られている。
pub struct DeployClient {
    pub(crate) iam: aws_sdk_iam::Client,
    pub(crate) lambda: aws_sdk_lambda::Client,
    pub(crate) agent: aws_sdk_bedrockagent::Client,
    pub(crate) agent_runtime: aws_sdk_bedrockagentruntime::Client,
    pub(crate) bedrock: aws_sdk_bedrock::Client,
    pub(crate) runtime: aws_sdk_bedrockruntime::Client,
    pub(crate) logs: aws_sdk_cloudwatchlogs::Client,
    pub(crate) sts: aws_sdk_sts::Client,
    region: String,
}

impl DeployClient {
    /// 新しい DeployClient を作成する
    ///
    /// # Arguments
    /// * `profile` - 使用する AWS プロファイル名（オプション）。指定しない場合は既定の認証情報チェーン
    /// * `region` - リージョン（オプション）。指定しない場合はプロファイルの設定またはus-east-1を使用
    ///
    /// # Returns
    /// 初期化された `DeployClient` インスタンス
    pub async fn new(profile: Option<String>, region: Option<String>) -> Result<Self, DeployError> {
        let region_provider = RegionProviderChain::first_try(region.map(aws_config::Region::new))
            .or_default_provider()
            .or_else(aws_config::Region::new(DEFAULT_REGION));

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);
        if let Some(profile) = &profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;

        let region = config
            .region()
            .map(|r| r.to_string())
            .ok_or_else(|| DeployError::ConfigError("AWS region could not be resolved".to_string()))?;
        debug!(%region, profile = profile.as_deref().unwrap_or("default"), "loaded AWS config");

        Ok(Self {
            iam: aws_sdk_iam::Client::new(&config),
            lambda: aws_sdk_lambda::Client::new(&config),
            agent: aws_sdk_bedrockagent::Client::new(&config),
            agent_runtime: aws_sdk_bedrockagentruntime::Client::new(&config),
            bedrock: aws_sdk_bedrock::Client::new(&config),
            runtime: aws_sdk_bedrockruntime::Client::new(&config),
            logs: aws_sdk_cloudwatchlogs::Client::new(&config),
            sts: aws_sdk_sts::Client::new(&config),
            region,
        })
    }

    /// 使用しているリージョン
    pub fn region(&self) -> &str {
        &self.region
    }

    /// 呼び出し元の AWS アカウント ID
    pub async fn account_id(&self) -> Result<String, DeployError> {
        let identity = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(aws_error("STS"))?;

        identity
            .account()
            .map(str::to_string)
            .ok_or_else(|| DeployError::NotFound("caller account id".to_string()))
    }
}
