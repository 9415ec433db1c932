//! デプロイ設定ファイルの構造体定義
//!
//! `deploy.json` を読み込み、ロール・Lambda 関数・エージェント・
//! アクショングループ・エイリアスの構成を決める。ファイルが無い場合は
//! 組み込みの既定値で動く。
use analysis::AnalysisKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Lambda 基本実行ロールの管理ポリシー
pub const LAMBDA_BASIC_EXECUTION_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";

/// 既定のファウンデーションモデル
pub const DEFAULT_FOUNDATION_MODEL: &str = "anthropic.claude-3-haiku-20240307-v1:0";

/// 既定のエージェント指示
pub const DEFAULT_INSTRUCTION: &str = "You are a Product Opportunity Analyzer that identifies high-potential product opportunities using DCC analysis.

Execute all analysis functions immediately without asking for user approval or confirmation.

For every product idea:
1. DEMAND (0-100): call analyze_market_demand to get market interest, momentum and news coverage.
2. COMPETITION (0-100, lower is better): call analyze_competition to assess saturation, ratings and feature gaps.
3. CAPABILITY (0-100): call analyze_capability to assess skills, suppliers and time to market.
4. DCC = (Demand x 0.45) + ((100 - Competition) x 0.30) + (Capability x 0.25)
5. Recommend differentiation strategies, feature gaps to exploit, a market entry approach and risk mitigation steps.

Include a JSON summary at the end with all scores and key metrics.";

/// 設定ファイルのルート構造
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeployConfig {
    /// エージェント定義
    pub agent: AgentSpec,

    /// エージェントが引き受ける IAM ロール
    pub agent_role: RoleSpec,

    /// Lambda 関数の実行ロール
    pub lambda_role: RoleSpec,

    /// アクショングループの実体となる Lambda 関数
    pub functions: Vec<FunctionSpec>,

    /// エージェントエイリアス
    pub alias: AliasSpec,

    /// デプロイ結果を書き出すファイル
    pub output_path: PathBuf,

    /// 待機とポーリングの設定
    pub polling: PollSettings,
}

/// Bedrock エージェントの定義
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentSpec {
    pub name: String,
    pub description: String,
    pub foundation_model: String,
    pub instruction: String,
    pub idle_session_ttl_seconds: i32,
}

/// IAM ロールの定義
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSpec {
    pub name: String,

    /// 信頼ポリシーで AssumeRole を許可するサービスプリンシパル
    pub service_principal: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub managed_policy_arns: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_policy: Option<InlinePolicySpec>,
}

/// インラインポリシー（全リソースに対して `actions` を許可）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlinePolicySpec {
    pub name: String,
    pub actions: Vec<String>,
}

/// Lambda 関数とそのアクショングループの定義
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// `cargo lambda build --output-format zip` が出力する zip のパス
    pub package: PathBuf,

    /// この関数に束ねるアクショングループ名
    pub action_group: String,

    /// アクショングループに公開する分析関数
    pub analyses: Vec<AnalysisKind>,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: i32,

    #[serde(default = "default_memory")]
    pub memory_mb: i32,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub environment: HashMap<String, String>,
}

/// エイリアスの定義
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasSpec {
    pub name: String,
    pub description: String,
}

/// 待機時間の設定
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PollSettings {
    /// IAM ロール作成後の反映待ち（秒）
    pub role_propagation_secs: u64,

    /// エージェント状態の確認間隔（秒）
    pub interval_secs: u64,

    /// エージェント状態の最大確認回数
    pub max_attempts: u32,
}

fn default_timeout() -> i32 {
    30
}

fn default_memory() -> i32 {
    128
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            agent: AgentSpec::default(),
            agent_role: RoleSpec {
                name: "ProductOpportunityAgentRole".to_string(),
                service_principal: "bedrock.amazonaws.com".to_string(),
                managed_policy_arns: Vec::new(),
                inline_policy: Some(InlinePolicySpec {
                    name: "ProductOpportunityAgentPolicy".to_string(),
                    actions: vec![
                        "bedrock:InvokeModel".to_string(),
                        "lambda:InvokeFunction".to_string(),
                    ],
                }),
            },
            lambda_role: RoleSpec {
                name: "ProductOpportunityLambdaRole".to_string(),
                service_principal: "lambda.amazonaws.com".to_string(),
                managed_policy_arns: vec![LAMBDA_BASIC_EXECUTION_POLICY.to_string()],
                inline_policy: None,
            },
            functions: vec![
                FunctionSpec::for_analysis(
                    "market-demand-agent",
                    "Analyzes market demand signals",
                    "market-demand",
                    AnalysisKind::Demand,
                ),
                FunctionSpec::for_analysis(
                    "competitor-scan-agent",
                    "Scans competitive landscape",
                    "competitor-scan",
                    AnalysisKind::Competition,
                ),
                FunctionSpec::for_analysis(
                    "capability-match-agent",
                    "Matches internal capabilities",
                    "capability-match",
                    AnalysisKind::Capability,
                ),
            ],
            alias: AliasSpec::default(),
            output_path: PathBuf::from("product-opportunity-config.json"),
            polling: PollSettings::default(),
        }
    }
}

impl Default for AgentSpec {
    fn default() -> Self {
        Self {
            name: "product-opportunity-analyzer".to_string(),
            description: "Analyzes product opportunities using DCC methodology".to_string(),
            foundation_model: DEFAULT_FOUNDATION_MODEL.to_string(),
            instruction: DEFAULT_INSTRUCTION.to_string(),
            idle_session_ttl_seconds: 1800,
        }
    }
}

impl Default for AliasSpec {
    fn default() -> Self {
        Self {
            name: "live".to_string(),
            description: "Live product opportunity analyzer".to_string(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            role_propagation_secs: 10,
            interval_secs: 10,
            max_attempts: 30,
        }
    }
}

impl FunctionSpec {
    /// 1つの分析を公開する関数定義を作る
    ///
    /// # Arguments
    /// * `name` - Lambda 関数名
    /// * `description` - 関数の説明
    /// * `binary` - `functions` クレートのバイナリ名（zip のパスに使う）
    /// * `kind` - 公開する分析
    pub fn for_analysis(name: &str, description: &str, binary: &str, kind: AnalysisKind) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            package: PathBuf::from(format!("target/lambda/{binary}/bootstrap.zip")),
            action_group: kind.route_defaults().action_group.to_string(),
            analyses: vec![kind],
            timeout_seconds: default_timeout(),
            memory_mb: default_memory(),
            environment: HashMap::new(),
        }
    }
}

impl DeployConfig {
    /// 設定ファイルを読み込む
    ///
    /// # Arguments
    /// * `path` - 設定ファイルのパス
    ///
    /// # Errors
    /// ファイルの読み込みやパースに失敗した場合
    pub fn load_from_file(path: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)?;
        let config: DeployConfig = serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Failed to parse {}: {}", path.display(), e),
            )
        })?;
        Ok(config)
    }

    /// 既定の設定ファイルパスを取得
    ///
    /// 以下の順序で検索：
    /// 1. `.opportunity/deploy.json`
    /// 2. `deploy.json`（カレントディレクトリ）
    pub fn default_path() -> Option<PathBuf> {
        [".opportunity/deploy.json", "deploy.json"]
            .into_iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// 指定パス、既定パス、組み込み既定値の順で設定を決める
    pub fn load(path: Option<PathBuf>) -> Result<Self, std::io::Error> {
        match path.or_else(Self::default_path) {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// 名前で関数定義を探す
    pub fn function(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// 設定の整合性を確認する
    ///
    /// # Returns
    /// 問題点のリスト（空なら問題なし）
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.agent.name.trim().is_empty() {
            problems.push("agent.name must not be empty".to_string());
        }
        if self.functions.is_empty() {
            problems.push("at least one function is required".to_string());
        }

        let mut names = std::collections::HashSet::new();
        let mut groups = std::collections::HashSet::new();
        for function in &self.functions {
            if !names.insert(function.name.as_str()) {
                problems.push(format!("duplicate function name: {}", function.name));
            }
            if !groups.insert(function.action_group.as_str()) {
                problems.push(format!("duplicate action group: {}", function.action_group));
            }
            if function.analyses.is_empty() {
                problems.push(format!("function {} exposes no analyses", function.name));
            }
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        let config = DeployConfig::default();
        assert!(config.problems().is_empty());
        assert_eq!(config.functions.len(), 3);
        assert_eq!(
            config.function("competitor-scan-agent").unwrap().package,
            PathBuf::from("target/lambda/competitor-scan/bootstrap.zip")
        );
        assert_eq!(config.alias.name, "live");
    }

    #[test]
    fn test_parse_partial_config() {
        let json = r#"
        {
          "agent": { "name": "my-analyzer" },
          "functions": [
            {
              "name": "all-in-one",
              "package": "dist/bootstrap.zip",
              "actionGroup": "product-analysis-functions",
              "analyses": ["demand", "competition", "capability"],
              "environment": { "RUST_LOG": "debug" }
            }
          ],
          "polling": { "intervalSecs": 2 }
        }
        "#;

        let config: DeployConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.agent.name, "my-analyzer");
        assert_eq!(config.agent.foundation_model, DEFAULT_FOUNDATION_MODEL);
        assert_eq!(config.functions.len(), 1);

        let function = &config.functions[0];
        assert_eq!(function.analyses.len(), 3);
        assert_eq!(function.timeout_seconds, 30);
        assert_eq!(function.environment.get("RUST_LOG"), Some(&"debug".to_string()));

        assert_eq!(config.polling.interval_secs, 2);
        assert_eq!(config.polling.max_attempts, 30);
        assert_eq!(config.lambda_role.service_principal, "lambda.amazonaws.com");
    }

    #[test]
    fn test_problems_detect_duplicates() {
        let mut config = DeployConfig::default();
        let mut copy = config.functions[0].clone();
        copy.analyses.clear();
        config.functions.push(copy);

        let problems = config.problems();
        assert_eq!(problems.len(), 3);
        assert!(problems[0].contains("duplicate function name"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.json");
        std::fs::write(&path, r#"{ "alias": { "name": "prod" } }"#).unwrap();

        let config = DeployConfig::load(Some(path)).unwrap();
        assert_eq!(config.alias.name, "prod");
        assert_eq!(config.alias.description, "Live product opportunity analyzer");

        let missing = DeployConfig::load_from_file(dir.path().join("missing.json"));
        assert!(missing.is_err());
    }
}
