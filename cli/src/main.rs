mod chat;

use analysis::{analyze_capability, analyze_competition, analyze_demand, dcc_score};
use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use deploy::config::DEFAULT_FOUNDATION_MODEL;
use deploy::iam::USER_POLICY_NAME;
use deploy::{AgentSession, DeployClient, DeployConfig, DeploymentRecord, detect_analyses};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// CLIの引数構造体定義
#[derive(Parser)]
#[command(name = "opportunity-cli")]
#[command(
    about = "Deploy and operate the product opportunity agent on AWS Bedrock",
    long_about = None
)]
struct Cli {
    /// 使用するAWSプロファイル名
    #[arg(long, global = true)]
    aws_profile: Option<String>,

    /// リージョン (オプション: デフォルトはプロファイル設定またはus-east-1など)
    #[arg(long, global = true)]
    region: Option<String>,

    /// デプロイ設定ファイル (オプション: デフォルトは .opportunity/deploy.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// AWS を使わずに分析を実行し、各レポートと DCC スコアを表示します
    Analyze {
        query: String,

        /// 需要分析の地域コード (デフォルトは US)
        #[arg(long)]
        market: Option<String>,

        #[arg(long)]
        category: Option<String>,

        /// 必要スキル (カンマ区切り)
        #[arg(long, value_delimiter = ',')]
        skills: Vec<String>,
    },

    #[command(flatten)]
    Aws(AwsCommand),
}

/// AWS アカウントに対して実行するサブコマンド
#[derive(Subcommand)]
enum AwsCommand {
    /// ロール・Lambda・エージェント・アクショングループ・エイリアスを一括でデプロイします
    Deploy,

    /// 既存エージェントを準備し、エイリアスを作成してデプロイ結果を保存します
    Prepare {
        #[arg(long)]
        agent_id: Option<String>,
    },

    /// 設定ファイルのアクショングループをエージェントに登録します
    ActionGroups {
        #[arg(long)]
        agent_id: Option<String>,
    },

    /// 同じ Lambda を呼ぶ重複アクショングループを削除します
    Dedupe {
        #[arg(long)]
        agent_id: Option<String>,
    },

    /// Bedrock から Lambda を呼び出す許可を付け直します
    Grant {
        #[arg(long)]
        agent_id: Option<String>,

        /// 対象の関数名 (省略時は設定ファイルの全関数)
        #[arg(long)]
        function: Option<String>,
    },

    /// エージェントの指示・モデルを設定ファイルの内容で更新し、再準備します
    UpdateInstruction {
        #[arg(long)]
        agent_id: Option<String>,
    },

    /// エージェントの状態・エイリアス・アクショングループを表示します
    Describe {
        #[arg(long)]
        agent_id: Option<String>,

        /// JSON で出力する
        #[arg(long)]
        json: bool,
    },

    /// ロールに付与されているポリシーを表示します
    Permissions,

    /// 実行中の IAM ユーザーに Bedrock の利用権限を付与します
    GrantUser {
        #[arg(long, default_value = USER_POLICY_NAME)]
        policy_name: String,
    },

    /// Lambda 関数の最近のログを表示します
    Logs {
        /// 対象の関数名 (省略時は設定ファイルの全関数)
        #[arg(long)]
        function: Option<String>,

        /// 遡る分数
        #[arg(long, default_value_t = 10)]
        minutes: i64,

        /// 関数ごとの最大行数
        #[arg(long, default_value_t = 3)]
        limit: usize,
    },

    /// Bedrock のモデルアクセスを確認します
    CheckAccess {
        #[arg(long, default_value = DEFAULT_FOUNDATION_MODEL)]
        model_id: String,
    },

    /// エージェントに1回だけ質問し、どの分析が使われたかを表示します
    Ask {
        query: String,

        #[arg(long)]
        agent_id: Option<String>,

        #[arg(long)]
        alias_id: Option<String>,
    },

    /// エージェントと対話します
    Chat {
        #[arg(long)]
        agent_id: Option<String>,

        #[arg(long)]
        alias_id: Option<String>,
    },

}

#[tokio::main]
async fn main() -> Result<()> {
    // ログは stderr に出し、stdout はユーザー向けの出力に使う
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,deploy=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // 引数の解析
    let Cli {
        aws_profile,
        region,
        config,
        command,
    } = Cli::parse();

    match command {
        // ローカル分析は AWS の設定を必要としない
        Commands::Analyze {
            query,
            market,
            category,
            skills,
        } => run_local_analysis(&query, market.as_deref(), category.as_deref(), &skills),
        Commands::Aws(command) => {
            let config = DeployConfig::load(config).context("failed to load deploy config")?;
            let client = DeployClient::new(aws_profile, region).await?;
            println!("Region: {}", client.region());
            run_command(&client, &config, command).await
        }
    }
}

/// AWS を使うサブコマンドを実行する
async fn run_command(
    client: &DeployClient,
    config: &DeployConfig,
    command: AwsCommand,
) -> Result<()> {
    match command {
        AwsCommand::Deploy => {
            let record = client.deploy_all(config).await?;
            println!("Agent ID: {}", record.agent_id);
            println!("Alias ID: {}", record.alias_id);
            for (name, function) in &record.functions {
                println!("  {} -> {}", name, function.arn);
            }
            println!("Saved: {}", config.output_path.display());
        }
        AwsCommand::Prepare { agent_id } => {
            let agent_id = resolve_agent_id(agent_id, config)?;
            let alias_id = client.complete_deployment(&agent_id, config).await?;

            let mut record = DeploymentRecord::load_if_exists(&config.output_path)?
                .filter(|record| record.agent_id == agent_id)
                .unwrap_or_else(|| DeploymentRecord {
                    agent_id: agent_id.clone(),
                    alias_id: alias_id.clone(),
                    region: client.region().to_string(),
                    functions: Default::default(),
                    deployed_at: None,
                });
            record.alias_id = alias_id.clone();
            record.deployed_at = Some(Utc::now().to_rfc3339());
            record.save(&config.output_path)?;

            println!("Agent ID: {}", agent_id);
            println!("Alias ID: {}", alias_id);
        }
        AwsCommand::ActionGroups { agent_id } => {
            let agent_id = resolve_agent_id(agent_id, config)?;
            for function in &config.functions {
                let arn = client.function_arn(&function.name).await?;
                let id = client
                    .ensure_action_group(
                        &agent_id,
                        &function.action_group,
                        &function.description,
                        &arn,
                        &function.analyses,
                    )
                    .await?;
                println!("{} ({}) -> {}", function.action_group, id, function.name);
            }
            client.prepare_agent(&agent_id).await?;
            client.wait_for_agent(&agent_id, &config.polling).await?;
            println!("Agent prepared.");
        }
        AwsCommand::Dedupe { agent_id } => {
            let agent_id = resolve_agent_id(agent_id, config)?;
            let removed = client.remove_duplicate_action_groups(&agent_id).await?;
            if removed.is_empty() {
                println!("No duplicate action groups.");
            }
            for binding in &removed {
                println!(
                    "Removed {} ({}) -> {}",
                    binding.name,
                    binding.id,
                    binding.function_name().unwrap_or("-")
                );
            }
        }
        AwsCommand::Grant { agent_id, function } => {
            let agent_id = resolve_agent_id(agent_id, config)?;
            for name in function_names(function, config)? {
                client.grant_bedrock_invoke(&name, &agent_id).await?;
                println!("Granted bedrock-invoke on {}", name);
                if let Some(policy) = client.function_policy(&name).await? {
                    println!("{}", serde_json::to_string_pretty(&policy)?);
                }
            }
        }
        AwsCommand::UpdateInstruction { agent_id } => {
            let agent_id = resolve_agent_id(agent_id, config)?;
            let role_arn = client.role_arn(&config.agent_role.name).await?;
            client.update_agent_instruction(&agent_id, &config.agent, &role_arn).await?;
            client.wait_for_agent(&agent_id, &config.polling).await?;
            client.prepare_agent(&agent_id).await?;
            client.wait_for_agent(&agent_id, &config.polling).await?;
            println!("Updated and prepared agent {}", agent_id);
        }
        AwsCommand::Describe { agent_id, json } => {
            let agent_id = resolve_agent_id(agent_id, config)?;
            let details = client.describe_agent(&agent_id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&details)?);
            } else {
                println!("Agent: {} ({})", details.name, details.agent_id);
                println!("Status: {}", details.status);
                println!("Model: {}", details.foundation_model.as_deref().unwrap_or("-"));
                println!("Role: {}", details.role_arn);
                println!("Aliases:");
                for alias in &details.aliases {
                    println!("  {} ({})", alias.name, alias.id);
                }
                println!("Action groups:");
                for binding in &details.action_groups {
                    println!(
                        "  {} ({}) enabled={} -> {}",
                        binding.name,
                        binding.id,
                        binding.enabled,
                        binding.function_name().unwrap_or("-")
                    );
                }
            }
        }
        AwsCommand::Permissions => {
            for role in [&config.agent_role, &config.lambda_role] {
                let policies = client.role_policies(&role.name).await?;
                println!("{}:", role.name);
                for arn in &policies.managed {
                    println!("  managed: {}", arn);
                }
                for name in &policies.inline {
                    println!("  inline: {}", name);
                }
            }
        }
        AwsCommand::GrantUser { policy_name } => {
            let grant = client.grant_user_access(&policy_name).await?;
            println!("Attached {} to user {}", grant.policy_arn, grant.user_name);
        }
        AwsCommand::Logs {
            function,
            minutes,
            limit,
        } => {
            let window = chrono::Duration::minutes(minutes);
            for name in function_names(function, config)? {
                println!("== {} ==", name);
                match client.recent_function_logs(&name, window, limit).await {
                    Ok(lines) if lines.is_empty() => println!("  (no recent logs)"),
                    Ok(lines) => {
                        for line in lines {
                            let timestamp = line
                                .timestamp
                                .map(|t| t.format("%H:%M:%S").to_string())
                                .unwrap_or_default();
                            println!("  {} {}", timestamp, line.message);
                        }
                    }
                    // ロググループは関数が一度も呼ばれていないと存在しない
                    Err(e) => println!("  (logs unavailable: {})", e),
                }
            }
        }
        AwsCommand::CheckAccess { model_id } => {
            let access = client.check_model_access(&model_id).await?;
            println!("Foundation models: {}", access.foundation_model_count);
            println!("Claude models: {}", access.claude_models.len());
            for model in access.claude_models.iter().take(5) {
                println!("  {}", model);
            }
            if let Some(error) = &access.invocation_error {
                println!("{}: invocation failed: {}", access.model_id, error);
            }
            if !access.can_invoke() {
                bail!("model {} is not invocable; try `grant-user`", access.model_id);
            }
            println!("{}: invocation OK", access.model_id);
        }
        AwsCommand::Ask {
            query,
            agent_id,
            alias_id,
        } => {
            let session = resolve_session(agent_id, alias_id, config)?;
            let response = client.ask_agent(&session, &query).await?;
            println!("{}", response);

            let coverage = detect_analyses(&response);
            println!();
            println!("Demand analysis:      {}", mark(coverage.demand));
            println!("Competition analysis: {}", mark(coverage.competition));
            println!("Capability analysis:  {}", mark(coverage.capability));
            if !coverage.is_complete() {
                println!("Some analyses were not used. Try `dedupe` or `grant`.");
            }
        }
        AwsCommand::Chat { agent_id, alias_id } => {
            let session = resolve_session(agent_id, alias_id, config)?;
            chat::run_chat(client, session).await?;
        }
    }

    Ok(())
}

/// 引数、デプロイ結果ファイルの順でエージェント ID を決める
fn resolve_agent_id(agent_id: Option<String>, config: &DeployConfig) -> Result<String> {
    if let Some(agent_id) = agent_id {
        return Ok(agent_id);
    }
    match DeploymentRecord::load_if_exists(&config.output_path)? {
        Some(record) => Ok(record.agent_id),
        None => bail!(
            "no --agent-id given and no deployment record at {}",
            config.output_path.display()
        ),
    }
}

/// 引数、デプロイ結果ファイルの順でエージェントとエイリアスを決める
fn resolve_session(
    agent_id: Option<String>,
    alias_id: Option<String>,
    config: &DeployConfig,
) -> Result<AgentSession> {
    let record = DeploymentRecord::load_if_exists(&config.output_path)?;
    let agent_id = agent_id
        .or_else(|| record.as_ref().map(|r| r.agent_id.clone()))
        .context("no --agent-id given and no deployment record found")?;
    let alias_id = alias_id
        .or_else(|| {
            record
                .as_ref()
                .filter(|r| r.agent_id == agent_id)
                .map(|r| r.alias_id.clone())
        })
        .unwrap_or_else(|| deploy::TEST_ALIAS_ID.to_string());
    Ok(AgentSession::new(agent_id, alias_id))
}

fn function_names(function: Option<String>, config: &DeployConfig) -> Result<Vec<String>> {
    match function {
        Some(name) => Ok(vec![name]),
        None if config.functions.is_empty() => bail!("no functions in deploy config"),
        None => Ok(config.functions.iter().map(|f| f.name.clone()).collect()),
    }
}

fn mark(used: bool) -> &'static str {
    if used { "used" } else { "not detected" }
}

/// ローカルで3つの分析を実行し、DCC スコアを表示する
fn run_local_analysis(
    query: &str,
    region: Option<&str>,
    category: Option<&str>,
    skills: &[String],
) -> Result<()> {
    let demand = analyze_demand(query, region, Utc::now());
    let competition = analyze_competition(query, category);
    let capability = analyze_capability(query, skills);
    let dcc = dcc_score(
        demand.demand_score,
        competition.competition_score,
        capability.capability_score,
    );

    let report = serde_json::json!({
        "query": query,
        "demand": demand,
        "competition": competition,
        "capability": capability,
        "dcc": dcc,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_args_after_subcommand() {
        let cli = Cli::try_parse_from([
            "opportunity-cli",
            "describe",
            "--agent-id",
            "AGENT123",
            "--region",
            "us-west-2",
            "--json",
        ])
        .unwrap();

        assert_eq!(cli.region.as_deref(), Some("us-west-2"));
        match cli.command {
            Commands::Aws(AwsCommand::Describe { agent_id, json }) => {
                assert_eq!(agent_id.as_deref(), Some("AGENT123"));
                assert!(json, "--json が反映されるべき");
            }
            _ => panic!("describe として解析されるべき"),
        }
    }

    #[test]
    fn test_parse_analyze_skills() {
        let cli = Cli::try_parse_from([
            "opportunity-cli",
            "analyze",
            "smart speaker",
            "--skills",
            "iot,firmware",
        ])
        .unwrap();

        match cli.command {
            Commands::Analyze { query, skills, .. } => {
                assert_eq!(query, "smart speaker");
                assert_eq!(skills, vec!["iot".to_string(), "firmware".to_string()]);
            }
            _ => panic!("analyze として解析されるべき"),
        }
    }

    #[test]
    fn test_check_access_defaults_to_haiku() {
        let cli = Cli::try_parse_from(["opportunity-cli", "check-access"]).unwrap();
        match cli.command {
            Commands::Aws(AwsCommand::CheckAccess { model_id }) => {
                assert_eq!(model_id, DEFAULT_FOUNDATION_MODEL)
            }
            _ => panic!("check-access として解析されるべき"),
        }
    }

    #[test]
    fn test_parse_grant_user_default_policy() {
        let cli = Cli::try_parse_from(["opportunity-cli", "grant-user"]).unwrap();
        match cli.command {
            Commands::Aws(AwsCommand::GrantUser { policy_name }) => {
                assert_eq!(policy_name, USER_POLICY_NAME)
            }
            _ => panic!("grant-user として解析されるべき"),
        }
    }

    #[test]
    fn test_resolve_session_prefers_arguments() {
        let dir = std::env::temp_dir().join("opportunity-cli-missing-record");
        let config = DeployConfig {
            output_path: dir.join("deployment.json"),
            ..DeployConfig::default()
        };

        let session =
            resolve_session(Some("AGENT".to_string()), None, &config).expect("引数があれば解決できるべき");
        assert_eq!(session.agent_id, "AGENT");
        assert_eq!(session.alias_id, deploy::TEST_ALIAS_ID);

        assert!(
            resolve_agent_id(None, &config).is_err(),
            "記録も引数もなければエラーになるべき"
        );
    }
}
