//! IAM ポリシードキュメント
use serde::{Deserialize, Serialize};

const POLICY_VERSION: &str = "2012-10-17";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    #[serde(rename = "Service")]
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    pub action: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    /// サービスプリンシパルに `sts:AssumeRole` を許可する信頼ポリシー
    pub fn trust(service_principal: &str) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement: vec![Statement {
                effect: Effect::Allow,
                principal: Some(Principal {
                    service: service_principal.to_string(),
                }),
                action: vec!["sts:AssumeRole".to_string()],
                resource: None,
            }],
        }
    }

    /// 全リソースに対して指定アクションを許可する権限ポリシー
    pub fn allow_all_resources<S: AsRef<str>>(actions: &[S]) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statement: vec![Statement {
                effect: Effect::Allow,
                principal: None,
                action: actions.iter().map(|a| a.as_ref().to_string()).collect(),
                resource: Some("*".to_string()),
            }],
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// エージェントの ARN（Lambda 呼び出し許可の送信元に使う）
pub fn agent_arn(region: &str, account_id: &str, agent_id: &str) -> String {
    format!("arn:aws:bedrock:{region}:{account_id}:agent/{agent_id}")
}

/// カスタマー管理ポリシーの ARN
pub fn customer_policy_arn(account_id: &str, policy_name: &str) -> String {
    format!("arn:aws:iam::{account_id}:policy/{policy_name}")
}

/// IAM ユーザーの ARN からユーザー名を取り出す
///
/// パス付き（`user/dev/alice`）でも最後の要素を返す。ロールや root の ARN は `None`。
pub fn user_name_from_arn(arn: &str) -> Option<&str> {
    let resource = arn.splitn(6, ':').nth(5)?;
    let path = resource.strip_prefix("user/")?;
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Lambda 関数の ARN から関数名を取り出す
///
/// バージョンやエイリアス修飾子付きの ARN にも対応する。
/// ARN 形式でない文字列はそのまま関数名として扱う。
pub fn function_name_from_arn(arn: &str) -> &str {
    let mut parts = arn.split(':');
    while let Some(part) = parts.next() {
        if part == "function" {
            if let Some(name) = parts.next() {
                return name;
            }
        }
    }
    arn
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trust_policy_json() {
        let value: serde_json::Value =
            serde_json::from_str(&PolicyDocument::trust("lambda.amazonaws.com").to_json().unwrap())
                .unwrap();

        assert_eq!(
            value,
            json!({
                "Version": "2012-10-17",
                "Statement": [{
                    "Effect": "Allow",
                    "Principal": {"Service": "lambda.amazonaws.com"},
                    "Action": ["sts:AssumeRole"]
                }]
            })
        );
    }

    #[test]
    fn test_permission_policy_json() {
        let doc = PolicyDocument::allow_all_resources(&["bedrock:InvokeModel", "lambda:InvokeFunction"]);
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["Statement"][0]["Resource"], "*");
        assert_eq!(value["Statement"][0]["Action"][1], "lambda:InvokeFunction");
        assert!(value["Statement"][0].get("Principal").is_none());
    }

    #[test]
    fn test_function_name_from_arn() {
        assert_eq!(
            function_name_from_arn("arn:aws:lambda:us-east-1:123456789012:function:market-demand-agent"),
            "market-demand-agent"
        );
        assert_eq!(
            function_name_from_arn("arn:aws:lambda:us-east-1:123456789012:function:market-demand-agent:live"),
            "market-demand-agent"
        );
        assert_eq!(function_name_from_arn("plain-name"), "plain-name");
    }

    #[test]
    fn test_user_name_from_arn() {
        assert_eq!(
            user_name_from_arn("arn:aws:iam::123456789012:user/alice"),
            Some("alice")
        );
        assert_eq!(
            user_name_from_arn("arn:aws:iam::123456789012:user/dev/team/bob"),
            Some("bob")
        );
        assert_eq!(
            user_name_from_arn("arn:aws:sts::123456789012:assumed-role/Admin/session"),
            None
        );
        assert_eq!(user_name_from_arn("arn:aws:iam::123456789012:root"), None);
        assert_eq!(user_name_from_arn("alice"), None);
    }

    #[test]
    fn test_customer_policy_arn() {
        assert_eq!(
            customer_policy_arn("123456789012", "BedrockUserAccess"),
            "arn:aws:iam::123456789012:policy/BedrockUserAccess"
        );
    }

    #[test]
    fn test_agent_arn() {
        assert_eq!(
            agent_arn("us-east-1", "123456789012", "DKPL7RP9OU"),
            "arn:aws:bedrock:us-east-1:123456789012:agent/DKPL7RP9OU"
        );
    }
}
