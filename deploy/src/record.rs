//! デプロイ結果ファイル
//!
//! フロントエンドや CLI の後続コマンドがエージェント ID とエイリアス ID を
//! 参照できるよう、デプロイ結果を JSON で保存する。
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::client::DeployError;

/// デプロイ済み関数の記録
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionRecord {
    pub arn: String,
    pub action_group_id: Option<String>,
}

/// デプロイ結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub agent_id: String,
    pub alias_id: String,
    pub region: String,
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionRecord>,
    #[serde(default)]
    pub deployed_at: Option<String>,
}

impl DeploymentRecord {
    /// ファイルに保存する（整形済み JSON）
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DeployError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// ファイルから読み込む
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DeployError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// ファイルがあれば読み込む
    pub fn load_if_exists(path: impl AsRef<Path>) -> Result<Option<Self>, DeployError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path).map(Some)
        } else {
            Ok(None)
        }
    }
}
