pub mod action_groups;
pub mod agent;
pub mod client;
pub mod config;
pub mod functions;
pub mod iam;
pub mod inspect;
pub mod invoke;
pub mod pipeline;
pub mod policy;
pub mod record;

pub use action_groups::{ActionGroupBinding, find_duplicate_bindings};
pub use agent::{AliasRef, TEST_ALIAS_ID};
pub use client::{DeployClient, DeployError};
pub use config::DeployConfig;
pub use inspect::{AgentDetails, LogLine, ModelAccess};
pub use invoke::{AgentSession, AnalysisCoverage, chunk_text, detect_analyses};
pub use record::DeploymentRecord;

// ストリーム処理で使う型を再エクスポート
pub use aws_sdk_bedrockagentruntime::types::ResponseStream;
