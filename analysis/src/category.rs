use serde::{Deserialize, Serialize};

/// クエリのキーワードから推定する製品カテゴリ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    SmartTech,
    EcoFriendly,
    HealthFitness,
    General,
}

const SMART_KEYWORDS: &[&str] = &["smart", "ai", "iot"];
const ECO_KEYWORDS: &[&str] = &["eco", "green", "sustainable"];
const HEALTH_KEYWORDS: &[&str] = &["fitness", "health", "wellness"];

impl Category {
    /// クエリを分類する（大文字小文字は区別しない、最初に一致したカテゴリを採用）
    pub fn classify(query: &str) -> Self {
        let lower = query.to_lowercase();
        if contains_any(&lower, SMART_KEYWORDS) {
            Category::SmartTech
        } else if contains_any(&lower, ECO_KEYWORDS) {
            Category::EcoFriendly
        } else if contains_any(&lower, HEALTH_KEYWORDS) {
            Category::HealthFitness
        } else {
            Category::General
        }
    }

    /// ハッシュの種に使うカテゴリキー
    pub fn key(&self) -> &'static str {
        match self {
            Category::SmartTech => "smart_tech",
            Category::EcoFriendly => "eco_friendly",
            Category::HealthFitness => "health_fitness",
            Category::General => "general",
        }
    }

    /// カテゴリごとの基準関心度
    pub fn base_interest(&self) -> u64 {
        match self {
            Category::SmartTech => 85,
            Category::EcoFriendly => 78,
            Category::HealthFitness => 82,
            Category::General => 65,
        }
    }
}

/// 小文字化済みの `haystack` がいずれかのキーワードを含むか
///
/// 部分一致なので "ai" は "chair" にも一致する。
pub fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| haystack.contains(keyword))
}
