use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::category::{Category, contains_any};
use crate::fingerprint::{bucket, round_to};

/// 地域が指定されなかった場合の既定値
pub const DEFAULT_REGION: &str = "US";

/// ニュース報道のトーン
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
}

/// 市場需要分析の結果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandReport {
    pub demand_score: f64,
    pub current_interest: f64,
    pub momentum: f64,
    pub trending_topics: Vec<String>,
    pub news_volume: u64,
    pub news_sentiment: Sentiment,
    pub category: Category,
    pub region: String,
    pub data_source: String,
    pub analysis_timestamp: String,
}

struct TrendSignal {
    current_interest: f64,
    momentum: f64,
    trending_topics: Vec<String>,
}

struct NewsSignal {
    volume: u64,
    sentiment: Sentiment,
}

/// クエリの市場需要を分析する
///
/// # Arguments
/// * `query` - 分析対象の製品名
/// * `region` - 地域コード（`None` の場合は `US`）
/// * `now` - タイムスタンプとトピック生成に使う現在時刻
pub fn analyze_demand(query: &str, region: Option<&str>, now: DateTime<Utc>) -> DemandReport {
    let category = Category::classify(query);
    let trends = trend_signal(query, category, now);
    let news = news_signal(query);
    let demand_score = demand_score(&trends, &news);

    DemandReport {
        demand_score: round_to(demand_score, 2),
        current_interest: trends.current_interest,
        momentum: trends.momentum,
        trending_topics: trends.trending_topics,
        news_volume: news.volume,
        news_sentiment: news.sentiment,
        category,
        region: region
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(DEFAULT_REGION)
            .to_string(),
        data_source: "enhanced_mock".to_string(),
        analysis_timestamp: now.to_rfc3339(),
    }
}

fn trend_signal(query: &str, category: Category, now: DateTime<Utc>) -> TrendSignal {
    let current_interest = (category.base_interest() + bucket(query, 15)).min(100) as f64;
    let seed = format!("{}{}", query, category.key());
    let momentum = 1.1 + bucket(&seed, 30) as f64 / 100.0;

    let trending_topics = match category {
        Category::SmartTech => vec![
            format!("smart {query} reviews"),
            format!("IoT {query} features"),
            format!("{query} connectivity"),
        ],
        Category::EcoFriendly => vec![
            format!("sustainable {query}"),
            format!("eco-friendly {query}"),
            format!("green {query} options"),
        ],
        Category::HealthFitness => vec![
            format!("{query} health benefits"),
            format!("fitness {query}"),
            format!("{query} wellness"),
        ],
        Category::General => vec![
            format!("{query} reviews"),
            format!("best {query} {}", now.year()),
            format!("{query} comparison"),
        ],
    };

    TrendSignal {
        current_interest,
        momentum: round_to(momentum, 2),
        trending_topics,
    }
}

fn news_signal(query: &str) -> NewsSignal {
    let lower = query.to_lowercase();
    let mut volume = query.chars().count() as u64 * 4;

    let sentiment = if contains_any(&lower, &["smart", "ai", "tech"]) {
        volume += 20;
        Sentiment::Positive
    } else if contains_any(&lower, &["eco", "green", "sustainable"]) {
        volume += 18;
        Sentiment::Positive
    } else if contains_any(&lower, &["health", "fitness"]) {
        volume += 15;
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    };

    NewsSignal {
        volume: volume.min(100),
        sentiment,
    }
}

fn demand_score(trends: &TrendSignal, news: &NewsSignal) -> f64 {
    let momentum_score = trends.momentum * 25.0;
    let news_score = news.volume as f64 * 0.3;
    let sentiment_bonus = match news.sentiment {
        Sentiment::Positive => 10.0,
        Sentiment::Neutral => 0.0,
    };

    let total = trends.current_interest * 0.5 + momentum_score * 0.3 + news_score * 0.2 + sentiment_bonus;
    total.clamp(0.0, 100.0)
}
