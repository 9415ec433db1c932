use serde::{Deserialize, Serialize};

use crate::fingerprint::{bucket, round_to};

/// 価格帯
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// 市場の飽和度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Saturation {
    High,
    Medium,
    Low,
}

impl Saturation {
    fn from_product_count(total: u64) -> (Self, f64) {
        if total > 700 {
            (Saturation::High, 30.0)
        } else if total > 400 {
            (Saturation::Medium, 20.0)
        } else {
            (Saturation::Low, 10.0)
        }
    }
}

/// 競合分析の結果（スコアは高いほど競争が激しい）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionReport {
    pub competition_score: f64,
    pub total_products: u64,
    pub avg_rating: f64,
    pub price_range: PriceRange,
    pub top_competitors: Vec<String>,
    pub market_saturation: Saturation,
    pub feature_gaps: Vec<String>,
    pub category: String,
    pub data_source: String,
    pub platforms_analyzed: Vec<String>,
}

/// 1つのマーケットプレイスから見た疑似的な出品状況
#[derive(Debug, Clone)]
struct MarketplaceListing {
    product_count: u64,
    avg_rating: f64,
    price_range: PriceRange,
    top_brands: Vec<String>,
}

const PLATFORMS: [&str; 2] = ["amazon", "ebay"];

/// クエリの競合状況を分析する
///
/// # Arguments
/// * `query` - 分析対象の製品名
/// * `category` - 呼び出し元が指定したカテゴリ（レポートにそのまま載る）
pub fn analyze_competition(query: &str, category: Option<&str>) -> CompetitionReport {
    let primary = primary_marketplace(query);
    let secondary = secondary_marketplace(query);

    let total_products = primary.product_count + secondary.product_count;
    let avg_rating = (primary.avg_rating * primary.product_count as f64
        + secondary.avg_rating * secondary.product_count as f64)
        / total_products as f64;

    let density_score = (total_products as f64 / 15.0).min(50.0);
    let rating_score = ((avg_rating - 3.0) * 12.0).max(0.0);
    let (market_saturation, saturation_score) = Saturation::from_product_count(total_products);
    let competition_score = (density_score + rating_score + saturation_score).min(100.0);

    CompetitionReport {
        competition_score: round_to(competition_score, 2),
        total_products,
        avg_rating: round_to(avg_rating, 1),
        price_range: PriceRange {
            min: primary.price_range.min.min(secondary.price_range.min),
            max: primary.price_range.max.max(secondary.price_range.max),
            avg: round_to((primary.price_range.avg + secondary.price_range.avg) / 2.0, 2),
        },
        top_competitors: primary.top_brands.into_iter().take(4).collect(),
        market_saturation,
        feature_gaps: feature_gaps(query, avg_rating),
        category: category
            .filter(|c| !c.trim().is_empty())
            .unwrap_or("general")
            .to_string(),
        data_source: "enhanced_multi_platform".to_string(),
        platforms_analyzed: PLATFORMS.iter().map(|p| p.to_string()).collect(),
    }
}

fn primary_marketplace(query: &str) -> MarketplaceListing {
    let product_count = bucket(&format!("{query}amazon"), 600) + 150;
    let avg_rating = 3.8 + bucket(query, 12) as f64 / 10.0;
    let base_price = (25 + bucket(query, 120)) as f64;

    MarketplaceListing {
        product_count,
        avg_rating: round_to(avg_rating, 1),
        price_range: PriceRange {
            min: base_price,
            max: base_price * 3.0,
            avg: base_price * 1.8,
        },
        top_brands: (1..=5).map(|i| format!("Brand{i}")).collect(),
    }
}

fn secondary_marketplace(query: &str) -> MarketplaceListing {
    let seed = format!("{query}ebay");
    let product_count = bucket(&seed, 400) + 80;
    let avg_rating = 3.6 + bucket(&seed, 14) as f64 / 10.0;
    let base_price = (20 + bucket(&seed, 100)) as f64;

    MarketplaceListing {
        product_count,
        avg_rating: round_to(avg_rating, 1),
        price_range: PriceRange {
            min: base_price,
            max: base_price * 2.5,
            avg: base_price * 1.5,
        },
        top_brands: Vec::new(),
    }
}

fn feature_gaps(query: &str, avg_rating: f64) -> Vec<String> {
    let lower = query.to_lowercase();
    let mut gaps: Vec<&str> = if lower.contains("smart") {
        vec!["Advanced AI features", "Better connectivity", "Longer battery life"]
    } else if lower.contains("fitness") {
        vec!["More accurate sensors", "Better app integration", "Waterproof design"]
    } else if lower.contains("eco") {
        vec!["Sustainable materials", "Carbon neutral shipping", "Recyclable packaging"]
    } else {
        vec!["Premium quality", "Better design", "Competitive pricing"]
    };

    if avg_rating < 4.0 {
        gaps.push("Quality improvement");
    }
    gaps.into_iter().take(4).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_counts_within_marketplace_ranges() {
        let report = analyze_competition("yoga mat", None);
        assert!(report.total_products >= 230);
        assert!(report.total_products <= 1228);
        assert_eq!(report.platforms_analyzed, vec!["amazon", "ebay"]);
    }

    #[test]
    fn test_saturation_thresholds() {
        assert_eq!(Saturation::from_product_count(701).0, Saturation::High);
        assert_eq!(Saturation::from_product_count(700).0, Saturation::Medium);
        assert_eq!(Saturation::from_product_count(401).0, Saturation::Medium);
        assert_eq!(Saturation::from_product_count(400).0, Saturation::Low);
    }

    #[test]
    fn test_feature_gaps_follow_keywords() {
        let gaps = feature_gaps("Smart Lamp", 4.5);
        assert_eq!(gaps[0], "Advanced AI features");
        assert_eq!(gaps.len(), 3);

        let gaps = feature_gaps("eco straw", 3.9);
        assert_eq!(gaps.len(), 4);
        assert_eq!(gaps[3], "Quality improvement");
    }

    #[test]
    fn test_price_range_is_consistent() {
        let report = analyze_competition("desk lamp", Some("home"));
        assert!(report.price_range.min <= report.price_range.avg);
        assert!(report.price_range.avg <= report.price_range.max);
        assert_eq!(report.category, "home");
        assert_eq!(report.top_competitors.len(), 4);
    }

    #[test]
    fn test_score_bounded() {
        for query in ["", "smart ring", "fitness mat", "eco cup", "x"] {
            let report = analyze_competition(query, None);
            assert!((0.0..=100.0).contains(&report.competition_score));
            assert!(report.avg_rating >= 3.6 && report.avg_rating <= 5.1);
        }
    }
}
