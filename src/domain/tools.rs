use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tool listed for rent by its owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price_per_day: Decimal,
    pub district: Option<String>,
    pub active: bool,
    pub overall_rating: f64,
    pub num_ratings: i32,
    pub created_at: DateTime<Utc>,
}

impl Tool {
    pub fn new(owner_id: Uuid, title: impl Into<String>, price_per_day: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title: title.into(),
            description: None,
            price_per_day,
            district: None,
            active: true,
            overall_rating: 0.0,
            num_ratings: 0,
            created_at: Utc::now(),
        }
    }
}

/// Rating aggregate derived from every tool review.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub overall_rating: f64,
    pub num_ratings: i32,
}

impl RatingSummary {
    pub fn from_ratings<I: IntoIterator<Item = i32>>(ratings: I) -> Self {
        let (sum, count) = ratings
            .into_iter()
            .fold((0i64, 0i32), |(sum, count), r| (sum + r as i64, count + 1));

        let overall_rating = if count == 0 {
            0.0
        } else {
            sum as f64 / count as f64
        };

        Self {
            overall_rating,
            num_ratings: count,
        }
    }
}
