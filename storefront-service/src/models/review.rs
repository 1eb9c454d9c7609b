use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::RatingDistribution;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    #[default]
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vote {
    #[serde(rename = "helpful")]
    Helpful,
    #[serde(rename = "not-helpful")]
    NotHelpful,
}

impl Vote {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "helpful" => Some(Vote::Helpful),
            "not-helpful" => Some(Vote::NotHelpful),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelpfulVote {
    pub clerk_id: String,
    pub vote: Vote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub product: ObjectId,
    pub clerk_id: String,
    pub user_name: String,
    pub rating: u8,
    pub title: String,
    pub comment: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub verified_purchase: bool,
    #[serde(default)]
    pub status: ReviewStatus,
    #[serde(default)]
    pub helpful_votes: Vec<HelpfulVote>,
    #[serde(default)]
    pub helpful: i64,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Review {
    /// Record `clerk_id`'s vote, replacing any earlier one, and return the
    /// net helpful count.
    pub fn cast_vote(&mut self, clerk_id: &str, vote: Vote) -> i64 {
        self.helpful_votes.retain(|v| v.clerk_id != clerk_id);
        self.helpful_votes.push(HelpfulVote {
            clerk_id: clerk_id.to_string(),
            vote,
        });
        self.helpful = self
            .helpful_votes
            .iter()
            .map(|v| match v.vote {
                Vote::Helpful => 1,
                Vote::NotHelpful => -1,
            })
            .sum();
        self.helpful
    }
}

/// Aggregate rating of a product's approved reviews.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub count: u32,
    pub distribution: RatingDistribution,
}

impl RatingSummary {
    pub fn from_ratings(ratings: impl IntoIterator<Item = u8>) -> Self {
        let mut summary = RatingSummary::default();
        let mut sum = 0u32;
        for rating in ratings {
            summary.distribution.record(rating);
            summary.count += 1;
            sum += u32::from(rating);
        }
        if summary.count > 0 {
            let mean = f64::from(sum) / f64::from(summary.count);
            summary.average = (mean * 10.0).round() / 10.0;
        }
        summary
    }
}
