//! Line item and result document models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use olp_common::{Error, Result};

/// Collection name for line item documents
pub const LINE_ITEMS: &str = "line_items";

/// Collection name for result documents
pub const RESULTS: &str = "results";

/// A gradable column: one assignment within a course context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub uuid: Uuid,
    /// Course or section the item belongs to
    pub context_id: String,
    /// Tool-side link the item grades
    pub resource_link_id: String,
    pub label: String,
    pub score_maximum: f64,
    pub start_date_time: Option<DateTime<Utc>>,
    pub end_date_time: Option<DateTime<Utc>>,
}

/// One user's latest result for a line item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub uuid: Uuid,
    pub line_item_uuid: Uuid,
    pub user_id: String,
    /// Raw score as submitted
    pub score_given: f64,
    /// Scale the score was submitted on
    pub score_maximum: f64,
    /// score_given rescaled to the line item's score_maximum
    pub result_score: f64,
    pub activity_progress: String,
    pub grading_progress: String,
}

pub fn validate_score_maximum(score_maximum: f64) -> Result<()> {
    if !score_maximum.is_finite() || score_maximum <= 0.0 {
        return Err(Error::Validation(format!(
            "score_maximum must be a positive number, got {}",
            score_maximum
        )));
    }
    Ok(())
}

/// Range-check a submitted score and rescale it to the line item's maximum
pub fn scale_score(score_given: f64, score_maximum: f64, item_maximum: f64) -> Result<f64> {
    validate_score_maximum(score_maximum)?;
    if !score_given.is_finite() || score_given < 0.0 {
        return Err(Error::Validation(format!(
            "score_given must be non-negative, got {}",
            score_given
        )));
    }
    if score_given > score_maximum {
        return Err(Error::Validation(format!(
            "score_given {} exceeds score_maximum {}",
            score_given, score_maximum
        )));
    }

    Ok(score_given / score_maximum * item_maximum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_identity_when_maxima_match() {
        assert_eq!(scale_score(7.0, 10.0, 10.0).unwrap(), 7.0);
    }

    #[test]
    fn test_scale_rescales_to_item_maximum() {
        assert_eq!(scale_score(50.0, 100.0, 10.0).unwrap(), 5.0);
        assert_eq!(scale_score(3.0, 4.0, 100.0).unwrap(), 75.0);
    }

    #[test]
    fn test_negative_score_rejected() {
        assert!(scale_score(-1.0, 10.0, 10.0).is_err());
    }

    #[test]
    fn test_score_above_maximum_rejected() {
        assert!(scale_score(11.0, 10.0, 10.0).is_err());
    }

    #[test]
    fn test_bad_maximum_rejected() {
        assert!(validate_score_maximum(0.0).is_err());
        assert!(validate_score_maximum(-5.0).is_err());
        assert!(validate_score_maximum(f64::NAN).is_err());
        assert!(validate_score_maximum(10.0).is_ok());
    }
}
