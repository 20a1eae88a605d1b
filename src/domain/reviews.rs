use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::bookings::Booking;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewType {
    RenterToTool,
    RenterToOwner,
    OwnerToRenter,
}

impl ReviewType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RenterToTool => "RENTER_TO_TOOL",
            Self::RenterToOwner => "RENTER_TO_OWNER",
            Self::OwnerToRenter => "OWNER_TO_RENTER",
        }
    }

    /// Where the rating of this review type lands for a given booking.
    pub fn target_for(&self, booking: &Booking) -> ReviewTarget {
        match self {
            Self::RenterToTool => ReviewTarget::Tool(booking.tool_id),
            Self::RenterToOwner => ReviewTarget::User(booking.owner_id),
            Self::OwnerToRenter => ReviewTarget::User(booking.renter_id),
        }
    }

    /// Resolve the review type from the reviewer's side of the booking.
    ///
    /// Owners always review the renter. Renters review the owner unless they
    /// explicitly ask to review the tool.
    pub fn infer(
        booking: &Booking,
        reviewer_id: Uuid,
        requested: Option<ReviewType>,
    ) -> ApiResult<ReviewType> {
        let inferred = if reviewer_id == booking.owner_id {
            match requested {
                None | Some(Self::OwnerToRenter) => Self::OwnerToRenter,
                Some(other) => {
                    return Err(ApiError::forbidden(format!(
                        "The owner cannot leave a {} review",
                        other
                    )))
                }
            }
        } else if reviewer_id == booking.renter_id {
            match requested {
                Some(Self::RenterToTool) => Self::RenterToTool,
                None | Some(Self::RenterToOwner) => Self::RenterToOwner,
                Some(other) => {
                    return Err(ApiError::forbidden(format!(
                        "The renter cannot leave a {} review",
                        other
                    )))
                }
            }
        } else {
            return Err(ApiError::forbidden(
                "Only the renter or the owner can review this booking",
            ));
        };

        Ok(inferred)
    }
}

impl std::fmt::Display for ReviewType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ReviewType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "RENTER_TO_TOOL" => Self::RenterToTool,
            "OWNER_TO_RENTER" => Self::OwnerToRenter,
            _ => Self::RenterToOwner,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ReviewTarget {
    Tool(Uuid),
    User(Uuid),
}

impl ReviewTarget {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::User(id) => Some(*id),
            Self::Tool(_) => None,
        }
    }

    pub fn tool_id(&self) -> Option<Uuid> {
        match self {
            Self::Tool(id) => Some(*id),
            Self::User(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub reviewer_id: Uuid,
    pub review_type: ReviewType,
    pub target: ReviewTarget,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn validate_rating(rating: i32) -> ApiResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(ApiError::InvalidRating(rating));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub booking_id: Uuid,
    pub reviewer_id: Uuid,
    pub rating: i32,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub review_type: Option<ReviewType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateReviewRequest {
    pub reviewer_id: Uuid,
    pub rating: i32,
    #[serde(default)]
    pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tools::Tool;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn completed_booking() -> Booking {
        let tool = Tool::new(Uuid::new_v4(), "Ladder", Decimal::from(8));
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        Booking::new_pending(&tool, Uuid::new_v4(), day, day, Decimal::from(8), Utc::now())
    }

    #[test]
    fn test_type_inference() {
        let b = completed_booking();

        assert_eq!(
            ReviewType::infer(&b, b.owner_id, None).unwrap(),
            ReviewType::OwnerToRenter
        );
        assert_eq!(
            ReviewType::infer(&b, b.renter_id, None).unwrap(),
            ReviewType::RenterToOwner
        );
        assert_eq!(
            ReviewType::infer(&b, b.renter_id, Some(ReviewType::RenterToTool)).unwrap(),
            ReviewType::RenterToTool
        );
        assert!(matches!(
            ReviewType::infer(&b, b.owner_id, Some(ReviewType::RenterToTool)),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            ReviewType::infer(&b, Uuid::new_v4(), None),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_targets() {
        let b = completed_booking();
        assert_eq!(
            ReviewType::RenterToTool.target_for(&b),
            ReviewTarget::Tool(b.tool_id)
        );
        assert_eq!(
            ReviewType::RenterToOwner.target_for(&b),
            ReviewTarget::User(b.owner_id)
        );
        assert_eq!(
            ReviewType::OwnerToRenter.target_for(&b),
            ReviewTarget::User(b.renter_id)
        );
    }

    #[test]
    fn test_rating_bounds() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(matches!(validate_rating(0), Err(ApiError::InvalidRating(0))));
        assert!(matches!(validate_rating(6), Err(ApiError::InvalidRating(6))));
    }
}
