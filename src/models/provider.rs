use serde::{Deserialize, Serialize};

use crate::models::{AvailabilityProfile, Timestamp};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    #[serde(default)]
    pub id: String,
    pub user_id: String,
    pub business_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub category: String,
    #[serde(default)]
    pub service_areas: Vec<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub total_bookings: u32,
    #[serde(default)]
    pub availability: Option<AvailabilityProfile>,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Timestamp,
}

impl Provider {
    pub fn is_bookable(&self) -> bool {
        self.is_active && self.is_approved
    }

    pub fn availability_profile(&self) -> AvailabilityProfile {
        self.availability.clone().unwrap_or_default()
    }

    /// Running average after one more review.
    pub fn rating_with(&self, stars: u8) -> f64 {
        let total = self.rating * f64::from(self.review_count) + f64::from(stars);
        total / f64::from(self.review_count + 1)
    }
}
