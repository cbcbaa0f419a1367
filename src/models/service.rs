use serde::{Deserialize, Serialize};

use crate::models::Timestamp;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PricingType {
    Fixed,
    Hourly,
    Custom,
}

impl PricingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingType::Fixed => "fixed",
            PricingType::Hourly => "hourly",
            PricingType::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default)]
    pub id: String,
    pub provider_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub pricing_type: PricingType,
    #[serde(default)]
    pub base_price: Option<f64>,
    #[serde(default)]
    pub hourly_rate: Option<f64>,
    /// Minutes.
    pub duration: u32,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub booking_requires_approval: bool,
    #[serde(default)]
    pub deposit_required: bool,
    #[serde(default)]
    pub deposit_amount: Option<f64>,
    #[serde(default)]
    pub service_areas: Vec<String>,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Timestamp,
}

impl Service {
    /// Price agreed at booking time. Custom pricing takes the quote, if any.
    pub fn agreed_price(&self, quoted: Option<f64>) -> f64 {
        match self.pricing_type {
            PricingType::Fixed => self.base_price.unwrap_or(0.0),
            PricingType::Hourly => {
                self.hourly_rate.unwrap_or(0.0) * f64::from(self.duration) / 60.0
            }
            PricingType::Custom => quoted.unwrap_or(0.0),
        }
    }

    pub fn deposit(&self) -> Option<f64> {
        if self.deposit_required {
            self.deposit_amount
        } else {
            None
        }
    }
}
