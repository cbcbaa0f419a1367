use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::{PricingType, Timestamp};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Disputed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Disputed => "disputed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "in_progress" => Some(BookingStatus::InProgress),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "disputed" => Some(BookingStatus::Disputed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Statuses that hold a slot against availability.
    pub fn is_committed(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::InProgress)
    }

    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::Disputed,
    ];

    /// Requesting the current status is a no-op, not an error.
    pub fn transition(self, requested: BookingStatus) -> Result<BookingStatus, AppError> {
        use BookingStatus::*;

        if self == requested {
            return Ok(self);
        }
        let allowed = match (self, requested) {
            (Pending, Confirmed) => true,
            (Confirmed, InProgress) => true,
            (InProgress, Completed) => true,
            (Disputed, Confirmed | InProgress | Completed) => true,
            (from, Cancelled | Disputed) => !from.is_terminal(),
            _ => false,
        };
        if allowed {
            Ok(requested)
        } else {
            Err(AppError::InvalidTransition {
                from: self.as_str().to_string(),
                to: requested.as_str().to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    DepositPaid,
    FullyPaid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::DepositPaid => "deposit_paid",
            PaymentStatus::FullyPaid => "fully_paid",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentStatus::DepositPaid | PaymentStatus::FullyPaid)
    }

    pub fn transition(self, requested: PaymentStatus) -> Result<PaymentStatus, AppError> {
        use PaymentStatus::*;

        let allowed = self == requested
            || matches!(
                (self, requested),
                (Pending, DepositPaid | FullyPaid)
                    | (DepositPaid, FullyPaid | Refunded)
                    | (FullyPaid, Refunded)
            );
        if allowed {
            Ok(requested)
        } else {
            Err(AppError::InvalidTransition {
                from: self.as_str().to_string(),
                to: requested.as_str().to_string(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CancelledBy {
    Customer,
    Provider,
}

/// Service terms frozen at booking time; later service edits never reach it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDetails {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub pricing_type: PricingType,
    pub agreed_price: f64,
    pub duration: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub service_id: String,
    pub provider_id: String,
    pub customer_id: String,
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: String,
    pub service_details: ServiceDetails,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_requirements: Option<String>,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<CancelledBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
    #[serde(default)]
    pub created_at: Timestamp,
    #[serde(default)]
    pub updated_at: Timestamp,
}

/// What a customer submits; everything else is derived at creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    #[serde(default)]
    pub service_id: String,
    pub provider_id: String,
    pub customer_id: String,
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: String,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub special_requirements: Option<String>,
    #[serde(default)]
    pub customer_notes: Option<String>,
    /// Price quoted for custom-priced or provider-only work.
    #[serde(default)]
    pub quoted_price: Option<f64>,
    /// Description of provider-only work when no service is referenced.
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use BookingStatus::*;

    #[test]
    fn test_happy_path_transitions() {
        assert_eq!(Pending.transition(Confirmed).unwrap(), Confirmed);
        assert_eq!(Confirmed.transition(InProgress).unwrap(), InProgress);
        assert_eq!(InProgress.transition(Completed).unwrap(), Completed);
    }

    #[test]
    fn test_cancel_and_dispute_from_non_terminal() {
        for from in [Pending, Confirmed, InProgress, Disputed] {
            assert_eq!(from.transition(Cancelled).unwrap(), Cancelled);
        }
        for from in [Pending, Confirmed, InProgress] {
            assert_eq!(from.transition(Disputed).unwrap(), Disputed);
        }
    }

    #[test]
    fn test_terminal_states_reject_moves() {
        assert!(matches!(
            Completed.transition(Pending),
            Err(AppError::InvalidTransition { .. })
        ));
        assert!(Cancelled.transition(Confirmed).is_err());
        assert!(Completed.transition(Disputed).is_err());
        assert!(Cancelled.transition(Cancelled).is_ok());
    }

    #[test]
    fn test_no_skipping_or_going_back() {
        assert!(Pending.transition(Completed).is_err());
        assert!(Confirmed.transition(Pending).is_err());
        assert!(InProgress.transition(Confirmed).is_err());
    }

    #[test]
    fn test_disputed_resolves_forward() {
        assert!(Disputed.transition(Completed).is_ok());
        assert!(Disputed.transition(Pending).is_err());
    }

    #[test]
    fn test_payment_transitions() {
        use PaymentStatus as P;
        assert!(P::Pending.transition(P::DepositPaid).is_ok());
        assert!(P::DepositPaid.transition(P::FullyPaid).is_ok());
        assert!(P::FullyPaid.transition(P::Refunded).is_ok());
        assert!(P::DepositPaid.transition(P::Refunded).is_ok());
        assert!(P::Pending.transition(P::Refunded).is_err());
        assert!(P::Refunded.transition(P::FullyPaid).is_err());
        assert!(P::FullyPaid.transition(P::FullyPaid).is_ok());
    }

    #[test]
    fn test_only_confirmed_and_in_progress_are_committed() {
        let committed: Vec<BookingStatus> =
            BookingStatus::ALL.into_iter().filter(|s| s.is_committed()).collect();
        assert_eq!(committed, vec![Confirmed, InProgress]);
    }

    #[test]
    fn test_status_round_trip_names() {
        for status in BookingStatus::ALL {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::Value::String(status.as_str().to_string())
            );
        }
        assert_eq!(BookingStatus::parse("archived"), None);
    }
}
