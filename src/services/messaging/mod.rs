pub mod twilio;

use async_trait::async_trait;

use crate::models::{Booking, BookingStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    BookingRequested,
    BookingConfirmed,
    RefundInfo,
}

/// A message for the customer on a booking, addressed from its contact snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerNotice {
    pub kind: NoticeKind,
    pub booking_id: String,
    pub phone: String,
    pub body: String,
}

impl CustomerNotice {
    pub fn for_new_booking(booking: &Booking) -> Self {
        let (kind, body) = if booking.status == BookingStatus::Pending {
            (
                NoticeKind::BookingRequested,
                format!(
                    "Hi {}, your request for {} on {} at {} was received. The provider will confirm it shortly.",
                    booking.customer_name,
                    booking.service_details.name,
                    booking.scheduled_date,
                    booking.scheduled_time
                ),
            )
        } else {
            (
                NoticeKind::BookingConfirmed,
                format!(
                    "Hi {}, your booking for {} on {} at {} is confirmed.",
                    booking.customer_name,
                    booking.service_details.name,
                    booking.scheduled_date,
                    booking.scheduled_time
                ),
            )
        };
        Self {
            kind,
            booking_id: booking.id.clone(),
            phone: booking.customer_phone.clone(),
            body,
        }
    }

    pub fn refund_info(booking: &Booking) -> Self {
        let paid = booking
            .deposit_amount
            .filter(|_| !matches!(booking.payment_status, crate::models::PaymentStatus::FullyPaid))
            .unwrap_or(booking.total_amount);
        Self {
            kind: NoticeKind::RefundInfo,
            booking_id: booking.id.clone(),
            phone: booking.customer_phone.clone(),
            body: format!(
                "Your booking for {} on {} was cancelled. A refund of {:.2} will be issued to your original payment method within 5-10 business days.",
                booking.service_details.name, booking.scheduled_date, paid
            ),
        }
    }
}

#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send(&self, notice: &CustomerNotice) -> anyhow::Result<()>;
}

/// Used when no SMS gateway is configured; notices only reach the log.
pub struct LogOnlyMessaging;

#[async_trait]
impl MessagingProvider for LogOnlyMessaging {
    async fn send(&self, notice: &CustomerNotice) -> anyhow::Result<()> {
        tracing::info!(
            booking_id = %notice.booking_id,
            kind = ?notice.kind,
            body = %notice.body,
            "customer notice (no SMS gateway configured)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentStatus, PricingType, ServiceDetails, Timestamp};
    use chrono::NaiveDate;

    fn booking(status: BookingStatus, payment: PaymentStatus) -> Booking {
        Booking {
            id: "bk-1".to_string(),
            service_id: "svc-1".to_string(),
            provider_id: "prov-1".to_string(),
            customer_id: "cust-1".to_string(),
            customer_name: "Alice".to_string(),
            customer_email: "alice@example.com".to_string(),
            customer_phone: "+15551110000".to_string(),
            service_details: ServiceDetails {
                name: "Leak repair".to_string(),
                description: String::new(),
                pricing_type: PricingType::Fixed,
                agreed_price: 80.0,
                duration: 60,
            },
            scheduled_date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            scheduled_time: "10:00".to_string(),
            address: "1 Main St".to_string(),
            special_requirements: None,
            status,
            payment_status: payment,
            total_amount: 80.0,
            deposit_amount: Some(20.0),
            payment_id: None,
            provider_notes: None,
            customer_notes: None,
            cancellation_reason: None,
            cancelled_by: None,
            rating: None,
            review: None,
            created_at: Timestamp::EPOCH,
            updated_at: Timestamp::EPOCH,
        }
    }

    #[test]
    fn test_new_booking_notice_follows_status() {
        let pending = CustomerNotice::for_new_booking(&booking(BookingStatus::Pending, PaymentStatus::Pending));
        assert_eq!(pending.kind, NoticeKind::BookingRequested);
        assert!(pending.body.contains("was received"));

        let confirmed = CustomerNotice::for_new_booking(&booking(BookingStatus::Confirmed, PaymentStatus::Pending));
        assert_eq!(confirmed.kind, NoticeKind::BookingConfirmed);
        assert!(confirmed.body.contains("2025-06-16 at 10:00 is confirmed"));
        assert_eq!(confirmed.phone, "+15551110000");
    }

    #[test]
    fn test_refund_amount_matches_what_was_paid() {
        let deposit = CustomerNotice::refund_info(&booking(BookingStatus::Cancelled, PaymentStatus::DepositPaid));
        assert!(deposit.body.contains("refund of 20.00"));

        let full = CustomerNotice::refund_info(&booking(BookingStatus::Cancelled, PaymentStatus::FullyPaid));
        assert!(full.body.contains("refund of 80.00"));
    }
}
