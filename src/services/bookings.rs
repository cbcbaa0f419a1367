use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};

use crate::db::{strip_managed, Collection, EntityStore, Filter, ListQuery};
use crate::errors::AppError;
use crate::models::{
    Booking, BookingDraft, BookingStatus, CancelledBy, PaymentStatus, PricingType, Provider, ServiceDetails,
    TimeOfDay,
};
use crate::services::directory::{validate_id, Directory};
use crate::services::messaging::{CustomerNotice, MessagingProvider};
use crate::services::scheduling::CommittedTimes;

const PROVIDER_ONLY_SERVICE_NAME: &str = "Custom request";

/// Creates bookings and moves them through their status and payment states.
pub struct BookingManager {
    store: Arc<dyn EntityStore>,
    directory: Arc<Directory>,
    messaging: Arc<dyn MessagingProvider>,
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(format!("{field} is required")));
    }
    Ok(trimmed)
}

impl BookingManager {
    pub fn new(
        store: Arc<dyn EntityStore>,
        directory: Arc<Directory>,
        messaging: Arc<dyn MessagingProvider>,
    ) -> Self {
        Self {
            store,
            directory,
            messaging,
        }
    }

    pub async fn create_booking(&self, draft: BookingDraft) -> Result<String, AppError> {
        validate_id(&draft.provider_id)?;
        validate_id(&draft.customer_id)?;
        let customer_name = required(&draft.customer_name, "customerName")?.to_string();
        if draft.customer_email.trim().is_empty() && draft.customer_phone.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "customerEmail or customerPhone is required".to_string(),
            ));
        }
        let scheduled_date = draft
            .scheduled_date
            .ok_or_else(|| AppError::InvalidInput("scheduledDate is required".to_string()))?;
        let scheduled_time: TimeOfDay = required(draft.scheduled_time.as_deref().unwrap_or(""), "scheduledTime")?
            .parse()
            .map_err(AppError::InvalidInput)?;

        let provider = self.directory.get_provider(&draft.provider_id, None).await?;
        if !provider.is_bookable() {
            return Err(AppError::InvalidInput(format!(
                "provider {} is not accepting bookings",
                provider.id
            )));
        }

        let (service_details, status, deposit_amount) = if draft.service_id.trim().is_empty() {
            let details = ServiceDetails {
                name: PROVIDER_ONLY_SERVICE_NAME.to_string(),
                description: draft.description.clone().unwrap_or_default(),
                pricing_type: PricingType::Custom,
                agreed_price: draft.quoted_price.unwrap_or(0.0),
                duration: provider.availability_profile().slot_duration,
            };
            (details, BookingStatus::Pending, None)
        } else {
            let service = self.directory.get_service(&draft.service_id, None).await?;
            if service.provider_id != provider.id {
                return Err(AppError::InvalidInput(format!(
                    "service {} is not offered by provider {}",
                    service.id, provider.id
                )));
            }
            if !service.is_active {
                return Err(AppError::InvalidInput(format!("service {} is not active", service.id)));
            }
            let status = if service.booking_requires_approval {
                BookingStatus::Pending
            } else {
                BookingStatus::Confirmed
            };
            let details = ServiceDetails {
                name: service.name.clone(),
                description: service.description.clone(),
                pricing_type: service.pricing_type,
                agreed_price: service.agreed_price(draft.quoted_price),
                duration: service.duration,
            };
            (details, status, service.deposit())
        };

        let mut booking = Booking {
            id: String::new(),
            service_id: draft.service_id.trim().to_string(),
            provider_id: provider.id.clone(),
            customer_id: draft.customer_id,
            customer_name,
            customer_email: draft.customer_email,
            customer_phone: draft.customer_phone,
            total_amount: service_details.agreed_price,
            service_details,
            scheduled_date,
            scheduled_time: scheduled_time.to_string(),
            address: draft.address,
            special_requirements: draft.special_requirements,
            status,
            payment_status: PaymentStatus::Pending,
            deposit_amount,
            payment_id: None,
            provider_notes: None,
            customer_notes: draft.customer_notes,
            cancellation_reason: None,
            cancelled_by: None,
            rating: None,
            review: None,
            created_at: Default::default(),
            updated_at: Default::default(),
        };

        let doc = serde_json::to_value(&booking)
            .map_err(|e| AppError::InvalidInput(format!("unencodable booking: {e}")))?;
        let id = self.store.create(Collection::Bookings, strip_managed(doc)).await?;
        booking.id = id.clone();

        tracing::info!(
            booking_id = %id,
            provider_id = %booking.provider_id,
            status = booking.status.as_str(),
            date = %booking.scheduled_date,
            time = %booking.scheduled_time,
            "booking created"
        );

        self.bump_provider(&booking.provider_id, |provider| {
            json!({ "totalBookings": provider.total_bookings + 1 })
        })
        .await;
        self.notify(CustomerNotice::for_new_booking(&booking)).await;

        Ok(id)
    }

    pub async fn get_booking(&self, id: &str) -> Result<Booking, AppError> {
        validate_id(id)?;
        let doc = self
            .store
            .get(Collection::Bookings, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;
        Ok(doc.decode(Collection::Bookings)?)
    }

    pub async fn update_status(
        &self,
        id: &str,
        requested: BookingStatus,
        notes: Option<String>,
    ) -> Result<BookingStatus, AppError> {
        // Status changes come from the provider side; cancelling follows the cancel rules.
        if requested == BookingStatus::Cancelled {
            self.cancel_booking(id, notes, CancelledBy::Provider).await?;
            return Ok(BookingStatus::Cancelled);
        }

        let booking = self.get_booking(id).await?;
        let next = booking.status.transition(requested)?;
        if next == booking.status && notes.is_none() {
            return Ok(next);
        }

        let mut patch = json!({ "status": next.as_str() });
        if let Some(notes) = notes {
            patch["providerNotes"] = Value::String(notes);
        }
        self.store.update(Collection::Bookings, id, patch).await?;
        tracing::info!(
            booking_id = id,
            from = booking.status.as_str(),
            to = next.as_str(),
            "booking status updated"
        );
        Ok(next)
    }

    /// Cancels a pending or confirmed booking. Cancelling twice is a no-op.
    pub async fn cancel_booking(
        &self,
        id: &str,
        reason: Option<String>,
        cancelled_by: CancelledBy,
    ) -> Result<(), AppError> {
        let mut booking = self.get_booking(id).await?;
        match booking.status {
            BookingStatus::Cancelled => return Ok(()),
            BookingStatus::Pending | BookingStatus::Confirmed => {}
            other => {
                return Err(AppError::InvalidTransition {
                    from: other.as_str().to_string(),
                    to: BookingStatus::Cancelled.as_str().to_string(),
                })
            }
        }

        let mut patch = json!({
            "status": BookingStatus::Cancelled.as_str(),
            "cancelledBy": cancelled_by,
        });
        if let Some(reason) = &reason {
            patch["cancellationReason"] = Value::String(reason.clone());
        }
        self.store.update(Collection::Bookings, id, patch).await?;
        tracing::info!(booking_id = id, cancelled_by = ?cancelled_by, "booking cancelled");

        if booking.payment_status.is_paid() {
            booking.status = BookingStatus::Cancelled;
            booking.cancellation_reason = reason;
            booking.cancelled_by = Some(cancelled_by);
            self.notify(CustomerNotice::refund_info(&booking)).await;
        }
        Ok(())
    }

    pub async fn update_payment(
        &self,
        id: &str,
        requested: PaymentStatus,
        payment_id: Option<String>,
    ) -> Result<PaymentStatus, AppError> {
        let booking = self.get_booking(id).await?;
        let next = booking.payment_status.transition(requested)?;

        let mut patch = json!({ "paymentStatus": next.as_str() });
        if let Some(payment_id) = payment_id {
            patch["paymentId"] = Value::String(payment_id);
        }
        self.store.update(Collection::Bookings, id, patch).await?;
        tracing::info!(booking_id = id, payment_status = next.as_str(), "booking payment updated");
        Ok(next)
    }

    pub async fn add_review(&self, id: &str, rating: u8, review: String) -> Result<(), AppError> {
        if !(1..=5).contains(&rating) {
            return Err(AppError::InvalidInput(format!("rating must be 1-5, got {rating}")));
        }
        let booking = self.get_booking(id).await?;
        if booking.status != BookingStatus::Completed {
            return Err(AppError::InvalidInput(format!(
                "booking {id} is {}, only completed bookings can be reviewed",
                booking.status.as_str()
            )));
        }
        if booking.rating.is_some() {
            return Err(AppError::InvalidInput(format!("booking {id} already has a review")));
        }

        self.store
            .update(Collection::Bookings, id, json!({ "rating": rating, "review": review }))
            .await?;
        tracing::info!(booking_id = id, rating, "review added");

        self.bump_provider(&booking.provider_id, |provider| {
            json!({
                "rating": provider.rating_with(rating),
                "reviewCount": provider.review_count + 1,
            })
        })
        .await;
        Ok(())
    }

    /// Hard delete, for administrative cleanup only.
    pub async fn purge_booking(&self, id: &str) -> Result<(), AppError> {
        validate_id(id)?;
        self.store.delete(Collection::Bookings, id).await?;
        tracing::warn!(booking_id = id, "booking purged");
        Ok(())
    }

    pub async fn customer_bookings(&self, customer_id: &str) -> Vec<Booking> {
        self.list(ListQuery::new(
            Collection::Bookings,
            vec![Filter::eq("customerId", customer_id)],
        ))
        .await
    }

    pub async fn provider_bookings(&self, provider_id: &str) -> Vec<Booking> {
        self.list(ListQuery::new(
            Collection::Bookings,
            vec![Filter::eq("providerId", provider_id)],
        ))
        .await
    }

    pub async fn bookings_by_status(&self, status: BookingStatus, limit: Option<usize>) -> Vec<Booking> {
        let mut query = ListQuery::new(Collection::Bookings, vec![Filter::eq("status", status.as_str())]);
        query.limit = limit;
        self.list(query).await
    }

    pub async fn recent_bookings(&self, limit: usize) -> Vec<Booking> {
        self.list(ListQuery::new(Collection::Bookings, Vec::new()).limit(limit))
            .await
    }

    /// List reads degrade to an empty list on failure.
    async fn list(&self, query: ListQuery) -> Vec<Booking> {
        let docs = match query.execute(self.store.as_ref()).await {
            Ok(docs) => docs,
            Err(e) => {
                tracing::error!(filters = ?query.filters, error = %e, "failed to list bookings");
                return Vec::new();
            }
        };
        docs.into_iter()
            .filter_map(|doc| match doc.decode::<Booking>(Collection::Bookings) {
                Ok(booking) => Some(booking),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable booking");
                    None
                }
            })
            .collect()
    }

    /// Read-modify-write on the provider document. There is no transaction
    /// across documents, so failures only log.
    async fn bump_provider<F>(&self, provider_id: &str, patch: F)
    where
        F: FnOnce(&Provider) -> Value,
    {
        let result: Result<(), AppError> = async {
            let doc = self
                .store
                .get(Collection::Providers, provider_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("provider {provider_id}")))?;
            let provider: Provider = doc.decode(Collection::Providers)?;
            self.store
                .update(Collection::Providers, provider_id, patch(&provider))
                .await?;
            Ok(())
        }
        .await;

        match result {
            Ok(()) => self.directory.forget_provider(provider_id),
            Err(e) => tracing::warn!(provider_id, error = %e, "failed to update provider counters"),
        }
    }

    async fn notify(&self, notice: CustomerNotice) {
        if let Err(e) = self.messaging.send(&notice).await {
            tracing::warn!(booking_id = %notice.booking_id, kind = ?notice.kind, error = %e, "failed to send customer notice");
        }
    }
}

#[async_trait]
impl CommittedTimes for BookingManager {
    async fn committed_times(&self, provider_id: &str, date: NaiveDate) -> Result<HashSet<TimeOfDay>, AppError> {
        let statuses = BookingStatus::ALL
            .iter()
            .filter(|s| s.is_committed())
            .map(|s| Value::from(s.as_str()))
            .collect();
        let filters = [
            Filter::eq("providerId", provider_id),
            Filter::eq("scheduledDate", date.to_string()),
            Filter::any_of("status", statuses),
        ];
        let docs = self
            .store
            .query(Collection::Bookings, &filters, None, None)
            .await?;

        Ok(docs
            .iter()
            .filter_map(|doc| doc.data.get("scheduledTime").and_then(Value::as_str))
            .filter_map(|time| time.parse::<TimeOfDay>().ok())
            .collect())
    }
}
