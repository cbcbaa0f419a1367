use chrono::{DateTime, Duration, NaiveTime};

use crate::models::{Booking, BookingStatus, TimeOfDay};

const ICS_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Commas, semicolons, backslashes and newlines must be escaped in TEXT values.
fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

fn event_status(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending | BookingStatus::Disputed => "TENTATIVE",
        BookingStatus::Cancelled => "CANCELLED",
        _ => "CONFIRMED",
    }
}

pub fn generate_ics(booking: &Booking, business_name: &str) -> String {
    let time = booking
        .scheduled_time
        .parse::<TimeOfDay>()
        .unwrap_or_else(|_| TimeOfDay::from_minutes(0));
    let start = booking.scheduled_date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(time.minutes()));
    let end = start + Duration::minutes(i64::from(booking.service_details.duration));
    let dtstamp = DateTime::from_timestamp_millis(booking.created_at.millis())
        .map(|dt| dt.format(ICS_FORMAT).to_string())
        .unwrap_or_else(|| start.format(ICS_FORMAT).to_string());

    let summary = escape_text(&format!("{} with {}", booking.service_details.name, business_name));
    let description = escape_text(
        booking
            .special_requirements
            .as_deref()
            .or(booking.customer_notes.as_deref())
            .unwrap_or("No additional notes"),
    );
    let location = escape_text(&booking.address);

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Servicebook//Bookings//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{id}@servicebook\r\n\
         DTSTAMP:{dtstamp}Z\r\n\
         DTSTART:{start}\r\n\
         DTEND:{end}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         LOCATION:{location}\r\n\
         STATUS:{status}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n",
        id = booking.id,
        start = start.format(ICS_FORMAT),
        end = end.format(ICS_FORMAT),
        status = event_status(booking.status),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentStatus, PricingType, ServiceDetails, Timestamp};
    use chrono::NaiveDate;

    fn booking(time: &str, duration: u32) -> Booking {
        Booking {
            id: "test-123".to_string(),
            service_id: "svc-1".to_string(),
            provider_id: "prov-1".to_string(),
            customer_id: "cust-1".to_string(),
            customer_name: "Alice".to_string(),
            customer_email: String::new(),
            customer_phone: "+1234567890".to_string(),
            service_details: ServiceDetails {
                name: "Haircut".to_string(),
                description: String::new(),
                pricing_type: PricingType::Fixed,
                agreed_price: 30.0,
                duration,
            },
            scheduled_date: NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
            scheduled_time: time.to_string(),
            address: "12 High St, Springfield".to_string(),
            special_requirements: Some("Bring clippers; no dyes".to_string()),
            status: BookingStatus::Confirmed,
            payment_status: PaymentStatus::Pending,
            total_amount: 30.0,
            deposit_amount: None,
            payment_id: None,
            provider_notes: None,
            customer_notes: None,
            cancellation_reason: None,
            cancelled_by: None,
            rating: None,
            review: None,
            created_at: Timestamp::from_millis(1741600800000),
            updated_at: Timestamp::EPOCH,
        }
    }

    #[test]
    fn test_generate_ics() {
        let ics = generate_ics(&booking("14:00", 60), "Bob's Barbershop");
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.contains("DTSTART:20250315T140000"));
        assert!(ics.contains("DTEND:20250315T150000"));
        assert!(ics.contains("DTSTAMP:20250310T100000Z"));
        assert!(ics.contains("SUMMARY:Haircut with Bob's Barbershop"));
        assert!(ics.contains("DESCRIPTION:Bring clippers\\; no dyes"));
        assert!(ics.contains("LOCATION:12 High St\\, Springfield"));
        assert!(ics.contains("UID:test-123@servicebook"));
        assert!(ics.contains("STATUS:CONFIRMED"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
    }

    #[test]
    fn test_duration_crosses_the_hour() {
        let mut b = booking("09:30", 90);
        b.special_requirements = None;
        b.status = BookingStatus::Pending;
        let ics = generate_ics(&b, "Test Biz");
        assert!(ics.contains("DTSTART:20250315T093000"));
        assert!(ics.contains("DTEND:20250315T110000"));
        assert!(ics.contains("DESCRIPTION:No additional notes"));
        assert!(ics.contains("STATUS:TENTATIVE"));
    }
}
