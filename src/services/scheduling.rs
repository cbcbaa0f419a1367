use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Days, NaiveDate, Utc};

use crate::errors::AppError;
use crate::models::{AvailabilityProfile, DaySlots, NextSlot, TimeOfDay, WorkingHours};
use crate::services::coordinator::CancelToken;
use crate::services::directory::Directory;

pub const NEXT_SLOT_HORIZON_DAYS: u32 = 30;

/// Start times already taken by committed bookings.
#[async_trait]
pub trait CommittedTimes: Send + Sync {
    async fn committed_times(
        &self,
        provider_id: &str,
        date: NaiveDate,
    ) -> Result<HashSet<TimeOfDay>, AppError>;
}

/// Slot start labels between `start` and `end`, stepping by `slot_duration`.
/// A slot that would run past `end` is not offered.
pub fn generate_slots_for_date(
    hours: &WorkingHours,
    slot_duration: u32,
    excluded: &HashSet<TimeOfDay>,
) -> Vec<String> {
    if slot_duration == 0 {
        return Vec::new();
    }
    let end = hours.end.minutes();
    let mut slots = Vec::new();
    let mut time = hours.start.minutes();
    while let Some(slot_end) = time.checked_add(slot_duration).filter(|e| *e <= end) {
        let slot = TimeOfDay::from_minutes(time);
        if !excluded.contains(&slot) {
            slots.push(slot.to_string());
        }
        time = slot_end;
    }
    slots
}

/// Day indexes count from Sunday = 0.
pub fn is_working_day(date: NaiveDate, working_days: &BTreeSet<u8>) -> bool {
    let index = date.weekday().num_days_from_sunday() as u8;
    working_days.contains(&index)
}

/// Open slots for the `days_ahead` days after `today`, oldest first.
///
/// Days off, unavailable dates and fully booked days are left out. When
/// committed bookings for a day cannot be read the day is treated as having
/// none, so one failed read never sinks the whole scan.
pub async fn generate_available_slots(
    committed: &dyn CommittedTimes,
    provider_id: &str,
    days_ahead: u32,
    profile: &AvailabilityProfile,
    today: NaiveDate,
) -> Vec<DaySlots> {
    let mut days = Vec::new();
    for offset in 1..=days_ahead {
        let Some(date) = today.checked_add_days(Days::new(u64::from(offset))) else {
            break;
        };
        if !is_working_day(date, &profile.working_days) || profile.unavailable_dates.contains(&date) {
            continue;
        }

        let taken = match committed.committed_times(provider_id, date).await {
            Ok(taken) => taken,
            Err(e) => {
                tracing::warn!(
                    provider_id,
                    date = %date,
                    error = %e,
                    "could not read committed bookings, treating day as open"
                );
                HashSet::new()
            }
        };

        let time_slots = generate_slots_for_date(&profile.working_hours, profile.slot_duration, &taken);
        if !time_slots.is_empty() {
            days.push(DaySlots { date, time_slots });
        }
    }
    days
}

pub async fn next_available_slot(
    committed: &dyn CommittedTimes,
    provider_id: &str,
    profile: &AvailabilityProfile,
    today: NaiveDate,
) -> Option<NextSlot> {
    generate_available_slots(committed, provider_id, NEXT_SLOT_HORIZON_DAYS, profile, today)
        .await
        .into_iter()
        .next()
        .and_then(|day| {
            day.time_slots.into_iter().next().map(|time| NextSlot {
                date: day.date,
                time,
            })
        })
}

/// Availability for a provider looked up through the directory.
pub struct Scheduler {
    directory: Arc<Directory>,
    committed: Arc<dyn CommittedTimes>,
    default_days_ahead: u32,
}

impl Scheduler {
    pub fn new(directory: Arc<Directory>, committed: Arc<dyn CommittedTimes>, default_days_ahead: u32) -> Self {
        Self {
            directory,
            committed,
            default_days_ahead,
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Providers that are inactive or unapproved have no slots. A supplied
    /// profile replaces the provider's own.
    pub async fn available_slots(
        &self,
        provider_id: &str,
        days_ahead: Option<u32>,
        profile: Option<AvailabilityProfile>,
        token: Option<&CancelToken>,
    ) -> Result<Vec<DaySlots>, AppError> {
        let provider = self.directory.get_provider(provider_id, token).await?;
        if !provider.is_bookable() {
            tracing::info!(provider_id, "provider is not bookable, no slots offered");
            return Ok(Vec::new());
        }
        let profile = profile.unwrap_or_else(|| provider.availability_profile());
        let days_ahead = days_ahead.unwrap_or(self.default_days_ahead);
        Ok(generate_available_slots(
            self.committed.as_ref(),
            provider_id,
            days_ahead,
            &profile,
            Self::today(),
        )
        .await)
    }

    pub async fn next_available_slot(
        &self,
        provider_id: &str,
        profile: Option<AvailabilityProfile>,
        token: Option<&CancelToken>,
    ) -> Result<Option<NextSlot>, AppError> {
        let provider = self.directory.get_provider(provider_id, token).await?;
        if !provider.is_bookable() {
            return Ok(None);
        }
        let profile = profile.unwrap_or_else(|| provider.availability_profile());
        Ok(next_available_slot(self.committed.as_ref(), provider_id, &profile, Self::today()).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn hours(start: &str, end: &str) -> WorkingHours {
        WorkingHours {
            start: start.parse().unwrap(),
            end: TimeOfDay::parse_end(end).unwrap(),
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn times(labels: &[&str]) -> HashSet<TimeOfDay> {
        labels.iter().map(|t| t.parse().unwrap()).collect()
    }

    #[derive(Default)]
    struct FakeBookings {
        taken: HashMap<NaiveDate, HashSet<TimeOfDay>>,
        broken: HashSet<NaiveDate>,
    }

    #[async_trait]
    impl CommittedTimes for FakeBookings {
        async fn committed_times(
            &self,
            _provider_id: &str,
            date: NaiveDate,
        ) -> Result<HashSet<TimeOfDay>, AppError> {
            if self.broken.contains(&date) {
                return Err(AppError::Unavailable("store down".into()));
            }
            Ok(self.taken.get(&date).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn test_excludes_committed_time() {
        let slots = generate_slots_for_date(&hours("09:00", "17:00"), 60, &times(&["13:00"]));
        assert_eq!(
            slots,
            vec!["09:00", "10:00", "11:00", "12:00", "14:00", "15:00", "16:00"]
        );
    }

    #[test]
    fn test_no_partial_trailing_slot() {
        let slots = generate_slots_for_date(&hours("09:00", "11:30"), 60, &HashSet::new());
        assert_eq!(slots, vec!["09:00", "10:00"]);
    }

    #[test]
    fn test_off_boundary_exclusion_is_ignored() {
        let slots = generate_slots_for_date(&hours("09:00", "12:00"), 60, &times(&["09:30"]));
        assert_eq!(slots, vec!["09:00", "10:00", "11:00"]);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(generate_slots_for_date(&hours("09:00", "17:00"), 0, &HashSet::new()).is_empty());
        assert!(generate_slots_for_date(&hours("17:00", "09:00"), 60, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_oversized_slot_duration_yields_nothing() {
        let open = hours("09:00", "17:00");
        assert!(generate_slots_for_date(&open, u32::MAX, &HashSet::new()).is_empty());
        assert!(generate_slots_for_date(&open, 481, &HashSet::new()).is_empty());
        assert_eq!(generate_slots_for_date(&open, 480, &HashSet::new()), vec!["09:00"]);
    }

    #[test]
    fn test_late_shift_runs_until_midnight() {
        let late = hours("22:00", "24:00");
        assert_eq!(generate_slots_for_date(&late, 60, &HashSet::new()), vec!["22:00", "23:00"]);
        assert_eq!(generate_slots_for_date(&late, 90, &HashSet::new()), vec!["22:00"]);
    }

    #[test]
    fn test_is_working_day() {
        let weekdays: BTreeSet<u8> = (1..=5).collect();
        // 2025-06-16 is a Monday
        assert!(is_working_day(date("2025-06-16"), &weekdays));
        assert!(!is_working_day(date("2025-06-15"), &weekdays));
        assert!(!is_working_day(date("2025-06-21"), &weekdays));
        assert!(is_working_day(date("2025-06-15"), &[0u8].into_iter().collect()));
    }

    #[tokio::test]
    async fn test_starts_tomorrow_and_skips_days_off() {
        let bookings = FakeBookings::default();
        let profile = AvailabilityProfile::default();
        // Friday: tomorrow and Sunday are off, Monday is the first day.
        let days = generate_available_slots(&bookings, "p1", 4, &profile, date("2025-06-13")).await;

        let dates: Vec<NaiveDate> = days.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![date("2025-06-16"), date("2025-06-17")]);
        assert_eq!(days[0].time_slots.len(), 8);
    }

    #[tokio::test]
    async fn test_skips_unavailable_and_full_days() {
        let mut bookings = FakeBookings::default();
        bookings
            .taken
            .insert(date("2025-06-17"), times(&["09:00", "10:00", "11:00"]));
        bookings.taken.insert(date("2025-06-18"), times(&["10:00"]));

        let mut profile = AvailabilityProfile {
            working_hours: hours("09:00", "12:00"),
            ..AvailabilityProfile::default()
        };
        profile.unavailable_dates.insert(date("2025-06-16"));

        let days = generate_available_slots(&bookings, "p1", 3, &profile, date("2025-06-15")).await;
        assert_eq!(
            days,
            vec![DaySlots {
                date: date("2025-06-18"),
                time_slots: vec!["09:00".to_string(), "11:00".to_string()],
            }]
        );
    }

    #[tokio::test]
    async fn test_failed_day_is_treated_as_open() {
        let mut bookings = FakeBookings::default();
        bookings.broken.insert(date("2025-06-16"));
        bookings.taken.insert(date("2025-06-17"), times(&["09:00"]));

        let days = generate_available_slots(
            &bookings,
            "p1",
            2,
            &AvailabilityProfile::default(),
            date("2025-06-15"),
        )
        .await;
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].time_slots.len(), 8);
        assert_eq!(days[1].time_slots.first().map(String::as_str), Some("10:00"));
    }

    #[tokio::test]
    async fn test_next_available_slot() {
        let mut bookings = FakeBookings::default();
        bookings.taken.insert(date("2025-06-16"), times(&["09:00"]));

        let next = next_available_slot(&bookings, "p1", &AvailabilityProfile::default(), date("2025-06-15")).await;
        assert_eq!(
            next,
            Some(NextSlot {
                date: date("2025-06-16"),
                time: "10:00".to_string()
            })
        );

        let closed = AvailabilityProfile {
            working_days: BTreeSet::new(),
            ..AvailabilityProfile::default()
        };
        assert_eq!(
            next_available_slot(&bookings, "p1", &closed, date("2025-06-15")).await,
            None
        );
    }

    proptest! {
        #[test]
        fn prop_slots_on_grid_and_ascending(
            start in 0u32..1200,
            len in 1u32..240,
            duration in 1u32..180,
        ) {
            let end = (start + len).min(24 * 60 - 1);
            prop_assume!(end > start);
            let hours = WorkingHours {
                start: TimeOfDay::from_minutes(start),
                end: TimeOfDay::from_minutes(end),
            };
            let slots = generate_slots_for_date(&hours, duration, &HashSet::new());
            let minutes: Vec<u32> = slots
                .iter()
                .map(|s| s.parse::<TimeOfDay>().unwrap().minutes())
                .collect();
            for pair in minutes.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
            for t in &minutes {
                prop_assert!(*t >= start && *t < end);
                prop_assert_eq!((t - start) % duration, 0);
            }
        }

        #[test]
        fn prop_exclusions_remove_exactly_matching_slots(
            start in 0u32..600,
            duration in 5u32..120,
            excluded in proptest::collection::hash_set(0u32..1400, 0..20),
        ) {
            let hours = WorkingHours {
                start: TimeOfDay::from_minutes(start),
                end: TimeOfDay::from_minutes(start + 600),
            };
            let excluded: HashSet<TimeOfDay> =
                excluded.into_iter().map(TimeOfDay::from_minutes).collect();

            let all = generate_slots_for_date(&hours, duration, &HashSet::new());
            let open = generate_slots_for_date(&hours, duration, &excluded);

            let on_grid = excluded.iter().filter(|t| all.contains(&t.to_string())).count();
            prop_assert_eq!(open.len(), all.len() - on_grid);
            for t in &excluded {
                let label = t.to_string();
                prop_assert!(!open.contains(&label));
            }
        }

        #[test]
        fn prop_working_day_depends_on_weekday_only(day in 0i64..3650, weeks in 1i64..52) {
            let days: BTreeSet<u8> = [1, 3, 5].into_iter().collect();
            let base = date("2020-01-01") + chrono::Duration::days(day);
            let later = base + chrono::Duration::weeks(weeks);
            prop_assert_eq!(is_working_day(base, &days), is_working_day(later, &days));
        }
    }
}
