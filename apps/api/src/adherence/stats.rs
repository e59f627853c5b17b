use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::log::MedicationLog;
use crate::models::medication::Medication;

/// How far back the streak looks, in days before today.
pub const STREAK_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdherenceStats {
    /// Taken doses per active medication-day, as a percentage. Each slot counts as a
    /// dose while the divisor counts medications, so multi-slot schedules can exceed 100.
    pub adherence_rate: u32,
    pub streak: u32,
    pub taken_count: usize,
    /// Explicit `missed` logs. Nothing writes them today, so this is normally zero.
    pub missed_count: usize,
    pub total_days: u32,
}

/// Computes stats for `[range_start, range_end]` (inclusive).
///
/// `logs` may cover more than the range; only in-range logs are counted, while the
/// streak looks at the last [`STREAK_WINDOW_DAYS`] before `today` regardless of range.
pub fn compute_stats(
    medications: &[Medication],
    logs: &[MedicationLog],
    range_start: NaiveDate,
    range_end: NaiveDate,
    today: NaiveDate,
) -> AdherenceStats {
    let in_range = |log: &&MedicationLog| log.log_date >= range_start && log.log_date <= range_end;

    let taken_count = logs.iter().filter(in_range).filter(|l| l.is_taken()).count();
    let missed_count = logs.iter().filter(in_range).filter(|l| l.is_missed()).count();
    let total_days = days_inclusive(range_start, range_end);
    let active = medications.iter().filter(|m| m.is_active).count();

    AdherenceStats {
        adherence_rate: adherence_rate(taken_count, active, total_days),
        streak: streak(logs, today),
        taken_count,
        missed_count,
        total_days,
    }
}

fn days_inclusive(start: NaiveDate, end: NaiveDate) -> u32 {
    let days = (end - start).num_days() + 1;
    u32::try_from(days.max(0)).unwrap_or(0)
}

/// round(taken / (medications × days) × 100); zero when nothing is expected.
pub fn adherence_rate(taken: usize, medications: usize, days: u32) -> u32 {
    let expected = medications as f64 * days as f64;
    if expected <= 0.0 {
        return 0;
    }
    (taken as f64 / expected * 100.0).round() as u32
}

/// Consecutive days ending today with at least one taken dose. No dose today means zero.
pub fn streak(logs: &[MedicationLog], today: NaiveDate) -> u32 {
    let window_start = today - Duration::days(STREAK_WINDOW_DAYS);
    let taken_days: HashSet<NaiveDate> = logs
        .iter()
        .filter(|log| log.is_taken() && log.log_date >= window_start && log.log_date <= today)
        .map(|log| log.log_date)
        .collect();

    let mut streak = 0;
    let mut day = today;
    while taken_days.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

/// First and last day of a calendar month (`month` is 1-based).
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next.pred_opt()?))
}

/// The log window needed to compute stats for a month: the month itself plus the
/// streak window ending today.
pub fn stats_window(year: i32, month: u32, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let (first, last) = month_bounds(year, month)?;
    let streak_start = today - Duration::days(STREAK_WINDOW_DAYS);
    Some((first.min(streak_start), last.max(today)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::log::fixtures::{taken, with_status};
    use crate::models::log::STATUS_MISSED;
    use crate::models::medication::fixtures::medication;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_streak_stops_at_first_gap() {
        let today = date(2026, 6, 20);
        let med = medication("Aspirin", &["Morning"]);
        let logs = vec![
            taken(med.id, today, "Morning"),
            taken(med.id, today - Duration::days(1), "Morning"),
            taken(med.id, today - Duration::days(2), "Morning"),
            taken(med.id, today - Duration::days(4), "Morning"),
        ];
        assert_eq!(streak(&logs, today), 3);
    }

    #[test]
    fn test_streak_zero_without_dose_today() {
        let today = date(2026, 6, 20);
        let med = medication("Aspirin", &["Morning"]);
        let logs = vec![taken(med.id, today - Duration::days(1), "Morning")];
        assert_eq!(streak(&logs, today), 0);
    }

    #[test]
    fn test_streak_counts_days_not_doses() {
        let today = date(2026, 6, 20);
        let med = medication("Aspirin", &["Morning", "Night"]);
        let logs = vec![
            taken(med.id, today, "Morning"),
            taken(med.id, today, "Night"),
            taken(med.id, today - Duration::days(1), "Night"),
        ];
        assert_eq!(streak(&logs, today), 2);
    }

    #[test]
    fn test_streak_ignores_missed_logs() {
        let today = date(2026, 6, 20);
        let med = medication("Aspirin", &["Morning"]);
        let logs = vec![with_status(taken(med.id, today, "Morning"), STATUS_MISSED)];
        assert_eq!(streak(&logs, today), 0);
    }

    #[test]
    fn test_streak_capped_by_window() {
        let today = date(2026, 6, 20);
        let med = medication("Aspirin", &["Morning"]);
        let logs: Vec<_> = (0..60)
            .map(|i| taken(med.id, today - Duration::days(i), "Morning"))
            .collect();
        assert_eq!(streak(&logs, today), STREAK_WINDOW_DAYS as u32 + 1);
    }

    #[test]
    fn test_half_month_adherence() {
        let med = medication("Aspirin", &["Morning"]);
        let (start, end) = month_bounds(2026, 6).unwrap();
        let logs: Vec<_> = (0..15)
            .map(|i| taken(med.id, start + Duration::days(i * 2), "Morning"))
            .collect();

        let stats = compute_stats(std::slice::from_ref(&med), &logs, start, end, end);
        assert_eq!(stats.total_days, 30);
        assert_eq!(stats.taken_count, 15);
        assert_eq!(stats.adherence_rate, 50);
        assert_eq!(stats.missed_count, 0);
    }

    #[test]
    fn test_two_slot_schedule_can_exceed_hundred() {
        let med = medication("Metformin", &["Morning", "Evening"]);
        let (start, end) = month_bounds(2026, 6).unwrap();
        let logs: Vec<_> = (0..30)
            .flat_map(|i| {
                let day = start + Duration::days(i);
                [taken(med.id, day, "Morning"), taken(med.id, day, "Evening")]
            })
            .collect();

        let stats = compute_stats(std::slice::from_ref(&med), &logs, start, end, end);
        assert_eq!(stats.taken_count, 60);
        assert_eq!(stats.adherence_rate, 200);
    }

    #[test]
    fn test_no_medications_rate_zero() {
        let (start, end) = month_bounds(2026, 2).unwrap();
        let stats = compute_stats(&[], &[], start, end, end);
        assert_eq!(stats.adherence_rate, 0);
        assert_eq!(stats.total_days, 28);
    }

    #[test]
    fn test_out_of_range_logs_not_counted() {
        let med = medication("Aspirin", &["Morning"]);
        let (start, end) = month_bounds(2026, 6).unwrap();
        let logs = vec![
            taken(med.id, start, "Morning"),
            taken(med.id, start - Duration::days(1), "Morning"),
            with_status(taken(med.id, end, "Morning"), STATUS_MISSED),
        ];
        let stats = compute_stats(std::slice::from_ref(&med), &logs, start, end, end);
        assert_eq!(stats.taken_count, 1);
        assert_eq!(stats.missed_count, 1);
    }

    #[test]
    fn test_inactive_medications_not_expected() {
        let mut stopped = medication("Old", &["Morning"]);
        stopped.is_active = false;
        let current = medication("Aspirin", &["Morning"]);
        let (start, end) = month_bounds(2026, 6).unwrap();
        let logs: Vec<_> = (0..30)
            .map(|i| taken(current.id, start + Duration::days(i), "Morning"))
            .collect();
        let stats = compute_stats(&[stopped, current], &logs, start, end, end);
        assert_eq!(stats.adherence_rate, 100);
    }

    #[test]
    fn test_month_bounds_december() {
        assert_eq!(
            month_bounds(2026, 12),
            Some((date(2026, 12, 1), date(2026, 12, 31)))
        );
        assert_eq!(month_bounds(2026, 13), None);
    }

    #[test]
    fn test_stats_window_covers_streak() {
        let today = date(2026, 6, 5);
        let (start, end) = stats_window(2026, 6, today).unwrap();
        assert_eq!(start, date(2026, 5, 6));
        assert_eq!(end, date(2026, 6, 30));
    }
}
