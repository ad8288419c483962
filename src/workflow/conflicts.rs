//! Interval conflict checking for crew bookings.
//!
//! Intervals are closed: a booking ending at 12:00 collides with one starting at 12:00.

use chrono::{DateTime, Utc};

use crate::models::{ConflictPair, TeamAssignment};

/// Whether two closed intervals share at least one instant.
pub fn intervals_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    let starts_inside = b_start <= a_start && a_start <= b_end;
    let ends_inside = b_start <= a_end && a_end <= b_end;
    let covers = a_start <= b_start && a_end >= b_end;
    starts_inside || ends_inside || covers
}

/// Open bookings of `member_id` that would collide with `[start, end]`.
///
/// Finalized bookings and the booking named by `exclude_id` are ignored. Results keep the
/// order of `existing`.
pub fn find_conflicts(
    existing: &[TeamAssignment],
    member_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_id: Option<&str>,
) -> Vec<TeamAssignment> {
    existing
        .iter()
        .filter(|a| a.member_id == member_id)
        .filter(|a| a.is_open())
        .filter(|a| exclude_id != Some(a.id.as_str()))
        .filter(|a| intervals_overlap(start, end, a.start_time, a.end_time))
        .cloned()
        .collect()
}

/// Every pair of open bookings of the same member that overlap.
pub fn audit_conflicts(assignments: &[TeamAssignment]) -> Vec<ConflictPair> {
    let mut open: Vec<&TeamAssignment> = assignments.iter().filter(|a| a.is_open()).collect();
    open.sort_by(|a, b| {
        a.member_id
            .cmp(&b.member_id)
            .then(a.start_time.cmp(&b.start_time))
            .then(a.id.cmp(&b.id))
    });

    let mut pairs = Vec::new();
    for (i, first) in open.iter().enumerate() {
        for second in open[i + 1..]
            .iter()
            .take_while(|other| other.member_id == first.member_id)
        {
            if intervals_overlap(
                first.start_time,
                first.end_time,
                second.start_time,
                second.end_time,
            ) {
                pairs.push(ConflictPair {
                    member_id: first.member_id.clone(),
                    first: (*first).clone(),
                    second: (*second).clone(),
                });
            }
        }
    }
    pairs
}
