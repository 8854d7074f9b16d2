//! SLA classification. Derived on every read, never stored: an open ticket
//! keeps accruing elapsed time against "now", so the same ticket may change
//! bucket between two reads without any write happening.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::db::ticket::Priority;

/// Fraction of the deadline after which a ticket is flagged as at risk.
const WARNING_FACTOR: f64 = 0.8;

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Sla {
    /// Within the deadline.
    #[display("ok")]
    Ok,

    /// Past 80% of the deadline but not over it yet.
    #[display("warning")]
    Warning,

    /// Past the deadline.
    #[display("overdue")]
    Overdue,
}

/// Resolution deadline per priority, in hours.
pub fn deadline_hours(priority: Priority) -> f64 {
    match priority {
        Priority::Critical => 4.0,
        Priority::High => 24.0,
        Priority::Medium => 48.0,
        Priority::Low => 72.0,
    }
}

/// Buckets a ticket by elapsed time against its priority deadline. A closed
/// ticket is measured up to its closure timestamp and stays there forever;
/// an open one is measured against `now`.
pub fn classify(
    priority: Priority,
    created_at: OffsetDateTime,
    closed_at: Option<OffsetDateTime>,
    now: OffsetDateTime,
) -> Sla {
    let end = closed_at.unwrap_or(now);
    let elapsed_hours = (end - created_at).as_seconds_f64() / 3600.0;

    let limit = deadline_hours(priority);
    if elapsed_hours > limit {
        Sla::Overdue
    } else if elapsed_hours > limit * WARNING_FACTOR {
        Sla::Warning
    } else {
        Sla::Ok
    }
}

#[cfg(test)]
mod tests {
    use time::ext::NumericalDuration as _;

    use super::*;

    fn t0() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH
    }

    #[test]
    fn critical_ticket_is_overdue_after_five_hours() {
        let sla = classify(Priority::Critical, t0(), None, t0() + 5.hours());
        assert_eq!(sla, Sla::Overdue);
    }

    #[test]
    fn low_ticket_warns_after_sixty_hours() {
        // 60h is past 0.8 * 72h = 57.6h but under the 72h limit.
        let sla = classify(Priority::Low, t0(), None, t0() + 60.hours());
        assert_eq!(sla, Sla::Warning);
    }

    #[test]
    fn closed_ticket_is_measured_at_closure_forever() {
        let closed_at = Some(t0() + 10.hours());
        let sla = classify(Priority::Medium, t0(), closed_at, t0() + 10.hours());
        assert_eq!(sla, Sla::Ok);

        // A much later read must not change the bucket.
        let sla =
            classify(Priority::Medium, t0(), closed_at, t0() + 1000.hours());
        assert_eq!(sla, Sla::Ok);
    }

    #[test]
    fn open_ticket_degrades_between_reads() {
        let sla = classify(Priority::High, t0(), None, t0() + 1.hours());
        assert_eq!(sla, Sla::Ok);

        let sla = classify(Priority::High, t0(), None, t0() + 20.hours());
        assert_eq!(sla, Sla::Warning);

        let sla = classify(Priority::High, t0(), None, t0() + 25.hours());
        assert_eq!(sla, Sla::Overdue);
    }

    #[test]
    fn boundary_is_exclusive() {
        // Exactly at the deadline is still warning, not overdue.
        let sla = classify(Priority::Critical, t0(), None, t0() + 4.hours());
        assert_eq!(sla, Sla::Warning);
    }

    #[test]
    fn deadlines_match_priorities() {
        assert_eq!(deadline_hours(Priority::Critical), 4.0);
        assert_eq!(deadline_hours(Priority::High), 24.0);
        assert_eq!(deadline_hours(Priority::Medium), 48.0);
        assert_eq!(deadline_hours(Priority::Low), 72.0);
    }
}
