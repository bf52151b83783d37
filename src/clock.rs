use chrono::{DateTime, Duration, Utc};

/// How long a participant has to take their turn (or judge one).
pub const TURN_WINDOW_HOURS: i64 = 24;

pub fn compute_deadline(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(TURN_WINDOW_HOURS)
}

pub fn is_expired(deadline: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > deadline
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_is_one_window_out() {
        let now = Utc::now();
        assert_eq!(compute_deadline(now) - now, Duration::hours(24));
    }

    #[test]
    fn expiry_is_strictly_after_deadline() {
        let now = Utc::now();
        let deadline = compute_deadline(now);
        assert!(!is_expired(deadline, now));
        assert!(!is_expired(deadline, deadline));
        assert!(is_expired(deadline, deadline + Duration::seconds(1)));
    }
}
