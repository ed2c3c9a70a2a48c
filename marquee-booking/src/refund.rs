use chrono::Duration;
use marquee_core::RefundStatus;
use serde::Serialize;

/// (minimum hours before the show, refund percentage), best tier first.
const REFUND_TIERS: [(i64, u8); 3] = [(24, 80), (12, 50), (2, 25)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefundQuote {
    pub percentage: u8,
    pub amount: i64,
    pub status: RefundStatus,
}

pub fn refund_percentage(until_start: Duration) -> u8 {
    REFUND_TIERS
        .iter()
        .find(|(hours, _)| until_start >= Duration::hours(*hours))
        .map(|(_, pct)| *pct)
        .unwrap_or(0)
}

/// Refund for a paid amount, floored to whole currency units.
pub fn quote(paid_amount: i64, until_start: Duration) -> RefundQuote {
    let percentage = refund_percentage(until_start);
    // Widened so large amounts cannot overflow; the result never exceeds the input
    let amount = (i128::from(paid_amount.max(0)) * i128::from(percentage) / 100) as i64;
    let status = if amount == 0 {
        RefundStatus::Completed
    } else {
        RefundStatus::Processing
    };

    RefundQuote { percentage, amount, status }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(refund_percentage(Duration::hours(48)), 80);
        assert_eq!(refund_percentage(Duration::hours(24)), 80);
        assert_eq!(refund_percentage(Duration::hours(24) - Duration::seconds(1)), 50);
        assert_eq!(refund_percentage(Duration::hours(12)), 50);
        assert_eq!(refund_percentage(Duration::hours(12) - Duration::seconds(1)), 25);
        assert_eq!(refund_percentage(Duration::hours(2)), 25);
        assert_eq!(refund_percentage(Duration::minutes(119)), 0);
        assert_eq!(refund_percentage(Duration::hours(-1)), 0);
    }

    #[test]
    fn test_quote_floors_amount() {
        let q = quote(999, Duration::hours(30));
        assert_eq!(q.amount, 799);
        assert_eq!(q.status, RefundStatus::Processing);

        let q = quote(333, Duration::hours(5));
        assert_eq!(q.percentage, 25);
        assert_eq!(q.amount, 83);
    }

    #[test]
    fn test_quote_handles_extreme_amounts() {
        let q = quote(200_000_000_000_000_000, Duration::hours(30));
        assert_eq!(q.amount, 160_000_000_000_000_000);

        let q = quote(i64::MAX, Duration::hours(5));
        assert_eq!(q.amount, (i128::from(i64::MAX) * 25 / 100) as i64);
        assert!(q.amount > 0);
    }

    #[test]
    fn test_zero_refund_is_completed() {
        let q = quote(1000, Duration::minutes(30));
        assert_eq!(q.amount, 0);
        assert_eq!(q.status, RefundStatus::Completed);
    }
}
