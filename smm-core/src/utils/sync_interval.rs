/// Returns how long the payment sync waits before its next gateway sweep,
/// based on when a charge was last created.
///
/// Customers usually pay a PIX charge within a minute of it being shown,
/// so fresh charges are checked often and the sweep backs off afterwards.
pub fn sync_interval(
    last_charge_at: time::PrimitiveDateTime,
    now: time::PrimitiveDateTime,
) -> time::Duration {
    let waited = now - last_charge_at;
    match waited {
        d if d < time::Duration::seconds(30) => time::Duration::seconds(3),
        d if d < time::Duration::minutes(2) => time::Duration::seconds(10),
        d if d < time::Duration::minutes(10) => time::Duration::seconds(30),
        _ => time::Duration::seconds(60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_backs_off_with_age() {
        let created = datetime!(2026-01-01 10:00);
        let after = |secs| sync_interval(created, created + time::Duration::seconds(secs));

        assert_eq!(after(0), time::Duration::seconds(3));
        assert_eq!(after(29), time::Duration::seconds(3));
        assert_eq!(after(30), time::Duration::seconds(10));
        assert_eq!(after(119), time::Duration::seconds(10));
        assert_eq!(after(300), time::Duration::seconds(30));
        assert_eq!(after(3600), time::Duration::seconds(60));
    }

    #[test]
    fn test_clock_skew_counts_as_fresh() {
        let created = datetime!(2026-01-01 10:00);
        let earlier = created - time::Duration::seconds(5);
        assert_eq!(sync_interval(created, earlier), time::Duration::seconds(3));
    }
}
