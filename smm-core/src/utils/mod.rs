pub mod sync_interval;

/// Current UTC time without offset, matching the `TIMESTAMP` columns.
pub fn now_primitive() -> time::PrimitiveDateTime {
    let now = time::OffsetDateTime::now_utc();
    time::PrimitiveDateTime::new(now.date(), now.time())
}
