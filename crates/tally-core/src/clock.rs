use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

pub fn now_rfc3339() -> String {
    format_rfc3339(OffsetDateTime::now_utc())
}

pub fn format_rfc3339(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_default()
}

/// Parse an RFC 3339 timestamp. Returns `None` for anything else.
pub fn parse_rfc3339(ts: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(ts.trim(), &Rfc3339).ok()
}

/// Parse the looser timestamps found in hand-written logs.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and a bare
/// `YYYY-MM-DD`. Offset-less forms are taken as UTC.
pub fn parse_loose(ts: &str) -> Option<OffsetDateTime> {
    let ts = ts.trim();
    if let Some(at) = parse_rfc3339(ts) {
        return Some(at);
    }
    let spaced = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    if let Ok(at) = PrimitiveDateTime::parse(ts, &spaced) {
        return Some(at.assume_utc());
    }
    let t_sep = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    if let Ok(at) = PrimitiveDateTime::parse(ts, &t_sep) {
        return Some(at.assume_utc());
    }
    let date_only = format_description!("[year]-[month]-[day]");
    if let Ok(day) = Date::parse(ts, &date_only) {
        return Some(day.midnight().assume_utc());
    }
    None
}

/// True when `ts` parses (loosely) and is no older than `window` before
/// `now`. A window reaching past the representable range admits everything.
pub fn within(ts: &str, window: time::Duration, now: OffsetDateTime) -> bool {
    match parse_loose(ts) {
        Some(at) => now.checked_sub(window).map_or(true, |cutoff| at >= cutoff),
        None => false,
    }
}
