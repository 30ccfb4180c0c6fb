//! Required-field checks and export date parsing.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rsv_schemas::ReservationRecord;

const DATE_FMT: &str = "%Y%m%d";
const TIME_FMT: &str = "%H:%M";

/// Labels of the fields a `new` row is missing, in column order.
pub fn missing_for_new(r: &ReservationRecord) -> Vec<&'static str> {
    let mut missing = Vec::new();
    push_if_blank(&mut missing, &r.holder, "holder");
    push_if_blank(&mut missing, &r.holder_kana, "holder kana");
    push_if_blank(&mut missing, &r.name, "name");
    push_if_blank(&mut missing, &r.name_kana, "name kana");
    push_if_blank(&mut missing, &r.phone, "phone");
    push_if_blank(&mut missing, &r.postal_code, "postal code");
    push_if_blank(&mut missing, &r.address, "address");
    push_if_zero(&mut missing, r.stay_days, "stay days");
    push_if_zero(&mut missing, r.rooms, "rooms");
    push_if_zero(&mut missing, r.guests, "guests");
    push_if_blank(&mut missing, &r.product_name, "plan name");
    missing
}

/// Labels of the guest-identity fields a `cancel` row is missing. Stay
/// attributes are not checked here; a blank one simply matches nothing.
pub fn missing_for_cancel(r: &ReservationRecord) -> Vec<&'static str> {
    let mut missing = Vec::new();
    push_if_blank(&mut missing, &r.name, "name");
    push_if_blank(&mut missing, &r.name_kana, "name kana");
    push_if_blank(&mut missing, &r.phone, "phone");
    missing
}

fn push_if_blank(out: &mut Vec<&'static str>, v: &str, label: &'static str) {
    if v.trim().is_empty() {
        out.push(label);
    }
}

fn push_if_zero(out: &mut Vec<&'static str>, v: i16, label: &'static str) {
    if v == 0 {
        out.push(label);
    }
}

/// `YYYYMMDD`
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FMT).ok()
}

/// Check-in date plus the optional `HH:MM` check-in time. A blank time
/// means midnight; a non-blank unparseable time fails the whole value.
pub fn parse_stay_from(date: &str, time: &str) -> Option<NaiveDateTime> {
    let day = parse_date(date)?;
    let time = time.trim();
    if time.is_empty() {
        return day.and_hms_opt(0, 0, 0);
    }
    let t = NaiveTime::parse_from_str(time, TIME_FMT).ok()?;
    Some(day.and_time(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_parse_from_compact_form() {
        assert_eq!(parse_date("20240103"), NaiveDate::from_ymd_opt(2024, 1, 3));
        assert_eq!(parse_date("2024-01-03"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("20241301"), None);
    }

    #[test]
    fn stay_from_combines_date_and_time() {
        let dt = parse_stay_from("20240101", "15:00").unwrap();
        assert_eq!(dt.to_string(), "2024-01-01 15:00:00");

        let midnight = parse_stay_from("20240101", " ").unwrap();
        assert_eq!(midnight.to_string(), "2024-01-01 00:00:00");

        assert!(parse_stay_from("20240101", "3pm").is_none());
        assert!(parse_stay_from("", "15:00").is_none());
    }
}
