use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rsv_schemas::{NoticeKind, ReservationRecord};

pub const LINCOLN_HEADER: [&str; 27] = [
    "notice",
    "holder",
    "holder_kana",
    "holder_phone",
    "name",
    "name_kana",
    "phone",
    "email",
    "postal_code",
    "address",
    "stay_from",
    "check_in_time",
    "stay_to",
    "stay_days",
    "rooms",
    "guests",
    "guests_male",
    "guests_female",
    "child_a",
    "child_b",
    "child_c",
    "child_d",
    "product_code",
    "product_name",
    "payment_method",
    "sales_channel",
    "reserved_on",
];

/// A valid `new` booking: two nights, one room, two guests, Jan 2024.
pub fn new_booking(name: &str, phone: &str) -> ReservationRecord {
    ReservationRecord {
        notice: NoticeKind::New,
        holder: name.to_string(),
        holder_kana: format!("{name}カナ"),
        holder_phone: phone.to_string(),
        name: name.to_string(),
        name_kana: format!("{name}カナ"),
        phone: phone.to_string(),
        email: String::new(),
        postal_code: "1234567".to_string(),
        address: "Tokyo".to_string(),
        stay_from: "20240101".to_string(),
        check_in_time: "15:00".to_string(),
        stay_to: "20240103".to_string(),
        stay_days: 2,
        rooms: 1,
        guests: 2,
        guests_male: 1,
        guests_female: 1,
        child_a: 0,
        child_b: 0,
        child_c: 0,
        child_d: 0,
        product_code: "P01".to_string(),
        product_name: "Standard".to_string(),
        payment_method: String::new(),
        sales_channel: "Rakuten".to_string(),
        reserved_on: "20231201".to_string(),
    }
}

/// The `cancel` row a site controller would emit for `booking`.
pub fn cancel_of(booking: &ReservationRecord) -> ReservationRecord {
    ReservationRecord {
        notice: NoticeKind::Cancel,
        ..booking.clone()
    }
}

/// Render records as a Lincoln export.
pub fn lincoln_csv(records: &[ReservationRecord]) -> Result<String> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record(LINCOLN_HEADER).context("write header")?;
    for r in records {
        let counts = [
            r.stay_days,
            r.rooms,
            r.guests,
            r.guests_male,
            r.guests_female,
            r.child_a,
            r.child_b,
            r.child_c,
            r.child_d,
        ]
        .map(|n| n.to_string());
        let notice = match &r.notice {
            NoticeKind::New => "予約",
            NoticeKind::Cancel => "取消",
            NoticeKind::Other(raw) => raw.as_str(),
        };
        let row: Vec<&str> = [
            notice,
            r.holder.as_str(),
            r.holder_kana.as_str(),
            r.holder_phone.as_str(),
            r.name.as_str(),
            r.name_kana.as_str(),
            r.phone.as_str(),
            r.email.as_str(),
            r.postal_code.as_str(),
            r.address.as_str(),
            r.stay_from.as_str(),
            r.check_in_time.as_str(),
            r.stay_to.as_str(),
        ]
        .into_iter()
        .chain(counts.iter().map(String::as_str))
        .chain([
            r.product_code.as_str(),
            r.product_name.as_str(),
            r.payment_method.as_str(),
            r.sales_channel.as_str(),
            r.reserved_on.as_str(),
        ])
        .collect();
        w.write_record(&row).context("write row")?;
    }
    let bytes = w
        .into_inner()
        .map_err(|e| e.into_error())
        .context("flush csv")?;
    String::from_utf8(bytes).context("csv utf8")
}

pub fn write_lincoln_csv(
    dir: &Path,
    file_name: &str,
    records: &[ReservationRecord],
) -> Result<PathBuf> {
    let path = dir.join(file_name);
    std::fs::write(&path, lincoln_csv(records)?)
        .with_context(|| format!("write fixture {}", path.display()))?;
    Ok(path)
}
