//! Lincoln export format.
//!
//! ## Column contract (case-insensitive, order-independent)
//!
//! Required: `notice`, `holder`, `holder_kana`, `name`, `name_kana`, `phone`,
//! `postal_code`, `address`, `stay_from`, `stay_to`, `stay_days`, `rooms`,
//! `guests`, `product_name`, `sales_channel`, `reserved_on`.
//!
//! Optional (blank / absent ⇒ empty string or 0): `holder_phone`, `email`,
//! `check_in_time`, `guests_male`, `guests_female`, `child_a` .. `child_d`,
//! `product_code`, `payment_method`.
//!
//! Required headers guarantee the columns exist; empty *values* are left for
//! the row processor to report per row.

use std::collections::HashMap;

use rsv_schemas::{NoticeKind, ReservationRecord};

use crate::{CsvError, ReservationParser};

const REQUIRED: [&str; 16] = [
    "notice",
    "holder",
    "holder_kana",
    "name",
    "name_kana",
    "phone",
    "postal_code",
    "address",
    "stay_from",
    "stay_to",
    "stay_days",
    "rooms",
    "guests",
    "product_name",
    "sales_channel",
    "reserved_on",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct LincolnParser;

impl ReservationParser for LincolnParser {
    fn name(&self) -> &'static str {
        "lincoln"
    }

    fn parse_str(&self, src: &str) -> Result<Vec<ReservationRecord>, CsvError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(src.as_bytes());

        let headers = rdr
            .headers()
            .map_err(|e| CsvError::Io(format!("read header: {e}")))?
            .clone();
        let col_idx = build_col_index(headers.iter())?;

        let mut out = Vec::new();
        for (i, rec) in rdr.records().enumerate() {
            // 1-based data row number (header excluded).
            let row = i + 1;
            let rec = rec.map_err(|e| CsvError::Io(format!("row {row}: {e}")))?;
            if rec.iter().all(|f| f.trim().is_empty()) {
                continue;
            }

            let text = |name: &'static str| -> String {
                col_idx
                    .get(name)
                    .and_then(|&i| rec.get(i))
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default()
            };
            let count = |name: &'static str| -> Result<i16, CsvError> {
                let raw = text(name);
                if raw.is_empty() {
                    return Ok(0);
                }
                raw.parse::<i16>().map_err(|_| CsvError::ParseField {
                    row,
                    field: name,
                    raw,
                })
            };

            out.push(ReservationRecord {
                notice: NoticeKind::parse(&text("notice")),
                holder: text("holder"),
                holder_kana: text("holder_kana"),
                holder_phone: text("holder_phone"),
                name: text("name"),
                name_kana: text("name_kana"),
                phone: text("phone"),
                email: text("email"),
                postal_code: text("postal_code"),
                address: text("address"),
                stay_from: text("stay_from"),
                check_in_time: text("check_in_time"),
                stay_to: text("stay_to"),
                stay_days: count("stay_days")?,
                rooms: count("rooms")?,
                guests: count("guests")?,
                guests_male: count("guests_male")?,
                guests_female: count("guests_female")?,
                child_a: count("child_a")?,
                child_b: count("child_b")?,
                child_c: count("child_c")?,
                child_d: count("child_d")?,
                product_code: text("product_code"),
                product_name: text("product_name"),
                payment_method: text("payment_method"),
                sales_channel: text("sales_channel"),
                reserved_on: text("reserved_on"),
            });
        }

        Ok(out)
    }
}

/// Case-insensitive column-name → index map. Fails on the first missing
/// required column.
fn build_col_index<'a, I>(headers: I) -> Result<HashMap<String, usize>, CsvError>
where
    I: Iterator<Item = &'a str>,
{
    let mut idx = HashMap::new();
    for (i, col) in headers.enumerate() {
        // Strip a UTF-8 BOM some exporters put on the first column.
        let col = col.trim().trim_start_matches('\u{feff}').to_ascii_lowercase();
        idx.insert(col, i);
    }

    for req in REQUIRED {
        if !idx.contains_key(req) {
            return Err(CsvError::MissingHeader(req));
        }
    }

    Ok(idx)
}
