//! CSV export of captured leads.

use chrono::{NaiveDate, SecondsFormat};

use crate::errors::AppError;
use crate::models::Lead;

pub const CSV_HEADERS: [&str; 10] = [
    "Timestamp",
    "Form Type",
    "Name",
    "Email",
    "Company",
    "Phone",
    "Project Type",
    "Market Segment",
    "Message",
    "Source",
];

/// Serializes leads to CSV, one row per lead in store order.
///
/// Fields containing quotes, commas or line breaks are quoted with inner
/// quotes doubled, so any standard CSV reader gets the original text back.
/// The output depends only on the leads, so exporting the same store twice
/// yields byte-identical files.
pub fn leads_to_csv(leads: &[Lead]) -> Result<String, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record(CSV_HEADERS)
        .map_err(|e| AppError::InternalError(format!("CSV header write failed: {}", e)))?;

    for lead in leads {
        let timestamp = lead.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        writer
            .write_record([
                timestamp.as_str(),
                lead.form_type.as_str(),
                lead.fields.name.as_str(),
                lead.fields.email.as_str(),
                lead.fields.company.as_str(),
                lead.fields.phone.as_str(),
                lead.fields.project_type.as_str(),
                lead.market_segment.as_str(),
                lead.fields.message.as_str(),
                lead.source.as_str(),
            ])
            .map_err(|e| AppError::InternalError(format!("CSV row write failed: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::InternalError(format!("CSV flush failed: {}", e)))?;

    String::from_utf8(bytes)
        .map_err(|e| AppError::InternalError(format!("CSV output is not UTF-8: {}", e)))
}

/// Download filename for an export made on `date`.
pub fn export_filename(date: NaiveDate) -> String {
    format!("byoticabio_leads_{}.csv", date.format("%Y-%m-%d"))
}
