//! Export of collected listings to tabular artifacts
//!
//! The [`Exporter`] trait is the seam for output formats; [`CsvExporter`] is
//! the only implementation and writes the fixed column contract in
//! [`CSV_HEADERS`].

use crate::error::ExportError;
use crate::types::{BusinessListing, CSV_HEADERS};
use chrono::NaiveDate;
use std::io::Write;

/// Serializes a listing set into an artifact
pub trait Exporter: Send + Sync {
    /// MIME type of the produced artifact
    fn content_type(&self) -> &'static str;

    /// File extension without the leading dot
    fn file_extension(&self) -> &'static str;

    /// Write `listings` to `out` in insertion order
    fn export(&self, listings: &[BusinessListing], out: &mut dyn Write) -> Result<(), ExportError>;
}

/// RFC 4180 CSV exporter
///
/// Emits the header row even when there are no listings. Fields containing
/// commas, quotes or line breaks are quoted; embedded quotes are doubled.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExporter;

impl Exporter for CsvExporter {
    fn content_type(&self) -> &'static str {
        "text/csv"
    }

    fn file_extension(&self) -> &'static str {
        "csv"
    }

    fn export(&self, listings: &[BusinessListing], out: &mut dyn Write) -> Result<(), ExportError> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .from_writer(out);

        writer.write_record(CSV_HEADERS)?;
        for listing in listings {
            writer.write_record(listing.csv_row())?;
        }
        writer.flush()?;

        tracing::debug!(rows = listings.len(), "Exported listings as CSV");
        Ok(())
    }
}

/// Default artifact name for an export made on `date`
///
/// ```
/// use chrono::NaiveDate;
/// use listing_collector::export::default_export_filename;
///
/// let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
/// assert_eq!(default_export_filename(date), "business_data_2024-03-09.csv");
/// ```
pub fn default_export_filename(date: NaiveDate) -> String {
    format!("business_data_{}.csv", date.format("%Y-%m-%d"))
}
