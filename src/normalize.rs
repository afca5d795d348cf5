//! Mapping of raw source records onto [`BusinessListing`].

use crate::error::FetchError;
use crate::source::RawRecord;
use crate::types::{BusinessListing, Coordinates, UNCATEGORIZED};
use uuid::Uuid;

/// Normalize one raw record
///
/// Missing optional text becomes the empty string and missing or partial
/// coordinates become `None`. A missing or blank name or city is a
/// [`FetchError::DecodeError`].
pub fn normalize(raw: &RawRecord) -> Result<BusinessListing, FetchError> {
    let name = required(raw.name.as_deref(), "name")?;
    let location = raw.location.as_ref();
    let city = required(location.and_then(|l| l.city.as_deref()), "location.city")?;

    let category = raw
        .categories
        .iter()
        .filter_map(|c| c.title.as_deref())
        .map(str::trim)
        .find(|t| !t.is_empty())
        .unwrap_or(UNCATEGORIZED)
        .to_string();

    let coordinates = raw.coordinates.and_then(|c| match (c.latitude, c.longitude) {
        (Some(latitude), Some(longitude)) if latitude.is_finite() && longitude.is_finite() => {
            Some(Coordinates {
                latitude,
                longitude,
            })
        }
        _ => None,
    });

    Ok(BusinessListing {
        id: Uuid::new_v4(),
        name,
        category,
        address: optional(location.and_then(|l| l.address1.as_deref())),
        city,
        province: optional(location.and_then(|l| l.state.as_deref())),
        postal_code: optional(location.and_then(|l| l.zip_code.as_deref())),
        phone: optional(raw.phone.as_deref()),
        url: raw
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string),
        coordinates,
    })
}

/// Normalize a full page, failing on the first malformed record
pub fn normalize_page(records: &[RawRecord]) -> Result<Vec<BusinessListing>, FetchError> {
    records
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            normalize(raw).map_err(|e| match e {
                FetchError::DecodeError { message } => {
                    FetchError::decode(format!("record {index}: {message}"))
                }
                other => other,
            })
        })
        .collect()
}

fn required(value: Option<&str>, field: &str) -> Result<String, FetchError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(FetchError::decode(format!("missing required field `{field}`"))),
    }
}

fn optional(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}
