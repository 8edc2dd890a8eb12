//! Translation of raw search hits into [`RepoEntity`] values
//!
//! Keeps the API's loose payload shape out of the rest of the crate. A record
//! that lacks a mandatory field is rejected on its own; the rest of the page
//! still goes through.

use crate::client::RawRecord;
use crate::model::RepoEntity;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Why a single raw record could not become an entity
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid timestamp in '{field}': {value}")]
    InvalidTimestamp { field: &'static str, value: String },
}

/// Converts one raw record
///
/// `id` and `updatedAt` are mandatory. Name and owner default to empty and the
/// star count to zero.
pub fn to_entity(raw: &RawRecord) -> Result<RepoEntity, ValidationError> {
    let id = raw
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or(ValidationError::MissingField("id"))?;

    let raw_date = raw
        .updated_at
        .as_deref()
        .filter(|d| !d.is_empty())
        .ok_or(ValidationError::MissingField("updatedAt"))?;

    let updated_at = DateTime::parse_from_rfc3339(raw_date)
        .map_err(|_| ValidationError::InvalidTimestamp {
            field: "updatedAt",
            value: raw_date.to_string(),
        })?
        .with_timezone(&Utc);

    Ok(RepoEntity {
        id: id.to_string(),
        name: raw.name.clone().unwrap_or_default(),
        owner: raw
            .owner
            .as_ref()
            .and_then(|o| o.login.clone())
            .unwrap_or_default(),
        stars: raw.stargazer_count.unwrap_or(0),
        updated_at,
    })
}

/// Converts a batch, logging and skipping records that fail validation
pub fn translate_batch(records: &[RawRecord]) -> Vec<RepoEntity> {
    records
        .iter()
        .filter_map(|raw| match to_entity(raw) {
            Ok(entity) => Some(entity),
            Err(e) => {
                tracing::warn!(
                    "Skipping record {}: {}",
                    raw.id.as_deref().unwrap_or("<no id>"),
                    e
                );
                None
            }
        })
        .collect()
}
