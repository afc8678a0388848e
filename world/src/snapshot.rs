//! Memento codec for cache state.
//!
//! A snapshot is a single line of the form
//! `cache:v1:<row>,<col>:<base64 json>`, where the JSON payload carries the
//! cell and the full token collection. Decoding never consults the seed, so a
//! restored cache is exactly what was stored.

use std::collections::BTreeSet;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use geocache_core::{Cell, ParseIdentityError, Token};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SNAPSHOT_DOMAIN: &str = "cache";
const SNAPSHOT_VERSION: &str = "v1";
const FIELD_DELIMITER: char = ':';

/// Identifier prefix emitted before the cell key and payload.
pub const SNAPSHOT_HEADER: &str = "cache:v1";

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotPayload {
    cell: Cell,
    tokens: Vec<Token>,
}

/// Cache contents recovered from a snapshot, before canonicalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedSnapshot {
    /// Cell recorded in the snapshot.
    pub cell: Cell,
    /// Tokens recorded in the snapshot, in stored order.
    pub tokens: Vec<Token>,
}

/// Encodes a cell and its tokens into a snapshot string.
#[must_use]
pub fn encode(cell: Cell, tokens: &[Token]) -> String {
    let payload = SnapshotPayload {
        cell,
        tokens: tokens.to_vec(),
    };
    let json = serde_json::to_vec(&payload).expect("cache snapshot serialization never fails");
    let encoded = STANDARD_NO_PAD.encode(json);
    format!("{SNAPSHOT_HEADER}:{}:{encoded}", cell.key())
}

/// Decodes a snapshot string, validating structure and token uniqueness.
pub fn decode(value: &str) -> Result<DecodedSnapshot, SnapshotError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SnapshotError::EmptyPayload);
    }

    let mut parts = trimmed.split(FIELD_DELIMITER);
    let domain = parts.next().ok_or(SnapshotError::MissingPrefix)?;
    let version = parts.next().ok_or(SnapshotError::MissingVersion)?;
    let key = parts.next().ok_or(SnapshotError::MissingCell)?;
    let payload = parts.next().ok_or(SnapshotError::MissingPayload)?;
    if parts.next().is_some() {
        return Err(SnapshotError::TrailingSegments);
    }

    if domain != SNAPSHOT_DOMAIN {
        return Err(SnapshotError::InvalidPrefix(domain.to_owned()));
    }
    if version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(version.to_owned()));
    }

    let header_cell = key.parse::<Cell>().map_err(SnapshotError::InvalidCellKey)?;
    let bytes = STANDARD_NO_PAD
        .decode(payload.as_bytes())
        .map_err(SnapshotError::InvalidEncoding)?;
    let decoded: SnapshotPayload =
        serde_json::from_slice(&bytes).map_err(SnapshotError::InvalidPayload)?;

    if decoded.cell != header_cell {
        return Err(SnapshotError::CellMismatch {
            header: header_cell,
            payload: decoded.cell,
        });
    }

    let mut seen = BTreeSet::new();
    for token in &decoded.tokens {
        if !seen.insert(*token) {
            return Err(SnapshotError::DuplicateToken(*token));
        }
    }

    Ok(DecodedSnapshot {
        cell: decoded.cell,
        tokens: decoded.tokens,
    })
}

/// Errors that can occur while decoding cache snapshots.
///
/// Distinct from a miss: a store without an entry for a cell reports `None`,
/// while a present but unreadable entry reports one of these.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot was empty or contained only whitespace.
    #[error("snapshot was empty")]
    EmptyPayload,
    /// The prefix segment was missing.
    #[error("snapshot is missing the prefix")]
    MissingPrefix,
    /// The version segment was missing.
    #[error("snapshot is missing the version")]
    MissingVersion,
    /// The cell key segment was missing.
    #[error("snapshot is missing the cell key")]
    MissingCell,
    /// The payload segment was missing.
    #[error("snapshot is missing the payload")]
    MissingPayload,
    /// More segments followed the payload.
    #[error("snapshot has unexpected trailing segments")]
    TrailingSegments,
    /// The prefix segment named another format.
    #[error("snapshot prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The version segment named an unsupported revision.
    #[error("snapshot version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// A cell key could not be parsed.
    #[error(transparent)]
    InvalidCellKey(ParseIdentityError),
    /// The base64 payload could not be decoded.
    #[error("could not decode snapshot payload: {0}")]
    InvalidEncoding(base64::DecodeError),
    /// The decoded payload could not be deserialised.
    #[error("could not parse snapshot payload: {0}")]
    InvalidPayload(serde_json::Error),
    /// The header and payload disagree on the cell.
    #[error("snapshot header names cell {header} but payload names {payload}")]
    CellMismatch {
        /// Cell named in the header.
        header: Cell,
        /// Cell named in the payload.
        payload: Cell,
    },
    /// A well-formed snapshot was stored under another cell's key.
    #[error("snapshot stored for cell {expected} describes cell {found}")]
    ForeignCell {
        /// Cell whose key the snapshot was stored under.
        expected: Cell,
        /// Cell the snapshot describes.
        found: Cell,
    },
    /// The same token appears more than once.
    #[error("token {0} appears more than once")]
    DuplicateToken(Token),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(cell: Cell, count: u32) -> Vec<Token> {
        (0..count).map(|serial| Token::new(cell, serial)).collect()
    }

    #[test]
    fn round_trip_empty_cache() {
        let cell = Cell::new(-4, 9);
        let encoded = encode(cell, &[]);
        assert!(encoded.starts_with(&format!("{SNAPSHOT_HEADER}:-4,9:")));

        let decoded = decode(&encoded).expect("snapshot decodes");
        assert_eq!(decoded.cell, cell);
        assert!(decoded.tokens.is_empty());
    }

    #[test]
    fn round_trip_keeps_foreign_tokens_in_order() {
        let cell = Cell::new(369_995, -1_220_533);
        let mut held = tokens(cell, 3);
        held.push(Token::new(Cell::new(1, 1), 7));

        let decoded = decode(&encode(cell, &held)).expect("snapshot decodes");
        assert_eq!(decoded.tokens, held);
    }

    #[test]
    fn rejects_structural_damage() {
        assert!(matches!(decode("   "), Err(SnapshotError::EmptyPayload)));
        assert!(matches!(
            decode("layout:v1:0,0:e30"),
            Err(SnapshotError::InvalidPrefix(prefix)) if prefix == "layout"
        ));
        assert!(matches!(
            decode("cache:v9:0,0:e30"),
            Err(SnapshotError::UnsupportedVersion(_))
        ));
        assert!(matches!(decode("cache:v1:0,0"), Err(SnapshotError::MissingPayload)));
        assert!(matches!(
            decode("cache:v1:zero:e30"),
            Err(SnapshotError::InvalidCellKey(_))
        ));
        assert!(matches!(
            decode("cache:v1:0,0:!!!"),
            Err(SnapshotError::InvalidEncoding(_))
        ));
        assert!(matches!(
            decode("cache:v1:0,0:e30:extra"),
            Err(SnapshotError::TrailingSegments)
        ));
    }

    #[test]
    fn rejects_schema_mismatch() {
        let foreign = STANDARD_NO_PAD.encode(br#"{"shapes":[]}"#);
        assert!(matches!(
            decode(&format!("cache:v1:0,0:{foreign}")),
            Err(SnapshotError::InvalidPayload(_))
        ));
    }

    #[test]
    fn rejects_header_payload_disagreement() {
        let encoded = encode(Cell::new(2, 3), &[]);
        let tampered = encoded.replacen("2,3", "2,4", 1);
        assert!(matches!(
            decode(&tampered),
            Err(SnapshotError::CellMismatch { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_tokens() {
        let cell = Cell::new(0, 0);
        let token = Token::new(cell, 0);
        let encoded = encode(cell, &[token, token]);
        assert!(matches!(
            decode(&encoded),
            Err(SnapshotError::DuplicateToken(duplicate)) if duplicate == token
        ));
    }
}
