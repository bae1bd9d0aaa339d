//! Named-root table encoding.
//!
//! The table is an ordinary record at [`RECID_NAMED_ROOTS`] holding a
//! CBOR map from name to recid. A null or empty record is an empty table.
//!
//! [`RECID_NAMED_ROOTS`]: crate::layout::RECID_NAMED_ROOTS

use crate::error::{StoreError, StoreResult};
use crate::types::Recid;
use std::collections::BTreeMap;

/// Name-to-recid mapping, ordered by name.
pub type NamedRoots = BTreeMap<String, Recid>;

/// Decodes a stored table.
///
/// # Errors
///
/// Returns [`StoreError::Corruption`] if the bytes are not a valid table.
pub fn decode_table(bytes: &[u8]) -> StoreResult<NamedRoots> {
    if bytes.is_empty() {
        return Ok(NamedRoots::new());
    }
    let raw: BTreeMap<String, u64> = ciborium::from_reader(bytes)
        .map_err(|e| StoreError::corruption(format!("named-root table: {e}")))?;
    Ok(raw.into_iter().map(|(name, id)| (name, Recid(id))).collect())
}

/// Encodes a table for storage.
///
/// # Errors
///
/// Returns [`StoreError::Codec`] if serialization fails.
pub fn encode_table(table: &NamedRoots) -> StoreResult<Vec<u8>> {
    let raw: BTreeMap<&str, u64> = table
        .iter()
        .map(|(name, recid)| (name.as_str(), recid.0))
        .collect();
    let mut buf = Vec::new();
    ciborium::into_writer(&raw, &mut buf)
        .map_err(|e| StoreError::codec(format!("named-root table: {e}")))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bytes_are_empty_table() {
        assert!(decode_table(&[]).unwrap().is_empty());
    }

    #[test]
    fn table_round_trip() {
        let mut table = NamedRoots::new();
        table.insert("users".into(), Recid(2541));
        table.insert("orders".into(), Recid(9000));

        let bytes = encode_table(&table).unwrap();
        assert_eq!(decode_table(&bytes).unwrap(), table);
    }

    #[test]
    fn garbage_is_corruption() {
        let result = decode_table(&[0xFF, 0x00, 0x13]);
        assert!(matches!(result, Err(StoreError::Corruption { .. })));
    }
}
