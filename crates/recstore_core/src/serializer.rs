//! Value serializers.
//!
//! The store handles bytes only. A [`Serializer`] converts typed values at
//! the edge, so collections built on a [`RecordManager`] can store their
//! own node types.
//!
//! [`RecordManager`]: crate::RecordManager

use crate::error::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// Converts values of type `T` to and from record payloads.
///
/// # Example
///
/// ```rust
/// use recstore_core::{Serializer, StringSerializer};
///
/// let bytes = StringSerializer.encode(&"root".to_string())?;
/// assert_eq!(StringSerializer.decode(&bytes)?, "root");
/// # Ok::<(), recstore_core::StoreError>(())
/// ```
pub trait Serializer<T>: Send + Sync {
    /// Encodes a value.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if the value cannot be represented.
    fn encode(&self, value: &T) -> StoreResult<Vec<u8>>;

    /// Decodes a value from a payload.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if the payload is malformed.
    fn decode(&self, bytes: &[u8]) -> StoreResult<T>;
}

/// Passes byte vectors through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesSerializer;

impl Serializer<Vec<u8>> for BytesSerializer {
    fn encode(&self, value: &Vec<u8>) -> StoreResult<Vec<u8>> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// Stores strings as UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringSerializer;

impl Serializer<String> for StringSerializer {
    fn encode(&self, value: &String) -> StoreResult<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| StoreError::codec(e.to_string()))
    }
}

/// Stores a `u64` as 8 little-endian bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct U64Serializer;

impl Serializer<u64> for U64Serializer {
    fn encode(&self, value: &u64) -> StoreResult<Vec<u8>> {
        Ok(value.to_le_bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<u64> {
        let array: [u8; 8] = bytes.try_into().map_err(|_| {
            StoreError::codec(format!("expected 8 bytes for u64, got {}", bytes.len()))
        })?;
        Ok(u64::from_le_bytes(array))
    }
}

/// Stores any serde type as CBOR.
pub struct CborSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> CborSerializer<T> {
    /// Creates a serializer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for CborSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CborSerializer<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for CborSerializer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CborSerializer")
    }
}

impl<T: Serialize + DeserializeOwned> Serializer<T> for CborSerializer<T> {
    fn encode(&self, value: &T) -> StoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::codec(e.to_string()))?;
        Ok(buf)
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<T> {
        ciborium::from_reader(bytes).map_err(|e| StoreError::codec(e.to_string()))
    }
}
