//! The record manager contract.

use crate::error::{StoreError, StoreResult};
use crate::serializer::Serializer;
use crate::types::Recid;

/// Operations every record store layer offers to the collections above it.
///
/// Implemented by [`crate::Store`] and by decorators such as
/// [`crate::WriteBehind`] that wrap another implementation. Methods take
/// `&self`; implementations synchronize internally.
pub trait RecordManager: Send + Sync {
    /// Stores a new record and returns its recid.
    ///
    /// # Errors
    ///
    /// Returns `RecordTooLarge` for payloads over 65535 bytes.
    fn put(&self, data: &[u8]) -> StoreResult<Recid>;

    /// Reads a record, or `None` if it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, recid: Recid) -> StoreResult<Option<Vec<u8>>>;

    /// Replaces the payload of an existing record.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if the recid is not assigned.
    fn update(&self, recid: Recid, data: &[u8]) -> StoreResult<()>;

    /// Deletes a record; deleting an absent record is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ReservedRecid` for recids in the reserved range.
    fn delete(&self, recid: Recid) -> StoreResult<()>;

    /// Looks up a named root.
    ///
    /// # Errors
    ///
    /// Returns an error if the named-root table cannot be read.
    fn get_named(&self, name: &str) -> StoreResult<Option<Recid>>;

    /// Binds or unbinds a named root.
    ///
    /// # Errors
    ///
    /// Returns an error if the named-root table cannot be written.
    fn set_named(&self, name: &str, recid: Option<Recid>) -> StoreResult<()>;

    /// Makes all buffered mutations durable and visible.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    fn commit(&self) -> StoreResult<()>;

    /// Discards all uncommitted mutations.
    ///
    /// # Errors
    ///
    /// Returns an error if the rollback fails.
    fn rollback(&self) -> StoreResult<()>;

    /// Releases the store. Further use returns `Closed`.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    fn close(&self) -> StoreResult<()>;

    /// Allocates a recid holding an empty payload.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails.
    fn reserve(&self) -> StoreResult<Recid> {
        self.put(&[])
    }
}

/// Typed helpers over any [`RecordManager`].
///
/// # Example
///
/// ```rust
/// use recstore_core::{RecordManager, RecordManagerExt, Store, StringSerializer};
///
/// let store = Store::open_in_memory()?;
/// let recid = store.put_value(&"root".to_string(), &StringSerializer)?;
/// assert_eq!(store.get_value(recid, &StringSerializer)?.as_deref(), Some("root"));
/// # Ok::<(), recstore_core::StoreError>(())
/// ```
pub trait RecordManagerExt: RecordManager {
    /// Encodes and stores a value.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if encoding fails, or any error of [`RecordManager::put`].
    fn put_value<T, S: Serializer<T> + ?Sized>(
        &self,
        value: &T,
        serializer: &S,
    ) -> StoreResult<Recid> {
        let bytes = serializer.encode(value)?;
        self.put(&bytes)
    }

    /// Reads and decodes a value.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if decoding fails.
    fn get_value<T, S: Serializer<T> + ?Sized>(
        &self,
        recid: Recid,
        serializer: &S,
    ) -> StoreResult<Option<T>> {
        self.get(recid)?
            .map(|bytes| serializer.decode(&bytes))
            .transpose()
    }

    /// Encodes a value and replaces an existing record with it.
    ///
    /// # Errors
    ///
    /// Returns `Codec` if encoding fails, or any error of
    /// [`RecordManager::update`].
    fn update_value<T, S: Serializer<T> + ?Sized>(
        &self,
        recid: Recid,
        value: &T,
        serializer: &S,
    ) -> StoreResult<()> {
        let bytes = serializer.encode(value)?;
        self.update(recid, &bytes)
    }

    /// Reads a value that must exist.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if the record is absent.
    fn require_value<T, S: Serializer<T> + ?Sized>(
        &self,
        recid: Recid,
        serializer: &S,
    ) -> StoreResult<T> {
        self.get_value(recid, serializer)?
            .ok_or(StoreError::RecordNotFound { recid })
    }
}

impl<R: RecordManager + ?Sized> RecordManagerExt for R {}

impl<R: RecordManager + ?Sized> RecordManager for std::sync::Arc<R> {
    fn put(&self, data: &[u8]) -> StoreResult<Recid> {
        (**self).put(data)
    }

    fn get(&self, recid: Recid) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(recid)
    }

    fn update(&self, recid: Recid, data: &[u8]) -> StoreResult<()> {
        (**self).update(recid, data)
    }

    fn delete(&self, recid: Recid) -> StoreResult<()> {
        (**self).delete(recid)
    }

    fn get_named(&self, name: &str) -> StoreResult<Option<Recid>> {
        (**self).get_named(name)
    }

    fn set_named(&self, name: &str, recid: Option<Recid>) -> StoreResult<()> {
        (**self).set_named(name, recid)
    }

    fn commit(&self) -> StoreResult<()> {
        (**self).commit()
    }

    fn rollback(&self) -> StoreResult<()> {
        (**self).rollback()
    }

    fn close(&self) -> StoreResult<()> {
        (**self).close()
    }

    fn reserve(&self) -> StoreResult<Recid> {
        (**self).reserve()
    }
}
