//! Bincode codec implementation
//!
//! Compact binary encoding for any serde-serializable document type.

use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};

use super::Codec;

/// [`Codec`] backed by bincode
///
/// Stateless; the phantom parameter only pins the document type so a
/// repository can hold it as `Arc<dyn Codec<T>>`.
#[derive(Debug)]
pub struct BincodeCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> BincodeCodec<T> {
    /// Create a codec for documents of type `T`
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Codec<T> for BincodeCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, value: &T) -> Result<Bytes> {
        bincode::serialize(value)
            .map(Bytes::from)
            .map_err(|e| StoreError::Serialization(format!("encode failed: {}", e)))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes)
            .map_err(|e| StoreError::Serialization(format!("decode failed: {}", e)))
    }
}
