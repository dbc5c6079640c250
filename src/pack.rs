//! Pack buffer
//!
//! Byte buffer used to serialize accounting records for transport between
//! daemons. Each packed item is a `u32` big-endian length followed by a
//! bincode payload, so several records can share one buffer and be read back
//! in order.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

const LEN_PREFIX: usize = 4;

/// Pack/unpack failures
#[derive(Debug, Error)]
pub enum PackError {
    #[error("Buffer truncated: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Item too large to pack: {0} bytes")]
    TooLarge(usize),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Decoding failed: {0}")]
    Decode(String),
}

/// Growable byte buffer with an independent read cursor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackBuffer {
    data: Vec<u8>,
    offset: usize,
}

impl PackBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap received bytes for unpacking
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data, offset: 0 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes not yet consumed by unpacking
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.offset)
    }

    /// Append one length-prefixed item
    pub fn pack<T: Serialize>(&mut self, item: &T) -> Result<(), PackError> {
        let payload = bincode::serialize(item).map_err(|e| PackError::Encode(e.to_string()))?;
        let len = u32::try_from(payload.len()).map_err(|_| PackError::TooLarge(payload.len()))?;
        self.data.extend_from_slice(&len.to_be_bytes());
        self.data.extend_from_slice(&payload);
        Ok(())
    }

    /// Read the next length-prefixed item
    ///
    /// On failure the read cursor is left where it was.
    pub fn unpack<T: DeserializeOwned>(&mut self) -> Result<T, PackError> {
        let start = self.offset;
        let header = self.take(start, LEN_PREFIX)?;
        let mut len_bytes = [0u8; LEN_PREFIX];
        len_bytes.copy_from_slice(header);
        let len = u32::from_be_bytes(len_bytes) as usize;

        let payload = self.take(start + LEN_PREFIX, len)?;
        let item = bincode::deserialize(payload).map_err(|e| PackError::Decode(e.to_string()))?;

        self.offset = start + LEN_PREFIX + len;
        Ok(item)
    }

    fn take(&self, offset: usize, needed: usize) -> Result<&[u8], PackError> {
        let available = self.data.len().saturating_sub(offset);
        if available < needed {
            return Err(PackError::Truncated {
                offset,
                needed,
                available,
            });
        }
        Ok(&self.data[offset..offset + needed])
    }
}
