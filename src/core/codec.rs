//! Deterministic byte encoding shared by hashing and persistence.
//!
//! Values are written with bincode's default options: fields in declaration
//! order, fixed-width little-endian integers and `u64` length prefixes for
//! sequences. The layout is therefore stable across runs and round-trips exactly.

use crate::core::{Block, Transaction};
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub trait Codec: Serialize + DeserializeOwned + Sized {
    fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl Codec for Block {}
impl Codec for Transaction {}
