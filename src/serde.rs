//! Serde support for `HyperLogLog`.
//!
//! The sketch serializes as its self-describing byte encoding (see
//! [`crate::codec`]), so any serde format carries exactly the bytes that
//! `to_bytes` produces, and deserialization runs the full `from_bytes`
//! validation. Malformed payloads surface as format-level errors rather than
//! panics.

use std::fmt;
use std::hash::Hasher;
use std::marker::PhantomData;

use serde::de::{Error, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::sketch::HyperLogLog;

impl<H: Hasher + Default> Serialize for HyperLogLog<H> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de, H: Hasher + Default> Deserialize<'de> for HyperLogLog<H> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct BytesVisitor<H>(PhantomData<H>);

        impl<'de, H: Hasher + Default> Visitor<'de> for BytesVisitor<H> {
            type Value = HyperLogLog<H>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a serialized cardinality sketch byte buffer")
            }

            fn visit_bytes<E: Error>(self, bytes: &[u8]) -> Result<Self::Value, E> {
                HyperLogLog::from_bytes(bytes).map_err(E::custom)
            }

            // Human-readable formats like JSON deliver byte buffers as
            // integer sequences.
            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(byte) = seq.next_element::<u8>()? {
                    bytes.push(byte);
                }
                HyperLogLog::from_bytes(&bytes).map_err(A::Error::custom)
            }
        }

        deserializer.deserialize_bytes(BytesVisitor(PhantomData))
    }
}
