//! Normalization of payloads into records and denormalization back out.
//!
//! Writes split nested entities into records of their own keyed by
//! `(type, id)`; reads follow those ids to rebuild a requested shape.

mod read;
mod write;

pub(crate) use read::Denormalizer;
pub(crate) use write::Normalizer;
