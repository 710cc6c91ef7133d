//! Error types shared across the relay, negotiation, scoring and storage layers.

pub mod types;
