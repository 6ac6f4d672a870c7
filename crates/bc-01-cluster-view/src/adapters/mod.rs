//! # Adapters Layer (Hexagonal Architecture)
//!
//! Concrete implementations of outbound ports.

mod codec;

pub use codec::BincodeRecordCodec;
