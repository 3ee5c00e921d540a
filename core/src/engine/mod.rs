// Copyright (c) 2023-2024 The cardano-hw-core authors

//! Streaming transaction-body engine
//!
//! The engine serialises a transaction body to CBOR and hashes it in one
//! pass, holding only the open collection headers and a single pending
//! item in memory. [`LazyCollection`] is the incremental encoding
//! primitive, [`HashBuilder`] stacks open collections over a running
//! digest, and [`TxBuilder`] drives both through the fixed protocol
//! order, rejecting out-of-order operations.

mod error;
pub use error::Error;

mod collection;
pub use collection::{Kind, LazyCollection, Step};

mod hash_builder;
pub use hash_builder::HashBuilder;

mod builder;
pub use builder::{
    open_stream, transition, tx_body_item_count, Action, State, TxBuilder,
    POOL_REGISTRATION_ITEM_COUNT, POOL_REGISTRATION_LEADING_FIELDS, TX_BODY_KEY_AUXILIARY_DATA,
    TX_BODY_KEY_CERTIFICATES, TX_BODY_KEY_FEE, TX_BODY_KEY_INPUTS, TX_BODY_KEY_OUTPUTS,
    TX_BODY_KEY_TTL, TX_BODY_KEY_VALIDITY_INTERVAL_START, TX_BODY_KEY_WITHDRAWALS,
};

pub mod assemble;

/// Maximum encoded length of one pending item
pub const MAX_ITEM_LEN: usize = 256;

/// Maximum collection nesting depth
///
/// The deepest protocol structure is the token bundle: body map, outputs
/// array, output array, nested amount array, asset-group map, token map.
pub const MAX_DEPTH: usize = 8;

/// Body-hash digest (Blake2b with 32-byte output)
pub type Blake2b256 = blake2::Blake2b<blake2::digest::consts::U32>;
