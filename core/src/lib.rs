// Copyright (c) 2023-2024 The cardano-hw-core authors

//! Cardano hardware wallet transaction signing core
//!
//! This provides the streaming transaction-body builder used when signing
//! transactions on a hardware wallet: transaction elements arrive one
//! protocol message at a time, are serialised into the canonical CBOR body
//! encoding and fed directly into a running Blake2b-256 digest, so the
//! full transaction is never materialised in memory.
//!
//! ## Operations
//!
//! A signing session drives one [`TxBuilder`][engine::TxBuilder] strictly in
//! protocol order:
//!
//! 1. [`start_inputs`][engine::TxBuilder::start_inputs] /
//!    [`add_input`][engine::TxBuilder::add_input] /
//!    [`finish_inputs`][engine::TxBuilder::finish_inputs]
//! 2. [`start_outputs`][engine::TxBuilder::start_outputs] then per output
//!    either [`add_simple_output`][engine::TxBuilder::add_simple_output] or
//!    [`add_output_with_tokens`][engine::TxBuilder::add_output_with_tokens]
//!    with its nested asset-group / token calls, then
//!    [`finish_outputs`][engine::TxBuilder::finish_outputs]
//! 3. [`add_fee`][engine::TxBuilder::add_fee] and
//!    [`add_ttl`][engine::TxBuilder::add_ttl]
//! 4. optional certificates, including the multi-message pool-registration
//!    flow (see [`engine::assemble`])
//! 5. optional withdrawals, auxiliary-data hash and validity-interval-start
//! 6. [`finish`][engine::TxBuilder::finish], then
//!    [`tx_hash`][engine::TxBuilder::tx_hash] yields the body digest used
//!    to derive witnesses via a [`Keychain`][keychain::Keychain]
//!
//! Any call outside this order fails with a fatal [`Error`][engine::Error];
//! the session is discarded, nothing is recovered and no partial hash is
//! ever surfaced.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod cbor;

pub mod engine;

pub mod keychain;

pub use engine::{open_stream, TxBuilder};
