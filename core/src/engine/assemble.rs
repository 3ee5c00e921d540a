// Copyright (c) 2023-2024 The cardano-hw-core authors

//! Protocol-item assembly
//!
//! Builds the structured transaction-body items (certificates, pool
//! parameters, relays, metadata) as borrowed [`Value`] trees on the
//! stack, validates their field shapes, and feeds them into a
//! [`TxBuilder`]. Validation here covers shape only (lengths,
//! presence); policy checks such as duplicate detection belong to the
//! outer signing flow.

use crate::cbor::Value;

use super::{Error, TxBuilder};

/// Length of an address/stake key hash (Blake2b-224)
pub const KEY_HASH_LEN: usize = 28;

/// Length of a VRF key hash (Blake2b-256)
pub const VRF_KEY_HASH_LEN: usize = 32;

/// Length of a reward-account address (header byte + key hash)
pub const REWARD_ACCOUNT_LEN: usize = 29;

/// Length of a pool-metadata hash (Blake2b-256)
pub const METADATA_HASH_LEN: usize = 32;

/// Maximum length of a metadata URL or relay DNS name
pub const MAX_NAME_LEN: usize = 64;

const CERT_TYPE_STAKE_REGISTRATION: u64 = 0;
const CERT_TYPE_STAKE_DEREGISTRATION: u64 = 1;
const CERT_TYPE_STAKE_DELEGATION: u64 = 2;
const CERT_TYPE_POOL_REGISTRATION: u64 = 3;

const STAKE_CREDENTIAL_KEY: u64 = 0;

const RELAY_TYPE_SINGLE_HOST_ADDR: u64 = 0;
const RELAY_TYPE_SINGLE_HOST_NAME: u64 = 1;
const RELAY_TYPE_MULTI_HOST_NAME: u64 = 2;

/// Tag marking a rational number (margin numerator/denominator)
const TAG_RATIONAL: u64 = 30;

/// Single-message stake certificates, keyed by a key-hash credential
#[derive(Copy, Clone, Debug)]
pub enum Certificate<'a> {
    StakeRegistration {
        key_hash: &'a [u8],
    },
    StakeDeregistration {
        key_hash: &'a [u8],
    },
    StakeDelegation {
        key_hash: &'a [u8],
        pool_key_hash: &'a [u8],
    },
}

/// Leading scalar fields of a pool-registration certificate
#[derive(Copy, Clone, Debug)]
pub struct PoolParams<'a> {
    pub pool_key_hash: &'a [u8],
    pub vrf_key_hash: &'a [u8],
    pub pledge: u64,
    pub cost: u64,
    pub margin_numerator: u64,
    pub margin_denominator: u64,
    pub reward_account: &'a [u8],
}

/// Pool relay endpoint
#[derive(Copy, Clone, Debug)]
pub enum Relay<'a> {
    SingleHostAddr {
        port: Option<u16>,
        ipv4: Option<&'a [u8; 4]>,
        ipv6: Option<&'a [u8; 16]>,
    },
    SingleHostName {
        port: Option<u16>,
        dns_name: &'a str,
    },
    MultiHostName {
        dns_name: &'a str,
    },
}

/// Pool metadata pointer
#[derive(Copy, Clone, Debug)]
pub struct PoolMetadata<'a> {
    pub url: &'a str,
    pub hash: &'a [u8],
}

fn check_len(bytes: &[u8], expected: usize) -> Result<(), Error> {
    match bytes.len() == expected {
        true => Ok(()),
        false => Err(Error::InvalidItem),
    }
}

fn check_name(name: &str) -> Result<(), Error> {
    match !name.is_empty() && name.len() <= MAX_NAME_LEN {
        true => Ok(()),
        false => Err(Error::InvalidItem),
    }
}

fn optional_port(port: Option<u16>) -> Value<'static> {
    match port {
        Some(port) => Value::Unsigned(port as u64),
        None => Value::Null,
    }
}

/// Validate `cert` and hand its [`Value`] tree to `f`
///
/// The tree borrows stack locals, so it is passed down rather than
/// returned.
fn with_certificate<R>(
    cert: &Certificate,
    f: impl FnOnce(&Value) -> R,
) -> Result<R, Error> {
    match cert {
        Certificate::StakeRegistration { key_hash } => {
            check_len(key_hash, KEY_HASH_LEN)?;

            let credential = [
                Value::Unsigned(STAKE_CREDENTIAL_KEY),
                Value::Bytes(key_hash),
            ];
            let item = [
                Value::Unsigned(CERT_TYPE_STAKE_REGISTRATION),
                Value::Array(&credential),
            ];
            Ok(f(&Value::Array(&item)))
        }
        Certificate::StakeDeregistration { key_hash } => {
            check_len(key_hash, KEY_HASH_LEN)?;

            let credential = [
                Value::Unsigned(STAKE_CREDENTIAL_KEY),
                Value::Bytes(key_hash),
            ];
            let item = [
                Value::Unsigned(CERT_TYPE_STAKE_DEREGISTRATION),
                Value::Array(&credential),
            ];
            Ok(f(&Value::Array(&item)))
        }
        Certificate::StakeDelegation {
            key_hash,
            pool_key_hash,
        } => {
            check_len(key_hash, KEY_HASH_LEN)?;
            check_len(pool_key_hash, KEY_HASH_LEN)?;

            let credential = [
                Value::Unsigned(STAKE_CREDENTIAL_KEY),
                Value::Bytes(key_hash),
            ];
            let item = [
                Value::Unsigned(CERT_TYPE_STAKE_DELEGATION),
                Value::Array(&credential),
                Value::Bytes(pool_key_hash),
            ];
            Ok(f(&Value::Array(&item)))
        }
    }
}

fn with_relay<R>(relay: &Relay, f: impl FnOnce(&Value) -> R) -> Result<R, Error> {
    match relay {
        Relay::SingleHostAddr { port, ipv4, ipv6 } => {
            // at least one address must be present
            if ipv4.is_none() && ipv6.is_none() {
                return Err(Error::InvalidItem);
            }

            let ipv4 = match ipv4 {
                Some(a) => Value::Bytes(*a),
                None => Value::Null,
            };
            let ipv6 = match ipv6 {
                Some(a) => Value::Bytes(*a),
                None => Value::Null,
            };

            let item = [
                Value::Unsigned(RELAY_TYPE_SINGLE_HOST_ADDR),
                optional_port(*port),
                ipv4,
                ipv6,
            ];
            Ok(f(&Value::Array(&item)))
        }
        Relay::SingleHostName { port, dns_name } => {
            check_name(dns_name)?;

            let item = [
                Value::Unsigned(RELAY_TYPE_SINGLE_HOST_NAME),
                optional_port(*port),
                Value::Text(dns_name),
            ];
            Ok(f(&Value::Array(&item)))
        }
        Relay::MultiHostName { dns_name } => {
            check_name(dns_name)?;

            let item = [
                Value::Unsigned(RELAY_TYPE_MULTI_HOST_NAME),
                Value::Text(dns_name),
            ];
            Ok(f(&Value::Array(&item)))
        }
    }
}

/// Add a single-message certificate to an open certificates array
pub fn add_certificate(builder: &mut TxBuilder, cert: &Certificate) -> Result<(), Error> {
    with_certificate(cert, |value| builder.add_simple_certificate(value))?
}

/// Open a pool-registration certificate from its leading parameters
///
/// Owners, relays and metadata follow through the builder's dedicated
/// operations before the certificate is closed.
pub fn begin_pool_registration(
    builder: &mut TxBuilder,
    params: &PoolParams,
) -> Result<(), Error> {
    check_len(params.pool_key_hash, KEY_HASH_LEN)?;
    check_len(params.vrf_key_hash, VRF_KEY_HASH_LEN)?;
    check_len(params.reward_account, REWARD_ACCOUNT_LEN)?;
    if params.margin_denominator == 0 || params.margin_numerator > params.margin_denominator {
        return Err(Error::InvalidItem);
    }

    let margin = [
        Value::Unsigned(params.margin_numerator),
        Value::Unsigned(params.margin_denominator),
    ];
    let fields = [
        Value::Unsigned(CERT_TYPE_POOL_REGISTRATION),
        Value::Bytes(params.pool_key_hash),
        Value::Bytes(params.vrf_key_hash),
        Value::Unsigned(params.pledge),
        Value::Unsigned(params.cost),
        Value::Tagged(TAG_RATIONAL, &Value::Array(&margin)),
        Value::Bytes(params.reward_account),
    ];

    builder.start_pool_registration_certificate(&fields)
}

/// Add one owner key hash to an open pool-owners array
pub fn add_pool_owner(builder: &mut TxBuilder, owner_key_hash: &[u8]) -> Result<(), Error> {
    check_len(owner_key_hash, KEY_HASH_LEN)?;
    builder.add_pool_owner(owner_key_hash)
}

/// Add one relay to an open pool-relays array
pub fn add_relay(builder: &mut TxBuilder, relay: &Relay) -> Result<(), Error> {
    with_relay(relay, |value| builder.add_pool_relay(value))?
}

/// Set the pool-metadata field; `None` records the absence explicitly
pub fn add_pool_metadata(
    builder: &mut TxBuilder,
    metadata: Option<&PoolMetadata>,
) -> Result<(), Error> {
    let metadata = match metadata {
        Some(m) => m,
        None => return builder.add_pool_metadata(None),
    };

    check_name(metadata.url)?;
    check_len(metadata.hash, METADATA_HASH_LEN)?;

    let item = [Value::Text(metadata.url), Value::Bytes(metadata.hash)];
    builder.add_pool_metadata(Some(&Value::Array(&item)))
}
