// Copyright (c) 2023-2024 The cardano-hw-core authors

//! Key derivation and witness seam
//!
//! The engine never touches raw key material directly: the host
//! integration provides a [`Keychain`] implementation backed by the
//! device's derivation hardware, and the engine drives it through
//! [`build_witness`] once the body hash is final. Derived nodes are
//! zeroized as soon as their signature is produced.

use blake2::digest::consts::U28;
use blake2::{Blake2b, Digest};
use zeroize::Zeroize;

use crate::engine::Error;

/// Hardened-derivation index offset
pub const HARDENED: u32 = 0x8000_0000;

/// Length of a derived public key
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of a signature
pub const SIGNATURE_LEN: usize = 64;

/// Length of a public-key hash (Blake2b-224)
pub const PUBLIC_KEY_HASH_LEN: usize = 28;

/// Derivation and signing backend
///
/// Implementations hold the seed; the engine only ever sees derived
/// nodes, which must be wipeable.
pub trait Keychain {
    type Node: Zeroize;

    /// Derive the node at `path` from the seed
    fn derive(&self, path: &[u32]) -> Result<Self::Node, Error>;

    /// Sign a 32-byte message hash with `node`
    fn sign(&self, node: &Self::Node, hash: &[u8; 32]) -> [u8; SIGNATURE_LEN];

    /// Public key of `node`
    fn public_key(&self, node: &Self::Node) -> [u8; PUBLIC_KEY_LEN];
}

impl<T: Keychain> Keychain for &T {
    type Node = T::Node;

    fn derive(&self, path: &[u32]) -> Result<Self::Node, Error> {
        (**self).derive(path)
    }

    fn sign(&self, node: &Self::Node, hash: &[u8; 32]) -> [u8; SIGNATURE_LEN] {
        (**self).sign(node, hash)
    }

    fn public_key(&self, node: &Self::Node) -> [u8; PUBLIC_KEY_LEN] {
        (**self).public_key(node)
    }
}

/// One transaction witness: the signing public key and its signature
/// over the body hash
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Witness {
    pub public_key: [u8; PUBLIC_KEY_LEN],
    pub signature: [u8; SIGNATURE_LEN],
}

/// Derive the node at `path`, sign `tx_hash` with it, and wipe the node
pub fn build_witness<K: Keychain>(
    keychain: &K,
    path: &[u32],
    tx_hash: &[u8; 32],
) -> Result<Witness, Error> {
    let mut node = keychain.derive(path)?;

    let witness = Witness {
        public_key: keychain.public_key(&node),
        signature: keychain.sign(&node, tx_hash),
    };

    node.zeroize();
    Ok(witness)
}

/// Blake2b-224 hash of a public key, as used in addresses and
/// credentials
pub fn public_key_hash(public_key: &[u8; PUBLIC_KEY_LEN]) -> [u8; PUBLIC_KEY_HASH_LEN] {
    Blake2b::<U28>::digest(public_key).into()
}
