// Copyright (c) 2023-2024 The cardano-hw-core authors

//! End-to-end signing-session flows checked against an independent CBOR
//! encoder

use std::cell::RefCell;
use std::collections::BTreeMap;

use blake2::digest::{
    consts::U32, FixedOutput, FixedOutputReset, HashMarker, Output, OutputSizeUser, Reset, Update,
};
use blake2::{Blake2b, Digest};
use serde_cbor::Value as Ref;

use cardano_hw_core::engine::{assemble, open_stream, tx_body_item_count, Error, State};
use cardano_hw_core::keychain::{build_witness, Keychain, HARDENED};

fn init_logging() {
    let _ = simplelog::SimpleLogger::init(log::LevelFilter::Debug, Default::default());
}

fn reference_hash(body: &Ref) -> anyhow::Result<[u8; 32]> {
    let encoded = serde_cbor::to_vec(body)?;
    Ok(Blake2b::<U32>::digest(&encoded).into())
}

fn ref_map(entries: Vec<(Ref, Ref)>) -> Ref {
    Ref::Map(BTreeMap::from_iter(entries))
}

fn ref_bytes(b: &[u8]) -> Ref {
    Ref::Bytes(b.to_vec())
}

fn ref_uint(v: u64) -> Ref {
    Ref::Integer(v as i128)
}

const INPUT_HASH: [u8; 32] = [0x1f; 32];
const ADDRESS: [u8; 29] = [0x2b; 29];

/// Minimal transfer: one input, one output, fee and ttl
#[test]
fn simple_transfer() -> anyhow::Result<()> {
    init_logging();

    let mut b = open_stream(tx_body_item_count(true, false, false, false, false));

    b.start_inputs(1)?;
    b.add_input(&INPUT_HASH, 0)?;
    b.finish_inputs()?;

    b.start_outputs(1)?;
    b.add_simple_output(3_003_112, &ADDRESS)?;
    b.finish_outputs()?;

    b.add_fee(42)?;
    b.add_ttl(Some(10))?;
    b.finish()?;

    assert_eq!(b.state(), State::Finished);

    let expected = reference_hash(&ref_map(vec![
        (
            ref_uint(0),
            Ref::Array(vec![Ref::Array(vec![ref_bytes(&INPUT_HASH), ref_uint(0)])]),
        ),
        (
            ref_uint(1),
            Ref::Array(vec![Ref::Array(vec![
                ref_bytes(&ADDRESS),
                ref_uint(3_003_112),
            ])]),
        ),
        (ref_uint(2), ref_uint(42)),
        (ref_uint(3), ref_uint(10)),
    ]))?;

    assert_eq!(b.tx_hash(), Ok(expected));
    Ok(())
}

/// Smallest legal body: inputs, outputs and fee only
#[test]
fn minimal_transfer() -> anyhow::Result<()> {
    init_logging();

    let mut b = open_stream(tx_body_item_count(false, false, false, false, false));

    b.start_inputs(1)?;
    b.add_input(&INPUT_HASH, 0)?;
    b.finish_inputs()?;

    b.start_outputs(1)?;
    b.add_simple_output(100, &ADDRESS)?;
    b.finish_outputs()?;

    b.add_fee(10)?;
    b.finish()?;

    let expected = reference_hash(&ref_map(vec![
        (
            ref_uint(0),
            Ref::Array(vec![Ref::Array(vec![ref_bytes(&INPUT_HASH), ref_uint(0)])]),
        ),
        (
            ref_uint(1),
            Ref::Array(vec![Ref::Array(vec![ref_bytes(&ADDRESS), ref_uint(100)])]),
        ),
        (ref_uint(2), ref_uint(10)),
    ]))?;

    assert_eq!(b.tx_hash(), Ok(expected));
    Ok(())
}

/// Output carrying a token bundle: two asset groups, interleaved with a
/// plain output in the same outputs array
#[test]
fn multiasset_output() -> anyhow::Result<()> {
    init_logging();

    let policy_a = [0x11u8; 28];
    let policy_b = [0x22u8; 28];

    let mut b = open_stream(tx_body_item_count(false, false, false, false, false));

    b.start_inputs(1)?;
    b.add_input(&INPUT_HASH, 3)?;
    b.finish_inputs()?;

    b.start_outputs(2)?;

    b.add_output_with_tokens(1_000_000, &ADDRESS)?;
    b.start_asset_groups(2)?;
    b.add_asset_group(&policy_a, 2)?;
    b.add_token(b"asset1", 100)?;
    b.add_token(b"asset2", 200)?;
    b.finish_tokens()?;
    b.add_asset_group(&policy_b, 1)?;
    b.add_token(b"asset3", 300)?;
    b.finish_tokens()?;
    b.finish_asset_groups()?;
    b.finish_output_with_tokens()?;

    b.add_simple_output(2_000_000, &ADDRESS)?;
    b.finish_outputs()?;

    b.add_fee(180_000)?;
    b.finish()?;

    let token_output = Ref::Array(vec![
        ref_bytes(&ADDRESS),
        Ref::Array(vec![
            ref_uint(1_000_000),
            ref_map(vec![
                (
                    ref_bytes(&policy_a),
                    ref_map(vec![
                        (ref_bytes(b"asset1"), ref_uint(100)),
                        (ref_bytes(b"asset2"), ref_uint(200)),
                    ]),
                ),
                (
                    ref_bytes(&policy_b),
                    ref_map(vec![(ref_bytes(b"asset3"), ref_uint(300))]),
                ),
            ]),
        ]),
    ]);

    let expected = reference_hash(&ref_map(vec![
        (
            ref_uint(0),
            Ref::Array(vec![Ref::Array(vec![ref_bytes(&INPUT_HASH), ref_uint(3)])]),
        ),
        (
            ref_uint(1),
            Ref::Array(vec![
                token_output,
                Ref::Array(vec![ref_bytes(&ADDRESS), ref_uint(2_000_000)]),
            ]),
        ),
        (ref_uint(2), ref_uint(180_000)),
    ]))?;

    assert_eq!(b.tx_hash(), Ok(expected));
    Ok(())
}

/// All optional body sections present, with single-message certificates
#[test]
fn full_body_with_certificates_and_withdrawals() -> anyhow::Result<()> {
    init_logging();

    let stake_key_hash = [0x33u8; 28];
    let pool_key_hash = [0x44u8; 28];
    let reward_address = [0x55u8; 29];
    let aux_hash = [0x66u8; 32];

    let mut b = open_stream(tx_body_item_count(true, true, true, true, true));

    b.start_inputs(1)?;
    b.add_input(&INPUT_HASH, 1)?;
    b.finish_inputs()?;

    b.start_outputs(1)?;
    b.add_simple_output(500_000, &ADDRESS)?;
    b.finish_outputs()?;

    b.add_fee(170_000)?;
    b.add_ttl(Some(8_000_000))?;

    b.start_certificates(2)?;
    assemble::add_certificate(
        &mut b,
        &assemble::Certificate::StakeRegistration {
            key_hash: &stake_key_hash,
        },
    )?;
    assemble::add_certificate(
        &mut b,
        &assemble::Certificate::StakeDelegation {
            key_hash: &stake_key_hash,
            pool_key_hash: &pool_key_hash,
        },
    )?;
    b.finish_certificates()?;

    b.start_withdrawals(1)?;
    b.add_withdrawal(&reward_address, 7_456_123)?;
    b.finish_withdrawals()?;

    b.add_auxiliary_data_hash(&aux_hash)?;
    b.add_validity_interval_start(Some(47))?;
    b.finish()?;

    let credential = Ref::Array(vec![ref_uint(0), ref_bytes(&stake_key_hash)]);
    let expected = reference_hash(&ref_map(vec![
        (
            ref_uint(0),
            Ref::Array(vec![Ref::Array(vec![ref_bytes(&INPUT_HASH), ref_uint(1)])]),
        ),
        (
            ref_uint(1),
            Ref::Array(vec![Ref::Array(vec![
                ref_bytes(&ADDRESS),
                ref_uint(500_000),
            ])]),
        ),
        (ref_uint(2), ref_uint(170_000)),
        (ref_uint(3), ref_uint(8_000_000)),
        (
            ref_uint(4),
            Ref::Array(vec![
                Ref::Array(vec![ref_uint(0), credential.clone()]),
                Ref::Array(vec![ref_uint(2), credential, ref_bytes(&pool_key_hash)]),
            ]),
        ),
        (
            ref_uint(5),
            ref_map(vec![(ref_bytes(&reward_address), ref_uint(7_456_123))]),
        ),
        (ref_uint(7), ref_bytes(&aux_hash)),
        (ref_uint(8), ref_uint(47)),
    ]))?;

    assert_eq!(b.tx_hash(), Ok(expected));
    Ok(())
}

/// Multi-message pool-registration certificate, checked against a fixed
/// digest (the rational-margin tag is outside the reference encoder's
/// value model)
#[test]
fn pool_registration() -> anyhow::Result<()> {
    init_logging();

    let params = assemble::PoolParams {
        pool_key_hash: &[0x0d; 28],
        vrf_key_hash: &[0x0e; 32],
        pledge: 64_000_000,
        cost: 340_000_000,
        margin_numerator: 3,
        margin_denominator: 100,
        reward_account: &[0x0f; 29],
    };

    let mut b = open_stream(tx_body_item_count(true, true, false, false, false));

    b.start_inputs(1)?;
    b.add_input(&INPUT_HASH, 0)?;
    b.finish_inputs()?;

    b.start_outputs(1)?;
    b.add_simple_output(2_000_000, &[0x2b; 29])?;
    b.finish_outputs()?;

    b.add_fee(180_000)?;
    b.add_ttl(Some(7_000_000))?;

    b.start_certificates(1)?;
    assemble::begin_pool_registration(&mut b, &params)?;

    b.start_pool_owners(2)?;
    assemble::add_pool_owner(&mut b, &[0xaa; 28])?;
    assemble::add_pool_owner(&mut b, &[0xbb; 28])?;
    b.finish_pool_owners()?;

    b.start_pool_relays(2)?;
    assemble::add_relay(
        &mut b,
        &assemble::Relay::SingleHostAddr {
            port: Some(3001),
            ipv4: Some(&[192, 168, 0, 1]),
            ipv6: None,
        },
    )?;
    assemble::add_relay(
        &mut b,
        &assemble::Relay::MultiHostName {
            dns_name: "relays.example.com",
        },
    )?;
    b.finish_pool_relays()?;

    assemble::add_pool_metadata(
        &mut b,
        Some(&assemble::PoolMetadata {
            url: "https://pool.example.com",
            hash: &[0x11; 32],
        }),
    )?;
    b.finish_pool_registration_certificate()?;
    b.finish_certificates()?;
    b.finish()?;

    let expected: [u8; 32] = hex::decode(
        "907e2349b54e35073754176a64a860752219b591b47f174c7026d1014616707f",
    )?
    .as_slice()
    .try_into()?;

    assert_eq!(b.tx_hash(), Ok(expected));
    Ok(())
}

/// Out-of-order operations abort the session without producing a hash
#[test]
fn out_of_order_operations_fail() -> anyhow::Result<()> {
    init_logging();

    let mut b = open_stream(3);
    b.start_inputs(2)?;
    b.add_input(&INPUT_HASH, 0)?;

    // fee while inputs are still open
    assert_eq!(b.add_fee(42), Err(Error::InvalidState));

    // finishing inputs below their declared count
    assert_eq!(b.finish_inputs(), Err(Error::CollectionNotFilled));

    Ok(())
}

#[test]
fn hash_unavailable_before_finish() -> anyhow::Result<()> {
    init_logging();

    let mut b = open_stream(3);
    b.start_inputs(1)?;
    b.add_input(&INPUT_HASH, 0)?;
    b.finish_inputs()?;

    b.start_outputs(1)?;
    b.add_simple_output(1_000_000, &ADDRESS)?;
    b.finish_outputs()?;

    b.add_fee(42)?;

    assert_eq!(b.tx_hash(), Err(Error::NotFinished));
    Ok(())
}

thread_local! {
    static STREAMED: RefCell<Vec<u8>> = RefCell::new(Vec::new());
}

/// Digest stand-in recording every streamed byte, so the exact encoding
/// can be decoded back
#[derive(Default)]
struct CaptureDigest;

impl Update for CaptureDigest {
    fn update(&mut self, data: &[u8]) {
        STREAMED.with(|b| b.borrow_mut().extend_from_slice(data));
    }
}

impl OutputSizeUser for CaptureDigest {
    type OutputSize = U32;
}

impl FixedOutput for CaptureDigest {
    fn finalize_into(self, _out: &mut Output<Self>) {}
}

impl Reset for CaptureDigest {
    fn reset(&mut self) {
        STREAMED.with(|b| b.borrow_mut().clear());
    }
}

impl FixedOutputReset for CaptureDigest {
    fn finalize_into_reset(&mut self, _out: &mut Output<Self>) {}
}

impl HashMarker for CaptureDigest {}

/// The streamed byte sequence is itself a well-formed encoding of the
/// structure fed in
#[test]
fn streamed_bytes_decode() -> anyhow::Result<()> {
    use cardano_hw_core::cbor::Value;
    use cardano_hw_core::engine::{HashBuilder, LazyCollection};

    init_logging();
    STREAMED.with(|b| b.borrow_mut().clear());

    let mut h = HashBuilder::<CaptureDigest>::new(LazyCollection::map(2));

    h.add_collection_at_key(&Value::Unsigned(0), LazyCollection::array(1))?;
    h.add_item(&Value::Array(&[Value::Bytes(&INPUT_HASH), Value::Unsigned(7)]))?;
    h.finish_collection()?;

    h.add_pair(&Value::Unsigned(2), &Value::Unsigned(42))?;
    h.finish_collection()?;
    let _ = h.digest()?;

    let streamed = STREAMED.with(|b| b.borrow().clone());
    let decoded: Ref = serde_cbor::from_slice(&streamed)?;

    assert_eq!(
        decoded,
        ref_map(vec![
            (
                ref_uint(0),
                Ref::Array(vec![Ref::Array(vec![ref_bytes(&INPUT_HASH), ref_uint(7)])]),
            ),
            (ref_uint(2), ref_uint(42)),
        ])
    );
    Ok(())
}

/// Body hash feeds straight into witness construction
#[test]
fn witness_over_body_hash() -> anyhow::Result<()> {
    init_logging();

    struct FixedKeychain;
    struct Node([u8; 32]);

    impl zeroize::Zeroize for Node {
        fn zeroize(&mut self) {
            self.0.zeroize();
        }
    }

    impl Keychain for FixedKeychain {
        type Node = Node;

        fn derive(&self, path: &[u32]) -> Result<Node, Error> {
            let mut n = [0u8; 32];
            for (i, index) in path.iter().enumerate() {
                n[i % 32] ^= *index as u8;
            }
            Ok(Node(n))
        }

        fn sign(&self, node: &Node, hash: &[u8; 32]) -> [u8; 64] {
            let mut sig = [0u8; 64];
            sig[..32].copy_from_slice(&node.0);
            sig[32..].copy_from_slice(hash);
            sig
        }

        fn public_key(&self, node: &Node) -> [u8; 32] {
            node.0
        }
    }

    let mut b = open_stream(3);
    b.start_inputs(1)?;
    b.add_input(&INPUT_HASH, 0)?;
    b.finish_inputs()?;
    b.start_outputs(1)?;
    b.add_simple_output(1_000_000, &ADDRESS)?;
    b.finish_outputs()?;
    b.add_fee(42)?;
    b.finish()?;

    let hash = b.tx_hash().map_err(|e| anyhow::anyhow!("{e:?}"))?;

    let path = [HARDENED + 1852, HARDENED + 1815, HARDENED, 0, 0];
    let witness = build_witness(&FixedKeychain, &path, &hash)
        .map_err(|e| anyhow::anyhow!("{e:?}"))?;

    assert_eq!(&witness.signature[32..], &hash[..]);
    Ok(())
}
