// Copyright (c) 2023-2024 The cardano-hw-core authors

//! Transaction-body builder and protocol state machine
//!
//! [`TxBuilder`] wraps the streaming [`HashBuilder`] with the named
//! operations of the signing protocol and a strict transition table
//! mirroring the fixed message order: inputs, outputs (with optional
//! nested token bundles), fee, ttl, certificates (with the multi-message
//! pool-registration flow), withdrawals, auxiliary-data hash and
//! validity-interval-start. Any operation fired outside its legal states
//! fails with [`Error::InvalidState`] and the session must be discarded.

use strum::{Display, EnumIter, EnumString, EnumVariantNames};

use crate::cbor::Value;

use super::{Blake2b256, Error, HashBuilder, LazyCollection};

/// Transaction-body map keys, fixed by the on-chain binary format
pub const TX_BODY_KEY_INPUTS: u64 = 0;
pub const TX_BODY_KEY_OUTPUTS: u64 = 1;
pub const TX_BODY_KEY_FEE: u64 = 2;
pub const TX_BODY_KEY_TTL: u64 = 3;
pub const TX_BODY_KEY_CERTIFICATES: u64 = 4;
pub const TX_BODY_KEY_WITHDRAWALS: u64 = 5;
pub const TX_BODY_KEY_AUXILIARY_DATA: u64 = 7;
pub const TX_BODY_KEY_VALIDITY_INTERVAL_START: u64 = 8;

/// Pool-registration certificate body cardinality
/// (type, 6 scalar parameters, owners, relays, metadata)
pub const POOL_REGISTRATION_ITEM_COUNT: usize = 10;

/// Leading scalar fields of a pool-registration certificate, supplied in
/// the opening protocol message before owners and relays arrive
pub const POOL_REGISTRATION_LEADING_FIELDS: usize = POOL_REGISTRATION_ITEM_COUNT - 3;

/// Builder protocol phase
#[derive(Copy, Clone, PartialEq, Debug, EnumString, Display, EnumVariantNames, EnumIter)]
pub enum State {
    /// Session opened, nothing received
    Start,
    /// Receiving inputs
    Inputs,
    InputsDone,
    /// Receiving outputs
    Outputs,
    /// Output with tokens opened, waiting for its asset groups
    OutputTokensInit,
    /// Receiving asset groups of the current output
    AssetGroups,
    /// Receiving tokens of the current asset group
    Tokens,
    AssetGroupsDone,
    OutputsDone,
    FeeSet,
    TtlSet,
    /// Receiving certificates
    Certificates,
    /// Pool registration opened, leading fields written
    PoolCertInit,
    PoolOwners,
    PoolOwnersDone,
    PoolRelays,
    PoolRelaysDone,
    PoolMetadataSet,
    CertificatesDone,
    /// Receiving withdrawals
    Withdrawals,
    WithdrawalsDone,
    AuxDataSet,
    ValidityStartSet,
    /// Body closed, digest readable
    Finished,
}

/// Builder operations, one per protocol message kind
#[derive(Copy, Clone, PartialEq, Debug, Display, EnumIter)]
pub enum Action {
    InputsStart,
    InputAdd,
    InputsFinish,
    OutputsStart,
    OutputAddSimple,
    OutputAddWithTokens,
    AssetGroupsStart,
    AssetGroupAdd,
    TokenAdd,
    TokensFinish,
    AssetGroupsFinish,
    OutputFinish,
    OutputsFinish,
    FeeAdd,
    TtlAdd,
    CertificatesStart,
    CertificateAddSimple,
    CertificateAddPoolRegistration,
    PoolOwnersStart,
    PoolOwnerAdd,
    PoolOwnersFinish,
    PoolRelaysStart,
    PoolRelayAdd,
    PoolRelaysFinish,
    PoolMetadataAdd,
    CertificateFinish,
    CertificatesFinish,
    WithdrawalsStart,
    WithdrawalAdd,
    WithdrawalsFinish,
    AuxiliaryDataAdd,
    ValidityStartAdd,
    Finish,
}

/// Transition table: the next state for `action` fired in `state`, or
/// `None` where the pair is illegal
pub fn transition(state: State, action: Action) -> Option<State> {
    use Action::*;
    use State::*;

    let next = match (state, action) {
        (Start, InputsStart) => Inputs,
        (Inputs, InputAdd) => Inputs,
        (Inputs, InputsFinish) => InputsDone,

        (InputsDone, OutputsStart) => Outputs,
        (Outputs, OutputAddSimple) => Outputs,
        (Outputs, OutputAddWithTokens) => OutputTokensInit,
        (OutputTokensInit, AssetGroupsStart) => AssetGroups,
        (AssetGroups, AssetGroupAdd) => Tokens,
        (Tokens, TokenAdd) => Tokens,
        (Tokens, TokensFinish) => AssetGroups,
        (AssetGroups, AssetGroupsFinish) => AssetGroupsDone,
        (AssetGroupsDone, OutputFinish) => Outputs,
        (Outputs, OutputsFinish) => OutputsDone,

        (OutputsDone, FeeAdd) => FeeSet,
        (FeeSet, TtlAdd) => TtlSet,

        (FeeSet | TtlSet, CertificatesStart) => Certificates,
        (Certificates, CertificateAddSimple) => Certificates,
        (Certificates, CertificateAddPoolRegistration) => PoolCertInit,
        (PoolCertInit, PoolOwnersStart) => PoolOwners,
        (PoolOwners, PoolOwnerAdd) => PoolOwners,
        (PoolOwners, PoolOwnersFinish) => PoolOwnersDone,
        (PoolOwnersDone, PoolRelaysStart) => PoolRelays,
        (PoolRelays, PoolRelayAdd) => PoolRelays,
        (PoolRelays, PoolRelaysFinish) => PoolRelaysDone,
        (PoolRelaysDone, PoolMetadataAdd) => PoolMetadataSet,
        (PoolMetadataSet, CertificateFinish) => Certificates,
        (Certificates, CertificatesFinish) => CertificatesDone,

        (FeeSet | TtlSet | CertificatesDone, WithdrawalsStart) => Withdrawals,
        (Withdrawals, WithdrawalAdd) => Withdrawals,
        (Withdrawals, WithdrawalsFinish) => WithdrawalsDone,

        (
            FeeSet | TtlSet | CertificatesDone | WithdrawalsDone,
            AuxiliaryDataAdd,
        ) => AuxDataSet,
        (
            FeeSet | TtlSet | CertificatesDone | WithdrawalsDone | AuxDataSet,
            ValidityStartAdd,
        ) => ValidityStartSet,
        (
            FeeSet | TtlSet | CertificatesDone | WithdrawalsDone | AuxDataSet | ValidityStartSet,
            Finish,
        ) => Finished,

        _ => return None,
    };

    Some(next)
}

/// Compute the transaction-body map cardinality from the optional-section
/// presence flags
///
/// Inputs, outputs and fee are always present. The root map header
/// commits to this count before any entry is written, so it must be
/// known up front.
pub fn tx_body_item_count(
    has_ttl: bool,
    has_certificates: bool,
    has_withdrawals: bool,
    has_auxiliary_data: bool,
    has_validity_interval_start: bool,
) -> usize {
    let optional = [
        has_ttl,
        has_certificates,
        has_withdrawals,
        has_auxiliary_data,
        has_validity_interval_start,
    ];

    3 + optional.iter().filter(|present| **present).count()
}

/// Streaming transaction-body builder
pub struct TxBuilder {
    hash: HashBuilder<Blake2b256>,
    state: State,
}

impl TxBuilder {
    /// Create a builder for a body map of `body_item_count` entries
    /// (see [`tx_body_item_count`])
    pub fn new(body_item_count: usize) -> Self {
        Self {
            hash: HashBuilder::new(LazyCollection::map(body_item_count)),
            state: State::Start,
        }
    }

    /// Current protocol phase
    pub fn state(&self) -> State {
        self.state
    }

    fn step(&mut self, action: Action) -> Result<(), Error> {
        match transition(self.state, action) {
            Some(next) => {
                self.state = next;
                Ok(())
            }
            None => {
                #[cfg(feature = "log")]
                log::error!("illegal action {} in state {}", action, self.state);

                Err(Error::InvalidState)
            }
        }
    }

    /// Open the inputs array under key 0
    pub fn start_inputs(&mut self, inputs_count: usize) -> Result<(), Error> {
        self.step(Action::InputsStart)?;
        self.hash.add_collection_at_key(
            &Value::Unsigned(TX_BODY_KEY_INPUTS),
            LazyCollection::array(inputs_count),
        )
    }

    /// Add one input as `[prev_hash, prev_index]`
    ///
    /// Inputs are emitted in the order received, no sorting.
    pub fn add_input(&mut self, prev_hash: &[u8], prev_index: u64) -> Result<(), Error> {
        self.step(Action::InputAdd)?;
        self.hash.add_item(&Value::Array(&[
            Value::Bytes(prev_hash),
            Value::Unsigned(prev_index),
        ]))
    }

    pub fn finish_inputs(&mut self) -> Result<(), Error> {
        self.step(Action::InputsFinish)?;
        self.hash.finish_collection()
    }

    /// Open the outputs array under key 1
    pub fn start_outputs(&mut self, outputs_count: usize) -> Result<(), Error> {
        self.step(Action::OutputsStart)?;
        self.hash.add_collection_at_key(
            &Value::Unsigned(TX_BODY_KEY_OUTPUTS),
            LazyCollection::array(outputs_count),
        )
    }

    /// Add a token-less output as `[address, amount]`
    pub fn add_simple_output(&mut self, amount: u64, address: &[u8]) -> Result<(), Error> {
        self.step(Action::OutputAddSimple)?;
        self.hash.add_item(&Value::Array(&[
            Value::Bytes(address),
            Value::Unsigned(amount),
        ]))
    }

    /// Open an output carrying a token bundle
    ///
    /// The output structure is `[address, [amount, asset_groups]]`; this
    /// writes the address and amount, leaving both nested arrays open for
    /// the asset-group calls that follow.
    pub fn add_output_with_tokens(&mut self, amount: u64, address: &[u8]) -> Result<(), Error> {
        self.step(Action::OutputAddWithTokens)?;

        self.hash.add_collection(LazyCollection::array(2))?;
        self.hash.add_item(&Value::Bytes(address))?;
        self.hash.add_collection(LazyCollection::array(2))?;
        self.hash.add_item(&Value::Unsigned(amount))
    }

    /// Open the asset-groups map of the current output
    pub fn start_asset_groups(&mut self, asset_groups_count: usize) -> Result<(), Error> {
        self.step(Action::AssetGroupsStart)?;
        self.hash.add_collection(LazyCollection::map(asset_groups_count))
    }

    /// Open one asset group keyed by `policy_id`
    ///
    /// Keys are emitted exactly as supplied; duplicate detection is the
    /// caller's responsibility.
    pub fn add_asset_group(&mut self, policy_id: &[u8], tokens_count: usize) -> Result<(), Error> {
        self.step(Action::AssetGroupAdd)?;
        self.hash.add_collection_at_key(
            &Value::Bytes(policy_id),
            LazyCollection::map(tokens_count),
        )
    }

    pub fn add_token(&mut self, asset_name: &[u8], amount: u64) -> Result<(), Error> {
        self.step(Action::TokenAdd)?;
        self.hash
            .add_pair(&Value::Bytes(asset_name), &Value::Unsigned(amount))
    }

    pub fn finish_tokens(&mut self) -> Result<(), Error> {
        self.step(Action::TokensFinish)?;
        self.hash.finish_collection()
    }

    pub fn finish_asset_groups(&mut self) -> Result<(), Error> {
        self.step(Action::AssetGroupsFinish)?;
        self.hash.finish_collection()
    }

    /// Close an output opened with [`add_output_with_tokens`]
    pub fn finish_output_with_tokens(&mut self) -> Result<(), Error> {
        self.step(Action::OutputFinish)?;

        // two pops: the inner [amount, asset_groups] array, then the
        // enclosing [address, ..] array
        self.hash.finish_collection()?;
        self.hash.finish_collection()
    }

    pub fn finish_outputs(&mut self) -> Result<(), Error> {
        self.step(Action::OutputsFinish)?;
        self.hash.finish_collection()
    }

    pub fn add_fee(&mut self, fee: u64) -> Result<(), Error> {
        self.step(Action::FeeAdd)?;
        self.hash
            .add_pair(&Value::Unsigned(TX_BODY_KEY_FEE), &Value::Unsigned(fee))
    }

    /// Add the ttl entry; `None` skips the entry (and the transition)
    pub fn add_ttl(&mut self, ttl: Option<u64>) -> Result<(), Error> {
        let ttl = match ttl {
            Some(v) => v,
            None => return Ok(()),
        };

        self.step(Action::TtlAdd)?;
        self.hash
            .add_pair(&Value::Unsigned(TX_BODY_KEY_TTL), &Value::Unsigned(ttl))
    }

    /// Open the certificates array under key 4
    pub fn start_certificates(&mut self, certificates_count: usize) -> Result<(), Error> {
        self.step(Action::CertificatesStart)?;
        self.hash.add_collection_at_key(
            &Value::Unsigned(TX_BODY_KEY_CERTIFICATES),
            LazyCollection::array(certificates_count),
        )
    }

    /// Add a certificate that fits in a single protocol message
    /// (see [`assemble::add_certificate`][super::assemble::add_certificate])
    pub fn add_simple_certificate(&mut self, certificate: &Value) -> Result<(), Error> {
        self.step(Action::CertificateAddSimple)?;
        self.hash.add_item(certificate)
    }

    /// Open a pool-registration certificate and write its leading scalar
    /// fields
    ///
    /// The certificate body is a 10-element array whose owners, relays
    /// and metadata arrive in later protocol messages; `fields` must hold
    /// exactly the [`POOL_REGISTRATION_LEADING_FIELDS`] items preceding
    /// them.
    pub fn start_pool_registration_certificate(
        &mut self,
        fields: &[Value],
    ) -> Result<(), Error> {
        if fields.len() != POOL_REGISTRATION_LEADING_FIELDS {
            return Err(Error::InvalidItem);
        }

        self.step(Action::CertificateAddPoolRegistration)?;
        self.hash
            .add_collection(LazyCollection::array(POOL_REGISTRATION_ITEM_COUNT))?;

        for field in fields {
            self.hash.add_item(field)?;
        }

        Ok(())
    }

    pub fn start_pool_owners(&mut self, owners_count: usize) -> Result<(), Error> {
        self.step(Action::PoolOwnersStart)?;
        self.hash.add_collection(LazyCollection::array(owners_count))
    }

    pub fn add_pool_owner(&mut self, owner_key_hash: &[u8]) -> Result<(), Error> {
        self.step(Action::PoolOwnerAdd)?;
        self.hash.add_item(&Value::Bytes(owner_key_hash))
    }

    pub fn finish_pool_owners(&mut self) -> Result<(), Error> {
        self.step(Action::PoolOwnersFinish)?;
        self.hash.finish_collection()
    }

    pub fn start_pool_relays(&mut self, relays_count: usize) -> Result<(), Error> {
        self.step(Action::PoolRelaysStart)?;
        self.hash.add_collection(LazyCollection::array(relays_count))
    }

    pub fn add_pool_relay(&mut self, relay: &Value) -> Result<(), Error> {
        self.step(Action::PoolRelayAdd)?;
        self.hash.add_item(relay)
    }

    pub fn finish_pool_relays(&mut self) -> Result<(), Error> {
        self.step(Action::PoolRelaysFinish)?;
        self.hash.finish_collection()
    }

    /// Add the pool-metadata field; `None` encodes CBOR null
    ///
    /// Unlike ttl this field is positional within the certificate body,
    /// so an absent value still occupies its element.
    pub fn add_pool_metadata(&mut self, metadata: Option<&Value>) -> Result<(), Error> {
        self.step(Action::PoolMetadataAdd)?;
        self.hash.add_item(metadata.unwrap_or(&Value::Null))
    }

    pub fn finish_pool_registration_certificate(&mut self) -> Result<(), Error> {
        self.step(Action::CertificateFinish)?;
        self.hash.finish_collection()
    }

    pub fn finish_certificates(&mut self) -> Result<(), Error> {
        self.step(Action::CertificatesFinish)?;
        self.hash.finish_collection()
    }

    /// Open the withdrawals map under key 5
    pub fn start_withdrawals(&mut self, withdrawals_count: usize) -> Result<(), Error> {
        self.step(Action::WithdrawalsStart)?;
        self.hash.add_collection_at_key(
            &Value::Unsigned(TX_BODY_KEY_WITHDRAWALS),
            LazyCollection::map(withdrawals_count),
        )
    }

    pub fn add_withdrawal(&mut self, reward_address: &[u8], amount: u64) -> Result<(), Error> {
        self.step(Action::WithdrawalAdd)?;
        self.hash
            .add_pair(&Value::Bytes(reward_address), &Value::Unsigned(amount))
    }

    pub fn finish_withdrawals(&mut self) -> Result<(), Error> {
        self.step(Action::WithdrawalsFinish)?;
        self.hash.finish_collection()
    }

    pub fn add_auxiliary_data_hash(&mut self, auxiliary_data_hash: &[u8]) -> Result<(), Error> {
        self.step(Action::AuxiliaryDataAdd)?;
        self.hash.add_pair(
            &Value::Unsigned(TX_BODY_KEY_AUXILIARY_DATA),
            &Value::Bytes(auxiliary_data_hash),
        )
    }

    /// Add the validity-interval-start entry; `None` skips the entry
    /// (and the transition)
    pub fn add_validity_interval_start(&mut self, start: Option<u64>) -> Result<(), Error> {
        let start = match start {
            Some(v) => v,
            None => return Ok(()),
        };

        self.step(Action::ValidityStartAdd)?;
        self.hash.add_pair(
            &Value::Unsigned(TX_BODY_KEY_VALIDITY_INTERVAL_START),
            &Value::Unsigned(start),
        )
    }

    /// Close the body map
    pub fn finish(&mut self) -> Result<(), Error> {
        self.step(Action::Finish)?;
        self.hash.finish_collection()
    }

    /// Finalize and return the transaction-body hash
    ///
    /// Legal only after [`finish`][Self::finish]; consumes the builder so
    /// the digest is read exactly once.
    pub fn tx_hash(self) -> Result<[u8; 32], Error> {
        if self.state != State::Finished {
            return Err(Error::NotFinished);
        }

        let digest = self.hash.digest()?;
        Ok(digest.into())
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: State) {
        self.state = state;
    }
}

/// Open a signing-session stream over a body map of `body_item_count`
/// entries
pub fn open_stream(body_item_count: usize) -> TxBuilder {
    TxBuilder::new(body_item_count)
}
