// Copyright (c) 2023-2024 The cardano-hw-core authors

//! Lazy CBOR collection primitive
//!
//! A [`LazyCollection`] is an array or map of declared cardinality whose
//! elements are supplied one at a time. It produces its own encoding
//! incrementally through [`next_chunk`][LazyCollection::next_chunk]: the
//! header first, then each element's bytes as the element is appended,
//! with a [`Step::Pause`] after every unit so the caller can interleave
//! elements of enclosing collections. At most one appended element is
//! pending at any time, which bounds memory regardless of collection size.

use heapless::Vec;
use static_assertions::const_assert;

use crate::cbor::{self, Major, Value};

use super::{Error, MAX_ITEM_LEN};

const_assert!(MAX_ITEM_LEN >= cbor::MAX_HEADER_LEN);

/// Collection kind, determining the CBOR header major type
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Kind {
    Array,
    Map,
}

impl Kind {
    fn major(&self) -> Major {
        match self {
            Kind::Array => Major::Array,
            Kind::Map => Major::Map,
        }
    }
}

/// One step of a collection's pull-based encoding producer
#[derive(PartialEq, Debug)]
pub enum Step<'a> {
    /// Encoded bytes ready to be fed into the digest
    Chunk(&'a [u8]),
    /// One unit of output consumed, the caller must supply or request the
    /// next unit before continuing
    Pause,
    /// Header and all declared elements fully drained
    Done,
}

/// Producer state, advanced by [`LazyCollection::next_chunk`]
#[derive(Copy, Clone, PartialEq, Debug)]
enum Phase {
    /// Header bytes not yet emitted
    Header,
    /// Header emitted, pause pending
    HeaderPause,
    /// Waiting for the next element
    Idle,
    /// Pending element bytes ready to emit
    Element,
    /// Element emitted, pause pending
    ElementPause,
    /// Nested child collection active, element pause deferred until the
    /// child completes
    ChildPending,
    /// Fully drained
    Done,
}

/// Fixed-cardinality array/map populated one element at a time
pub struct LazyCollection {
    kind: Kind,
    declared: usize,
    appended: usize,
    nested: bool,
    phase: Phase,
    buf: Vec<u8, MAX_ITEM_LEN>,
}

impl LazyCollection {
    /// Create a lazy array with `declared` elements
    pub fn array(declared: usize) -> Self {
        Self::new(Kind::Array, declared)
    }

    /// Create a lazy map with `declared` entries
    pub fn map(declared: usize) -> Self {
        Self::new(Kind::Map, declared)
    }

    fn new(kind: Kind, declared: usize) -> Self {
        Self {
            kind,
            declared,
            appended: 0,
            nested: false,
            phase: Phase::Header,
            buf: Vec::new(),
        }
    }

    /// Collection kind
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Declared element count
    pub fn declared(&self) -> usize {
        self.declared
    }

    /// True once the appended count reaches the declared count
    pub fn is_filled(&self) -> bool {
        self.appended == self.declared
    }

    /// True while a nested child collection owns the byte stream
    pub(crate) fn awaiting_child(&self) -> bool {
        self.phase == Phase::ChildPending
    }

    /// Append an element to a lazy array
    pub fn append(&mut self, value: &Value) -> Result<(), Error> {
        if self.kind != Kind::Array {
            return Err(Error::ItemShape);
        }

        self.start_element()?;
        cbor::encode(value, &mut self.buf)?;
        self.commit_element(false);

        Ok(())
    }

    /// Append a key/value entry to a lazy map
    pub fn append_pair(&mut self, key: &Value, value: &Value) -> Result<(), Error> {
        if self.kind != Kind::Map {
            return Err(Error::ItemShape);
        }

        self.start_element()?;
        cbor::encode(key, &mut self.buf)?;
        cbor::encode(value, &mut self.buf)?;
        self.commit_element(false);

        Ok(())
    }

    /// Append a nested-collection marker, with the entry key for maps
    ///
    /// Only the key (if any) is encoded here; the child's header and
    /// elements are produced by the child's own producer once pushed onto
    /// the hash-builder stack.
    pub(crate) fn append_nested(&mut self, key: Option<&Value>) -> Result<(), Error> {
        match (self.kind, key) {
            (Kind::Array, None) | (Kind::Map, Some(_)) => (),
            _ => return Err(Error::ItemShape),
        }

        self.start_element()?;
        if let Some(key) = key {
            cbor::encode(key, &mut self.buf)?;
        }
        self.commit_element(true);

        Ok(())
    }

    fn start_element(&mut self) -> Result<(), Error> {
        if self.is_filled() {
            return Err(Error::CollectionFull);
        }

        // one-slot backpressure: the previous element must have been
        // drained before the next may be appended
        if self.phase != Phase::Idle {
            return Err(Error::StreamOutOfSync);
        }

        self.buf.clear();
        Ok(())
    }

    fn commit_element(&mut self, nested: bool) {
        self.nested = nested;
        self.appended += 1;
        self.phase = Phase::Element;
    }

    /// Advance the encoding producer by one step
    #[cfg_attr(feature = "noinline", inline(never))]
    pub fn next_chunk(&mut self) -> Step<'_> {
        match self.phase {
            Phase::Header => {
                let mut tmp = [0u8; cbor::MAX_HEADER_LEN];
                let n = cbor::header(self.kind.major(), self.declared as u64, &mut tmp);

                self.buf.clear();
                // capacity checked by const_assert above
                let _ = self.buf.extend_from_slice(&tmp[..n]);

                self.phase = Phase::HeaderPause;
                Step::Chunk(&self.buf)
            }
            Phase::HeaderPause => {
                self.phase = Phase::Idle;
                Step::Pause
            }
            Phase::Idle => {
                if self.is_filled() {
                    self.phase = Phase::Done;
                    Step::Done
                } else {
                    Step::Pause
                }
            }
            Phase::Element => {
                self.phase = match self.nested {
                    true => Phase::ChildPending,
                    false => Phase::ElementPause,
                };
                Step::Chunk(&self.buf)
            }
            Phase::ElementPause => {
                self.phase = Phase::Idle;
                Step::Pause
            }
            Phase::ChildPending => {
                // closing pause consumed once the nested child has finished
                self.nested = false;
                self.phase = Phase::Idle;
                Step::Pause
            }
            Phase::Done => Step::Done,
        }
    }
}
