// Copyright (c) 2023-2024 The cardano-hw-core authors

//! Streaming hash builder
//!
//! Combines a stack of open [`LazyCollection`]s with a running digest:
//! items appended to the innermost open collection are encoded and fed
//! into the digest immediately, so the digest reflects exactly one
//! well-formed encoding of the structure while only the open headers and
//! one pending item are ever held in memory.

use blake2::digest::{Digest, Output};
use heapless::Vec;

use crate::cbor::Value;

use super::{Error, Kind, LazyCollection, Step, MAX_DEPTH};

/// Streaming digest over a stack of open lazy collections
/// (innermost last)
pub struct HashBuilder<D: Digest> {
    digest: D,
    stack: Vec<LazyCollection, MAX_DEPTH>,
}

impl<D: Digest> HashBuilder<D> {
    /// Create a builder over `root`, draining the root header into the
    /// digest immediately
    pub fn new(root: LazyCollection) -> Self {
        let mut builder = Self {
            digest: D::new(),
            stack: Vec::new(),
        };

        // MAX_DEPTH >= 1, the empty stack always has room for the root
        let _ = builder.stack.push(root);
        builder.drain_top();

        builder
    }

    /// Number of currently open collections
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Append an element to the innermost open collection (array context)
    pub fn add_item(&mut self, value: &Value) -> Result<(), Error> {
        let top = self.stack.last_mut().ok_or(Error::StackEmpty)?;
        top.append(value)?;

        self.drain_top();
        Ok(())
    }

    /// Append a key/value entry to the innermost open collection
    /// (map context)
    pub fn add_pair(&mut self, key: &Value, value: &Value) -> Result<(), Error> {
        let top = self.stack.last_mut().ok_or(Error::StackEmpty)?;
        top.append_pair(key, value)?;

        self.drain_top();
        Ok(())
    }

    /// Append `sub` as an element of the innermost collection (which must
    /// be an array) and make it the new active collection
    pub fn add_collection(&mut self, sub: LazyCollection) -> Result<(), Error> {
        self.push_collection(None, sub)
    }

    /// Append `sub` under `key` in the innermost collection (which must
    /// be a map) and make it the new active collection
    pub fn add_collection_at_key(
        &mut self,
        key: &Value,
        sub: LazyCollection,
    ) -> Result<(), Error> {
        self.push_collection(Some(key), sub)
    }

    fn push_collection(&mut self, key: Option<&Value>, sub: LazyCollection) -> Result<(), Error> {
        let top = self.stack.last_mut().ok_or(Error::StackEmpty)?;
        top.append_nested(key)?;

        // emit the entry key (if any); the parent then holds its element
        // pause until the child completes
        self.drain_top();

        self.stack.push(sub).map_err(|_| Error::StackFull)?;

        // emit the child's header
        self.drain_top();

        Ok(())
    }

    /// Close the innermost collection
    ///
    /// The collection must be filled and fully drained. Popping it
    /// resumes the parent's producer, consuming the one pause the parent
    /// was holding for this element.
    pub fn finish_collection(&mut self) -> Result<(), Error> {
        let top = self.stack.last_mut().ok_or(Error::StackEmpty)?;

        if !top.is_filled() {
            return Err(Error::CollectionNotFilled);
        }
        match top.next_chunk() {
            Step::Done => (),
            _ => return Err(Error::StreamOutOfSync),
        }

        let _ = self.stack.pop();

        if let Some(parent) = self.stack.last_mut() {
            match parent.next_chunk() {
                Step::Pause => (),
                _ => return Err(Error::StreamOutOfSync),
            }
        }

        Ok(())
    }

    /// Finalize and return the digest
    ///
    /// Fails unless the root collection has been finished. Consumes the
    /// builder, so the digest can be read exactly once.
    pub fn digest(self) -> Result<Output<D>, Error> {
        if !self.stack.is_empty() {
            return Err(Error::NotFinished);
        }

        Ok(self.digest.finalize())
    }

    /// Feed the active collection's available bytes into the digest,
    /// stopping at the next pause (or child hand-off)
    #[cfg_attr(feature = "noinline", inline(never))]
    fn drain_top(&mut self) {
        let Self { digest, stack } = self;

        let top = match stack.last_mut() {
            Some(v) => v,
            None => return,
        };

        loop {
            if top.awaiting_child() {
                break;
            }

            match top.next_chunk() {
                Step::Chunk(chunk) => digest.update(chunk),
                Step::Pause | Step::Done => break,
            }
        }
    }
}
