// Copyright (c) 2023-2024 The cardano-hw-core authors

/// Engine errors
///
/// Every variant indicates a contract violation in the driving code, not a
/// malformed-input condition: the outer signing flow validates values before
/// calling into the builder, so any `Err` here aborts the signing session
/// with no retry and no partial result.
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "thiserror", derive(thiserror::Error))]
#[repr(u8)]
pub enum Error {
    /// Operation fired outside its legal protocol states
    #[cfg_attr(feature = "thiserror", error("invalid protocol state"))]
    InvalidState = 0x00,

    /// Item appended to an already filled collection
    #[cfg_attr(feature = "thiserror", error("collection already filled"))]
    CollectionFull = 0x01,

    /// Item shape does not match the collection kind
    #[cfg_attr(feature = "thiserror", error("item shape mismatch"))]
    ItemShape = 0x02,

    /// Collection finished before reaching its declared count
    #[cfg_attr(feature = "thiserror", error("collection not filled"))]
    CollectionNotFilled = 0x03,

    /// Item added after the root collection finished
    #[cfg_attr(feature = "thiserror", error("collection stack is empty"))]
    StackEmpty = 0x04,

    /// Nesting exceeds the fixed collection-stack depth
    #[cfg_attr(feature = "thiserror", error("collection stack is full"))]
    StackFull = 0x05,

    /// Producer out of step with the one-slot backpressure contract
    #[cfg_attr(feature = "thiserror", error("encoding stream out of sync"))]
    StreamOutOfSync = 0x06,

    /// Digest requested before the structure finished
    #[cfg_attr(feature = "thiserror", error("hash calculation not finished"))]
    NotFinished = 0x07,

    /// Encoded item exceeds the pending-item buffer
    #[cfg_attr(feature = "thiserror", error("item encoding failed"))]
    EncodingFailed = 0x08,

    /// Item value failed shape validation
    #[cfg_attr(feature = "thiserror", error("invalid item value"))]
    InvalidItem = 0x09,
}
