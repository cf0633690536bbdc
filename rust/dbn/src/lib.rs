//! A crate for working with Databento Binary Encoding (DBN): the fixed-layout record
//! types, the [`Metadata`] preamble, and decoders for files and streams.
//!
//! Records are `#[repr(C)]` structs that begin with a [`RecordHeader`]. A
//! [`RecordRef`] is a borrowed view over an encoded record which can be inspected
//! without copying and converted to a concrete type with [`RecordRef::get()`] or to
//! a [`RecordRefEnum`] for `match`ing.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(clippy::missing_errors_doc)]

pub mod compat;
pub mod decode;
pub mod encode;
pub mod enums;
pub mod error;
pub mod flags;
mod macros;
pub mod metadata;
pub mod pretty;
pub mod record;
mod record_enum;
pub mod record_ref;

pub use crate::{
    enums::{
        rtype, Action, Compression, Encoding, InstrumentClass, MatchAlgorithm, RType, SType,
        Schema, SecurityUpdateAction, Side, StatType, StatUpdateAction, UserDefinedInstrument,
        VersionUpgradePolicy,
    },
    error::{Error, Result},
    metadata::{MappingInterval, Metadata, MetadataBuilder, SymbolMapping},
    record::{
        rtype_from_schema, size_of_schema, BidAskPair, ErrorMsg, HasRType, ImbalanceMsg,
        InstrumentDefMsg, MboMsg, Mbp10Msg, Mbp1Msg, OhlcvMsg, Record, RecordHeader, RecordMut,
        StatMsg, SymbolMappingMsg, SystemMsg, TbboMsg, TradeMsg, WithTsOut,
    },
    record_enum::{RecordEnum, RecordRefEnum},
    record_ref::RecordRef,
};

/// The current version of the DBN encoding, which is different from the crate version.
pub const DBN_VERSION: u8 = 2;
/// The length of fixed-length symbol strings in the current DBN version.
pub const SYMBOL_CSTR_LEN: usize = compat::SYMBOL_CSTR_LEN_V2;
const METADATA_DATASET_CSTR_LEN: usize = 16;
const METADATA_RESERVED_LEN: usize = 53;
/// Excludes magic string, version, and length.
const METADATA_FIXED_LEN: usize = 100;
const NULL_LIMIT: u64 = 0;
const NULL_RECORD_COUNT: u64 = u64::MAX;
const NULL_SCHEMA: u16 = u16::MAX;
const NULL_STYPE: u8 = u8::MAX;

/// The size in bytes of the prelude preceding the metadata block: the `DBN` magic
/// string, the version byte, and the little-endian `u32` length.
pub const METADATA_PRELUDE_LEN: usize = 8;
/// The largest metadata block accepted by the decoders. Longer lengths in a prelude
/// indicate corrupt input.
pub const MAX_METADATA_LEN: usize = 64 * 1024 * 1024;
/// The maximum size in bytes of any record in the current DBN version, including a
/// trailing `ts_out`.
pub const MAX_RECORD_LEN: usize = std::mem::size_of::<WithTsOut<InstrumentDefMsg>>();
/// The largest frame expressible by the single-byte `length` field of a
/// [`RecordHeader`].
pub const MAX_FRAME_LEN: usize = u8::MAX as usize * RecordHeader::LENGTH_MULTIPLIER;

/// The denominator of fixed prices in DBN.
pub const FIXED_PRICE_SCALE: i64 = 1_000_000_000;
/// The sentinel value for an unset or null price.
pub const UNDEF_PRICE: i64 = i64::MAX;
/// The sentinel value for an unset or null order quantity.
pub const UNDEF_ORDER_SIZE: u32 = u32::MAX;
/// The sentinel value for an unset or null stat quantity.
pub const UNDEF_STAT_QUANTITY: i32 = i32::MAX;
/// The sentinel value for an unset or null timestamp.
pub const UNDEF_TIMESTAMP: u64 = u64::MAX;
