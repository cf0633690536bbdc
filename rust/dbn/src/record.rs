//! Market data types for encoding different Databento [`Schema`](crate::enums::Schema)s
//! in the most recent DBN version, as well as conversion functions.

pub(crate) mod conv;
mod impl_default;
mod methods;
mod traits;

use std::{mem, os::raw::c_char};

use crate::{enums::rtype, macros::dbn_record, Error, RType, Result, Schema, SYMBOL_CSTR_LEN};
pub(crate) use conv::as_u8_slice;
pub use conv::{
    c_chars_to_str, str_to_c_chars, transmute_header_bytes, transmute_record,
    transmute_record_bytes, transmute_record_mut, ts_to_dt,
};
pub use traits::{HasRType, Record, RecordMut};

/// Common data for all Databento records. Always found at the beginning of a record
/// struct.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
#[cfg_attr(test, derive(type_layout::TypeLayout))]
pub struct RecordHeader {
    /// The length of the record in 32-bit words.
    pub(crate) length: u8,
    /// The record type; with `0x00..0x0F` specifying MBP levels size. Record types
    /// implement the trait [`HasRType`], and the [`has_rtype`][HasRType::has_rtype]
    /// function can be used to check if that type can be used to decode a message with
    /// a given rtype. The set of possible values is defined in [`rtype`].
    pub rtype: u8,
    /// The publisher ID assigned by Databento, which denotes the dataset and venue.
    pub publisher_id: u16,
    /// The numeric instrument ID.
    pub instrument_id: u32,
    /// The matching-engine-received timestamp expressed as the number of nanoseconds
    /// since the UNIX epoch.
    pub ts_event: u64,
}

/// A market-by-order (MBO) tick message. The record of the [`Mbo`](crate::Schema::Mbo)
/// schema.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
#[cfg_attr(test, derive(type_layout::TypeLayout))]
pub struct MboMsg {
    /// The common header.
    pub hd: RecordHeader,
    /// The order ID assigned at the venue.
    pub order_id: u64,
    /// The order price expressed as a signed integer where every 1 unit
    /// corresponds to 1e-9, i.e. 1/1,000,000,000 or 0.000000001.
    pub price: i64,
    /// The order quantity.
    pub size: u32,
    /// A bit field indicating event end, message characteristics, and data quality.
    /// See [`flags`](crate::flags) for possible values.
    pub flags: u8,
    /// A channel ID within the venue.
    pub channel_id: u8,
    /// The event action. Can be **A**dd, **C**ancel, **M**odify, clea**R**,
    /// **T**rade, or **F**ill.
    pub action: c_char,
    /// The side that initiates the event. Can be **A**sk for a sell order (or sell
    /// aggressor in a trade), **B**id for a buy order (or buy aggressor in a trade), or
    /// **N**one where no side is specified by the original source.
    pub side: c_char,
    /// The capture-server-received timestamp expressed as number of nanoseconds since
    /// the UNIX epoch.
    pub ts_recv: u64,
    /// The delta of `ts_recv - ts_exchange_send`, max 2 seconds.
    pub ts_in_delta: i32,
    /// The message sequence number assigned at the venue.
    pub sequence: u32,
}

/// A level.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
#[cfg_attr(test, derive(type_layout::TypeLayout))]
pub struct BidAskPair {
    /// The bid price.
    pub bid_px: i64,
    /// The ask price.
    pub ask_px: i64,
    /// The bid size.
    pub bid_sz: u32,
    /// The ask size.
    pub ask_sz: u32,
    /// The bid order count.
    pub bid_ct: u32,
    /// The ask order count.
    pub ask_ct: u32,
}

/// Market by price implementation with a book depth of 0. Equivalent to
/// MBP-0. The record of the [`Trades`](crate::enums::Schema::Trades) schema.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
#[cfg_attr(test, derive(type_layout::TypeLayout))]
pub struct TradeMsg {
    /// The common header.
    pub hd: RecordHeader,
    /// The order price expressed as a signed integer where every 1 unit
    /// corresponds to 1e-9, i.e. 1/1,000,000,000 or 0.000000001.
    pub price: i64,
    /// The order quantity.
    pub size: u32,
    /// The event action. Always **T**rade in the trades schema.
    pub action: c_char,
    /// The side that initiates the trade. Can be **A**sk for a sell aggressor in a
    /// trade, **B**id for a buy aggressor in a trade, or **N**one where no side is
    /// specified by the original source.
    pub side: c_char,
    /// A bit field indicating event end, message characteristics, and data quality.
    /// See [`flags`](crate::flags) for possible values.
    pub flags: u8,
    /// The depth of actual book change.
    pub depth: u8,
    /// The capture-server-received timestamp expressed as number of nanoseconds since
    /// the UNIX epoch.
    pub ts_recv: u64,
    /// The delta of `ts_recv - ts_exchange_send`, max 2 seconds.
    pub ts_in_delta: i32,
    /// The message sequence number assigned at the venue.
    pub sequence: u32,
}

/// Market by price implementation with a known book depth of 1. The record of the
/// [`Mbp1`](crate::enums::Schema::Mbp1) and [`Tbbo`](crate::enums::Schema::Tbbo)
/// schemas.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
#[cfg_attr(test, derive(type_layout::TypeLayout))]
pub struct Mbp1Msg {
    /// The common header.
    pub hd: RecordHeader,
    /// The order price expressed as a signed integer where every 1 unit
    /// corresponds to 1e-9, i.e. 1/1,000,000,000 or 0.000000001.
    pub price: i64,
    /// The order quantity.
    pub size: u32,
    /// The event action. Can be **A**dd, **C**ancel, **M**odify, clea**R**, or
    /// **T**rade.
    pub action: c_char,
    /// The side that initiates the event.
    pub side: c_char,
    /// A bit field indicating event end, message characteristics, and data quality.
    /// See [`flags`](crate::flags) for possible values.
    pub flags: u8,
    /// The depth of actual book change.
    pub depth: u8,
    /// The capture-server-received timestamp expressed as number of nanoseconds since
    /// the UNIX epoch.
    pub ts_recv: u64,
    /// The delta of `ts_recv - ts_exchange_send`, max 2 seconds.
    pub ts_in_delta: i32,
    /// The message sequence number assigned at the venue.
    pub sequence: u32,
    /// The top of the order book.
    pub levels: [BidAskPair; 1],
}

/// Market by price implementation with a known book depth of 10. The record of the
/// [`Mbp10`](crate::enums::Schema::Mbp10) schema.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
#[cfg_attr(test, derive(type_layout::TypeLayout))]
pub struct Mbp10Msg {
    /// The common header.
    pub hd: RecordHeader,
    /// The order price expressed as a signed integer where every 1 unit
    /// corresponds to 1e-9, i.e. 1/1,000,000,000 or 0.000000001.
    pub price: i64,
    /// The order quantity.
    pub size: u32,
    /// The event action. Can be **A**dd, **C**ancel, **M**odify, clea**R**, or
    /// **T**rade.
    pub action: c_char,
    /// The side that initiates the event.
    pub side: c_char,
    /// A bit field indicating event end, message characteristics, and data quality.
    /// See [`flags`](crate::flags) for possible values.
    pub flags: u8,
    /// The depth of actual book change.
    pub depth: u8,
    /// The capture-server-received timestamp expressed as number of nanoseconds since
    /// the UNIX epoch.
    pub ts_recv: u64,
    /// The delta of `ts_recv - ts_exchange_send`, max 2 seconds.
    pub ts_in_delta: i32,
    /// The message sequence number assigned at the venue.
    pub sequence: u32,
    /// The top 10 levels of the order book.
    pub levels: [BidAskPair; 10],
}

/// The record of the [`Tbbo`](crate::enums::Schema::Tbbo) schema.
pub type TbboMsg = Mbp1Msg;

/// Open, high, low, close, and volume. The record of the following schemas:
/// - [`Ohlcv1S`](crate::enums::Schema::Ohlcv1S)
/// - [`Ohlcv1M`](crate::enums::Schema::Ohlcv1M)
/// - [`Ohlcv1H`](crate::enums::Schema::Ohlcv1H)
/// - [`Ohlcv1D`](crate::enums::Schema::Ohlcv1D)
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
#[cfg_attr(test, derive(type_layout::TypeLayout))]
pub struct OhlcvMsg {
    /// The common header.
    pub hd: RecordHeader,
    /// The open price for the bar.
    pub open: i64,
    /// The high price for the bar.
    pub high: i64,
    /// The low price for the bar.
    pub low: i64,
    /// The close price for the bar.
    pub close: i64,
    /// The total volume traded during the aggregation period.
    pub volume: u64,
}

/// Definition of an instrument. The record of the
/// [`Definition`](crate::enums::Schema::Definition) schema.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
#[cfg_attr(test, derive(type_layout::TypeLayout))]
pub struct InstrumentDefMsg {
    /// The common header.
    pub hd: RecordHeader,
    /// The capture-server-received timestamp expressed as number of nanoseconds since
    /// the UNIX epoch.
    pub ts_recv: u64,
    /// The minimum constant tick for the instrument in units of 1e-9.
    pub min_price_increment: i64,
    /// The multiplier to convert the venue's display price to the conventional price.
    pub display_factor: i64,
    /// The last eligible trade time expressed as a number of nanoseconds since the
    /// UNIX epoch.
    pub expiration: u64,
    /// The time of instrument activation expressed as a number of nanoseconds since the
    /// UNIX epoch.
    pub activation: u64,
    /// The allowable high limit price for the trading day in units of 1e-9.
    pub high_limit_price: i64,
    /// The allowable low limit price for the trading day in units of 1e-9.
    pub low_limit_price: i64,
    /// The differential value for price banding in units of 1e-9.
    pub max_price_variation: i64,
    /// The trading session settlement price on `trading_reference_date`.
    pub trading_reference_price: i64,
    /// The contract size for each instrument, in combination with `unit_of_measure`.
    pub unit_of_measure_qty: i64,
    /// The value currently under development by the venue. Converted to units of 1e-9.
    pub min_price_increment_amount: i64,
    /// The value used for price calculation in spread and leg pricing in units of 1e-9.
    pub price_ratio: i64,
    /// The strike price of the option. Converted to units of 1e-9.
    pub strike_price: i64,
    /// A bitmap of instrument eligibility attributes.
    pub inst_attrib_value: i32,
    /// The `instrument_id` of the first underlying instrument.
    pub underlying_id: u32,
    /// The instrument ID assigned by the publisher. May be the same as `instrument_id`.
    pub raw_instrument_id: u32,
    /// The implied book depth on the price level data feed.
    pub market_depth_implied: i32,
    /// The (outright) book depth on the price level data feed.
    pub market_depth: i32,
    /// The market segment of the instrument.
    pub market_segment_id: u32,
    /// The maximum trading volume for the instrument.
    pub max_trade_vol: u32,
    /// The minimum order entry quantity for the instrument.
    pub min_lot_size: i32,
    /// The minimum quantity required for a block trade of the instrument.
    pub min_lot_size_block: i32,
    /// The minimum quantity required for a round lot of the instrument. Multiples of
    /// this quantity are also round lots.
    pub min_lot_size_round_lot: i32,
    /// The minimum trading volume for the instrument.
    pub min_trade_vol: u32,
    /// The number of deliverables per instrument, i.e. peak days.
    pub contract_multiplier: i32,
    /// The quantity that a contract will decay daily, after `decay_start_date` has
    /// been reached.
    pub decay_quantity: i32,
    /// The fixed contract value assigned to each instrument.
    pub original_contract_size: i32,
    /// The trading session date corresponding to the settlement price in
    /// `trading_reference_price`, in number of days since the UNIX epoch.
    pub trading_reference_date: u16,
    /// The channel ID assigned at the venue.
    pub appl_id: i16,
    /// The calendar year reflected in the instrument symbol.
    pub maturity_year: u16,
    /// The date at which a contract will begin to decay.
    pub decay_start_date: u16,
    /// The channel ID assigned by Databento as an incrementing integer starting at
    /// zero.
    pub channel_id: u16,
    /// The currency used for price fields.
    pub currency: [c_char; 4],
    /// The currency used for settlement, if different from `currency`.
    pub settl_currency: [c_char; 4],
    /// The strategy type of the spread.
    pub secsubtype: [c_char; 6],
    /// The instrument raw symbol assigned by the publisher.
    pub raw_symbol: [c_char; SYMBOL_CSTR_LEN],
    /// The security group code of the instrument.
    pub group: [c_char; 21],
    /// The exchange used to identify the instrument.
    pub exchange: [c_char; 5],
    /// The underlying asset code (product code) of the instrument.
    pub asset: [c_char; 7],
    /// The ISO standard instrument categorization code.
    pub cfi: [c_char; 7],
    /// The type of the instrument, e.g. FUT for future or future spread.
    pub security_type: [c_char; 7],
    /// The unit of measure for the instrument's original contract size, e.g. USD or
    /// LBS.
    pub unit_of_measure: [c_char; 31],
    /// The symbol of the first underlying instrument.
    pub underlying: [c_char; 21],
    /// The currency of [`strike_price`](Self::strike_price).
    pub strike_price_currency: [c_char; 4],
    /// The classification of the instrument.
    pub instrument_class: c_char,
    /// The matching algorithm used for the instrument, typically **F**IFO.
    pub match_algorithm: c_char,
    /// The current trading state of the instrument.
    pub md_security_trading_status: u8,
    /// The price denominator of the main fraction.
    pub main_fraction: u8,
    /// The number of digits to the right of the tick mark, to display fractional
    /// prices.
    pub price_display_format: u8,
    /// The type indicators for the settlement price, as a bitmap.
    pub settl_price_type: u8,
    /// The price denominator of the sub fraction.
    pub sub_fraction: u8,
    /// The product complex of the instrument.
    pub underlying_product: u8,
    /// Indicates if the instrument definition has been added, modified, or deleted.
    pub security_update_action: c_char,
    /// The calendar month reflected in the instrument symbol.
    pub maturity_month: u8,
    /// The calendar day reflected in the instrument symbol, or 0.
    pub maturity_day: u8,
    /// The calendar week reflected in the instrument symbol, or 0.
    pub maturity_week: u8,
    /// Indicates if the instrument is user defined: **Y**es or **N**o.
    pub user_defined_instrument: c_char,
    /// The type of `contract_multiplier`. Either `1` for hours, or `2` for days.
    pub contract_multiplier_unit: i8,
    /// The schedule for delivering electricity.
    pub flow_schedule_type: i8,
    /// The tick rule of the spread.
    pub tick_rule: u8,
    // Filler for alignment.
    pub(crate) _reserved: [u8; 10],
}

/// An auction imbalance message.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
#[cfg_attr(test, derive(type_layout::TypeLayout))]
pub struct ImbalanceMsg {
    /// The common header.
    pub hd: RecordHeader,
    /// The capture-server-received timestamp expressed as the number of nanoseconds
    /// since the UNIX epoch.
    pub ts_recv: u64,
    /// The price at which the imbalance shares are calculated, where every 1 unit
    /// corresponds to 1e-9, i.e. 1/1,000,000,000 or 0.000000001.
    pub ref_price: i64,
    /// Reserved for future use.
    pub auction_time: u64,
    /// The hypothetical auction-clearing price for both cross and continuous orders.
    pub cont_book_clr_price: i64,
    /// The hypothetical auction-clearing price for cross orders only.
    pub auct_interest_clr_price: i64,
    /// Reserved for future use.
    pub ssr_filling_price: i64,
    /// Reserved for future use.
    pub ind_match_price: i64,
    /// Reserved for future use.
    pub upper_collar: i64,
    /// Reserved for future use.
    pub lower_collar: i64,
    /// The quantity of shares that are eligible to be matched at `ref_price`.
    pub paired_qty: u32,
    /// The quantity of shares that are not paired at `ref_price`.
    pub total_imbalance_qty: u32,
    /// Reserved for future use.
    pub market_imbalance_qty: u32,
    /// Reserved for future use.
    pub unpaired_qty: u32,
    /// Venue-specific character code indicating the auction type.
    pub auction_type: c_char,
    /// The market side of the `total_imbalance_qty`. Can be **A**sk, **B**id, or
    /// **N**one.
    pub side: c_char,
    /// Reserved for future use.
    pub auction_status: u8,
    /// Reserved for future use.
    pub freeze_status: u8,
    /// Reserved for future use.
    pub num_extensions: u8,
    /// Reserved for future use.
    pub unpaired_side: c_char,
    /// Venue-specific character code. For Nasdaq, contains the raw Price Variation
    /// Indicator.
    pub significant_imbalance: c_char,
    // Filler for alignment.
    pub(crate) _reserved: [u8; 1],
}

/// A statistics message. A catchall for various data disseminated by publishers.
/// The [`stat_type`](Self::stat_type) indicates the statistic contained in the message.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
#[cfg_attr(test, derive(type_layout::TypeLayout))]
pub struct StatMsg {
    /// The common header.
    pub hd: RecordHeader,
    /// The capture-server-received timestamp expressed as the number of nanoseconds
    /// since the UNIX epoch.
    pub ts_recv: u64,
    /// The reference timestamp of the statistic value expressed as the number of
    /// nanoseconds since the UNIX epoch. Will be [`UNDEF_TIMESTAMP`](crate::UNDEF_TIMESTAMP)
    /// when unused.
    pub ts_ref: u64,
    /// The value for price statistics expressed as a signed integer where every 1 unit
    /// corresponds to 1e-9, i.e. 1/1,000,000,000 or 0.000000001. Will be
    /// [`UNDEF_PRICE`](crate::UNDEF_PRICE) when unused.
    pub price: i64,
    /// The value for non-price statistics. Will be
    /// [`UNDEF_STAT_QUANTITY`](crate::UNDEF_STAT_QUANTITY) when unused.
    pub quantity: i32,
    /// The message sequence number assigned at the venue.
    pub sequence: u32,
    /// The delta of `ts_recv - ts_exchange_send`, max 2 seconds.
    pub ts_in_delta: i32,
    /// The type of statistic value contained in the message. Refer to the
    /// [`StatType`](crate::enums::StatType) for variants.
    pub stat_type: u16,
    /// A channel ID within the venue.
    pub channel_id: u16,
    /// Indicates if the statistic is newly added (1) or deleted (2). (Deleted is only
    /// used with some stat types).
    pub update_action: u8,
    /// Additional flags associated with certain stat types.
    pub stat_flags: u8,
    // Filler for alignment.
    pub(crate) _reserved: [u8; 6],
}

/// An error message from the Databento Live Subscription Gateway (LSG).
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
#[cfg_attr(test, derive(type_layout::TypeLayout))]
pub struct ErrorMsg {
    /// The common header.
    pub hd: RecordHeader,
    /// The error message.
    pub err: [c_char; 302],
    /// The error code. Currently unused.
    pub code: u8,
    /// Sometimes multiple errors are sent together. This field will be non-zero for the
    /// last error.
    pub is_last: u8,
}

/// A symbol mapping message which maps a symbol of one [`SType`](crate::enums::SType)
/// to another.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
#[cfg_attr(test, derive(type_layout::TypeLayout))]
pub struct SymbolMappingMsg {
    /// The common header.
    pub hd: RecordHeader,
    /// The input symbology type of `stype_in_symbol`.
    pub stype_in: u8,
    /// The input symbol.
    pub stype_in_symbol: [c_char; SYMBOL_CSTR_LEN],
    /// The output symbology type of `stype_out_symbol`.
    pub stype_out: u8,
    /// The output symbol.
    pub stype_out_symbol: [c_char; SYMBOL_CSTR_LEN],
    /// The start of the mapping interval expressed as the number of nanoseconds since
    /// the UNIX epoch.
    pub start_ts: u64,
    /// The end of the mapping interval expressed as the number of nanoseconds since
    /// the UNIX epoch.
    pub end_ts: u64,
}

/// A non-error message from the Databento Live Subscription Gateway (LSG). Also used
/// for heartbeating.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
#[cfg_attr(test, derive(type_layout::TypeLayout))]
pub struct SystemMsg {
    /// The common header.
    pub hd: RecordHeader,
    /// The message from the Databento Live Subscription Gateway (LSG).
    pub msg: [c_char; 303],
    /// Type of system message, currently unused.
    pub code: u8,
}

/// Wrapper object for records that include the live gateway send timestamp (`ts_out`).
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
pub struct WithTsOut<T: HasRType> {
    /// The inner record.
    pub rec: T,
    /// The live gateway send timestamp expressed as number of nanoseconds since the UNIX epoch.
    pub ts_out: u64,
}

dbn_record!(MboMsg, rtype::MBO; index_ts = ts_recv);
dbn_record!(TradeMsg, rtype::MBP_0; index_ts = ts_recv);
dbn_record!(Mbp1Msg, rtype::MBP_1; index_ts = ts_recv);
dbn_record!(Mbp10Msg, rtype::MBP_10; index_ts = ts_recv);
dbn_record!(
    OhlcvMsg,
    rtype::OHLCV_DEPRECATED | rtype::OHLCV_1S | rtype::OHLCV_1M | rtype::OHLCV_1H | rtype::OHLCV_1D
);
dbn_record!(InstrumentDefMsg, rtype::INSTRUMENT_DEF; index_ts = ts_recv);
dbn_record!(ImbalanceMsg, rtype::IMBALANCE; index_ts = ts_recv);
dbn_record!(StatMsg, rtype::STATISTICS; index_ts = ts_recv);
dbn_record!(ErrorMsg, rtype::ERROR);
dbn_record!(SymbolMappingMsg, rtype::SYMBOL_MAPPING);
dbn_record!(SystemMsg, rtype::SYSTEM);

/// Get the size of the record struct used for `schema` in the current DBN version.
///
/// # Errors
/// This function returns an error if `schema` has no associated record type, such
/// as [`Schema::Status`].
pub fn size_of_schema(schema: Schema) -> Result<usize> {
    rtype_from_schema(schema).map(RType::record_size)
}

/// Get the [`RType`] of the records in `schema`.
///
/// # Errors
/// This function returns an error if `schema` has no associated record type, such
/// as [`Schema::Status`].
pub fn rtype_from_schema(schema: Schema) -> Result<RType> {
    Ok(match schema {
        Schema::Mbo => RType::Mbo,
        Schema::Mbp1 | Schema::Tbbo => RType::Mbp1,
        Schema::Mbp10 => RType::Mbp10,
        Schema::Trades => RType::Mbp0,
        Schema::Ohlcv1S => RType::Ohlcv1S,
        Schema::Ohlcv1M => RType::Ohlcv1M,
        Schema::Ohlcv1H => RType::Ohlcv1H,
        Schema::Ohlcv1D => RType::Ohlcv1D,
        Schema::Definition => RType::InstrumentDef,
        Schema::Statistics => RType::Statistics,
        Schema::Imbalance => RType::Imbalance,
        Schema::Status => {
            return Err(Error::bad_arg(
                "schema",
                format!("unknown value '{}'", schema as u16),
            ))
        }
    })
}

/// Get the size of the record struct for the raw `schema` value in the current DBN
/// version.
///
/// # Errors
/// This function returns an error if `schema` isn't a known [`Schema`] or has no
/// associated record type.
pub fn size_of_raw_schema(schema: u16) -> Result<usize> {
    let schema = Schema::try_from(schema)
        .map_err(|_| Error::bad_arg("schema", format!("unknown value '{schema}'")))?;
    size_of_schema(schema)
}

const _: () = assert!(mem::size_of::<WithTsOut<InstrumentDefMsg>>() <= crate::MAX_FRAME_LEN);

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::mbo(Schema::Mbo, 56, RType::Mbo)]
    #[case::mbp1(Schema::Mbp1, 80, RType::Mbp1)]
    #[case::tbbo(Schema::Tbbo, 80, RType::Mbp1)]
    #[case::mbp10(Schema::Mbp10, 368, RType::Mbp10)]
    #[case::trades(Schema::Trades, 48, RType::Mbp0)]
    #[case::ohlcv_1s(Schema::Ohlcv1S, 56, RType::Ohlcv1S)]
    #[case::ohlcv_1d(Schema::Ohlcv1D, 56, RType::Ohlcv1D)]
    #[case::definition(Schema::Definition, 400, RType::InstrumentDef)]
    #[case::statistics(Schema::Statistics, 64, RType::Statistics)]
    #[case::imbalance(Schema::Imbalance, 112, RType::Imbalance)]
    fn test_schema_size_and_rtype(
        #[case] schema: Schema,
        #[case] exp_size: usize,
        #[case] exp_rtype: RType,
    ) {
        assert_eq!(size_of_schema(schema).unwrap(), exp_size);
        let rtype = rtype_from_schema(schema).unwrap();
        assert_eq!(rtype, exp_rtype);
        assert_eq!(rtype.record_size(), exp_size);
        // Tbbo shares the Mbp1 rtype so the inverse maps back to Mbp1
        let exp_schema = if schema == Schema::Tbbo {
            Schema::Mbp1
        } else {
            schema
        };
        assert_eq!(RType::try_into_schema(rtype as u8), Some(exp_schema));
    }

    #[test]
    fn test_status_schema_unsupported() {
        let err = rtype_from_schema(Schema::Status).unwrap_err();
        assert!(
            matches!(&err, Error::BadArgument { param_name, desc } if param_name == "schema" && desc == "unknown value '11'"),
            "{err:?}"
        );
        assert!(size_of_schema(Schema::Status).is_err());
    }

    #[rstest]
    #[case(13)]
    #[case(0xFF)]
    #[case(u16::MAX)]
    fn test_size_of_raw_schema_unknown(#[case] raw: u16) {
        let err = size_of_raw_schema(raw).unwrap_err();
        assert!(err.to_string().contains(&format!("unknown value '{raw}'")));
    }

    #[test]
    fn test_size_of_raw_schema() {
        assert_eq!(size_of_raw_schema(Schema::Mbo as u16).unwrap(), 56);
    }
}
