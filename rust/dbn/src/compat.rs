//! Compatibility shims for different DBN versions.
//!
//! Version 1 used shorter symbol strings and smaller control messages. Records from
//! version 1 inputs can be upgraded to the current layouts with
//! [`decode_record_ref()`].

use std::{mem, os::raw::c_char};

use crate::{
    macros::{dbn_record, instrument_def_default, sentinel_default},
    record::{c_chars_to_str, ts_to_dt, HasRType, Record, RecordHeader, WithTsOut},
    rtype, Error, ErrorMsg, InstrumentDefMsg, RecordRef, Result, SymbolMappingMsg, SystemMsg,
    VersionUpgradePolicy, DBN_VERSION, MAX_RECORD_LEN, UNDEF_TIMESTAMP,
};

/// The length of symbol fields in DBN version 1 (prior version being phased out).
pub const SYMBOL_CSTR_LEN_V1: usize = 22;
/// The length of symbol fields in DBN version 2 (current version).
pub const SYMBOL_CSTR_LEN_V2: usize = 71;

pub(crate) const METADATA_RESERVED_LEN_V1: usize = 47;

/// Returns the length of symbol fields in the given DBN version
pub const fn version_symbol_cstr_len(version: u8) -> usize {
    if version < 2 {
        SYMBOL_CSTR_LEN_V1
    } else {
        SYMBOL_CSTR_LEN_V2
    }
}

/// Definition of an instrument in DBN version 1. The record of the
/// [`Definition`](crate::enums::Schema::Definition) schema.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
#[cfg_attr(test, derive(type_layout::TypeLayout))]
pub struct InstrumentDefMsgV1 {
    /// The common header.
    pub hd: RecordHeader,
    /// The capture-server-received timestamp expressed as number of nanoseconds since
    /// the UNIX epoch.
    pub ts_recv: u64,
    /// The minimum constant tick for the instrument in units of 1e-9.
    pub min_price_increment: i64,
    /// The multiplier to convert the venue's display price to the conventional price.
    pub display_factor: i64,
    /// The last eligible trade time.
    pub expiration: u64,
    /// The time of instrument activation.
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
    /// The value currently under development by the venue.
    pub min_price_increment_amount: i64,
    /// The value used for price calculation in spread and leg pricing in units of 1e-9.
    pub price_ratio: i64,
    /// A bitmap of instrument eligibility attributes.
    pub inst_attrib_value: i32,
    /// The `instrument_id` of the first underlying instrument.
    pub underlying_id: u32,
    /// The instrument ID assigned by the publisher.
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
    /// The minimum quantity required for a round lot of the instrument.
    pub min_lot_size_round_lot: i32,
    /// The minimum trading volume for the instrument.
    pub min_trade_vol: u32,
    pub(crate) _reserved2: [u8; 4],
    /// The number of deliverables per instrument, i.e. peak days.
    pub contract_multiplier: i32,
    /// The quantity that a contract will decay daily.
    pub decay_quantity: i32,
    /// The fixed contract value assigned to each instrument.
    pub original_contract_size: i32,
    pub(crate) _reserved3: [u8; 4],
    /// The trading session date corresponding to the settlement price.
    pub trading_reference_date: u16,
    /// The channel ID assigned at the venue.
    pub appl_id: i16,
    /// The calendar year reflected in the instrument symbol.
    pub maturity_year: u16,
    /// The date at which a contract will begin to decay.
    pub decay_start_date: u16,
    /// The channel ID assigned by Databento.
    pub channel_id: u16,
    /// The currency used for price fields.
    pub currency: [c_char; 4],
    /// The currency used for settlement, if different from `currency`.
    pub settl_currency: [c_char; 4],
    /// The strategy type of the spread.
    pub secsubtype: [c_char; 6],
    /// The instrument raw symbol assigned by the publisher.
    pub raw_symbol: [c_char; SYMBOL_CSTR_LEN_V1],
    /// The security group code of the instrument.
    pub group: [c_char; 21],
    /// The exchange used to identify the instrument.
    pub exchange: [c_char; 5],
    /// The underlying asset code (product code) of the instrument.
    pub asset: [c_char; 7],
    /// The ISO standard instrument categorization code.
    pub cfi: [c_char; 7],
    /// The type of the instrument.
    pub security_type: [c_char; 7],
    /// The unit of measure for the instrument's original contract size.
    pub unit_of_measure: [c_char; 31],
    /// The symbol of the first underlying instrument.
    pub underlying: [c_char; 21],
    /// The currency of `strike_price`.
    pub strike_price_currency: [c_char; 4],
    /// The classification of the instrument.
    pub instrument_class: c_char,
    pub(crate) _reserved4: [u8; 2],
    /// The strike price of the option in units of 1e-9.
    pub strike_price: i64,
    pub(crate) _reserved5: [u8; 6],
    /// The matching algorithm used for the instrument.
    pub match_algorithm: c_char,
    /// The current trading state of the instrument.
    pub md_security_trading_status: u8,
    /// The price denominator of the main fraction.
    pub main_fraction: u8,
    /// The number of digits to the right of the tick mark.
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
    /// The type of `contract_multiplier`.
    pub contract_multiplier_unit: i8,
    /// The schedule for delivering electricity.
    pub flow_schedule_type: i8,
    /// The tick rule of the spread.
    pub tick_rule: u8,
    // Filler for alignment.
    pub(crate) _dummy: [u8; 3],
}

/// An error message from the Databento Live Subscription Gateway (LSG) in DBN version
/// 1.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
#[cfg_attr(test, derive(type_layout::TypeLayout))]
pub struct ErrorMsgV1 {
    /// The common header.
    pub hd: RecordHeader,
    /// The error message.
    pub err: [c_char; 64],
}

/// A symbol mapping message in DBN version 1.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
#[cfg_attr(test, derive(type_layout::TypeLayout))]
pub struct SymbolMappingMsgV1 {
    /// The common header.
    pub hd: RecordHeader,
    /// The input symbol.
    pub stype_in_symbol: [c_char; SYMBOL_CSTR_LEN_V1],
    /// The output symbol.
    pub stype_out_symbol: [c_char; SYMBOL_CSTR_LEN_V1],
    // Filler for alignment.
    pub(crate) _dummy: [u8; 4],
    /// The start of the mapping interval expressed as the number of nanoseconds since
    /// the UNIX epoch.
    pub start_ts: u64,
    /// The end of the mapping interval expressed as the number of nanoseconds since
    /// the UNIX epoch.
    pub end_ts: u64,
}

/// A non-error message from the Databento Live Subscription Gateway (LSG) in DBN
/// version 1. Also used for heartbeating.
#[repr(C)]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "trivial_copy", derive(Copy))]
#[cfg_attr(test, derive(type_layout::TypeLayout))]
pub struct SystemMsgV1 {
    /// The common header.
    pub hd: RecordHeader,
    /// The message from the Databento Live Subscription Gateway (LSG).
    pub msg: [c_char; 64],
}

dbn_record!(InstrumentDefMsgV1, rtype::INSTRUMENT_DEF; index_ts = ts_recv);
dbn_record!(ErrorMsgV1, rtype::ERROR);
dbn_record!(SymbolMappingMsgV1, rtype::SYMBOL_MAPPING);
dbn_record!(SystemMsgV1, rtype::SYSTEM);

impl InstrumentDefMsgV1 {
    /// Returns the instrument raw symbol assigned by the publisher as a `&str`.
    ///
    /// # Errors
    /// This function returns an error if `raw_symbol` contains invalid UTF-8.
    pub fn raw_symbol(&self) -> Result<&str> {
        c_chars_to_str(&self.raw_symbol)
    }
}

impl ErrorMsgV1 {
    /// Returns `err` as a `&str`.
    ///
    /// # Errors
    /// This function returns an error if `err` contains invalid UTF-8.
    pub fn err(&self) -> Result<&str> {
        c_chars_to_str(&self.err)
    }
}

impl SymbolMappingMsgV1 {
    /// Returns the input symbol as a `&str`.
    ///
    /// # Errors
    /// This function returns an error if `stype_in_symbol` contains invalid UTF-8.
    pub fn stype_in_symbol(&self) -> Result<&str> {
        c_chars_to_str(&self.stype_in_symbol)
    }

    /// Returns the output symbol as a `&str`.
    ///
    /// # Errors
    /// This function returns an error if `stype_out_symbol` contains invalid UTF-8.
    pub fn stype_out_symbol(&self) -> Result<&str> {
        c_chars_to_str(&self.stype_out_symbol)
    }

    /// Parses the start of the mapping interval into a datetime.
    pub fn start_ts(&self) -> Option<time::OffsetDateTime> {
        ts_to_dt(self.start_ts)
    }
}

impl SystemMsgV1 {
    /// Returns the message as a `&str`.
    ///
    /// # Errors
    /// This function returns an error if `msg` contains invalid UTF-8.
    pub fn msg(&self) -> Result<&str> {
        c_chars_to_str(&self.msg)
    }
}

instrument_def_default!(InstrumentDefMsgV1);
sentinel_default!(ErrorMsgV1, rtype::ERROR);
sentinel_default!(
    SymbolMappingMsgV1,
    rtype::SYMBOL_MAPPING,
    start_ts = UNDEF_TIMESTAMP,
    end_ts = UNDEF_TIMESTAMP,
);
sentinel_default!(SystemMsgV1, rtype::SYSTEM);

impl From<&InstrumentDefMsgV1> for InstrumentDefMsg {
    fn from(old: &InstrumentDefMsgV1) -> Self {
        let mut res = Self {
            hd: RecordHeader::new::<Self>(
                rtype::INSTRUMENT_DEF,
                old.hd.publisher_id,
                old.hd.instrument_id,
                old.hd.ts_event,
            ),
            ts_recv: old.ts_recv,
            min_price_increment: old.min_price_increment,
            display_factor: old.display_factor,
            expiration: old.expiration,
            activation: old.activation,
            high_limit_price: old.high_limit_price,
            low_limit_price: old.low_limit_price,
            max_price_variation: old.max_price_variation,
            trading_reference_price: old.trading_reference_price,
            unit_of_measure_qty: old.unit_of_measure_qty,
            min_price_increment_amount: old.min_price_increment_amount,
            price_ratio: old.price_ratio,
            strike_price: old.strike_price,
            inst_attrib_value: old.inst_attrib_value,
            underlying_id: old.underlying_id,
            raw_instrument_id: old.raw_instrument_id,
            market_depth_implied: old.market_depth_implied,
            market_depth: old.market_depth,
            market_segment_id: old.market_segment_id,
            max_trade_vol: old.max_trade_vol,
            min_lot_size: old.min_lot_size,
            min_lot_size_block: old.min_lot_size_block,
            min_lot_size_round_lot: old.min_lot_size_round_lot,
            min_trade_vol: old.min_trade_vol,
            contract_multiplier: old.contract_multiplier,
            decay_quantity: old.decay_quantity,
            original_contract_size: old.original_contract_size,
            trading_reference_date: old.trading_reference_date,
            appl_id: old.appl_id,
            maturity_year: old.maturity_year,
            decay_start_date: old.decay_start_date,
            channel_id: old.channel_id,
            currency: old.currency,
            settl_currency: old.settl_currency,
            secsubtype: old.secsubtype,
            group: old.group,
            exchange: old.exchange,
            asset: old.asset,
            cfi: old.cfi,
            security_type: old.security_type,
            unit_of_measure: old.unit_of_measure,
            underlying: old.underlying,
            strike_price_currency: old.strike_price_currency,
            instrument_class: old.instrument_class,
            match_algorithm: old.match_algorithm,
            md_security_trading_status: old.md_security_trading_status,
            main_fraction: old.main_fraction,
            price_display_format: old.price_display_format,
            settl_price_type: old.settl_price_type,
            sub_fraction: old.sub_fraction,
            underlying_product: old.underlying_product,
            security_update_action: old.security_update_action,
            maturity_month: old.maturity_month,
            maturity_day: old.maturity_day,
            maturity_week: old.maturity_week,
            user_defined_instrument: old.user_defined_instrument,
            contract_multiplier_unit: old.contract_multiplier_unit,
            flow_schedule_type: old.flow_schedule_type,
            tick_rule: old.tick_rule,
            ..Default::default()
        };
        res.raw_symbol[..SYMBOL_CSTR_LEN_V1].copy_from_slice(&old.raw_symbol);
        res
    }
}

impl From<&ErrorMsgV1> for ErrorMsg {
    fn from(old: &ErrorMsgV1) -> Self {
        let mut res = Self {
            hd: RecordHeader::new::<Self>(
                rtype::ERROR,
                old.hd.publisher_id,
                old.hd.instrument_id,
                old.hd.ts_event,
            ),
            ..Default::default()
        };
        res.err[..old.err.len()].copy_from_slice(&old.err);
        res
    }
}

impl From<&SymbolMappingMsgV1> for SymbolMappingMsg {
    fn from(old: &SymbolMappingMsgV1) -> Self {
        let mut res = Self {
            hd: RecordHeader::new::<Self>(
                rtype::SYMBOL_MAPPING,
                old.hd.publisher_id,
                old.hd.instrument_id,
                old.hd.ts_event,
            ),
            start_ts: old.start_ts,
            end_ts: old.end_ts,
            ..Default::default()
        };
        res.stype_in_symbol[..SYMBOL_CSTR_LEN_V1].copy_from_slice(&old.stype_in_symbol);
        res.stype_out_symbol[..SYMBOL_CSTR_LEN_V1].copy_from_slice(&old.stype_out_symbol);
        res
    }
}

impl From<&SystemMsgV1> for SystemMsg {
    fn from(old: &SystemMsgV1) -> Self {
        let mut res = Self {
            hd: RecordHeader::new::<Self>(
                rtype::SYSTEM,
                old.hd.publisher_id,
                old.hd.instrument_id,
                old.hd.ts_event,
            ),
            ..Default::default()
        };
        res.msg[..old.msg.len()].copy_from_slice(&old.msg);
        res
    }
}

/// 8-byte aligned scratch space large enough to hold any upgraded record, including
/// `ts_out`.
#[derive(Debug, Clone)]
pub struct CompatBuffer(Box<[u64]>);

impl Default for CompatBuffer {
    fn default() -> Self {
        Self(vec![0; MAX_RECORD_LEN.div_ceil(mem::size_of::<u64>())].into_boxed_slice())
    }
}

impl CompatBuffer {
    pub(crate) fn as_bytes(&self) -> &[u8] {
        // Safety: `u64` storage is valid for reads as bytes
        unsafe {
            std::slice::from_raw_parts(
                self.0.as_ptr().cast::<u8>(),
                self.0.len() * mem::size_of::<u64>(),
            )
        }
    }

    fn as_bytes_mut(&mut self) -> &mut [u8] {
        // Safety: `u64` storage is valid for writes as bytes
        unsafe {
            std::slice::from_raw_parts_mut(
                self.0.as_mut_ptr().cast::<u8>(),
                self.0.len() * mem::size_of::<u64>(),
            )
        }
    }

    fn store<R: HasRType>(&mut self, rec: &R) -> RecordRef<'_> {
        let bytes = rec.as_ref();
        debug_assert!(bytes.len() <= MAX_RECORD_LEN);
        let dest = &mut self.as_bytes_mut()[..bytes.len()];
        dest.copy_from_slice(bytes);
        // Safety: `dest` is aligned and now holds a complete record
        unsafe { RecordRef::new(dest) }
    }
}

/// Views the record at the start of `input`, upgrading it into `compat_buffer` when
/// `version` is 1 and `upgrade_policy` is [`VersionUpgradePolicy::Upgrade`]. Records
/// that didn't change between versions are returned as views over `input`.
///
/// `ts_out` indicates each record is followed by a gateway send timestamp, which is
/// carried over to the upgraded record.
///
/// # Errors
/// This function returns an error if `version` is newer than [`DBN_VERSION`], if
/// `input` doesn't hold a complete aligned record, or if the record is too short for
/// the legacy struct its rtype indicates.
pub fn decode_record_ref<'a>(
    version: u8,
    upgrade_policy: VersionUpgradePolicy,
    ts_out: bool,
    compat_buffer: &'a mut CompatBuffer,
    input: &'a [u8],
) -> Result<RecordRef<'a>> {
    if version > DBN_VERSION {
        return Err(Error::UnsupportedVersion { version });
    }
    let rec = RecordRef::try_from_bytes(input)?;
    if version != 1 || upgrade_policy != VersionUpgradePolicy::Upgrade {
        return Ok(rec);
    }
    match rec.header().rtype {
        rtype::INSTRUMENT_DEF => {
            upgrade_record::<InstrumentDefMsgV1, InstrumentDefMsg>(ts_out, compat_buffer, rec)
        }
        rtype::ERROR => upgrade_record::<ErrorMsgV1, ErrorMsg>(ts_out, compat_buffer, rec),
        rtype::SYMBOL_MAPPING => {
            upgrade_record::<SymbolMappingMsgV1, SymbolMappingMsg>(ts_out, compat_buffer, rec)
        }
        rtype::SYSTEM => upgrade_record::<SystemMsgV1, SystemMsg>(ts_out, compat_buffer, rec),
        _ => Ok(rec),
    }
}

fn upgrade_record<'a, T, U>(
    ts_out: bool,
    compat_buffer: &'a mut CompatBuffer,
    rec: RecordRef<'_>,
) -> Result<RecordRef<'a>>
where
    T: HasRType,
    U: HasRType + for<'b> From<&'b T>,
{
    if ts_out {
        let old = legacy_record::<WithTsOut<T>>(&rec)?;
        let new = WithTsOut::new(U::from(&old.rec), old.ts_out);
        Ok(compat_buffer.store(&new))
    } else {
        let old = legacy_record::<T>(&rec)?;
        Ok(compat_buffer.store(&U::from(old)))
    }
}

fn legacy_record<'a, T: HasRType>(rec: &RecordRef<'a>) -> Result<&'a T> {
    rec.get::<T>()
        .ok_or_else(|| Error::record_too_short::<T>(rec.record_size()))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use type_layout::{Field, TypeLayout};

    use super::*;
    use crate::record::str_to_c_chars;

    fn v1_definition() -> InstrumentDefMsgV1 {
        InstrumentDefMsgV1 {
            hd: RecordHeader::new::<InstrumentDefMsgV1>(rtype::INSTRUMENT_DEF, 1, 323, 10),
            ts_recv: 11,
            strike_price: 4_500_000_000_000,
            raw_symbol: str_to_c_chars("ESZ4 C4500").unwrap(),
            security_update_action: b'A' as c_char,
            ..Default::default()
        }
    }

    #[rstest]
    #[case::definition(InstrumentDefMsgV1::default(), 360)]
    #[case::error(ErrorMsgV1::default(), 80)]
    #[case::symbol_mapping(SymbolMappingMsgV1::default(), 80)]
    #[case::system(SystemMsgV1::default(), 80)]
    fn test_v1_sizes<R: HasRType + TypeLayout>(#[case] rec: R, #[case] exp: usize) {
        assert_eq!(mem::size_of::<R>(), exp);
        assert_eq!(rec.record_size(), exp);
        let layout = R::type_layout();
        assert_eq!(layout.alignment, 8, "Unexpected alignment: {layout}");
        for field in layout.fields.iter() {
            assert!(
                matches!(field, Field::Field { .. }),
                "Detected padding: {layout}"
            );
        }
    }

    #[test]
    fn test_version_symbol_cstr_len() {
        assert_eq!(version_symbol_cstr_len(1), 22);
        assert_eq!(version_symbol_cstr_len(2), 71);
    }

    #[test]
    fn test_upgrade_definition() {
        let old = v1_definition();
        let mut compat = CompatBuffer::default();
        let rec =
            decode_record_ref(1, VersionUpgradePolicy::Upgrade, false, &mut compat, old.as_ref())
                .unwrap();
        assert_eq!(rec.record_size(), mem::size_of::<InstrumentDefMsg>());
        let def = rec.get::<InstrumentDefMsg>().unwrap();
        assert_eq!(def.raw_symbol().unwrap(), "ESZ4 C4500");
        assert_eq!(def.strike_price, 4_500_000_000_000);
        assert_eq!(def.hd.instrument_id, 323);
        assert_eq!(def.ts_recv, 11);
    }

    #[test]
    fn test_upgrade_with_ts_out() {
        let old = WithTsOut::new(
            SystemMsgV1 {
                hd: RecordHeader::new::<SystemMsgV1>(rtype::SYSTEM, 0, 0, 1),
                msg: str_to_c_chars("Heartbeat").unwrap(),
            },
            99,
        );
        let mut compat = CompatBuffer::default();
        let rec =
            decode_record_ref(1, VersionUpgradePolicy::Upgrade, true, &mut compat, old.as_ref())
                .unwrap();
        let upgraded = rec.get::<WithTsOut<SystemMsg>>().unwrap();
        assert!(upgraded.rec.is_heartbeat());
        assert_eq!(upgraded.ts_out, 99);
        assert_eq!(rec.record_size(), mem::size_of::<WithTsOut<SystemMsg>>());
    }

    #[test]
    fn test_as_is_leaves_v1() {
        let old = SymbolMappingMsgV1 {
            hd: RecordHeader::new::<SymbolMappingMsgV1>(rtype::SYMBOL_MAPPING, 0, 5, 0),
            stype_in_symbol: str_to_c_chars("AAPL").unwrap(),
            stype_out_symbol: str_to_c_chars("5").unwrap(),
            ..Default::default()
        };
        let mut compat = CompatBuffer::default();
        let rec =
            decode_record_ref(1, VersionUpgradePolicy::AsIs, false, &mut compat, old.as_ref())
                .unwrap();
        assert_eq!(rec.record_size(), 80);
        assert!(rec.get::<SymbolMappingMsg>().is_none());
        assert_eq!(
            rec.get::<SymbolMappingMsgV1>().unwrap().stype_in_symbol().unwrap(),
            "AAPL"
        );
    }

    #[test]
    fn test_upgrade_too_short() {
        let mut old = ErrorMsgV1::default();
        // a frame claiming to be an error but shorter than the v1 struct
        old.hd.length = 8;
        let mut compat = CompatBuffer::default();
        let res =
            decode_record_ref(1, VersionUpgradePolicy::Upgrade, false, &mut compat, old.as_ref());
        assert!(matches!(res, Err(Error::RecordTooShort { length: 32, .. })));
    }

    #[test]
    fn test_newer_version() {
        let rec = SystemMsg::heartbeat(0);
        let mut compat = CompatBuffer::default();
        let res = decode_record_ref(
            DBN_VERSION + 1,
            VersionUpgradePolicy::Upgrade,
            false,
            &mut compat,
            rec.as_ref(),
        );
        assert!(matches!(
            res,
            Err(Error::UnsupportedVersion { version }) if version == DBN_VERSION + 1
        ));
    }
}
