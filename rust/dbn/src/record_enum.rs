use crate::{
    record::{Record, RecordHeader, RecordMut},
    Error, ErrorMsg, ImbalanceMsg, InstrumentDefMsg, MboMsg, Mbp10Msg, Mbp1Msg, OhlcvMsg, RType,
    RecordRef, StatMsg, SymbolMappingMsg, SystemMsg, TradeMsg,
};

/// An owned DBN record type of flexible type. Unlike [`RecordRef`], this type allows
/// `match`ing.
///
/// Note: this type does not support `ts_out`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordEnum {
    /// A market-by-order message.
    Mbo(MboMsg),
    /// A trade message.
    Trade(TradeMsg),
    /// A market-by-price message with a book depth of 1.
    Mbp1(Mbp1Msg),
    /// A market-by-price message with a book depth of 10.
    Mbp10(Mbp10Msg),
    /// An open, high, low, close, and volume message.
    Ohlcv(OhlcvMsg),
    /// An instrument definition message.
    InstrumentDef(InstrumentDefMsg),
    /// An auction imbalance message.
    Imbalance(ImbalanceMsg),
    /// A publisher statistic message.
    Stat(StatMsg),
    /// An error message from the Databento Live Subscription Gateway (LSG).
    Error(ErrorMsg),
    /// A symbol mapping message.
    SymbolMapping(SymbolMappingMsg),
    /// A non-error message from the Databento Live Subscription Gateway (LSG).
    System(SystemMsg),
}

/// An immutable reference to a DBN record of flexible type. Unlike [`RecordRef`], this
/// type allows `match`ing.
///
/// Note: this type does not support `ts_out`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecordRefEnum<'a> {
    /// A reference to a market-by-order message.
    Mbo(&'a MboMsg),
    /// A reference to a trade message.
    Trade(&'a TradeMsg),
    /// A reference to a market-by-price message with a book depth of 1.
    Mbp1(&'a Mbp1Msg),
    /// A reference to a market-by-price message with a book depth of 10.
    Mbp10(&'a Mbp10Msg),
    /// A reference to an open, high, low, close, and volume message.
    Ohlcv(&'a OhlcvMsg),
    /// A reference to an instrument definition message.
    InstrumentDef(&'a InstrumentDefMsg),
    /// A reference to an auction imbalance message.
    Imbalance(&'a ImbalanceMsg),
    /// A reference to a publisher statistic message.
    Stat(&'a StatMsg),
    /// A reference to an error message from the Databento Live Subscription Gateway
    /// (LSG).
    Error(&'a ErrorMsg),
    /// A reference to a symbol mapping message.
    SymbolMapping(&'a SymbolMappingMsg),
    /// A reference to a non-error message from the Databento Live Subscription Gateway
    /// (LSG).
    System(&'a SystemMsg),
}

macro_rules! for_each_variant {
    ($enum:ident, $value:expr, $rec:ident => $body:expr) => {
        match $value {
            $enum::Mbo($rec) => $body,
            $enum::Trade($rec) => $body,
            $enum::Mbp1($rec) => $body,
            $enum::Mbp10($rec) => $body,
            $enum::Ohlcv($rec) => $body,
            $enum::InstrumentDef($rec) => $body,
            $enum::Imbalance($rec) => $body,
            $enum::Stat($rec) => $body,
            $enum::Error($rec) => $body,
            $enum::SymbolMapping($rec) => $body,
            $enum::System($rec) => $body,
        }
    };
}

macro_rules! impl_from_record {
    ($($variant:ident($rec:ty)),+ $(,)?) => {
        $(
            impl From<$rec> for RecordEnum {
                fn from(rec: $rec) -> Self {
                    Self::$variant(rec)
                }
            }

            impl<'a> From<&'a $rec> for RecordRefEnum<'a> {
                fn from(rec: &'a $rec) -> Self {
                    Self::$variant(rec)
                }
            }
        )+
    };
}

impl_from_record!(
    Mbo(MboMsg),
    Trade(TradeMsg),
    Mbp1(Mbp1Msg),
    Mbp10(Mbp10Msg),
    Ohlcv(OhlcvMsg),
    InstrumentDef(InstrumentDefMsg),
    Imbalance(ImbalanceMsg),
    Stat(StatMsg),
    Error(ErrorMsg),
    SymbolMapping(SymbolMappingMsg),
    System(SystemMsg),
);

impl<'a> From<&'a RecordEnum> for RecordRefEnum<'a> {
    fn from(rec_enum: &'a RecordEnum) -> Self {
        for_each_variant!(RecordEnum, rec_enum, rec => Self::from(rec))
    }
}

impl RecordRefEnum<'_> {
    /// Converts the reference enum into an owned enum value.
    pub fn to_owned(&self) -> RecordEnum {
        #[allow(clippy::clone_on_copy)] // required for when trivial_copy feature is disabled
        for_each_variant!(RecordRefEnum, self, rec => RecordEnum::from((*rec).clone()))
    }
}

impl<'a> TryFrom<RecordRef<'a>> for RecordRefEnum<'a> {
    type Error = Error;

    fn try_from(rec_ref: RecordRef<'a>) -> Result<Self, Error> {
        fn get<'a, T: crate::HasRType>(rec_ref: &RecordRef<'a>) -> crate::Result<&'a T> {
            rec_ref
                .get::<T>()
                .ok_or_else(|| Error::record_too_short::<T>(rec_ref.record_size()))
        }

        #[allow(deprecated)]
        Ok(match rec_ref.rtype()? {
            RType::Mbo => RecordRefEnum::Mbo(get(&rec_ref)?),
            RType::Mbp0 => RecordRefEnum::Trade(get(&rec_ref)?),
            RType::Mbp1 => RecordRefEnum::Mbp1(get(&rec_ref)?),
            RType::Mbp10 => RecordRefEnum::Mbp10(get(&rec_ref)?),
            RType::OhlcvDeprecated
            | RType::Ohlcv1S
            | RType::Ohlcv1M
            | RType::Ohlcv1H
            | RType::Ohlcv1D => RecordRefEnum::Ohlcv(get(&rec_ref)?),
            RType::InstrumentDef => RecordRefEnum::InstrumentDef(get(&rec_ref)?),
            RType::Imbalance => RecordRefEnum::Imbalance(get(&rec_ref)?),
            RType::Statistics => RecordRefEnum::Stat(get(&rec_ref)?),
            RType::Error => RecordRefEnum::Error(get(&rec_ref)?),
            RType::SymbolMapping => RecordRefEnum::SymbolMapping(get(&rec_ref)?),
            RType::System => RecordRefEnum::System(get(&rec_ref)?),
        })
    }
}

impl AsRef<[u8]> for RecordEnum {
    fn as_ref(&self) -> &[u8] {
        for_each_variant!(RecordEnum, self, rec => rec.as_ref())
    }
}

impl Record for RecordEnum {
    fn header(&self) -> &RecordHeader {
        for_each_variant!(RecordEnum, self, rec => rec.header())
    }

    fn raw_index_ts(&self) -> u64 {
        for_each_variant!(RecordEnum, self, rec => rec.raw_index_ts())
    }
}

impl RecordMut for RecordEnum {
    fn header_mut(&mut self) -> &mut RecordHeader {
        for_each_variant!(RecordEnum, self, rec => rec.header_mut())
    }
}

impl AsRef<[u8]> for RecordRefEnum<'_> {
    fn as_ref(&self) -> &[u8] {
        for_each_variant!(RecordRefEnum, self, rec => rec.as_ref())
    }
}

impl Record for RecordRefEnum<'_> {
    fn header(&self) -> &RecordHeader {
        for_each_variant!(RecordRefEnum, self, rec => rec.header())
    }

    fn raw_index_ts(&self) -> u64 {
        for_each_variant!(RecordRefEnum, self, rec => rec.raw_index_ts())
    }
}
