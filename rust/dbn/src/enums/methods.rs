use std::mem;

use crate::{
    record::{
        ErrorMsg, ImbalanceMsg, InstrumentDefMsg, MboMsg, Mbp10Msg, Mbp1Msg, OhlcvMsg, StatMsg,
        SymbolMappingMsg, SystemMsg, TradeMsg,
    },
    InstrumentClass, RType, Schema,
};

impl InstrumentClass {
    /// Returns `true` if the instrument class is a type of option.
    ///
    /// Note: excludes [`Self::MixedSpread`], which *may* include options.
    pub fn is_option(&self) -> bool {
        matches!(self, Self::Call | Self::Put | Self::OptionSpread)
    }

    /// Returns `true` if the instrument class is a type of future.
    ///
    /// Note: excludes [`Self::MixedSpread`], which *may* include futures.
    pub fn is_future(&self) -> bool {
        matches!(self, Self::Future | Self::FutureSpread)
    }

    /// Returns `true` if the instrument class is a type of spread, i.e. composed of two
    /// or more instrument legs.
    pub fn is_spread(&self) -> bool {
        matches!(
            self,
            Self::FutureSpread | Self::OptionSpread | Self::MixedSpread
        )
    }
}

impl RType {
    /// Tries to convert the given rtype to a [`Schema`].
    ///
    /// Returns `None` if there's no corresponding `Schema` for the given rtype or
    /// in the case of `OHLCV_DEPRECATED`, it doesn't map to a single `Schema`.
    pub fn try_into_schema(rtype: u8) -> Option<Schema> {
        use crate::enums::rtype::*;
        match rtype {
            MBP_0 => Some(Schema::Trades),
            MBP_1 => Some(Schema::Mbp1),
            MBP_10 => Some(Schema::Mbp10),
            OHLCV_1S => Some(Schema::Ohlcv1S),
            OHLCV_1M => Some(Schema::Ohlcv1M),
            OHLCV_1H => Some(Schema::Ohlcv1H),
            OHLCV_1D => Some(Schema::Ohlcv1D),
            INSTRUMENT_DEF => Some(Schema::Definition),
            IMBALANCE => Some(Schema::Imbalance),
            STATISTICS => Some(Schema::Statistics),
            MBO => Some(Schema::Mbo),
            _ => None,
        }
    }

    /// Returns the size in bytes of the record type associated with the `RType` in the
    /// current DBN version, excluding any trailing `ts_out`.
    #[allow(deprecated)]
    pub const fn record_size(self) -> usize {
        match self {
            RType::Mbp0 => mem::size_of::<TradeMsg>(),
            RType::Mbp1 => mem::size_of::<Mbp1Msg>(),
            RType::Mbp10 => mem::size_of::<Mbp10Msg>(),
            RType::OhlcvDeprecated
            | RType::Ohlcv1S
            | RType::Ohlcv1M
            | RType::Ohlcv1H
            | RType::Ohlcv1D => mem::size_of::<OhlcvMsg>(),
            RType::InstrumentDef => mem::size_of::<InstrumentDefMsg>(),
            RType::Imbalance => mem::size_of::<ImbalanceMsg>(),
            RType::Error => mem::size_of::<ErrorMsg>(),
            RType::SymbolMapping => mem::size_of::<SymbolMappingMsg>(),
            RType::System => mem::size_of::<SystemMsg>(),
            RType::Statistics => mem::size_of::<StatMsg>(),
            RType::Mbo => mem::size_of::<MboMsg>(),
        }
    }

    /// Returns the interval associated with the `RType` if it's a subsampled
    /// record type, otherwise `None`.
    pub const fn interval(self) -> Option<time::Duration> {
        match self {
            RType::Ohlcv1S => Some(time::Duration::SECOND),
            RType::Ohlcv1M => Some(time::Duration::MINUTE),
            RType::Ohlcv1H => Some(time::Duration::HOUR),
            RType::Ohlcv1D => Some(time::Duration::DAY),
            _ => None,
        }
    }
}
