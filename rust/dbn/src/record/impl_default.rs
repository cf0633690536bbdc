use crate::{
    macros::{instrument_def_default, sentinel_default},
    Action, Side, StatUpdateAction, UNDEF_ORDER_SIZE, UNDEF_PRICE, UNDEF_STAT_QUANTITY,
    UNDEF_TIMESTAMP,
};

use super::*;

impl RecordHeader {
    /// Creates a new `RecordHeader` with `rtype` and `length` set
    /// for `R` while the other fields are set to their defaults.
    pub const fn default<R: HasRType>(rtype: u8) -> Self {
        Self::new::<R>(rtype, 0, 0, UNDEF_TIMESTAMP)
    }
}

impl Default for BidAskPair {
    fn default() -> Self {
        Self {
            bid_px: UNDEF_PRICE,
            ask_px: UNDEF_PRICE,
            bid_sz: 0,
            ask_sz: 0,
            bid_ct: 0,
            ask_ct: 0,
        }
    }
}

const DEFAULT_ACTION: c_char = Action::Trade as c_char;
const NO_SIDE: c_char = Side::None as c_char;

sentinel_default!(
    MboMsg,
    rtype::MBO,
    price = UNDEF_PRICE,
    size = UNDEF_ORDER_SIZE,
    channel_id = u8::MAX,
    action = DEFAULT_ACTION,
    side = NO_SIDE,
    ts_recv = UNDEF_TIMESTAMP,
);
sentinel_default!(
    TradeMsg,
    rtype::MBP_0,
    price = UNDEF_PRICE,
    size = UNDEF_ORDER_SIZE,
    action = DEFAULT_ACTION,
    side = NO_SIDE,
    ts_recv = UNDEF_TIMESTAMP,
);
sentinel_default!(
    Mbp1Msg,
    rtype::MBP_1,
    price = UNDEF_PRICE,
    size = UNDEF_ORDER_SIZE,
    action = DEFAULT_ACTION,
    side = NO_SIDE,
    ts_recv = UNDEF_TIMESTAMP,
    levels = Default::default(),
);
sentinel_default!(
    Mbp10Msg,
    rtype::MBP_10,
    price = UNDEF_PRICE,
    size = UNDEF_ORDER_SIZE,
    action = DEFAULT_ACTION,
    side = NO_SIDE,
    ts_recv = UNDEF_TIMESTAMP,
    levels = Default::default(),
);

impl OhlcvMsg {
    /// Creates a new default `OhlcvMsg` for the given `schema`. Schemas other than
    /// the OHLCV ones use the deprecated OHLCV rtype.
    pub fn default_for_schema(schema: Schema) -> Self {
        #[allow(deprecated)]
        let rtype = match schema {
            Schema::Ohlcv1S => rtype::OHLCV_1S,
            Schema::Ohlcv1M => rtype::OHLCV_1M,
            Schema::Ohlcv1H => rtype::OHLCV_1H,
            Schema::Ohlcv1D => rtype::OHLCV_1D,
            _ => rtype::OHLCV_DEPRECATED,
        };
        Self {
            hd: RecordHeader::default::<Self>(rtype),
            open: UNDEF_PRICE,
            high: UNDEF_PRICE,
            low: UNDEF_PRICE,
            close: UNDEF_PRICE,
            volume: 0,
        }
    }
}

instrument_def_default!(InstrumentDefMsg);
sentinel_default!(
    ImbalanceMsg,
    rtype::IMBALANCE,
    ts_recv = UNDEF_TIMESTAMP,
    ref_price = UNDEF_PRICE,
    auction_time = UNDEF_TIMESTAMP,
    cont_book_clr_price = UNDEF_PRICE,
    auct_interest_clr_price = UNDEF_PRICE,
    ssr_filling_price = UNDEF_PRICE,
    ind_match_price = UNDEF_PRICE,
    upper_collar = UNDEF_PRICE,
    lower_collar = UNDEF_PRICE,
    paired_qty = UNDEF_ORDER_SIZE,
    total_imbalance_qty = UNDEF_ORDER_SIZE,
    market_imbalance_qty = UNDEF_ORDER_SIZE,
    unpaired_qty = UNDEF_ORDER_SIZE,
    auction_type = b'~' as c_char,
    side = NO_SIDE,
    unpaired_side = NO_SIDE,
    significant_imbalance = b'~' as c_char,
);
sentinel_default!(
    StatMsg,
    rtype::STATISTICS,
    ts_recv = UNDEF_TIMESTAMP,
    ts_ref = UNDEF_TIMESTAMP,
    price = UNDEF_PRICE,
    quantity = UNDEF_STAT_QUANTITY,
    channel_id = u16::MAX,
    update_action = StatUpdateAction::New as u8,
);
sentinel_default!(ErrorMsg, rtype::ERROR, code = u8::MAX, is_last = u8::MAX);
sentinel_default!(
    SymbolMappingMsg,
    rtype::SYMBOL_MAPPING,
    stype_in = u8::MAX,
    stype_out = u8::MAX,
    start_ts = UNDEF_TIMESTAMP,
    end_ts = UNDEF_TIMESTAMP,
);
sentinel_default!(SystemMsg, rtype::SYSTEM, code = u8::MAX);

impl<T: HasRType + Default> Default for WithTsOut<T> {
    fn default() -> Self {
        Self::new(T::default(), UNDEF_TIMESTAMP)
    }
}
