use super::*;
use crate::{
    Action, InstrumentClass, MatchAlgorithm, SType, SecurityUpdateAction, Side, StatType,
    StatUpdateAction, UserDefinedInstrument,
};

impl RecordHeader {
    /// The multiplier for converting the `length` field to the number of bytes.
    pub const LENGTH_MULTIPLIER: usize = 4;

    /// Creates a new `RecordHeader`. `R` and `rtype` should be compatible.
    pub const fn new<R: HasRType>(
        rtype: u8,
        publisher_id: u16,
        instrument_id: u32,
        ts_event: u64,
    ) -> Self {
        Self {
            length: (mem::size_of::<R>() / Self::LENGTH_MULTIPLIER) as u8,
            rtype,
            publisher_id,
            instrument_id,
            ts_event,
        }
    }

    /// Returns the size of the **entire** record in bytes. The size of a `RecordHeader`
    /// is constant.
    pub const fn record_size(&self) -> usize {
        self.length as usize * Self::LENGTH_MULTIPLIER
    }

    /// Returns the raw `length` field: the size of the record in 32-bit words.
    pub const fn length(&self) -> u8 {
        self.length
    }

    /// Tries to convert the raw record type into an enum.
    ///
    /// # Errors
    /// This function returns an error if the `rtype` field does not
    /// contain a valid, known [`RType`].
    pub fn rtype(&self) -> Result<RType> {
        RType::try_from(self.rtype)
            .map_err(|_| Error::conversion::<RType>(format!("{:#04X}", self.rtype)))
    }

    /// Parses the raw matching-engine-received timestamp into a datetime. Returns
    /// `None` if `ts_event` contains the sentinel for a null timestamp.
    pub fn ts_event(&self) -> Option<time::OffsetDateTime> {
        ts_to_dt(self.ts_event)
    }
}

fn side_from_raw(side: c_char) -> Result<Side> {
    Side::try_from(side as u8)
        .map_err(|_| Error::conversion::<Side>(format!("{:#04X}", side as u8)))
}

fn action_from_raw(action: c_char) -> Result<Action> {
    Action::try_from(action as u8)
        .map_err(|_| Error::conversion::<Action>(format!("{:#04X}", action as u8)))
}

/// Copies as much of `s` as fits while leaving a trailing null byte.
fn truncated_c_chars<const N: usize>(s: &str) -> [c_char; N] {
    let mut res = [0; N];
    for (c, byte) in res.iter_mut().zip(s.as_bytes()).take(N.saturating_sub(1)) {
        *c = *byte as c_char;
    }
    res
}

macro_rules! book_accessors {
    ($($rec:ty),+) => {
        $(
            impl $rec {
                /// Tries to convert the raw side to an enum.
                ///
                /// # Errors
                /// This function returns an error if the `side` field does not
                /// contain a valid [`Side`].
                pub fn side(&self) -> Result<Side> {
                    side_from_raw(self.side)
                }

                /// Tries to convert the raw event action to an enum.
                ///
                /// # Errors
                /// This function returns an error if the `action` field does not
                /// contain a valid [`Action`].
                pub fn action(&self) -> Result<Action> {
                    action_from_raw(self.action)
                }

                /// Parses the capture-server-received timestamp into a datetime.
                /// Returns `None` if `ts_recv` contains the sentinel for a null timestamp.
                pub fn ts_recv(&self) -> Option<time::OffsetDateTime> {
                    ts_to_dt(self.ts_recv)
                }

                /// Parses the raw `ts_in_delta`, the delta of `ts_recv - ts_exchange_send`,
                /// into a duration.
                pub fn ts_in_delta(&self) -> time::Duration {
                    time::Duration::new(0, self.ts_in_delta)
                }
            }
        )+
    };
}

book_accessors!(MboMsg, TradeMsg, Mbp1Msg, Mbp10Msg);

impl InstrumentDefMsg {
    /// Parses the capture-server-received timestamp into a datetime.
    /// Returns `None` if `ts_recv` contains the sentinel for a null timestamp.
    pub fn ts_recv(&self) -> Option<time::OffsetDateTime> {
        ts_to_dt(self.ts_recv)
    }

    /// Parses the last eligible trade time into a datetime. Returns `None` if
    /// `expiration` contains the sentinel for a null timestamp.
    pub fn expiration(&self) -> Option<time::OffsetDateTime> {
        ts_to_dt(self.expiration)
    }

    /// Parses the time of instrument activation into a datetime. Returns `None` if
    /// `activation` contains the sentinel for a null timestamp.
    pub fn activation(&self) -> Option<time::OffsetDateTime> {
        ts_to_dt(self.activation)
    }

    /// Returns currency used for price fields as a `&str`.
    ///
    /// # Errors
    /// This function returns an error if `currency` contains invalid UTF-8.
    pub fn currency(&self) -> Result<&str> {
        c_chars_to_str(&self.currency)
    }

    /// Returns currency used for settlement as a `&str`.
    ///
    /// # Errors
    /// This function returns an error if `settl_currency` contains invalid UTF-8.
    pub fn settl_currency(&self) -> Result<&str> {
        c_chars_to_str(&self.settl_currency)
    }

    /// Returns the instrument raw symbol assigned by the publisher as a `&str`.
    ///
    /// # Errors
    /// This function returns an error if `raw_symbol` contains invalid UTF-8.
    pub fn raw_symbol(&self) -> Result<&str> {
        c_chars_to_str(&self.raw_symbol)
    }

    /// Returns the security group code of the instrument as a `&str`.
    ///
    /// # Errors
    /// This function returns an error if `group` contains invalid UTF-8.
    pub fn group(&self) -> Result<&str> {
        c_chars_to_str(&self.group)
    }

    /// Returns the exchange used to identify the instrument as a `&str`.
    ///
    /// # Errors
    /// This function returns an error if `exchange` contains invalid UTF-8.
    pub fn exchange(&self) -> Result<&str> {
        c_chars_to_str(&self.exchange)
    }

    /// Returns the underlying asset code (product code) of the instrument as a `&str`.
    ///
    /// # Errors
    /// This function returns an error if `asset` contains invalid UTF-8.
    pub fn asset(&self) -> Result<&str> {
        c_chars_to_str(&self.asset)
    }

    /// Returns the ISO standard instrument categorization code as a `&str`.
    ///
    /// # Errors
    /// This function returns an error if `cfi` contains invalid UTF-8.
    pub fn cfi(&self) -> Result<&str> {
        c_chars_to_str(&self.cfi)
    }

    /// Returns the type of the instrument as a `&str`.
    ///
    /// # Errors
    /// This function returns an error if `security_type` contains invalid UTF-8.
    pub fn security_type(&self) -> Result<&str> {
        c_chars_to_str(&self.security_type)
    }

    /// Returns the unit of measure for the instrument's original contract size as a
    /// `&str`.
    ///
    /// # Errors
    /// This function returns an error if `unit_of_measure` contains invalid UTF-8.
    pub fn unit_of_measure(&self) -> Result<&str> {
        c_chars_to_str(&self.unit_of_measure)
    }

    /// Returns the symbol of the first underlying instrument as a `&str`.
    ///
    /// # Errors
    /// This function returns an error if `underlying` contains invalid UTF-8.
    pub fn underlying(&self) -> Result<&str> {
        c_chars_to_str(&self.underlying)
    }

    /// Returns the currency of [`strike_price`](Self::strike_price) as a `&str`.
    ///
    /// # Errors
    /// This function returns an error if `strike_price_currency` contains invalid UTF-8.
    pub fn strike_price_currency(&self) -> Result<&str> {
        c_chars_to_str(&self.strike_price_currency)
    }

    /// Tries to convert the raw classification of the instrument to an enum.
    ///
    /// # Errors
    /// This function returns an error if the `instrument_class` field does not
    /// contain a valid [`InstrumentClass`].
    pub fn instrument_class(&self) -> Result<InstrumentClass> {
        InstrumentClass::try_from(self.instrument_class as u8).map_err(|_| {
            Error::conversion::<InstrumentClass>(format!("{:#04X}", self.instrument_class as u8))
        })
    }

    /// Tries to convert the raw matching algorithm used for the instrument to an enum.
    ///
    /// # Errors
    /// This function returns an error if the `match_algorithm` field does not
    /// contain a valid [`MatchAlgorithm`].
    pub fn match_algorithm(&self) -> Result<MatchAlgorithm> {
        MatchAlgorithm::try_from(self.match_algorithm as u8).map_err(|_| {
            Error::conversion::<MatchAlgorithm>(format!("{:#04X}", self.match_algorithm as u8))
        })
    }

    /// Tries to convert the raw security update action to an enum.
    ///
    /// # Errors
    /// This function returns an error if the `security_update_action` field does not
    /// contain a valid [`SecurityUpdateAction`].
    pub fn security_update_action(&self) -> Result<SecurityUpdateAction> {
        SecurityUpdateAction::try_from(self.security_update_action as u8).map_err(|_| {
            Error::conversion::<SecurityUpdateAction>(format!(
                "{:#04X}",
                self.security_update_action as u8
            ))
        })
    }

    /// Tries to convert the raw user-defined instrument indicator to an enum.
    ///
    /// # Errors
    /// This function returns an error if the `user_defined_instrument` field does not
    /// contain a valid [`UserDefinedInstrument`].
    pub fn user_defined_instrument(&self) -> Result<UserDefinedInstrument> {
        UserDefinedInstrument::try_from(self.user_defined_instrument as u8).map_err(|_| {
            Error::conversion::<UserDefinedInstrument>(format!(
                "{:#04X}",
                self.user_defined_instrument as u8
            ))
        })
    }
}

impl ImbalanceMsg {
    /// Parses the capture-server-received timestamp into a datetime.
    /// Returns `None` if `ts_recv` contains the sentinel for a null timestamp.
    pub fn ts_recv(&self) -> Option<time::OffsetDateTime> {
        ts_to_dt(self.ts_recv)
    }

    /// Tries to convert the raw imbalance side to an enum.
    ///
    /// # Errors
    /// This function returns an error if the `side` field does not
    /// contain a valid [`Side`].
    pub fn side(&self) -> Result<Side> {
        side_from_raw(self.side)
    }
}

impl StatMsg {
    /// Parses the capture-server-received timestamp into a datetime.
    /// Returns `None` if `ts_recv` contains the sentinel for a null timestamp.
    pub fn ts_recv(&self) -> Option<time::OffsetDateTime> {
        ts_to_dt(self.ts_recv)
    }

    /// Parses the reference timestamp of the statistic value into a datetime.
    /// Returns `None` if `ts_ref` contains the sentinel for a null timestamp.
    pub fn ts_ref(&self) -> Option<time::OffsetDateTime> {
        ts_to_dt(self.ts_ref)
    }

    /// Tries to convert the raw type of the statistic value to an enum.
    ///
    /// # Errors
    /// This function returns an error if the `stat_type` field does not
    /// contain a valid [`StatType`].
    pub fn stat_type(&self) -> Result<StatType> {
        StatType::try_from(self.stat_type)
            .map_err(|_| Error::conversion::<StatType>(self.stat_type))
    }

    /// Tries to convert the raw `update_action` to an enum.
    ///
    /// # Errors
    /// This function returns an error if the `update_action` field does not
    /// contain a valid [`StatUpdateAction`].
    pub fn update_action(&self) -> Result<StatUpdateAction> {
        StatUpdateAction::try_from(self.update_action)
            .map_err(|_| Error::conversion::<StatUpdateAction>(self.update_action))
    }
}

impl ErrorMsg {
    /// Creates a new `ErrorMsg`. `msg` is truncated if it exceeds the length of the
    /// `err` field.
    pub fn new(ts_event: u64, msg: &str, is_last: bool) -> Self {
        Self {
            hd: RecordHeader::new::<Self>(rtype::ERROR, 0, 0, ts_event),
            err: truncated_c_chars(msg),
            code: u8::MAX,
            is_last: is_last as u8,
        }
    }

    /// Returns `err` as a `&str`.
    ///
    /// # Errors
    /// This function returns an error if `err` contains invalid UTF-8.
    pub fn err(&self) -> Result<&str> {
        c_chars_to_str(&self.err)
    }
}

impl SymbolMappingMsg {
    /// Creates a new `SymbolMappingMsg`.
    ///
    /// # Errors
    /// This function returns an error if `stype_in_symbol` or `stype_out_symbol`
    /// contain more than maximum number of characters of 70.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instrument_id: u32,
        ts_event: u64,
        stype_in: SType,
        stype_in_symbol: &str,
        stype_out: SType,
        stype_out_symbol: &str,
        start_ts: u64,
        end_ts: u64,
    ) -> Result<Self> {
        Ok(Self {
            // symbol mappings aren't publisher-specific
            hd: RecordHeader::new::<Self>(rtype::SYMBOL_MAPPING, 0, instrument_id, ts_event),
            stype_in: stype_in as u8,
            stype_in_symbol: str_to_c_chars(stype_in_symbol)?,
            stype_out: stype_out as u8,
            stype_out_symbol: str_to_c_chars(stype_out_symbol)?,
            start_ts,
            end_ts,
        })
    }

    /// Tries to convert the raw input symbology type to an enum.
    ///
    /// # Errors
    /// This function returns an error if `stype_in` isn't a valid [`SType`].
    pub fn stype_in(&self) -> Result<SType> {
        SType::try_from(self.stype_in).map_err(|_| Error::conversion::<SType>(self.stype_in))
    }

    /// Tries to convert the raw output symbology type to an enum.
    ///
    /// # Errors
    /// This function returns an error if `stype_out` isn't a valid [`SType`].
    pub fn stype_out(&self) -> Result<SType> {
        SType::try_from(self.stype_out).map_err(|_| Error::conversion::<SType>(self.stype_out))
    }

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

    /// Parses the start of the mapping interval into a datetime. Returns `None` if
    /// `start_ts` contains the sentinel for a null timestamp.
    pub fn start_ts(&self) -> Option<time::OffsetDateTime> {
        ts_to_dt(self.start_ts)
    }

    /// Parses the end of the mapping interval into a datetime. Returns `None` if
    /// `end_ts` contains the sentinel for a null timestamp.
    pub fn end_ts(&self) -> Option<time::OffsetDateTime> {
        ts_to_dt(self.end_ts)
    }
}

impl SystemMsg {
    const HEARTBEAT: &'static str = "Heartbeat";

    /// Creates a new `SystemMsg`.
    ///
    /// # Errors
    /// This function returns an error if `msg` is too long.
    pub fn new(ts_event: u64, msg: &str) -> Result<Self> {
        Ok(Self {
            hd: RecordHeader::new::<Self>(rtype::SYSTEM, 0, 0, ts_event),
            msg: str_to_c_chars(msg)?,
            code: u8::MAX,
        })
    }

    /// Creates a new heartbeat `SystemMsg`.
    pub fn heartbeat(ts_event: u64) -> Self {
        Self {
            hd: RecordHeader::new::<Self>(rtype::SYSTEM, 0, 0, ts_event),
            msg: truncated_c_chars(Self::HEARTBEAT),
            code: u8::MAX,
        }
    }

    /// Checks whether the message is a heartbeat from the gateway.
    pub fn is_heartbeat(&self) -> bool {
        self.msg()
            .map(|msg| msg == Self::HEARTBEAT)
            .unwrap_or_default()
    }

    /// Returns the message from the Databento Live Subscription Gateway (LSG) as
    /// a `&str`.
    ///
    /// # Errors
    /// This function returns an error if `msg` contains invalid UTF-8.
    pub fn msg(&self) -> Result<&str> {
        c_chars_to_str(&self.msg)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::flags;

    #[rstest]
    #[case::mbo(RecordHeader::new::<MboMsg>(rtype::MBO, 1, 2, 3), 56)]
    #[case::trade(RecordHeader::new::<TradeMsg>(rtype::MBP_0, 1, 2, 3), 48)]
    #[case::def(RecordHeader::new::<InstrumentDefMsg>(rtype::INSTRUMENT_DEF, 1, 2, 3), 400)]
    #[case::ts_out(RecordHeader::new::<WithTsOut<Mbp10Msg>>(rtype::MBP_10, 1, 2, 3), 376)]
    fn test_header_record_size(#[case] header: RecordHeader, #[case] exp: usize) {
        assert_eq!(header.record_size(), exp);
        assert_eq!(header.record_size(), header.length() as usize * 4);
        assert_eq!(header.record_size() % 4, 0);
    }

    #[test]
    fn test_header_unknown_rtype() {
        let mut header = RecordHeader::new::<MboMsg>(rtype::MBO, 0, 0, 0);
        header.rtype = 0xFE;
        assert!(matches!(header.rtype(), Err(Error::Conversion { .. })));
    }

    #[test]
    fn test_book_accessors() {
        let rec = MboMsg {
            side: 'B' as c_char,
            action: 'F' as c_char,
            flags: flags::LAST,
            ts_in_delta: 1_500,
            ..Default::default()
        };
        assert_eq!(rec.side().unwrap(), Side::Bid);
        assert_eq!(rec.action().unwrap(), Action::Fill);
        assert_eq!(rec.ts_in_delta(), time::Duration::nanoseconds(1_500));
        assert!(rec.ts_recv().is_none());
        let bad = TradeMsg {
            side: 'X' as c_char,
            ..Default::default()
        };
        assert!(bad.side().is_err());
    }

    #[test]
    fn test_error_msg_truncates() {
        let long = "E".repeat(400);
        let rec = ErrorMsg::new(0, &long, true);
        assert_eq!(rec.err().unwrap().len(), 301);
        assert_eq!(rec.is_last, 1);
    }

    #[test]
    fn test_symbol_mapping_new() {
        let rec = SymbolMappingMsg::new(
            5602,
            0,
            SType::RawSymbol,
            "ESZ4",
            SType::InstrumentId,
            "5602",
            1,
            2,
        )
        .unwrap();
        assert_eq!(rec.stype_in().unwrap(), SType::RawSymbol);
        assert_eq!(rec.stype_in_symbol().unwrap(), "ESZ4");
        assert_eq!(rec.stype_out_symbol().unwrap(), "5602");
        assert_eq!(rec.record_size(), 176);
        assert!(SymbolMappingMsg::new(
            1,
            0,
            SType::RawSymbol,
            &"A".repeat(71),
            SType::InstrumentId,
            "1",
            0,
            0
        )
        .is_err());
    }

    #[test]
    fn test_heartbeat() {
        assert!(SystemMsg::heartbeat(10).is_heartbeat());
        assert!(!SystemMsg::new(10, "subscription ack").unwrap().is_heartbeat());
    }

    #[test]
    fn test_with_ts_out_length() {
        let rec = WithTsOut::new(OhlcvMsg::default_for_schema(crate::Schema::Ohlcv1M), 7);
        assert_eq!(rec.record_size(), 64);
        assert_eq!(rec.header().rtype, rtype::OHLCV_1M);
        assert_eq!(rec.as_ref().len(), 64);
    }
}
