/// Implements [`Record`](crate::record::Record), [`RecordMut`](crate::record::RecordMut),
/// [`HasRType`](crate::record::HasRType) and `AsRef<[u8]>` for a record struct whose
/// first field is `hd: RecordHeader`.
///
/// The optional `index_ts` names the field used as the primary timestamp in place of
/// `hd.ts_event`.
macro_rules! dbn_record {
    ($rec:ty, $($rtype:path)|+ $(; index_ts = $index_ts:ident)?) => {
        impl $crate::record::Record for $rec {
            fn header(&self) -> &$crate::record::RecordHeader {
                &self.hd
            }

            $(
                fn raw_index_ts(&self) -> u64 {
                    self.$index_ts
                }
            )?
        }

        impl $crate::record::RecordMut for $rec {
            fn header_mut(&mut self) -> &mut $crate::record::RecordHeader {
                &mut self.hd
            }
        }

        impl $crate::record::HasRType for $rec {
            #[allow(deprecated)]
            fn has_rtype(rtype: u8) -> bool {
                matches!(rtype, $($rtype)|+)
            }
        }

        impl AsRef<[u8]> for $rec {
            fn as_ref(&self) -> &[u8] {
                // Safety: records are `repr(C)` plain old data
                unsafe { $crate::record::as_u8_slice(self) }
            }
        }
    };
}

pub(crate) use dbn_record;

/// Implements `Default` for a record struct by zeroing it, then setting the header for
/// `$rtype` and each listed field to its null sentinel.
macro_rules! sentinel_default {
    ($rec:ty, $rtype:expr $(, $field:ident = $value:expr)* $(,)?) => {
        impl Default for $rec {
            fn default() -> Self {
                // Safety: records are `repr(C)` structs of integers and integer arrays,
                // for which all-zero bytes are a valid value
                let mut rec: Self = unsafe { ::std::mem::zeroed() };
                rec.hd = $crate::record::RecordHeader::default::<Self>($rtype);
                $(rec.$field = $value;)*
                rec
            }
        }
    };
}

pub(crate) use sentinel_default;

/// Implements `Default` for an instrument definition struct, current or legacy, with
/// null sentinels in every numeric field.
macro_rules! instrument_def_default {
    ($rec:ty) => {
        $crate::macros::sentinel_default!(
            $rec,
            $crate::enums::rtype::INSTRUMENT_DEF,
            ts_recv = $crate::UNDEF_TIMESTAMP,
            min_price_increment = $crate::UNDEF_PRICE,
            display_factor = $crate::UNDEF_PRICE,
            expiration = $crate::UNDEF_TIMESTAMP,
            activation = $crate::UNDEF_TIMESTAMP,
            high_limit_price = $crate::UNDEF_PRICE,
            low_limit_price = $crate::UNDEF_PRICE,
            max_price_variation = $crate::UNDEF_PRICE,
            trading_reference_price = $crate::UNDEF_PRICE,
            unit_of_measure_qty = $crate::UNDEF_PRICE,
            min_price_increment_amount = $crate::UNDEF_PRICE,
            price_ratio = $crate::UNDEF_PRICE,
            strike_price = $crate::UNDEF_PRICE,
            inst_attrib_value = i32::MAX,
            market_depth_implied = i32::MAX,
            market_depth = i32::MAX,
            market_segment_id = u32::MAX,
            max_trade_vol = u32::MAX,
            min_lot_size = i32::MAX,
            min_lot_size_block = i32::MAX,
            min_lot_size_round_lot = i32::MAX,
            min_trade_vol = u32::MAX,
            contract_multiplier = i32::MAX,
            decay_quantity = i32::MAX,
            original_contract_size = i32::MAX,
            trading_reference_date = u16::MAX,
            appl_id = i16::MAX,
            maturity_year = u16::MAX,
            decay_start_date = u16::MAX,
            channel_id = u16::MAX,
            md_security_trading_status = u8::MAX,
            main_fraction = u8::MAX,
            price_display_format = u8::MAX,
            settl_price_type = u8::MAX,
            sub_fraction = u8::MAX,
            underlying_product = u8::MAX,
            security_update_action = $crate::SecurityUpdateAction::Add as ::std::os::raw::c_char,
            maturity_month = u8::MAX,
            maturity_day = u8::MAX,
            maturity_week = u8::MAX,
            user_defined_instrument = $crate::UserDefinedInstrument::No as ::std::os::raw::c_char,
            contract_multiplier_unit = i8::MAX,
            flow_schedule_type = i8::MAX,
            tick_rule = u8::MAX,
        );
    };
}

pub(crate) use instrument_def_default;

/// Base macro for type dispatch based on rtype.
///
/// # Errors
/// This macro returns an error if the rtype is not recognized.
#[doc(hidden)]
#[macro_export]
macro_rules! rtype_dispatch_base {
    ($rec_ref:expr, $handler:ident) => {{
        // Introduced new scope so new `use`s are ok
        use $crate::enums::RType;
        use $crate::record::*;
        match $rec_ref.rtype() {
            Ok(rtype) => match rtype {
                RType::Mbp0 => $handler!(TradeMsg),
                RType::Mbp1 => $handler!(Mbp1Msg),
                RType::Mbp10 => $handler!(Mbp10Msg),
                #[allow(deprecated)]
                RType::OhlcvDeprecated
                | RType::Ohlcv1S
                | RType::Ohlcv1M
                | RType::Ohlcv1H
                | RType::Ohlcv1D => $handler!(OhlcvMsg),
                RType::Imbalance => $handler!(ImbalanceMsg),
                RType::InstrumentDef => $handler!(InstrumentDefMsg),
                RType::Error => $handler!(ErrorMsg),
                RType::SymbolMapping => $handler!(SymbolMappingMsg),
                RType::System => $handler!(SystemMsg),
                RType::Statistics => $handler!(StatMsg),
                RType::Mbo => $handler!(MboMsg),
            },
            Err(e) => Err(e),
        }
    }};
}

/// Specializes a generic function to all record types and dispatches based on the
/// `rtype` of a [`RecordRef`](crate::RecordRef).
///
/// # Errors
/// This macro returns an error if the rtype is not recognized or the record is shorter
/// than the type associated with its rtype.
#[macro_export]
macro_rules! rtype_dispatch {
    ($rec_ref:expr, $generic_fn:expr $(,$arg:expr)*) => {{
        macro_rules! handler {
            ($r:ty) => {{
                match $rec_ref.get::<$r>() {
                    Some(rec) => Ok($generic_fn(rec $(, $arg)*)),
                    None => Err($crate::Error::record_too_short::<$r>(
                        $rec_ref.record_size(),
                    )),
                }
            }}
        }
        $crate::rtype_dispatch_base!($rec_ref, handler)
    }};
}
