//! The [`RecordRef`] struct for non-owning references to DBN records.

use std::{fmt::Debug, marker::PhantomData, mem, ptr::NonNull};

use crate::{
    record::{HasRType, Record, RecordHeader},
    rtype_dispatch, Error, RecordEnum, RecordRefEnum, Result,
};

/// A wrapper around a non-owning immutable reference to a DBN record. This wrapper
/// allows for mixing of record types and schemas, and runtime record polymorphism.
///
/// The referenced bytes belong to whoever decoded them, usually a decoder's internal
/// buffer, so a `RecordRef` is only valid until the next call that refills that
/// buffer. Use [`RecordRefEnum::to_owned()`] or `clone()` the concrete record to keep
/// it longer.
#[derive(Copy, Clone)]
pub struct RecordRef<'a> {
    ptr: NonNull<RecordHeader>,
    _marker: PhantomData<&'a RecordHeader>,
}

// Safety: RecordRef exhibits immutable reference semantics similar to &T.
unsafe impl Send for RecordRef<'_> {}
unsafe impl Sync for RecordRef<'_> {}

impl<'a> RecordRef<'a> {
    /// Constructs a new reference to the DBN record in `buffer`.
    ///
    /// # Safety
    /// `buffer` should begin with a [`RecordHeader`] and contain a type implementing
    /// [`HasRType`]. It must be aligned to 8 bytes and contain at least as many bytes
    /// as the header's `length` claims.
    pub unsafe fn new(buffer: &'a [u8]) -> Self {
        debug_assert!(buffer.len() >= mem::size_of::<RecordHeader>());
        let raw_ptr = buffer.as_ptr().cast_mut().cast::<RecordHeader>();
        debug_assert_eq!(raw_ptr.align_offset(mem::align_of::<RecordHeader>()), 0);
        Self {
            ptr: NonNull::new_unchecked(raw_ptr),
            _marker: PhantomData,
        }
    }

    /// Constructs a new reference after validating that `buffer` is aligned, holds at
    /// least a header, and holds the full record the header describes.
    ///
    /// # Errors
    /// This function returns an error if `buffer` is misaligned, shorter than a
    /// header, or shorter than the record length in the header, or if the header's
    /// length is less than the size of a header.
    pub fn try_from_bytes(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < mem::size_of::<RecordHeader>() {
            return Err(Error::invalid_length(
                "buffer",
                buffer.len(),
                "too short for a record header",
            ));
        }
        if buffer.as_ptr().align_offset(mem::align_of::<RecordHeader>()) != 0 {
            return Err(Error::bad_arg("buffer", "must be aligned to 8 bytes"));
        }
        // Safety: checked length and alignment above
        let rec = unsafe { Self::new(buffer) };
        let rec_size = rec.record_size();
        if rec_size < mem::size_of::<RecordHeader>() {
            return Err(Error::invalid_length(
                "record",
                rec_size,
                "shorter than the record header",
            ));
        }
        if rec_size > buffer.len() {
            return Err(Error::invalid_length(
                "record",
                rec_size,
                format!("exceeds buffer of {} bytes", buffer.len()),
            ));
        }
        Ok(rec)
    }

    /// Returns `true` if the object points to a record of type `T`.
    pub fn has<T: HasRType>(&self) -> bool {
        T::has_rtype(self.header().rtype)
    }

    /// Returns a reference to the underlying record of type `T` or `None` if it points
    /// to another record type or the record is shorter than `T`. The latter happens
    /// when decoding records from an older DBN version without upgrading them.
    pub fn get<T: HasRType>(&self) -> Option<&'a T> {
        if self.has::<T>() && self.record_size() >= mem::size_of::<T>() {
            // Safety: checked `rtype` and length
            Some(unsafe { self.ptr.cast::<T>().as_ref() })
        } else {
            None
        }
    }

    /// Returns a native Rust enum with a variant for each record type. This allows for
    /// pattern `match`ing.
    ///
    /// # Errors
    /// This function returns a conversion error if the rtype does not correspond with
    /// any known DBN record type, or [`Error::RecordTooShort`] if the record is shorter
    /// than its type.
    pub fn as_enum(&self) -> Result<RecordRefEnum<'a>> {
        RecordRefEnum::try_from(*self)
    }

    /// Returns a reference to the underlying record of type `T` without checking if
    /// this object references a record of type `T`.
    ///
    /// # Safety
    /// The caller needs to validate this object points to a `T`.
    pub unsafe fn get_unchecked<T: HasRType>(&self) -> &'a T {
        debug_assert!(self.has::<T>());
        debug_assert!(self.record_size() >= mem::size_of::<T>());
        self.ptr.cast::<T>().as_ref()
    }
}

impl<'a, R> From<&'a R> for RecordRef<'a>
where
    R: HasRType,
{
    fn from(rec: &'a R) -> Self {
        Self {
            // Safety: `R` must be a record because it implements `HasRType`. Casting to `mut`
            // is required for `NonNull`, but it is never mutated.
            ptr: unsafe {
                NonNull::new_unchecked((rec.header() as *const RecordHeader).cast_mut())
            },
            _marker: PhantomData,
        }
    }
}

impl<'a> AsRef<[u8]> for RecordRef<'a> {
    fn as_ref(&self) -> &'a [u8] {
        // Safety: the constructors require the buffer to hold `record_size()` bytes
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr() as *const u8, self.record_size()) }
    }
}

impl<'a> Record for RecordRef<'a> {
    fn header(&self) -> &'a RecordHeader {
        // Safety: `ptr` points to a `RecordHeader`
        unsafe { self.ptr.as_ref() }
    }

    fn raw_index_ts(&self) -> u64 {
        rtype_dispatch!(self, Record::raw_index_ts).unwrap_or(self.header().ts_event)
    }
}

impl<'a> From<&'a RecordEnum> for RecordRef<'a> {
    fn from(rec_enum: &'a RecordEnum) -> Self {
        match rec_enum {
            RecordEnum::Mbo(rec) => Self::from(rec),
            RecordEnum::Trade(rec) => Self::from(rec),
            RecordEnum::Mbp1(rec) => Self::from(rec),
            RecordEnum::Mbp10(rec) => Self::from(rec),
            RecordEnum::Ohlcv(rec) => Self::from(rec),
            RecordEnum::InstrumentDef(rec) => Self::from(rec),
            RecordEnum::Imbalance(rec) => Self::from(rec),
            RecordEnum::Stat(rec) => Self::from(rec),
            RecordEnum::Error(rec) => Self::from(rec),
            RecordEnum::SymbolMapping(rec) => Self::from(rec),
            RecordEnum::System(rec) => Self::from(rec),
        }
    }
}

impl<'a> From<RecordRefEnum<'a>> for RecordRef<'a> {
    fn from(rec_enum: RecordRefEnum<'a>) -> Self {
        match rec_enum {
            RecordRefEnum::Mbo(rec) => Self::from(rec),
            RecordRefEnum::Trade(rec) => Self::from(rec),
            RecordRefEnum::Mbp1(rec) => Self::from(rec),
            RecordRefEnum::Mbp10(rec) => Self::from(rec),
            RecordRefEnum::Ohlcv(rec) => Self::from(rec),
            RecordRefEnum::InstrumentDef(rec) => Self::from(rec),
            RecordRefEnum::Imbalance(rec) => Self::from(rec),
            RecordRefEnum::Stat(rec) => Self::from(rec),
            RecordRefEnum::Error(rec) => Self::from(rec),
            RecordRefEnum::SymbolMapping(rec) => Self::from(rec),
            RecordRefEnum::System(rec) => Self::from(rec),
        }
    }
}

impl Debug for RecordRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordRef")
            .field(
                "ptr",
                &format_args!("{:?} --> {:?}", self.ptr, self.header()),
            )
            .finish()
    }
}
