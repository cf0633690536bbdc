use std::{mem, os::raw::c_char, ptr::NonNull, slice};

use super::{HasRType, RecordHeader};
use crate::{Error, Result};

/// Provides a _relatively safe_ method for converting a byte slice beginning with a
/// [`RecordHeader`] to a `T`. Because it accepts a reference, the lifetime of the
/// returned reference is tied to the input. This function checks `rtype` and the
/// slice length before casting to ensure `bytes` contains a `T`.
///
/// Returns `None` if `bytes` is shorter than `T` or the rtype doesn't match.
///
/// # Safety
/// `bytes` must be aligned to 8 bytes and begin with a valid [`RecordHeader`].
pub unsafe fn transmute_record_bytes<T: HasRType>(bytes: &[u8]) -> Option<&T> {
    if bytes.len() < mem::size_of::<T>() {
        return None;
    }
    let non_null = NonNull::new_unchecked(bytes.as_ptr().cast_mut());
    if T::has_rtype(non_null.cast::<RecordHeader>().as_ref().rtype) {
        Some(non_null.cast::<T>().as_ref())
    } else {
        None
    }
}

/// Provides a _relatively safe_ method for converting a view on bytes into a
/// a [`RecordHeader`]. Because it accepts a reference, the lifetime of the returned
/// reference is tied to the input.
///
/// Returns `None` if `bytes` is shorter than a header or than the record size the
/// header claims.
///
/// # Safety
/// `bytes` must be aligned to 8 bytes.
pub unsafe fn transmute_header_bytes(bytes: &[u8]) -> Option<&RecordHeader> {
    if bytes.len() < mem::size_of::<RecordHeader>() {
        return None;
    }
    let non_null = NonNull::new_unchecked(bytes.as_ptr().cast_mut());
    let header = non_null.cast::<RecordHeader>().as_ref();
    if header.record_size() > bytes.len() {
        None
    } else {
        Some(header)
    }
}

/// Provides a _relatively safe_ method for converting a reference to a
/// [`RecordHeader`] to a struct beginning with the header. Because it accepts a reference,
/// the lifetime of the returned reference is tied to the input.
///
/// # Safety
/// Although this function accepts a reference to a [`RecordHeader`], it's assumed this is
/// part of a larger `T` struct.
pub unsafe fn transmute_record<T: HasRType>(header: &RecordHeader) -> Option<&T> {
    if T::has_rtype(header.rtype) {
        Some(NonNull::from(header).cast::<T>().as_ref())
    } else {
        None
    }
}

/// Provides a _relatively safe_ method for converting a mut reference to a
/// [`RecordHeader`] to a struct beginning with the header. Because it accepts a reference,
/// the lifetime of the returned reference is tied to the input.
///
/// # Safety
/// Although this function accepts a reference to a [`RecordHeader`], it's assumed this is
/// part of a larger `T` struct.
pub unsafe fn transmute_record_mut<T: HasRType>(header: &mut RecordHeader) -> Option<&mut T> {
    if T::has_rtype(header.rtype) {
        Some(NonNull::from(header).cast::<T>().as_mut())
    } else {
        None
    }
}

/// Aliases `data` as a slice of raw bytes.
///
/// # Safety
/// `data` must be sized and plain old data (POD), i.e. no pointers.
pub(crate) unsafe fn as_u8_slice<T: Sized>(data: &T) -> &[u8] {
    slice::from_raw_parts((data as *const T).cast(), mem::size_of::<T>())
}

/// Tries to convert a str slice to fixed-length null-terminated C char array.
///
/// # Errors
/// This function returns an error if `s` contains more than N - 1 characters. The last
/// character is reserved for the null byte.
pub fn str_to_c_chars<const N: usize>(s: &str) -> Result<[c_char; N]> {
    if s.len() > N.saturating_sub(1) {
        return Err(Error::encode(format!(
            "string cannot be longer than {}; received str of length {}",
            N.saturating_sub(1),
            s.len(),
        )));
    }
    let mut res = [0; N];
    for (c, byte) in res.iter_mut().zip(s.as_bytes()) {
        *c = *byte as c_char;
    }
    Ok(res)
}

/// Tries to convert a slice of `c_char`s to a UTF-8 `str`. The string ends at the
/// first null byte, or at the end of the array if there is none.
///
/// # Errors
/// This function returns an error if `chars` contains invalid UTF-8.
pub fn c_chars_to_str<const N: usize>(chars: &[c_char; N]) -> Result<&str> {
    // Safety: `c_char` is a byte
    let bytes = unsafe { as_u8_slice(chars) };
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(N);
    std::str::from_utf8(&bytes[..end])
        .map_err(|e| Error::utf8(e, format!("converting c_char array: {chars:?}")))
}

/// Parses a raw nanosecond-precision UNIX timestamp to an `OffsetDateTime`. Returns
/// `None` if `ts` contains the sentinel for a null timestamp.
pub fn ts_to_dt(ts: u64) -> Option<time::OffsetDateTime> {
    if ts == crate::UNDEF_TIMESTAMP {
        None
    } else {
        time::OffsetDateTime::from_unix_timestamp_nanos(ts as i128).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{record::MboMsg, rtype, TradeMsg};

    #[test]
    fn test_c_chars_round_trip_and_unterminated() {
        let chars: [c_char; 8] = str_to_c_chars("ESZ4").unwrap();
        assert_eq!(c_chars_to_str(&chars).unwrap(), "ESZ4");
        let full = [b'A' as c_char; 4];
        assert_eq!(c_chars_to_str(&full).unwrap(), "AAAA");
    }

    #[test]
    fn test_str_to_c_chars_too_long() {
        assert!(str_to_c_chars::<4>("ABCD").is_err());
        assert!(str_to_c_chars::<5>("ABCD").is_ok());
    }

    #[test]
    fn test_transmute_record_bytes_checks_len_and_rtype() {
        let rec = MboMsg::default();
        let bytes = rec.as_ref();
        // Safety: `rec` is aligned
        unsafe {
            assert!(transmute_record_bytes::<MboMsg>(bytes).is_some());
            assert!(transmute_record_bytes::<TradeMsg>(bytes).is_none());
            assert!(transmute_record_bytes::<MboMsg>(&bytes[..40]).is_none());
            assert!(transmute_header_bytes(&bytes[..8]).is_none());
            assert!(transmute_header_bytes(&bytes[..40]).is_none());
            let header = transmute_header_bytes(bytes).unwrap();
            assert_eq!(header.rtype, rtype::MBO);
        }
    }

    #[test]
    fn test_ts_to_dt_undef() {
        assert!(ts_to_dt(crate::UNDEF_TIMESTAMP).is_none());
        assert_eq!(ts_to_dt(0).unwrap().unix_timestamp(), 0);
    }
}
