//! Decoding DBN and Zstd-compressed DBN files and streams. Decoders implement the
//! [`DecodeRecordRef`] and [`DecodeRecord`] traits.

mod aligned_buffer;
pub mod dbn;
mod stream;

pub use self::{
    aligned_buffer::AlignedBuffer,
    dbn::{
        decode_metadata_fields, decode_metadata_prelude, starts_with_prefix,
        Decoder as DbnDecoder, MetadataDecoder as DbnMetadataDecoder,
        RecordDecoder as DbnRecordDecoder,
    },
};
pub use stream::StreamIterDecoder;

use std::mem;

use crate::{record::HasRType, record_ref::RecordRef, Metadata};

/// Trait for types that decode references to DBN records of a dynamic type.
pub trait DecodeRecordRef {
    /// Tries to decode a generic reference a record. Returns `Ok(None)` if the input
    /// has been exhausted.
    ///
    /// # Errors
    /// This function returns an error if the underlying reader returns an error of a
    /// kind other than `io::ErrorKind::UnexpectedEof` upon reading.
    ///
    /// If the `length` property of the record is invalid, an
    /// [`Error::InvalidLength`](crate::Error::InvalidLength) will be returned.
    fn decode_record_ref(&mut self) -> crate::Result<Option<RecordRef>>;
}

/// Trait for decoders with metadata about what's being decoded.
pub trait DbnMetadata {
    /// Returns an immutable reference to the decoded [`Metadata`].
    fn metadata(&self) -> &Metadata;
}

/// Trait for types that decode DBN records of a particular type.
pub trait DecodeRecord {
    /// Tries to decode a reference to a single record of type `T`. Returns `Ok(None)`
    /// if the input has been exhausted.
    ///
    /// # Errors
    /// This function returns an error if the underlying reader returns an error of a
    /// kind other than `io::ErrorKind::UnexpectedEof` upon reading.
    ///
    /// If the next record is of a different type than `T`, an
    /// [`Error::Conversion`](crate::Error::Conversion) will be returned.
    ///
    /// If the `length` property of the record is invalid, an
    /// [`Error::InvalidLength`](crate::Error::InvalidLength) will be returned.
    fn decode_record<T: HasRType>(&mut self) -> crate::Result<Option<&T>>;

    /// Tries to decode all records into a `Vec`. This eagerly decodes the data.
    ///
    /// # Errors
    /// This function returns an error if the underlying reader returns an error of a
    /// kind other than `io::ErrorKind::UnexpectedEof` upon reading.
    ///
    /// If any of the records is of a different type than `T`, an
    /// [`Error::Conversion`](crate::Error::Conversion) will be returned.
    ///
    /// If the `length` property of any of the records is invalid, an
    /// [`Error::InvalidLength`](crate::Error::InvalidLength) will be returned.
    fn decode_records<T: HasRType + Clone>(mut self) -> crate::Result<Vec<T>>
    where
        Self: Sized,
    {
        let mut res = Vec::new();
        while let Some(rec) = self.decode_record::<T>()? {
            res.push(rec.clone());
        }
        Ok(res)
    }
}

/// A trait for decoders that can be converted to streaming iterators.
pub trait DecodeStream: DecodeRecord + private::LastRecord {
    /// Converts the decoder into a streaming iterator of records of type `T`. This
    /// lazily decodes the data.
    fn decode_stream<T: HasRType>(self) -> StreamIterDecoder<Self, T>
    where
        Self: Sized;
}

pub(crate) trait FromLittleEndianSlice: Sized {
    /// Returns `None` if `slice` is shorter than `Self`.
    fn from_le_slice(slice: &[u8]) -> Option<Self>;
}

macro_rules! impl_from_le_slice {
    ($($int:ty),+) => {
        $(
            impl FromLittleEndianSlice for $int {
                fn from_le_slice(slice: &[u8]) -> Option<Self> {
                    let bytes = slice.get(..mem::size_of::<Self>())?;
                    bytes.try_into().ok().map(Self::from_le_bytes)
                }
            }
        )+
    };
}

impl_from_le_slice!(u16, u32, u64);

mod private {
    use crate::RecordRef;

    /// An implementation detail for the interaction between [`StreamingIterator`] and
    /// implementors of [`DecodeStream`].
    ///
    /// [`StreamingIterator`]: streaming_iterator::StreamingIterator
    /// [`DecodeStream`]: super::DecodeStream
    #[doc(hidden)]
    pub trait LastRecord {
        fn last_record(&self) -> Option<RecordRef>;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_le_slice() {
        assert_eq!(u16::from_le_slice(&[0x01, 0x02, 0xFF]), Some(0x0201));
        assert_eq!(u32::from_le_slice(&[0x10, 0, 0, 0]), Some(16));
        assert_eq!(u64::from_le_slice(&[0; 7]), None);
    }
}
