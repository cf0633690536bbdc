use std::marker::PhantomData;

use streaming_iterator::StreamingIterator;

use super::{private::LastRecord, DecodeRecord};
use crate::{record::HasRType, Error};

/// A consuming iterator wrapping a [`DecodeRecord`]. Lazily decodes the contents of the
/// file or other input stream.
///
/// Implements [`streaming_iterator::StreamingIterator`].
pub struct StreamIterDecoder<D, T>
where
    D: DecodeRecord + LastRecord,
    T: HasRType,
{
    /// The underlying decoder implementation.
    decoder: D,
    /// Number of records that have been decoded.
    decoded: usize,
    /// Set once the end of the input or an error has been reached.
    finished: bool,
    /// Last error encountered when decoding.
    last_err: Option<Error>,
    /// Required to associate this type with a specific record type `T`.
    _marker: PhantomData<T>,
}

impl<D, T> StreamIterDecoder<D, T>
where
    D: DecodeRecord + LastRecord,
    T: HasRType,
{
    pub(crate) fn new(decoder: D) -> Self {
        Self {
            decoder,
            decoded: 0,
            finished: false,
            last_err: None,
            _marker: PhantomData,
        }
    }

    /// Returns the last error encountered when decoding, if any. Iteration ends at the
    /// first error.
    pub fn last_err(&self) -> Option<&Error> {
        self.last_err.as_ref()
    }

    /// Returns the number of records decoded so far.
    pub fn count_decoded(&self) -> usize {
        self.decoded
    }
}

impl<D, T> StreamingIterator for StreamIterDecoder<D, T>
where
    D: DecodeRecord + LastRecord,
    T: HasRType,
{
    type Item = T;

    fn advance(&mut self) {
        if self.finished {
            return;
        }
        match self.decoder.decode_record::<T>() {
            Err(err) => {
                self.last_err = Some(err);
                self.finished = true;
            }
            Ok(None) => {
                self.finished = true;
            }
            Ok(Some(_)) => {
                self.decoded += 1;
            }
        }
    }

    fn get(&self) -> Option<&Self::Item> {
        if self.finished || self.decoded == 0 {
            None
        } else {
            self.decoder.last_record()?.get::<T>()
        }
    }
}
