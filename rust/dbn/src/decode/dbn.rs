//! Decoding of DBN files and streams.

use std::{
    fs::File,
    io::{self, BufReader},
    mem,
    num::NonZeroU64,
    path::Path,
};

use super::{
    private::LastRecord, AlignedBuffer, DbnMetadata, DecodeRecord, DecodeRecordRef,
    DecodeStream, FromLittleEndianSlice, StreamIterDecoder,
};
use crate::{
    compat::{self, CompatBuffer, METADATA_RESERVED_LEN_V1, SYMBOL_CSTR_LEN_V1},
    error::silence_eof_error,
    Error, HasRType, MappingInterval, Metadata, Record, RecordHeader, RecordRef, Result, SType,
    Schema, SymbolMapping, VersionUpgradePolicy, DBN_VERSION, MAX_FRAME_LEN, MAX_METADATA_LEN,
    METADATA_DATASET_CSTR_LEN, METADATA_FIXED_LEN, METADATA_PRELUDE_LEN, METADATA_RESERVED_LEN,
    NULL_SCHEMA, NULL_STYPE, UNDEF_TIMESTAMP,
};

pub(crate) const DBN_PREFIX: &[u8] = b"DBN";
const DBN_PREFIX_LEN: usize = DBN_PREFIX.len();

/// Returns `true` if `bytes` starts with valid uncompressed DBN.
pub fn starts_with_prefix(bytes: &[u8]) -> bool {
    bytes.len() > DBN_PREFIX_LEN
        && &bytes[..DBN_PREFIX_LEN] == DBN_PREFIX
        && (1..=DBN_VERSION).contains(&bytes[DBN_PREFIX_LEN])
}

/// Decodes the 8-byte prelude that precedes the metadata block, returning the DBN
/// version and the length in bytes of the metadata that follows.
///
/// # Errors
/// This function returns an error if the prelude doesn't start with `DBN`, the version
/// isn't supported, or the length is shorter than the fixed metadata fields.
pub fn decode_metadata_prelude(prelude: &[u8; METADATA_PRELUDE_LEN]) -> Result<(u8, usize)> {
    if &prelude[..DBN_PREFIX_LEN] != DBN_PREFIX {
        return Err(Error::decode(format!(
            "invalid DBN metadata prelude {:?}",
            &prelude[..DBN_PREFIX_LEN]
        )));
    }
    let version = prelude[DBN_PREFIX_LEN];
    check_version(version)?;
    let length = u32::from_le_slice(&prelude[DBN_PREFIX_LEN + 1..])
        .ok_or_else(|| Error::decode("metadata prelude is missing the length"))?
        as usize;
    if length < METADATA_FIXED_LEN {
        return Err(Error::invalid_length(
            "metadata",
            length,
            format!("shorter than the fixed length {METADATA_FIXED_LEN}"),
        ));
    }
    if length > MAX_METADATA_LEN {
        return Err(Error::invalid_length(
            "metadata",
            length,
            format!("longer than the maximum {MAX_METADATA_LEN}"),
        ));
    }
    Ok((version, length))
}

fn check_version(version: u8) -> Result<()> {
    if (1..=DBN_VERSION).contains(&version) {
        Ok(())
    } else {
        Err(Error::UnsupportedVersion { version })
    }
}

/// Decodes the metadata block of the given DBN `version` from `buffer`, the bytes
/// following the prelude.
///
/// # Errors
/// This function returns an error if `buffer` is truncated, contains an invalid value,
/// or `version` isn't supported. The error names the field being decoded.
pub fn decode_metadata_fields(version: u8, buffer: &[u8]) -> Result<Metadata> {
    check_version(version)?;
    let mut cursor = MetadataCursor { buffer, pos: 0 };
    let dataset = cursor.cstr(METADATA_DATASET_CSTR_LEN, "dataset")?;
    let raw_schema = cursor.int::<u16>("schema")?;
    let schema = if raw_schema == NULL_SCHEMA {
        None
    } else {
        Some(Schema::try_from(raw_schema).map_err(|_| Error::conversion::<Schema>(raw_schema))?)
    };
    let start = cursor.int::<u64>("start")?;
    let end = cursor.int::<u64>("end")?;
    let limit = NonZeroU64::new(cursor.int::<u64>("limit")?);
    if version == 1 {
        cursor.skip(mem::size_of::<u64>(), "record_count")?;
    }
    let raw_stype_in = cursor.u8("stype_in")?;
    let stype_in = if raw_stype_in == NULL_STYPE {
        None
    } else {
        Some(SType::try_from(raw_stype_in).map_err(|_| Error::conversion::<SType>(raw_stype_in))?)
    };
    let raw_stype_out = cursor.u8("stype_out")?;
    let stype_out =
        SType::try_from(raw_stype_out).map_err(|_| Error::conversion::<SType>(raw_stype_out))?;
    let ts_out = cursor.u8("ts_out")? != 0;
    let symbol_cstr_len = if version == 1 {
        SYMBOL_CSTR_LEN_V1
    } else {
        cursor.int::<u16>("symbol_cstr_len")? as usize
    };
    if symbol_cstr_len == 0 {
        return Err(Error::decode("invalid metadata symbol_cstr_len of 0"));
    }
    cursor.skip(
        if version == 1 {
            METADATA_RESERVED_LEN_V1
        } else {
            METADATA_RESERVED_LEN
        },
        "reserved",
    )?;
    let schema_definition_length = cursor.int::<u32>("schema_definition_length")?;
    if schema_definition_length != 0 {
        return Err(Error::decode(
            "this version of dbn can't parse schema definitions",
        ));
    }
    let symbols = cursor.repeated_cstr(symbol_cstr_len, "symbols")?;
    let partial = cursor.repeated_cstr(symbol_cstr_len, "partial")?;
    let not_found = cursor.repeated_cstr(symbol_cstr_len, "not_found")?;
    let mappings = cursor.symbol_mappings(symbol_cstr_len)?;

    Ok(Metadata {
        version,
        dataset,
        schema,
        start,
        end: if end == UNDEF_TIMESTAMP {
            None
        } else {
            NonZeroU64::new(end)
        },
        limit,
        stype_in,
        stype_out,
        ts_out,
        symbol_cstr_len,
        symbols,
        partial,
        not_found,
        mappings,
    })
}

/// Bounds-checked reads over an encoded metadata block.
struct MetadataCursor<'a> {
    buffer: &'a [u8],
    pos: usize,
}

impl<'a> MetadataCursor<'a> {
    fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buffer.len())
            .ok_or_else(|| Error::Truncated {
                field: field.to_owned(),
                needed: len,
                offset: self.pos,
                available: self.buffer.len(),
            })?;
        let res = &self.buffer[self.pos..end];
        self.pos = end;
        Ok(res)
    }

    fn skip(&mut self, len: usize, field: &str) -> Result<()> {
        self.take(len, field).map(|_| ())
    }

    fn u8(&mut self, field: &str) -> Result<u8> {
        Ok(self.take(1, field)?[0])
    }

    fn int<T: FromLittleEndianSlice>(&mut self, field: &str) -> Result<T> {
        let bytes = self.take(mem::size_of::<T>(), field)?;
        T::from_le_slice(bytes)
            .ok_or_else(|| Error::decode(format!("failed to read {field} from {bytes:?}")))
    }

    fn cstr(&mut self, len: usize, field: &str) -> Result<String> {
        let bytes = self.take(len, field)?;
        decode_cstr(bytes, field)
    }

    fn repeated_cstr(&mut self, symbol_cstr_len: usize, field: &str) -> Result<Vec<String>> {
        let count = self.int::<u32>(field)? as usize;
        let read_size = count.checked_mul(symbol_cstr_len).ok_or_else(|| {
            Error::decode(format!("{field} count {count} is too large"))
        })?;
        self.take(read_size, field)?
            .chunks_exact(symbol_cstr_len)
            .enumerate()
            .map(|(i, bytes)| decode_cstr(bytes, &format!("{field} at index {i}")))
            .collect()
    }

    fn symbol_mappings(&mut self, symbol_cstr_len: usize) -> Result<Vec<SymbolMapping>> {
        let count = self.int::<u32>("mappings")?;
        // Each mapping is variable length so the count can't be trusted for allocation
        let mut res = Vec::new();
        for i in 0..count {
            let raw_symbol = self.cstr(symbol_cstr_len, &format!("mapping raw symbol at index {i}"))?;
            let interval_count = self.int::<u32>("mapping interval_count")?;
            let mut intervals = Vec::new();
            for j in 0..interval_count {
                let start_date = decode_iso8601(self.int::<u32>("mapping interval start_date")?)?;
                let end_date = decode_iso8601(self.int::<u32>("mapping interval end_date")?)?;
                let symbol = self.cstr(
                    symbol_cstr_len,
                    &format!("mapping interval symbol at index {j} of '{raw_symbol}'"),
                )?;
                intervals.push(MappingInterval {
                    start_date,
                    end_date,
                    symbol,
                });
            }
            res.push(SymbolMapping {
                raw_symbol,
                intervals,
            });
        }
        Ok(res)
    }
}

fn decode_cstr(bytes: &[u8], field: &str) -> Result<String> {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..end])
        .map(ToOwned::to_owned)
        .map_err(|e| Error::utf8(e, format!("decoding {field}")))
}

pub(crate) fn decode_iso8601(raw: u32) -> Result<time::Date> {
    let year = raw / 10_000;
    let remaining = raw % 10_000;
    let raw_month = remaining / 100;
    let month = u8::try_from(raw_month)
        .ok()
        .and_then(|m| time::Month::try_from(m).ok())
        .ok_or_else(|| {
            Error::decode(format!(
                "invalid month {raw_month} while parsing {raw} into a date"
            ))
        })?;
    let day = remaining % 100;
    time::Date::from_calendar_date(year as i32, month, day as u8)
        .map_err(|_| Error::decode(format!("couldn't convert {raw} to a valid date")))
}

/// Type for decoding files and streams in Databento Binary Encoding (DBN), both metadata and records.
pub struct Decoder<R> {
    metadata: Metadata,
    decoder: RecordDecoder<R>,
}

impl<R> Decoder<R>
where
    R: io::Read,
{
    /// Creates a new DBN [`Decoder`] from `reader`. Will decode records from previous
    /// DBN versions as-is.
    ///
    /// # Errors
    /// This function will return an error if it is unable to parse the metadata in
    /// `reader` or the input is encoded in a newer version of DBN.
    pub fn new(reader: R) -> Result<Self> {
        Self::with_upgrade_policy(reader, VersionUpgradePolicy::AsIs)
    }

    /// Creates a new DBN [`Decoder`] from `reader`. It will decode the metadata and
    /// records from previous DBN versions according to `upgrade_policy`.
    ///
    /// # Errors
    /// This function will return an error if it is unable to parse the metadata in
    /// `reader` or the input is encoded in a newer version of DBN.
    pub fn with_upgrade_policy(
        mut reader: R,
        upgrade_policy: VersionUpgradePolicy,
    ) -> Result<Self> {
        let mut metadata = MetadataDecoder::new(&mut reader).decode()?;
        let decoder = RecordDecoder::with_version(
            reader,
            metadata.version,
            upgrade_policy,
            metadata.ts_out,
        )?;
        metadata.upgrade(upgrade_policy);
        Ok(Self { metadata, decoder })
    }

    /// Returns a mutable reference to the inner reader.
    pub fn get_mut(&mut self) -> &mut R {
        self.decoder.get_mut()
    }

    /// Returns a reference to the inner reader.
    pub fn get_ref(&self) -> &R {
        self.decoder.get_ref()
    }

    /// Consumes the decoder and returns the inner reader.
    pub fn into_inner(self) -> R {
        self.decoder.into_inner()
    }
}

impl<R> Decoder<zstd::stream::Decoder<'_, BufReader<R>>>
where
    R: io::Read,
{
    /// Creates a new DBN [`Decoder`] from Zstandard-compressed `reader`.
    ///
    /// # Errors
    /// This function will return an error if it is unable to parse the metadata in `reader`.
    pub fn with_zstd(reader: R, upgrade_policy: VersionUpgradePolicy) -> Result<Self> {
        Decoder::with_upgrade_policy(
            zstd::stream::Decoder::new(reader)
                .map_err(|e| Error::io(e, "creating zstd decoder"))?,
            upgrade_policy,
        )
    }
}

impl Decoder<BufReader<File>> {
    /// Creates a DBN [`Decoder`] from the file at `path`.
    ///
    /// # Errors
    /// This function will return an error if it is unable to read the file at `path` or
    /// if it is unable to parse the metadata in the file.
    pub fn from_file(path: impl AsRef<Path>, upgrade_policy: VersionUpgradePolicy) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            Error::io(
                e,
                format!("opening DBN file at path '{}'", path.as_ref().display()),
            )
        })?;
        Self::with_upgrade_policy(BufReader::new(file), upgrade_policy)
    }
}

impl Decoder<zstd::stream::Decoder<'_, BufReader<File>>> {
    /// Creates a DBN [`Decoder`] from the Zstandard-compressed file at `path`.
    ///
    /// # Errors
    /// This function will return an error if it is unable to read the file at `path` or
    /// if it is unable to parse the metadata in the file.
    pub fn from_zstd_file(
        path: impl AsRef<Path>,
        upgrade_policy: VersionUpgradePolicy,
    ) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            Error::io(
                e,
                format!(
                    "opening Zstandard-compressed DBN file at path '{}'",
                    path.as_ref().display()
                ),
            )
        })?;
        Self::with_zstd(file, upgrade_policy)
    }
}

impl<R> DecodeRecordRef for Decoder<R>
where
    R: io::Read,
{
    fn decode_record_ref(&mut self) -> Result<Option<RecordRef>> {
        self.decoder.decode_ref()
    }
}

impl<R> DbnMetadata for Decoder<R> {
    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl<R> DecodeRecord for Decoder<R>
where
    R: io::Read,
{
    fn decode_record<T: HasRType>(&mut self) -> Result<Option<&T>> {
        self.decoder.decode()
    }
}

impl<R> DecodeStream for Decoder<R>
where
    R: io::Read,
{
    fn decode_stream<T: HasRType>(self) -> StreamIterDecoder<Self, T> {
        StreamIterDecoder::new(self)
    }
}

impl<R> LastRecord for Decoder<R> {
    fn last_record(&self) -> Option<RecordRef> {
        self.decoder.last_record()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Read,
    Compat,
}

/// A DBN decoder of records
pub struct RecordDecoder<R> {
    version: u8,
    upgrade_policy: VersionUpgradePolicy,
    ts_out: bool,
    reader: R,
    buffer: AlignedBuffer,
    compat_buffer: CompatBuffer,
    /// Where the last decoded record lives, if any.
    last: Option<Slot>,
}

impl<R> RecordDecoder<R>
where
    R: io::Read,
{
    /// Creates a new `RecordDecoder` that will decode from `reader`.
    ///
    /// Note: assumes the input is of the current DBN version. To decode records from a
    /// previous version, use [`RecordDecoder::with_version()`].
    pub fn new(reader: R) -> Self {
        Self {
            version: DBN_VERSION,
            upgrade_policy: VersionUpgradePolicy::AsIs,
            ts_out: false,
            reader,
            buffer: AlignedBuffer::with_capacity(MAX_FRAME_LEN),
            compat_buffer: CompatBuffer::default(),
            last: None,
        }
    }

    /// Creates a new `RecordDecoder` that will decode from `reader` with the specified
    /// DBN version and update records according to `upgrade_policy`.
    ///
    /// # Errors
    /// This function will return an error if the `version` isn't supported.
    pub fn with_version(
        reader: R,
        version: u8,
        upgrade_policy: VersionUpgradePolicy,
        ts_out: bool,
    ) -> Result<Self> {
        check_version(version)?;
        Ok(Self {
            version,
            upgrade_policy,
            ts_out,
            ..Self::new(reader)
        })
    }

    /// Sets the behavior for decoding DBN data of previous versions.
    pub fn set_upgrade_policy(&mut self, upgrade_policy: VersionUpgradePolicy) {
        self.upgrade_policy = upgrade_policy;
    }

    /// Sets whether to expect a send timestamp appended after every record.
    pub fn set_ts_out(&mut self, ts_out: bool) {
        self.ts_out = ts_out;
    }

    /// Returns a mutable reference to the inner reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Returns a reference to the inner reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Consumes the decoder and returns the inner reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Tries to decode the next record of type `T`. Returns `Ok(None)` if
    /// the reader is exhausted.
    ///
    /// # Errors
    /// This function returns an error if the underlying reader returns an
    /// error of a kind other than `io::ErrorKind::UnexpectedEof` upon reading.
    ///
    /// If the next record is of a different type than `T`,
    /// this function returns a conversion error.
    pub fn decode<T: HasRType>(&mut self) -> Result<Option<&T>> {
        let Some(rec_ref) = self.decode_ref()? else {
            return Ok(None);
        };
        rec_ref
            .get::<T>()
            .ok_or_else(|| {
                Error::conversion::<T>(format!(
                    "record with rtype {:#04X} and length {}",
                    rec_ref.header().rtype,
                    rec_ref.record_size()
                ))
            })
            .map(Some)
    }

    /// Tries to decode a generic reference a record. Returns `Ok(None)` if
    /// the reader is exhausted.
    ///
    /// # Errors
    /// This function returns an error if the underlying reader returns an
    /// error of a kind other than `io::ErrorKind::UnexpectedEof` before the first byte
    /// of the record. It will also return an error if it encounters an invalid or
    /// truncated record.
    pub fn decode_ref(&mut self) -> Result<Option<RecordRef>> {
        self.last = None;
        self.buffer.clear();
        let spare = self.buffer.spare_mut();
        if let Err(err) = self.reader.read_exact(&mut spare[..1]) {
            return silence_eof_error(err).map_err(|e| Error::io(e, "decoding record length"));
        }
        let length = spare[0] as usize * RecordHeader::LENGTH_MULTIPLIER;
        if length < mem::size_of::<RecordHeader>() {
            return Err(Error::invalid_length(
                "record",
                length,
                "shorter than the record header",
            ));
        }
        self.reader
            .read_exact(&mut spare[1..length])
            .map_err(|e| Error::io(e, format!("reading record with length {length}")))?;
        self.buffer.commit(length);
        let read_ptr = self.buffer.unread().as_ptr();
        let rec = compat::decode_record_ref(
            self.version,
            self.upgrade_policy,
            self.ts_out,
            &mut self.compat_buffer,
            self.buffer.unread(),
        )?;
        self.last = Some(if rec.as_ref().as_ptr() == read_ptr {
            Slot::Read
        } else {
            Slot::Compat
        });
        Ok(Some(rec))
    }
}

impl<R> DecodeRecordRef for RecordDecoder<R>
where
    R: io::Read,
{
    fn decode_record_ref(&mut self) -> Result<Option<RecordRef>> {
        self.decode_ref()
    }
}

impl<R> DecodeRecord for RecordDecoder<R>
where
    R: io::Read,
{
    fn decode_record<T: HasRType>(&mut self) -> Result<Option<&T>> {
        self.decode()
    }
}

impl<R> DecodeStream for RecordDecoder<R>
where
    R: io::Read,
{
    fn decode_stream<T: HasRType>(self) -> StreamIterDecoder<Self, T> {
        StreamIterDecoder::new(self)
    }
}

impl<R> LastRecord for RecordDecoder<R> {
    fn last_record(&self) -> Option<RecordRef> {
        let bytes = match self.last? {
            Slot::Read => self.buffer.unread(),
            Slot::Compat => self.compat_buffer.as_bytes(),
        };
        RecordRef::try_from_bytes(bytes).ok()
    }
}

/// Type for decoding [`Metadata`] from Databento Binary Encoding (DBN).
pub struct MetadataDecoder<R>
where
    R: io::Read,
{
    reader: R,
}

impl<R> MetadataDecoder<R>
where
    R: io::Read,
{
    /// Creates a new DBN [`MetadataDecoder`] from `reader`.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Decodes and returns a DBN [`Metadata`].
    ///
    /// # Errors
    /// This function will return an error if it is unable to parse the metadata.
    pub fn decode(&mut self) -> Result<Metadata> {
        let mut prelude = [0u8; METADATA_PRELUDE_LEN];
        self.reader
            .read_exact(&mut prelude)
            .map_err(|e| Error::io(e, "reading metadata prelude"))?;
        let (version, length) = decode_metadata_prelude(&prelude)?;
        let mut metadata_buffer = vec![0u8; length];
        self.reader
            .read_exact(&mut metadata_buffer)
            .map_err(|e| Error::io(e, "reading metadata"))?;
        decode_metadata_fields(version, &metadata_buffer)
    }

    /// Returns a mutable reference to the inner reader.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Consumes the decoder and returns the inner reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}
