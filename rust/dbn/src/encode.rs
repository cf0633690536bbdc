//! Encoding DBN and Zstd-compressed DBN files and streams. Used for producing fixture
//! files and re-encoding decoded data.

use std::{
    fmt,
    io::{self, SeekFrom},
    mem,
    num::NonZeroU64,
};

use streaming_iterator::StreamingIterator;

use crate::{
    compat::METADATA_RESERVED_LEN_V1,
    decode::{DbnMetadata, DecodeRecordRef},
    Error, Metadata, Record, RecordRef, Result, Schema, DBN_VERSION, NULL_LIMIT,
    NULL_RECORD_COUNT, NULL_SCHEMA, NULL_STYPE, UNDEF_TIMESTAMP,
};

/// Trait alias for [`Record`] and [`fmt::Debug`].
pub trait DbnEncodable: Record + fmt::Debug {}
impl<T> DbnEncodable for T where T: Record + fmt::Debug {}

/// Trait for types that encode a DBN record of a specific type.
pub trait EncodeRecord {
    /// Encodes a single DBN record of type `R`.
    ///
    /// # Errors
    /// This function returns an error if it's unable to write to the underlying writer.
    fn encode_record<R: DbnEncodable>(&mut self, record: &R) -> Result<()>;

    /// Encodes a slice of DBN records.
    ///
    /// # Errors
    /// This function returns an error if it's unable to write to the underlying writer.
    fn encode_records<R: DbnEncodable>(&mut self, records: &[R]) -> Result<()> {
        for record in records {
            self.encode_record(record)?;
        }
        self.flush()
    }

    /// Flushes any buffered content to the true output.
    ///
    /// # Errors
    /// This function returns an error if it's unable to flush the underlying writer.
    fn flush(&mut self) -> Result<()>;
}

/// Trait for types that encode DBN records with mixed schemas.
pub trait EncodeRecordRef {
    /// Encodes a single DBN [`RecordRef`].
    ///
    /// # Errors
    /// This function returns an error if it's unable to write to the underlying writer.
    fn encode_record_ref(&mut self, record: RecordRef) -> Result<()>;
}

/// Trait for types that encode DBN records of either a static or dynamic type.
pub trait EncodeDbn: EncodeRecord + EncodeRecordRef {
    /// Encodes a stream of DBN records.
    ///
    /// # Errors
    /// This function returns an error if it's unable to write to the underlying writer.
    fn encode_stream<R: DbnEncodable>(
        &mut self,
        mut stream: impl StreamingIterator<Item = R>,
    ) -> Result<()> {
        while let Some(record) = stream.next() {
            self.encode_record(record)?;
        }
        self.flush()
    }

    /// Encodes DBN records directly from a DBN decoder, outputting no more than
    /// `limit` records if a limit is given.
    ///
    /// # Errors
    /// This function returns an error if it's unable to write to the underlying writer
    /// or the decoder returns an error.
    fn encode_decoded<D: DecodeRecordRef + DbnMetadata>(
        &mut self,
        mut decoder: D,
        limit: Option<NonZeroU64>,
    ) -> Result<()> {
        let mut count = 0;
        while let Some(record) = decoder.decode_record_ref()? {
            self.encode_record_ref(record)?;
            count += 1;
            if limit.is_some_and(|limit| count >= limit.get()) {
                break;
            }
        }
        self.flush()
    }
}

/// The Zstandard compression level used by the encoders.
pub const ZSTD_COMPRESSION_LEVEL: i32 = 0;

fn zstd_encoder<'a, W: io::Write>(writer: W) -> Result<zstd::stream::AutoFinishEncoder<'a, W>> {
    let mut zstd_encoder = zstd::Encoder::new(writer, ZSTD_COMPRESSION_LEVEL)
        .map_err(|e| Error::io(e, "creating zstd encoder"))?;
    zstd_encoder
        .include_checksum(true)
        .map_err(|e| Error::io(e, "setting zstd checksum"))?;
    Ok(zstd_encoder.auto_finish())
}

/// Type for encoding files and streams in Databento Binary Encoding (DBN).
pub struct Encoder<W>
where
    W: io::Write,
{
    record_encoder: RecordEncoder<W>,
}

impl<W> Encoder<W>
where
    W: io::Write,
{
    /// Creates a new DBN [`Encoder`] that will write to `writer`.
    ///
    /// # Errors
    /// This function will return an error if it fails to encode `metadata` to
    /// `writer`.
    pub fn new(mut writer: W, metadata: &Metadata) -> Result<Self> {
        MetadataEncoder::new(&mut writer).encode(metadata)?;
        let record_encoder = RecordEncoder::new(writer);
        Ok(Self { record_encoder })
    }

    /// Returns a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        self.record_encoder.get_ref()
    }

    /// Returns a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        self.record_encoder.get_mut()
    }

    /// Consumes the encoder and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.record_encoder.into_inner()
    }
}

impl<W> Encoder<zstd::stream::AutoFinishEncoder<'_, W>>
where
    W: io::Write,
{
    /// Creates a new DBN [`Encoder`] that will write Zstd-compressed output to
    /// `writer`. The compressed frame is finished when the encoder is dropped.
    ///
    /// # Errors
    /// This function will return an error if it fails to encode `metadata` to
    /// `writer`.
    pub fn with_zstd(writer: W, metadata: &Metadata) -> Result<Self> {
        Encoder::new(zstd_encoder(writer)?, metadata)
    }
}

impl<W> EncodeRecord for Encoder<W>
where
    W: io::Write,
{
    fn encode_record<R: DbnEncodable>(&mut self, record: &R) -> Result<()> {
        self.record_encoder.encode_record(record)
    }

    fn flush(&mut self) -> Result<()> {
        self.record_encoder.flush()
    }
}

impl<W> EncodeRecordRef for Encoder<W>
where
    W: io::Write,
{
    fn encode_record_ref(&mut self, record: RecordRef) -> Result<()> {
        self.record_encoder.encode_record_ref(record)
    }
}

impl<W> EncodeDbn for Encoder<W> where W: io::Write {}

/// Type for encoding [`Metadata`] into Databento Binary Encoding (DBN).
pub struct MetadataEncoder<W>
where
    W: io::Write,
{
    writer: W,
}

impl<W> MetadataEncoder<W>
where
    W: io::Write,
{
    /// The minimum size in bytes of encoded metadata.
    pub const MIN_ENCODED_SIZE: usize = 128;
    /// The offset of `start` in encoded metadata.
    pub const START_OFFSET: usize =
        crate::METADATA_PRELUDE_LEN + crate::METADATA_DATASET_CSTR_LEN + mem::size_of::<Schema>();

    /// Creates a new [`MetadataEncoder`] that will write to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Encodes `metadata` into DBN. Nothing is written if `metadata` can't be encoded.
    ///
    /// # Errors
    /// This function returns an error if it fails to write to the underlying writer,
    /// `metadata` is from a newer DBN version than is supported, or one of its strings
    /// doesn't fit in its fixed-width field.
    pub fn encode(&mut self, metadata: &Metadata) -> Result<()> {
        let block = metadata_block(metadata)?;
        self.writer
            .write_all(&block)
            .map_err(|e| Error::io(e, "writing DBN metadata"))
    }
}

impl<W> MetadataEncoder<W>
where
    W: io::Write + io::Seek,
{
    /// Updates the given metadata properties in an existing DBN buffer, leaving the
    /// writer positioned at the end.
    ///
    /// # Errors
    /// This function returns an error if it's unable to seek to the position
    /// to update the metadata or it fails to write to the underlying writer.
    pub fn update_encoded(
        &mut self,
        version: u8,
        start: u64,
        end: Option<NonZeroU64>,
        limit: Option<NonZeroU64>,
    ) -> Result<()> {
        let mut range = Vec::with_capacity(4 * mem::size_of::<u64>());
        put_query_range(&mut range, version, start, end, limit);
        self.writer
            .seek(SeekFrom::Start(Self::START_OFFSET as u64))
            .map_err(|e| Error::io(e, "seeking to write position"))?;
        self.writer
            .write_all(&range)
            .map_err(|e| Error::io(e, "overwriting DBN metadata"))?;
        self.writer
            .seek(SeekFrom::End(0))
            .map_err(|e| Error::io(e, "seeking back to end"))?;
        Ok(())
    }
}

/// Serializes `metadata` with its prelude. The length in the prelude is filled in
/// once the variable-length sections are known.
fn metadata_block(metadata: &Metadata) -> Result<Vec<u8>> {
    if metadata.version > DBN_VERSION {
        return Err(Error::UnsupportedVersion {
            version: metadata.version,
        });
    }
    let cstr_len = metadata.symbol_cstr_len;
    let mut buf = Vec::with_capacity(MetadataEncoder::<Vec<u8>>::MIN_ENCODED_SIZE);
    buf.extend_from_slice(b"DBN");
    // version 0 denotes legacy files
    buf.push(metadata.version.max(1));
    buf.extend_from_slice(&[0; 4]);
    put_fixed_len_cstr(&mut buf, crate::METADATA_DATASET_CSTR_LEN, &metadata.dataset)?;
    buf.extend_from_slice(&metadata.schema.map_or(NULL_SCHEMA, |s| s as u16).to_le_bytes());
    put_query_range(
        &mut buf,
        metadata.version,
        metadata.start,
        metadata.end,
        metadata.limit,
    );
    buf.push(metadata.stype_in.map_or(NULL_STYPE, |s| s as u8));
    buf.push(metadata.stype_out as u8);
    buf.push(metadata.ts_out as u8);
    let reserved_len = if metadata.version == 1 {
        METADATA_RESERVED_LEN_V1
    } else {
        let symbol_cstr_len =
            u16::try_from(cstr_len).map_err(|_| Error::conversion::<u16>(cstr_len))?;
        buf.extend_from_slice(&symbol_cstr_len.to_le_bytes());
        crate::METADATA_RESERVED_LEN
    };
    buf.resize(buf.len() + reserved_len, 0);
    // schema_definition_length
    buf.extend_from_slice(&0u32.to_le_bytes());

    for symbols in [&metadata.symbols, &metadata.partial, &metadata.not_found] {
        put_count(&mut buf, symbols.len())?;
        for symbol in symbols.iter() {
            put_fixed_len_cstr(&mut buf, cstr_len, symbol)?;
        }
    }
    put_count(&mut buf, metadata.mappings.len())?;
    for mapping in metadata.mappings.iter() {
        put_fixed_len_cstr(&mut buf, cstr_len, &mapping.raw_symbol)?;
        put_count(&mut buf, mapping.intervals.len())?;
        for interval in mapping.intervals.iter() {
            buf.extend_from_slice(&date_to_u32(interval.start_date).to_le_bytes());
            buf.extend_from_slice(&date_to_u32(interval.end_date).to_le_bytes());
            put_fixed_len_cstr(&mut buf, cstr_len, &interval.symbol)?;
        }
    }

    let length = buf.len() - crate::METADATA_PRELUDE_LEN;
    let length = u32::try_from(length).map_err(|_| Error::conversion::<u32>(length))?;
    buf[4..crate::METADATA_PRELUDE_LEN].copy_from_slice(&length.to_le_bytes());
    Ok(buf)
}

fn put_query_range(
    buf: &mut Vec<u8>,
    version: u8,
    start: u64,
    end: Option<NonZeroU64>,
    limit: Option<NonZeroU64>,
) {
    buf.extend_from_slice(&start.to_le_bytes());
    buf.extend_from_slice(&end.map_or(UNDEF_TIMESTAMP, NonZeroU64::get).to_le_bytes());
    buf.extend_from_slice(&limit.map_or(NULL_LIMIT, NonZeroU64::get).to_le_bytes());
    if version == 1 {
        // record_count is no longer tracked
        buf.extend_from_slice(&NULL_RECORD_COUNT.to_le_bytes());
    }
}

fn put_count(buf: &mut Vec<u8>, count: usize) -> Result<()> {
    let count = u32::try_from(count).map_err(|_| Error::conversion::<u32>(count))?;
    buf.extend_from_slice(&count.to_le_bytes());
    Ok(())
}

/// Appends `string` null-padded to `cstr_len` bytes. At least one null byte is always
/// written.
fn put_fixed_len_cstr(buf: &mut Vec<u8>, cstr_len: usize, string: &str) -> Result<()> {
    if !string.is_ascii() {
        return Err(Error::Conversion {
            input: string.to_owned(),
            desired_type: "ASCII",
        });
    }
    if string.len() >= cstr_len {
        return Err(Error::encode(format!(
            "{string:?} is too long for a {cstr_len}-byte C string"
        )));
    }
    buf.extend_from_slice(string.as_bytes());
    buf.resize(buf.len() + cstr_len - string.len(), 0);
    Ok(())
}

/// Packs `date` as `YYYYMMDD`.
fn date_to_u32(date: time::Date) -> u32 {
    date.year() as u32 * 10_000 + u32::from(u8::from(date.month())) * 100 + u32::from(date.day())
}

/// Type for encoding Databento Binary Encoding (DBN) records (not metadata).
pub struct RecordEncoder<W>
where
    W: io::Write,
{
    writer: W,
}

impl<W> RecordEncoder<W>
where
    W: io::Write,
{
    /// Creates a new DBN [`RecordEncoder`] that will write to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Returns a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Consumes the encoder and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W> EncodeRecord for RecordEncoder<W>
where
    W: io::Write,
{
    fn encode_record<R: DbnEncodable>(&mut self, record: &R) -> Result<()> {
        self.writer
            .write_all(record.as_ref())
            .map_err(|e| Error::io(e, format!("serializing {record:?}")))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::io(e, "flushing output"))
    }
}

impl<W> EncodeRecordRef for RecordEncoder<W>
where
    W: io::Write,
{
    fn encode_record_ref(&mut self, record: RecordRef) -> Result<()> {
        self.writer
            .write_all(record.as_ref())
            .map_err(|e| Error::io(e, format!("serializing {record:?}")))
    }
}

impl<W> EncodeDbn for RecordEncoder<W> where W: io::Write {}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Seek};

    use rstest::rstest;

    use super::*;
    use crate::{
        compat::version_symbol_cstr_len,
        decode::{DbnDecoder, DbnMetadataDecoder, DbnRecordDecoder, DecodeRecord, DecodeStream},
        MappingInterval, MboMsg, MetadataBuilder, SType, SymbolMapping, TradeMsg,
        VersionUpgradePolicy,
    };

    fn metadata(version: u8) -> Metadata {
        MetadataBuilder::new()
            .version(version)
            .dataset("GLBX.MDP3")
            .schema(Some(Schema::Mbo))
            .start(1_657_230_820_000_000_000)
            .end(NonZeroU64::new(1_658_960_170_000_000_000))
            .stype_in(Some(SType::Parent))
            .stype_out(SType::RawSymbol)
            .ts_out(true)
            .symbols(vec!["ES".to_owned(), "NG".to_owned()])
            .partial(vec!["ESM2".to_owned()])
            .mappings(vec![SymbolMapping {
                raw_symbol: "NG.0".to_owned(),
                intervals: vec![
                    MappingInterval {
                        start_date: time::macros::date!(2022 - 07 - 26),
                        end_date: time::macros::date!(2022 - 08 - 29),
                        symbol: "NGU2".to_owned(),
                    },
                    MappingInterval {
                        start_date: time::macros::date!(2022 - 08 - 29),
                        end_date: time::macros::date!(2022 - 09 - 01),
                        symbol: "NGV2".to_owned(),
                    },
                ],
            }])
            .build()
            .unwrap()
    }

    #[rstest]
    fn test_encode_decode_metadata_identity(#[values(1, 2)] version: u8) {
        let metadata = metadata(version);
        assert_eq!(metadata.symbol_cstr_len, version_symbol_cstr_len(version));
        let mut buffer = Vec::new();
        MetadataEncoder::new(&mut buffer).encode(&metadata).unwrap();
        let length = u32::from_le_bytes(buffer[4..8].try_into().unwrap()) as usize;
        assert_eq!(buffer.len(), length + crate::METADATA_PRELUDE_LEN);
        let res = DbnMetadataDecoder::new(buffer.as_slice()).decode().unwrap();
        assert_eq!(res, metadata);
    }

    #[rstest]
    fn test_metadata_min_encoded_size(#[values(1, 2)] version: u8) {
        let metadata = MetadataBuilder::new()
            .version(version)
            .dataset("XNAS.ITCH")
            .schema(Some(Schema::Mbo))
            .start(1_697_240_529_000_000_000)
            .stype_in(Some(SType::RawSymbol))
            .stype_out(SType::InstrumentId)
            .build()
            .unwrap();
        let mut buffer = Vec::new();
        MetadataEncoder::new(&mut buffer).encode(&metadata).unwrap();
        assert_eq!(MetadataEncoder::<Vec<u8>>::MIN_ENCODED_SIZE, buffer.len());
    }

    #[test]
    fn test_put_fixed_len_cstr() {
        let mut buffer = Vec::new();
        put_fixed_len_cstr(&mut buffer, crate::SYMBOL_CSTR_LEN, "NG").unwrap();
        assert_eq!(buffer.len(), crate::SYMBOL_CSTR_LEN);
        assert_eq!(&buffer[..2], b"NG");
        assert!(buffer[2..].iter().all(|b| *b == 0));
    }

    #[rstest]
    #[case::too_long("ABCDEFGHIJKLMNOPQRSTUVWXYZ", "too long")]
    #[case::non_ascii("ÉÉ", "ASCII")]
    fn test_put_fixed_len_cstr_invalid(#[case] input: &str, #[case] exp: &str) {
        let mut buffer = Vec::new();
        let res = put_fixed_len_cstr(&mut buffer, crate::compat::SYMBOL_CSTR_LEN_V1, input);
        assert!(matches!(res, Err(e) if e.to_string().contains(exp)));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_date_to_u32() {
        assert_eq!(date_to_u32(time::macros::date!(2020 - 05 - 17)), 20200517);
        assert_eq!(date_to_u32(time::macros::date!(1999 - 12 - 31)), 19991231);
    }

    #[test]
    fn test_encode_newer_version_fails() {
        let mut metadata = metadata(DBN_VERSION);
        metadata.version = DBN_VERSION + 1;
        let mut buffer = Vec::new();
        let res = MetadataEncoder::new(&mut buffer).encode(&metadata);
        assert!(matches!(res, Err(Error::UnsupportedVersion { version }) if version == DBN_VERSION + 1));
        assert!(buffer.is_empty());
    }

    #[rstest]
    fn test_update_encoded(#[values(1, 2)] version: u8) {
        let orig_metadata = metadata(version);
        let mut buffer = Vec::new();
        MetadataEncoder::new(&mut buffer)
            .encode(&orig_metadata)
            .unwrap();
        let mut cursor = Cursor::new(&mut buffer);
        cursor.seek(SeekFrom::End(0)).unwrap();
        let before_pos = cursor.position();
        let new_start = 1_697_240_529_000_000_000;
        let new_end = NonZeroU64::new(1_705_898_017_000_000_000);
        let new_limit = NonZeroU64::new(10);
        MetadataEncoder::new(&mut cursor)
            .update_encoded(version, new_start, new_end, new_limit)
            .unwrap();
        assert_eq!(before_pos, cursor.position());
        let res = DbnMetadataDecoder::new(buffer.as_slice()).decode().unwrap();
        assert_eq!(res.start, new_start);
        assert_eq!(res.end, new_end);
        assert_eq!(res.limit, new_limit);
        assert_eq!(res.symbols, orig_metadata.symbols);
    }

    #[test]
    fn test_encode_record_ref() {
        let rec = TradeMsg {
            price: 10,
            ..Default::default()
        };
        let mut encoder = RecordEncoder::new(Vec::new());
        encoder.encode_record_ref(RecordRef::from(&rec)).unwrap();
        encoder.encode_record(&rec).unwrap();
        let buffer = encoder.into_inner();
        assert_eq!(buffer.len(), 2 * mem::size_of::<TradeMsg>());
        let mut decoder = DbnRecordDecoder::new(buffer.as_slice());
        assert_eq!(*decoder.decode::<TradeMsg>().unwrap().unwrap(), rec);
        assert_eq!(*decoder.decode::<TradeMsg>().unwrap().unwrap(), rec);
    }

    #[rstest]
    #[case::all(None, 3)]
    #[case::limited(NonZeroU64::new(2), 2)]
    fn test_encode_decoded(#[case] limit: Option<NonZeroU64>, #[case] exp: usize) {
        let mut metadata = metadata(DBN_VERSION);
        metadata.ts_out = false;
        let mut encoder = Encoder::new(Vec::new(), &metadata).unwrap();
        encoder.encode_records(&vec![MboMsg::default(); 3]).unwrap();
        let input = encoder.into_inner();

        let mut encoder = RecordEncoder::new(Vec::new());
        encoder
            .encode_decoded(DbnDecoder::new(input.as_slice()).unwrap(), limit)
            .unwrap();
        assert_eq!(encoder.into_inner().len(), exp * mem::size_of::<MboMsg>());
    }

    #[test]
    fn test_encode_stream() {
        let mut metadata = metadata(DBN_VERSION);
        metadata.ts_out = false;
        let records = [
            MboMsg {
                order_id: 1,
                ..Default::default()
            },
            MboMsg {
                order_id: 2,
                ..Default::default()
            },
        ];
        let mut encoder = Encoder::new(Vec::new(), &metadata).unwrap();
        encoder.encode_records(&records).unwrap();
        let input = encoder.into_inner();

        let mut encoder = Encoder::new(Vec::new(), &metadata).unwrap();
        encoder
            .encode_stream(
                DbnDecoder::new(input.as_slice())
                    .unwrap()
                    .decode_stream::<MboMsg>(),
            )
            .unwrap();
        assert_eq!(encoder.into_inner(), input);
    }

    #[test]
    fn test_encode_zstd() {
        let metadata = metadata(DBN_VERSION);
        let mut buffer = Vec::new();
        {
            let mut encoder = Encoder::with_zstd(&mut buffer, &metadata).unwrap();
            encoder
                .encode_record(&crate::WithTsOut::new(MboMsg::default(), 5))
                .unwrap();
        }
        let decoder =
            DbnDecoder::with_zstd(buffer.as_slice(), VersionUpgradePolicy::AsIs).unwrap();
        assert_eq!(*decoder.metadata(), metadata);
        let recs = decoder
            .decode_records::<crate::WithTsOut<MboMsg>>()
            .unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].ts_out, 5);
    }
}
