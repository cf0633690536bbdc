//! Contains [`Metadata`] struct which comes at the beginning of any DBN file or
//! stream and [`MetadataBuilder`] for creating a [`Metadata`] with defaults.

use std::num::NonZeroU64;

use crate::{
    compat::{version_symbol_cstr_len, SYMBOL_CSTR_LEN_V2},
    record::ts_to_dt,
    Error, Result, SType, Schema, VersionUpgradePolicy, DBN_VERSION,
};

/// Information about the data contained in a DBN file or stream. DBN requires the
/// Metadata to be included at the start of the encoded data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// The DBN schema version number. Newly-encoded DBN files will use
    /// [`crate::DBN_VERSION`].
    pub version: u8,
    /// The dataset code.
    pub dataset: String,
    /// The data record schema. Specifies which record types are in the DBN stream.
    /// `None` indicates the DBN stream _may_ contain more than one record type.
    pub schema: Option<Schema>,
    /// The UNIX nanosecond timestamp of the query start, or the first record if the
    /// file was split.
    pub start: u64,
    /// The UNIX nanosecond timestamp of the query end, or the last record if the file
    /// was split.
    pub end: Option<NonZeroU64>,
    /// The optional maximum number of records for the query.
    pub limit: Option<NonZeroU64>,
    /// The input symbology type to map from. `None` indicates a mix, such as in the
    /// case of live data.
    pub stype_in: Option<SType>,
    /// The output symbology type to map to.
    pub stype_out: SType,
    /// `true` if this store contains live data with send timestamps appended to each
    /// record.
    pub ts_out: bool,
    /// The length in bytes of fixed-length symbol strings, including a null terminator
    /// byte.
    pub symbol_cstr_len: usize,
    /// The original query input symbols from the request.
    pub symbols: Vec<String>,
    /// Symbols that did not resolve for _at least one day_ in the query time range.
    pub partial: Vec<String>,
    /// Symbols that did not resolve for _any_ day in the query time range.
    pub not_found: Vec<String>,
    /// Symbol mappings containing a raw symbol and its mapping intervals.
    pub mappings: Vec<SymbolMapping>,
}

impl Metadata {
    /// Creates a builder for building `Metadata`. Call `.dataset(...)`, `.schema(...)`,
    /// `.start(...)` `.stype_in(...)`, and `.stype_out(...)` on the builder to set the
    /// required fields. Finally call `.build()` to create the `Metadata` instance.
    pub fn builder() -> MetadataBuilder {
        MetadataBuilder::default()
    }

    /// Parses the raw query start into a datetime.
    pub fn start(&self) -> Option<time::OffsetDateTime> {
        ts_to_dt(self.start)
    }

    /// Parses the raw query end time or the timestamp of the last record into a
    /// datetime. Returns `None` if the end time was not specified.
    pub fn end(&self) -> Option<time::OffsetDateTime> {
        self.end.and_then(|end| ts_to_dt(end.get()))
    }

    /// Upgrades the metadata according to `upgrade_policy` if necessary.
    pub fn upgrade(&mut self, upgrade_policy: VersionUpgradePolicy) {
        if self.version < DBN_VERSION {
            match upgrade_policy {
                VersionUpgradePolicy::AsIs => {
                    self.symbol_cstr_len = version_symbol_cstr_len(self.version);
                }
                VersionUpgradePolicy::Upgrade => {
                    self.version = DBN_VERSION;
                    self.symbol_cstr_len = SYMBOL_CSTR_LEN_V2;
                }
            }
        }
    }

    /// Returns the symbol `raw_symbol` resolved to on `date`, if any.
    pub fn resolve(&self, raw_symbol: &str, date: time::Date) -> Option<&str> {
        self.mappings
            .iter()
            .find(|mapping| mapping.raw_symbol == raw_symbol)?
            .intervals
            .iter()
            .find(|interval| interval.start_date <= date && date < interval.end_date)
            .map(|interval| interval.symbol.as_str())
    }
}

/// Helper for constructing [`Metadata`] structs with defaults.
///
/// # Required fields
/// - [`dataset`](Metadata::dataset)
/// - [`schema`](Metadata::schema)
/// - [`start`](Metadata::start)
/// - [`stype_in`](Metadata::stype_in)
/// - [`stype_out`](Metadata::stype_out)
#[derive(Debug, Clone)]
pub struct MetadataBuilder {
    version: u8,
    dataset: Option<String>,
    schema: Option<Option<Schema>>,
    start: Option<u64>,
    end: Option<NonZeroU64>,
    limit: Option<NonZeroU64>,
    stype_in: Option<Option<SType>>,
    stype_out: Option<SType>,
    ts_out: bool,
    symbols: Vec<String>,
    partial: Vec<String>,
    not_found: Vec<String>,
    mappings: Vec<SymbolMapping>,
}

impl MetadataBuilder {
    /// Creates a new instance of the builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets [`version`](Metadata::version) and returns the builder.
    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Sets [`dataset`](Metadata::dataset) and returns the builder.
    pub fn dataset(mut self, dataset: impl ToString) -> Self {
        self.dataset = Some(dataset.to_string());
        self
    }

    /// Sets [`schema`](Metadata::schema) and returns the builder.
    pub fn schema(mut self, schema: Option<Schema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Sets [`start`](Metadata::start) and returns the builder.
    pub fn start(mut self, start: u64) -> Self {
        self.start = Some(start);
        self
    }

    /// Sets [`end`](Metadata::end) and returns the builder.
    pub fn end(mut self, end: Option<NonZeroU64>) -> Self {
        self.end = end;
        self
    }

    /// Sets [`limit`](Metadata::limit) and returns the builder.
    pub fn limit(mut self, limit: Option<NonZeroU64>) -> Self {
        self.limit = limit;
        self
    }

    /// Sets [`stype_in`](Metadata::stype_in) and returns the builder.
    pub fn stype_in(mut self, stype_in: Option<SType>) -> Self {
        self.stype_in = Some(stype_in);
        self
    }

    /// Sets [`stype_out`](Metadata::stype_out) and returns the builder.
    pub fn stype_out(mut self, stype_out: SType) -> Self {
        self.stype_out = Some(stype_out);
        self
    }

    /// Sets [`ts_out`](Metadata::ts_out) and returns the builder.
    pub fn ts_out(mut self, ts_out: bool) -> Self {
        self.ts_out = ts_out;
        self
    }

    /// Sets [`symbols`](Metadata::symbols) and returns the builder.
    pub fn symbols(mut self, symbols: Vec<String>) -> Self {
        self.symbols = symbols;
        self
    }

    /// Sets [`partial`](Metadata::partial) and returns the builder.
    pub fn partial(mut self, partial: Vec<String>) -> Self {
        self.partial = partial;
        self
    }

    /// Sets [`not_found`](Metadata::not_found) and returns the builder.
    pub fn not_found(mut self, not_found: Vec<String>) -> Self {
        self.not_found = not_found;
        self
    }

    /// Sets [`mappings`](Metadata::mappings) and returns the builder.
    pub fn mappings(mut self, mappings: Vec<SymbolMapping>) -> Self {
        self.mappings = mappings;
        self
    }

    /// Constructs a [`Metadata`] object.
    ///
    /// # Errors
    /// This function returns an error if any of the required fields weren't set or
    /// `version` is newer than [`DBN_VERSION`].
    pub fn build(self) -> Result<Metadata> {
        fn required<T>(field: Option<T>, name: &str) -> Result<T> {
            field.ok_or_else(|| Error::bad_arg(name, "required field not set"))
        }

        if self.version == 0 || self.version > DBN_VERSION {
            return Err(Error::bad_arg(
                "version",
                format!("unsupported DBN version {}", self.version),
            ));
        }
        Ok(Metadata {
            version: self.version,
            dataset: required(self.dataset, "dataset")?,
            schema: required(self.schema, "schema")?,
            start: required(self.start, "start")?,
            end: self.end,
            limit: self.limit,
            stype_in: required(self.stype_in, "stype_in")?,
            stype_out: required(self.stype_out, "stype_out")?,
            ts_out: self.ts_out,
            symbol_cstr_len: version_symbol_cstr_len(self.version),
            symbols: self.symbols,
            partial: self.partial,
            not_found: self.not_found,
            mappings: self.mappings,
        })
    }
}

impl Default for MetadataBuilder {
    fn default() -> Self {
        Self {
            version: DBN_VERSION,
            dataset: None,
            schema: None,
            start: None,
            end: None,
            limit: None,
            stype_in: None,
            stype_out: None,
            ts_out: false,
            symbols: vec![],
            partial: vec![],
            not_found: vec![],
            mappings: vec![],
        }
    }
}

/// A raw symbol and its symbol mappings for different time ranges within the query range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolMapping {
    /// The `stype_in` symbol.
    pub raw_symbol: String,
    /// The mappings of `raw_symbol` to `stype_out` for different date ranges.
    pub intervals: Vec<MappingInterval>,
}

/// The resolved symbol for a date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingInterval {
    /// The UTC start date of interval (inclusive).
    pub start_date: time::Date,
    /// The UTC end date of interval (exclusive).
    pub end_date: time::Date,
    /// The resolved symbol for this interval (in `stype_out`).
    pub symbol: String,
}

#[cfg(test)]
mod tests {
    use rstest::*;
    use time::macros::date;

    use super::*;

    fn builder() -> MetadataBuilder {
        Metadata::builder()
            .dataset("GLBX.MDP3")
            .schema(Some(Schema::Mbp1))
            .start(0)
            .stype_in(None)
            .stype_out(SType::InstrumentId)
    }

    #[rstest]
    #[case(VersionUpgradePolicy::AsIs, 1, 22)]
    #[case(VersionUpgradePolicy::Upgrade, 2, 71)]
    fn test_upgrade_metadata(
        #[case] upgrade_policy: VersionUpgradePolicy,
        #[case] exp_version: u8,
        #[case] exp_cstr_len: usize,
    ) {
        let mut target = builder().version(1).build().unwrap();
        assert_eq!(target.version, 1);
        assert_eq!(target.symbol_cstr_len, 22);
        target.upgrade(upgrade_policy);
        assert_eq!(target.version, exp_version);
        assert_eq!(target.symbol_cstr_len, exp_cstr_len);
    }

    #[test]
    fn test_upgrade_current_is_noop() {
        let mut target = builder().build().unwrap();
        let orig = target.clone();
        target.upgrade(VersionUpgradePolicy::Upgrade);
        assert_eq!(target, orig);
    }

    #[test]
    fn test_build_missing_field() {
        let res = Metadata::builder()
            .dataset("XNAS.ITCH")
            .schema(None)
            .start(0)
            .stype_in(Some(SType::RawSymbol))
            .build();
        assert!(matches!(res, Err(Error::BadArgument { param_name, .. }) if param_name == "stype_out"));
    }

    #[test]
    fn test_build_bad_version() {
        assert!(builder().version(DBN_VERSION + 1).build().is_err());
        assert!(builder().version(0).build().is_err());
    }

    #[test]
    fn test_start_end() {
        let target = builder()
            .start(1_704_067_200_000_000_000)
            .end(None)
            .build()
            .unwrap();
        assert_eq!(target.start().unwrap().date(), date!(2024 - 01 - 01));
        assert!(target.end().is_none());
    }

    #[test]
    fn test_resolve() {
        let target = builder()
            .stype_out(SType::InstrumentId)
            .mappings(vec![SymbolMapping {
                raw_symbol: "ESH4".to_owned(),
                intervals: vec![
                    MappingInterval {
                        start_date: date!(2024 - 01 - 01),
                        end_date: date!(2024 - 01 - 02),
                        symbol: "5482".to_owned(),
                    },
                    MappingInterval {
                        start_date: date!(2024 - 01 - 02),
                        end_date: date!(2024 - 01 - 03),
                        symbol: "5483".to_owned(),
                    },
                ],
            }])
            .build()
            .unwrap();
        assert_eq!(target.resolve("ESH4", date!(2024 - 01 - 02)), Some("5483"));
        assert_eq!(target.resolve("ESH4", date!(2024 - 01 - 03)), None);
        assert_eq!(target.resolve("NQH4", date!(2024 - 01 - 01)), None);
    }
}
