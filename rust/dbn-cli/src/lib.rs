use std::{
    fs::File,
    io::{self, BufWriter, Read, Write},
    num::NonZeroU64,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{anyhow, Context};
use clap::{ArgAction, Parser, Subcommand};
use tracing::{info, warn};

use dbn::{
    decode::{starts_with_prefix, DbnDecoder, DbnMetadata, DecodeRecordRef},
    encode::{EncodeRecord, EncodeRecordRef, Encoder as DbnEncoder},
    enums::Compression,
    rtype_from_schema, Metadata, RType, Record, RecordRef, SType, Schema,
    VersionUpgradePolicy,
};
use dbn_live::{protocol::DEFAULT_PORT, LiveBuilder, Subscription, SubscriptionStart};

#[derive(Debug, Parser)]
#[clap(version, about)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream records from a live gateway
    Live(LiveArgs),
    /// Replay records from a DBN or Zstd-compressed DBN file
    Replay(ReplayArgs),
}

/// Where and how records are written.
#[derive(Debug, Default, clap::Args)]
pub struct OutputArgs {
    #[clap(
        short,
        long,
        help = "Saves the result to FILE. If no path is specified, the output will be written to standard output",
        value_name = "FILE"
    )]
    pub output: Option<PathBuf>,
    #[clap(
        short = 'D',
        long,
        action = ArgAction::SetTrue,
        default_value = "false",
        help = "Output the result as DBN instead of one line of text per record"
    )]
    pub dbn: bool,
    #[clap(short, long, action = ArgAction::SetTrue, default_value = "false", help = "Zstd compress the output")]
    pub zstd: bool,
    #[clap(
        short,
        long,
        action = ArgAction::SetTrue,
        default_value = "false",
        help = "Allow overwriting of existing files, such as the output file"
    )]
    pub force: bool,
    #[clap(
        short = 'l',
        long = "limit",
        value_name = "NUM_RECORDS",
        help = "Limit the number of records in the output to the specified number"
    )]
    pub limit: Option<NonZeroU64>,
    #[clap(
        short = 'u',
        long = "upgrade",
        default_value = "false",
        action = ArgAction::SetTrue,
        help = "Upgrade data when decoding previous DBN versions. By default data is decoded as-is."
    )]
    pub should_upgrade: bool,
}

impl OutputArgs {
    pub fn compression(&self) -> Compression {
        if self.zstd {
            Compression::ZStd
        } else {
            Compression::None
        }
    }

    pub fn upgrade_policy(&self) -> VersionUpgradePolicy {
        if self.should_upgrade {
            VersionUpgradePolicy::Upgrade
        } else {
            VersionUpgradePolicy::AsIs
        }
    }
}

#[derive(Debug, clap::Args)]
pub struct LiveArgs {
    #[clap(
        long,
        env = "DATABENTO_API_KEY",
        hide_env_values = true,
        help = "The API key used to authenticate"
    )]
    pub key: String,
    #[clap(short, long, help = "The dataset to stream, e.g. GLBX.MDP3")]
    pub dataset: String,
    #[clap(short, long, help = "The data schema, e.g. trades or mbp-1")]
    pub schema: Schema,
    #[clap(
        long = "stype",
        default_value = "raw_symbol",
        help = "The symbology of the symbols"
    )]
    pub stype_in: SType,
    #[clap(
        long,
        required = true,
        value_delimiter = ',',
        help = "Comma-separated symbols to subscribe to"
    )]
    pub symbols: Vec<String>,
    #[clap(
        long,
        help = "Replay from this point, as UNIX nanoseconds or an ISO 8601 timestamp"
    )]
    pub start: Option<String>,
    #[clap(
        long = "ts-out",
        action = ArgAction::SetTrue,
        default_value = "false",
        help = "Request the gateway send timestamp with each record"
    )]
    pub send_ts_out: bool,
    #[clap(
        long,
        value_name = "HOST[:PORT]",
        help = "Connect to this gateway instead of the one derived from the dataset"
    )]
    pub gateway: Option<Gateway>,
    #[clap(
        long = "timeout-ms",
        default_value = "1000",
        help = "How long to wait for data before checking for an interrupt"
    )]
    pub timeout_ms: u64,
    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, clap::Args)]
pub struct ReplayArgs {
    #[clap(help = "A DBN or Zstd-compressed DBN file to replay", value_name = "FILE")]
    pub input: PathBuf,
    #[clap(
        long = "schema",
        help = "Only output records of this schema",
        value_name = "SCHEMA"
    )]
    pub schema_filter: Option<Schema>,
    #[clap(
        short = 'm',
        long = "metadata",
        action = ArgAction::SetTrue,
        default_value = "false",
        conflicts_with = "dbn",
        help = "Output the metadata instead of the records"
    )]
    pub should_output_metadata: bool,
    #[clap(flatten)]
    pub output: OutputArgs,
}

/// A gateway address override.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Gateway {
    pub host: String,
    pub port: u16,
}

impl FromStr for Gateway {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = match s.rsplit_once(':') {
            Some((host, port)) => (
                host,
                port.parse()
                    .map_err(|_| format!("invalid port in '{s}'"))?,
            ),
            None => (s, DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(format!("missing host in '{s}'"));
        }
        Ok(Self {
            host: host.to_owned(),
            port,
        })
    }
}

/// Interprets `start` as UNIX nanoseconds when it's an integer, otherwise passes it to
/// the gateway as is.
pub fn parse_start(start: &str) -> SubscriptionStart {
    start
        .parse::<u64>()
        .map(SubscriptionStart::from)
        .unwrap_or_else(|_| SubscriptionStart::from(start))
}

/// Returns `true` if `err` was caused by the reader of the output going away, which is
/// not a failure for a command-line tool.
pub fn is_broken_pipe(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<dbn::Error>(),
        Some(dbn::Error::Io { source, .. }) if source.kind() == io::ErrorKind::BrokenPipe
    )
}

/// Writes records as DBN or as one line of text each.
pub enum RecordSink {
    Text(Box<dyn Write>),
    Dbn(DbnEncoder<Box<dyn Write>>),
}

impl RecordSink {
    /// Creates a sink for `args`, encoding `metadata` first if the output is DBN.
    pub fn new(args: &OutputArgs, metadata: &Metadata) -> anyhow::Result<Self> {
        let writer = output_from_args(args)?;
        Ok(if args.dbn {
            let mut metadata = metadata.clone();
            if args.limit.is_some() {
                metadata.limit = args.limit;
            }
            Self::Dbn(DbnEncoder::new(writer, &metadata)?)
        } else {
            Self::Text(writer)
        })
    }

    pub fn write_metadata(&mut self, metadata: &Metadata) -> dbn::Result<()> {
        match self {
            Self::Text(writer) => writeln!(writer, "{metadata:?}")
                .map_err(|e| dbn::Error::io(e, "writing metadata")),
            // Already encoded on creation
            Self::Dbn(_) => Ok(()),
        }
    }

    pub fn write_record(&mut self, record: RecordRef) -> dbn::Result<()> {
        match self {
            Self::Text(writer) => {
                let res = match record.as_enum() {
                    Ok(rec) => writeln!(writer, "{rec:?}"),
                    // Unknown rtype
                    Err(_) => writeln!(writer, "{:?}", record.header()),
                };
                res.map_err(|e| dbn::Error::io(e, "writing record"))
            }
            Self::Dbn(encoder) => encoder.encode_record_ref(record),
        }
    }

    pub fn finish(self) -> dbn::Result<()> {
        match self {
            Self::Text(mut writer) => writer
                .flush()
                .map_err(|e| dbn::Error::io(e, "flushing output")),
            Self::Dbn(mut encoder) => encoder.flush(),
        }
    }
}

/// Returns a writeable object where the `dbn` output will be directed.
pub fn output_from_args(args: &OutputArgs) -> anyhow::Result<Box<dyn Write>> {
    let writer: Box<dyn Write> = if let Some(output) = &args.output {
        Box::new(BufWriter::new(open_output_file(output, args.force)?))
    } else {
        Box::new(io::stdout().lock())
    };
    Ok(match args.compression() {
        Compression::None => writer,
        Compression::ZStd => Box::new(
            zstd::Encoder::new(writer, dbn::encode::ZSTD_COMPRESSION_LEVEL)
                .context("creating zstd encoder")?
                .auto_finish(),
        ),
    })
}

fn open_output_file(path: &PathBuf, force: bool) -> anyhow::Result<File> {
    let mut options = File::options();
    options.write(true).truncate(true);
    if force {
        options.create(true);
    } else if path.exists() {
        return Err(anyhow!(
            "Output file exists. Pass --force flag to overwrite the existing file."
        ));
    } else {
        options.create_new(true);
    }
    options
        .open(path)
        .with_context(|| format!("Unable to open output file '{}'", path.display()))
}

/// Returns `true` if the file at `path` starts with the uncompressed DBN prefix and a
/// supported version.
fn is_uncompressed_dbn(path: &Path) -> anyhow::Result<bool> {
    let mut prefix = [0; 4];
    let mut file = File::open(path)
        .with_context(|| format!("opening file to decode '{}'", path.display()))?;
    match file.read_exact(&mut prefix) {
        Ok(()) => Ok(starts_with_prefix(&prefix)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e).with_context(|| format!("reading '{}'", path.display())),
    }
}

/// Writes the records from a DBN file to the output.
pub fn replay(args: &ReplayArgs) -> anyhow::Result<()> {
    let policy = args.output.upgrade_policy();
    if is_uncompressed_dbn(&args.input)? {
        replay_decoded(DbnDecoder::from_file(&args.input, policy)?, args)
    } else {
        replay_decoded(DbnDecoder::from_zstd_file(&args.input, policy)?, args)
    }
}

fn replay_decoded<D>(mut decoder: D, args: &ReplayArgs) -> anyhow::Result<()>
where
    D: DecodeRecordRef + DbnMetadata,
{
    let mut metadata = decoder.metadata().clone();
    let rtype_filter = args.schema_filter.map(rtype_from_schema).transpose()?;
    if args.schema_filter.is_some() {
        metadata.schema = args.schema_filter;
    }
    let mut sink = RecordSink::new(&args.output, &metadata)?;
    if args.should_output_metadata {
        sink.write_metadata(&metadata)?;
        return Ok(sink.finish()?);
    }
    let mut count = 0;
    while let Some(record) = decoder.decode_record_ref()? {
        if rtype_filter.is_some_and(|rtype: RType| rtype as u8 != record.header().rtype) {
            continue;
        }
        sink.write_record(record)?;
        count += 1;
        if args.output.limit.is_some_and(|limit| count >= limit.get()) {
            break;
        }
    }
    Ok(sink.finish()?)
}

/// Streams records from a live session to the output until interrupted, the limit is
/// reached, or the gateway closes the session.
pub fn live(args: &LiveArgs) -> anyhow::Result<()> {
    let mut builder = LiveBuilder::new()
        .key(&args.key)
        .dataset(&args.dataset)
        .send_ts_out(args.send_ts_out)
        .upgrade_policy(args.output.upgrade_policy());
    if let Some(gateway) = &args.gateway {
        builder = builder.gateway(&gateway.host, gateway.port);
    }
    let mut client = builder.build()?;
    let shutdown = client.shutdown_handle();
    ctrlc::set_handler(move || {
        if let Err(e) = shutdown.shutdown() {
            warn!("Failed to stop session: {e}");
        }
    })
    .context("installing interrupt handler")?;

    let mut subscription = Subscription::new(&args.symbols, args.schema, args.stype_in);
    if let Some(start) = &args.start {
        subscription = subscription.with_start(parse_start(start));
    }
    client.subscribe(&subscription)?;
    let metadata = client.start()?;
    let mut sink = RecordSink::new(&args.output, &metadata)?;

    let timeout = Some(Duration::from_millis(args.timeout_ms));
    let mut count = 0;
    loop {
        match client.next_record(timeout) {
            Ok(Some(record)) => {
                sink.write_record(record)?;
                count += 1;
                if args.output.limit.is_some_and(|limit| count >= limit.get()) {
                    info!(count, "Reached record limit");
                    break;
                }
            }
            Ok(None) => {}
            Err(dbn_live::Error::SessionClosed) => {
                info!("Interrupted");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    client.stop()?;
    Ok(sink.finish()?)
}
