//! The line-oriented handshake with the live gateway: CRAM authentication and
//! subscription requests.

use std::fmt::{self, Display, Write as _};

use dbn::{SType, Schema};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::{
    buffer::RecordBuffer,
    transport::{ReadStatus, Transport},
    Error, Result,
};

/// Appended to the transformed dataset to form the gateway host name.
pub const GATEWAY_SUFFIX: &str = ".lsg.databento.com";
/// The gateway's TCP port.
pub const DEFAULT_PORT: u16 = 13000;
/// The length of a valid API key.
pub const API_KEY_LENGTH: usize = 32;
/// The number of trailing API key characters sent in the clear with the CRAM reply.
pub const BUCKET_ID_LENGTH: usize = 5;
/// The longest handshake line accepted from the gateway, including the newline.
pub const MAX_HANDSHAKE_LINE_LEN: usize = 24 * 1024;
/// The default limit on the length of a subscription request line.
pub const DEFAULT_MAX_SUBSCRIPTION_LEN: usize = 64 * 1024;
/// Sent to begin streaming after all subscriptions have been sent.
pub const START_SESSION: &str = "start_session\n";

/// Returns the host name of the live gateway for `dataset`, e.g.
/// `glbx-mdp3.lsg.databento.com` for `GLBX.MDP3`.
pub fn determine_gateway(dataset: &str) -> String {
    let mut gateway = dataset.to_ascii_lowercase().replace('.', "-");
    gateway.push_str(GATEWAY_SUFFIX);
    gateway
}

/// Checks `key` is a well-formed API key.
///
/// # Errors
/// This function returns a configuration error if `key` isn't exactly
/// [`API_KEY_LENGTH`] ASCII characters.
pub fn validate_key(key: &str) -> Result<()> {
    if !key.is_ascii() {
        Err(Error::config("key", "must be ASCII"))
    } else if key.len() != API_KEY_LENGTH {
        Err(Error::config(
            "key",
            format!("expected length of {API_KEY_LENGTH}, got {}", key.len()),
        ))
    } else {
        Ok(())
    }
}

/// Computes the reply to a CRAM `challenge`: the lowercase hex SHA-256 digest of
/// `<challenge>|<key>`, a dash, and the bucket ID made of the last
/// [`BUCKET_ID_LENGTH`] characters of `key`.
pub fn cram_reply(challenge: &str, key: &str) -> String {
    let digest = Sha256::digest(format!("{challenge}|{key}").as_bytes());
    let bucket_start = key
        .char_indices()
        .rev()
        .nth(BUCKET_ID_LENGTH - 1)
        .map_or(0, |(i, _)| i);
    format!("{}-{}", hex::encode(digest), &key[bucket_start..])
}

/// Encodes the authentication request sent in response to the challenge.
pub fn encode_auth_req(reply: &str, dataset: &str, send_ts_out: bool) -> String {
    format!(
        "auth={reply}|dataset={dataset}|encoding=dbn|ts_out={}\n",
        send_ts_out as u8
    )
}

/// Extracts the challenge from the gateway's `cram=<challenge>` line.
///
/// # Errors
/// This function returns a protocol error if the line isn't a CRAM challenge.
pub fn parse_challenge(line: &str) -> Result<&str> {
    line.strip_prefix("cram=")
        .ok_or_else(|| Error::protocol("did not receive CRAM challenge when expected", line))
}

/// Parses the gateway's `|`-separated `key=value` response to the authentication
/// request, returning the session ID.
///
/// # Errors
/// This function returns a protocol error if a pair is malformed or the session ID
/// isn't an integer, and an authentication error if the gateway didn't report success.
pub fn parse_auth_response(line: &str) -> Result<u64> {
    let mut success = None;
    let mut session_id = 0;
    let mut err_details = None;
    for kv_pair in line.split('|').filter(|kv| !kv.is_empty()) {
        let (key, value) = kv_pair
            .split_once('=')
            .ok_or_else(|| Error::protocol("malformed authentication response", line))?;
        match key {
            "success" => success = Some(value == "1"),
            "error" => err_details = Some(value),
            "session_id" => {
                session_id = value.parse().map_err(|_| {
                    Error::protocol("malformed session_id in authentication response", line)
                })?;
            }
            _ => {}
        }
    }
    match success {
        None => Err(Error::Authentication(format!(
            "did not receive success indicator from authentication attempt: '{line}'"
        ))),
        Some(false) => Err(Error::Authentication(
            err_details.unwrap_or("no details").to_owned(),
        )),
        Some(true) => Ok(session_id),
    }
}

/// Reads one `\n`-terminated line through `buffer`, returning it without the newline.
/// Bytes after the newline stay buffered.
pub(crate) fn read_line<T: Transport>(
    buffer: &mut RecordBuffer,
    transport: &mut T,
    what: &str,
) -> Result<String> {
    let mut searched = 0;
    loop {
        if let Some(pos) = buffer.unread()[searched..].iter().position(|b| *b == b'\n') {
            let line_len = searched + pos;
            let line = std::str::from_utf8(&buffer.unread()[..line_len])
                .map(ToOwned::to_owned)
                .map_err(|_| {
                    Error::protocol(
                        format!("{what} isn't valid UTF-8"),
                        String::from_utf8_lossy(&buffer.unread()[..line_len]),
                    )
                })?;
            buffer.advance(line_len + 1);
            return Ok(line);
        }
        searched = buffer.unread_len();
        if searched >= MAX_HANDSHAKE_LINE_LEN || searched >= buffer.capacity() {
            return Err(Error::protocol(
                format!("{what} exceeded {searched} bytes without a newline"),
                String::from_utf8_lossy(buffer.unread()),
            ));
        }
        let res = buffer.compact_and_fill(transport, None)?;
        if res.status == ReadStatus::Closed {
            return Err(Error::protocol(
                format!("gateway closed the connection while reading {what}"),
                String::from_utf8_lossy(buffer.unread()),
            ));
        }
    }
}

/// Joins `symbols` with commas for a subscription request.
///
/// # Errors
/// This function returns a configuration error if `symbols` is empty, or any symbol
/// is empty or contains a character that would corrupt the request line.
pub fn join_symbols<S: AsRef<str>>(symbols: &[S]) -> Result<String> {
    if symbols.is_empty() {
        return Err(Error::config("symbols", "can't be empty"));
    }
    let mut joined = String::new();
    for (i, symbol) in symbols.iter().enumerate() {
        let symbol = symbol.as_ref();
        if symbol.is_empty() {
            return Err(Error::config(
                "symbols",
                format!("symbol at index {i} is empty"),
            ));
        }
        if symbol.contains([',', '|', '\n', '\r']) {
            return Err(Error::config(
                "symbols",
                format!("symbol '{}' contains a reserved character", symbol.escape_debug()),
            ));
        }
        if i > 0 {
            joined.push(',');
        }
        joined.push_str(symbol);
    }
    Ok(joined)
}

/// When a subscription should begin replaying data from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubscriptionStart {
    /// Nanoseconds since the UNIX epoch. `0` requests no replay.
    Nanos(u64),
    /// A timestamp or date string passed through to the gateway as-is. An empty string
    /// requests no replay.
    Text(String),
}

impl SubscriptionStart {
    fn is_unset(&self) -> bool {
        match self {
            Self::Nanos(nanos) => *nanos == 0,
            Self::Text(text) => text.is_empty(),
        }
    }
}

impl Display for SubscriptionStart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nanos(nanos) => write!(f, "{nanos}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

impl From<u64> for SubscriptionStart {
    fn from(nanos: u64) -> Self {
        Self::Nanos(nanos)
    }
}

impl From<OffsetDateTime> for SubscriptionStart {
    fn from(dt: OffsetDateTime) -> Self {
        // Times before the epoch can't be replayed
        Self::Nanos(u64::try_from(dt.unix_timestamp_nanos().max(0)).unwrap_or(u64::MAX))
    }
}

impl From<String> for SubscriptionStart {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for SubscriptionStart {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

/// A request for `schema` data for `symbols`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    /// The symbols to subscribe to, interpreted according to `stype_in`.
    pub symbols: Vec<String>,
    /// The data schema.
    pub schema: Schema,
    /// The symbology of `symbols`.
    pub stype_in: SType,
    /// Where to begin replaying from, if anywhere.
    pub start: Option<SubscriptionStart>,
}

impl Subscription {
    /// Creates a subscription without replay.
    pub fn new<S: ToString>(
        symbols: impl IntoIterator<Item = S>,
        schema: Schema,
        stype_in: SType,
    ) -> Self {
        Self {
            symbols: symbols.into_iter().map(|s| s.to_string()).collect(),
            schema,
            stype_in,
            start: None,
        }
    }

    /// Sets the replay start.
    pub fn with_start(mut self, start: impl Into<SubscriptionStart>) -> Self {
        self.start = Some(start.into());
        self
    }

    /// Encodes the request line, including the trailing newline.
    ///
    /// # Errors
    /// This function returns a configuration error if the symbols are invalid or the
    /// line would be longer than `max_len` bytes.
    pub fn encode(&self, max_len: usize) -> Result<String> {
        let mut line = format!(
            "schema={}|stype_in={}|symbols={}",
            self.schema,
            self.stype_in,
            join_symbols(self.symbols.as_slice())?
        );
        if let Some(start) = self.start.as_ref().filter(|s| !s.is_unset()) {
            // Writing to a `String` can't fail
            let _ = write!(line, "|start={start}");
        }
        line.push('\n');
        if line.len() > max_len {
            return Err(Error::config(
                "symbols",
                format!(
                    "subscription request of {} bytes exceeds the maximum of {max_len}",
                    line.len()
                ),
            ));
        }
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use time::macros::datetime;

    use super::*;
    use crate::test_utils::MockTransport;

    const KEY: &str = "db-XXXXXXXXXXXXXXXXXXXXXXXXXXXXX";

    #[rstest]
    #[case::glbx("GLBX.MDP3", "glbx-mdp3.lsg.databento.com")]
    #[case::xnas("XNAS.ITCH", "xnas-itch.lsg.databento.com")]
    #[case::mixed("Opra.Pillar", "opra-pillar.lsg.databento.com")]
    fn test_determine_gateway(#[case] dataset: &str, #[case] exp: &str) {
        assert_eq!(determine_gateway(dataset), exp);
    }

    #[rstest]
    #[case::valid(KEY, true)]
    #[case::short("db-short", false)]
    #[case::long("db-XXXXXXXXXXXXXXXXXXXXXXXXXXXXXXX", false)]
    #[case::non_ascii("db-XXXXXXXXXXXXXXXXXXXXXXXXXXXÉ", false)]
    fn test_validate_key(#[case] key: &str, #[case] is_valid: bool) {
        assert_eq!(validate_key(key).is_ok(), is_valid);
    }

    #[test]
    fn test_cram_reply() {
        assert_eq!(KEY.len(), API_KEY_LENGTH);
        let exp_digest = hex::encode(Sha256::digest(b"abc123|db-XXXXXXXXXXXXXXXXXXXXXXXXXXXXX"));
        let reply = cram_reply("abc123", KEY);
        assert_eq!(reply, format!("{exp_digest}-XXXXX"));
        assert_eq!(
            reply,
            "08bf76c55e0ec2f97d87f000936a78e58d095637228a4347453e4e63c2cd00c7-XXXXX"
        );
        assert_eq!(reply, cram_reply("abc123", KEY));
        assert_ne!(reply, cram_reply("abc124", KEY));
        let other_key = "db-XXXXXXXXXXXXXXXXXXXXXXXXXYYYY";
        let other = cram_reply("abc123", other_key);
        assert_ne!(reply, other);
        assert!(other.ends_with("-XYYYY"));
    }

    #[test]
    fn test_cram_reply_known_digest() {
        // sha256("|") rendered in lowercase hex
        assert_eq!(
            cram_reply("", ""),
            "cbe5cfdf7c2118a9c3d78ef1d684f3afa089201352886449a06a6511cfef74a7-"
        );
    }

    #[rstest]
    #[case::no_ts_out(false, "auth=abc-XXXXX|dataset=GLBX.MDP3|encoding=dbn|ts_out=0\n")]
    #[case::ts_out(true, "auth=abc-XXXXX|dataset=GLBX.MDP3|encoding=dbn|ts_out=1\n")]
    fn test_encode_auth_req(#[case] send_ts_out: bool, #[case] exp: &str) {
        assert_eq!(encode_auth_req("abc-XXXXX", "GLBX.MDP3", send_ts_out), exp);
    }

    #[rstest]
    #[case::valid("cram=abc123", Ok("abc123"))]
    #[case::empty("cram=", Ok(""))]
    #[case::wrong_prefix("auth=abc123", Err("did not receive CRAM"))]
    #[case::no_equals("cram", Err("did not receive CRAM"))]
    #[case::longer_key("cramX=abc123", Err("did not receive CRAM"))]
    fn test_parse_challenge(#[case] line: &str, #[case] exp: std::result::Result<&str, &str>) {
        match (parse_challenge(line), exp) {
            (Ok(res), Ok(exp)) => assert_eq!(res, exp),
            (Err(Error::Protocol { desc, .. }), Err(exp)) => assert!(desc.contains(exp)),
            (res, exp) => panic!("expected {exp:?}, got {res:?}"),
        }
    }

    #[rstest]
    #[case::success("success=1|session_id=42", 42)]
    #[case::trailing_pipe("success=1|session_id=5|", 5)]
    #[case::no_session_id("success=1", 0)]
    #[case::extra_keys("lsg_version=1.2|success=1|session_id=7", 7)]
    fn test_parse_auth_response(#[case] line: &str, #[case] exp: u64) {
        assert_eq!(parse_auth_response(line).unwrap(), exp);
    }

    #[test]
    fn test_parse_auth_response_failure() {
        let res = parse_auth_response("success=0|error=bad key");
        assert!(matches!(&res, Err(Error::Authentication(msg)) if msg.contains("bad key")));
        assert!(res.unwrap_err().to_string().contains("failed to authenticate"));
    }

    #[rstest]
    #[case::missing_success("session_id=42")]
    #[case::empty("")]
    fn test_parse_auth_response_missing_success(#[case] line: &str) {
        assert!(matches!(
            parse_auth_response(line),
            Err(Error::Authentication(msg)) if msg.contains("success indicator")
        ));
    }

    #[rstest]
    #[case::no_equals("success")]
    #[case::bad_session_id("success=1|session_id=abc")]
    fn test_parse_auth_response_malformed(#[case] line: &str) {
        assert!(matches!(
            parse_auth_response(line),
            Err(Error::Protocol { .. })
        ));
    }

    #[rstest]
    #[case::whole(&[b"v1\ncram=abc123\n".as_slice()])]
    #[case::split_lines(&[b"v1\n".as_slice(), b"cram=abc123\n"])]
    #[case::before_newline(&[b"v1\ncram=abc123".as_slice(), b"\n"])]
    #[case::mid_version(&[b"v".as_slice(), b"1\ncr", b"am=abc", b"123\n"])]
    fn test_read_challenge_fragmented(#[case] fragments: &[&[u8]]) {
        let mut transport = MockTransport::new();
        for fragment in fragments {
            transport.push_read(fragment);
        }
        let mut buffer = RecordBuffer::default();
        assert_eq!(
            read_line(&mut buffer, &mut transport, "version").unwrap(),
            "v1"
        );
        let line = read_line(&mut buffer, &mut transport, "challenge").unwrap();
        assert_eq!(parse_challenge(&line).unwrap(), "abc123");
    }

    #[test]
    fn test_read_line_one_byte_at_a_time() {
        let mut transport = MockTransport::new();
        transport.push_fragments(b"success=1|session_id=42\n", 1);
        let mut buffer = RecordBuffer::default();
        let line = read_line(&mut buffer, &mut transport, "auth response").unwrap();
        assert_eq!(parse_auth_response(&line).unwrap(), 42);
    }

    #[test]
    fn test_read_line_split_at_pipe() {
        let mut transport = MockTransport::new();
        transport.push_read(b"success=1|");
        transport.push_read(b"session_id=9\n");
        let mut buffer = RecordBuffer::default();
        let line = read_line(&mut buffer, &mut transport, "auth response").unwrap();
        assert_eq!(parse_auth_response(&line).unwrap(), 9);
    }

    #[test]
    fn test_read_line_keeps_remainder() {
        let mut transport = MockTransport::new();
        transport.push_read(b"success=1|session_id=1\nDBN\x02");
        let mut buffer = RecordBuffer::default();
        read_line(&mut buffer, &mut transport, "auth response").unwrap();
        assert_eq!(buffer.unread(), b"DBN\x02");
    }

    #[test]
    fn test_read_line_closed() {
        let mut transport = MockTransport::new();
        transport.push_read(b"v1\ncram=ab");
        let mut buffer = RecordBuffer::default();
        read_line(&mut buffer, &mut transport, "version").unwrap();
        let res = read_line(&mut buffer, &mut transport, "challenge");
        assert!(matches!(res, Err(Error::Protocol { desc, msg }) if desc.contains("closed") && msg == "cram=ab"));
    }

    #[test]
    fn test_read_line_too_long() {
        let mut transport = MockTransport::new();
        transport.push_read(&vec![b'a'; MAX_HANDSHAKE_LINE_LEN]);
        let mut buffer = RecordBuffer::default();
        let res = read_line(&mut buffer, &mut transport, "challenge");
        assert!(matches!(res, Err(Error::Protocol { desc, .. }) if desc.contains("without a newline")));
    }

    #[rstest]
    #[case::single(&["ESM4"], "ESM4")]
    #[case::multiple(&["ESM4", "NQM4", "CL.c.0"], "ESM4,NQM4,CL.c.0")]
    fn test_join_symbols(#[case] symbols: &[&str], #[case] exp: &str) {
        assert_eq!(join_symbols(symbols).unwrap(), exp);
    }

    #[rstest]
    #[case::empty_list(&[])]
    #[case::empty_symbol(&["ESM4", ""])]
    #[case::comma(&["ES,M4"])]
    #[case::pipe(&["ESM4|start=0"])]
    #[case::newline(&["ESM4\nstart_session"])]
    fn test_join_symbols_invalid(#[case] symbols: &[&str]) {
        assert!(matches!(
            join_symbols(symbols),
            Err(Error::Configuration { param_name, .. }) if param_name == "symbols"
        ));
    }

    #[test]
    fn test_encode_subscription() {
        let sub = Subscription::new(["ESM4", "NQM4"], Schema::Mbp1, SType::RawSymbol);
        assert_eq!(
            sub.encode(DEFAULT_MAX_SUBSCRIPTION_LEN).unwrap(),
            "schema=mbp-1|stype_in=raw_symbol|symbols=ESM4,NQM4\n"
        );
    }

    #[rstest]
    #[case::nanos(SubscriptionStart::Nanos(1_704_067_200_000_000_000), "|start=1704067200000000000\n")]
    #[case::zero_nanos(SubscriptionStart::Nanos(0), "\n")]
    #[case::text(SubscriptionStart::from("2024-01-01"), "|start=2024-01-01\n")]
    #[case::empty_text(SubscriptionStart::from(""), "\n")]
    #[case::datetime(datetime!(2024-01-01 00:00 UTC).into(), "|start=1704067200000000000\n")]
    fn test_encode_subscription_start(#[case] start: SubscriptionStart, #[case] exp_suffix: &str) {
        let line = Subscription::new(["SPY"], Schema::Trades, SType::RawSymbol)
            .with_start(start)
            .encode(DEFAULT_MAX_SUBSCRIPTION_LEN)
            .unwrap();
        assert_eq!(
            line,
            format!("schema=trades|stype_in=raw_symbol|symbols=SPY{exp_suffix}")
        );
    }

    #[test]
    fn test_encode_subscription_too_long() {
        let symbols: Vec<String> = (0..100).map(|i| format!("SYM{i}")).collect();
        let sub = Subscription::new(symbols, Schema::Trades, SType::RawSymbol);
        assert!(sub.encode(DEFAULT_MAX_SUBSCRIPTION_LEN).is_ok());
        assert!(matches!(
            sub.encode(64),
            Err(Error::Configuration { desc, .. }) if desc.contains("exceeds the maximum of 64")
        ));
    }
}
