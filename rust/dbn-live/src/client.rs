use std::{
    fmt::{self, Display},
    io, mem,
    time::Duration,
};

use dbn::{
    compat::{self, CompatBuffer},
    decode::{decode_metadata_fields, decode_metadata_prelude},
    Metadata, RecordHeader, RecordRef, VersionUpgradePolicy, DBN_VERSION, METADATA_PRELUDE_LEN,
};
use tracing::{debug, info, warn};

use crate::{
    buffer::RecordBuffer,
    builder::Settings,
    protocol::{
        cram_reply, encode_auth_req, parse_auth_response, parse_challenge, read_line,
        Subscription, START_SESSION,
    },
    transport::{ReadStatus, ShutdownHandle, Transport},
    Error, Result,
};

/// The lifecycle of a [`Client`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    /// Authenticated, without subscriptions.
    Idle,
    /// At least one subscription has been sent.
    Subscribed,
    /// The session has started and records can be read.
    Streaming,
    /// The session was stopped or the gateway closed the connection.
    Stopped,
}

impl ClientState {
    /// Returns the state as a lowercase string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ClientState::Idle => "idle",
            ClientState::Subscribed => "subscribed",
            ClientState::Streaming => "streaming",
            ClientState::Stopped => "stopped",
        }
    }
}

impl Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A blocking client for a live session. Created authenticated through
/// [`LiveBuilder`](crate::LiveBuilder).
///
/// The client is used from one thread at a time. [`shutdown_handle()`](Self::shutdown_handle)
/// can stop it from another thread, unblocking an in-flight
/// [`next_record()`](Self::next_record).
pub struct Client<T> {
    dataset: String,
    gateway: String,
    port: u16,
    send_ts_out: bool,
    upgrade_policy: VersionUpgradePolicy,
    max_subscription_len: usize,
    session_id: u64,
    state: ClientState,
    transport: T,
    closer: ShutdownHandle,
    buffer: RecordBuffer,
    compat_buffer: CompatBuffer,
    /// DBN version of the session, known once started.
    version: u8,
    ts_out: bool,
}

impl<T> Client<T>
where
    T: Transport,
{
    /// Performs the CRAM handshake over `transport`.
    pub(crate) fn authenticate(mut transport: T, settings: Settings) -> Result<Self> {
        let mut buffer = RecordBuffer::with_capacity(settings.buffer_size);
        let version_line = read_line(&mut buffer, &mut transport, "version line")?;
        debug!(version_line, "Received gateway version");
        let challenge_line = read_line(&mut buffer, &mut transport, "CRAM challenge")?;
        debug!(challenge_line, "Received CRAM challenge");
        let challenge = parse_challenge(&challenge_line)?;

        let auth_req = encode_auth_req(
            &cram_reply(challenge, &settings.key),
            &settings.dataset,
            settings.send_ts_out,
        );
        transport
            .write_all(auth_req.as_bytes())
            .map_err(|e| Error::io(e, "sending authentication request"))?;

        let auth_resp = read_line(&mut buffer, &mut transport, "authentication response")?;
        debug!(auth_resp, "Received authentication response");
        let session_id = parse_auth_response(&auth_resp)?;
        info!(
            session_id,
            dataset = settings.dataset,
            "Successfully authenticated"
        );

        let closer = transport.closer();
        Ok(Self {
            dataset: settings.dataset,
            gateway: settings.gateway,
            port: settings.port,
            send_ts_out: settings.send_ts_out,
            upgrade_policy: settings.upgrade_policy,
            max_subscription_len: settings.max_subscription_len,
            session_id,
            state: ClientState::Idle,
            transport,
            closer,
            buffer,
            compat_buffer: CompatBuffer::default(),
            version: DBN_VERSION,
            ts_out: settings.send_ts_out,
        })
    }

    /// Sends `subscription` to the gateway. Doesn't wait for acknowledgement. Can be
    /// called multiple times before [`start()`](Self::start).
    ///
    /// # Errors
    /// This function returns an error if the session has already started or stopped,
    /// the subscription is invalid, or the request can't be sent.
    pub fn subscribe(&mut self, subscription: &Subscription) -> Result<()> {
        self.check_state("subscribe", &[ClientState::Idle, ClientState::Subscribed])?;
        let sub_req = subscription.encode(self.max_subscription_len)?;
        debug!(sub_req = sub_req.trim_end(), "Sending subscription request");
        self.transport
            .write_all(sub_req.as_bytes())
            .map_err(|e| Error::io(e, "sending subscription request"))?;
        self.state = ClientState::Subscribed;
        Ok(())
    }

    /// Starts the session and returns its [`Metadata`], upgraded according to the
    /// client's [`VersionUpgradePolicy`]. Blocks until the metadata is received.
    ///
    /// # Errors
    /// This function returns an error if there are no subscriptions, the session was
    /// already started or stopped, the connection closes, or the metadata is invalid.
    pub fn start(&mut self) -> Result<Metadata> {
        self.check_state("start", &[ClientState::Subscribed])?;
        self.transport
            .write_all(START_SESSION.as_bytes())
            .map_err(|e| Error::io(e, "sending start session request"))?;

        self.fill_exact(METADATA_PRELUDE_LEN)?;
        let mut prelude = [0; METADATA_PRELUDE_LEN];
        prelude.copy_from_slice(&self.buffer.unread()[..METADATA_PRELUDE_LEN]);
        let (version, length) = decode_metadata_prelude(&prelude)?;
        self.buffer.advance(METADATA_PRELUDE_LEN);
        let mut metadata = if length <= self.buffer.capacity() {
            self.fill_exact(length)?;
            let metadata = decode_metadata_fields(version, &self.buffer.unread()[..length])?;
            self.buffer.advance(length);
            metadata
        } else {
            // Too large for the record buffer: drain it then read the rest directly
            let mut metadata_buffer = self.buffer.unread().to_vec();
            self.buffer.clear();
            let buffered = metadata_buffer.len();
            metadata_buffer.resize(length, 0);
            match self.transport.read_exact(&mut metadata_buffer[buffered..]) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(self.closed()),
                Err(e) => return Err(Error::io(e, "reading metadata")),
            }
            decode_metadata_fields(version, &metadata_buffer)?
        };

        self.version = version;
        self.ts_out = metadata.ts_out;
        metadata.upgrade(self.upgrade_policy);
        self.state = ClientState::Streaming;
        info!(
            session_id = self.session_id,
            version,
            schema = ?metadata.schema,
            "Started session"
        );
        Ok(metadata)
    }

    /// Returns the next record, waiting at most `timeout` for each read from the
    /// gateway. A `None` or zero timeout waits indefinitely.
    ///
    /// Returns `Ok(None)` if the timeout elapses before a complete record arrives. Any
    /// partial record stays buffered for the next call. The returned record borrows the
    /// client's buffer until the next call.
    ///
    /// # Errors
    /// This function returns an error if the session isn't streaming, the gateway
    /// closes the connection, or a record is invalid. Once the session has been
    /// stopped, [`Error::SessionClosed`] is returned.
    pub fn next_record(&mut self, timeout: Option<Duration>) -> Result<Option<RecordRef<'_>>> {
        self.check_state("get next record", &[ClientState::Streaming])?;
        while self.buffer.unread_len() == 0 {
            if !self.fill(timeout)? {
                return Ok(None);
            }
        }
        let record_size = self.buffer.unread()[0] as usize * RecordHeader::LENGTH_MULTIPLIER;
        if record_size < mem::size_of::<RecordHeader>() {
            return Err(dbn::Error::invalid_length(
                "record",
                record_size,
                "shorter than the record header",
            )
            .into());
        }
        if record_size > self.buffer.capacity() {
            return Err(Error::config(
                "buffer_size",
                format!(
                    "record of {record_size} bytes exceeds buffer capacity of {} bytes",
                    self.buffer.capacity()
                ),
            ));
        }
        while self.buffer.unread_len() < record_size {
            if !self.fill(timeout)? {
                return Ok(None);
            }
        }
        let bytes = self.buffer.take(record_size);
        Ok(Some(compat::decode_record_ref(
            self.version,
            self.upgrade_policy,
            self.ts_out,
            &mut self.compat_buffer,
            bytes,
        )?))
    }

    /// Closes the connection and discards buffered records. Calling `stop` again has no
    /// effect.
    ///
    /// # Errors
    /// This function returns an error if the transport fails to shut down.
    pub fn stop(&mut self) -> Result<()> {
        if self.state == ClientState::Stopped {
            return Ok(());
        }
        self.state = ClientState::Stopped;
        self.buffer.clear();
        info!(session_id = self.session_id, "Stopping session");
        self.transport
            .close()
            .map_err(|e| Error::io(e, "closing connection"))
    }

    /// Returns a handle for stopping the session from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.closer.clone()
    }

    /// Returns the dataset of the session.
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Returns the gateway host name.
    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    /// Returns the gateway port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the ID assigned to the session by the gateway.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Returns `true` if each record is followed by the gateway send timestamp.
    pub fn send_ts_out(&self) -> bool {
        self.send_ts_out
    }

    /// Returns the policy for records from previous DBN versions.
    pub fn upgrade_policy(&self) -> VersionUpgradePolicy {
        self.upgrade_policy
    }

    /// Returns the current state of the session.
    pub fn state(&self) -> ClientState {
        if self.closer.is_shutdown() {
            ClientState::Stopped
        } else {
            self.state
        }
    }

    fn check_state(&mut self, op: &'static str, valid: &[ClientState]) -> Result<()> {
        if self.closer.is_shutdown() {
            self.state = ClientState::Stopped;
        }
        match self.state {
            ClientState::Stopped => Err(Error::SessionClosed),
            state if valid.contains(&state) => Ok(()),
            state => Err(Error::InvalidState { op, state }),
        }
    }

    /// Performs one read. Returns `false` on timeout.
    fn fill(&mut self, timeout: Option<Duration>) -> Result<bool> {
        let res = self.buffer.compact_and_fill(&mut self.transport, timeout)?;
        match res.status {
            ReadStatus::Ok => Ok(true),
            ReadStatus::Timeout => Ok(false),
            ReadStatus::Closed => Err(self.closed()),
        }
    }

    /// Blocks until at least `count` bytes are buffered.
    fn fill_exact(&mut self, count: usize) -> Result<()> {
        while self.buffer.unread_len() < count {
            self.fill(None)?;
        }
        Ok(())
    }

    fn closed(&mut self) -> Error {
        self.state = ClientState::Stopped;
        self.buffer.clear();
        if self.closer.is_shutdown() {
            Error::SessionClosed
        } else {
            warn!(session_id = self.session_id, "Gateway closed the session");
            Error::StreamClosed
        }
    }
}

impl<T> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("dataset", &self.dataset)
            .field("gateway", &self.gateway)
            .field("port", &self.port)
            .field("send_ts_out", &self.send_ts_out)
            .field("upgrade_policy", &self.upgrade_policy)
            .field("session_id", &self.session_id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use dbn::{
        compat::SystemMsgV1, record::str_to_c_chars, rtype, Record, SType, Schema, SystemMsg,
        TradeMsg, WithTsOut,
    };
    use rstest::rstest;

    use super::*;
    use crate::{
        test_utils::{encode_metadata, metadata, MockTransport, DATASET, KEY},
        LiveBuilder,
    };

    const TIMEOUT: Option<Duration> = Some(Duration::from_secs(1));

    fn builder() -> LiveBuilder {
        LiveBuilder::new().key(KEY).dataset(DATASET)
    }

    fn written_lines(written: &std::sync::Mutex<Vec<u8>>) -> Vec<String> {
        String::from_utf8(written.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(ToOwned::to_owned)
            .collect()
    }

    fn raw_record(length: u8, rtype: u8) -> Vec<u8> {
        let mut bytes = vec![0; length as usize * RecordHeader::LENGTH_MULTIPLIER];
        bytes[0] = length;
        bytes[1] = rtype;
        bytes
    }

    fn streaming_client(transport: MockTransport) -> Client<MockTransport> {
        let mut client = builder().build_with_transport(transport).unwrap();
        client
            .subscribe(&Subscription::new(["ESM4"], Schema::Trades, SType::RawSymbol))
            .unwrap();
        client.start().unwrap();
        client
    }

    #[rstest]
    #[case::no_ts_out(false)]
    #[case::ts_out(true)]
    fn test_authenticate(#[case] send_ts_out: bool) {
        let transport = MockTransport::with_handshake(42);
        let written = transport.written();
        let client = builder()
            .send_ts_out(send_ts_out)
            .build_with_transport(transport)
            .unwrap();
        assert_eq!(client.session_id(), 42);
        assert_eq!(client.state(), ClientState::Idle);
        assert_eq!(client.gateway(), "glbx-mdp3.lsg.databento.com");
        assert_eq!(client.port(), 13000);
        assert_eq!(
            written_lines(&written),
            [format!(
                "auth={}|dataset={DATASET}|encoding=dbn|ts_out={}",
                cram_reply("abc123", KEY),
                send_ts_out as u8
            )]
        );
    }

    #[test]
    fn test_authenticate_one_byte_at_a_time() {
        let mut transport = MockTransport::new();
        transport.push_fragments(b"lsg_version=0.1.0\ncram=abc123\n", 1);
        transport.push_fragments(b"success=1|session_id=7\n", 1);
        let client = builder().build_with_transport(transport).unwrap();
        assert_eq!(client.session_id(), 7);
    }

    #[test]
    fn test_authenticate_failure() {
        let mut transport = MockTransport::new();
        transport.push_read(b"lsg_version=0.1.0\ncram=abc123\n");
        transport.push_read(b"success=0|error=bad key\n");
        let res = builder().build_with_transport(transport);
        assert!(matches!(res, Err(Error::Authentication(msg)) if msg.contains("bad key")));
    }

    #[test]
    fn test_authenticate_closed() {
        let mut transport = MockTransport::new();
        transport.push_read(b"lsg_version=0.1.0\n");
        let res = builder().build_with_transport(transport);
        assert!(matches!(res, Err(Error::Protocol { .. })));
    }

    #[test]
    fn test_authenticate_no_cram() {
        let mut transport = MockTransport::new();
        transport.push_read(b"lsg_version=0.1.0\nhello=abc\n");
        let res = builder().build_with_transport(transport);
        assert!(
            matches!(res, Err(Error::Protocol { desc, msg }) if desc.contains("CRAM") && msg == "hello=abc")
        );
    }

    #[test]
    fn test_subscribe_and_start() {
        let mut transport = MockTransport::with_handshake(1);
        let exp_metadata = metadata(DBN_VERSION);
        transport.push_read(&encode_metadata(&exp_metadata));
        let written = transport.written();
        let mut client = builder().build_with_transport(transport).unwrap();
        client
            .subscribe(&Subscription::new(["ESM4"], Schema::Trades, SType::RawSymbol))
            .unwrap();
        client
            .subscribe(
                &Subscription::new(["NQM4"], Schema::Mbo, SType::RawSymbol).with_start(0u64),
            )
            .unwrap();
        assert_eq!(client.state(), ClientState::Subscribed);
        let metadata = client.start().unwrap();
        assert_eq!(metadata, exp_metadata);
        assert_eq!(client.state(), ClientState::Streaming);
        assert_eq!(
            written_lines(&written)[1..],
            [
                "schema=trades|stype_in=raw_symbol|symbols=ESM4",
                "schema=mbo|stype_in=raw_symbol|symbols=NQM4",
                "start_session",
            ]
        );
    }

    #[test]
    fn test_auth_response_remainder_is_kept() {
        let mut transport = MockTransport::new();
        transport.push_read(b"lsg_version=0.1.0\ncram=abc123\n");
        let metadata = encode_metadata(&metadata(DBN_VERSION));
        // Metadata arrives in the same read as the auth response
        let mut auth_resp = b"success=1|session_id=3\n".to_vec();
        auth_resp.extend_from_slice(&metadata[..5]);
        transport.push_read(&auth_resp);
        transport.push_read(&metadata[5..]);
        let rec = TradeMsg::default();
        transport.push_read(rec.as_ref());
        let mut client = streaming_client(transport);
        let res = client.next_record(TIMEOUT).unwrap().unwrap();
        assert_eq!(res.get::<TradeMsg>(), Some(&rec));
    }

    #[test]
    fn test_metadata_larger_than_buffer() {
        let mut transport = MockTransport::with_handshake(1);
        let mut exp_metadata = metadata(DBN_VERSION);
        exp_metadata.symbols = (0..50).map(|i| format!("SYM{i}")).collect();
        let encoded = encode_metadata(&exp_metadata);
        assert!(encoded.len() > 2048);
        transport.push_read(&encoded);
        let mut client = builder()
            .buffer_size(2048)
            .build_with_transport(transport)
            .unwrap();
        client
            .subscribe(&Subscription::new(["ESM4"], Schema::Trades, SType::RawSymbol))
            .unwrap();
        assert_eq!(client.start().unwrap(), exp_metadata);
    }

    #[test]
    fn test_metadata_larger_than_buffer_closed() {
        let mut transport = MockTransport::with_handshake(1);
        let mut exp_metadata = metadata(DBN_VERSION);
        exp_metadata.symbols = (0..50).map(|i| format!("SYM{i}")).collect();
        let encoded = encode_metadata(&exp_metadata);
        transport.push_read(&encoded[..encoded.len() - 10]);
        let mut client = builder()
            .buffer_size(2048)
            .build_with_transport(transport)
            .unwrap();
        client
            .subscribe(&Subscription::new(["ESM4"], Schema::Trades, SType::RawSymbol))
            .unwrap();
        assert!(matches!(client.start(), Err(Error::StreamClosed)));
        assert_eq!(client.state(), ClientState::Stopped);
    }

    #[test]
    fn test_metadata_length_implausible() {
        let mut transport = MockTransport::with_handshake(1);
        transport.push_read(b"DBN\x02\0\0\0\x10");
        let mut client = builder().build_with_transport(transport).unwrap();
        client
            .subscribe(&Subscription::new(["ESM4"], Schema::Trades, SType::RawSymbol))
            .unwrap();
        assert!(matches!(
            client.start(),
            Err(Error::Dbn(dbn::Error::InvalidLength {
                kind: "metadata",
                length: 0x1000_0000,
                ..
            }))
        ));
    }

    #[test]
    fn test_invalid_states() {
        let mut client = builder()
            .build_with_transport(MockTransport::with_handshake(1))
            .unwrap();
        assert!(matches!(
            client.start(),
            Err(Error::InvalidState {
                state: ClientState::Idle,
                ..
            })
        ));
        assert!(matches!(
            client.next_record(TIMEOUT),
            Err(Error::InvalidState {
                state: ClientState::Idle,
                ..
            })
        ));
    }

    #[test]
    fn test_subscribe_after_start() {
        let mut transport = MockTransport::with_handshake(1);
        transport.push_read(&encode_metadata(&metadata(DBN_VERSION)));
        let mut client = streaming_client(transport);
        let res = client.subscribe(&Subscription::new(["ESM4"], Schema::Mbo, SType::RawSymbol));
        assert!(matches!(
            res,
            Err(Error::InvalidState {
                state: ClientState::Streaming,
                ..
            })
        ));
    }

    #[test]
    fn test_subscription_too_long() {
        let mut client = builder()
            .max_subscription_len(32)
            .build_with_transport(MockTransport::with_handshake(1))
            .unwrap();
        let res = client.subscribe(&Subscription::new(["ESM4"], Schema::Trades, SType::RawSymbol));
        assert!(matches!(res, Err(Error::Configuration { .. })));
        assert_eq!(client.state(), ClientState::Idle);
    }

    #[test]
    fn test_next_record_fragmented() {
        let mut transport = MockTransport::with_handshake(1);
        transport.push_read(&encode_metadata(&metadata(DBN_VERSION)));
        let mut stream = raw_record(8, rtype::MBP_0);
        stream.extend(raw_record(16, rtype::SYSTEM));
        assert_eq!(stream.len(), 96);
        transport.push_read(&stream[..20]);
        transport.push_read(&stream[20..60]);
        transport.push_read(&stream[60..]);
        transport.push_timeout();
        let mut client = streaming_client(transport);

        let first = client.next_record(TIMEOUT).unwrap().unwrap();
        assert_eq!(first.header().rtype, rtype::MBP_0);
        assert_eq!(first.record_size(), 32);
        let second = client.next_record(TIMEOUT).unwrap().unwrap();
        assert_eq!(second.header().rtype, rtype::SYSTEM);
        assert_eq!(second.record_size(), 64);
        assert!(client.next_record(TIMEOUT).unwrap().is_none());
    }

    #[test]
    fn test_next_record_timeout_mid_record() {
        let mut transport = MockTransport::with_handshake(1);
        transport.push_read(&encode_metadata(&metadata(DBN_VERSION)));
        let rec = TradeMsg::default();
        transport.push_read(&rec.as_ref()[..10]);
        transport.push_timeout();
        transport.push_read(&rec.as_ref()[10..]);
        let mut client = streaming_client(transport);
        assert!(client.next_record(TIMEOUT).unwrap().is_none());
        let res = client.next_record(TIMEOUT).unwrap().unwrap();
        assert_eq!(res.get::<TradeMsg>(), Some(&rec));
    }

    #[test]
    fn test_next_record_timeout_then_closed() {
        let mut transport = MockTransport::with_handshake(1);
        transport.push_read(&encode_metadata(&metadata(DBN_VERSION)));
        transport.push_timeout();
        let mut client = streaming_client(transport);
        assert!(client.next_record(TIMEOUT).unwrap().is_none());
        assert!(matches!(
            client.next_record(TIMEOUT),
            Err(Error::StreamClosed)
        ));
        assert_eq!(client.state(), ClientState::Stopped);
        assert!(matches!(
            client.next_record(TIMEOUT),
            Err(Error::SessionClosed)
        ));
    }

    #[test]
    fn test_next_record_invalid_length() {
        let mut transport = MockTransport::with_handshake(1);
        transport.push_read(&encode_metadata(&metadata(DBN_VERSION)));
        transport.push_read(&[1, 0, 0, 0]);
        let mut client = streaming_client(transport);
        assert!(matches!(
            client.next_record(TIMEOUT),
            Err(Error::Dbn(dbn::Error::InvalidLength {
                kind: "record",
                length: 4,
                ..
            }))
        ));
    }

    #[test]
    fn test_next_record_with_ts_out() {
        let mut transport = MockTransport::with_handshake(1);
        let mut metadata = metadata(DBN_VERSION);
        metadata.ts_out = true;
        transport.push_read(&encode_metadata(&metadata));
        let rec = WithTsOut::new(TradeMsg::default(), 123);
        transport.push_read(rec.as_ref());
        let mut client = builder()
            .send_ts_out(true)
            .build_with_transport(transport)
            .unwrap();
        client
            .subscribe(&Subscription::new(["ESM4"], Schema::Trades, SType::RawSymbol))
            .unwrap();
        client.start().unwrap();
        let res = client.next_record(TIMEOUT).unwrap().unwrap();
        assert_eq!(res.get::<WithTsOut<TradeMsg>>(), Some(&rec));
    }

    #[rstest]
    #[case::upgrade(VersionUpgradePolicy::Upgrade)]
    #[case::as_is(VersionUpgradePolicy::AsIs)]
    fn test_v1_session(#[case] upgrade_policy: VersionUpgradePolicy) {
        let mut transport = MockTransport::with_handshake(1);
        transport.push_read(&encode_metadata(&metadata(1)));
        let rec = SystemMsgV1 {
            hd: RecordHeader::new::<SystemMsgV1>(rtype::SYSTEM, 0, 0, 1),
            msg: str_to_c_chars("Heartbeat").unwrap(),
        };
        transport.push_read(rec.as_ref());
        let mut client = builder()
            .upgrade_policy(upgrade_policy)
            .build_with_transport(transport)
            .unwrap();
        client
            .subscribe(&Subscription::new(["ESM4"], Schema::Trades, SType::RawSymbol))
            .unwrap();
        let metadata = client.start().unwrap();
        let res = client.next_record(TIMEOUT).unwrap().unwrap();
        if upgrade_policy == VersionUpgradePolicy::Upgrade {
            assert_eq!(metadata.version, DBN_VERSION);
            assert_eq!(res.get::<SystemMsg>().unwrap().msg().unwrap(), "Heartbeat");
        } else {
            assert_eq!(metadata.version, 1);
            assert!(res.get::<SystemMsg>().is_none());
            assert_eq!(res.get::<SystemMsgV1>().unwrap().msg().unwrap(), "Heartbeat");
        }
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut transport = MockTransport::with_handshake(1);
        transport.push_read(&encode_metadata(&metadata(DBN_VERSION)));
        transport.push_read(TradeMsg::default().as_ref());
        let mut client = streaming_client(transport);
        client.stop().unwrap();
        client.stop().unwrap();
        assert_eq!(client.state(), ClientState::Stopped);
        assert!(matches!(
            client.next_record(TIMEOUT),
            Err(Error::SessionClosed)
        ));
        assert!(matches!(
            client.subscribe(&Subscription::new(["ESM4"], Schema::Mbo, SType::RawSymbol)),
            Err(Error::SessionClosed)
        ));
    }

    #[test]
    fn test_shutdown_handle() {
        let mut transport = MockTransport::with_handshake(1);
        transport.push_read(&encode_metadata(&metadata(DBN_VERSION)));
        transport.push_timeout();
        let mut client = streaming_client(transport);
        let handle = client.shutdown_handle();
        assert!(client.next_record(TIMEOUT).unwrap().is_none());
        handle.shutdown().unwrap();
        assert_eq!(client.state(), ClientState::Stopped);
        assert!(matches!(
            client.next_record(TIMEOUT),
            Err(Error::SessionClosed)
        ));
    }
}
