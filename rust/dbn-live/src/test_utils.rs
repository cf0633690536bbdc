use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use dbn::{encode::MetadataEncoder, Metadata, MetadataBuilder, SType, Schema};

use crate::transport::{ReadResult, ShutdownHandle, Transport};

pub const KEY: &str = "db-XXXXXXXXXXXXXXXXXXXXXXXXXXXXX";
pub const DATASET: &str = "GLBX.MDP3";

#[derive(Debug)]
enum Event {
    Read(Vec<u8>),
    Timeout,
}

/// An in-memory [`Transport`] that replays scripted reads and records writes. Once the
/// script is exhausted, or after being closed, reads report the stream as closed
/// unless [`keep_open()`](Self::keep_open) was called.
#[derive(Debug)]
pub struct MockTransport {
    events: VecDeque<Event>,
    written: Arc<Mutex<Vec<u8>>>,
    closer: ShutdownHandle,
    keep_open: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
            written: Arc::default(),
            closer: ShutdownHandle::new(|| Ok(())),
            keep_open: false,
        }
    }

    /// A transport scripted with a successful handshake.
    pub fn with_handshake(session_id: u64) -> Self {
        let mut res = Self::new();
        res.push_read(b"lsg_version=0.1.0\n");
        res.push_read(b"cram=abc123\n");
        res.push_read(format!("success=1|session_id={session_id}\n").as_bytes());
        res
    }

    pub fn push_read(&mut self, bytes: &[u8]) {
        self.events.push_back(Event::Read(bytes.to_vec()));
    }

    /// Splits `bytes` into reads of at most `size` bytes.
    pub fn push_fragments(&mut self, bytes: &[u8], size: usize) {
        for chunk in bytes.chunks(size) {
            self.push_read(chunk);
        }
    }

    pub fn push_timeout(&mut self) {
        self.events.push_back(Event::Timeout);
    }

    /// Report timeouts instead of closing once the script is exhausted.
    pub fn keep_open(&mut self) {
        self.keep_open = true;
    }

    /// Returns a handle to everything written to the transport.
    pub fn written(&self) -> Arc<Mutex<Vec<u8>>> {
        self.written.clone()
    }
}

impl Transport for MockTransport {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.closer.is_shutdown() {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(())
    }

    fn read_some(&mut self, buf: &mut [u8], timeout: Option<Duration>) -> io::Result<ReadResult> {
        if self.closer.is_shutdown() {
            return Ok(ReadResult::CLOSED);
        }
        match self.events.pop_front() {
            None if self.keep_open => {
                thread::sleep(timeout.unwrap_or(Duration::from_millis(1)));
                Ok(ReadResult::TIMEOUT)
            }
            None => Ok(ReadResult::CLOSED),
            Some(Event::Timeout) => Ok(ReadResult::TIMEOUT),
            Some(Event::Read(mut bytes)) => {
                let read_size = bytes.len().min(buf.len());
                buf[..read_size].copy_from_slice(&bytes[..read_size]);
                if read_size < bytes.len() {
                    bytes.drain(..read_size);
                    self.events.push_front(Event::Read(bytes));
                }
                Ok(ReadResult::ok(read_size))
            }
        }
    }

    fn read_exact(&mut self, mut buf: &mut [u8]) -> io::Result<()> {
        while !buf.is_empty() {
            let res = self.read_some(buf, None)?;
            if res == ReadResult::CLOSED {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
            }
            let tmp = buf;
            buf = &mut tmp[res.read_size..];
        }
        Ok(())
    }

    fn closer(&self) -> ShutdownHandle {
        self.closer.clone()
    }
}

pub fn metadata(version: u8) -> Metadata {
    MetadataBuilder::new()
        .version(version)
        .dataset(DATASET)
        .schema(Some(Schema::Trades))
        .start(1_704_067_200_000_000_000)
        .stype_in(Some(SType::RawSymbol))
        .stype_out(SType::InstrumentId)
        .symbols(vec!["ESM4".to_owned()])
        .build()
        .unwrap()
}

pub fn encode_metadata(metadata: &Metadata) -> Vec<u8> {
    let mut buffer = Vec::new();
    MetadataEncoder::new(&mut buffer).encode(metadata).unwrap();
    buffer
}
