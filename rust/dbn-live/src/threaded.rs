//! Running a session's read loop on a background thread.

use std::{
    panic,
    thread::{self, JoinHandle},
    time::Duration,
};

use dbn::{Metadata, RecordRef};
use tracing::{debug, info};

use crate::{
    transport::{ShutdownHandle, Transport},
    Client, ClientState, Error, Result,
};

/// Returned by a record callback to control the read loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeepGoing {
    /// Continue reading records.
    #[default]
    Continue,
    /// Stop the session and end the loop.
    Stop,
}

/// A live session whose records are delivered to callbacks on a dedicated thread.
///
/// Dropping a `ThreadedClient` stops the session and waits for the thread to finish.
#[derive(Debug)]
pub struct ThreadedClient {
    session_id: u64,
    closer: ShutdownHandle,
    handle: Option<JoinHandle<Result<()>>>,
}

impl ThreadedClient {
    /// Starts the subscribed `client` on a new thread. The thread calls
    /// `metadata_callback` once with the session metadata, then `record_callback` with
    /// each record until the callback returns [`KeepGoing::Stop`], the session is
    /// stopped, or an error occurs.
    ///
    /// `timeout` bounds each wait for data. A `None` timeout blocks until data arrives
    /// or [`stop()`](Self::stop) closes the transport.
    ///
    /// # Errors
    /// This function returns an error if `client` has no subscriptions or the thread
    /// can't be spawned.
    pub fn spawn<T, M, R>(
        mut client: Client<T>,
        timeout: Option<Duration>,
        metadata_callback: M,
        mut record_callback: R,
    ) -> Result<Self>
    where
        T: Transport + Send + 'static,
        M: FnOnce(&Metadata) + Send + 'static,
        R: FnMut(RecordRef) -> KeepGoing + Send + 'static,
    {
        let state = client.state();
        if state != ClientState::Subscribed {
            return Err(Error::InvalidState {
                op: "spawn a threaded client",
                state,
            });
        }
        let session_id = client.session_id();
        let closer = client.shutdown_handle();
        let handle = thread::Builder::new()
            .name(format!("dbn-live-{session_id}"))
            .spawn(move || {
                let metadata = match client.start() {
                    Ok(metadata) => metadata,
                    Err(Error::SessionClosed) => return Ok(()),
                    Err(e) => {
                        let _ = client.stop();
                        return Err(e);
                    }
                };
                metadata_callback(&metadata);
                loop {
                    match client.next_record(timeout) {
                        Ok(Some(rec)) => {
                            if record_callback(rec) == KeepGoing::Stop {
                                debug!(session_id, "Record callback requested stop");
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(Error::SessionClosed) => break,
                        Err(e) => {
                            let _ = client.stop();
                            return Err(e);
                        }
                    }
                }
                client.stop()
            })
            .map_err(|e| Error::io(e, "spawning session thread"))?;
        info!(session_id, "Spawned session thread");
        Ok(Self {
            session_id,
            closer,
            handle: Some(handle),
        })
    }

    /// Returns the ID assigned to the session by the gateway.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Stops the session, unblocking the thread. Calling `stop` again has no effect.
    ///
    /// # Errors
    /// This function returns an error if the transport fails to shut down.
    pub fn stop(&self) -> Result<()> {
        self.closer
            .shutdown()
            .map_err(|e| Error::io(e, "closing connection"))
    }

    /// Waits for the thread to finish and returns the result of its loop. A session
    /// ended by [`stop()`](Self::stop) or [`KeepGoing::Stop`] is not an error.
    ///
    /// # Errors
    /// This function returns the error that ended the loop, such as
    /// [`Error::StreamClosed`] when the gateway closes the connection.
    pub fn join(mut self) -> Result<()> {
        self.join_thread()
    }

    fn join_thread(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|e| panic::resume_unwind(e)),
            None => Ok(()),
        }
    }
}

impl Drop for ThreadedClient {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.stop();
            let _ = self.join_thread();
        }
    }
}
