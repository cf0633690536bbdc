use dbn::{VersionUpgradePolicy, MAX_FRAME_LEN};

use crate::{
    buffer::RecordBuffer,
    protocol::{determine_gateway, validate_key, DEFAULT_MAX_SUBSCRIPTION_LEN, DEFAULT_PORT},
    transport::{TcpTransport, Transport},
    Client, Error, Result,
};

/// The environment variable [`LiveBuilder::key_from_env()`] reads.
pub const API_KEY_ENV_VAR: &str = "DATABENTO_API_KEY";

/// Validated settings for a session.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub key: String,
    pub dataset: String,
    pub gateway: String,
    pub port: u16,
    pub send_ts_out: bool,
    pub upgrade_policy: VersionUpgradePolicy,
    pub buffer_size: usize,
    pub max_subscription_len: usize,
}

/// Configures and authenticates a live [`Client`].
///
/// # Example
/// ```no_run
/// use dbn::{Record, SType, Schema};
/// use dbn_live::{LiveBuilder, Subscription};
///
/// # fn main() -> dbn_live::Result<()> {
/// let mut client = LiveBuilder::new()
///     .key_from_env()?
///     .dataset("GLBX.MDP3")
///     .build()?;
/// client.subscribe(&Subscription::new(["ESM4"], Schema::Trades, SType::RawSymbol))?;
/// let metadata = client.start()?;
/// while let Some(rec) = client.next_record(None)? {
///     println!("{:?}", rec.header());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct LiveBuilder {
    key: Option<String>,
    dataset: Option<String>,
    gateway: Option<(String, u16)>,
    send_ts_out: bool,
    upgrade_policy: VersionUpgradePolicy,
    buffer_size: Option<usize>,
    max_subscription_len: Option<usize>,
}

impl LiveBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key.
    pub fn key(mut self, key: impl ToString) -> Self {
        self.key = Some(key.to_string());
        self
    }

    /// Sets the API key from the `DATABENTO_API_KEY` environment variable.
    ///
    /// # Errors
    /// This function returns an error if the environment variable isn't set or isn't
    /// valid unicode.
    pub fn key_from_env(self) -> Result<Self> {
        let key = std::env::var(API_KEY_ENV_VAR).map_err(|e| {
            Error::config("key", format!("couldn't read {API_KEY_ENV_VAR}: {e}"))
        })?;
        Ok(self.key(key))
    }

    /// Sets the dataset to stream. The gateway host is derived from it unless
    /// [`gateway()`](Self::gateway) is called.
    pub fn dataset(mut self, dataset: impl ToString) -> Self {
        self.dataset = Some(dataset.to_string());
        self
    }

    /// Overrides the gateway host and port.
    pub fn gateway(mut self, host: impl ToString, port: u16) -> Self {
        self.gateway = Some((host.to_string(), port));
        self
    }

    /// Sets whether each record should be followed by the gateway send timestamp.
    pub fn send_ts_out(mut self, send_ts_out: bool) -> Self {
        self.send_ts_out = send_ts_out;
        self
    }

    /// Sets the policy for records from previous DBN versions.
    pub fn upgrade_policy(mut self, upgrade_policy: VersionUpgradePolicy) -> Self {
        self.upgrade_policy = upgrade_policy;
        self
    }

    /// Sets the capacity of the receive buffer in bytes. Defaults to
    /// [`RecordBuffer::DEFAULT_CAPACITY`].
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Sets the longest subscription request line in bytes the client will send.
    pub fn max_subscription_len(mut self, max_subscription_len: usize) -> Self {
        self.max_subscription_len = Some(max_subscription_len);
        self
    }

    /// Connects to the gateway over TCP and authenticates.
    ///
    /// # Errors
    /// This function returns an error if a setting is invalid, the connection fails, or
    /// authentication fails.
    pub fn build(self) -> Result<Client<TcpTransport>> {
        let settings = self.settings()?;
        let transport = TcpTransport::connect(&settings.gateway, settings.port).map_err(|e| {
            Error::io(
                e,
                format!("connecting to {}:{}", settings.gateway, settings.port),
            )
        })?;
        Client::authenticate(transport, settings)
    }

    /// Authenticates over an already connected `transport`.
    ///
    /// # Errors
    /// This function returns an error if a setting is invalid or authentication fails.
    pub fn build_with_transport<T: Transport>(self, transport: T) -> Result<Client<T>> {
        Client::authenticate(transport, self.settings()?)
    }

    fn settings(self) -> Result<Settings> {
        let key = self
            .key
            .ok_or_else(|| Error::config("key", "an API key is required"))?;
        validate_key(&key)?;
        let dataset = self
            .dataset
            .filter(|d| !d.is_empty())
            .ok_or_else(|| Error::config("dataset", "a dataset is required"))?;
        let (gateway, port) = self
            .gateway
            .unwrap_or_else(|| (determine_gateway(&dataset), DEFAULT_PORT));
        let buffer_size = self.buffer_size.unwrap_or(RecordBuffer::DEFAULT_CAPACITY);
        if buffer_size < MAX_FRAME_LEN {
            return Err(Error::config(
                "buffer_size",
                format!("must be at least {MAX_FRAME_LEN} bytes to hold any record"),
            ));
        }
        let max_subscription_len = self
            .max_subscription_len
            .unwrap_or(DEFAULT_MAX_SUBSCRIPTION_LEN);
        if max_subscription_len == 0 {
            return Err(Error::config("max_subscription_len", "must be positive"));
        }
        Ok(Settings {
            key,
            dataset,
            gateway,
            port,
            send_ts_out: self.send_ts_out,
            upgrade_policy: self.upgrade_policy,
            buffer_size,
            max_subscription_len,
        })
    }
}

impl std::fmt::Debug for LiveBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keep the key out of logs
        f.debug_struct("LiveBuilder")
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("dataset", &self.dataset)
            .field("gateway", &self.gateway)
            .field("send_ts_out", &self.send_ts_out)
            .field("upgrade_policy", &self.upgrade_policy)
            .field("buffer_size", &self.buffer_size)
            .field("max_subscription_len", &self.max_subscription_len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::test_utils::{DATASET, KEY};

    #[test]
    fn test_settings_defaults() {
        let settings = LiveBuilder::new()
            .key(KEY)
            .dataset(DATASET)
            .settings()
            .unwrap();
        assert_eq!(settings.gateway, "glbx-mdp3.lsg.databento.com");
        assert_eq!(settings.port, DEFAULT_PORT);
        assert!(!settings.send_ts_out);
        assert_eq!(settings.upgrade_policy, VersionUpgradePolicy::AsIs);
        assert_eq!(settings.buffer_size, RecordBuffer::DEFAULT_CAPACITY);
        assert_eq!(settings.max_subscription_len, DEFAULT_MAX_SUBSCRIPTION_LEN);
    }

    #[test]
    fn test_gateway_override() {
        let settings = LiveBuilder::new()
            .key(KEY)
            .dataset(DATASET)
            .gateway("127.0.0.1", 8080)
            .settings()
            .unwrap();
        assert_eq!(settings.gateway, "127.0.0.1");
        assert_eq!(settings.port, 8080);
    }

    #[rstest]
    #[case::missing_key(LiveBuilder::new().dataset(DATASET), "key")]
    #[case::short_key(LiveBuilder::new().key("db-123").dataset(DATASET), "key")]
    #[case::missing_dataset(LiveBuilder::new().key(KEY), "dataset")]
    #[case::empty_dataset(LiveBuilder::new().key(KEY).dataset(""), "dataset")]
    #[case::small_buffer(
        LiveBuilder::new().key(KEY).dataset(DATASET).buffer_size(512),
        "buffer_size"
    )]
    #[case::zero_sub_len(
        LiveBuilder::new().key(KEY).dataset(DATASET).max_subscription_len(0),
        "max_subscription_len"
    )]
    fn test_invalid_settings(#[case] target: LiveBuilder, #[case] exp_param: &str) {
        match target.settings() {
            Err(Error::Configuration { param_name, .. }) => assert_eq!(param_name, exp_param),
            res => panic!("Expected configuration error, got {res:?}"),
        }
    }

    #[test]
    fn test_debug_redacts_key() {
        let target = LiveBuilder::new().key(KEY).dataset(DATASET);
        let debug = format!("{target:?}");
        assert!(!debug.contains(KEY));
        assert!(debug.contains("<redacted>"));
    }
}
