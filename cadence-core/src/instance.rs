//! Single-instance coordination over a loopback TCP port.
//!
//! The first Cadence process binds a well-known port on `127.0.0.1`. Later
//! launches that carry file arguments connect to that port, hand their
//! canonicalized paths to the running instance with an `open` message and
//! exit. Failing to reach a running instance is the normal "no primary" case;
//! failing to bind the port only means single-instance enforcement is off for
//! this process.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::documents::DocumentOpener;
use crate::ipc::{ChannelError, IpcChannel, IpcMessage, OPEN_SELECTOR};
use crate::util;

pub const DEFAULT_IPC_PORT: u16 = 57130;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(200);
/// Limit for writing the forwarded arguments once connected.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(2);

const PORT_ENV_VAR: &str = "CADENCE_IPC_PORT";
const CHANNEL_NAME: &str = "SingleInstanceGuard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceRole {
    Primary,
    Client,
}

/// Outcome of the startup negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coordination {
    Undecided,
    /// This process holds the port and accepts forwarded requests.
    Listening,
    /// Arguments were handed to an already running instance.
    Forwarded,
    /// No running instance was reachable and the port could not be bound.
    Standalone,
}

#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub port: u16,
    pub connect_timeout: Duration,
    pub send_timeout: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_IPC_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

impl GuardConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Replace the port with `CADENCE_IPC_PORT` when it is set to a valid port.
    pub fn with_env_override(mut self) -> Self {
        if let Ok(value) = std::env::var(PORT_ENV_VAR) {
            match parse_port(&value) {
                Some(port) => self.port = port,
                None => log::warn!(
                    "Ignoring invalid {}='{}', using port {}",
                    PORT_ENV_VAR,
                    value,
                    self.port
                ),
            }
        }
        self
    }

    pub fn address(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))
    }
}

fn parse_port(value: &str) -> Option<u16> {
    value.trim().parse::<u16>().ok().filter(|port| *port != 0)
}

/// Canonicalize command-line paths in submission order.
pub fn canonicalize_arguments(args: &[PathBuf]) -> Vec<String> {
    args.iter()
        .map(|path| util::canonical_path_string(path))
        .collect()
}

enum ForwardError {
    NoPrimary(String),
    Channel(ChannelError),
}

impl From<ChannelError> for ForwardError {
    fn from(e: ChannelError) -> Self {
        ForwardError::Channel(e)
    }
}

pub struct SingleInstanceGuard {
    config: GuardConfig,
    coordination: Coordination,
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
}

impl SingleInstanceGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            coordination: Coordination::Undecided,
            listener: None,
            local_addr: None,
        }
    }

    /// Forward `args` to a running instance, or take over the primary role.
    ///
    /// Returns `true` when the arguments were delivered and this process
    /// should exit. Returns `false` when this process must continue as the
    /// primary instance, whether or not it managed to bind the port. A launch
    /// without arguments never connects and goes straight to binding.
    pub async fn try_become_primary_or_forward(&mut self, args: &[PathBuf]) -> bool {
        if self.coordination != Coordination::Undecided {
            log::warn!(
                "Instance role already decided ({:?}), ignoring repeated negotiation",
                self.coordination
            );
            return self.coordination == Coordination::Forwarded;
        }

        if !args.is_empty() {
            match self.forward(args).await {
                Ok(()) => {
                    self.coordination = Coordination::Forwarded;
                    return true;
                }
                Err(ForwardError::NoPrimary(reason)) => {
                    log::debug!(
                        "No running instance at {}: {}",
                        self.config.address(),
                        reason
                    );
                }
                Err(ForwardError::Channel(e)) => {
                    log::warn!(
                        "Reached running instance at {} but could not forward arguments: {}",
                        self.config.address(),
                        e
                    );
                }
            }
        }

        self.listen().await;
        false
    }

    async fn forward(&self, args: &[PathBuf]) -> Result<(), ForwardError> {
        let addr = self.config.address();
        let timeout = self.config.connect_timeout;
        let stream = match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(ForwardError::NoPrimary(e.to_string())),
            Err(_) => {
                return Err(ForwardError::NoPrimary(format!(
                    "connect timed out after {:?}",
                    timeout
                )))
            }
        };

        let paths = canonicalize_arguments(args);
        let count = paths.len();
        let mut channel = IpcChannel::new(stream, CHANNEL_NAME);
        within(self.config.send_timeout, async move {
            channel.write(OPEN_SELECTOR, &paths).await?;
            channel.close().await
        })
        .await?;

        log::info!(
            "Forwarded {} path(s) to running instance at {}",
            count,
            addr
        );
        Ok(())
    }

    async fn listen(&mut self) {
        let addr = self.config.address();
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                self.local_addr = listener.local_addr().ok();
                self.listener = Some(listener);
                self.coordination = Coordination::Listening;
                log::info!("Listening for other instances on {}", addr);
            }
            Err(e) => {
                self.coordination = Coordination::Standalone;
                log::info!(
                    "Could not bind {} ({}), continuing without single-instance enforcement",
                    addr,
                    e
                );
            }
        }
    }

    /// Start accepting forwarded requests, opening each received path with
    /// `opener`.
    ///
    /// Returns `None` unless this process holds the port and has not started
    /// serving yet. Must be called from within a tokio runtime.
    pub fn serve(&mut self, opener: Arc<dyn DocumentOpener>) -> Option<JoinHandle<()>> {
        let listener = self.listener.take()?;
        Some(tokio::spawn(accept_loop(listener, opener)))
    }

    pub fn coordination(&self) -> Coordination {
        self.coordination
    }

    /// `Client` only after a successful forward; every other outcome,
    /// including standalone fallback, acts as primary.
    pub fn role(&self) -> InstanceRole {
        match self.coordination {
            Coordination::Forwarded => InstanceRole::Client,
            _ => InstanceRole::Primary,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.coordination == Coordination::Listening
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

/// Fail with `ChannelError::Timeout` if `fut` has not finished after `limit`.
async fn within<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = Result<T, ChannelError>>,
) -> Result<T, ChannelError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ChannelError::Timeout(limit))?
}

async fn accept_loop(listener: TcpListener, opener: Arc<dyn DocumentOpener>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                log::debug!("Accepted IPC connection from {}", peer);
                let channel = IpcChannel::new(stream, CHANNEL_NAME);
                tokio::spawn(handle_connection(channel, opener.clone()));
            }
            Err(e) => {
                log::warn!("Failed to accept IPC connection: {}", e);
            }
        }
    }
}

async fn handle_connection(mut channel: IpcChannel, opener: Arc<dyn DocumentOpener>) {
    loop {
        match channel.read().await {
            Ok(Some(message)) => dispatch(&message, opener.as_ref()),
            Ok(None) => break,
            Err(e) => {
                log::warn!("Dropping IPC connection [{}]: {}", channel.name(), e);
                break;
            }
        }
    }
}

/// Route one decoded message to the document collaborator.
pub fn dispatch(message: &IpcMessage, opener: &dyn DocumentOpener) {
    match message.selector.as_str() {
        OPEN_SELECTOR => {
            for path in &message.data {
                opener.open(path);
            }
        }
        other => {
            log::debug!("Ignoring IPC message with unknown selector '{}'", other);
        }
    }
}
