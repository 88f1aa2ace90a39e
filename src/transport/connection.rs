//! TCP connection to an Astron message director.
//!
//! The connection owns two tasks:
//! 1. A writer task that frames and batches outbound datagrams
//! 2. A read task that splits the inbound stream with [`FrameBuffer`]
//!
//! Inbound datagrams are queued for the caller, who dispatches them on its
//! own task with [`DatabaseClient::recv_and_dispatch`]. Continuations
//! therefore always run where requests are issued, and may issue new ones
//! through a shared handle to the client.
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use astron_db_client::{DatabaseClient, MdConnection};
//!
//! let conn = MdConnection::builder(4_000_000)
//!     .connection_name("db-tool")
//!     .connect("127.0.0.1:7199")
//!     .await?;
//! let client = Rc::new(DatabaseClient::new(conn, schema));
//! loop {
//!     client.recv_and_dispatch().await?;
//! }
//! ```

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::client::{DatabaseClient, Dispatch};
use crate::error::{DbError, Result};
use crate::protocol::{msgtypes, Datagram, FrameBuffer, MAX_DATAGRAM_SIZE};
use crate::writer::{
    spawn_writer_task, OutboundDatagram, WriterConfig, WriterHandle, DEFAULT_CHANNEL_CAPACITY,
    DEFAULT_MAX_PENDING_DATAGRAMS,
};

use super::{ContextCounter, Transport};

/// Connection settings.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Channel this client receives replies on.
    pub self_channel: u64,
    /// Capacity of the outbound and inbound queues.
    pub channel_capacity: usize,
    /// Queued outbound datagrams before sends fail with `QueueFull`.
    pub max_pending_datagrams: usize,
    /// Largest inbound datagram accepted.
    pub max_datagram_size: usize,
    /// Name announced with `CONTROL_SET_CON_NAME`.
    pub connection_name: Option<String>,
}

impl ConnectionConfig {
    pub fn new(self_channel: u64) -> Self {
        Self {
            self_channel,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_pending_datagrams: DEFAULT_MAX_PENDING_DATAGRAMS,
            max_datagram_size: MAX_DATAGRAM_SIZE,
            connection_name: None,
        }
    }

    fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            max_pending_datagrams: self.max_pending_datagrams,
            channel_capacity: self.channel_capacity,
        }
    }
}

/// Builder for [`MdConnection`].
#[derive(Debug, Clone)]
pub struct ConnectionBuilder {
    config: ConnectionConfig,
}

impl ConnectionBuilder {
    /// Set the outbound/inbound queue capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// Set the outbound queue limit.
    ///
    /// Default: 1024
    pub fn max_pending_datagrams(mut self, limit: usize) -> Self {
        self.config.max_pending_datagrams = limit;
        self
    }

    /// Set the largest inbound datagram accepted.
    ///
    /// Default: 65535
    pub fn max_datagram_size(mut self, size: usize) -> Self {
        self.config.max_datagram_size = size;
        self
    }

    pub fn connection_name(mut self, name: impl Into<String>) -> Self {
        self.config.connection_name = Some(name.into());
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connect over TCP.
    pub async fn connect<A: ToSocketAddrs>(self, addr: A) -> Result<MdConnection> {
        MdConnection::connect(addr, self.config).await
    }

    /// Run the connection over an already open stream.
    pub async fn from_stream<S>(self, stream: S) -> Result<MdConnection>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        MdConnection::from_stream(stream, self.config).await
    }
}

/// Connection to a message director.
pub struct MdConnection {
    config: ConnectionConfig,
    contexts: ContextCounter,
    writer: WriterHandle,
    inbound: Mutex<mpsc::Receiver<Bytes>>,
    read_task: JoinHandle<()>,
    _writer_task: JoinHandle<Result<()>>,
}

impl MdConnection {
    /// Start building a connection that receives on `self_channel`.
    pub fn builder(self_channel: u64) -> ConnectionBuilder {
        ConnectionBuilder {
            config: ConnectionConfig::new(self_channel),
        }
    }

    /// Connect over TCP.
    pub async fn connect<A: ToSocketAddrs>(addr: A, config: ConnectionConfig) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Self::from_stream(stream, config).await
    }

    /// Run the connection over an already open stream.
    ///
    /// Subscribes to the configured channel and announces the connection
    /// name before returning.
    pub async fn from_stream<S>(stream: S, config: ConnectionConfig) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (reader, write_half) = tokio::io::split(stream);

        let (writer, writer_task) = spawn_writer_task(write_half, config.writer_config());

        let (tx, inbound) = mpsc::channel(config.channel_capacity.max(1));
        let max_datagram_size = config.max_datagram_size;
        let read_task = tokio::spawn(async move {
            if let Err(e) = read_loop(reader, tx, max_datagram_size).await {
                tracing::error!("Read loop error: {}", e);
            }
        });

        let conn = Self {
            config,
            contexts: ContextCounter::new(),
            writer,
            inbound: Mutex::new(inbound),
            read_task,
            _writer_task: writer_task,
        };

        conn.subscribe(conn.config.self_channel).await?;
        if let Some(name) = &conn.config.connection_name {
            conn.set_connection_name(name).await?;
        }

        Ok(conn)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Subscribe to datagrams addressed to `channel`.
    pub async fn subscribe(&self, channel: u64) -> Result<()> {
        let mut dg = Datagram::control(msgtypes::CONTROL_ADD_CHANNEL);
        dg.add_u64(channel);
        tracing::debug!(channel, "subscribing");
        self.send_control(dg).await
    }

    /// Stop receiving datagrams addressed to `channel`.
    pub async fn unsubscribe(&self, channel: u64) -> Result<()> {
        let mut dg = Datagram::control(msgtypes::CONTROL_REMOVE_CHANNEL);
        dg.add_u64(channel);
        tracing::debug!(channel, "unsubscribing");
        self.send_control(dg).await
    }

    /// Name this connection in the message director's logs.
    pub async fn set_connection_name(&self, name: &str) -> Result<()> {
        let len = u16::try_from(name.len())
            .map_err(|_| DbError::Protocol(format!("connection name of {} bytes", name.len())))?;
        let mut dg = Datagram::control(msgtypes::CONTROL_SET_CON_NAME);
        dg.add_u16(len);
        dg.add_data(name.as_bytes());
        self.send_control(dg).await
    }

    async fn send_control(&self, dg: Datagram) -> Result<()> {
        self.writer.send(OutboundDatagram::from_datagram(dg)?).await
    }

    /// Wait for the next inbound datagram.
    ///
    /// Returns `ConnectionClosed` once the stream has ended and every
    /// queued datagram has been taken.
    pub async fn recv(&self) -> Result<Bytes> {
        let mut inbound = self.inbound.lock().await;
        inbound.recv().await.ok_or(DbError::ConnectionClosed)
    }

    /// Outbound datagrams not yet written.
    pub fn pending_datagrams(&self) -> usize {
        self.writer.pending_count()
    }

    /// Whether the writer task has stopped; later sends fail.
    pub fn is_closed(&self) -> bool {
        self.writer.is_closed()
    }
}

impl Drop for MdConnection {
    fn drop(&mut self) {
        self.read_task.abort();
    }
}

impl Transport for MdConnection {
    fn next_context(&self) -> u32 {
        self.contexts.next_id()
    }

    fn self_channel(&self) -> u64 {
        self.config.self_channel
    }

    fn send(&self, datagram: Datagram) -> Result<()> {
        tracing::trace!(bytes = datagram.len(), "queueing datagram");
        self.writer.try_send(OutboundDatagram::from_datagram(datagram)?)
    }
}

/// Read datagrams from the stream and queue them for the caller.
async fn read_loop<R>(mut reader: R, tx: mpsc::Sender<Bytes>, max_datagram_size: usize) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut frame_buffer = FrameBuffer::with_max_datagram(max_datagram_size);
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) => return Err(DbError::Io(e)),
        };

        for datagram in frame_buffer.push(&buf[..n])? {
            tracing::trace!(bytes = datagram.len(), "received datagram");
            if tx.send(datagram).await.is_err() {
                return Ok(());
            }
        }
    }
}

/// An inbound datagram and what the dispatcher did with it.
#[derive(Debug)]
pub struct Inbound {
    pub datagram: Bytes,
    pub dispatch: Dispatch,
}

impl DatabaseClient<MdConnection> {
    /// Receive one datagram and run it through the reply dispatcher.
    ///
    /// Datagrams the dispatcher does not handle come back as
    /// [`Dispatch::Unhandled`] for other listeners. No client state is
    /// borrowed while waiting, so requests may be issued concurrently.
    pub async fn recv_and_dispatch(&self) -> Result<Inbound> {
        let datagram = self.transport().recv().await?;
        let dispatch = self.handle_datagram(&datagram);
        Ok(Inbound { datagram, dispatch })
    }
}
