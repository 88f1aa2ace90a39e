//! Dedicated writer task for outbound datagrams.
//!
//! Datagrams reach the message director through a single writer task fed by
//! an mpsc channel. The task frames each datagram with its `uint16` length
//! and batches whatever is queued into one vectored write.
//!
//! # Architecture
//!
//! ```text
//! DatabaseClient ─┐
//! subscribe()    ─┼─► mpsc::Sender<OutboundDatagram> ─► Writer Task ─► TcpStream
//! unsubscribe()  ─┘
//! ```
//!
//! The pending count bounds how many datagrams may sit in the queue;
//! [`WriterHandle::try_send`] fails fast with `QueueFull` beyond it.

use std::io::IoSlice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{DbError, Result};
use crate::protocol::{length_prefix, Datagram, LENGTH_PREFIX_SIZE};

/// Default maximum queued datagrams.
pub const DEFAULT_MAX_PENDING_DATAGRAMS: usize = 1024;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum datagrams to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// A datagram ready to be written, with its length prefix encoded.
#[derive(Debug)]
pub struct OutboundDatagram {
    /// `uint16` little-endian body length.
    pub prefix: [u8; LENGTH_PREFIX_SIZE],
    /// Datagram body.
    pub body: Bytes,
}

impl OutboundDatagram {
    /// Frame a datagram body.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Protocol` if the body is longer than a `uint16`
    /// length can describe.
    pub fn new(body: Bytes) -> Result<Self> {
        Ok(Self {
            prefix: length_prefix(body.len())?,
            body,
        })
    }

    /// Frame a built [`Datagram`].
    pub fn from_datagram(dg: Datagram) -> Result<Self> {
        Self::new(dg.freeze())
    }

    /// Total size on the wire (prefix + body).
    #[inline]
    pub fn size(&self) -> usize {
        LENGTH_PREFIX_SIZE + self.body.len()
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Maximum queued datagrams before `try_send` reports `QueueFull`.
    pub max_pending_datagrams: usize,
    /// Channel capacity for the datagram queue.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_pending_datagrams: DEFAULT_MAX_PENDING_DATAGRAMS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for sending datagrams to the writer task.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundDatagram>,
    /// Datagrams queued but not yet written.
    pending: Arc<AtomicUsize>,
    max_pending: usize,
}

impl WriterHandle {
    fn new(tx: mpsc::Sender<OutboundDatagram>, pending: Arc<AtomicUsize>, max_pending: usize) -> Self {
        Self {
            tx,
            pending,
            max_pending,
        }
    }

    /// Queue a datagram, waiting for channel capacity.
    pub async fn send(&self, datagram: OutboundDatagram) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);

        self.tx.send(datagram).await.map_err(|_| {
            self.pending.fetch_sub(1, Ordering::Release);
            DbError::ConnectionClosed
        })
    }

    /// Queue a datagram without waiting.
    ///
    /// Returns `Err(QueueFull)` immediately if at capacity and
    /// `Err(ConnectionClosed)` once the writer task has stopped.
    pub fn try_send(&self, datagram: OutboundDatagram) -> Result<()> {
        let current = self.pending.load(Ordering::Acquire);
        if current >= self.max_pending {
            return Err(DbError::QueueFull);
        }

        self.pending.fetch_add(1, Ordering::AcqRel);

        self.tx.try_send(datagram).map_err(|e| {
            self.pending.fetch_sub(1, Ordering::Release);
            match e {
                mpsc::error::TrySendError::Full(_) => DbError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => DbError::ConnectionClosed,
            }
        })
    }

    /// Get the number of queued datagrams.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Check whether the writer task has stopped.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task and return a handle for sending datagrams.
///
/// The `JoinHandle` resolves when every handle has been dropped and the
/// queue drained, or on the first write error.
pub fn spawn_writer_task<W>(
    writer: W,
    config: WriterConfig,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let pending = Arc::new(AtomicUsize::new(0));

    let handle = WriterHandle::new(tx, pending.clone(), config.max_pending_datagrams);
    let task = tokio::spawn(writer_loop(rx, writer, pending));

    (handle, task)
}

async fn writer_loop<W>(
    mut rx: mpsc::Receiver<OutboundDatagram>,
    mut writer: W,
    pending: Arc<AtomicUsize>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(d) => d,
            None => return Ok(()),
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);

        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(datagram) => batch.push(datagram),
                Err(_) => break,
            }
        }

        let batch_size = batch.len();
        tracing::trace!(datagrams = batch_size, "writing batch");
        if let Err(e) = write_batch(&mut writer, &batch).await {
            tracing::error!(error = %e, "Write error");
            return Err(e);
        }

        pending.fetch_sub(batch_size, Ordering::Release);
    }
}

/// Write a batch of datagrams with `write_vectored`, resuming after partial writes.
async fn write_batch<W>(writer: &mut W, batch: &[OutboundDatagram]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(OutboundDatagram::size).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        if slices.is_empty() {
            break;
        }

        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(DbError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for the data after the first `skip_bytes`.
fn build_remaining_slices(batch: &[OutboundDatagram], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len() * 2);
    let mut offset = 0;

    for datagram in batch {
        let parts: [&[u8]; 2] = [&datagram.prefix, &datagram.body[..]];
        for part in parts {
            let end = offset + part.len();
            if !part.is_empty() && skip_bytes < end {
                slices.push(IoSlice::new(&part[skip_bytes.saturating_sub(offset)..]));
            }
            offset = end;
        }
    }

    slices
}
