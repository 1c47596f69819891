//! Line-oriented pipe transports over byte streams (stdin/stdout by default).
//!
//! [`LinePipe`] answers one line per non-empty input line until end of input.
//! [`OneShot`] answers a single argument list and completes.

use std::sync::Arc;

use async_trait::async_trait;
use greeter_core::{split_record, Command};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::WaitForCancellationFutureOwned;
use tracing::{debug, info};

use super::{BoundEndpoint, Transport, TransportError};
use crate::lifecycle::LifecycleContext;

/// Answers newline-terminated records read from `input` on `output`.
///
/// Each record is split on whitespace; records without any token are
/// skipped without a response. Responses are written in input order, one
/// per line, and flushed as they are produced.
pub struct LinePipe<R, W> {
    command: Arc<dyn Command>,
    input: R,
    output: W,
}

impl<R, W> LinePipe<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Creates a pipe over arbitrary byte streams.
    pub fn new(command: Arc<dyn Command>, input: R, output: W) -> Self {
        Self {
            command,
            input,
            output,
        }
    }
}

impl LinePipe<tokio::io::Stdin, tokio::io::Stdout> {
    /// Creates a pipe over the process's standard input and output.
    #[must_use]
    pub fn stdio(command: Arc<dyn Command>) -> Self {
        Self::new(command, tokio::io::stdin(), tokio::io::stdout())
    }
}

#[async_trait]
impl<R, W> Transport for LinePipe<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn name(&self) -> &'static str {
        "pipe"
    }

    async fn bind(&mut self) -> Result<BoundEndpoint, TransportError> {
        Ok(BoundEndpoint::Stdio)
    }

    async fn serve(self, ctx: Arc<LifecycleContext>) -> Result<(), TransportError> {
        let (records_tx, records_rx) = mpsc::channel(1);
        let (results_tx, results_rx) = mpsc::channel(1);

        info!("reading records from input");
        tokio::try_join!(
            read_records(self.input, records_tx, ctx.shutdown_requested()),
            dispatch(&*self.command, records_rx, results_tx, &ctx),
            write_results(self.output, results_rx),
        )?;
        info!("input exhausted, pipe closed");
        Ok(())
    }
}

/// Input proxy: turns the byte stream into argument lists.
///
/// Stops at end of input, when shutdown is requested, or when the
/// dispatcher has gone away. Dropping `records` signals completion
/// downstream.
async fn read_records<R>(
    input: R,
    records: mpsc::Sender<Vec<String>>,
    shutdown: WaitForCancellationFutureOwned,
) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(input);
    let mut line = Vec::new();
    tokio::pin!(shutdown);

    loop {
        line.clear();
        let read = tokio::select! {
            () = &mut shutdown => {
                debug!("shutdown requested, no longer reading input");
                return Ok(());
            }
            read = reader.read_until(b'\n', &mut line) => read?,
        };
        if read == 0 {
            return Ok(());
        }
        if line.last() != Some(&b'\n') {
            debug!(bytes = line.len(), "discarding unterminated trailing record");
            return Ok(());
        }

        let args = split_record(&String::from_utf8_lossy(&line));
        if args.is_empty() {
            continue;
        }
        if records.send(args).await.is_err() {
            return Ok(());
        }
    }
}

async fn dispatch(
    command: &dyn Command,
    mut records: mpsc::Receiver<Vec<String>>,
    results: mpsc::Sender<String>,
    ctx: &LifecycleContext,
) -> Result<(), TransportError> {
    while let Some(args) = records.recv().await {
        let _in_flight = ctx.in_flight_guard();
        debug!(?args, "handling record");
        if results.send(command.invoke(&args)).await.is_err() {
            break;
        }
    }
    Ok(())
}

/// Output proxy: writes one line per result, then closes the stream.
async fn write_results<W>(
    mut output: W,
    mut results: mpsc::Receiver<String>,
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(result) = results.recv().await {
        output.write_all(result.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    output.shutdown().await?;
    Ok(())
}

/// Answers a single argument list, then completes.
///
/// Unlike [`LinePipe`], an empty argument list is still answered.
pub struct OneShot<W> {
    command: Arc<dyn Command>,
    args: Vec<String>,
    output: W,
}

impl<W> OneShot<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Creates a one-shot transport writing to `output`.
    pub fn new(command: Arc<dyn Command>, args: Vec<String>, output: W) -> Self {
        Self {
            command,
            args,
            output,
        }
    }
}

impl OneShot<tokio::io::Stdout> {
    /// Creates a one-shot transport writing to standard output.
    #[must_use]
    pub fn stdout(command: Arc<dyn Command>, args: Vec<String>) -> Self {
        Self::new(command, args, tokio::io::stdout())
    }
}

#[async_trait]
impl<W> Transport for OneShot<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn name(&self) -> &'static str {
        "once"
    }

    async fn bind(&mut self) -> Result<BoundEndpoint, TransportError> {
        Ok(BoundEndpoint::Stdio)
    }

    async fn serve(mut self, ctx: Arc<LifecycleContext>) -> Result<(), TransportError> {
        let _in_flight = ctx.in_flight_guard();
        let result = self.command.invoke(&self.args);
        self.output.write_all(result.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.shutdown().await?;
        Ok(())
    }
}
