//! Stdio transport: reads JSON-RPC from stdin, writes to stdout.
//!
//! Every request runs on its own task so slow actions do not hold up the
//! rest of the session. Replies go through a single writer task, one line
//! each, in completion order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};

use crate::protocol::ProtocolHandler;
use crate::types::{
    CancelledParams, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, McpError, McpResult,
    RequestId, NOTIFICATION_CANCELLED,
};

use super::framing;

/// Requests still being answered, keyed by [`RequestId::key`]. The
/// generation tells a finished task whether its entry was since replaced by
/// a newer request reusing the same id.
#[derive(Default)]
struct InFlight {
    tasks: Mutex<HashMap<String, (u64, AbortHandle)>>,
    next_generation: AtomicU64,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, (u64, AbortHandle)>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn finish(&self, key: &str, generation: u64) {
        let mut tasks = self.lock();
        if tasks.get(key).is_some_and(|(g, _)| *g == generation) {
            tasks.remove(key);
        }
    }

    fn cancel(&self, key: &str) -> bool {
        match self.lock().remove(key) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn abort_all(&self) -> usize {
        let mut tasks = self.lock();
        let count = tasks.len();
        for (_, (_, handle)) in tasks.drain() {
            handle.abort();
        }
        count
    }
}

/// Stdio transport for desktop MCP clients.
pub struct StdioTransport {
    handler: Arc<ProtocolHandler>,
}

impl StdioTransport {
    pub fn new(handler: ProtocolHandler) -> Self {
        Self {
            handler: Arc::new(handler),
        }
    }

    /// Run the transport loop on the process stdin and stdout.
    pub async fn run(&self) -> McpResult<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve one session over any byte stream pair. Returns at EOF on
    /// `reader`, after in-flight requests are aborted and pending replies are
    /// written.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> McpResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel::<Value>();
        let writer_task = tokio::spawn(write_loop(writer, rx));
        let in_flight = Arc::new(InFlight::default());

        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        tracing::info!("Stdio transport started");

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await.map_err(McpError::Io)?;

            if bytes_read == 0 {
                tracing::info!("EOF on stdin, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match framing::parse_message(trimmed) {
                Ok(JsonRpcMessage::Request(request)) => {
                    self.spawn_request(request, &tx, &in_flight);
                }
                Ok(JsonRpcMessage::Notification(notification)) => {
                    if is_cancellation(&notification) {
                        cancel_request(&notification, &in_flight);
                    }
                    self.handler.handle_notification(notification).await;
                }
                Ok(other) => {
                    // Client-side responses carry nothing this server asked for.
                    self.handler.handle_message(other).await;
                }
                Err(e) => {
                    tracing::warn!("Parse error: {e}");
                    if tx.send(framing::parse_error_response(&e)).is_err() {
                        tracing::debug!("Parse error reply dropped: writer closed");
                    }
                }
            }
        }

        let aborted = in_flight.abort_all();
        if aborted > 0 {
            tracing::info!("Abandoned {aborted} in-flight request(s)");
        }
        drop(tx);

        match writer_task.await {
            Ok(result) => result,
            Err(e) => Err(McpError::InternalError(format!("writer task failed: {e}"))),
        }
    }

    fn spawn_request(
        &self,
        request: JsonRpcRequest,
        tx: &mpsc::UnboundedSender<Value>,
        in_flight: &Arc<InFlight>,
    ) {
        let key = request.id.key();
        let generation = in_flight.next_generation.fetch_add(1, Ordering::Relaxed);

        let handler = self.handler.clone();
        let tx = tx.clone();
        let registry = in_flight.clone();
        let task_key = key.clone();

        // Held across spawn and insert so a fast task cannot finish before
        // its entry exists.
        let mut tasks = in_flight.lock();
        let task: JoinHandle<()> = tokio::spawn(async move {
            let response = handler.handle_request(request).await;
            registry.finish(&task_key, generation);
            if tx.send(response).is_err() {
                tracing::debug!("Reply for {task_key} dropped: writer closed");
            }
        });
        if tasks.insert(key, (generation, task.abort_handle())).is_some() {
            tracing::warn!("Request id reused while still in flight");
        }
    }
}

fn is_cancellation(notification: &JsonRpcNotification) -> bool {
    matches!(
        notification.method.as_str(),
        NOTIFICATION_CANCELLED | "$/cancelRequest"
    )
}

fn cancel_request(notification: &JsonRpcNotification, in_flight: &InFlight) {
    let Some(params) = CancelledParams::from_params(notification.params.as_ref()) else {
        return;
    };
    let key = RequestId::key_of(&params.request_id);
    if in_flight.cancel(&key) {
        tracing::debug!("Aborted request {key}");
    } else {
        tracing::debug!("Cancellation for unknown or finished request {key}");
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Value>) -> McpResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(value) = rx.recv().await {
        let framed = framing::frame_message(&value)?;
        writer
            .write_all(framed.as_bytes())
            .await
            .map_err(McpError::Io)?;
        writer.flush().await.map_err(McpError::Io)?;
    }
    writer.shutdown().await.map_err(McpError::Io)?;
    Ok(())
}
