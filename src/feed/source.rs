use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::feed::event::SchedulerEvent;
use crate::monitor::MonitorHandle;

/// Why a feed stopped delivering events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEnd {
    /// The scheduler sent an explicit end of stream
    StreamEnd,
    /// The input closed without an end-of-stream event
    Disconnected,
    /// Stopped from our side
    Cancelled,
}

/// Parse one JSON line into an event.
pub fn parse_event(line: &str) -> Result<SchedulerEvent> {
    Ok(serde_json::from_str(line)?)
}

/// Pump a JSON-lines feed into the monitor until it ends or `cancel` fires.
///
/// Blank lines are skipped and malformed lines are logged and discarded.
/// The reader is dropped on return, so every resource tied to the
/// connection is released on all exit paths.
pub async fn pump_events<R>(
    reader: R,
    handle: &MonitorHandle,
    cancel: CancellationToken,
) -> Result<FeedEnd>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = LinesStream::new(reader.lines());
    let mut line_no: u64 = 0;

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(lines = line_no, "Feed stopped");
                return Ok(FeedEnd::Cancelled);
            }
            next = lines.next() => next,
        };

        let line = match next {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Feed read failed");
                handle.connection_lost().await?;
                return Err(e.into());
            }
            None => {
                tracing::info!(lines = line_no, "Feed closed");
                handle.connection_lost().await?;
                return Ok(FeedEnd::Disconnected);
            }
        };
        line_no += 1;

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_event(line) {
            Ok(SchedulerEvent::StreamEnd) => {
                handle.send_event(SchedulerEvent::StreamEnd).await?;
                tracing::info!(lines = line_no, "Scheduler ended the stream");
                return Ok(FeedEnd::StreamEnd);
            }
            Ok(event) => handle.send_event(event).await?,
            Err(e) => {
                tracing::warn!(line = line_no, error = %e, "Malformed feed line discarded");
            }
        }
    }
}
