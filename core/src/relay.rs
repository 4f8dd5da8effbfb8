//! Forwards answer fragments from the model to the HTTP body.
//!
//! The relay task owns the only `Sender` of the output channel. The channel
//! closes when that sender drops, which happens exactly once when the task
//! returns, whichever way it returns.

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::llm::FragmentStream;

pub const OUTPUT_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The provider finished normally.
    Completed,
    /// The provider failed mid-stream; the marker was emitted.
    Faulted,
    /// The client went away; nothing more was emitted.
    Cancelled,
}

/// Drains `fragments` into `output` in arrival order, skipping empty
/// fragments. Stops as soon as the receiver is dropped and drops the
/// provider stream with it.
pub async fn relay(
    mut fragments: FragmentStream,
    output: mpsc::Sender<String>,
    fault_marker: &'static str,
) -> RelayOutcome {
    let mut forwarded = 0usize;

    let outcome = loop {
        let next = tokio::select! {
            biased;
            _ = output.closed() => break RelayOutcome::Cancelled,
            next = fragments.next() => next,
        };

        match next {
            None => break RelayOutcome::Completed,
            Some(Ok(fragment)) if fragment.is_empty() => continue,
            Some(Ok(fragment)) => {
                if output.send(fragment).await.is_err() {
                    break RelayOutcome::Cancelled;
                }
                forwarded += 1;
            }
            Some(Err(e)) => {
                warn!("Answer stream failed after {} fragment(s): {}", forwarded, e);
                // if the client is already gone there is nobody to tell
                let _ = output.send(fault_marker.to_string()).await;
                break RelayOutcome::Faulted;
            }
        }
    };

    drop(fragments);
    debug!(?outcome, forwarded, "answer relay finished");
    outcome
}

/// Spawns [`relay`] and hands back the receiving half for the response body.
pub fn spawn_relay(fragments: FragmentStream, fault_marker: &'static str) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(OUTPUT_BUFFER);
    tokio::spawn(relay(fragments, tx, fault_marker));
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use futures::stream;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    const MARKER: &str = "\n\n(streaming error)";

    fn fragments(items: Vec<Result<&'static str, ModelError>>) -> FragmentStream {
        Box::pin(stream::iter(items.into_iter().map(|r| r.map(String::from))))
    }

    async fn drain(mut rx: mpsc::Receiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(fragment) = rx.recv().await {
            out.push(fragment);
        }
        out
    }

    /// Flips a flag when dropped, to observe that the provider stream was released.
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_forwards_in_order_and_skips_empty() {
        let (tx, rx) = mpsc::channel(OUTPUT_BUFFER);
        let source = fragments(vec![Ok("서울 "), Ok(""), Ok("백엔드 "), Ok("공고")]);

        let outcome = relay(source, tx, MARKER).await;

        assert_eq!(outcome, RelayOutcome::Completed);
        // recv() returning None after the items proves the channel closed
        assert_eq!(drain(rx).await, vec!["서울 ", "백엔드 ", "공고"]);
    }

    #[tokio::test]
    async fn test_fault_emits_marker_then_closes() {
        let (tx, rx) = mpsc::channel(OUTPUT_BUFFER);
        let source = fragments(vec![
            Ok("partial"),
            Err(ModelError::StreamFault("connection reset".into())),
            Ok("never sent"),
        ]);

        let outcome = relay(source, tx, MARKER).await;

        assert_eq!(outcome, RelayOutcome::Faulted);
        assert_eq!(drain(rx).await, vec!["partial".to_string(), MARKER.to_string()]);
    }

    #[tokio::test]
    async fn test_cancellation_stops_and_releases_provider_stream() {
        let released = Arc::new(AtomicBool::new(false));
        let guard = DropFlag(Arc::clone(&released));

        // one fragment, then a provider that never answers again
        let source: FragmentStream = Box::pin(
            stream::iter(vec![Ok("first".to_string())]).chain(stream::pending()).map(move |item| {
                let _keep = &guard;
                item
            }),
        );

        let (tx, mut rx) = mpsc::channel(OUTPUT_BUFFER);
        let task = tokio::spawn(relay(source, tx, MARKER));

        assert_eq!(rx.recv().await.as_deref(), Some("first"));
        drop(rx);

        let outcome = task.await.unwrap();
        assert_eq!(outcome, RelayOutcome::Cancelled);
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_spawn_relay_closes_on_completion() {
        let rx = spawn_relay(fragments(vec![Ok("a"), Ok("b")]), MARKER);
        assert_eq!(drain(rx).await, vec!["a", "b"]);
    }
}
