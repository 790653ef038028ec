//! Streamed assistant replies

use std::sync::Arc;

use futures::{future::BoxFuture, FutureExt, StreamExt};
use ollama_manager_client::{ChatRequest, ChatStream, Daemon};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{error::ChatError, models::SendOutcome, session::ChatSession, Result};

/// Fragments of one assistant reply, in order.
///
/// Consumed once: after the final fragment, an error or cancellation,
/// [`ResponseStream::next`] keeps returning `None`. Every fragment has
/// already been appended to the transcript when it is returned. Dropping an
/// unfinished stream cancels the reply.
pub struct ResponseStream {
    session: ChatSession,
    daemon: Arc<dyn Daemon>,
    send_id: u64,
    request: Option<ChatRequest>,
    // Survives a dropped `next()` so the connection attempt resumes
    connecting: Option<BoxFuture<'static, ollama_manager_client::Result<ChatStream>>>,
    events: Option<ChatStream>,
    cancel: CancellationToken,
    finished: bool,
}

impl ResponseStream {
    pub(crate) fn new(
        session: ChatSession,
        daemon: Arc<dyn Daemon>,
        send_id: u64,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session,
            daemon,
            send_id,
            request: Some(request),
            connecting: None,
            events: None,
            cancel,
            finished: false,
        }
    }

    /// Next fragment of the reply; None once the reply is over
    pub async fn next(&mut self) -> Option<Result<String>> {
        if self.finished {
            return None;
        }

        if self.events.is_none() {
            if self.connecting.is_none() {
                let request = self.request.take()?;
                let daemon = self.daemon.clone();
                self.connecting = Some(async move { daemon.chat(request).await }.boxed());
            }
            let connecting = self.connecting.as_mut()?;
            let started = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.stop(),
                started = connecting => started,
            };
            self.connecting = None;
            match started {
                Ok(events) => self.events = Some(events),
                Err(err) => return Some(Err(self.fail(err.into()))),
            }
        }

        loop {
            let events = self.events.as_mut()?;
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.stop(),
                next = events.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let text = chunk.text().to_string();
                    if !text.is_empty() && !self.session.append_fragment(self.send_id, &text) {
                        // Cancelled between polls
                        return self.stop();
                    }
                    if chunk.done {
                        self.complete();
                    }
                    if !text.is_empty() {
                        return Some(Ok(text));
                    }
                    if self.finished {
                        return None;
                    }
                }
                Some(Err(err)) => return Some(Err(self.fail(err.into()))),
                None => {
                    self.complete();
                    return None;
                }
            }
        }
    }

    /// Drain the reply and return its full text
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }

    /// Stop the reply; the partial text stays in the transcript
    pub fn cancel(&mut self) {
        if !self.finished {
            self.session.finish(self.send_id, SendOutcome::Cancelled);
            self.stop();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn complete(&mut self) {
        self.session.finish(self.send_id, SendOutcome::Complete);
        self.finished = true;
        self.connecting = None;
        self.events = None;
    }

    fn fail(&mut self, err: ChatError) -> ChatError {
        self.session
            .finish(self.send_id, SendOutcome::Failed(err.to_string()));
        self.finished = true;
        self.connecting = None;
        self.events = None;
        err
    }

    /// Close the connection after a cancellation
    fn stop(&mut self) -> Option<Result<String>> {
        debug!("Closing reply stream");
        self.finished = true;
        self.connecting = None;
        self.events = None;
        None
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        if !self.finished {
            self.session.finish(self.send_id, SendOutcome::Cancelled);
        }
    }
}

impl std::fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("send_id", &self.send_id)
            .field("started", &self.events.is_some())
            .field("finished", &self.finished)
            .finish()
    }
}
