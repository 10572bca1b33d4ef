use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::prompt::PromptPart;

/// A conversation with the remote model.
pub trait ChatSession: Send + 'static {
    fn send(&mut self, parts: Vec<PromptPart>) -> impl Future<Output = anyhow::Result<String>> + Send + '_;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("a request is already in progress")]
    Busy,

    #[error("nothing to send")]
    EmptyPrompt,

    #[error("{0}")]
    Backend(String),

    /// The request could not be built, e.g. an attachment failed to encode.
    #[error("{0}")]
    Prepare(String),

    #[error("no reply after {} seconds", .0.as_secs())]
    TimedOut(Duration),

    #[error("request cancelled")]
    Cancelled,
}

/// Identifies one dispatch. Completions from an older generation are stale.
pub type Generation = u64;

/// A request that has been accepted and is ready to be driven to completion.
pub struct Dispatch<F> {
    pub generation: Generation,
    pub future: F,
}

/// Serializes requests to a single chat session.
pub struct Dispatcher<S> {
    session: Arc<Mutex<S>>,
    processing: bool,
    generation: Generation,
    cancel: Option<CancellationToken>,
    timeout: Option<Duration>,
}

impl<S: ChatSession> Dispatcher<S> {
    pub fn new(session: S, timeout: Option<Duration>) -> Self {
        Dispatcher {
            session: Arc::new(Mutex::new(session)),
            processing: false,
            generation: 0,
            cancel: None,
            timeout,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        generation == self.generation
    }

    /// Accepts a request and returns the future that performs it.
    ///
    /// `prepare` builds the prompt parts on the blocking pool once the future
    /// is polled, so image encoding stays off the UI thread. The processing
    /// flag is raised before this returns; it stays raised until
    /// [`Dispatcher::finish`] or [`Dispatcher::reset`].
    pub fn submit<P>(
        &mut self,
        prepare: P,
    ) -> Result<Dispatch<impl Future<Output = Result<String, DispatchError>> + Send + 'static>, DispatchError>
    where
        P: FnOnce() -> Result<Vec<PromptPart>, DispatchError> + Send + 'static,
    {
        if self.processing {
            return Err(DispatchError::Busy);
        }

        self.processing = true;
        self.generation += 1;
        let token = CancellationToken::new();
        self.cancel = Some(token.clone());

        let generation = self.generation;
        let session = self.session.clone();
        let timeout = self.timeout;
        tracing::debug!("Dispatching request #{}", generation);

        let future = async move {
            let call = async move {
                let parts = tokio::task::spawn_blocking(prepare)
                    .await
                    .map_err(|e| DispatchError::Prepare(format!("could not prepare the request: {}", e)))??;
                if parts.is_empty() {
                    return Err(DispatchError::EmptyPrompt);
                }

                let mut session = session.lock().await;
                session.send(parts).await.map_err(|e| DispatchError::Backend(e.to_string()))
            };

            let timed = async move {
                match timeout {
                    Some(limit) => tokio::time::timeout(limit, call)
                        .await
                        .unwrap_or(Err(DispatchError::TimedOut(limit))),
                    None => call.await,
                }
            };

            tokio::select! {
                biased;
                _ = token.cancelled() => Err(DispatchError::Cancelled),
                result = timed => result,
            }
        };

        Ok(Dispatch { generation, future })
    }

    /// Cancels the outstanding call, if any. The flag stays raised until the
    /// cancelled completion is handled.
    pub fn cancel(&mut self) {
        if let Some(token) = self.cancel.take() {
            tracing::debug!("Cancelling request #{}", self.generation);
            token.cancel();
        }
    }

    /// Marks the current dispatch-and-render cycle as complete.
    pub fn finish(&mut self) {
        self.processing = false;
        self.cancel = None;
    }

    /// Replaces the session, abandoning whatever was in flight.
    pub fn reset(&mut self, session: S) {
        self.cancel();
        self.generation += 1;
        self.processing = false;
        self.session = Arc::new(Mutex::new(session));
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;

    /// A session that replays canned replies and records what it was sent.
    #[derive(Default)]
    pub struct ScriptedSession {
        pub replies: VecDeque<anyhow::Result<String>>,
        pub delay: Option<Duration>,
        pub sent: Arc<std::sync::Mutex<Vec<Vec<PromptPart>>>>,
    }

    impl ScriptedSession {
        pub fn replying(replies: Vec<anyhow::Result<String>>) -> Self {
            ScriptedSession {
                replies: replies.into(),
                ..Default::default()
            }
        }
    }

    impl ChatSession for ScriptedSession {
        fn send(&mut self, parts: Vec<PromptPart>) -> impl Future<Output = anyhow::Result<String>> + Send + '_ {
            async move {
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                if let Ok(mut sent) = self.sent.lock() {
                    sent.push(parts);
                }
                self.replies
                    .pop_front()
                    .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted reply")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedSession;
    use super::*;

    fn hello() -> Result<Vec<PromptPart>, DispatchError> {
        Ok(vec![PromptPart::text("Hello")])
    }

    #[tokio::test]
    async fn test_flag_raised_until_finish() {
        let session = ScriptedSession::replying(vec![Ok("Hi there!".to_string())]);
        let sent = session.sent.clone();
        let mut dispatcher = Dispatcher::new(session, None);
        assert!(!dispatcher.is_processing());

        let dispatch = dispatcher.submit(hello).unwrap();
        assert!(dispatcher.is_processing());
        assert!(dispatcher.is_current(dispatch.generation));

        assert_eq!(dispatch.future.await.unwrap(), "Hi there!");
        assert!(dispatcher.is_processing());

        dispatcher.finish();
        assert!(!dispatcher.is_processing());
        assert_eq!(sent.lock().unwrap().as_slice(), &[vec![PromptPart::text("Hello")]]);
    }

    #[tokio::test]
    async fn test_second_submit_rejected_while_processing() {
        let session = ScriptedSession::replying(vec![Ok("one".to_string()), Ok("two".to_string())]);
        let mut dispatcher = Dispatcher::new(session, None);

        let first = dispatcher.submit(hello).unwrap();
        assert_eq!(dispatcher.submit(hello).err(), Some(DispatchError::Busy));

        first.future.await.unwrap();
        assert_eq!(dispatcher.submit(hello).err(), Some(DispatchError::Busy));

        dispatcher.finish();
        let second = dispatcher.submit(hello).unwrap();
        assert_eq!(second.future.await.unwrap(), "two");
    }

    #[tokio::test]
    async fn test_empty_parts_rejected() {
        let session = ScriptedSession::default();
        let sent = session.sent.clone();
        let mut dispatcher = Dispatcher::new(session, None);

        let dispatch = dispatcher.submit(|| Ok(Vec::new())).unwrap();
        assert_eq!(dispatch.future.await.unwrap_err(), DispatchError::EmptyPrompt);
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_failure_skips_the_session() {
        let session = ScriptedSession::replying(vec![Ok("unused".to_string())]);
        let sent = session.sent.clone();
        let mut dispatcher = Dispatcher::new(session, None);

        let dispatch = dispatcher
            .submit(|| Err(DispatchError::Prepare("Could not encode image shot.png".to_string())))
            .unwrap();
        let err = dispatch.future.await.unwrap_err();
        assert_eq!(err.to_string(), "Could not encode image shot.png");
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backend_error_is_surfaced() {
        let session = ScriptedSession::replying(vec![Err(anyhow::anyhow!("quota exceeded"))]);
        let mut dispatcher = Dispatcher::new(session, None);

        let dispatch = dispatcher.submit(hello).unwrap();
        let err = dispatch.future.await.unwrap_err();
        assert_eq!(err, DispatchError::Backend("quota exceeded".to_string()));
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[tokio::test]
    async fn test_timeout() {
        let session = ScriptedSession {
            delay: Some(Duration::from_secs(30)),
            ..ScriptedSession::replying(vec![Ok("late".to_string())])
        };
        let limit = Duration::from_millis(20);
        let mut dispatcher = Dispatcher::new(session, Some(limit));

        let dispatch = dispatcher.submit(hello).unwrap();
        assert_eq!(dispatch.future.await.unwrap_err(), DispatchError::TimedOut(limit));
    }

    #[tokio::test]
    async fn test_cancel() {
        let session = ScriptedSession {
            delay: Some(Duration::from_secs(30)),
            ..ScriptedSession::default()
        };
        let mut dispatcher = Dispatcher::new(session, None);

        let dispatch = dispatcher.submit(hello).unwrap();
        dispatcher.cancel();
        assert_eq!(dispatch.future.await.unwrap_err(), DispatchError::Cancelled);
        assert!(dispatcher.is_processing());
    }

    #[tokio::test]
    async fn test_reset_makes_pending_dispatch_stale() {
        let mut dispatcher = Dispatcher::new(ScriptedSession::default(), None);
        let dispatch = dispatcher.submit(hello).unwrap();

        dispatcher.reset(ScriptedSession::replying(vec![Ok("fresh".to_string())]));
        assert!(!dispatcher.is_processing());
        assert!(!dispatcher.is_current(dispatch.generation));
        assert_eq!(dispatch.future.await.unwrap_err(), DispatchError::Cancelled);

        let next = dispatcher.submit(hello).unwrap();
        assert!(dispatcher.is_current(next.generation));
        assert_eq!(next.future.await.unwrap(), "fresh");
    }
}
