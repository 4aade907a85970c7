//! Poll-and-retry client for pending story generations.
//!
//! After a commit the backend regenerates story content in the background
//! and the story reads `PENDING` until it is done. One polling session per
//! poller: a fixed-interval status check runs until the story completes or
//! a hard deadline elapses. A failed check is logged and skipped; only the
//! deadline ever times a session out. Every result is dropped if the
//! session's story is no longer the current one.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};
use tracing::{debug, error, warn};

use super::http::StoryApi;
use super::models::{StoryDetailsResponse, StoryState};
use super::session::CurrentStory;

/// Time between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// How long a session keeps checking before giving up.
pub const DEFAULT_POLL_DEADLINE: Duration = Duration::from_secs(60);

/// Polling cadence and cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub deadline: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            deadline: DEFAULT_POLL_DEADLINE,
        }
    }
}

/// Observable state of a poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollState {
    /// No session running.
    #[default]
    Idle,
    /// A session is checking the story on its interval.
    Polling,
    /// The last session saw the story complete.
    Completed,
    /// The last session hit the deadline before completion.
    TimedOut,
}

/// Events delivered to the consumer of a polling session.
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// A status check returned a still-pending story.
    Update(StoryDetailsResponse),
    /// The story completed; this is the final event of the session.
    Completed(StoryDetailsResponse),
    /// The deadline elapsed before completion. Fired at most once.
    TimedOut,
}

struct PollSession {
    handle: JoinHandle<()>,
    story_id: String,
}

/// Repeatedly checks a story until it completes or the deadline elapses.
///
/// `start` supersedes any session already running, `stop` is idempotent,
/// and dropping the poller cancels the session outright.
pub struct StoryPoller<S> {
    api: Arc<S>,
    config: PollConfig,
    current: CurrentStory,
    state: Arc<Mutex<PollState>>,
    session: Mutex<Option<PollSession>>,
}

impl<S: StoryApi + 'static> StoryPoller<S> {
    pub fn new(api: Arc<S>, current: CurrentStory) -> Self {
        Self::with_config(api, current, PollConfig::default())
    }

    pub fn with_config(api: Arc<S>, current: CurrentStory, config: PollConfig) -> Self {
        Self {
            api,
            config,
            current,
            state: Arc::new(Mutex::new(PollState::Idle)),
            session: Mutex::new(None),
        }
    }

    /// Start a polling session for `story_id`, superseding any session
    /// already running. The first check happens one interval after the
    /// call. Events arrive on the returned channel.
    pub fn start(&self, user_id: &str, story_id: &str) -> mpsc::UnboundedReceiver<PollEvent> {
        self.abort_session();
        let (tx, rx) = mpsc::unbounded_channel();
        *self.state.lock() = PollState::Polling;
        debug!(story_id, "polling started");

        let task = PollTask {
            api: Arc::clone(&self.api),
            config: self.config,
            current: self.current.clone(),
            state: Arc::clone(&self.state),
            user_id: user_id.to_string(),
            story_id: story_id.to_string(),
            tx,
        };
        let handle = tokio::spawn(task.run());
        *self.session.lock() = Some(PollSession {
            handle,
            story_id: story_id.to_string(),
        });
        rx
    }
}

impl<S> StoryPoller<S> {
    pub fn state(&self) -> PollState {
        *self.state.lock()
    }

    pub fn is_polling(&self) -> bool {
        self.state() == PollState::Polling
    }

    /// Cancel the running session, if any. Safe to call from any state and
    /// any number of times.
    pub fn stop(&self) {
        self.abort_session();
        *self.state.lock() = PollState::Idle;
    }

    fn abort_session(&self) {
        if let Some(session) = self.session.lock().take() {
            session.handle.abort();
            debug!(story_id = %session.story_id, "polling session cancelled");
        }
    }
}

impl<S> Drop for StoryPoller<S> {
    fn drop(&mut self) {
        self.abort_session();
    }
}

struct PollTask<S> {
    api: Arc<S>,
    config: PollConfig,
    current: CurrentStory,
    state: Arc<Mutex<PollState>>,
    user_id: String,
    story_id: String,
    tx: mpsc::UnboundedSender<PollEvent>,
}

impl<S: StoryApi> PollTask<S> {
    async fn run(self) {
        let deadline = sleep(self.config.deadline);
        tokio::pin!(deadline);
        // First check fires one interval in, not immediately.
        let mut ticker = interval_at(Instant::now() + self.config.interval, self.config.interval);

        loop {
            tokio::select! {
                biased;

                () = &mut deadline => {
                    if self.current.matches(&self.story_id) {
                        error!(
                            story_id = %self.story_id,
                            deadline_secs = self.config.deadline.as_secs(),
                            "story generation exceeded the polling deadline"
                        );
                        *self.state.lock() = PollState::TimedOut;
                        let _ = self.tx.send(PollEvent::TimedOut);
                    } else {
                        *self.state.lock() = PollState::Idle;
                    }
                    return;
                }

                _ = ticker.tick() => {
                    if !self.current.matches(&self.story_id) {
                        debug!(story_id = %self.story_id, "current story changed, ending session");
                        *self.state.lock() = PollState::Idle;
                        return;
                    }
                    match self.api.get_story_by_id(&self.user_id, &self.story_id).await {
                        Ok(story) => {
                            if !self.current.matches(&self.story_id) {
                                // Target changed while the request was in
                                // flight: drop the result.
                                *self.state.lock() = PollState::Idle;
                                return;
                            }
                            if story.state == StoryState::Completed {
                                debug!(story_id = %self.story_id, "story completed");
                                *self.state.lock() = PollState::Completed;
                                let _ = self.tx.send(PollEvent::Completed(story));
                                return;
                            }
                            let _ = self.tx.send(PollEvent::Update(story));
                        }
                        Err(e) => {
                            warn!(
                                story_id = %self.story_id,
                                error = %e,
                                "status check failed, retrying on next tick"
                            );
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::time::{advance, timeout};

    use super::*;
    use crate::api::models::{
        AvailableSettingsResponse, CreateNewStoryRequest, DeleteStoryRequest,
        SetStoryNameRequest, UpdateImagesByTextRequest, UpdateTextByImagesRequest,
        UserStoriesResponse,
    };
    use crate::api::ApiError;

    fn story(story_id: &str, state: StoryState) -> StoryDetailsResponse {
        StoryDetailsResponse {
            story_id: story_id.to_string(),
            story_name: "The Fox".into(),
            story_text: "text".into(),
            state,
            story_images: Vec::new(),
            audio_url: None,
            settings: Default::default(),
        }
    }

    /// Scripted [`StoryApi`]: pops one status response per check, repeating
    /// the last one when the script runs out.
    struct ScriptedApi {
        script: Mutex<Vec<Result<StoryState, u16>>>,
        checks: AtomicUsize,
    }

    impl ScriptedApi {
        fn new(script: Vec<Result<StoryState, u16>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script),
                checks: AtomicUsize::new(0),
            })
        }

        fn checks(&self) -> usize {
            self.checks.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StoryApi for ScriptedApi {
        async fn get_story_by_id(
            &self,
            _user_id: &str,
            story_id: &str,
        ) -> Result<StoryDetailsResponse, ApiError> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock();
            let next = if script.len() > 1 {
                script.remove(0)
            } else {
                script.first().copied().unwrap_or(Ok(StoryState::Pending))
            };
            match next {
                Ok(state) => Ok(story(story_id, state)),
                Err(status) => Err(ApiError::Status(status)),
            }
        }

        async fn get_user_stories(&self, _: &str) -> Result<UserStoriesResponse, ApiError> {
            unimplemented!("not used by polling")
        }

        async fn create_new_story(
            &self,
            _: &CreateNewStoryRequest,
        ) -> Result<StoryDetailsResponse, ApiError> {
            unimplemented!("not used by polling")
        }

        async fn set_story_name(&self, _: &SetStoryNameRequest) -> Result<(), ApiError> {
            unimplemented!("not used by polling")
        }

        async fn delete_story(&self, _: &DeleteStoryRequest) -> Result<(), ApiError> {
            unimplemented!("not used by polling")
        }

        async fn update_text_by_images(
            &self,
            _: &UpdateTextByImagesRequest,
        ) -> Result<StoryDetailsResponse, ApiError> {
            unimplemented!("not used by polling")
        }

        async fn update_images_by_text(
            &self,
            _: &UpdateImagesByTextRequest,
        ) -> Result<StoryDetailsResponse, ApiError> {
            unimplemented!("not used by polling")
        }

        async fn get_available_settings(&self) -> Result<AvailableSettingsResponse, ApiError> {
            unimplemented!("not used by polling")
        }
    }

    fn poller_for(api: Arc<ScriptedApi>, story_id: &str) -> StoryPoller<ScriptedApi> {
        let current = CurrentStory::new();
        current.set(story_id);
        StoryPoller::new(api, current)
    }

    async fn drain(rx: &mut mpsc::UnboundedReceiver<PollEvent>) -> Vec<PollEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn completes_when_story_turns_completed() {
        let api = ScriptedApi::new(vec![
            Ok(StoryState::Pending),
            Ok(StoryState::Pending),
            Ok(StoryState::Completed),
        ]);
        let poller = poller_for(Arc::clone(&api), "s-1");

        let mut rx = poller.start("u-1", "s-1");
        let events = drain(&mut rx).await;

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], PollEvent::Update(_)));
        assert!(matches!(events[1], PollEvent::Update(_)));
        match &events[2] {
            PollEvent::Completed(story) => assert_eq!(story.story_id, "s-1"),
            other => panic!("expected Completed, got {other:?}"),
        }
        assert_eq!(poller.state(), PollState::Completed);
        assert_eq!(api.checks(), 3);

        // No further checks after completion.
        advance(Duration::from_secs(20)).await;
        assert_eq!(api.checks(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn first_check_waits_one_interval() {
        let api = ScriptedApi::new(vec![Ok(StoryState::Pending)]);
        let poller = poller_for(Arc::clone(&api), "s-1");
        let _rx = poller.start("u-1", "s-1");
        // Let the session register its timers before moving the clock.
        tokio::task::yield_now().await;

        advance(Duration::from_millis(1900)).await;
        assert_eq!(api.checks(), 0);
        advance(Duration::from_millis(200)).await;
        assert_eq!(api.checks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_exactly_once_at_the_deadline() {
        let api = ScriptedApi::new(vec![Ok(StoryState::Pending)]);
        let poller = poller_for(Arc::clone(&api), "s-1");

        let mut rx = poller.start("u-1", "s-1");
        let events = drain(&mut rx).await;

        // Checks at 2s, 4s, ..., 58s; the 60s tick loses to the deadline.
        assert_eq!(api.checks(), 29);
        let timeouts = events
            .iter()
            .filter(|event| matches!(event, PollEvent::TimedOut))
            .count();
        assert_eq!(timeouts, 1);
        assert!(matches!(events.last(), Some(PollEvent::TimedOut)));
        assert_eq!(poller.state(), PollState::TimedOut);

        // The interval is gone: no checks after the deadline.
        advance(Duration::from_secs(30)).await;
        assert_eq!(api.checks(), 29);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_checks_are_skipped_not_fatal() {
        let api = ScriptedApi::new(vec![
            Err(500),
            Err(502),
            Ok(StoryState::Completed),
        ]);
        let poller = poller_for(Arc::clone(&api), "s-1");

        let mut rx = poller.start("u-1", "s-1");
        let events = drain(&mut rx).await;

        // Failures produce no events; polling continues to completion.
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], PollEvent::Completed(_)));
        assert_eq!(api.checks(), 3);
        assert_eq!(poller.state(), PollState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_current_story_ends_session_silently() {
        let api = ScriptedApi::new(vec![Ok(StoryState::Pending)]);
        let current = CurrentStory::new();
        current.set("s-1");
        let poller = StoryPoller::new(Arc::clone(&api), current.clone());

        let mut rx = poller.start("u-1", "s-1");
        tokio::task::yield_now().await;
        // Let a couple of checks happen, then navigate away.
        advance(Duration::from_secs(5)).await;
        current.set("s-2");

        let events = drain(&mut rx).await;
        assert!(events.iter().all(|event| matches!(event, PollEvent::Update(_))));
        assert!(!events.iter().any(|event| matches!(event, PollEvent::TimedOut)));
        assert_eq!(poller.state(), PollState::Idle);

        let checks = api.checks();
        advance(Duration::from_secs(10)).await;
        assert_eq!(api.checks(), checks);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_again_supersedes_previous_session() {
        let api = ScriptedApi::new(vec![Ok(StoryState::Pending)]);
        let current = CurrentStory::new();
        current.set("s-1");
        let poller = StoryPoller::new(Arc::clone(&api), current.clone());

        let mut old_rx = poller.start("u-1", "s-1");
        tokio::task::yield_now().await;
        advance(Duration::from_secs(3)).await;

        current.set("s-2");
        let mut new_rx = poller.start("u-1", "s-2");
        tokio::task::yield_now().await;

        // Old channel closes without terminal events.
        let old_events = drain(&mut old_rx).await;
        assert!(!old_events.iter().any(|event| matches!(event, PollEvent::TimedOut)));

        advance(Duration::from_secs(2)).await;
        let event = timeout(Duration::from_secs(1), new_rx.recv()).await;
        assert!(matches!(event, Ok(Some(PollEvent::Update(_)))));
        assert!(poller.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_from_any_state() {
        let api = ScriptedApi::new(vec![Ok(StoryState::Pending)]);
        let poller = poller_for(Arc::clone(&api), "s-1");

        poller.stop();
        assert_eq!(poller.state(), PollState::Idle);

        let mut rx = poller.start("u-1", "s-1");
        tokio::task::yield_now().await;
        advance(Duration::from_secs(3)).await;
        poller.stop();
        poller.stop();
        assert_eq!(poller.state(), PollState::Idle);

        // Session is gone: channel closed, no further checks.
        let events = drain(&mut rx).await;
        assert!(!events.iter().any(|event| matches!(event, PollEvent::TimedOut)));
        let checks = api.checks();
        advance(Duration::from_secs(10)).await;
        assert_eq!(api.checks(), checks);
    }
}
