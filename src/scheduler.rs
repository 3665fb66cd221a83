use crate::{
    api::{
        AccountApi,
        ApiError,
    },
    config::SchedulerConfig,
    countdown::ms_until_full,
    store::{
        Clock,
        RefreshState,
        StateStore,
    },
    view::OverlayModel,
};
use futures::future::OptionFuture;
use std::sync::Arc;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{
        self,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    info,
    warn,
};

/// Fetches a fresh snapshot and stores it stamped with the time the response
/// arrived. On failure the stored state is left as it was.
pub async fn refresh_snapshot<A: AccountApi>(
    api: &A,
    store: &StateStore,
    clock: &dyn Clock,
) -> Result<(), ApiError> {
    let snapshot = api.status().await?;
    store.replace(snapshot, clock.now_ms());
    Ok(())
}

/// A fetch is due when the snapshot is older than `stale_after_ms`, or when
/// the countdown predicts charges are full but the snapshot still says they
/// are not.
pub fn should_refresh(state: &RefreshState, now_ms: i64, stale_after_ms: i64) -> bool {
    if state.age_ms(now_ms) > stale_after_ms {
        return true;
    }
    ms_until_full(state, now_ms) <= 0 && !state.snapshot.is_full()
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UiRefreshState {
    last_rendered_at_ms: i64,
}

impl UiRefreshState {
    /// Returns true at most once per `interval_ms`, recording `now_ms` when it
    /// does.
    pub fn should_refresh_ui(&mut self, now_ms: i64, interval_ms: i64) -> bool {
        if now_ms - self.last_rendered_at_ms > interval_ms {
            self.last_rendered_at_ms = now_ms;
            return true;
        }
        false
    }

    pub fn last_rendered_at_ms(&self) -> i64 {
        self.last_rendered_at_ms
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchedulerEvent {
    Render(OverlayModel),
    Refreshed,
    FetchFailed(String),
}

enum SchedulerCommand {
    RefreshNow,
    Shutdown,
}

/// Control handle for a running scheduler. Dropping it stops the loop.
pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<SchedulerCommand>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn refresh_now(&self) {
        let _ = self.commands.send(SchedulerCommand::RefreshNow);
    }

    pub async fn shutdown(self) {
        let _ = self.commands.send(SchedulerCommand::Shutdown);
        if let Err(err) = self.task.await {
            warn!(?err, "refresh scheduler task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

pub struct RefreshScheduler<A> {
    api: Arc<A>,
    store: StateStore,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    ui: UiRefreshState,
}

impl<A: AccountApi + 'static> RefreshScheduler<A> {
    pub fn new(
        api: Arc<A>,
        store: StateStore,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            api,
            store,
            clock,
            config,
            ui: UiRefreshState::default(),
        }
    }

    pub fn should_refresh(&self) -> bool {
        should_refresh(
            &self.store.current(),
            self.clock.now_ms(),
            self.config.stale_after_ms,
        )
    }

    pub fn should_refresh_ui(&mut self) -> bool {
        self.ui
            .should_refresh_ui(self.clock.now_ms(), self.config.ui_refresh_interval_ms)
    }

    pub fn overlay(&self) -> OverlayModel {
        OverlayModel::build(
            &self.store.current(),
            self.clock.now_ms(),
            self.config.stale_after_ms,
        )
    }

    /// Starts the loop on the tokio runtime. Render and fetch results are sent
    /// to `events`; the loop stops once the receiver is gone.
    pub fn spawn(self, events: mpsc::UnboundedSender<SchedulerEvent>) -> SchedulerHandle {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(command_rx, events));
        SchedulerHandle { commands, task }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SchedulerCommand>,
        events: mpsc::UnboundedSender<SchedulerEvent>,
    ) {
        info!(
            tick_ms = self.config.tick_interval.as_millis() as u64,
            "refresh scheduler starting"
        );
        let initial = {
            let fetch = refresh_snapshot(self.api.as_ref(), &self.store, self.clock.as_ref());
            tokio::pin!(fetch);
            loop {
                tokio::select! {
                    result = &mut fetch => break result,
                    cmd = commands.recv() => match cmd {
                        // the startup fetch already counts as one
                        Some(SchedulerCommand::RefreshNow) => {}
                        Some(SchedulerCommand::Shutdown) | None => {
                            info!("refresh scheduler stopped before first fetch completed");
                            return;
                        }
                    },
                }
            }
        };
        if let Err(err) = &initial {
            warn!(%err, "failed to get initial account status");
        }
        Self::report(initial, &events);

        let mut ticker = time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // at most one fetch started by the loop is outstanding at a time
        let mut in_flight: Option<JoinHandle<Result<(), ApiError>>> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if in_flight.is_none() && self.should_refresh() {
                        in_flight = Some(self.spawn_fetch());
                    }
                    if self.should_refresh_ui()
                        && events.send(SchedulerEvent::Render(self.overlay())).is_err()
                    {
                        debug!("render receiver dropped");
                        break;
                    }
                }
                Some(joined) = OptionFuture::from(in_flight.as_mut()) => {
                    in_flight = None;
                    match joined {
                        Ok(result) => {
                            if let Err(err) = &result {
                                warn!(%err, "status fetch failed");
                            }
                            Self::report(result, &events);
                        }
                        Err(err) => warn!(?err, "status fetch task failed"),
                    }
                }
                cmd = commands.recv() => {
                    match cmd {
                        Some(SchedulerCommand::RefreshNow) => {
                            if in_flight.is_none() {
                                in_flight = Some(self.spawn_fetch());
                            }
                        }
                        Some(SchedulerCommand::Shutdown) | None => break,
                    }
                }
            }
        }

        if let Some(task) = in_flight {
            task.abort();
        }
        info!("refresh scheduler stopped");
    }

    fn spawn_fetch(&self) -> JoinHandle<Result<(), ApiError>> {
        let api = self.api.clone();
        let store = self.store.clone();
        let clock = self.clock.clone();
        tokio::spawn(async move {
            refresh_snapshot(api.as_ref(), &store, clock.as_ref()).await
        })
    }

    fn report(
        result: Result<(), ApiError>,
        events: &mpsc::UnboundedSender<SchedulerEvent>,
    ) {
        let event = match result {
            Ok(()) => SchedulerEvent::Refreshed,
            Err(err) => SchedulerEvent::FetchFailed(err.to_string()),
        };
        let _ = events.send(event);
    }
}
