use crate::{
    api::{
        ApiError,
        HttpAccountApi,
    },
    config::{
        HelperConfig,
        UPGRADE_AMOUNT,
        UPGRADE_COST,
    },
    monitor::TracingObserver,
    purchase::{
        PurchaseFlow,
        PurchaseOutcome,
    },
    scheduler::{
        RefreshScheduler,
        SchedulerEvent,
        SchedulerHandle,
    },
    store::{
        Clock,
        StateStore,
        SystemClock,
    },
    ui::{
        self,
        StatusLine,
        UiState,
        UserEvent,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    path::Path,
    sync::Arc,
};
use tokio::sync::mpsc;
use tracing::{
    info,
    warn,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

pub const LOG_FILE_NAME: &str = "charge-helper.log";

/// Logs go to a daily rolling file since the terminal is owned by the UI.
/// Keep the returned guard alive until exit so buffered lines are flushed.
pub fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("failed to create log directory {}", log_dir.display()))?;
    let appender = rolling::daily(log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|err| eyre!("failed to install tracing subscriber: {err}"))?;
    Ok(guard)
}

pub async fn run_app(config: HelperConfig) -> Result<()> {
    let mut api =
        HttpAccountApi::new(&config.api).wrap_err("failed to build account API client")?;
    if let Some(keyword) = &config.monitor {
        info!(%keyword, "request monitoring enabled");
        api = api.with_observer(Arc::new(TracingObserver::new(keyword.clone())));
    }
    info!(base_url = api.base_url(), "using account API");

    let api = Arc::new(api);
    let store = StateStore::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let purchase = PurchaseFlow::new(api.clone(), store.clone(), clock.clone());
    let scheduler = RefreshScheduler::new(api, store, clock, config.scheduler.clone());

    let mut ui_state = UiState::default();
    let mut input_events = ui::input_event_stream();

    tracing::info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    tracing::info!("UI ready");
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let scheduler = scheduler.spawn(events_tx);
    let res = run_loop(scheduler, purchase, events_rx, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

type PurchaseResult = Result<PurchaseOutcome, ApiError>;

fn purchase_status(result: &PurchaseResult) -> StatusLine {
    match result {
        Ok(PurchaseOutcome::Purchased { amount, refreshed }) => {
            let mut message = format!(
                "Bought +{} max charges for {} droplets",
                amount * UPGRADE_AMOUNT,
                amount * UPGRADE_COST
            );
            if !refreshed {
                message.push_str(" (status refresh pending)");
            }
            StatusLine::Info(message)
        }
        Ok(PurchaseOutcome::Rejected { status }) => {
            StatusLine::Error(format!("Purchase rejected by server ({status})"))
        }
        Ok(PurchaseOutcome::NothingAffordable) => {
            StatusLine::Info(format!("Need {UPGRADE_COST} droplets per upgrade"))
        }
        Err(err) => StatusLine::Error(format!("Purchase failed: {err}")),
    }
}

/// Decides when scheduler events should overwrite the status line.
#[derive(Debug, Default)]
struct StatusTracker {
    fetch_error: bool,
    refresh_pending: bool,
}

impl StatusTracker {
    fn refresh_requested(&mut self) -> StatusLine {
        self.refresh_pending = true;
        StatusLine::Info("Refreshing...".to_string())
    }

    /// `Some` when the line still shows an error or a pending refresh.
    fn refreshed(&mut self) -> Option<StatusLine> {
        let clear = self.fetch_error || self.refresh_pending;
        self.fetch_error = false;
        self.refresh_pending = false;
        clear.then_some(StatusLine::Ready)
    }

    fn fetch_failed(&mut self, err: &str) -> StatusLine {
        self.fetch_error = true;
        self.refresh_pending = false;
        StatusLine::Error(format!("Status fetch failed: {err}"))
    }

    fn purchase_finished(&mut self, result: &PurchaseResult) -> StatusLine {
        self.fetch_error = false;
        self.refresh_pending = false;
        purchase_status(result)
    }
}

async fn run_loop(
    scheduler: SchedulerHandle,
    purchase: PurchaseFlow<HttpAccountApi>,
    mut scheduler_events: mpsc::UnboundedReceiver<SchedulerEvent>,
    ui_state: &mut UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    tracing::info!("Running app loop");
    let (purchase_tx, mut purchase_rx) = mpsc::unbounded_channel::<PurchaseResult>();
    let mut status = StatusTracker::default();

    if let Err(err) = ui::draw(ui_state).wrap_err("initial draw failed") {
        scheduler.shutdown().await;
        return Err(err);
    }

    let res: Result<()> = loop {
        tokio::select! {
            maybe_event = scheduler_events.recv() => {
                match maybe_event {
                    Some(SchedulerEvent::Render(model)) => {
                        ui_state.set_model(model);
                    }
                    Some(SchedulerEvent::Refreshed) => {
                        if let Some(line) = status.refreshed() {
                            ui_state.set_status(line);
                        }
                    }
                    Some(SchedulerEvent::FetchFailed(err)) => {
                        ui_state.set_status(status.fetch_failed(&err));
                    }
                    None => {
                        warn!("refresh scheduler channel closed");
                        break Err(eyre!("refresh scheduler stopped unexpectedly"));
                    }
                }
                if let Err(err) = ui::draw(ui_state).wrap_err("draw after scheduler event failed") {
                    break Err(err);
                }
            }
            Some(result) = purchase_rx.recv() => {
                ui_state.set_purchase_pending(false);
                ui_state.set_status(status.purchase_finished(&result));
                if let Err(err) = ui::draw(ui_state).wrap_err("draw after purchase failed") {
                    break Err(err);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break Ok(());
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = match raw_ev {
                    Ok(event) => event,
                    Err(err) => break Err(err),
                };
                let Some(ev) = ui::interpret_event(event) else {
                    continue;
                };
                match ev {
                    UserEvent::Quit => break Ok(()),
                    UserEvent::Refresh => {
                        scheduler.refresh_now();
                        ui_state.set_status(status.refresh_requested());
                    }
                    UserEvent::Buy => {
                        let enabled = ui_state
                            .model()
                            .is_some_and(|model| model.purchase.enabled);
                        if ui_state.purchase_pending() || !enabled {
                            continue;
                        }
                        ui_state.set_purchase_pending(true);
                        ui_state.set_status(StatusLine::Info("Purchasing upgrade...".to_string()));
                        let flow = purchase.clone();
                        let tx = purchase_tx.clone();
                        tokio::spawn(async move {
                            let result = flow.invoke().await;
                            let _ = tx.send(result);
                        });
                    }
                    UserEvent::Redraw => {}
                }
                if let Err(err) = ui::draw(ui_state).wrap_err("draw after input failed") {
                    break Err(err);
                }
            }
        }
    };

    scheduler.shutdown().await;
    res
}
