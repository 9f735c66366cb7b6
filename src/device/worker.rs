// Per-device worker loop: one-second tick, at most one poll or
// initialization task in flight, actions spawned beside it.

use std::sync::Arc;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tracing::{Instrument, debug, error, info, warn};

use super::action::{Action, ActionOutput, handle_action};
use super::poll::PollContext;
use super::{DeviceSettings, ShellFactory};
use crate::error::{ActionError, SessionError};
use crate::models::GpioState;
use crate::remote_repo::RemoteRepo;
use crate::scheduler::{
    CycleOutcome, DeviceState, PollPlan, RestartReason, Scheduler, TICK_INTERVAL, TickDecision,
};
use crate::session::Session;
use crate::sink::DeviceSink;

const COMMAND_CHANNEL_CAPACITY: usize = 32;

/// Identity, settings, transport and platform sink for one worker.
pub struct DeviceDeps {
    pub id: String,
    pub settings: DeviceSettings,
    pub shell_factory: ShellFactory,
    pub sink: Arc<dyn DeviceSink>,
}

enum DeviceCommand {
    Action(Action, oneshot::Sender<Result<ActionOutput, ActionError>>),
    ApplySettings(DeviceSettings),
}

enum JobResult {
    Initialized(Result<(), SessionError>),
    Polled(CycleOutcome),
}

type JobOutput = (PollContext, JobResult);

/// Cloneable sender side used to invoke actions on a running worker.
#[derive(Clone)]
pub struct DeviceClient {
    commands: mpsc::Sender<DeviceCommand>,
}

impl DeviceClient {
    pub async fn action(&self, action: Action) -> Result<ActionOutput, ActionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(DeviceCommand::Action(action, reply_tx))
            .await
            .map_err(|_| ActionError::DeviceNotReady)?;
        reply_rx.await.map_err(|_| ActionError::DeviceNotReady)?
    }

    /// New settings take effect through a restart after a short cooldown.
    pub async fn apply_settings(&self, settings: DeviceSettings) -> Result<(), ActionError> {
        self.commands
            .send(DeviceCommand::ApplySettings(settings))
            .await
            .map_err(|_| ActionError::DeviceNotReady)
    }
}

/// Owner of a running worker. Dropping it stops the worker.
pub struct DeviceHandle {
    id: String,
    client: DeviceClient,
    shutdown_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl DeviceHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn client(&self) -> &DeviceClient {
        &self.client
    }

    /// Stops ticking, abandons any in-flight poll and disconnects.
    pub async fn teardown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.join.await;
    }
}

async fn join_job(job: &mut Option<JoinHandle<JobOutput>>) -> Result<JobOutput, JoinError> {
    match job {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

fn new_repo(factory: &ShellFactory, settings: &DeviceSettings) -> RemoteRepo {
    RemoteRepo::new(Arc::new(Session::new(factory(settings))))
}

pub fn spawn(deps: DeviceDeps) -> DeviceHandle {
    let DeviceDeps {
        id,
        settings,
        shell_factory,
        sink,
    } = deps;
    let (commands, mut command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let device_id = id.clone();
    let worker_span = tracing::span!(tracing::Level::DEBUG, "device", device = %id);

    let worker = async move {
        let id = device_id;
        let mut settings = settings;
        let last_gpio: Arc<RwLock<Option<GpioState>>> = Arc::new(RwLock::new(None));
        let mut repo = new_repo(&shell_factory, &settings);
        let mut ctx = Some(PollContext::new(
            id.clone(),
            repo.clone(),
            sink.clone(),
            last_gpio.clone(),
        ));
        let mut scheduler = Scheduler::new(settings.cadences());
        let mut job: Option<JoinHandle<JobOutput>> = None;
        let mut pending_settings: Option<DeviceSettings> = None;
        // The first initialization runs right away.
        let mut restart_at = Some(Instant::now());

        let mut tick = interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match scheduler.on_tick(Instant::now()) {
                        TickDecision::Nothing => {}
                        TickDecision::Skipped { consecutive, watchdog } => {
                            if consecutive > 1 {
                                info!(
                                    device = %id,
                                    consecutive,
                                    watchdog,
                                    "previous poll still running, skipping tick"
                                );
                            }
                        }
                        TickDecision::Run(plan) => {
                            if let Some(mut c) = ctx.take() {
                                job = Some(tokio::spawn(async move {
                                    let outcome = c.run_cycle(plan).await;
                                    (c, JobResult::Polled(outcome))
                                }));
                            }
                        }
                        TickDecision::Restart(reason) => {
                            warn!(device = %id, reason = reason.as_str(), "watchdog triggered, restarting device");
                            sink.set_available(false, Some("connection lost, reconnecting")).await;
                            restart_at = Some(Instant::now() + reason.cooldown());
                        }
                    }
                }
                joined = join_job(&mut job) => {
                    job = None;
                    match joined {
                        Ok((c, JobResult::Polled(outcome))) => {
                            ctx = Some(c);
                            scheduler.on_cycle_complete(outcome);
                        }
                        Ok((c, JobResult::Initialized(Ok(())))) => {
                            ctx = Some(c);
                            if pending_settings.is_some() {
                                // Settings arrived mid-initialization; apply them now.
                                restart_at = Some(Instant::now() + RestartReason::SettingsChanged.cooldown());
                            } else {
                                scheduler.restart_completed(Instant::now());
                                tick.reset_immediately();
                            }
                        }
                        Ok((c, JobResult::Initialized(Err(e)))) => {
                            ctx = Some(c);
                            let reason = RestartReason::InitFailed;
                            warn!(
                                device = %id,
                                error = %e,
                                retry_in_secs = reason.cooldown().as_secs(),
                                "device initialization failed"
                            );
                            sink.set_available(false, Some(&e.to_string())).await;
                            restart_at = Some(Instant::now() + reason.cooldown());
                        }
                        Err(e) => {
                            error!(device = %id, error = %e, "device job aborted");
                            ctx = Some(PollContext::new(
                                id.clone(),
                                repo.clone(),
                                sink.clone(),
                                last_gpio.clone(),
                            ));
                            if scheduler.state() == DeviceState::Polling {
                                scheduler.on_cycle_complete(CycleOutcome {
                                    completed: PollPlan::default(),
                                    failed: true,
                                });
                            } else if restart_at.is_none() {
                                restart_at = Some(Instant::now() + RestartReason::InitFailed.cooldown());
                            }
                        }
                    }
                }
                _ = sleep_until_deadline(restart_at), if job.is_none() && restart_at.is_some() => {
                    restart_at = None;
                    if let Some(new_settings) = pending_settings.take() {
                        repo.session().disconnect().await;
                        settings = new_settings;
                        repo = new_repo(&shell_factory, &settings);
                        scheduler.set_cadences(settings.cadences());
                        if let Some(c) = ctx.as_mut() {
                            // possibly another host now: start the baselines over
                            c.repo = repo.clone();
                            c.last_stats = None;
                            c.logins.reset();
                        }
                        debug!(device = %id, "settings applied");
                    }
                    if let Some(mut c) = ctx.take() {
                        info!(device = %id, host = %settings.target.host, "initializing device");
                        job = Some(tokio::spawn(async move {
                            let result = c.initialize().await;
                            (c, JobResult::Initialized(result))
                        }));
                    }
                }
                command = command_rx.recv() => {
                    match command {
                        Some(DeviceCommand::Action(action, reply)) => {
                            if scheduler.state() == DeviceState::Restarting {
                                let _ = reply.send(Err(ActionError::DeviceNotReady));
                                continue;
                            }
                            debug!(device = %id, action = action.name(), "running action");
                            let repo = repo.clone();
                            let gpio = last_gpio.clone();
                            tokio::spawn(async move {
                                let _ = reply.send(handle_action(&repo, &gpio, action).await);
                            });
                        }
                        Some(DeviceCommand::ApplySettings(new_settings)) => {
                            pending_settings = Some(new_settings);
                            if scheduler.request_restart() {
                                info!(device = %id, "settings changed, restarting device");
                                restart_at = Some(Instant::now() + RestartReason::SettingsChanged.cooldown());
                            } else {
                                debug!(device = %id, "restart already in progress, settings queued");
                            }
                        }
                        None => break,
                    }
                }
                _ = &mut shutdown_rx => {
                    debug!(device = %id, "device worker shutting down");
                    break;
                }
            }
        }

        if let Some(handle) = job.take() {
            handle.abort();
        }
        repo.session().disconnect().await;
    };

    DeviceHandle {
        id,
        client: DeviceClient { commands },
        shutdown_tx,
        join: tokio::spawn(worker.instrument(worker_span)),
    }
}
