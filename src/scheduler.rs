// Per-device poll scheduling: three cadences on one tick, busy skipping and
// the watchdog. No I/O here; the worker feeds ticks and cycle results in.

use tokio::time::{Duration, Instant};

/// Watchdog budget; reset after every fully successful cycle.
pub const WATCHDOG_START: i32 = 15;
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const HOURLY_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Idle,
    Polling,
    Restarting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    CycleStarted,
    CycleFinished,
    RestartRequested,
    RestartCompleted,
}

impl DeviceState {
    /// Transition table. `None` means the event is not accepted in this state.
    pub fn next(self, event: SchedulerEvent) -> Option<DeviceState> {
        use DeviceState::*;
        use SchedulerEvent::*;
        match (self, event) {
            (Idle, CycleStarted) => Some(Polling),
            (Polling, CycleFinished) => Some(Idle),
            // A cycle that outlived a restart request must not reopen the tick.
            (Restarting, CycleFinished) => Some(Restarting),
            (Idle | Polling, RestartRequested) => Some(Restarting),
            (Restarting, RestartCompleted) => Some(Idle),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    Watchdog,
    SettingsChanged,
    InitFailed,
}

impl RestartReason {
    pub fn cooldown(self) -> Duration {
        match self {
            RestartReason::Watchdog => Duration::from_secs(60),
            RestartReason::SettingsChanged => Duration::from_secs(3),
            RestartReason::InitFailed => Duration::from_secs(60),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RestartReason::Watchdog => "watchdog",
            RestartReason::SettingsChanged => "settings_changed",
            RestartReason::InitFailed => "init_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadences {
    /// GPIO poll; disabled when `None`.
    pub fast: Option<Duration>,
    /// Stats and login log.
    pub slow: Duration,
}

/// Work for one cycle, run in the order slow, fast, hourly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollPlan {
    pub slow: bool,
    pub fast: bool,
    pub hourly: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Nothing due, or the device is restarting.
    Nothing,
    Run(PollPlan),
    /// Previous cycle still busy.
    Skipped { consecutive: u32, watchdog: i32 },
    /// Watchdog exhausted: mark unavailable and restart after the cooldown.
    Restart(RestartReason),
}

/// What a finished cycle managed to do. `completed` lists the parts that
/// succeeded; `failed` is set when any part hit a connection error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    pub completed: PollPlan,
    pub failed: bool,
}

#[derive(Debug)]
pub struct Scheduler {
    state: DeviceState,
    cadences: Cadences,
    watchdog: i32,
    skipped: u32,
    cycle_started: Option<Instant>,
    last_slow: Option<Instant>,
    last_fast: Option<Instant>,
    last_hourly: Option<Instant>,
}

fn elapsed_at_least(last: Option<Instant>, now: Instant, interval: Duration) -> bool {
    last.is_none_or(|t| now.saturating_duration_since(t) >= interval)
}

impl Scheduler {
    /// Starts in `Restarting`: nothing ticks until the first initialization
    /// completes.
    pub fn new(cadences: Cadences) -> Self {
        Self {
            state: DeviceState::Restarting,
            cadences,
            watchdog: WATCHDOG_START,
            skipped: 0,
            cycle_started: None,
            last_slow: None,
            last_fast: None,
            last_hourly: None,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn watchdog(&self) -> i32 {
        self.watchdog
    }

    pub fn cadences(&self) -> Cadences {
        self.cadences
    }

    pub fn set_cadences(&mut self, cadences: Cadences) {
        self.cadences = cadences;
    }

    fn apply(&mut self, event: SchedulerEvent) -> bool {
        match self.state.next(event) {
            Some(next) => {
                self.state = next;
                true
            }
            None => false,
        }
    }

    fn due(&self, now: Instant) -> PollPlan {
        PollPlan {
            slow: elapsed_at_least(self.last_slow, now, self.cadences.slow),
            fast: self
                .cadences
                .fast
                .is_some_and(|iv| elapsed_at_least(self.last_fast, now, iv)),
            hourly: self
                .last_hourly
                .is_none_or(|t| now.saturating_duration_since(t) > HOURLY_INTERVAL),
        }
    }

    pub fn on_tick(&mut self, now: Instant) -> TickDecision {
        if self.state == DeviceState::Restarting {
            return TickDecision::Nothing;
        }
        if self.watchdog <= 0 {
            self.apply(SchedulerEvent::RestartRequested);
            return TickDecision::Restart(RestartReason::Watchdog);
        }

        let plan = self.due(now);
        if !plan.slow && !plan.fast {
            return TickDecision::Nothing;
        }
        if self.state == DeviceState::Polling {
            self.watchdog -= 1;
            self.skipped += 1;
            return TickDecision::Skipped {
                consecutive: self.skipped,
                watchdog: self.watchdog,
            };
        }

        self.apply(SchedulerEvent::CycleStarted);
        self.skipped = 0;
        self.cycle_started = Some(now);
        TickDecision::Run(plan)
    }

    /// Records the cycle result. Timestamps of completed parts move to the
    /// cycle start so cadences stay anchored to when work was scheduled.
    pub fn on_cycle_complete(&mut self, outcome: CycleOutcome) {
        if let Some(started) = self.cycle_started.take() {
            if outcome.completed.slow {
                self.last_slow = Some(started);
            }
            if outcome.completed.fast {
                self.last_fast = Some(started);
            }
            if outcome.completed.hourly {
                self.last_hourly = Some(started);
            }
        }
        if outcome.failed {
            self.watchdog -= 1;
        } else {
            self.watchdog = WATCHDOG_START;
        }
        self.apply(SchedulerEvent::CycleFinished);
    }

    /// `false` when a restart is already in progress.
    pub fn request_restart(&mut self) -> bool {
        self.apply(SchedulerEvent::RestartRequested)
    }

    /// Initialization finished at `now`: back to `Idle` with a fresh watchdog.
    /// Fast and slow work is due on the next tick; the identity was just
    /// fetched, so the hourly check restarts its clock.
    pub fn restart_completed(&mut self, now: Instant) {
        if self.apply(SchedulerEvent::RestartCompleted) {
            self.watchdog = WATCHDOG_START;
            self.skipped = 0;
            self.cycle_started = None;
            self.last_slow = None;
            self.last_fast = None;
            self.last_hourly = Some(now);
        }
    }
}
