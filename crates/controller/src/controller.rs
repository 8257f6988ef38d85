//! ProcessController 核心实现
//!
//! 每个运行模式一个槽位：运行标志 + 代号、运行状态、当前取消标志、串行通道。
//! start/stop 只修改原子状态并立即返回，所有等待都在后台 worker 中进行。

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{
    CancellationFlag, FinalOutcome, HttpTransport, ModeLog, ReachabilityProbe, RunMode, RunState,
    ScheduleRule, ShellEvents, TimeTransport, UnlockBlueprint,
};
use dispatcher::{RequestDispatcher, ResponseClassifier, RetryScheduler};
use time_sync::{
    compute_schedule_at, format_in_zone, CancellableWaiter, LatencyProbe, TimeSource,
    TimeSyncError, WaitOutcome,
};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::error::{ControllerError, Result};
use crate::report::{RunReport, StartOutcome};

/// Running bit + generation packed in one atomic
///
/// Layout: `generation << 1 | running`. Every successful start bumps the
/// generation, so a stopped worker can never clear a newer run.
#[derive(Debug, Default)]
struct RunFlags(AtomicU64);

impl RunFlags {
    const RUNNING: u64 = 1;

    /// Claim the slot; returns the new generation, or `None` if already running
    fn try_acquire(&self) -> Option<u64> {
        let mut current = self.0.load(Ordering::SeqCst);
        loop {
            if current & Self::RUNNING != 0 {
                return None;
            }
            let generation = (current >> 1) + 1;
            match self.0.compare_exchange(
                current,
                generation << 1 | Self::RUNNING,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Some(generation),
                Err(actual) => current = actual,
            }
        }
    }

    /// Clear the running bit of `generation`; `false` if already cleared or superseded
    fn release(&self, generation: u64) -> bool {
        self.0
            .compare_exchange(
                generation << 1 | Self::RUNNING,
                generation << 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Clear the running bit whatever the generation; `true` if it was set
    fn stop(&self) -> bool {
        self.0.fetch_and(!Self::RUNNING, Ordering::SeqCst) & Self::RUNNING != 0
    }

    fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst) & Self::RUNNING != 0
    }

    fn generation(&self) -> u64 {
        self.0.load(Ordering::SeqCst) >> 1
    }
}

/// Per-mode state
#[derive(Debug, Default)]
struct ModeSlot {
    flags: RunFlags,
    state: AtomicU8,
    /// Current run's flag; held across every running-state transition
    cancel: Mutex<CancellationFlag>,
    /// Serializes workers of this mode: a restarted mode waits for the old worker to drain
    lane: tokio::sync::Mutex<()>,
    worker: Mutex<Option<JoinHandle<RunReport>>>,
}

impl ModeSlot {
    fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: RunState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the running flag when the worker exits, including by panic
struct RunningGuard<'a> {
    slot: &'a ModeSlot,
    generation: u64,
    log: &'a ModeLog,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let _transition = lock(&self.slot.cancel);
        if self.slot.flags.release(self.generation) {
            self.log.state_changed(false);
        }
        if self.slot.flags.generation() == self.generation {
            self.slot.set_state(RunState::Idle);
        }
    }
}

/// One worker's view of its run
struct RunContext<'a> {
    mode: RunMode,
    slot: &'a ModeSlot,
    generation: u64,
    cancel: CancellationFlag,
    log: ModeLog,
}

impl RunContext<'_> {
    /// Record a state transition unless the run was stopped or superseded
    fn enter(&self, state: RunState) {
        if self.slot.flags.is_running() && self.slot.flags.generation() == self.generation {
            self.slot.set_state(state);
        }
    }
}

struct Inner<T, P, H>
where
    T: TimeTransport,
    P: ReachabilityProbe,
    H: HttpTransport,
{
    blueprint: UnlockBlueprint,
    rule: ScheduleRule,
    time_source: TimeSource<T>,
    latency_probe: LatencyProbe<P>,
    waiter: CancellableWaiter,
    dispatcher: RequestDispatcher<H>,
    shell: Arc<dyn ShellEvents>,
    scheduled: ModeSlot,
    manual: ModeSlot,
}

/// Process Controller
///
/// 组合 TimeSource → LatencyProbe → 目标时刻计算 → 等待 → 重试分发，
/// 为外部 shell 提供 `start_mode` / `stop_mode`。
pub struct ProcessController<T, P, H>
where
    T: TimeTransport,
    P: ReachabilityProbe,
    H: HttpTransport,
{
    inner: Arc<Inner<T, P, H>>,
}

impl<T, P, H> ProcessController<T, P, H>
where
    T: TimeTransport + Sync + 'static,
    P: ReachabilityProbe + Sync + 'static,
    H: HttpTransport + Sync + 'static,
{
    /// 创建新的 ProcessController
    ///
    /// # Errors
    /// The schedule rule in `blueprint` cannot be parsed.
    pub fn new(
        blueprint: UnlockBlueprint,
        time_transport: T,
        probe: P,
        http: H,
        shell: Arc<dyn ShellEvents>,
    ) -> Result<Self> {
        let rule = blueprint.schedule.to_rule()?;
        let time_source = TimeSource::new(time_transport, blueprint.time.query_timeout());
        let latency_probe = LatencyProbe::new(probe, blueprint.latency.default_ms);
        let waiter = CancellableWaiter::new(blueprint.wait.poll_interval())
            .with_countdown(blueprint.wait.countdown_interval());
        let dispatcher = RequestDispatcher::new(
            http,
            ResponseClassifier::new(&blueprint.classifier),
            &blueprint.request,
        );

        Ok(Self {
            inner: Arc::new(Inner {
                blueprint,
                rule,
                time_source,
                latency_probe,
                waiter,
                dispatcher,
                shell,
                scheduled: ModeSlot::default(),
                manual: ModeSlot::default(),
            }),
        })
    }

    pub fn blueprint(&self) -> &UnlockBlueprint {
        &self.inner.blueprint
    }

    pub fn rule(&self) -> &ScheduleRule {
        &self.inner.rule
    }

    pub fn dispatcher(&self) -> &RequestDispatcher<H> {
        &self.inner.dispatcher
    }

    pub fn time_source(&self) -> &TimeSource<T> {
        &self.inner.time_source
    }

    pub fn latency_probe(&self) -> &LatencyProbe<P> {
        &self.inner.latency_probe
    }

    /// Start `mode` in the background
    ///
    /// Returns immediately. An empty credential is rejected before anything is
    /// scheduled; starting a running mode is a no-op.
    ///
    /// # Errors
    /// `EmptyCredential`, or `NoRuntime` when called outside a tokio runtime.
    #[instrument(name = "controller_start_mode", skip(self, credential))]
    pub fn start_mode(&self, mode: RunMode, credential: &str) -> Result<StartOutcome> {
        let log = self.inner.log(mode);
        let credential = credential.trim();
        if credential.is_empty() {
            log.warn("Please paste your cookie first.");
            return Err(ControllerError::EmptyCredential);
        }
        let runtime = Handle::try_current().map_err(|_| ControllerError::NoRuntime { mode })?;

        let slot = self.inner.slot(mode);
        let mut current = lock(&slot.cancel);
        let Some(generation) = slot.flags.try_acquire() else {
            debug!(%mode, "Start ignored, mode already running");
            return Ok(StartOutcome::AlreadyRunning);
        };

        let cancel = CancellationFlag::new();
        *current = cancel.clone();
        slot.set_state(RunState::Idle);
        log.state_changed(true);
        drop(current);
        log.info(match mode {
            RunMode::Scheduled => {
                "Scheduled process started. Calculating precise send time...".to_string()
            }
            RunMode::Manual => format!(
                "Manual process started ({:?}).",
                self.inner.blueprint.retry.policy_for(mode)
            ),
        });

        let inner = Arc::clone(&self.inner);
        let credential = credential.to_string();
        let handle = runtime.spawn(async move {
            inner
                .run_worker(mode, generation, credential, cancel)
                .await
        });
        *lock(&slot.worker) = Some(handle);

        Ok(StartOutcome::Started)
    }

    /// Signal `mode` to stop
    ///
    /// Returns `true` if the mode was running. The worker observes the flag at
    /// its next poll or attempt boundary; an in-flight request completes on its own.
    #[instrument(name = "controller_stop_mode", skip(self))]
    pub fn stop_mode(&self, mode: RunMode) -> bool {
        let slot = self.inner.slot(mode);
        let current = lock(&slot.cancel);
        current.cancel();

        if !slot.flags.stop() {
            return false;
        }
        slot.set_state(RunState::Stopped);

        let log = self.inner.log(mode);
        log.state_changed(false);
        drop(current);
        log.info(format!("{} process stopped by user.", title(mode)));
        true
    }

    pub fn is_running(&self, mode: RunMode) -> bool {
        self.inner.slot(mode).flags.is_running()
    }

    pub fn state(&self, mode: RunMode) -> RunState {
        self.inner.slot(mode).state()
    }

    /// Wait for the most recently started worker of `mode`
    ///
    /// `None` when no worker was started since the last join.
    pub async fn join(&self, mode: RunMode) -> Option<RunReport> {
        let handle = lock(&self.inner.slot(mode).worker).take()?;
        Some(match handle.await {
            Ok(report) => report,
            Err(e) => RunReport {
                mode,
                result: Err(ControllerError::WorkerFailed {
                    mode,
                    message: e.to_string(),
                }),
                elapsed: Duration::ZERO,
            },
        })
    }

    /// Stop every mode and collect the reports of their workers
    pub async fn shutdown(&self) -> Vec<RunReport> {
        let mut reports = Vec::new();
        for mode in RunMode::ALL {
            self.stop_mode(mode);
            if let Some(report) = self.join(mode).await {
                reports.push(report);
            }
        }
        reports
    }
}

impl<T, P, H> Inner<T, P, H>
where
    T: TimeTransport + Sync,
    P: ReachabilityProbe + Sync,
    H: HttpTransport + Sync,
{
    fn slot(&self, mode: RunMode) -> &ModeSlot {
        match mode {
            RunMode::Scheduled => &self.scheduled,
            RunMode::Manual => &self.manual,
        }
    }

    fn log(&self, mode: RunMode) -> ModeLog {
        ModeLog::new(mode, Arc::clone(&self.shell))
    }

    #[instrument(
        name = "controller_worker",
        skip(self, mode, credential, cancel),
        fields(mode = %mode)
    )]
    async fn run_worker(
        self: Arc<Self>,
        mode: RunMode,
        generation: u64,
        credential: String,
        cancel: CancellationFlag,
    ) -> RunReport {
        let slot = self.slot(mode);
        let _lane = slot.lane.lock().await;

        let ctx = RunContext {
            mode,
            slot,
            generation,
            cancel,
            log: self.log(mode),
        };
        let _guard = RunningGuard {
            slot,
            generation,
            log: &ctx.log,
        };

        let start = Instant::now();
        let result = if ctx.cancel.is_cancelled() {
            Ok(FinalOutcome::Cancelled { attempts: 0 })
        } else {
            match mode {
                RunMode::Scheduled => self.scheduled_cycle(&ctx, &credential).await,
                RunMode::Manual => self.dispatch_cycle(&ctx, &credential).await,
            }
        };

        let report = RunReport {
            mode,
            result,
            elapsed: start.elapsed(),
        };
        self.finish(&report, &ctx.log);
        report
    }

    /// 授时 → 延迟探测 → 计算发送时刻 → 等待 → 分发
    async fn scheduled_cycle(&self, ctx: &RunContext<'_>, credential: &str) -> Result<FinalOutcome> {
        let log = &ctx.log;
        ctx.enter(RunState::Waiting);

        let now = self
            .time_source
            .fetch_authoritative_time(&self.blueprint.time.servers, log)
            .await?;
        log.info(format!(
            "Synchronized Time: {}",
            format_in_zone(now.epoch_ms(), self.rule.zone)
        ));
        if ctx.cancel.is_cancelled() {
            return Ok(FinalOutcome::Cancelled { attempts: 0 });
        }

        let latency_cfg = &self.blueprint.latency;
        let latency = self
            .latency_probe
            .estimate_latency(
                &latency_cfg.target(),
                latency_cfg.samples,
                latency_cfg.timeout(),
                &ctx.cancel,
                log,
            )
            .await;
        if ctx.cancel.is_cancelled() {
            return Ok(FinalOutcome::Cancelled { attempts: 0 });
        }

        // probing took time; advance the authoritative clock monotonically
        let window = match compute_schedule_at(now.now_epoch_ms(), latency, &self.rule) {
            Ok(window) => window,
            Err(e @ TimeSyncError::PastDeadline { .. }) => {
                log.error("ERROR: Calculated send time is in the past. Check system clock or network.");
                return Err(e.into());
            }
            Err(e) => {
                log.error(format!("ERROR: {e}"));
                return Err(e.into());
            }
        };

        log.info("--- Timing Calculation ---");
        log.info(format!(
            "Target Arrival Time: {}",
            format_in_zone(window.arrival_epoch_ms, self.rule.zone)
        ));
        log.info(format!(
            "Calculated Send Time: {} (latency {} ms)",
            format_in_zone(window.send_epoch_ms, self.rule.zone),
            latency.as_millis()
        ));
        observability::record_schedule_lead_ms(window.lead_ms());

        let deadline = now.local_deadline(window.send_epoch_ms);
        if self.waiter.wait_until(deadline, &ctx.cancel, log).await == WaitOutcome::Cancelled {
            return Ok(FinalOutcome::Cancelled { attempts: 0 });
        }

        log.info("Target time reached! Starting unlock attempt.");
        self.dispatch_cycle(ctx, credential).await
    }

    async fn dispatch_cycle(&self, ctx: &RunContext<'_>, credential: &str) -> Result<FinalOutcome> {
        ctx.enter(RunState::Dispatching);
        ctx.log
            .info(format!("--- [{}] Sending Unlock Request ---", title(ctx.mode)));

        let scheduler = RetryScheduler::for_mode(&self.blueprint.retry, ctx.mode);
        Ok(scheduler
            .run(&self.dispatcher, credential, &ctx.cancel, &ctx.log)
            .await)
    }

    fn finish(&self, report: &RunReport, log: &ModeLog) {
        let title = title(report.mode);
        match &report.result {
            Ok(FinalOutcome::Success { .. }) => {
                log.info(format!("--- [{title}] Process Finished: SUCCESS! ---"))
            }
            Ok(FinalOutcome::Cancelled { .. }) => {
                log.warn(format!("--- [{title}] Process Cancelled ---"))
            }
            Ok(outcome) => log.warn(format!(
                "--- [{title}] Process Finished: FAILED ({outcome}). See logs for details. ---"
            )),
            Err(e) => log.error(format!(
                "--- [{title}] Process halted: {e} ---"
            )),
        }

        info!(
            mode = %report.mode,
            outcome = report.label(),
            attempts = report.attempts(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Run finished"
        );
        observability::record_run_outcome(report.mode.as_str(), report.label());
    }
}

fn title(mode: RunMode) -> &'static str {
    match mode {
        RunMode::Scheduled => "Scheduled",
        RunMode::Manual => "Manual",
    }
}
