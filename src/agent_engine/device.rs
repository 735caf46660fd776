/// One automation agent bound to a single background window.
///
/// The agent owns one loop thread. Each iteration samples the window, walks
/// the state ladder and performs at most the actions the matched states call
/// for. Stop is cooperative: the flag is observed within one poll interval
/// (plus any in-flight action) and the caller then joins the thread.
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::agent_engine::captcha::CaptchaSolver;
use crate::agent_engine::debounce::Debounce;
use crate::agent_engine::state::{AgentStatus, Flow, UiState, LADDER};
use crate::config::{AppConfig, Point};
use crate::errors::PilotResult;
use crate::executor::input::{DragTiming, InputDispatcher};
use crate::perception::matcher::find_state;
use crate::perception::template_cache::TemplateCache;
use crate::perception::templates::TemplateSet;
use crate::perception::traits::{FrameSource, SharedDetector};
use crate::perception::types::Frame;
use crate::platform::{tile_position, WindowHandle, WindowSystem};

/// External collaborators shared by every agent of a fleet.
#[derive(Clone)]
pub struct Services {
    pub windows: Arc<dyn WindowSystem>,
    pub frames: Arc<dyn FrameSource>,
    pub detector: Option<SharedDetector>,
    pub config: Arc<AppConfig>,
}

/// State visible to both the owning handle and the loop thread.
pub(crate) struct AgentShared {
    title: String,
    handle: WindowHandle,
    index: AtomicUsize,
    running: AtomicBool,
    paused: AtomicBool,
    green: Debounce,
    confirm: Debounce,
    pin: Debounce,
    input: InputDispatcher,
    services: Services,
    started_at: Mutex<Option<DateTime<Utc>>>,
    captcha_attempts: AtomicU32,
    captcha_solved: AtomicU32,
}

impl AgentShared {
    fn config(&self) -> &AppConfig {
        &self.services.config
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Input may be dispatched only while running and not paused.
    fn active(&self) -> bool {
        self.is_running() && !self.is_paused()
    }

    fn click(&self, at: Point) {
        self.input.click(self.handle, at);
    }

    pub(crate) fn press_green(&self) -> bool {
        let at = self.config().targets.green;
        self.green.run(|| {
            self.click(at);
            true
        })
    }

    pub(crate) fn press_confirm(&self) -> bool {
        let at = self.config().targets.confirm;
        self.confirm.run(|| {
            self.click(at);
            true
        })
    }

    /// Wait `delay`, then click unless a pause or stop arrived meanwhile.
    fn delayed_click(&self, delay: Duration, at: Point) {
        thread::sleep(delay);
        if self.active() {
            self.click(at);
        }
    }

    /// Pin-entry sequence: one click on the first target, then the digit
    /// target repeatedly. Suppressed within the pin debounce interval and
    /// abandoned as soon as a stop or pause is observed.
    pub(crate) fn enter_pin(&self) -> bool {
        let timing = &self.config().timing;
        let targets = &self.config().targets;
        self.pin.run(|| {
            if !self.active() {
                return false;
            }
            thread::sleep(Duration::from_millis(timing.pin_lead_in_ms[0]));
            if !self.active() {
                return false;
            }
            thread::sleep(Duration::from_millis(timing.pin_lead_in_ms[1]));
            self.click(targets.pin_first);
            for _ in 0..timing.pin_digit_count {
                thread::sleep(Duration::from_millis(timing.pin_digit_gap_ms));
                if !self.active() {
                    return false;
                }
                self.click(targets.pin_digit);
            }
            true
        })
    }

    fn sample(&self) -> PilotResult<Frame> {
        let rect = self.services.windows.rect_of(self.handle)?;
        self.services.frames.grab(self.handle, rect)
    }
}

/// Per-thread loop state: templates and their resize cache.
pub(crate) struct AgentLoop {
    shared: Arc<AgentShared>,
    templates: TemplateSet,
    cache: TemplateCache,
    solver: CaptchaSolver,
}

impl AgentLoop {
    pub(crate) fn prepare(shared: Arc<AgentShared>) -> PilotResult<Self> {
        shared.services.windows.rect_of(shared.handle)?;
        let templates = TemplateSet::load(&shared.config().assets)?;
        let solver = CaptchaSolver::new(shared.config(), shared.services.detector.clone());
        Ok(Self { shared, templates, cache: TemplateCache::new(), solver })
    }

    /// One pass of the state ladder against a fresh frame.
    pub(crate) fn tick(&mut self) -> PilotResult<Flow> {
        let frame = self.shared.sample()?;
        let matching = &self.shared.config().matching;
        let mut matched = Vec::new();

        for rung in LADDER {
            if !self.shared.active() {
                return Ok(Flow::Interrupted);
            }
            let templates = self.templates.get(rung.templates);
            if find_state(&frame, templates, matching.threshold, &matching.scales, &mut self.cache).is_none() {
                continue;
            }
            tracing::debug!(state = rung.state.label(), "state matched");
            self.handle(rung.state);
            if rung.short_circuit {
                return Ok(Flow::ShortCircuited(rung.state));
            }
            matched.push(rung.state);
        }
        Ok(Flow::Completed(matched))
    }

    fn handle(&self, state: UiState) {
        let shared = &self.shared;
        let timing = &shared.config().timing;
        let targets = &shared.config().targets;
        match state {
            UiState::Green => {
                shared.press_green();
            }
            UiState::Captcha => self.attempt_captcha(),
            UiState::Pin => {
                shared.enter_pin();
            }
            UiState::Glo => shared.delayed_click(Duration::from_millis(timing.glo_delay_ms), targets.glo),
            UiState::Glo2 => shared.delayed_click(Duration::from_millis(timing.glo2_delay_ms), targets.glo2),
            UiState::Confirm => {
                shared.press_confirm();
            }
        }
    }

    /// Solver failures are reported here and never escalate.
    fn attempt_captcha(&self) {
        let shared = &self.shared;
        tracing::info!("Captcha detected");
        shared.captcha_attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = shared
            .sample()
            .and_then(|frame| self.solver.solve(&frame, &shared.input, shared.handle));
        match outcome {
            Ok(plan) => {
                shared.captcha_solved.fetch_add(1, Ordering::SeqCst);
                tracing::info!(distance = plan.distance, offset = plan.offset, "Captcha solved");
            }
            Err(e) => tracing::warn!(error = %e, "Failed to solve captcha"),
        }
    }
}

fn run_agent(shared: Arc<AgentShared>) {
    let span = tracing::info_span!("agent", title = %shared.title, index = shared.index.load(Ordering::SeqCst));
    let _enter = span.enter();

    let mut agent_loop = match AgentLoop::prepare(Arc::clone(&shared)) {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, "Automation loop setup failed");
            shared.running.store(false, Ordering::SeqCst);
            return;
        }
    };

    tracing::info!("automation loop started");
    let poll = shared.config().timing.poll();
    while shared.is_running() {
        if shared.is_paused() {
            thread::sleep(poll);
            continue;
        }
        match agent_loop.tick() {
            Ok(Flow::ShortCircuited(state)) => tracing::trace!(state = state.label(), "iteration short-circuited"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Error in automation loop"),
        }
        if !shared.is_running() {
            break;
        }
        thread::sleep(poll);
    }
    tracing::info!("automation loop stopped");
}

pub struct DeviceAgent {
    shared: Arc<AgentShared>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceAgent {
    /// Bind to the window titled exactly `title`; fails with `WindowNotFound`.
    pub fn new(title: &str, index: usize, services: Services) -> PilotResult<Self> {
        let handle = services.windows.locate(title)?;
        let timing = &services.config.timing;
        let input = InputDispatcher::new(Arc::clone(&services.windows), DragTiming::from(timing));
        let shared = AgentShared {
            title: title.to_string(),
            handle,
            index: AtomicUsize::new(index),
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            green: Debounce::new(Duration::from_millis(timing.green_debounce_ms)),
            confirm: Debounce::new(Duration::from_millis(timing.confirm_debounce_ms)),
            pin: Debounce::new(Duration::from_millis(timing.pin_debounce_ms)),
            input,
            services,
            started_at: Mutex::new(None),
            captcha_attempts: AtomicU32::new(0),
            captcha_solved: AtomicU32::new(0),
        };
        tracing::debug!(title, %handle, index, "device agent created");
        Ok(Self { shared: Arc::new(shared), thread: None })
    }

    pub fn title(&self) -> &str {
        &self.shared.title
    }

    pub fn handle(&self) -> WindowHandle {
        self.shared.handle
    }

    pub fn index(&self) -> usize {
        self.shared.index.load(Ordering::SeqCst)
    }

    pub fn set_index(&self, index: usize) {
        self.shared.index.store(index, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.shared.is_paused()
    }

    /// Spawn the loop thread unless one is already alive.
    pub fn start(&mut self) {
        if let Some(thread) = &self.thread {
            if !thread.is_finished() {
                return;
            }
        }
        if let Some(finished) = self.thread.take() {
            let _ = finished.join();
        }

        self.shared.running.store(true, Ordering::SeqCst);
        *self.shared.started_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("agent-{}", self.index()))
            .spawn(move || run_agent(shared));
        match spawned {
            Ok(handle) => self.thread = Some(handle),
            Err(e) => {
                tracing::error!(title = %self.shared.title, error = %e, "failed to spawn agent thread");
                self.shared.running.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Ask the loop to exit without waiting for it.
    pub fn signal_stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
    }

    /// Request a stop and block until the loop thread has exited.
    pub fn stop(&mut self) {
        self.signal_stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!(title = %self.shared.title, "agent thread panicked");
            }
            tracing::debug!(title = %self.shared.title, "agent stopped");
        }
    }

    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
    }

    /// Two-click reset gesture on the device UI.
    pub fn refresh(&self) {
        let config = self.shared.config();
        self.shared.click(config.targets.refresh_first);
        thread::sleep(Duration::from_millis(config.timing.refresh_gap_ms));
        self.shared.click(config.targets.refresh_second);
    }

    /// Move and resize the window into its tile.
    pub fn apply_layout(&self) -> PilotResult<()> {
        let layout = &self.shared.config().layout;
        let (x, y) = tile_position(self.index(), layout.columns, layout.cell_width, layout.cell_height);
        self.shared
            .services
            .windows
            .move_and_resize(self.shared.handle, x, y, layout.cell_width, layout.cell_height)
    }

    pub fn status(&self) -> AgentStatus {
        AgentStatus {
            title: self.shared.title.clone(),
            index: self.index(),
            running: self.is_running(),
            paused: self.is_paused(),
            started_at: *self.shared.started_at.lock().unwrap_or_else(PoisonError::into_inner),
            captcha_attempts: self.shared.captcha_attempts.load(Ordering::SeqCst),
            captcha_solved: self.shared.captcha_solved.load(Ordering::SeqCst),
        }
    }
}

impl Drop for DeviceAgent {
    fn drop(&mut self) {
        self.stop();
    }
}
