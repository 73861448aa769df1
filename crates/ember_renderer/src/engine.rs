//! Render session scheduler and lifecycle state machine.
//!
//! The engine owns a fixed pool of [`TileWorker`] threads. It has no thread
//! of its own: every scheduling decision happens inside a worker's
//! completion callback, under the session lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use ember_math::UVec2;
use parking_lot::Mutex;

use crate::buffer::RenderBuffer;
use crate::error::RenderError;
use crate::pixel::PixelWorker;
use crate::profile::RenderProfile;
use crate::scene::Scene;
use crate::settings::RenderSettings;
use crate::sync::{Signal, Stopwatch};
use crate::tile::{spiral_tiles, tile_grid, TileStatus};
use crate::tile_worker::{TileCallback, TileContext, TileEvent, TileReport, TileWorker};

/// Lifecycle of a render session.
///
/// `Waiting -> Initialization -> Rendering <-> Paused -> Completed | Aborted`,
/// and `Reset` returns to `Waiting`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Waiting,
    Initialization,
    Rendering,
    Paused,
    Completed,
    Aborted,
}

impl State {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => State::Waiting,
            1 => State::Initialization,
            2 => State::Rendering,
            3 => State::Paused,
            4 => State::Completed,
            _ => State::Aborted,
        }
    }

    /// Whether a session is live and can be paused or aborted.
    pub fn is_active(self) -> bool {
        matches!(self, State::Rendering | State::Paused)
    }

    /// Whether the session has ended and only `reset` moves it on.
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Completed | State::Aborted)
    }
}

/// Inputs for the next session.
#[derive(Default)]
struct Config {
    buffer: Option<Arc<RenderBuffer>>,
    scene: Option<Arc<Scene>>,
    settings: RenderSettings,
    pixel_worker: Option<Arc<dyn PixelWorker>>,
}

/// Everything owned by one live session.
#[derive(Default)]
struct Session {
    profile: Option<Arc<RenderProfile>>,
    workers: Vec<TileWorker>,
    /// Tile pixel positions in dispatch order
    tiles: Vec<UVec2>,
    /// Keyed by tile-space coordinate
    statuses: HashMap<UVec2, TileStatus>,
    grid: UVec2,
    tile_size: u32,
    completed_sample: u64,
    completed_pixel: u64,
    fault: Option<RenderError>,
}

struct EngineInner {
    state: AtomicU8,
    config: Mutex<Config>,
    session: Mutex<Session>,

    dispatched: AtomicUsize,
    completed: AtomicUsize,
    total: AtomicUsize,

    clock: Stopwatch,
    finished: Signal,
}

/// Tile-based progressive renderer.
///
/// Assign a buffer and a scene, then [`begin`](Self::begin) a session and
/// [`wait_for_render`](Self::wait_for_render). Progress counters are atomics
/// and can be polled from any thread without blocking the workers.
pub struct RenderEngine {
    inner: Arc<EngineInner>,
}

impl RenderEngine {
    pub fn new() -> Self {
        Self::with_settings(RenderSettings::default())
    }

    pub fn with_settings(settings: RenderSettings) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                state: AtomicU8::new(State::Waiting as u8),
                config: Mutex::new(Config {
                    settings,
                    ..Default::default()
                }),
                session: Mutex::new(Session::default()),
                dispatched: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
                total: AtomicUsize::new(0),
                clock: Stopwatch::default(),
                finished: Signal::default(),
            }),
        }
    }

    /// Assign the frame buffer the next session renders into.
    pub fn set_render_buffer(&self, buffer: Arc<RenderBuffer>) -> Result<(), RenderError> {
        let _session = self.inner.session.lock();
        self.inner.ensure_idle("set the render buffer")?;
        self.inner.config.lock().buffer = Some(buffer);
        Ok(())
    }

    /// Assign the scene the next session renders.
    pub fn set_scene(&self, scene: impl Into<Arc<Scene>>) -> Result<(), RenderError> {
        let _session = self.inner.session.lock();
        self.inner.ensure_idle("set the scene")?;
        self.inner.config.lock().scene = Some(scene.into());
        Ok(())
    }

    /// Replace the settings. A live session keeps the copy it started with.
    pub fn set_settings(&self, settings: RenderSettings) {
        self.inner.config.lock().settings = settings;
    }

    pub fn settings(&self) -> RenderSettings {
        self.inner.config.lock().settings.clone()
    }

    /// Use a custom pixel worker instead of the one selected by the
    /// settings' render method. `None` restores the default.
    pub fn set_pixel_worker(&self, pixel_worker: Option<Arc<dyn PixelWorker>>) {
        self.inner.config.lock().pixel_worker = pixel_worker;
    }

    /// Start a session: build the profile and BVH, lay out the tiles and
    /// hand one tile to each worker.
    ///
    /// Configuration errors leave the engine in `Waiting`.
    pub fn begin(&self) -> Result<(), RenderError> {
        let inner = &self.inner;

        let (buffer, scene, settings, pixel_worker) = {
            let _session = inner.session.lock();
            let state = inner.state();
            if state != State::Waiting {
                return Err(RenderError::InvalidState {
                    operation: "begin",
                    state,
                });
            }

            let config = inner.config.lock();
            let buffer = config.buffer.clone().ok_or(RenderError::MissingBuffer)?;
            let scene = config.scene.clone().ok_or(RenderError::MissingScene)?;
            config.settings.validate()?;
            if scene.camera().is_none() {
                return Err(RenderError::MissingCamera);
            }

            let settings = config.settings.clone();
            let pixel_worker = config
                .pixel_worker
                .clone()
                .unwrap_or_else(|| settings.method.create_worker());

            inner.finished.reset();
            inner.set_state(State::Initialization);
            (buffer, scene, settings, pixel_worker)
        };

        // The BVH build runs outside the lock; `Initialization` keeps every
        // other operation out in the meantime
        match self.initialize(buffer, &scene, &settings, pixel_worker) {
            Ok(()) => Ok(()),
            Err(err) => {
                log::warn!("render session failed to start: {err}");
                let _session = inner.session.lock();
                inner.set_state(State::Waiting);
                inner.finished.set();
                Err(err)
            }
        }
    }

    fn initialize(
        &self,
        buffer: Arc<RenderBuffer>,
        scene: &Scene,
        settings: &RenderSettings,
        pixel_worker: Arc<dyn PixelWorker>,
    ) -> Result<(), RenderError> {
        let inner = &self.inner;

        let profile = Arc::new(RenderProfile::new(scene, settings)?);
        pixel_worker.assign_profile(&profile);

        let size = buffer.size();
        let tile_size = profile.tile_size;
        let tiles = spiral_tiles(size, tile_size);
        let statuses = tiles
            .iter()
            .map(|&position| (position / tile_size, TileStatus::new(position)))
            .collect();

        buffer.clear();

        let context = Arc::new(TileContext {
            offsets: profile.sample_offsets().into(),
            profile: profile.clone(),
            buffer,
            pixel_worker,
        });

        let callback = inner.tile_callback();
        let workers = (0..profile.worker_size as usize)
            .map(|index| TileWorker::spawn(index, context.clone(), callback.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let mut session = inner.session.lock();
        *session = Session {
            profile: Some(profile),
            workers,
            tiles,
            statuses,
            grid: tile_grid(size, tile_size),
            tile_size,
            ..Default::default()
        };

        inner.dispatched.store(0, Ordering::Release);
        inner.completed.store(0, Ordering::Release);
        inner.total.store(session.tiles.len(), Ordering::Release);

        log::info!(
            "render session started: {}x{} pixels, {} tiles of {tile_size}, {} workers",
            size.x,
            size.y,
            session.tiles.len(),
            session.workers.len(),
        );

        inner.clock.restart();
        inner.set_state(State::Rendering);
        for index in 0..session.workers.len() {
            inner.dispatch(&mut session, index);
        }

        Ok(())
    }

    /// Stop handing out tiles. In-flight tiles still finish.
    pub fn pause(&self) -> Result<(), RenderError> {
        let inner = &self.inner;
        let session = inner.session.lock();
        let state = inner.state();
        if state != State::Rendering {
            return Err(RenderError::InvalidState {
                operation: "pause",
                state,
            });
        }

        inner.set_state(State::Paused);
        if !session.workers.iter().any(TileWorker::is_working) {
            inner.clock.stop();
        }
        log::info!("render paused");
        Ok(())
    }

    /// Continue a paused session, giving every idle worker a new tile.
    pub fn resume(&self) -> Result<(), RenderError> {
        let inner = &self.inner;
        let mut session = inner.session.lock();
        let state = inner.state();
        if state != State::Paused {
            return Err(RenderError::InvalidState {
                operation: "resume",
                state,
            });
        }

        inner.set_state(State::Rendering);
        inner.clock.start();
        for index in 0..session.workers.len() {
            if !session.workers[index].is_working() {
                inner.dispatch(&mut session, index);
            }
        }
        log::info!("render resumed");
        Ok(())
    }

    /// Cancel the session. Workers stop at their next sample.
    pub fn abort(&self) -> Result<(), RenderError> {
        let inner = &self.inner;
        let session = inner.session.lock();
        let state = inner.state();
        if !state.is_active() {
            return Err(RenderError::InvalidState {
                operation: "abort",
                state,
            });
        }

        inner.abort_locked(&session);
        Ok(())
    }

    /// Tear down the session and return to `Waiting`.
    ///
    /// A live session is aborted first. Worker threads are joined before
    /// this returns.
    pub fn reset(&self) -> Result<(), RenderError> {
        let inner = &self.inner;
        let session = {
            let mut session = inner.session.lock();
            let state = inner.state();
            match state {
                State::Waiting => return Ok(()),
                State::Initialization => {
                    return Err(RenderError::InvalidState {
                        operation: "reset",
                        state,
                    })
                }
                State::Rendering | State::Paused => inner.abort_locked(&session),
                State::Completed | State::Aborted => {}
            }

            inner.dispatched.store(0, Ordering::Release);
            inner.completed.store(0, Ordering::Release);
            inner.total.store(0, Ordering::Release);
            inner.clock.reset();
            std::mem::take(&mut *session)
        };

        // Joining waits for callbacks that need the session lock
        drop(session);

        let _session = inner.session.lock();
        inner.set_state(State::Waiting);
        log::info!("render engine reset");
        Ok(())
    }

    /// Block until the session completes or aborts.
    ///
    /// Returns the terminal state, or the worker fault that ended the
    /// session.
    pub fn wait_for_render(&self) -> Result<State, RenderError> {
        let state = self.state();
        if state == State::Waiting {
            return Err(RenderError::InvalidState {
                operation: "wait for render",
                state,
            });
        }

        self.inner.finished.wait();
        self.outcome()
    }

    /// Like [`wait_for_render`](Self::wait_for_render) but gives up after
    /// `timeout`, returning the state at that point.
    pub fn wait_for_render_timeout(&self, timeout: Duration) -> Result<State, RenderError> {
        let state = self.state();
        if state == State::Waiting {
            return Err(RenderError::InvalidState {
                operation: "wait for render",
                state,
            });
        }

        self.inner.finished.wait_timeout(timeout);
        self.outcome()
    }

    fn outcome(&self) -> Result<State, RenderError> {
        let session = self.inner.session.lock();
        match &session.fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(self.state()),
        }
    }

    pub fn state(&self) -> State {
        self.inner.state()
    }

    /// Render time of the current session, excluding drained pauses.
    pub fn elapsed(&self) -> Duration {
        self.inner.clock.elapsed()
    }

    pub fn dispatched_tile_count(&self) -> usize {
        self.inner.dispatched.load(Ordering::Acquire)
    }

    pub fn completed_tile_count(&self) -> usize {
        self.inner.completed.load(Ordering::Acquire)
    }

    pub fn total_tile_count(&self) -> usize {
        self.inner.total.load(Ordering::Acquire)
    }

    /// Tile grid dimensions of the current session.
    pub fn total_tile_size(&self) -> UVec2 {
        self.inner.session.lock().grid
    }

    /// Samples rendered so far, including tiles still in flight.
    pub fn completed_sample(&self) -> u64 {
        let session = self.inner.session.lock();
        session.completed_sample
            + session
                .workers
                .iter()
                .map(TileWorker::completed_sample)
                .sum::<u64>()
    }

    /// Pixels written so far, including tiles still in flight.
    pub fn completed_pixel(&self) -> u64 {
        let session = self.inner.session.lock();
        session.completed_pixel
            + session
                .workers
                .iter()
                .map(TileWorker::completed_pixel)
                .sum::<u64>()
    }

    /// The profile of the current session, if one has begun.
    pub fn profile(&self) -> Option<Arc<RenderProfile>> {
        self.inner.session.lock().profile.clone()
    }

    /// The worker a tile was dispatched to, and whether the tile is done.
    ///
    /// `tile` is in tile space (pixel position / tile size).
    pub fn worker_for_tile(&self, tile: UVec2) -> Result<(Option<usize>, bool), RenderError> {
        let session = self.inner.session.lock();
        session
            .statuses
            .get(&tile)
            .map(|status| (status.worker, status.completed))
            .ok_or(RenderError::TileOutOfRange {
                tile,
                grid: session.grid,
            })
    }
}

impl Default for RenderEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RenderEngine {
    fn drop(&mut self) {
        let inner = &self.inner;
        let session = {
            let mut session = inner.session.lock();
            if inner.state().is_active() {
                inner.abort_locked(&session);
            }
            std::mem::take(&mut *session)
        };
        drop(session);
    }
}

impl EngineInner {
    fn state(&self) -> State {
        State::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: State) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn ensure_idle(&self, operation: &'static str) -> Result<(), RenderError> {
        let state = self.state();
        if state == State::Waiting || state.is_terminal() {
            Ok(())
        } else {
            Err(RenderError::InvalidState { operation, state })
        }
    }

    fn tile_callback(self: &Arc<Self>) -> TileCallback {
        let engine: Weak<EngineInner> = Arc::downgrade(self);
        Arc::new(move |worker, event| {
            if let Some(engine) = engine.upgrade() {
                engine.on_tile_event(worker, event);
            }
        })
    }

    /// Hand the next undispatched tile to `worker`. Returns false when every
    /// tile has been dispatched.
    fn dispatch(&self, session: &mut Session, worker: usize) -> bool {
        let cursor = self.dispatched.load(Ordering::Acquire);
        let Some(&position) = session.tiles.get(cursor) else {
            return false;
        };

        let tile = position / session.tile_size;
        if let Some(status) = session.statuses.get_mut(&tile) {
            status.worker = Some(worker);
        }
        self.dispatched.store(cursor + 1, Ordering::Release);

        log::debug!("dispatching tile {tile} to worker {worker}");
        session.workers[worker].dispatch(position);
        true
    }

    fn on_tile_event(&self, worker: usize, event: TileEvent) {
        let mut session = self.session.lock();

        // Late events from a session that already ended
        if !self.state().is_active() || worker >= session.workers.len() {
            return;
        }

        match event {
            TileEvent::Completed(report) => self.complete_tile(&mut session, worker, report),
            TileEvent::Faulted(message) => {
                let offset = session.workers[worker].offset();
                log::warn!("tile worker {worker} failed on tile at {offset}: {message}");
                session.fault = Some(RenderError::WorkerFault { worker, message });
                self.abort_locked(&session);
            }
        }
    }

    fn complete_tile(&self, session: &mut Session, worker: usize, report: TileReport) {
        session.workers[worker].finish();
        session.completed_sample += report.sample;
        session.completed_pixel += report.pixel;

        let tile = report.offset / session.tile_size;
        if let Some(status) = session.statuses.get_mut(&tile) {
            status.completed = true;
        }

        let completed = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!("worker {worker} completed tile {tile} ({completed}/{})", session.tiles.len());

        if completed == session.tiles.len() {
            self.clock.stop();
            self.set_state(State::Completed);
            self.finished.set();
            log::info!(
                "render completed in {:.2?}: {} samples",
                self.clock.elapsed(),
                session.completed_sample,
            );
            return;
        }

        match self.state() {
            State::Rendering => {
                self.dispatch(session, worker);
            }
            State::Paused => {
                if !session.workers.iter().any(TileWorker::is_working) {
                    self.clock.stop();
                }
            }
            _ => {}
        }
    }

    fn abort_locked(&self, session: &Session) {
        for worker in &session.workers {
            worker.abort();
        }
        self.clock.stop();
        self.set_state(State::Aborted);
        self.finished.set();
        log::warn!(
            "render aborted after {}/{} tiles",
            self.completed.load(Ordering::Acquire),
            session.tiles.len(),
        );
    }
}
