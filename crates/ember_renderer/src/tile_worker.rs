//! Dedicated worker threads that render one tile at a time.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ember_math::{UVec2, Vec2};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::accumulator::PixelAccumulator;
use crate::buffer::RenderBuffer;
use crate::error::RenderError;
use crate::gen_f32;
use crate::pixel::PixelWorker;
use crate::profile::RenderProfile;
use crate::tile::tile_extent;

/// Everything a tile worker reads during one session.
pub(crate) struct TileContext {
    pub profile: Arc<RenderProfile>,
    pub buffer: Arc<RenderBuffer>,
    pub pixel_worker: Arc<dyn PixelWorker>,
    /// Base sub-pixel offsets, shared by every pixel
    pub offsets: Arc<[Vec2]>,
}

/// Totals of one finished tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TileReport {
    pub offset: UVec2,
    pub sample: u64,
    pub pixel: u64,
}

pub(crate) enum TileEvent {
    Completed(TileReport),
    /// The pixel worker panicked; carries the panic message.
    Faulted(String),
}

pub(crate) type TileCallback = Arc<dyn Fn(usize, TileEvent) + Send + Sync>;

enum Command {
    Render(UVec2),
    Shutdown,
}

#[derive(Default)]
struct WorkerShared {
    working: AtomicBool,
    aborted: AtomicBool,
    offset: Mutex<UVec2>,
    completed_sample: AtomicU64,
    completed_pixel: AtomicU64,
}

/// Handle to one tile worker thread.
///
/// The thread waits for `dispatch` commands and renders the requested tile
/// with the session's pixel worker. Dropping the handle shuts the thread
/// down and joins it.
pub(crate) struct TileWorker {
    index: usize,
    shared: Arc<WorkerShared>,
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl TileWorker {
    pub fn spawn(
        index: usize,
        context: Arc<TileContext>,
        callback: TileCallback,
    ) -> Result<Self, RenderError> {
        let shared = Arc::new(WorkerShared::default());
        let (commands, receiver) = channel();

        let thread = {
            let shared = shared.clone();
            thread::Builder::new()
                .name(format!("ember-tile-{index}"))
                .spawn(move || worker_loop(index, context, shared, receiver, callback))
                .map_err(|err| RenderError::WorkerFault {
                    worker: index,
                    message: format!("failed to spawn thread: {err}"),
                })?
        };

        Ok(Self {
            index,
            shared,
            commands,
            thread: Some(thread),
        })
    }

    /// Start rendering the tile whose top-left pixel is `offset`.
    pub fn dispatch(&self, offset: UVec2) {
        *self.shared.offset.lock() = offset;
        self.shared.completed_sample.store(0, Ordering::Relaxed);
        self.shared.completed_pixel.store(0, Ordering::Relaxed);
        self.shared.aborted.store(false, Ordering::Release);
        self.shared.working.store(true, Ordering::Release);

        if self.commands.send(Command::Render(offset)).is_err() {
            log::warn!("tile worker {} is gone, tile {offset} dropped", self.index);
            self.shared.working.store(false, Ordering::Release);
        }
    }

    /// Ask the current tile to stop. Takes effect at the next sample.
    pub fn abort(&self) {
        self.shared.aborted.store(true, Ordering::Release);
    }

    /// Mark the reported tile as accounted for: the worker becomes idle and
    /// its progress counters drop to zero.
    pub fn finish(&self) {
        self.shared.working.store(false, Ordering::Release);
        self.shared.completed_sample.store(0, Ordering::Relaxed);
        self.shared.completed_pixel.store(0, Ordering::Relaxed);
    }

    pub fn is_working(&self) -> bool {
        self.shared.working.load(Ordering::Acquire)
    }

    /// Top-left pixel of the most recently dispatched tile.
    pub fn offset(&self) -> UVec2 {
        *self.shared.offset.lock()
    }

    /// Samples rendered so far in the current tile.
    pub fn completed_sample(&self) -> u64 {
        self.shared.completed_sample.load(Ordering::Relaxed)
    }

    /// Pixels written so far in the current tile.
    pub fn completed_pixel(&self) -> u64 {
        self.shared.completed_pixel.load(Ordering::Relaxed)
    }
}

impl Drop for TileWorker {
    fn drop(&mut self) {
        self.abort();
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            // Never join from inside the worker itself
            if thread.thread().id() != thread::current().id() {
                let _ = thread.join();
            }
        }
    }
}

/// Generator seed for the tile at `offset`.
///
/// Depends only on the session seed and the tile, never on which worker
/// picked the tile up, so a fixed seed always renders the same image.
fn tile_seed(seed: u64, offset: UVec2) -> u64 {
    let key = (u64::from(offset.x) << 32) | u64::from(offset.y);
    seed ^ key.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn worker_loop(
    index: usize,
    context: Arc<TileContext>,
    shared: Arc<WorkerShared>,
    commands: Receiver<Command>,
    callback: TileCallback,
) {
    // Reseeded at the start of every tile
    let mut rng = StdRng::seed_from_u64(context.profile.seed);

    while let Ok(command) = commands.recv() {
        let offset = match command {
            Command::Render(offset) => offset,
            Command::Shutdown => break,
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            render_tile(&context, &shared, offset, &mut rng)
        }));

        match result {
            Ok(true) => {
                let report = TileReport {
                    offset,
                    sample: shared.completed_sample.load(Ordering::Relaxed),
                    pixel: shared.completed_pixel.load(Ordering::Relaxed),
                };
                callback(index, TileEvent::Completed(report));
            }
            Ok(false) => {
                log::debug!("tile worker {index} aborted tile {offset}");
                shared.working.store(false, Ordering::Release);
            }
            Err(payload) => {
                shared.working.store(false, Ordering::Release);
                callback(index, TileEvent::Faulted(panic_message(payload.as_ref())));
            }
        }
    }
}

/// Render every pixel of the tile at `offset`. Returns false when aborted.
fn render_tile(
    context: &TileContext,
    shared: &WorkerShared,
    offset: UVec2,
    rng: &mut StdRng,
) -> bool {
    let profile = &context.profile;
    let buffer = &context.buffer;
    let extent = tile_extent(offset, profile.tile_size, buffer.size());
    *rng = StdRng::seed_from_u64(tile_seed(profile.seed, offset));

    let aborted = || shared.aborted.load(Ordering::Acquire);

    for y in 0..extent.y {
        for x in 0..extent.x {
            let position = offset + UVec2::new(x, y);
            let mut accumulator = PixelAccumulator::new();

            let sample = |sub_pixel: Vec2,
                          accumulator: &mut PixelAccumulator,
                          rng: &mut StdRng| {
                let screen_uv = buffer.to_screen_uv(position.as_vec2() + sub_pixel);
                let value = context.pixel_worker.render(profile, screen_uv, rng);
                if !accumulator.accumulate(value) {
                    log::warn!("rejected non-finite sample {value} at pixel {position}");
                }
                shared.completed_sample.fetch_add(1, Ordering::Relaxed);
            };

            for &sub_pixel in context.offsets.iter() {
                if aborted() {
                    return false;
                }
                sample(sub_pixel, &mut accumulator, rng);
            }

            let extra = (profile.adaptive_sample as f32 * accumulator.deviation()).ceil() as u32;
            for _ in 0..extra {
                if aborted() {
                    return false;
                }
                let sub_pixel = Vec2::new(gen_f32(rng), gen_f32(rng));
                sample(sub_pixel, &mut accumulator, rng);
            }

            // An abort between the last sample and here drops the pixel
            if aborted() {
                return false;
            }
            buffer.set(position, accumulator.average());
            shared.completed_pixel.fetch_add(1, Ordering::Relaxed);
        }
    }

    true
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
