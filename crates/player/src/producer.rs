//! Async decode producer: the background lane of the pipeline.
//!
//! One worker thread pulls frames from the shared [`FrameSource`] and
//! pushes them into the bounded queue; the queue's blocking `push` is the
//! backpressure that bounds decoder memory. Cancellation is cooperative:
//! the loop polls an atomic stop flag and the queue stop wakes it out of a
//! blocked push. Decode errors end the stream rather than crash playback,
//! and end of stream stops the queue so the consumer observes it naturally.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use kino_common::{FrameSource, PlayerError, TimeCode};

use crate::frame_queue::FrameQueue;

/// Sentinel for "no seek target pending".
const NO_SEEK_TARGET: i64 = -1;

/// Flags shared between the facade and the worker thread.
struct Shared {
    stop: AtomicBool,
    running: AtomicBool,
    /// Pending seek target in microseconds, [`NO_SEEK_TARGET`] when none.
    seek_target_us: AtomicI64,
}

/// Owns the decode worker thread and its shared control flags.
pub struct DecodeProducer<S: FrameSource + Send + 'static> {
    source: Arc<Mutex<S>>,
    queue: Arc<FrameQueue>,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl<S: FrameSource + Send + 'static> DecodeProducer<S> {
    pub fn new(source: Arc<Mutex<S>>, queue: Arc<FrameQueue>) -> Self {
        Self {
            source,
            queue,
            shared: Arc::new(Shared {
                stop: AtomicBool::new(false),
                running: AtomicBool::new(false),
                seek_target_us: AtomicI64::new(NO_SEEK_TARGET),
            }),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Frames with PTS strictly below this target (in microseconds) are
    /// dropped until the first frame at or past it arrives.
    pub fn set_seek_target(&self, seconds: f64) {
        let micros = TimeCode::from_secs(seconds).as_micros();
        self.shared
            .seek_target_us
            .store(micros.max(0), Ordering::Release);
    }

    pub fn clear_seek_target(&self) {
        self.shared
            .seek_target_us
            .store(NO_SEEK_TARGET, Ordering::Release);
    }

    /// Spawn the decode loop. No-op when already running.
    pub fn start(&mut self) -> Result<(), PlayerError> {
        if self.is_running() {
            return Ok(());
        }
        // Reap a previously finished worker before reuse.
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }

        self.queue.reset();
        self.shared.stop.store(false, Ordering::Release);
        self.shared.running.store(true, Ordering::Release);

        let source = Arc::clone(&self.source);
        let queue = Arc::clone(&self.queue);
        let shared = Arc::clone(&self.shared);
        match thread::Builder::new()
            .name("kino-decode".into())
            .spawn(move || decode_loop(source, queue, shared))
        {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                Err(PlayerError::ThreadSpawn(e))
            }
        }
    }

    /// Stop the worker and clear the queue. Idempotent; safe when the
    /// worker never started or already finished.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        // Wakes a push blocked on a full queue.
        self.queue.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.queue.reset();
        self.shared.stop.store(false, Ordering::Release);
        self.shared.running.store(false, Ordering::Release);
    }
}

impl<S: FrameSource + Send + 'static> Drop for DecodeProducer<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn decode_loop<S: FrameSource>(
    source: Arc<Mutex<S>>,
    queue: Arc<FrameQueue>,
    shared: Arc<Shared>,
) {
    let mut zero_copy = source.lock().prefers_zero_copy();
    debug!(zero_copy, "decode loop started");

    loop {
        if shared.stop.load(Ordering::Acquire) {
            break;
        }

        let frame = match source.lock().decode_next(!zero_copy) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("end of stream");
                break;
            }
            Err(e) => {
                // Errors end the stream; playback shows what it has.
                error!(error = %e, "decode failed, ending stream");
                break;
            }
        };

        let target = shared.seek_target_us.load(Ordering::Acquire);
        if target != NO_SEEK_TARGET {
            if frame.pts_micros() < target {
                continue;
            }
            shared.seek_target_us.store(NO_SEEK_TARGET, Ordering::Release);
            debug!(pts = frame.pts_seconds, "seek target reached");
        }

        if zero_copy && !frame.has_valid_surface() {
            warn!("frame arrived without usable GPU surface, switching to copy path");
            zero_copy = false;
        }

        if !queue.push(frame) {
            break;
        }
    }

    queue.stop();
    shared.running.store(false, Ordering::Release);
}

// ── Tests ────────────────────────────────────────────────────────────
