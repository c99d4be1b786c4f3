//! Player facade: advance/seek/pause over the decode pipeline.
//!
//! `VideoPlayer` owns the queue, the producer and the pacing clock. The
//! render thread calls [`advance_playback`](VideoPlayer::advance_playback)
//! once per frame; it never blocks, holds early frames back, and drops
//! late ones (bounded by queue depth) to catch up after stalls. Seeks stop
//! the producer, reposition the source, arm the producer's seek-drop
//! filter and restart; a failed seek restores the prior running state.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use kino_common::{
    DecodedFrame, DecoderOptions, FrameSink, FrameSource, PlaybackTuning, PlayerError,
    VulkanSurface,
};
use kino_decoder::{DecodeSession, VulkanInteropContext};

use crate::clock::{FrameDecision, PlaybackClock};
use crate::frame_queue::FrameQueue;
use crate::producer::DecodeProducer;

/// Playback facade over a frame source and a presentation sink.
pub struct VideoPlayer<S: FrameSource + Send + 'static> {
    source: Arc<Mutex<S>>,
    queue: Arc<FrameQueue>,
    producer: DecodeProducer<S>,
    clock: PlaybackClock,
    sink: Box<dyn FrameSink>,
    /// Frame popped early and held until its display window opens.
    candidate: Option<DecodedFrame>,
    current_surface: Option<VulkanSurface>,
    playing: bool,
    last_displayed: f64,
}

impl VideoPlayer<DecodeSession> {
    /// Open `path` with the FFmpeg-backed session and wrap it in a player.
    pub fn open(
        path: impl AsRef<Path>,
        options: DecoderOptions,
        interop: Option<VulkanInteropContext>,
        sink: Box<dyn FrameSink>,
        tuning: PlaybackTuning,
    ) -> Result<Self, PlayerError> {
        let session = DecodeSession::open(path, options, interop)?;
        Ok(Self::new(session, sink, tuning))
    }

    /// Why the session decodes in software although Vulkan was requested.
    pub fn hardware_init_failure(&self) -> Option<String> {
        self.source
            .lock()
            .hardware_init_failure()
            .map(str::to_owned)
    }
}

impl<S: FrameSource + Send + 'static> VideoPlayer<S> {
    pub fn new(source: S, sink: Box<dyn FrameSink>, tuning: PlaybackTuning) -> Self {
        let source = Arc::new(Mutex::new(source));
        let queue = Arc::new(FrameQueue::new(tuning.max_buffered_frames));
        let producer = DecodeProducer::new(Arc::clone(&source), Arc::clone(&queue));
        Self {
            source,
            queue,
            producer,
            clock: PlaybackClock::new(tuning),
            sink,
            candidate: None,
            current_surface: None,
            playing: false,
            last_displayed: 0.0,
        }
    }

    /// Start background decoding. No-op when already running.
    pub fn start_async_decoding(&mut self) -> Result<(), PlayerError> {
        self.producer.start()
    }

    /// Stop background decoding, clear the queue and drop any held-back
    /// frame. Idempotent.
    pub fn stop_async_decoding(&mut self) {
        self.producer.stop();
        self.candidate = None;
    }

    pub fn set_playing(&mut self, playing: bool) {
        if playing && !self.playing {
            // Paused wall time must not count as lag; the next displayed
            // frame re-anchors and reporting continues from where we were.
            self.clock.reset();
        }
        self.playing = playing;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Advance playback and return the current display time in seconds.
    ///
    /// Call once per render tick. Returns are non-negative and, absent a
    /// seek, non-decreasing while playing.
    pub fn advance_playback(&mut self) -> f64 {
        self.advance_at(Instant::now())
    }

    fn advance_at(&mut self, now: Instant) -> f64 {
        if !self.playing {
            return self.last_displayed;
        }

        let mut candidate = match self.candidate.take().or_else(|| self.queue.try_pop()) {
            Some(frame) => frame,
            None => return self.last_displayed,
        };

        if !self.clock.is_anchored() {
            self.clock
                .set_anchor(candidate.pts_seconds, now, self.last_displayed);
        }

        if self.clock.decision(candidate.pts_seconds, now) == FrameDecision::Late {
            // Behind the wall clock: discard frames whose display window
            // already passed, keeping at most the first future one. The
            // loop never blocks and is bounded by the queue depth.
            let mut dropped = 0usize;
            while self.clock.target_passed(candidate.pts_seconds, now) {
                match self.queue.try_pop() {
                    Some(next) => {
                        dropped += 1;
                        candidate = next;
                    }
                    None => break,
                }
            }
            if dropped > 0 {
                debug!(dropped, pts = candidate.pts_seconds, "catching up");
            }
        }

        if self.clock.decision(candidate.pts_seconds, now) == FrameDecision::NotYet {
            self.candidate = Some(candidate);
            return self.last_displayed;
        }

        match self.sink.present(&candidate) {
            Ok(()) => self.current_surface = candidate.gpu_surface().copied(),
            // Previous views stay bound; the timeline still advances so a
            // wedged frame cannot freeze reported time.
            Err(e) => warn!(error = %e, "frame hand-off failed, keeping previous image"),
        }

        self.last_displayed = self
            .clock
            .display_seconds(candidate.pts_seconds)
            .max(self.last_displayed);
        self.last_displayed
    }

    /// Seek to `seconds` (clamped to the stream duration).
    ///
    /// On failure the previous running state is restored and the error
    /// propagated; playback continues from where it was.
    pub fn seek(&mut self, seconds: f64) -> Result<(), PlayerError> {
        let duration = self.source.lock().stream_info().duration_seconds;
        let target = if duration > 0.0 {
            seconds.clamp(0.0, duration)
        } else {
            seconds.max(0.0)
        };

        let was_running = self.producer.is_running();
        self.producer.stop();
        self.candidate = None;
        self.producer.set_seek_target(target);

        if let Err(e) = self.source.lock().seek_to(target) {
            self.producer.clear_seek_target();
            if was_running {
                self.producer.start()?;
            }
            warn!(target, error = %e, "seek failed, resuming previous state");
            return Err(e.into());
        }

        self.clock.reset();
        self.last_displayed = target;
        if was_running {
            self.producer.start()?;
        }
        info!(target, "seek complete");
        Ok(())
    }

    // ── stream queries ───────────────────────────────────────────

    pub fn width(&self) -> u32 {
        self.source.lock().stream_info().width()
    }

    pub fn height(&self) -> u32 {
        self.source.lock().stream_info().height()
    }

    pub fn frame_rate(&self) -> f64 {
        self.source.lock().stream_info().frame_rate
    }

    pub fn duration_seconds(&self) -> f64 {
        self.source.lock().stream_info().duration_seconds
    }

    /// Surface of the currently displayed frame, when it came from the
    /// zero-copy path.
    ///
    /// When a hand-off fails the previous surface stays latched while the
    /// reported display time keeps advancing, so on degraded ticks this
    /// surface may lag [`advance_playback`](Self::advance_playback).
    pub fn current_surface(&self) -> Option<VulkanSurface> {
        self.current_surface
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ash::vk::{self, Handle};
    use kino_common::{
        DecodeError, FrameFormat, FramePayload, HandoffError, PixelFormat, Resolution,
        StreamInfo,
    };

    fn info() -> StreamInfo {
        StreamInfo {
            resolution: Resolution::new(64, 64),
            frame_rate: 30.0,
            duration_seconds: 10.0,
            pixel_format: PixelFormat::Nv12,
        }
    }

    fn test_format() -> FrameFormat {
        FrameFormat::for_pixel_format(PixelFormat::Nv12, Resolution::new(64, 64)).unwrap()
    }

    fn cpu_frame(pts: f64) -> DecodedFrame {
        let format = test_format();
        DecodedFrame {
            pts_seconds: pts,
            format,
            payload: FramePayload::Cpu(vec![0; format.buffer_size]),
        }
    }

    fn gpu_frame(pts: f64) -> DecodedFrame {
        let surface = VulkanSurface {
            planes: 1,
            images: [vk::Image::from_raw(0xbeef), vk::Image::null()],
            resolution: Resolution::new(64, 64),
            ..Default::default()
        };
        DecodedFrame {
            pts_seconds: pts,
            format: test_format(),
            payload: FramePayload::Gpu(surface),
        }
    }

    /// Source that never produces; tests feed the queue directly.
    struct IdleSource;

    impl FrameSource for IdleSource {
        fn decode_next(&mut self, _copy: bool) -> Result<Option<DecodedFrame>, DecodeError> {
            Ok(None)
        }
        fn seek_to(&mut self, _seconds: f64) -> Result<(), DecodeError> {
            Ok(())
        }
        fn stream_info(&self) -> StreamInfo {
            info()
        }
    }

    /// Source generating frames at 30 fps forever; seek repositions (or
    /// fails when scripted to).
    struct EndlessSource {
        pts: f64,
        seek_fails: bool,
    }

    impl FrameSource for EndlessSource {
        fn decode_next(&mut self, _copy: bool) -> Result<Option<DecodedFrame>, DecodeError> {
            let frame = cpu_frame(self.pts);
            self.pts += 1.0 / 30.0;
            Ok(Some(frame))
        }
        fn seek_to(&mut self, seconds: f64) -> Result<(), DecodeError> {
            if self.seek_fails {
                return Err(DecodeError::Seek("scripted seek failure".into()));
            }
            self.pts = seconds;
            Ok(())
        }
        fn stream_info(&self) -> StreamInfo {
            info()
        }
    }

    struct RecordingSink {
        presented: Arc<Mutex<Vec<f64>>>,
        fail: bool,
    }

    impl FrameSink for RecordingSink {
        fn present(&mut self, frame: &DecodedFrame) -> Result<(), HandoffError> {
            if self.fail {
                return Err(HandoffError::InvalidSurface("scripted".into()));
            }
            self.presented.lock().push(frame.pts_seconds);
            Ok(())
        }
    }

    fn player_with_sink(
        fail: bool,
    ) -> (VideoPlayer<IdleSource>, Arc<Mutex<Vec<f64>>>) {
        let presented = Arc::new(Mutex::new(Vec::new()));
        let sink = RecordingSink {
            presented: Arc::clone(&presented),
            fail,
        };
        (
            VideoPlayer::new(IdleSource, Box::new(sink), PlaybackTuning::default()),
            presented,
        )
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    // ── advance_playback ─────────────────────────────────────────

    #[test]
    fn paused_player_does_not_advance() {
        let (mut p, presented) = player_with_sink(false);
        assert!(p.queue.push(cpu_frame(0.0)));
        assert_eq!(p.advance_at(Instant::now()), 0.0);
        assert!(presented.lock().is_empty());
        assert_eq!(p.queue.len(), 1);
    }

    #[test]
    fn empty_queue_returns_unchanged() {
        let (mut p, _) = player_with_sink(false);
        p.set_playing(true);
        assert_eq!(p.advance_at(Instant::now()), 0.0);
    }

    #[test]
    fn due_frame_displays_and_latches_surface() {
        let (mut p, presented) = player_with_sink(false);
        p.set_playing(true);
        assert!(p.queue.push(gpu_frame(1.0)));
        let shown = p.advance_at(Instant::now());
        assert_eq!(shown, 0.0); // first frame anchors the timeline
        assert_eq!(presented.lock().as_slice(), &[1.0]);
        assert!(p.current_surface().is_some());
    }

    #[test]
    fn early_frame_held_back() {
        let (mut p, presented) = player_with_sink(false);
        p.set_playing(true);
        let t0 = Instant::now();
        assert!(p.queue.push(cpu_frame(0.0)));
        p.advance_at(t0);
        assert!(p.queue.push(cpu_frame(0.1)));

        // Target is 100ms out; 10ms in, nothing new displays.
        let shown = p.advance_at(t0 + ms(10));
        assert_eq!(presented.lock().len(), 1);
        assert!(p.candidate.is_some());

        // Window opens within the 1ms tolerance of the target.
        let later = p.advance_at(t0 + ms(100));
        assert!(later >= shown);
        assert_eq!(presented.lock().len(), 2);
    }

    #[test]
    fn late_frames_dropped_to_catch_up() {
        let (mut p, presented) = player_with_sink(false);
        p.set_playing(true);
        let t0 = Instant::now();
        assert!(p.queue.push(cpu_frame(0.0)));
        p.advance_at(t0);
        for pts in [0.01, 0.02, 0.03, 0.04] {
            assert!(p.queue.push(cpu_frame(pts)));
        }

        // 100ms behind: everything up to the newest frame is stale.
        let shown = p.advance_at(t0 + ms(100));
        assert_eq!(presented.lock().as_slice(), &[0.0, 0.04]);
        assert!((shown - 0.04).abs() < 1e-9);
        assert!(p.queue.is_empty());
    }

    #[test]
    fn display_time_is_monotonic() {
        let (mut p, _) = player_with_sink(false);
        p.set_playing(true);
        let t0 = Instant::now();
        let mut reported = Vec::new();
        for i in 0..6 {
            assert!(p.queue.push(cpu_frame(i as f64 * 0.01)));
            reported.push(p.advance_at(t0 + ms(i * 10)));
        }
        for pair in reported.windows(2) {
            assert!(pair[1] >= pair[0], "display time went backwards: {reported:?}");
        }
        assert!(reported.iter().all(|t| *t >= 0.0));
    }

    #[test]
    fn resume_after_pause_never_jumps_back() {
        let (mut p, _) = player_with_sink(false);
        p.set_playing(true);
        let t0 = Instant::now();
        assert!(p.queue.push(cpu_frame(0.0)));
        let before_pause = p.advance_at(t0);

        p.set_playing(false);
        assert_eq!(p.advance_at(t0 + ms(2000)), before_pause);

        p.set_playing(true);
        assert!(p.queue.push(cpu_frame(1.0 / 30.0)));
        // Two seconds of pause do not register as lag or rewind time.
        let after_resume = p.advance_at(t0 + ms(2000));
        assert!(after_resume >= before_pause);
    }

    #[test]
    fn sink_failure_keeps_previous_surface_but_advances() {
        let (mut p, presented) = player_with_sink(true);
        p.set_playing(true);
        let t0 = Instant::now();
        assert!(p.queue.push(gpu_frame(0.5)));
        assert!(p.queue.push(gpu_frame(0.5 + 1.0 / 30.0)));

        p.advance_at(t0);
        assert!(p.current_surface().is_none());
        assert!(presented.lock().is_empty());

        let shown = p.advance_at(t0 + ms(34));
        assert!(shown > 0.0, "timeline must advance past a wedged frame");
    }

    #[test]
    fn stop_async_decoding_drops_candidate() {
        let (mut p, _) = player_with_sink(false);
        p.set_playing(true);
        let t0 = Instant::now();
        assert!(p.queue.push(cpu_frame(0.0)));
        p.advance_at(t0);
        assert!(p.queue.push(cpu_frame(5.0)));
        p.advance_at(t0 + ms(1)); // far-future frame becomes the candidate
        assert!(p.candidate.is_some());

        p.stop_async_decoding();
        p.stop_async_decoding();
        assert!(p.candidate.is_none());
        assert!(p.queue.is_empty());
    }

    // ── seek ─────────────────────────────────────────────────────

    fn endless_player(seek_fails: bool) -> VideoPlayer<EndlessSource> {
        let presented = Arc::new(Mutex::new(Vec::new()));
        VideoPlayer::new(
            EndlessSource { pts: 0.0, seek_fails },
            Box::new(RecordingSink { presented, fail: false }),
            PlaybackTuning::default(),
        )
    }

    #[test]
    fn seek_repositions_and_restarts_producer() {
        let mut p = endless_player(false);
        p.start_async_decoding().unwrap();
        std::thread::sleep(ms(20));
        assert!(p.producer.is_running());

        p.seek(5.0).unwrap();
        assert!(p.producer.is_running());
        // Paused, the player reports the seek target.
        assert_eq!(p.advance_at(Instant::now()), 5.0);

        // First frame out of the seek is at or past the target.
        let mut first = None;
        for _ in 0..200 {
            if let Some(frame) = p.queue.try_pop() {
                first = Some(frame);
                break;
            }
            std::thread::sleep(ms(2));
        }
        assert!(first.expect("producer produced no frame").pts_seconds >= 5.0);
        p.stop_async_decoding();
    }

    #[test]
    fn seek_clamps_to_duration() {
        let mut p = endless_player(false);
        p.seek(50.0).unwrap();
        assert_eq!(p.last_displayed, 10.0);
        p.seek(-3.0).unwrap();
        assert_eq!(p.last_displayed, 0.0);
    }

    #[test]
    fn failed_seek_restores_running_state() {
        let mut p = endless_player(true);
        p.start_async_decoding().unwrap();
        std::thread::sleep(ms(20));
        let before = p.last_displayed;

        assert!(p.seek(5.0).is_err());
        assert!(p.producer.is_running(), "producer must be restarted");
        assert_eq!(p.last_displayed, before);
        p.stop_async_decoding();
    }

    #[test]
    fn failed_seek_when_stopped_stays_stopped() {
        let mut p = endless_player(true);
        assert!(p.seek(2.0).is_err());
        assert!(!p.producer.is_running());
    }
}
