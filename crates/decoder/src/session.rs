//! Single-file decode session: demux, decode, zero-copy hand-out.
//!
//! The session is a pull API: `decode_next` returns frames in presentation
//! order until end of stream (`Ok(None)`), driving an internal
//! read → drain → finished state machine. Transient decoder states
//! ("feed me more input") never escape; mid-stream resolution or pixel
//! format changes reconfigure the plane layout on the fly.

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::ffi;
use tracing::{debug, info, warn};

use kino_common::{
    BackendKind, DecodeError, DecodedFrame, DecoderOptions, FrameFormat, FramePayload,
    FrameSource, PixelFormat, Rational, Resolution, StreamInfo,
};

use crate::vulkan::{self, HwDeviceContext, VulkanInteropContext};

/// Where the session is in its packet/drain lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum DrainState {
    /// Packets are still being read from the container.
    Reading,
    /// Demux hit end of file; the decoder is flushing buffered frames.
    Draining,
    /// The decoder returned its last frame. Terminal.
    Finished,
}

/// Decode backend, fixed at construction.
enum Backend {
    Software,
    /// Keeps the hw-device ref alive for the decoder's lifetime.
    Vulkan { _hw: HwDeviceContext },
}

/// Demuxer plus opened video decoder for one input file.
pub struct DecodeSession {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    /// Seconds per stream timestamp tick.
    time_base: f64,
    info: StreamInfo,
    format: FrameFormat,
    backend: Backend,
    state: DrainState,
    /// PTS handed out for the previous frame, used when a frame carries no
    /// usable timestamp.
    fallback_pts: f64,
    frames_decoded: u64,
    hw_failure: Option<String>,
    options: DecoderOptions,
    /// Scratch frame for hardware-to-CPU transfers on the copy path.
    transfer_frame: ffmpeg::frame::Video,
}

// SAFETY: all FFmpeg contexts inside are only touched through &mut self;
// the pipeline serializes access behind a mutex.
unsafe impl Send for DecodeSession {}

impl DecodeSession {
    /// Open `path` and prepare the configured backend.
    ///
    /// A Vulkan backend that fails to initialize does not fail the open:
    /// the session falls back to software decoding and records the reason,
    /// retrievable via [`hardware_init_failure`](Self::hardware_init_failure).
    pub fn open(
        path: impl AsRef<Path>,
        options: DecoderOptions,
        interop: Option<VulkanInteropContext>,
    ) -> Result<Self, DecodeError> {
        ffmpeg::init().map_err(|e| DecodeError::Open(e.to_string()))?;

        let input = ffmpeg::format::input(&path.as_ref())
            .map_err(|e| DecodeError::Open(e.to_string()))?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or(DecodeError::NoVideoStream)?;
        let stream_index = stream.index();
        let time_base = f64::from(stream.time_base());

        let avg = stream.avg_frame_rate();
        let frame_rate = stream_frame_rate(Rational::new(avg.numerator(), avg.denominator()));
        let duration_seconds = if input.duration() > 0 {
            input.duration() as f64 / ffi::AV_TIME_BASE as f64
        } else {
            0.0
        };

        let (backend, hw_failure) = match (options.backend, interop.as_ref()) {
            (BackendKind::Vulkan, Some(ctx)) => match HwDeviceContext::new_vulkan(ctx) {
                Ok(hw) => (Backend::Vulkan { _hw: hw }, None),
                Err(DecodeError::HardwareInit { reason }) => {
                    warn!(%reason, "Vulkan decode unavailable, using software");
                    (Backend::Software, Some(reason))
                }
                Err(e) => return Err(e),
            },
            (BackendKind::Vulkan, None) => {
                let reason = "no Vulkan interop context supplied".to_string();
                warn!(%reason, "falling back to software decode");
                (Backend::Software, Some(reason))
            }
            (BackendKind::Software, _) => (Backend::Software, None),
        };

        let mut context =
            ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                .map_err(|_| DecodeError::CodecUnavailable)?;

        let threads = options
            .threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism().map_or(1, |n| n.get())
            });
        // SAFETY: the context was just allocated and is not opened yet;
        // these fields must be set before avcodec_open2.
        unsafe {
            let ptr = context.as_mut_ptr();
            (*ptr).thread_count = threads as i32;
            if let Backend::Vulkan { _hw } = &backend {
                (*ptr).hw_device_ctx = ffi::av_buffer_ref(_hw.as_ptr());
                (*ptr).get_format = Some(vulkan::select_vulkan_format);
                (*ptr).sw_pix_fmt = ffi::AVPixelFormat::AV_PIX_FMT_NV12;
            }
        }

        let decoder = context
            .decoder()
            .video()
            .map_err(|_| DecodeError::CodecUnavailable)?;

        let resolution = Resolution::new(decoder.width(), decoder.height());
        // Streams without a pix_fmt in their parameters report None here;
        // the first decoded frame reconfigures to the real layout.
        let pixel_format = match decoder.format() {
            ffmpeg::format::Pixel::None => PixelFormat::Nv12,
            other => map_pixel(other)?,
        };
        let format = FrameFormat::for_pixel_format(pixel_format, resolution)?;

        let info = StreamInfo {
            resolution,
            frame_rate,
            duration_seconds,
            pixel_format,
        };
        info!(
            path = %path.as_ref().display(),
            %resolution,
            frame_rate,
            duration_seconds,
            format = %pixel_format,
            hardware = matches!(backend, Backend::Vulkan { .. }),
            "decode session opened"
        );

        Ok(Self {
            input,
            decoder,
            stream_index,
            time_base,
            info,
            format,
            backend,
            state: DrainState::Reading,
            fallback_pts: 0.0,
            frames_decoded: 0,
            hw_failure,
            options,
            transfer_frame: ffmpeg::frame::Video::empty(),
        })
    }

    /// Why hardware init fell back to software, if it did.
    pub fn hardware_init_failure(&self) -> Option<&str> {
        self.hw_failure.as_deref()
    }

    pub fn frames_decoded(&self) -> u64 {
        self.frames_decoded
    }

    /// Decode the next frame in presentation order.
    ///
    /// `Ok(None)` means end of stream and is sticky. With `copy_to_cpu`
    /// false and an active Vulkan backend, hardware frames come out as
    /// zero-copy surfaces; everything else takes the packed-CPU path.
    pub fn decode_next(
        &mut self,
        copy_to_cpu: bool,
    ) -> Result<Option<DecodedFrame>, DecodeError> {
        loop {
            if self.state == DrainState::Finished {
                return Ok(None);
            }

            let mut frame = ffmpeg::frame::Video::empty();
            match self.decoder.receive_frame(&mut frame) {
                Ok(()) => return self.emit_frame(&frame, copy_to_cpu).map(Some),
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                    // Decoder wants more input before it can emit.
                    if self.state == DrainState::Draining {
                        self.state = DrainState::Finished;
                        return Ok(None);
                    }
                }
                Err(ffmpeg::Error::Eof) => {
                    debug!(frames = self.frames_decoded, "decoder drained");
                    self.state = DrainState::Finished;
                    return Ok(None);
                }
                Err(e) => return Err(DecodeError::Decode(e.to_string())),
            }

            self.feed_packet();
        }
    }

    /// Read one packet and hand it to the decoder; demux EOF (or a demux
    /// read error) starts the drain.
    fn feed_packet(&mut self) {
        let mut packet = ffmpeg::Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => {
                if packet.stream() == self.stream_index {
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        warn!(error = %e, "dropping undecodable packet");
                    }
                }
            }
            Err(e) => {
                if !matches!(e, ffmpeg::Error::Eof) {
                    warn!(error = %e, "demux read failed, draining decoder");
                }
                self.state = DrainState::Draining;
                let _ = self.decoder.send_eof();
            }
        }
    }

    fn emit_frame(
        &mut self,
        frame: &ffmpeg::frame::Video,
        copy_to_cpu: bool,
    ) -> Result<DecodedFrame, DecodeError> {
        let is_hw = frame.format() == ffmpeg::format::Pixel::VULKAN;
        let sw_pixel = if is_hw {
            // SAFETY: hardware frames always carry a hw-frames context.
            unsafe { hw_sw_format(frame.as_ptr()) }
        } else {
            frame.format()
        };
        let pixel_format = map_pixel(sw_pixel)?;
        let resolution = Resolution::new(frame.width(), frame.height());

        if self.format.needs_reconfigure(pixel_format, resolution) {
            self.format = FrameFormat::for_pixel_format(pixel_format, resolution)?;
            self.info.resolution = resolution;
            self.info.pixel_format = pixel_format;
            info!(format = %pixel_format, %resolution, "stream reconfigured");
        }

        let pts_seconds = next_pts(
            frame.timestamp(),
            self.time_base,
            self.fallback_pts,
            self.frames_decoded,
            self.info.frame_rate,
        );
        self.fallback_pts = pts_seconds;

        let payload = if is_hw && !copy_to_cpu {
            // SAFETY: frame is a live AV_PIX_FMT_VULKAN frame from our
            // decoder; the hw-frames context outlives this session's use.
            match unsafe { vulkan::surface_from_hw_frame(frame.as_ptr(), &self.format) } {
                Some(surface) => FramePayload::Gpu(surface),
                None => {
                    return Err(DecodeError::Decode(
                        "hardware frame missing Vulkan descriptor".into(),
                    ))
                }
            }
        } else {
            FramePayload::Cpu(self.pack_cpu(frame, is_hw)?)
        };

        self.frames_decoded += 1;
        Ok(DecodedFrame {
            pts_seconds,
            format: self.format,
            payload,
        })
    }

    /// Pack a frame into a tight CPU buffer, transferring from the GPU
    /// first when needed.
    fn pack_cpu(
        &mut self,
        frame: &ffmpeg::frame::Video,
        is_hw: bool,
    ) -> Result<Vec<u8>, DecodeError> {
        let source: &ffmpeg::frame::Video = if is_hw {
            // SAFETY: both frames are valid; the scratch frame is unref'd
            // first so transfer_data gets a clean destination to allocate.
            let ret = unsafe {
                ffi::av_frame_unref(self.transfer_frame.as_mut_ptr());
                ffi::av_hwframe_transfer_data(
                    self.transfer_frame.as_mut_ptr(),
                    frame.as_ptr(),
                    0,
                )
            };
            if ret < 0 {
                return Err(DecodeError::Decode(format!(
                    "GPU frame transfer failed: {}",
                    ffmpeg::Error::from(ret)
                )));
            }
            &self.transfer_frame
        } else {
            frame
        };

        let fmt = &self.format;
        let mut buffer = Vec::with_capacity(fmt.buffer_size);
        let luma_row = fmt.resolution.width as usize * fmt.bytes_per_component as usize;
        pack_plane(
            &mut buffer,
            source.data(0),
            source.stride(0),
            luma_row,
            fmt.resolution.height as usize,
        );
        let chroma_rows = fmt.chroma_height as usize;
        if fmt.semi_planar {
            let row = fmt.chroma_width as usize * 2 * fmt.bytes_per_component as usize;
            pack_plane(&mut buffer, source.data(1), source.stride(1), row, chroma_rows);
        } else {
            let row = fmt.chroma_width as usize * fmt.bytes_per_component as usize;
            pack_plane(&mut buffer, source.data(1), source.stride(1), row, chroma_rows);
            pack_plane(&mut buffer, source.data(2), source.stride(2), row, chroma_rows);
        }
        debug_assert_eq!(buffer.len(), fmt.buffer_size);
        Ok(buffer)
    }

    /// Reposition the demuxer to the keyframe at or before `seconds` and
    /// reset decode state so reading resumes from there.
    pub fn seek_to(&mut self, seconds: f64) -> Result<(), DecodeError> {
        let ticks = if self.time_base > 0.0 {
            (seconds / self.time_base).round() as i64
        } else {
            0
        };
        // SAFETY: the input context is open; a backward seek lands on the
        // closest keyframe at or before the target timestamp.
        let ret = unsafe {
            ffi::avformat_seek_file(
                self.input.as_mut_ptr(),
                self.stream_index as i32,
                i64::MIN,
                ticks,
                ticks,
                ffi::AVSEEK_FLAG_BACKWARD as i32,
            )
        };
        if ret < 0 {
            return Err(DecodeError::Seek(ffmpeg::Error::from(ret).to_string()));
        }
        self.decoder.flush();
        // SAFETY: drops buffered demux packets from before the seek.
        unsafe { ffi::avformat_flush(self.input.as_mut_ptr()) };

        self.state = DrainState::Reading;
        self.fallback_pts = seconds;
        self.frames_decoded = 0;
        debug!(seconds, ticks, "container seek");
        Ok(())
    }
}

impl FrameSource for DecodeSession {
    fn decode_next(&mut self, copy_to_cpu: bool) -> Result<Option<DecodedFrame>, DecodeError> {
        DecodeSession::decode_next(self, copy_to_cpu)
    }

    fn seek_to(&mut self, seconds: f64) -> Result<(), DecodeError> {
        DecodeSession::seek_to(self, seconds)
    }

    fn stream_info(&self) -> StreamInfo {
        self.info
    }

    fn prefers_zero_copy(&self) -> bool {
        self.options.prefer_zero_copy && matches!(self.backend, Backend::Vulkan { .. })
    }
}

// ── internal helpers ─────────────────────────────────────────────────

/// Software pixel format behind a hardware frame.
///
/// # Safety
/// `frame` must point to a valid hardware `AVFrame` with a hw-frames ctx.
unsafe fn hw_sw_format(frame: *const ffi::AVFrame) -> ffmpeg::format::Pixel {
    let ctx_ref = (*frame).hw_frames_ctx;
    if ctx_ref.is_null() {
        return ffmpeg::format::Pixel::NV12;
    }
    let frames_ctx = (*ctx_ref).data as *const ffi::AVHWFramesContext;
    ffmpeg::format::Pixel::from((*frames_ctx).sw_format)
}

/// Stream frame rate for pacing and PTS fallback; containers that report
/// no usable rate are treated as 30 fps.
fn stream_frame_rate(avg: Rational) -> f64 {
    if avg.num > 0 && avg.den > 0 {
        avg.as_f64()
    } else {
        30.0
    }
}

/// PTS for a frame: best-effort timestamp scaled by the time base when
/// present, otherwise previous PTS advanced by one frame interval (or 0.0
/// for the very first frame).
fn next_pts(
    timestamp: Option<i64>,
    time_base: f64,
    fallback_pts: f64,
    frames_decoded: u64,
    frame_rate: f64,
) -> f64 {
    match timestamp {
        Some(ts) => ts as f64 * time_base,
        None if frames_decoded > 0 => fallback_pts + 1.0 / frame_rate.max(1.0),
        None => 0.0,
    }
}

/// Copy one plane row by row, dropping stride padding.
fn pack_plane(dst: &mut Vec<u8>, data: &[u8], stride: usize, row_bytes: usize, rows: usize) {
    if stride == row_bytes {
        dst.extend_from_slice(&data[..row_bytes * rows]);
        return;
    }
    for row in 0..rows {
        let start = row * stride;
        dst.extend_from_slice(&data[start..start + row_bytes]);
    }
}

fn map_pixel(pixel: ffmpeg::format::Pixel) -> Result<PixelFormat, DecodeError> {
    use ffmpeg::format::Pixel;
    match pixel {
        Pixel::NV12 => Ok(PixelFormat::Nv12),
        Pixel::NV21 => Ok(PixelFormat::Nv21),
        Pixel::P010LE => Ok(PixelFormat::P010),
        Pixel::P016LE => Ok(PixelFormat::P016),
        Pixel::YUV420P | Pixel::YUVJ420P => Ok(PixelFormat::Yuv420p),
        Pixel::YUV422P | Pixel::YUVJ422P => Ok(PixelFormat::Yuv422p),
        Pixel::YUV444P | Pixel::YUVJ444P => Ok(PixelFormat::Yuv444p),
        Pixel::YUV420P10LE => Ok(PixelFormat::Yuv420p10),
        Pixel::YUV422P10LE => Ok(PixelFormat::Yuv422p10),
        Pixel::YUV444P10LE => Ok(PixelFormat::Yuv444p10),
        other => Err(DecodeError::UnsupportedFormat {
            format: format!("{other:?}"),
        }),
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Frame rate & PTS computation ─────────────────────────────

    #[test]
    fn unreported_frame_rate_defaults_to_30fps() {
        assert_eq!(
            stream_frame_rate(Rational::new(30000, 1001)),
            30000.0 / 1001.0
        );
        assert_eq!(stream_frame_rate(Rational::new(0, 1)), 30.0);
        assert_eq!(stream_frame_rate(Rational::new(25, 0)), 30.0);
        assert_eq!(stream_frame_rate(Rational::new(-25, 1)), 30.0);
    }

    #[test]
    fn pts_from_timestamp_scales_by_time_base() {
        // 90 kHz time base, timestamp 90_000 -> 1.0s.
        assert_eq!(next_pts(Some(90_000), 1.0 / 90_000.0, 0.0, 5, 30.0), 1.0);
    }

    #[test]
    fn missing_timestamp_advances_by_frame_interval() {
        let pts = next_pts(None, 1.0 / 90_000.0, 2.0, 60, 25.0);
        assert!((pts - 2.04).abs() < 1e-9);
    }

    #[test]
    fn first_frame_without_timestamp_is_zero() {
        assert_eq!(next_pts(None, 1.0 / 90_000.0, 7.0, 0, 30.0), 0.0);
    }

    #[test]
    fn fallback_guards_zero_frame_rate() {
        let pts = next_pts(None, 0.0, 1.0, 1, 0.0);
        assert_eq!(pts, 2.0);
    }

    // ── plane packing ────────────────────────────────────────────

    #[test]
    fn pack_plane_drops_stride_padding() {
        // 3 rows of 4 bytes payload with stride 6.
        let data: Vec<u8> = (0..18).collect();
        let mut out = Vec::new();
        pack_plane(&mut out, &data, 6, 4, 3);
        assert_eq!(out, vec![0, 1, 2, 3, 6, 7, 8, 9, 12, 13, 14, 15]);
    }

    #[test]
    fn pack_plane_tight_stride_is_single_copy() {
        let data: Vec<u8> = (0..12).collect();
        let mut out = Vec::new();
        pack_plane(&mut out, &data, 4, 4, 3);
        assert_eq!(out, data);
    }

    // ── pixel mapping ────────────────────────────────────────────

    #[test]
    fn unsupported_pixel_format_rejected() {
        assert!(map_pixel(ffmpeg::format::Pixel::RGB24).is_err());
        assert!(map_pixel(ffmpeg::format::Pixel::NV12).is_ok());
    }
}
