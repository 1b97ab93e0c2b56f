use crate::capture::domain::capture_source::CaptureSource;
use crate::shared::frame::Frame;

/// What the configured capture identifier points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureDevice {
    /// Local camera by index (`0` is the first camera).
    Camera(u32),
    /// Anything ffmpeg can open directly: file path, device path or URL.
    Source(String),
}

impl CaptureDevice {
    pub fn parse(identifier: &str) -> Self {
        let trimmed = identifier.trim();
        match trimmed.parse::<u32>() {
            Ok(index) => CaptureDevice::Camera(index),
            Err(_) => CaptureDevice::Source(trimmed.to_string()),
        }
    }
}

/// Live capture via ffmpeg-next (libavdevice + libavcodec).
///
/// Decodes one frame per `read` call and converts it to RGB24.
pub struct FfmpegCapture {
    state: Option<DecodeState>,
    label: String,
}

// Safety: FfmpegCapture is owned and used by a single worker thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegCapture {}

struct DecodeState {
    input: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: Option<(ScalerKey, ffmpeg_next::software::scaling::Context)>,
    stream_index: usize,
    frame_index: usize,
    flushing: bool,
}

type ScalerKey = (ffmpeg_next::format::Pixel, u32, u32);

impl FfmpegCapture {
    /// Opens the device, requesting `width` x `height` from cameras.
    ///
    /// The request is advisory: frames carry whatever size the device
    /// actually delivers.
    pub fn open(
        device: &CaptureDevice,
        width: u32,
        height: u32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let (input, label) = match device {
            CaptureDevice::Camera(index) => {
                ffmpeg_next::device::register_all();
                let (format, path) = camera_input(*index)?;
                let mut options = ffmpeg_next::Dictionary::new();
                options.set("video_size", &format!("{width}x{height}"));
                let ctx = ffmpeg_next::format::open_with(
                    &path,
                    &ffmpeg_next::Format::Input(format),
                    options,
                )?;
                (ctx.input(), path)
            }
            CaptureDevice::Source(path) => (ffmpeg_next::format::input(path)?, path.clone()),
        };

        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        log::info!(
            "Opened capture {label} ({}x{}, requested {width}x{height})",
            decoder.width(),
            decoder.height()
        );

        Ok(Self {
            state: Some(DecodeState {
                input,
                decoder,
                scaler: None,
                stream_index,
                frame_index: 0,
                flushing: false,
            }),
            label,
        })
    }
}

impl CaptureSource for FfmpegCapture {
    fn read(&mut self) -> Result<Frame, Box<dyn std::error::Error>> {
        let state = self.state.as_mut().ok_or("FfmpegCapture: already released")?;
        state.next_frame()
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!("Released capture {}", self.label);
        }
    }
}

impl DecodeState {
    fn next_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error>> {
        loop {
            if let Some(frame) = self.try_receive()? {
                return Ok(frame);
            }
            if self.flushing {
                return Err("End of stream".into());
            }

            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() != self.stream_index {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        log::debug!("Dropping undecodable packet: {e}");
                    }
                }
                Err(ffmpeg_next::Error::Eof) => {
                    let _ = self.decoder.send_eof();
                    self.flushing = true;
                }
                Err(e) => return Err(Box::new(e)),
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let width = decoded.width();
        let height = decoded.height();
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler_for(&decoded)?.run(&decoded, &mut rgb_frame)?;

        let pixels = extract_rgb_pixels(&rgb_frame, width, height);
        let frame = Frame::new(pixels, width, height, 3, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }

    /// Builds the RGB24 converter lazily, rebuilding it if the device
    /// changes format or size mid-stream.
    fn scaler_for(
        &mut self,
        decoded: &ffmpeg_next::util::frame::video::Video,
    ) -> Result<&mut ffmpeg_next::software::scaling::Context, Box<dyn std::error::Error>> {
        let key = (decoded.format(), decoded.width(), decoded.height());
        let stale = self.scaler.as_ref().map_or(true, |(k, _)| *k != key);
        if stale {
            let ctx = ffmpeg_next::software::scaling::Context::get(
                key.0,
                key.1,
                key.2,
                ffmpeg_next::format::Pixel::RGB24,
                key.1,
                key.2,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )?;
            self.scaler = Some((key, ctx));
        }
        match self.scaler.as_mut() {
            Some((_, ctx)) => Ok(ctx),
            None => Err("Scaler unavailable".into()),
        }
    }
}

/// Picks the platform camera demuxer and device path for a camera index.
fn camera_input(
    index: u32,
) -> Result<(ffmpeg_next::format::format::Input, String), Box<dyn std::error::Error>> {
    #[cfg(target_os = "linux")]
    let (names, path) = (["v4l2", "video4linux2"], format!("/dev/video{index}"));
    #[cfg(target_os = "macos")]
    let (names, path) = (["avfoundation", "avfoundation"], format!("{index}"));
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        let _ = index;
        return Err("Camera indices are only supported on Linux and macOS; pass a device URL".into());
    }

    #[cfg(any(target_os = "linux", target_os = "macos"))]
    {
        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name().split(',').any(|n| names.contains(&n)))
            .ok_or_else(|| format!("No camera input format ({}) available", names[0]))?;
        Ok((format, path))
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer.
///
/// ffmpeg frames may have padding bytes at the end of each row (stride > width*3).
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::{Path, PathBuf};

    fn write_test_image(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("still.png");
        let mut img = image::RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([50, 100, 200]);
        }
        img.save(&path).unwrap();
        path
    }

    #[rstest]
    #[case("0", CaptureDevice::Camera(0))]
    #[case(" 2 ", CaptureDevice::Camera(2))]
    #[case("/dev/video1", CaptureDevice::Source("/dev/video1".into()))]
    #[case("rtsp://cam.local/stream", CaptureDevice::Source("rtsp://cam.local/stream".into()))]
    fn test_parse_device(#[case] id: &str, #[case] expected: CaptureDevice) {
        assert_eq!(CaptureDevice::parse(id), expected);
    }

    #[test]
    fn test_open_nonexistent_source_fails() {
        let device = CaptureDevice::Source("/nonexistent/clip.mp4".into());
        assert!(FfmpegCapture::open(&device, 640, 480).is_err());
    }

    #[test]
    fn test_reads_still_image_then_ends() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 64, 48);
        let device = CaptureDevice::Source(path.to_string_lossy().into_owned());
        let mut capture = FfmpegCapture::open(&device, 1920, 1080).unwrap();

        let frame = capture.read().unwrap();
        assert_eq!((frame.width(), frame.height(), frame.channels()), (64, 48, 3));
        assert_eq!(frame.index(), 0);
        assert_eq!(&frame.data()[..3], &[50, 100, 200]);

        assert!(capture.read().is_err());
        capture.release();
    }

    #[test]
    fn test_read_after_release_fails_and_release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 16, 16);
        let device = CaptureDevice::Source(path.to_string_lossy().into_owned());
        let mut capture = FfmpegCapture::open(&device, 16, 16).unwrap();
        capture.release();
        capture.release();
        assert!(capture.read().is_err());
    }
}
