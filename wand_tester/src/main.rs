use anyhow::{Context, bail};
use image::GrayImage;
use opencv::{
    core::{self, Mat, Scalar},
    highgui, imgproc,
    prelude::*,
    videoio::{self, VideoCapture, VideoWriter},
};
use std::env;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use wand_tracker::{AcquisitionError, FireOutcome, FrameSource, Tick, TrackerConfig, TrackingSession, TrailBuffer};

const WINDOW: &str = "IR Wand Tracker";
const THRESHOLD_WINDOW: &str = "Threshold";
/// Consecutive failed reads before the camera is considered gone.
const MAX_CONSECUTIVE_MISSES: u32 = 30;
const FALLBACK_FPS: f64 = 30.0;

/// A V4L2 / DirectShow camera, flipped upright and converted to grayscale.
struct CameraSource {
    capture: VideoCapture,
    /// The last frame read, in color, for drawing on.
    last_color: Mat,
    misses: u32,
}

impl CameraSource {
    fn open(index: i32) -> anyhow::Result<Self> {
        let backend = if cfg!(windows) { videoio::CAP_DSHOW } else { videoio::CAP_V4L2 };
        let mut capture = VideoCapture::new(index, backend)?;
        if !capture.is_opened()? {
            bail!("could not open IR camera {index}");
        }

        // Low exposure keeps everything but the IR tip dark. Not every camera honors these.
        for (property, value) in [
            (videoio::CAP_PROP_AUTO_EXPOSURE, 0.0),
            (videoio::CAP_PROP_EXPOSURE, -100.0),
            (videoio::CAP_PROP_FRAME_WIDTH, 640.0),
            (videoio::CAP_PROP_FRAME_HEIGHT, 480.0),
        ] {
            if !capture.set(property, value).unwrap_or(false) {
                warn!(property, value, "camera ignored setting");
            }
        }

        Ok(Self {
            capture,
            last_color: Mat::default(),
            misses: 0,
        })
    }

    fn grab(&mut self) -> opencv::Result<Option<GrayImage>> {
        let mut raw = Mat::default();
        if !self.capture.read(&mut raw)? || raw.empty() {
            return Ok(None);
        }

        // The camera is mounted upside down and mirrored: flip around both axes.
        core::flip(&raw, &mut self.last_color, -1)?;

        let mut gray = Mat::default();
        if self.last_color.channels() == 3 {
            imgproc::cvt_color(&self.last_color, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;
        } else {
            gray = self.last_color.try_clone()?;
        }
        let (width, height) = (gray.cols() as u32, gray.rows() as u32);
        Ok(GrayImage::from_raw(width, height, gray.data_bytes()?.to_vec()))
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<GrayImage, AcquisitionError> {
        let frame = match self.grab() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "failed to capture frame");
                None
            }
        };
        match frame {
            Some(frame) => {
                self.misses = 0;
                Ok(frame)
            }
            None => {
                self.misses += 1;
                if self.misses >= MAX_CONSECUTIVE_MISSES {
                    Err(AcquisitionError::Closed(format!("{} consecutive failed reads", self.misses)))
                } else {
                    Err(AcquisitionError::Unavailable)
                }
            }
        }
    }
}

/// Draws the trail as a line that thins out with age.
fn draw_trail(frame: &mut Mat, trail: &TrailBuffer) -> opencv::Result<()> {
    let red = Scalar::new(0.0, 0.0, 255.0, 0.0);
    let points: Vec<_> = trail.iter().collect();
    for (i, pair) in points.windows(2).enumerate() {
        let thickness = ((64.0 / (i as f64 + 2.0)).sqrt() * 2.5) as i32;
        imgproc::line(
            frame,
            core::Point::new(pair[0].x, pair[0].y),
            core::Point::new(pair[1].x, pair[1].y),
            red,
            thickness.max(1),
            imgproc::LINE_8,
            0,
        )?;
    }
    Ok(())
}

fn gray_to_mat(image: &GrayImage) -> opencv::Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(
        image.height() as i32,
        image.width() as i32,
        core::CV_8UC1,
        Scalar::all(0.0),
    )?;
    mat.data_bytes_mut()?.copy_from_slice(image.as_raw());
    Ok(mat)
}

fn tracker_config() -> anyhow::Result<TrackerConfig> {
    let mut config = TrackerConfig::default();
    if let Ok(endpoint) = env::var("WAND_ENDPOINT") {
        if !endpoint.is_empty() {
            config.action.endpoint = endpoint;
        }
    }
    if let Ok(timeout) = env::var("WAND_ACTION_TIMEOUT_MS") {
        let millis: u64 = timeout
            .parse()
            .with_context(|| format!("WAND_ACTION_TIMEOUT_MS is not a number: {timeout}"))?;
        config.action.timeout = Duration::from_millis(millis);
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("Usage: wand_tester [camera_index] [output_video_path]");
        return Ok(());
    }
    let camera_index: i32 = match args.get(1) {
        Some(index) => index.parse().with_context(|| format!("camera index is not a number: {index}"))?,
        None => 0,
    };
    let output_path = args.get(2);
    let config = tracker_config()?;
    info!(camera_index, endpoint = %config.action.endpoint, "starting wand tracker");

    // --- 2. Camera & Optional Recording ---
    let mut camera = CameraSource::open(camera_index)?;
    let mut writer = match output_path {
        Some(path) => {
            let width = camera.capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
            let height = camera.capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
            let fps = match camera.capture.get(videoio::CAP_PROP_FPS)? {
                fps if fps > 0.0 => fps,
                _ => FALLBACK_FPS,
            };
            let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v')?;
            Some(VideoWriter::new(path, fourcc, fps, core::Size::new(width, height), true)?)
        }
        None => None,
    };

    // --- 3. Session on a Runtime for Action Dispatch ---
    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();
    let mut session = TrackingSession::with_http_action(config, Instant::now())?;

    // --- 4. Main Processing Loop ---
    let outcome = loop {
        match session.tick(&mut camera, Instant::now()) {
            Ok(Tick::Processed(report)) => {
                if report.fire == FireOutcome::Fired {
                    info!("Incendio!");
                }

                let mut output_frame = camera.last_color.try_clone()?;
                if let Some(blob) = session.last_blob() {
                    let p = blob.point();
                    let green = Scalar::new(0.0, 255.0, 0.0, 0.0);
                    imgproc::circle(&mut output_frame, core::Point::new(p.x, p.y), 5, green, -1, imgproc::LINE_8, 0)?;
                }
                draw_trail(&mut output_frame, session.trail())?;

                highgui::imshow(WINDOW, &output_frame)?;
                if let Some(binary) = session.last_binary() {
                    highgui::imshow(THRESHOLD_WINDOW, &gray_to_mat(binary)?)?;
                }
                if let Some(writer) = writer.as_mut() {
                    writer.write(&output_frame)?;
                }
            }
            Ok(Tick::Skipped) => {}
            Err(e) => break Err(e),
        }

        // Exit on 'q'.
        if highgui::wait_key(1)? & 0xFF == 'q' as i32 {
            break Ok(());
        }
    };

    runtime.block_on(session.shutdown());
    highgui::destroy_all_windows()?;

    match outcome {
        Ok(()) => {
            info!("stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "tracking stopped");
            Err(e.into())
        }
    }
}
