//! Projector contract
//!
//! The display device sits behind [`ProjectorDevice`]. [`Projector`] adds the
//! pending-image slot: the background worker commits the next slice into it
//! from its own thread, and the reactor thread shows it when exposure starts.

use image::{imageops, GrayImage, Luma};
use resinkit_core::{thread_safe_none, thread_safe_vec, HardwareError, ThreadSafeOption, ThreadSafeVec};

/// Native projector resolution
pub const PROJECTOR_WIDTH: u32 = 1280;
pub const PROJECTOR_HEIGHT: u32 = 800;

/// Pixel threshold used when remapping for pattern mode
const PATTERN_THRESHOLD: u8 = 128;

/// Low-level display device
pub trait ProjectorDevice: Send {
    /// Show a full-frame grayscale image
    fn show(&mut self, image: &GrayImage) -> Result<(), HardwareError>;

    /// Turn the light off
    fn show_black(&mut self) -> Result<(), HardwareError>;

    /// Flash new projector firmware
    fn upgrade_firmware(&mut self) -> Result<(), HardwareError>;
}

/// Projector with a pending-image slot
pub struct Projector {
    device: Box<dyn ProjectorDevice>,
    pending: ThreadSafeOption<GrayImage>,
    current: Option<GrayImage>,
}

impl Projector {
    pub fn new(device: Box<dyn ProjectorDevice>) -> Self {
        Self {
            device,
            pending: thread_safe_none(),
            current: None,
        }
    }

    /// Handle to the pending slot for the background worker
    pub fn pending_slot(&self) -> ThreadSafeOption<GrayImage> {
        self.pending.clone()
    }

    pub fn set_pending(&self, image: GrayImage) {
        *self.pending.lock() = Some(image);
    }

    pub fn has_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    /// Drop the pending and current images
    pub fn clear_images(&mut self) {
        self.pending.lock().take();
        self.current = None;
    }

    /// Show the pending image, which becomes the current image
    ///
    /// Returns `Ok(false)` when no image is pending.
    pub fn show_pending(&mut self) -> Result<bool, HardwareError> {
        let image = self.pending.lock().take();
        match image {
            Some(image) => {
                self.device.show(&image)?;
                self.current = Some(image);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Show the current image again after an interrupted exposure
    ///
    /// Returns `Ok(false)` when there is no current image.
    pub fn show_current(&mut self) -> Result<bool, HardwareError> {
        match &self.current {
            Some(image) => {
                self.device.show(image)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn show_black(&mut self) -> Result<(), HardwareError> {
        self.device.show_black()
    }

    pub fn show_test_pattern(&mut self) -> Result<(), HardwareError> {
        self.device.show(&test_pattern())
    }

    pub fn show_calibration_pattern(&mut self) -> Result<(), HardwareError> {
        self.device.show(&calibration_pattern())
    }

    pub fn upgrade_firmware(&mut self) -> Result<(), HardwareError> {
        self.device.upgrade_firmware()
    }
}

/// Grid used to check focus and uniformity
pub fn test_pattern() -> GrayImage {
    GrayImage::from_fn(PROJECTOR_WIDTH, PROJECTOR_HEIGHT, |x, y| {
        if x % 80 < 2 || y % 80 < 2 {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Outline and crosshair used to align the build head
pub fn calibration_pattern() -> GrayImage {
    let (w, h) = (PROJECTOR_WIDTH, PROJECTOR_HEIGHT);
    GrayImage::from_fn(w, h, |x, y| {
        let border = x < 4 || y < 4 || x >= w - 4 || y >= h - 4;
        let cross = x.abs_diff(w / 2) < 2 || y.abs_diff(h / 2) < 2;
        if border || cross {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Scale a slice about its center and optionally remap it to two levels
/// for pattern mode
pub fn prepare_image(image: GrayImage, scale: f64, pattern_mode: bool) -> GrayImage {
    let mut image = if (scale - 1.0).abs() > f64::EPSILON {
        scale_centered(&image, scale)
    } else {
        image
    };
    if pattern_mode {
        for pixel in image.pixels_mut() {
            pixel.0[0] = if pixel.0[0] >= PATTERN_THRESHOLD { 255 } else { 0 };
        }
    }
    image
}

fn scale_centered(image: &GrayImage, scale: f64) -> GrayImage {
    let (w, h) = image.dimensions();
    let sw = ((f64::from(w) * scale).round() as u32).max(1);
    let sh = ((f64::from(h) * scale).round() as u32).max(1);
    let scaled = imageops::resize(image, sw, sh, imageops::FilterType::Triangle);

    let mut canvas = GrayImage::new(w, h);
    let dx = (i64::from(w) - i64::from(sw)) / 2;
    let dy = (i64::from(h) - i64::from(sh)) / 2;
    if dx >= 0 && dy >= 0 {
        imageops::overlay(&mut canvas, &scaled, dx, dy);
    } else {
        let cropped = imageops::crop_imm(
            &scaled,
            (-dx).max(0) as u32,
            (-dy).max(0) as u32,
            w,
            h,
        )
        .to_image();
        imageops::overlay(&mut canvas, &cropped, dx.max(0), dy.max(0));
    }
    canvas
}

/// What a [`SimulatedProjector`] was asked to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectedFrame {
    Image { width: u32, height: u32, lit_pixels: u64 },
    Black,
    FirmwareUpgrade,
}

/// Display that records frames instead of driving hardware
#[derive(Clone)]
pub struct SimulatedProjector {
    frames: ThreadSafeVec<ProjectedFrame>,
    fail: bool,
}

impl SimulatedProjector {
    pub fn new() -> Self {
        Self {
            frames: thread_safe_vec(),
            fail: false,
        }
    }

    /// A projector whose every operation fails
    pub fn failing() -> Self {
        Self {
            frames: thread_safe_vec(),
            fail: true,
        }
    }

    pub fn frames(&self) -> Vec<ProjectedFrame> {
        self.frames.lock().clone()
    }

    pub fn last_frame(&self) -> Option<ProjectedFrame> {
        self.frames.lock().last().cloned()
    }

    fn record(&self, frame: ProjectedFrame) -> Result<(), HardwareError> {
        if self.fail {
            return Err(HardwareError::Projector {
                reason: "simulated projector failure".to_string(),
            });
        }
        tracing::trace!("Projector frame: {:?}", frame);
        self.frames.lock().push(frame);
        Ok(())
    }
}

impl Default for SimulatedProjector {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectorDevice for SimulatedProjector {
    fn show(&mut self, image: &GrayImage) -> Result<(), HardwareError> {
        let lit_pixels = image.pixels().filter(|p| p.0[0] > 0).count() as u64;
        self.record(ProjectedFrame::Image {
            width: image.width(),
            height: image.height(),
            lit_pixels,
        })
    }

    fn show_black(&mut self) -> Result<(), HardwareError> {
        self.record(ProjectedFrame::Black)
    }

    fn upgrade_firmware(&mut self) -> Result<(), HardwareError> {
        self.record(ProjectedFrame::FirmwareUpgrade)
    }
}
