//! Background image preparation
//!
//! One worker thread per job loads the next slice, prepares it for the
//! projector and commits it into the projector's pending slot. There is no
//! cancellation: a job always runs to completion and is always joined. The
//! worker only receives copied values and thread-safe handles, never the
//! settings store.

use crate::print_data::PrintData;
use image::GrayImage;
use resinkit_communication::prepare_image;
use resinkit_core::{PrintDataError, ThreadSafeOption};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Work description for one slice
pub struct ImageJob {
    pub layer: u32,
    pub print_data: Arc<dyn PrintData>,
    pub scale: f64,
    pub pattern_mode: bool,
    pub slot: ThreadSafeOption<GrayImage>,
}

impl ImageJob {
    fn run(self) -> Result<u32, PrintDataError> {
        let image = self.print_data.load_image(self.layer)?;
        let image = prepare_image(image, self.scale, self.pattern_mode);
        *self.slot.lock() = Some(image);
        Ok(self.layer)
    }
}

/// Owner of the single in-flight image job
#[derive(Default)]
pub struct BackgroundWorker {
    job: Option<(u32, JoinHandle<Result<u32, PrintDataError>>)>,
}

impl BackgroundWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a job, first joining the previous one
    ///
    /// A failure of the superseded job is logged and otherwise ignored.
    pub fn start(&mut self, job: ImageJob) -> std::io::Result<()> {
        if let Some(Err(e)) = self.await_completion() {
            tracing::debug!("Ignoring failure of superseded image job: {}", e);
        }
        let layer = job.layer;
        let handle = std::thread::Builder::new()
            .name(format!("resinkit-image-{}", layer))
            .spawn(move || job.run())?;
        self.job = Some((layer, handle));
        Ok(())
    }

    /// Block until the in-flight job ends and return its result
    ///
    /// Returns `None` when no job was started since the last call.
    pub fn await_completion(&mut self) -> Option<Result<u32, PrintDataError>> {
        let (layer, handle) = self.job.take()?;
        Some(match handle.join() {
            Ok(result) => result,
            Err(_) => Err(PrintDataError::InvalidImage {
                layer,
                reason: "image worker panicked".to_string(),
            }),
        })
    }
}
