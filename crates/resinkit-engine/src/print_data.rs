//! Print data
//!
//! A job is a directory of slice images named `slice_<n>.png` (1-based),
//! with two optional JSON documents: `layersettings.json`, the per-layer
//! override table, and `printsettings.json`, settings applied when the job is
//! loaded. A `JobName` key in the print settings names the job; otherwise the
//! directory name is used.

use image::GrayImage;
use resinkit_core::PrintDataError;
use std::fs;
use std::path::{Path, PathBuf};

pub const LAYER_SETTINGS_FILE: &str = "layersettings.json";
pub const PRINT_SETTINGS_FILE: &str = "printsettings.json";

/// Read access to a loaded job
///
/// Implementations are shared with the background worker, so they must be
/// safe to use from another thread.
pub trait PrintData: Send + Sync {
    fn layer_count(&self) -> u32;

    /// Check that every layer has an image
    fn validate(&self) -> Result<(), PrintDataError>;

    fn job_name(&self) -> String;

    /// Per-layer override table, if the job has one
    fn layer_settings_text(&self) -> Result<Option<String>, PrintDataError>;

    /// Settings to apply when the job is loaded, if any
    fn print_settings_text(&self) -> Result<Option<String>, PrintDataError>;

    /// Decode the slice image of a 1-based layer
    fn load_image(&self, layer: u32) -> Result<GrayImage, PrintDataError>;
}

/// Print data stored as a plain directory
#[derive(Debug, Clone)]
pub struct DirectoryPrintData {
    dir: PathBuf,
    layer_count: u32,
}

impl DirectoryPrintData {
    /// Open a directory; its layer count is the number of slice images
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, PrintDataError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(PrintDataError::NotFound {
                path: dir.display().to_string(),
            });
        }
        let layer_count = fs::read_dir(&dir)
            .map_err(io_error)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| slice_number(&entry.file_name().to_string_lossy()).is_some())
            .count() as u32;
        Ok(Self { dir, layer_count })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slice_path(&self, layer: u32) -> PathBuf {
        self.dir.join(format!("slice_{}.png", layer))
    }

    fn read_optional(&self, name: &str) -> Result<Option<String>, PrintDataError> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path).map(Some).map_err(io_error)
    }
}

impl PrintData for DirectoryPrintData {
    fn layer_count(&self) -> u32 {
        self.layer_count
    }

    fn validate(&self) -> Result<(), PrintDataError> {
        if self.layer_count == 0 {
            return Err(PrintDataError::NoLayers);
        }
        for layer in 1..=self.layer_count {
            if !self.slice_path(layer).is_file() {
                return Err(PrintDataError::MissingImage { layer });
            }
        }
        Ok(())
    }

    fn job_name(&self) -> String {
        let from_settings = self
            .read_optional(PRINT_SETTINGS_FILE)
            .ok()
            .flatten()
            .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok())
            .and_then(|value| value.get("JobName").and_then(|v| v.as_str()).map(String::from))
            .filter(|name| !name.is_empty());
        from_settings.unwrap_or_else(|| {
            self.dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }

    fn layer_settings_text(&self) -> Result<Option<String>, PrintDataError> {
        self.read_optional(LAYER_SETTINGS_FILE)
    }

    fn print_settings_text(&self) -> Result<Option<String>, PrintDataError> {
        self.read_optional(PRINT_SETTINGS_FILE)
    }

    fn load_image(&self, layer: u32) -> Result<GrayImage, PrintDataError> {
        let path = self.slice_path(layer);
        if !path.is_file() {
            return Err(PrintDataError::MissingImage { layer });
        }
        let image = image::open(&path).map_err(|e| PrintDataError::InvalidImage {
            layer,
            reason: e.to_string(),
        })?;
        Ok(image.to_luma8())
    }
}

/// Validate the job in `source` and copy it over `target`
///
/// `target` is only replaced once the source has validated.
pub fn install_print_data(source: &Path, target: &Path) -> Result<DirectoryPrintData, PrintDataError> {
    let staged = DirectoryPrintData::open(source)?;
    staged.validate()?;

    if target.exists() {
        fs::remove_dir_all(target).map_err(io_error)?;
    }
    fs::create_dir_all(target).map_err(io_error)?;
    for entry in fs::read_dir(source).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let path = entry.path();
        if path.is_file() {
            fs::copy(&path, target.join(entry.file_name())).map_err(io_error)?;
        }
    }
    let installed = DirectoryPrintData::open(target)?;
    installed.validate()?;
    tracing::info!(
        "Installed print data with {} layers from {}",
        installed.layer_count(),
        source.display()
    );
    Ok(installed)
}

/// Whether `dir` holds at least one slice image
pub fn contains_print_data(dir: &Path) -> bool {
    DirectoryPrintData::open(dir)
        .map(|data| data.layer_count() > 0)
        .unwrap_or(false)
}

fn slice_number(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix("slice_")?
        .strip_suffix(".png")?
        .parse()
        .ok()
}

fn io_error(e: std::io::Error) -> PrintDataError {
    PrintDataError::Io {
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use tempfile::TempDir;

    fn write_slices(dir: &Path, count: u32) {
        for layer in 1..=count {
            GrayImage::from_pixel(8, 4, Luma([layer as u8 * 10]))
                .save(dir.join(format!("slice_{}.png", layer)))
                .unwrap();
        }
    }

    #[test]
    fn test_slice_names() {
        assert_eq!(slice_number("slice_12.png"), Some(12));
        assert_eq!(slice_number("slice_.png"), None);
        assert_eq!(slice_number("layer_1.png"), None);
        assert_eq!(slice_number("slice_1.jpg"), None);
    }

    #[test]
    fn test_open_and_load() {
        let dir = TempDir::new().unwrap();
        write_slices(dir.path(), 3);
        let data = DirectoryPrintData::open(dir.path()).unwrap();
        assert_eq!(data.layer_count(), 3);
        data.validate().unwrap();
        assert_eq!(data.load_image(2).unwrap().get_pixel(0, 0).0[0], 20);
        assert!(matches!(
            data.load_image(4),
            Err(PrintDataError::MissingImage { layer: 4 })
        ));
    }

    #[test]
    fn test_gap_in_slices_fails_validation() {
        let dir = TempDir::new().unwrap();
        write_slices(dir.path(), 3);
        fs::remove_file(dir.path().join("slice_2.png")).unwrap();
        let data = DirectoryPrintData::open(dir.path()).unwrap();
        assert!(matches!(
            data.validate(),
            Err(PrintDataError::MissingImage { layer: 2 })
        ));
    }

    #[test]
    fn test_empty_and_missing_directories() {
        let dir = TempDir::new().unwrap();
        let data = DirectoryPrintData::open(dir.path()).unwrap();
        assert!(matches!(data.validate(), Err(PrintDataError::NoLayers)));
        assert!(!contains_print_data(dir.path()));
        assert!(matches!(
            DirectoryPrintData::open(dir.path().join("absent")),
            Err(PrintDataError::NotFound { .. })
        ));
    }

    #[test]
    fn test_job_name_and_optional_files() {
        let dir = TempDir::new().unwrap();
        write_slices(dir.path(), 1);
        let data = DirectoryPrintData::open(dir.path()).unwrap();
        assert!(data.layer_settings_text().unwrap().is_none());
        assert!(!data.job_name().is_empty());

        fs::write(dir.path().join(PRINT_SETTINGS_FILE), r#"{"JobName": "hinge"}"#).unwrap();
        fs::write(dir.path().join(LAYER_SETTINGS_FILE), r#"{"1": {"ExposureSec": 4.0}}"#).unwrap();
        assert_eq!(data.job_name(), "hinge");
        assert!(data.layer_settings_text().unwrap().is_some());
    }

    #[test]
    fn test_install_replaces_target() {
        let staging = TempDir::new().unwrap();
        let target_root = TempDir::new().unwrap();
        let target = target_root.path().join("print_data");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("slice_9.png"), b"stale").unwrap();

        write_slices(staging.path(), 2);
        let installed = install_print_data(staging.path(), &target).unwrap();
        assert_eq!(installed.layer_count(), 2);
        assert!(!target.join("slice_9.png").exists());
    }

    #[test]
    fn test_install_invalid_keeps_target() {
        let staging = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write_slices(target.path(), 1);
        assert!(install_print_data(staging.path(), target.path()).is_err());
        assert!(target.path().join("slice_1.png").exists());
    }
}
