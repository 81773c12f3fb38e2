//! Orientation classification: one portrait page or a two-page spread?
//!
//! The decision uses only the height/width ratio of the scanned sheet. A
//! portrait sheet holds one page; a landscape sheet holds two pages side by
//! side. Sheets close to square cannot be told apart and come back as
//! [`Orientation::Ambiguous`]; the caller decides what to do with them.

use crate::error::BookOcrError;
use crate::tools::Layout;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// At or below this height/width ratio a sheet is a two-page spread.
pub const DOUBLE_MAX_RATIO: f64 = 0.8;

/// At or above this height/width ratio a sheet is a single page.
pub const SINGLE_MIN_RATIO: f64 = 1.2;

/// Outcome of [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// Portrait sheet, one logical page.
    Single,
    /// Landscape sheet, two logical pages side by side.
    Double,
    /// Near-square sheet; split as [`Layout::Double`] with a warning.
    Ambiguous,
}

impl Orientation {
    /// Splitter layout for this orientation. Ambiguous sheets are split in two.
    pub fn layout(self) -> Layout {
        match self {
            Orientation::Single => Layout::Single,
            Orientation::Double | Orientation::Ambiguous => Layout::Double,
        }
    }
}

/// Classify a sheet from its pixel dimensions.
pub fn classify(width: u32, height: u32) -> Orientation {
    if width == 0 {
        return Orientation::Single;
    }
    let r = ratio(width, height);
    if r <= DOUBLE_MAX_RATIO {
        Orientation::Double
    } else if r >= SINGLE_MIN_RATIO {
        Orientation::Single
    } else {
        Orientation::Ambiguous
    }
}

/// Height divided by width.
pub fn ratio(width: u32, height: u32) -> f64 {
    f64::from(height) / f64::from(width)
}

/// Read a raster's pixel dimensions from its header without decoding pixels.
pub fn probe_dimensions(path: &Path) -> Result<(u32, u32), BookOcrError> {
    let probe_err = |detail: String| BookOcrError::Probe {
        path: path.to_path_buf(),
        detail,
    };
    image::ImageReader::open(path)
        .map_err(|e| probe_err(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| probe_err(e.to_string()))?
        .into_dimensions()
        .map_err(|e| probe_err(e.to_string()))
}
