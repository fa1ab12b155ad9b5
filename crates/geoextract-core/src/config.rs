//! Invocation configuration.

use std::time::Duration;

use crate::error::{ExtractError, Result};
use crate::release::{DEFAULT_RELEASE_ROOT, LAST_KNOWN_RELEASE};

/// Factor the geocoder's bounding box is widened by before the division
/// search. Empirical: geocoder boundaries tend to be tighter than, or offset
/// from, the dataset's division polygons.
pub const DEFAULT_WIDEN_FACTOR: f64 = 2.0;

/// Default deadline for one geocoding call.
pub const DEFAULT_GEOCODE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default Nominatim search endpoint.
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org/search";

/// Settings for one resolve-then-extract run.
///
/// ```
/// use geoextract_core::ExtractConfig;
///
/// let config = ExtractConfig::default()
///     .with_release("2024-09-18.0")
///     .with_widen_factor(3.0);
/// assert!(config.validate().is_ok());
/// assert_eq!(config.release, "2024-09-18.0");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractConfig {
    /// URL or local directory holding one subdirectory per release
    pub release_root: String,
    /// Dataset release used for both divisions and the extracted theme
    pub release: String,
    pub widen_factor: f64,
    pub geocode_timeout: Duration,
    /// Name of the WKB geometry column in every partition-set
    pub geometry_column: String,
    /// Name of the per-row bbox struct column
    pub bbox_column: String,
    pub nominatim_url: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            release_root: DEFAULT_RELEASE_ROOT.to_string(),
            release: LAST_KNOWN_RELEASE.to_string(),
            widen_factor: DEFAULT_WIDEN_FACTOR,
            geocode_timeout: DEFAULT_GEOCODE_TIMEOUT,
            geometry_column: "geometry".to_string(),
            bbox_column: "bbox".to_string(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
        }
    }
}

impl ExtractConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_release_root(mut self, root: impl Into<String>) -> Self {
        self.release_root = root.into();
        self
    }

    #[must_use]
    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.release = release.into();
        self
    }

    #[must_use]
    pub fn with_widen_factor(mut self, factor: f64) -> Self {
        self.widen_factor = factor;
        self
    }

    #[must_use]
    pub fn with_geocode_timeout(mut self, timeout: Duration) -> Self {
        self.geocode_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_nominatim_url(mut self, url: impl Into<String>) -> Self {
        self.nominatim_url = url.into();
        self
    }

    /// Check the settings before any network or engine work starts.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidArgument`] for a non-positive widen
    /// factor, a zero timeout, or an empty release, root, or column name.
    pub fn validate(&self) -> Result<()> {
        if !(self.widen_factor.is_finite() && self.widen_factor > 0.0) {
            return Err(ExtractError::invalid_argument(
                "widen_factor",
                format!("must be a finite number > 0, got {}", self.widen_factor),
            ));
        }
        if self.geocode_timeout.is_zero() {
            return Err(ExtractError::invalid_argument(
                "geocode_timeout",
                "must be greater than zero",
            ));
        }
        for (argument, value) in [
            ("release", &self.release),
            ("release_root", &self.release_root),
            ("geometry_column", &self.geometry_column),
            ("bbox_column", &self.bbox_column),
        ] {
            if value.trim().is_empty() {
                return Err(ExtractError::invalid_argument(argument, "must not be empty"));
            }
        }
        Ok(())
    }
}
