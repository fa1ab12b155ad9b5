//! Output format registry.
//!
//! An extract writes exactly one file and the file's extension decides its
//! format: `.geojson` selects the text-based interchange format, anything else
//! selects native columnar output (Parquet with ZSTD compression).
//!
//! # Examples
//!
//! ```
//! use geoextract_core_common::OutputFormat;
//! use std::path::Path;
//!
//! assert_eq!(OutputFormat::from_path(Path::new("out.geojson")), OutputFormat::GeoJson);
//! assert_eq!(OutputFormat::from_path(Path::new("out.parquet")), OutputFormat::Parquet);
//! assert!(OutputFormat::GeoJson.is_interchange());
//! ```

use std::fmt;
use std::path::Path;

/// File format an extract is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// Binary columnar output preserving every column type.
    Parquet,
    /// `GeoJSON` `FeatureCollection`; cannot carry nested column types.
    GeoJson,
}

impl OutputFormat {
    /// Selects the format implied by `path`'s extension.
    ///
    /// The comparison ignores ASCII case. Paths without an extension, or with
    /// any extension other than `geojson`, produce [`OutputFormat::Parquet`].
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("geojson") => OutputFormat::GeoJson,
            _ => OutputFormat::Parquet,
        }
    }

    /// Short name used in logs and CLI output (e.g., `"GeoJSON"`).
    #[must_use]
    pub const fn short_name(&self) -> &'static str {
        match self {
            OutputFormat::Parquet => "Parquet",
            OutputFormat::GeoJson => "GeoJSON",
        }
    }

    /// Canonical file extension, without the leading dot. The engine stages
    /// output under this extension before moving it into place.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Parquet => "parquet",
            OutputFormat::GeoJson => "geojson",
        }
    }

    /// Returns `true` for the text interchange format, whose writer cannot
    /// encode structured columns or raw binary geometry.
    #[must_use]
    pub const fn is_interchange(&self) -> bool {
        matches!(self, OutputFormat::GeoJson)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geojson_extension_selects_interchange() {
        assert_eq!(
            OutputFormat::from_path(Path::new("/tmp/amsterdam.geojson")),
            OutputFormat::GeoJson
        );
        assert_eq!(
            OutputFormat::from_path(Path::new("AMSTERDAM.GeoJSON")),
            OutputFormat::GeoJson
        );
    }

    #[test]
    fn test_other_extensions_select_parquet() {
        for path in ["out.parquet", "out.json", "out", "dir.geojson/out.zstd"] {
            assert_eq!(OutputFormat::from_path(Path::new(path)), OutputFormat::Parquet);
        }
    }

    #[test]
    fn test_only_geojson_is_interchange() {
        assert!(OutputFormat::GeoJson.is_interchange());
        assert!(!OutputFormat::Parquet.is_interchange());
    }

    #[test]
    fn test_display_uses_short_name() {
        assert_eq!(OutputFormat::GeoJson.to_string(), "GeoJSON");
        assert_eq!(OutputFormat::Parquet.extension(), "parquet");
    }
}
