//! Axis-aligned bounding boxes in geographic coordinates.
//!
//! Boxes are only ever used as a cheap pre-filter; the exact spatial
//! predicate is always evaluated against the real geometry.

use geo::BoundingRect;
use geo_types::{Coord, Geometry, Polygon, Rect, coord};

use crate::error::{ExtractError, Result};

/// Longitude/latitude extent, `xmin <= xmax` and `ymin <= ymax`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BoundingBox {
    /// Build a box from its corners.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidArgument`] if a coordinate is not finite
    /// or a minimum exceeds its maximum.
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<Self> {
        if ![xmin, ymin, xmax, ymax].iter().all(|v| v.is_finite()) {
            return Err(ExtractError::invalid_argument(
                "bbox",
                format!("coordinates must be finite, got ({xmin}, {ymin}, {xmax}, {ymax})"),
            ));
        }
        if xmin > xmax || ymin > ymax {
            return Err(ExtractError::invalid_argument(
                "bbox",
                format!("min corner ({xmin}, {ymin}) exceeds max corner ({xmax}, {ymax})"),
            ));
        }
        Ok(Self {
            xmin,
            ymin,
            xmax,
            ymax,
        })
    }

    /// The minimal box covering every vertex of `geometry`.
    ///
    /// Multi-part geometries and collections yield the union extent of their
    /// parts.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidGeometry`] for an empty geometry or one
    /// with non-finite coordinates.
    ///
    /// # Examples
    ///
    /// ```
    /// use geo_types::{Geometry, MultiPoint, Point};
    /// use geoextract_core::bbox::BoundingBox;
    ///
    /// let points = Geometry::MultiPoint(MultiPoint::from(vec![
    ///     Point::new(4.7, 52.4),
    ///     Point::new(5.0, 52.3),
    /// ]));
    /// let bbox = BoundingBox::of(&points).unwrap();
    /// assert_eq!((bbox.xmin, bbox.ymin, bbox.xmax, bbox.ymax), (4.7, 52.3, 5.0, 52.4));
    /// ```
    pub fn of(geometry: &Geometry<f64>) -> Result<Self> {
        let rect = geometry
            .bounding_rect()
            .ok_or_else(|| ExtractError::invalid_geometry("geometry has no vertices"))?;
        let (min, max) = (rect.min(), rect.max());
        Self::new(min.x, min.y, max.x, max.y).map_err(|_| {
            ExtractError::invalid_geometry("geometry has non-finite coordinates")
        })
    }

    /// Expand (factor > 1) or shrink (factor < 1) the box about its centre.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidArgument`] unless `factor` is finite and
    /// strictly positive.
    pub fn scale_around_center(&self, factor: f64) -> Result<Self> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(ExtractError::invalid_argument(
                "factor",
                format!("must be a finite number > 0, got {factor}"),
            ));
        }
        if factor == 1.0 {
            return Ok(*self);
        }

        let center = self.center();
        let half_width = self.width() * factor / 2.0;
        let half_height = self.height() * factor / 2.0;
        Self::new(
            center.x - half_width,
            center.y - half_height,
            center.x + half_width,
            center.y + half_height,
        )
    }

    #[must_use]
    pub fn center(&self) -> Coord<f64> {
        coord! {
            x: (self.xmin + self.xmax) / 2.0,
            y: (self.ymin + self.ymax) / 2.0,
        }
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Inclusive point containment.
    #[must_use]
    pub fn contains(&self, point: Coord<f64>) -> bool {
        (self.xmin..=self.xmax).contains(&point.x) && (self.ymin..=self.ymax).contains(&point.y)
    }

    /// Inclusive range overlap on both axes.
    #[must_use]
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.xmin <= other.xmax
            && self.xmax >= other.xmin
            && self.ymin <= other.ymax
            && self.ymax >= other.ymin
    }

    /// The box as a closed rectangular polygon.
    #[must_use]
    pub fn to_polygon(&self) -> Polygon<f64> {
        Rect::from(*self).to_polygon()
    }
}

impl From<BoundingBox> for Rect<f64> {
    fn from(bbox: BoundingBox) -> Self {
        Rect::new(
            coord! { x: bbox.xmin, y: bbox.ymin },
            coord! { x: bbox.xmax, y: bbox.ymax },
        )
    }
}
