//! SQL text helpers for the statements the resolver and extractor build.

use crate::bbox::BoundingBox;

/// Double-quote an identifier, doubling embedded quotes.
///
/// ```
/// use geoextract_core::sql::quote_ident;
///
/// assert_eq!(quote_ident("names"), "\"names\"");
/// assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
/// ```
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote a string literal, doubling embedded quotes.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Render a coordinate without exponent notation.
///
/// `f64`'s `Display` never uses exponents and round-trips exactly, which keeps
/// the generated predicate lossless.
#[must_use]
pub fn float_literal(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') || text.contains("inf") || text.contains("NaN") {
        text
    } else {
        format!("{text}.0")
    }
}

/// Range-overlap test between a row's bbox struct column and `bbox`.
///
/// A row passes when its extent overlaps the box at all, so features that
/// straddle the box edge reach the exact predicate.
#[must_use]
pub fn bbox_overlap_predicate(bbox_column: &str, bbox: &BoundingBox) -> String {
    let column = quote_ident(bbox_column);
    format!(
        "{column}['xmin'] <= {xmax} AND {column}['xmax'] >= {xmin} \
         AND {column}['ymin'] <= {ymax} AND {column}['ymax'] >= {ymin}",
        xmin = float_literal(bbox.xmin),
        ymin = float_literal(bbox.ymin),
        xmax = float_literal(bbox.xmax),
        ymax = float_literal(bbox.ymax),
    )
}

/// `st_envelope_intersects(<geometry>, xmin, ymin, xmax, ymax)`.
#[must_use]
pub fn envelope_predicate(geometry_column: &str, bbox: &BoundingBox) -> String {
    format!(
        "st_envelope_intersects({}, {}, {}, {}, {})",
        quote_ident(geometry_column),
        float_literal(bbox.xmin),
        float_literal(bbox.ymin),
        float_literal(bbox.xmax),
        float_literal(bbox.ymax),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_literal_escapes() {
        assert_eq!(quote_literal("'s-Hertogenbosch"), "'''s-Hertogenbosch'");
        assert_eq!(quote_literal("plain"), "'plain'");
    }

    #[test]
    fn test_float_literal() {
        assert_eq!(float_literal(4.0), "4.0");
        assert_eq!(float_literal(-0.5), "-0.5");
        assert_eq!(float_literal(52.374_03), "52.37403");
        assert_eq!(float_literal(1e-7), "0.0000001");
    }

    #[test]
    fn test_bbox_overlap_predicate() {
        let bbox = BoundingBox::new(4.0, 52.0, 5.5, 53.0).unwrap();
        assert_eq!(
            bbox_overlap_predicate("bbox", &bbox),
            "\"bbox\"['xmin'] <= 5.5 AND \"bbox\"['xmax'] >= 4.0 \
             AND \"bbox\"['ymin'] <= 53.0 AND \"bbox\"['ymax'] >= 52.0"
        );
    }

    #[test]
    fn test_envelope_predicate() {
        let bbox = BoundingBox::new(-1.0, -2.0, 1.0, 2.0).unwrap();
        assert_eq!(
            envelope_predicate("geometry", &bbox),
            "st_envelope_intersects(\"geometry\", -1.0, -2.0, 1.0, 2.0)"
        );
    }
}
