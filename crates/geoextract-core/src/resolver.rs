//! Division resolution.
//!
//! Two entry paths, each ending in exactly one [`Division`] or an error:
//!
//! - by identifier: exact match on `id`;
//! - by free text: geocode, widen the top candidate's bounding box, search
//!   the divisions dataset inside it, and keep the row whose display name is
//!   most similar to the geocoder's name.

use std::cmp::Ordering;
use std::fmt;
use std::time::Duration;

use log::{debug, info};

use crate::bbox::BoundingBox;
use crate::config::ExtractConfig;
use crate::division::{Division, DivisionCandidate};
use crate::error::{ExtractError, Result};
use crate::geocode::Geocoder;
use crate::sql::{bbox_overlap_predicate, envelope_predicate, quote_ident, quote_literal};
use crate::{DatasetLocator, QueryEngine};

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DivisionQuery {
    /// A stable division identifier
    Id(String),
    /// Free text for the geocoder
    Text(String),
}

impl fmt::Display for DivisionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DivisionQuery::Id(id) => write!(f, "{id}"),
            DivisionQuery::Text(text) => write!(f, "{text}"),
        }
    }
}

/// Resolves a [`DivisionQuery`] against one release's divisions dataset.
pub struct DivisionResolver<'a> {
    engine: &'a dyn QueryEngine,
    geocoder: &'a dyn Geocoder,
    divisions: DatasetLocator,
    widen_factor: f64,
    geocode_timeout: Duration,
    geometry_column: String,
    bbox_column: String,
}

impl<'a> DivisionResolver<'a> {
    #[must_use]
    pub fn new(
        engine: &'a dyn QueryEngine,
        geocoder: &'a dyn Geocoder,
        config: &ExtractConfig,
    ) -> Self {
        Self {
            engine,
            geocoder,
            divisions: DatasetLocator::divisions(&config.release),
            widen_factor: config.widen_factor,
            geocode_timeout: config.geocode_timeout,
            geometry_column: config.geometry_column.clone(),
            bbox_column: config.bbox_column.clone(),
        }
    }

    /// # Errors
    ///
    /// See [`DivisionResolver::resolve_by_id`] and
    /// [`DivisionResolver::resolve_by_query`].
    pub async fn resolve(&self, query: &DivisionQuery) -> Result<Division> {
        match query {
            DivisionQuery::Id(id) => self.resolve_by_id(id).await,
            DivisionQuery::Text(text) => self.resolve_by_query(text).await,
        }
    }

    /// Exact-match lookup on the division identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::NotFound`] naming `id` when no row matches, or
    /// the engine error when the lookup fails.
    pub async fn resolve_by_id(&self, id: &str) -> Result<Division> {
        info!("Resolving division by id {id}");
        self.fetch_division(id)
            .await?
            .ok_or_else(|| ExtractError::not_found(id))
    }

    /// Free-text resolution through the geocoder.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::GeocodeTimeout`] when the geocoder misses the deadline
    /// - [`ExtractError::NotFound`] naming `text` when the geocoder has no
    ///   candidate or no division lies near it
    /// - engine errors, unchanged
    pub async fn resolve_by_query(&self, text: &str) -> Result<Division> {
        info!("Resolving division by query \"{text}\"");
        let candidates = tokio::time::timeout(self.geocode_timeout, self.geocoder.geocode(text))
            .await
            .map_err(|_| ExtractError::GeocodeTimeout {
                query: text.to_string(),
                timeout: self.geocode_timeout,
            })??;

        let Some(top) = candidates.into_iter().next() else {
            return Err(ExtractError::not_found(text));
        };
        let search_box = BoundingBox::of(&top.geometry)?.scale_around_center(self.widen_factor)?;
        debug!("Geocoder matched \"{}\"; searching {search_box:?}", top.name);

        let table = self.engine.register_dataset(&self.divisions).await?;
        let statement = format!(
            "SELECT {id}, {names} FROM {table} WHERE {overlap} AND {envelope}",
            id = quote_ident("id"),
            names = quote_ident("names"),
            table = quote_ident(&table),
            overlap = bbox_overlap_predicate(&self.bbox_column, &search_box),
            envelope = envelope_predicate(&self.geometry_column, &search_box),
        );
        debug!("Candidate search: {statement}");

        let rows = self.engine.run_query(&statement).await?;
        let candidates = rows
            .into_iter()
            .map(DivisionCandidate::from_row)
            .collect::<Result<Vec<_>>>()?;
        debug!("{} division(s) near \"{}\"", candidates.len(), top.name);

        let best = rank_candidates(&top.name, candidates)
            .ok_or_else(|| ExtractError::not_found(text))?;
        debug!(
            "Best match {} ({:?}, similarity {:.3})",
            best.candidate.id,
            best.candidate.display_name(),
            best.similarity
        );

        self.fetch_division(&best.candidate.id)
            .await?
            .ok_or_else(|| ExtractError::not_found(text))
    }

    async fn fetch_division(&self, id: &str) -> Result<Option<Division>> {
        let table = self.engine.register_dataset(&self.divisions).await?;
        let statement = format!(
            "SELECT {id_col}, {names}, {subtype}, {class}, st_asgeojson({geometry}) AS {alias} \
             FROM {table} WHERE {id_col} = {id} LIMIT 1",
            id_col = quote_ident("id"),
            names = quote_ident("names"),
            subtype = quote_ident("subtype"),
            class = quote_ident("class"),
            geometry = quote_ident(&self.geometry_column),
            alias = quote_ident(Division::GEOJSON_ALIAS),
            table = quote_ident(&table),
            id = quote_literal(id),
        );
        debug!("Division fetch: {statement}");

        self.engine
            .run_query(&statement)
            .await?
            .into_iter()
            .next()
            .map(Division::from_row)
            .transpose()
    }
}

/// A candidate with its name similarity to the geocoder's name.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub candidate: DivisionCandidate,
    pub similarity: f64,
}

/// Highest Jaro similarity wins; ties go to the smallest id. No threshold.
#[must_use]
pub fn rank_candidates(
    target: &str,
    candidates: impl IntoIterator<Item = DivisionCandidate>,
) -> Option<RankedCandidate> {
    candidates
        .into_iter()
        .map(|candidate| {
            let similarity = strsim::jaro(candidate.display_name().unwrap_or_default(), target);
            RankedCandidate {
                candidate,
                similarity,
            }
        })
        .max_by(|a, b| {
            a.similarity
                .partial_cmp(&b.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.candidate.id.cmp(&a.candidate.id))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::GeocodeCandidate;
    use crate::{ColumnDescriptor, EngineResult, OutputFormat, Row};
    use async_trait::async_trait;
    use geo_types::{Geometry, polygon};
    use serde_json::json;
    use std::path::Path;
    use std::sync::Mutex;

    const SQUARE: &str =
        r#"{"type":"Polygon","coordinates":[[[4,52],[5,52],[5,53],[4,53],[4,52]]]}"#;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    fn candidate(id: &str, en: Option<&str>, primary: &str) -> DivisionCandidate {
        let common = en.map(|en| json!({"en": en})).unwrap_or(json!(null));
        DivisionCandidate::from_row(row(json!({
            "id": id,
            "names": {"primary": primary, "common": common},
        })))
        .unwrap()
    }

    /// Answers candidate searches and id lookups from fixed rows.
    #[derive(Default)]
    struct MockEngine {
        candidates: Vec<Row>,
        divisions: Vec<Row>,
        statements: Mutex<Vec<String>>,
    }

    impl MockEngine {
        fn statements(&self) -> Vec<String> {
            self.statements.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryEngine for MockEngine {
        async fn register_dataset(&self, locator: &DatasetLocator) -> EngineResult<String> {
            Ok(locator.table_name())
        }

        async fn describe_schema(
            &self,
            _locator: &DatasetLocator,
        ) -> EngineResult<Vec<ColumnDescriptor>> {
            Ok(Vec::new())
        }

        async fn run_query(&self, statement: &str) -> EngineResult<Vec<Row>> {
            self.statements.lock().unwrap().push(statement.to_string());
            if statement.contains("st_envelope_intersects") {
                return Ok(self.candidates.clone());
            }
            Ok(self
                .divisions
                .iter()
                .filter(|r| {
                    let id = r["id"].as_str().unwrap();
                    statement.contains(&format!("\"id\" = '{id}'"))
                })
                .cloned()
                .collect())
        }

        async fn copy_to(&self, _: &str, _: &Path, _: OutputFormat) -> EngineResult<u64> {
            Ok(0)
        }
    }

    struct StubGeocoder {
        candidates: Vec<GeocodeCandidate>,
        delay: Duration,
    }

    impl StubGeocoder {
        fn amsterdam() -> Self {
            Self {
                candidates: vec![GeocodeCandidate {
                    name: "Amsterdam".to_string(),
                    geometry: Geometry::Polygon(polygon![
                        (x: 4.5, y: 52.0),
                        (x: 5.0, y: 52.0),
                        (x: 5.0, y: 52.5),
                        (x: 4.5, y: 52.5),
                    ]),
                }],
                delay: Duration::ZERO,
            }
        }

        fn empty() -> Self {
            Self {
                candidates: Vec::new(),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl Geocoder for StubGeocoder {
        async fn geocode(&self, _query: &str) -> Result<Vec<GeocodeCandidate>> {
            tokio::time::sleep(self.delay).await;
            Ok(self.candidates.clone())
        }
    }

    fn division_row(id: &str, primary: &str) -> Row {
        row(json!({
            "id": id,
            "names": {"primary": primary, "common": null},
            "subtype": "locality",
            "class": null,
            "geometry_geojson": SQUARE,
        }))
    }

    #[test]
    fn test_rank_prefers_similar_name() {
        let best = rank_candidates(
            "Amsterdam",
            vec![
                candidate("a", None, "Noord-Holland"),
                candidate("b", None, "Amsterdam"),
                candidate("c", None, "Amstelveen"),
            ],
        )
        .unwrap();
        assert_eq!(best.candidate.id, "b");
        assert!((best.similarity - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rank_uses_english_common_name() {
        let best = rank_candidates(
            "The Hague",
            vec![
                candidate("a", Some("The Hague"), "Den Haag"),
                candidate("b", None, "Den Haag"),
            ],
        )
        .unwrap();
        assert_eq!(best.candidate.id, "a");
    }

    #[test]
    fn test_rank_ties_go_to_smallest_id() {
        let best = rank_candidates(
            "Utrecht",
            vec![
                candidate("z", None, "Utrecht"),
                candidate("m", None, "Utrecht"),
                candidate("q", None, "Utrecht"),
            ],
        )
        .unwrap();
        assert_eq!(best.candidate.id, "m");
    }

    #[test]
    fn test_rank_accepts_low_similarity() {
        let best = rank_candidates("Amsterdam", vec![candidate("x", None, "Zzz")]).unwrap();
        assert_eq!(best.candidate.id, "x");
        assert!(rank_candidates("Amsterdam", Vec::new()).is_none());
    }

    #[tokio::test]
    async fn test_resolve_by_id_found() {
        let engine = MockEngine {
            divisions: vec![division_row("div-1", "Amsterdam")],
            ..MockEngine::default()
        };
        let geocoder = StubGeocoder::empty();
        let resolver = DivisionResolver::new(&engine, &geocoder, &ExtractConfig::default());

        let division = resolver
            .resolve(&DivisionQuery::Id("div-1".to_string()))
            .await
            .unwrap();
        assert_eq!(division.id, "div-1");
        assert_eq!(division.name, "Amsterdam");
    }

    #[tokio::test]
    async fn test_resolve_by_id_absent() {
        let engine = MockEngine::default();
        let geocoder = StubGeocoder::empty();
        let resolver = DivisionResolver::new(&engine, &geocoder, &ExtractConfig::default());

        let err = resolver.resolve_by_id("0000").await.unwrap_err();
        assert_eq!(err.to_string(), "Division \"0000\" not found");
    }

    #[tokio::test]
    async fn test_resolve_by_query_without_candidates_skips_engine() {
        let engine = MockEngine::default();
        let geocoder = StubGeocoder::empty();
        let resolver = DivisionResolver::new(&engine, &geocoder, &ExtractConfig::default());

        let err = resolver.resolve_by_query("Atlantis").await.unwrap_err();
        assert_eq!(err.to_string(), "Division \"Atlantis\" not found");
        assert!(engine.statements().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_by_query_picks_best_name() {
        let engine = MockEngine {
            candidates: vec![
                row(json!({"id": "b", "names": {"primary": "Noord-Holland"}})),
                row(json!({"id": "a", "names": {"primary": "Amsterdam"}})),
            ],
            divisions: vec![division_row("a", "Amsterdam"), division_row("b", "Noord-Holland")],
            ..MockEngine::default()
        };
        let geocoder = StubGeocoder::amsterdam();
        let resolver = DivisionResolver::new(&engine, &geocoder, &ExtractConfig::default());

        let division = resolver.resolve_by_query("amsterdam").await.unwrap();
        assert_eq!(division.id, "a");

        let statements = engine.statements();
        assert_eq!(statements.len(), 2);
        // 0.5 degree square doubled around (4.75, 52.25)
        assert!(
            statements[0].contains("\"bbox\"['xmin'] <= 5.25 AND \"bbox\"['xmax'] >= 4.25"),
            "{}",
            statements[0]
        );
        assert!(
            statements[0].contains("st_envelope_intersects(\"geometry\", 4.25, 51.75, 5.25, 52.75)")
        );
        assert!(statements[1].contains("\"id\" = 'a'"));
    }

    #[tokio::test]
    async fn test_resolve_by_query_without_rows() {
        let engine = MockEngine::default();
        let geocoder = StubGeocoder::amsterdam();
        let resolver = DivisionResolver::new(&engine, &geocoder, &ExtractConfig::default());

        let err = resolver.resolve_by_query("Amsterdam").await.unwrap_err();
        assert!(matches!(err, ExtractError::NotFound { ref query } if query == "Amsterdam"));
    }

    #[tokio::test]
    async fn test_geocode_timeout() {
        let engine = MockEngine::default();
        let geocoder = StubGeocoder {
            delay: Duration::from_secs(5),
            ..StubGeocoder::amsterdam()
        };
        let config = ExtractConfig::default().with_geocode_timeout(Duration::from_millis(20));
        let resolver = DivisionResolver::new(&engine, &geocoder, &config);

        let err = resolver.resolve_by_query("Amsterdam").await.unwrap_err();
        assert!(matches!(err, ExtractError::GeocodeTimeout { .. }));
        assert!(engine.statements().is_empty());
    }
}
