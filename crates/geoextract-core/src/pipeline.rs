//! One resolve-then-extract invocation.

use std::path::PathBuf;

use log::info;

use crate::config::ExtractConfig;
use crate::division::Division;
use crate::engine::DataFusionEngine;
use crate::error::Result;
use crate::extract::{ExtractRequest, extract};
use crate::geocode::Geocoder;
use crate::resolver::{DivisionQuery, DivisionResolver};
use crate::{DatasetLocator, QueryEngine};

/// What the user asked for in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub target: DivisionQuery,
    pub theme: String,
    pub kind: String,
    pub output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub division: Division,
    pub output: PathBuf,
}

/// Open an engine, resolve, extract, and close the engine on every path.
///
/// `on_resolved` is called once the division is known, before the extract
/// starts.
///
/// # Errors
///
/// Returns configuration, resolution, and engine errors unchanged.
pub async fn run(
    config: &ExtractConfig,
    invocation: &Invocation,
    geocoder: &dyn Geocoder,
    on_resolved: impl FnOnce(&Division),
) -> Result<PipelineOutcome> {
    config.validate()?;
    let engine = DataFusionEngine::open(config)?;
    let outcome = run_with_engine(&engine, config, invocation, geocoder, on_resolved).await;
    engine.close();
    outcome
}

/// [`run`] against a caller-owned engine.
///
/// # Errors
///
/// Returns resolution and engine errors unchanged.
pub async fn run_with_engine(
    engine: &dyn QueryEngine,
    config: &ExtractConfig,
    invocation: &Invocation,
    geocoder: &dyn Geocoder,
    on_resolved: impl FnOnce(&Division),
) -> Result<PipelineOutcome> {
    let resolver = DivisionResolver::new(engine, geocoder, config);
    let division = resolver.resolve(&invocation.target).await?;
    info!("Found division: {} ({})", division.name, division.id);
    on_resolved(&division);

    let request = ExtractRequest::new(
        division,
        DatasetLocator::new(&config.release, &invocation.theme, &invocation.kind),
        invocation.output.clone(),
    );
    let output = extract(engine, &request, config).await?;
    Ok(PipelineOutcome {
        division: request.division,
        output,
    })
}
