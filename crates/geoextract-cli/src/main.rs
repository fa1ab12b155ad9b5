mod display;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgGroup, Parser};
use geoextract_core::config::{DEFAULT_NOMINATIM_URL, DEFAULT_WIDEN_FACTOR};
use geoextract_core::geocode::NominatimGeocoder;
use geoextract_core::pipeline::{self, Invocation};
use geoextract_core::release::{DEFAULT_RELEASE_ROOT, ReleaseLookup, resolve_release};
use geoextract_core::resolver::DivisionQuery;
use geoextract_core::{ExtractConfig, ExtractError};
use tracing::{Level, info};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "geoextract")]
#[command(version, about = "Extract Overture Maps data inside an administrative boundary", long_about = None)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .args(["division_id", "location"]),
))]
struct Cli {
    /// Output file; `.geojson` writes `GeoJSON`, anything else writes Parquet
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Overture theme, e.g. buildings
    #[arg(long)]
    theme: String,

    /// Feature type within the theme, e.g. building
    #[arg(long = "type", visible_alias = "layer", value_name = "TYPE")]
    kind: String,

    /// Overture division id of the boundary
    #[arg(long, alias = "division_id", value_name = "ID")]
    division_id: Option<String>,

    /// Free-text place name, geocoded and matched against divisions
    #[arg(long, value_name = "TEXT")]
    location: Option<String>,

    /// Release to read, e.g. 2024-08-20.0 (defaults to the latest published)
    #[arg(long, env = "OVERTURE_VERSION")]
    release: Option<String>,

    /// Root holding the release directories (s3:// or a local path)
    #[arg(long, value_name = "URL", default_value = DEFAULT_RELEASE_ROOT)]
    release_root: String,

    /// Do not look up the latest release online
    #[arg(long)]
    skip_latest_lookup: bool,

    /// Factor the geocoded bounding box is scaled by before matching divisions
    #[arg(long, default_value_t = DEFAULT_WIDEN_FACTOR)]
    widen_factor: f64,

    /// Seconds to wait for the geocoder
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    geocode_timeout_secs: u64,

    /// Geocoder search endpoint
    #[arg(long, value_name = "URL", default_value = DEFAULT_NOMINATIM_URL)]
    nominatim_url: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

impl Cli {
    fn target(&self) -> Result<DivisionQuery> {
        match (&self.division_id, &self.location) {
            (Some(id), None) => Ok(DivisionQuery::Id(id.clone())),
            (None, Some(text)) => Ok(DivisionQuery::Text(text.clone())),
            _ => anyhow::bail!("exactly one of --division-id or --location is required"),
        }
    }

    fn release_lookup(&self) -> ReleaseLookup {
        if self.skip_latest_lookup {
            ReleaseLookup::Skip
        } else {
            ReleaseLookup::default()
        }
    }

    fn log_level(&self) -> Level {
        if self.debug {
            Level::DEBUG
        } else if self.verbose {
            Level::INFO
        } else {
            Level::WARN
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    LogTracer::init()?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level())
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match handle_extract(&cli).await {
        Ok(output) => {
            println!("Wrote {}", output.display());
            Ok(ExitCode::SUCCESS)
        },
        Err(err) => {
            report_error(&err);
            Ok(ExitCode::FAILURE)
        },
    }
}

async fn handle_extract(cli: &Cli) -> Result<PathBuf> {
    let target = cli.target()?;
    let release = resolve_release(cli.release.as_deref(), &cli.release_lookup()).await;
    info!("Release {} ({})", release.release, release.source);

    let config = ExtractConfig::new()
        .with_release_root(&cli.release_root)
        .with_release(release.release)
        .with_widen_factor(cli.widen_factor)
        .with_geocode_timeout(Duration::from_secs(cli.geocode_timeout_secs))
        .with_nominatim_url(&cli.nominatim_url);
    let geocoder = NominatimGeocoder::new(&config.nominatim_url, config.geocode_timeout)?;

    let invocation = Invocation {
        target,
        theme: cli.theme.clone(),
        kind: cli.kind.clone(),
        output: cli.output.clone(),
    };
    let outcome = pipeline::run(&config, &invocation, &geocoder, display::display_division).await?;
    Ok(outcome.output)
}

fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<ExtractError>() {
        Some(extract_err) => {
            eprintln!("Error: {}", extract_err.user_message());
            if let Some(suggestion) = extract_err.recovery_suggestion() {
                eprintln!("Hint: {suggestion}");
            }
        },
        None => eprintln!("Error: {err:#}"),
    }
}
