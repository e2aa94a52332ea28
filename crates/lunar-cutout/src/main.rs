//! lunar-cutout - elevation cutouts around lunar features

use clap::{Parser, Subcommand};
use lunar_cutout::{
    open_source, CutoutConfig, CutoutError, CutoutPipeline, CutoutRequest, ProjectionChoice, SizeSpec,
};
use lunar_dem::{GeoTiffCompression, OutputFormat, Resampling};
use lunar_features::FeatureCatalog;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "lunar-cutout")]
#[command(author, version, about = "Elevation cutouts around lunar surface features", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Elevation raster (overrides the configuration)
    #[arg(long, global = true)]
    raster: Option<PathBuf>,

    /// Feature table CSV (overrides the configuration)
    #[arg(long, global = true)]
    features: Option<PathBuf>,

    /// More log output (-v debug, -vv trace); overrides RUST_LOG
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cut out a region around a feature or coordinates
    Cutout {
        /// Feature name (case-insensitive)
        #[arg(required_unless_present_all = ["lon", "lat"])]
        name: Option<String>,
        /// Center longitude in degrees
        #[arg(long, requires = "lat", conflicts_with = "name", allow_hyphen_values = true)]
        lon: Option<f64>,
        /// Center latitude in degrees
        #[arg(long, requires = "lon", conflicts_with = "name", allow_hyphen_values = true)]
        lat: Option<f64>,
        /// Feature diameter in km, for --diameters with coordinates
        #[arg(long)]
        diameter_km: Option<f64>,
        /// Side length in degrees
        #[arg(short, long, conflicts_with = "diameters")]
        size: Option<f64>,
        /// Side length in feature diameters
        #[arg(short, long)]
        diameters: Option<f64>,
        /// Output projection: local-ortho, local-aeqd or none
        #[arg(short, long)]
        projection: Option<ProjectionChoice>,
        /// Resampling: nearest, bilinear or cubic
        #[arg(short, long)]
        resampling: Option<Resampling>,
        /// Output format: geotiff or ascii
        #[arg(short, long, value_parser = ["geotiff", "ascii"])]
        format: Option<String>,
        /// GeoTIFF compression: none, lzw or deflate
        #[arg(long, value_parser = parse_compression)]
        compression: Option<GeoTiffCompression>,
        /// Widen the longitude extent by 1/cos(latitude)
        #[arg(long)]
        width_correction: bool,
        /// Average blocks of N x N pixels in the output
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        downsample: Option<u32>,
        /// Output file (default: <name>.tif or <name>.asc)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a feature from the catalog as JSON
    Lookup {
        /// Feature name (case-insensitive)
        name: String,
    },
    /// Print raster metadata as JSON
    Info,
}

fn parse_compression(s: &str) -> Result<GeoTiffCompression, String> {
    match s.to_ascii_lowercase().as_str() {
        "none" => Ok(GeoTiffCompression::None),
        "lzw" => Ok(GeoTiffCompression::Lzw),
        "deflate" => Ok(GeoTiffCompression::Deflate),
        other => Err(format!("unknown compression '{other}' (expected none, lzw or deflate)")),
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<CutoutConfig, CutoutError> {
    let mut config = match &cli.config {
        Some(path) => CutoutConfig::load(path)?,
        None => CutoutConfig::default(),
    };
    if let Some(raster) = &cli.raster {
        config.raster_path = raster.clone();
    }
    if let Some(features) = &cli.features {
        config.features_path = features.clone();
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<(), CutoutError> {
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Cutout {
            name,
            lon,
            lat,
            diameter_km,
            size,
            diameters,
            projection,
            resampling,
            format,
            compression,
            width_correction,
            downsample,
            output,
        } => {
            config.width_correction |= width_correction;
            config.output = match (format.as_deref(), compression, config.output) {
                (Some("ascii"), _, _) => OutputFormat::AsciiGrid,
                (_, Some(compression), _) => OutputFormat::GeoTiff { compression },
                (Some(_), None, OutputFormat::AsciiGrid) => OutputFormat::default(),
                (_, None, current) => current,
            };

            let mut request = match (name, lon, lat) {
                (Some(name), _, _) => CutoutRequest::feature(name),
                (None, Some(lon), Some(lat)) => {
                    let request = CutoutRequest::coordinates(lon, lat);
                    match diameter_km {
                        Some(d) => request.diameter_km(d),
                        None => request,
                    }
                }
                _ => return Err(CutoutError::Config("give a feature name or --lon and --lat".into())),
            };
            if let Some(deg) = size {
                request = request.size(SizeSpec::Degrees(deg));
            }
            if let Some(multiple) = diameters {
                request = request.size(SizeSpec::Diameters(multiple));
            }
            if let Some(projection) = projection {
                request = request.projection(projection);
            }
            if let Some(resampling) = resampling {
                request = request.resampling(resampling);
            }
            if let Some(factor) = downsample {
                request = request.downsample(factor);
            }

            let output = output.unwrap_or_else(|| {
                PathBuf::from(format!("{}.{}", request.output_stem(), config.output.extension()))
            });
            let mut pipeline = CutoutPipeline::from_config(config)?;
            let written = pipeline.cutout_to_file(&request, &output)?;
            for path in written {
                println!("{}", path.display());
            }
        }
        Commands::Lookup { name } => {
            let catalog = FeatureCatalog::from_path(&config.features_path)?;
            let feature = catalog.lookup(&name)?;
            println!("{}", to_json(feature)?);
        }
        Commands::Info => {
            config.validate()?;
            let source = open_source(&config)?;
            info!(path = %source.path().display(), "raster opened");
            println!("{}", to_json(source.metadata())?);
        }
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, CutoutError> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.kind().exit_code())
        }
    }
}
