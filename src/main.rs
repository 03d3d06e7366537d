//! procam-graycode CLI: generate stripe patterns, build masks and decode captures.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use procam_graycode::calibration::{build_mask, GrayCodeSession, MaskPolicy, PatternConfig};
use procam_graycode::config::SessionConfig;
use procam_graycode::export::{
    pattern_file_name, CalibrationExporter, BLACK_FILE_NAME, WHITE_FILE_NAME,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "procam-graycode")]
#[command(about = "Gray code structured light patterns and projector-camera correspondence decoding")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print bit-plane counts and the projection order for a projector.
    Info {
        /// Projector resolution, e.g. 1024x768.
        #[arg(long, value_parser = parse_resolution)]
        projector: (u32, u32),
    },

    /// Write every stripe pattern (and white/black references) as PNG files.
    Patterns {
        /// Projector resolution, e.g. 1024x768.
        #[arg(long, value_parser = parse_resolution)]
        projector: (u32, u32),

        /// Output directory.
        #[arg(long)]
        out: PathBuf,
    },

    /// Build an illumination mask from white and black reference captures.
    Mask {
        #[arg(long)]
        white: PathBuf,

        #[arg(long)]
        black: PathBuf,

        /// Minimum white-minus-black intensity difference.
        #[arg(long, default_value = "10")]
        threshold: i32,

        /// Output mask PNG.
        #[arg(long)]
        out: PathBuf,
    },

    /// Decode a directory of captures into a correspondence map.
    Decode(DecodeArgs),

    /// Write a default session config (JSON or XML by extension).
    InitConfig {
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct DecodeArgs {
    /// Directory holding captures named like the generated patterns.
    #[arg(long)]
    captures: PathBuf,

    /// Session config file (JSON or XML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Projector resolution, overriding the config.
    #[arg(long, value_parser = parse_resolution)]
    projector: Option<(u32, u32)>,

    /// Precomputed mask PNG. Without it, white.png/black.png in the capture
    /// directory are used when present.
    #[arg(long)]
    mask: Option<PathBuf>,

    /// How the mask gates decoded pixels, overriding the config.
    #[arg(long, value_enum)]
    mask_policy: Option<CliMaskPolicy>,

    /// Output correspondence map file.
    #[arg(long)]
    out: PathBuf,

    /// Optional preview PNG of the decoded map.
    #[arg(long)]
    preview: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMaskPolicy {
    Ignore,
    Flag,
    Suppress,
}

impl From<CliMaskPolicy> for MaskPolicy {
    fn from(policy: CliMaskPolicy) -> Self {
        match policy {
            CliMaskPolicy::Ignore => MaskPolicy::Ignore,
            CliMaskPolicy::Flag => MaskPolicy::Flag,
            CliMaskPolicy::Suppress => MaskPolicy::Suppress,
        }
    }
}

fn parse_resolution(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
    let w = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
    let h = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
    Ok((w, h))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Info { projector } => run_info(projector),
        Commands::Patterns { projector, out } => run_patterns(projector, &out),
        Commands::Mask {
            white,
            black,
            threshold,
            out,
        } => run_mask(&white, &black, threshold, &out),
        Commands::Decode(args) => run_decode(&args),
        Commands::InitConfig { out } => {
            SessionConfig::default().save(&out)?;
            Ok(())
        }
    }
}

fn run_info(projector: (u32, u32)) -> anyhow::Result<()> {
    let config = PatternConfig::new(projector.0, projector.1)?;
    println!("Projector:    {}x{}", config.projector_width, config.projector_height);
    println!("Column bits:  {}", config.column_bits);
    println!("Row bits:     {}", config.row_bits);
    println!("Frames:       {}", config.total_frames());
    for (index, spec) in config.pattern_sequence().iter().enumerate() {
        println!("  {:3}  {}", index, pattern_file_name(spec));
    }
    Ok(())
}

fn run_patterns(projector: (u32, u32), out: &Path) -> anyhow::Result<()> {
    // Camera size is irrelevant for pattern generation.
    let session = GrayCodeSession::initialize(projector.0, projector.1, 1, 1)?;
    CalibrationExporter::export_patterns(session.images(), out)?;
    Ok(())
}

fn run_mask(white: &Path, black: &Path, threshold: i32, out: &Path) -> anyhow::Result<()> {
    let white = image::open(white).with_context(|| format!("reading {}", white.display()))?;
    let black = image::open(black).with_context(|| format!("reading {}", black.display()))?;
    let mask = build_mask(&white, &black, threshold)?;
    CalibrationExporter::export_mask(&mask, out)?;
    Ok(())
}

fn run_decode(args: &DecodeArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if let Some((w, h)) = args.projector {
        config.projector_width = w;
        config.projector_height = h;
    }
    if let Some(policy) = args.mask_policy {
        config.mask_policy = policy.into();
    }

    let pattern_config = PatternConfig::new(config.projector_width, config.projector_height)?;
    let mut frames = Vec::with_capacity(pattern_config.total_frames());
    for spec in pattern_config.pattern_sequence() {
        let path = args.captures.join(pattern_file_name(&spec));
        let frame = image::open(&path).with_context(|| format!("reading {}", path.display()))?;
        frames.push(frame);
    }

    // The camera resolution comes from the captures themselves when there are any.
    if let Some(first) = frames.first() {
        config.camera_width = first.width();
        config.camera_height = first.height();
    }

    let mut session = GrayCodeSession::from_config(&config)?;

    if let Some(mask_path) = &args.mask {
        session.set_mask(Some(CalibrationExporter::load_mask(mask_path)?));
    } else {
        let white = args.captures.join(WHITE_FILE_NAME);
        let black = args.captures.join(BLACK_FILE_NAME);
        if white.exists() && black.exists() {
            session.build_mask(
                &image::open(&white)?,
                &image::open(&black)?,
                config.mask_threshold,
            )?;
        } else if config.mask_policy != MaskPolicy::Ignore {
            bail!(
                "mask policy {:?} needs --mask or {}/{} in the capture directory",
                config.mask_policy,
                WHITE_FILE_NAME,
                BLACK_FILE_NAME
            );
        }
    }

    let captures = session.load_captures(&frames)?;
    let map = session.decode(&captures)?;

    CalibrationExporter::save_map(&map, &args.out)?;
    if let Some(preview) = &args.preview {
        CalibrationExporter::export_preview(&map, preview)?;
    }

    println!(
        "Decoded {}x{} map, {} valid pixels",
        map.camera_width,
        map.camera_height,
        map.valid_count()
    );
    Ok(())
}
