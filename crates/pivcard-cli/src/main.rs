use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use pivcard_core::options::EncodingStrategy;
use pivcard_core::{process, ProcessingOptions, ProcessingResult};

#[derive(Parser)]
#[command(name = "pivcard", about = "Turn a facial photo into a PIV/TWIC-compliant JPEG 2000 credential image")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process a source photo into a compliant JP2 credential image.
    Process {
        input: PathBuf,

        /// Output path. Defaults to the input's basename with a `.jp2` extension.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Named preset: `piv-balanced`, `twic-max`, or `archival`.
        #[arg(long)]
        preset: Option<String>,

        /// Fixed bits/pixel encode rate. Mutually exclusive with --target-size.
        #[arg(long)]
        rate: Option<f32>,

        /// Target encoded size, in bytes. Mutually exclusive with --rate.
        #[arg(long = "target-size")]
        target_size: Option<u32>,

        /// ROI resolution level, 0-3, above which ROI priority stops applying.
        #[arg(long = "roi-level")]
        roi_level: Option<u8>,

        /// Disable ROI maxshift priority entirely.
        #[arg(long = "no-roi")]
        no_roi: bool,

        /// Byte-align the ROI region against codeblock boundaries.
        #[arg(long)]
        align: bool,

        /// Minimum face-detector confidence required to accept a face.
        #[arg(long = "min-confidence")]
        min_confidence: Option<f32>,

        /// Maximum eye-levelling rotation, in degrees.
        #[arg(long = "max-rotation")]
        max_rotation: Option<f32>,
    },

    /// Print the fixed inner ROI region this build uses.
    Roi {
        /// Source photo, accepted for parity with `process` but otherwise unused: the ROI region
        /// is a fixed fraction of the 420x560 output frame, independent of the source image.
        input: PathBuf,
    },
}

fn main() {
    env_logger::Builder::new()
        .filter(Some(env!("CARGO_CRATE_NAME")), if cfg!(debug_assertions) { LevelFilter::Debug } else { LevelFilter::Info })
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Process { input, output, preset, rate, target_size, roi_level, no_roi, align, min_confidence, max_rotation } => {
            run_process(input, output, preset, rate, target_size, roi_level, no_roi, align, min_confidence, max_rotation)
        }
        Command::Roi { input: _ } => {
            let roi = pivcard_core::RoiSet::build();
            let region = roi.inner_region();
            println!("{} region: {:?} (priority {})", region.name, region.rect, region.priority);
            Ok(())
        }
    };

    if let Err(e) = result {
        log::error!("{e:#}");
        std::process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn run_process(
    input: PathBuf,
    output: Option<PathBuf>,
    preset: Option<String>,
    rate: Option<f32>,
    target_size: Option<u32>,
    roi_level: Option<u8>,
    no_roi: bool,
    align: bool,
    min_confidence: Option<f32>,
    max_rotation: Option<f32>,
) -> anyhow::Result<()> {
    let mut options = match preset.as_deref() {
        Some("piv-balanced") => pivcard_core::options::piv_balanced(),
        Some("twic-max") => pivcard_core::options::twic_max(),
        Some("archival") => pivcard_core::options::archival(),
        Some(other) => anyhow::bail!("unknown preset '{other}' (expected piv-balanced, twic-max, or archival)"),
        None => ProcessingOptions::default(),
    };

    if let Some(rate) = rate {
        options.strategy = EncodingStrategy::FixedRate { rate };
    }
    if let Some(target_bytes) = target_size {
        options.strategy = EncodingStrategy::TargetSize { target_bytes };
    }
    if let Some(level) = roi_level {
        options.roi_start_level = level;
    }
    if no_roi {
        options.enable_roi = false;
    }
    options.align_roi = align;
    if let Some(confidence) = min_confidence {
        options.min_face_confidence = confidence;
    }
    if let Some(max_rotation) = max_rotation {
        options.max_rotation_degrees = max_rotation;
    }

    let bytes = std::fs::read(&input)?;
    let result: ProcessingResult = process(&bytes, &options)?;

    let output_path = output.unwrap_or_else(|| input.with_extension("jp2"));
    std::fs::write(&output_path, &result.jp2_bytes)?;

    log::info!(
        "wrote {} ({} bytes, {} encode attempt(s), compliance {:?})",
        output_path.display(),
        result.jp2_bytes.len(),
        result.encode_attempts.len(),
        result.compliance.severity,
    );
    for issue in &result.compliance.issues {
        log::warn!("compliance: {issue}");
    }

    Ok(())
}
