//! Mirrored-repeat sampler verification binary
//!
//! Runs a mirrored-repeat sampling kernel on the selected backend, compares its
//! output with the host reference evaluator and prints both buffers.
//!
//! A comparison failure is reported on stdout/stderr and still exits with 0;
//! only backend, kernel or configuration errors exit with 1.
//!
//! # Usage
//! ```bash
//! verify_mirrored_repeat --backend gpu --offset 5,2 --dump on-failure
//! ```

use clap::Parser;
use mirror_sampler::{ComputeBackend, CpuBackend, Offset};
use mirror_sampler_verification::{
    harness::{HarnessConfig, Verification},
    report::{DumpPolicy, describe_mismatch, render_report},
    wgpu_backend::{KernelVariant, WgpuContext, WgpuMirrorBackend, load_kernel_source},
};
use std::path::PathBuf;
use std::process::ExitCode;

/// Command-line arguments for the verification run
#[derive(Parser)]
#[command(version, about = "Verify a GPU mirrored-repeat sampling kernel against a CPU reference")]
struct Args {
    /// Backend under test (gpu, sampler, cpu)
    #[arg(long, short, default_value = "gpu")]
    backend: String,

    /// WGSL kernel source; defaults to the kernel shipped for the selected backend
    #[arg(long, short)]
    kernel: Option<PathBuf>,

    /// Source image dimensions as WIDTHxHEIGHT
    #[arg(long, default_value = "4x5", value_parser = parse_dimensions)]
    source: (u32, u32),

    /// Destination image dimensions as WIDTHxHEIGHT
    #[arg(long, default_value = "12x12", value_parser = parse_dimensions)]
    destination: (u32, u32),

    /// Offset subtracted from destination coordinates, as X,Y
    #[arg(long, short, default_value = "5,2", value_parser = parse_offset)]
    offset: Offset,

    /// When to print both buffers (always, on-failure, never)
    #[arg(long, default_value = "always")]
    dump: DumpPolicy,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,
}

/// Parses `WIDTHxHEIGHT`
fn parse_dimensions(s: &str) -> Result<(u32, u32), String> {
    let (width, height) = s.split_once(['x', 'X']).ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let width = width.trim().parse().map_err(|e| format!("invalid width '{width}': {e}"))?;
    let height = height.trim().parse().map_err(|e| format!("invalid height '{height}': {e}"))?;
    Ok((width, height))
}

/// Parses `X,Y`
fn parse_offset(s: &str) -> Result<Offset, String> {
    let (x, y) = s.split_once(',').ok_or_else(|| format!("expected X,Y, got '{s}'"))?;
    let x = x.trim().parse().map_err(|e| format!("invalid x offset '{x}': {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("invalid y offset '{y}': {e}"))?;
    Ok(Offset::new(x, y))
}

/// Runs the harness against `backend` and prints the outcome
///
/// A mismatch is printed, not returned as an error.
fn verify<B: ComputeBackend>(verification: &Verification, backend: &mut B) -> Result<(), Box<dyn std::error::Error>> {
    let report = verification.run(backend)?;

    if let Some(diagnostic) = describe_mismatch(&report.result) {
        eprintln!("{diagnostic}");
    }
    print!("{}", render_report(&report, verification.config().dump));

    Ok(())
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = HarnessConfig {
        source_dims: args.source,
        destination_dims: args.destination,
        offset: args.offset,
        dump: args.dump,
    };
    let verification = Verification::new(config)?;

    // Parse and validate the backend selection
    let variant = match args.backend.to_lowercase().as_str() {
        "gpu" | "manual" => KernelVariant::Manual,
        "sampler" => KernelVariant::HardwareSampler,
        "cpu" => {
            if args.kernel.is_some() {
                tracing::warn!("--kernel is ignored by the cpu backend");
            }
            return verify(&verification, &mut CpuBackend::new());
        }
        _ => return Err(format!("Invalid backend '{}'. Valid backends: gpu, sampler, cpu", args.backend).into()),
    };

    let kernel_path = args.kernel.unwrap_or_else(|| variant.default_kernel_path());
    tracing::info!("Kernel: {}", kernel_path.display());
    let kernel_source = load_kernel_source(&kernel_path)?;

    let context = WgpuContext::new().await?;
    let mut backend = WgpuMirrorBackend::new(context, &kernel_path, kernel_source, variant)?;

    verify(&verification, &mut backend)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let subscriber = tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install logger: {e}");
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
