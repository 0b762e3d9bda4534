// ============================================================================
// fftblur CLI: local batch filtering, the filter service, and its client
// ============================================================================
//
// Usage examples:
//   fftblur process -i photo.png -o blurred.png --action blur --sigma 3
//   fftblur process -i blurred.png -o restored.png --action deblur --sigma 3 --k 0.001
//   fftblur process -i "shots/*.jpg" --output-dir out/ --action blur --workers 8
//   fftblur serve --addr 0.0.0.0:8080 --job-workers 4
//   fftblur send -i photo.jpg -o result.png --addr 127.0.0.1:8080 --action deblur
//   fftblur defaults --sigma 3 --padding edge --write
//
// Defaults come from the settings file (see `settings.rs`); flags override it.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::client::send_file;
use crate::error::{FilterError, Result};
use crate::imgproc::{Dispatcher, FilterConfig, FilterMode, PaddingMode, process_image};
use crate::io::{SaveFormat, encode_and_write, load_image};
use crate::protocol::WireConfig;
use crate::server::{RequestLimits, Server, ServerConfig};
use crate::settings::Settings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Frequency-domain Gaussian blur and Wiener deblur for grayscale images.
#[derive(Parser, Debug)]
#[command(
    name = "fftblur",
    about = "FFT-based Gaussian blur / Wiener deblur",
    long_about = "Converts images to luminance, pads them to power-of-two sizes and\n\
                  filters them in the frequency domain: Gaussian convolution (blur)\n\
                  or Wiener deconvolution (deblur). Runs locally, as a TCP service,\n\
                  or as a client of that service.\n\n\
                  Example:\n  \
                  fftblur process -i photo.png -o out.png --action blur --sigma 3\n  \
                  fftblur serve --addr 127.0.0.1:8080"
)]
pub struct CliArgs {
    /// Settings file to read defaults from (default: per-user settings path).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Mirror log output to stderr and print per-file timing.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Filter image files on this machine.
    Process(ProcessArgs),
    /// Run the filter service.
    Serve(ServeArgs),
    /// Send one image to a running service and save the result.
    Send(SendArgs),
    /// Show the effective defaults, optionally changing and saving them.
    Defaults(DefaultsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionArg {
    Blur,
    Deblur,
}

impl From<ActionArg> for FilterMode {
    fn from(a: ActionArg) -> Self {
        match a {
            ActionArg::Blur => FilterMode::Blur,
            ActionArg::Deblur => FilterMode::Deblur,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaddingArg {
    /// Zero luminance outside the image (dark borders)
    Zero,
    /// Replicate the nearest edge pixel
    Edge,
}

impl From<PaddingArg> for PaddingMode {
    fn from(p: PaddingArg) -> Self {
        match p {
            PaddingArg::Zero => PaddingMode::Zero,
            PaddingArg::Edge => PaddingMode::Edge,
        }
    }
}

/// Filter parameters shared by `process` and `send`.
#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// blur = Gaussian convolution, deblur = Wiener deconvolution.
    #[arg(short, long, value_enum)]
    pub action: Option<ActionArg>,

    /// Gaussian spread (blur radius), > 0.
    #[arg(long)]
    pub sigma: Option<f64>,

    /// Wiener regularization constant, >= 0. Ignored when blurring.
    #[arg(short, long)]
    pub k: Option<f64>,
}

impl FilterArgs {
    fn resolve(&self, settings: &Settings) -> Result<FilterConfig> {
        let mode = self.action.map(FilterMode::from).unwrap_or(settings.action);
        FilterConfig::new(
            mode,
            self.sigma.unwrap_or(settings.sigma),
            self.k.unwrap_or(settings.k),
        )
    }
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    /// Files are written here with the original stem and the target format's extension.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, bmp, tga, tiff.
    /// When omitted, inferred from --output's extension, then the settings file.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100).
    #[arg(short, long, value_name = "1-100")]
    pub quality: Option<u8>,

    /// Maximum concurrent workers for the row/column passes.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Fill used when padding to power-of-two dimensions.
    #[arg(long, value_enum)]
    pub padding: Option<PaddingArg>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address.
    #[arg(long, value_name = "HOST:PORT")]
    pub addr: Option<String>,

    /// Number of jobs processed concurrently.
    #[arg(long)]
    pub job_workers: Option<usize>,

    /// Maximum concurrent workers inside each job.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Fill used when padding to power-of-two dimensions.
    #[arg(long, value_enum)]
    pub padding: Option<PaddingArg>,

    /// Reject images wider or taller than this.
    #[arg(long, value_name = "PIXELS", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_dimension: Option<u32>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Image to send.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Where to save the result.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Service address.
    #[arg(long, value_name = "HOST:PORT")]
    pub addr: Option<String>,

    /// Output format (inferred from --output's extension when omitted).
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100).
    #[arg(short, long, value_name = "1-100")]
    pub quality: Option<u8>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args, Debug)]
pub struct DefaultsArgs {
    #[command(flatten)]
    pub filter: FilterArgs,

    /// Worker ceiling for the row/column passes.
    #[arg(short, long)]
    pub workers: Option<usize>,

    #[arg(long, value_enum)]
    pub padding: Option<PaddingArg>,

    /// Service address.
    #[arg(long, value_name = "HOST:PORT")]
    pub addr: Option<String>,

    #[arg(long)]
    pub job_workers: Option<usize>,

    /// Largest image width or height the service accepts.
    #[arg(long, value_name = "PIXELS", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_dimension: Option<u32>,

    /// JPEG quality (1–100).
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// Save the result to the settings file (or `--config`).
    #[arg(long)]
    pub write: bool,
}

impl DefaultsArgs {
    /// Apply the given flags on top of `settings`, validating each value.
    fn apply(&self, settings: &Settings) -> Result<Settings> {
        let filter = self.filter.resolve(settings)?;
        let mut out = settings.clone();
        out.action = filter.mode();
        out.sigma = filter.sigma();
        out.k = filter.k();
        for count in [self.workers, self.job_workers].into_iter().flatten() {
            if count == 0 {
                return Err(FilterError::InvalidWorkers(count));
            }
        }
        out.workers = self.workers.unwrap_or(out.workers);
        out.job_workers = self.job_workers.unwrap_or(out.job_workers);
        out.max_dimension = self.max_dimension.unwrap_or(out.max_dimension);
        out.padding = self.padding.map(PaddingMode::from).unwrap_or(out.padding);
        out.quality = self.quality.unwrap_or(out.quality);
        if let Some(addr) = &self.addr {
            out.server_addr = addr.clone();
        }
        Ok(out)
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the selected subcommand and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    crate::logger::set_echo(args.verbose);
    let settings = match &args.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };

    match args.command {
        Command::Process(p) => run_process(p, &settings, args.verbose),
        Command::Serve(s) => report(run_serve(s, &settings)),
        Command::Send(s) => report(run_send(s, &settings)),
        Command::Defaults(d) => report(run_defaults(d, &settings, args.config.as_deref())),
    }
}

/// Exit status for a failed run: 2 for rejected arguments, 1 for anything else.
fn exit_status(e: &FilterError) -> u8 {
    if e.is_precondition() { 2 } else { 1 }
}

fn fail(e: &FilterError) -> ExitCode {
    log_err!("{}", e);
    eprintln!("error: {}", e);
    ExitCode::from(exit_status(e))
}

fn report(result: Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

// ============================================================================
// process: local batch pipeline
// ============================================================================

fn run_process(args: ProcessArgs, settings: &Settings, verbose: bool) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    // Multiple inputs require --output-dir, not --output
    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let config = match args.filter.resolve(settings) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let workers = args.workers.unwrap_or(settings.workers);
    let dispatcher = match Dispatcher::new(workers) {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };
    let padding = args.padding.map(PaddingMode::from).unwrap_or(settings.padding);
    let format = SaveFormat::resolve(args.format.as_deref(), args.output.as_deref(), settings.format);
    let quality = args.quality.unwrap_or(settings.quality);

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(), e
        );
        return ExitCode::FAILURE;
    }

    println!(
        "action: {}\nsigma: {:.2}\nk: {:.6}\nworkers: {}\npadding: {}",
        config.mode().action(),
        config.sigma(),
        config.k(),
        dispatcher.workers(),
        padding.name()
    );
    if verbose && let Some(path) = crate::logger::log_path() {
        println!("log: {}", path.display());
    }

    let batch_start = Instant::now();
    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        let output_path = match build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            format,
        ) {
            Some(p) => p,
            None => {
                eprintln!(
                    "  error: cannot determine output path for '{}'.",
                    input_path.display()
                );
                any_failure = true;
                continue;
            }
        };

        if multi {
            println!("[{}/{}] {} -> {}", idx + 1, total, input_path.display(), output_path.display());
        } else {
            println!("image: {} -> {}", input_path.display(), output_path.display());
        }

        let file_start = Instant::now();
        match run_one(input_path, &output_path, &config, padding, format, quality, &dispatcher) {
            Ok((w, h, pw, ph)) => {
                println!("height: {}, width: {}", h, w);
                println!("padded height: {}, padded width: {}", ph, pw);
                if verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    println!("ended in {:.2?}", batch_start.elapsed());

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

/// Load → filter → save one file. Returns `(w, h, padded_w, padded_h)`.
fn run_one(
    input:      &Path,
    output:     &Path,
    config:     &FilterConfig,
    padding:    PaddingMode,
    format:     SaveFormat,
    quality:    u8,
    dispatcher: &Dispatcher,
) -> Result<(usize, usize, usize, usize)> {
    let img = load_image(input)?;
    let done = process_image(&img, config, padding, dispatcher)?;
    encode_and_write(&done.image, output, format, quality)?;
    log_info!(
        "{} -> {} in {:.1}ms",
        input.display(),
        output.display(),
        done.elapsed.as_secs_f64() * 1000.0
    );
    Ok((done.width, done.height, done.padded_width, done.padded_height))
}

// ============================================================================
// serve / send
// ============================================================================

fn run_serve(args: ServeArgs, settings: &Settings) -> Result<()> {
    let config = ServerConfig {
        addr: args.addr.unwrap_or_else(|| settings.server_addr.clone()),
        job_workers: args.job_workers.unwrap_or(settings.job_workers),
        workers: args.workers.unwrap_or(settings.workers),
        padding: args.padding.map(PaddingMode::from).unwrap_or(settings.padding),
        limits: RequestLimits {
            max_dimension: args.max_dimension.unwrap_or(settings.max_dimension),
            ..RequestLimits::default()
        },
    };
    let server = Server::bind(&config)?;
    println!("service started on {}", server.local_addr()?);
    if let Some(path) = crate::logger::log_path() {
        println!("log: {}", path.display());
    }
    server.serve()
}

fn run_send(args: SendArgs, settings: &Settings) -> Result<()> {
    let config = args.filter.resolve(settings)?;
    let addr = args.addr.unwrap_or_else(|| settings.server_addr.clone());
    let format = SaveFormat::resolve(args.format.as_deref(), Some(args.output.as_path()), settings.format);
    let quality = args.quality.unwrap_or(settings.quality);

    let start = Instant::now();
    let result = send_file(&addr, &WireConfig::from(&config), &args.input)?;
    encode_and_write(&result.to_luma8(), &args.output, format, quality)?;
    println!(
        "image saved: {} ({:.0}ms)",
        args.output.display(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}

fn run_defaults(args: DefaultsArgs, settings: &Settings, config_path: Option<&Path>) -> Result<()> {
    let updated = args.apply(settings)?;
    print!("{}", updated.to_config_string());
    if args.write {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => Settings::settings_path().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "no settings directory for this user")
            })?,
        };
        updated.save_to(&path)?;
        println!("settings saved: {}", path.display());
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            // Literal path: use directly
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        // Treat as glob pattern
        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: same directory as input, `<stem>_filtered.<ext>`
fn build_output_path(
    input:      &Path,
    output:     Option<&Path>,
    output_dir: Option<&Path>,
    format:     SaveFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext  = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_filtered.{}", stem, ext)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_process_flags() {
        let args = CliArgs::try_parse_from([
            "fftblur", "process", "-i", "a.png", "-o", "b.png", "--action", "blur",
            "--sigma", "2.5", "--workers", "3", "--padding", "edge",
        ])
        .unwrap();
        let Command::Process(p) = args.command else { panic!("wrong subcommand") };
        assert_eq!(p.input, vec!["a.png".to_string()]);
        assert_eq!(p.filter.action, Some(ActionArg::Blur));
        assert_eq!(p.filter.sigma, Some(2.5));
        assert_eq!(p.workers, Some(3));
        assert_eq!(p.padding, Some(PaddingArg::Edge));
    }

    #[test]
    fn flags_override_settings() {
        let settings = Settings { sigma: 7.0, k: 0.2, ..Settings::default() };
        let filter = FilterArgs { action: Some(ActionArg::Blur), sigma: None, k: Some(0.5) };
        let cfg = filter.resolve(&settings).unwrap();
        assert_eq!(cfg.mode(), FilterMode::Blur);
        assert_eq!(cfg.sigma(), 7.0);
        assert_eq!(cfg.k(), 0.5);

        let bad = FilterArgs { action: None, sigma: Some(-1.0), k: None };
        assert!(bad.resolve(&settings).is_err());
    }

    #[test]
    fn unknown_action_rejected_by_cli() {
        assert!(CliArgs::try_parse_from(["fftblur", "send", "-i", "a", "-o", "b", "--action", "sharpen"]).is_err());
    }

    #[test]
    fn rejected_arguments_exit_with_two() {
        assert_eq!(exit_status(&FilterError::InvalidSigma(0.0)), 2);
        assert_eq!(exit_status(&FilterError::InvalidWorkers(0)), 2);
        assert_eq!(exit_status(&FilterError::Protocol("closed".into())), 1);
    }

    #[test]
    fn serve_accepts_dimension_cap() {
        let args = CliArgs::try_parse_from(["fftblur", "serve", "--max-dimension", "512"]).unwrap();
        let Command::Serve(s) = args.command else { panic!("wrong subcommand") };
        assert_eq!(s.max_dimension, Some(512));
    }

    #[test]
    fn defaults_write_to_config_file() {
        let dir = std::env::temp_dir().join(format!("fftblur-cli-{}", std::process::id()));
        let path = dir.join("fftblur_settings.cfg");
        let args = CliArgs::try_parse_from([
            "fftblur", "defaults", "--sigma", "3.5", "--padding", "edge", "--job-workers", "6", "--write",
        ])
        .unwrap();
        let Command::Defaults(d) = args.command else { panic!("wrong subcommand") };

        run_defaults(d, &Settings::default(), Some(&path)).unwrap();
        let saved = Settings::load_from(&path);
        assert_eq!(saved.sigma, 3.5);
        assert_eq!(saved.padding, PaddingMode::Edge);
        assert_eq!(saved.job_workers, 6);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn defaults_reject_bad_values() {
        let args = CliArgs::try_parse_from(["fftblur", "defaults", "--workers", "0"]).unwrap();
        let Command::Defaults(d) = args.command else { panic!("wrong subcommand") };
        assert!(matches!(d.apply(&Settings::default()), Err(FilterError::InvalidWorkers(0))));
        assert!(CliArgs::try_parse_from(["fftblur", "defaults", "--quality", "0"]).is_err());
        assert!(CliArgs::try_parse_from(["fftblur", "defaults", "--max-dimension", "0"]).is_err());
    }

    #[test]
    fn output_path_priority() {
        let input = Path::new("shots/cat.jpg");
        assert_eq!(
            build_output_path(input, Some(Path::new("x.png")), Some(Path::new("out")), SaveFormat::Png),
            Some(PathBuf::from("x.png"))
        );
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out")), SaveFormat::Bmp),
            Some(PathBuf::from("out/cat.bmp"))
        );
        assert_eq!(
            build_output_path(input, None, None, SaveFormat::Png),
            Some(PathBuf::from("shots/cat_filtered.png"))
        );
    }
}
