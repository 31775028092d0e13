use clap::{Parser, Subcommand};
use std::path::PathBuf;
use thumber::imaging::{Quality, ThumbnailParameters};
use thumber::{config, output, process, server};

/// Thumbnail geometry and encoding flags shared by `thumb` and `batch`.
#[derive(clap::Args, Clone)]
struct ThumbArgs {
    /// Thumbnail width
    #[arg(short = 'w', long, default_value_t = 128)]
    width: usize,

    /// Thumbnail height
    #[arg(short = 'H', long, default_value_t = 128)]
    height: usize,

    /// Produce exactly width x height, ignoring the source aspect ratio
    #[arg(short = 'a', long)]
    force_aspect: bool,

    /// Allow thumbnails larger than the source
    #[arg(short = 'u', long)]
    upscale: bool,

    /// JPEG quality (0-100)
    #[arg(short = 'q', long, default_value_t = 95, value_parser = clap::value_parser!(u32).range(0..=100))]
    quality: u32,

    /// Optimise Huffman tables
    #[arg(short = 'o', long)]
    optimize: bool,

    /// Decode at no less than this multiple of the thumbnail size (0 = full size)
    #[arg(short = 'p', long, default_value_t = 1.0)]
    prescale: f64,
}

impl ThumbArgs {
    fn parameters(&self) -> ThumbnailParameters {
        ThumbnailParameters {
            width: self.width,
            height: self.height,
            upscale: self.upscale,
            force_aspect: self.force_aspect,
            quality: Quality::new(self.quality),
            optimize: self.optimize,
            prescale_factor: self.prescale,
        }
    }
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "thumber")]
#[command(about = "Streaming JPEG thumbnailer")]
#[command(long_about = "\
Streaming JPEG thumbnailer

Decodes to planar YCbCr with DCT-domain prescaling, resamples each plane
with Lanczos, and re-encodes as baseline 4:4:4 (or grayscale) JPEG.

Commands:

  thumb      one file to one file
  batch      many files into a directory, in parallel
  serve      HTTP service: GET /w=128,h=128/<upstream host>/<path>
  gen-config print a documented config.toml

Set RUST_LOG=debug to see decode and scale decisions.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Thumbnail a single JPEG file
    Thumb {
        input: PathBuf,
        output: PathBuf,
        #[command(flatten)]
        args: ThumbArgs,
    },
    /// Thumbnail many JPEG files into a directory
    Batch {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Directory for `<stem>-thumb.jpg` outputs
        #[arg(long, default_value = "thumbs")]
        out_dir: PathBuf,
        #[command(flatten)]
        args: ThumbArgs,
    },
    /// Run the HTTP thumbnail service
    Serve {
        /// Address to listen on (overrides [server] listen)
        #[arg(long)]
        listen: Option<String>,
        /// Upstream timeout in seconds (overrides [server] upstream_timeout_secs)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Command::Serve { .. } => "info",
        _ => "warn",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match cli.command {
        Command::Thumb {
            input,
            output: dest,
            args,
        } => {
            let record = process::thumbnail_file(&input, &dest, &args.parameters())?;
            output::print_thumb_output(&record);
        }
        Command::Batch {
            inputs,
            out_dir,
            args,
        } => {
            let config = config::load_config(cli.config.as_deref())?;
            init_thread_pool(&config.processing);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_process_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let report = process::batch(&inputs, &out_dir, &args.parameters(), Some(tx))?;
            printer.join().map_err(|_| "output thread panicked")?;
            output::print_batch_summary(&report);
            if report.failed() > 0 {
                std::process::exit(1);
            }
        }
        Command::Serve { listen, timeout } => {
            let mut config = config::load_config(cli.config.as_deref())?;
            if let Some(listen) = listen {
                config.server.listen = listen;
            }
            if let Some(timeout) = timeout {
                config.server.upstream_timeout_secs = timeout;
            }
            config.validate()?;
            server::run(config, version_string())?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
