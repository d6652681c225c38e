use clap::{Parser, Subcommand};
use picturesque::cache::DerivativeCache;
use picturesque::config;
use picturesque::directives::{Breakpoint, Density, Directive, LoadingMode, PartialDirectiveSet};
use picturesque::imaging::{ImageBackend, RustBackend};
use picturesque::output;
use picturesque::picture::Picturer;
use picturesque::rewrite::{RewriteStats, Rewriter};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "picturesque")]
#[command(about = "Responsive <picture> markup with cached WebP derivatives")]
#[command(long_about = "\
Responsive <picture> markup with cached WebP derivatives

Each image reference is probed, planned into breakpoint tiers and pixel
densities, and rendered as a <picture> element whose derivatives are
zoom-cropped, encoded, and cached on first use.

Directive precedence (first available wins):
  call site (flags, or <img> attributes) → preset → [defaults] → built-in

Inline directives in HTML:
  <img src=\"a.jpg?preset=card\">            use the 'card' preset
  <img src=\"a.jpg?preset=noImageServer\">   leave this tag alone

Run 'picturesque gen-config' to generate a documented picturesque.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file means stock defaults)
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Call-site directives for a single image.
#[derive(clap::Args)]
struct DirectiveArgs {
    /// Image reference, resolved against images.source_root
    image: String,

    /// Named preset from the config
    #[arg(long)]
    preset: Option<String>,

    #[arg(long)]
    alt: Option<String>,

    #[arg(long)]
    title: Option<String>,

    /// auto, lazy, eager, or none
    #[arg(long)]
    loading: Option<LoadingMode>,

    /// Height / width crop ratio
    #[arg(long)]
    ratio: Option<f64>,

    #[arg(long)]
    max_width: Option<u32>,

    #[arg(long)]
    class: Option<String>,

    /// Breakpoint as VIEWPORT:WIDTH, repeatable
    #[arg(long = "breakpoint", value_parser = parse_breakpoint)]
    breakpoints: Vec<Breakpoint>,

    /// Density as MULTIPLIER:QUALITY, repeatable
    #[arg(long = "density", value_parser = parse_density)]
    densities: Vec<Density>,
}

impl DirectiveArgs {
    fn explicit(&self) -> PartialDirectiveSet {
        PartialDirectiveSet {
            alt: self.alt.clone(),
            title: self.title.clone(),
            loading: Directive::from_option(self.loading),
            aspect_ratio: self.ratio,
            breakpoints: Directive::from_option(
                Some(self.breakpoints.clone()).filter(|b| !b.is_empty()),
            ),
            max_width: self.max_width,
            density_set: Some(self.densities.clone()).filter(|d| !d.is_empty()),
            class: self.class.clone(),
            ..PartialDirectiveSet::default()
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print <picture> markup for one image
    Picture(DirectiveArgs),
    /// Rewrite <img> tags in HTML files (directories are searched for *.html)
    Rewrite {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Overwrite files instead of printing to stdout
        #[arg(long)]
        in_place: bool,
    },
    /// Render a Markdown file to HTML and rewrite its images
    Markdown { file: PathBuf },
    /// Show the planned tiers and derivatives for one image
    Plan {
        #[command(flatten)]
        directives: DirectiveArgs,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock picturesque.toml with all options documented
    GenConfig,
}

fn parse_pair(s: &str) -> Result<(&str, &str), String> {
    s.split_once(':')
        .ok_or_else(|| format!("expected A:B, got '{s}'"))
}

fn parse_breakpoint(s: &str) -> Result<Breakpoint, String> {
    let (breakpoint, image_width) = parse_pair(s)?;
    Ok(Breakpoint {
        breakpoint: breakpoint.parse().map_err(|e| format!("{breakpoint}: {e}"))?,
        image_width: image_width.parse().map_err(|e| format!("{image_width}: {e}"))?,
    })
}

fn parse_density(s: &str) -> Result<Density, String> {
    let (density, quality) = parse_pair(s)?;
    Ok(Density {
        density: density
            .trim_end_matches('x')
            .parse()
            .map_err(|e| format!("{density}: {e}"))?,
        quality: quality.parse().map_err(|e| format!("{quality}: {e}"))?,
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(())
        }
        Command::Picture(args) => with_picturer(&cli.config, |picturer| {
            let html = picturer.picture(
                &args.image,
                &args.explicit(),
                args.preset.as_deref(),
                None,
            )?;
            println!("{}", html);
            Ok(())
        }),
        Command::Rewrite { paths, in_place } => with_picturer(&cli.config, |picturer| {
            rewrite_files(Rewriter::new(picturer), &paths, in_place)
        }),
        Command::Markdown { file } => with_picturer(&cli.config, |picturer| {
            let source = std::fs::read_to_string(&file)?;
            let parser = pulldown_cmark::Parser::new_ext(&source, pulldown_cmark::Options::all());
            let mut html = String::new();
            pulldown_cmark::html::push_html(&mut html, parser);
            let page = file.display().to_string();
            let rewritten = Rewriter::new(picturer).rewrite(&html, Some(&page))?;
            print!("{}", rewritten.html);
            Ok(())
        }),
        Command::Plan { directives, json } => with_picturer(&cli.config, |picturer| {
            print_plan(&picturer, &directives, json)
        }),
    }
}

/// Load the config, build the backend, and run `f` against them.
fn with_picturer(
    config_path: &Path,
    f: impl FnOnce(Picturer<'_, RustBackend>) -> Result<(), Box<dyn std::error::Error>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config_file(config_path)?;
    init_thread_pool(&config.processing);
    let backend = RustBackend::new(DerivativeCache::new(
        &config.images.cache_dir,
        config.images.url_prefix.clone(),
    ));
    f(Picturer::new(&config, &backend))?;
    info!("Cache: {}", backend.cache_stats());
    Ok(())
}

fn rewrite_files(
    rewriter: Rewriter<'_, RustBackend>,
    paths: &[PathBuf],
    in_place: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = html_files(paths);
    let mut total = RewriteStats::default();
    for file in &files {
        let page = file.display().to_string();
        let document = std::fs::read_to_string(file)?;
        let rewritten = rewriter.rewrite(&document, Some(&page))?;
        total.add(rewritten.stats);
        if in_place {
            if rewritten.html != document {
                std::fs::write(file, &rewritten.html)?;
            }
            output::print_rewrite_line(file, &rewritten.stats);
        } else {
            print!("{}", rewritten.html);
            info!("{}", output::format_rewrite_line(file, &rewritten.stats));
        }
    }
    info!("{}", output::format_rewrite_summary(files.len(), &total));
    Ok(())
}

fn print_plan(
    picturer: &Picturer<'_, impl ImageBackend>,
    args: &DirectiveArgs,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let plan = picturer.plan(&args.image, &args.explicit(), args.preset.as_deref())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        output::print_plan(&args.image, &plan);
    }
    Ok(())
}

/// Expand directories into the `*.html` files below them, sorted.
fn html_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_html(e.path()))
                .map(|e| e.into_path())
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    files
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
}

/// Log to stderr so stdout carries only markup and reports.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. Config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
