//! Tracing/logging setup for the x402-wallet CLI
//!
//! Terminal verbosity: WARN by default, `-v` INFO, `-d` DEBUG, `-q` ERROR,
//! `--silent` off. `RUST_LOG` applies only when no verbosity flag is given.
//! An optional log file always records DEBUG (INFO in release builds).

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Crate target used in filter directives
const LOG_TARGET: &str = "x402_wallet";

/// Log output format
#[derive(Clone, Debug, Default, clap::ValueEnum, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Colored human-readable output
    #[default]
    Pretty,
    /// Structured JSON output (one JSON object per line)
    Json,
    /// Compact single-line format
    Compact,
}

/// Tracing configuration built from CLI args
#[derive(Debug, Default)]
pub struct TracingConfig {
    pub verbose: bool,
    pub debug: bool,
    pub quiet: bool,
    pub silent: bool,
    pub format: LogFormat,
    /// Optional log file path (written regardless of terminal level)
    pub log_file: Option<PathBuf>,
}

impl TracingConfig {
    /// Terminal level, `None` when silent
    fn terminal_level(&self) -> Option<Level> {
        if self.silent {
            None
        } else if self.quiet {
            Some(Level::ERROR)
        } else if self.debug {
            Some(max_compiled_level(Level::DEBUG))
        } else if self.verbose {
            Some(Level::INFO)
        } else {
            Some(Level::WARN)
        }
    }

    fn level_flag_given(&self) -> bool {
        self.verbose || self.debug || self.quiet || self.silent
    }
}

static TRACING_INITIALIZED: OnceLock<()> = OnceLock::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// DEBUG is compiled out in release builds (release_max_level_info)
fn max_compiled_level(level: Level) -> Level {
    if cfg!(debug_assertions) || level < Level::DEBUG {
        level
    } else {
        Level::INFO
    }
}

fn directive(level: Level) -> String {
    format!("{}={},warn", LOG_TARGET, level.as_str().to_lowercase())
}

fn terminal_filter(level: Level, flag_given: bool) -> EnvFilter {
    if flag_given {
        EnvFilter::new(directive(level))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive(level)))
    }
}

fn terminal_layer(format: &LogFormat, filter: EnvFilter) -> BoxedLayer {
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_ansi(true)
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
    }
}

fn file_layer(path: &Path) -> Option<BoxedLayer> {
    let file = match std::fs::File::create(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: Failed to create log file {:?}: {}", path, e);
            return None;
        }
    };
    let filter = EnvFilter::new(directive(max_compiled_level(Level::DEBUG)));
    Some(
        fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(file)
            .with_filter(filter)
            .boxed(),
    )
}

/// Initialize tracing with the given configuration.
///
/// Subsequent calls are ignored.
pub fn init_tracing(config: TracingConfig) {
    if TRACING_INITIALIZED.get().is_some() {
        return;
    }

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if let Some(layer) = config.log_file.as_deref().and_then(file_layer) {
        layers.push(layer);
    }
    if let Some(level) = config.terminal_level() {
        let filter = terminal_filter(level, config.level_flag_given());
        layers.push(terminal_layer(&config.format, filter));
    }

    // An empty layer list leaves a no-op registry, which is what --silent wants
    let _ = tracing_subscriber::registry().with(layers).try_init();
    let _ = TRACING_INITIALIZED.set(());
}
