use clap::Parser;

/// The aggregating gateway's command-line surface.
#[derive(Parser)]
#[command(name = "mcpgw", version, about = "Aggregating gateway for the Model Context Protocol")]
pub struct Cli {
    /// Path to the backend configuration file.
    #[arg(long, default_value = "config.json")]
    pub config: String,

    /// Bind address for the front-facing server.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Bind port for the front-facing server.
    #[arg(long, default_value_t = 9000)]
    pub port: u16,

    /// Log verbosity.
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// The `tracing` filter directive this level maps to. `warning` and
    /// `critical` are the surrounding program's vocabulary; `tracing` only
    /// knows `warn` and `error`.
    pub fn as_tracing_filter(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
            LogLevel::Critical => "error",
        }
    }
}
