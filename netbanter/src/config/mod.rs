pub mod server;
pub use server::{ServerConfig, ServerConfigCli};

/// Keeps the non-blocking file writer alive. Dropping it flushes the log file.
pub struct TracingGuard {
    pub file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}
