use std::net::SocketAddr;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "ciao-ai",
    version,
    about = "CIAO-AI: assistente di storia e lingua italiana"
)]
pub struct Cli {
    /// Base URL of the Ollama-compatible model endpoint; overrides the
    /// configured one when given.
    #[arg(long)]
    pub ollama_url: Option<String>,
    /// Path to a TOML configuration file.
    #[arg(long)]
    pub config: Option<String>,
    /// Extra instruction merged into the system prompt.
    #[arg(long)]
    pub system: Option<String>,
    /// Per-submit timeout for response generation, in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    #[arg(long, value_enum, default_value_t = RunMode::Stdio)]
    pub mode: RunMode,
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub rest_addr: SocketAddr,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RunMode {
    Stdio,
    Rest,
}
