//! Command-line interface definitions for prensai.
//!
//! All arguments can be provided via command-line flags; secrets and the
//! local model name may also come from the environment (or a `.env` file).

use clap::Parser;

/// Classify one batch of press clippings.
///
/// # Examples
///
/// ```sh
/// # Local model only
/// prensai -r ./request.json -o ./out
///
/// # Hosted model first, falling back to the local one
/// prensai -r ./request.json -o ./out --primary --openai-api-key sk-...
///
/// # Keep a crisis history across runs
/// prensai -r ./request.json -o ./out --append-history
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// JSON file with the batch request (urls, topics, keyword lists)
    #[arg(short, long)]
    pub request: String,

    /// Output directory for batch response files
    #[arg(short, long)]
    pub output_dir: String,

    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Try the hosted model before the local one
    #[arg(long, overrides_with = "no_primary")]
    pub primary: bool,

    /// Use only the local model, whatever the config file says
    #[arg(long, overrides_with = "primary")]
    pub no_primary: bool,

    /// Texts longer than this many characters are flagged for manual review
    #[arg(long)]
    pub max_text_len: Option<usize>,

    /// API key for the hosted model
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Local model name served by Ollama
    #[arg(long, env = "OLLAMA_MODEL")]
    pub ollama_model: Option<String>,

    /// Crisis history file (defaults to the config value, then `{output_dir}/history.json`)
    #[arg(long)]
    pub history: Option<String>,

    /// Append this batch's records to the crisis history file
    #[arg(long)]
    pub append_history: bool,
}

impl Cli {
    /// Primary-backend switch from the command line, if one was given.
    pub fn primary_override(&self) -> Option<bool> {
        match (self.primary, self.no_primary) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    /// Where the crisis history lives.
    pub fn history_path(&self, configured: Option<&str>) -> String {
        self.history
            .clone()
            .or_else(|| configured.map(str::to_string))
            .unwrap_or_else(|| format!("{}/history.json", self.output_dir.trim_end_matches('/')))
    }
}
