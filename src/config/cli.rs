use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "cloud-glue")]
#[command(about = "Cloud Storage, Gemini batch inference and Slack notification helpers")]
pub struct CliConfig {
    /// TOML config file; falls back to environment variables when omitted
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the URI of an object without contacting the store
    GetUri { key: String },

    /// Download one object
    Download { key: String, local_path: PathBuf },

    /// Download every object under a prefix
    DownloadPrefix { prefix: String, local_dir: PathBuf },

    /// Upload a local file, overwriting the object
    Upload { local_path: PathBuf, key: String },

    /// Strip `scheme://bucket/` from a URI
    ExtractKey {
        uri: String,
        /// Fail instead of echoing URIs from another bucket
        #[arg(long)]
        strict: bool,
    },

    /// Run one online prediction and print the raw JSON text
    Predict {
        #[arg(long)]
        prompt: String,
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        mime_type: Option<String>,
    },

    /// Convert a CSV of `key,prompt,image_uri` rows into batch JSONL
    BatchInput {
        csv: PathBuf,
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Submit a batch prediction job
    Submit { input_uri: String, output_uri: String },

    /// Show the current state of a batch job
    Status { job_name: String },

    /// Wait for a batch job to finish (Ctrl+C stops waiting)
    Wait {
        job_name: String,
        #[command(flatten)]
        poll: PollArgs,
    },

    /// Cancel a batch job
    Cancel { job_name: String },

    /// Build input, upload, submit, wait and download results in one go
    RunBatch {
        csv: PathBuf,
        #[arg(long)]
        run_prefix: String,
        #[arg(long, default_value = "./output")]
        output_dir: PathBuf,
        #[command(flatten)]
        poll: PollArgs,
        /// Post the outcome to the configured Slack webhook
        #[arg(long)]
        notify: bool,
    },

    /// Post a message to the Slack webhook
    Notify {
        message: String,
        /// Mark the message as a success (adds the check-mark icon)
        #[arg(long)]
        success: bool,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct PollArgs {
    /// Seconds between status checks
    #[arg(long, default_value = "5")]
    pub interval: u64,

    /// Give up after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}
