//! Command-line interface definitions and argument parsing

use clap::Parser;

/// Customer retention pipeline: churn scoring, persona clustering, and
/// offer-driven outreach
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the customer data CSV
    pub customers: String,

    /// Path to the offer map JSON (segment key -> offer identifier)
    pub offers: String,

    /// Path to the pre-fit churn model artifact
    #[arg(short, long, default_value = "churn_model.json")]
    pub model: String,

    /// Number of persona clusters for K-Means
    #[arg(short = 'k', long, default_value_t = 4)]
    pub clusters: usize,

    /// Random seed for clustering reproducibility
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Maximum iterations for K-Means convergence
    #[arg(long, default_value_t = 300)]
    pub max_iters: usize,

    /// Tolerance for K-Means convergence
    #[arg(long, default_value_t = 1e-4)]
    pub tolerance: f64,

    /// Chat model used for outreach copy
    #[arg(long, default_value = "gpt-3.5-turbo")]
    pub llm_model: String,

    /// Write the final report to this path instead of stdout
    #[arg(short, long)]
    pub output: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}
