use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "seedline",
    about = "Seedline: canonical curriculum units, deterministic batch merge, and availability gating",
    version
)]
pub struct Cli {
    /// Path to the curriculum config TOML (overrides SEEDLINE_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Merge decomposition batches into the canonical registry and export it
    Merge {
        /// Path to the sentence log JSONL
        #[arg(long)]
        sentences: String,

        /// Batch file (repeatable)
        #[arg(long = "batch", required = true)]
        batches: Vec<String>,

        /// Previous merge output directory (units.jsonl and occurrences.jsonl) to replay onto
        #[arg(long)]
        snapshot: Option<String>,

        /// Directory that receives the exports and reports
        #[arg(long)]
        out_dir: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that every batch tiles its sentences, without merging
    TilingCheck {
        /// Path to the sentence log JSONL
        #[arg(long)]
        sentences: String,

        /// Batch file (repeatable)
        #[arg(long = "batch", required = true)]
        batches: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report meanings rendered by more than one target text
    CollisionCheck {
        /// Path to the sentence log JSONL
        #[arg(long)]
        sentences: String,

        /// Optional unit export to include in the check
        #[arg(long)]
        units: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the vocabulary available at a sentence position
    Frontier {
        /// Path to the unit export JSONL
        #[arg(long)]
        units: String,

        /// Sentence position, e.g. S0042 or 42
        #[arg(long)]
        at: String,

        /// Only tokens first taught in the last N sentences
        #[arg(long)]
        window: Option<u32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a practice basket against the availability frontier
    GateCheck {
        /// Path to the unit export JSONL
        #[arg(long)]
        units: String,

        /// Basket JSON: {"unit": <id or text>, "phrases": [...]}
        #[arg(long)]
        basket: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a surface text to its canonical unit
    Lookup {
        /// Target text to look up
        text: String,

        /// Path to the unit export JSONL
        #[arg(long)]
        units: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-check exported units and occurrences against the sentence log
    Verify {
        /// Path to the sentence log JSONL
        #[arg(long)]
        sentences: String,

        /// Path to the unit export JSONL
        #[arg(long)]
        units: String,

        /// Path to the occurrence export JSONL
        #[arg(long)]
        occurrences: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
