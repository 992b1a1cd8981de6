use seedline_kernel::{CurriculumConfig, Registry, RegistryConfig, SentenceId};
use seedline_ledger::{
    BatchProposal, SentenceLog, Snapshot, load_registry, load_snapshot, read_batch_from_path,
};
use serde::Serialize;
use std::path::PathBuf;

pub const CONFIG_ENV: &str = "SEEDLINE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = ".seedline/config.toml";
pub const SAMPLE_LIMIT: usize = 25;

fn resolve_config_path(flag: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = flag {
        return Some(PathBuf::from(path));
    }
    if let Ok(path) = std::env::var(CONFIG_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
    fallback.exists().then_some(fallback)
}

pub fn load_config_or_exit(flag: Option<&str>) -> CurriculumConfig {
    let Some(path) = resolve_config_path(flag) else {
        eprintln!(
            "error: no curriculum config; pass --config, set {CONFIG_ENV}, or create {DEFAULT_CONFIG_PATH}"
        );
        std::process::exit(1);
    };
    let config = CurriculumConfig::load(&path).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });
    tracing::debug!(path = %path.display(), "config loaded");
    config
}

pub fn load_sentences_or_exit(path: &str) -> SentenceLog {
    SentenceLog::load(path).unwrap_or_else(|e| {
        eprintln!("error: failed to load sentences {path}: {e}");
        std::process::exit(1);
    })
}

pub fn load_registry_or_exit(path: &str, config: &CurriculumConfig) -> Registry {
    load_registry(path, RegistryConfig::from(config)).unwrap_or_else(|e| {
        eprintln!("error: failed to load units {path}: {e}");
        std::process::exit(1);
    })
}

pub fn load_snapshot_or_exit(dir: &str, config: &CurriculumConfig) -> Snapshot {
    load_snapshot(dir, RegistryConfig::from(config)).unwrap_or_else(|e| {
        eprintln!("error: failed to load snapshot {dir}: {e}");
        std::process::exit(1);
    })
}

pub fn load_batches_or_exit(paths: &[String]) -> Vec<BatchProposal> {
    paths
        .iter()
        .map(|path| {
            read_batch_from_path(path).unwrap_or_else(|e| {
                eprintln!("error: {e}");
                std::process::exit(1);
            })
        })
        .collect()
}

pub fn parse_sentence_id_or_exit(text: &str) -> SentenceId {
    text.parse().unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    })
}

pub fn print_json_or_exit<T: Serialize>(payload: &T) {
    match serde_json::to_string_pretty(payload) {
        Ok(text) => println!("{text}"),
        Err(e) => {
            eprintln!("error: failed to render json: {e}");
            std::process::exit(1);
        }
    }
}

pub fn sample_with_truncation<T>(items: Vec<T>, limit: usize) -> (Vec<T>, usize) {
    let total = items.len();
    let sample: Vec<T> = items.into_iter().take(limit).collect();
    let truncated = total.saturating_sub(sample.len());
    (sample, truncated)
}

pub fn print_sample_block(header: &str, items: &[String], truncated: usize) {
    if items.is_empty() {
        return;
    }

    println!("  {header} (showing up to {}):", items.len());
    for item in items {
        println!("    - {item}");
    }
    if truncated > 0 {
        println!("    ... and {truncated} more");
    }
}

pub fn yes_no(ok: bool) -> &'static str {
    if ok { "yes" } else { "no" }
}

/// Exit 1 without further output when a check rejected its input.
pub fn exit_if_rejected(accepted: bool) {
    if !accepted {
        std::process::exit(1);
    }
}
