//! Layering of run parameters: CLI flags > `[tog]` settings > built-in defaults.

use std::time::Duration;

use tog::{EngineOptions, PruningMethod, ToGConfig};
use tog_config::Settings;

use crate::CliError;

/// Flags shared by `run` and `validate`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Relations kept per hop (1-20)
    #[arg(long, value_name = "N")]
    pub width: Option<usize>,

    /// Max hops (1-10)
    #[arg(long, value_name = "N")]
    pub depth: Option<usize>,

    /// Entities carried to the next hop (1-50)
    #[arg(long, value_name = "N")]
    pub retain: Option<usize>,

    /// Pruning method: llm, bm25 or sentence_bert
    #[arg(long, value_name = "METHOD")]
    pub pruning: Option<String>,

    /// Skip the per-hop sufficiency check and always explore to --depth
    #[arg(long)]
    pub no_sufficiency: bool,

    /// Temperature for entity extraction and pruning calls
    #[arg(long, value_name = "T")]
    pub exploration_temperature: Option<f32>,

    /// Temperature for sufficiency and answer calls
    #[arg(long, value_name = "T")]
    pub reasoning_temperature: Option<f32>,

    /// Overall query deadline in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Frontier entities expanded concurrently
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,
}

fn parse_pruning(raw: &str) -> Result<PruningMethod, CliError> {
    raw.parse().map_err(CliError::Usage)
}

/// Builds the run config. Range checks are left to `validate_config`.
pub fn resolve_config(args: &ConfigArgs, settings: &Settings) -> Result<ToGConfig, CliError> {
    let defaults = ToGConfig::default();
    let file = &settings.tog;
    let pruning_method = match args.pruning.as_deref().or(file.pruning_method.as_deref()) {
        Some(raw) => parse_pruning(raw)?,
        None => defaults.pruning_method,
    };
    let enable_sufficiency_check = if args.no_sufficiency {
        false
    } else {
        file.enable_sufficiency_check
            .unwrap_or(defaults.enable_sufficiency_check)
    };
    Ok(ToGConfig {
        search_width: args.width.or(file.search_width).unwrap_or(defaults.search_width),
        search_depth: args.depth.or(file.search_depth).unwrap_or(defaults.search_depth),
        num_retain_entity: args
            .retain
            .or(file.num_retain_entity)
            .unwrap_or(defaults.num_retain_entity),
        pruning_method,
        enable_sufficiency_check,
        exploration_temperature: args
            .exploration_temperature
            .or(file.exploration_temperature)
            .or(settings.llm.temperature)
            .unwrap_or(defaults.exploration_temperature),
        reasoning_temperature: args
            .reasoning_temperature
            .or(file.reasoning_temperature)
            .or(settings.llm.temperature)
            .unwrap_or(defaults.reasoning_temperature),
    })
}

pub fn engine_options(args: &ConfigArgs, settings: &Settings) -> EngineOptions {
    let mut options = EngineOptions::default();
    if let Some(secs) = args.timeout_secs.or(settings.tog.timeout_secs) {
        options = options.with_deadline(Duration::from_secs(secs));
    }
    if let Some(n) = args.concurrency.or(settings.tog.max_concurrency) {
        options = options.with_max_concurrency(n);
    }
    options
}
