use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use lethe::config::Config;

use crate::error::CliResult;
use crate::output::{OutputFormat, new_table};

#[derive(Parser)]
pub struct ConfigCommand {
    #[clap(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    #[clap(about = "Show the effective configuration")]
    Show,

    #[clap(about = "Show which config file is used")]
    Path,
}

impl ConfigCommand {
    pub async fn execute(
        &self,
        config: &Config,
        config_path: Option<&Path>,
        format: OutputFormat,
    ) -> CliResult<()> {
        match &self.command {
            ConfigSubcommand::Show => Self::show(config, config_path, format),
            ConfigSubcommand::Path => Self::path(config_path, format),
        }
    }

    fn show(config: &Config, config_path: Option<&Path>, format: OutputFormat) -> CliResult<()> {
        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(config)?);
            }
            OutputFormat::Table => {
                match resolve_path(config_path) {
                    Some(path) => println!("Configuration from: {}", path.display()),
                    None => println!("Configuration: (using defaults)"),
                }
                println!("==============================\n");

                println!("[Storage]");
                let mut storage_table = new_table(["Setting", "Value"]);
                storage_table.add_row(["data_dir", &config.storage.data_dir.display().to_string()]);
                println!("{storage_table}\n");

                println!("[Forgetting]");
                let mut forgetting_table = new_table(["Setting", "Value"]);
                let forgetting = &config.forgetting;
                forgetting_table.add_row([
                    "forgetting_threshold",
                    &forgetting.forgetting_threshold.to_string(),
                ]);
                forgetting_table.add_row(["half_life_days", &forgetting.half_life_days.to_string()]);
                forgetting_table.add_row([
                    "compression_ready_ratio",
                    &forgetting.compression_ready_ratio.to_string(),
                ]);
                println!("{forgetting_table}\n");

                println!("[Scoring]");
                let mut scoring_table = new_table(["Setting", "Value"]);
                let scoring = &config.scoring;
                scoring_table.add_row(["base_weight", &scoring.base_weight.to_string()]);
                scoring_table.add_row(["recency_weight", &scoring.recency_weight.to_string()]);
                scoring_table.add_row(["emotional_weight", &scoring.emotional_weight.to_string()]);
                scoring_table.add_row(["frequency_weight", &scoring.frequency_weight.to_string()]);
                scoring_table.add_row(["frequency_step", &scoring.frequency_step.to_string()]);
                scoring_table.add_row(["frequency_cap", &scoring.frequency_cap.to_string()]);
                println!("{scoring_table}\n");

                println!("As TOML:\n");
                println!("{}", config.to_toml()?);
            }
        }

        Ok(())
    }

    fn path(config_path: Option<&Path>, format: OutputFormat) -> CliResult<()> {
        let resolved = resolve_path(config_path);
        let candidates = Config::default_paths();

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "active": resolved.map(|p| p.display().to_string()),
                    "candidates": candidates
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                match resolved {
                    Some(path) => println!("Active config file: {}", path.display()),
                    None => println!("No config file found, using defaults"),
                }

                let mut table = new_table(["Candidate", "Exists"]);
                for candidate in &candidates {
                    table.add_row([
                        candidate.display().to_string(),
                        candidate.exists().to_string(),
                    ]);
                }
                println!("\n{table}");
            }
        }

        Ok(())
    }
}

/// The file `Config::load` reads for `config_path`, if any
fn resolve_path(config_path: Option<&Path>) -> Option<PathBuf> {
    match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => Config::default_paths().into_iter().find(|p| p.exists()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_path_wins() {
        let path = Path::new("/tmp/lethe-test.toml");
        assert_eq!(resolve_path(Some(path)), Some(path.to_path_buf()));
    }
}
