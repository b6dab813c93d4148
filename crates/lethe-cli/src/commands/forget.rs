use clap::Parser;
use lethe::ForgettingEngine;
use lethe::config::Config;
use lethe::storage::LifecycleStore;

use crate::error::CliResult;
use crate::output::{OutputFormat, new_table, truncate_string};

#[derive(Parser)]
pub struct ForgetCommand {
    #[clap(help = "User whose memories are processed")]
    pub user_id: String,

    #[clap(long, help = "Report what would be forgotten without writing anything")]
    pub dry_run: bool,
}

impl ForgetCommand {
    pub async fn execute(
        &self,
        store: &dyn LifecycleStore,
        config: &Config,
        format: OutputFormat,
    ) -> CliResult<()> {
        let engine = ForgettingEngine::from_config(store, config)?;
        let summary = engine
            .run_forgetting_pass(&self.user_id, self.dry_run)
            .await?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            OutputFormat::Table => {
                if summary.dry_run {
                    println!("Forgetting Pass (dry run) for {}", self.user_id);
                } else {
                    println!("Forgetting Pass for {}", self.user_id);
                }
                println!("==============================\n");

                let mut table = new_table(["Outcome", "Count"]);
                table.add_row(["Compressed", &summary.compressed.len().to_string()]);
                table.add_row(["Archived", &summary.archived.len().to_string()]);
                table.add_row(["Forgotten", &summary.forgotten.len().to_string()]);
                table.add_row(["Retained", &summary.retained.len().to_string()]);
                println!("{table}");

                println!("\nTotal: {} memories", summary.total());

                if !summary.is_clean() {
                    println!("\nErrors:");
                    let mut errors = new_table(["Memory", "Error"]);
                    for error in &summary.errors {
                        errors.add_row([
                            truncate_string(&error.memory_id, 36),
                            error.message.clone(),
                        ]);
                    }
                    println!("{errors}");
                }
            }
        }

        Ok(())
    }
}
