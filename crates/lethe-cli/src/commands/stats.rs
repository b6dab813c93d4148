use std::collections::BTreeMap;

use clap::Parser;
use lethe::memory::types::{ForgettingStage, MemoryRecord};
use lethe::storage::LifecycleStore;

use crate::error::CliResult;
use crate::output::{OutputFormat, new_table};

#[derive(Parser)]
pub struct StatsCommand {
    #[clap(help = "User whose memories are counted")]
    pub user_id: String,
}

/// Memory counts per lifecycle stage
pub fn stage_counts(memories: &[MemoryRecord]) -> BTreeMap<ForgettingStage, usize> {
    let mut counts: BTreeMap<ForgettingStage, usize> =
        ForgettingStage::ALL.iter().map(|stage| (*stage, 0)).collect();
    for memory in memories {
        *counts.entry(memory.forgetting_stage).or_default() += 1;
    }
    counts
}

impl StatsCommand {
    pub async fn execute(&self, store: &dyn LifecycleStore, format: OutputFormat) -> CliResult<()> {
        let memories = store.list_user_memories(&self.user_id).await?;
        let counts = stage_counts(&memories);
        let total_accesses: u64 = memories.iter().map(|m| u64::from(m.access_count)).sum();

        match format {
            OutputFormat::Json => {
                let stages: serde_json::Map<String, serde_json::Value> = counts
                    .iter()
                    .map(|(stage, count)| (stage.to_string(), serde_json::json!(count)))
                    .collect();
                let output = serde_json::json!({
                    "user_id": self.user_id,
                    "stages": stages,
                    "total": memories.len(),
                    "total_accesses": total_accesses,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("Lifecycle Statistics for {}", self.user_id);
                println!("==============================\n");

                let mut table = new_table(["Stage", "Memories"]);
                for (stage, count) in &counts {
                    table.add_row([stage.to_string(), count.to_string()]);
                }
                println!("{table}\n");

                println!(
                    "Total: {} memories, {} accesses",
                    memories.len(),
                    total_accesses
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_counts_include_empty_stages() {
        let mut archived = MemoryRecord::new("a", "alice", "x");
        archived.forgetting_stage = ForgettingStage::Archived;
        let memories = vec![MemoryRecord::new("i", "alice", "y"), archived];

        let counts = stage_counts(&memories);
        assert_eq!(counts.len(), 4);
        assert_eq!(counts[&ForgettingStage::Intact], 1);
        assert_eq!(counts[&ForgettingStage::Archived], 1);
        assert_eq!(counts[&ForgettingStage::Forgotten], 0);
    }
}
