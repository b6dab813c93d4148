use clap::{Parser, Subcommand};
use lethe::memory::compress::{is_compressed, sentence_count};
use lethe::memory::types::{ForgettingStage, MemoryRecord};
use lethe::storage::{LifecycleStore, RecordFilter};
use uuid::Uuid;

use crate::error::CliResult;
use crate::output::{OutputFormat, format_timestamp, new_table, truncate_string};

#[derive(Parser)]
pub struct MemoryCommand {
    #[clap(subcommand)]
    pub command: MemorySubcommand,
}

#[derive(Subcommand)]
pub enum MemorySubcommand {
    #[clap(about = "List a user's memories")]
    List(ListArgs),

    #[clap(about = "Show memory details")]
    Show(ShowArgs),

    #[clap(about = "Show the stage transition log of a memory")]
    Log(ShowArgs),

    #[clap(about = "Register a new memory")]
    Add(AddArgs),

    #[clap(about = "Record a read access")]
    Touch(ShowArgs),
}

#[derive(Parser)]
pub struct ListArgs {
    #[clap(help = "Owning user")]
    pub user_id: String,

    #[clap(long, short, help = "Include forgotten memories")]
    pub all: bool,

    #[clap(
        long,
        short,
        value_delimiter = ',',
        help = "Only these stages (intact, compressed, archived, forgotten)"
    )]
    pub stage: Vec<ForgettingStage>,

    #[clap(
        long,
        short,
        default_value = "20",
        help = "Maximum number of memories to display"
    )]
    pub limit: usize,
}

#[derive(Parser)]
pub struct ShowArgs {
    #[clap(help = "Memory ID")]
    pub id: String,
}

#[derive(Parser)]
pub struct AddArgs {
    #[clap(help = "Owning user")]
    pub user_id: String,

    #[clap(help = "Memory content text")]
    pub content: String,

    #[clap(long, help = "Memory ID (random UUID when omitted)")]
    pub id: Option<String>,

    #[clap(long, default_value = "0.5", help = "Base importance score (0-1)")]
    pub importance: f32,

    #[clap(long, default_value = "0.0", help = "Emotional intensity (0-1)")]
    pub emotion: f32,
}

impl MemoryCommand {
    pub async fn execute(&self, store: &dyn LifecycleStore, format: OutputFormat) -> CliResult<()> {
        match &self.command {
            MemorySubcommand::List(args) => Self::list(store, args, format).await,
            MemorySubcommand::Show(args) => Self::show(store, args, format).await,
            MemorySubcommand::Log(args) => Self::log(store, args, format).await,
            MemorySubcommand::Add(args) => Self::add(store, args, format).await,
            MemorySubcommand::Touch(args) => Self::touch(store, args, format).await,
        }
    }

    async fn list(store: &dyn LifecycleStore, args: &ListArgs, format: OutputFormat) -> CliResult<()> {
        let filter = args.filter();
        let mut memories = store.list_user_memories(&args.user_id).await?;
        memories.retain(|m| filter.matches(m));
        memories.truncate(args.limit);

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&memories)?);
            }
            OutputFormat::Table => {
                if memories.is_empty() {
                    println!("No memories found.");
                    return Ok(());
                }

                let mut table = new_table(["ID", "Content", "Stage", "Importance", "Accesses", "Created"]);
                for memory in &memories {
                    table.add_row([
                        truncate_string(&memory.memory_id, 12),
                        truncate_string(&memory.content, 50),
                        memory.forgetting_stage.to_string(),
                        format!("{:.2}", memory.importance_score),
                        memory.access_count.to_string(),
                        format_timestamp(&memory.created_at),
                    ]);
                }

                println!("{table}");
                println!("\nTotal: {} memories", memories.len());
            }
        }

        Ok(())
    }

    async fn show(store: &dyn LifecycleStore, args: &ShowArgs, format: OutputFormat) -> CliResult<()> {
        let memory = store.get(&args.id).await?;

        match format {
            OutputFormat::Json => {
                let mut output = serde_json::to_value(&memory)?;
                if let Some(fields) = output.as_object_mut() {
                    fields.insert("compressed".to_string(), is_compressed(&memory.content).into());
                    fields.insert("sentences".to_string(), sentence_count(&memory.content).into());
                }
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => print_record(&memory),
        }

        Ok(())
    }

    async fn log(store: &dyn LifecycleStore, args: &ShowArgs, format: OutputFormat) -> CliResult<()> {
        // Surface unknown ids instead of printing an empty log
        store.get(&args.id).await?;
        let entries = store.transition_log(&args.id).await?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            }
            OutputFormat::Table => {
                if entries.is_empty() {
                    println!("No transitions recorded for {}.", args.id);
                    return Ok(());
                }

                let mut table = new_table(["When", "From", "To", "Reason"]);
                for entry in &entries {
                    table.add_row([
                        format_timestamp(&entry.timestamp),
                        entry.old_stage.to_string(),
                        entry.new_stage.to_string(),
                        entry.reason.clone(),
                    ]);
                }
                println!("{table}");
            }
        }

        Ok(())
    }

    async fn add(store: &dyn LifecycleStore, args: &AddArgs, format: OutputFormat) -> CliResult<()> {
        if !(0.0..=1.0).contains(&args.importance) || !(0.0..=1.0).contains(&args.emotion) {
            return Err("Importance and emotion must be between 0 and 1".into());
        }

        let id = args
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let memory = MemoryRecord::new(id, args.user_id.clone(), args.content.clone())
            .with_importance(args.importance)
            .with_emotional_score(args.emotion);

        store.insert(&memory).await?;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "id": memory.memory_id,
                    "user_id": memory.user_id,
                    "created": true,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!("Memory added: {}", memory.memory_id);
            }
        }

        Ok(())
    }

    async fn touch(store: &dyn LifecycleStore, args: &ShowArgs, format: OutputFormat) -> CliResult<()> {
        store.increment_access(&args.id).await?;
        let memory = store.get(&args.id).await?;

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "id": memory.memory_id,
                    "access_count": memory.access_count,
                    "last_accessed": memory.last_accessed.to_rfc3339(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                println!(
                    "Memory {} accessed ({} total)",
                    memory.memory_id, memory.access_count
                );
            }
        }

        Ok(())
    }
}

impl ListArgs {
    /// Explicit stages select forgotten memories on their own; otherwise
    /// `--all` decides whether they show up.
    fn filter(&self) -> RecordFilter {
        let filter = RecordFilter::new().with_user(&self.user_id);
        if !self.stage.is_empty() {
            filter.with_stages(self.stage.clone())
        } else if self.all {
            filter
        } else {
            filter.excluding_forgotten()
        }
    }
}

fn print_record(memory: &MemoryRecord) {
    let mut table = new_table(["Property", "Value"]);

    table.add_row(["ID", &memory.memory_id]);
    table.add_row(["User", &memory.user_id]);
    table.add_row(["Content", &memory.content]);
    table.add_row(["Stage", &memory.forgetting_stage.to_string()]);
    table.add_row(["Importance", &format!("{:.4}", memory.importance_score)]);
    table.add_row(["Emotion", &format!("{:.4}", memory.emotional_score)]);
    table.add_row(["Compression Ratio", &format!("{:.4}", memory.compression_ratio)]);
    table.add_row(["Compressed", if is_compressed(&memory.content) { "yes" } else { "no" }]);
    table.add_row(["Sentences", &sentence_count(&memory.content).to_string()]);
    table.add_row(["Access Count", &memory.access_count.to_string()]);
    table.add_row(["Created", &memory.created_at.to_rfc3339()]);
    table.add_row(["Last Accessed", &memory.last_accessed.to_rfc3339()]);
    table.add_row(["Content Hash", memory.content_hash.as_deref().unwrap_or("-")]);

    println!("{table}");
}
