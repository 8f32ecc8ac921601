// Demand Triage - CLI
// Loads the persisted collection, runs one command, writes the snapshot back.

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use demand_triage::db::Event;
use demand_triage::rules::{classify_effort, classify_impact};
use demand_triage::{
    export_to_file, import_file, logging, FieldUpdate, ImportMode, ImportOptions, Item, ItemId,
    ItemStore, SnapshotStore, TriageConfig,
};

#[derive(Parser)]
#[command(name = "demand-triage")]
#[command(version, about = "Import, classify, reconcile and export a demand backlog")]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a survey export (or a previously classified file)
    Import {
        file: PathBuf,

        /// The file is our own export; its classification columns win
        #[arg(long)]
        classified: bool,

        /// Replace the collection without reconciling against it
        #[arg(long)]
        no_merge: bool,
    },

    /// Write the enriched spreadsheet
    Export { file: Option<PathBuf> },

    /// List items in planning order
    List {
        /// Only items not placed on the board
        #[arg(long)]
        backlog: bool,
    },

    /// Show one item
    Show { id: ItemId },

    /// Replace one field of one item
    Set { id: ItemId, field: String, value: String },

    /// Place an item on the effort/impact board
    Place { id: ItemId, effort: String, impact: String },

    /// Move an item back to the backlog
    Backlog { id: ItemId },
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    let config = TriageConfig::load(cli.config.as_deref())?;
    let snapshots = SnapshotStore::open(&config.database_path, config.snapshot_key.clone())?;
    let mut store = ItemStore::from_items(snapshots.load());
    info!(items = store.len(), db = %config.database_path.display(), "loaded collection");

    match cli.command {
        Command::Import {
            file,
            classified,
            no_merge,
        } => {
            let mode = if classified {
                ImportMode::Classified
            } else {
                ImportMode::Fresh
            };
            let options = ImportOptions::new().with_mode(mode).with_merge(!no_merge);
            let report = import_file(&mut store, &file, options, Some(&snapshots))?;

            println!("📥 {}", report.summary());
            if report.repaired > 0 {
                println!("⚠️  {} rows had Grupo/Urgencia swapped and were repaired", report.repaired);
            }
            if report.unresolved_links > 0 {
                println!("⚠️  {} relation names did not match any demand", report.unresolved_links);
            }
        }

        Command::Export { file } => {
            let path = file.unwrap_or_else(|| config.export_path.clone());
            export_to_file(store.items(), &path)?;
            println!("📤 Exported {} items to {}", store.len(), path.display());
        }

        Command::List { backlog } => {
            let items: Vec<&Item> = store
                .sorted_backlog()
                .into_iter()
                .filter(|item| !backlog || !item.is_on_board())
                .collect();

            for item in &items {
                println!("{}", summary_line(item));
            }
            println!("\n{} items", items.len());
        }

        Command::Show { id } => {
            let item = store.get(id).ok_or_else(|| anyhow!("item {} not found", id))?;
            println!("{}", serde_json::to_string_pretty(item)?);
        }

        Command::Set { id, field, value } => {
            let update = FieldUpdate::parse(&field, &value)?;
            store.apply(id, update.clone())?;
            snapshots.record_update(store.items(), id, &update, "cli")?;
            println!("✓ {} #{} updated", update.field_name(), id);
        }

        Command::Place { id, effort, impact } => {
            let effort = classify_effort(Some(effort.as_str()))
                .ok_or_else(|| anyhow!("unknown effort class: {}", effort))?;
            let impact = classify_impact(Some(impact.as_str()))
                .ok_or_else(|| anyhow!("unknown impact class: {}", impact))?;

            store.place(id, effort, impact)?;
            snapshots.save(store.items())?;
            snapshots.record(&Event::new(
                "place",
                "item",
                &id.to_string(),
                serde_json::json!({"effort": effort, "impact": impact}),
                "cli",
            ))?;
            println!("✓ #{} → {} / {}", id, effort.label(), impact.label());
        }

        Command::Backlog { id } => {
            store.to_backlog(id)?;
            snapshots.save(store.items())?;
            snapshots.record(&Event::new(
                "to_backlog",
                "item",
                &id.to_string(),
                serde_json::json!({}),
                "cli",
            ))?;
            println!("✓ #{} moved to backlog", id);
        }
    }

    Ok(())
}

fn summary_line(item: &Item) -> String {
    format!(
        "{:>4}  {:<6} {:<10} {:<12} {}",
        item.id,
        item.effort.map_or("-", |c| c.label()),
        item.impact.map_or("-", |c| c.label()),
        item.squad,
        item.demand
    )
}
