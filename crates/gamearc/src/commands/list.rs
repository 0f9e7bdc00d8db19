use clap::Args;
use gamearc_core::Entry;
use itertools::Itertools;
use miette::Result;
use owo_colors::OwoColorize;

use super::ArchiveArgs;

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    archive: ArchiveArgs,

    /// Sort entries by name instead of archive order
    #[arg(long, default_value_t = false)]
    sort: bool,
}

fn row(entry: &Entry) -> String {
    let strategy = match entry.is_compressed() {
        true => entry.strategy_name().green().to_string(),
        false => entry.strategy_name().dimmed().to_string(),
    };
    format!(
        "{:>12} {:>12} {:<8} {}",
        entry.length(),
        entry.decompressed_length(),
        strategy,
        entry.name()
    )
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = self.archive.open()?;

        println!(
            "{}",
            format!("{:>12} {:>12} {:<8} {}", "stored", "size", "codec", "name").bold()
        );

        let entries = archive.entries();
        let rows = match self.sort {
            true => entries.sorted_by(|a, b| a.name().cmp(b.name())).map(row).join("\n"),
            false => entries.map(row).join("\n"),
        };
        if !rows.is_empty() {
            println!("{rows}");
        }
        Ok(())
    }
}
