use clap::Args;
use miette::Result;
use owo_colors::OwoColorize;

use super::ArchiveArgs;

#[derive(Args)]
pub struct InfoArgs {
    #[command(flatten)]
    archive: ArchiveArgs,
}

impl InfoArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = self.archive.open()?;

        let compressed = archive.entries().filter(|e| e.is_compressed()).count();
        let total = archive
            .decompressed_size()
            .map_or_else(|| "overflow".to_string(), |size| size.to_string());

        println!("{:<12} {}", "format".bold(), archive.format());
        println!("{:<12} {}", "entries".bold(), archive.len());
        println!("{:<12} {}", "compressed".bold(), compressed);
        println!("{:<12} {} bytes", "total size".bold(), total);
        Ok(())
    }
}
