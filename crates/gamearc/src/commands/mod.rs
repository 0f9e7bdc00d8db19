use std::path::PathBuf;

use clap::{Args, ValueEnum};
use gamearc_core::{Archive, FileSource, FormatPlugin, ReadOptions};
use gamearc_pak::PakFormat;
use gamearc_tre::TreFormat;
use miette::{Context, Result};

pub mod extract;
pub mod info;
pub mod list;

/// Every format this tool can read, in sniffing order
const PLUGINS: &[&dyn FormatPlugin] = &[&TreFormat, &PakFormat];

#[derive(clap::Subcommand)]
pub enum Commands {
    /// List the entries of an archive
    List(list::ListArgs),
    /// Extract an archive into a directory
    Extract(extract::ExtractArgs),
    /// Summarise an archive
    Info(info::InfoArgs),
}

impl Commands {
    pub fn handle(&self) -> Result<()> {
        match self {
            Commands::List(list) => list.handle(),
            Commands::Extract(extract) => extract.handle(),
            Commands::Info(info) => info.handle(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Tre,
    Pak,
}

impl Format {
    fn plugin(self) -> &'static dyn FormatPlugin {
        match self {
            Format::Tre => &TreFormat,
            Format::Pak => &PakFormat,
        }
    }
}

#[derive(Args)]
pub struct ArchiveArgs {
    /// An input archive
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Read with this format instead of detecting it
    #[arg(long, value_enum)]
    format: Option<Format>,
}

impl ArchiveArgs {
    pub fn open(&self) -> Result<Archive> {
        let context = || format!("path: {}", self.file.display());

        let source = FileSource::shared(&self.file).with_context(context)?;
        let archive = match self.format {
            Some(format) => Archive::read_with(format.plugin(), source, ReadOptions::default()),
            None => Archive::open(source, PLUGINS, ReadOptions::default()),
        };
        archive.with_context(context)
    }
}
