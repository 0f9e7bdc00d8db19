//! The plugin boundary and the collection of entries it produces

use indexmap::IndexMap;
use std::fmt::{self, Debug};
use tracing::{debug, info, instrument, warn};

use crate::{
    entry::Entry,
    error::{Error, FileNotFoundError, Result},
    source::SharedSource,
    validate::{ParseContext, ReadOptions},
};

/// An archive-specific directory parser
///
/// Plugins turn one container layout into [`Entry`] records. Any error returned from
/// [`FormatPlugin::read`] aborts the read of that archive.
pub trait FormatPlugin: Send + Sync {
    /// Short name of the format, e.g. `"tre"`
    fn name(&self) -> &'static str;

    /// Cheaply check whether `source` looks like this format, usually by its magic number
    fn sniff(&self, source: &SharedSource) -> Result<bool>;

    /// Parse the directory of `source`
    fn read(&self, source: &SharedSource, ctx: &ParseContext) -> Result<Vec<Entry>>;
}

/// Read `N` bytes at `offset`, or `None` if the source is too short
pub fn read_magic<const N: usize>(
    source: &SharedSource,
    offset: u64,
) -> Result<Option<[u8; N]>> {
    if source.len() < offset.saturating_add(N as u64) {
        return Ok(None);
    }

    let mut magic = [0u8; N];
    source.read_exact_at(offset, &mut magic)?;
    Ok(Some(magic))
}

/// The entries of one archive, in directory order
///
/// ```no_run
/// use gamearc_core::{Archive, FileSource, FormatPlugin, ReadOptions};
///
/// fn list_contents(
///     path: &str,
///     plugins: &[&dyn FormatPlugin],
/// ) -> gamearc_core::error::Result<()> {
///     let archive = Archive::open(FileSource::shared(path)?, plugins, ReadOptions::default())?;
///
///     for i in 0..archive.len() {
///         let entry = archive.by_index(i)?;
///         println!("Filename: {}", entry.name());
///         std::io::copy(&mut entry.open()?, &mut std::io::stdout())?;
///     }
///
///     Ok(())
/// }
/// ```
pub struct Archive {
    format: &'static str,
    source: SharedSource,
    entries: Vec<Entry>,
    names: IndexMap<Box<str>, usize>,
}

impl Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Archive")
            .field("format", &self.format)
            .field("source", &self.source)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl Archive {
    /// Read `source` with the first plugin in `plugins` that recognises it
    #[instrument(skip_all, err)]
    pub fn open(
        source: SharedSource,
        plugins: &[&dyn FormatPlugin],
        options: ReadOptions,
    ) -> Result<Archive> {
        for plugin in plugins {
            if plugin.sniff(&source)? {
                debug!(format = plugin.name(), "format recognised");
                return Self::read_with(*plugin, source, options);
            }
        }

        Err(Error::UnsupportedFormat)
    }

    /// Read `source` with a specific plugin
    #[instrument(skip_all, fields(format = plugin.name()), err)]
    pub fn read_with(
        plugin: &dyn FormatPlugin,
        source: SharedSource,
        options: ReadOptions,
    ) -> Result<Archive> {
        let ctx = ParseContext::new(&source, options);
        let entries = plugin.read(&source, &ctx)?;
        info!(entries = entries.len(), "read directory");

        Ok(Self::from_entries(plugin.name(), source, entries))
    }

    /// Collect entries produced elsewhere
    pub fn from_entries(format: &'static str, source: SharedSource, entries: Vec<Entry>) -> Self {
        let mut names: IndexMap<Box<str>, usize> = IndexMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if names.contains_key(entry.name()) {
                warn!(
                    name = entry.name(),
                    index, "duplicate entry name, keeping the first"
                );
                continue;
            }
            names.insert(entry.name().into(), index);
        }

        Self {
            format,
            source,
            entries,
            names,
        }
    }

    /// Name of the plugin that read this archive
    pub fn format(&self) -> &'static str {
        self.format
    }

    /// The source the entries read from
    pub fn source(&self) -> &SharedSource {
        &self.source
    }

    /// Number of entries contained in this archive.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether this archive contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total size of the files in the archive once decompressed, if it fits
    pub fn decompressed_size(&self) -> Option<u128> {
        let mut total = 0u128;
        for entry in &self.entries {
            total = total.checked_add(entry.decompressed_length() as u128)?;
        }
        Some(total)
    }

    /// Returns an iterator over all the entry names in this archive.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name())
    }

    /// Returns an iterator over all the entries in this archive.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Get the index of an entry by name, if it's present.
    #[inline(always)]
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Get the name of an entry, if it's present.
    #[inline(always)]
    pub fn name_for_index(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|e| e.name())
    }

    /// Search for an entry by name
    pub fn by_name(&self, name: &str) -> Result<&Entry> {
        let Some(index) = self.index_for_name(name) else {
            return Err(Error::FileNotFound(FileNotFoundError::Name(
                name.to_owned(),
            )));
        };
        self.by_index(index)
    }

    /// Get an entry by index
    pub fn by_index(&self, index: usize) -> Result<&Entry> {
        self.entries
            .get(index)
            .ok_or(Error::FileNotFound(FileNotFoundError::Index(index)))
    }

    /// Unwrap and return the entries
    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}
