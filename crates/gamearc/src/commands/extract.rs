use clap::Args;
use gamearc_core::Entry;
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{
    fs::File,
    path::{Component, Path, PathBuf},
};
use tracing::{info, warn};

use super::ArchiveArgs;

#[derive(Args)]
pub struct ExtractArgs {
    #[command(flatten)]
    archive: ArchiveArgs,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Add an extension guessed from the contents to files without one
    #[arg(long, default_value_t = false)]
    guess_extensions: bool,
}

/// Turn an entry name into a path relative to the target directory
///
/// Names may use either slash as a separator. Returns `None` for names that are empty, absolute
/// or climb out of the target directory.
fn relative_path(name: &str) -> Option<PathBuf> {
    let normalized = name.replace('\\', "/");
    let mut path = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (path.file_name().is_some()).then_some(path)
}

impl ExtractArgs {
    fn target(&self, entry: &Entry) -> Result<Option<PathBuf>> {
        let Some(mut relative) = relative_path(entry.name()) else {
            return Ok(None);
        };

        if self.guess_extensions && relative.extension().is_none() {
            if let Some(extension) = entry
                .guess_extension()
                .with_context(|| format!("reading {}", entry.name()))?
            {
                relative.set_extension(extension);
            }
        }

        Ok(Some(self.directory.join(relative)))
    }

    pub fn handle(&self) -> Result<()> {
        let archive = self.archive.open()?;

        let mut skipped = 0;
        for entry in archive.entries() {
            let Some(p) = self.target(entry)? else {
                warn!(name = entry.name(), "refusing to extract outside the target");
                skipped += 1;
                continue;
            };
            info!("writing {}", p.display());

            let parent = p
                .parent()
                .ok_or_else(|| miette!("{} has no parent directory", p.display()))?;
            std::fs::create_dir_all(parent)
                .into_diagnostic()
                .context(format!("creating {}", parent.display()))?;

            let mut out = if !self.overwrite {
                File::create_new(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            } else {
                File::create(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            };

            let mut reader = entry
                .open()
                .with_context(|| format!("opening {}", entry.name()))?;
            std::io::copy(&mut reader, &mut out)
                .into_diagnostic()
                .context(format!("extracting {}", entry.name()))?;
        }

        if skipped > 0 {
            return Err(miette!(
                "{skipped} of {} entries had unsafe names and were not extracted",
                archive.len()
            ));
        }
        Ok(())
    }
}
