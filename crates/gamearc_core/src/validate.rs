//! Field checks used while parsing directories, and the context they are evaluated in.
//!
//! Every count, offset, length and filename read out of a directory should pass through one of
//! these before it is used to allocate, seek or slice. A failing check aborts the read of that
//! archive with [`Error::OutOfRange`] or [`Error::MalformedHeader`] instead of letting garbage
//! values drive huge allocations or endless loops.

use bon::Builder;

use crate::{
    error::{Error, Result},
    source::SharedSource,
};

/// Default ceiling for the number of files in one archive
pub const DEFAULT_MAX_FILES: u64 = 1_000_000;

/// Default ceiling for the length of one filename, in bytes
pub const DEFAULT_MAX_FILENAME_LENGTH: u64 = 1024;

fn to_i64<T: TryInto<i64>>(value: T) -> i64 {
    value.try_into().unwrap_or(i64::MAX)
}

fn in_range<T: TryInto<i64>>(field: &'static str, value: T, bound: u64) -> Result<u64> {
    let value = to_i64(value);
    let bound = i64::try_from(bound).unwrap_or(i64::MAX);

    if (0..=bound).contains(&value) {
        Ok(value as u64)
    } else {
        Err(Error::OutOfRange {
            field,
            value,
            bound,
        })
    }
}

/// Check a file count read from a directory against `max_files`
pub fn check_num_files<T: TryInto<i64>>(count: T, max_files: u64) -> Result<usize> {
    in_range("file count", count, max_files).map(|n| n as usize)
}

/// Check that `offset` lies within `0..=bound`
pub fn check_offset<T: TryInto<i64>>(offset: T, bound: u64) -> Result<u64> {
    in_range("offset", offset, bound)
}

/// Check that `length` lies within `0..=bound`
pub fn check_length<T: TryInto<i64>>(length: T, bound: u64) -> Result<u64> {
    in_range("length", length, bound)
}

/// Check a filename length read from a directory against `max_length`
pub fn check_filename_length<T: TryInto<i64>>(length: T, max_length: u64) -> Result<usize> {
    in_range("filename length", length, max_length).map(|n| n as usize)
}

/// Reject filenames which are empty or contain control characters
///
/// Either is a strong sign the directory is being read at the wrong position.
pub fn check_filename(name: &str) -> Result<&str> {
    if name.is_empty() {
        return Err(Error::MalformedHeader("empty filename".into()));
    }

    if let Some(c) = name.chars().find(|c| c.is_control()) {
        return Err(Error::MalformedHeader(format!(
            "filename {:?} contains control character {:#04x}",
            name, c as u32
        )));
    }

    Ok(name)
}

/// Ceilings applied to values read out of directories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
pub struct Limits {
    /// Largest accepted file count
    #[builder(default = DEFAULT_MAX_FILES)]
    pub max_files: u64,

    /// Largest accepted filename, in bytes
    #[builder(default = DEFAULT_MAX_FILENAME_LENGTH)]
    pub max_filename_length: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_filename_length: DEFAULT_MAX_FILENAME_LENGTH,
        }
    }
}

/// When to treat a "compressed" entry as an uncompressed stub
///
/// Some formats mark small pointer records as compressed while their decompressed size is far
/// larger than anything the compressed bytes could expand to. With a ratio set, plugins can ask
/// [`ParseContext::is_implausible`] and store such entries raw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StubPolicy {
    /// Decompressed sizes above `length * max_ratio` are implausible. `None` disables the check.
    pub max_ratio: Option<u64>,
}

impl StubPolicy {
    /// Flag entries which claim to expand by more than `max_ratio`
    pub fn ratio(max_ratio: u64) -> Self {
        Self {
            max_ratio: Some(max_ratio),
        }
    }
}

/// Options for how archives should be read
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct ReadOptions {
    /// Ceilings for directory values
    #[builder(default)]
    pub limits: Limits,

    /// Heuristic for stub entries
    #[builder(default)]
    pub stub_policy: StubPolicy,
}

/// State handed from a plugin's directory parser to its entry construction
///
/// Holds the length of the source being parsed so every check is bounded by the real data.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext {
    source_length: u64,
    options: ReadOptions,
}

impl ParseContext {
    /// Context for parsing `source` with `options`
    pub fn new(source: &SharedSource, options: ReadOptions) -> Self {
        Self {
            source_length: source.len(),
            options,
        }
    }

    /// Length of the source being parsed
    pub fn source_length(&self) -> u64 {
        self.source_length
    }

    /// The options this parse runs with
    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    /// See [`check_num_files`]
    pub fn check_num_files<T: TryInto<i64>>(&self, count: T) -> Result<usize> {
        check_num_files(count, self.options.limits.max_files)
    }

    /// Check that `offset` lies within the source
    pub fn check_offset<T: TryInto<i64>>(&self, offset: T) -> Result<u64> {
        check_offset(offset, self.source_length)
    }

    /// Check that `length` fits within the source
    pub fn check_length<T: TryInto<i64>>(&self, length: T) -> Result<u64> {
        check_length(length, self.source_length)
    }

    /// Check that `length` bytes starting at `offset` lie within the source
    pub fn check_range<O: TryInto<i64>, L: TryInto<i64>>(
        &self,
        offset: O,
        length: L,
    ) -> Result<(u64, u64)> {
        let offset = self.check_offset(offset)?;
        let length = check_length(length, self.source_length - offset)?;
        Ok((offset, length))
    }

    /// See [`check_filename_length`]
    pub fn check_filename_length<T: TryInto<i64>>(&self, length: T) -> Result<usize> {
        check_filename_length(length, self.options.limits.max_filename_length)
    }

    /// See [`check_filename`]
    pub fn check_filename<'a>(&self, name: &'a str) -> Result<&'a str> {
        check_filename(name)
    }

    /// Whether a `length` byte entry claiming to expand to `decompressed_length` should be
    /// treated as an uncompressed stub under the configured [`StubPolicy`]
    pub fn is_implausible(&self, length: u64, decompressed_length: u64) -> bool {
        self.options
            .stub_policy
            .max_ratio
            .is_some_and(|ratio| decompressed_length > length.saturating_mul(ratio))
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::source::MemorySource;
    use crate::validate::{
        check_filename, check_filename_length, check_num_files, Limits, ParseContext,
        ReadOptions, StubPolicy,
    };

    #[test]
    fn num_files_honours_ceiling() -> Result<()> {
        assert_eq!(check_num_files(0u32, 10)?, 0);
        assert_eq!(check_num_files(10u32, 10)?, 10);
        assert!(check_num_files(11u32, 10).is_err());
        assert!(check_num_files(-1i32, 10).is_err());
        assert!(check_num_files(u64::MAX, 10).is_err());

        Ok(())
    }

    #[test]
    fn filename_length_honours_ceiling() {
        assert!(check_filename_length(256u16, 256).is_ok());
        assert!(matches!(
            check_filename_length(257u16, 256),
            Err(Error::OutOfRange {
                field: "filename length",
                value: 257,
                bound: 256
            })
        ));
    }

    #[test]
    fn filenames_reject_control_characters() {
        assert!(check_filename("textures/rock.dds").is_ok());
        assert!(check_filename("").is_err());
        assert!(check_filename("rock\0.dds").is_err());
        assert!(check_filename("rock\n.dds").is_err());
    }

    #[test]
    fn context_checks_against_source() -> Result<()> {
        let source = MemorySource::shared(vec![0u8; 100]);
        let ctx = ParseContext::new(
            &source,
            ReadOptions::builder()
                .limits(Limits::builder().max_files(5).build())
                .build(),
        );

        assert_eq!(ctx.check_range(90u32, 10u32)?, (90, 10));
        assert!(ctx.check_range(90u32, 11u32).is_err());
        assert!(ctx.check_range(101u32, 0u32).is_err());
        assert!(ctx.check_num_files(6u32).is_err());
        assert_eq!(ctx.options().limits.max_filename_length, 1024);

        Ok(())
    }

    #[test]
    fn stub_policy_is_opt_in() {
        let source = MemorySource::shared(vec![0u8; 8]);

        let ctx = ParseContext::new(&source, ReadOptions::default());
        assert!(!ctx.is_implausible(1, 1_000_000));

        let ctx = ParseContext::new(
            &source,
            ReadOptions::builder()
                .stub_policy(StubPolicy::ratio(10))
                .build(),
        );
        assert!(!ctx.is_implausible(100, 1000));
        assert!(ctx.is_implausible(100, 1001));
    }
}
