//! Extension guessing for entries whose directory carries no usable filename.

/// Number of leading bytes [`guess_extension`] looks at
pub const SNIFF_LENGTH: usize = 16;

const SIGNATURES: &[(&[u8], &str)] = &[
    (b"DDS ", "dds"),
    (b"\x89PNG\r\n\x1a\n", "png"),
    (b"\xFF\xD8\xFF", "jpg"),
    (b"GIF8", "gif"),
    (b"OggS", "ogg"),
    (b"fLaC", "flac"),
    (b"ID3", "mp3"),
    (b"BIKi", "bik"),
    (b"KB2", "bk2"),
    (b"PK\x03\x04", "zip"),
    (b"\x1F\x8B", "gz"),
    (b"MZ", "exe"),
    (b"%PDF", "pdf"),
    (b"EERT", "tre"),
    (b"<?xml", "xml"),
    (b"BM", "bmp"),
];

/// Guess a file extension from the first bytes of an entry's decompressed data.
///
/// Only unambiguous magic numbers are recognised; `None` means "no idea", not "plain data".
pub fn guess_extension(header: &[u8]) -> Option<&'static str> {
    if let Some(ext) = riff_extension(header) {
        return Some(ext);
    }

    if let Some(ext) = iff_extension(header) {
        return Some(ext);
    }

    SIGNATURES
        .iter()
        .find(|(magic, _)| header.starts_with(magic))
        .map(|(_, ext)| *ext)
}

fn riff_extension(header: &[u8]) -> Option<&'static str> {
    if !header.starts_with(b"RIFF") {
        return None;
    }

    match header.get(8..12)? {
        b"WAVE" => Some("wav"),
        b"AVI " => Some("avi"),
        b"WEBP" => Some("webp"),
        _ => Some("riff"),
    }
}

fn iff_extension(header: &[u8]) -> Option<&'static str> {
    header.starts_with(b"FORM").then_some("iff")
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::ext::guess_extension;

    #[test]
    fn guesses_common_formats() {
        assert_eq!(guess_extension(b"DDS \x7c\x00\x00\x00"), Some("dds"));
        assert_eq!(guess_extension(b"\x89PNG\r\n\x1a\n\0\0"), Some("png"));
        assert_eq!(guess_extension(b"RIFF\0\0\0\0WAVEfmt "), Some("wav"));
        assert_eq!(guess_extension(b"FORM\0\0\0\x10DTII"), Some("iff"));
    }

    #[test]
    fn unknown_data_has_no_guess() {
        assert_eq!(guess_extension(b"\0\0\0\0"), None);
        assert_eq!(guess_extension(b""), None);
        assert_eq!(guess_extension(b"RIFF"), None);
    }
}
