//! Detect install triggers inside package archives.

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tar::{Archive, EntryType};

/// Entry name marking a package that ships a trigger script.
pub const TRIGGER_FILE: &str = ".trigger";

/// Whether the gzip-compressed tar at `path` has a regular file named
/// [`TRIGGER_FILE`].
pub fn has_trigger(path: &Path) -> io::Result<bool> {
    contains_trigger(File::open(path)?)
}

fn contains_trigger<R: Read>(reader: R) -> io::Result<bool> {
    let mut archive = Archive::new(MultiGzDecoder::new(reader));
    // .apk files are several gzip streams, each holding its own tar.
    archive.set_ignore_zeros(true);

    for entry in archive.entries()? {
        let entry = entry?;
        if entry.header().entry_type() != EntryType::Regular {
            continue;
        }
        if entry.path()?.as_os_str() == TRIGGER_FILE {
            return Ok(true);
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use rstest::rstest;
    use tar::{Builder, Header};
    use tempfile::TempDir;

    fn archive(entries: &[(&str, EntryType)]) -> Vec<u8> {
        let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (name, kind) in entries {
            let mut header = Header::new_gnu();
            header.set_entry_type(*kind);
            header.set_mode(0o644);
            header.set_size(0);
            header.set_cksum();
            builder.append_data(&mut header, name, io::empty()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[rstest]
    #[case::regular_trigger(&[("usr/bin/tool", EntryType::Regular), (".trigger", EntryType::Regular)], true)]
    #[case::no_trigger(&[("usr/bin/tool", EntryType::Regular)], false)]
    #[case::trigger_is_directory(&[(".trigger", EntryType::Directory)], false)]
    #[case::nested_name(&[("etc/.trigger", EntryType::Regular)], false)]
    #[case::empty(&[], false)]
    fn test_contains_trigger(#[case] entries: &[(&str, EntryType)], #[case] expected: bool) {
        let bytes = archive(entries);
        assert_eq!(contains_trigger(bytes.as_slice()).unwrap(), expected);
    }

    #[test]
    fn test_trigger_in_second_stream() {
        let mut bytes = archive(&[(".PKGINFO", EntryType::Regular)]);
        bytes.extend(archive(&[(".trigger", EntryType::Regular)]));
        assert!(contains_trigger(bytes.as_slice()).unwrap());
    }

    #[test]
    fn test_has_trigger_reads_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pkg.apk");
        std::fs::write(&path, archive(&[(".trigger", EntryType::Regular)])).unwrap();
        assert!(has_trigger(&path).unwrap());
    }

    #[test]
    fn test_has_trigger_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(has_trigger(&temp.path().join("absent.apk")).is_err());
    }

    #[test]
    fn test_not_gzip_is_error() {
        assert!(contains_trigger(&b"plain text, not an archive"[..]).is_err());
    }
}
