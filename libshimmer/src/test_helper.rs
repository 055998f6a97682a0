use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::Path;
use tar::{Builder, Header};

/// Writes a gzip compressed tarball containing the given `(path, contents)` entries.
///
/// All entries are regular files with mode `0o755`.
pub(crate) fn write_tarball(destination: &Path, entries: &[(&str, &str)]) {
    let file = File::create(destination).unwrap();
    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));

    for (path, contents) in entries {
        let mut header = Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap();
}

/// Returns the bytes of a gzip compressed tarball with the given entries.
pub(crate) fn tarball_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("archive.tgz");
    write_tarball(&path, entries);
    std::fs::read(path).unwrap()
}
