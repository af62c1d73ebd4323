//! CMOD archive tests

#[cfg(test)]
mod cmod_archive_tests {
    use std::fs;
    use std::path::Path;

    use chtl_compiler::cmod::archive::{
        list_entries, pack_directory, unpack_archive,
    };
    use chtl_compiler::cmod::{CmodError, CompressionLevel};
    use tempfile::tempdir;

    fn make_module(root: &Path) {
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("info")).unwrap();
        fs::write(root.join("src/widgets.chtl"), "div { \"w\" }\n").unwrap();
        fs::write(
            root.join("info/widgets.chtl"),
            "[Info] { name = \"widgets\"; version = \"1.0.0\"; }\n",
        )
        .unwrap();
        fs::write(root.join("extra.chtl"), "span { }\n").unwrap();
    }

    fn read_tree(root: &Path) -> Vec<(String, Vec<u8>)> {
        let mut files = Vec::new();
        fn walk(root: &Path, dir: &Path, files: &mut Vec<(String, Vec<u8>)>) {
            let mut entries: Vec<_> = fs::read_dir(dir)
                .unwrap()
                .map(|e| e.unwrap().path())
                .collect();
            entries.sort();
            for entry in entries {
                if entry.is_dir() {
                    walk(root, &entry, files);
                } else {
                    let relative = entry.strip_prefix(root).unwrap();
                    files.push((
                        relative.to_string_lossy().replace('\\', "/"),
                        fs::read(&entry).unwrap(),
                    ));
                }
            }
        }
        walk(root, root, &mut files);
        files
    }

    mod round_trip {
        use super::*;

        #[test]
        fn unpack_of_pack_reproduces_the_tree() {
            let workspace = tempdir().unwrap();
            let module = workspace.path().join("widgets");
            make_module(&module);

            let archive = workspace.path().join("widgets.cmod");
            pack_directory(&module, &archive, CompressionLevel::Normal).unwrap();

            let out = workspace.path().join("out");
            unpack_archive(&archive, &out).unwrap();

            assert_eq!(read_tree(&module), read_tree(&out));
        }

        #[test]
        fn round_trip_works_for_every_compression_level() {
            for level in [
                CompressionLevel::None,
                CompressionLevel::Fast,
                CompressionLevel::Normal,
                CompressionLevel::Best,
            ] {
                let workspace = tempdir().unwrap();
                let module = workspace.path().join("m");
                make_module(&module);
                let archive = workspace.path().join("m.cmod");
                pack_directory(&module, &archive, level).unwrap();
                let out = workspace.path().join("out");
                unpack_archive(&archive, &out).unwrap();
                assert_eq!(read_tree(&module), read_tree(&out));
            }
        }
    }

    mod format {
        use super::*;

        #[test]
        fn archive_starts_with_the_zip_magic() {
            let workspace = tempdir().unwrap();
            let module = workspace.path().join("m");
            make_module(&module);
            let archive = workspace.path().join("m.cmod");
            pack_directory(&module, &archive, CompressionLevel::Normal).unwrap();
            let bytes = fs::read(&archive).unwrap();
            assert_eq!(&bytes[..4], b"PK\x03\x04");
        }

        #[test]
        fn packing_twice_is_byte_identical() {
            let workspace = tempdir().unwrap();
            let module = workspace.path().join("m");
            make_module(&module);
            let first = workspace.path().join("a.cmod");
            let second = workspace.path().join("b.cmod");
            pack_directory(&module, &first, CompressionLevel::Normal).unwrap();
            pack_directory(&module, &second, CompressionLevel::Normal).unwrap();
            assert_eq!(fs::read(first).unwrap(), fs::read(second).unwrap());
        }

        #[test]
        fn listing_reports_paths_sizes_and_checksums() {
            let workspace = tempdir().unwrap();
            let module = workspace.path().join("m");
            make_module(&module);
            let archive = workspace.path().join("m.cmod");
            pack_directory(&module, &archive, CompressionLevel::None).unwrap();

            let entries = list_entries(&archive).unwrap();
            assert_eq!(entries.len(), 3);
            let paths: Vec<&String> = entries.iter().map(|e| &e.path).collect();
            assert!(paths.contains(&&"src/widgets.chtl".to_string()));
            assert!(paths.contains(&&"info/widgets.chtl".to_string()));
            for entry in &entries {
                assert!(entry.uncompressed_size > 0);
                assert_ne!(entry.crc32, 0);
            }
        }

        #[test]
        fn non_archives_are_rejected() {
            let workspace = tempdir().unwrap();
            let bogus = workspace.path().join("bogus.cmod");
            fs::write(&bogus, b"definitely not a zip").unwrap();
            let error = unpack_archive(&bogus, &workspace.path().join("out")).unwrap_err();
            assert!(matches!(error, CmodError::NotAnArchive(_)));
        }
    }

    mod integrity {
        use super::*;

        #[test]
        fn corrupted_data_fails_the_checksum() {
            let workspace = tempdir().unwrap();
            let module = workspace.path().join("m");
            make_module(&module);
            let archive = workspace.path().join("m.cmod");
            // Stored entries keep file bytes verbatim, so the payload
            // can be located and flipped directly.
            pack_directory(&module, &archive, CompressionLevel::None).unwrap();

            let mut bytes = fs::read(&archive).unwrap();
            let needle = b"div { \"w\" }";
            let at = bytes
                .windows(needle.len())
                .position(|w| w == needle)
                .expect("stored payload present");
            bytes[at] ^= 0xFF;
            fs::write(&archive, &bytes).unwrap();

            let error = unpack_archive(&archive, &workspace.path().join("out")).unwrap_err();
            assert!(matches!(error, CmodError::ChecksumMismatch(_)));
        }

        #[test]
        fn entries_escaping_the_root_are_rejected() {
            let workspace = tempdir().unwrap();
            let archive = workspace.path().join("evil.cmod");
            fs::write(&archive, build_archive_with_entry("../evil.txt", b"boom")).unwrap();
            let error = unpack_archive(&archive, &workspace.path().join("out")).unwrap_err();
            assert!(matches!(error, CmodError::EntryEscapesRoot(_)));
        }

        #[test]
        fn absolute_entries_are_rejected() {
            let workspace = tempdir().unwrap();
            let archive = workspace.path().join("evil.cmod");
            fs::write(&archive, build_archive_with_entry("/etc/owned", b"boom")).unwrap();
            let error = unpack_archive(&archive, &workspace.path().join("out")).unwrap_err();
            assert!(matches!(error, CmodError::EntryEscapesRoot(_)));
        }
    }

    /// Hand-build a single-entry stored archive so traversal paths the
    /// packer would never produce can be exercised.
    fn build_archive_with_entry(path: &str, data: &[u8]) -> Vec<u8> {
        fn u16le(out: &mut Vec<u8>, v: u16) {
            out.extend_from_slice(&v.to_le_bytes());
        }
        fn u32le(out: &mut Vec<u8>, v: u32) {
            out.extend_from_slice(&v.to_le_bytes());
        }

        let crc = crc32fast::hash(data);
        let mut bytes = Vec::new();

        // Local file header.
        u32le(&mut bytes, 0x0403_4b50);
        u16le(&mut bytes, 20);
        u16le(&mut bytes, 0);
        u16le(&mut bytes, 0); // stored
        u16le(&mut bytes, 0);
        u16le(&mut bytes, 0);
        u32le(&mut bytes, crc);
        u32le(&mut bytes, data.len() as u32);
        u32le(&mut bytes, data.len() as u32);
        u16le(&mut bytes, path.len() as u16);
        u16le(&mut bytes, 0);
        bytes.extend_from_slice(path.as_bytes());
        bytes.extend_from_slice(data);

        // Central directory.
        let central_offset = bytes.len() as u32;
        u32le(&mut bytes, 0x0201_4b50);
        u16le(&mut bytes, 20);
        u16le(&mut bytes, 20);
        u16le(&mut bytes, 0);
        u16le(&mut bytes, 0); // stored
        u16le(&mut bytes, 0);
        u16le(&mut bytes, 0);
        u32le(&mut bytes, crc);
        u32le(&mut bytes, data.len() as u32);
        u32le(&mut bytes, data.len() as u32);
        u16le(&mut bytes, path.len() as u16);
        u16le(&mut bytes, 0);
        u16le(&mut bytes, 0);
        u16le(&mut bytes, 0);
        u16le(&mut bytes, 0);
        u32le(&mut bytes, 0);
        u32le(&mut bytes, 0); // local header offset
        bytes.extend_from_slice(path.as_bytes());
        let central_size = bytes.len() as u32 - central_offset;

        // End of central directory.
        u32le(&mut bytes, 0x0605_4b50);
        u16le(&mut bytes, 0);
        u16le(&mut bytes, 0);
        u16le(&mut bytes, 1);
        u16le(&mut bytes, 1);
        u32le(&mut bytes, central_size);
        u32le(&mut bytes, central_offset);
        u16le(&mut bytes, 0);
        bytes
    }
}
