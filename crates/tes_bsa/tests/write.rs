use binrw::BinRead;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use tes_bsa::{
    build,
    error::Error,
    hash::{hash_folder, hash_path},
    read::BsaArchive,
    types::{BsaHeader, FileRecord, FolderRecord, Version},
    write::{BsaEntry, BsaWriter, BsaWriterOptions},
    CompressionLevel, CompressionMode,
};
use tracing::{info, instrument};
use tracing_test::traced_test;

const MODES: [CompressionMode; 7] = [
    CompressionMode::None,
    CompressionMode::Ratio80,
    CompressionMode::Ratio60,
    CompressionMode::Ratio40,
    CompressionMode::Ratio20,
    CompressionMode::Always,
    CompressionMode::Manual,
];

fn sample_entries() -> Vec<BsaEntry> {
    vec![
        BsaEntry::new(
            "meshes/armor/cuirass.nif",
            b"NetImmerse File Format ".repeat(64),
        ),
        BsaEntry::new("textures/sky.dds", b"DDS |".repeat(200)),
        BsaEntry::builder()
            .name("sound/fx/boom.wav")
            .source(b"RIFF....WAVEfmt ".repeat(40))
            .compress(true)
            .build(),
        BsaEntry::new("meshes/char/skeleton.kf", b"kf".to_vec()),
        BsaEntry::new("empty.txt", Vec::new()),
        BsaEntry::builder()
            .name("Textures/Armor/Iron.DDS")
            .source((0..=255u8).cycle().take(3000).collect::<Vec<_>>())
            .compress(true)
            .build(),
    ]
}

fn write(entries: Vec<BsaEntry>, options: BsaWriterOptions) -> Result<Vec<u8>> {
    let mut writer = BsaWriter::new(Cursor::new(Vec::new()), options);
    for entry in entries {
        writer.add(entry)?;
    }
    Ok(writer.finish()?.into_inner())
}

#[instrument(skip_all, fields(?mode, ?version))]
fn validate_roundtrip(mode: CompressionMode, version: Version) -> Result<()> {
    let entries = sample_entries();
    let bytes = write(
        entries.clone(),
        BsaWriterOptions::builder()
            .compression(mode)
            .level(CompressionLevel::Maximum)
            .version(version)
            .build(),
    )?;
    info!(size = bytes.len(), "archive written");

    let mut archive = BsaArchive::new(Cursor::new(bytes))?;
    assert_eq!(archive.len(), entries.len());
    assert_eq!(archive.version(), version);
    assert_eq!(
        archive.is_compressed_by_default(),
        mode.compressed_by_default()
    );

    for entry in entries {
        let expected = match entry.source {
            tes_bsa::write::FileSource::Memory(data) => data,
            tes_bsa::write::FileSource::Path(path) => std::fs::read(path).into_diagnostic()?,
        };
        assert_eq!(archive.get_file(&entry.name)?, Some(expected));
    }

    Ok(())
}

#[traced_test]
#[test]
fn roundtrip_every_mode() -> Result<()> {
    for mode in MODES {
        validate_roundtrip(mode, Version::Oblivion)?;
        validate_roundtrip(mode, Version::Fallout3)?;
    }

    Ok(())
}

#[test]
fn compression_decisions_per_mode() -> Result<()> {
    let text = "meshes/text.nif";
    let tiny = "meshes/tiny.nif";
    let entries = || {
        vec![
            BsaEntry::new(text, b"the quick brown fox jumps over the lazy dog ".repeat(50)),
            BsaEntry::new(tiny, b"ab".to_vec()),
        ]
    };

    let expectations = [
        (CompressionMode::None, false, false),
        (CompressionMode::Ratio80, true, false),
        (CompressionMode::Ratio20, true, false),
        (CompressionMode::Always, true, true),
        (CompressionMode::Manual, false, false),
    ];

    for (mode, text_compressed, tiny_compressed) in expectations {
        let bytes = write(
            entries(),
            BsaWriterOptions::builder().compression(mode).build(),
        )?;
        let archive = BsaArchive::new(Cursor::new(bytes))?;

        assert_eq!(
            archive.entry(text).map(|e| e.compressed),
            Some(text_compressed),
            "{mode:?}"
        );
        assert_eq!(
            archive.entry(tiny).map(|e| e.compressed),
            Some(tiny_compressed),
            "{mode:?}"
        );
    }

    Ok(())
}

#[test]
fn identical_input_gives_identical_archives() -> Result<()> {
    let options = BsaWriterOptions::builder()
        .compression(CompressionMode::Ratio60)
        .build();

    let mut reversed = sample_entries();
    reversed.reverse();

    let first = write(sample_entries(), options)?;
    let second = write(sample_entries(), options)?;
    let third = write(reversed, options)?;

    assert_eq!(first, second);
    assert_eq!(first, third);

    Ok(())
}

#[test]
fn records_are_sorted_by_hash() -> Result<()> {
    let bytes = write(sample_entries(), BsaWriterOptions::default())?;
    let mut input = Cursor::new(&bytes);

    let header = BsaHeader::read(&mut input).into_diagnostic()?;
    assert_eq!(header.folder_count, 6);
    assert_eq!(header.file_count, 6);

    let folders = (0..header.folder_count)
        .map(|_| FolderRecord::read_le(&mut input))
        .collect::<binrw::BinResult<Vec<_>>>()
        .into_diagnostic()?;
    assert!(folders.windows(2).all(|w| w[0].hash < w[1].hash));
    assert!(folders
        .iter()
        .any(|f| f.hash == hash_folder(r"textures\armor")));

    for folder in &folders {
        let position = u64::from(folder.offset - header.total_file_name_length);
        input
            .seek(SeekFrom::Start(position))
            .into_diagnostic()?;

        let mut length = [0u8; 1];
        input.read_exact(&mut length).into_diagnostic()?;
        input
            .seek(SeekFrom::Current(i64::from(length[0])))
            .into_diagnostic()?;

        let files = (0..folder.file_count)
            .map(|_| FileRecord::read_le(&mut input))
            .collect::<binrw::BinResult<Vec<_>>>()
            .into_diagnostic()?;
        assert!(files.windows(2).all(|w| w[0].hash < w[1].hash));
    }

    Ok(())
}

#[test]
fn file_records_hash_the_bare_name() -> Result<()> {
    let bytes = write(
        vec![BsaEntry::new("textures/sky.dds", b"sky".to_vec())],
        BsaWriterOptions::default(),
    )?;

    // header, one folder record, then "textures" as a length prefixed string
    let record = 36 + 16 + 1 + 9;
    let hash = u64::from_le_bytes(bytes[record..record + 8].try_into().into_diagnostic()?);
    assert_eq!(hash, hash_path("sky.dds"));
    assert_ne!(hash, hash_path("textures/sky.dds"));

    Ok(())
}

#[test]
fn lookups_ignore_case_and_separators() -> Result<()> {
    let bytes = write(sample_entries(), BsaWriterOptions::default())?;
    let mut archive = BsaArchive::new(Cursor::new(bytes))?;

    assert!(archive.contains(r"MESHES\ARMOR\CUIRASS.NIF"));
    assert_eq!(
        archive.get_file("Meshes/Char/Skeleton.KF")?,
        Some(b"kf".to_vec())
    );
    assert_eq!(archive.get_file("meshes/missing.nif")?, None);
    assert_eq!(archive.get_file("kf")?, None);

    Ok(())
}

#[test]
fn colliding_hashes_resolve_to_the_later_entry() -> Result<()> {
    assert_eq!(hash_path("abyz.c"), hash_path("acyz.b"));

    let bytes = write(
        vec![
            BsaEntry::new("data/abyz.c", b"first".to_vec()),
            BsaEntry::new("data/acyz.b", b"second".to_vec()),
        ],
        BsaWriterOptions::default(),
    )?;
    let mut archive = BsaArchive::new(Cursor::new(bytes))?;

    assert_eq!(archive.len(), 2);
    assert_eq!(
        archive.paths().collect::<Vec<_>>(),
        vec![r"data\abyz.c", r"data\acyz.b"]
    );
    assert_eq!(archive.get_file("data/abyz.c")?, Some(b"second".to_vec()));
    assert_eq!(archive.get_file("data/acyz.b")?, Some(b"second".to_vec()));

    Ok(())
}

#[test]
fn streaming_matches_get_file() -> Result<()> {
    let bytes = write(
        sample_entries(),
        BsaWriterOptions::builder()
            .compression(CompressionMode::Always)
            .build(),
    )?;
    let mut archive = BsaArchive::new(Cursor::new(bytes))?;
    let paths = archive.paths().map(str::to_owned).collect::<Vec<_>>();

    for path in paths {
        let mut streamed = Vec::new();
        {
            let mut file = archive.by_path(&path)?.expect("listed path");
            assert!(file.is_compressed());
            file.read_to_end(&mut streamed).into_diagnostic()?;
            assert_eq!(streamed.len() as u64, file.size());
        }
        assert_eq!(archive.get_file(&path)?, Some(streamed));
    }

    Ok(())
}

#[traced_test]
#[test]
fn oversized_files_are_skipped() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let huge = dir.path().join("huge.bin");
    File::create(&huge)
        .into_diagnostic()?
        .set_len(1 << 30)
        .into_diagnostic()?;

    let small = dir.path().join("small.txt");
    std::fs::write(&small, b"small enough").into_diagnostic()?;

    let report = build(
        Cursor::new(Vec::new()),
        vec![
            BsaEntry::new("data/huge.bin", huge.as_path()),
            BsaEntry::new("data/small.txt", small.as_path()),
            BsaEntry::new("data/inline.txt", b"inline".to_vec()),
        ],
        BsaWriterOptions::default(),
    )?;

    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name, "data/huge.bin");
    assert!(matches!(
        report.skipped[0].error,
        Error::FileTooLarge { size, .. } if size == 1 << 30
    ));
    assert!(logs_contain("skipping file"));

    let mut archive = BsaArchive::new(Cursor::new(report.inner.into_inner()))?;
    assert_eq!(archive.len(), 2);
    assert!(!archive.contains("data/huge.bin"));
    assert_eq!(
        archive.get_file("data/small.txt")?,
        Some(b"small enough".to_vec())
    );
    assert_eq!(archive.get_file("data/inline.txt")?, Some(b"inline".to_vec()));

    Ok(())
}

#[test]
fn open_from_disk() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let path = dir.path().join("test.bsa");

    let report = build(
        File::create(&path).into_diagnostic()?,
        sample_entries(),
        BsaWriterOptions::builder()
            .compression(CompressionMode::Ratio40)
            .build(),
    )?;
    assert!(report.skipped.is_empty());
    drop(report);

    let mut archive = BsaArchive::open(&path)?;
    assert_eq!(archive.len(), 6);
    assert_eq!(
        archive.get_file("textures/sky.dds")?,
        Some(b"DDS |".repeat(200))
    );

    Ok(())
}
