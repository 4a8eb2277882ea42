use aaru_fl4::{
    error::{Error, Result},
    read::extract,
    write::build,
    Codepage, CompressionMethod, Fl4Archive, Fl4ReaderOptions, Fl4WriterOptions,
};
use pretty_assertions::assert_eq;
use std::io::{Cursor, Read};
use tracing::info;
use tracing_test::traced_test;

/// Offset of the index offset field in the header
const INDEX_OFFSET_FIELD: usize = 14;

#[traced_test]
#[test]
fn rejects_foreign_files() {
    let inputs: [&[u8]; 4] = [
        b"",
        b"FL4.",
        b"PK\x03\x04 this is a zip file, not an fl4 archive",
        b"FL4.1\0\0\0\x1c\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0",
    ];

    for input in inputs {
        info!("opening {:02X?}", input);
        assert!(matches!(
            extract(input, Fl4ReaderOptions::default()),
            Err(Error::InvalidArchive)
        ));
    }
}

#[traced_test]
#[test]
fn rejects_index_past_end() -> Result<()> {
    let pristine = build([("A.TXT", b"hi".to_vec())], Fl4WriterOptions::default())?;

    let mut container = pristine.clone();
    container[INDEX_OFFSET_FIELD..INDEX_OFFSET_FIELD + 4].copy_from_slice(&4096i32.to_le_bytes());

    assert!(matches!(
        extract(&container, Fl4ReaderOptions::default()),
        Err(Error::CorruptIndex(_))
    ));

    let mut container = pristine;
    container.truncate(1000);
    assert!(matches!(
        Fl4Archive::new(Cursor::new(container), Fl4ReaderOptions::default()),
        Err(Error::CorruptIndex(_))
    ));

    Ok(())
}

#[traced_test]
#[test]
fn magic_decides_compression() -> Result<()> {
    // stored as a bitmap but never compressed
    let options = Fl4WriterOptions::builder()
        .compressed_extensions(Vec::new())
        .build();
    let container = build([("RAW.BM2", b"PD2".to_vec())], options)?;

    let mut archive = Fl4Archive::new(Cursor::new(container), Fl4ReaderOptions::default())?;
    let file = archive.by_index(0)?;
    assert_eq!(file.compression_method(), CompressionMethod::None);
    assert_eq!(file.into_data(), b"PD2");

    // compressed although the extension says otherwise
    let options = Fl4WriterOptions::builder()
        .compressed_extensions(vec![".dat".to_owned()])
        .build();
    let container = build([("SCRIPT.DAT", b"ABABABABABABABAB".to_vec())], options)?;

    let mut archive = Fl4Archive::new(Cursor::new(container), Fl4ReaderOptions::default())?;
    let mut buffer = Vec::new();
    let mut file = archive.by_name("SCRIPT.DAT")?;
    assert_eq!(file.compression_method(), CompressionMethod::Lzss);
    file.read_to_end(&mut buffer)?;
    assert_eq!(buffer, b"ABABABABABABABAB");

    Ok(())
}

#[traced_test]
#[test]
fn shift_jis_names() -> Result<()> {
    let name = "画像\\タイトル.BM2";
    let writer_options = Fl4WriterOptions::builder()
        .codepage(Codepage::SHIFT_JIS)
        .build();
    let container = build([(name, b"title".to_vec())], writer_options)?;

    let options = Fl4ReaderOptions::builder()
        .codepage(Codepage::SHIFT_JIS)
        .build();
    let mut archive = Fl4Archive::new(Cursor::new(&container), options)?;
    let file = archive.by_name(name)?;
    assert_eq!(file.name(), name);
    assert_eq!(file.name_raw().len(), 17);
    assert_eq!(file.into_data(), b"title");

    // decoding with the wrong codepage still lists the entry
    let archive = Fl4Archive::new(Cursor::new(&container), Fl4ReaderOptions::default())?;
    assert_eq!(archive.len(), 1);
    assert!(archive.index_for_name(name).is_none());

    Ok(())
}

#[traced_test]
#[test]
fn unmappable_names_are_rejected() {
    let options = Fl4WriterOptions::builder()
        .codepage(Codepage::SHIFT_JIS)
        .build();
    assert!(matches!(
        build([("😀.TXT", Vec::new())], options),
        Err(Error::UnmappableName { .. })
    ));
}

#[traced_test]
#[test]
fn lookups() -> Result<()> {
    let container = build(
        [("WORLD.TXT", b"world".to_vec()), ("HELLO.TXT", b"hello".to_vec())],
        Fl4WriterOptions::default(),
    )?;
    let mut archive = Fl4Archive::new(Cursor::new(container), Fl4ReaderOptions::default())?;

    assert_eq!(archive.len(), 2);
    // WORLD.TXT hashes to 84, HELLO.TXT to 373
    assert_eq!(archive.name_for_index(0), Some("WORLD.TXT"));
    assert_eq!(archive.index_for_name("HELLO.TXT"), Some(1));
    assert_eq!(archive.stored_size(), Some(10));

    assert_eq!(archive.by_name("HELLO.TXT")?.into_data(), b"hello");
    assert!(matches!(
        archive.by_name("MISSING.TXT"),
        Err(Error::FileNotFound(_))
    ));
    assert!(matches!(archive.by_index(2), Err(Error::FileNotFound(_))));

    Ok(())
}

#[traced_test]
#[test]
fn names_that_decode_alike() -> Result<()> {
    let options = Fl4WriterOptions::builder()
        .codepage(Codepage::SHIFT_JIS)
        .build();
    let container = build([("あ.TXT", b"a".to_vec()), ("い.TXT", b"i".to_vec())], options)?;

    // neither name is valid UTF-8, both decode to replacement characters
    let mut archive = Fl4Archive::new(Cursor::new(&container), Fl4ReaderOptions::default())?;
    assert_eq!(archive.len(), 1);
    assert_eq!(archive.entry_count(), 2);

    let mut contents = (0..archive.entry_count())
        .map(|n| -> Result<Vec<u8>> { Ok(archive.by_entry(n)?.into_data()) })
        .collect::<Result<Vec<_>>>()?;
    contents.sort();
    assert_eq!(contents, vec![b"a".to_vec(), b"i".to_vec()]);
    assert!(matches!(archive.by_entry(2), Err(Error::FileNotFound(_))));

    assert_eq!(extract(&container, Fl4ReaderOptions::default())?.len(), 2);

    Ok(())
}
