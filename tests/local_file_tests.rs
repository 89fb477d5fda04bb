//! Reading images from disk

use std::io::{Read, Write};

use espfs::{Compression, EspFs, Error, ImageBuilder, LocalFileReader, ReadAt, Store};
use tempfile::NamedTempFile;

fn write_image(image: &[u8]) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(image).unwrap();
    tmp.flush().unwrap();
    tmp
}

#[test]
fn test_open_from_local_file() {
    let script = b"document.title = 'espfs';\n".repeat(40);
    let image = ImageBuilder::new()
        .add("index.html", b"<p>hello</p>", Compression::None)
        .add("js/app.js", &script, Compression::Heatshrink)
        .build();
    let tmp = write_image(&image);

    let reader = LocalFileReader::new(tmp.path()).unwrap();
    assert_eq!(reader.size(), image.len() as u64);

    let fs = EspFs::init(reader).unwrap();
    let mut content = String::new();
    fs.open("index.html")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "<p>hello</p>");

    let mut packed = Vec::new();
    fs.open("/js/app.js")
        .unwrap()
        .read_to_end(&mut packed)
        .unwrap();
    assert_eq!(packed, script);
}

#[test]
fn test_local_file_not_an_image() {
    let tmp = write_image(b"just some text, nothing to see");
    let reader = LocalFileReader::new(tmp.path()).unwrap();
    assert!(matches!(EspFs::init(reader), Err(Error::NoImage { .. })));
}

#[test]
fn test_missing_local_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = LocalFileReader::new(&dir.path().join("absent.espfs"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_store_over_local_file() {
    let image = ImageBuilder::new()
        .add("a.txt", b"alpha", Compression::Heatshrink)
        .build();
    let tmp = write_image(&image);

    let mut store = Store::new();
    assert!(matches!(store.open("a.txt"), Err(Error::NotInitialized)));

    store.init(LocalFileReader::new(tmp.path()).unwrap()).unwrap();
    assert!(store.is_initialized());

    let mut content = Vec::new();
    store
        .open("a.txt")
        .unwrap()
        .read_to_end(&mut content)
        .unwrap();
    assert_eq!(content, b"alpha");
}
