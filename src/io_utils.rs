//! File and stream helpers shared by the command handlers.
//!
//! - **Text input**: files or stdin (the `-` path), decoded with an optional
//!   `encoding_rs` label and defaulting to UTF-8.
//! - **Text output**: files or stdout, always written as UTF-8.
//! - **Workspace**: the JSON document holding every table's mappings, keyed by
//!   `schema.table`. A missing workspace file reads as an empty store.

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

use crate::store::MappingStore;

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

/// Reads `path` (or stdin for `-`) and decodes it with the labelled encoding.
pub fn read_text(path: &Path, encoding: Option<&str>) -> Result<String> {
    let encoding = resolve_encoding(encoding)?;
    let mut bytes = Vec::new();
    if is_dash(path) {
        io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Reading standard input")?;
    } else {
        BufReader::new(File::open(path).with_context(|| format!("Opening input file {path:?}"))?)
            .read_to_end(&mut bytes)
            .with_context(|| format!("Reading input file {path:?}"))?;
    }
    decode_bytes(&bytes, encoding).with_context(|| format!("Decoding {path:?}"))
}

/// Writes `contents` to `path`, or to stdout when `path` is absent or `-`.
pub fn write_text(path: Option<&Path>, contents: &str) -> Result<()> {
    let mut writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(io::stdout().lock()),
    };
    writer.write_all(contents.as_bytes())?;
    writer.flush()?;
    Ok(())
}

pub fn load_workspace(path: &Path) -> Result<MappingStore> {
    if !path.exists() {
        return Ok(MappingStore::new());
    }
    let file = File::open(path).with_context(|| format!("Opening workspace {path:?}"))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Parsing workspace JSON from {path:?}"))
}

pub fn save_workspace(path: &Path, store: &MappingStore) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating workspace directory {parent:?}"))?;
    }
    let file = File::create(path).with_context(|| format!("Creating workspace {path:?}"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, store).context("Writing workspace JSON")?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn decodes_legacy_encodings() {
        let (bytes, _, _) = WINDOWS_1252.encode("café");
        let text = decode_bytes(&bytes, resolve_encoding(Some("windows-1252")).unwrap()).unwrap();
        assert_eq!(text, "café");
    }

    #[test]
    fn unknown_encoding_labels_are_rejected() {
        assert!(resolve_encoding(Some("klingon")).is_err());
    }
}
