//! Document I/O helpers for the CLI.

use crate::document::Document;
use crate::error::Result;
use std::io::{Read, Write};
use std::path::Path;

/// Serialize a document as JSON to a writer.
pub fn write_document(doc: &Document, pretty: bool, out: &mut impl Write) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *out, doc)?;
    } else {
        serde_json::to_writer(&mut *out, doc)?;
    }
    out.write_all(b"\n")?;
    Ok(())
}

/// Read a document from a JSON file.
pub fn read_document(path: &Path) -> Result<Document> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Read raw text from a file, or stdin when the path is `-`.
pub fn read_text(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}
