//! Human-readable and JSON-lines rendering of lookup results.

use serde::Serialize;
use std::io::{self, Write};

use crate::lookup::{FileHash, Inspection, PathRecord};

/// Render a stored value: text when it is valid UTF-8, otherwise `0x` + hex.
pub(crate) fn display_value(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => format!("0x{}", hex::encode(bytes)),
    }
}

/// Write the text report for one path.
pub(crate) fn write_record(out: &mut impl Write, record: &PathRecord) -> io::Result<()> {
    let path = &record.path;
    let Some(data) = &record.data else {
        return writeln!(out, "No data found for {path}");
    };
    writeln!(out, "Data found for {path}: {}", display_value(data))?;
    match &record.file_hash {
        FileHash::Skipped => Ok(()),
        FileHash::Missing => writeln!(out, "No file hash found for {path}"),
        FileHash::Found(hash) => writeln!(out, "File hash for {path}: {hash}"),
        FileHash::Undecodable(bytes) => writeln!(
            out,
            "File hash for {path} is not valid UTF-8: 0x{}",
            hex::encode(bytes)
        ),
    }
}

#[derive(Serialize)]
struct RecordLine<'a> {
    path: &'a str,
    key: &'a str,
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_hash: Option<FileHashLine>,
}

#[derive(Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
enum FileHashLine {
    Missing,
    Found(String),
    Undecodable(String),
}

/// Write one JSON object per line for a lookup result.
pub(crate) fn write_record_json(out: &mut impl Write, record: &PathRecord) -> io::Result<()> {
    let file_hash = match &record.file_hash {
        FileHash::Skipped => None,
        FileHash::Missing => Some(FileHashLine::Missing),
        FileHash::Found(hash) => Some(FileHashLine::Found(hash.clone())),
        FileHash::Undecodable(bytes) => {
            Some(FileHashLine::Undecodable(format!("0x{}", hex::encode(bytes))))
        }
    };
    let line = RecordLine {
        path: &record.path,
        key: &record.key,
        found: record.data.is_some(),
        data: record.data.as_deref().map(display_value),
        file_hash,
    };
    serde_json::to_writer(&mut *out, &line)?;
    writeln!(out)
}

/// Write the derived key for a path, `sha256sum` style.
pub(crate) fn write_key(out: &mut impl Write, key: &str, path: &str) -> io::Result<()> {
    writeln!(out, "{key}  {path}")
}

/// Write the companion keys found for one path, then the path set if any.
pub(crate) fn write_companions(out: &mut impl Write, inspection: &Inspection) -> io::Result<()> {
    writeln!(out, "{}", inspection.path)?;
    for entry in &inspection.entries {
        match &entry.value {
            Some(value) => writeln!(
                out,
                "  {:<12} {} = {}",
                entry.label,
                entry.key,
                display_value(value)
            )?,
            None => writeln!(out, "  {:<12} {} (absent)", entry.label, entry.key)?,
        }
    }
    if let Some(path_set) = &inspection.path_set {
        writeln!(
            out,
            "  {:<12} {} ({} members)",
            "path_set",
            path_set.key,
            path_set.members.len()
        )?;
        for member in &path_set.members {
            writeln!(out, "    {}", display_value(member))?;
        }
    }
    Ok(())
}
