use crate::domain::RawRow;
use crate::error::Result;
use csv::ReaderBuilder;
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Delimiters probed in the header line, in fixed priority order.
const DELIMITER_CANDIDATES: [char; 4] = [',', ';', '|', '\t'];

/// Per-file ingestion record kept for audit and logging.
#[derive(Debug, Clone)]
pub struct SourceFileInfo {
    pub name: String,
    pub rows: usize,
    pub delimiter: char,
    pub encoding: &'static str,
}

/// All rows read in one scan, concatenated in deterministic file order
/// (lexicographic path order, original order within each file).
#[derive(Debug, Default)]
pub struct ScanOutput {
    pub rows: Vec<RawRow>,
    pub files: Vec<SourceFileInfo>,
}

/// Reads every file under the given directories. Zero files or zero rows
/// is valid; a file that resists decoding falls back to lenient decoding
/// and never aborts the scan.
pub fn read_input_dirs(dirs: &[PathBuf]) -> Result<ScanOutput> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for dir in dirs {
        if !dir.exists() {
            warn!(dir = %dir.display(), "Input directory missing; skipping");
            continue;
        }
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
    }
    paths.sort();

    let mut output = ScanOutput::default();
    for path in &paths {
        match read_file(path) {
            Ok((rows, file_info)) => {
                info!(
                    file = %file_info.name,
                    rows = file_info.rows,
                    delimiter = %file_info.delimiter,
                    encoding = file_info.encoding,
                    "Imported source file"
                );
                output.rows.extend(rows);
                output.files.push(file_info);
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping unreadable source file");
            }
        }
    }
    Ok(output)
}

/// Reads a single delimited file into raw rows, detecting encoding and
/// delimiter from its header line.
pub fn read_file(path: &Path) -> Result<(Vec<RawRow>, SourceFileInfo)> {
    let bytes = fs::read(path)?;
    let (text, encoding) = decode(&bytes);
    let delimiter = detect_delimiter(&text);

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => {
                let fields = headers
                    .iter()
                    .zip(record.iter())
                    .map(|(header, value)| (header.clone(), value.to_string()))
                    .collect();
                rows.push(RawRow::new(fields));
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping malformed row");
            }
        }
    }

    let info = SourceFileInfo {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        rows: rows.len(),
        delimiter,
        encoding,
    };
    Ok((rows, info))
}

/// Decodes file bytes by trying strict UTF-8 first, then Latin-1, accepting
/// the first encoding under which the header line decodes cleanly. Files
/// whose body still fails the accepted encoding are decoded leniently with
/// replacement characters.
fn decode(bytes: &[u8]) -> (Cow<'_, str>, &'static str) {
    let header_end = bytes
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(bytes.len());

    if std::str::from_utf8(&bytes[..header_end]).is_ok() {
        return match std::str::from_utf8(bytes) {
            Ok(text) => (Cow::Borrowed(text), "utf-8"),
            Err(_) => (String::from_utf8_lossy(bytes), "utf-8(lossy)"),
        };
    }

    // Latin-1 maps every byte to the code point of the same value.
    let text: String = bytes.iter().map(|&b| b as char).collect();
    (Cow::Owned(text), "latin-1")
}

/// Picks the delimiter by scanning the header for candidates in priority
/// order, then sniffing the first lines, defaulting to comma.
fn detect_delimiter(text: &str) -> char {
    let header = text.lines().next().unwrap_or("");
    for candidate in DELIMITER_CANDIDATES {
        if header.contains(candidate) {
            return candidate;
        }
    }
    sniff_delimiter(text).unwrap_or(',')
}

/// Heuristic fallback: the candidate occurring most often across the first
/// few lines wins.
fn sniff_delimiter(text: &str) -> Option<char> {
    let mut counts = [0usize; DELIMITER_CANDIDATES.len()];
    for line in text.lines().take(5) {
        for (i, candidate) in DELIMITER_CANDIDATES.iter().enumerate() {
            counts[i] += line.matches(*candidate).count();
        }
    }
    let (best, &count) = counts
        .iter()
        .enumerate()
        .max_by_key(|(_, &c)| c)?;
    if count > 0 {
        Some(DELIMITER_CANDIDATES[best])
    } else {
        None
    }
}
