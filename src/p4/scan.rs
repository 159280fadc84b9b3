//! Record tokenizer for blank-line-delimited tagged output.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::p4::{depot_prefix, DepotFile, PrefixError};

/// Error type for scanning tagged output.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// A line did not carry the `"... "` tag marker.
    #[error(r#"expected "... <tag>", but got: {0}"#)]
    Malformed(String),
    /// The first depot path could not be reduced to a stream prefix.
    #[error("error parsing depot prefix: {0}")]
    Prefix(#[from] PrefixError),
    /// The underlying stream failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Scan tagged output into records.
///
/// Tagged output is a sequence of records separated by blank lines, each
/// record a run of `"... <tag> <value>"` lines. A record is kept only if it
/// ended up with a non-empty path. The depot prefix is computed once, from
/// the first `depotFile` value seen, and stripped from every path that
/// begins with it.
///
/// A trailing record not followed by a terminating blank line is dropped,
/// matching the behavior callers already rely on.
///
/// # Errors
///
/// Returns `ScanError` if a line lacks the tag marker, the first depot path
/// cannot be reduced to a prefix, or the underlying read fails. Any error
/// discards everything scanned so far.
pub async fn scan_depot_files<R>(reader: R, depth: usize) -> Result<Vec<DepotFile>, ScanError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut out = Vec::new();
    let mut cur = DepotFile::default();
    let mut prefix: Option<String> = None;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        // An empty line marks the end of a record.
        if line.is_empty() {
            if cur.path.is_empty() {
                cur = DepotFile::default();
            } else {
                out.push(std::mem::take(&mut cur));
            }
            continue;
        }

        let Some(body) = line.strip_prefix("... ") else {
            return Err(ScanError::Malformed(line.to_string()));
        };
        let (tag, value) = match body.split_once(' ') {
            Some((tag, value)) => (tag, value.trim()),
            None => (body, ""),
        };

        if tag == "depotFile" {
            if prefix.is_none() {
                prefix = Some(depot_prefix(value, depth)?);
            }
            if let Some(p) = &prefix {
                cur.apply_tag(tag, value.strip_prefix(p.as_str()).unwrap_or(value));
            }
        } else {
            cur.apply_tag(tag, value);
        }
    }

    Ok(out)
}
