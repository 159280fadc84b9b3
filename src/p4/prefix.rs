//! Depot prefix resolution.
//!
//! The stream root is derived structurally from any depot path in the query
//! plus the stream depth, which avoids a second round-trip to the server:
//! every path returned by a single command shares the same stream root.

/// Error type for depot prefix resolution.
#[derive(thiserror::Error, Debug)]
pub enum PrefixError {
    /// The sample path did not begin with the `//` depot root marker.
    #[error(r#"line "{0}" does not begin with "//""#)]
    MissingRoot(String),
    /// The sample path had fewer slash-terminated segments than the depth.
    #[error(r#"line "{path}" has fewer than {depth} slash-terminated segments"#)]
    TooShallow {
        /// The offending path.
        path: String,
        /// The requested stream depth.
        depth: usize,
    },
}

/// Returns the `//` root plus the first `depth` slash-terminated segments
/// of `path`.
///
/// For example, `("//a/b/c/d:foo", 2)` returns `"//a/b/"`.
///
/// # Errors
///
/// Returns `PrefixError` if `path` does not begin with `"//"` or contains
/// fewer than `depth` slash-terminated segments.
pub fn depot_prefix(path: &str, depth: usize) -> Result<String, PrefixError> {
    let Some(rest) = path.strip_prefix("//") else {
        return Err(PrefixError::MissingRoot(path.to_string()));
    };

    let mut end = 2;
    let mut remaining = rest;
    for _ in 0..depth {
        match remaining.find('/') {
            Some(i) => {
                end += i + 1;
                remaining = &remaining[i + 1..];
            }
            None => {
                return Err(PrefixError::TooShallow {
                    path: path.to_string(),
                    depth,
                });
            }
        }
    }

    Ok(path[..end].to_string())
}
