use crate::TransferError;

/// Normalizes a destination directory relative to the share root.
///
/// Both `/` and `\` separate segments. Leading, trailing and repeated
/// separators and `.` segments are dropped, so `""`, `"/"` and `"."` all
/// mean the share root and come back as `""`. The result is joined with `/`.
///
/// A `..` segment or a segment carrying a drive or stream prefix (`C:`) is
/// rejected, naming the offending segment and its position.
pub fn normalize_destination(dest: &str) -> Result<String, TransferError> {
    let mut kept: Vec<&str> = Vec::new();

    for (position, segment) in dest.split(['/', '\\']).enumerate() {
        match segment {
            "" | "." => {}
            ".." => {
                return Err(TransferError::InvalidPath(format!(
                    "segment {position} of {dest:?} leaves the share root"
                )));
            }
            s if s.contains(':') => {
                return Err(TransferError::InvalidPath(format!(
                    "segment {position} of {dest:?} has a drive prefix: {s:?}"
                )));
            }
            s => kept.push(s),
        }
    }

    Ok(kept.join("/"))
}
