use crate::{Error, ErrorKind, Result};

/// Generic escaping used when a backend has no native one: every `'` and `\`
/// is doubled. Not guaranteed to be correct for every backend.
pub fn escape_fallback(input: &[u8], output: &mut Vec<u8>) {
    output.reserve(input.len());
    for &b in input {
        if b == b'\'' || b == b'\\' {
            output.push(b);
        }
        output.push(b);
    }
}

/// Copy `escaped` into `out` followed by a NUL byte, returns the length
/// without the terminator.
pub fn write_nul_terminated(escaped: &[u8], out: &mut [u8]) -> Result<usize> {
    if escaped.len() >= out.len() {
        return Err(Error::with_detail(
            ErrorKind::SizeMismatch,
            format!(
                "Escaped value needs {} bytes but the buffer has {}",
                escaped.len() + 1,
                out.len()
            ),
        ));
    }
    out[..escaped.len()].copy_from_slice(escaped);
    out[escaped.len()] = 0;
    Ok(escaped.len())
}

/// The statement bytes selected by an explicit `length`, zero means up to the
/// first NUL byte (or the whole slice).
pub fn statement_slice(sql: &[u8], length: usize) -> Result<&[u8]> {
    if length == 0 {
        let end = sql.iter().position(|&b| b == 0).unwrap_or(sql.len());
        return Ok(&sql[..end]);
    }
    sql.get(..length).ok_or_else(|| {
        Error::with_detail(
            ErrorKind::InvalidParam,
            format!(
                "Statement length {} exceeds the {} bytes provided",
                length,
                sql.len()
            ),
        )
    })
}

/// Statement text suitable for logs, cut after roughly 500 bytes.
pub fn printable_query(sql: &[u8]) -> String {
    let text = String::from_utf8_lossy(sql);
    let mut end = text.len().min(497);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!(
        "{}{}",
        text[..end].trim_end(),
        if text.len() > end { "..." } else { "" }
    )
}
