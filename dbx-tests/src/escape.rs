use crate::collect_one;
use dbx_core::{ErrorKind, Handle};

pub fn escape(handle: &mut Handle) {
    for value in ["it's", "''", "plain", "quote ' in the middle"] {
        let escaped = handle.escape(value.as_bytes()).expect("Failed to escape");
        let escaped = String::from_utf8(escaped).expect("Escaping must preserve UTF-8");
        let result = collect_one(handle, &format!("SELECT '{}' AS v", escaped))
            .expect("Failed to select the escaped value");
        assert_eq!(
            result.value(0, 0),
            Some(value.as_bytes()),
            "Escaped `{}` as `{}`",
            value,
            escaped
        );
    }

    let escaped = handle.escape(b"it's").unwrap();
    let mut buffer = vec![0xffu8; escaped.len() + 1];
    let len = handle
        .escape_into(b"it's", &mut buffer)
        .expect("Failed to escape into a large enough buffer");
    assert_eq!(&buffer[..len], escaped.as_slice());
    assert_eq!(buffer[len], 0);
    let mut small = vec![0u8; escaped.len()];
    assert_eq!(
        handle.escape_into(b"it's", &mut small).unwrap_err().kind(),
        ErrorKind::SizeMismatch
    );
}
