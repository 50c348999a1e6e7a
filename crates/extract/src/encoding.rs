//! Legacy code-page normalization.
//!
//! Book collections mix UTF-8 files with Windows-1251 leftovers. Structural
//! UTF-8 validation decides which is which per buffer; valid UTF-8 passes
//! through without copying. Best-effort: mixed or corrupted input is not
//! detected with certainty.

use std::borrow::Cow;

use encoding_rs::WINDOWS_1251;

/// Decode raw book bytes to UTF-8.
pub fn normalize(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            let (text, _, _) = WINDOWS_1251.decode(bytes);
            // decode() always allocates on the non-UTF-8 path.
            Cow::Owned(text.into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_utf8_is_borrowed() {
        let text = normalize("Война и мир".as_bytes());
        assert!(matches!(text, Cow::Borrowed(_)));
        assert_eq!(text, "Война и мир");
    }

    #[test]
    fn windows_1251_is_transcoded() {
        // "Тест" in Windows-1251.
        let bytes = [0xd2, 0xe5, 0xf1, 0xf2];
        assert_eq!(normalize(&bytes), "Тест");
    }

    #[test]
    fn ascii_passes_through() {
        assert_eq!(normalize(b"plain ascii"), "plain ascii");
    }
}
