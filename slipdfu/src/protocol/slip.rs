//! SLIP escaping for the HCI serial transport.
//!
//! Frames on the wire are delimited by `0xC0` bytes; `0xC0` and
//! `0xDB` inside a frame are escaped with the `0xDB` marker.

use crate::error::{Error, Result};

/// Frame delimiter byte.
pub const END: u8 = 0xC0;
/// Escape marker byte.
pub const ESC: u8 = 0xDB;
/// Escaped form of `END`.
pub const ESC_END: u8 = 0xDC;
/// Escaped form of `ESC`.
pub const ESC_ESC: u8 = 0xDD;

/// Escape special bytes in `data`. Does not add frame delimiters.
pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &byte in data {
        match byte {
            END => out.extend_from_slice(&[ESC, ESC_END]),
            ESC => out.extend_from_slice(&[ESC, ESC_ESC]),
            _ => out.push(byte),
        }
    }
    out
}

/// Undo SLIP escaping. Raw `END` bytes are frame delimiters and are
/// dropped, not data.
///
/// Fails with [`Error::Protocol`] on a malformed escape: `ESC`
/// followed by anything other than `ESC_END`/`ESC_ESC`, or a
/// trailing unpaired `ESC`.
pub fn unescape(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut iter = data.iter();
    while let Some(&byte) = iter.next() {
        match byte {
            ESC => match iter.next() {
                Some(&ESC_END) => out.push(END),
                Some(&ESC_ESC) => out.push(ESC),
                Some(&other) => {
                    return Err(Error::Protocol(format!(
                        "invalid SLIP escape: 0xDB followed by 0x{other:02X}"
                    )));
                },
                None => {
                    return Err(Error::Protocol(
                        "invalid SLIP escape: truncated after 0xDB".into(),
                    ));
                },
            },
            END => {},
            _ => out.push(byte),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_plain_bytes_unchanged() {
        assert_eq!(escape(&[0x01, 0x7F, 0xFF]), vec![0x01, 0x7F, 0xFF]);
    }

    #[test]
    fn test_escape_special_bytes() {
        assert_eq!(escape(&[END]), vec![ESC, ESC_END]);
        assert_eq!(escape(&[ESC]), vec![ESC, ESC_ESC]);
        assert_eq!(
            escape(&[0x01, END, ESC, 0x02]),
            vec![0x01, ESC, ESC_END, ESC, ESC_ESC, 0x02]
        );
    }

    #[test]
    fn test_unescape_drops_delimiters() {
        let decoded = unescape(&[END, 0x01, 0x02, END]).unwrap();
        assert_eq!(decoded, vec![0x01, 0x02]);
    }

    #[test]
    fn test_round_trip() {
        let payloads: &[&[u8]] = &[
            &[],
            &[0x00],
            &[END, END, END],
            &[ESC, END, 0x42, ESC],
            &[0xC0, 0xDB, 0xDC, 0xDD, 0xC0],
        ];
        for payload in payloads {
            let decoded = unescape(&escape(payload)).unwrap();
            assert_eq!(&decoded, payload);
        }
    }

    #[test]
    fn test_invalid_escape_byte() {
        let err = unescape(&[ESC, 0x42]).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_trailing_escape() {
        let err = unescape(&[0x01, ESC]).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
