//! Text encoding used for entry names.
//!
//! FL4 archives do not record which encoding their names use, so the caller
//! has to pick one. Japanese releases use Shift_JIS, Chinese fan
//! translations usually GBK.

use std::{borrow::Cow, fmt, str::FromStr};

use encoding_rs::Encoding;
use tracing::warn;

use crate::error::{Error, Result};

/// Encoding applied to every name read from or written to an archive
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Codepage(&'static Encoding);

impl Codepage {
    /// Shift_JIS (windows codepage 932)
    pub const SHIFT_JIS: Codepage = Codepage(encoding_rs::SHIFT_JIS);

    /// UTF-8 (windows codepage 65001)
    pub const UTF_8: Codepage = Codepage(encoding_rs::UTF_8);

    /// Resolve either a WHATWG label (`shift_jis`, `gbk`, ...) or a windows
    /// codepage number (`932`, `936`, ...).
    pub fn for_label(label: &str) -> Result<Self> {
        let label = label.trim();
        let resolved = match label.parse::<u16>() {
            Ok(number) => Self::windows_label(number).and_then(|l| Encoding::for_label(l.as_bytes())),
            Err(_) => Encoding::for_label(label.as_bytes()),
        };

        resolved
            .map(Codepage)
            .ok_or_else(|| Error::UnknownCodepage(label.to_owned()))
    }

    fn windows_label(number: u16) -> Option<&'static str> {
        Some(match number {
            874 => "windows-874",
            932 => "shift_jis",
            936 => "gbk",
            949 => "euc-kr",
            950 => "big5",
            1250 => "windows-1250",
            1251 => "windows-1251",
            1252 => "windows-1252",
            1253 => "windows-1253",
            1254 => "windows-1254",
            1255 => "windows-1255",
            1256 => "windows-1256",
            1257 => "windows-1257",
            1258 => "windows-1258",
            20936 => "gb2312",
            54936 => "gb18030",
            65001 => "utf-8",
            _ => return None,
        })
    }

    /// Canonical name of the encoding
    pub fn name(&self) -> &'static str {
        self.0.name()
    }

    /// Encode `name`, failing if any character has no representation.
    pub fn encode<'a>(&self, name: &'a str) -> Result<Cow<'a, [u8]>> {
        let (bytes, _, had_errors) = self.0.encode(name);
        if had_errors {
            return Err(Error::UnmappableName {
                name: name.to_owned(),
                codepage: self.name(),
            });
        }
        Ok(bytes)
    }

    /// Decode `bytes`, replacing malformed sequences.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        let (text, had_errors) = self.0.decode_without_bom_handling(bytes);
        if had_errors {
            warn!(
                "name {:02X?} is not valid {}, decoding lossily",
                bytes,
                self.name()
            );
        }
        text
    }
}

impl Default for Codepage {
    fn default() -> Self {
        Self::UTF_8
    }
}

impl fmt::Debug for Codepage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Codepage({})", self.name())
    }
}

impl fmt::Display for Codepage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Codepage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::for_label(s)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::Codepage;
    use crate::error::{Error, Result};

    #[test]
    fn resolve_labels() -> Result<()> {
        assert_eq!(Codepage::for_label("shift_jis")?, Codepage::SHIFT_JIS);
        assert_eq!(Codepage::for_label("932")?, Codepage::SHIFT_JIS);
        assert_eq!(Codepage::for_label(" UTF-8 ")?, Codepage::UTF_8);
        assert_eq!(Codepage::for_label("936")?.name(), "GBK");
        Ok(())
    }

    #[test]
    fn reject_unknown_label() {
        assert!(matches!(
            Codepage::for_label("klingon"),
            Err(Error::UnknownCodepage(_))
        ));
        assert!(matches!(
            Codepage::for_label("12345"),
            Err(Error::UnknownCodepage(_))
        ));
    }

    #[test]
    fn encode_shift_jis() -> Result<()> {
        let encoded = Codepage::SHIFT_JIS.encode("あ.BM2")?;
        assert_eq!(encoded.as_ref(), &[0x82, 0xA0, b'.', b'B', b'M', b'2']);
        assert_eq!(Codepage::SHIFT_JIS.decode(&encoded), "あ.BM2");
        Ok(())
    }

    #[test]
    fn reject_unmappable_name() {
        assert!(matches!(
            Codepage::SHIFT_JIS.encode("\u{1F600}.txt"),
            Err(Error::UnmappableName { .. })
        ));
    }
}
