//! `PD2A` compressed block handling.
//!
//! Entries whose extension is listed in
//! [`crate::write::Fl4WriterOptions::compressed_extensions`] are stored as a
//! 16 byte [`BlockHeader`] followed by an [`crate::lzss`] payload. Readers
//! only look at the magic, never at the extension.

use std::{borrow::Cow, io::Cursor};

use binrw::{BinRead, BinWrite};
use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::lzss;
use crate::types::{BlockHeader, BLOCK_HEADER_SIZE};

/// `PD2A` read as a little endian integer
pub const BLOCK_MAGIC: u32 = 0x4132_4450;

/// Identifies how an entry's data is stored inside the FL4 file
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Stores the data as it is
    #[default]
    None,

    /// Data is wrapped in a `PD2A` block
    Lzss,
}

impl CompressionMethod {
    /// Detect the method from the stored bytes of an entry
    pub fn detect(data: &[u8]) -> Self {
        if is_compressed(data) {
            CompressionMethod::Lzss
        } else {
            CompressionMethod::None
        }
    }
}

/// Whether `data` starts with the `PD2A` magic
pub fn is_compressed(data: &[u8]) -> bool {
    data.len() >= 4 && LittleEndian::read_u32(data) == BLOCK_MAGIC
}

/// Compress `raw` and frame it in a `PD2A` block
#[instrument(skip_all, fields(size = raw.len()), err)]
pub fn wrap(raw: &[u8]) -> Result<Vec<u8>> {
    let payload = lzss::compress(raw);

    let header = BlockHeader {
        compressed_length: length_field(payload.len())?,
        raw_length: length_field(raw.len())?,
        ..Default::default()
    };

    let mut block = Cursor::new(Vec::with_capacity(BLOCK_HEADER_SIZE + payload.len()));
    header.write(&mut block)?;

    let mut block = block.into_inner();
    block.extend_from_slice(&payload);

    debug!("compressed {} bytes to {}", raw.len(), block.len());
    Ok(block)
}

/// Decompress `data` if it is a `PD2A` block, or borrow it unchanged
///
/// The length declared in the block header is ignored: the result is
/// whatever the decoder produces from the payload.
pub fn unwrap(data: &[u8]) -> Result<Cow<'_, [u8]>> {
    unwrap_with(data, false)
}

/// Same as [`unwrap`], optionally checking the declared raw length
///
/// With `strict` set a block that decodes to a different length than its
/// header declares fails with [`Error::LengthMismatch`].
#[instrument(skip(data), fields(size = data.len()), err)]
pub fn unwrap_with(data: &[u8], strict: bool) -> Result<Cow<'_, [u8]>> {
    if !is_compressed(data) {
        return Ok(Cow::Borrowed(data));
    }

    if data.len() < BLOCK_HEADER_SIZE {
        return Err(Error::TruncatedBlock {
            name: String::new(),
        });
    }

    let header = BlockHeader::read(&mut Cursor::new(&data[..BLOCK_HEADER_SIZE]))?;
    let raw = lzss::decompress(&data[BLOCK_HEADER_SIZE..]);

    if strict && usize::try_from(header.raw_length).ok() != Some(raw.len()) {
        return Err(Error::LengthMismatch {
            name: String::new(),
            declared: header.raw_length.max(0) as usize,
            actual: raw.len(),
        });
    }

    Ok(Cow::Owned(raw))
}

fn length_field(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| Error::ArchiveTooLarge {
        name: String::new(),
    })
}

#[cfg(test)]
mod test {
    use std::borrow::Cow;

    use pretty_assertions::assert_eq;

    use super::{is_compressed, unwrap, unwrap_with, wrap, CompressionMethod};
    use crate::error::{Error, Result};

    #[test]
    fn wrap_small_entry() -> Result<()> {
        #[rustfmt::skip]
        let expected = vec![
            0x50, 0x44, 0x32, 0x41,
            0x00, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x03, 0x68, 0x69,
        ];

        assert_eq!(wrap(b"hi")?, expected);

        Ok(())
    }

    #[test]
    fn wrap_empty_entry() -> Result<()> {
        let block = wrap(&[])?;
        assert_eq!(block.len(), 16);
        assert!(is_compressed(&block));
        assert!(unwrap(&block)?.is_empty());

        Ok(())
    }

    #[test]
    fn unwrap_round_trip() -> Result<()> {
        let raw = b"bitmap bitmap bitmap bitmap".repeat(64);
        let block = wrap(&raw)?;

        assert!(block.len() < raw.len());
        assert_eq!(CompressionMethod::detect(&block), CompressionMethod::Lzss);
        assert_eq!(unwrap(&block)?.as_ref(), raw.as_slice());

        Ok(())
    }

    #[test]
    fn unwrap_raw_is_borrowed() -> Result<()> {
        let raw = b"not a block";
        assert_eq!(CompressionMethod::detect(raw), CompressionMethod::None);
        assert!(matches!(unwrap(raw)?, Cow::Borrowed(_)));

        // too short to hold a magic
        assert_eq!(unwrap(b"PD2")?.as_ref(), b"PD2");

        Ok(())
    }

    #[test]
    fn unwrap_ignores_declared_length() -> Result<()> {
        let mut block = wrap(b"hi")?;
        // claim a much larger raw size
        block[12] = 0xFF;

        assert_eq!(unwrap(&block)?.as_ref(), b"hi");
        assert!(matches!(
            unwrap_with(&block, true),
            Err(Error::LengthMismatch {
                declared: 0xFF,
                actual: 2,
                ..
            })
        ));

        Ok(())
    }

    #[test]
    fn unwrap_truncated_header() {
        assert!(matches!(
            unwrap(b"PD2A\0\0\0\0"),
            Err(Error::TruncatedBlock { .. })
        ));
    }
}
