//! Base types for structure of FL4 file.

use binrw::{binrw, BinRead, BinWrite};

use crate::error::{Error, Result};

/// Size of [`Fl4Header`] on disk
pub const HEADER_SIZE: usize = 28;

/// Size of [`Fl4Bucket`] on disk
pub const BUCKET_SIZE: usize = 6;

/// Size of [`BlockHeader`] on disk
pub const BLOCK_HEADER_SIZE: usize = 16;

/// FL4 file header
///
/// Always starts with "FL4.0" padded to eight bytes with nulls.
/// All data is stored in little endian format
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(magic = b"FL4.0\0\0\0", little)]
pub struct Fl4Header {
    /// The offset from the beginning of the file where entry data starts
    pub data_offset: u16,

    /// The size of the directory index, bucket table included
    pub index_length: i32,

    /// The offset from the beginning of the file where the directory index starts
    pub index_offset: i32,

    /// The number of entries stored in the file
    pub entries: i32,

    /// Unused, always zero
    pub reserved: i32,

    /// Unused, always zero
    pub reserved2: u16,
}

impl Default for Fl4Header {
    fn default() -> Self {
        Self {
            data_offset: HEADER_SIZE as u16,
            index_length: Default::default(),
            index_offset: Default::default(),
            entries: Default::default(),
            reserved: Default::default(),
            reserved2: Default::default(),
        }
    }
}

/// FL4 bucket slot
///
/// The directory index always starts with 512 of these
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(little)]
pub struct Fl4Bucket {
    /// The offset from the start of the index to the first entry of this bucket
    pub offset: i32,

    /// The number of entries in this bucket
    pub count: u16,
}

/// FL4 directory entry
///
/// Names are stored as a single length byte followed by the encoded name
#[binrw]
#[brw(little)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Fl4Record {
    /// The offset to the data for this entry from the start of the data segment
    pub data_offset: i32,

    /// The size of this entry's data as stored in the archive
    pub data_length: i32,

    #[br(temp)]
    #[bw(try_calc = u8::try_from(name.len()))]
    name_length: u8,

    /// The encoded name, at most 255 bytes
    #[br(count = name_length)]
    pub name: Vec<u8>,
}

impl Fl4Record {
    /// Create a record, failing if the encoded name does not fit its
    /// length byte
    pub fn new(data_offset: i32, data_length: i32, name: Vec<u8>) -> Result<Self> {
        if name.len() > u8::MAX as usize {
            return Err(Error::NameTooLong {
                length: name.len(),
                name: String::from_utf8_lossy(&name).into_owned(),
            });
        }

        Ok(Self {
            data_offset,
            data_length,
            name,
        })
    }

    /// Size of the record on disk
    pub fn size(&self) -> usize {
        9 + self.name.len()
    }
}

/// Header of a `PD2A` compressed block
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq)]
#[brw(magic = b"PD2A", little)]
pub struct BlockHeader {
    /// Unused, always zero
    pub reserved: i32,

    /// The size of the compressed payload following the header
    pub compressed_length: i32,

    /// The size of the data before compression
    pub raw_length: i32,
}
