//! This library handles reading from and creating **FL4** files used by *AaruSystem* games.
//!
//! # FL4 Archive Format Documentation
//!
//! The FL4 format packs the game assets into a single file with a hashed directory
//! index at its end. Some entries, bitmaps mostly, are LZSS compressed inside a
//! `PD2A` block. FL4 files are typically identified with the `.fl4` extension.
//!
//! ## File Structure
//!
//! A FL4 file consists of a header, followed by the data blocks and the directory index.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 8 bytes: `FL4.0` followed by three zero bytes              |
//! | 0x0008         | Data Offset            | 2 bytes: Start of the data area, always 0x001C             |
//! | 0x000A         | Index Length           | 4 bytes: Size of the directory index                       |
//! | 0x000E         | Index Offset           | 4 bytes: Absolute offset of the directory index            |
//! | 0x0012         | Entry Count            | 4 bytes: Number of entries in the archive                  |
//! | 0x0016         | Reserved               | 6 bytes: Always zero                                       |
//!
//! ### Data Blocks
//!
//! After the header the contents of every entry follow each other without padding,
//! in the order they were added. An entry is either stored as it is or as a `PD2A`
//! block:
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: `PD2A`                                            |
//! | 0x0004         | Reserved               | 4 bytes: Always zero                                       |
//! | 0x0008         | Compressed Size        | 4 bytes: Size of the LZSS payload                          |
//! | 0x000C         | Uncompressed Size      | 4 bytes: Size of the entry once decompressed               |
//! | 0x0010         | Payload                | LZSS stream, see [`lzss`]                                  |
//!
//! Readers decide on the magic alone. The extension of the entry plays no part.
//!
//! ### Directory Index
//!
//! The index starts with 512 bucket slots of 6 bytes each:
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Records Offset         | 4 bytes: Offset of the bucket's records from the index  |
//! | 0x0004         | Record Count           | 2 bytes: Number of records in the bucket                |
//!
//! The records of all non-empty buckets follow, bucket after bucket, each bucket
//! sorted by name. Empty buckets point just past the slot table (0x0C00).
//!
//! | Offset (bytes) | Field                  | Description                                             |
//! |----------------|------------------------|---------------------------------------------------------|
//! | 0x0000         | Data Offset            | 4 bytes: Offset of the data from the data area          |
//! | 0x0004         | Data Length            | 4 bytes: Stored size of the entry                       |
//! | 0x0008         | Name Length            | 1 byte: Length of the encoded name                      |
//! | 0x0009         | Name                   | Encoded name, not terminated                            |
//!
//! An entry is filed under the bucket of its upper-cased file name, see [`hash`].
//!
//! ## Additional Information
//!
//! - **File Extension**: `.fl4`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Names**: Relative paths using `\` as separator, encoded with the game's codepage
//! - **Compression Methods**:
//!   - None
//!   - LZSS, inside a `PD2A` block
//!

pub mod codepage;
pub mod compression;
pub mod error;
pub mod hash;
pub mod index;
pub mod lzss;
pub mod read;
pub mod types;
pub mod write;

pub use codepage::Codepage;
pub use compression::CompressionMethod;
pub use read::{Fl4Archive, Fl4ReaderOptions};
pub use write::{Fl4Writer, Fl4WriterOptions};
