//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// file is an invalid fl4 archive
    #[error("file is an invalid fl4 archive")]
    #[diagnostic(help("FL4 archives start with the bytes `FL4.0\\0\\0\\0`"))]
    InvalidArchive,

    /// the name {name} is too long
    #[error("the name {name} is {length} bytes long once encoded, the limit is 255")]
    NameTooLong {
        /// The offending entry name
        name: String,
        /// Length of the encoded name
        length: usize,
    },

    /// too many entries in bucket {bucket}
    #[error("too many entries in bucket {bucket} while adding {name}")]
    BucketOverflow {
        /// The bucket that is full
        bucket: usize,
        /// The entry that did not fit
        name: String,
    },

    /// bucket number outside of the index
    #[error("bucket {0} is outside of the 512 bucket index")]
    InvalidBucket(usize),

    /// archive grew past the limits of the format
    #[error("archive grew past the 2 GiB limit of the format while adding {name}")]
    ArchiveTooLarge {
        /// The entry being added when the limit was hit
        name: String,
    },

    /// directory index is corrupt
    #[error("directory index is corrupt: {0}")]
    CorruptIndex(String),

    /// entry data lies outside of the archive
    #[error("data for {name} lies outside of the archive")]
    CorruptEntry {
        /// The entry pointing outside the archive
        name: String,
    },

    /// compressed block header is truncated
    #[error("compressed block for {name} is shorter than its header")]
    TruncatedBlock {
        /// The entry holding the block
        name: String,
    },

    /// decompressed length does not match the block header
    #[error("{name} decompressed to {actual} bytes but its header declares {declared}")]
    LengthMismatch {
        /// The entry holding the block
        name: String,
        /// Length stored in the block header
        declared: usize,
        /// Length produced by the decoder
        actual: usize,
    },

    /// unknown codepage
    #[error("unknown codepage {0}")]
    #[diagnostic(help("use a label such as `shift_jis`, `gbk` or `utf-8`, or a windows codepage number"))]
    UnknownCodepage(String),

    /// name can not be represented in the codepage
    #[error("{name} can not be represented in {codepage}")]
    UnmappableName {
        /// The offending entry name
        name: String,
        /// Name of the codepage in use
        codepage: &'static str,
    },

    /// name would be written outside of the target directory
    #[error("refusing to extract {0} outside of the target directory")]
    UnsafeName(String),

    /// unable to find requested file
    #[error("unable to find requested file")]
    FileNotFound(#[from] FileNotFoundError),

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

impl Error {
    /// Attach the entry name to errors raised below the archive layer
    pub fn for_entry(self, entry: &str) -> Self {
        match self {
            Error::ArchiveTooLarge { .. } => Error::ArchiveTooLarge {
                name: entry.to_owned(),
            },
            Error::CorruptEntry { .. } => Error::CorruptEntry {
                name: entry.to_owned(),
            },
            Error::TruncatedBlock { .. } => Error::TruncatedBlock {
                name: entry.to_owned(),
            },
            Error::LengthMismatch {
                declared, actual, ..
            } => Error::LengthMismatch {
                name: entry.to_owned(),
                declared,
                actual,
            },
            other => other,
        }
    }
}

/// Error type to provide further information when a file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested file")]
pub enum FileNotFoundError {
    /// at index {0}
    #[error("at index {0}")]
    Index(usize),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
