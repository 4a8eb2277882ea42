//! Types for reading FL4 archives
//!

use binrw::BinRead;
use bon::Builder;
use indexmap::IndexMap;
use std::{
    borrow::Cow,
    fmt::{self, Debug},
    io::{Cursor, Read, Seek, SeekFrom},
    path::PathBuf,
    sync::Arc,
};
use tracing::{debug, instrument, warn};

use crate::{
    codepage::Codepage,
    compression::{self, CompressionMethod},
    error::{Error, FileNotFoundError, Result},
    hash::bucket_for_name,
    index::DirectoryIndex,
    types::{Fl4Header, Fl4Record},
};

/// Options for how the FL4 file should be read
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct Fl4ReaderOptions {
    /// The encoding used for entry names
    #[builder(default)]
    pub codepage: Codepage,

    /// Fail when a `PD2A` block decodes to a different length than its
    /// header declares. The games never check this.
    #[builder(default)]
    pub strict_length: bool,
}

/// A struct for reading an entry from a FL4 file
pub struct Fl4File<'a> {
    data: Cow<'a, Fl4FileData>,
    compression_method: CompressionMethod,
    reader: Cursor<Vec<u8>>,
}

impl Debug for Fl4File<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Fl4File({:#?})", self.get_metadata())
    }
}

/// Methods for retrieving information on FL4 file entries
impl Fl4File<'_> {
    /// Get the name of the file
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this name directly when extracting an archive.
    /// It may contain an absolute path (`\Windows\win.ini`), or break out of
    /// the current directory (`..\runtime`). Use [`Fl4File::enclosed_name`]
    /// instead.
    pub fn name(&self) -> &str {
        &self.get_metadata().file_name
    }

    /// Get the name of the file, in the raw (encoded) byte representation.
    pub fn name_raw(&self) -> &[u8] {
        &self.get_metadata().file_name_raw
    }

    /// Relative path to extract this entry to, if it stays below the
    /// extraction directory
    ///
    /// Both `\` and `/` separate components.
    pub fn enclosed_name(&self) -> Option<PathBuf> {
        enclosed_name(self.name())
    }

    /// Get the bucket this entry is filed under
    pub fn bucket(&self) -> usize {
        self.get_metadata().bucket
    }

    /// Get the size of the file, in bytes, in the archive
    pub fn compressed_size(&self) -> u64 {
        self.get_metadata().compressed_size
    }

    /// Get the size of the file, in bytes, when uncompressed
    pub fn size(&self) -> u64 {
        self.reader.get_ref().len() as u64
    }

    /// Get the starting offset of the data of the file
    pub fn data_start(&self) -> u64 {
        self.get_metadata().data_start
    }

    /// Get the compression method used for this file
    pub fn compression_method(&self) -> CompressionMethod {
        self.compression_method
    }

    /// Consume the entry, returning its contents
    pub fn into_data(self) -> Vec<u8> {
        self.reader.into_inner()
    }

    fn get_metadata(&self) -> &Fl4FileData {
        self.data.as_ref()
    }
}

impl Read for Fl4File<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.reader.read(buf)
    }
}

/// Structure representing a FL4 file entry.
#[derive(Debug, Clone, Default)]
pub struct Fl4FileData {
    /// Bucket the entry is filed under
    pub bucket: usize,
    /// Size of the file in the archive
    pub compressed_size: u64,
    /// Name of the file
    pub file_name: Box<str>,
    /// Raw file name. To be used when file_name was incorrectly decoded.
    pub file_name_raw: Box<[u8]>,
    /// Specifies where the data of the file starts
    pub data_start: u64,
}

impl Fl4FileData {
    fn from_record(
        header: &Fl4Header,
        bucket: usize,
        record: &Fl4Record,
        codepage: Codepage,
    ) -> Result<Self> {
        let file_name: Box<str> = codepage.decode(&record.name).into();

        let (Ok(offset), Ok(length)) = (
            u64::try_from(record.data_offset),
            u64::try_from(record.data_length),
        ) else {
            return Err(Error::CorruptEntry {
                name: file_name.into(),
            });
        };

        Ok(Self {
            bucket,
            compressed_size: length,
            data_start: header.data_offset as u64 + offset,
            file_name_raw: record.name.clone().into(),
            file_name,
        })
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    header: Fl4Header,
    index: DirectoryIndex,
    entries: Vec<Fl4FileData>,
    files: IndexMap<Box<str>, Fl4FileData>,
}

/// FL4 archive reader
///
/// ```no_run
/// use std::io::prelude::*;
///
/// fn list_fl4_contents(reader: impl Read + Seek) -> aaru_fl4::error::Result<()> {
///     let mut fl4 = aaru_fl4::Fl4Archive::new(reader, Default::default())?;
///
///     for i in 0..fl4.len() {
///         let mut file = fl4.by_index(i)?;
///         println!("Filename: {}", file.name());
///         std::io::copy(&mut file, &mut std::io::stdout())?;
///     }
///
///     Ok(())
/// }
/// ```
pub struct Fl4Archive<R> {
    reader: R,
    options: Fl4ReaderOptions,
    shared: Arc<Shared>,
}

impl<R> Fl4Archive<R> {
    /// Total size of the stored entries, before any decompression.
    pub fn stored_size(&self) -> Option<u128> {
        let mut total = 0u128;
        for file in self.shared.files.values() {
            total = total.checked_add(file.compressed_size as u128)?;
        }
        Some(total)
    }
}

impl<R: Read + Seek> Fl4Archive<R> {
    /// Read a FL4 archive collecting the files it contains.
    ///
    /// Anything that does not start with the FL4 magic is rejected before
    /// the index is touched.
    #[instrument(skip(reader), err)]
    pub fn new(mut reader: R, options: Fl4ReaderOptions) -> Result<Fl4Archive<R>> {
        let shared = Self::get_metadata(&mut reader, options.codepage)?;
        Ok(Fl4Archive {
            reader,
            options,
            shared: shared.into(),
        })
    }

    /// Number of entries contained in this FL4.
    pub fn len(&self) -> usize {
        self.shared.files.len()
    }

    /// Whether this FL4 archive contains no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over all the file names in this archive, in
    /// index order.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.shared.files.keys().map(|s| s.as_ref())
    }

    /// Returns the header as read from the archive
    pub fn header(&self) -> &Fl4Header {
        &self.shared.header
    }

    /// Returns the parsed directory index
    pub fn directory(&self) -> &DirectoryIndex {
        &self.shared.index
    }

    /// Get the index of a file entry by name, if it's present.
    #[inline(always)]
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.shared.files.get_index_of(name)
    }

    /// Get the name of a file entry, if it's present.
    #[inline(always)]
    pub fn name_for_index(&self, index: usize) -> Option<&str> {
        self.shared
            .files
            .get_index(index)
            .map(|(name, _)| name.as_ref())
    }

    /// Search for a file entry by name
    ///
    /// The lookup goes through the bucket index like the games do, so the
    /// name must match the stored one exactly.
    pub fn by_name(&mut self, name: &str) -> Result<Fl4File<'_>> {
        let not_found = || Error::FileNotFound(FileNotFoundError::Name(name.to_owned()));

        let codepage = self.options.codepage;
        let raw = codepage.encode(name).map_err(|_| not_found())?;
        let bucket = bucket_for_name(name, codepage).map_err(|_| not_found())?;

        let record = self.shared.index.find(bucket, &raw).ok_or_else(not_found)?;
        let data = Fl4FileData::from_record(&self.shared.header, bucket, record, codepage)?;

        Self::open(&mut self.reader, Cow::Owned(data), self.options.strict_length)
    }

    /// Number of records in the directory index.
    ///
    /// Unlike [`Fl4Archive::len`] this counts every record, including
    /// records whose names decode to the same string.
    pub fn entry_count(&self) -> usize {
        self.shared.entries.len()
    }

    /// Get the `n`th record of the directory index, in bucket order
    ///
    /// Every record is reachable this way, even when its decoded name is
    /// shadowed by another one.
    pub fn by_entry(&mut self, n: usize) -> Result<Fl4File<'_>> {
        let data = self
            .shared
            .entries
            .get(n)
            .ok_or(Error::FileNotFound(FileNotFoundError::Index(n)))?;

        Self::open(
            &mut self.reader,
            Cow::Borrowed(data),
            self.options.strict_length,
        )
    }

    /// Get a contained file by index
    pub fn by_index(&mut self, file_number: usize) -> Result<Fl4File<'_>> {
        let (_, data) = self
            .shared
            .files
            .get_index(file_number)
            .ok_or(Error::FileNotFound(FileNotFoundError::Index(file_number)))?;

        Self::open(
            &mut self.reader,
            Cow::Borrowed(data),
            self.options.strict_length,
        )
    }

    /// Unwrap and return the inner reader object
    ///
    /// The position of the reader is undefined.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn open<'a>(
        reader: &mut R,
        data: Cow<'a, Fl4FileData>,
        strict: bool,
    ) -> Result<Fl4File<'a>> {
        reader.seek(SeekFrom::Start(data.data_start))?;

        // sizes come from the index, so the buffer only grows with what is read
        let mut stored = Vec::new();
        reader
            .by_ref()
            .take(data.compressed_size)
            .read_to_end(&mut stored)?;
        if (stored.len() as u64) < data.compressed_size {
            return Err(Error::CorruptEntry {
                name: data.file_name.to_string(),
            });
        }

        let compression_method = CompressionMethod::detect(&stored);
        let content = match compression_method {
            CompressionMethod::None => stored,
            CompressionMethod::Lzss => compression::unwrap_with(&stored, strict)
                .map_err(|e| e.for_entry(&data.file_name))?
                .into_owned(),
        };

        Ok(Fl4File {
            data,
            compression_method,
            reader: Cursor::new(content),
        })
    }

    fn read_header(reader: &mut R) -> Result<Fl4Header> {
        reader.seek(SeekFrom::Start(0))?;
        match Fl4Header::read(reader) {
            Ok(header) => Ok(header),
            Err(e) if e.is_eof() || matches!(e.root_cause(), binrw::Error::BadMagic { .. }) => {
                Err(Error::InvalidArchive)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_index(reader: &mut R, header: &Fl4Header) -> Result<DirectoryIndex> {
        let (Ok(offset), Ok(length)) = (
            u64::try_from(header.index_offset),
            usize::try_from(header.index_length),
        ) else {
            return Err(Error::CorruptIndex(format!(
                "index range {}+{} is invalid",
                header.index_offset, header.index_length
            )));
        };

        reader.seek(SeekFrom::Start(offset))?;

        let mut index = Vec::new();
        reader.by_ref().take(length as u64).read_to_end(&mut index)?;
        if index.len() < length {
            return Err(Error::CorruptIndex(format!(
                "index of {} bytes at {} runs past the end of the file",
                length, offset
            )));
        }

        DirectoryIndex::parse(&index)
    }

    fn get_metadata(reader: &mut R, codepage: Codepage) -> Result<Shared> {
        let header = Self::read_header(reader)?;
        let index = Self::get_index(reader, &header)?;

        if index.len() != header.entries.max(0) as usize {
            warn!(
                "header declares {} entries but the index holds {}",
                header.entries,
                index.len()
            );
        }

        let mut entries = Vec::with_capacity(index.len());
        let mut files = IndexMap::with_capacity(index.len());
        for (bucket, record) in index.iter() {
            let file = Fl4FileData::from_record(&header, bucket, record, codepage)?;
            debug!("found {} in bucket {}", file.file_name, bucket);
            if files.insert(file.file_name.clone(), file.clone()).is_some() {
                warn!(
                    "duplicate name {:?}, only reachable with by_entry",
                    file.file_name
                );
            }
            entries.push(file);
        }

        Ok(Shared {
            header,
            index,
            entries,
            files,
        })
    }
}

/// Read every entry of an in-memory archive, decompressing where needed
///
/// Entries come back in index order: by bucket, then by name.
pub fn extract(container: &[u8], options: Fl4ReaderOptions) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = Fl4Archive::new(Cursor::new(container), options)?;

    (0..archive.entry_count())
        .map(|n| {
            let file = archive.by_entry(n)?;
            Ok((file.name().to_owned(), file.into_data()))
        })
        .collect()
}

fn enclosed_name(name: &str) -> Option<PathBuf> {
    if name.starts_with(['\\', '/']) {
        return None;
    }

    let mut path = PathBuf::new();
    for component in name.split(['\\', '/']) {
        match component {
            "" | "." => continue,
            ".." => return None,
            // drive letters and alternate data streams
            c if c.contains(':') => return None,
            c => path.push(c),
        }
    }

    if path.as_os_str().is_empty() {
        None
    } else {
        Some(path)
    }
}
