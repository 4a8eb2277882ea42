//! Types for writing FL4 archives
//!

use binrw::BinWrite;
use bon::Builder;
use std::fs;
use std::io::{self, Cursor, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, Level};

use crate::codepage::Codepage;
use crate::compression;
use crate::error::{Error, Result};
use crate::hash::{bucket_for_name, extension};
use crate::index::DirectoryIndex;
use crate::types::{Fl4Header, Fl4Record, HEADER_SIZE};

/// Longest encoded name an entry may have
pub const MAX_NAME_LENGTH: usize = u8::MAX as usize;

/// Options for how the FL4 file should be written
#[derive(Debug, Clone, Builder)]
pub struct Fl4WriterOptions {
    /// The encoding used for entry names
    #[builder(default)]
    pub codepage: Codepage,

    /// Extensions, dot included, of the entries to store as `PD2A` blocks.
    /// Matching ignores case.
    #[builder(default = vec![".BM2".to_owned()])]
    pub compressed_extensions: Vec<String>,
}

impl Default for Fl4WriterOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Fl4WriterOptions {
    /// Whether the entry called `name` should be compressed
    pub fn should_compress(&self, name: &str) -> bool {
        let Some(extension) = extension(name) else {
            return false;
        };
        let extension = extension.to_uppercase();
        self.compressed_extensions
            .iter()
            .any(|candidate| candidate.to_uppercase() == extension)
    }
}

#[derive(Debug)]
struct PendingFile {
    name: String,
    name_raw: Vec<u8>,
    bucket: usize,
    data: Vec<u8>,
}

/// FL4 archive generator
///
/// ```
/// # fn doit() -> aaru_fl4::error::Result<()>
/// # {
/// # use aaru_fl4::Fl4Writer;
/// use std::io::Write;
/// use aaru_fl4::write::Fl4WriterOptions;
///
/// // We use a buffer here, though you'd normally use a `File`
/// let mut fl4 = Fl4Writer::new(std::io::Cursor::new(Vec::new()), Fl4WriterOptions::default())?;
///
/// fl4.start_file("script\\hello_world.txt")?;
/// fl4.write_all(b"Hello, World!")?;
///
/// // Apply the changes you've made.
/// fl4.finish()?;
///
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct Fl4Writer<W: Write + Seek> {
    inner: W,
    options: Fl4WriterOptions,
    start: u64,
    data_length: u64,
    current: Option<PendingFile>,
    index: DirectoryIndex,
    header: Fl4Header,
}

impl<W: Write + Seek> Fl4Writer<W> {
    /// Initializes the archive, reserving room for the header at the
    /// current position of `inner`.
    ///
    /// Before writing to this object, the [`Fl4Writer::start_file`] function should be called.
    pub fn new(mut inner: W, options: Fl4WriterOptions) -> Result<Fl4Writer<W>> {
        let start = inner.stream_position()?;
        inner.write_all(&[0u8; HEADER_SIZE])?;

        Ok(Fl4Writer {
            inner,
            options,
            start,
            data_length: 0,
            current: None,
            index: DirectoryIndex::new(),
            header: Fl4Header::default(),
        })
    }

    /// Returns true if a file is currently open for writing.
    pub const fn is_writing_file(&self) -> bool {
        self.current.is_some()
    }

    /// Start a new entry called `name`.
    ///
    /// The name is checked here, so an entry that can not be stored is
    /// rejected before any of its data is written.
    #[instrument(skip(self, name), fields(name = %name.to_string()), err)]
    pub fn start_file(&mut self, name: impl ToString) -> Result<()> {
        if self.is_writing_file() {
            self.finish_file()?;
        }

        let name = name.to_string();
        let name_raw = self.options.codepage.encode(&name)?.into_owned();
        if name_raw.len() > MAX_NAME_LENGTH {
            return Err(Error::NameTooLong {
                length: name_raw.len(),
                name,
            });
        }

        let bucket = bucket_for_name(&name, self.options.codepage)?;
        if !self.index.has_room(bucket) {
            return Err(Error::BucketOverflow { bucket, name });
        }

        self.current = Some(PendingFile {
            name,
            name_raw,
            bucket,
            data: Vec::new(),
        });

        Ok(())
    }

    /// Add a whole entry at once
    pub fn add_file(&mut self, name: impl ToString, data: &[u8]) -> Result<()> {
        self.start_file(name)?;
        self.write_all(data)?;
        self.finish_file()
    }

    #[instrument(skip(self), err)]
    fn finish_file(&mut self) -> Result<()> {
        let Some(file) = self.current.take() else {
            return Ok(());
        };

        let data = if self.options.should_compress(&file.name) {
            compression::wrap(&file.data).map_err(|e| e.for_entry(&file.name))?
        } else {
            file.data
        };

        let too_large = || Error::ArchiveTooLarge {
            name: file.name.clone(),
        };
        let data_offset = i32::try_from(self.data_length).map_err(|_| too_large())?;
        let data_length = i32::try_from(data.len()).map_err(|_| too_large())?;

        self.inner.write_all(&data)?;
        self.data_length += data.len() as u64;

        debug!(
            "added {} to bucket {} at {} ({} bytes)",
            file.name, file.bucket, data_offset, data_length
        );

        self.index.insert(
            file.bucket,
            Fl4Record::new(data_offset, data_length, file.name_raw)?,
        )?;
        self.header.entries += 1;

        Ok(())
    }

    /// Finish the last file, write the directory index and patch the header
    ///
    /// This will return the writer, but one should normally not append any data to the end of the file.
    #[instrument(skip(self), err)]
    pub fn finish(mut self) -> Result<W> {
        self.finish_file()?;

        let index_offset = HEADER_SIZE as u64 + self.data_length;
        self.header.index_offset = i32::try_from(index_offset).map_err(|_| Error::ArchiveTooLarge {
            name: "the directory index".to_owned(),
        })?;

        let index_length = self.index.write(&mut self.inner)?;
        self.header.index_length =
            i32::try_from(index_length).map_err(|_| Error::ArchiveTooLarge {
                name: "the directory index".to_owned(),
            })?;

        let end = self.inner.stream_position()?;
        self.inner.seek(SeekFrom::Start(self.start))?;
        self.header.write(&mut self.inner)?;
        self.inner.seek(SeekFrom::Start(end))?;
        self.inner.flush()?;

        info!(
            "wrote {} entries, index of {} bytes at {}",
            self.header.entries, self.header.index_length, self.header.index_offset
        );

        Ok(self.inner)
    }
}

impl<W: Write + Seek> Write for Fl4Writer<W> {
    #[instrument(skip_all, err, ret(level = Level::TRACE), fields(size=buf.len()) )]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(file) = self.current.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "No file has been started",
            ));
        };
        file.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    #[instrument(skip(self), err)]
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Build a complete archive in memory
///
/// Entries are stored in the order given; the index orders them by bucket.
pub fn build<I, N>(entries: I, options: Fl4WriterOptions) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (N, Vec<u8>)>,
    N: ToString,
{
    let mut writer = Fl4Writer::new(Cursor::new(Vec::new()), options)?;
    for (name, data) in entries {
        writer.add_file(name, &data)?;
    }
    Ok(writer.finish()?.into_inner())
}

/// Build an archive at `path`, replacing it only once the archive is complete
///
/// The archive is written to a temporary file next to `path` and moved into
/// place after the index and header are written. If any entry fails, the
/// temporary file is removed and `path` is left untouched. Unless
/// `overwrite` is set an existing file at `path` is an error.
#[instrument(skip(options, entries), fields(path = %path.display()), err)]
pub fn write_to_path<I, N>(
    path: &Path,
    overwrite: bool,
    options: Fl4WriterOptions,
    entries: I,
) -> Result<()>
where
    I: IntoIterator<Item = Result<(N, Vec<u8>)>>,
    N: ToString,
{
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    {
        let mut writer = Fl4Writer::new(io::BufWriter::new(temp.as_file_mut()), options)?;
        for entry in entries {
            let (name, data) = entry?;
            writer.add_file(name, &data)?;
        }
        writer
            .finish()?
            .into_inner()
            .map_err(|e| Error::from(e.into_error()))?;
    }
    temp.as_file().sync_all()?;

    if overwrite {
        temp.persist(path).map_err(|e| Error::from(e.error))?;
    } else {
        temp.persist_noclobber(path)
            .map_err(|e| Error::from(e.error))?;
    }

    info!("published {}", path.display());
    Ok(())
}
