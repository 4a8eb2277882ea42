//! The bucketed directory index.
//!
//! On disk the index is a table of 512 [`Fl4Bucket`] slots followed by the
//! [`Fl4Record`]s of every non-empty bucket, bucket by bucket, each bucket
//! sorted by name. Empty buckets point just past the slot table.

use std::io::{Cursor, Seek, SeekFrom, Write};

use binrw::{BinRead, BinWrite};
use tracing::{instrument, trace};

use crate::error::{Error, Result};
use crate::hash::BUCKET_COUNT;
use crate::types::{Fl4Bucket, Fl4Record, BUCKET_SIZE};

/// Size of the slot table at the start of every index
pub const BUCKET_TABLE_SIZE: usize = BUCKET_COUNT * BUCKET_SIZE;

/// Most entries a single bucket can hold
pub const BUCKET_CAPACITY: usize = u16::MAX as usize;

/// In-memory directory index: always exactly [`BUCKET_COUNT`] buckets
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryIndex {
    buckets: Vec<Vec<Fl4Record>>,
}

impl Default for DirectoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryIndex {
    /// An index with every bucket empty
    pub fn new() -> Self {
        Self {
            buckets: vec![Vec::new(); BUCKET_COUNT],
        }
    }

    /// Number of entries across all buckets
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Whether every bucket is empty
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// Entries of a single bucket, empty for buckets past the end
    pub fn bucket(&self, bucket: usize) -> &[Fl4Record] {
        self.buckets
            .get(bucket)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether `bucket` exists and can take another entry
    pub fn has_room(&self, bucket: usize) -> bool {
        self.buckets
            .get(bucket)
            .is_some_and(|records| records.len() < BUCKET_CAPACITY)
    }

    /// Add `record` to `bucket`
    pub fn insert(&mut self, bucket: usize, record: Fl4Record) -> Result<()> {
        let records = self
            .buckets
            .get_mut(bucket)
            .ok_or(Error::InvalidBucket(bucket))?;
        if records.len() >= BUCKET_CAPACITY {
            return Err(Error::BucketOverflow {
                bucket,
                name: String::from_utf8_lossy(&record.name).into_owned(),
            });
        }
        records.push(record);
        Ok(())
    }

    /// Sort every bucket by encoded name, byte by byte
    pub fn sort(&mut self) {
        for bucket in self.buckets.iter_mut() {
            bucket.sort_by(|a, b| a.name.cmp(&b.name));
        }
    }

    /// Every entry with its bucket, in on-disk order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Fl4Record)> {
        self.buckets
            .iter()
            .enumerate()
            .flat_map(|(bucket, records)| records.iter().map(move |record| (bucket, record)))
    }

    /// Look up an encoded name inside `bucket`
    pub fn find(&self, bucket: usize, name: &[u8]) -> Option<&Fl4Record> {
        let records = self.buckets.get(bucket)?;
        match records.binary_search_by(|record| record.name.as_slice().cmp(name)) {
            Ok(found) => Some(&records[found]),
            // archives from other tools may not keep buckets sorted
            Err(_) => records.iter().find(|record| record.name == name),
        }
    }

    /// Sort the buckets and write the index at the current position of
    /// `writer`, returning its length.
    ///
    /// The slot table is written as a placeholder first and patched once
    /// every bucket's position is known.
    #[instrument(skip_all, err)]
    pub fn write<W: Write + Seek>(&mut self, writer: &mut W) -> Result<u64> {
        self.sort();

        let start = writer.stream_position()?;
        writer.write_all(&[0u8; BUCKET_TABLE_SIZE])?;

        let mut slots = Vec::with_capacity(BUCKET_COUNT);
        for (bucket, records) in self.buckets.iter().enumerate() {
            if records.is_empty() {
                slots.push(Fl4Bucket {
                    offset: BUCKET_TABLE_SIZE as i32,
                    count: 0,
                });
                continue;
            }

            let offset = writer.stream_position()? - start;
            slots.push(Fl4Bucket {
                offset: i32::try_from(offset).map_err(|_| Error::ArchiveTooLarge {
                    name: String::from_utf8_lossy(&records[0].name).into_owned(),
                })?,
                count: records.len() as u16,
            });
            trace!("bucket {} holds {} entries", bucket, records.len());

            for record in records {
                record.write(writer)?;
            }
        }

        let end = writer.stream_position()?;

        writer.seek(SeekFrom::Start(start))?;
        for slot in &slots {
            slot.write(writer)?;
        }
        writer.seek(SeekFrom::Start(end))?;

        Ok(end - start)
    }

    /// Parse an index previously loaded into memory
    #[instrument(skip_all, fields(size = index.len()), err)]
    pub fn parse(index: &[u8]) -> Result<Self> {
        if index.len() < BUCKET_TABLE_SIZE {
            return Err(Error::CorruptIndex(format!(
                "index is {} bytes, too short for the bucket table",
                index.len()
            )));
        }

        let mut reader = Cursor::new(index);
        let slots = (0..BUCKET_COUNT)
            .map(|_| Fl4Bucket::read(&mut reader).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;

        let mut buckets = Vec::with_capacity(BUCKET_COUNT);
        for (bucket, slot) in slots.into_iter().enumerate() {
            if slot.count == 0 {
                buckets.push(Vec::new());
                continue;
            }

            let offset = usize::try_from(slot.offset)
                .ok()
                .filter(|offset| *offset <= index.len())
                .ok_or_else(|| {
                    Error::CorruptIndex(format!(
                        "bucket {} starts at {}, outside of the index",
                        bucket, slot.offset
                    ))
                })?;
            reader.set_position(offset as u64);

            let records = (0..slot.count)
                .map(|_| {
                    Fl4Record::read(&mut reader).map_err(|_| {
                        Error::CorruptIndex(format!(
                            "bucket {} runs past the end of the index",
                            bucket
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            buckets.push(records);
        }

        Ok(Self { buckets })
    }
}
