use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::byte_size::ByteSize;
use crate::progress_reporter::ProgressReporter;
use crate::shared_types::{ByteCount, ChunkRange};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Error, Debug)]
pub(crate) enum SplitError {
    #[error("part size must be greater than zero (got {0}), pass it with -b")]
    InvalidPartSize(ByteSize),
    #[error("cannot open file '{}': {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("cannot stat file '{}': {source}", path.display())]
    Stat { path: PathBuf, source: io::Error },
    #[error("cannot read {len} bytes from file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        len: ByteCount,
        source: io::Error,
    },
    #[error("cannot write {len} bytes to file '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        len: ByteCount,
        source: io::Error,
    },
    #[error("failed to truncate file '{}': {source}", path.display())]
    Truncate { path: PathBuf, source: io::Error },
    #[error(
        "The file '{}' already exists, I won't touch it as I may corrupt it. \
         Pass -o/--overwrite-existing to overwrite it",
        path.display()
    )]
    PartAlreadyExists { path: PathBuf },
}

/// A split that stopped early. Parts in `parts_written` are complete and
/// their bytes are already gone from the source file.
#[derive(Error, Debug)]
#[error("{error}")]
pub(crate) struct SplitAborted {
    pub(crate) parts_written: Vec<PartFile>,
    #[source]
    pub(crate) error: SplitError,
}

impl From<SplitError> for SplitAborted {
    fn from(error: SplitError) -> Self {
        Self {
            parts_written: Vec::new(),
            error,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct SplitOptions {
    pub(crate) part_size: ByteSize,
    pub(crate) overwrite: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PartFile {
    pub(crate) path: PathBuf,
    pub(crate) index: u64,
    pub(crate) len: ByteCount,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PlannedPart {
    pub(crate) index: u64,
    pub(crate) range: ChunkRange,
}

/// Part boundaries for a file, walked from the end of the file backward.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SplitPlan {
    file_length: ByteCount,
    part_size: ByteCount,
}

impl SplitPlan {
    pub(crate) fn new(file_length: ByteCount, part_size: ByteSize) -> Result<Self, SplitError> {
        if part_size.bytes() == 0 {
            return Err(SplitError::InvalidPartSize(part_size));
        }
        Ok(Self {
            file_length,
            part_size: part_size.bytes(),
        })
    }

    pub(crate) fn total_parts(&self) -> u64 {
        self.file_length.div_ceil(self.part_size)
    }

    /// Parts in write order: highest index first. Every part is full except
    /// part 1, which is written last and holds the remainder.
    pub(crate) fn parts(&self) -> PlanIter {
        PlanIter {
            remaining: self.file_length,
            index: self.total_parts(),
            part_size: self.part_size,
        }
    }
}

pub(crate) struct PlanIter {
    remaining: ByteCount,
    index: u64,
    part_size: ByteCount,
}

impl Iterator for PlanIter {
    type Item = PlannedPart;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index == 0 {
            return None;
        }
        // saturating: only the last chunk (part 1) can come up short
        let len = self.remaining.min(self.part_size);
        let start = self.remaining - len;
        self.remaining = start;

        let part = PlannedPart {
            index: self.index,
            range: ChunkRange {
                start,
                end: start + len,
            },
        };
        self.index -= 1;
        Some(part)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.index) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

/// `<source><index>` with no separator, so `file1` part 3 is `file13`.
pub(crate) fn part_path(source: &Path, index: u64) -> PathBuf {
    let mut name = OsString::from(source.as_os_str());
    name.push(index.to_string());
    PathBuf::from(name)
}

/// Moves the file at `path` into numbered part files, truncating the source
/// after each part. Parts come back in the order they were written.
pub(crate) fn split(
    path: &Path,
    options: &SplitOptions,
    progress: &ProgressReporter,
) -> Result<Vec<PartFile>, SplitAborted> {
    if options.part_size.bytes() == 0 {
        return Err(SplitError::InvalidPartSize(options.part_size).into());
    }

    let mut source = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| SplitError::Open {
            path: path.to_owned(),
            source,
        })?;
    let file_length = source
        .metadata()
        .map_err(|source| SplitError::Stat {
            path: path.to_owned(),
            source,
        })?
        .len();

    let plan = SplitPlan::new(file_length, options.part_size)?;
    debug!(
        "splitting '{}' ({file_length} bytes) into {} parts of {}",
        path.display(),
        plan.total_parts(),
        options.part_size
    );
    progress.set_total(file_length);

    let mut parts_written = Vec::new();
    for planned in plan.parts() {
        match extract_part(&mut source, path, planned, options.overwrite) {
            Ok(part) => {
                info!(
                    "part filename: {}; write_len: {}",
                    part.path.display(),
                    part.len
                );
                progress.part_written(&part);
                parts_written.push(part);
            }
            Err(error) => {
                return Err(SplitAborted {
                    parts_written,
                    error,
                })
            }
        }
    }

    Ok(parts_written)
}

fn extract_part(
    source: &mut File,
    source_path: &Path,
    planned: PlannedPart,
    overwrite: bool,
) -> Result<PartFile, SplitError> {
    let path = part_path(source_path, planned.index);
    if !overwrite && path.exists() {
        return Err(SplitError::PartAlreadyExists { path });
    }

    let mut output = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&path)
        .map_err(|source| SplitError::Open {
            path: path.clone(),
            source,
        })?;
    copy_range(source, source_path, &mut output, &path, planned.range)?;

    source
        .set_len(planned.range.start)
        .map_err(|source| SplitError::Truncate {
            path: source_path.to_owned(),
            source,
        })?;
    debug!(
        "truncated '{}' to {} bytes",
        source_path.display(),
        planned.range.start
    );

    Ok(PartFile {
        path,
        index: planned.index,
        len: planned.range.len(),
    })
}

fn copy_range(
    source: &mut File,
    source_path: &Path,
    output: &mut File,
    output_path: &Path,
    range: ChunkRange,
) -> Result<(), SplitError> {
    let read_error = |source| SplitError::Read {
        path: source_path.to_owned(),
        len: range.len(),
        source,
    };

    source
        .seek(SeekFrom::Start(range.start))
        .map_err(read_error)?;

    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut left = range.len();
    while left > 0 {
        let want = left.min(COPY_BUFFER_SIZE as ByteCount) as usize;
        source.read_exact(&mut buffer[..want]).map_err(read_error)?;
        output
            .write_all(&buffer[..want])
            .map_err(|source| SplitError::Write {
                path: output_path.to_owned(),
                len: range.len(),
                source,
            })?;
        left -= want as ByteCount;
    }
    Ok(())
}
