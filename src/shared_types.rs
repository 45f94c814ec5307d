/// Half-open byte range `[start, end)` within the source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ChunkRange {
    pub(crate) start: u64,
    pub(crate) end: u64,
}

impl ChunkRange {
    pub(crate) fn len(&self) -> ByteCount {
        self.end - self.start
    }
}

pub(crate) type ByteCount = u64;
