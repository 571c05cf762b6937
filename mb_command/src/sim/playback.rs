//! Simulated storage-card job.

use std::path::Path;

use mb_common::error::StorageFault;

use crate::hw::PlaybackSource;

/// A job held in memory, optionally failing part way through.
#[derive(Debug, Clone, Default)]
pub struct SimPlayback {
    bytes: Vec<u8>,
    cursor: usize,
    playing: bool,
    finished: bool,
    /// Reads stop at this offset with this fault.
    fault: Option<(usize, StorageFault)>,
}

impl SimPlayback {
    /// Start playing `bytes`.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            playing: true,
            ..Self::default()
        }
    }

    /// Start playing the job stored at `path`.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(std::fs::read(path)?))
    }

    /// Fail with `fault` once `offset` bytes have been read.
    pub fn with_fault(mut self, offset: usize, fault: StorageFault) -> Self {
        self.fault = Some((offset.min(self.bytes.len()), fault));
        self
    }

    /// Bytes handed out so far.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Closed by the core, at end of file or after a fault.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn end(&self) -> usize {
        self.fault.map_or(self.bytes.len(), |(offset, _)| offset)
    }
}

impl PlaybackSource for SimPlayback {
    fn is_playing(&self) -> bool {
        self.playing
    }

    fn has_next(&self) -> bool {
        self.playing && self.cursor < self.end()
    }

    fn next_byte(&mut self) -> u8 {
        let byte = self.bytes.get(self.cursor).copied().unwrap_or(0);
        self.cursor += 1;
        byte
    }

    fn status(&self) -> Result<(), StorageFault> {
        match self.fault {
            Some((offset, fault)) if self.cursor >= offset => Err(fault),
            _ => Ok(()),
        }
    }

    fn finish(&mut self) {
        self.playing = false;
        self.finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_truncates_stream() {
        let mut p = SimPlayback::new(vec![1, 2, 3, 4]).with_fault(2, StorageFault::Crc);
        assert_eq!(p.next_byte(), 1);
        assert!(p.status().is_ok());
        assert_eq!(p.next_byte(), 2);
        assert!(!p.has_next());
        assert_eq!(p.status(), Err(StorageFault::Crc));
    }

    #[test]
    fn open_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.s3g");
        std::fs::write(&path, [134, 1]).unwrap();
        let mut p = SimPlayback::open(&path).unwrap();
        assert!(p.is_playing());
        assert_eq!(p.next_byte(), 134);
        assert_eq!(p.next_byte(), 1);
        assert!(!p.has_next());
        p.finish();
        assert!(p.is_finished());
        assert!(!p.is_playing());
    }
}
