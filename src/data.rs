use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::rc::Rc;

use crate::error::Result;


/// Shared in-memory byte source and sink.
///
/// Cloning produces another handle to the same buffer, so an operation
/// started asynchronously can keep writing output while the caller still
/// holds the data. Reads advance an internal position, writes append.
///
/// Buffer contents are erased at destruction time.
#[derive(Clone, Default)]
pub struct Data {
    inner: Rc<RefCell<Buffer>>
}


#[derive(Default)]
struct Buffer {
    /// Raw internal data
    data: Vec<u8>,

    /// Read position
    pos: usize,
}


impl Data {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Data::default()
    }

    /// Creates a buffer holding a copy of `bytes`.
    ///
    /// * `bytes` - initial contents
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Data::from(Vec::from(bytes))
    }

    /// Creates a buffer holding the whole contents of a file.
    ///
    /// * `path` - file to read
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Data::from(bytes))
    }

    /// Creates a buffer from `length` bytes of a file starting at `offset`.
    ///
    /// Fails if the file ends before `length` bytes were read.
    ///
    /// * `path` - file to read
    /// * `offset` - position of the first byte
    /// * `length` - amount of bytes to read
    pub fn from_file_part(path: &Path, offset: u64, length: usize) -> Result<Self> {
        let mut file = File::open(path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut bytes = Vec::new();
        bytes.try_reserve_exact(length)?;
        bytes.resize(length, 0u8);

        file.read_exact(&mut bytes)?;
        Ok(Data::from(bytes))
    }

    /// Total amount of stored bytes.
    pub fn len(&self) -> usize {
        self.inner
            .borrow()
            .data
            .len()
    }

    /// Check if buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of the stored bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.inner
            .borrow()
            .data
            .clone()
    }

    /// Returns stored bytes as a lossily decoded string.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.inner.borrow().data)
            .into_owned()
    }

    /// Moves read position back to the beginning.
    pub fn rewind(&self) {
        self.inner
            .borrow_mut()
            .pos = 0;
    }

    /// Reads bytes starting at the current position.
    ///
    /// Returns number of bytes copied, 0 means the end of data.
    ///
    /// * `buf` - destination
    pub fn read(&self, buf: &mut [u8]) -> usize {
        let mut inner = self.inner.borrow_mut();
        let start = inner.pos.min(inner.data.len());
        let count = buf.len().min(inner.data.len() - start);

        buf[..count].copy_from_slice(&inner.data[start..start + count]);
        inner.pos = start + count;
        count
    }

    /// Appends bytes to the end of the buffer.
    ///
    /// * `bytes` - data to append
    pub fn write(&self, bytes: &[u8]) {
        self.inner
            .borrow_mut()
            .data
            .extend_from_slice(bytes);
    }
}


impl Drop for Buffer {
    fn drop(&mut self) {
        //
        // Just zero stored memory
        //

        for e in self.data.iter_mut() {
            *e = 0u8;
        }
    }
}


impl From<Vec<u8>> for Data {
    fn from(value: Vec<u8>) -> Self {
        Data {
            inner: Rc::new(RefCell::new(Buffer { data: value, pos: 0 }))
        }
    }
}


impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Data::from_bytes(value.as_bytes())
    }
}


impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data")
            .field("len", &self.len())
            .finish()
    }
}
