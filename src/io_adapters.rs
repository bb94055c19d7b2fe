use std::cell::RefCell;
use std::io::{Result as IoResult, Write};
use std::rc::Rc;

/// Memory-backed writer for capturing what `print` writes.
///
/// The buffer is shared, so it can still be read after the writer has been moved into
/// an [`Environment`](crate::env::Environment).
#[derive(Default)]
pub struct MemWriter {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl MemWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A writer plus a second handle on its buffer, for reading the output once the
    /// writer has been handed to an interpreter.
    pub fn with_handle() -> (Self, Rc<RefCell<Vec<u8>>>) {
        let writer = MemWriter::new();
        let buf = Rc::clone(&writer.buf);
        (writer, buf)
    }
}

impl Write for MemWriter {
    fn write(&mut self, data: &[u8]) -> IoResult<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}
