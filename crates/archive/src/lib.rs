//! Archives: self-describing, block-structured, bidirectional serialization.
//!
//! The same `serialize_*` call reads or writes depending on the archive
//! direction, so a type describes its layout once. Content is grouped in
//! blocks:
//! - unordered blocks address fields by name,
//! - ordered blocks are positional,
//! - array blocks are positional and carry their element count.
//!
//! # Invariants
//! - Unordered blocks tolerate extra fields; a missing field is an error.
//! - An error inside a safe block unwinds to that block's boundary, is logged,
//!   and never reaches the enclosing block.

mod binary;
mod value;

pub use binary::{BinaryInputArchive, BinaryOutputArchive};
pub use value::{ArchiveValue, serialize_value};

/// Errors raised while reading or writing an archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("missing field '{0}'")]
    MissingField(String),
    #[error("field '{name}' is not a {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
    },
    #[error("value of field '{name}' is out of range")]
    OutOfRange { name: String },
    #[error("array block '{name}' expected {expected} elements, got {actual}")]
    ArraySizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("no element left in block while reading '{0}'")]
    EndOfBlock(String),
    #[error("no open block")]
    NoOpenBlock,
    #[error("archive root is already written")]
    RootAlreadyWritten,
    #[error("archive is empty")]
    Empty,
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
}

/// Direction-agnostic archive.
///
/// Implementations keep a stack of open blocks. `depth`/`unwind_to` let
/// callers abandon a partially processed block after an error.
pub trait Archive {
    fn is_input(&self) -> bool;

    /// Number of currently open blocks.
    fn depth(&self) -> usize;

    /// Close blocks until `depth` remain open, discarding unread input.
    fn unwind_to(&mut self, depth: usize);

    fn begin_ordered_block(&mut self, name: &str) -> Result<(), ArchiveError>;

    fn begin_unordered_block(&mut self, name: &str) -> Result<(), ArchiveError>;

    /// Open an array block of `size` elements. Input archives ignore `size`
    /// and return the stored element count instead.
    fn begin_array_block(&mut self, name: &str, size: usize) -> Result<usize, ArchiveError>;

    fn end_block(&mut self) -> Result<(), ArchiveError>;

    fn serialize_bool(&mut self, name: &str, value: &mut bool) -> Result<(), ArchiveError>;

    fn serialize_u64(&mut self, name: &str, value: &mut u64) -> Result<(), ArchiveError>;

    fn serialize_i64(&mut self, name: &str, value: &mut i64) -> Result<(), ArchiveError>;

    fn serialize_f64(&mut self, name: &str, value: &mut f64) -> Result<(), ArchiveError>;

    fn serialize_string(&mut self, name: &str, value: &mut String) -> Result<(), ArchiveError>;

    fn serialize_bytes(&mut self, name: &str, value: &mut Vec<u8>) -> Result<(), ArchiveError>;
}

/// Scoped block helpers for any [`Archive`], including `dyn Archive`.
pub trait ArchiveExt: Archive {
    fn ordered_block<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> Result<R, ArchiveError>,
    ) -> Result<R, ArchiveError> {
        self.begin_ordered_block(name)?;
        let result = f(self)?;
        self.end_block()?;
        Ok(result)
    }

    fn unordered_block<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> Result<R, ArchiveError>,
    ) -> Result<R, ArchiveError> {
        self.begin_unordered_block(name)?;
        let result = f(self)?;
        self.end_block()?;
        Ok(result)
    }

    /// `f` receives the element count: `size` on output, the stored count on
    /// input.
    fn array_block<R>(
        &mut self,
        name: &str,
        size: usize,
        f: impl FnOnce(&mut Self, usize) -> Result<R, ArchiveError>,
    ) -> Result<R, ArchiveError> {
        let len = self.begin_array_block(name, size)?;
        let result = f(self, len)?;
        self.end_block()?;
        Ok(result)
    }

    /// Unordered block whose failures stay inside it: on error the rest of the
    /// block is skipped and the archive is left positioned after it.
    fn safe_unordered_block(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> Result<(), ArchiveError>,
    ) {
        let depth = self.depth();
        if let Err(err) = self.unordered_block(name, f) {
            tracing::warn!(block = name, %err, "skipping malformed block");
            self.unwind_to(depth);
        }
    }

    /// Run `f`, converting any error into a logged skip. Returns whether `f`
    /// completed.
    fn consume_archive_error(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<(), ArchiveError>,
    ) -> bool {
        let depth = self.depth();
        match f(self) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(%err, "archive error");
                self.unwind_to(depth);
                false
            }
        }
    }
}

impl<A: Archive + ?Sized> ArchiveExt for A {}

pub fn crate_info() -> &'static str {
    "scenelink-archive v0.1.0"
}
