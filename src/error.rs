use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned while decoding a Mach-O image.
///
/// All of them abort the current parse; no partial [`crate::Image`] is
/// ever produced.
#[derive(Error, Debug)]
pub enum Error {
    /// The file could not be opened, read or seeked.
    #[error("could not access `{}`: {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Fewer bytes are available than a record or a declared span needs.
    #[error("short read at offset {offset:#x}: expected {expected} bytes, {available} available")]
    ShortRead {
        offset: u64,
        expected: usize,
        available: usize,
    },

    /// The leading magic is none of the six known encodings.
    #[error("unknown image format, magic {magic:#010x}")]
    UnknownFormat { magic: u32 },
}

pub type Result<T> = std::result::Result<T, Error>;
