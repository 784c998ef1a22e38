//! Decoder for Mach-O images.
//!
//! Both single-architecture images (32 and 64-bit, either byte order) and FAT
//! containers are supported. The result of [`parse`] is an immutable [`Image`]
//! tree that a presenter such as [`report::Report`] can render.
//!
//! ```no_run
//! let image = slotool_rs::parse("/bin/ls")?;
//! for arch in &image.archs {
//!     println!("{:?}", arch.shared_libraries());
//! }
//! # Ok::<(), slotool_rs::Error>(())
//! ```

pub mod endian;
pub mod ffi;
pub mod report;
pub mod source;

mod error;
mod model;
mod parser;

pub use error::{Error, Result};
pub use model::{cpu_type_name, Arch, Command, Header, Image, LoadCommand};
pub use parser::{parse, Parser};
