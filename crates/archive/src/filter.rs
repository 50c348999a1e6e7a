//! Generic decompression filters layered under the tar backend.
//!
//! `.tar.gz`, `.tgz`, `.tar.bz2`, `.tar.xz` and `.tar.zst` all open
//! transparently: the filter is auto-detected from magic bytes, never from
//! the extension, so a mislabeled file still decompresses correctly.

use std::io::Read;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;

/// A compression filter wrapped around a container stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Filter {
    /// No filter, the stream is the container itself.
    #[default]
    None,
    /// Gzip (.gz)
    Gzip,
    /// Bzip2 (.bz2)
    Bzip2,
    /// XZ/LZMA (.xz)
    Xz,
    /// Zstd (.zst)
    Zstd,
}

impl Filter {
    /// Detect a filter from the first bytes of a stream.
    pub fn from_magic_bytes(head: &[u8]) -> Self {
        match head {
            [0x1f, 0x8b, ..] => Self::Gzip,
            [b'B', b'Z', b'h', ..] => Self::Bzip2,
            [0xfd, b'7', b'z', b'X', b'Z', 0x00, ..] => Self::Xz,
            [0x28, 0xb5, 0x2f, 0xfd, ..] => Self::Zstd,
            _ => Self::None,
        }
    }

    /// Wrap a reader in the matching decompressor.
    pub fn wrap<'a, R: Read + 'a>(self, reader: R) -> Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Self::None => Box::new(reader),
            // MultiGzDecoder: concatenated gzip members are common in the wild.
            Self::Gzip => Box::new(flate2::read::MultiGzDecoder::new(reader)),
            Self::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(reader)),
            Self::Xz => Box::new(xz2::read::XzDecoder::new_multi_decoder(reader)),
            Self::Zstd => Box::new(zstd::stream::read::Decoder::new(reader).or_raise(|| ErrorKind::Read)?),
        })
    }
}
