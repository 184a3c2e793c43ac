//! Shared error taxonomy for every `blockfs_*` crate.

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("not this filesystem")]
    NotThisFilesystem,
    #[error("corrupt boot sector: {0}")]
    CorruptBootSector(&'static str),
    #[error("corrupt FAT chain: {0}")]
    CorruptChain(&'static str),
    #[error("corrupt MFT record: {0}")]
    CorruptRecord(&'static str),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("unsupported volume type")]
    UnsupportedVolume,
    #[error("not a text file")]
    NotText,
    #[error("unsupported layout: {0}")]
    UnsupportedLayout(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
