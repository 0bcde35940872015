use std::io;
use std::path::PathBuf;

/// Fatal errors: the whole extract or assemble operation is abandoned.
///
/// Per-image problems are never surfaced through this type; they are
/// collected in [`ItemFailure`] entries (extraction) or
/// `ApplyStatus::Failed` entries (assembly) so one bad image cannot
/// take down the rest of the document.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("input file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("format mismatch for {path}: {detail}")]
    FormatMismatch { path: PathBuf, detail: String },

    #[error("corrupt container: {detail}")]
    CorruptContainer { detail: String },

    #[error("failed to save {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Per-item errors recorded against a single image during extraction.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("relationship {rel_id} is not defined in the part rels")]
    MissingRelationship { rel_id: String },

    #[error("package part {part} is missing")]
    MissingPart { part: String },

    #[error("package part {part} is not well-formed XML")]
    MalformedXml { part: String },

    #[error("image bytes could not be decoded: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("unsupported image encoding: {detail}")]
    UnsupportedEncoding { detail: String },
}

/// One skipped image, with enough position context to identify it.
#[derive(Debug)]
pub struct ItemFailure {
    /// Human-readable document position, e.g. "paragraph 4, image 1"
    /// or "slide 2, shape 3".
    pub context: String,
    pub error: ItemError,
}
