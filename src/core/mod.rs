pub mod extractor;
pub mod metadata;
pub mod quality;
pub mod source;

pub use extractor::{Extractor, Resolver};
pub use metadata::{Resolution, StreamInfo, StreamProtocol, VideoFormat};
pub use quality::{ExtractOptions, QualityPreset};
pub use source::{classify, SourceKind};
