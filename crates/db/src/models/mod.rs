pub mod media_record;

pub use media_record::{
    AudioStream, Fingerprint, ImageTags, MediaKind, MediaRecord, MediaTimestamps, ProviderIds,
    ServerContext, SubtitleStream, VideoStream,
};
