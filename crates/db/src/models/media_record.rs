//! Canonical internal representation of one library item (spec §3).

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind of library item. Upstream sends this as a free-form string; we keep an
/// `Other` bucket so unrecognized kinds still round-trip instead of failing
/// conversion (§4.B: "On any conversion failure: return a minimal record...
/// never throw").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Movie,
    Episode,
    Season,
    Series,
    Audio,
    MusicAlbum,
    MusicArtist,
    Photo,
    Other,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "Movie",
            MediaKind::Episode => "Episode",
            MediaKind::Season => "Season",
            MediaKind::Series => "Series",
            MediaKind::Audio => "Audio",
            MediaKind::MusicAlbum => "MusicAlbum",
            MediaKind::MusicArtist => "MusicArtist",
            MediaKind::Photo => "Photo",
            MediaKind::Other => "Other",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for MediaKind {
    fn from(value: &str) -> Self {
        match value {
            "Movie" => MediaKind::Movie,
            "Episode" => MediaKind::Episode,
            "Season" => MediaKind::Season,
            "Series" => MediaKind::Series,
            "Audio" => MediaKind::Audio,
            "MusicAlbum" => MediaKind::MusicAlbum,
            "MusicArtist" => MediaKind::MusicArtist,
            "Photo" => MediaKind::Photo,
            _ => MediaKind::Other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoStream {
    pub height: Option<i64>,
    pub width: Option<i64>,
    pub codec: Option<String>,
    pub profile: Option<String>,
    pub level: Option<String>,
    /// Defaults to `"SDR"` when upstream omits it (§4.B normalization rule).
    pub range: Option<String>,
    pub framerate: Option<f64>,
    pub bitrate: Option<i64>,
    pub bitdepth: Option<i64>,
    pub color_space: Option<String>,
    pub color_transfer: Option<String>,
    pub color_primaries: Option<String>,
    pub pixel_format: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioStream {
    pub codec: Option<String>,
    pub channels: Option<i64>,
    pub language: Option<String>,
    pub bitrate: Option<i64>,
    pub sample_rate: Option<i64>,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtitleStream {
    pub codec: Option<String>,
    pub language: Option<String>,
    pub is_default: bool,
    pub is_forced: bool,
    pub is_external: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderIds {
    pub imdb: Option<String>,
    pub tmdb: Option<String>,
    pub tvdb: Option<String>,
    pub tvdb_slug: Option<String>,
}

impl ProviderIds {
    pub fn is_empty(&self) -> bool {
        self.imdb.is_none() && self.tmdb.is_none() && self.tvdb.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageTags {
    pub primary: Option<String>,
    pub backdrop: Option<String>,
    pub logo: Option<String>,
    pub thumb: Option<String>,
    pub banner: Option<String>,
    pub parent_primary: Option<String>,
    pub parent_thumb: Option<String>,
    pub series_primary: Option<String>,
    pub series_logo: Option<String>,
    pub series_backdrop: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerContext {
    pub id: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaTimestamps {
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
    pub premiere_date: Option<String>,
    /// Set by the store on first write; never supplied by the caller.
    pub ingest_at: Option<String>,
}

/// A stable 256-bit hash over the subset of fields that define "quality
/// identity" (spec §3). Only ever used as a cheap inequality test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Fingerprint(arr))
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    pub id: String,
    pub name: String,
    pub kind: MediaKind,

    pub series_id: Option<String>,
    pub series_name: Option<String>,
    pub season_id: Option<String>,
    pub season_number: Option<i64>,
    pub episode_number: Option<i64>,
    pub parent_id: Option<String>,

    pub year: Option<i64>,
    pub overview: Option<String>,
    pub tagline: Option<String>,
    pub official_rating: Option<String>,
    pub genres: Vec<String>,
    pub studios: Vec<String>,
    pub tags: Vec<String>,

    pub video: Option<VideoStream>,
    pub audio: Option<AudioStream>,
    pub subtitle: Option<SubtitleStream>,

    pub provider_ids: ProviderIds,

    pub file_path: Option<String>,
    pub file_size: Option<i64>,
    pub library_name: Option<String>,

    pub images: ImageTags,
    pub server: ServerContext,
    pub timestamps: MediaTimestamps,

    #[serde(skip)]
    fingerprint_cache: OnceCell<Fingerprint>,
}

impl Default for MediaKind {
    fn default() -> Self {
        MediaKind::Other
    }
}

impl MediaRecord {
    /// Minimal record carrying only id/name/kind — the fallback the Jellyfin
    /// client and ingress normalizer return when conversion otherwise fails
    /// (§4.B, §4.I).
    pub fn minimal(id: impl Into<String>, name: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            ..Default::default()
        }
    }

    /// Season number formatted as a zero-padded two-digit string, e.g. `"02"`.
    pub fn season_number_padded(&self) -> Option<String> {
        self.season_number.map(|n| format!("{n:02}"))
    }

    /// Episode number formatted as a zero-padded three-digit string, e.g. `"007"`.
    pub fn episode_number_padded(&self) -> Option<String> {
        self.episode_number.map(|n| format!("{n:03}"))
    }

    pub fn video_range(&self) -> &str {
        self.video
            .as_ref()
            .and_then(|v| v.range.as_deref())
            .unwrap_or("SDR")
    }

    /// Compute (and cache) the content fingerprint. The cache is local to
    /// this instance — cloning resets it, so a clone recomputes on first
    /// access rather than sharing stale state (see invariant 1 in spec §8).
    pub fn fingerprint(&self) -> Fingerprint {
        *self.fingerprint_cache.get_or_init(|| self.compute_fingerprint())
    }

    fn compute_fingerprint(&self) -> Fingerprint {
        let video = self.video.clone().unwrap_or_default();
        let audio = self.audio.clone().unwrap_or_default();

        // Pipe-joined field list keeps the hash input unambiguous (a plain
        // concatenation of "10" + "80" and "108" + "0" would otherwise
        // collide).
        let mut buf = String::new();
        buf.push_str(&self.id);
        buf.push('|');
        buf.push_str(&self.name);
        buf.push('|');
        buf.push_str(self.kind.as_str());
        buf.push('|');
        buf.push_str(&video.height.map(|v| v.to_string()).unwrap_or_default());
        buf.push('|');
        buf.push_str(&video.width.map(|v| v.to_string()).unwrap_or_default());
        buf.push('|');
        buf.push_str(video.codec.as_deref().unwrap_or(""));
        buf.push('|');
        buf.push_str(video.profile.as_deref().unwrap_or(""));
        buf.push('|');
        buf.push_str(video.range.as_deref().unwrap_or("SDR"));
        buf.push('|');
        buf.push_str(&video.framerate.map(|v| v.to_string()).unwrap_or_default());
        buf.push('|');
        buf.push_str(&video.bitrate.map(|v| v.to_string()).unwrap_or_default());
        buf.push('|');
        buf.push_str(&video.bitdepth.map(|v| v.to_string()).unwrap_or_default());
        buf.push('|');
        buf.push_str(audio.codec.as_deref().unwrap_or(""));
        buf.push('|');
        buf.push_str(&audio.channels.map(|v| v.to_string()).unwrap_or_default());
        buf.push('|');
        buf.push_str(&audio.bitrate.map(|v| v.to_string()).unwrap_or_default());
        buf.push('|');
        buf.push_str(&audio.sample_rate.map(|v| v.to_string()).unwrap_or_default());
        buf.push('|');
        buf.push_str(self.file_path.as_deref().unwrap_or(""));

        let digest = Sha256::digest(buf.as_bytes());
        Fingerprint(digest.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MediaRecord {
        MediaRecord {
            id: "m1".into(),
            name: "The Matrix".into(),
            kind: MediaKind::Movie,
            video: Some(VideoStream {
                height: Some(1080),
                codec: Some("h264".into()),
                ..Default::default()
            }),
            audio: Some(AudioStream {
                codec: Some("ac3".into()),
                channels: Some(6),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Invariant 1 (spec §8): fingerprint ignores volatile fields.
    #[test]
    fn fingerprint_ignores_volatile_fields() {
        let mut a = sample();
        let mut b = sample();
        a.timestamps.ingest_at = Some("2026-01-01T00:00:00Z".into());
        b.timestamps.ingest_at = Some("2099-12-31T23:59:59Z".into());
        b.overview = Some("different overview, same quality identity".into());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    /// Invariant 2 (spec §8): differing tracked fields never collide, across
    /// an exhaustive-ish table of the tracked dimensions.
    #[test]
    fn fingerprint_distinguishes_tracked_fields() {
        let base = sample();
        let variants: Vec<MediaRecord> = vec![
            {
                let mut r = base.clone();
                r.video.as_mut().unwrap().height = Some(2160);
                r
            },
            {
                let mut r = base.clone();
                r.video.as_mut().unwrap().codec = Some("hevc".into());
                r
            },
            {
                let mut r = base.clone();
                r.audio.as_mut().unwrap().codec = Some("dts".into());
                r
            },
            {
                let mut r = base.clone();
                r.audio.as_mut().unwrap().channels = Some(2);
                r
            },
            {
                let mut r = base.clone();
                r.file_path = Some("/media/other.mkv".into());
                r
            },
        ];

        let base_fp = base.fingerprint();
        for variant in &variants {
            assert_ne!(base_fp, variant.fingerprint());
        }
        // and pairwise among variants
        for i in 0..variants.len() {
            for j in (i + 1)..variants.len() {
                assert_ne!(variants[i].fingerprint(), variants[j].fingerprint());
            }
        }
    }

    #[test]
    fn padded_numbers() {
        let mut r = sample();
        r.season_number = Some(2);
        r.episode_number = Some(7);
        assert_eq!(r.season_number_padded().as_deref(), Some("02"));
        assert_eq!(r.episode_number_padded().as_deref(), Some("007"));
    }

    #[test]
    fn video_range_defaults_to_sdr() {
        let r = MediaRecord::minimal("x", "y", MediaKind::Movie);
        assert_eq!(r.video_range(), "SDR");
    }
}
