//! Change Detector (spec §4.C). Pure: no I/O, no side effects.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::media_record::MediaRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    Resolution,
    Codec,
    AudioCodec,
    AudioChannels,
    HdrStatus,
    FileSize,
    ProviderIds,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Resolution => "resolution",
            ChangeType::Codec => "codec",
            ChangeType::AudioCodec => "audio_codec",
            ChangeType::AudioChannels => "audio_channels",
            ChangeType::HdrStatus => "hdr_status",
            ChangeType::FileSize => "file_size",
            ChangeType::ProviderIds => "provider_ids",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeDescriptor {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub field: &'static str,
    pub old_value: String,
    pub new_value: String,
    pub description: String,
}

/// Enable-bit map from change type to whether it should be reported. Missing
/// entries default to enabled, matching the original's `watch_changes.get(key,
/// True)` behavior.
#[derive(Debug, Clone, Default)]
pub struct ChangePolicy(HashMap<ChangeType, bool>);

impl ChangePolicy {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn set(mut self, change_type: ChangeType, enabled: bool) -> Self {
        self.0.insert(change_type, enabled);
        self
    }

    pub fn is_enabled(&self, change_type: ChangeType) -> bool {
        *self.0.get(&change_type).unwrap_or(&true)
    }

    pub fn all_enabled() -> Self {
        Self::new()
    }
}

fn unknown_or(value: Option<&str>) -> String {
    value.unwrap_or("Unknown").to_string()
}

fn sdr_or(value: &str) -> String {
    if value.is_empty() {
        "SDR".to_string()
    } else {
        value.to_string()
    }
}

fn none_or(value: Option<&str>) -> String {
    value.unwrap_or("None").to_string()
}

/// Compare two records under `policy`, in the fixed order spec §4.C lists.
pub fn detect(old: &MediaRecord, new: &MediaRecord, policy: &ChangePolicy) -> Vec<ChangeDescriptor> {
    let mut changes = Vec::new();

    let old_video = old.video.clone().unwrap_or_default();
    let new_video = new.video.clone().unwrap_or_default();
    let old_audio = old.audio.clone().unwrap_or_default();
    let new_audio = new.audio.clone().unwrap_or_default();

    if policy.is_enabled(ChangeType::Resolution) && old_video.height != new_video.height {
        changes.push(ChangeDescriptor {
            change_type: ChangeType::Resolution,
            field: "video_height",
            old_value: old_video.height.map(|h| h.to_string()).unwrap_or_default(),
            new_value: new_video.height.map(|h| h.to_string()).unwrap_or_default(),
            description: format!(
                "Resolution changed from {}p to {}p",
                old_video.height.map(|h| h.to_string()).unwrap_or_else(|| "?".into()),
                new_video.height.map(|h| h.to_string()).unwrap_or_else(|| "?".into()),
            ),
        });
    }

    if policy.is_enabled(ChangeType::Codec) && old_video.codec != new_video.codec {
        changes.push(ChangeDescriptor {
            change_type: ChangeType::Codec,
            field: "video_codec",
            old_value: unknown_or(old_video.codec.as_deref()),
            new_value: unknown_or(new_video.codec.as_deref()),
            description: format!(
                "Video codec changed from {} to {}",
                unknown_or(old_video.codec.as_deref()),
                unknown_or(new_video.codec.as_deref()),
            ),
        });
    }

    if policy.is_enabled(ChangeType::AudioCodec) && old_audio.codec != new_audio.codec {
        changes.push(ChangeDescriptor {
            change_type: ChangeType::AudioCodec,
            field: "audio_codec",
            old_value: unknown_or(old_audio.codec.as_deref()),
            new_value: unknown_or(new_audio.codec.as_deref()),
            description: format!(
                "Audio codec changed from {} to {}",
                unknown_or(old_audio.codec.as_deref()),
                unknown_or(new_audio.codec.as_deref()),
            ),
        });
    }

    if policy.is_enabled(ChangeType::AudioChannels) && old_audio.channels != new_audio.channels {
        let old_n = old_audio.channels.unwrap_or(0);
        let new_n = new_audio.channels.unwrap_or(0);
        changes.push(ChangeDescriptor {
            change_type: ChangeType::AudioChannels,
            field: "audio_channels",
            old_value: old_n.to_string(),
            new_value: new_n.to_string(),
            description: format!(
                "Audio channels changed from {} channel{} to {} channel{}",
                old_n,
                if old_n == 1 { "" } else { "s" },
                new_n,
                if new_n == 1 { "" } else { "s" },
            ),
        });
    }

    let old_range = sdr_or(old_video.range.as_deref().unwrap_or(""));
    let new_range = sdr_or(new_video.range.as_deref().unwrap_or(""));
    if policy.is_enabled(ChangeType::HdrStatus) && old_range != new_range {
        changes.push(ChangeDescriptor {
            change_type: ChangeType::HdrStatus,
            field: "video_range",
            old_value: old_range.clone(),
            new_value: new_range.clone(),
            description: format!("HDR status changed from {} to {}", old_range, new_range),
        });
    }

    if policy.is_enabled(ChangeType::FileSize) {
        if let (Some(old_size), Some(new_size)) = (old.file_size, new.file_size) {
            let denom = old_size.max(1) as f64;
            let delta_ratio = (new_size - old_size).abs() as f64 / denom;
            if delta_ratio > 0.10 {
                changes.push(ChangeDescriptor {
                    change_type: ChangeType::FileSize,
                    field: "file_size",
                    old_value: old_size.to_string(),
                    new_value: new_size.to_string(),
                    description: format!(
                        "File size changed from {} to {} bytes",
                        old_size, new_size
                    ),
                });
            }
        }
    }

    if policy.is_enabled(ChangeType::ProviderIds) {
        for (label, old_id, new_id) in [
            ("imdb", &old.provider_ids.imdb, &new.provider_ids.imdb),
            ("tmdb", &old.provider_ids.tmdb, &new.provider_ids.tmdb),
            ("tvdb", &old.provider_ids.tvdb, &new.provider_ids.tvdb),
        ] {
            let both_null = old_id.is_none() && new_id.is_none();
            if !both_null && old_id != new_id {
                changes.push(ChangeDescriptor {
                    change_type: ChangeType::ProviderIds,
                    field: "provider_ids",
                    old_value: none_or(old_id.as_deref()),
                    new_value: none_or(new_id.as_deref()),
                    description: format!(
                        "{} provider id changed from {} to {}",
                        label,
                        none_or(old_id.as_deref()),
                        none_or(new_id.as_deref()),
                    ),
                });
            }
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::media_record::{AudioStream, MediaKind, VideoStream};

    fn movie(height: i64, codec: &str) -> MediaRecord {
        MediaRecord {
            id: "m1".into(),
            name: "Test".into(),
            kind: MediaKind::Movie,
            video: Some(VideoStream {
                height: Some(height),
                codec: Some(codec.into()),
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

    /// Invariant 3 (spec §8): comparing a record to itself yields no changes.
    #[test]
    fn no_changes_against_self() {
        let r = movie(1080, "h264");
        assert!(detect(&r, &r, &ChangePolicy::all_enabled()).is_empty());
    }

    /// Invariant 4: disabling a change type only removes changes of that type.
    #[test]
    fn disabling_type_removes_only_that_type() {
        let mut old = movie(1080, "h264");
        let mut new = movie(2160, "hevc");
        old.video.as_mut().unwrap().range = Some("SDR".into());
        new.video.as_mut().unwrap().range = Some("HDR10".into());

        let full = detect(&old, &new, &ChangePolicy::all_enabled());
        assert!(full.iter().any(|c| c.change_type == ChangeType::Resolution));
        assert!(full.iter().any(|c| c.change_type == ChangeType::Codec));
        assert!(full.iter().any(|c| c.change_type == ChangeType::HdrStatus));

        let without_codec = ChangePolicy::all_enabled().set(ChangeType::Codec, false);
        let reduced = detect(&old, &new, &without_codec);
        assert!(!reduced.iter().any(|c| c.change_type == ChangeType::Codec));
        assert!(reduced.iter().any(|c| c.change_type == ChangeType::Resolution));
        assert!(reduced.iter().any(|c| c.change_type == ChangeType::HdrStatus));
    }

    /// Invariant 5: file size only emits past the 10% threshold.
    #[test]
    fn file_size_threshold() {
        let mut old = movie(1080, "h264");
        let mut new = movie(1080, "h264");
        old.file_size = Some(1_000_000);

        new.file_size = Some(1_050_000); // 5% — suppressed
        assert!(detect(&old, &new, &ChangePolicy::all_enabled()).is_empty());

        new.file_size = Some(1_150_000); // 15% — emitted
        let changes = detect(&old, &new, &ChangePolicy::all_enabled());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::FileSize);
    }

    /// Invariant 6: provider id changes only emit when not (null, null) and differing.
    #[test]
    fn provider_ids_null_pair_suppressed() {
        let old = movie(1080, "h264");
        let new = movie(1080, "h264");
        assert!(detect(&old, &new, &ChangePolicy::all_enabled()).is_empty());

        let mut new2 = movie(1080, "h264");
        new2.provider_ids.imdb = Some("tt123".into());
        let changes = detect(&old, &new2, &ChangePolicy::all_enabled());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::ProviderIds);
    }

    /// S2 scenario from spec §8: resolution + codec + hdr upgrade together.
    #[test]
    fn scenario_s2_resolution_upgrade() {
        let mut old = movie(1080, "h264");
        old.video.as_mut().unwrap().range = Some("SDR".into());
        let mut new = movie(2160, "hevc");
        new.video.as_mut().unwrap().range = Some("HDR10".into());

        let changes = detect(&old, &new, &ChangePolicy::all_enabled());
        assert_eq!(changes.len(), 3);
    }
}
