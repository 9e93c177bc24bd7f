//! Raw Jellyfin API item shape and its conversion into `db::MediaRecord`
//! (spec §4.B). The upstream JSON is loosely typed (fields omitted entirely
//! when unset, some nested under `MediaSources`), so this stays close to
//! `serde_json::Value` with typed accessors rather than a strict struct.

use chrono::Utc;
use db::models::{
    AudioStream, ImageTags, MediaKind, MediaRecord, MediaTimestamps, ProviderIds, ServerContext,
    SubtitleStream, VideoStream,
};
use serde_json::Value;

/// Field whitelist requested from upstream (spec §4.B) — kept as a constant
/// so `StreamItems`/`GetItem` both request exactly this set.
pub const FIELD_WHITELIST: &[&str] = &[
    "Overview",
    "ProductionYear",
    "RunTimeTicks",
    "OfficialRating",
    "Tagline",
    "PremiereDate",
    "DateCreated",
    "DateModified",
    "MediaStreams",
    "MediaSources",
    "ProviderIds",
    "Path",
    "IndexNumber",
    "ParentIndexNumber",
    "SeriesName",
    "SeriesId",
    "SeasonId",
    "ParentId",
    "AirTime",
    "Genres",
    "Studios",
    "Tags",
    "Album",
    "Artists",
    "AlbumArtist",
    "ArtistItems",
    "Width",
    "Height",
    "AspectRatio",
    "CommunityRating",
];

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key).and_then(Value::as_str).map(str::to_string)
}

fn int_field(v: &Value, key: &str) -> Option<i64> {
    v.get(key).and_then(Value::as_i64)
}

fn name_or_string_list(v: &Value, key: &str) -> Vec<String> {
    let Some(arr) = v.get(key).and_then(Value::as_array) else {
        return Vec::new();
    };
    arr.iter()
        .map(|item| {
            if let Some(s) = item.as_str() {
                s.to_string()
            } else if let Some(name) = item.get("Name").and_then(Value::as_str) {
                name.to_string()
            } else {
                item.to_string()
            }
        })
        .collect()
}

fn first_stream<'a>(streams: &'a [Value], kind: &str) -> Option<&'a Value> {
    streams.iter().find(|s| s.get("Type").and_then(Value::as_str) == Some(kind))
}

fn media_streams(raw: &Value) -> Vec<Value> {
    if let Some(sources) = raw.get("MediaSources").and_then(Value::as_array) {
        let mut streams = Vec::new();
        for source in sources {
            if let Some(s) = source.get("MediaStreams").and_then(Value::as_array) {
                streams.extend(s.iter().cloned());
            }
        }
        if !streams.is_empty() {
            return streams;
        }
    }
    raw.get("MediaStreams")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn file_size(raw: &Value) -> Option<i64> {
    raw.get("MediaSources")
        .and_then(Value::as_array)
        .and_then(|sources| sources.iter().find_map(|s| s.get("Size").and_then(Value::as_i64)))
}

/// Converts one raw Jellyfin item into a `MediaRecord`. Never fails: on any
/// missing/malformed field it falls back to `MediaRecord::minimal` (spec
/// §4.B: "On any conversion failure... never throw").
pub fn convert_to_record(raw: &Value, server: ServerContext) -> MediaRecord {
    let id = match str_field(raw, "Id") {
        Some(id) => id,
        None => return MediaRecord::minimal("", "Unknown", MediaKind::Other),
    };
    let name = str_field(raw, "Name").unwrap_or_else(|| "Unknown".to_string());
    let kind = MediaKind::from(raw.get("Type").and_then(Value::as_str).unwrap_or("Other"));

    let streams = media_streams(raw);

    let video = first_stream(&streams, "Video").map(|s| VideoStream {
        height: int_field(s, "Height"),
        width: int_field(s, "Width"),
        codec: str_field(s, "Codec").map(|c| c.to_lowercase()),
        profile: str_field(s, "Profile"),
        level: str_field(s, "Level"),
        range: Some(str_field(s, "VideoRange").unwrap_or_else(|| "SDR".to_string())),
        framerate: s.get("RealFrameRate").and_then(Value::as_f64),
        bitrate: int_field(s, "BitRate"),
        bitdepth: int_field(s, "BitDepth"),
        color_space: str_field(s, "ColorSpace"),
        color_transfer: str_field(s, "ColorTransfer"),
        color_primaries: str_field(s, "ColorPrimaries"),
        pixel_format: str_field(s, "PixelFormat"),
    });

    let audio = first_stream(&streams, "Audio").map(|s| AudioStream {
        codec: str_field(s, "Codec").map(|c| c.to_lowercase()),
        channels: int_field(s, "Channels"),
        language: str_field(s, "Language"),
        bitrate: int_field(s, "BitRate"),
        sample_rate: int_field(s, "SampleRate"),
        is_default: s.get("IsDefault").and_then(Value::as_bool).unwrap_or(false),
    });

    let subtitle = first_stream(&streams, "Subtitle").map(|s| SubtitleStream {
        codec: str_field(s, "Codec"),
        language: str_field(s, "Language"),
        is_default: s.get("IsDefault").and_then(Value::as_bool).unwrap_or(false),
        is_forced: s.get("IsForced").and_then(Value::as_bool).unwrap_or(false),
        is_external: s.get("IsExternal").and_then(Value::as_bool).unwrap_or(false),
    });

    let provider_ids_raw = raw.get("ProviderIds").cloned().unwrap_or(Value::Null);
    let provider_ids = ProviderIds {
        imdb: str_field(&provider_ids_raw, "Imdb"),
        tmdb: str_field(&provider_ids_raw, "Tmdb"),
        tvdb: str_field(&provider_ids_raw, "Tvdb"),
        tvdb_slug: str_field(&provider_ids_raw, "Tvdbslug"),
    };

    let image_tags = raw.get("ImageTags").cloned().unwrap_or(Value::Null);
    let images = ImageTags {
        primary: str_field(&image_tags, "Primary"),
        backdrop: str_field(&image_tags, "Backdrop"),
        logo: str_field(&image_tags, "Logo"),
        thumb: str_field(&image_tags, "Thumb"),
        banner: str_field(&image_tags, "Banner"),
        parent_primary: None,
        parent_thumb: None,
        series_primary: str_field(raw, "SeriesPrimaryImageTag"),
        series_logo: str_field(raw, "ParentLogoImageTag"),
        series_backdrop: raw
            .get("ParentBackdropImageTags")
            .and_then(Value::as_array)
            .and_then(|a| a.first())
            .and_then(Value::as_str)
            .map(str::to_string),
    };

    let season_number = match kind {
        MediaKind::Season => int_field(raw, "IndexNumber"),
        _ => int_field(raw, "ParentIndexNumber"),
    };
    let episode_number = int_field(raw, "IndexNumber").filter(|_| kind == MediaKind::Episode);

    MediaRecord {
        id,
        name,
        kind,
        series_id: str_field(raw, "SeriesId"),
        series_name: str_field(raw, "SeriesName"),
        season_id: str_field(raw, "SeasonId"),
        season_number,
        episode_number,
        parent_id: str_field(raw, "ParentId"),
        year: int_field(raw, "ProductionYear"),
        overview: str_field(raw, "Overview"),
        tagline: str_field(raw, "Tagline"),
        official_rating: str_field(raw, "OfficialRating"),
        genres: name_or_string_list(raw, "Genres"),
        studios: name_or_string_list(raw, "Studios"),
        tags: raw
            .get("Tags")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default(),
        video,
        audio,
        subtitle,
        provider_ids,
        file_path: str_field(raw, "Path"),
        file_size: file_size(raw),
        library_name: None,
        images,
        server,
        timestamps: MediaTimestamps {
            created_at: str_field(raw, "DateCreated"),
            modified_at: str_field(raw, "DateModified"),
            premiere_date: str_field(raw, "PremiereDate"),
            ingest_at: Some(Utc::now().to_rfc3339()),
        },
        ..Default::default()
    }
}

/// Normalizes the flat inbound webhook payload (spec §6) into a
/// `MediaRecord`. Distinct from `convert_to_record` because the webhook
/// plugin sends a flat, indexed field naming scheme (`Video_0_Height`,
/// `Provider_imdb`, ...) rather than the nested upstream API item shape;
/// the two converters agree on the resulting record semantics, not on
/// their input shape. Returns `None` when a required field is missing.
pub fn convert_webhook_to_record(raw: &Value) -> Option<MediaRecord> {
    let id = str_field(raw, "ItemId")?;
    let name = str_field(raw, "Name")?;
    let kind = MediaKind::from(str_field(raw, "ItemType")?.as_str());

    let video = if raw.get("Video_0_Height").is_some() || raw.get("Video_0_Codec").is_some() {
        Some(VideoStream {
            height: int_field(raw, "Video_0_Height"),
            width: int_field(raw, "Video_0_Width"),
            codec: str_field(raw, "Video_0_Codec").map(|c| c.to_lowercase()),
            profile: str_field(raw, "Video_0_Profile"),
            level: str_field(raw, "Video_0_Level"),
            range: Some(str_field(raw, "Video_0_VideoRange").unwrap_or_else(|| "SDR".to_string())),
            framerate: raw.get("Video_0_Framerate").and_then(Value::as_f64),
            bitrate: int_field(raw, "Video_0_Bitrate"),
            bitdepth: int_field(raw, "Video_0_BitDepth"),
            color_space: str_field(raw, "Video_0_ColorSpace"),
            color_transfer: str_field(raw, "Video_0_ColorTransfer"),
            color_primaries: str_field(raw, "Video_0_ColorPrimaries"),
            pixel_format: str_field(raw, "Video_0_PixelFormat"),
        })
    } else {
        None
    };

    let audio = if raw.get("Audio_0_Codec").is_some() || raw.get("Audio_0_Channels").is_some() {
        Some(AudioStream {
            codec: str_field(raw, "Audio_0_Codec").map(|c| c.to_lowercase()),
            channels: int_field(raw, "Audio_0_Channels"),
            language: str_field(raw, "Audio_0_Language"),
            bitrate: int_field(raw, "Audio_0_Bitrate"),
            sample_rate: int_field(raw, "Audio_0_SampleRate"),
            is_default: raw.get("Audio_0_Default").and_then(Value::as_bool).unwrap_or(false),
        })
    } else {
        None
    };

    let subtitle = if raw.get("Subtitle_0_Codec").is_some() {
        Some(SubtitleStream {
            codec: str_field(raw, "Subtitle_0_Codec"),
            language: str_field(raw, "Subtitle_0_Language"),
            is_default: raw.get("Subtitle_0_Default").and_then(Value::as_bool).unwrap_or(false),
            is_forced: raw.get("Subtitle_0_Forced").and_then(Value::as_bool).unwrap_or(false),
            is_external: raw.get("Subtitle_0_External").and_then(Value::as_bool).unwrap_or(false),
        })
    } else {
        None
    };

    let provider_ids = ProviderIds {
        imdb: str_field(raw, "Provider_imdb"),
        tmdb: str_field(raw, "Provider_tmdb"),
        tvdb: str_field(raw, "Provider_tvdb"),
        tvdb_slug: str_field(raw, "Provider_tvdbslug"),
    };

    let genres = str_field(raw, "Genres")
        .map(|s| s.split(',').map(|g| g.trim().to_string()).filter(|g| !g.is_empty()).collect())
        .unwrap_or_default();

    let server = ServerContext {
        id: str_field(raw, "ServerId"),
        name: str_field(raw, "ServerName"),
        version: str_field(raw, "ServerVersion"),
        url: str_field(raw, "ServerUrl"),
    };

    Some(MediaRecord {
        id,
        name,
        kind,
        series_id: str_field(raw, "SeriesId"),
        series_name: str_field(raw, "SeriesName"),
        season_id: None,
        season_number: int_field(raw, "SeasonNumber"),
        episode_number: int_field(raw, "EpisodeNumber"),
        parent_id: None,
        year: int_field(raw, "Year"),
        overview: str_field(raw, "Overview"),
        tagline: str_field(raw, "Tagline"),
        official_rating: None,
        genres,
        studios: Vec::new(),
        tags: Vec::new(),
        video,
        audio,
        subtitle,
        provider_ids,
        file_path: str_field(raw, "Path"),
        file_size: None,
        library_name: str_field(raw, "LibraryName"),
        images: ImageTags::default(),
        server,
        timestamps: MediaTimestamps {
            created_at: None,
            modified_at: None,
            premiere_date: str_field(raw, "PremiereDate"),
            ingest_at: Some(Utc::now().to_rfc3339()),
        },
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_full_movie_item() {
        let raw = json!({
            "Id": "abc123",
            "Name": "Arrival",
            "Type": "Movie",
            "ProductionYear": 2016,
            "ProviderIds": {"Imdb": "tt2543164", "Tmdb": "329865"},
            "MediaStreams": [
                {"Type": "Video", "Height": 2160, "Width": 3840, "Codec": "HEVC", "VideoRange": "HDR10"},
                {"Type": "Audio", "Codec": "TRUEHD", "Channels": 8}
            ],
            "Path": "/media/movies/Arrival.mkv"
        });

        let record = convert_to_record(&raw, ServerContext::default());
        assert_eq!(record.id, "abc123");
        assert_eq!(record.kind, MediaKind::Movie);
        assert_eq!(record.video.as_ref().unwrap().height, Some(2160));
        assert_eq!(record.video.as_ref().unwrap().codec.as_deref(), Some("hevc"));
        assert_eq!(record.provider_ids.imdb.as_deref(), Some("tt2543164"));
    }

    #[test]
    fn missing_id_falls_back_to_minimal() {
        let raw = json!({"Name": "Broken"});
        let record = convert_to_record(&raw, ServerContext::default());
        assert_eq!(record.id, "");
        assert_eq!(record.name, "Unknown");
    }

    #[test]
    fn video_range_defaults_to_sdr_when_absent() {
        let raw = json!({
            "Id": "x",
            "Name": "No Range",
            "Type": "Movie",
            "MediaStreams": [{"Type": "Video", "Height": 1080}]
        });
        let record = convert_to_record(&raw, ServerContext::default());
        assert_eq!(record.video_range(), "SDR");
    }

    #[test]
    fn season_uses_index_number_episode_uses_parent_index() {
        let season = json!({"Id": "s1", "Name": "Season 2", "Type": "Season", "IndexNumber": 2});
        let record = convert_to_record(&season, ServerContext::default());
        assert_eq!(record.season_number, Some(2));

        let episode = json!({
            "Id": "e1", "Name": "Pilot", "Type": "Episode",
            "ParentIndexNumber": 1, "IndexNumber": 3
        });
        let record = convert_to_record(&episode, ServerContext::default());
        assert_eq!(record.season_number, Some(1));
        assert_eq!(record.episode_number, Some(3));
    }

    #[test]
    fn webhook_payload_s1_new_movie() {
        let raw = json!({
            "ItemId": "m1", "Name": "The Matrix", "ItemType": "Movie", "Year": 1999,
            "Video_0_Height": 1080, "Video_0_Codec": "h264",
            "Audio_0_Codec": "ac3", "Audio_0_Channels": 6,
            "Provider_imdb": "tt0133093"
        });
        let record = convert_webhook_to_record(&raw).expect("required fields present");
        assert_eq!(record.id, "m1");
        assert_eq!(record.kind, MediaKind::Movie);
        assert_eq!(record.video.as_ref().unwrap().height, Some(1080));
        assert_eq!(record.audio.as_ref().unwrap().channels, Some(6));
        assert_eq!(record.provider_ids.imdb.as_deref(), Some("tt0133093"));
    }

    #[test]
    fn webhook_payload_missing_required_field_returns_none() {
        let raw = json!({"Name": "Broken", "ItemType": "Movie"});
        assert!(convert_webhook_to_record(&raw).is_none());
    }

    #[test]
    fn webhook_payload_parses_comma_separated_genres() {
        let raw = json!({"ItemId": "x", "Name": "X", "ItemType": "Movie", "Genres": "Action, Sci-Fi"});
        let record = convert_webhook_to_record(&raw).unwrap();
        assert_eq!(record.genres, vec!["Action".to_string(), "Sci-Fi".to_string()]);
    }
}
