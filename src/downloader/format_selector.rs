// FormatSelector - picks the rendition a strategy downloads
//
// - Audio: best audio-only variant, AAC preferred (mp4 container, like the
//   m4a files most players accept), then highest bitrate
// - Video: highest resolution, H.264 preferred among equal heights

use super::errors::DownloadError;
use super::models::{RemoteItem, StreamVariant, VariantKind};

/// Format selector with quality ranking
pub struct FormatSelector;

impl FormatSelector {
    /// Select the variant of `kind` for `item`
    pub fn select(item: &RemoteItem, kind: VariantKind) -> Result<&StreamVariant, DownloadError> {
        let candidates: Vec<&StreamVariant> =
            item.variants.iter().filter(|v| v.kind == kind).collect();

        let chosen = match kind {
            VariantKind::Audio => Self::find_best_audio(&candidates),
            VariantKind::Video => Self::find_best_video(&candidates),
        };

        chosen.ok_or_else(|| DownloadError::NoStream {
            title: item.title.clone(),
            kind,
        })
    }

    /// Find best audio format (prefer AAC for compatibility)
    fn find_best_audio<'a>(formats: &[&'a StreamVariant]) -> Option<&'a StreamVariant> {
        let aac = formats
            .iter()
            .filter(|f| Self::is_aac(f))
            .max_by_key(|f| f.quality);

        if let Some(a) = aac {
            return Some(a);
        }

        // Fallback to highest bitrate audio
        formats.iter().max_by_key(|f| f.quality).copied()
    }

    /// Find best video format (highest resolution, H.264 on ties)
    fn find_best_video<'a>(formats: &[&'a StreamVariant]) -> Option<&'a StreamVariant> {
        formats
            .iter()
            .max_by_key(|f| (f.quality, Self::is_h264(f), f.filesize.unwrap_or(0)))
            .copied()
    }

    fn is_h264(format: &StreamVariant) -> bool {
        format
            .codec
            .as_ref()
            .is_some_and(|c| c.starts_with("avc1"))
    }

    fn is_aac(format: &StreamVariant) -> bool {
        format
            .codec
            .as_ref()
            .map_or(format.ext == "m4a", |c| c.starts_with("mp4a"))
    }

    /// Format file size for display
    pub fn format_size(bytes: Option<u64>) -> Option<String> {
        bytes.map(|b| {
            let mb = b as f64 / 1_048_576.0;
            if mb >= 1024.0 {
                format!("{:.1} GB", mb / 1024.0)
            } else {
                format!("{:.0} MB", mb)
            }
        })
    }
}

/// Shorthand for [`FormatSelector::select`]
pub fn select_variant(item: &RemoteItem, kind: VariantKind) -> Result<&StreamVariant, DownloadError> {
    FormatSelector::select(item, kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::testing::{audio_variant, item, video_only_item, video_variant};

    fn make_video_format(height: u32, codec: &str, size: u64) -> StreamVariant {
        StreamVariant {
            codec: Some(codec.to_string()),
            filesize: Some(size),
            ..video_variant(height)
        }
    }

    #[test]
    fn test_video_picks_highest_resolution() {
        let it = item("a", "A");
        let chosen = select_variant(&it, VariantKind::Video).unwrap();
        assert_eq!(chosen.quality, 720);
    }

    #[test]
    fn test_audio_picks_audio_only() {
        let it = item("a", "A");
        let chosen = select_variant(&it, VariantKind::Audio).unwrap();
        assert_eq!(chosen.kind, VariantKind::Audio);
        assert_eq!(chosen.ext, "m4a");
    }

    #[test]
    fn test_no_audio_variant_fails() {
        let it = video_only_item("a", "Clip");
        let err = select_variant(&it, VariantKind::Audio).unwrap_err();
        assert_eq!(
            err,
            DownloadError::NoStream {
                title: "Clip".to_string(),
                kind: VariantKind::Audio
            }
        );
    }

    #[test]
    fn test_no_video_variant_fails() {
        let mut it = item("a", "Podcast");
        it.variants = vec![audio_variant(64)];
        assert!(matches!(
            select_variant(&it, VariantKind::Video),
            Err(DownloadError::NoStream { .. })
        ));
    }

    #[test]
    fn test_h264_preference_on_equal_height() {
        let mut it = item("a", "A");
        it.variants = vec![
            make_video_format(1080, "vp9", 150_000_000),
            make_video_format(1080, "avc1.640028", 100_000_000),
        ];
        let chosen = select_variant(&it, VariantKind::Video).unwrap();
        assert_eq!(chosen.codec.as_deref(), Some("avc1.640028"));
    }

    #[test]
    fn test_aac_preferred_over_higher_bitrate_opus() {
        let mut it = item("a", "A");
        let opus = StreamVariant {
            codec: Some("opus".to_string()),
            ext: "webm".to_string(),
            ..audio_variant(160)
        };
        it.variants = vec![opus, audio_variant(128)];
        let chosen = select_variant(&it, VariantKind::Audio).unwrap();
        assert_eq!(chosen.ext, "m4a");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FormatSelector::format_size(Some(5 * 1_048_576)), Some("5 MB".to_string()));
        assert_eq!(FormatSelector::format_size(None), None);
    }
}
