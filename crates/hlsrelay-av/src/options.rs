//! HLS segmenting and codec options passed to the engine.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::Path;

/// Options handed verbatim to ffmpeg when segmenting an RTSP source into HLS.
///
/// Deserializes from the `[transcoder]` config section; every field has a
/// default so a partial section is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentOptions {
    /// RTSP lower transport (default: tcp).
    pub rtsp_transport: String,
    /// Target segment duration in seconds (default: 2).
    pub segment_duration_secs: u32,
    /// Number of segments kept in the playlist (default: 5).
    pub playlist_size: u32,
    /// Delete segments that fall out of the playlist window (default: true).
    pub delete_segments: bool,
    /// Video encoder (default: libx264).
    pub video_codec: String,
    /// Encoder preset (default: veryfast).
    pub video_preset: Option<String>,
    /// Encoder tuning (default: zerolatency).
    pub video_tune: Option<String>,
    /// Audio encoder (default: aac).
    pub audio_codec: String,
    /// ffmpeg `-loglevel` (default: info).
    pub log_level: String,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            rtsp_transport: "tcp".to_string(),
            segment_duration_secs: 2,
            playlist_size: 5,
            delete_segments: true,
            video_codec: "libx264".to_string(),
            video_preset: Some("veryfast".to_string()),
            video_tune: Some("zerolatency".to_string()),
            audio_codec: "aac".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl SegmentOptions {
    /// Check that the options describe a usable segmenter.
    pub fn validate(&self) -> Result<()> {
        if self.segment_duration_secs == 0 {
            return Err(Error::InvalidInput(
                "segment duration must be at least 1 second".to_string(),
            ));
        }
        if self.playlist_size == 0 {
            return Err(Error::InvalidInput(
                "playlist size must be at least 1".to_string(),
            ));
        }
        if self.rtsp_transport.trim().is_empty() {
            return Err(Error::InvalidInput("rtsp transport cannot be empty".to_string()));
        }
        if self.video_codec.trim().is_empty() || self.audio_codec.trim().is_empty() {
            return Err(Error::InvalidInput("codecs cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Build the ffmpeg argument list for one source and manifest.
    ///
    /// The manifest path is passed through unchanged, even when it is not
    /// valid UTF-8.
    pub fn to_args(&self, source_url: &str, manifest_path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self
            .flags(source_url)
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(manifest_path.as_os_str().to_owned());
        args
    }

    fn flags(&self, source_url: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-nostats".into(),
            "-loglevel".into(),
            self.log_level.clone(),
            // Input
            "-rtsp_transport".into(),
            self.rtsp_transport.clone(),
            "-i".into(),
            source_url.to_string(),
            // Video
            "-c:v".into(),
            self.video_codec.clone(),
        ];

        if let Some(ref preset) = self.video_preset {
            args.extend(["-preset".into(), preset.clone()]);
        }
        if let Some(ref tune) = self.video_tune {
            args.extend(["-tune".into(), tune.clone()]);
        }

        // Audio
        args.extend(["-c:a".into(), self.audio_codec.clone()]);

        // HLS muxer
        args.extend([
            "-f".into(),
            "hls".into(),
            "-hls_time".into(),
            self.segment_duration_secs.to_string(),
            "-hls_list_size".into(),
            self.playlist_size.to_string(),
        ]);
        if self.delete_segments {
            args.extend(["-hls_flags".into(), "delete_segments".into()]);
        }

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_after<'a>(args: &'a [OsString], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .and_then(|a| a.to_str())
    }

    #[test]
    fn test_default_options() {
        let opts = SegmentOptions::default();
        assert_eq!(opts.rtsp_transport, "tcp");
        assert_eq!(opts.segment_duration_secs, 2);
        assert_eq!(opts.playlist_size, 5);
        assert!(opts.delete_segments);
        assert_eq!(opts.video_codec, "libx264");
        assert_eq!(opts.audio_codec, "aac");
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_args_carry_segment_options() {
        let args = SegmentOptions::default()
            .to_args("rtsp://cam/live", Path::new("/srv/streams/abc/index.m3u8"));

        assert_eq!(value_after(&args, "-rtsp_transport"), Some("tcp"));
        assert_eq!(value_after(&args, "-i"), Some("rtsp://cam/live"));
        assert_eq!(value_after(&args, "-c:v"), Some("libx264"));
        assert_eq!(value_after(&args, "-preset"), Some("veryfast"));
        assert_eq!(value_after(&args, "-tune"), Some("zerolatency"));
        assert_eq!(value_after(&args, "-c:a"), Some("aac"));
        assert_eq!(value_after(&args, "-f"), Some("hls"));
        assert_eq!(value_after(&args, "-hls_time"), Some("2"));
        assert_eq!(value_after(&args, "-hls_list_size"), Some("5"));
        assert_eq!(value_after(&args, "-hls_flags"), Some("delete_segments"));
        assert_eq!(
            args.last().and_then(|a| a.to_str()),
            Some("/srv/streams/abc/index.m3u8")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_manifest_path_kept_intact() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let root = OsStr::from_bytes(b"/srv/str\xffeams");
        let manifest = Path::new(root).join("abc").join("index.m3u8");
        let args = SegmentOptions::default().to_args("rtsp://cam/live", &manifest);

        assert_eq!(args.last().map(OsString::as_os_str), Some(manifest.as_os_str()));
    }

    #[test]
    fn test_transport_precedes_input() {
        let args = SegmentOptions::default().to_args("rtsp://cam/live", Path::new("out.m3u8"));
        let transport = args.iter().position(|a| a == "-rtsp_transport").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(transport < input);
    }

    #[test]
    fn test_optional_flags_omitted() {
        let opts = SegmentOptions {
            video_preset: None,
            video_tune: None,
            delete_segments: false,
            ..SegmentOptions::default()
        };
        let args = opts.to_args("rtsp://cam/live", Path::new("out.m3u8"));
        assert!(!args.iter().any(|a| a == "-preset"));
        assert!(!args.iter().any(|a| a == "-tune"));
        assert!(!args.iter().any(|a| a == "-hls_flags"));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let opts = SegmentOptions {
            segment_duration_secs: 0,
            ..SegmentOptions::default()
        };
        assert!(opts.validate().is_err());

        let opts = SegmentOptions {
            playlist_size: 0,
            ..SegmentOptions::default()
        };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let opts: SegmentOptions = serde_json::from_str(r#"{"playlist_size": 8}"#).unwrap();
        assert_eq!(opts.playlist_size, 8);
        assert_eq!(opts.segment_duration_secs, 2);
    }
}
