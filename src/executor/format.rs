//! yt-dlp argument construction
//!
//! Format selectors are `/`-separated fallback tiers; yt-dlp takes the first
//! tier that matches an available stream.

use std::path::Path;

use super::job::{Job, Quality};

/// Settings that shape every invocation regardless of the job
#[derive(Debug, Clone)]
pub struct ToolSettings {
    /// Passed as `--cookies` when present on disk
    pub cookies: Option<std::path::PathBuf>,
    pub player_client: String,
}

/// Builds the video format selector for a quality.
///
/// `Max` never caps the resolution; a height bound caps every tier.
pub fn video_format(quality: Quality) -> String {
    match quality {
        Quality::Max => "bv*[fps>30]+ba/bv*+ba/best".to_string(),
        Quality::Height(h) => format!(
            "bv*[height<={h}][fps>30]+ba/bv*[height<={h}]+ba/best[height<={h}]"
        ),
    }
}

/// Full argument list for one job writing to `output`
pub fn build_args(job: &Job, settings: &ToolSettings, output: &Path) -> Vec<String> {
    let mut args = Vec::with_capacity(16);

    if let Some(cookies) = &settings.cookies {
        args.push("--cookies".to_string());
        args.push(cookies.display().to_string());
    }
    args.push("--no-playlist".to_string());
    args.push("--extractor-args".to_string());
    args.push(format!("youtube:player_client={}", settings.player_client));

    match job {
        Job::Video { quality, .. } => {
            args.push("--merge-output-format".to_string());
            args.push("mp4".to_string());
            args.push("-f".to_string());
            args.push(video_format(*quality));
        }
        Job::Audio { .. } => {
            args.push("-x".to_string());
            args.push("--audio-format".to_string());
            args.push("mp3".to_string());
            args.push("--audio-quality".to_string());
            args.push("0".to_string());
        }
    }

    args.push("-o".to_string());
    args.push(output.display().to_string());
    // Nothing after `--` is read as an option
    args.push("--".to_string());
    args.push(job.url().to_string());

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn settings() -> ToolSettings {
        ToolSettings {
            cookies: Some(PathBuf::from("/srv/cookies.txt")),
            player_client: "android".to_string(),
        }
    }

    #[test]
    fn test_max_quality_has_no_height_cap() {
        let format = video_format(Quality::Max);
        assert!(format.starts_with("bv*[fps>30]"));
        assert!(!format.contains("height"));
    }

    #[test]
    fn test_height_caps_every_tier() {
        for height in [144, 360, 720, 1080, 2160] {
            let format = video_format(Quality::Height(height));
            let cap = format!("[height<={height}]");
            let tiers: Vec<&str> = format.split('/').collect();

            assert_eq!(tiers.len(), 3);
            assert!(tiers.iter().all(|tier| tier.contains(&cap)), "{format}");
            assert!(tiers[0].contains("[fps>30]"));
        }
    }

    #[test]
    fn test_video_args() {
        let job = Job::Video {
            url: "https://example/video1".to_string(),
            quality: Quality::Max,
        };
        let args = build_args(&job, &settings(), Path::new("/tmp/video_1.mp4"));

        assert_eq!(
            args,
            vec![
                "--cookies",
                "/srv/cookies.txt",
                "--no-playlist",
                "--extractor-args",
                "youtube:player_client=android",
                "--merge-output-format",
                "mp4",
                "-f",
                "bv*[fps>30]+ba/bv*+ba/best",
                "-o",
                "/tmp/video_1.mp4",
                "--",
                "https://example/video1",
            ]
        );
    }

    #[test]
    fn test_audio_args_skip_format_and_missing_cookies() {
        let job = Job::Audio {
            url: "https://example/video1".to_string(),
        };
        let mut settings = settings();
        settings.cookies = None;

        let args = build_args(&job, &settings, Path::new("/tmp/audio_1.mp3"));

        assert!(!args.contains(&"--cookies".to_string()));
        assert!(!args.contains(&"-f".to_string()));
        assert!(args.windows(2).any(|w| w == ["--audio-format", "mp3"]));
        assert!(args.windows(2).any(|w| w == ["--audio-quality", "0"]));
        assert_eq!(args.last().map(String::as_str), Some("https://example/video1"));
    }
}
