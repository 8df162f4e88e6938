// App Constants
pub const APP_NAME: &str = "Batch Convert";
pub const APP_ID: &str = "batch-convert";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// Accepted extensions per MIME category
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "ico", "tif", "tiff", "svg", "raw", "tga",
];

pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mp4v", "3gp", "3g2", "avi", "mov", "wmv", "mkv", "flv", "ogv", "webm", "h264",
    "264", "hevc", "265",
];

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "aac", "wma", "flac", "m4a"];

// MIME wildcard -> permitted extensions
pub const ACCEPTED_FILES: &[(&str, &[&str])] = &[
    ("image/*", IMAGE_EXTENSIONS),
    ("audio/*", AUDIO_EXTENSIONS),
    ("video/*", VIDEO_EXTENSIONS),
];

// Engine
pub const DEFAULT_FFMPEG_BINARY: &str = "ffmpeg";
pub const MOBILE_PROFILE_TARGET: &str = "3gp";
pub const MOBILE_PROFILE_ARGS: &[&str] = &[
    "-r", "20", "-s", "352x288", "-vb", "400k", "-acodec", "aac", "-strict", "experimental",
    "-ac", "1", "-ar", "8000", "-ab", "24k",
];

// Resizer
pub const RESIZE_MIN_DIMENSION: u32 = 1;
pub const RESIZE_MAX_DIMENSION: u32 = 1 << 16;
pub const DEFAULT_JPEG_QUALITY: f32 = 1.0;
pub const REDUCED_JPEG_QUALITY: f32 = 0.5;

// UI
pub const MIN_WINDOW_WIDTH: f32 = 720.0;
pub const MIN_WINDOW_HEIGHT: f32 = 480.0;
pub const MAX_NOTIFICATIONS: usize = 5;
pub const NOTIFICATION_TTL_SECONDS: u64 = 6;
pub const DISPLAY_NAME_MAX_CHARS: usize = 25;
