use crate::constants::{ACCEPTED_FILES, AUDIO_EXTENSIONS, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};
use crate::state::{Job, MediaKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Unsupported file type: {name}")]
    UnsupportedInputFormat { name: String },
    #[error("{extension} is not a valid target for {name}")]
    UnsupportedTarget { name: String, extension: String },
}

/// One tab of the "Convert to" menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetGroup {
    pub label: &'static str,
    pub kind: MediaKind,
    pub extensions: &'static [&'static str],
}

const IMAGE_GROUP: TargetGroup = TargetGroup {
    label: "Image",
    kind: MediaKind::Image,
    extensions: IMAGE_EXTENSIONS,
};

const VIDEO_GROUP: TargetGroup = TargetGroup {
    label: "Video",
    kind: MediaKind::Video,
    extensions: VIDEO_EXTENSIONS,
};

const AUDIO_GROUP: TargetGroup = TargetGroup {
    label: "Audio",
    kind: MediaKind::Audio,
    extensions: AUDIO_EXTENSIONS,
};

#[derive(Clone)]
pub struct ValidationService;

impl ValidationService {
    pub fn new() -> Self {
        Self
    }

    /// Permitted extensions for a MIME category, as used by the intake filter.
    pub fn accepted_extensions(&self, kind: MediaKind) -> &'static [&'static str] {
        let wildcard = format!("{}/*", kind.mime_prefix());
        ACCEPTED_FILES
            .iter()
            .find(|(pattern, _)| *pattern == wildcard)
            .map(|(_, extensions)| *extensions)
            .unwrap_or(&[])
    }

    /// Category guessed from the extension alone.
    pub fn kind_for_extension(&self, extension: &str) -> Option<MediaKind> {
        [MediaKind::Image, MediaKind::Video, MediaKind::Audio]
            .into_iter()
            .find(|kind| self.accepted_extensions(*kind).contains(&extension))
    }

    /// The intake filter: the MIME category must be one of the three
    /// wildcards and the extension must be listed under it.
    pub fn validate_input(
        &self,
        name: &str,
        mime: &str,
        extension: &str,
    ) -> Result<MediaKind, ValidationError> {
        let unsupported = || ValidationError::UnsupportedInputFormat {
            name: name.to_string(),
        };

        let kind = MediaKind::from_mime(mime).ok_or_else(unsupported)?;
        if self.accepted_extensions(kind).contains(&extension) {
            Ok(kind)
        } else {
            Err(unsupported())
        }
    }

    /// Video sources may also be converted to audio.
    pub fn target_groups(&self, kind: MediaKind) -> &'static [TargetGroup] {
        match kind {
            MediaKind::Image => &[IMAGE_GROUP],
            MediaKind::Video => &[VIDEO_GROUP, AUDIO_GROUP],
            MediaKind::Audio => &[AUDIO_GROUP],
        }
    }

    pub fn validate_target(&self, job: &Job, extension: &str) -> Result<(), ValidationError> {
        let allowed = job.kind().map_or(false, |kind| {
            self.target_groups(kind)
                .iter()
                .any(|group| group.extensions.contains(&extension))
        });

        if allowed {
            Ok(())
        } else {
            Err(ValidationError::UnsupportedTarget {
                name: job.file_name.clone(),
                extension: extension.to_string(),
            })
        }
    }

    pub fn sanitize_filename(&self, filename: &str) -> String {
        let mut sanitized: String = filename
            .chars()
            .map(|c| match c {
                '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\0' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();

        sanitized = sanitized.trim().trim_matches('.').to_string();

        if sanitized.is_empty() {
            sanitized = "unnamed".to_string();
        }

        if sanitized.len() > 255 {
            let mut cut = 252;
            while !sanitized.is_char_boundary(cut) {
                cut -= 1;
            }
            sanitized.truncate(cut);
            sanitized.push_str("...");
        }

        sanitized
    }
}

impl Default for ValidationService {
    fn default() -> Self {
        Self::new()
    }
}
