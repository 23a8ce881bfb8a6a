use shared::utils::{format_kb, is_image_file, looks_like_url};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    File,
    Image,
    Url,
}

/// File, image or URL waiting to be sent with the next message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    /// Local path for files and images, the address for URLs.
    pub payload: String,
}

impl Attachment {
    /// Classify a user-supplied argument: http(s) addresses are URLs, known
    /// image extensions are images, anything else is a file.
    pub fn from_arg(raw: &str) -> Self {
        let raw = raw.trim();
        let kind = if looks_like_url(raw) {
            AttachmentKind::Url
        } else if is_image_file(Path::new(raw)) {
            AttachmentKind::Image
        } else {
            AttachmentKind::File
        };
        Self {
            kind,
            payload: raw.to_string(),
        }
    }

    pub fn is_upload(&self) -> bool {
        matches!(self.kind, AttachmentKind::File | AttachmentKind::Image)
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.is_upload().then(|| PathBuf::from(&self.payload))
    }

    pub fn display_name(&self) -> String {
        match self.kind {
            AttachmentKind::Url => self.payload.clone(),
            _ => Path::new(&self.payload)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.payload.clone()),
        }
    }

    /// Line prefixed to the visible user message.
    pub fn banner(&self, size_bytes: Option<u64>) -> String {
        match self.kind {
            AttachmentKind::Url => format!("🔗 **Enlace Referencia:** {}", self.payload),
            AttachmentKind::File | AttachmentKind::Image => {
                let icon = if self.kind == AttachmentKind::Image { "🖼️" } else { "📎" };
                match size_bytes {
                    Some(size) => format!(
                        "{} **Archivo Adjunto:** {} ({} KB)",
                        icon,
                        self.display_name(),
                        format_kb(size)
                    ),
                    None => format!("{} **Archivo Adjunto:** {}", icon, self.display_name()),
                }
            }
        }
    }
}
