use std::path::Path;

pub fn is_image_file(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "webp" | "gif")
}

pub fn looks_like_url(raw: &str) -> bool {
    let raw = raw.trim();
    raw.starts_with("http://") || raw.starts_with("https://")
}

/// Size in kilobytes with one decimal, as shown in attachment banners.
pub fn format_kb(bytes: u64) -> String {
    format!("{:.1}", bytes as f64 / 1024.0)
}
