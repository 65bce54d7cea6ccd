//! Shared key generation for storage backends.

use chrono::{DateTime, Datelike, Utc};
use uuid::Uuid;

/// Generate a storage key `{yyyy}/{mm}/{id}.{extension}`.
pub fn generate_storage_key(now: DateTime<Utc>, id: Uuid, extension: &str) -> String {
    format!(
        "{:04}/{:02}/{}.{}",
        now.year(),
        now.month(),
        id,
        extension.trim_start_matches('.')
    )
}

/// Extension used for a stored file, from its name or else its mime type.
pub fn extension_for(file_name: &str, mime_type: &str) -> String {
    if let Some(ext) = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
    {
        return ext.to_lowercase();
    }

    mime_type
        .split('/')
        .nth(1)
        .map(|subtype| match subtype {
            "jpeg" => "jpg".to_string(),
            "quicktime" => "mov".to_string(),
            "mpeg" => "mp3".to_string(),
            other => other
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect(),
        })
        .filter(|ext: &String| !ext.is_empty())
        .unwrap_or_else(|| "bin".to_string())
}
