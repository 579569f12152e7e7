//! Directory listings for local `file:` URLs.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};
use url::Url;

/// One entry of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub url: Url,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// HTML listing of a local directory.
///
/// Reading never fails: an unreadable directory produces a page describing
/// the error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryListing {
    url: Url,
    path: PathBuf,
    entries: Vec<ListingEntry>,
    error: Option<String>,
    html: String,
}

impl DirectoryListing {
    /// Read `path` (the local path of `url`) and render it.
    pub fn read(url: &Url, path: &Path) -> Self {
        let (entries, error) = match read_entries(path) {
            Ok(entries) => (entries, None),
            Err(err) => {
                warn!("Failed to list {}: {}", path.display(), err);
                (Vec::new(), Some(err.to_string()))
            }
        };

        debug!("Listing {} ({} entries)", path.display(), entries.len());

        let html = render(url, path, &entries, error.as_deref());

        Self {
            url: url.clone(),
            path: path.to_path_buf(),
            entries,
            error,
            html,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries with directories first, then by case-insensitive name.
    pub fn entries(&self) -> &[ListingEntry] {
        &self.entries
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

fn read_entries(path: &Path) -> std::io::Result<Vec<ListingEntry>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let entry_path = entry.path();
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                debug!("Skipping {}: {}", entry_path.display(), err);
                continue;
            }
        };

        let url = match Url::from_file_path(&entry_path) {
            Ok(url) => url,
            Err(()) => continue,
        };

        entries.push(ListingEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            url,
            is_dir: metadata.is_dir(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            modified: metadata.modified().ok(),
        });
    }

    entries.sort_by(|a, b| {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    Ok(entries)
}

fn render(url: &Url, path: &Path, entries: &[ListingEntry], error: Option<&str>) -> String {
    let title = escape(&path.display().to_string());
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{}</title>\n</head>\n<body>\n<h1>{}</h1>\n",
        title, title
    );

    if let Some(error) = error {
        html.push_str(&format!("<p class=\"error\">{}</p>\n", escape(error)));
    }

    html.push_str("<table>\n");

    if let Some(parent) = path.parent() {
        if let Ok(parent_url) = Url::from_directory_path(parent) {
            html.push_str(&format!(
                "<tr><td><a href=\"{}\">..</a></td><td></td></tr>\n",
                escape(parent_url.as_str())
            ));
        }
    }

    for entry in entries {
        let name = if entry.is_dir {
            format!("{}/", entry.name)
        } else {
            entry.name.clone()
        };
        let size = if entry.is_dir {
            String::new()
        } else {
            format_size(entry.size)
        };
        html.push_str(&format!(
            "<tr><td><a href=\"{}\">{}</a></td><td>{}</td></tr>\n",
            escape(entry.url.as_str()),
            escape(&name),
            size
        ));
    }

    html.push_str("</table>\n");
    html.push_str(&format!("<!-- {} -->\n</body>\n</html>\n", escape(url.as_str())));
    html
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
