//! Maildir-backed mail source.
//!
//! Reads every message file under `new/` and `cur/`. The flagged attribute
//! comes from the Maildir info suffix (`:2,FS` means flagged and seen).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailparse::{MailHeaderMap, ParsedMail};
use tracing::{debug, warn};

use super::fetch::{FetchError, MailSource};
use super::model::{MailItem, SourceId};

/// Subdirectories holding delivered messages.
const MESSAGE_DIRS: [&str; 2] = ["new", "cur"];

/// Separator between the unique name and the info flags.
const INFO_SEPARATOR: &str = ":2,";

/// A local Maildir folder.
#[derive(Debug, Clone)]
pub struct MaildirSource {
    id: SourceId,
    root: PathBuf,
}

impl MaildirSource {
    /// Creates a source for the Maildir at `root`, identified by its path.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let id = SourceId::new(format!("maildir:{}", root.display()));
        Self { id, root }
    }

    /// Overrides the source identity, for Maildirs that may move on disk.
    #[must_use]
    pub fn with_id(mut self, id: SourceId) -> Self {
        self.id = id;
        self
    }
}

#[async_trait]
impl MailSource for MaildirSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    async fn mail_by_date(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MailItem>, FetchError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || scan_maildir(&root, start, end))
            .await
            .map_err(|e| FetchError::Unavailable(format!("maildir scan task failed: {e}")))?
    }
}

/// Reads all messages in the Maildir sent within `[start, end)`.
fn scan_maildir(
    root: &Path,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<MailItem>, FetchError> {
    if !root.is_dir() {
        return Err(FetchError::Unavailable(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut paths = Vec::new();
    for dir in MESSAGE_DIRS {
        let entries = match fs::read_dir(root.join(dir)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                paths.push(entry.path());
            }
        }
    }

    let mut items = Vec::new();
    for path in paths {
        match read_message(&path) {
            Ok(item) if item.sent_at >= start && item.sent_at < end => items.push(item),
            Ok(_) => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable message"),
        }
    }

    // Arrival order; ties keep a stable order by identifier.
    items.sort_by(|a, b| {
        a.sent_at
            .cmp(&b.sent_at)
            .then_with(|| a.source_id.cmp(&b.source_id))
    });
    debug!(root = %root.display(), count = items.len(), "Scanned maildir");
    Ok(items)
}

/// Parses a single message file.
fn read_message(path: &Path) -> Result<MailItem, FetchError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FetchError::Malformed(format!("invalid file name: {}", path.display())))?;
    let (unique, flags) = split_file_name(file_name);

    let raw = fs::read(path)?;
    let parsed = mailparse::parse_mail(&raw).map_err(|e| FetchError::Malformed(e.to_string()))?;

    let source_id = parsed
        .headers
        .get_first_value("Message-ID")
        .map(|v| normalize_message_id(&v))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| unique.to_string());

    let topic = parsed.headers.get_first_value("Subject").unwrap_or_default();

    let sent_at = match parsed
        .headers
        .get_first_value("Date")
        .and_then(|d| mailparse::dateparse(&d).ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
    {
        Some(sent_at) => sent_at,
        None => DateTime::<Utc>::from(fs::metadata(path)?.modified()?),
    };

    let body = find_part(&parsed, "text/html")
        .or_else(|| find_part(&parsed, "text/plain").map(|text| plain_to_html(&text)))
        .unwrap_or_default();

    Ok(MailItem {
        source_id,
        topic,
        body,
        sent_at,
        flagged: flags.contains('F'),
    })
}

/// Splits a Maildir file name into its unique part and info flags.
fn split_file_name(name: &str) -> (&str, &str) {
    name.split_once(INFO_SEPARATOR).unwrap_or((name, ""))
}

/// Strips whitespace and angle brackets from a `Message-ID` value.
fn normalize_message_id(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim()
        .to_string()
}

/// Depth-first search for the first part of the given MIME type.
fn find_part(part: &ParsedMail<'_>, mimetype: &str) -> Option<String> {
    if part.ctype.mimetype.eq_ignore_ascii_case(mimetype) {
        return part.get_body().ok();
    }
    part.subparts.iter().find_map(|sub| find_part(sub, mimetype))
}

/// Renders plain text as escaped HTML paragraphs.
fn plain_to_html(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape_html(p).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_split_file_name() {
        assert_eq!(
            split_file_name("1700000000.M1P2.host:2,FS"),
            ("1700000000.M1P2.host", "FS")
        );
        assert_eq!(split_file_name("1700000000.M1P2.host"), ("1700000000.M1P2.host", ""));
    }

    #[test]
    fn test_normalize_message_id() {
        assert_eq!(normalize_message_id(" <abc@example.com> "), "abc@example.com");
        assert_eq!(normalize_message_id("<>"), "");
    }

    #[test]
    fn test_plain_to_html_escapes() {
        let html = plain_to_html("a < b\r\nnext\r\n\r\nsecond & last");
        assert_eq!(html, "<p>a &lt; b<br>next</p>\n<p>second &amp; last</p>");
    }

    #[test]
    fn test_read_message_prefers_html_part() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1700000000.M1.host:2,F");
        fs::write(
            &path,
            concat!(
                "Message-ID: <m1@example.com>\r\n",
                "Subject: Quarterly report\r\n",
                "Date: Fri, 01 Mar 2024 12:30:00 +0000\r\n",
                "MIME-Version: 1.0\r\n",
                "Content-Type: multipart/alternative; boundary=\"b1\"\r\n",
                "\r\n",
                "--b1\r\n",
                "Content-Type: text/plain\r\n",
                "\r\n",
                "plain body\r\n",
                "--b1\r\n",
                "Content-Type: text/html\r\n",
                "\r\n",
                "<p>html body</p>\r\n",
                "--b1--\r\n",
            ),
        )
        .unwrap();

        let item = read_message(&path).unwrap();

        assert_eq!(item.source_id, "m1@example.com");
        assert_eq!(item.topic, "Quarterly report");
        assert!(item.body.contains("<p>html body</p>"));
        assert!(item.flagged);
        assert_eq!(
            item.sent_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_read_message_falls_back_to_unique_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1700000001.M2.host:2,S");
        fs::write(
            &path,
            "Subject: No id\r\nDate: Fri, 01 Mar 2024 12:30:00 +0000\r\n\r\nhello\r\n",
        )
        .unwrap();

        let item = read_message(&path).unwrap();

        assert_eq!(item.source_id, "1700000001.M2.host");
        assert!(!item.flagged);
        assert_eq!(item.body, "<p>hello</p>");
    }

    #[tokio::test]
    async fn test_missing_maildir_is_unavailable() {
        let source = MaildirSource::new("/definitely/not/a/maildir");
        let now = Utc::now();

        let result = source.mail_by_date(now - chrono::Duration::days(1), now).await;

        assert!(matches!(result, Err(FetchError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_skips_files_it_cannot_read() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("cur")).unwrap();
        fs::write(
            dir.path().join("cur").join("1709285400.1.host:2,F"),
            "Message-ID: <good@example.com>\r\nDate: Fri, 01 Mar 2024 09:30:00 +0000\r\n\r\nhi\r\n",
        )
        .unwrap();
        // Not valid UTF-8, so the flags cannot be read from the name.
        fs::write(
            dir.path().join("cur").join(OsStr::from_bytes(b"1709285400.2.h\xff:2,F")),
            "Message-ID: <bad-name@example.com>\r\nDate: Fri, 01 Mar 2024 09:30:00 +0000\r\n\r\nhi\r\n",
        )
        .unwrap();
        fs::create_dir(dir.path().join("cur").join("not-a-message")).unwrap();

        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let items = scan_maildir(dir.path(), start, end).unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source_id, "good@example.com");
    }
}
