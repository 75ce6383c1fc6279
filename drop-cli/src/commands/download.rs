//! Download and decrypt a shared file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use zerok_drop_client::{
    ClientError, DownloadedFile, Downloader, HttpTransport, HttpTransportConfig, Transport,
};
use zerok_drop_core::link::{self, ParsedLink};
use zerok_drop_types::ShareId;

/// Longest filename written to disk.
const MAX_FILENAME_LEN: usize = 200;

/// Options for one download.
#[derive(Default)]
pub struct DownloadArgs {
    /// Share link, with or without the key fragment.
    pub link: String,
    /// Key supplied separately from the link.
    pub key: Option<String>,
    /// Access password.
    pub password: Option<String>,
    /// Directory to write the file into.
    pub output_dir: PathBuf,
    /// Replace an existing file.
    pub force: bool,
}

impl std::fmt::Debug for DownloadArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadArgs")
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("output_dir", &self.output_dir)
            .field("force", &self.force)
            .finish_non_exhaustive()
    }
}

/// Asks the user for a secret the link did not provide.
pub trait Prompt {
    /// Read a secret, or `None` when no one can be asked.
    fn secret(&self, label: &str) -> Result<Option<String>>;
}

/// Prompts on the terminal without echo.
#[derive(Debug)]
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn secret(&self, label: &str) -> Result<Option<String>> {
        use std::io::IsTerminal;
        if !std::io::stdin().is_terminal() {
            return Ok(None);
        }
        let value = rpassword::prompt_password(format!("{}: ", label))
            .context("Failed to read from terminal")?;
        Ok(Some(value).filter(|v| !v.is_empty()))
    }
}

/// Run the download command.
pub async fn run(args: DownloadArgs) -> Result<()> {
    let parsed = link::parse(&args.link).map_err(ClientError::from)?;
    let transport = HttpTransport::new(HttpTransportConfig::new(parsed.origin.clone()))
        .context("Failed to create HTTP client")?;
    let downloader = Downloader::new(transport);

    println!("Downloading {} from {}", parsed.share_id, parsed.origin);
    let file = fetch(&downloader, &parsed, &args, &TerminalPrompt).await?;
    let path = save(&file, &parsed.share_id, &args.output_dir, args.force).await?;

    println!("Download successful!");
    println!();
    println!("  Saved:  {}", path.display());
    println!("  Size:   {} bytes", file.bytes.len());
    println!("  Type:   {}", file.mime_type);
    if file.burned {
        println!("  This was the last download; the file is gone from the relay.");
    } else if let Some(remaining) = file.downloads_remaining {
        println!("  Downloads remaining: {}", remaining);
    }
    Ok(())
}

/// Fetch and decrypt, asking for the key or password when they are missing.
pub async fn fetch<T: Transport>(
    downloader: &Downloader<T>,
    parsed: &ParsedLink,
    args: &DownloadArgs,
    prompt: &dyn Prompt,
) -> Result<DownloadedFile> {
    let key = match (&args.key, &parsed.encoded_key) {
        (Some(key), _) => key.clone(),
        (None, Some(key)) => key.clone(),
        (None, None) => prompt
            .secret("Encryption key")?
            .ok_or(ClientError::KeyMissing)?,
    };

    let password = args.password.as_deref();
    match downloader
        .download_with_key(&parsed.share_id, &key, password)
        .await
    {
        Ok(file) => Ok(file),
        Err(ClientError::Access(reason)) if password.is_none() => {
            let Some(password) = prompt.secret("Password")? else {
                return Err(ClientError::Access(reason).into());
            };
            Ok(downloader
                .download_with_key(&parsed.share_id, &key, Some(&password))
                .await?)
        }
        Err(e) => Err(e.into()),
    }
}

/// Write the plaintext under a sanitized name inside `output_dir`.
pub async fn save(
    file: &DownloadedFile,
    share_id: &ShareId,
    output_dir: &Path,
    force: bool,
) -> Result<PathBuf> {
    let name = sanitize_filename(&file.filename).unwrap_or_else(|| share_id.to_string());
    let path = output_dir.join(name);
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to replace it)", path.display());
    }
    tokio::fs::write(&path, &file.bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Reduce an uploader-chosen name to a safe single path component.
///
/// Returns `None` when nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .take(MAX_FILENAME_LEN)
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use zerok_drop_client::{MockTransport, PlainFile, ProgressReporter, UploadOptions, Uploader};

    const ORIGIN: &str = "https://drop.example";

    struct NoPrompt;

    impl Prompt for NoPrompt {
        fn secret(&self, _label: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    struct Answer(&'static str);

    impl Prompt for Answer {
        fn secret(&self, _label: &str) -> Result<Option<String>> {
            Ok(Some(self.0.to_string()))
        }
    }

    async fn share(mock: &MockTransport, options: UploadOptions) -> String {
        let uploader = Uploader::new(mock.clone(), ORIGIN);
        let file = PlainFile::new("../../etc/report.txt", b"top secret".to_vec());
        uploader
            .upload(&file, &options, &ProgressReporter::disabled())
            .await
            .unwrap()
            .to_string()
    }

    fn args(link: &str) -> DownloadArgs {
        DownloadArgs {
            link: link.to_string(),
            ..DownloadArgs::default()
        }
    }

    #[tokio::test]
    async fn fetch_and_save_full_link() {
        let mock = MockTransport::new();
        let url = share(&mock, UploadOptions::new()).await;
        let parsed = link::parse(&url).unwrap();
        let downloader = Downloader::new(mock);

        let file = fetch(&downloader, &parsed, &args(&url), &NoPrompt)
            .await
            .unwrap();
        assert_eq!(file.bytes, b"top secret");

        let dir = tempdir().unwrap();
        let path = save(&file, &parsed.share_id, dir.path(), false).await.unwrap();
        assert_eq!(path, dir.path().join("report.txt"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"top secret");

        // A second save does not overwrite without force
        assert!(save(&file, &parsed.share_id, dir.path(), false).await.is_err());
        assert!(save(&file, &parsed.share_id, dir.path(), true).await.is_ok());
    }

    #[tokio::test]
    async fn missing_key_without_prompt_makes_no_request() {
        let mock = MockTransport::new();
        let url = share(&mock, UploadOptions::new()).await;
        let without_key = url.split('#').next().unwrap().to_string();
        let parsed = link::parse(&without_key).unwrap();
        let downloader = Downloader::new(mock.clone());

        let err = fetch(&downloader, &parsed, &args(&without_key), &NoPrompt)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::KeyMissing)
        ));
        assert_eq!(mock.download_requests(), 0);
    }

    #[tokio::test]
    async fn separately_supplied_key_is_used() {
        let mock = MockTransport::new();
        let url = share(&mock, UploadOptions::new()).await;
        let (location, key) = url.split_once('#').unwrap();
        let parsed = link::parse(location).unwrap();
        let downloader = Downloader::new(mock);

        let mut download = args(location);
        download.key = Some(key.to_string());
        let file = fetch(&downloader, &parsed, &download, &NoPrompt)
            .await
            .unwrap();
        assert_eq!(file.bytes, b"top secret");
    }

    #[tokio::test]
    async fn password_is_prompted_after_access_denied() {
        let mock = MockTransport::new();
        let url = share(&mock, UploadOptions::new().with_password("letmein")).await;
        let parsed = link::parse(&url).unwrap();
        let downloader = Downloader::new(mock);

        let err = fetch(&downloader, &parsed, &args(&url), &NoPrompt)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ClientError>(),
            Some(ClientError::Access(_))
        ));

        let file = fetch(&downloader, &parsed, &args(&url), &Answer("letmein"))
            .await
            .unwrap();
        assert_eq!(file.bytes, b"top secret");
    }

    #[test]
    fn sanitize_strips_paths_and_specials() {
        assert_eq!(sanitize_filename("report.pdf").as_deref(), Some("report.pdf"));
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename("C:\\temp\\a.txt").as_deref(), Some("a.txt"));
        assert_eq!(sanitize_filename(".bashrc").as_deref(), Some("bashrc"));
        assert_eq!(sanitize_filename("a<b>.txt").as_deref(), Some("a_b_.txt"));
        assert_eq!(sanitize_filename("bad\u{0}name").as_deref(), Some("badname"));
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename("dir/"), None);
    }

    #[test]
    fn debug_redacts_secrets() {
        let args = DownloadArgs {
            key: Some("the-key".into()),
            password: Some("the-password".into()),
            ..DownloadArgs::default()
        };
        let debug = format!("{:?}", args);
        assert!(!debug.contains("the-key"));
        assert!(!debug.contains("the-password"));
    }
}
