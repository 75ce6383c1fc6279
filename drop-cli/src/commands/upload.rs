//! Encrypt a file and upload it to the relay.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use zerok_drop_client::upload::DEFAULT_MIME_TYPE;
use zerok_drop_client::{
    ClientError, HttpTransport, HttpTransportConfig, PlainFile, ProgressReporter, ShareLink,
    Transport, UploadOptions, Uploader,
};

use crate::config::CliConfig;

/// Attempts before a network failure is reported.
const SUBMIT_ATTEMPTS: u32 = 3;

/// Options for one upload.
#[derive(Default)]
pub struct UploadArgs {
    /// File to send.
    pub file: PathBuf,
    /// Expiration in minutes; the configured default when absent.
    pub expires: Option<u32>,
    /// Access password.
    pub password: Option<String>,
    /// Maximum number of downloads.
    pub download_limit: Option<u32>,
    /// Burn after the first download.
    pub one_time: bool,
    /// MIME type; guessed from the extension when absent.
    pub mime_type: Option<String>,
}

impl std::fmt::Debug for UploadArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadArgs")
            .field("file", &self.file)
            .field("expires", &self.expires)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("download_limit", &self.download_limit)
            .field("one_time", &self.one_time)
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Run the upload command.
pub async fn run(data_dir: &Path, args: UploadArgs) -> Result<()> {
    let config = CliConfig::load_or_default(data_dir).await?;
    let transport = HttpTransport::new(HttpTransportConfig::new(config.relay_url.clone()))
        .context("Failed to create HTTP client")?;
    let uploader = Uploader::new(transport, config.relay_url.clone());

    println!("Uploading {} to {}", args.file.display(), config.relay_url);
    let link = upload_file(&uploader, &args, config.default_expiration_minutes).await?;

    println!("Upload successful!");
    println!();
    println!("  {}", link);
    println!();
    println!("Anyone with this link can decrypt the file. The part after '#' never reaches the relay.");
    if args.one_time {
        println!("The link works once.");
    }
    Ok(())
}

/// Read, encrypt and submit a file, retrying network failures with the
/// same ciphertext.
pub async fn upload_file<T: Transport>(
    uploader: &Uploader<T>,
    args: &UploadArgs,
    default_expiration_minutes: u32,
) -> Result<ShareLink> {
    let path = &args.file;
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Cannot read {}", path.display()))?;
    if !metadata.is_file() {
        anyhow::bail!("{} is not a regular file", path.display());
    }
    // Refuse before reading the file into memory
    if metadata.len() > uploader.max_size() {
        return Err(ClientError::Oversize {
            size: metadata.len(),
            max: uploader.max_size(),
        }
        .into());
    }

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("File name is not valid UTF-8")?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mime_type = args
        .mime_type
        .clone()
        .unwrap_or_else(|| guess_mime_type(path).to_string());
    let file = PlainFile::new(name, bytes).with_mime_type(mime_type);

    let mut options = UploadOptions::new()
        .with_expiration_minutes(args.expires.unwrap_or(default_expiration_minutes))
        .with_one_time(args.one_time);
    if let Some(password) = &args.password {
        options = options.with_password(password.clone());
    }
    if let Some(limit) = args.download_limit {
        options = options.with_download_limit(limit);
    }

    let (progress, mut updates) = ProgressReporter::channel();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let percent = updates.borrow().percent();
            eprint!("\r  {:>3}%", percent);
        }
    });

    let result = submit_with_retry(uploader, &file, &options, &progress).await;
    printer.abort();
    eprintln!();
    result
}

async fn submit_with_retry<T: Transport>(
    uploader: &Uploader<T>,
    file: &PlainFile,
    options: &UploadOptions,
    progress: &ProgressReporter,
) -> Result<ShareLink> {
    let mut prepared = uploader.prepare(file, options)?;
    let mut attempt = 1;
    loop {
        match uploader.submit(prepared, progress).await {
            Ok(link) => return Ok(link),
            Err(e) if e.is_retriable() && attempt < SUBMIT_ATTEMPTS => {
                tracing::warn!("Upload attempt {} failed: {}", attempt, e);
                eprintln!("\nUpload failed ({}), retrying...", e.error());
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                prepared = e
                    .into_retry()
                    .context("Upload cannot be retried")?;
                attempt += 1;
            }
            Err(e) => return Err(e.into_error().into()),
        }
    }
}

/// MIME type from the file extension.
pub fn guess_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("txt") | Some("log") | Some("md") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        _ => DEFAULT_MIME_TYPE,
    }
}
