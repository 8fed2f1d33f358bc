//! Streaming transfer of one sheep into the store directory
//!
//! Bytes are written chunk by chunk to `<final name>.part`, flushed and
//! synced, then renamed. The rename is what makes the sheep visible.

use crate::constants::PART_SUFFIX;
use crate::error::{Error, Result};
use crate::models::{Sheep, SheepDescriptor};
use crate::store::sheep_file_name;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use url::Url;

/// Downloads `descriptor` into `root` and returns the stored sheep
pub(crate) async fn fetch_sheep(
    client: &Client,
    root: &Path,
    descriptor: &SheepDescriptor,
) -> Result<Sheep> {
    let response = client
        .get(&descriptor.url)
        .send()
        .await
        .map_err(|e| Error::transfer(descriptor, format!("request failed: {e}")))?;

    if !response.status().is_success() {
        return Err(Error::transfer(
            descriptor,
            format!("HTTP error: {}", response.status()),
        ));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let ext = extension_hint(content_type.as_deref(), &descriptor.url);
    let final_path = root.join(sheep_file_name(
        descriptor.flock,
        descriptor.id,
        descriptor.first,
        descriptor.last,
        &ext,
    ));
    let part_path = part_path(&final_path);
    let expected_size = response.content_length();

    // File::create truncates what an interrupted attempt may have left behind
    let mut file = tokio::fs::File::create(&part_path)
        .await
        .map_err(|e| Error::transfer(descriptor, format!("cannot create file: {e}")))?;

    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    let copied: std::result::Result<(), String> = async {
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| format!("failed to read chunk: {e}"))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| format!("failed to write to file: {e}"))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| format!("failed to flush file: {e}"))?;
        file.sync_all()
            .await
            .map_err(|e| format!("failed to sync file: {e}"))?;
        Ok(())
    }
    .await;
    drop(file);

    let outcome = copied.and_then(|()| match expected_size {
        Some(expected) if expected != written => Err(format!(
            "truncated transfer: {written} of {expected} bytes"
        )),
        _ => Ok(()),
    });

    if let Err(reason) = outcome {
        discard(&part_path).await;
        return Err(Error::transfer(descriptor, reason));
    }

    if let Err(e) = tokio::fs::rename(&part_path, &final_path).await {
        discard(&part_path).await;
        return Err(Error::transfer(descriptor, format!("cannot publish file: {e}")));
    }

    debug!(path = %final_path.display(), bytes = written, "Sheep stored");
    Ok(Sheep {
        flock: descriptor.flock,
        id: descriptor.id,
        first: descriptor.first,
        last: descriptor.last,
        path: final_path,
    })
}

pub(crate) fn part_path(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_owned();
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

async fn discard(part_path: &Path) {
    if let Err(e) = tokio::fs::remove_file(part_path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %part_path.display(), "Cannot remove partial sheep: {e}");
        }
    }
}

/// File extension (with its dot) used to name a sheep
///
/// The content type wins; the locator's own extension is the fallback. The
/// hint only names the file, it never validates the content.
pub(crate) fn extension_hint(content_type: Option<&str>, url: &str) -> String {
    if let Some(ext) = content_type.and_then(extension_for_mime) {
        return format!(".{ext}");
    }

    Url::parse(url)
        .ok()
        .and_then(|u| {
            let segment = u.path_segments()?.next_back()?.to_string();
            let (_, ext) = segment.rsplit_once('.')?;
            let valid = !ext.is_empty()
                && ext.len() <= 5
                && ext.chars().all(|c| c.is_ascii_alphanumeric());
            valid.then(|| format!(".{}", ext.to_ascii_lowercase()))
        })
        .unwrap_or_default()
}

fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "video/x-msvideo" | "video/avi" | "video/msvideo" => Some("avi"),
        "video/mp4" => Some("mp4"),
        "video/mpeg" => Some("mpg"),
        "video/quicktime" => Some("mov"),
        "video/webm" => Some("webm"),
        "video/x-matroska" => Some("mkv"),
        "video/ogg" => Some("ogv"),
        _ => None,
    }
}
