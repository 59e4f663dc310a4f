//! # Local media storage
//!
//! Local filesystem implementation of `MediaProcessor` and `MediaStorage`.
//! Originals land in `full_dir` under a timestamp name; thumbnails in
//! `thumb_dir`. Images are shrunk with `image`; videos get a single frame
//! extracted by the `ffmpeg` CLI.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use domains::{
    classify_media, stored_file_name, with_extension, DomainError, MediaKind, MediaProcessor,
    MediaRef, MediaStorage, Result, Upload,
};
use image::imageops::FilterType;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, warn};

/// Thumbnails are at most this many pixels wide.
pub const THUMB_WIDTH: u32 = 300;

/// File facts shown next to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaInfo {
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub is_video: bool,
}

#[derive(Debug, Clone)]
pub struct LocalMediaStorage {
    full_dir: PathBuf,
    thumb_dir: PathBuf,
    thumb_width: u32,
    ffmpeg: PathBuf,
}

impl LocalMediaStorage {
    pub fn new(full_dir: impl Into<PathBuf>, thumb_dir: impl Into<PathBuf>) -> Self {
        Self {
            full_dir: full_dir.into(),
            thumb_dir: thumb_dir.into(),
            thumb_width: THUMB_WIDTH,
            ffmpeg: PathBuf::from("ffmpeg"),
        }
    }

    /// Overrides the ffmpeg executable looked up on `PATH`.
    pub fn with_ffmpeg(mut self, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ffmpeg = ffmpeg.into();
        self
    }

    pub fn full_path(&self, name: &str) -> PathBuf {
        self.full_dir.join(name)
    }

    pub fn thumb_path(&self, name: &str) -> PathBuf {
        self.thumb_dir.join(name)
    }

    /// Creates both directories if missing.
    pub async fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.full_dir, &self.thumb_dir] {
            fs::create_dir_all(dir).await.map_err(|err| io_error(dir, err))?;
        }
        Ok(())
    }

    /// Size and dimensions of a stored original. Video dimensions are not
    /// read and stay zero.
    pub async fn info(&self, media: &MediaRef) -> Result<MediaInfo> {
        let path = self.full_path(&media.media_name);
        let meta = fs::metadata(&path).await.map_err(|err| match err.kind() {
            ErrorKind::NotFound => DomainError::not_found("media", &media.media_name),
            _ => io_error(&path, err),
        })?;

        let is_video = kind_of(&media.media_name).is_some_and(|kind| kind == MediaKind::Video);
        let (width, height) = if is_video {
            (0, 0)
        } else {
            let original = path.clone();
            tokio::task::spawn_blocking(move || image::image_dimensions(original))
                .await
                .map_err(|err| DomainError::Storage(err.to_string()))?
                .map_err(|err| DomainError::Storage(format!("{}: {err}", path.display())))?
        };

        Ok(MediaInfo { size: meta.len(), width, height, is_video })
    }

    async fn image_thumbnail(&self, data: Bytes, target: PathBuf) -> Result<()> {
        let width = self.thumb_width;
        tokio::task::spawn_blocking(move || {
            let unreadable =
                |err: image::ImageError| DomainError::Validation(format!("unreadable image: {err}"));
            let format = image::guess_format(&data).map_err(unreadable)?;
            let img = image::load_from_memory_with_format(&data, format).map_err(unreadable)?;
            let thumb = if img.width() > width {
                img.resize(width, u32::MAX, FilterType::Lanczos3)
            } else {
                img
            };
            thumb
                .save_with_format(&target, format)
                .map_err(|err| DomainError::Storage(format!("{}: {err}", target.display())))
        })
        .await
        .map_err(|err| DomainError::Storage(err.to_string()))?
    }

    async fn video_thumbnail(&self, source: &Path, target: &Path) -> Result<()> {
        let status = Command::new(&self.ffmpeg)
            .arg("-y")
            .arg("-i")
            .arg(source)
            .args(["-ss", "00:00:01.000", "-vframes", "1"])
            .arg("-vf")
            .arg(format!("scale={}:-1", self.thumb_width))
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|err| DomainError::Storage(format!("running ffmpeg: {err}")))?;

        if !status.success() {
            return Err(DomainError::Storage(format!(
                "ffmpeg exited with {status} for {}",
                source.display()
            )));
        }
        Ok(())
    }
}

fn kind_of(name: &str) -> Option<MediaKind> {
    let named =
        Upload { file_name: name.to_string(), content_type: None, data: Bytes::new() };
    classify_media(&named).ok()
}

fn io_error(path: &Path, err: std::io::Error) -> DomainError {
    DomainError::Storage(format!("{}: {err}", path.display()))
}

/// Deletes `path`; a file that is already gone counts as deleted.
async fn remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(DomainError::Cleanup {
            path: path.display().to_string(),
            reason: err.to_string(),
        }),
    }
}

#[async_trait]
impl MediaProcessor for LocalMediaStorage {
    async fn store(&self, upload: Upload, now: DateTime<Utc>) -> Result<MediaRef> {
        let kind = classify_media(&upload)?;
        self.ensure_dirs().await?;

        let media_name = stored_file_name(now, &upload.file_name);
        let full_path = self.full_path(&media_name);
        fs::write(&full_path, &upload.data).await.map_err(|err| io_error(&full_path, err))?;

        let thumb_name = match kind {
            MediaKind::Image => media_name.clone(),
            MediaKind::Video => with_extension(&media_name, "jpg"),
        };
        let thumb_path = self.thumb_path(&thumb_name);

        let thumbnail = match kind {
            MediaKind::Image => self.image_thumbnail(upload.data.clone(), thumb_path).await,
            MediaKind::Video => self.video_thumbnail(&full_path, &thumb_path).await,
        };
        if let Err(err) = thumbnail {
            if let Err(cleanup) = remove_file(&full_path).await {
                warn!(error = %cleanup, "could not remove original after thumbnail failure");
            }
            return Err(err);
        }

        debug!(media = %media_name, thumb = %thumb_name, ?kind, "media stored");
        Ok(MediaRef { media_name, thumb_name })
    }
}

#[async_trait]
impl MediaStorage for LocalMediaStorage {
    async fn remove(&self, media: &MediaRef) -> Result<()> {
        let full = remove_file(&self.full_path(&media.media_name)).await;
        let thumb = remove_file(&self.thumb_path(&media.thumb_name)).await;
        full.and(thumb)
    }
}
