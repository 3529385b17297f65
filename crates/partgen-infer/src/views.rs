use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Longest edge, in pixels, of a view as sent to the model.
pub const MAX_EDGE_PX: u32 = 1024;

/// Formats accepted as view input. Views are always sent as PNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Png,
    Jpeg,
    Webp,
    Gif,
}

impl MediaType {
    pub fn mime(self) -> &'static str {
        match self {
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Webp => "image/webp",
            MediaType::Gif => "image/gif",
        }
    }

    pub fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(MediaType::Png),
            ImageFormat::Jpeg => Some(MediaType::Jpeg),
            ImageFormat::WebP => Some(MediaType::Webp),
            ImageFormat::Gif => Some(MediaType::Gif),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("read view image {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("view image {path:?} is empty")]
    Empty { path: PathBuf },
    #[error("view image {path:?} is not a PNG, JPEG, WebP or GIF file")]
    UnknownFormat { path: PathBuf },
    #[error("decode view image {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("encode view {label}")]
    Encode {
        label: String,
        #[source]
        source: image::ImageError,
    },
}

/// One view, converted to RGB, scaled to fit [`MAX_EDGE_PX`] and encoded
/// as PNG.
#[derive(Debug, Clone)]
pub struct ViewImage {
    pub label: String,
    pub path: PathBuf,
    pub source: MediaType,
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl ViewImage {
    pub fn load(label: &str, path: &Path) -> Result<Self, ImageError> {
        let read_err = |source| ImageError::Read {
            path: path.to_path_buf(),
            source,
        };
        if std::fs::metadata(path).map_err(read_err)?.len() == 0 {
            return Err(ImageError::Empty {
                path: path.to_path_buf(),
            });
        }

        // Content wins; the extension is the fallback.
        let reader = ImageReader::open(path)
            .map_err(read_err)?
            .with_guessed_format()
            .map_err(read_err)?;
        let source = reader
            .format()
            .and_then(MediaType::from_format)
            .ok_or_else(|| ImageError::UnknownFormat {
                path: path.to_path_buf(),
            })?;
        let decoded = reader.decode().map_err(|source| ImageError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_image(label, path, source, decoded)
    }

    pub fn from_image(
        label: &str,
        path: &Path,
        source: MediaType,
        image: DynamicImage,
    ) -> Result<Self, ImageError> {
        let prepared = prepare(image);
        let mut png = Vec::new();
        prepared
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|source| ImageError::Encode {
                label: label.to_string(),
                source,
            })?;

        Ok(Self {
            label: label.to_string(),
            path: path.to_path_buf(),
            source,
            width: prepared.width(),
            height: prepared.height(),
            png,
        })
    }

    pub fn mime(&self) -> &'static str {
        MediaType::Png.mime()
    }
}

/// RGB, longest edge at most [`MAX_EDGE_PX`], aspect ratio kept.
pub fn prepare(image: DynamicImage) -> DynamicImage {
    let image = if image.width().max(image.height()) > MAX_EDGE_PX {
        image.resize(MAX_EDGE_PX, MAX_EDGE_PX, FilterType::Lanczos3)
    } else {
        image
    };
    DynamicImage::ImageRgb8(image.to_rgb8())
}

/// Three orthographic views of the part, plus an optional fourth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSet {
    pub side1: PathBuf,
    pub side2: PathBuf,
    pub side3: PathBuf,
    #[serde(default)]
    pub side4: Option<PathBuf>,
}

impl ViewSet {
    pub fn new(side1: PathBuf, side2: PathBuf, side3: PathBuf) -> Self {
        Self {
            side1,
            side2,
            side3,
            side4: None,
        }
    }

    pub fn with_fourth(mut self, side4: PathBuf) -> Self {
        self.side4 = Some(side4);
        self
    }

    pub fn paths(&self) -> Vec<(&'static str, &Path)> {
        let mut out = vec![
            ("side1", self.side1.as_path()),
            ("side2", self.side2.as_path()),
            ("side3", self.side3.as_path()),
        ];
        if let Some(p) = &self.side4 {
            out.push(("side4", p.as_path()));
        }
        out
    }

    pub fn load(&self) -> Result<Vec<ViewImage>, ImageError> {
        self.paths()
            .into_iter()
            .map(|(label, path)| ViewImage::load(label, path))
            .collect()
    }
}
