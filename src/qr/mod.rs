//! QR code rendering
//!
//! Turns an input string into a PNG raster. The defaults mirror the classic
//! generator settings: error-correction level L, the smallest version that
//! fits, 10 px modules, a 4-module quiet zone, black on white.

use bytes::Bytes;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use qrcode::{Color, EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use thiserror::Error;

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

/// Largest accepted pixels-per-module
pub const MAX_MODULE_SIZE: u32 = 64;
/// Widest accepted quiet zone, in modules
pub const MAX_BORDER: u32 = 64;

#[derive(Debug, Error)]
pub enum QrError {
    #[error("module size must be between 1 and {MAX_MODULE_SIZE}, got {0}")]
    ModuleSize(u32),

    #[error("border must be at most {MAX_BORDER} modules, got {0}")]
    Border(u32),

    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),

    #[error("PNG encoding failed: {0}")]
    Png(#[from] image::ImageError),
}

/// Error-correction level, from 7% (`L`) to 30% (`H`) recoverable codewords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum ErrorCorrection {
    #[default]
    #[serde(rename = "L", alias = "low")]
    Low,
    #[serde(rename = "M", alias = "medium")]
    Medium,
    #[serde(rename = "Q", alias = "quartile")]
    Quartile,
    #[serde(rename = "H", alias = "high")]
    High,
}

impl From<ErrorCorrection> for EcLevel {
    fn from(value: ErrorCorrection) -> Self {
        match value {
            ErrorCorrection::Low => EcLevel::L,
            ErrorCorrection::Medium => EcLevel::M,
            ErrorCorrection::Quartile => EcLevel::Q,
            ErrorCorrection::High => EcLevel::H,
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown error-correction level '{0}', expected one of L, M, Q, H")]
pub struct ParseErrorCorrectionError(String);

impl FromStr for ErrorCorrection {
    type Err = ParseErrorCorrectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" | "LOW" => Ok(ErrorCorrection::Low),
            "M" | "MEDIUM" => Ok(ErrorCorrection::Medium),
            "Q" | "QUARTILE" => Ok(ErrorCorrection::Quartile),
            "H" | "HIGH" => Ok(ErrorCorrection::High),
            _ => Err(ParseErrorCorrectionError(s.to_string())),
        }
    }
}

impl fmt::Display for ErrorCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            ErrorCorrection::Low => "L",
            ErrorCorrection::Medium => "M",
            ErrorCorrection::Quartile => "Q",
            ErrorCorrection::High => "H",
        };
        f.write_str(level)
    }
}

/// Rendering parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, bon::Builder)]
pub struct QrOptions {
    #[serde(default)]
    #[builder(default)]
    pub ec_level: ErrorCorrection,
    /// Pixels per module side
    #[serde(default = "default_module_size")]
    #[builder(default = default_module_size())]
    pub module_size: u32,
    /// Quiet zone width, in modules
    #[serde(default = "default_border")]
    #[builder(default = default_border())]
    pub border: u32,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            ec_level: ErrorCorrection::default(),
            module_size: default_module_size(),
            border: default_border(),
        }
    }
}

impl QrOptions {
    /// Bounds keep the canvas side well inside `u32` for every QR version
    pub fn validate(&self) -> Result<(), QrError> {
        if !(1..=MAX_MODULE_SIZE).contains(&self.module_size) {
            return Err(QrError::ModuleSize(self.module_size));
        }
        if self.border > MAX_BORDER {
            return Err(QrError::Border(self.border));
        }
        Ok(())
    }
}

fn default_module_size() -> u32 {
    10
}

fn default_border() -> u32 {
    4
}

/// Encode `input` as a QR code and return the PNG bytes
pub fn encode_png(input: &str, options: &QrOptions) -> Result<Bytes, QrError> {
    options.validate()?;
    let code = QrCode::with_error_correction_level(input.as_bytes(), options.ec_level.into())?;
    let raster = rasterize(&code, options);

    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(raster).write_to(&mut buffer, ImageFormat::Png)?;

    Ok(Bytes::from(buffer.into_inner()))
}

/// Paint the module matrix onto a grayscale canvas, quiet zone included
pub fn rasterize(code: &QrCode, options: &QrOptions) -> GrayImage {
    let width = code.width() as u32;
    let border = options.border;
    let scale = options.module_size.max(1);
    let side = (width + 2 * border) * scale;
    let colors = code.to_colors();

    GrayImage::from_fn(side, side, |x, y| {
        let (mx, my) = (x / scale, y / scale);
        if mx < border || my < border || mx >= border + width || my >= border + width {
            return LIGHT;
        }

        let index = ((my - border) * width + (mx - border)) as usize;
        match colors[index] {
            Color::Dark => DARK,
            Color::Light => LIGHT,
        }
    })
}
