use crate::SourcePolicy;

/// Payloads below this size are treated as navigation noise (spinners, pixels).
pub const DEFAULT_MIN_ASSET_BYTES: usize = 1024;

const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];
const JPEG_SOI: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetFormat {
    Svg,
    Svgz,
    Png,
    Jpeg,
    Unknown,
}

impl AssetFormat {
    /// Determine the format from the leading bytes.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(GZIP_MAGIC) {
            return AssetFormat::Svgz;
        }
        if bytes.starts_with(JPEG_SOI) {
            return AssetFormat::Jpeg;
        }
        if bytes.starts_with(PNG_SIGNATURE) {
            return AssetFormat::Png;
        }
        if has_svg_prolog(bytes) {
            return AssetFormat::Svg;
        }
        AssetFormat::Unknown
    }

    /// File extension including the dot. Unknown payloads are stored as png.
    pub fn extension(self) -> &'static str {
        match self {
            AssetFormat::Svg => ".svg",
            AssetFormat::Svgz => ".svgz",
            AssetFormat::Png | AssetFormat::Unknown => ".png",
            AssetFormat::Jpeg => ".jpg",
        }
    }

    pub fn is_vector(self) -> bool {
        matches!(self, AssetFormat::Svg | AssetFormat::Svgz)
    }
}

fn has_svg_prolog(bytes: &[u8]) -> bool {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    let head = &body[start..body.len().min(start + 16)];
    let lowered = head.to_ascii_lowercase();
    lowered.starts_with(b"<?xml") || lowered.starts_with(b"<svg") || lowered.starts_with(b"<!doctype svg")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("undersized payload: {len} bytes (minimum {min})")]
    Undersized { len: usize, min: usize },
    #[error("non-vector asset {format:?} from a vector-only source")]
    NonVectorRejected { format: AssetFormat },
    #[error("unsupported payload format")]
    Unsupported,
}

impl Rejection {
    /// Stable reason tag used in logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::Undersized { .. } => "undersized",
            Rejection::NonVectorRejected { .. } => "non_vector_rejected",
            Rejection::Unsupported => "unsupported",
        }
    }
}

/// Sniffs captured payloads and applies the size and source-policy gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetClassifier {
    min_bytes: usize,
}

impl Default for AssetClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_ASSET_BYTES)
    }
}

impl AssetClassifier {
    pub fn new(min_bytes: usize) -> Self {
        Self { min_bytes }
    }

    /// Size gate first, then signature, then the vector-only policy gate.
    pub fn classify(&self, bytes: &[u8], policy: &SourcePolicy) -> Result<AssetFormat, Rejection> {
        if bytes.len() < self.min_bytes {
            return Err(Rejection::Undersized {
                len: bytes.len(),
                min: self.min_bytes,
            });
        }
        let format = AssetFormat::sniff(bytes);
        if policy.vector_only {
            return match format {
                AssetFormat::Svg | AssetFormat::Svgz => Ok(format),
                AssetFormat::Png | AssetFormat::Jpeg => {
                    Err(Rejection::NonVectorRejected { format })
                }
                AssetFormat::Unknown => Err(Rejection::Unsupported),
            };
        }
        Ok(format)
    }
}
