use harvester_core::{AssetFormat, Ordinal};

/// Canonical page filename: `page_{ordinal:03}{ext}`.
pub fn page_filename(ordinal: Ordinal, format: AssetFormat) -> String {
    format!("page_{ordinal:03}{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_three_digits_and_grows_past() {
        assert_eq!(page_filename(7, AssetFormat::Svgz), "page_007.svgz");
        assert_eq!(page_filename(1234, AssetFormat::Jpeg), "page_1234.jpg");
        assert_eq!(page_filename(2, AssetFormat::Unknown), "page_002.png");
    }
}
