use std::path::Path;

/// An image file queued for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageBlob {
    pub fn new(file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self { file_name, bytes })
    }

    /// Content type guessed from the file extension.
    pub fn mime_type(&self) -> String {
        mime_guess::from_path(&self.file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_path_keeps_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan_01.png");
        std::fs::write(&path, b"png bytes").unwrap();

        let blob = ImageBlob::from_path(&path).unwrap();
        assert_eq!(blob.file_name, "scan_01.png");
        assert_eq!(blob.bytes, b"png bytes");
        assert_eq!(blob.mime_type(), "image/png");
    }

    #[test]
    fn unknown_extension_is_octet_stream() {
        let blob = ImageBlob::new("scan.zzz", vec![]);
        assert_eq!(blob.mime_type(), "application/octet-stream");
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ImageBlob::from_path(&dir.path().join("nope.jpg")).is_err());
    }
}
