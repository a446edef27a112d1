use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// A deterministic gradient PNG of the given size
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encoding an in-memory PNG cannot fail");
    out.into_inner()
}

/// Writes image fixtures into a directory
pub struct TestImageBuilder {
    base_dir: PathBuf,
}

impl TestImageBuilder {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
        }
    }

    /// Write a valid PNG
    pub fn png(&mut self, name: &str, width: u32, height: u32) -> std::io::Result<PathBuf> {
        self.write(name, &png_bytes(width, height))
    }

    /// Write arbitrary bytes under an image-looking name
    pub fn corrupted(&mut self, name: &str, size: usize) -> std::io::Result<PathBuf> {
        let content: Vec<u8> = (0..size)
            .map(|i| match i % 4 {
                0 => 0xFF,
                1 => 0x00,
                2 => (i & 0xFF) as u8,
                _ => 0xAA,
            })
            .collect();
        self.write(name, &content)
    }

    pub fn empty(&mut self, name: &str) -> std::io::Result<PathBuf> {
        self.write(name, &[])
    }

    pub fn write(&mut self, name: &str, content: &[u8]) -> std::io::Result<PathBuf> {
        let path = self.base_dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }
}
