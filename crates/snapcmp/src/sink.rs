use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use crate::codec::{Codec, PngCodec};
use crate::pixel::PixelBuffer;
use crate::report::{Attachment, DIFFERENCE, FAILURE, Failure, REFERENCE};

/// Receives the named images of a failed comparison for display or persistence.
pub trait AttachmentSink {
    fn attach(&mut self, name: &str, image: &PixelBuffer) -> Result<()>;
}

impl Failure {
    /// Hand every attachment to `sink`, stopping at the first error.
    pub fn deliver(&self, sink: &mut dyn AttachmentSink) -> Result<()> {
        for Attachment { name, image } in &self.attachments {
            sink.attach(name, image)?;
        }
        Ok(())
    }
}

/// Writes each attachment as `<dir>/<name>.png`.
pub struct DirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Paths written so far, in attach order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.png"))
    }

    /// Remove artifacts left by an earlier failing run. Missing files are fine.
    pub fn clear(&self) -> Result<()> {
        for name in [REFERENCE, FAILURE, DIFFERENCE] {
            let path = self.file_path(name);
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed stale attachment"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to remove {}", path.display()));
                }
            }
        }
        Ok(())
    }
}

impl AttachmentSink for DirectorySink {
    fn attach(&mut self, name: &str, image: &PixelBuffer) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.file_path(name);
        let png = PngCodec
            .encode(image)
            .with_context(|| format!("Failed to encode {name} attachment"))?;
        std::fs::write(&path, png).with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(path = %path.display(), "wrote attachment");
        self.written.push(path);
        Ok(())
    }
}
