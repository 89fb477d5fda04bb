use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::io::ReadAt;

use super::file::EspFsFile;
use super::parser::EspFs;

/// Holder for a single active image.
///
/// Mirrors the classic init-then-open lifecycle for callers that keep one
/// image around: the store starts empty, [`init`](Store::init) installs an
/// image and a later `init` replaces it. Open handles borrow the store, so
/// an image cannot be replaced while files are open.
pub struct Store<R: ReadAt> {
    fs: Option<EspFs<R>>,
}

impl<R: ReadAt> Store<R> {
    pub const fn new() -> Self {
        Self { fs: None }
    }

    /// Install the image behind `reader`.
    ///
    /// On failure the store is left uninitialized, even if it held an image
    /// before.
    pub fn init(&mut self, reader: R) -> Result<()> {
        self.init_with_config(reader, Config::default())
    }

    pub fn init_with_config(&mut self, reader: R, config: Config) -> Result<()> {
        if self.fs.take().is_some() {
            debug!("Replacing active EspFs image");
        }
        self.fs = Some(EspFs::with_config(reader, config)?);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.fs.is_some()
    }

    /// The active image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before a successful `init`.
    pub fn get(&self) -> Result<&EspFs<R>> {
        self.fs.as_ref().ok_or(Error::NotInitialized)
    }

    /// Open `path` in the active image.
    pub fn open(&self, path: &str) -> Result<EspFsFile<'_, R>> {
        self.get()?.open(path)
    }
}

impl<R: ReadAt> Default for Store<R> {
    fn default() -> Self {
        Self::new()
    }
}
