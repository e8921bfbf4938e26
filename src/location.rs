//! Where a conversion reads from and writes to
//!
//! A path whose parent is an existing `.hog` file names a lump inside that
//! archive; any other path is a plain file. Archives are opened once per
//! [`ContainerCache`] so every location inside the same HOG sees the same
//! pending contents.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use hog::{HogError, HogFile};
use tracing::{debug, warn};

use crate::convert::ConvertError;

pub const CONTAINER_EXTENSION: &str = "hog";

#[derive(Debug)]
pub struct CachedContainer {
    hog: HogFile,
    /// Staged changes that have not reached the disk yet
    dirty: bool,
}

impl CachedContainer {
    fn commit(&mut self) -> Result<(), HogError> {
        self.hog.write()?;
        self.dirty = false;
        Ok(())
    }

    pub fn hog(&self) -> &HogFile {
        &self.hog
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Open HOG archives for one run, keyed by archive path
#[derive(Debug, Default)]
pub struct ContainerCache {
    containers: HashMap<PathBuf, Rc<RefCell<CachedContainer>>>,
}

impl ContainerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide what `path` names. Nothing is read except the archive index.
    pub fn resolve(&mut self, path: impl AsRef<Path>) -> Result<Location, ConvertError> {
        let path = path.as_ref();
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            if is_container(parent) {
                let container = self.open(parent)?;
                return Ok(Location::Entry {
                    container,
                    name: name.to_string_lossy().into_owned(),
                });
            }
        }
        Ok(Location::File(path.to_path_buf()))
    }

    fn open(&mut self, path: &Path) -> Result<Rc<RefCell<CachedContainer>>, ConvertError> {
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if let Some(container) = self.containers.get(&key) {
            return Ok(Rc::clone(container));
        }

        let hog = HogFile::open(path).map_err(|source| ConvertError::Container {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "caching HOG archive");
        let container = Rc::new(RefCell::new(CachedContainer { hog, dirty: false }));
        self.containers.insert(key, Rc::clone(&container));
        Ok(container)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Write back every archive whose last commit failed. Returns the first
    /// error after trying them all.
    pub fn close(self) -> Result<(), ConvertError> {
        let mut first = None;
        for (path, container) in self.containers {
            let mut container = container.borrow_mut();
            if !container.dirty {
                continue;
            }
            if let Err(source) = container.commit() {
                warn!(path = %path.display(), "could not write HOG archive: {source}");
                first.get_or_insert(ConvertError::Container { path, source });
            }
        }
        first.map_or(Ok(()), Err)
    }
}

fn is_container(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CONTAINER_EXTENSION))
        && path.is_file()
}

/// A resolved source or destination
#[derive(Debug, Clone)]
pub enum Location {
    File(PathBuf),
    Entry {
        container: Rc<RefCell<CachedContainer>>,
        name: String,
    },
}

impl Location {
    pub fn exists(&self) -> bool {
        match self {
            Location::File(path) => path.is_file(),
            Location::Entry { container, name } => container.borrow().hog.contains(name),
        }
    }

    pub fn read(&self) -> Result<Vec<u8>, ConvertError> {
        match self {
            Location::File(path) => fs::read(path).map_err(|source| ConvertError::Io {
                path: path.clone(),
                source,
            }),
            Location::Entry { container, name } => container
                .borrow()
                .hog
                .lump_data(name)
                .map(<[u8]>::to_vec)
                .map_err(|source| ConvertError::Container {
                    path: self.path(),
                    source,
                }),
        }
    }

    /// Write `data` here. Inside a HOG the whole archive is rewritten before
    /// this returns.
    pub fn replace(&self, data: Vec<u8>) -> Result<(), ConvertError> {
        match self {
            Location::File(path) => fs::write(path, data).map_err(|source| ConvertError::Io {
                path: path.clone(),
                source,
            }),
            Location::Entry { container, name } => {
                let staged = {
                    let mut container = container.borrow_mut();
                    container.hog.replace_lump(name, data).and_then(|()| {
                        container.dirty = true;
                        container.commit()
                    })
                };
                staged.map_err(|source| ConvertError::Container {
                    path: self.path(),
                    source,
                })
            }
        }
    }

    /// The path as the user would write it
    pub fn path(&self) -> PathBuf {
        match self {
            Location::File(path) => path.clone(),
            Location::Entry { container, name } => container.borrow().hog.path().join(name),
        }
    }

    pub fn is_entry(&self) -> bool {
        matches!(self, Location::Entry { .. })
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}
