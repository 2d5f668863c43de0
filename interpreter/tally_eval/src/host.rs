//! File access for the `:save` and `:open` directives.
//!
//! A trait seam so tests can run those directives against an in-memory
//! file set instead of the real filesystem.

use std::path::Path;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::errors::{io_error, EvalError};

pub trait Host {
    fn read_text(&self, path: &str) -> Result<String, EvalError>;
    fn write_text(&self, path: &str, contents: &str) -> Result<(), EvalError>;
}

/// Real filesystem access.
#[derive(Default)]
pub struct StdHost;

impl Host for StdHost {
    fn read_text(&self, path: &str) -> Result<String, EvalError> {
        std::fs::read_to_string(Path::new(path)).map_err(|e| io_error(&e, path))
    }

    fn write_text(&self, path: &str, contents: &str) -> Result<(), EvalError> {
        std::fs::write(Path::new(path), contents).map_err(|e| io_error(&e, path))
    }
}

/// In-memory files for directive tests.
#[derive(Default)]
pub struct MemoryHost {
    files: Mutex<FxHashMap<String, String>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preload(&self, path: &str, contents: &str) {
        self.files.lock().insert(path.to_owned(), contents.to_owned());
    }

    pub fn contents(&self, path: &str) -> Option<String> {
        self.files.lock().get(path).cloned()
    }
}

impl Host for MemoryHost {
    fn read_text(&self, path: &str) -> Result<String, EvalError> {
        self.files.lock().get(path).cloned().ok_or_else(|| {
            io_error(
                &std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                path,
            )
        })
    }

    fn write_text(&self, path: &str, contents: &str) -> Result<(), EvalError> {
        self.files.lock().insert(path.to_owned(), contents.to_owned());
        Ok(())
    }
}
