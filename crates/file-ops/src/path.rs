//! Brick path composition.
//!
//! A brick path is `<root prefix><current directory><leaf>`. The current
//! directory always starts and ends with `/`; moving up trims it back to the
//! previous `/`. Nothing else is normalized.

use ev3explorer_protocol::constants::{DEFAULT_ROOT_PREFIX, DEFAULT_START_DIRECTORY};

use crate::ExplorerError;

/// Current position in the brick's file system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrickPath {
    root: String,
    current: String,
}

impl Default for BrickPath {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT_PREFIX.to_string(),
            current: DEFAULT_START_DIRECTORY.to_string(),
        }
    }
}

impl BrickPath {
    /// Builds a path from a root prefix and a starting directory.
    ///
    /// Missing leading or trailing slashes on `current` are added.
    pub fn new(root: impl Into<String>, current: &str) -> Self {
        let mut dir = String::with_capacity(current.len() + 2);
        if !current.starts_with('/') {
            dir.push('/');
        }
        dir.push_str(current);
        if !dir.ends_with('/') {
            dir.push('/');
        }
        Self {
            root: root.into(),
            current: dir,
        }
    }

    /// Directory as shown to the user, e.g. `/home/root/lms2012/prjs/`.
    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Absolute brick path of the current directory.
    pub fn directory(&self) -> String {
        format!("{}{}", self.root, self.current)
    }

    /// Absolute brick path of `leaf` inside the current directory.
    pub fn absolute(&self, leaf: &str) -> Result<String, ExplorerError> {
        validate_leaf(leaf)?;
        Ok(format!("{}{}{}", self.root, self.current, leaf))
    }

    /// Descends into the sub-directory `name`.
    pub fn enter(&mut self, name: &str) -> Result<(), ExplorerError> {
        validate_leaf(name)?;
        self.current.push_str(name);
        self.current.push('/');
        Ok(())
    }

    /// Moves to the parent directory.
    pub fn navigate_up(&mut self) -> Result<(), ExplorerError> {
        if self.is_top() {
            return Err(ExplorerError::AtTop);
        }
        let without_slash = &self.current[..self.current.len() - 1];
        match without_slash.rfind('/') {
            Some(idx) => {
                self.current.truncate(idx + 1);
                Ok(())
            }
            None => Err(ExplorerError::AtTop),
        }
    }

    pub fn is_top(&self) -> bool {
        self.current.len() <= 1
    }
}

/// Rejects names that would escape or corrupt the composed path.
pub fn validate_leaf(name: &str) -> Result<(), ExplorerError> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0')
    {
        return Err(ExplorerError::InvalidName(name.to_string()));
    }
    Ok(())
}
