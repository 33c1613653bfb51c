//! Interactive explorer session over a brick's file system.
//!
//! The explorer keeps the current directory and its last listing. Every
//! operation opens a fresh connection, does its work, relists when the
//! directory changed and closes the connection again, whatever the outcome.
//! A failed exchange marks the brick unavailable and drops the cached
//! listing; actions that depend on the listing are refused until the
//! directory has been read again.

use ev3explorer_transfer::{
    BrickConnection, DirectoryEntry, TransferError, TransferOptions, list_directory, read_file,
    write_file,
};
use tracing::{info, warn};

use crate::deploy::{Compiler, target_name};
use crate::dirs::{create_directory, delete_entry};
use crate::path::BrickPath;
use crate::program::run_program;
use crate::ExplorerError;

/// Opens connections to one brick.
pub trait Connector {
    type Connection: BrickConnection;

    fn connect(&mut self) -> Result<Self::Connection, TransferError>;
}

/// Explorer state for one brick.
pub struct Explorer<K: Connector> {
    connector: K,
    path: BrickPath,
    entries: Option<Vec<DirectoryEntry>>,
    available: bool,
    options: TransferOptions,
}

impl<K: Connector> Explorer<K> {
    /// Creates an explorer positioned at `path`. Nothing is sent until the
    /// first operation.
    pub fn new(connector: K, path: BrickPath, options: TransferOptions) -> Self {
        Self {
            connector,
            path,
            entries: None,
            available: false,
            options,
        }
    }

    pub fn path(&self) -> &BrickPath {
        &self.path
    }

    pub fn connector(&self) -> &K {
        &self.connector
    }

    /// Listing of the current directory as of the last successful operation.
    /// Empty when nothing has been listed yet.
    pub fn entries(&self) -> &[DirectoryEntry] {
        self.entries.as_deref().unwrap_or_default()
    }

    /// Whether [`entries`](Self::entries) reflects a listing actually read
    /// from the brick.
    pub fn is_listed(&self) -> bool {
        self.entries.is_some()
    }

    fn listing(&self) -> Result<&[DirectoryEntry], ExplorerError> {
        self.entries.as_deref().ok_or(ExplorerError::NotListed)
    }

    /// Whether the last operation reached the brick successfully.
    pub fn is_available(&self) -> bool {
        self.available
    }

    fn entry(&self, name: &str) -> Result<&DirectoryEntry, ExplorerError> {
        self.listing()?
            .iter()
            .find(|e| e.name() == name)
            .ok_or_else(|| ExplorerError::NotFound(name.to_string()))
    }

    fn file_entry(&self, name: &str) -> Result<(), ExplorerError> {
        if self.entry(name)?.is_directory() {
            return Err(ExplorerError::IsADirectory(name.to_string()));
        }
        Ok(())
    }

    /// Runs `op` on a fresh connection and records the outcome.
    ///
    /// The connection is closed on every path. A close failure only counts
    /// when `op` itself succeeded.
    fn with_connection<T>(
        &mut self,
        action: &'static str,
        op: impl FnOnce(&mut K::Connection, &BrickPath, &TransferOptions) -> Result<T, TransferError>,
    ) -> Result<T, ExplorerError> {
        let result = self.connector.connect().and_then(|mut conn| {
            let result = op(&mut conn, &self.path, &self.options);
            let closed = conn.close();
            match (result, closed) {
                (Ok(value), Ok(())) => Ok(value),
                (Ok(_), Err(e)) => Err(e),
                (Err(e), closed) => {
                    if let Err(close_err) = closed {
                        warn!(action, error = %close_err, "closing connection failed");
                    }
                    Err(e)
                }
            }
        });
        match result {
            Ok(value) => {
                self.available = true;
                Ok(value)
            }
            Err(e) => {
                warn!(action, error = %e, "brick unavailable");
                self.available = false;
                self.entries = None;
                Err(e.into())
            }
        }
    }

    /// Re-reads the current directory.
    pub fn refresh(&mut self) -> Result<&[DirectoryEntry], ExplorerError> {
        let entries = self.with_connection("refresh", |conn, path, _| {
            list_directory(conn, &path.directory())
        })?;
        let entries = self.entries.insert(entries);
        Ok(entries.as_slice())
    }

    /// Descends into the sub-directory `name` of the current listing.
    pub fn enter(&mut self, name: &str) -> Result<&[DirectoryEntry], ExplorerError> {
        if !self.entry(name)?.is_directory() {
            return Err(ExplorerError::NotADirectory(name.to_string()));
        }
        self.path.enter(name)?;
        self.refresh()
    }

    /// Moves to the parent directory.
    pub fn navigate_up(&mut self) -> Result<&[DirectoryEntry], ExplorerError> {
        self.path.navigate_up()?;
        self.refresh()
    }

    /// Deletes the file `name` from the current directory.
    pub fn delete_file(&mut self, name: &str) -> Result<(), ExplorerError> {
        self.file_entry(name)?;
        let target = self.path.absolute(name)?;
        let entries = self.with_connection("delete file", |conn, path, _| {
            delete_entry(conn, &target)?;
            list_directory(conn, &path.directory())
        })?;
        self.entries = Some(entries);
        info!(path = %target, "deleted file");
        Ok(())
    }

    /// Creates the sub-directory `name` in the current directory.
    pub fn create_directory(&mut self, name: &str) -> Result<(), ExplorerError> {
        let target = self.path.absolute(name)?;
        let entries = self.with_connection("create directory", |conn, path, _| {
            create_directory(conn, &target)?;
            list_directory(conn, &path.directory())
        })?;
        self.entries = Some(entries);
        info!(path = %target, "created directory");
        Ok(())
    }

    /// Deletes the current directory, which must be empty, and moves to its
    /// parent.
    pub fn delete_current_directory(&mut self) -> Result<(), ExplorerError> {
        if !self.listing()?.is_empty() {
            return Err(ExplorerError::DirectoryNotEmpty);
        }
        if self.path.is_top() {
            return Err(ExplorerError::AtTop);
        }
        let target = self.path.directory();
        let mut parent = self.path.clone();
        parent.navigate_up()?;
        let entries = self.with_connection("delete directory", |conn, _, _| {
            delete_entry(conn, &target)?;
            list_directory(conn, &parent.directory())
        })?;
        self.entries = Some(entries);
        self.path.navigate_up()?;
        info!(path = %target, "deleted directory");
        Ok(())
    }

    /// Reads the file `name` from the current directory.
    pub fn download(&mut self, name: &str) -> Result<Vec<u8>, ExplorerError> {
        self.file_entry(name)?;
        let source = self.path.absolute(name)?;
        let data = self.with_connection("download", |conn, _, options| {
            read_file(conn, &source, options)
        })?;
        info!(path = %source, bytes = data.len(), "downloaded file");
        Ok(data)
    }

    /// Writes `data` as `name` into the current directory.
    pub fn upload(&mut self, name: &str, data: &[u8]) -> Result<u32, ExplorerError> {
        let target = self.path.absolute(name)?;
        let (written, entries) = self.with_connection("upload", |conn, path, options| {
            let written = write_file(conn, &target, data, options)?;
            Ok((written, list_directory(conn, &path.directory())?))
        })?;
        self.entries = Some(entries);
        info!(path = %target, bytes = written, "uploaded file");
        Ok(written)
    }

    /// Starts the program image `name` in the current directory.
    pub fn run(&mut self, name: &str) -> Result<(), ExplorerError> {
        let target = self.path.absolute(name)?;
        self.with_connection("run", |conn, _, _| run_program(conn, &target))
    }

    /// Compiles `source`, writes the image next to the current directory's
    /// other files and optionally starts it.
    ///
    /// Returns the image's file name. Compilation happens before any
    /// connection is opened.
    pub fn deploy<P: Compiler>(
        &mut self,
        source_name: &str,
        source: &[u8],
        mut compiler: P,
        start: bool,
    ) -> Result<String, ExplorerError> {
        let (kind, image_name) = target_name(source_name)?;
        let image = compiler
            .compile(kind, source)
            .map_err(ExplorerError::Compile)?;
        let target = self.path.absolute(&image_name)?;
        let entries = self.with_connection("deploy", |conn, path, options| {
            write_file(conn, &target, &image, options)?;
            let entries = list_directory(conn, &path.directory())?;
            if start {
                run_program(conn, &target)?;
            }
            Ok(entries)
        })?;
        self.entries = Some(entries);
        info!(path = %target, %kind, bytes = image.len(), started = start, "deployed program");
        Ok(image_name)
    }
}
