//! CSV archiving
//!
//! An [`Archiver`] writes one timestamped CSV row per call into a file below
//! the session's archive root. Structs wanting to be archived implement
//! [`Archived`] and hold one `Archiver` per archive file.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
pub use csv::Writer;
use csv::WriterBuilder;
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use thiserror::Error;

// Internal imports
use crate::session::{get_elapsed_seconds, Session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
#[derive(Default)]
pub struct Archiver {
    writer: Option<Writer<File>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Could not create the archive file: {0}")]
    FileError(std::io::Error),

    #[error("Could not write the record: {0}")]
    CsvError(csv::Error),

    #[error("The archiver has not been initialised")]
    NotInitialised,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A trait which enables a struct to be archived as a timestamped csv.
pub trait Archived {
    /// Write the archives for this struct
    fn write(&mut self) -> Result<(), ArchiveError>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver from a paricular path relative to the session's
    /// archive root.
    ///
    /// `header` is written as the first row, prefixed by the `time_s` column.
    pub fn from_path<P: AsRef<Path>>(
        session: &Session,
        path: P,
        header: &[&str],
    ) -> Result<Self, ArchiveError> {
        Self::from_full_path(session.arch_root.join(path), header)
    }

    /// Create a new archiver writing to the given file, truncating it.
    pub fn from_full_path<P: AsRef<Path>>(
        path: P,
        header: &[&str],
    ) -> Result<Self, ArchiveError> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).map_err(ArchiveError::FileError)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(ArchiveError::FileError)?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

        writer
            .write_record(std::iter::once("time_s").chain(header.iter().copied()))
            .map_err(ArchiveError::CsvError)?;
        writer.flush().map_err(ArchiveError::FileError)?;

        Ok(Self {
            writer: Some(writer),
        })
    }

    /// Write a row of values into the archive, stamped with the session time.
    pub fn write_row<I, T>(&mut self, values: I) -> Result<(), ArchiveError>
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        let writer = self.writer.as_mut().ok_or(ArchiveError::NotInitialised)?;

        let time_s = format!("{:.6}", get_elapsed_seconds());
        let row: Vec<String> = std::iter::once(time_s)
            .chain(values.into_iter().map(|v| v.to_string()))
            .collect();

        writer.write_record(&row).map_err(ArchiveError::CsvError)?;
        writer.flush().map_err(ArchiveError::FileError)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_write_rows() -> Result<(), ArchiveError> {
        let path = std::env::temp_dir()
            .join(format!("util_archive_test_{}", std::process::id()))
            .join("rows.csv");

        let mut arch = Archiver::from_full_path(&path, &["seq", "j0"])?;
        arch.write_row(vec![String::from("0"), String::from("1.5")])?;
        arch.write_row(&[1.0, 2.5])?;

        let contents = fs::read_to_string(&path).map_err(ArchiveError::FileError)?;
        let lines: Vec<&str> = contents.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "time_s,seq,j0");
        assert!(lines[1].ends_with(",0,1.5"));
        assert!(lines[2].ends_with(",1,2.5"));

        Ok(())
    }

    #[test]
    fn test_uninitialised() {
        let mut arch = Archiver::default();
        match arch.write_row(&[1]) {
            Err(ArchiveError::NotInitialised) => (),
            r => panic!("Expected NotInitialised, got {:?}", r),
        }
    }
}
