use crate::coordinate::Coordinate;
use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const HEADER: [&str; 2] = ["latitude", "longitude"];

/// Coordinates read back from the store
#[derive(Debug, Default)]
pub struct LoadedCoordinates {
    pub coordinates: Vec<Coordinate>,
    /// Rows that failed to parse or validate
    pub skipped: usize,
}

/// Append-only CSV file of validated coordinates
#[derive(Debug, Clone)]
pub struct CoordinateStore {
    path: PathBuf,
}

impl CoordinateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append coordinates, writing the header first if the file is new
    ///
    /// A file whose last line is unterminated (hand-edited) gets a line
    /// break first so its last row stays intact.
    pub fn append(&self, coordinates: &[Coordinate]) -> Result<usize> {
        let needs_header = fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let needs_newline = !needs_header && !self.ends_with_newline()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        if needs_newline {
            file.write_all(b"\n")
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if needs_header {
            writer.write_record(HEADER)?;
        }
        for c in coordinates {
            writer.write_record([c.latitude().to_string(), c.longitude().to_string()])?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to save coordinates to {}", self.path.display()))?;

        log::info!(
            "Added {} coordinates to {}",
            coordinates.len(),
            self.path.display()
        );
        Ok(coordinates.len())
    }

    fn ends_with_newline(&self) -> Result<bool> {
        let mut file = File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1))?;
        file.read_exact(&mut last)?;
        Ok(last[0] == b'\n')
    }

    /// Read every valid coordinate
    ///
    /// The first header containing "lat" and the first containing "lon"
    /// (case-insensitive) are used, so files with extra columns load too.
    pub fn load(&self) -> Result<LoadedCoordinates> {
        if !self.path.exists() {
            anyhow::bail!(
                "Coordinates file not found: {}. Create it or add coordinates interactively",
                self.path.display()
            );
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.to_lowercase())
            .collect();
        let lat_col = headers.iter().position(|h| h.contains("lat"));
        let lon_col = headers.iter().position(|h| h.contains("lon"));
        let (Some(lat_col), Some(lon_col)) = (lat_col, lon_col) else {
            anyhow::bail!(
                "Latitude/Longitude columns not found in {}",
                self.path.display()
            );
        };

        let mut loaded = LoadedCoordinates::default();
        for (index, record) in reader.records().enumerate() {
            // +2: header line and 1-based numbering
            let line = index + 2;
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    log::warn!("Skipping unreadable row {}: {}", line, e);
                    loaded.skipped += 1;
                    continue;
                }
            };

            let lat = record.get(lat_col).unwrap_or("");
            let lon = record.get(lon_col).unwrap_or("");
            match format!("{},{}", lat, lon).parse::<Coordinate>() {
                Ok(c) => loaded.coordinates.push(c),
                Err(e) => {
                    log::warn!("Skipping invalid coordinates on row {}: {}", line, e);
                    loaded.skipped += 1;
                }
            }
        }

        log::debug!(
            "Loaded {} coordinates from {} ({} skipped)",
            loaded.coordinates.len(),
            self.path.display(),
            loaded.skipped
        );
        Ok(loaded)
    }
}
