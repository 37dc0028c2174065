use crate::coordinate::Coordinate;
use crate::geocoding::{GeocodeError, LookupResults, Query};
use crate::projection::{Mercator, ProjectedPoint};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Outcome of the address lookup for one coordinate
#[derive(Debug, Clone, PartialEq)]
pub enum AddressStatus {
    Disabled,
    Found(String),
    NotFound,
    Failed(String),
}

impl AddressStatus {
    fn from_lookup(results: Option<&LookupResults>, coordinate: &Coordinate) -> Self {
        let Some(results) = results else {
            return AddressStatus::Disabled;
        };

        match results.get(&Query::Point(*coordinate).cache_key()) {
            Some(Ok(place)) => AddressStatus::Found(place.display_name.clone()),
            Some(Err(GeocodeError::NotFound(_))) => AddressStatus::NotFound,
            Some(Err(GeocodeError::Network(e))) => AddressStatus::Failed(e.clone()),
            // Lookup off and nothing cached for this position
            None => AddressStatus::Disabled,
        }
    }
}

impl fmt::Display for AddressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressStatus::Disabled => write!(f, "Address lookup disabled"),
            AddressStatus::Found(address) => write!(f, "{}", address),
            AddressStatus::NotFound => write!(f, "Not found"),
            AddressStatus::Failed(e) => write!(f, "Lookup failed: {}", e),
        }
    }
}

/// One coordinate with its projection, reverse projection and address
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRecord {
    pub coordinate: Coordinate,
    pub projected: ProjectedPoint,
    pub reversed: Coordinate,
    pub address: AddressStatus,
}

/// Project every coordinate and attach its address
///
/// `addresses` is `None` when address lookup was not requested. Coordinates
/// missing from `addresses` are reported as [`AddressStatus::Disabled`].
pub fn convert(
    mercator: &Mercator,
    coordinates: &[Coordinate],
    addresses: Option<&LookupResults>,
) -> Vec<ConversionRecord> {
    coordinates
        .iter()
        .filter_map(|coordinate| {
            let projected = mercator.project(coordinate);
            let Some(reversed) = mercator.unproject(&projected) else {
                log::warn!("Skipping {}: projection is not reversible", coordinate);
                return None;
            };

            Some(ConversionRecord {
                coordinate: *coordinate,
                projected,
                reversed,
                address: AddressStatus::from_lookup(addresses, coordinate),
            })
        })
        .collect()
}

#[derive(Serialize)]
struct ReportRow {
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "X")]
    x: f64,
    #[serde(rename = "Y")]
    y: f64,
    #[serde(rename = "Reversed_Lat")]
    reversed_lat: f64,
    #[serde(rename = "Reversed_Lon")]
    reversed_lon: f64,
    #[serde(rename = "Address")]
    address: String,
}

impl From<&ConversionRecord> for ReportRow {
    fn from(r: &ConversionRecord) -> Self {
        Self {
            latitude: r.coordinate.latitude(),
            longitude: r.coordinate.longitude(),
            x: r.projected.x,
            y: r.projected.y,
            reversed_lat: r.reversed.latitude(),
            reversed_lon: r.reversed.longitude(),
            address: r.address.to_string(),
        }
    }
}

/// Write the converted-coordinates report, replacing any previous one
pub fn write_report(path: &Path, records: &[ConversionRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    if records.is_empty() {
        // serialize() only emits the header alongside a first row
        writer.write_record([
            "Latitude",
            "Longitude",
            "X",
            "Y",
            "Reversed_Lat",
            "Reversed_Lon",
            "Address",
        ])?;
    }
    for record in records {
        writer.serialize(ReportRow::from(record))?;
    }
    writer.flush()?;

    log::debug!("Wrote {} rows to {}", records.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoding::Place;
    use std::fs;
    use tempfile::TempDir;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    #[test]
    fn test_convert_without_lookup() {
        let records = convert(
            &Mercator::default(),
            &[coord(0.0, 0.0), coord(47.6062, -122.3321)],
            None,
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].projected, ProjectedPoint { x: 0.0, y: 0.0 });
        assert_eq!(records[0].address, AddressStatus::Disabled);
        assert!((records[1].reversed.latitude() - 47.6062).abs() < 1e-6);
        assert!((records[1].reversed.longitude() + 122.3321).abs() < 1e-6);
    }

    #[test]
    fn test_convert_attaches_addresses() {
        let seattle = coord(47.6062, -122.3321);
        let nowhere = coord(-89.0, 0.0);
        let offline = coord(10.0, 10.0);

        let mut results = LookupResults::new();
        results.insert(
            Query::Point(seattle).cache_key(),
            Ok(Place {
                display_name: "Seattle, WA".to_string(),
                coordinate: seattle,
            }),
        );
        results.insert(
            Query::Point(nowhere).cache_key(),
            Err(GeocodeError::NotFound("-89.0000,0.0000".to_string())),
        );
        results.insert(
            Query::Point(offline).cache_key(),
            Err(GeocodeError::Network("timed out".to_string())),
        );

        let records = convert(
            &Mercator::default(),
            &[seattle, nowhere, offline],
            Some(&results),
        );

        assert_eq!(records[0].address, AddressStatus::Found("Seattle, WA".to_string()));
        assert_eq!(records[1].address.to_string(), "Not found");
        assert_eq!(records[2].address.to_string(), "Lookup failed: timed out");
    }

    #[test]
    fn test_write_report() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("converted_coordinates.csv");

        let records = convert(&Mercator::default(), &[coord(0.0, 0.0)], None);
        write_report(&path, &records)?;

        let contents = fs::read_to_string(&path)?;
        let mut lines = contents.lines();
        assert_eq!(
            lines.next(),
            Some("Latitude,Longitude,X,Y,Reversed_Lat,Reversed_Lon,Address")
        );
        let row: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(row.len(), 7);
        for value in &row[..6] {
            assert!(value.parse::<f64>()?.abs() < 1e-6);
        }
        assert_eq!(row[6], "Address lookup disabled");
        assert_eq!(lines.next(), None);

        // Rewritten, not appended
        write_report(&path, &[])?;
        assert_eq!(fs::read_to_string(&path)?.lines().count(), 1);

        Ok(())
    }
}
