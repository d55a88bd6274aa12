//! Track metadata catalog
//!
//! Reads the training catalog from CSV. Two layouts are accepted:
//!
//! - The FMA `tracks.csv` layout: two header rows naming each column by
//!   `(group, field)`, followed by a `track_id` index row. The id is the
//!   first column, the subset is `(set, subset)` and the genre is
//!   `(track, genre_top)`.
//! - A flat header with `track_id`, `subset` and `genre_top` columns.
//!
//! Audio for a track lives at `root/<first 3 digits>/<6-digit id>.<ext>`.

use crate::error::{GenreError, Result};
use crate::types::TrackRecord;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ID_COLUMN: &str = "track_id";
const SUBSET_COLUMN: (&str, &str) = ("set", "subset");
const GENRE_COLUMN: (&str, &str) = ("track", "genre_top");

/// Column positions resolved from the header rows
#[derive(Debug, Clone, Copy)]
struct Columns {
    id: usize,
    subset: usize,
    genre: usize,
}

/// In-memory catalog of track records
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<TrackRecord>,
}

impl Catalog {
    pub fn from_records(records: Vec<TrackRecord>) -> Self {
        Self { records }
    }

    /// Load a catalog CSV from disk
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => GenreError::FileNotFound(path.to_path_buf()),
            _ => catalog_error(path, e),
        })?;
        let catalog = Self::from_reader(file, path)?;
        info!(
            "Loaded catalog with {} tracks from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Parse catalog CSV from any reader; `path` is only used in error messages
    pub fn from_reader<R: Read>(reader: R, path: &Path) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut rows = csv_reader.records();

        let first = match rows.next() {
            Some(row) => row.map_err(|e| catalog_error(path, e))?,
            None => return Err(catalog_error(path, "file is empty")),
        };

        let columns = if first.iter().any(|field| field.trim() == ID_COLUMN) {
            flat_columns(&first, path)?
        } else {
            let second = match rows.next() {
                Some(row) => row.map_err(|e| catalog_error(path, e))?,
                None => return Err(catalog_error(path, "missing second header row")),
            };
            grouped_columns(&first, &second, path)?
        };
        debug!("Catalog columns: {:?}", columns);

        let mut records = Vec::new();
        for row in rows {
            let row = row.map_err(|e| catalog_error(path, e))?;

            let id_field = row.get(columns.id).unwrap_or("").trim();
            if id_field == ID_COLUMN || (id_field.is_empty() && row.iter().all(|f| f.trim().is_empty())) {
                // Index-name row of the grouped layout, or a blank line
                continue;
            }

            let line = row.position().map(|p| p.line()).unwrap_or(0);
            let track_id: u32 = id_field.parse().map_err(|_| {
                catalog_error(path, format!("line {}: invalid track id '{}'", line, id_field))
            })?;

            let subset = row.get(columns.subset).unwrap_or("").trim();
            let genre = row
                .get(columns.genre)
                .map(str::trim)
                .filter(|g| !g.is_empty());

            records.push(TrackRecord::new(track_id, subset, genre));
        }

        Ok(Self { records })
    }

    pub fn records(&self) -> &[TrackRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records usable for training: genre present, in `subset`, id below `id_ceiling`
    pub fn eligible(&self, subset: &str, id_ceiling: u32) -> Vec<&TrackRecord> {
        self.records
            .iter()
            .filter(|r| r.track_id < id_ceiling && r.subset == subset && r.genre.is_some())
            .collect()
    }
}

/// Location of a track's audio file in the sharded layout
pub fn audio_path(root: &Path, track_id: u32, extension: &str) -> PathBuf {
    let id = format!("{:06}", track_id);
    root.join(&id[..3]).join(format!("{}.{}", id, extension))
}

fn flat_columns(header: &csv::StringRecord, path: &Path) -> Result<Columns> {
    let find = |name: &str| {
        header
            .iter()
            .position(|field| field.trim() == name)
            .ok_or_else(|| catalog_error(path, format!("missing column '{}'", name)))
    };
    Ok(Columns {
        id: find(ID_COLUMN)?,
        subset: find(SUBSET_COLUMN.1)?,
        genre: find(GENRE_COLUMN.1)?,
    })
}

fn grouped_columns(
    groups: &csv::StringRecord,
    fields: &csv::StringRecord,
    path: &Path,
) -> Result<Columns> {
    let find = |(group, field): (&str, &str)| {
        groups
            .iter()
            .zip(fields.iter())
            .position(|(g, f)| g.trim() == group && f.trim() == field)
            .ok_or_else(|| catalog_error(path, format!("missing column '{}/{}'", group, field)))
    };
    Ok(Columns {
        id: 0,
        subset: find(SUBSET_COLUMN)?,
        genre: find(GENRE_COLUMN)?,
    })
}

fn catalog_error(path: &Path, reason: impl std::fmt::Display) -> GenreError {
    GenreError::CatalogError {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUPED: &str = "\
,album,set,set,track,track
,title,split,subset,genre_top,title
track_id,,,,,
2,AWOL,training,small,Hip-Hop,Food
3,AWOL,training,large,,Electric Ave
140,Constant,validation,large,Folk,Queen
106574,Late,test,large,Rock,Too late
";

    #[test]
    fn test_parse_grouped_header() {
        let catalog = Catalog::from_reader(GROUPED.as_bytes(), Path::new("tracks.csv")).unwrap();
        assert_eq!(catalog.len(), 4);
        assert_eq!(catalog.records()[0], TrackRecord::new(2, "small", Some("Hip-Hop")));
        assert_eq!(catalog.records()[1].genre, None);
        assert_eq!(catalog.records()[2], TrackRecord::new(140, "large", Some("Folk")));
    }

    #[test]
    fn test_parse_flat_header() {
        let csv = "track_id,genre_top,subset\n5,Rock,large\n6,,large\n";
        let catalog = Catalog::from_reader(csv.as_bytes(), Path::new("flat.csv")).unwrap();
        assert_eq!(
            catalog.records(),
            &[
                TrackRecord::new(5, "large", Some("Rock")),
                TrackRecord::new(6, "large", None),
            ]
        );
    }

    #[test]
    fn test_missing_column_is_catalog_error() {
        let csv = "track_id,genre_top\n5,Rock\n";
        let err = Catalog::from_reader(csv.as_bytes(), Path::new("bad.csv")).unwrap_err();
        assert!(matches!(err, GenreError::CatalogError { ref reason, .. } if reason.contains("subset")));
    }

    #[test]
    fn test_invalid_id_is_catalog_error() {
        let csv = "track_id,genre_top,subset\nabc,Rock,large\n";
        let err = Catalog::from_reader(csv.as_bytes(), Path::new("bad.csv")).unwrap_err();
        assert!(matches!(err, GenreError::CatalogError { .. }));
    }

    #[test]
    fn test_empty_catalog_file() {
        let err = Catalog::from_reader("".as_bytes(), Path::new("empty.csv")).unwrap_err();
        assert!(matches!(err, GenreError::CatalogError { .. }));
    }

    #[test]
    fn test_eligibility_filter() {
        let catalog = Catalog::from_reader(GROUPED.as_bytes(), Path::new("tracks.csv")).unwrap();
        let eligible = catalog.eligible("large", 106_574);
        // Drops: wrong subset (2), no genre (3), id at the ceiling (106574)
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].track_id, 140);
    }

    #[test]
    fn test_missing_catalog_file() {
        let err = Catalog::from_csv_path(Path::new("/no/such/tracks.csv")).unwrap_err();
        assert!(matches!(err, GenreError::FileNotFound(_)));
    }

    #[test]
    fn test_sharded_audio_path() {
        let root = Path::new("/data/fma_large");
        assert_eq!(
            audio_path(root, 2, "mp3"),
            PathBuf::from("/data/fma_large/000/000002.mp3")
        );
        assert_eq!(
            audio_path(root, 106_573, "wav"),
            PathBuf::from("/data/fma_large/106/106573.wav")
        );
    }
}
