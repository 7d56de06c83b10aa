use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use clap::ValueEnum;
use tracing::{info, warn};

use crate::error::LoadError;
use crate::types::{Rating, RatingVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputFormat {
    /// Pick from the file extension: `.csv` is csv, everything else jsonl.
    Auto,
    /// One JSON object per line (Yelp review dump).
    Jsonl,
    /// Header row with user_id,business_id,stars.
    Csv,
}

impl InputFormat {
    pub fn resolve(self, path: &Path) -> InputFormat {
        match self {
            InputFormat::Auto => {
                let is_csv = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
                if is_csv {
                    InputFormat::Csv
                } else {
                    InputFormat::Jsonl
                }
            }
            other => other,
        }
    }
}

/// What to do with a record that cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum MalformedPolicy {
    #[default]
    Abort,
    Skip,
}

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub format: InputFormat,
    pub on_malformed: MalformedPolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            format: InputFormat::Auto,
            on_malformed: MalformedPolicy::Abort,
        }
    }
}

/// user_id -> ratings. Users iterate in lexicographic order. Never mutated
/// once loading is finished.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RatingStore {
    ratings: BTreeMap<String, RatingVector>,
    skipped: usize,
}

impl RatingStore {
    pub fn from_ratings(ratings: impl IntoIterator<Item = Rating>) -> Self {
        let mut store = RatingStore::default();
        for rating in ratings {
            store.insert(rating);
        }
        store
    }

    pub fn load(path: impl AsRef<Path>, options: LoadOptions) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let format = options.format.resolve(path);
        info!(path = %path.display(), ?format, "Loading ratings");

        let file = File::open(path)?;
        let store = match format {
            InputFormat::Csv => Self::from_csv_reader(file, options.on_malformed)?,
            _ => Self::from_jsonl_reader(BufReader::new(file), options.on_malformed)?,
        };

        info!(
            users = store.len(),
            businesses = store.num_businesses(),
            ratings = store.num_ratings(),
            skipped = store.skipped,
            "Ratings loaded"
        );
        Ok(store)
    }

    pub fn from_jsonl_reader(
        reader: impl BufRead,
        on_malformed: MalformedPolicy,
    ) -> Result<Self, LoadError> {
        let mut store = RatingStore::default();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            // Yelp review text carries `\.`, which is not a valid JSON escape
            let line = line.replace("\\.", "");
            match serde_json::from_str::<Rating>(&line) {
                Ok(rating) => store.insert(rating),
                Err(e) => store.reject(idx + 1, e.to_string(), on_malformed)?,
            }
        }
        Ok(store)
    }

    pub fn from_csv_reader(
        reader: impl Read,
        on_malformed: MalformedPolicy,
    ) -> Result<Self, LoadError> {
        let mut data = csv::Reader::from_reader(reader);
        let mut store = RatingStore::default();
        for result in data.deserialize::<Rating>() {
            match result {
                Ok(rating) => store.insert(rating),
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    let line = e.position().map(|pos| pos.line() as usize).unwrap_or_default();
                    store.reject(line, e.to_string(), on_malformed)?;
                }
            }
        }
        Ok(store)
    }

    fn reject(
        &mut self,
        line: usize,
        message: String,
        on_malformed: MalformedPolicy,
    ) -> Result<(), LoadError> {
        match on_malformed {
            MalformedPolicy::Abort => Err(LoadError::Parse { line, message }),
            MalformedPolicy::Skip => {
                warn!(line, %message, "Skipping malformed record");
                self.skipped += 1;
                Ok(())
            }
        }
    }

    /// Last write wins for a repeated (user, business) pair.
    fn insert(&mut self, rating: Rating) {
        self.ratings
            .entry(rating.user_id)
            .or_default()
            .insert(rating.business_id, rating.stars);
    }

    pub fn get(&self, user_id: &str) -> Option<&RatingVector> {
        self.ratings.get(user_id)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.ratings.contains_key(user_id)
    }

    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.ratings.keys().map(|s| s.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RatingVector)> {
        self.ratings.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn num_ratings(&self) -> usize {
        self.ratings.values().map(|v| v.len()).sum()
    }

    pub fn num_businesses(&self) -> usize {
        self.ratings
            .values()
            .flat_map(|v| v.keys())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Records dropped under [`MalformedPolicy::Skip`].
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[cfg(test)]
pub(crate) fn rating(user_id: &str, business_id: &str, stars: u32) -> Rating {
    Rating {
        user_id: user_id.to_string(),
        business_id: business_id.to_string(),
        stars,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const YELP_LINES: &str = concat!(
        r#"{"review_id":"r1","user_id":"u1","business_id":"b1","stars":5,"text":"great"}"#,
        "\n",
        r#"{"review_id":"r2","user_id":"u1","business_id":"b2","stars":3}"#,
        "\n\n",
        r#"{"review_id":"r3","user_id":"u2","business_id":"b1","stars":4,"date":"2012-01-01"}"#,
        "\n",
    );

    #[test]
    fn test_jsonl_load() -> Result<(), LoadError> {
        let store =
            RatingStore::from_jsonl_reader(Cursor::new(YELP_LINES), MalformedPolicy::Abort)?;

        assert_eq!(store.len(), 2);
        assert_eq!(store.num_ratings(), 3);
        assert_eq!(store.num_businesses(), 2);
        assert_eq!(store.get("u1").and_then(|v| v.get("b2")), Some(&3));
        assert_eq!(store.users().collect::<Vec<_>>(), vec!["u1", "u2"]);
        Ok(())
    }

    #[test]
    fn test_last_write_wins() {
        let store = RatingStore::from_ratings(vec![
            rating("u1", "b1", 2),
            rating("u1", "b1", 5),
        ]);
        assert_eq!(store.get("u1").map(|v| v.len()), Some(1));
        assert_eq!(store.get("u1").and_then(|v| v.get("b1")), Some(&5));
    }

    #[test]
    fn test_malformed_line_aborts_with_line_number() {
        let input = concat!(
            r#"{"user_id":"u1","business_id":"b1","stars":5}"#,
            "\n",
            r#"{"user_id":"u1","stars":"five"}"#,
            "\n",
        );
        let err = RatingStore::from_jsonl_reader(Cursor::new(input), MalformedPolicy::Abort)
            .expect_err("second line is malformed");
        match err {
            LoadError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_line_skipped() -> Result<(), LoadError> {
        let input = concat!(
            "not json\n",
            r#"{"user_id":"u1","business_id":"b1","stars":-1}"#,
            "\n",
            r#"{"user_id":"u2","business_id":"b1","stars":4}"#,
            "\n",
        );
        let store = RatingStore::from_jsonl_reader(Cursor::new(input), MalformedPolicy::Skip)?;
        assert_eq!(store.len(), 1);
        assert_eq!(store.skipped(), 2);
        assert!(store.contains("u2"));
        Ok(())
    }

    #[test]
    fn test_jsonl_strips_invalid_dot_escape() -> Result<(), LoadError> {
        let input = concat!(
            r#"{"user_id":"u1","business_id":"b1","stars":5,"text":"great food\. really"}"#,
            "\n",
            r#"{"user_id":"u2","business_id":"b1","stars":4,"text":"ok\."}"#,
            "\n",
        );
        let store = RatingStore::from_jsonl_reader(Cursor::new(input), MalformedPolicy::Abort)?;

        assert_eq!(store.len(), 2);
        assert_eq!(store.skipped(), 0);
        assert_eq!(store.get("u1").and_then(|v| v.get("b1")), Some(&5));
        Ok(())
    }

    #[test]
    fn test_csv_malformed_rows_skipped() -> Result<(), LoadError> {
        let input = "user_id,business_id,stars\nu1,b1,5\nu2,b2,abc\nu3,b3\nu4,b4,2\n";
        let store = RatingStore::from_csv_reader(Cursor::new(input), MalformedPolicy::Skip)?;

        assert_eq!(store.skipped(), 2);
        assert_eq!(store.users().collect::<Vec<_>>(), vec!["u1", "u4"]);
        assert_eq!(store.get("u4").and_then(|v| v.get("b4")), Some(&2));
        Ok(())
    }

    #[test]
    fn test_csv_short_row_reports_line() {
        let input = "user_id,business_id,stars\nu1,b1,5\nu2,b2,4\nu3,b3\n";
        let err = RatingStore::from_csv_reader(Cursor::new(input), MalformedPolicy::Abort)
            .expect_err("last row is missing stars");
        assert!(matches!(err, LoadError::Parse { line: 4, .. }), "{err:?}");
    }

    #[test]
    fn test_csv_load_and_reload_is_idempotent() -> anyhow::Result<()> {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile()?;
        writeln!(file, "user_id,business_id,stars")?;
        writeln!(file, "u1,b1,5")?;
        writeln!(file, "u2,b1,4")?;
        writeln!(file, "u1,b1,1")?;
        file.flush()?;

        let first = RatingStore::load(file.path(), LoadOptions::default())?;
        let second = RatingStore::load(file.path(), LoadOptions::default())?;

        assert_eq!(first, second);
        assert_eq!(first.get("u1").and_then(|v| v.get("b1")), Some(&1));
        Ok(())
    }

    #[test]
    fn test_csv_malformed_row() {
        let input = "user_id,business_id,stars\nu1,b1,5\nu2,b2,abc\n";
        let err = RatingStore::from_csv_reader(Cursor::new(input), MalformedPolicy::Abort)
            .expect_err("stars is not a number");
        assert!(matches!(err, LoadError::Parse { line: 3, .. }), "{err:?}");
    }

    #[test]
    fn test_missing_file() {
        let err = RatingStore::load("does/not/exist.json", LoadOptions::default())
            .expect_err("file does not exist");
        assert!(matches!(err, LoadError::Io(_)));
    }

    #[test]
    fn test_format_resolution() {
        assert_eq!(InputFormat::Auto.resolve(Path::new("r.CSV")), InputFormat::Csv);
        assert_eq!(InputFormat::Auto.resolve(Path::new("reviews.json")), InputFormat::Jsonl);
        assert_eq!(InputFormat::Csv.resolve(Path::new("reviews.json")), InputFormat::Csv);
    }
}
