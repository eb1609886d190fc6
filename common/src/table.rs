use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use eyre::{Context, ContextCompat, Result};
use serde::de::DeserializeOwned;
use tokio::fs::{read_dir, read_to_string};
use tracing::debug;

/// Parse CSV text with a header row into typed rows. Columns the row type
/// does not name are ignored.
pub fn parse_csv<T: DeserializeOwned>(data: &str, delimiter: u8) -> Result<Vec<T>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::All)
        .from_reader(data.as_bytes());
    let rows = reader
        .deserialize::<T>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub async fn read_csv<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let data = read_to_string(path)
        .await
        .with_context(|| format!("Read {path:?}"))?;
    let rows = parse_csv(&data, b',').with_context(|| format!("Parse {path:?}"))?;
    debug!("Loaded {} rows from {path:?}", rows.len());
    Ok(rows)
}

/// Tab when the header line has more tabs than commas, comma otherwise
pub fn detect_delimiter(data: &str) -> u8 {
    let header = data.lines().next().unwrap_or_default();
    let tabs = header.matches('\t').count();
    let commas = header.matches(',').count();
    if tabs > commas { b'\t' } else { b',' }
}

/// Like [`read_csv`], but the file may separate fields with tabs instead of
/// commas. The header line decides which.
pub async fn read_delimited<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let data = read_to_string(path)
        .await
        .with_context(|| format!("Read {path:?}"))?;
    let rows = parse_csv(&data, detect_delimiter(&data))
        .with_context(|| format!("Parse {path:?}"))?;
    debug!("Loaded {} rows from {path:?}", rows.len());
    Ok(rows)
}

/// Files in `dir` ending in `.{ext}`, sorted by name
pub async fn list_files(dir: impl AsRef<Path>, ext: &str) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut entries = read_dir(dir)
        .await
        .with_context(|| format!("List {dir:?}"))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file()
            && path.extension().and_then(|x| x.to_str()) == Some(ext)
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|x| x.to_str())
        .map(str::to_owned)
        .with_context(|| format!("Invalid file name {path:?}"))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use tempfile::TempDir;

    use super::*;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Latency {
        cache: String,
        ns: f64,
    }

    #[test]
    fn ignores_unknown_columns_and_trims() {
        let rows: Vec<Latency> = parse_csv("cache, extra ,ns\nL1, x, 1.5\nDRAM,y,80\n", b',').unwrap();
        assert_eq!(
            rows,
            vec![
                Latency {
                    cache: "L1".to_owned(),
                    ns: 1.5
                },
                Latency {
                    cache: "DRAM".to_owned(),
                    ns: 80.0
                },
            ]
        );
    }

    #[test]
    fn missing_column_is_an_error() {
        let res = parse_csv::<Latency>("cache\nL1\n", b',');
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn reads_tab_separated_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache_latencies.csv");
        std::fs::write(&path, "cache\tns\nL2\t4.25\n\"L3, shared\"\t12\n").unwrap();
        let rows: Vec<Latency> = read_delimited(&path).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ns, 4.25);
        assert_eq!(rows[1].cache, "L3, shared");
    }

    #[tokio::test]
    async fn quoted_tabs_survive_comma_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("latency.csv");
        std::fs::write(&path, "cache,ns\n\"L1\td\",1.5\n").unwrap();
        let rows: Vec<Latency> = read_delimited(&path).await.unwrap();
        assert_eq!(rows[0].cache, "L1\td");
        assert_eq!(rows[0].ns, 1.5);
    }

    #[test]
    fn delimiter_comes_from_the_header() {
        assert_eq!(detect_delimiter("a\tb\n1,2\n"), b'\t');
        assert_eq!(detect_delimiter("a,b\n1\t2\n"), b',');
        assert_eq!(detect_delimiter(""), b',');
    }

    #[tokio::test]
    async fn read_errors_name_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.csv");
        let err = read_csv::<Latency>(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("missing.csv"));
    }

    #[tokio::test]
    async fn lists_files_sorted_by_name() {
        let dir = TempDir::new().unwrap();
        for name in ["b.csv", "a.csv", "notes.txt", "c.json"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        std::fs::create_dir(dir.path().join("d.csv")).unwrap();
        let files = list_files(dir.path(), "csv").await.unwrap();
        let names = files
            .iter()
            .map(|x| x.file_name().unwrap().to_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(names, ["a.csv", "b.csv"]);
    }
}
