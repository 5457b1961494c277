use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Read one JSON object per line. Blank lines are skipped.
pub fn read_jsonl<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut out = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let rec = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid JSON record", path.display(), i + 1))?;
        out.push(rec);
    }
    Ok(out)
}

pub fn write_jsonl<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let mut w = BufWriter::new(File::create(path).with_context(|| format!("creating {}", path.display()))?);
    for rec in records {
        serde_json::to_writer(&mut w, rec)?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QaRecord;

    #[test]
    fn writes_then_reads_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/qa.jsonl");
        let recs = vec![
            QaRecord { subject_id: 1.into(), summary_original: "one".into(), ..QaRecord::default() },
            QaRecord { subject_id: 2.into(), summary_original: "two".into(), ..QaRecord::default() },
        ];
        write_jsonl(&path, &recs).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        let back: Vec<QaRecord> = read_jsonl(&path).unwrap();
        assert_eq!(back, recs);
    }

    #[test]
    fn bad_line_reports_its_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        fs::write(&path, "{}\n\n{not json}\n").unwrap();
        let err = read_jsonl::<QaRecord>(&path).unwrap_err();
        assert!(format!("{err:#}").contains("bad.jsonl:3"));
    }
}
