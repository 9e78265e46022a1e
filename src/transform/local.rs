//! Read local copies of the source files for offline runs.
//!
//! Event logs hold one JSON object per line; song files hold a single object each,
//! which reads the same way. Files are visited in path order so results are stable.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

use super::model::{StagingEvent, StagingSong};
use super::star::Staging;

pub fn load_local(log_dir: &Path, song_dir: &Path) -> Result<Staging> {
    Ok(Staging {
        events: read_json_records::<StagingEvent>(log_dir)?,
        songs: read_json_records::<StagingSong>(song_dir)?,
    })
}

/// Every record from every `*.json` file under `dir` (or `dir` itself if it is a file).
pub fn read_json_records<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut records = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walking {}", dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|e| e.to_str()) != Some("json")
        {
            continue;
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let before = records.len();
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record = serde_json::from_str::<T>(line)
                .with_context(|| format!("{}:{}: malformed record", path.display(), idx + 1))?;
            records.push(record);
        }
        debug!(file = %path.display(), records = records.len() - before, "read");
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_nested_json_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let songs = dir.path().join("song_data/A/B");
        fs::create_dir_all(&songs).unwrap();
        fs::write(
            songs.join("TRB.json"),
            r#"{"song_id": "S2", "title": "B", "artist_id": "AR2", "artist_name": "Y"}"#,
        )
        .unwrap();
        fs::write(
            songs.join("TRA.json"),
            r#"{"song_id": "S1", "title": "A", "artist_id": "AR1", "artist_name": "X"}"#,
        )
        .unwrap();
        fs::write(songs.join("notes.txt"), "ignored").unwrap();

        let logs = dir.path().join("log_data");
        fs::create_dir_all(&logs).unwrap();
        fs::write(
            logs.join("2018-11-01-events.json"),
            "{\"page\":\"NextSong\",\"userId\":\"1\",\"ts\":1000,\"song\":\"A\",\"artist\":\"X\",\"level\":\"free\"}\n\n{\"page\":\"Home\",\"userId\":\"\",\"ts\":2000}\n",
        )
        .unwrap();

        let staging = load_local(&logs, &dir.path().join("song_data")).unwrap();
        assert_eq!(staging.events.len(), 2);
        assert_eq!(staging.songs.len(), 2);
        assert_eq!(staging.songs[0].song_id.as_deref(), Some("S1"));
        assert_eq!(staging.events[1].user_id, None);
    }

    #[test]
    fn malformed_record_names_file_and_line() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "{\"ts\":1}\n{not json}\n").unwrap();
        let err = read_json_records::<StagingEvent>(dir.path()).unwrap_err();
        assert!(format!("{err:#}").contains("bad.json:2"));
    }
}
