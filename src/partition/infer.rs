//! Team inference: which team a channel directory belongs to.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{EtlError, Result};

#[derive(Deserialize)]
struct TeamField {
    #[serde(default)]
    team: Option<String>,
}

/// Message files of a channel directory, sorted by file name.
pub fn message_files(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| EtlError::io(format!("Failed to list {}", dir.display()), e))?;
    let mut files: Vec<_> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    Ok(files)
}

/// First non-empty team ID declared by any message in the files, scanning
/// files in order and messages in array order.
pub fn first_team_id(files: &[std::path::PathBuf]) -> Option<String> {
    for file in files {
        let messages: Vec<TeamField> = match fs::read(file)
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice::<Vec<serde_json::Value>>(&bytes).map_err(|e| e.to_string()))
        {
            Ok(values) => values
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
            Err(error) => {
                warn!(file = %file.display(), error = %error, "Unreadable message file, ignoring for team inference");
                continue;
            }
        };

        if let Some(team) = messages
            .into_iter()
            .filter_map(|m| m.team)
            .find(|team| !team.is_empty())
        {
            debug!(file = %file.display(), team = %team, "Found team ID");
            return Some(team);
        }
    }
    None
}

/// Infer the team owning the channel stored in `dir`.
///
/// Fails with [`EtlError::TeamIdNotFound`] when the directory is missing or
/// no message declares a team.
pub fn infer_team(dir: &Path, channel: &str) -> Result<String> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), "Channel directory not found");
        return Err(EtlError::TeamIdNotFound {
            channel: channel.to_string(),
        });
    }
    let files = message_files(dir)?;
    first_team_id(&files).ok_or_else(|| EtlError::TeamIdNotFound {
        channel: channel.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_day(dir: &Path, day: &str, teams: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        let messages: Vec<serde_json::Value> = teams
            .iter()
            .map(|team| serde_json::json!({"text": "x", "ts": "1.0", "team": team}))
            .collect();
        fs::write(dir.join(format!("{day}.json")), serde_json::to_vec(&messages).unwrap()).unwrap();
    }

    #[test]
    fn test_first_non_empty_team_wins() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("general");
        write_day(&dir, "2024-01-01", &["", "team1", "team2"]);

        assert_eq!(infer_team(&dir, "general").unwrap(), "team1");
    }

    #[test]
    fn test_scan_follows_file_order() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("general");
        write_day(&dir, "2024-01-02", &["team2"]);
        write_day(&dir, "2024-01-01", &[""]);
        fs::write(dir.join("2023-12-31.json"), "not json").unwrap();

        assert_eq!(infer_team(&dir, "general").unwrap(), "team2");
    }

    #[test]
    fn test_all_empty_is_team_id_not_found() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("quiet");
        write_day(&dir, "2024-01-01", &["", ""]);

        let err = infer_team(&dir, "quiet").unwrap_err();
        assert!(matches!(err, EtlError::TeamIdNotFound { channel } if channel == "quiet"));
    }

    #[test]
    fn test_missing_directory_is_team_id_not_found() {
        let root = tempfile::tempdir().unwrap();
        let err = infer_team(&root.path().join("gone"), "gone").unwrap_err();
        assert!(err.is_recoverable());
    }
}
