//! Team partitioning for exports spanning several teams.
//!
//! Runs in two phases so each can be tested on its own:
//!
//! 1. [`TeamPartitioner::plan`] scans every listed channel's message files and
//!    infers its team. Channels whose team cannot be determined are recorded
//!    as skipped.
//! 2. [`TeamPartitioner::apply`] moves each planned channel directory to
//!    `teams/<team>/<dir>` and appends its descriptor to that team's listing.
//!
//! [`TeamPartitioner::partition`] runs both, then copies `users.json` into
//! every team tree and archives each tree on its own.
//!
//! Relocation is sequential: every channel of a team appends to the same
//! listing file.

pub mod infer;

pub use infer::infer_team;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::archive::ArchiveIo;
use crate::error::{EtlError, Result};
use crate::model::ChannelType;
use crate::parser::{listing_file, USERS_FILE};
use crate::util::atomic_write;

/// Directory under the export root receiving per-team trees.
pub const TEAMS_DIR: &str = "teams";

/// Team ID to team name mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamMap {
    names: HashMap<String, String>,
}

impl TeamMap {
    /// Build from pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            names: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Load a JSON object `{"<team id>": "<team name>", ...}`.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EtlError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                EtlError::io(format!("Failed to read {}", path.display()), e)
            }
        })?;
        let names: HashMap<String, String> =
            serde_json::from_slice(&bytes).map_err(|e| EtlError::parse(path.display().to_string(), e))?;
        Ok(Self { names })
    }

    /// Team name for an ID.
    pub fn resolve(&self, team_id: &str) -> Result<&str> {
        self.names
            .get(team_id)
            .map(String::as_str)
            .ok_or_else(|| EtlError::TeamNameNotFound {
                team_id: team_id.to_string(),
            })
    }

    /// Number of mapped teams.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A channel scheduled for relocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelsToMove {
    /// Raw channel descriptor, written unchanged to the team listing.
    pub descriptor: Value,
    /// Channel ID.
    pub id: String,
    /// Listing category.
    pub kind: ChannelType,
    /// Directory segment under the export root.
    pub dir: String,
    /// Inferred team ID.
    pub team_id: String,
    /// Team name from the team map.
    pub team_name: String,
    /// Whether the directory has been moved.
    pub moved: bool,
}

/// A channel left out of every team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedChannel {
    /// Channel ID.
    pub id: String,
    /// Directory segment.
    pub dir: String,
    /// Why it was skipped.
    pub reason: String,
}

/// Output of the planning phase.
#[derive(Debug, Clone, Default)]
pub struct PartitionPlan {
    /// Channels to relocate, in listing order.
    pub moves: Vec<ChannelsToMove>,
    /// Channels that could not be assigned.
    pub skipped: Vec<SkippedChannel>,
}

/// One per-team archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamArchive {
    /// Team name.
    pub team: String,
    /// Archive path.
    pub path: PathBuf,
    /// Channels relocated into the team.
    pub channels: usize,
}

/// Result of a partitioning run.
#[derive(Debug, Clone, Default)]
pub struct PartitionReport {
    /// Archives written, sorted by team name.
    pub teams: Vec<TeamArchive>,
    /// Channels left out.
    pub skipped: Vec<SkippedChannel>,
}

fn descriptor_str<'v>(descriptor: &'v Value, field: &str) -> &'v str {
    descriptor.get(field).and_then(Value::as_str).unwrap_or_default()
}

/// Directory segment for a descriptor: the ID for DMs, otherwise the name.
fn channel_dir(descriptor: &Value, kind: ChannelType) -> String {
    let name = descriptor_str(descriptor, "name");
    if kind == ChannelType::Direct || name.is_empty() {
        descriptor_str(descriptor, "id").to_string()
    } else {
        name.to_string()
    }
}

/// Team names become directory names.
///
/// Separators are replaced, and names that resolve to the current or parent
/// directory become `_`.
fn team_dir_name(team: &str) -> String {
    match team {
        "" | "." | ".." => "_".to_string(),
        _ => team
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
            .collect(),
    }
}

fn read_listing(path: &Path) -> Result<Vec<Value>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let bytes = fs::read(path).map_err(|e| EtlError::io(format!("Failed to read {}", path.display()), e))?;
    serde_json::from_slice(&bytes).map_err(|e| EtlError::parse(path.display().to_string(), e))
}

fn write_listing(path: &Path, listing: &[Value]) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(listing).map_err(|e| EtlError::SerializationError {
        context: format!("Failed to serialize {}", path.display()),
        source: e,
    })?;
    atomic_write(path, &bytes)
}

/// Splits a multi-team export into per-team archives.
pub struct TeamPartitioner<'a> {
    archive: &'a dyn ArchiveIo,
    teams: TeamMap,
}

impl<'a> TeamPartitioner<'a> {
    /// Create a partitioner.
    pub fn new(archive: &'a dyn ArchiveIo, teams: TeamMap) -> Self {
        Self { archive, teams }
    }

    /// Scan the extracted export at `root` and decide where every channel goes.
    ///
    /// Only structural problems (an unreadable listing) are errors.
    #[instrument(skip(self), fields(root = %root.display()))]
    pub fn plan(&self, root: &Path) -> Result<PartitionPlan> {
        let mut plan = PartitionPlan::default();
        let mut seen: HashSet<String> = HashSet::new();

        for kind in ChannelType::ALL {
            let listing = read_listing(&root.join(listing_file(kind)))?;
            debug!(kind = %kind, channels = listing.len(), "Planning channel listing");

            for descriptor in listing {
                let id = descriptor_str(&descriptor, "id").to_string();
                let dir = channel_dir(&descriptor, kind);
                if dir.is_empty() {
                    warn!(kind = %kind, "Channel descriptor without ID or name, skipping");
                    continue;
                }
                if !seen.insert(dir.clone()) {
                    debug!(channel = %dir, "Channel already planned");
                    continue;
                }

                let assigned = infer_team(&root.join(&dir), &dir).and_then(|team_id| {
                    let team_name = self.teams.resolve(&team_id)?.to_string();
                    Ok((team_id, team_name))
                });
                match assigned {
                    Ok((team_id, team_name)) => plan.moves.push(ChannelsToMove {
                        descriptor,
                        id,
                        kind,
                        dir,
                        team_id,
                        team_name,
                        moved: false,
                    }),
                    Err(e) if e.is_recoverable() => {
                        warn!(channel = %dir, error = %e, "Cannot assign channel to a team, skipping");
                        plan.skipped.push(SkippedChannel {
                            id,
                            dir,
                            reason: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        info!(
            planned = plan.moves.len(),
            skipped = plan.skipped.len(),
            "Partition plan ready"
        );
        Ok(plan)
    }

    /// Relocate every planned channel under `root/teams/<team>/`.
    ///
    /// Returns the team directories touched, keyed by team name. Any I/O
    /// failure aborts the run.
    #[instrument(skip(self, plan), fields(root = %root.display(), moves = plan.moves.len()))]
    pub fn apply(&self, root: &Path, plan: &mut PartitionPlan) -> Result<BTreeMap<String, (PathBuf, usize)>> {
        let mut touched: BTreeMap<String, (PathBuf, usize)> = BTreeMap::new();

        for channel in plan.moves.iter_mut().filter(|c| !c.moved) {
            let team_dir = root.join(TEAMS_DIR).join(team_dir_name(&channel.team_name));
            let from = root.join(&channel.dir);
            let to = team_dir.join(&channel.dir);

            fs::create_dir_all(&team_dir)
                .map_err(|e| EtlError::io(format!("Failed to create {}", team_dir.display()), e))?;
            fs::rename(&from, &to).map_err(|e| {
                EtlError::io(format!("Failed to move {} to {}", from.display(), to.display()), e)
            })?;

            let listing_path = team_dir.join(listing_file(channel.kind));
            let mut listing = read_listing(&listing_path)?;
            listing.push(channel.descriptor.clone());
            write_listing(&listing_path, &listing)?;

            channel.moved = true;
            debug!(channel = %channel.dir, team = %channel.team_name, "Relocated channel");

            let entry = touched
                .entry(channel.team_name.clone())
                .or_insert_with(|| (team_dir.clone(), 0));
            entry.1 += 1;
        }

        Ok(touched)
    }

    /// Split the export extracted at `root`, writing `<out_dir>/<team>.zip`
    /// for every team that received at least one channel.
    #[instrument(skip(self), fields(root = %root.display(), out = %out_dir.display()))]
    pub fn partition(&self, root: &Path, out_dir: &Path) -> Result<PartitionReport> {
        let mut plan = self.plan(root)?;
        let touched = self.apply(root, &mut plan)?;

        let users = root.join(USERS_FILE);
        let mut report = PartitionReport {
            skipped: plan.skipped,
            ..PartitionReport::default()
        };

        for (team, (team_dir, channels)) in touched {
            if users.is_file() {
                fs::copy(&users, team_dir.join(USERS_FILE)).map_err(|e| {
                    EtlError::io(format!("Failed to copy users into {}", team_dir.display()), e)
                })?;
            }
            for kind in ChannelType::ALL {
                let listing = team_dir.join(listing_file(kind));
                if !listing.exists() {
                    write_listing(&listing, &[])?;
                }
            }

            let path = out_dir.join(format!("{}.zip", team_dir_name(&team)));
            self.archive.compress(&team_dir, &path)?;
            info!(team = %team, channels, archive = %path.display(), "Team archive written");
            report.teams.push(TeamArchive { team, path, channels });
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ExportSource, ZipArchiveIo, ZipSource};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn write_json(path: &Path, value: &Value) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_vec(value).unwrap()).unwrap();
    }

    #[test]
    fn test_team_dir_name_stays_inside_teams_dir() {
        assert_eq!(team_dir_name("red"), "red");
        assert_eq!(team_dir_name("a/b\\c"), "a_b_c");
        for name in ["", ".", ".."] {
            let dir = team_dir_name(name);
            assert_eq!(dir, "_");
            assert_eq!(Path::new("teams").join(&dir).parent(), Some(Path::new("teams")));
        }
        assert_eq!(team_dir_name("..."), "...");
    }

    fn grid_export() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let r = root.path();
        write_json(
            &r.join("channels.json"),
            &json!([
                {"id": "C1", "name": "alpha", "members": ["U1"]},
                {"id": "C2", "name": "beta", "members": ["U2"]},
                {"id": "C3", "name": "quiet"},
                {"id": "C4", "name": "orphan"}
            ]),
        );
        write_json(&r.join("groups.json"), &json!([{"id": "G1", "name": "alpha"}]));
        write_json(&r.join("dms.json"), &json!([{"id": "D1", "members": ["U1", "U2"]}]));
        write_json(&r.join("users.json"), &json!([{"id": "U1", "name": "alice"}, {"id": "U2", "name": "bob"}]));
        write_json(&r.join("alpha/2024-01-01.json"), &json!([{"text": "a", "team": ""}, {"text": "b", "team": "T1"}]));
        write_json(&r.join("beta/2024-01-01.json"), &json!([{"text": "c", "team": "T2"}]));
        write_json(&r.join("quiet/2024-01-01.json"), &json!([{"text": "d", "team": ""}]));
        write_json(&r.join("orphan/2024-01-01.json"), &json!([{"text": "e", "team": "T9"}]));
        write_json(&r.join("D1/2024-01-01.json"), &json!([{"text": "f", "team": "T1"}]));
        root
    }

    fn team_map() -> TeamMap {
        TeamMap::from_pairs([("T1", "red"), ("T2", "blue")])
    }

    #[test]
    fn test_plan_infers_and_skips() {
        let root = grid_export();
        let io = ZipArchiveIo::new();
        let plan = TeamPartitioner::new(&io, team_map()).plan(root.path()).unwrap();

        let moves: Vec<(&str, &str)> = plan
            .moves
            .iter()
            .map(|m| (m.dir.as_str(), m.team_name.as_str()))
            .collect();
        assert_eq!(moves, vec![("alpha", "red"), ("beta", "blue"), ("D1", "red")]);

        let skipped: Vec<&str> = plan.skipped.iter().map(|s| s.dir.as_str()).collect();
        assert_eq!(skipped, vec!["quiet", "orphan"]);
        assert!(plan.skipped[0].reason.contains("Team ID not found"));
        assert!(plan.skipped[1].reason.contains("Team name not found"));
    }

    #[test]
    fn test_apply_relocates_and_appends() {
        let root = grid_export();
        let io = ZipArchiveIo::new();
        let partitioner = TeamPartitioner::new(&io, team_map());
        let mut plan = partitioner.plan(root.path()).unwrap();

        let touched = partitioner.apply(root.path(), &mut plan).unwrap();

        assert!(plan.moves.iter().all(|m| m.moved));
        assert_eq!(touched["red"].1, 2);
        let red = root.path().join("teams/red");
        assert!(red.join("alpha/2024-01-01.json").is_file());
        assert!(red.join("D1/2024-01-01.json").is_file());
        assert!(!root.path().join("alpha").exists());
        assert!(root.path().join("quiet").exists());

        let channels = read_listing(&red.join("channels.json")).unwrap();
        assert_eq!(channels, vec![json!({"id": "C1", "name": "alpha", "members": ["U1"]})]);
        let dms = read_listing(&red.join("dms.json")).unwrap();
        assert_eq!(dms.len(), 1);

        // A second apply is a no-op
        let again = partitioner.apply(root.path(), &mut plan).unwrap();
        assert!(again.is_empty());
    }

    #[test]
    fn test_partition_writes_team_archives() {
        let root = grid_export();
        let out = tempfile::tempdir().unwrap();
        let io = ZipArchiveIo::new();

        let report = TeamPartitioner::new(&io, team_map())
            .partition(root.path(), out.path())
            .unwrap();

        let teams: Vec<(&str, usize)> = report.teams.iter().map(|t| (t.team.as_str(), t.channels)).collect();
        assert_eq!(teams, vec![("blue", 1), ("red", 2)]);
        assert_eq!(report.skipped.len(), 2);

        let zip = ZipSource::open(out.path().join("red.zip")).unwrap();
        assert_eq!(
            zip.entry_names(),
            vec![
                "D1/2024-01-01.json",
                "alpha/2024-01-01.json",
                "channels.json",
                "dms.json",
                "groups.json",
                "mpims.json",
                "users.json",
            ]
        );
    }

    #[test]
    fn test_team_map_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("teams.json");
        fs::write(&path, r#"{"T1": "red"}"#).unwrap();

        let map = TeamMap::load(&path).unwrap();
        assert_eq!(map.resolve("T1").unwrap(), "red");
        assert!(matches!(map.resolve("T2"), Err(EtlError::TeamNameNotFound { .. })));
        assert!(matches!(
            TeamMap::load(&dir.path().join("missing.json")),
            Err(EtlError::FileNotFound { .. })
        ));
    }
}
