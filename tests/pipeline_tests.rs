//! End-to-end runs over small track/artist files.

use discogs_cliques::config::{RunConfig, TitleKeySource};
use discogs_cliques::pipeline::{run, RunSummary};
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

const NO_ARTISTS: &str = "";

struct Fixture {
    dir: TempDir,
    config: RunConfig,
}

impl Fixture {
    fn new(tracks: &str, artists: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let tracks_path = dir.path().join("discogs_20240701_releases.xml.jsonl.clean.tracks");
        let artists_path = dir.path().join("discogs_20240701_artists.xml.jsonl.clean");
        std::fs::write(&tracks_path, tracks).unwrap();
        std::fs::write(&artists_path, artists).unwrap();
        let mut config = RunConfig::new(tracks_path, artists_path);
        config.log_only = true;
        Self { dir, config }
    }

    fn run(&self) -> (RunSummary, Vec<Value>) {
        let summary = run(&self.config).unwrap();
        let cliques = read_cliques(&summary.output_path);
        (summary, cliques)
    }
}

fn read_cliques(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn track(id: u32, title: &str, performers: &[&str], writers: &[&str]) -> String {
    serde_json::json!({
        "release_id": id,
        "track_title": title,
        "track_artist_ids": performers,
        "track_writer_ids": writers,
    })
    .to_string()
}

fn lines(records: &[String]) -> String {
    let mut out = records.join("\n");
    out.push('\n');
    out
}

fn release_ids(version: &Value) -> Vec<u64> {
    version["tracks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["release_id"].as_u64().unwrap())
        .collect()
}

#[test]
fn test_shared_writer_makes_two_version_clique() {
    let fixture = Fixture::new(
        &lines(&[
            track(1, "Praise You", &["A"], &["W1"]),
            track(2, "praise you!", &["B"], &["W1"]),
        ]),
        NO_ARTISTS,
    );
    let (summary, cliques) = fixture.run();

    assert_eq!(cliques.len(), 1);
    let versions = cliques[0]["versions"].as_array().unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(release_ids(&versions[0]), vec![1]);
    assert_eq!(release_ids(&versions[1]), vec![2]);
    assert_eq!(summary.stats.cliques, 1);
    assert_eq!(summary.stats.versions, 2);
}

#[test]
fn test_overlapping_writer_credits_form_one_version() {
    let fixture = Fixture::new(
        &lines(&[
            track(1, "Song", &["A"], &["W1", "W2"]),
            track(2, "Song", &["A"], &["W1"]),
            track(3, "Song", &["C"], &["W1"]),
        ]),
        NO_ARTISTS,
    );
    let (summary, cliques) = fixture.run();

    assert_eq!(cliques.len(), 1);
    let versions = cliques[0]["versions"].as_array().unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(release_ids(&versions[0]), vec![1, 2]);
    assert_eq!(release_ids(&versions[1]), vec![3]);
    assert_eq!(summary.stats.writer_agreements, 2);
}

#[test]
fn test_majority_vote_keeps_larger_writer_credit() {
    let fixture = Fixture::new(
        &lines(&[
            track(1, "Song", &["A"], &["W1"]),
            track(2, "Song", &["A"], &["W1"]),
            track(3, "Song", &["A"], &["W2"]),
            track(4, "Song", &["C"], &["W1"]),
        ]),
        NO_ARTISTS,
    );
    let (summary, cliques) = fixture.run();

    let versions = cliques[0]["versions"].as_array().unwrap();
    assert_eq!(release_ids(&versions[0]), vec![1, 2]);
    assert_eq!(release_ids(&versions[1]), vec![4]);
    assert_eq!(summary.stats.voted_agreements, 1);
    assert_eq!(summary.stats.tied_buckets_dropped, 0);
}

#[test]
fn test_tied_writer_credits_drop_the_bucket() {
    let fixture = Fixture::new(
        &lines(&[
            track(1, "Song", &["A"], &["W1"]),
            track(2, "Song", &["A"], &["W2"]),
            track(3, "Song", &["C"], &["W1"]),
        ]),
        NO_ARTISTS,
    );
    let (summary, cliques) = fixture.run();

    // A is dropped, C alone cannot form a clique
    assert!(cliques.is_empty());
    assert_eq!(summary.stats.tied_buckets_dropped, 1);
    assert_eq!(summary.stats.single_version_cliques_dropped, 1);
}

#[test]
fn test_alias_group_member_closure_links_writers() {
    // X has alias Y, Y is a group with member Z
    let artists = r#"{"id": "X", "name": "X", "aliases": ["Y"]}
{"id": "Y", "name": "Y", "members": ["Z"]}
{"id": "Z", "name": "Z"}
"#;
    let fixture = Fixture::new(
        &lines(&[
            track(1, "Song", &["P1"], &["X"]),
            track(2, "Song", &["P2"], &["Z"]),
        ]),
        artists,
    );
    let (summary, cliques) = fixture.run();

    // Writer X resolves to {X, Y, Z}, which intersects {Z}
    assert_eq!(cliques.len(), 1);
    assert_eq!(cliques[0]["versions"].as_array().unwrap().len(), 2);
    assert_eq!(summary.stats.artists_loaded, 3);
}

#[test]
fn test_version_splits_by_full_title() {
    let fixture = Fixture::new(
        &lines(&[
            track(1, "Song (Part 1)", &["A"], &["W1"]),
            track(2, "Song (Part 2)", &["A"], &["W1"]),
            track(3, "Song", &["C"], &["W1"]),
        ]),
        NO_ARTISTS,
    );
    let (summary, cliques) = fixture.run();

    assert_eq!(cliques.len(), 1);
    let versions = cliques[0]["versions"].as_array().unwrap();
    assert_eq!(versions.len(), 3);
    assert_eq!(release_ids(&versions[0]), vec![1]);
    assert_eq!(release_ids(&versions[1]), vec![2]);
    assert_eq!(release_ids(&versions[2]), vec![3]);
    assert_eq!(summary.stats.versions_split_by_title, 1);
}

#[test]
fn test_ids_and_record_pass_through() {
    let tracks = r#"{"release_id": 7, "track_title": "One", "track_artist_ids": ["A"], "track_writer_ids": ["W"], "genres": ["Rock"], "extra": {"b": 1, "a": 2}}
{"release_id": 8, "track_title": "One", "track_artist_ids": ["B"], "track_writer_ids": ["W"]}
{"release_id": 9, "track_title": "Two", "track_artist_ids": ["A"], "track_writer_ids": ["V"]}
{"release_id": 10, "track_title": "Two", "track_artist_ids": ["B"], "track_writer_ids": ["V"]}
"#;
    let fixture = Fixture::new(tracks, NO_ARTISTS);
    let (summary, _) = fixture.run();
    let text = std::fs::read_to_string(&summary.output_path).unwrap();
    let mut rows = text.lines();

    let first = rows.next().unwrap();
    assert!(first.starts_with(r#"{"clique_id":"C-0000000","versions":[{"version_id":"V-0000000","tracks":[{"release_id":7,"track_title":"One","#));
    assert!(first.contains(r#""extra":{"b":1,"a":2}"#));

    let second: Value = serde_json::from_str(rows.next().unwrap()).unwrap();
    assert_eq!(second["clique_id"], "C-0000001");
    assert_eq!(second["versions"][0]["version_id"], "V-0000002");
    assert_eq!(second["versions"][1]["version_id"], "V-0000003");
    assert!(rows.next().is_none());
}

#[test]
fn test_default_output_name_from_dump_date() {
    let fixture = Fixture::new(
        &lines(&[track(1, "Song", &["A"], &["W"]), track(2, "Song", &["B"], &["W"])]),
        NO_ARTISTS,
    );
    let (summary, _) = fixture.run();
    assert_eq!(summary.output_path, fixture.dir.path().join("Discogs-VI-20240701.jsonl"));
}

#[test]
fn test_existing_output_is_refused_without_overwrite() {
    let mut fixture = Fixture::new(
        &lines(&[track(1, "Song", &["A"], &["W"]), track(2, "Song", &["B"], &["W"])]),
        NO_ARTISTS,
    );
    let output = fixture.dir.path().join("cliques.jsonl");
    std::fs::write(&output, "old\n").unwrap();
    fixture.config.output_path = Some(output.clone());

    let err = run(&fixture.config).unwrap_err();
    assert!(err.to_string().contains("already exists"));
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "old\n");

    fixture.config.overwrite = true;
    run(&fixture.config).unwrap();
    assert_eq!(read_cliques(&output).len(), 1);
}

#[test]
fn test_output_into_missing_directory() {
    let mut fixture = Fixture::new(
        &lines(&[track(1, "Song", &["A"], &["W"]), track(2, "Song", &["B"], &["W"])]),
        NO_ARTISTS,
    );
    let output = fixture.dir.path().join("out").join("nested").join("cliques.jsonl");
    let stats_path = fixture.dir.path().join("reports").join("stats.json");
    fixture.config.output_path = Some(output.clone());
    fixture.config.stats_path = Some(stats_path.clone());

    let summary = run(&fixture.config).unwrap();
    assert_eq!(summary.output_path, output);
    assert_eq!(read_cliques(&output).len(), 1);
    assert!(stats_path.is_file());
}

#[test]
fn test_existing_stats_file_is_refused_without_overwrite() {
    let mut fixture = Fixture::new(
        &lines(&[track(1, "Song", &["A"], &["W"]), track(2, "Song", &["B"], &["W"])]),
        NO_ARTISTS,
    );
    let stats_path = fixture.dir.path().join("stats.json");
    std::fs::write(&stats_path, "{}").unwrap();
    fixture.config.stats_path = Some(stats_path.clone());

    let err = run(&fixture.config).unwrap_err();
    assert!(err.to_string().contains("already exists"));
    assert_eq!(std::fs::read_to_string(&stats_path).unwrap(), "{}");
    assert!(!fixture.config.resolved_output_path().exists());
}

#[test]
fn test_stats_file_cannot_alias_an_input() {
    let mut fixture = Fixture::new(
        &lines(&[track(1, "Song", &["A"], &["W"]), track(2, "Song", &["B"], &["W"])]),
        NO_ARTISTS,
    );
    let artists = fixture.config.artists_path.clone();
    let renamed = artists.with_extension("json");
    std::fs::rename(&artists, &renamed).unwrap();
    fixture.config.artists_path = renamed.clone();
    fixture.config.stats_path = Some(fixture.dir.path().join(".").join(renamed.file_name().unwrap()));
    fixture.config.overwrite = true;

    let err = run(&fixture.config).unwrap_err();
    assert!(err.to_string().contains("cannot be the same as"));
}

#[test]
fn test_placeholder_alias_does_not_link_writers() {
    let artists = r#"{"id": "W1", "name": "W1", "aliases": ["118760"]}
{"id": "W2", "name": "W2", "aliases": ["118760", "404"]}
{"id": "118760", "name": "No Artist"}
"#;
    let fixture = Fixture::new(
        &lines(&[
            track(1, "Song", &["P1"], &["W1"]),
            track(2, "Song", &["P2"], &["W2"]),
        ]),
        artists,
    );
    let (summary, cliques) = fixture.run();

    assert!(cliques.is_empty());
    assert_eq!(summary.stats.single_version_cliques_dropped, 2);
    assert_eq!(summary.stats.artist_placeholder_references_removed, 2);
    assert_eq!(summary.stats.artist_dangling_references_removed, 1);
}

#[test]
fn test_stats_file_written() {
    let mut fixture = Fixture::new(
        &lines(&[
            track(1, "Song", &["A"], &["W"]),
            track(2, "Song", &["B"], &["W"]),
            track(3, "", &["B"], &["W"]),
            track(4, "Other", &["B"], &[]),
        ]),
        NO_ARTISTS,
    );
    let stats_path = fixture.dir.path().join("stats.json");
    fixture.config.stats_path = Some(stats_path.clone());
    run(&fixture.config).unwrap();

    let stats: Value = serde_json::from_str(&std::fs::read_to_string(&stats_path).unwrap()).unwrap();
    assert_eq!(stats["tracks_read"], 4);
    assert_eq!(stats["tracks_skipped_empty_title"], 1);
    assert_eq!(stats["tracks_skipped_no_writers"], 1);
    assert_eq!(stats["cliques"], 1);
    assert_eq!(stats["clique_size_histogram"]["2"], 1);
}

#[test]
fn test_record_title_key_source() {
    let tracks = r#"{"release_id": 1, "track_title": "Song A", "track_title_cleaned": "song", "track_artist_ids": ["A"], "track_writer_ids": ["W"]}
{"release_id": 2, "track_title": "Song B", "track_title_cleaned": "song", "track_artist_ids": ["B"], "track_writer_ids": ["W"]}
"#;
    let mut fixture = Fixture::new(tracks, NO_ARTISTS);
    let (_, cliques) = fixture.run();
    assert!(cliques.is_empty());

    fixture.config.overwrite = true;
    fixture.config.options.title_key = TitleKeySource::Record;
    let (_, cliques) = fixture.run();
    // Grouped by the record key; each version keeps a single full title
    assert_eq!(cliques.len(), 1);
    assert_eq!(cliques[0]["versions"].as_array().unwrap().len(), 2);
}

#[test]
fn test_malformed_track_line_aborts() {
    let fixture = Fixture::new("{\"track_title\": \"Song\"}\nnot json\n", NO_ARTISTS);
    let err = run(&fixture.config).unwrap_err();
    let chain = format!("{:#}", err);
    assert!(chain.contains("line 2"), "{chain}");
}
