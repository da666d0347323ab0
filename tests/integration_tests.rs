//! Integration tests for forensic-metadata
//!
//! The pipelines run against a stub probe that replays canned tool output,
//! so no ExifTool installation is needed. Unix-only tests at the bottom
//! drive the real subprocess probe through a shell script stand-in.

use forensic_metadata::config::{OutputFormat, PipelineConfig, PipelineKind};
use forensic_metadata::content::{Digests, FileHasher, StreamingHasher};
use forensic_metadata::error::{HashError, HashResult, PipelineError, ProbeError, ProbeResult};
use forensic_metadata::pipeline::{NoopObserver, Pipeline, RunSummary};
use forensic_metadata::probe::{parse_tool_output, Metadata, MetadataProbe};
use rusqlite::Connection;
use serde_json::Value;
use std::cell::Cell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Replays canned tool output keyed by file name
///
/// Files without an entry get an empty (but valid) document.
#[derive(Default)]
struct StubProbe {
    replies: HashMap<String, String>,
}

impl StubProbe {
    fn reply(mut self, file: &str, output: &str) -> Self {
        self.replies.insert(file.to_string(), output.to_string());
        self
    }
}

impl MetadataProbe for StubProbe {
    fn extract(&self, path: &Path) -> ProbeResult<Metadata> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        let output = self
            .replies
            .get(&name)
            .cloned()
            .unwrap_or_else(|| format!(r#"[{{"SourceFile": "{}"}}]"#, name));
        parse_tool_output(path, &output)
    }
}

/// Probe whose tool can never be found
struct MissingToolProbe;

impl MetadataProbe for MissingToolProbe {
    fn ensure_available(&self) -> ProbeResult<()> {
        Err(ProbeError::ToolNotFound {
            path: PathBuf::from("/nonexistent/exiftool"),
        })
    }

    fn extract(&self, _path: &Path) -> ProbeResult<Metadata> {
        panic!("extract must not be called when the tool is unavailable");
    }
}

/// Hashes from disk, but fails for the named files as if they were unreadable
#[derive(Default)]
struct FailingHasher {
    unreadable: HashSet<String>,
    calls: Cell<usize>,
}

impl FailingHasher {
    fn failing_on(names: &[&str]) -> Self {
        Self {
            unreadable: names.iter().map(|s| s.to_string()).collect(),
            calls: Cell::new(0),
        }
    }
}

impl FileHasher for FailingHasher {
    fn hash_file(&self, path: &Path) -> HashResult<Digests> {
        self.calls.set(self.calls.get() + 1);
        let name = path.file_name().unwrap().to_string_lossy();
        if self.unreadable.contains(name.as_ref()) {
            return Err(HashError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "simulated unreadable file"),
            });
        }
        StreamingHasher::new().hash_file(path)
    }
}

fn config(kind: PipelineKind, input: &Path, output: &Path, formats: &[OutputFormat]) -> PipelineConfig {
    PipelineConfig {
        kind,
        input_dir: input.to_path_buf(),
        tool_path: PathBuf::from("exiftool"),
        output_dir: output.to_path_buf(),
        formats: formats.to_vec(),
        source_device: "lab-01".to_string(),
        tool_timeout: None,
        exclude_patterns: Vec::new(),
        log_file: output.join("test.log"),
        show_progress: false,
        verbose: false,
    }
}

fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        std::fs::write(dir.join(name), content).unwrap();
    }
}

fn run(config: &PipelineConfig, hasher: &dyn FileHasher, probe: &dyn MetadataProbe) -> RunSummary {
    Pipeline::new(config, hasher, probe).run(&NoopObserver).unwrap()
}

fn read_json(path: &Path) -> Vec<Value> {
    let text = std::fs::read_to_string(path).unwrap();
    match serde_json::from_str(&text).unwrap() {
        Value::Array(items) => items,
        other => panic!("expected an array, got {}", other),
    }
}

fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().iter().map(String::from).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (headers, rows)
}

fn count_rows(db: &Path, table: &str) -> i64 {
    let conn = Connection::open(db).unwrap();
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .unwrap()
}

fn table_columns(db: &Path, table: &str) -> Vec<String> {
    let conn = Connection::open(db).unwrap();
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table)).unwrap();
    stmt.query_map([], |row| row.get::<_, String>(1))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn test_per_file_failures_are_isolated() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_files(
        input.path(),
        &[("a.jpg", "alpha"), ("b.jpg", "bravo"), ("c.jpg", "charlie")],
    );

    let hasher = FailingHasher::failing_on(&["b.jpg"]);
    let probe = StubProbe::default()
        .reply("a.jpg", r#"[{"SourceFile": "a.jpg", "Make": "Canon"}]"#)
        .reply("c.jpg", "Error: this is not JSON");
    let config = config(PipelineKind::Metadata, input.path(), output.path(), &OutputFormat::ALL);

    let summary = run(&config, &hasher, &probe);

    assert_eq!(summary.files_attempted, 3);
    assert_eq!(summary.records_produced, 1);
    assert_eq!(summary.failure_count(), 2);
    assert_eq!(summary.files_attempted - summary.records_produced, summary.failure_count());
    assert!(summary.completed);

    let stages: Vec<(&str, &str)> = summary
        .failures
        .iter()
        .map(|f| (f.file.as_str(), f.error.stage()))
        .collect();
    assert_eq!(stages, vec![("b.jpg", "hash"), ("c.jpg", "probe")]);

    // Exactly one record in every general-pipeline export
    let out = output.path();
    let docs = read_json(&out.join("forensic_metadata_consolidated.json"));
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["filename"], "a.jpg");
    assert_eq!(docs[0]["extra_metadata"]["Make"], "Canon");
    assert_eq!(read_csv(&out.join("forensic_metadata_consolidated.csv")).1.len(), 1);
    assert_eq!(count_rows(&out.join("forensic_metadata_consolidated.db"), "file_records"), 1);
    let report = std::fs::read_to_string(out.join("forensic_metadata_consolidated.txt")).unwrap();
    assert_eq!(report.matches("filename: ").count(), 1);

    assert_eq!(read_json(&out.join("hash_database.json")).len(), 1);
    assert_eq!(read_csv(&out.join("hash_database.csv")).1.len(), 1);
    assert_eq!(count_rows(&out.join("hash_database.db"), "file_hashes"), 1);
    assert!(!out.join("hash_database.txt").exists());
}

#[test]
fn test_consolidated_record_layout() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_files(input.path(), &[("IMG_0001.jpg", "abc")]);

    let probe = StubProbe::default().reply(
        "IMG_0001.jpg",
        r#"[{"SourceFile": "IMG_0001.jpg", "Make": "Canon", "Model": "EOS 5D", "ImageSize": "6000x4000"}]"#,
    );
    let config = config(PipelineKind::Metadata, input.path(), output.path(), &OutputFormat::ALL);
    run(&config, &StreamingHasher::new(), &probe);

    let docs = read_json(&output.path().join("forensic_metadata_consolidated.json"));
    let record = &docs[0];
    assert_eq!(record["size_bytes"], 3);
    assert_eq!(record["source_device"], "lab-01");
    assert_eq!(record["hashes"]["MD5"], "900150983cd24fb0d6963f7d28e17f72");
    assert_eq!(record["hashes"]["SHA1"], "a9993e364706816aba3e25717850c26c9cd0d89d");
    assert_eq!(
        record["hashes"]["SHA256"],
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );

    // Tool key order is kept in the blob
    let keys: Vec<&str> = record["extra_metadata"]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys, vec!["SourceFile", "Make", "Model", "ImageSize"]);

    let (headers, _) = read_csv(&output.path().join("forensic_metadata_consolidated.csv"));
    assert_eq!(
        headers,
        vec![
            "filename",
            "full_path",
            "size_bytes",
            "md5",
            "sha1",
            "sha256",
            "captured_at",
            "source_device",
            "extra_metadata"
        ]
    );
}

#[test]
fn test_geo_keeps_only_geolocation_fields() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_files(input.path(), &[("paris.jpg", "p"), ("plain.jpg", "q")]);

    let probe = StubProbe::default()
        .reply(
            "paris.jpg",
            r#"[{"SourceFile": "paris.jpg", "GeolocationCity": "Paris", "GeolocationCountry": "France", "Make": "Canon"}]"#,
        )
        .reply("plain.jpg", r#"[{"SourceFile": "plain.jpg", "Make": "Canon"}]"#);
    let config = config(PipelineKind::Geo, input.path(), output.path(), &OutputFormat::ALL);

    let summary = run(&config, &StreamingHasher::new(), &probe);
    assert_eq!(summary.files_attempted, 2);
    assert_eq!(summary.records_produced, 1);
    assert_eq!(summary.failure_count(), 0);
    assert_eq!(summary.excluded, vec!["plain.jpg".to_string()]);

    let docs = read_json(&output.path().join("geo_location.json"));
    assert_eq!(docs.len(), 1);
    let record = docs[0].as_object().unwrap();
    assert_eq!(record["GeolocationCity"], "Paris");
    assert_eq!(record["GeolocationCountry"], "France");
    assert!(!record.contains_key("Make"));
    assert!(!record.contains_key("SourceFile"));

    assert!(output.path().join("geo_location_report.txt").exists());
    assert!(!output.path().join("geo_location.txt").exists());
}

#[test]
fn test_file_without_geolocation_never_exported() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_files(input.path(), &[("a.jpg", "a"), ("nogeo.jpg", "n")]);

    let probe = StubProbe::default()
        .reply("a.jpg", r#"[{"GeolocationCity": "Cluj-Napoca"}]"#)
        .reply("nogeo.jpg", r#"[{"GeolocationCity": null, "Make": "Nikon"}]"#);
    let config = config(PipelineKind::Geo, input.path(), output.path(), &OutputFormat::ALL);
    run(&config, &StreamingHasher::new(), &probe);

    let out = output.path();
    for name in ["geo_location.json", "geo_location.csv", "geo_location_report.txt"] {
        let text = std::fs::read_to_string(out.join(name)).unwrap();
        assert!(text.contains("a.jpg"), "{} misses a.jpg", name);
        assert!(!text.contains("nogeo.jpg"), "{} contains nogeo.jpg", name);
    }
    let conn = Connection::open(out.join("geo_location.db")).unwrap();
    let hits: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM geolocation_data WHERE filename = 'nogeo.jpg'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(hits, 0);
}

#[test]
fn test_no_geolocation_anywhere_writes_nothing() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_files(input.path(), &[("a.jpg", "a")]);

    let config = config(PipelineKind::Geo, input.path(), output.path(), &OutputFormat::ALL);
    let summary = run(&config, &StreamingHasher::new(), &StubProbe::default());

    assert_eq!(summary.records_produced, 0);
    assert!(summary.exports.iter().all(|r| r.skipped_empty));
    assert!(summary.written_paths().is_empty());
    assert!(!output.path().join("geo_location.json").exists());
}

#[test]
fn test_geo_schema_is_union_of_observed_keys() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_files(input.path(), &[("a.jpg", "a"), ("b.jpg", "b"), ("c.jpg", "c")]);

    let probe = StubProbe::default()
        .reply("a.jpg", r#"[{"GeolocationCity": "Paris", "GeolocationPosition": "48.85, 2.35"}]"#)
        .reply("b.jpg", r#"[{"GeolocationCountry Code": "RO", "GeolocationCity": "Iasi"}]"#)
        .reply("c.jpg", r#"[{"Make": "Canon"}]"#);
    let config = config(PipelineKind::Geo, input.path(), output.path(), &OutputFormat::ALL);
    run(&config, &StreamingHasher::new(), &probe);

    let db = output.path().join("geo_location.db");
    let identity = ["id", "filename", "full_path", "md5", "captured_at", "source_device"];
    let columns = table_columns(&db, "geolocation_data");
    assert_eq!(&columns[..identity.len()], &identity);

    let geo_columns: BTreeSet<&str> = columns[identity.len()..].iter().map(String::as_str).collect();
    let expected: BTreeSet<&str> = ["geolocationcity", "geolocationposition", "geolocationcountry_code"]
        .into_iter()
        .collect();
    assert_eq!(geo_columns, expected);

    // Absent fields are empty cells, never NULL
    let conn = Connection::open(&db).unwrap();
    let position: String = conn
        .query_row(
            "SELECT geolocationposition FROM geolocation_data WHERE filename = 'b.jpg'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(position, "");

    // Tabular header follows the same column set
    let (headers, rows) = read_csv(&output.path().join("geo_location.csv"));
    assert_eq!(headers.len(), columns.len() - 1);
    assert_eq!(rows.len(), 2);
}

#[test]
fn test_failed_relational_export_keeps_document() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_files(input.path(), &[("a.jpg", "a")]);

    // A directory squatting on the database name makes that one write fail
    let squatter = output.path().join("forensic_metadata_consolidated.db");
    std::fs::create_dir(&squatter).unwrap();
    std::fs::write(squatter.join("evidence.lock"), "x").unwrap();

    let config = config(
        PipelineKind::Metadata,
        input.path(),
        output.path(),
        &[OutputFormat::Document, OutputFormat::Relational],
    );
    let summary = run(&config, &StreamingHasher::new(), &StubProbe::default());

    let consolidated = &summary.exports[0];
    assert_eq!(consolidated.failed.len(), 1);
    assert_eq!(consolidated.failed[0].0, OutputFormat::Relational);
    assert!(consolidated.path_for(OutputFormat::Document).is_some());
    assert_eq!(read_json(&output.path().join("forensic_metadata_consolidated.json")).len(), 1);

    // The hash-only export is independent and still complete
    assert!(summary.exports[1].is_complete());
    assert_eq!(count_rows(&output.path().join("hash_database.db"), "file_hashes"), 1);
    assert_eq!(summary.export_failures(), 1);
}

#[test]
fn test_rerun_produces_identical_tabular_output() {
    let input = tempdir().unwrap();
    write_files(
        input.path(),
        &[("b.png", "second"), ("a.jpg", "first"), ("c.tif", "third")],
    );
    // Default layout: output folder inside the input folder
    let output = input.path().join("Forensic_metadata_output");

    let probe = StubProbe::default()
        .reply("a.jpg", r#"[{"Make": "Canon", "ISO": 200}]"#)
        .reply("b.png", r#"[{"ImageWidth": 640, "Comment": "naïve, \"quoted\""}]"#);
    let config = config(PipelineKind::Metadata, input.path(), &output, &OutputFormat::ALL);

    let strip_timestamp = |path: &Path| {
        let (headers, rows) = read_csv(path);
        let idx = headers.iter().position(|h| h == "captured_at");
        let strip = |row: Vec<String>| -> Vec<String> {
            row.into_iter()
                .enumerate()
                .filter(|(i, _)| Some(*i) != idx)
                .map(|(_, v)| v)
                .collect()
        };
        (strip(headers), rows.into_iter().map(strip).collect::<Vec<_>>())
    };

    let first = run(&config, &StreamingHasher::new(), &probe);
    let consolidated_1 = strip_timestamp(&output.join("forensic_metadata_consolidated.csv"));
    let hashes_1 = std::fs::read(output.join("hash_database.csv")).unwrap();

    let second = run(&config, &StreamingHasher::new(), &probe);
    let consolidated_2 = strip_timestamp(&output.join("forensic_metadata_consolidated.csv"));
    let hashes_2 = std::fs::read(output.join("hash_database.csv")).unwrap();

    // The output folder is not picked up as input on the second run
    assert_eq!(first.files_attempted, 3);
    assert_eq!(second.files_attempted, 3);

    assert_eq!(consolidated_1, consolidated_2);
    assert_eq!(hashes_1, hashes_2);

    let names: Vec<&str> = consolidated_2.1.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(names, vec!["a.jpg", "b.png", "c.tif"]);
    assert_eq!(count_rows(&output.join("hash_database.db"), "file_hashes"), 3);
}

#[test]
fn test_hash_exports_agree_across_formats() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_files(
        input.path(),
        &[("one.bin", "1"), ("two.bin", "22"), ("three.bin", "")],
    );

    let config = config(PipelineKind::Metadata, input.path(), output.path(), &OutputFormat::ALL);
    run(&config, &StreamingHasher::new(), &StubProbe::default());

    let (headers, rows) = read_csv(&output.path().join("hash_database.csv"));
    assert_eq!(headers, vec!["filename", "md5", "sha1", "sha256"]);
    let from_csv: BTreeSet<Vec<String>> = rows.into_iter().collect();

    let conn = Connection::open(output.path().join("hash_database.db")).unwrap();
    let mut stmt = conn
        .prepare("SELECT filename, md5, sha1, sha256 FROM file_hashes ORDER BY id")
        .unwrap();
    let from_db: BTreeSet<Vec<String>> = stmt
        .query_map([], |row| {
            Ok(vec![row.get::<_, String>(0)?, row.get(1)?, row.get(2)?, row.get(3)?])
        })
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(from_csv.len(), 3);
    assert_eq!(from_csv, from_db);

    let empty = from_db.iter().find(|r| r[0] == "three.bin").unwrap();
    assert_eq!(empty[1], "d41d8cd98f00b204e9800998ecf8427e");
}

#[test]
fn test_unavailable_tool_aborts_before_any_file() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_files(input.path(), &[("a.jpg", "a")]);
    let out_dir = output.path().join("never-created");

    let hasher = FailingHasher::default();
    let config = config(PipelineKind::Metadata, input.path(), &out_dir, &OutputFormat::ALL);
    let err = Pipeline::new(&config, &hasher, &MissingToolProbe)
        .run(&NoopObserver)
        .unwrap_err();

    assert!(matches!(err, PipelineError::ToolUnavailable(_)));
    assert_eq!(hasher.calls.get(), 0);
    assert!(!out_dir.exists());
}

#[test]
fn test_exclude_patterns_skip_files() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_files(input.path(), &[("a.jpg", "a"), ("Thumbs.db", "t")]);

    let mut config = config(PipelineKind::Metadata, input.path(), output.path(), &OutputFormat::ALL);
    config.exclude_patterns = vec![regex::Regex::new(r"(?i)^thumbs\.db$").unwrap()];
    let summary = run(&config, &StreamingHasher::new(), &StubProbe::default());

    assert_eq!(summary.files_attempted, 1);
    assert_eq!(summary.records_produced, 1);
}

#[cfg(unix)]
mod subprocess {
    use super::*;
    use forensic_metadata::probe::ExifToolProbe;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    fn fake_tool(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-exiftool");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_geo_pipeline_through_subprocess() {
        let tools = tempdir().unwrap();
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_files(input.path(), &[("a.jpg", "a"), ("b.jpg", "b")]);

        // Only a.jpg is geotagged; the last argument is the file
        let tool = fake_tool(
            tools.path(),
            r#"for f; do :; done
case "$f" in
  *a.jpg) echo '[{"SourceFile": "a.jpg", "GeolocationCity": "Paris", "GeolocationCountry": "France"}]' ;;
  *) echo '[{"SourceFile": "b.jpg"}]' ;;
esac"#,
        );

        let mut config = config(PipelineKind::Geo, input.path(), output.path(), &OutputFormat::ALL);
        config.tool_timeout = Some(Duration::from_secs(10));
        let probe = ExifToolProbe::locate(&tool, config.kind.probe_mode(), config.tool_timeout).unwrap();

        let summary = run(&config, &StreamingHasher::new(), &probe);
        assert_eq!(summary.records_produced, 1);
        assert_eq!(summary.excluded, vec!["b.jpg".to_string()]);
        assert_eq!(count_rows(&output.path().join("geo_location.db"), "geolocation_data"), 1);
    }

    #[test]
    fn test_hung_tool_times_out_per_file() {
        let tools = tempdir().unwrap();
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        write_files(input.path(), &[("a.jpg", "a")]);

        // A wrapper that forks its worker, like the perl launcher does
        let tool = fake_tool(tools.path(), "sleep 5\necho '[{}]'");
        let mut config = config(PipelineKind::Metadata, input.path(), output.path(), &OutputFormat::ALL);
        config.tool_timeout = Some(Duration::from_millis(200));
        let exiftool = ExifToolProbe::locate(&tool, config.kind.probe_mode(), config.tool_timeout).unwrap();

        let summary = run(&config, &StreamingHasher::new(), &exiftool);
        assert_eq!(summary.files_attempted, 1);
        assert_eq!(summary.records_produced, 0);
        assert!(matches!(
            summary.failures[0].error,
            forensic_metadata::error::FileError::Probe(ProbeError::Timeout { .. })
        ));
        assert!(summary.duration < Duration::from_secs(2));
    }
}
