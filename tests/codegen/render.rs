use scdkit::codegen::pattern::{Pattern, PatternSet};
use scdkit::codegen::render::{FileAction, WriteOptions, render, render_target, write_rendered};
use scdkit::codegen::target::{GenerationTarget, find_target, targets};
use scdkit::codegen::targets::sqlite;
use scdkit::core::descriptor::EntityDescriptor;
use scdkit::core::error::ScdError;
use scdkit::models::builtin_descriptors;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_render_is_byte_identical_across_runs() {
    let descs = builtin_descriptors();
    for target in targets() {
        let first = render(&PatternSet::universal(), target, &descs).unwrap();
        let second = render(&PatternSet::universal(), target, &descs).unwrap();
        assert_eq!(first, second, "target {}", target.name);
        let digests: Vec<String> = first.iter().map(|f| f.digest()).collect();
        let again: Vec<String> = second.iter().map(|f| f.digest()).collect();
        assert_eq!(digests, again);
    }
}

#[test]
fn test_every_target_renders_one_file_per_entity() {
    let descs = builtin_descriptors();
    let expected = [
        ("gorm", vec!["models/job_scd.go", "models/payment_line_item_scd.go", "models/timelog_scd.go"]),
        ("django", vec!["scd/job_scd.py", "scd/payment_line_item_scd.py", "scd/timelog_scd.py"]),
        ("sqlite", vec!["sql/jobs_scd.sql", "sql/payment_line_items_scd.sql", "sql/timelogs_scd.sql"]),
    ];
    for (name, paths) in expected {
        let files = render_target(&PatternSet::universal(), name, &descs).unwrap();
        let got: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(got, paths, "target {}", name);
        for f in &files {
            assert_eq!(f.patterns, vec!["LatestVersionQuery", "NewVersionOperation"]);
            assert!(f.contents.contains("Code generated by scdkit. DO NOT EDIT."));
        }
    }
}

#[test]
fn test_gorm_output_names_struct_and_fields() {
    let files = render_target(&PatternSet::universal(), "gorm", &builtin_descriptors()).unwrap();
    let timelog = files.iter().find(|f| f.path == "models/timelog_scd.go").unwrap();
    assert!(timelog.contents.contains("package models"));
    assert!(timelog.contents.contains("func LatestTimelogVersions(db *gorm.DB) *gorm.DB {"));
    assert!(timelog.contents.contains("func CreateNewTimelogVersion(db *gorm.DB, id string, mutate func(*Timelog)) (*Timelog, error) {"));
}

#[test]
fn test_unknown_target_fails_before_output() {
    let err = render_target(&PatternSet::universal(), "hibernate", &builtin_descriptors())
        .unwrap_err();
    assert!(matches!(err, ScdError::UnsupportedTarget { ref target, .. } if target == "hibernate"));
    assert!(find_target("Django").is_ok());
}

static LATEST_ONLY: GenerationTarget = GenerationTarget {
    name: "latest-only",
    ecosystem: "SQLite SQL",
    description: "cannot create versions",
    location: sqlite::location,
    header: sqlite::header,
    mappings: &[(Pattern::LatestVersionQuery, sqlite::render_latest_version_query)],
};

#[test]
fn test_missing_mapping_fails_completely_and_writes_nothing() {
    let tmp = tempdir().unwrap();
    let out = tmp.path().join("generated");

    let err = render(&PatternSet::universal(), &LATEST_ONLY, &builtin_descriptors()).unwrap_err();
    assert!(matches!(
        err,
        ScdError::MissingMapping { ref target, ref pattern }
            if target == "latest-only" && pattern == "NewVersionOperation"
    ));
    assert!(!out.exists());

    // The same target is fine when only the pattern it maps is requested.
    let files = render(
        &PatternSet::of(&[Pattern::LatestVersionQuery]),
        &LATEST_ONLY,
        &builtin_descriptors(),
    )
    .unwrap();
    assert_eq!(files.len(), 3);
}

#[test]
fn test_invalid_descriptor_set_is_rejected() {
    let mut descs = builtin_descriptors();
    descs.push(EntityDescriptor::new("Job", "jobs_again"));
    let err = render_target(&PatternSet::universal(), "sqlite", &descs).unwrap_err();
    assert!(matches!(err, ScdError::CapabilityViolation { .. }));

    let dangling = vec![EntityDescriptor::new("Timelog", "timelogs").reference("job_uid", "Job")];
    let err = render_target(&PatternSet::universal(), "sqlite", &dangling).unwrap_err();
    assert!(err.to_string().contains("references unknown entity 'Job'"));
}

#[test]
fn test_write_then_check_then_drift() {
    let tmp = tempdir().unwrap();
    let files = render_target(&PatternSet::universal(), "django", &builtin_descriptors()).unwrap();
    let mut opts = WriteOptions::new(&tmp.path().join("app"));

    let report = write_rendered(&files, &opts).unwrap();
    assert_eq!(report.count(FileAction::Wrote), 3);
    let on_disk = fs::read_to_string(tmp.path().join("app/scd/job_scd.py")).unwrap();
    assert_eq!(on_disk, files.iter().find(|f| f.path == "scd/job_scd.py").unwrap().contents);

    // No staging files left behind.
    let leftovers: Vec<_> = fs::read_dir(tmp.path().join("app/scd"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".scdkit-tmp"))
        .collect();
    assert!(leftovers.is_empty());

    // Regenerating identical output needs no --force.
    let report = write_rendered(&files, &opts).unwrap();
    assert_eq!(report.count(FileAction::Unchanged), 3);

    opts.check = true;
    let report = write_rendered(&files, &opts).unwrap();
    assert_eq!(report.count(FileAction::Checked), 3);

    fs::write(tmp.path().join("app/scd/timelog_scd.py"), "# edited by hand\n").unwrap();
    let err = write_rendered(&files, &opts).unwrap_err();
    assert!(matches!(err, ScdError::ValidationError(_)));
    assert!(err.to_string().contains("timelog_scd.py (stale)"));
}

#[test]
fn test_overwrite_requires_force_and_is_all_or_nothing() {
    let tmp = tempdir().unwrap();
    let out = tmp.path().join("out");
    let files = render_target(&PatternSet::universal(), "sqlite", &builtin_descriptors()).unwrap();

    fs::create_dir_all(out.join("sql")).unwrap();
    fs::write(out.join("sql/timelogs_scd.sql"), "-- hand written\n").unwrap();

    let mut opts = WriteOptions::new(&out);
    let err = write_rendered(&files, &opts).unwrap_err();
    assert!(err.to_string().contains("without --force"));
    // Nothing else was written.
    assert!(!out.join("sql/jobs_scd.sql").exists());
    assert_eq!(
        fs::read_to_string(out.join("sql/timelogs_scd.sql")).unwrap(),
        "-- hand written\n"
    );

    opts.dry_run = true;
    opts.force = true;
    let report = write_rendered(&files, &opts).unwrap();
    assert_eq!(report.count(FileAction::WouldWrite), 2);
    assert_eq!(report.count(FileAction::WouldOverwrite), 1);
    assert!(!out.join("sql/jobs_scd.sql").exists());

    opts.dry_run = false;
    let report = write_rendered(&files, &opts).unwrap();
    assert_eq!(report.count(FileAction::Wrote), 3);
    let timelogs = fs::read_to_string(out.join("sql/timelogs_scd.sql")).unwrap();
    assert!(timelogs.contains("CREATE VIEW IF NOT EXISTS timelogs_latest"));
}

#[test]
fn test_dry_run_without_force_reports_overwrite_refusal() {
    let tmp = tempdir().unwrap();
    let out = tmp.path().join("out");
    let files = render_target(&PatternSet::universal(), "gorm", &builtin_descriptors()).unwrap();
    fs::create_dir_all(out.join("models")).unwrap();
    fs::write(out.join("models/job_scd.go"), "package models\n").unwrap();

    let mut opts = WriteOptions::new(&out);
    opts.dry_run = true;
    assert!(write_rendered(&files, &opts).is_err());
}

#[test]
fn test_digest_is_sha256_of_contents() {
    let files = render_target(&PatternSet::universal(), "sqlite", &builtin_descriptors()).unwrap();
    let d = files[0].digest();
    assert_eq!(d.len(), 64);
    assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(d, files[1].digest());
}
