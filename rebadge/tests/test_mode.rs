mod common;

use std::path::Path;

///
/// Test mode reads fixture trees from tests/test-files/from-<name> and writes copies to
/// tests/test-files/to-<name>.
///

fn clean_output(test_name: &str) {
    let _ = fs_extra::dir::remove(Path::new(&format!("tests/test-files/to-{}", test_name)));
}

#[test]
fn test_mode_copies_into_the_to_folder() {
    let base_dir = common::init_test("tests/test_mode_basic/");
    let (charter, users, categories) = common::write_config(&base_dir, common::BASE_CHARTER);
    clean_output("basic");

    let ctx = rebadge::init_job(&charter.to_string_lossy(), common::run_options(&users, &categories)).unwrap();
    let results = rebadge::run_test_mode(&ctx, "basic", None).unwrap();

    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.outcome == rebadge::Outcome::Copied));

    let produced = Path::new("tests/test-files/to-basic/John Doe/1001_John Doe_summary_2023-06-01_1.pdf");
    assert!(produced.exists(), "missing {}", produced.to_string_lossy());

    // Fixtures are copied, never moved.
    assert!(Path::new("tests/test-files/from-basic/John Doe/WHS/2023-06-01 summary.pdf").exists());
}

#[test]
fn person_filter_limits_the_run() {
    let base_dir = common::init_test("tests/test_mode_filtered/");
    let (charter, users, categories) = common::write_config(&base_dir, common::BASE_CHARTER);
    clean_output("filtered");

    let ctx = rebadge::init_job(&charter.to_string_lossy(), common::run_options(&users, &categories)).unwrap();
    let results = rebadge::run_test_mode(&ctx, "filtered", Some("jane")).unwrap();

    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.canonical_name == "Jane Smith"));
}
