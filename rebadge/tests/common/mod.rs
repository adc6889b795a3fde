use std::path::{Path, PathBuf};

pub const FIXED_JOB_ID: &str = "74251904-63d9-11ec-a665-00155dd15f9e";

pub const USER_CSV: &str = "user_id,full_name\n1001,John Doe\n1002,Jane Smith\n1003,Bob Johnson\n";
pub const CATEGORY_CSV: &str = "category_id,category_name\n1,WHS\n2,Medical\n3,Contracts\n";

///
/// Set-up logging, pin the job id, and create a clean working folder for one test under the
/// cargo tmp dir.
///
/// This function will delete any existing files in the folder before recreating it.
///
pub fn init_test(folder: &str) -> PathBuf {
    dotenv::dotenv().ok();
    let _ = env_logger::builder().is_test(true).try_init();

    use_fixed_job_id();
    let base_dir = Path::new(env!("CARGO_TARGET_TMPDIR")).join(folder);

    let _ = fs_extra::dir::remove(&base_dir);
    std::fs::create_dir_all(&base_dir)
        .unwrap_or_else(|_| panic!("Cannot create base_dir {}", base_dir.to_string_lossy()));

    base_dir
}

///
/// Write the contents to the (relative) file specified, creating parent folders, and return
/// the resultant file's path.
///
pub fn write_file(parent: &Path, relative: &str, contents: &str) -> PathBuf {
    let file = parent.join(relative);
    std::fs::create_dir_all(file.parent().expect("file has no parent")).unwrap();
    std::fs::write(&file, contents).unwrap();
    file
}

///
/// Write a charter plus the standard user and category mappings into the test folder and
/// return (charter_path, user_csv_path, category_csv_path).
///
pub fn write_config(base_dir: &Path, charter_yaml: &str) -> (PathBuf, PathBuf, PathBuf) {
    let charter = write_file(base_dir, "config/components.yaml", charter_yaml);
    let users = write_file(base_dir, "config/user_mapping.csv", USER_CSV);
    let categories = write_file(base_dir, "config/category_mapping.csv", CATEGORY_CSV);
    (charter, users, categories)
}

///
/// Run options pointing at the mappings written by write_config.
///
pub fn run_options(users: &Path, categories: &Path) -> rebadge::RunOptions {
    rebadge::RunOptions {
        user_mapping: Some(users.to_string_lossy().into()),
        category_mapping: Some(categories.to_string_lossy().into()),
        ..rebadge::RunOptions::default()
    }
}

///
/// A charter matching the shape most tests want: underscore-joined components, space as the
/// normalized separator, the usual date formats.
///
pub const BASE_CHARTER: &str = r#"
global:
  separators:
    input: ["-", "_", ".", " "]
    normalized: " "
  component_order: [id, name, remainder, date, category, management]
  component_separator: "_"
  case_normalization: titlecase
  file_exclusions: ["*.tmp", "~$*", "Thumbs.db"]
date:
  allowed_formats: ["%Y-%m-%d", "%d.%m.%Y", "%d %B %Y", "%d.%m.%y"]
  excluded_date_by_prefix: ["exp", "due"]
"#;

///
/// Ensure each job uses this uuid so output can be asserted exactly.
///
/// Important: Use the same value across all tests otherwise we can't run them in parallel
/// as they would corrupt each other's expected ENV value.
///
fn use_fixed_job_id() {
    std::env::set_var("REBADGE_FIXED_JOB_ID", FIXED_JOB_ID);
}
