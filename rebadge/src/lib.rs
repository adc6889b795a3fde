mod category;
mod dates;
mod error;
mod folders;
mod names;
mod pipeline;
mod separators;
mod spans;
mod users;

use uuid::Uuid;
use itertools::Itertools;
use std::str::FromStr;
use std::time::{Duration, Instant};
use std::path::{Path, PathBuf};
use rbcore::charter::Charter;
use rbcore::lookup::{CategoryMap, UserMap};
use crate::dates::DateProgram;
use crate::folders::{Materialised, ToCanonicalString};

pub use crate::error::RebadgeError;
pub use crate::pipeline::{Components, Pipeline};

///
/// Options gathered from the command line for one run.
///
#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    pub duplicate: bool,
    pub dry_run: bool,
    pub exclude_management_flag: bool,
    pub user_mapping: Option<String>,
    pub category_mapping: Option<String>,
}

///
/// Created for each rename job. Used to pass the main top-level job 'things' around.
///
pub struct Context {
    started: Instant,        // When the job started.
    job_id: Uuid,            // Each job is given a unique id.
    charter: Charter,        // The charter describing how filenames are assembled.
    charter_path: PathBuf,   // The path to the charter being run.
    users: UserMap,          // user_id <-> canonical name mapping.
    categories: CategoryMap, // category id mapping.
    dates: DateProgram,      // The compiled date regex program - reused across all files.
    options: RunOptions,     // Command-line switches for this run.
}

impl Context {
    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn job_id(&self) -> &Uuid {
        &self.job_id
    }

    pub fn charter(&self) -> &Charter {
        &self.charter
    }

    pub fn charter_path(&self) -> &PathBuf {
        &self.charter_path
    }

    pub fn users(&self) -> &UserMap {
        &self.users
    }

    pub fn categories(&self) -> &CategoryMap {
        &self.categories
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline::new(&self.charter, &self.users, &self.categories, &self.dates)
    }
}

///
/// What happened to one file.
///
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Copied,
    Moved,
    Preview,
    Failed(String),
}

#[derive(Clone, Debug)]
pub struct FileResult {
    pub relative_path: String,
    pub canonical_name: String,
    pub new_filename: String,
    pub outcome: Outcome,
}

///
/// Load the charter and mapping tables and compile the date program, returning the job
/// context everything else hangs off.
///
pub fn init_job(charter_path: &str, options: RunOptions) -> Result<Context, RebadgeError> {
    let charter = Charter::load(Path::new(charter_path))?;

    let user_mapping_path = options.user_mapping.clone()
        .unwrap_or_else(|| charter.user_mapping().mapping_file());
    let users = UserMap::load(Path::new(&user_mapping_path), charter.user_mapping())?;

    let category_mapping_path = options.category_mapping.clone()
        .unwrap_or_else(|| charter.category().mapping_file().to_string());
    let categories = CategoryMap::load(Path::new(&category_mapping_path), charter.category())?;

    let dates = DateProgram::compile(charter.date())?;

    let job_id = match std::env::var("REBADGE_FIXED_JOB_ID") {
        Ok(job_id) => Uuid::from_str(&job_id).expect("Test JOB_ID has invalid format"),
        Err(_) => Uuid::new_v4(),
    };

    let ctx = Context {
        started: Instant::now(),
        job_id,
        charter,
        charter_path: Path::new(charter_path).to_path_buf(),
        users,
        categories,
        dates,
        options,
    };

    log::info!("Starting rebadge job:");
    log::info!("    Job ID: {}", ctx.job_id());
    log::info!("   Charter: {}", ctx.charter_path().to_canonical_string());
    log::info!("     Users: {} mapped", ctx.users().len());
    log::info!("Categories: {} mapped", ctx.categories().len());

    Ok(ctx)
}

///
/// Walk the input tree and materialise every file as
/// <output_root>/<canonical_name>/<new_filename>.
///
/// Files move by default; --duplicate copies instead. Per-file failures are recorded and
/// processing continues - only the missing input directory is fatal here.
///
pub fn run_directory(ctx: &Context, input: &Path, output: &Path) -> Result<Vec<FileResult>, RebadgeError> {
    if !input.is_dir() {
        return Err(RebadgeError::InputDirNotFound { path: input.to_canonical_string() })
    }

    let pipeline = ctx.pipeline();
    let mut results = vec!();

    for file in folders::files_beneath(input, ctx.charter().global()) {
        let relative = file.strip_prefix(input)
            .expect("crawled file outside the input root")
            .to_string_lossy()
            .replace('\\', "/");

        let components = pipeline.process(&relative, Some(&file), ctx.options().exclude_management_flag);
        let new_filename = pipeline.assemble(&components);
        let destination = output.join(&components.canonical_name).join(&new_filename);

        results.push(deliver(ctx, &file, &destination, &relative, components, new_filename,
            ctx.options().duplicate));
    }

    Ok(results)
}

///
/// Test mode: read from tests/test-files/from-<name>, write copies to
/// tests/test-files/to-<name>, optionally filtered to person directories whose name
/// contains the filter.
///
pub fn run_test_mode(ctx: &Context, test_name: &str, person_filter: Option<&str>)
    -> Result<Vec<FileResult>, RebadgeError> {

    let input = PathBuf::from(format!("tests/test-files/from-{}", test_name));
    let output = PathBuf::from(format!("tests/test-files/to-{}", test_name));

    if !input.is_dir() {
        return Err(RebadgeError::InputDirNotFound { path: input.to_canonical_string() })
    }

    let pipeline = ctx.pipeline();
    let mut results = vec!();

    for file in folders::files_beneath(&input, ctx.charter().global()) {
        let relative = file.strip_prefix(&input)
            .expect("crawled file outside the input root")
            .to_string_lossy()
            .replace('\\', "/");

        if let Some(filter) = person_filter {
            let person = relative.split('/').next().unwrap_or("");
            if !person.to_lowercase().contains(&filter.to_lowercase()) {
                continue
            }
        }

        let components = pipeline.process(&relative, Some(&file), ctx.options().exclude_management_flag);
        let new_filename = pipeline.assemble(&components);
        let destination = output.join(&components.canonical_name).join(&new_filename);

        // Test fixtures are never destroyed - always copy.
        results.push(deliver(ctx, &file, &destination, &relative, components, new_filename, true));
    }

    Ok(results)
}

///
/// Normalise a single path and return the filename it would get - no filesystem access.
///
pub fn extract_single(ctx: &Context, path: &str) -> String {
    let pipeline = ctx.pipeline();
    let components = pipeline.process(path, None, ctx.options().exclude_management_flag);
    pipeline.assemble(&components)
}

fn deliver(ctx: &Context, file: &Path, destination: &Path, relative: &str, components: Components,
    new_filename: String, duplicate: bool) -> FileResult {

    let outcome = match ctx.options().dry_run {
        true => {
            log::info!("DRY RUN - would write {}", destination.to_string_lossy());
            Outcome::Preview
        },
        false => match folders::materialise(file, destination, duplicate) {
            Ok(Materialised::Copied) => Outcome::Copied,
            Ok(Materialised::Moved) => Outcome::Moved,
            Err(err) => {
                log::error!("Failed to write {}: {}", destination.to_string_lossy(), err);
                Outcome::Failed(err.to_string())
            },
        },
    };

    if !matches!(outcome, Outcome::Failed(_)) {
        log::info!("{} -> {}/{}", relative, components.canonical_name, new_filename);
    }

    FileResult {
        relative_path: relative.to_string(),
        canonical_name: components.canonical_name,
        new_filename,
        outcome,
    }
}

///
/// Completion summary: counts, failures, and a per-person breakdown.
///
pub fn print_summary(ctx: &Context, results: &[FileResult]) {
    let copied = results.iter().filter(|r| r.outcome == Outcome::Copied).count();
    let moved = results.iter().filter(|r| r.outcome == Outcome::Moved).count();
    let previewed = results.iter().filter(|r| r.outcome == Outcome::Preview).count();
    let failed: Vec<&FileResult> = results.iter()
        .filter(|r| matches!(r.outcome, Outcome::Failed(_)))
        .collect();

    log::info!("Completed {} files in {}", results.len(), formatted_elapsed(ctx.started()));
    log::info!("  copied {}, moved {}, previewed {}, failed {}", copied, moved, previewed, failed.len());

    for person in results.iter().map(|r| r.canonical_name.as_str()).unique() {
        let count = results.iter().filter(|r| r.canonical_name == person).count();
        log::info!("  {}: {} files", person, count);
    }

    for failure in failed {
        if let Outcome::Failed(reason) = &failure.outcome {
            log::error!("  {} failed: {}", failure.relative_path, reason);
        }
    }
}

///
/// Elapsed wall-clock for the summary line, tinted, kept to ms precision.
///
fn formatted_elapsed(started: Instant) -> String {
    let elapsed = started.elapsed();
    let to_millis = Duration::new(elapsed.as_secs(), elapsed.subsec_millis() * 1_000_000);
    ansi_term::Colour::Cyan.paint(humantime::format_duration(to_millis).to_string()).to_string()
}
