use anyhow::Result;
use clap::{App, Arg, ArgMatches, ErrorKind};
use std::path::Path;
use std::process;
use rebadge::RunOptions;

///
/// Exit codes: 0 success (zero files included), 1 fatal configuration or I/O error,
/// 2 invalid arguments.
///
fn main() {
    let app = App::new("rebadge")
        .version("1.0")
        .about("Rebadge renames files migrated between document stores, deriving one canonical filename per file from its path.")
        .arg(Arg::with_name("config")
            .long("config")
            .help("The charter yaml file describing separators, components, formats and mappings")
            .takes_value(true)
            .default_value("config/components.yaml"))
        .arg(Arg::with_name("input_dir")
            .long("input-dir")
            .help("Input directory of per-person folders to process")
            .takes_value(true))
        .arg(Arg::with_name("output_dir")
            .long("output-dir")
            .help("Output directory - files land in <output-dir>/<canonical name>/")
            .takes_value(true))
        .arg(Arg::with_name("user_mapping")
            .long("user-mapping")
            .help("Override the user mapping csv location")
            .takes_value(true))
        .arg(Arg::with_name("category_mapping")
            .long("category-mapping")
            .help("Override the category mapping csv location")
            .takes_value(true))
        .arg(Arg::with_name("duplicate")
            .long("duplicate")
            .help("Copy files into place instead of moving them"))
        .arg(Arg::with_name("exclude_management_flag")
            .long("exclude-management-flag")
            .help("Omit the management component from output filenames"))
        .arg(Arg::with_name("dry_run")
            .long("dry-run")
            .help("Preview the renames without writing anything"))
        .arg(Arg::with_name("verbose")
            .long("verbose")
            .short("v")
            .help("Increase logging"))
        .arg(Arg::with_name("test_mode")
            .long("test-mode")
            .help("Read from tests/test-files/from-<test-name> and write to tests/test-files/to-<test-name>"))
        .arg(Arg::with_name("test_name")
            .long("test-name")
            .help("The test fixture name used by --test-mode")
            .takes_value(true)
            .default_value("basic"))
        .arg(Arg::with_name("person_filter")
            .long("person-filter")
            .help("Only process person directories whose name contains this filter (test mode)")
            .takes_value(true))
        .arg(Arg::with_name("extract_filename")
            .long("extract-filename")
            .help("Print the normalized filename for a single input path and exit")
            .takes_value(true));

    let matches = match app.get_matches_safe() {
        Ok(matches) => matches,
        Err(err) if err.kind == ErrorKind::HelpDisplayed || err.kind == ErrorKind::VersionDisplayed => {
            println!("{}", err.message);
            process::exit(0)
        },
        Err(err) => {
            eprintln!("{}", err.message);
            process::exit(2)
        },
    };

    dotenv::dotenv().ok();

    let default_level = match matches.is_present("verbose") {
        true  => "debug",
        false => "info",
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .try_init();

    // One of the three run modes must be selected.
    let single = matches.is_present("extract_filename");
    let test_mode = matches.is_present("test_mode");
    let directory = matches.is_present("input_dir") && matches.is_present("output_dir");

    if !single && !test_mode && !directory {
        eprintln!("Specify --extract-filename, --test-mode, or both --input-dir and --output-dir");
        process::exit(2)
    }

    if let Err(err) = run(&matches) {
        log::error!("{:#}", err);
        process::exit(1)
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let options = RunOptions {
        duplicate: matches.is_present("duplicate"),
        dry_run: matches.is_present("dry_run"),
        exclude_management_flag: matches.is_present("exclude_management_flag"),
        user_mapping: matches.value_of("user_mapping").map(String::from),
        category_mapping: matches.value_of("category_mapping").map(String::from),
    };

    let ctx = rebadge::init_job(matches.value_of("config").expect("config has a default"), options)?;

    if let Some(path) = matches.value_of("extract_filename") {
        println!("{}", rebadge::extract_single(&ctx, path));
        return Ok(())
    }

    let results = match matches.is_present("test_mode") {
        true => rebadge::run_test_mode(
            &ctx,
            matches.value_of("test_name").expect("test-name has a default"),
            matches.value_of("person_filter"))?,

        false => rebadge::run_directory(
            &ctx,
            Path::new(matches.value_of("input_dir").expect("validated above")),
            Path::new(matches.value_of("output_dir").expect("validated above")))?,
    };

    rebadge::print_summary(&ctx, &results);
    Ok(())
}
