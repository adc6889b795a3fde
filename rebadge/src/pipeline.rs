use std::path::Path;
use rbcore::charter::{CategoryPlacement, Charter, Component, DateSource};
use rbcore::lookup::{CategoryMap, UserMap};
use crate::category::{self, CategoryOutcome};
use crate::dates::{self, DateProgram, PathDates};
use crate::names;
use crate::separators;
use crate::users;

///
/// The per-file work unit. Created at the start of the pipeline, populated one field per
/// pass, dropped once the output filename has been assembled.
///
#[derive(Debug)]
pub struct Components {
    pub raw_path: String,
    pub user_id: String,
    pub raw_name: String,
    pub canonical_name: String,
    pub is_management: bool,
    pub category_id: String,
    pub extracted_dates: Vec<String>,
    pub date: String, // The resolved output date slot.
    pub remainder: String,
    pub cleaned_remainder: String,
    pub extension: String,
    pub management_flag: String,
}

///
/// The extraction pipeline: a fixed sequence of passes over one relative path.
///
///   UserPass -> CategoryPass -> NamePass -> DatePass -> CleanPass -> Assemble
///
/// Ordering matters: the person segment goes first so the category engine never sees it, the
/// category goes before dates so a directory named like a date isn't consumed as one, names
/// go before dates so a year inside a name can't become the date, and cleaning runs last so
/// protected normalized spans survive verbatim.
///
pub struct Pipeline<'a> {
    charter: &'a Charter,
    users: &'a UserMap,
    categories: &'a CategoryMap,
    dates: &'a DateProgram,
}

impl<'a> Pipeline<'a> {
    pub fn new(charter: &'a Charter, users: &'a UserMap, categories: &'a CategoryMap,
        dates: &'a DateProgram) -> Self {

        Self { charter, users, categories, dates }
    }

    ///
    /// Run every pass over one relative path and return the populated work unit.
    ///
    /// source_path, when given, points at the real file for the metadata date fallback.
    /// The pipeline always terminates with a filename - extraction misses just leave their
    /// component empty.
    ///
    pub fn process(&self, relative_path: &str, source_path: Option<&Path>, exclude_management: bool)
        -> Components {

        let raw_path = relative_path.trim_matches('/').to_string();

        // The extension is detached once here and reattached once at assembly - no pass
        // ever sees it.
        let (without_ext, extension) = detach_extension(&raw_path, self.charter.global().lowercase_extensions());

        let mut segments = without_ext.split('/');
        let person_segment = segments.next().unwrap_or("");
        let rest: Vec<&str> = segments.collect();

        // UserPass - segment 0 is always consumed, mapped or not.
        let resolution = users::resolve_user(
            person_segment,
            self.charter.user_mapping(),
            self.charter.global().case_normalization(),
            self.users);

        let mut remainder = rest.join("/");

        // CategoryPass.
        let mut category_id = String::new();
        if self.charter.category().append_to_filename() {
            match category::extract_category(&remainder, self.charter.category(), self.categories) {
                CategoryOutcome::Matched { category_id: id, remainder: rest, raw, canonical } => {
                    log::debug!("Category '{}' mapped to {} ({})", raw, id, canonical);
                    category_id = id;
                    remainder = rest;
                },
                CategoryOutcome::Unmapped => log::debug!("No category mapping for '{}'", remainder),
                CategoryOutcome::NoCategory => {},
            }
        }

        remainder = drop_excluded_directories(&remainder, self.charter);

        // NamePass - remove every occurrence of the person's name from the remainder.
        let name_extract = names::extract_names(
            &remainder,
            &resolution.canonical_name,
            self.charter.name(),
            self.charter.global().separators());

        if !name_extract.matched.is_empty() {
            log::debug!("Name occurrences removed: {}", name_extract.matched.join(", "));
        }
        remainder = name_extract.remainder;

        // DatePass.
        let path_dates = self.dates.extract_from_path(
            &remainder,
            self.charter.date(),
            self.charter.global().separators());

        let date = self.resolve_date(&path_dates, source_path);

        let mut extracted_dates = path_dates.folder_dates.clone();
        extracted_dates.extend(path_dates.filename_dates.iter().cloned());

        remainder = path_dates.remainder;

        // CleanPass - protected spans pass through verbatim and are dropped afterwards.
        let cleaned_remainder = separators::clean_remainder(
            &remainder,
            self.charter.global().separators(),
            &path_dates.protections);

        // The flag strings follow the mapping the deployments rely on: management
        // directories emit no_flag, everything else yes_flag.
        let management_flag = match self.charter.management_flag().enabled() && !exclude_management {
            true => match resolution.is_management {
                true  => self.charter.management_flag().no_flag().to_string(),
                false => self.charter.management_flag().yes_flag().to_string(),
            },
            false => String::new(),
        };

        Components {
            raw_path,
            user_id: resolution.user_id,
            raw_name: resolution.raw_name,
            canonical_name: resolution.canonical_name,
            is_management: resolution.is_management,
            category_id,
            extracted_dates,
            date,
            remainder,
            cleaned_remainder,
            extension,
            management_flag,
        }
    }

    ///
    /// The first source in date_priority_order with a date supplies the output slot.
    ///
    fn resolve_date(&self, path_dates: &PathDates, source_path: Option<&Path>) -> String {
        for source in self.charter.date().date_priority_order() {
            let hit = match source {
                DateSource::Filename => path_dates.filename_dates.first().cloned(),
                DateSource::Foldername => path_dates.folder_dates.first().cloned(),
                DateSource::Modified | DateSource::Created => source_path
                    .and_then(|path| dates::metadata_date(path, *source, self.charter.date().normalized_format())),
            };

            if let Some(date) = hit {
                return date
            }
        }

        String::new()
    }

    ///
    /// Assemble the output filename: non-empty components in charter order, joined by the
    /// component separator, category placed per the placement policy, extension reattached.
    ///
    pub fn assemble(&self, components: &Components) -> String {
        let global = self.charter.global();
        let placement = self.charter.category().placement();

        let category_slot = match placement {
            CategoryPlacement::SeparateComponent => components.category_id.as_str(),
            _ => "",
        };

        let mut fields = vec!();
        for component in global.component_order() {
            let value = match component {
                Component::Id => components.user_id.as_str(),
                Component::Name => components.canonical_name.as_str(),
                Component::Remainder => components.cleaned_remainder.as_str(),
                Component::Date => components.date.as_str(),
                Component::Category => category_slot,
                Component::Management => components.management_flag.as_str(),
            };

            if !value.is_empty() {
                fields.push(value);
            }
        }

        let mut filename = fields.join(global.component_separator());

        if !components.category_id.is_empty() {
            match placement {
                CategoryPlacement::Prefix => {
                    filename = format!("{}{}{}", components.category_id, global.component_separator(), filename)
                },
                CategoryPlacement::Suffix => {
                    filename = format!("{}{}{}", filename, global.component_separator(), components.category_id)
                },
                CategoryPlacement::SeparateComponent => {},
            }
        }

        if filename.is_empty() {
            filename = components.raw_name.clone();
        }

        format!("{}{}", filename, components.extension)
    }
}

///
/// Drop directory segments configured as noise (utility folders like 'Notes') from the
/// remainder. The filename segment is never dropped.
///
fn drop_excluded_directories(remainder: &str, charter: &Charter) -> String {
    let exclusions = charter.global().directory_exclusions();
    if exclusions.is_empty() || remainder.is_empty() {
        return remainder.to_string()
    }

    let segments: Vec<&str> = remainder.split('/').collect();
    let last = segments.len() - 1;

    let kept: Vec<&str> = segments.iter()
        .enumerate()
        .filter(|(idx, segment)| {
            *idx == last || !exclusions.iter().any(|ex| ex.eq_ignore_ascii_case(segment))
        })
        .map(|(_, segment)| *segment)
        .collect();

    kept.join("/")
}

///
/// Split the final path segment into stem and extension. The extension is the last dot plus
/// its token; a leading dot is part of the name, not an extension.
///
fn detach_extension(path: &str, lowercase: bool) -> (String, String) {
    let seg_start = path.rfind('/').map(|idx| idx + 1).unwrap_or(0);
    let filename = &path[seg_start..];

    match filename.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < filename.len() => {
            let split_at = seg_start + idx;
            let extension = match lowercase {
                true  => path[split_at..].to_lowercase(),
                false => path[split_at..].to_string(),
            };
            (path[..split_at].to_string(), extension)
        },
        _ => (path.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbcore::charter::Charter;
    use std::path::Path;

    const CHARTER: &str = r#"
global:
  separators:
    input: ["-", "_", ".", " "]
    normalized: " "
  component_order: [id, name, remainder, date, category, management]
  component_separator: "_"
  case_normalization: titlecase
date:
  allowed_formats: ["%Y-%m-%d", "%d.%m.%Y", "%d %B %Y", "%d.%m.%y"]
  excluded_date_by_prefix: ["exp", "due"]
"#;

    const USERS: &str = "user_id,full_name\n1001,John Doe\n1002,Jane Smith\n";
    const CATEGORIES: &str = "category_id,category_name\n1,WHS\n2,Medical\n3,Contracts\n";

    struct Fixture {
        charter: Charter,
        users: rbcore::lookup::UserMap,
        categories: rbcore::lookup::CategoryMap,
        dates: DateProgram,
    }

    impl Fixture {
        fn new(charter_yaml: &str) -> Self {
            let charter = Charter::load_from_str(charter_yaml).unwrap();
            let users = rbcore::lookup::UserMap::from_reader(
                USERS.as_bytes(), Path::new("users.csv"), charter.user_mapping()).unwrap();
            let categories = rbcore::lookup::CategoryMap::from_reader(
                CATEGORIES.as_bytes(), Path::new("categories.csv"), charter.category()).unwrap();
            let dates = DateProgram::compile(charter.date()).unwrap();
            Self { charter, users, categories, dates }
        }

        fn run(&self, path: &str) -> String {
            let pipeline = Pipeline::new(&self.charter, &self.users, &self.categories, &self.dates);
            let components = pipeline.process(path, None, false);
            pipeline.assemble(&components)
        }
    }

    #[test]
    fn full_pipeline_with_category_and_date() {
        let fixture = Fixture::new(CHARTER);

        assert_eq!(
            fixture.run("John Doe/WHS/2023/Incidents/01.06.2023 - John Doe.pdf"),
            "1001_John Doe_2023 Incidents_2023-06-01_1.pdf");
    }

    #[test]
    fn prefix_excluded_date_stays_in_the_remainder() {
        let fixture = Fixture::new(CHARTER);

        assert_eq!(
            fixture.run("Jane Smith/Medical/GP Reports/exp 2025-08-30 Renewal.pdf"),
            "1002_Jane Smith_GP Reports exp 2025.08.30 Renewal_2.pdf");
    }

    #[test]
    fn date_ranges_survive_in_the_remainder() {
        let fixture = Fixture::new(CHARTER);

        assert_eq!(
            fixture.run("John Doe/Contracts/2024-07-01 to 2025-06-30 agreement.pdf"),
            "1001_John Doe_2024-07-01 - 2025-06-30 agreement_3.pdf");
    }

    #[test]
    fn shorthand_and_short_year_dates_resolve() {
        let yaml = CHARTER.replace("global:\n", "global:\n  directory_exclusions: [\"Notes\"]\n");
        let fixture = Fixture::new(&yaml);

        assert_eq!(
            fixture.run("John Doe/Notes/j-doe-meeting-15.03.23.pdf"),
            "1001_John Doe_meeting_2023-03-15.pdf");
    }

    #[test]
    fn unmapped_person_gets_titlecase_and_no_id() {
        let fixture = Fixture::new(CHARTER);

        assert_eq!(
            fixture.run("temp person/test_file.txt"),
            "Temp Person_test file.txt");
    }

    #[test]
    fn management_flag_mapping_follows_the_charter() {
        let yaml = CHARTER.replace("date:\n", r#"user_mapping:
  management_suffix: " - MGMT"
management_flag:
  enabled: true
  yes_flag: "_yes"
  no_flag: "_no"
date:
"#);
        let fixture = Fixture::new(&yaml);

        // Non-management files carry yes_flag, management files no_flag.
        assert_eq!(fixture.run("John Doe/report.pdf"), "1001_John Doe_report__yes.pdf");
        assert_eq!(fixture.run("John Doe - MGMT/report.pdf"), "1001_John Doe_report__no.pdf");
    }

    #[test]
    fn management_flag_can_be_excluded_per_run() {
        let yaml = CHARTER.replace("date:\n", "management_flag:\n  enabled: true\ndate:\n");
        let fixture = Fixture::new(&yaml);

        let pipeline = Pipeline::new(&fixture.charter, &fixture.users, &fixture.categories, &fixture.dates);
        let components = pipeline.process("John Doe/report.pdf", None, true);

        assert_eq!(components.management_flag, "");
        assert_eq!(pipeline.assemble(&components), "1001_John Doe_report.pdf");
    }

    #[test]
    fn category_placement_prefix_and_suffix() {
        let prefix = CHARTER.replace("date:\n", "category:\n  placement: prefix\ndate:\n");
        let fixture = Fixture::new(&prefix);
        assert_eq!(fixture.run("John Doe/WHS/a.pdf"), "1_1001_John Doe_a.pdf");

        let suffix = CHARTER.replace("date:\n", "category:\n  placement: suffix\ndate:\n");
        let fixture = Fixture::new(&suffix);
        assert_eq!(fixture.run("John Doe/WHS/a.pdf"), "1001_John Doe_a_1.pdf");
    }

    #[test]
    fn category_pass_can_be_disabled() {
        let yaml = CHARTER.replace("date:\n", "category:\n  append_to_filename: false\ndate:\n");
        let fixture = Fixture::new(&yaml);

        // The segment is not consumed: it lands in the remainder instead.
        assert_eq!(fixture.run("John Doe/WHS/a.pdf"), "1001_John Doe_WHS a.pdf");
    }

    #[test]
    fn extension_is_detached_once_and_reattached_once() {
        let fixture = Fixture::new(CHARTER);

        // The dots in the stem are separators, the final .pdf is not.
        assert_eq!(fixture.run("John Doe/notes.v2.pdf"), "1001_John Doe_notes v2.pdf");
    }

    #[test]
    fn files_without_extension_keep_none() {
        let fixture = Fixture::new(CHARTER);
        assert_eq!(fixture.run("John Doe/README"), "1001_John Doe_README");
    }

    #[test]
    fn component_order_is_respected() {
        let yaml = CHARTER.replace(
            "component_order: [id, name, remainder, date, category, management]",
            "component_order: [date, name, id]");
        let fixture = Fixture::new(&yaml);

        assert_eq!(
            fixture.run("John Doe/2023-06-01 report.pdf"),
            "2023-06-01_John Doe_1001.pdf");
    }

    #[test]
    fn empty_components_contribute_no_separator() {
        let fixture = Fixture::new(CHARTER);

        // No id, no category, no date: only name and remainder appear.
        assert_eq!(fixture.run("someone new/misc notes.txt"), "Someone New_misc notes.txt");
    }
}
