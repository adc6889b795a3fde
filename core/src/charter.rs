use serde::Deserialize;
use std::{collections::BTreeMap, io::BufReader, path::Path};
use crate::error::Error;

///
/// The charter is the YAML document describing how output filenames are assembled: which
/// separators to recognise, what order the filename components appear in, how dates and
/// names are matched and which mapping files supply user and category ids.
///
/// It is loaded once at startup and never mutated afterwards.
///
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Charter {
    global: Global,

    #[serde(default)]
    date: DateOptions,

    #[serde(default)]
    name: NameOptions,

    #[serde(default)]
    user_mapping: UserMappingOptions,

    #[serde(default)]
    management_flag: ManagementFlagOptions,

    #[serde(default)]
    category: CategoryOptions,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Global {
    separators: Separators,
    component_order: Vec<Component>,

    #[serde(default = "default_component_separator")]
    component_separator: String,

    #[serde(default = "default_case_normalization")]
    case_normalization: CaseNormalization,

    #[serde(default)]
    file_exclusions: Vec<String>,

    #[serde(default)]
    directory_exclusions: Vec<String>,

    #[serde(default = "default_true")]
    skip_hidden: bool,

    #[serde(default)]
    lowercase_extensions: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Separators {
    input: Vec<char>,

    #[serde(default = "default_normalized_separator")]
    normalized: char,
}

///
/// A filename is assembled from these components, in charter order. Empty components
/// contribute neither a value nor a separator.
///
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Id,
    Name,
    Remainder,
    Date,
    Category,
    Management,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseNormalization {
    Titlecase,
    Lowercase,
    Uppercase,
    Asis,
}

impl CaseNormalization {
    ///
    /// Apply the policy to a name, preserving any non-alphanumeric characters in place.
    ///
    pub fn apply(&self, name: &str) -> String {
        match self {
            CaseNormalization::Lowercase => name.to_lowercase(),
            CaseNormalization::Uppercase => name.to_uppercase(),
            CaseNormalization::Asis => name.to_string(),
            CaseNormalization::Titlecase => {
                let mut out = String::with_capacity(name.len());
                let mut at_word_start = true;
                for ch in name.chars() {
                    if ch.is_alphanumeric() {
                        if at_word_start {
                            out.extend(ch.to_uppercase());
                        } else {
                            out.extend(ch.to_lowercase());
                        }
                        at_word_start = false;
                    } else {
                        out.push(ch);
                        at_word_start = true;
                    }
                }
                out
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateOptions {
    #[serde(default = "default_allowed_formats")]
    allowed_formats: Vec<String>,

    #[serde(default = "default_normalized_format")]
    normalized_format: String,

    #[serde(default = "default_normalized_prefix_format")]
    normalized_prefix_format: String,

    #[serde(default = "default_normalized_format")]
    normalized_ranges_format: String,

    #[serde(default = "default_true")]
    exclude_ranges: bool,

    #[serde(default = "default_range_separators")]
    exclude_ranges_separators: Vec<char>,

    #[serde(default = "default_range_separator_strings")]
    exclude_ranges_separator_strings: Vec<String>,

    #[serde(default = "default_range_normalized_separator")]
    exclude_ranges_normalized_separator: String,

    #[serde(default)]
    excluded_date_by_prefix: Vec<String>,

    #[serde(default = "default_date_priority_order")]
    date_priority_order: Vec<DateSource>,
}

///
/// Where an output date may come from, in falling priority order.
///
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    Filename,
    Foldername,
    Modified,
    Created,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NameOptions {
    #[serde(default = "default_extraction_order")]
    extraction_order: Vec<NamePass>,

    #[serde(default = "default_fuzzy_substitutions")]
    fuzzy_substitutions: BTreeMap<char, Vec<char>>,
}

///
/// The matching strategies the name engine runs, in charter order.
///
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NamePass {
    Shorthand,
    Initials,
    NameComponents,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserMappingOptions {
    #[serde(default = "default_user_mapping_file")]
    mapping_file: String,

    #[serde(default = "default_user_id_column")]
    id_column: String,

    #[serde(default = "default_user_name_column")]
    name_column: String,

    #[serde(default = "default_true")]
    create_if_missing: bool,

    #[serde(default)]
    substring_match: bool,

    #[serde(default)]
    prefix: String,

    #[serde(default)]
    management_suffix: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagementFlagOptions {
    #[serde(default)]
    enabled: bool,

    #[serde(default = "default_yes_flag")]
    yes_flag: String,

    #[serde(default = "default_no_flag")]
    no_flag: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryOptions {
    #[serde(default = "default_category_mapping_file")]
    mapping_file: String,

    #[serde(default = "default_category_id_column")]
    id_column: String,

    #[serde(default = "default_category_name_column")]
    name_column: String,

    #[serde(default = "default_true")]
    append_to_filename: bool,

    #[serde(default = "default_category_placement")]
    placement: CategoryPlacement,

    #[serde(default = "default_true")]
    case_insensitive: bool,

    #[serde(default = "default_true")]
    first_level_only: bool,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CategoryPlacement {
    Prefix,
    Suffix,
    SeparateComponent,
}

impl Separators {
    pub fn input(&self) -> &[char] {
        &self.input
    }

    pub fn normalized(&self) -> char {
        self.normalized
    }

    pub fn is_separator(&self, ch: char) -> bool {
        ch == self.normalized || self.input.contains(&ch)
    }
}

impl Global {
    pub fn separators(&self) -> &Separators {
        &self.separators
    }

    pub fn component_order(&self) -> &[Component] {
        &self.component_order
    }

    pub fn component_separator(&self) -> &str {
        &self.component_separator
    }

    pub fn case_normalization(&self) -> CaseNormalization {
        self.case_normalization
    }

    pub fn file_exclusions(&self) -> &[String] {
        &self.file_exclusions
    }

    ///
    /// Utility directory names which carry no meaning in an output filename.
    ///
    pub fn directory_exclusions(&self) -> &[String] {
        &self.directory_exclusions
    }

    pub fn skip_hidden(&self) -> bool {
        self.skip_hidden
    }

    pub fn lowercase_extensions(&self) -> bool {
        self.lowercase_extensions
    }
}

impl DateOptions {
    pub fn allowed_formats(&self) -> &[String] {
        &self.allowed_formats
    }

    pub fn normalized_format(&self) -> &str {
        &self.normalized_format
    }

    pub fn normalized_prefix_format(&self) -> &str {
        &self.normalized_prefix_format
    }

    pub fn normalized_ranges_format(&self) -> &str {
        &self.normalized_ranges_format
    }

    pub fn exclude_ranges(&self) -> bool {
        self.exclude_ranges
    }

    pub fn exclude_ranges_separators(&self) -> &[char] {
        &self.exclude_ranges_separators
    }

    pub fn exclude_ranges_separator_strings(&self) -> &[String] {
        &self.exclude_ranges_separator_strings
    }

    pub fn exclude_ranges_normalized_separator(&self) -> &str {
        &self.exclude_ranges_normalized_separator
    }

    pub fn excluded_date_by_prefix(&self) -> &[String] {
        &self.excluded_date_by_prefix
    }

    pub fn date_priority_order(&self) -> &[DateSource] {
        &self.date_priority_order
    }
}

impl NameOptions {
    pub fn extraction_order(&self) -> &[NamePass] {
        &self.extraction_order
    }

    pub fn fuzzy_substitutions(&self) -> &BTreeMap<char, Vec<char>> {
        &self.fuzzy_substitutions
    }
}

impl UserMappingOptions {
    ///
    /// The mapping file path - the VC_USER_MAPPING_FILE environment variable wins over the charter.
    ///
    pub fn mapping_file(&self) -> String {
        match std::env::var("VC_USER_MAPPING_FILE") {
            Ok(path) if !path.is_empty() => path,
            _ => self.mapping_file.clone(),
        }
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn name_column(&self) -> &str {
        &self.name_column
    }

    pub fn create_if_missing(&self) -> bool {
        self.create_if_missing
    }

    pub fn substring_match(&self) -> bool {
        self.substring_match
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn management_suffix(&self) -> &str {
        &self.management_suffix
    }
}

impl ManagementFlagOptions {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn yes_flag(&self) -> &str {
        &self.yes_flag
    }

    pub fn no_flag(&self) -> &str {
        &self.no_flag
    }
}

impl CategoryOptions {
    pub fn mapping_file(&self) -> &str {
        &self.mapping_file
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    pub fn name_column(&self) -> &str {
        &self.name_column
    }

    pub fn append_to_filename(&self) -> bool {
        self.append_to_filename
    }

    pub fn placement(&self) -> CategoryPlacement {
        self.placement
    }

    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub fn first_level_only(&self) -> bool {
        self.first_level_only
    }
}

impl Charter {
    pub fn global(&self) -> &Global {
        &self.global
    }

    pub fn date(&self) -> &DateOptions {
        &self.date
    }

    pub fn name(&self) -> &NameOptions {
        &self.name
    }

    pub fn user_mapping(&self) -> &UserMappingOptions {
        &self.user_mapping
    }

    pub fn management_flag(&self) -> &ManagementFlagOptions {
        &self.management_flag
    }

    pub fn category(&self) -> &CategoryOptions {
        &self.category
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let rdr = BufReader::new(std::fs::File::open(path)
            .map_err(|source| Error::CharterFileNotFound { path: path.to_string_lossy().into(), source })?);

        let charter: Self = serde_yaml::from_reader(rdr)
            .map_err(|source| Error::InvalidCharter { path: path.to_string_lossy().into(), source })?;

        charter.validate()?;
        Ok(charter)
    }

    pub fn load_from_str(yaml: &str) -> Result<Self, Error> {
        let charter: Self = serde_yaml::from_str(yaml)
            .map_err(|source| Error::InvalidCharter { path: "<inline>".into(), source })?;

        charter.validate()?;
        Ok(charter)
    }

    fn validate(&self) -> Result<(), Error> {
        if self.global.component_order.is_empty() {
            return Err(Error::CharterValidationError { reason: "component_order must not be empty".into() })
        }

        for (idx, component) in self.global.component_order.iter().enumerate() {
            if self.global.component_order[idx + 1..].contains(component) {
                return Err(Error::CharterValidationError {
                    reason: format!("component_order repeats {:?}", component) })
            }
        }

        if self.global.separators.input.is_empty() {
            return Err(Error::CharterValidationError { reason: "separators.input must not be empty".into() })
        }

        if self.date.allowed_formats.is_empty() {
            return Err(Error::CharterValidationError { reason: "date.allowed_formats must not be empty".into() })
        }

        for format in &self.date.allowed_formats {
            let has_year = format.contains("%Y") || format.contains("%y");
            let has_month = format.contains("%m") || format.contains("%b") || format.contains("%B");
            let has_day = format.contains("%d");

            if !(has_year && has_month && has_day) {
                return Err(Error::CharterValidationError {
                    reason: format!("date format '{}' must contain year, month and day tokens", format) })
            }
        }

        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_component_separator() -> String {
    "_".into()
}

fn default_case_normalization() -> CaseNormalization {
    CaseNormalization::Titlecase
}

fn default_normalized_separator() -> char {
    ' '
}

fn default_allowed_formats() -> Vec<String> {
    vec!("%Y-%m-%d".into(), "%d.%m.%Y".into(), "%d %B %Y".into(), "%d.%m.%y".into())
}

fn default_normalized_format() -> String {
    "%Y-%m-%d".into()
}

fn default_normalized_prefix_format() -> String {
    "%Y.%m.%d".into()
}

fn default_range_separators() -> Vec<char> {
    vec!(' ', '-', '_', '.', ',')
}

fn default_range_separator_strings() -> Vec<String> {
    vec!(" to ".into())
}

fn default_range_normalized_separator() -> String {
    " - ".into()
}

fn default_date_priority_order() -> Vec<DateSource> {
    vec!(DateSource::Filename, DateSource::Foldername)
}

fn default_extraction_order() -> Vec<NamePass> {
    vec!(NamePass::Shorthand, NamePass::Initials, NamePass::NameComponents)
}

fn default_fuzzy_substitutions() -> BTreeMap<char, Vec<char>> {
    let mut subs = BTreeMap::new();
    subs.insert('a', vec!('@', '4', 'à', 'á', 'â', 'ä'));
    subs.insert('e', vec!('3', '€', 'è', 'é', 'ê', 'ë'));
    subs.insert('i', vec!('1', 'í', 'ì', 'î', 'ï'));
    subs.insert('l', vec!('1', '|'));
    subs.insert('o', vec!('0', 'ô', 'ö', 'ó'));
    subs.insert('s', vec!('5', '$'));
    subs.insert('t', vec!('7', '+'));
    subs.insert('z', vec!('2'));
    subs
}

fn default_user_mapping_file() -> String {
    "config/user_mapping.csv".into()
}

fn default_user_id_column() -> String {
    "user_id".into()
}

fn default_user_name_column() -> String {
    "full_name".into()
}

fn default_yes_flag() -> String {
    "_yes".into()
}

fn default_no_flag() -> String {
    "_no".into()
}

fn default_category_mapping_file() -> String {
    "config/category_mapping.csv".into()
}

fn default_category_id_column() -> String {
    "category_id".into()
}

fn default_category_name_column() -> String {
    "category_name".into()
}

fn default_category_placement() -> CategoryPlacement {
    CategoryPlacement::SeparateComponent
}

impl Default for DateOptions {
    fn default() -> Self {
        Self {
            allowed_formats: default_allowed_formats(),
            normalized_format: default_normalized_format(),
            normalized_prefix_format: default_normalized_prefix_format(),
            normalized_ranges_format: default_normalized_format(),
            exclude_ranges: true,
            exclude_ranges_separators: default_range_separators(),
            exclude_ranges_separator_strings: default_range_separator_strings(),
            exclude_ranges_normalized_separator: default_range_normalized_separator(),
            excluded_date_by_prefix: vec!(),
            date_priority_order: default_date_priority_order(),
        }
    }
}

impl Default for NameOptions {
    fn default() -> Self {
        Self {
            extraction_order: default_extraction_order(),
            fuzzy_substitutions: default_fuzzy_substitutions(),
        }
    }
}

impl Default for UserMappingOptions {
    fn default() -> Self {
        Self {
            mapping_file: default_user_mapping_file(),
            id_column: default_user_id_column(),
            name_column: default_user_name_column(),
            create_if_missing: true,
            substring_match: false,
            prefix: String::new(),
            management_suffix: String::new(),
        }
    }
}

impl Default for ManagementFlagOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            yes_flag: default_yes_flag(),
            no_flag: default_no_flag(),
        }
    }
}

impl Default for CategoryOptions {
    fn default() -> Self {
        Self {
            mapping_file: default_category_mapping_file(),
            id_column: default_category_id_column(),
            name_column: default_category_name_column(),
            append_to_filename: true,
            placement: CategoryPlacement::SeparateComponent,
            case_insensitive: true,
            first_level_only: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const MINIMAL: &str = indoc! {r#"
        global:
          separators:
            input: ["-", "_", ".", " "]
          component_order: [id, name, remainder, date, category, management]
    "#};

    #[test]
    fn minimal_charter_gets_defaults() {
        let charter = Charter::load_from_str(MINIMAL).unwrap();

        assert_eq!(charter.global().separators().normalized(), ' ');
        assert_eq!(charter.global().component_separator(), "_");
        assert_eq!(charter.global().case_normalization(), CaseNormalization::Titlecase);
        assert_eq!(charter.date().normalized_format(), "%Y-%m-%d");
        assert!(charter.date().exclude_ranges());
        assert_eq!(charter.name().extraction_order(),
            &[NamePass::Shorthand, NamePass::Initials, NamePass::NameComponents]);
        assert!(!charter.management_flag().enabled());
        assert_eq!(charter.category().placement(), CategoryPlacement::SeparateComponent);
    }

    #[test]
    fn duplicate_components_are_rejected() {
        let yaml = indoc! {r#"
            global:
              separators:
                input: ["-"]
              component_order: [id, name, id]
        "#};

        match Charter::load_from_str(yaml) {
            Err(crate::error::Error::CharterValidationError { reason }) => {
                assert!(reason.contains("repeats"), "unexpected reason {}", reason)
            },
            other => panic!("expected a validation error, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn formats_without_a_day_are_rejected() {
        let yaml = indoc! {r#"
            global:
              separators:
                input: ["-"]
              component_order: [id, name]
            date:
              allowed_formats: ["%Y-%m"]
        "#};

        assert!(Charter::load_from_str(yaml).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let yaml = indoc! {r#"
            global:
              separators:
                input: ["-"]
              component_order: [id]
              surprise: true
        "#};

        assert!(Charter::load_from_str(yaml).is_err());
    }

    #[test]
    fn titlecase_preserves_separators() {
        assert_eq!(CaseNormalization::Titlecase.apply("temp person"), "Temp Person");
        assert_eq!(CaseNormalization::Titlecase.apply("o'BRIEN-smith"), "O'Brien-Smith");
        assert_eq!(CaseNormalization::Asis.apply("mIxEd Case"), "mIxEd Case");
    }

    #[test]
    fn env_var_overrides_user_mapping_file() {
        let charter = Charter::load_from_str(MINIMAL).unwrap();

        std::env::set_var("VC_USER_MAPPING_FILE", "/tmp/override.csv");
        assert_eq!(charter.user_mapping().mapping_file(), "/tmp/override.csv");
        std::env::remove_var("VC_USER_MAPPING_FILE");

        assert_eq!(charter.user_mapping().mapping_file(), "config/user_mapping.csv");
    }
}
