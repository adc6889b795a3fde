use rbcore::charter::{CaseNormalization, UserMappingOptions};
use rbcore::lookup::UserMap;

///
/// The user engine resolves the person directory (path segment 0) to a user id and the
/// canonical spelling of their name.
///
/// When the mapping knows the person, the mapped spelling wins verbatim over the global
/// case policy. When it doesn't, the stripped directory name gets the case policy applied
/// and the id stays empty.
///
#[derive(Debug, PartialEq)]
pub struct UserResolution {
    pub user_id: String,
    pub raw_name: String,
    pub canonical_name: String,
    pub is_management: bool,
}

pub fn resolve_user(segment: &str, options: &UserMappingOptions, policy: CaseNormalization,
    users: &UserMap) -> UserResolution {

    let mut stripped = segment;

    if !options.prefix().is_empty() {
        if let Some(rest) = stripped.strip_prefix(options.prefix()) {
            stripped = rest;
        }
    }

    let mut is_management = false;
    if !options.management_suffix().is_empty() {
        if let Some(rest) = stripped.strip_suffix(options.management_suffix()) {
            stripped = rest;
            is_management = true;
        }
    }

    let stripped = stripped.trim();

    match users.lookup(stripped) {
        Some(entry) => UserResolution {
            user_id: entry.user_id().to_string(),
            raw_name: segment.to_string(),
            canonical_name: entry.full_name().to_string(),
            is_management,
        },
        None => UserResolution {
            user_id: String::new(),
            raw_name: segment.to_string(),
            canonical_name: policy.apply(stripped),
            is_management,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbcore::charter::Charter;
    use rbcore::lookup::UserMap;

    fn charter() -> Charter {
        Charter::load_from_str(r#"
global:
  separators:
    input: ["-", "_", ".", " "]
  component_order: [id, name, remainder, date]
user_mapping:
  prefix: "VC - "
  management_suffix: " - MGMT"
"#).unwrap()
    }

    fn users(charter: &Charter) -> UserMap {
        UserMap::from_reader(
            "user_id,full_name\n1001,John Doe\n1002,Jane Smith\n".as_bytes(),
            std::path::Path::new("test.csv"),
            charter.user_mapping()).unwrap()
    }

    #[test]
    fn mapped_spelling_wins_over_the_case_policy() {
        let charter = charter();
        let users = users(&charter);

        let resolved = resolve_user("john doe", charter.user_mapping(), CaseNormalization::Uppercase, &users);
        assert_eq!(resolved.user_id, "1001");
        assert_eq!(resolved.canonical_name, "John Doe");
        assert!(!resolved.is_management);
    }

    #[test]
    fn unmapped_names_get_the_case_policy() {
        let charter = charter();
        let users = users(&charter);

        let resolved = resolve_user("temp person", charter.user_mapping(), CaseNormalization::Titlecase, &users);
        assert_eq!(resolved.user_id, "");
        assert_eq!(resolved.canonical_name, "Temp Person");
        assert_eq!(resolved.raw_name, "temp person");
    }

    #[test]
    fn prefix_is_stripped_before_lookup() {
        let charter = charter();
        let users = users(&charter);

        let resolved = resolve_user("VC - John Doe", charter.user_mapping(), CaseNormalization::Titlecase, &users);
        assert_eq!(resolved.user_id, "1001");
        assert_eq!(resolved.canonical_name, "John Doe");
        assert_eq!(resolved.raw_name, "VC - John Doe");
    }

    #[test]
    fn management_suffix_sets_the_flag() {
        let charter = charter();
        let users = users(&charter);

        let resolved = resolve_user("Jane Smith - MGMT", charter.user_mapping(), CaseNormalization::Titlecase, &users);
        assert_eq!(resolved.user_id, "1002");
        assert_eq!(resolved.canonical_name, "Jane Smith");
        assert!(resolved.is_management);
    }

    #[test]
    fn prefix_and_suffix_strip_together() {
        let charter = charter();
        let users = users(&charter);

        let resolved = resolve_user("VC - John Doe - MGMT", charter.user_mapping(), CaseNormalization::Titlecase, &users);
        assert_eq!(resolved.user_id, "1001");
        assert!(resolved.is_management);
    }
}
