use rbcore::charter::CategoryOptions;
use rbcore::lookup::CategoryMap;

///
/// The category engine inspects the directory segments left after the person segment has
/// been consumed and tries to map one of them to a category id.
///
#[derive(Debug, PartialEq)]
pub enum CategoryOutcome {
    /// A segment mapped: it is consumed from the remainder.
    Matched {
        category_id: String,
        raw: String,
        canonical: String,
        remainder: String,
    },
    /// A candidate existed but mapped to nothing - it stays in the remainder untouched.
    Unmapped,
    /// No directory segment to consider (or no catalog loaded).
    NoCategory,
}

pub fn extract_category(remainder: &str, options: &CategoryOptions, catalog: &CategoryMap) -> CategoryOutcome {
    if catalog.is_empty() {
        return CategoryOutcome::NoCategory
    }

    let segments: Vec<&str> = remainder.split('/').collect();

    // The last segment is the filename - only directory segments can name a category.
    if segments.len() < 2 {
        return CategoryOutcome::NoCategory
    }

    let candidate_count = match options.first_level_only() {
        true  => 1,
        false => segments.len() - 1,
    };

    let mut had_candidate = false;

    for idx in 0..candidate_count {
        let candidate = segments[idx];
        if candidate.is_empty() {
            continue
        }
        had_candidate = true;

        if let Some(entry) = catalog.lookup(candidate) {
            let remaining: Vec<&str> = segments.iter()
                .enumerate()
                .filter(|(seg_idx, _)| *seg_idx != idx)
                .map(|(_, seg)| *seg)
                .collect();

            return CategoryOutcome::Matched {
                category_id: entry.category_id().to_string(),
                raw: candidate.to_string(),
                canonical: entry.category_name().to_string(),
                remainder: remaining.join("/"),
            }
        }
    }

    match had_candidate {
        true  => CategoryOutcome::Unmapped,
        false => CategoryOutcome::NoCategory,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbcore::charter::Charter;
    use rbcore::lookup::CategoryMap;

    fn charter(first_level_only: bool) -> Charter {
        Charter::load_from_str(&format!(r#"
global:
  separators:
    input: ["-", "_", ".", " "]
  component_order: [id, name, remainder, date, category]
category:
  first_level_only: {}
"#, first_level_only)).unwrap()
    }

    fn catalog(charter: &Charter, csv: &str) -> CategoryMap {
        CategoryMap::from_reader(csv.as_bytes(), std::path::Path::new("test.csv"), charter.category()).unwrap()
    }

    const CSV: &str = "category_id,category_name\n1,WHS\n2,Medical\n3,Support Plans\n";

    #[test]
    fn first_level_segment_is_mapped_and_consumed() {
        let charter = charter(true);
        let catalog = catalog(&charter, CSV);

        let outcome = extract_category("WHS/2023/Incidents/report.pdf", charter.category(), &catalog);
        assert_eq!(outcome, CategoryOutcome::Matched {
            category_id: "1".into(),
            raw: "WHS".into(),
            canonical: "WHS".into(),
            remainder: "2023/Incidents/report.pdf".into(),
        });
    }

    #[test]
    fn matching_is_case_insensitive_and_punctuation_blind() {
        let charter = charter(true);
        let catalog = catalog(&charter, CSV);

        let outcome = extract_category("support_plans/plan.pdf", charter.category(), &catalog);
        match outcome {
            CategoryOutcome::Matched { category_id, canonical, .. } => {
                assert_eq!(category_id, "3");
                assert_eq!(canonical, "Support Plans");
            },
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn unmapped_segments_stay_in_the_remainder() {
        let charter = charter(true);
        let catalog = catalog(&charter, CSV);

        let outcome = extract_category("Holiday Photos/img.jpg", charter.category(), &catalog);
        assert_eq!(outcome, CategoryOutcome::Unmapped);
    }

    #[test]
    fn bare_filenames_have_no_category() {
        let charter = charter(true);
        let catalog = catalog(&charter, CSV);

        assert_eq!(extract_category("report.pdf", charter.category(), &catalog), CategoryOutcome::NoCategory);
        assert_eq!(extract_category("", charter.category(), &catalog), CategoryOutcome::NoCategory);
    }

    #[test]
    fn an_empty_catalog_yields_no_category() {
        let charter = charter(true);
        let catalog = catalog(&charter, "category_id,category_name\n");

        assert_eq!(extract_category("WHS/report.pdf", charter.category(), &catalog), CategoryOutcome::NoCategory);
    }

    #[test]
    fn deeper_segments_match_when_first_level_only_is_off() {
        let charter = charter(false);
        let catalog = catalog(&charter, CSV);

        let outcome = extract_category("2023/Medical/report.pdf", charter.category(), &catalog);
        match outcome {
            CategoryOutcome::Matched { category_id, remainder, .. } => {
                assert_eq!(category_id, "2");
                assert_eq!(remainder, "2023/report.pdf");
            },
            other => panic!("expected a match, got {:?}", other),
        }
    }
}
