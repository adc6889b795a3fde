use regex::Regex;
use rbcore::charter::{NameOptions, NamePass, Separators};

///
/// Upper bound on removals per matching pass - termination insurance for adversarial input.
///
pub const MAX_NAME_REMOVALS: usize = 32;

///
/// The name engine: finds every occurrence of the target person's name in the remainder, in
/// all the shapes people actually write names - full parts, shorthand (j-doe, john-d),
/// initials (jd, j-d) - and removes them so the name never leaks into the remainder.
///
/// Matching is case-insensitive and tolerates the configured character substitutions
/// (j0hn, jöhn). A forward slash counts as a separator so the same engine runs over whole
/// path strings.
///
pub struct NameExtract {
    pub matched: Vec<String>,
    pub remainder: String,
}

pub fn extract_names(text: &str, target: &str, options: &NameOptions, separators: &Separators) -> NameExtract {
    let parts: Vec<String> = target.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect();

    if parts.is_empty() {
        // An empty target is a configuration problem, not a miss worth mutating anything for.
        return NameExtract { matched: vec!(), remainder: text.to_string() }
    }

    let mut remainder = text.to_string();
    let mut matched = vec!();

    for pass in options.extraction_order() {
        match pass {
            NamePass::Shorthand => shorthand_pass(&mut remainder, &mut matched, &parts, options, separators),
            NamePass::Initials => initials_pass(&mut remainder, &mut matched, &parts, separators),
            NamePass::NameComponents => components_pass(&mut remainder, &mut matched, &parts, options, separators),
        }
    }

    NameExtract { matched, remainder }
}

///
/// Shorthand forms for two-part names: F<sep>Last, First<sep>L and FLast.
///
fn shorthand_pass(remainder: &mut String, matched: &mut Vec<String>, parts: &[String],
    options: &NameOptions, separators: &Separators) {

    if parts.len() != 2 {
        return
    }

    let first = &parts[0];
    let last = &parts[1];
    let first_initial = initial_pattern(first);
    let last_initial = initial_pattern(last);
    let sep = separator_class(separators);

    let patterns = [
        format!("(?i){}{}{}", first_initial, sep, fuzzy_pattern(last, options)),
        format!("(?i){}{}{}", fuzzy_pattern(first, options), sep, last_initial),
        format!("(?i){}{}", first_initial, fuzzy_pattern(last, options)),
    ];

    for pattern in &patterns {
        let regex = compile(pattern);
        remove_all(remainder, matched, &regex, true, separators);
    }
}

///
/// Initials for any multi-part name: separated (j-d, j.m.d) then grouped (jd, jmd).
///
fn initials_pass(remainder: &mut String, matched: &mut Vec<String>, parts: &[String], separators: &Separators) {
    if parts.len() < 2 {
        return
    }

    let initials: Vec<String> = parts.iter().map(|part| initial_pattern(part)).collect();
    let sep = separator_class(separators);

    let separated = format!("(?i){}", initials.join(&format!("{}+", sep)));
    let grouped = format!("(?i){}", initials.join(""));

    for pattern in [separated, grouped].iter() {
        let regex = compile(pattern);
        remove_all(remainder, matched, &regex, true, separators);
    }
}

///
/// Individual name parts: every separator-bounded occurrence, then any in-word occurrence
/// a bounded match didn't already cover.
///
fn components_pass(remainder: &mut String, matched: &mut Vec<String>, parts: &[String],
    options: &NameOptions, separators: &Separators) {

    let mut seen = vec!();
    for part in parts {
        if seen.contains(part) {
            continue
        }
        seen.push(part.clone());

        let regex = compile(&format!("(?i){}", fuzzy_pattern(part, options)));
        remove_all(remainder, matched, &regex, true, separators);
        remove_all(remainder, matched, &regex, false, separators);
    }
}

///
/// Remove every (bounded) match of the pattern, recording each surface form. Removing a
/// token leaves the separator which preceded it intact - the clean pass collapses those.
///
fn remove_all(remainder: &mut String, matched: &mut Vec<String>, regex: &Regex, bounded: bool,
    separators: &Separators) {

    let mut removals = 0;
    loop {
        removals += 1;
        if removals > MAX_NAME_REMOVALS {
            log::warn!("Name removal bound hit in '{}' - continuing with partial result", remainder);
            break
        }

        let found = regex.find_iter(remainder)
            .find(|m| !bounded || separator_bounded(remainder, m.start(), m.end(), separators));

        match found {
            Some(m) => {
                let (start, end) = (m.start(), m.end());
                matched.push(remainder[start..end].to_string());
                remainder.replace_range(start..end, "");
            },
            None => break,
        }
    }
}

///
/// A match is bounded when flanked by separators (slash included) or the string ends.
///
fn separator_bounded(text: &str, start: usize, end: usize, separators: &Separators) -> bool {
    let before_ok = match text[..start].chars().last() {
        Some(prev) => prev == '/' || separators.is_separator(prev),
        None => true,
    };

    let after_ok = match text[end..].chars().next() {
        Some(next) => next == '/' || separators.is_separator(next),
        None => true,
    };

    before_ok && after_ok
}

///
/// Regex for one name part with the configured character substitutions folded in as
/// character classes (o -> [o0ôöó], etc). Non-letters are escaped literally.
///
fn fuzzy_pattern(part: &str, options: &NameOptions) -> String {
    let mut pattern = String::new();

    for ch in part.chars() {
        match options.fuzzy_substitutions().get(&ch) {
            Some(alternatives) => {
                pattern.push('[');
                pattern.push_str(&regex::escape(&ch.to_string()));
                for alt in alternatives {
                    pattern.push_str(&regex::escape(&alt.to_string()));
                }
                pattern.push(']');
            },
            None => pattern.push_str(&regex::escape(&ch.to_string())),
        }
    }

    pattern
}

fn initial_pattern(part: &str) -> String {
    match part.chars().next() {
        Some(ch) => regex::escape(&ch.to_string()),
        None => String::new(),
    }
}

fn separator_class(separators: &Separators) -> String {
    let mut class = String::from("[/");
    class.push_str(&regex::escape(&separators.normalized().to_string()));
    for sep in separators.input() {
        class.push_str(&regex::escape(&sep.to_string()));
    }
    class.push(']');
    class
}

fn compile(pattern: &str) -> Regex {
    // Patterns are assembled from escaped fragments - they always compile.
    Regex::new(pattern).unwrap_or_else(|err| panic!("bad name pattern {}: {}", pattern, err))
}
