use rbcore::charter::Separators;
use crate::spans::Protections;

///
/// Canonicalise the separators in a remainder once every other pass has taken its share.
///
/// Forward slashes become word separators first so path structure reads as plain text, then
/// every configured input separator becomes the normalized separator, runs collapse to one
/// and the ends are trimmed. Characters inside protected spans are copied through verbatim,
/// separators included.
///
/// The function is pure and idempotent.
///
pub fn clean_remainder(text: &str, separators: &Separators, protections: &Protections) -> String {
    // (char, protected) pairs with slashes pre-mapped to the word separator.
    let chars: Vec<(char, bool)> = text.char_indices()
        .map(|(idx, ch)| {
            let protected = protections.is_protected(idx);
            match ch {
                '/' if !protected => (' ', false),
                other => (other, protected),
            }
        })
        .collect();

    let mut out: Vec<(char, bool)> = Vec::with_capacity(chars.len());
    let mut idx = 0;

    while idx < chars.len() {
        let (ch, protected) = chars[idx];

        if protected || !is_input_separator(ch, separators) {
            out.push((ch, protected));
            idx += 1;
            continue
        }

        // An unprotected separator run - consume it whole and emit a single character.
        let run_start = idx;
        while idx < chars.len() && !chars[idx].1 && is_input_separator(chars[idx].0, separators) {
            idx += 1;
        }

        out.push((collapse_run(&chars[run_start..idx], separators), false));
    }

    // Trim unprotected separators from both ends.
    let trimmed_start = out.iter()
        .position(|(ch, protected)| *protected || !is_input_separator(*ch, separators))
        .unwrap_or(out.len());

    let trimmed_end = out.iter()
        .rposition(|(ch, protected)| *protected || !is_input_separator(*ch, separators))
        .map(|pos| pos + 1)
        .unwrap_or(trimmed_start);

    out[trimmed_start..trimmed_end].iter().map(|(ch, _)| ch).collect()
}

fn is_input_separator(ch: char, separators: &Separators) -> bool {
    ch == separators.normalized() || separators.input().contains(&ch)
}

///
/// A mixed run collapses to the first separator in input order present in the run (which is
/// then normalized), otherwise to the run's first character.
///
fn collapse_run(run: &[(char, bool)], separators: &Separators) -> char {
    for sep in separators.input() {
        if run.iter().any(|(ch, _)| ch == sep) {
            return separators.normalized()
        }
    }
    run[0].0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbcore::charter::Charter;
    use crate::spans::{Protections, Span};

    fn clean(text: &str) -> String {
        clean_with(text, Protections::new())
    }

    fn clean_with(text: &str, protections: Protections) -> String {
        let charter = Charter::load_from_str(r#"
global:
  separators:
    input: ["-", "_", ".", " "]
    normalized: " "
  component_order: [id, name]
"#).unwrap();

        clean_remainder(text, charter.global().separators(), &protections)
    }

    #[test]
    fn separators_are_normalized_and_collapsed() {
        assert_eq!(clean("2023_Incidents"), "2023 Incidents");
        assert_eq!(clean("a-_.b"), "a b");
        assert_eq!(clean("--meeting--"), "meeting");
        assert_eq!(clean(""), "");
        assert_eq!(clean("...."), "");
    }

    #[test]
    fn slashes_become_word_separators() {
        assert_eq!(clean("2023/Incidents"), "2023 Incidents");
        assert_eq!(clean("WHS/2023/Incidents/"), "WHS 2023 Incidents");
    }

    #[test]
    fn cleaning_is_idempotent() {
        for input in ["a-_.b", "2023/Incidents", "  x  ", "one two"] {
            let once = clean(input);
            assert_eq!(clean(&once), once);
        }
    }

    #[test]
    fn protected_spans_are_untouched() {
        let text = "report_2024-07-01 - 2025-06-30_final";
        let mut protections = Protections::new();
        protections.add(Span::new(7, 30)); // the normalized range

        assert_eq!(clean_with(text, protections), "report 2024-07-01 - 2025-06-30 final");
    }

    #[test]
    fn protected_spans_survive_at_the_ends() {
        let text = "-2024-07-01 - 2025-06-30-";
        let mut protections = Protections::new();
        protections.add(Span::new(1, 24));

        assert_eq!(clean_with(text, protections), "2024-07-01 - 2025-06-30");
    }
}
