use chrono::NaiveDate;
use regex::Regex;
use std::path::Path;
use std::time::UNIX_EPOCH;
use crate::error::RebadgeError;
use crate::spans::{Protections, Span};
use rbcore::charter::{DateOptions, DateSource, Separators};

///
/// Upper bound on extraction iterations per segment. Guarantees termination on pathological
/// input - exceeding it logs a warning and the partial result stands.
///
pub const MAX_EXTRACT_ITERATIONS: usize = 16;

///
/// The compiled date matching program for one run.
///
/// Each allowed strftime-style format becomes one regex with named year/month/day groups,
/// plus a group-less variant used to assemble range patterns. Formats are tried in charter
/// order, which is what decides DMY vs MDY ambiguity.
///
pub struct DateProgram {
    formats: Vec<CompiledFormat>,
    ranges: Vec<Regex>,            // One per format: <date><sep+><date> with capture groups 1 and 2.
    normalized_range: CompiledRange,
}

struct CompiledRange {
    regex: Regex,
    endpoint: CompiledFormat,
    separator: String,
}

pub struct CompiledFormat {
    named: Regex,
    bare: String,
}

struct SegmentExtract {
    dates: Vec<String>,
    text: String,
    protections: Protections,
}

///
/// The result of running the date engine over a full path remainder.
///
pub struct PathDates {
    pub folder_dates: Vec<String>,
    pub filename_dates: Vec<String>,
    pub remainder: String,
    pub protections: Protections,
}

impl DateProgram {
    pub fn compile(options: &DateOptions) -> Result<Self, RebadgeError> {
        let mut formats = vec!();
        for format in options.allowed_formats() {
            formats.push(CompiledFormat::compile(format)?);
        }

        let separator = range_separator_pattern(options);
        let mut ranges = vec!();
        for fmt in &formats {
            let pattern = format!("(?i)({date}){sep}({date})", date = fmt.bare, sep = separator);
            ranges.push(Regex::new(&pattern)
                .map_err(|source| RebadgeError::InvalidDateFormat { format: pattern.clone(), source })?);
        }

        let endpoint = CompiledFormat::compile(options.normalized_ranges_format())?;
        let norm_pattern = format!("(?i){date}{sep}{date}",
            date = endpoint.bare,
            sep = regex::escape(options.exclude_ranges_normalized_separator()));
        let normalized_range = CompiledRange {
            regex: Regex::new(&norm_pattern)
                .map_err(|source| RebadgeError::InvalidDateFormat { format: norm_pattern.clone(), source })?,
            endpoint,
            separator: options.exclude_ranges_normalized_separator().to_string(),
        };

        Ok(Self { formats, ranges, normalized_range })
    }

    ///
    /// Run the engine over a path remainder: each directory segment independently, then the
    /// filename segment, stitching the shortened segments (and their protected spans) back
    /// together.
    ///
    pub fn extract_from_path(&self, path_text: &str, options: &DateOptions, separators: &Separators) -> PathDates {
        if path_text.is_empty() {
            return PathDates {
                folder_dates: vec!(),
                filename_dates: vec!(),
                remainder: String::new(),
                protections: Protections::new(),
            }
        }

        let segments: Vec<&str> = path_text.split('/').collect();
        let last = segments.len() - 1;

        let mut folder_dates = vec!();
        let mut filename_dates = vec!();
        let mut remainder = String::new();
        let mut protections = Protections::new();

        for (idx, segment) in segments.iter().enumerate() {
            if idx > 0 {
                remainder.push('/');
            }

            let extract = self.extract_from_segment(segment, options, separators);
            protections.merge(extract.protections, remainder.len());
            remainder.push_str(&extract.text);

            match idx == last {
                true  => filename_dates.extend(extract.dates),
                false => folder_dates.extend(extract.dates),
            }
        }

        PathDates { folder_dates, filename_dates, remainder, protections }
    }

    ///
    /// One segment: protect ranges first, then peel single dates until none remain.
    ///
    fn extract_from_segment(&self, segment: &str, options: &DateOptions, separators: &Separators) -> SegmentExtract {
        let mut text = segment.to_string();
        let mut protections = Protections::new();
        let mut dates = vec!();

        if options.exclude_ranges() {
            self.protect_ranges(&mut text, &mut protections, options);
        }

        let mut iterations = 0;
        loop {
            iterations += 1;
            if iterations > MAX_EXTRACT_ITERATIONS {
                log::warn!("Date extraction bound hit in '{}' - continuing with partial result", segment);
                break
            }

            let candidate = match self.first_candidate(&text, &protections) {
                Some(candidate) => candidate,
                None => break,
            };

            let (start, end) = (candidate.start, candidate.end);

            match candidate.date {
                None => {
                    // Looks like a date but isn't one on a real calendar. Mark the span
                    // processed so the scan cannot find it again.
                    log::debug!("Removing invalid calendar date '{}'", &text[start..end]);
                    text.replace_range(start..end, "");
                    protections.apply_edit(start, end, 0);
                },

                Some(date) => {
                    match excluded_prefix_start(&text, start, options, separators) {
                        Some(prefix_start) => {
                            // Prefix-bound dates stay in the remainder, normalized in place.
                            let replacement = date.format(options.normalized_prefix_format()).to_string();
                            text.replace_range(start..end, &replacement);
                            protections.apply_edit(start, end, replacement.len());
                            protections.add(Span::new(prefix_start, start + replacement.len()));
                        },
                        None => {
                            dates.push(date.format(options.normalized_format()).to_string());

                            // Remove the date only - the single separator either side stays
                            // put and the clean pass collapses what is left.
                            text.replace_range(start..end, "");
                            protections.apply_edit(start, end, 0);
                        },
                    }
                },
            }
        }

        SegmentExtract { dates, text, protections }
    }

    ///
    /// The first unprotected, bounded match for any allowed format - formats beat positions:
    /// the first format in charter order with a match anywhere wins.
    ///
    fn first_candidate(&self, text: &str, protections: &Protections) -> Option<Candidate> {
        for fmt in &self.formats {
            for caps in fmt.named.captures_iter(text) {
                let whole = caps.get(0).expect("regex match with no span");

                if protections.overlaps(whole.start(), whole.end()) {
                    continue
                }

                if !bounded(text, whole.start(), whole.end()) {
                    continue
                }

                let date = captured_ymd(&caps)
                    .and_then(|(year, month, day)| NaiveDate::from_ymd_opt(year, month, day));

                return Some(Candidate { start: whole.start(), end: whole.end(), date })
            }
        }

        None
    }

    ///
    /// Find date ranges and pin them: already-normalized ranges are protected as-is, raw
    /// ranges are rewritten to the normalized form first. Protected spans are invisible to
    /// the single-date scan.
    ///
    fn protect_ranges(&self, text: &mut String, protections: &mut Protections, options: &DateOptions) {
        // Already-normalized ranges (idempotence across runs).
        let mut search_from = 0;
        while search_from <= text.len() {
            let found = match self.normalized_range.regex.find_at(text, search_from) {
                Some(found) => found,
                None => break,
            };

            search_from = found.start() + 1;

            if protections.overlaps(found.start(), found.end()) || !bounded(text, found.start(), found.end()) {
                continue
            }

            if self.normalized_range.endpoints_valid(&text[found.start()..found.end()]) {
                protections.add(Span::new(found.start(), found.end()));
                search_from = found.end();
            }
        }

        // Raw ranges, rewritten in place.
        let mut iterations = 0;
        loop {
            iterations += 1;
            if iterations > MAX_EXTRACT_ITERATIONS {
                log::warn!("Range protection bound hit in '{}' - continuing with partial result", text);
                break
            }

            let candidate = self.first_range_candidate(text, protections, options);
            let (start, end, from, to) = match candidate {
                Some(candidate) => candidate,
                None => break,
            };

            let replacement = format!("{}{}{}",
                from.format(options.normalized_ranges_format()),
                options.exclude_ranges_normalized_separator(),
                to.format(options.normalized_ranges_format()));

            text.replace_range(start..end, &replacement);
            protections.apply_edit(start, end, replacement.len());
            protections.add(Span::new(start, start + replacement.len()));
        }
    }

    fn first_range_candidate(&self, text: &str, protections: &Protections, _options: &DateOptions)
        -> Option<(usize, usize, NaiveDate, NaiveDate)> {

        for (idx, range) in self.ranges.iter().enumerate() {
            for caps in range.captures_iter(text) {
                let whole = caps.get(0).expect("range match with no span");

                if protections.overlaps(whole.start(), whole.end()) {
                    continue
                }

                if !bounded(text, whole.start(), whole.end()) {
                    continue
                }

                // Both endpoints must be real calendar dates or this is not a range.
                let from = self.formats[idx].parse_exact(caps.get(1).expect("no lhs date").as_str());
                let to = self.formats[idx].parse_exact(caps.get(2).expect("no rhs date").as_str());

                if let (Some(from), Some(to)) = (from, to) {
                    return Some((whole.start(), whole.end(), from, to))
                }
            }
        }

        None
    }
}

impl CompiledRange {
    fn endpoints_valid(&self, range_text: &str) -> bool {
        match range_text.find(&self.separator) {
            Some(at) => {
                let lhs = &range_text[..at];
                let rhs = &range_text[at + self.separator.len()..];
                self.endpoint.parse_exact(lhs).is_some() && self.endpoint.parse_exact(rhs).is_some()
            },
            None => false,
        }
    }
}

struct Candidate {
    start: usize,
    end: usize,
    date: Option<NaiveDate>, // None when the matched text is not a real calendar date.
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Token {
    Year4,
    Year2,
    Month,
    Day,
    MonthAbbr,
    MonthFull,
    Literal(char),
}

impl Token {
    fn numeric(&self) -> bool {
        matches!(self, Token::Year4 | Token::Year2 | Token::Month | Token::Day)
    }
}

impl CompiledFormat {
    ///
    /// Translate one strftime-style format into a regex. Day and month accept 1 or 2 digits
    /// where a literal separates them from their neighbours, and exactly 2 where tokens abut
    /// (e.g. %Y%m%d). Month names match case-insensitively.
    ///
    pub fn compile(format: &str) -> Result<Self, RebadgeError> {
        let tokens = tokenize(format)
            .ok_or_else(|| RebadgeError::UnsupportedDateFormat { format: format.to_string() })?;

        let mut named = String::from("(?i)");
        let mut bare = String::new();

        for (idx, token) in tokens.iter().enumerate() {
            let fixed = tokens.get(idx.wrapping_sub(1)).map(Token::numeric).unwrap_or(false)
                || tokens.get(idx + 1).map(Token::numeric).unwrap_or(false);

            let (group, pattern) = match token {
                Token::Year4 => (Some("year"), r"\d{4}".to_string()),
                Token::Year2 => (Some("year"), r"\d{2}".to_string()),
                Token::Month if fixed => (Some("month"), "0[1-9]|1[0-2]".to_string()),
                Token::Month => (Some("month"), "0?[1-9]|1[0-2]".to_string()),
                Token::Day if fixed => (Some("day"), "0[1-9]|[12][0-9]|3[01]".to_string()),
                Token::Day => (Some("day"), "0?[1-9]|[12][0-9]|3[01]".to_string()),
                Token::MonthAbbr => (Some("month"), "jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec".to_string()),
                Token::MonthFull => (Some("month"),
                    "january|february|march|april|may|june|july|august|september|october|november|december".to_string()),
                Token::Literal(ch) => (None, regex::escape(&ch.to_string())),
            };

            match group {
                Some(name) => {
                    named.push_str(&format!("(?P<{}>{})", name, pattern));
                    bare.push_str(&format!("(?:{})", pattern));
                },
                None => {
                    named.push_str(&pattern);
                    bare.push_str(&pattern);
                },
            }
        }

        Ok(Self {
            named: Regex::new(&named)
                .map_err(|source| RebadgeError::InvalidDateFormat { format: format.to_string(), source })?,
            bare,
        })
    }

    ///
    /// Parse text which must be exactly one date in this format.
    ///
    fn parse_exact(&self, text: &str) -> Option<NaiveDate> {
        let caps = self.named.captures(text)?;
        let whole = caps.get(0)?;

        if whole.start() != 0 || whole.end() != text.len() {
            return None
        }

        captured_ymd(&caps).and_then(|(year, month, day)| NaiveDate::from_ymd_opt(year, month, day))
    }
}

fn tokenize(format: &str) -> Option<Vec<Token>> {
    let mut tokens = vec!();
    let mut chars = format.chars();

    while let Some(ch) = chars.next() {
        if ch != '%' {
            tokens.push(Token::Literal(ch));
            continue
        }

        match chars.next() {
            Some('Y') => tokens.push(Token::Year4),
            Some('y') => tokens.push(Token::Year2),
            Some('m') => tokens.push(Token::Month),
            Some('d') => tokens.push(Token::Day),
            Some('b') => tokens.push(Token::MonthAbbr),
            Some('B') => tokens.push(Token::MonthFull),
            Some('%') => tokens.push(Token::Literal('%')),
            _ => return None,
        }
    }

    Some(tokens)
}

fn captured_ymd(caps: &regex::Captures) -> Option<(i32, u32, u32)> {
    let year_raw = caps.name("year")?.as_str();
    let year = year_raw.parse::<i32>().ok()?;
    let year = match year_raw.len() {
        2 => 2000 + year, // 2-digit years land in 2000-2099.
        _ => year,
    };

    let month_raw = caps.name("month")?.as_str();
    let month = match month_raw.chars().next()?.is_ascii_digit() {
        true  => month_raw.parse::<u32>().ok()?,
        false => month_number(month_raw)?,
    };

    let day = caps.name("day")?.as_str().parse::<u32>().ok()?;
    Some((year, month, day))
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).flat_map(char::to_lowercase).collect();
    match prefix.as_str() {
        "jan" => Some(1), "feb" => Some(2), "mar" => Some(3), "apr" => Some(4),
        "may" => Some(5), "jun" => Some(6), "jul" => Some(7), "aug" => Some(8),
        "sep" => Some(9), "oct" => Some(10), "nov" => Some(11), "dec" => Some(12),
        _ => None,
    }
}

///
/// A match must not butt against more of the same character class - '120230615' contains no
/// date and 'May' must not match inside 'Mayhem'.
///
fn bounded(text: &str, start: usize, end: usize) -> bool {
    let first = match text[start..].chars().next() {
        Some(first) => first,
        None => return false,
    };
    let last = match text[..end].chars().last() {
        Some(last) => last,
        None => return false,
    };

    let before_ok = match text[..start].chars().last() {
        Some(prev) => !(prev.is_ascii_digit() && first.is_ascii_digit())
            && !(prev.is_alphabetic() && first.is_alphabetic()),
        None => true,
    };

    let after_ok = match text[end..].chars().next() {
        Some(next) => !(last.is_ascii_digit() && next.is_ascii_digit())
            && !(last.is_alphabetic() && next.is_alphabetic()),
        None => true,
    };

    before_ok && after_ok
}

///
/// When the date at date_start is preceded (across at most one separator) by an excluded
/// prefix word, return the byte position where that word starts.
///
fn excluded_prefix_start(text: &str, date_start: usize, options: &DateOptions, separators: &Separators)
    -> Option<usize> {

    if options.excluded_date_by_prefix().is_empty() {
        return None
    }

    let mut word_end = date_start;
    if let Some(prev) = text[..word_end].chars().last() {
        if separators.is_separator(prev) {
            word_end -= prev.len_utf8();
        }
    }

    let word_start = text[..word_end].char_indices()
        .rev()
        .take_while(|(_, ch)| ch.is_alphabetic())
        .last()
        .map(|(idx, _)| idx)?;

    let word = &text[word_start..word_end];
    options.excluded_date_by_prefix().iter()
        .any(|prefix| prefix.eq_ignore_ascii_case(word))
        .then(|| word_start)
}

fn range_separator_pattern(options: &DateOptions) -> String {
    let mut alternatives = vec!();

    if !options.exclude_ranges_separators().is_empty() {
        let class: String = options.exclude_ranges_separators().iter()
            .map(|ch| regex::escape(&ch.to_string()))
            .collect();
        alternatives.push(format!("[{}]+", class));
    }

    for string in options.exclude_ranges_separator_strings() {
        alternatives.push(regex::escape(string));
    }

    if alternatives.is_empty() {
        // Ranges are effectively disabled without any configured separator.
        alternatives.push("[ ]+".to_string());
    }

    format!("(?:{})", alternatives.join("|"))
}

///
/// Filesystem timestamp fallback: the first source yielding a stamp after the epoch supplies
/// the date. Failure to stat is logged and treated as no date.
///
pub fn metadata_date(path: &Path, source: DateSource, normalized_format: &str) -> Option<String> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) => {
            log::warn!("Cannot stat {} for a fallback date: {}", path.to_string_lossy(), err);
            return None
        },
    };

    let stamp = match source {
        DateSource::Modified => metadata.modified(),
        DateSource::Created => metadata.created(),
        _ => return None,
    };

    match stamp {
        Ok(stamp) if stamp > UNIX_EPOCH => {
            let local: chrono::DateTime<chrono::Local> = stamp.into();
            Some(local.format(normalized_format).to_string())
        },
        Ok(_) => None,
        Err(err) => {
            log::warn!("No {:?} timestamp for {}: {}", source, path.to_string_lossy(), err);
            None
        },
    }
}
