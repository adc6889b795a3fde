use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use crate::charter::{CategoryOptions, UserMappingOptions};
use crate::error::Error;

///
/// The user and category mapping tables.
///
/// Both are loaded once from CSV, indexed up-front and treated as immutable for the rest of
/// the run. Lookups never touch the filesystem.
///

#[derive(Debug)]
pub struct UserEntry {
    user_id: String,
    full_name: String,
}

impl UserEntry {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }
}

#[derive(Debug)]
pub struct UserMap {
    entries: Vec<UserEntry>,
    by_name: HashMap<String, usize>, // lowercased, trimmed full name -> entries index.
    substring_match: bool,
}

impl UserMap {
    ///
    /// Load a user mapping file (the caller resolves which one - CLI override, environment
    /// or charter default).
    ///
    /// A missing file is seeded with a default mapping when create_if_missing is set,
    /// otherwise the map is empty and every lookup misses.
    ///
    pub fn load(path: &Path, options: &UserMappingOptions) -> Result<Self, Error> {
        if !path.exists() {
            if options.create_if_missing() {
                seed_default_mapping(path, options.id_column(), options.name_column())?;

            } else {
                log::warn!("User mapping file {} not found - no user ids will be resolved", path.to_string_lossy());
                return Ok(Self { entries: vec!(), by_name: HashMap::new(), substring_match: options.substring_match() })
            }
        }

        let file = std::fs::File::open(path)
            .map_err(|source| Error::CannotReadMapping { path: path.to_string_lossy().into(), source })?;

        let map = Self::from_reader(file, path, options)?;
        log::debug!("Loaded {} user mappings from {}", map.entries.len(), path.to_string_lossy());
        Ok(map)
    }

    ///
    /// Load a mapping from any reader - the file-based load() is a thin wrapper over this.
    ///
    pub fn from_reader<R: Read>(reader: R, path: &Path, options: &UserMappingOptions) -> Result<Self, Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()
            .map_err(|source| Error::InvalidMappingRow { path: path.to_string_lossy().into(), source })?
            .clone();

        let id_idx = headers.iter().position(|h| h == options.id_column());
        let name_idx = headers.iter().position(|h| h == options.name_column());

        let (id_idx, name_idx) = match (id_idx, name_idx) {
            (Some(id), Some(name)) => (id, name),
            _ => return Err(Error::CharterValidationError {
                reason: format!("user mapping {} is missing the {} or {} column",
                    path.to_string_lossy(), options.id_column(), options.name_column()) }),
        };

        let mut entries = vec!();
        let mut by_name = HashMap::new();

        for record in rdr.records() {
            let record = record
                .map_err(|source| Error::InvalidMappingRow { path: path.to_string_lossy().into(), source })?;

            let user_id = record.get(id_idx).unwrap_or("").trim();
            let full_name = record.get(name_idx).unwrap_or("").trim();

            if user_id.is_empty() || full_name.is_empty() {
                continue
            }

            by_name.entry(full_name.to_lowercase()).or_insert(entries.len());
            entries.push(UserEntry { user_id: user_id.into(), full_name: full_name.into() });
        }

        Ok(Self { entries, by_name, substring_match: options.substring_match() })
    }

    ///
    /// Find the entry whose full name equals the candidate, case-insensitively.
    ///
    /// When substring matching is enabled an exact miss falls back to an either-way,
    /// case-insensitive containment scan in file order.
    ///
    pub fn lookup(&self, name: &str) -> Option<&UserEntry> {
        let wanted = name.trim().to_lowercase();

        if wanted.is_empty() {
            return None
        }

        if let Some(idx) = self.by_name.get(&wanted) {
            return self.entries.get(*idx)
        }

        if self.substring_match {
            return self.entries.iter().find(|entry| {
                let known = entry.full_name.to_lowercase();
                known.contains(&wanted) || wanted.contains(&known)
            })
        }

        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

///
/// Write a small starter mapping so a fresh install has something to edit.
///
fn seed_default_mapping(path: &Path, id_column: &str, name_column: &str) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|source| Error::CannotCreateMapping { path: path.to_string_lossy().into(), source })?;
    }

    let mut wtr = csv::Writer::from_path(path)
        .map_err(|source| Error::InvalidMappingRow { path: path.to_string_lossy().into(), source })?;

    wtr.write_record([id_column, name_column])
        .and_then(|_| wtr.write_record(["1001", "John Doe"]))
        .and_then(|_| wtr.write_record(["1002", "Jane Smith"]))
        .and_then(|_| wtr.write_record(["1003", "Bob Johnson"]))
        .and_then(|_| wtr.flush().map_err(csv::Error::from))
        .map_err(|source| Error::InvalidMappingRow { path: path.to_string_lossy().into(), source })?;

    log::info!("Seeded default user mapping at {}", path.to_string_lossy());
    Ok(())
}

#[derive(Debug)]
pub struct CategoryEntry {
    category_id: String,
    category_name: String,
    normalized: String,
}

impl CategoryEntry {
    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    pub fn category_name(&self) -> &str {
        &self.category_name
    }
}

#[derive(Debug)]
pub struct CategoryMap {
    entries: Vec<CategoryEntry>, // CSV row order - substring matches resolve first-row-wins.
    case_insensitive: bool,
}

impl CategoryMap {
    ///
    /// Load a category mapping file (the caller resolves which one).
    ///
    /// A missing file logs a warning and yields an empty catalog - every path then reports
    /// no category.
    ///
    pub fn load(path: &Path, options: &CategoryOptions) -> Result<Self, Error> {
        if !path.exists() {
            log::warn!("Category mapping file {} not found - no categories will be resolved", path.to_string_lossy());
            return Ok(Self { entries: vec!(), case_insensitive: options.case_insensitive() })
        }

        let file = std::fs::File::open(path)
            .map_err(|source| Error::CannotReadMapping { path: path.to_string_lossy().into(), source })?;

        let map = Self::from_reader(file, path, options)?;
        log::debug!("Loaded {} category mappings from {}", map.entries.len(), path.to_string_lossy());
        Ok(map)
    }

    ///
    /// Load a catalog from any reader - the file-based load() is a thin wrapper over this.
    ///
    pub fn from_reader<R: Read>(reader: R, path: &Path, options: &CategoryOptions) -> Result<Self, Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()
            .map_err(|source| Error::InvalidMappingRow { path: path.to_string_lossy().into(), source })?
            .clone();

        let id_idx = headers.iter().position(|h| h == options.id_column());
        let name_idx = headers.iter().position(|h| h == options.name_column());

        let (id_idx, name_idx) = match (id_idx, name_idx) {
            (Some(id), Some(name)) => (id, name),
            _ => return Err(Error::CharterValidationError {
                reason: format!("category mapping {} is missing the {} or {} column",
                    path.to_string_lossy(), options.id_column(), options.name_column()) }),
        };

        let mut entries = vec!();

        for record in rdr.records() {
            let record = record
                .map_err(|source| Error::InvalidMappingRow { path: path.to_string_lossy().into(), source })?;

            let category_id = record.get(id_idx).unwrap_or("").trim();
            let category_name = record.get(name_idx).unwrap_or("").trim();

            if category_id.is_empty() || category_name.is_empty() {
                continue
            }

            entries.push(CategoryEntry {
                category_id: category_id.into(),
                category_name: category_name.into(),
                normalized: normalize_category(category_name, options.case_insensitive()),
            });
        }

        Ok(Self { entries, case_insensitive: options.case_insensitive() })
    }

    ///
    /// Match a directory name against the catalog: exact normalized equality first, then
    /// either-way containment, both in CSV row order.
    ///
    pub fn lookup(&self, candidate: &str) -> Option<&CategoryEntry> {
        let wanted = normalize_category(candidate, self.case_insensitive);

        if wanted.is_empty() {
            return None
        }

        if let Some(entry) = self.entries.iter().find(|entry| entry.normalized == wanted) {
            return Some(entry)
        }

        self.entries.iter().find(|entry| {
            entry.normalized.contains(&wanted) || wanted.contains(&entry.normalized)
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

///
/// Reduce a category name to a comparable form: hyphens, underscores and ampersands become
/// spaces, anything else non-alphanumeric is dropped and whitespace runs collapse.
///
pub fn normalize_category(name: &str, case_insensitive: bool) -> String {
    let lowered = match case_insensitive {
        true  => name.to_lowercase(),
        false => name.to_string(),
    };

    let mapped: String = lowered.chars()
        .map(|ch| match ch {
            '-' | '_' | '&' => ' ',
            other => other,
        })
        .filter(|ch| ch.is_alphanumeric() || *ch == ' ')
        .collect();

    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}
