//! A single parsed config file: section/subsection/key lookup and mutation (spec.md §6: "Each
//! scope parses to a canonical section/subsection/key tree").

use std::convert::TryFrom;

use bstr::{BStr, BString, ByteSlice};

use crate::{
    parse::{self, Entry, Section},
    values::{Boolean, Integer},
};

/// A parsed config file, independent of which [`git_sec::Scope`] it came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct File {
    sections: Vec<Section>,
}

impl File {
    /// Parse `bytes` as a config file's contents.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, parse::Error> {
        Ok(File {
            sections: parse::parse(bytes)?,
        })
    }

    /// Serialise back to the on-disk text form.
    pub fn to_vec(&self) -> Vec<u8> {
        parse::serialize(&self.sections)
    }

    /// The last entry matching `section[.subsection].key`, git's own "last one wins" rule for
    /// repeated keys.
    pub fn raw_value(&self, section: &str, subsection: Option<&str>, key: &str) -> Option<&BStr> {
        self.entries(section, subsection, key).last().and_then(|e| e.value.as_deref())
    }

    /// Every entry matching `section[.subsection].key`, in file order; used for multi-valued
    /// keys like `remote.<name>.fetch`.
    pub fn values(&self, section: &str, subsection: Option<&str>, key: &str) -> Vec<&BStr> {
        self.entries(section, subsection, key)
            .filter_map(|e| e.value.as_deref())
            .collect()
    }

    fn entries(&self, section: &str, subsection: Option<&str>, key: &str) -> impl Iterator<Item = &Entry> {
        self.sections
            .iter()
            .filter(move |s| s.matches(section, subsection))
            .flat_map(|s| s.entries.iter())
            .filter(move |e| e.key.eq_ignore_ascii_case(key.as_bytes()))
    }

    /// Interpret the last matching value as a boolean; a bare key (no `=value`) is `true`.
    pub fn boolean(&self, section: &str, subsection: Option<&str>, key: &str) -> Option<Result<bool, crate::values::Error>> {
        let entry = self.entries(section, subsection, key).last()?;
        Some(match &entry.value {
            None => Ok(true),
            Some(v) => Boolean::try_from(v.as_bytes()).map(Boolean::to_bool),
        })
    }

    /// Interpret the last matching value as an integer, applying any `k`/`m`/`g` suffix.
    pub fn integer(&self, section: &str, subsection: Option<&str>, key: &str) -> Option<Result<i64, crate::values::Error>> {
        let value = self.raw_value(section, subsection, key)?;
        Some(Integer::try_from(value.as_bytes()).map(|i| i.to_decimal().unwrap_or(i.value)))
    }

    /// Set `section[.subsection].key = value`, overwriting the last matching entry if one
    /// exists, appending a new entry to (or creating) the section otherwise.
    pub fn set_raw_value(&mut self, section: &str, subsection: Option<&str>, key: &str, value: impl Into<BString>) {
        let value = value.into();
        if let Some(existing) = self
            .sections
            .iter_mut()
            .filter(|s| s.matches(section, subsection))
            .flat_map(|s| s.entries.iter_mut())
            .filter(|e| e.key.eq_ignore_ascii_case(key.as_bytes()))
            .last()
        {
            existing.value = Some(value);
            return;
        }
        let target = match self.sections.iter_mut().find(|s| s.matches(section, subsection)) {
            Some(s) => s,
            None => {
                self.sections.push(Section {
                    name: section.into(),
                    subsection: subsection.map(BString::from),
                    entries: Vec::new(),
                });
                self.sections.last_mut().expect("just pushed")
            }
        };
        target.entries.push(Entry {
            key: key.into(),
            value: Some(value),
        });
    }

    /// Remove every section matching `section[.subsection]`.
    pub fn remove_section(&mut self, section: &str, subsection: Option<&str>) {
        self.sections.retain(|s| !s.matches(section, subsection));
    }

    /// All section/subsection name pairs present, in file order, e.g. for enumerating every
    /// `remote.<name>` to list configured remotes.
    pub fn sections_named<'a>(&'a self, section: &'a str) -> impl Iterator<Item = Option<&'a BStr>> + 'a {
        self.sections
            .iter()
            .filter(move |s| s.name.eq_ignore_ascii_case(section.as_bytes()))
            .map(|s| s.subsection.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_last_value_for_repeated_keys() {
        let file = File::from_bytes(b"[core]\n\teditor = vi\n\teditor = emacs\n").unwrap();
        assert_eq!(file.raw_value("core", None, "editor"), Some(b"emacs".as_bstr()));
    }

    #[test]
    fn bare_key_reads_as_true() {
        let file = File::from_bytes(b"[core]\n\tbare\n").unwrap();
        assert_eq!(file.boolean("core", None, "bare").unwrap().unwrap(), true);
    }

    #[test]
    fn set_raw_value_overwrites_existing_entry() {
        let mut file = File::from_bytes(b"[core]\n\tbare = false\n").unwrap();
        file.set_raw_value("core", None, "bare", "true");
        assert_eq!(file.raw_value("core", None, "bare"), Some(b"true".as_bstr()));
    }

    #[test]
    fn set_raw_value_creates_missing_section() {
        let mut file = File::default();
        file.set_raw_value("remote", Some("origin"), "url", "https://example/repo.git");
        assert_eq!(
            file.raw_value("remote", Some("origin"), "url"),
            Some(b"https://example/repo.git".as_bstr())
        );
    }

    #[test]
    fn sections_named_lists_all_subsections() {
        let file = File::from_bytes(b"[remote \"origin\"]\n\turl=a\n[remote \"fork\"]\n\turl=b\n").unwrap();
        let names: Vec<_> = file.sections_named("remote").map(|s| s.map(|b| b.to_string())).collect();
        assert_eq!(names, vec![Some("origin".into()), Some("fork".into())]);
    }
}
