//! Config read/write (spec.md §6 `getConfig`/`setConfig`), a thin pass-through onto the
//! backend's four-scope cascade.

use super::Repository;
use crate::backend::GitBackend;
use crate::error::{Code, Error};

impl<B: GitBackend> Repository<B> {
    /// The merged `section[.subsection].key` value, highest-precedence scope wins.
    pub fn config(&self, section: &str, subsection: Option<&str>, key: &str) -> Result<Option<String>, Error> {
        let cascade = self.backend.read_config().map_err(|e| Error::new("repository.config", Code::Internal, e))?;
        Ok(cascade
            .raw_value(section, subsection, key)
            .map(|v| v.to_string()))
    }

    /// The merged boolean value of `section[.subsection].key`.
    pub fn config_bool(&self, section: &str, subsection: Option<&str>, key: &str) -> Result<Option<bool>, Error> {
        let cascade = self.backend.read_config().map_err(|e| Error::new("repository.config", Code::Internal, e))?;
        cascade
            .boolean(section, subsection, key)
            .transpose()
            .map_err(|e| Error::new("repository.config", Code::Internal, e))
    }

    /// Set `section[.subsection].key = value` in `scope`, persisting it through the backend.
    pub fn set_config(&self, scope: git_sec::Scope, section: &str, subsection: Option<&str>, key: &str, value: &str) -> Result<(), Error> {
        self.backend
            .write_config(scope, section, subsection, key, value)
            .map_err(|e| Error::new("repository.set_config", Code::Internal, e))
    }
}
