//! Filter criteria for installed-application queries.
//!
//! Criteria are plain string maps. They are validated eagerly and translated
//! into a native filter handle that lives only for the duration of one
//! query; the handle is released on every exit path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::native::{keys, FilterHandle, MetadataFilterHandle, SharedFramework};
use crate::types::{Error, Result};

/// Property keys recognised by [`AppFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKey {
    Id,
    Type,
    Category,
    NoDisplay,
    TaskManage,
}

impl FilterKey {
    pub const ALL: [FilterKey; 5] = [
        FilterKey::Id,
        FilterKey::Type,
        FilterKey::Category,
        FilterKey::NoDisplay,
        FilterKey::TaskManage,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            FilterKey::Id => keys::APP_ID,
            FilterKey::Type => keys::APP_TYPE,
            FilterKey::Category => keys::APP_CATEGORY,
            FilterKey::NoDisplay => keys::APP_NODISPLAY,
            FilterKey::TaskManage => keys::APP_TASKMANAGE,
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }

    /// Boolean-valued keys go through the native boolean setter.
    pub const fn is_boolean(self) -> bool {
        matches!(self, FilterKey::NoDisplay | FilterKey::TaskManage)
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_bool(key: FilterKey, value: &str) -> Result<bool> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(Error::invalid_parameter(format!(
            "filter key {key} expects \"true\" or \"false\", got {value:?}"
        )))
    }
}

// =============================================================================
// AppFilter
// =============================================================================

/// Property criteria for installed applications. All criteria must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppFilter {
    criteria: BTreeMap<String, String>,
}

impl AppFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: FilterKey, value: impl Into<String>) -> Self {
        self.insert(key.as_str(), value);
        self
    }

    /// Insert a criterion by raw key. Unrecognised keys are kept here and
    /// dropped (with a warning) when the native filter is built.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.criteria.insert(key.into(), value.into())
    }

    pub fn criteria(&self) -> &BTreeMap<String, String> {
        &self.criteria
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.criteria.is_empty() {
            return Err(Error::invalid_filter("filter criteria must not be empty"));
        }
        Ok(())
    }

    /// Translate into a native filter handle.
    pub(crate) fn build(&self, framework: &SharedFramework) -> Result<FilterHandle> {
        self.validate()?;
        let handle = FilterHandle::create(framework)
            .map_err(|code| Error::from_native(code, "failed to create application filter"))?;

        for (key, value) in &self.criteria {
            let Some(filter_key) = FilterKey::parse(key) else {
                tracing::warn!(key = %key, "ignoring unrecognised filter key");
                continue;
            };
            let added = if filter_key.is_boolean() {
                let flag = parse_bool(filter_key, value)?;
                framework.filter_add_bool(handle.raw(), filter_key.as_str(), flag)
            } else {
                framework.filter_add_string(handle.raw(), filter_key.as_str(), value)
            };
            added.map_err(|code| {
                Error::from_native(code, format!("failed to add filter {filter_key}={value}"))
            })?;
        }

        Ok(handle)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AppFilter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            criteria: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// =============================================================================
// MetadataFilter
// =============================================================================

/// Metadata criteria: an application matches if it carries any of the
/// pairs. An empty value matches on key presence alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    pairs: BTreeMap<String, String>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.pairs.insert(key.into(), value.into())
    }

    pub fn pairs(&self) -> &BTreeMap<String, String> {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.pairs.is_empty() {
            return Err(Error::invalid_filter("metadata criteria must not be empty"));
        }
        Ok(())
    }

    pub(crate) fn build(&self, framework: &SharedFramework) -> Result<MetadataFilterHandle> {
        self.validate()?;
        let handle = MetadataFilterHandle::create(framework)
            .map_err(|code| Error::from_native(code, "failed to create metadata filter"))?;

        for (key, value) in &self.pairs {
            framework
                .metadata_filter_add(handle.raw(), key, value)
                .map_err(|code| {
                    Error::from_native(code, format!("failed to add metadata filter {key}={value}"))
                })?;
        }

        Ok(handle)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MetadataFilter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
