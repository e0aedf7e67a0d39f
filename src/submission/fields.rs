//! Form-field mapping and boundary validation.
//!
//! Field names are application-defined — the intake form can grow new fields
//! without code changes here. Only the contactable-identity core is required;
//! everything else passes through to the composer verbatim, in arrival order.

use crate::error::ValidationError;

/// Fields that must be present and non-empty for a submission to proceed.
pub const REQUIRED_FIELDS: &[&str] = &["fullName", "email", "phone"];

/// Ordered field-name → value mapping for one submission.
///
/// Backed by a Vec so the composer renders fields in the order the form sent
/// them — identical input always renders identically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: Vec<(String, String)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field. Repeated names are rejected — a repeated key is how a
    /// multipart payload smuggles an array into a scalar slot.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(ValidationError::InvalidField(name));
        }
        self.entries.push((name, value.into()));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate fields in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for FieldMap {
    /// Build from literal pairs. Duplicate names are a programmer error here,
    /// unlike `insert`, which reports them as validation failures.
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut map = FieldMap::new();
        for (n, v) in iter {
            map.insert(n, v).expect("duplicate field name in literal FieldMap");
        }
        map
    }
}

/// Confirm every required field is present and holds a non-empty string.
///
/// Missing key → `MissingField`; present but blank → `InvalidField`.
/// Unknown extra fields are untouched.
pub fn validate(fields: &FieldMap) -> Result<(), ValidationError> {
    for &name in REQUIRED_FIELDS {
        match fields.get(name) {
            None => return Err(ValidationError::MissingField(name.to_string())),
            Some(value) if value.trim().is_empty() => {
                return Err(ValidationError::InvalidField(name.to_string()));
            }
            Some(_) => {}
        }
    }
    Ok(())
}
