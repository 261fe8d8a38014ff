//! Categorical label encoding

use crate::error::{MortalityError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maps category labels to integer codes.
///
/// Codes follow sorted label order, so fitting the same set of labels in any
/// row order produces the same mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    field: String,
    mapping: BTreeMap<String, usize>,
}

impl LabelEncoder {
    /// Fit an encoder over the distinct values of one field
    pub fn fit<'a, I>(field: &str, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut mapping: BTreeMap<String, usize> = BTreeMap::new();
        for value in values {
            mapping.entry(value.to_string()).or_insert(0);
        }

        if mapping.is_empty() {
            return Err(MortalityError::Validation(format!(
                "cannot fit encoder for {} on an empty column",
                field
            )));
        }

        for (code, slot) in mapping.values_mut().enumerate() {
            *slot = code;
        }

        Ok(Self {
            field: field.to_string(),
            mapping,
        })
    }

    /// Encode one value; unseen categories are an error
    pub fn encode(&self, value: &str) -> Result<usize> {
        self.mapping
            .get(value)
            .copied()
            .ok_or_else(|| MortalityError::UnknownCategory {
                field: self.field.clone(),
                value: value.to_string(),
            })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Known categories in code order
    pub fn classes(&self) -> Vec<&str> {
        self.mapping.keys().map(|k| k.as_str()).collect()
    }

    pub fn n_classes(&self) -> usize {
        self.mapping.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_sorted_order() {
        let enc = LabelEncoder::fit("gender", ["Male", "Female", "Male"]).unwrap();
        assert_eq!(enc.encode("Female").unwrap(), 0);
        assert_eq!(enc.encode("Male").unwrap(), 1);
        assert_eq!(enc.classes(), vec!["Female", "Male"]);
    }

    #[test]
    fn test_unknown_category_is_error() {
        let enc = LabelEncoder::fit("state", ["Ohio", "Texas"]).unwrap();
        let err = enc.encode("Utah").unwrap_err();
        assert!(matches!(
            err,
            MortalityError::UnknownCategory { ref field, ref value } if field == "state" && value == "Utah"
        ));
    }

    #[test]
    fn test_empty_fit_rejected() {
        let values: Vec<&str> = Vec::new();
        assert!(LabelEncoder::fit("county", values).is_err());
    }
}
