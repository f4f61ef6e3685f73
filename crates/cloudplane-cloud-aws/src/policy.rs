//! Required action set parsed from the credential policy document
//!
//! The document is a regular IAM policy, shipped Base64 encoded. Only the
//! `Resource` and `Action` fields of each statement are used.

use crate::error::{AwsError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Policy document users attach to their role or user
pub const DEFAULT_CREDENTIAL_POLICY_JSON: &str =
    include_str!("../resources/credential-policy.json");

/// [`DEFAULT_CREDENTIAL_POLICY_JSON`] in the encoding used by configuration
pub fn default_policy_base64() -> String {
    STANDARD.encode(DEFAULT_CREDENTIAL_POLICY_JSON)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyDocument {
    statement: Vec<PolicyStatement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyStatement {
    #[serde(default)]
    resource: OneOrMany,
    #[serde(default)]
    action: OneOrMany,
}

/// IAM allows a single string wherever a list is expected
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

/// Resource ARN to required actions, merged across statements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredActionSet {
    entries: BTreeMap<String, Vec<String>>,
}

impl RequiredActionSet {
    /// Decode and parse a Base64 encoded policy document
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| AwsError::MalformedPolicy(format!("invalid base64: {}", e)))?;
        let json = String::from_utf8(bytes)
            .map_err(|e| AwsError::MalformedPolicy(format!("invalid utf-8: {}", e)))?;
        Self::from_json(&json)
    }

    /// Parse a plain JSON policy document
    pub fn from_json(json: &str) -> Result<Self> {
        let document: PolicyDocument =
            serde_json::from_str(json).map_err(|e| AwsError::MalformedPolicy(e.to_string()))?;

        let mut entries: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for statement in document.statement {
            let actions = statement.action.into_vec();
            for resource in statement.resource.into_vec() {
                let merged = entries.entry(resource).or_default();
                for action in &actions {
                    if !merged.contains(action) {
                        merged.push(action.clone());
                    }
                }
            }
        }

        entries.retain(|_, actions| !actions.is_empty());
        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(resource, actions)| (resource.as_str(), actions.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_parses() {
        let set = RequiredActionSet::from_base64(&default_policy_base64()).unwrap();
        assert_eq!(set.len(), 1);

        let (resource, actions) = set.iter().next().unwrap();
        assert_eq!(resource, "*");
        assert!(actions.iter().any(|a| a == "ec2:RunInstances"));
        assert!(actions.iter().any(|a| a == "iam:PassRole"));
    }

    #[test]
    fn test_statements_merge_per_resource() {
        let json = r#"{
            "Statement": [
                {"Resource": ["arn:aws:s3:::bucket", "*"], "Action": ["s3:GetObject"]},
                {"Resource": "arn:aws:s3:::bucket", "Action": ["s3:GetObject", "s3:PutObject"]}
            ]
        }"#;
        let set = RequiredActionSet::from_json(json).unwrap();

        let entries: Vec<_> = set.iter().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("*", &["s3:GetObject".to_string()][..]));
        assert_eq!(
            entries[1].1,
            &["s3:GetObject".to_string(), "s3:PutObject".to_string()][..]
        );
    }

    #[test]
    fn test_malformed_document_is_fatal() {
        assert!(matches!(
            RequiredActionSet::from_json("{\"Version\": \"2012-10-17\"}"),
            Err(AwsError::MalformedPolicy(_))
        ));
        assert!(matches!(
            RequiredActionSet::from_base64("not base64!"),
            Err(AwsError::MalformedPolicy(_))
        ));
    }
}
