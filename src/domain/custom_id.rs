//! # Custom Ids
//!
//! Colon-delimited identifiers round-tripped through buttons, select menus and modals.
//! Parsing is a plain split and building a plain join. One reserved part, tagged
//! `m=`, may carry URL-safe base64 JSON metadata.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::errors::CustomIdError;

pub const SEPARATOR: char = ':';
/// Platform limit on custom id length.
pub const MAX_LENGTH: usize = 100;
const METADATA_TAG: &str = "m=";

/// Join parts with the separator.
pub fn build<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(&SEPARATOR.to_string())
}

/// Split an id on the separator.
pub fn parse(custom_id: &str) -> Vec<String> {
    custom_id.split(SEPARATOR).map(str::to_string).collect()
}

/// Fluent builder: `[namespace:]action[:arg...][:m=<metadata>]`.
#[derive(Debug, Clone, Default)]
pub struct CustomIdBuilder {
    namespace: Option<String>,
    action: String,
    args: Vec<String>,
    metadata: Option<String>,
}

impl CustomIdBuilder {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    /// Namespace without the trailing separator. A feature prefix of `"ns:"`
    /// corresponds to `namespace("ns")`.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn arg(mut self, arg: impl ToString) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.args.extend(args.into_iter().map(|a| a.to_string()));
        self
    }

    pub fn metadata<T: Serialize>(mut self, value: &T) -> Result<Self, CustomIdError> {
        let json = serde_json::to_vec(value).map_err(|e| CustomIdError::Metadata(e.to_string()))?;
        self.metadata = Some(format!("{METADATA_TAG}{}", URL_SAFE_NO_PAD.encode(json)));
        Ok(self)
    }

    pub fn build(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.args.len() + 3);
        if let Some(ns) = &self.namespace {
            parts.push(ns);
        }
        parts.push(&self.action);
        parts.extend(self.args.iter().map(String::as_str));
        if let Some(meta) = &self.metadata {
            parts.push(meta);
        }
        build(&parts)
    }

    /// Like [`build`](Self::build) but rejects ids over the platform limit.
    pub fn build_checked(&self) -> Result<String, CustomIdError> {
        let id = self.build();
        let len = id.chars().count();
        if len > MAX_LENGTH {
            return Err(CustomIdError::TooLong {
                len,
                max: MAX_LENGTH,
            });
        }
        Ok(id)
    }
}

/// A split custom id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCustomId {
    pub parts: Vec<String>,
}

impl ParsedCustomId {
    pub fn parse(custom_id: &str) -> Self {
        Self {
            parts: parse(custom_id),
        }
    }

    pub fn part(&self, index: usize) -> Option<&str> {
        self.parts.get(index).map(String::as_str)
    }

    /// Plain arguments after the first `skip` parts, excluding the metadata part.
    pub fn args_after(&self, skip: usize) -> Vec<&str> {
        self.parts
            .iter()
            .skip(skip)
            .filter(|p| !p.starts_with(METADATA_TAG))
            .map(String::as_str)
            .collect()
    }

    /// Decode the metadata part, if present.
    pub fn metadata<T: DeserializeOwned>(&self) -> Result<Option<T>, CustomIdError> {
        let Some(encoded) = self
            .parts
            .iter()
            .find_map(|p| p.strip_prefix(METADATA_TAG))
        else {
            return Ok(None);
        };
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| CustomIdError::Metadata(e.to_string()))?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| CustomIdError::Metadata(e.to_string()))
    }
}
