//! Hierarchical scene-description paths.
//!
//! A [`Path`] identifies one object in a scene-description tree: a prim
//! (`/Root/Child`), a property (`/Root/Child.size`), a relationship target or
//! attribute connection (`/Root/Child.rel[/Other]`), a relational attribute
//! beneath a target (`/Root/Child.rel[/Other].weight`), or a legacy mapper
//! child keyed by a connection path (`/Root/Child.attr.mapper[/Other.out]`).
//!
//! Paths are immutable values with a total order used for stable diffing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reserved component name used in the textual form of mapper paths.
const MAPPER_KEYWORD: &str = "mapper";

/// PathError represents a failure to parse a path string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("invalid identifier '{0}' in path")]
    InvalidIdentifier(String),

    #[error("unbalanced brackets in path '{0}'")]
    UnbalancedBrackets(String),

    #[error("unexpected trailing characters in path '{0}'")]
    TrailingCharacters(String),

    #[error("empty target in path '{0}'")]
    EmptyTarget(String),
}

/// Path is an immutable, hierarchically-structured identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    absolute: bool,
    prims: Vec<String>,
    property: Option<String>,
    /// Target path for relationship targets and attribute connections, or the
    /// connection path of a mapper child when `is_mapper` is set.
    target: Option<Box<Path>>,
    is_mapper: bool,
    relational_attr: Option<String>,
}

/// Returns true if `name` is a simple identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Returns true if `name` is one or more identifiers joined by `:`.
pub fn is_valid_namespaced_identifier(name: &str) -> bool {
    !name.is_empty() && name.split(':').all(is_valid_identifier)
}

/// Joins identifier parts with the namespace delimiter, skipping empty parts.
pub fn join_identifier(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(":")
}

impl Path {
    /// The absolute root path `/`.
    pub fn absolute_root() -> Self {
        Path {
            absolute: true,
            ..Default::default()
        }
    }

    /// The empty path.
    pub fn empty() -> Self {
        Path::default()
    }

    /// Returns true if this is the empty path.
    pub fn is_empty(&self) -> bool {
        !self.absolute && self.prims.is_empty() && self.property.is_none()
    }

    /// Returns true if this path is absolute.
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Returns true if this path identifies a prim (including the root).
    pub fn is_prim_path(&self) -> bool {
        !self.is_empty() && self.property.is_none()
    }

    /// Returns true if this path identifies a property: a prim property or a
    /// relational attribute. Property paths always have a non-empty name.
    pub fn is_property_path(&self) -> bool {
        self.relational_attr.is_some() || (self.property.is_some() && self.target.is_none())
    }

    /// Returns true if this path identifies a relationship target or
    /// attribute connection child.
    pub fn is_target_path(&self) -> bool {
        self.target.is_some() && self.relational_attr.is_none() && !self.is_mapper
    }

    /// Returns true if this path identifies a mapper child.
    pub fn is_mapper_path(&self) -> bool {
        self.is_mapper
    }

    /// Returns the name of the last component, or "" for the root/empty path.
    pub fn name(&self) -> &str {
        if let Some(ref ra) = self.relational_attr {
            return ra;
        }
        if self.target.is_some() {
            // Target components are identified by their path, not a name.
            return "";
        }
        if let Some(ref prop) = self.property {
            return prop;
        }
        self.prims.last().map(String::as_str).unwrap_or("")
    }

    /// Returns the target path component, if any.
    pub fn target_path(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    /// Returns the prim portion of this path, stripping any property part.
    pub fn prim_path(&self) -> Path {
        Path {
            absolute: self.absolute,
            prims: self.prims.clone(),
            ..Default::default()
        }
    }

    /// Returns the parent path: the owning object one level up, or the empty
    /// path at the root.
    pub fn parent(&self) -> Path {
        let mut parent = self.clone();
        if parent.relational_attr.take().is_some() {
            return parent;
        }
        if parent.target.take().is_some() {
            parent.is_mapper = false;
            return parent;
        }
        if parent.property.take().is_some() {
            return parent;
        }
        if parent.prims.pop().is_some() {
            return parent;
        }
        Path::empty()
    }

    /// Appends a child prim component. Returns the empty path and posts a
    /// coding error if this is not a prim path or `name` is invalid.
    pub fn append_child(&self, name: &str) -> Path {
        if !self.is_prim_path() || !is_valid_identifier(name) {
            crate::coding_error!("cannot append child '{}' to <{}>", name, self);
            return Path::empty();
        }
        let mut path = self.clone();
        path.prims.push(name.to_string());
        path
    }

    /// Appends a property component. Returns the empty path and posts a
    /// coding error if this is not a non-root prim path or `name` is
    /// invalid; the pseudo-root cannot own properties.
    pub fn append_property(&self, name: &str) -> Path {
        if !self.is_prim_path() || self.prims.is_empty() || !is_valid_namespaced_identifier(name) {
            crate::coding_error!("cannot append property '{}' to <{}>", name, self);
            return Path::empty();
        }
        let mut path = self.clone();
        path.property = Some(name.to_string());
        path
    }

    /// Appends a target component to a property path.
    pub fn append_target(&self, target: &Path) -> Path {
        if !self.is_property_path() || self.relational_attr.is_some() || target.is_empty() {
            crate::coding_error!("cannot append target <{}> to <{}>", target, self);
            return Path::empty();
        }
        let mut path = self.clone();
        path.target = Some(Box::new(target.clone()));
        path
    }

    /// Appends a mapper component keyed by a connection path.
    pub fn append_mapper(&self, connection: &Path) -> Path {
        if !self.is_property_path() || self.relational_attr.is_some() || connection.is_empty() {
            crate::coding_error!("cannot append mapper <{}> to <{}>", connection, self);
            return Path::empty();
        }
        let mut path = self.clone();
        path.target = Some(Box::new(connection.clone()));
        path.is_mapper = true;
        path
    }

    /// Appends a relational attribute component to a target path.
    pub fn append_relational_attribute(&self, name: &str) -> Path {
        if !self.is_target_path() || !is_valid_namespaced_identifier(name) {
            crate::coding_error!("cannot append relational attribute '{}' to <{}>", name, self);
            return Path::empty();
        }
        let mut path = self.clone();
        path.relational_attr = Some(name.to_string());
        path
    }

    /// Makes this path absolute relative to `anchor`, which must be an
    /// absolute prim path. `..` components step up through the anchor.
    /// Absolute paths are returned unchanged.
    pub fn make_absolute(&self, anchor: &Path) -> Path {
        if self.absolute || self.is_empty() {
            return self.clone();
        }
        if !anchor.absolute || !anchor.is_prim_path() {
            crate::coding_error!("anchor <{}> is not an absolute prim path", anchor);
            return Path::empty();
        }
        let mut prims = anchor.prims.clone();
        for part in &self.prims {
            if part == ".." {
                if prims.pop().is_none() {
                    crate::coding_error!("path <{}> escapes the root under <{}>", self, anchor);
                    return Path::empty();
                }
            } else {
                prims.push(part.clone());
            }
        }
        Path {
            absolute: true,
            prims,
            property: self.property.clone(),
            target: self.target.clone(),
            is_mapper: self.is_mapper,
            relational_attr: self.relational_attr.clone(),
        }
    }

    /// Returns true if `prefix` is a prefix of (or equal to) this path.
    pub fn has_prefix(&self, prefix: &Path) -> bool {
        if prefix.is_empty() {
            return false;
        }
        if self == prefix {
            return true;
        }
        // A pure prim prefix.
        if prefix.property.is_none() {
            return self.absolute == prefix.absolute
                && self.prims.len() >= prefix.prims.len()
                && self.prims[..prefix.prims.len()] == prefix.prims[..];
        }
        // A property prefix covers its targets and relational attributes.
        if self.absolute != prefix.absolute
            || self.prims != prefix.prims
            || self.property != prefix.property
        {
            return false;
        }
        match (&self.target, &prefix.target) {
            (_, None) => true,
            (Some(a), Some(b)) => a == b && self.is_mapper == prefix.is_mapper,
            (None, Some(_)) => false,
        }
    }

    fn parse_name(input: &str, pos: &mut usize) -> Result<String, PathError> {
        let rest = &input[*pos..];
        let end = rest
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_' || *c == ':'))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let name = &rest[..end];
        if !is_valid_namespaced_identifier(name) {
            return Err(PathError::InvalidIdentifier(name.to_string()));
        }
        *pos += end;
        Ok(name.to_string())
    }

    fn parse_bracketed(input: &str, pos: &mut usize) -> Result<Path, PathError> {
        // Caller consumed the opening '['. Find the matching close bracket.
        let rest = &input[*pos..];
        let mut depth = 1usize;
        let mut end = None;
        for (i, c) in rest.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let end = end.ok_or_else(|| PathError::UnbalancedBrackets(input.to_string()))?;
        let inner = &rest[..end];
        if inner.is_empty() {
            return Err(PathError::EmptyTarget(input.to_string()));
        }
        let target = inner.parse::<Path>()?;
        *pos += end + 1;
        Ok(target)
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Path::empty());
        }
        let mut path = Path::default();
        let mut pos = 0usize;

        if s.as_bytes()[0] == b'/' {
            path.absolute = true;
            pos = 1;
        }

        // Prim components. A leading ".." is a parent step in relative paths;
        // a single "." introduces a property.
        while pos < s.len() {
            let rest = &s[pos..];
            if rest.starts_with("..") {
                path.prims.push("..".to_string());
                pos += 2;
            } else if rest.starts_with('.') || rest.starts_with('[') {
                break;
            } else {
                path.prims.push(Path::parse_name(s, &mut pos)?);
            }
            if s[pos..].starts_with('/') {
                pos += 1;
            } else {
                break;
            }
        }

        // Property component.
        if s[pos..].starts_with('.') {
            pos += 1;
            path.property = Some(Path::parse_name(s, &mut pos)?);
        }

        // Target or mapper component.
        if s[pos..].starts_with('[') {
            pos += 1;
            path.target = Some(Box::new(Path::parse_bracketed(s, &mut pos)?));
        } else if path.property.is_some() {
            let mapper_prefix = format!(".{}[", MAPPER_KEYWORD);
            if s[pos..].starts_with(&mapper_prefix) {
                pos += mapper_prefix.len();
                path.target = Some(Box::new(Path::parse_bracketed(s, &mut pos)?));
                path.is_mapper = true;
            }
        }

        // Relational attribute component.
        if path.target.is_some() && !path.is_mapper && s[pos..].starts_with('.') {
            pos += 1;
            path.relational_attr = Some(Path::parse_name(s, &mut pos)?);
        }

        if pos != s.len() {
            return Err(PathError::TrailingCharacters(s.to_string()));
        }
        if path.property.is_none() && path.prims.is_empty() && !path.absolute {
            return Err(PathError::InvalidIdentifier(s.to_string()));
        }
        Ok(path)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            write!(f, "/")?;
        }
        write!(f, "{}", self.prims.join("/"))?;
        if let Some(ref prop) = self.property {
            write!(f, ".{}", prop)?;
        }
        if let Some(ref target) = self.target {
            if self.is_mapper {
                write!(f, ".{}[{}]", MAPPER_KEYWORD, target)?;
            } else {
                write!(f, "[{}]", target)?;
            }
        }
        if let Some(ref ra) = self.relational_attr {
            write!(f, ".{}", ra)?;
        }
        Ok(())
    }
}

impl Serialize for Path {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parses a path, panicking on failure. Test and example convenience.
pub fn path(s: &str) -> Path {
    s.parse().unwrap_or_else(|e| panic!("bad path '{}': {}", s, e))
}
