//! The configuration tree: containers of named elements, and arrays of raw
//! string values.

use crate::error::ParamError;
use std::fmt::{self, Display};
use std::io;
use std::str::FromStr;

const INDENT_STEP: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Container,
    Array,
}

impl Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementKind::Container => write!(f, "a container"),
            ElementKind::Array => write!(f, "an array"),
        }
    }
}

/// A node of the tree. Containers own their children, arrays own their values;
/// the other collection always stays empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    kind: ElementKind,
    name: Option<String>,
    children: Vec<Element>,
    values: Vec<String>,
}

impl Element {
    pub(crate) fn new_root() -> Self {
        Element {
            kind: ElementKind::Container,
            name: None,
            children: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn container(name: impl Into<String>) -> Self {
        Element {
            name: Some(name.into()),
            ..Element::new_root()
        }
    }

    pub fn array(name: impl Into<String>) -> Self {
        Element {
            kind: ElementKind::Array,
            ..Element::container(name)
        }
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn is_array(&self) -> bool {
        self.kind == ElementKind::Array
    }

    /// `None` only for the root of a tree.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// First direct child called `name`.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is_named(name))
    }

    pub(crate) fn push_child(&mut self, child: Element) {
        debug_assert_eq!(self.kind, ElementKind::Container);
        self.children.push(child);
    }

    pub(crate) fn push_value(&mut self, value: impl Into<String>) {
        debug_assert_eq!(self.kind, ElementKind::Array);
        self.values.push(value.into());
    }

    fn is_named(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }

    fn write_text(&self, out: &mut impl fmt::Write, indent: usize) -> fmt::Result {
        let name = self.name.as_deref().unwrap_or_default();
        match self.kind {
            ElementKind::Container => {
                writeln!(out, "{:indent$}{name} {{", "")?;
                for child in &self.children {
                    child.write_text(out, indent + INDENT_STEP)?;
                }
                writeln!(out, "{:indent$}}}", "")
            }
            ElementKind::Array => {
                write!(out, "{:indent$}{name} = [", "")?;
                for (i, value) in self.values.iter().enumerate() {
                    if i > 0 {
                        out.write_str(", ")?;
                    }
                    write!(out, "\"{value}\"")?;
                }
                out.write_str("];\n")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    root: Element,
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Tree {
            root: Element::new_root(),
        }
    }

    pub(crate) fn from_root(root: Element) -> Self {
        debug_assert!(root.name.is_none());
        Tree { root }
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Resolves a dotted path from the root.
    ///
    /// With `inherit`, a final segment missing from its container is looked up
    /// again in each enclosing container, innermost first.
    pub fn find(&self, path: &str, inherit: bool) -> Option<&Element> {
        let mut scopes = vec![&self.root];
        resolve(&mut scopes, path, inherit)
    }

    /// Resolves a dotted path without inheritance.
    pub fn find_mut(&mut self, path: &str) -> Option<&mut Element> {
        let mut current = &mut self.root;
        for segment in path.split('.') {
            current = current.children.iter_mut().find(|c| c.is_named(segment))?;
        }
        Some(current)
    }

    /// Container addressed by `path`, the root for an empty path.
    pub fn container(&self, path: &str) -> Result<&Element, ParamError> {
        if path.is_empty() {
            return Ok(&self.root);
        }
        let element = self
            .find(path, true)
            .ok_or_else(|| ParamError::key_not_found(path))?;
        match element.kind {
            ElementKind::Container => Ok(element),
            ElementKind::Array => Err(ParamError::type_mismatch(path, ElementKind::Container)),
        }
    }

    /// Values of the array addressed by `path`, with inheritance.
    pub fn array_values(&self, path: &str) -> Result<&[String], ParamError> {
        let element = self
            .find(path, true)
            .ok_or_else(|| ParamError::key_not_found(path))?;
        match element.kind {
            ElementKind::Array => Ok(&element.values),
            ElementKind::Container => Err(ParamError::type_mismatch(path, ElementKind::Array)),
        }
    }

    /// Returns the element at `path`, creating it if it does not exist.
    ///
    /// Missing intermediate segments become containers and a missing final
    /// segment becomes an empty array. Walking through an existing array is a
    /// `TypeMismatch`.
    pub fn entry(&mut self, path: &str) -> Result<&mut Element, ParamError> {
        let mut current = &mut self.root;
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let last = segments.peek().is_none();
            if current.kind == ElementKind::Array {
                return Err(ParamError::type_mismatch(path, ElementKind::Container));
            }
            let index = match current.children.iter().position(|c| c.is_named(segment)) {
                Some(index) => index,
                None => {
                    current.children.push(if last {
                        Element::array(segment)
                    } else {
                        Element::container(segment)
                    });
                    current.children.len() - 1
                }
            };
            current = &mut current.children[index];
        }
        Ok(current)
    }

    /// Stores `value` as the first value of the array at `path`.
    pub fn set_value(&mut self, path: &str, value: &str) -> Result<(), ParamError> {
        let element = self.entry(path)?;
        if element.kind != ElementKind::Array {
            return Err(ParamError::type_mismatch(path, ElementKind::Array));
        }
        match element.values.first_mut() {
            Some(first) => *first = value.to_string(),
            None => element.values.push(value.to_string()),
        }
        Ok(())
    }

    /// Names of the children of the container at `path`, in insertion order.
    pub fn subkeys(&self, path: &str) -> Result<Vec<String>, ParamError> {
        Ok(self
            .container(path)?
            .children
            .iter()
            .filter_map(|c| c.name.clone())
            .collect())
    }

    pub fn write<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(self.to_string().as_bytes())
    }
}

fn resolve<'t>(scopes: &mut Vec<&'t Element>, path: &str, inherit: bool) -> Option<&'t Element> {
    let current = *scopes.last()?;
    let (segment, remainder) = match path.split_once('.') {
        Some((segment, rest)) => (segment, Some(rest)),
        None => (path, None),
    };

    if let Some(child) = current.child(segment) {
        return match remainder {
            Some(rest) => {
                scopes.push(child);
                resolve(scopes, rest, inherit)
            }
            None => Some(child),
        };
    }

    if inherit && remainder.is_none() && scopes.len() > 1 {
        scopes.pop();
        return resolve(scopes, segment, inherit);
    }
    None
}

impl Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for child in &self.root.children {
            child.write_text(f, 0)?;
        }
        Ok(())
    }
}

impl FromStr for Tree {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::parser::parse_str(s)
    }
}
