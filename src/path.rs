use std::fmt;

use crate::{
    output::{KeyStyle, format_key},
    value::{Node, Value},
};

/// One step from a container to one of its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Object child by key
    ///
    /// # Examples
    /// - `@.name` → `Key("name")`
    /// - ``@[`a b`]`` → `Key("a b")`
    Key(String),

    /// Array child by resolved (non-negative) position
    ///
    /// # Examples
    /// - `@[0]` → `Index(0)`
    /// - `@[-1]` on a three-element array → `Index(2)`
    Index(usize),
}

/// A sequence of segments from some root node down to a descendant.
///
/// Used by mutation to find the nodes to replace, and by recursive search to
/// avoid visiting a node twice.
///
/// For `@.items[0].price` the path would be:
/// - `PathSegment::Key("items")`
/// - `PathSegment::Index(0)`
/// - `PathSegment::Key("price")`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path(pub Vec<PathSegment>);

impl Path {
    pub fn root() -> Self {
        Path(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, segment: PathSegment) -> Path {
        let mut segments = self.0.clone();
        segments.push(segment);
        Path(segments)
    }

    /// `self` followed by every segment of `rest`.
    pub fn join(&self, rest: &Path) -> Path {
        let mut segments = self.0.clone();
        segments.extend(rest.0.iter().cloned());
        Path(segments)
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

impl From<PathSegment> for Path {
    fn from(segment: PathSegment) -> Self {
        Path(vec![segment])
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@")?;
        for segment in &self.0 {
            match segment {
                PathSegment::Key(k) => write!(f, "{}", format_key(k, KeyStyle::RemesPath))?,
                PathSegment::Index(i) => write!(f, "[{}]", i)?,
            }
        }
        Ok(())
    }
}

/// Follow `path` from `root`, or `None` if a step does not exist.
pub fn get<'a>(root: &'a Node, path: &Path) -> Option<&'a Node> {
    path.0.iter().try_fold(root, |node, segment| match (&node.value, segment) {
        (Value::Object(obj), PathSegment::Key(k)) => obj.get(k),
        (Value::Array(arr), PathSegment::Index(i)) => arr.get(*i),
        _ => None,
    })
}

/// Mutable counterpart of [`get`].
pub fn get_mut<'a>(root: &'a mut Node, path: &Path) -> Option<&'a mut Node> {
    path.0.iter().try_fold(root, |node, segment| match (&mut node.value, segment) {
        (Value::Object(obj), PathSegment::Key(k)) => obj.get_mut(k),
        (Value::Array(arr), PathSegment::Index(i)) => arr.get_mut(*i),
        _ => None,
    })
}
