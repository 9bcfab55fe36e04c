//! Path expressions over the resource graph.
//!
//! A [`Path`] is a sequence of [`PathSegment`]s resolved left to right by the
//! store. The textual form is delimiter-separated (`.` by default): a leading
//! delimiter denotes the root resource, purely numeric segments index into
//! arrays, and everything else is a member key.
//!
//! ```
//! use hyper_store::{Path, PathSegment};
//!
//! let path = Path::parse(".users.collection.0.name");
//! assert_eq!(
//!     path.segments(),
//!     &[
//!         PathSegment::Root,
//!         PathSegment::Key("users".into()),
//!         PathSegment::Key("collection".into()),
//!         PathSegment::Index(0),
//!         PathSegment::Key("name".into()),
//!     ]
//! );
//! ```

use std::fmt;

/// One step of a path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Re-enter at the root resource.
    Root,
    /// Member lookup in an object.
    Key(String),
    /// Element lookup in an array.
    Index(usize),
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    /// Parses `expr` with the default `.` delimiter.
    pub fn parse(expr: &str) -> Self {
        Self::parse_with(expr, '.')
    }

    /// Parses `expr` with an explicit delimiter.
    ///
    /// A leading delimiter produces [`PathSegment::Root`]; empty segments
    /// elsewhere (doubled or trailing delimiters) are skipped.
    pub fn parse_with(expr: &str, delimiter: char) -> Self {
        let mut segments = Vec::new();
        for (i, part) in expr.split(delimiter).enumerate() {
            if part.is_empty() {
                if i == 0 && !expr.is_empty() {
                    segments.push(PathSegment::Root);
                }
                continue;
            }
            match part.parse::<usize>() {
                Ok(index) => segments.push(PathSegment::Index(index)),
                Err(_) => segments.push(PathSegment::Key(part.to_owned())),
            }
        }
        Self { segments }
    }

    /// Builds a path from pre-split segments.
    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl From<&str> for Path {
    fn from(expr: &str) -> Self {
        Self::parse(expr)
    }
}

impl From<String> for Path {
    fn from(expr: String) -> Self {
        Self::parse(&expr)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Root => write!(f, ".")?,
                PathSegment::Key(key) => {
                    if i > 0 && !matches!(self.segments[i - 1], PathSegment::Root) {
                        write!(f, ".")?;
                    }
                    write!(f, "{key}")?;
                }
                PathSegment::Index(index) => {
                    if i > 0 && !matches!(self.segments[i - 1], PathSegment::Root) {
                        write!(f, ".")?;
                    }
                    write!(f, "{index}")?;
                }
            }
        }
        Ok(())
    }
}
