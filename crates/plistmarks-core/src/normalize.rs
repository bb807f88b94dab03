// Maps the generic plist tree onto typed bookmark nodes.
// Field declaration order below is the JSON emission order.
use serde::Serialize;
use tracing::debug;

use crate::error::EncodeError;
use crate::value::{Dictionary, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BookmarkNode {
    #[serde(rename = "Title", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "URLString", skip_serializing_if = "Option::is_none")]
    pub url_string: Option<String>,
    #[serde(rename = "WebBookmarkType", skip_serializing_if = "Option::is_none")]
    pub bookmark_type: Option<String>,
    #[serde(rename = "WebBookmarkUUID", skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(rename = "URIDictionary", skip_serializing_if = "Option::is_none")]
    pub uri_dictionary: Option<UriDictionary>,
    #[serde(rename = "Children", skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<BookmarkNode>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UriDictionary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl BookmarkNode {
    /// Any node carrying a `Children` sequence, even an empty one.
    pub fn is_folder(&self) -> bool {
        self.children.is_some()
    }

    /// `Title`, falling back to `URIDictionary.title`.
    pub fn display_title(&self) -> Option<&str> {
        self.title.as_deref().or_else(|| {
            self.uri_dictionary
                .as_ref()
                .and_then(|u| u.title.as_deref())
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    pub folders: usize,
    pub leaves: usize,
    pub max_depth: usize,
}

// One open dictionary on the walk stack.
struct Frame<'v> {
    path: String,
    node: BookmarkNode,
    children: Option<&'v [Value]>,
    next: usize,
    built: Vec<BookmarkNode>,
}

impl<'v> Frame<'v> {
    fn open(dict: &'v Dictionary, path: String) -> Result<Self, EncodeError> {
        let uri_dictionary = match dict.get("URIDictionary") {
            None => None,
            Some(Value::Dictionary(d)) => Some(UriDictionary {
                title: string_field(d, "title", &format!("{path}/URIDictionary"))?,
            }),
            Some(other) => {
                return Err(EncodeError::unexpected(
                    &path,
                    "URIDictionary",
                    "dictionary",
                    other.kind(),
                ));
            }
        };
        let children = match dict.get("Children") {
            None => None,
            Some(Value::Array(items)) => Some(items.as_slice()),
            Some(other) => {
                return Err(EncodeError::unexpected(
                    &path,
                    "Children",
                    "array",
                    other.kind(),
                ));
            }
        };
        let node = BookmarkNode {
            title: string_field(dict, "Title", &path)?,
            url_string: string_field(dict, "URLString", &path)?,
            bookmark_type: string_field(dict, "WebBookmarkType", &path)?,
            uuid: string_field(dict, "WebBookmarkUUID", &path)?,
            uri_dictionary,
            children: None,
        };
        Ok(Self {
            path,
            node,
            children,
            next: 0,
            built: Vec::with_capacity(children.map_or(0, <[Value]>::len)),
        })
    }

    fn next_child(&mut self) -> Option<(usize, &'v Value)> {
        let child = self.children?.get(self.next)?;
        self.next += 1;
        Some((self.next - 1, child))
    }

    fn finish(self) -> BookmarkNode {
        let mut node = self.node;
        if self.children.is_some() {
            node.children = Some(self.built);
        }
        node
    }
}

fn string_field(
    dict: &Dictionary,
    field: &'static str,
    path: &str,
) -> Result<Option<String>, EncodeError> {
    match dict.get(field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(
            other @ (Value::Integer(_)
            | Value::Real(_)
            | Value::Boolean(_)
            | Value::Date(_)
            | Value::Data(_)
            | Value::Uid(_)
            | Value::Array(_)
            | Value::Dictionary(_)),
        ) => Err(EncodeError::unexpected(path, field, "string", other.kind())),
    }
}

/// Depth-first walk with an explicit stack; children keep source order.
pub fn normalize(root: &Value) -> Result<BookmarkNode, EncodeError> {
    let dict = root
        .as_dictionary()
        .ok_or_else(|| EncodeError::unexpected("", "root", "dictionary", root.kind()))?;

    let mut stack = vec![Frame::open(dict, String::new())?];
    let mut finished = None;
    let mut visited = 1usize;
    while let Some(frame) = stack.last_mut() {
        if let Some((index, child)) = frame.next_child() {
            let path = format!("{}/Children/{index}", frame.path);
            let dict = child.as_dictionary().ok_or_else(|| {
                EncodeError::unexpected(&path, "Children entry", "dictionary", child.kind())
            })?;
            stack.push(Frame::open(dict, path)?);
            visited += 1;
        } else if let Some(done) = stack.pop() {
            let node = done.finish();
            match stack.last_mut() {
                Some(parent) => parent.built.push(node),
                None => finished = Some(node),
            }
        }
    }
    debug!(nodes = visited, "normalized bookmark tree");
    Ok(finished.unwrap_or_default())
}

/// Counts folders and leaves below the root (the root itself is not counted).
pub fn summarize(root: &BookmarkNode) -> TreeStats {
    let mut stats = TreeStats::default();
    let mut pending: Vec<(&BookmarkNode, usize)> = root
        .children
        .iter()
        .flatten()
        .map(|c| (c, 1))
        .collect();
    while let Some((node, depth)) = pending.pop() {
        stats.max_depth = stats.max_depth.max(depth);
        match &node.children {
            Some(children) => {
                stats.folders += 1;
                pending.extend(children.iter().map(|c| (c, depth + 1)));
            }
            None => stats.leaves += 1,
        }
    }
    stats
}
