use serde::Serialize;

/// One node of a navigation tree. A node is simultaneously a menu entry
/// and a permission surface: its own path and every descendant path count
/// as allowed for the principal the tree was built for.
#[derive(Debug, Clone, Serialize)]
pub struct NavNode {
    name: String,
    path: Option<String>,
    children: Vec<NavNode>,
}

impl NavNode {
    pub fn new(name: impl Into<String>, path: Option<&str>) -> Self {
        Self {
            name: name.into(),
            path: path.map(str::to_string),
            children: Vec::new(),
        }
    }

    /// Raw name as declared. Human rendering is the display-name
    /// resolver's concern; see [`NameResolver`].
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn children(&self) -> &[NavNode] {
        &self.children
    }

    /// Append a child node. `build` receives the fresh child to declare
    /// nested menus or items before it is attached.
    pub fn add_child(
        &mut self,
        name: impl Into<String>,
        path: Option<&str>,
        build: impl FnOnce(&mut NavNode),
    ) {
        let mut child = NavNode::new(name, path);
        build(&mut child);
        self.children.push(child);
    }

    /// Append a leaf child with a path and no sub-items.
    pub fn add_item(&mut self, name: impl Into<String>, path: &str) {
        self.children.push(NavNode::new(name, Some(path)));
    }

    /// Own path plus every descendant's path, first occurrence wins.
    pub fn contributed_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_paths(&mut paths);
        paths
    }

    fn collect_paths(&self, out: &mut Vec<String>) {
        if let Some(path) = &self.path {
            if !out.iter().any(|p| p == path) {
                out.push(path.clone());
            }
        }
        for child in &self.children {
            child.collect_paths(out);
        }
    }

    /// Canonical menu key for this node: lower-cased, runs of
    /// non-alphanumeric characters collapsed to a single `-`, no leading
    /// or trailing separator.
    pub fn stable_id(&self) -> String {
        let mut id = String::with_capacity(self.name.len());
        let mut pending_sep = false;
        for c in self.name.chars() {
            if c.is_alphanumeric() {
                if pending_sep && !id.is_empty() {
                    id.push('-');
                }
                pending_sep = false;
                id.extend(c.to_lowercase());
            } else {
                pending_sep = true;
            }
        }
        id
    }

    /// Human label via the resolver, falling back to the raw name.
    pub fn label(&self, resolver: &dyn NameResolver) -> String {
        resolver
            .resolve(&self.stable_id())
            .unwrap_or_else(|| self.name.clone())
    }
}

/// External display-name lookup (translation, humanization). The core
/// stores raw names and stable ids only.
pub trait NameResolver {
    /// A label for the given stable id, or `None` to fall back to the
    /// raw name.
    fn resolve(&self, id: &str) -> Option<String>;
}
