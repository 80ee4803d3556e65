//! Directory tree view of a FileSet
//!
//! Rebuilt from scratch on every FileSet change. Sorting happens once, after
//! the whole tree is built, so the result does not depend on the order in
//! which paths arrived.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::fileset::{FileSet, STATUS_LOG_PATH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DirectoryNode {
    File {
        path: String,
        content: String,
    },
    Directory {
        name: String,
        path: String,
        children: Vec<DirectoryNode>,
    },
}

impl DirectoryNode {
    /// Last path segment for files, the directory name otherwise.
    pub fn name(&self) -> &str {
        match self {
            DirectoryNode::File { path, .. } => path.rsplit('/').next().unwrap_or(path),
            DirectoryNode::Directory { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            DirectoryNode::File { path, .. } | DirectoryNode::Directory { path, .. } => path,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, DirectoryNode::Directory { .. })
    }

    pub fn children(&self) -> &[DirectoryNode] {
        match self {
            DirectoryNode::Directory { children, .. } => children,
            DirectoryNode::File { .. } => &[],
        }
    }
}

/// Build the navigation tree for `files`. The status log is not listed.
pub fn build_tree(files: &FileSet) -> Vec<DirectoryNode> {
    let mut roots: Vec<DirectoryNode> = Vec::new();

    for file in files.iter().filter(|f| f.path() != STATUS_LOG_PATH) {
        let segments: Vec<&str> = file.path().split('/').collect();
        let (dirs, _leaf) = segments.split_at(segments.len() - 1);

        let mut level = &mut roots;
        let mut prefix = String::new();
        for dir in dirs {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(dir);
            level = child_directory(level, dir, &prefix);
        }

        level.push(DirectoryNode::File {
            path: file.path().to_string(),
            content: file.content().to_string(),
        });
    }

    sort_nodes(&mut roots);
    roots
}

/// Find or create the directory `name` among `level`, returning its children.
fn child_directory<'t>(
    level: &'t mut Vec<DirectoryNode>,
    name: &str,
    path: &str,
) -> &'t mut Vec<DirectoryNode> {
    let existing = level
        .iter()
        .position(|n| matches!(n, DirectoryNode::Directory { name: d, .. } if d == name));

    let idx = match existing {
        Some(i) => i,
        None => {
            level.push(DirectoryNode::Directory {
                name: name.to_string(),
                path: path.to_string(),
                children: Vec::new(),
            });
            level.len() - 1
        }
    };

    match &mut level[idx] {
        DirectoryNode::Directory { children, .. } => children,
        DirectoryNode::File { .. } => unreachable!("position matched a directory"),
    }
}

fn sort_nodes(nodes: &mut [DirectoryNode]) {
    nodes.sort_by(compare_nodes);
    for node in nodes.iter_mut() {
        if let DirectoryNode::Directory { children, .. } = node {
            sort_nodes(children);
        }
    }
}

/// Directories first; among files dotfiles first; then by name.
fn compare_nodes(a: &DirectoryNode, b: &DirectoryNode) -> Ordering {
    match (a.is_directory(), b.is_directory()) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }

    if !a.is_directory() {
        let a_dot = a.name().starts_with('.');
        let b_dot = b.name().starts_with('.');
        if a_dot != b_dot {
            return if a_dot {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
    }

    a.name().cmp(b.name()).then_with(|| a.path().cmp(b.path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(nodes: &[DirectoryNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name()).collect()
    }

    #[test]
    fn test_directories_before_files() {
        let files = FileSet::from_entries([("x/b.ts", "b"), ("x/a.ts", "a"), ("y.ts", "y")]);
        let tree = build_tree(&files);

        assert_eq!(names(&tree), vec!["x", "y.ts"]);
        assert!(tree[0].is_directory());
        assert_eq!(tree[0].path(), "x");
        assert_eq!(names(tree[0].children()), vec!["a.ts", "b.ts"]);
        assert_eq!(tree[0].children()[0].path(), "x/a.ts");
    }

    #[test]
    fn test_dotfiles_sort_first_among_files() {
        let files = FileSet::from_entries([
            ("b.ts", ""),
            (".gitignore", ""),
            ("a.ts", ""),
            ("src/index.ts", ""),
        ]);
        let tree = build_tree(&files);
        assert_eq!(names(&tree), vec!["src", ".gitignore", "a.ts", "b.ts"]);
    }

    #[test]
    fn test_order_independent() {
        let paths = [
            "src/components/Button.tsx",
            "src/App.tsx",
            "package.json",
            ".env",
            "src/types/index.ts",
            "public/index.html",
        ];
        let forward = FileSet::from_entries(paths.iter().map(|p| (*p, "c")));
        let reversed = FileSet::from_entries(paths.iter().rev().map(|p| (*p, "c")));

        let a = build_tree(&forward);
        assert_eq!(a, build_tree(&reversed));
        assert_eq!(a, build_tree(&forward));
        assert_eq!(names(&a), vec!["public", "src", ".env", "package.json"]);
        assert_eq!(names(a[1].children()), vec!["components", "types", "App.tsx"]);
    }

    #[test]
    fn test_status_log_hidden() {
        let files = FileSet::from_entries([("status.log", "busy"), ("a.ts", "")]);
        assert_eq!(names(&build_tree(&files)), vec!["a.ts"]);
    }

    #[test]
    fn test_deep_nesting_paths() {
        let files = FileSet::from_entries([("a/b/c/d.ts", "")]);
        let tree = build_tree(&files);
        let c = &tree[0].children()[0].children()[0];
        assert_eq!(c.path(), "a/b/c");
        assert_eq!(c.children()[0].path(), "a/b/c/d.ts");
    }
}
