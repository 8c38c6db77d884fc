//! slash-separated key path utilities. the root path is the empty string,
//! matching `store.py`'s `ROOT_PATH = ''`.

pub const ROOT: &str = "";

/// split a path into segments; the root path yields no segments
pub fn segments(path: &str) -> Vec<&str> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split('/').collect()
    }
}

/// join segments back into a path
pub fn join(segments: &[&str]) -> String {
    segments.join("/")
}

/// number of segments in a path (its "level"); root is level 0
pub fn level(path: &str) -> usize {
    segments(path).len()
}

/// split a path into (parent, name); root has no parent and returns None
///
/// mirrors dulwich's `pathsplit` as used by `store.py`'s `delete`/`_add_tree`.
pub fn split(path: &str) -> Option<(String, String)> {
    if path.is_empty() {
        return None;
    }
    match path.rfind('/') {
        Some(idx) => Some((path[..idx].to_string(), path[idx + 1..].to_string())),
        None => Some((String::new(), path.to_string())),
    }
}

/// join a parent path and a child name
pub fn child(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// every ancestor of `path`, from its immediate parent up to (and including) the root,
/// nearest first
pub fn ancestors(path: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = path.to_string();
    while let Some((parent, _)) = split(&current) {
        result.push(parent.clone());
        current = parent;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level() {
        assert_eq!(level(ROOT), 0);
        assert_eq!(level("a"), 1);
        assert_eq!(level("a/b/c"), 3);
    }

    #[test]
    fn test_split() {
        assert_eq!(split(""), None);
        assert_eq!(split("a"), Some((String::new(), "a".to_string())));
        assert_eq!(
            split("a/b/c"),
            Some(("a/b".to_string(), "c".to_string()))
        );
    }

    #[test]
    fn test_child() {
        assert_eq!(child("", "a"), "a");
        assert_eq!(child("a", "b"), "a/b");
    }

    #[test]
    fn test_ancestors() {
        assert_eq!(ancestors("a/b/c"), vec!["a/b".to_string(), "a".to_string(), "".to_string()]);
        assert_eq!(ancestors("a"), vec!["".to_string()]);
        assert!(ancestors("").is_empty());
    }
}
