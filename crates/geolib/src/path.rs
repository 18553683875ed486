//! Scene-graph location path helpers.
//!
//! Paths are absolute, `/`-separated, and never end in `/` (except the bare `/`).

/// Parent of `path`, or `None` for top-level and empty paths.
pub fn parent(path: &str) -> Option<&str> {
	let idx = path.rfind('/')?;
	if idx == 0 { None } else { Some(&path[..idx]) }
}

/// Last path segment.
pub fn leaf_name(path: &str) -> &str {
	path.rsplit('/').next().unwrap_or(path)
}

/// Joins a parent path and a child name.
pub fn join(parent: &str, child: &str) -> String {
	let mut out = String::with_capacity(parent.len() + child.len() + 1);
	out.push_str(parent.trim_end_matches('/'));
	out.push('/');
	out.push_str(child);
	out
}

/// True if `ancestor` is a strict ancestor of `path`.
pub fn is_ancestor(ancestor: &str, path: &str) -> bool {
	path.len() > ancestor.len() && path.starts_with(ancestor) && path.as_bytes()[ancestor.len()] == b'/'
}

/// True if `path` equals `root` or lies below it.
pub fn is_at_or_below(root: &str, path: &str) -> bool {
	root == path || is_ancestor(root, path)
}

/// Name of the child of `ancestor` on the way down to `path`.
///
/// Requires `is_ancestor(ancestor, path)`.
pub fn child_towards<'a>(ancestor: &str, path: &'a str) -> Option<&'a str> {
	if !is_ancestor(ancestor, path) {
		return None;
	}
	let rest = &path[ancestor.len() + 1..];
	rest.split('/').next()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parent_and_leaf() {
		assert_eq!(parent("/root/world/geo"), Some("/root/world"));
		assert_eq!(parent("/root"), None);
		assert_eq!(leaf_name("/root/world/geo"), "geo");
		assert_eq!(join("/root", "a"), "/root/a");
	}

	#[test]
	fn test_ancestry_respects_segment_boundaries() {
		assert!(is_ancestor("/root", "/root/a"));
		assert!(!is_ancestor("/root", "/rootless"));
		assert!(!is_ancestor("/root", "/root"));
		assert!(is_at_or_below("/root", "/root"));
		assert_eq!(child_towards("/root", "/root/a/b"), Some("a"));
		assert_eq!(child_towards("/root/a", "/root/b"), None);
	}
}
