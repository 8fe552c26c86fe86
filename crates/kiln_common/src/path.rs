//! Lexical path normalization shared by canonical IDs and module resolution.
//!
//! All functions here operate on strings, never on the filesystem, so the
//! same source tree produces the same identities on every platform.

/// Splits a normalized path into its root (`/`, `C:/` or empty) and the rest.
fn split_root(path: &str) -> (&str, &str) {
    if let Some(rest) = path.strip_prefix('/') {
        return ("/", rest);
    }
    let bytes = path.as_bytes();
    if bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'/' {
        return (&path[..3], &path[3..]);
    }
    ("", path)
}

/// Normalizes a path lexically.
///
/// Backslashes become forward slashes, empty and `.` segments are dropped,
/// and `..` pops the previous segment. A `..` that climbs above the root of
/// an absolute path is discarded; on a relative path it is kept.
pub fn normalize_path(path: &str) -> String {
    let slashed = path.replace('\\', "/");
    let (root, rest) = split_root(&slashed);
    let mut segments: Vec<&str> = Vec::new();
    for segment in rest.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if root.is_empty() => segments.push(".."),
                _ => {}
            },
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if root.is_empty() && joined.is_empty() {
        ".".to_string()
    } else {
        format!("{root}{joined}")
    }
}

/// Returns `true` if the path is absolute (`/x` or `C:/x` after normalization).
pub fn is_absolute(path: &str) -> bool {
    let slashed = path.replace('\\', "/");
    !split_root(&slashed).0.is_empty()
}

/// Joins `path` onto `base` unless `path` is already absolute, then normalizes.
pub fn join(base: &str, path: &str) -> String {
    if is_absolute(path) {
        normalize_path(path)
    } else {
        normalize_path(&format!("{base}/{path}"))
    }
}

/// Expresses `path` relative to `base`.
///
/// Relative inputs are resolved against `base` first. When the two paths
/// have different roots no relative form exists and the normalized `path`
/// is returned unchanged.
pub fn relative_to(path: &str, base: &str) -> String {
    let base = normalize_path(base);
    let path = join(&base, path);
    let (path_root, path_rest) = split_root(&path);
    let (base_root, base_rest) = split_root(&base);
    if path_root != base_root {
        return path;
    }

    let path_segments: Vec<&str> = path_rest.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    let base_segments: Vec<&str> = base_rest.split('/').filter(|s| !s.is_empty() && *s != ".").collect();
    let common = path_segments
        .iter()
        .zip(base_segments.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out: Vec<&str> = Vec::new();
    out.extend(std::iter::repeat("..").take(base_segments.len() - common));
    out.extend(&path_segments[common..]);
    if out.is_empty() {
        ".".to_string()
    } else {
        out.join("/")
    }
}

/// Returns the directory portion of a normalized file path.
pub fn parent(path: &str) -> String {
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
        None => ".".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_dot_segments() {
        assert_eq!(normalize_path("/a/./b/../c.ts"), "/a/c.ts");
        assert_eq!(normalize_path("a//b/"), "a/b");
        assert_eq!(normalize_path("./"), ".");
    }

    #[test]
    fn converts_backslashes() {
        assert_eq!(normalize_path("C:\\src\\user.ts"), "C:/src/user.ts");
        assert!(is_absolute("C:\\src\\user.ts"));
    }

    #[test]
    fn parent_dirs_above_root() {
        assert_eq!(normalize_path("/../a"), "/a");
        assert_eq!(normalize_path("../a/../../b"), "../../b");
    }

    #[test]
    fn absolute_detection() {
        assert!(is_absolute("/x"));
        assert!(!is_absolute("x/y"));
        assert!(!is_absolute("./x"));
    }

    #[test]
    fn relative_inside_base() {
        assert_eq!(relative_to("/repo/src/user.ts", "/repo"), "src/user.ts");
        assert_eq!(relative_to("src/user.ts", "/repo"), "src/user.ts");
    }

    #[test]
    fn relative_outside_base() {
        assert_eq!(relative_to("/repo/lib/a.ts", "/repo/src"), "../lib/a.ts");
    }

    #[test]
    fn relative_with_different_roots() {
        assert_eq!(relative_to("D:/x.ts", "C:/repo"), "D:/x.ts");
    }

    #[test]
    fn parent_of_paths() {
        assert_eq!(parent("/repo/src/a.ts"), "/repo/src");
        assert_eq!(parent("a.ts"), ".");
        assert_eq!(parent("/a.ts"), "/");
    }
}
