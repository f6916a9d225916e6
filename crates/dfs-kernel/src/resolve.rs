//! Path resolution.
//!
//! A resolved path is the session's directory stack joined root first, each
//! segment followed by `/`, with the item name appended. Resolution is pure
//! and performs no `..` normalization; [`escapes_root`] is the optional
//! lexical containment check applied when the manager is confined.
//!
//! Anything that compares two paths (lock keys, containment) goes through
//! [`normalize`] first, so `root/./f.txt` and `root/d/../f.txt` name the same
//! thing as `root/f.txt`.

use crate::session::Session;

/// Resolve `item` against the session's working directory.
///
/// An empty `item` yields the directory itself (with a trailing `/`).
pub fn resolve(session: &Session, item: &str) -> String {
    let mut path = working_directory(session);
    path.push_str(item);
    path
}

/// The session's working directory, e.g. `FileSystemDir/docs/`.
pub fn working_directory(session: &Session) -> String {
    join_dirs(session.dirs())
}

fn join_dirs(dirs: &[String]) -> String {
    let len = dirs.iter().map(|d| d.len() + 1).sum();
    let mut path = String::with_capacity(len);
    for dir in dirs {
        path.push_str(dir);
        path.push('/');
    }
    path
}

/// Whether `item`, taken from the session's working directory, would leave
/// the root segment.
///
/// Absolute names always escape. Otherwise every segment below the root
/// (stack entries first, then the item) is walked lexically.
pub fn escapes_root(session: &Session, item: &str) -> bool {
    if item.starts_with('/') || item.starts_with('\\') {
        return true;
    }

    let below_root = session.dirs().iter().skip(1).map(String::as_str);
    let mut depth: usize = 0;
    for segment in below_root.chain(std::iter::once(item)) {
        for component in segment.split('/') {
            match component {
                "" | "." => {}
                ".." => match depth.checked_sub(1) {
                    Some(d) => depth = d,
                    None => return true,
                },
                _ => depth += 1,
            }
        }
    }
    false
}

/// Lexically normalized form of a resolved path.
///
/// Empty and `.` segments are dropped and each `..` cancels the segment
/// before it. A `..` with nothing left to cancel is kept. The result has no
/// leading or trailing `/`.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ => parts.push(".."),
            },
            _ => parts.push(component),
        }
    }
    parts.join("/")
}

/// Whether `path` lies inside (or is) the directory `dir`, compared by
/// normalized path components rather than raw string prefix: `root/ab` is
/// not inside `root/a`, `root/./a/f` is.
pub fn is_within(path: &str, dir: &str) -> bool {
    let path = normalize(path);
    let dir = normalize(dir);
    let mut inner = path.split('/').filter(|c| !c.is_empty());
    dir.split('/')
        .filter(|c| !c.is_empty())
        .all(|c| inner.next() == Some(c))
}

/// Whether `target` is the directory `cwd` itself or one of its ancestors.
///
/// A target made only of `..` segments lies above every resolved path.
pub fn encloses(target: &str, cwd: &str) -> bool {
    let normalized = normalize(target);
    normalized.split('/').all(|c| c.is_empty() || c == "..") || is_within(cwd, &normalized)
}
