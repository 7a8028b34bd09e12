use std::path::{Component, Path, PathBuf};

/// Returns the 1-based line number of the byte at `offset` in `text`.
///
/// ```
/// use bassclef::util::line_of;
///
/// assert_eq!(line_of("a\nb\nc", 0), 1);
/// assert_eq!(line_of("a\nb\nc", 2), 2);
/// assert_eq!(line_of("a\nb\nc", 100), 3);
/// ```
pub fn line_of(text: &str, offset: usize) -> usize {
    let end = offset.min(text.len());
    memchr::memchr_iter(b'\n', &text.as_bytes()[..end]).count() + 1
}

/// Normalizes a link reference label for matching: case folded, with runs
/// of whitespace collapsed to one space and the ends trimmed.
pub fn normalize_label(label: &str) -> String {
    label.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lexically resolves `.` and `..` components without touching the file
/// system. `..` at the root (or at the start of a relative path) is kept.
///
/// ```
/// use std::path::Path;
/// use bassclef::util::normalize_path;
///
/// assert_eq!(normalize_path("docs/./a/../b.md"), Path::new("docs/b.md"));
/// assert_eq!(normalize_path("../b.md"), Path::new("../b.md"));
/// assert_eq!(normalize_path("/x/../../y"), Path::new("/y"));
/// ```
pub fn normalize_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let mut components: Vec<Component<'_>> = vec![];
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => { components.pop(); }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            _ => components.push(component),
        }
    }

    components.iter().map(|c| c.as_os_str()).collect()
}

/// Returns `true` if `file_name` names a markdown document.
pub fn is_markdown(file_name: &str) -> bool {
    matches!(file_name.rsplit_once('.'), Some((_, "md" | "mdown" | "markdown")))
}
