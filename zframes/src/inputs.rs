//! Input expansion and small shared file helpers.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::bail;

/// Expand input patterns into a deduplicated list of files with one of
/// `extensions`.
///
/// Glob matches are sorted by path, so `frame_*.png` comes out in frame order.
/// Plain paths keep the order they were given in and are accepted whatever
/// their extension.
pub fn expand_inputs(patterns: &[String], extensions: &[&str]) -> anyhow::Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for pattern in patterns {
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let mut matched: Vec<PathBuf> = glob::glob(pattern)?
                .filter_map(Result::ok)
                .filter(|p| p.is_file() && has_extension(p, extensions))
                .collect();
            matched.sort();
            for path in matched {
                push_unique(path, &mut seen, &mut files);
            }
        } else {
            let path = PathBuf::from(pattern);
            if !path.is_file() {
                bail!("not a file: {}", path.display());
            }
            push_unique(path, &mut seen, &mut files);
        }
    }

    Ok(files)
}

fn push_unique(path: PathBuf, seen: &mut HashSet<PathBuf>, files: &mut Vec<PathBuf>) {
    if let Ok(canonical) = path.canonicalize() {
        if seen.insert(canonical) {
            files.push(path);
        }
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|want| ext.eq_ignore_ascii_case(want)))
}

/// Refuse to clobber an existing file unless `force` is set.
pub fn check_writable(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} exists (use --force to overwrite)", path.display());
    }
    Ok(())
}

/// Human-readable byte count: bytes below 1 KiB, then KB and MB with one
/// decimal (1024-based).
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fresh directory under the system temp dir, removed on drop.
    struct Scratch(PathBuf);

    impl Scratch {
        fn new(name: &str) -> Self {
            let dir = std::env::temp_dir().join(format!("zframes-{}-{name}", std::process::id()));
            let _ = std::fs::remove_dir_all(&dir);
            std::fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        fn touch(&self, name: &str) -> PathBuf {
            let path = self.0.join(name);
            std::fs::write(&path, b"x").unwrap();
            path
        }

        fn pattern(&self, glob: &str) -> String {
            self.0.join(glob).to_string_lossy().into_owned()
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn extension_match_ignores_case() {
        assert!(has_extension(Path::new("a.webp"), &["webp"]));
        assert!(has_extension(Path::new("dir/A.WEBP"), &["webp"]));
        assert!(has_extension(Path::new("b.Png"), &["webp", "png"]));
        assert!(!has_extension(Path::new("a.webp.bak"), &["webp"]));
        assert!(!has_extension(Path::new("webp"), &["webp"]));
        assert!(!has_extension(Path::new("a.png"), &[]));
    }

    #[test]
    fn glob_filters_by_extension_and_sorts() {
        let dir = Scratch::new("filter");
        dir.touch("frame_2.png");
        dir.touch("frame_1.PNG");
        dir.touch("frame_3.txt");

        let files = expand_inputs(&[dir.pattern("frame_*")], &["png"]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["frame_1.PNG", "frame_2.png"]);
    }

    #[test]
    fn same_file_is_listed_once() {
        let dir = Scratch::new("dedup");
        let a = dir.touch("a.webp");
        dir.touch("b.webp");

        let plain = a.to_string_lossy().into_owned();
        let patterns = [plain.clone(), dir.pattern("*.webp"), plain];
        let files = expand_inputs(&patterns, &["webp"]).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0], a);
        assert!(files[1].ends_with("b.webp"));
    }

    #[test]
    fn plain_paths_skip_the_filter_but_must_exist() {
        let dir = Scratch::new("plain");
        let other = dir.touch("notes.txt");
        let files = expand_inputs(&[other.to_string_lossy().into_owned()], &["webp"]).unwrap();
        assert_eq!(files, [other]);

        let missing = dir.pattern("missing.webp");
        assert!(expand_inputs(&[missing], &["webp"]).is_err());
    }

    #[test]
    fn sizes_pick_a_unit() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn existing_output_needs_force() {
        let dir = Scratch::new("force");
        let out = dir.touch("out.webp");
        assert!(check_writable(&out, false).is_err());
        assert!(check_writable(&out, true).is_ok());
        assert!(check_writable(&dir.0.join("new.webp"), false).is_ok());
    }
}
