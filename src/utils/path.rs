use std::env;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use log::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Other,
}

/// Resolves a program name the way exec would: names containing a `/` are
/// used as given, anything else is searched for in `PATH`.
pub fn resolve_program(program: &str) -> Option<PathBuf> {
    if program.contains('/') {
        return Some(PathBuf::from(program));
    }

    let env_path = match env::var("PATH") {
        Ok(x) => x,
        Err(e) => {
            error!("rshell: error with env PATH: {:?}", e);
            return None;
        }
    };
    find_file_in_path(program, &env_path)
}

/// Searches a colon-separated directory list for an executable file.
pub fn find_file_in_path(filename: &str, search_path: &str) -> Option<PathBuf> {
    if filename.is_empty() {
        return None;
    }

    for dir in search_path.split(':').filter(|dir| !dir.is_empty()) {
        let candidate = Path::new(dir).join(filename);
        let metadata = match fs::metadata(&candidate) {
            Ok(x) => x,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    debug!("rshell: skipping {}: {}", candidate.display(), e);
                }
                continue;
            }
        };

        let mode = metadata.permissions().mode();
        if metadata.is_file() && mode & 0o111 != 0 {
            return Some(candidate);
        }
    }
    None
}

/// Existence and type of `path`, following symlinks.
pub fn file_kind(path: &str) -> Option<FileKind> {
    let metadata = fs::metadata(path).ok()?;
    Some(if metadata.is_file() {
        FileKind::File
    } else if metadata.is_dir() {
        FileKind::Directory
    } else {
        FileKind::Other
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn test_find_file_in_path() {
        let found = find_file_in_path("sh", "/nonexistent:/bin:/usr/bin");
        assert!(found.is_some_and(|path| path.ends_with("sh")));
        assert!(find_file_in_path("no-such-program-here", "/bin:/usr/bin").is_none());
        assert!(find_file_in_path("sh", "").is_none());
        assert!(find_file_in_path("", "/bin").is_none());
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_non_executable_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("script")).unwrap();
        let search = dir.path().to_str().unwrap();
        assert!(find_file_in_path("script", search).is_none());

        let mut permissions = fs::metadata(dir.path().join("script")).unwrap().permissions();
        permissions.set_mode(0o755);
        fs::set_permissions(dir.path().join("script"), permissions).unwrap();
        assert_eq!(
            find_file_in_path("script", search),
            Some(dir.path().join("script"))
        );
    }

    #[test]
    fn test_paths_bypass_search() {
        assert_eq!(
            resolve_program("./local/tool"),
            Some(PathBuf::from("./local/tool"))
        );
    }

    #[allow(clippy::unwrap_used)]
    #[test]
    fn test_file_kind() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file.txt");
        File::create(&file).unwrap();

        assert_eq!(file_kind(file.to_str().unwrap()), Some(FileKind::File));
        assert_eq!(
            file_kind(dir.path().to_str().unwrap()),
            Some(FileKind::Directory)
        );
        assert_eq!(file_kind("/no/such/path"), None);
    }
}
