//! The tools a bassclef site needs, and probes for them.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Probe {
    /// An executable on `PATH`.
    Executable(&'static str),
    /// A module `python3` can import.
    PythonModule(&'static str),
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Prerequisite {
    pub name: &'static str,
    pub probe: Probe,
    pub required: bool,
    pub homepage: &'static str,
    pub hint: Option<&'static str>,
}

pub const PYTHON: &str = "python3";

/// Everything the getting started guide asks for, in the order it asks.
pub const PREREQUISITES: &[Prerequisite] = &[
    Prerequisite {
        name: "Pandoc",
        probe: Probe::Executable("pandoc"),
        required: true,
        homepage: "http://pandoc.org/",
        hint: Some("install a recent pandoc from http://pandoc.org/installing.html"),
    },
    Prerequisite {
        name: "GNU make",
        probe: Probe::Executable("make"),
        required: false,
        homepage: "https://www.gnu.org/software/make/",
        hint: None,
    },
    Prerequisite {
        name: "Python 3",
        probe: Probe::Executable(PYTHON),
        required: false,
        homepage: "https://www.python.org/",
        hint: Some("install python 3; python 2 is not supported"),
    },
    Prerequisite {
        name: "PyYAML",
        probe: Probe::PythonModule("yaml"),
        required: false,
        homepage: "http://pyyaml.org/",
        hint: Some("install it with `pip3 install pyyaml`; use pip3, not pip"),
    },
    Prerequisite {
        name: "ImageMagick",
        probe: Probe::Executable("convert"),
        required: false,
        homepage: "https://www.imagemagick.org/",
        hint: None,
    },
    Prerequisite {
        name: "Git",
        probe: Probe::Executable("git"),
        required: false,
        homepage: "https://git-scm.com/",
        hint: None,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Status {
    Found {
        path: Option<PathBuf>,
        version: Option<String>,
    },
    Missing,
}

impl Status {
    pub fn is_found(&self) -> bool {
        matches!(self, Status::Found { .. })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Found { version: Some(version), .. } => write!(f, "found ({version})"),
            Status::Found { path: Some(path), .. } => write!(f, "found ({})", path.display()),
            Status::Found { .. } => write!(f, "found"),
            Status::Missing => write!(f, "missing"),
        }
    }
}

impl Prerequisite {
    /// Looks for the prerequisite using the process's `PATH`.
    pub fn check(&self) -> Status {
        self.check_in(std::env::var_os("PATH"))
    }

    /// Looks for the prerequisite in the directories of `path_var`.
    pub fn check_in<S: AsRef<OsStr>>(&self, path_var: Option<S>) -> Status {
        let path_var: Option<&OsStr> = path_var.as_ref().map(AsRef::as_ref);
        match self.probe {
            Probe::Executable(name) => match find_executable(name, path_var) {
                Some(path) => {
                    let version = version(&path);
                    tracing::debug!(name, path = %path.display(), ?version, "found executable");
                    Status::Found { path: Some(path), version }
                }
                None => Status::Missing,
            },
            Probe::PythonModule(module) => {
                let Some(python) = find_executable(PYTHON, path_var) else {
                    return Status::Missing;
                };

                let imported = Command::new(&python)
                    .arg("-c")
                    .arg(format!("import {module}"))
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .map_or(false, |status| status.success());

                tracing::debug!(module, imported, "probed python module");
                match imported {
                    true => Status::Found { path: None, version: None },
                    false => Status::Missing,
                }
            }
        }
    }
}

/// Checks every prerequisite, in order.
pub fn check_all() -> Vec<(&'static Prerequisite, Status)> {
    let path_var = std::env::var_os("PATH");
    PREREQUISITES.iter()
        .map(|prereq| (prereq, prereq.check_in(path_var.as_ref())))
        .collect()
}

/// Returns `true` unless a required prerequisite is missing.
pub fn satisfied(results: &[(&Prerequisite, Status)]) -> bool {
    results.iter().all(|(prereq, status)| !prereq.required || status.is_found())
}

/// Finds `name` in the directories of `path_var`, the way a shell would.
pub fn find_executable(name: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
    let file_name = match cfg!(windows) {
        true => format!("{name}.exe"),
        false => name.to_string(),
    };

    std::env::split_paths(path_var?)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(&file_name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// The first line `exe --version` prints, if it runs successfully.
fn version(exe: &Path) -> Option<String> {
    let output = Command::new(exe)
        .arg("--version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guide_order() {
        let names: Vec<_> = PREREQUISITES.iter().map(|p| p.name).collect();
        assert_eq!(names, ["Pandoc", "GNU make", "Python 3", "PyYAML", "ImageMagick", "Git"]);

        let required: Vec<_> = PREREQUISITES.iter().filter(|p| p.required).map(|p| p.name).collect();
        assert_eq!(required, ["Pandoc"]);
    }

    #[test]
    fn empty_path_finds_nothing() {
        for prereq in PREREQUISITES {
            assert_eq!(prereq.check_in(None::<&OsStr>), Status::Missing);
            assert_eq!(prereq.check_in(Some("")), Status::Missing);
        }
    }

    #[test]
    fn only_required_prerequisites_decide() {
        let found = || Status::Found { path: None, version: None };
        let [pandoc, make, ..] = PREREQUISITES else { unreachable!() };

        assert!(satisfied(&[(pandoc, found()), (make, found())]));
        assert!(satisfied(&[(pandoc, found()), (make, Status::Missing)]));
        assert!(!satisfied(&[(pandoc, Status::Missing), (make, found())]));
        assert!(satisfied(&[]));
    }

    #[test]
    fn status_display() {
        let found = Status::Found { path: None, version: Some("pandoc 3.1.9".into()) };
        assert_eq!(found.to_string(), "found (pandoc 3.1.9)");
        assert_eq!(Status::Found { path: None, version: None }.to_string(), "found");
        assert_eq!(Status::Missing.to_string(), "missing");
    }

    #[cfg(unix)]
    #[test]
    fn executables_are_found_on_path() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let bin = tempfile::tempdir().unwrap();
        let empty = tempfile::tempdir().unwrap();

        let pandoc = bin.path().join("pandoc");
        fs::write(&pandoc, "#!/bin/sh\necho 'pandoc 3.1.9'\necho 'Features: +server'\n").unwrap();
        fs::set_permissions(&pandoc, fs::Permissions::from_mode(0o755)).unwrap();

        // Present but not executable.
        fs::write(bin.path().join("make"), "").unwrap();

        let path_var = std::env::join_paths([empty.path(), bin.path()]).unwrap();
        assert_eq!(find_executable("pandoc", Some(path_var.as_os_str())), Some(pandoc.clone()));
        assert_eq!(find_executable("make", Some(path_var.as_os_str())), None);

        let status = PREREQUISITES[0].check_in(Some(&path_var));
        assert_eq!(status, Status::Found { path: Some(pandoc), version: Some("pandoc 3.1.9".into()) });
        assert_eq!(PREREQUISITES[1].check_in(Some(&path_var)), Status::Missing);
    }
}
