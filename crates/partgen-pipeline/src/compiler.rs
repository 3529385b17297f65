use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use tracing::{debug, info};

/// Environment variable naming the OpenSCAD binary.
pub const OPENSCAD_ENV: &str = "OPENSCAD";

#[cfg(windows)]
const BINARY_NAMES: &[&str] = &["openscad.exe", "openscad.com"];
#[cfg(not(windows))]
const BINARY_NAMES: &[&str] = &["openscad"];

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("OpenSCAD not found (looked in: {}); install it or set OPENSCAD", display_paths(.searched))]
    NotFound { searched: Vec<PathBuf> },
    #[error("run {program:?}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("remove stale mesh {path:?}")]
    ClearOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("OpenSCAD exited with {status}:\n{stderr}")]
    Failed { status: ExitStatus, stderr: String },
    #[error("OpenSCAD reported success but wrote no mesh at {path:?}")]
    MissingOutput { path: PathBuf },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn common_locations() -> Vec<PathBuf> {
    let mut out: Vec<PathBuf> = [
        "/usr/bin/openscad",
        "/usr/local/bin/openscad",
        "/opt/homebrew/bin/openscad",
        "/snap/bin/openscad",
        "/Applications/OpenSCAD.app/Contents/MacOS/OpenSCAD",
        r"C:\Program Files\OpenSCAD\openscad.exe",
        r"C:\Program Files (x86)\OpenSCAD\openscad.exe",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();
    if let Some(local) = std::env::var_os("LOCALAPPDATA") {
        out.push(
            PathBuf::from(local)
                .join("Programs")
                .join("OpenSCAD")
                .join("openscad.exe"),
        );
    }
    out
}

/// Finds the compiler: `explicit`, then `$OPENSCAD`, then `$PATH`, then the
/// usual install locations.
pub fn locate_openscad(explicit: Option<&Path>) -> Result<PathBuf, CompileError> {
    locate_with(
        explicit,
        std::env::var_os(OPENSCAD_ENV),
        std::env::var_os("PATH"),
        &common_locations(),
    )
}

/// [`locate_openscad`] with the environment passed in.
///
/// An explicit path is authoritative: if it is not a file the search stops
/// there instead of silently picking some other binary.
pub fn locate_with(
    explicit: Option<&Path>,
    env_value: Option<OsString>,
    path_var: Option<OsString>,
    fallbacks: &[PathBuf],
) -> Result<PathBuf, CompileError> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(CompileError::NotFound {
                searched: vec![path.to_path_buf()],
            })
        };
    }

    let mut searched = Vec::new();
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(value) = env_value.filter(|v| !v.is_empty()) {
        candidates.push(PathBuf::from(value));
    }
    if let Some(path_var) = path_var {
        for dir in std::env::split_paths(&path_var) {
            for name in BINARY_NAMES {
                candidates.push(dir.join(name));
            }
        }
    }
    candidates.extend(fallbacks.iter().cloned());

    for candidate in candidates {
        if candidate.is_file() {
            debug!(path = ?candidate, "found OpenSCAD");
            return Ok(candidate);
        }
        searched.push(candidate);
    }
    Err(CompileError::NotFound { searched })
}

#[derive(Debug, Clone)]
pub struct ScadCompiler {
    program: PathBuf,
}

impl ScadCompiler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn locate(explicit: Option<&Path>) -> Result<Self, CompileError> {
        locate_openscad(explicit).map(Self::new)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Runs `openscad -o <mesh> <scad>` and waits for it. A mesh left over
    /// from an earlier run is removed first.
    pub fn compile(&self, scad: &Path, mesh: &Path) -> Result<(), CompileError> {
        match std::fs::remove_file(mesh) {
            Ok(()) => debug!(path = ?mesh, "removed stale mesh"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(CompileError::ClearOutput {
                    path: mesh.to_path_buf(),
                    source,
                })
            }
        }

        debug!(program = ?self.program, scad = ?scad, mesh = ?mesh, "compiling");
        let output = Command::new(&self.program)
            .arg("-o")
            .arg(mesh)
            .arg(scad)
            .output()
            .map_err(|source| CompileError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CompileError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if !mesh.is_file() {
            return Err(CompileError::MissingOutput {
                path: mesh.to_path_buf(),
            });
        }
        info!(mesh = ?mesh, "mesh written");
        Ok(())
    }
}
