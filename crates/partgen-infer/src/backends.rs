use crate::inferrer::{InferenceRequest, VisionModel};
use crate::prompt::compose_prompt;
use crate::views::ViewImage;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tracing::{debug, warn};

/// Delegates to an external program. The prepared views are written as PNG
/// files whose paths are appended to its arguments, the prompt arrives on
/// stdin, and stdout is the answer.
#[derive(Debug, Clone)]
pub struct CommandModel {
    program: PathBuf,
    args: Vec<String>,
    scratch: PathBuf,
}

impl CommandModel {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            scratch: std::env::temp_dir().join(format!("partgen-views-{}", std::process::id())),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    /// Directory the prepared views are written to before each call.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch = dir.into();
        self
    }

    fn stage_views(&self, views: &[ViewImage]) -> Result<Vec<PathBuf>, String> {
        std::fs::create_dir_all(&self.scratch)
            .map_err(|e| format!("create {:?}: {e}", self.scratch))?;
        views
            .iter()
            .map(|view| {
                let path = self.scratch.join(format!("{}.png", view.label));
                std::fs::write(&path, &view.png).map_err(|e| format!("write {path:?}: {e}"))?;
                Ok(path)
            })
            .collect()
    }

    fn run(&self, staged: &[PathBuf], prompt: &str, attempt: usize) -> Result<String, String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .args(staged)
            .env("PARTGEN_ATTEMPT", attempt.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!(program = ?self.program, attempt, "spawning model command");

        let mut child = cmd
            .spawn()
            .map_err(|e| format!("spawn {:?}: {e}", self.program))?;
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(prompt.as_bytes()) {
                drop(stdin);
                reap(&mut child);
                return Err(format!("write prompt to {:?}: {e}", self.program));
            }
        }
        let output = child
            .wait_with_output()
            .map_err(|e| format!("wait for {:?}: {e}", self.program))?;

        if !output.status.success() {
            return Err(format!(
                "{:?} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        String::from_utf8(output.stdout)
            .map_err(|_| format!("{:?} printed non UTF-8 output", self.program))
    }
}

fn reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!(error = %e, "model command already exited");
    }
    if let Err(e) = child.wait() {
        warn!(error = %e, "could not reap model command");
    }
}

fn remove_staged(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = std::fs::remove_file(path) {
            debug!(path = ?path, error = %e, "staged view not removed");
        }
    }
}

impl VisionModel for CommandModel {
    fn infer(&mut self, request: InferenceRequest<'_>) -> Result<String, String> {
        let prompt = compose_prompt(request.prompt, request.previous_errors);
        let staged = self.stage_views(request.views)?;
        let answer = self.run(&staged, &prompt, request.attempt);
        remove_staged(&staged);
        answer
    }
}

/// Answers from recorded responses, in order.
#[derive(Debug, Clone, Default)]
pub struct ReplayModel {
    responses: Vec<String>,
    next: usize,
    /// Keep answering with the last response once the list runs out.
    repeat_last: bool,
}

impl ReplayModel {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            next: 0,
            repeat_last: false,
        }
    }

    pub fn repeating(response: String) -> Self {
        Self {
            repeat_last: true,
            ..Self::new(vec![response])
        }
    }

    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(vec![std::fs::read_to_string(path)?]))
    }
}

impl VisionModel for ReplayModel {
    fn infer(&mut self, _request: InferenceRequest<'_>) -> Result<String, String> {
        let index = if self.repeat_last {
            self.next.min(self.responses.len().saturating_sub(1))
        } else {
            self.next
        };
        let response = self
            .responses
            .get(index)
            .cloned()
            .ok_or_else(|| format!("replay exhausted after {} response(s)", self.responses.len()))?;
        self.next += 1;
        Ok(response)
    }
}
