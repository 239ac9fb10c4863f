use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

/// Runs a workspace binary and captures its output.
pub struct CliHarness {
    binary: PathBuf,
}

#[derive(Debug)]
pub struct CliOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CliHarness {
    /// `binary` is usually `env!("CARGO_BIN_EXE_<name>")`.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.env("RUST_LOG", "off");
        command
    }

    pub fn run(&self, args: &[&str]) -> CliOutput {
        let output = self
            .command()
            .args(args)
            .stdin(Stdio::null())
            .output()
            .expect("spawn binary");
        CliOutput::from(output)
    }

    pub fn run_with_stdin(&self, args: &[&str], stdin: &str) -> CliOutput {
        let mut child = self
            .command()
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn binary");
        child
            .stdin
            .take()
            .expect("stdin is piped")
            .write_all(stdin.as_bytes())
            .expect("write stdin");
        let output = child.wait_with_output().expect("wait for binary");
        CliOutput::from(output)
    }
}

impl From<Output> for CliOutput {
    fn from(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}
