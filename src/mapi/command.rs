/*!
Command lines for the mapi binary.

`CommandBuilder` renders a validated request into an `Invocation`: the program
path plus its ordered argument vector. Arguments are handed to the process as-is
(no shell involved); `shell_tokens` / `command_line` give the shell-quoted form
used for logging, which re-splits into the exact same argv.
*/

use std::fmt;
use std::path::{Path, PathBuf};

use super::request::{DefectListRequest, DiscoverRequest, RunRequest};
use crate::config::Coordinate;

/// A single prepared invocation of the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Each argument quoted so that shell-style splitting yields it back as one token.
    pub fn shell_tokens(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| shell_words::quote(a).into_owned())
            .collect()
    }

    /// Full command line (program + quoted arguments).
    pub fn command_line(&self) -> String {
        let program = self.program.to_string_lossy();
        let mut parts = vec![shell_words::quote(&program).into_owned()];
        parts.extend(self.shell_tokens());
        parts.join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Renders requests into invocations of `program` at a fixed coordinate.
#[derive(Debug, Clone, Copy)]
pub struct CommandBuilder<'a> {
    program: &'a Path,
    coordinate: &'a Coordinate,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(program: &'a Path, coordinate: &'a Coordinate) -> Self {
        Self {
            program,
            coordinate,
        }
    }

    /// `run <coord> <duration> <spec> --url=... [options...]`
    pub fn run(&self, req: &RunRequest) -> Invocation {
        let opts = &req.options;
        let mut args = vec![
            "run".to_string(),
            self.coordinate.to_string(),
            req.duration.clone(),
            req.specification.clone(),
            format!("--url={}", opts.url),
        ];
        args.extend(opts.include_rules.iter().map(|r| format!("--include-rule={r}")));
        args.extend(opts.ignore_rules.iter().map(|r| format!("--ignore-rule={r}")));
        if let Some(har) = &opts.har {
            args.push(format!("--har={har}"));
        }
        if opts.zap {
            args.push("--zap".to_string());
        }
        // mapi replays issues unless told otherwise
        if !opts.replay_issues {
            args.push("--no-replay".to_string());
        }
        args.extend(opts.header_auth.iter().map(|h| format!("--header-auth={h}")));
        Invocation::new(self.program, args)
    }

    /// `defect list <coord>/<run_id>`
    pub fn defect_list(&self, req: &DefectListRequest) -> Invocation {
        let args = vec![
            "defect".to_string(),
            "list".to_string(),
            self.coordinate.run_path(req.run_id),
        ];
        Invocation::new(self.program, args)
    }

    /// `discover --hosts=H --ports=P --output=DIR`
    pub fn discover(&self, req: &DiscoverRequest, output_dir: &Path) -> Invocation {
        let args = vec![
            "discover".to_string(),
            format!("--hosts={}", req.host),
            format!("--ports={}", req.port),
            format!("--output={}", output_dir.display()),
        ];
        Invocation::new(self.program, args)
    }
}

/// `--version`
pub fn version(program: &Path) -> Invocation {
    Invocation::new(program, vec!["--version".to_string()])
}
