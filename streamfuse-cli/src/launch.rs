//! Translation of `streamfuse submit` into a runtime invocation.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};

/// Runner resource used when no primary resource is given.
const DEFAULT_RUNNER: &str = "lib/streamfuse-runner.jar";
/// Launcher script under the runtime home.
const SUBMIT_SCRIPT: &str = "bin/streamfuse-submit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DeployMode {
    /// Driver runs on the submitting machine.
    #[default]
    Client,
    /// Driver runs inside the cluster.
    Cluster,
}

impl fmt::Display for DeployMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployMode::Client => f.write_str("client"),
            DeployMode::Cluster => f.write_str("cluster"),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    /// Driver executable to launch.
    #[arg(long)]
    pub exe: PathBuf,
    #[arg(long, default_value = "local[*]")]
    pub master: String,
    #[arg(long, value_enum, default_value_t = DeployMode::Client)]
    pub deploy_mode: DeployMode,
    /// Comma-separated files shipped with the job.
    #[arg(long, value_delimiter = ',')]
    pub files: Vec<String>,
    /// Comma-separated jars added to the runtime classpath.
    #[arg(long, value_delimiter = ',')]
    pub jars: Vec<String>,
    #[arg(long)]
    pub properties_file: Option<PathBuf>,
    /// Installation directory of the runtime.
    #[arg(long, env = "STREAMFUSE_RUNTIME_HOME", default_value = ".")]
    pub runtime_home: PathBuf,
    /// Primary resource, then application arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<String>,
}

/// Directory the packager must zip before the command is run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundlePlan {
    pub source_dir: PathBuf,
    pub archive: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub bundle: Option<BundlePlan>,
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program.display().to_string()))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        Ok(())
    }
}

fn quote(s: &str) -> String {
    if s.is_empty() || s.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'') {
        format!("'{}'", s.replace('\'', "'\\''"))
    } else {
        s.to_string()
    }
}

fn is_local_master(master: &str) -> bool {
    master == "local" || master.starts_with("local[")
}

impl SubmitArgs {
    /// Split `rest` into the primary resource and application arguments.
    ///
    /// A leading token that is not a flag is the primary resource.
    fn primary_resource(&self) -> (String, &[String]) {
        match self.rest.split_first() {
            Some((first, tail)) if !first.starts_with('-') => (first.clone(), tail),
            _ => (
                self.runtime_home.join(DEFAULT_RUNNER).display().to_string(),
                &self.rest,
            ),
        }
    }

    pub fn translate(&self) -> anyhow::Result<LaunchCommand> {
        let local = is_local_master(&self.master);
        if local && self.deploy_mode == DeployMode::Cluster {
            anyhow::bail!(
                "cluster deploy mode is not available for local master `{}`",
                self.master
            );
        }

        let mut files = self.files.clone();
        let (exe_ref, bundle) = if local || self.deploy_mode == DeployMode::Client {
            (self.exe.display().to_string(), None)
        } else {
            let bundle = plan_bundle(&self.exe)?;
            let archive_name = file_name(&bundle.archive)?;
            let exe_name = file_name(&self.exe)?;
            files.push(bundle.archive.display().to_string());
            (format!("{archive_name}/{exe_name}"), Some(bundle))
        };

        let mut args = vec![
            "--master".to_string(),
            self.master.clone(),
            "--deploy-mode".to_string(),
            self.deploy_mode.to_string(),
        ];
        if !files.is_empty() {
            args.push("--files".to_string());
            args.push(files.join(","));
        }
        if !self.jars.is_empty() {
            args.push("--jars".to_string());
            args.push(self.jars.join(","));
        }
        if let Some(path) = &self.properties_file {
            args.push("--properties-file".to_string());
            args.push(path.display().to_string());
        }

        let (primary, app_args) = self.primary_resource();
        args.push(primary);
        args.push(exe_ref);
        args.extend(app_args.iter().cloned());

        Ok(LaunchCommand {
            program: self.runtime_home.join(SUBMIT_SCRIPT),
            args,
            bundle,
        })
    }
}

fn plan_bundle(exe: &Path) -> anyhow::Result<BundlePlan> {
    let source_dir = exe
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| anyhow::anyhow!("executable {} has no parent directory", exe.display()))?;
    let dir_name = file_name(source_dir)?;
    Ok(BundlePlan {
        source_dir: source_dir.to_path_buf(),
        archive: source_dir.with_file_name(format!("{dir_name}.zip")),
    })
}

fn file_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("path {} has no file name", path.display()))
}
