//! Launcher for the external load-test CLI.
//!
//! The tool owns the actual load generation (including its `-R` remote mode);
//! this module only builds argv vectors, spawns the process, and keeps the
//! task row in step with the exit status.

use anyhow::{bail, Context, Result};
use chrono::Local;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::plan::PLAN_FILE;
use crate::store::{NewTask, RunMode, Store};
use crate::task::TaskArtifacts;

#[derive(Debug, Clone)]
pub struct Engine {
    home: PathBuf,
    properties_file: String,
    workspace: PathBuf,
}

impl Engine {
    pub fn new(cfg: &EngineConfig, workspace: impl Into<PathBuf>) -> Self {
        Self {
            home: cfg.home.clone(),
            properties_file: cfg.properties_file.clone(),
            workspace: workspace.into(),
        }
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.home.join("bin")
    }

    fn launcher(&self) -> PathBuf {
        let script = if cfg!(windows) { "jmeter.bat" } else { "jmeter.sh" };
        self.bin_dir().join(script)
    }

    fn stop_script(&self) -> PathBuf {
        let script = if cfg!(windows) { "stoptest.cmd" } else { "stoptest.sh" };
        self.bin_dir().join(script)
    }

    pub fn properties_path(&self) -> PathBuf {
        self.bin_dir().join(&self.properties_file)
    }

    /// The tool runs on the JVM; a missing JRE is the most common setup
    /// failure, so it gets its own preflight.
    pub async fn check_java(&self) -> Result<()> {
        let status = Command::new("java")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .context("java not found on PATH (https://www.java.com/)")?;
        if !status.success() {
            bail!("java -version exited with {status}");
        }
        Ok(())
    }

    pub async fn check_tool(&self) -> Result<()> {
        let launcher = self.launcher();
        let status = Command::new(&launcher)
            .arg("-v")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .with_context(|| format!("load-test tool not found at {}", launcher.display()))?;
        if !status.success() {
            bail!("{} -v exited with {status}", launcher.display());
        }
        Ok(())
    }

    /// Hosts from the `remote_hosts=` line of the tool's properties file.
    pub async fn remote_hosts(&self) -> Vec<String> {
        match tokio::fs::read_to_string(self.properties_path()).await {
            Ok(content) => parse_remote_hosts(&content),
            Err(e) => {
                debug!(error = %e, "no properties file, remote host list is empty");
                Vec::new()
            }
        }
    }

    /// Raw read of a file under the tool's `bin/` directory (the dashboard's
    /// properties editor).
    pub async fn read_bin_file(&self, file: &str) -> Result<String> {
        validate_file_name(file)?;
        let path = self.bin_dir().join(file);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))
    }

    pub async fn write_bin_file(&self, file: &str, content: &str) -> Result<()> {
        validate_file_name(file)?;
        let path = self.bin_dir().join(file);
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("writing {}", path.display()))
    }

    /// `<plan>-<yyMMddHHmmss>` run id, also the report/log directory name.
    pub fn task_id(plan: &str) -> String {
        format!("{plan}-{}", Local::now().format("%y%m%d%H%M%S"))
    }

    fn build_args(
        &self,
        plan: &str,
        task: &str,
        artifacts: &TaskArtifacts,
        hosts: Option<&str>,
    ) -> Vec<OsString> {
        let jmx = self.workspace.join(plan).join(PLAN_FILE);
        let report_dir = artifacts.report_dir(plan, task);
        let mut args: Vec<OsString> = vec![
            "-n".into(),
            "-t".into(),
            jmx.into(),
            "-l".into(),
            artifacts.result_file(plan, task).into(),
            "-j".into(),
            artifacts.run_log_file(plan, task).into(),
            "-e".into(),
            "-o".into(),
            report_dir.into(),
        ];
        if let Some(hosts) = hosts {
            args.push("-R".into());
            args.push(hosts.into());
        }
        args
    }

    /// Insert the task row and launch the subprocess in the background.
    /// Returns the task id immediately; the row's status is the source of
    /// truth for the run's outcome.
    pub async fn start_run(
        &self,
        store: &Store,
        artifacts: &TaskArtifacts,
        plan: &str,
        threads: u32,
        mode: RunMode,
        hosts: Option<String>,
    ) -> Result<String> {
        let resolved_hosts = match mode {
            RunMode::Local => None,
            RunMode::Remote => {
                let hosts = match hosts.as_deref() {
                    None | Some("All") => self.remote_hosts().await.join(","),
                    Some(list) => list.to_string(),
                };
                if hosts.is_empty() {
                    bail!("remote mode requested but no remote hosts configured");
                }
                Some(hosts)
            }
        };

        let task = Self::task_id(plan);
        tokio::fs::create_dir_all(artifacts.report_dir(plan, &task))
            .await
            .context("creating report directory")?;
        tokio::fs::create_dir_all(artifacts.log_dir(plan, &task))
            .await
            .context("creating log directory")?;

        store
            .tasks()
            .create(&NewTask {
                plan: plan.to_string(),
                task: task.clone(),
                model: mode,
                threads,
            })
            .await?;

        let args = self.build_args(plan, &task, artifacts, resolved_hosts.as_deref());
        info!(plan, task = %task, %mode, "starting load-test run");

        let engine = self.clone();
        let store = store.clone();
        let artifacts = artifacts.clone();
        let plan = plan.to_string();
        let spawned_task = task.clone();
        tokio::spawn(async move {
            engine
                .run_to_completion(&store, &artifacts, &plan, &spawned_task, args)
                .await;
        });

        Ok(task)
    }

    async fn run_to_completion(
        &self,
        store: &Store,
        artifacts: &TaskArtifacts,
        plan: &str,
        task: &str,
        args: Vec<OsString>,
    ) {
        let exit_ok = match Command::new(self.launcher()).args(&args).output().await {
            Ok(output) => {
                debug!(
                    task,
                    stdout = %String::from_utf8_lossy(&output.stdout),
                    stderr = %String::from_utf8_lossy(&output.stderr),
                    "load-test run finished"
                );
                output.status.success()
            }
            Err(e) => {
                error!(task, error = %e, "failed to spawn load-test tool");
                false
            }
        };

        if let Err(e) = finalize_run(store, artifacts, plan, task, exit_ok).await {
            error!(task, error = %e, "failed to record run outcome");
        }
    }

    /// Ask the tool to stop the running test via its shutdown script.
    pub async fn stop(&self) -> Result<()> {
        let script = self.stop_script();
        let status = Command::new(&script)
            .status()
            .await
            .with_context(|| format!("stop script not found at {}", script.display()))?;
        if !status.success() {
            bail!("stop script exited with {status}");
        }
        Ok(())
    }
}

/// Close out the task row from the subprocess exit status and the run's
/// statistics file. Every exit path lands the row in `Done` or `Error`.
pub(crate) async fn finalize_run(
    store: &Store,
    artifacts: &TaskArtifacts,
    plan: &str,
    task: &str,
    exit_ok: bool,
) -> Result<()> {
    if !exit_ok {
        store.tasks().mark_error(task).await?;
        error!(task, "load-test run failed");
        return Ok(());
    }

    match artifacts.read_statistics(plan, task).await {
        Ok(Some(stats)) => match stats.total() {
            Some(total) => {
                store
                    .tasks()
                    .complete(task, total.sample_count - total.error_count, total.error_count)
                    .await?;
                info!(
                    task,
                    success = total.sample_count - total.error_count,
                    fail = total.error_count,
                    "load-test run done"
                );
            }
            None => {
                store.tasks().mark_error(task).await?;
                error!(task, "statistics file has no Total entry");
            }
        },
        Ok(None) => {
            store.tasks().mark_error(task).await?;
            error!(task, "run exited cleanly but produced no statistics");
        }
        Err(e) => {
            store.tasks().mark_error(task).await?;
            error!(task, error = %e, "could not read run statistics");
        }
    }
    Ok(())
}

fn parse_remote_hosts(properties: &str) -> Vec<String> {
    properties
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with("remote_hosts"))
        .and_then(|line| line.split_once('='))
        .map(|(_, hosts)| {
            hosts
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn validate_file_name(file: &str) -> Result<()> {
    if file.is_empty() || file.contains('/') || file.contains('\\') || file.contains('\0') {
        bail!("file name must be a plain file under the tool's bin directory");
    }
    if file == "." || file == ".." {
        bail!("file name must not be a relative path component");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn test_engine(home: &str, workspace: &str) -> Engine {
        Engine::new(
            &EngineConfig {
                home: home.into(),
                properties_file: "jmeter.properties".into(),
            },
            workspace,
        )
    }

    #[test]
    fn task_id_embeds_plan_name() {
        let id = Engine::task_id("smoke");
        assert!(id.starts_with("smoke-"));
        // yyMMddHHmmss suffix
        assert_eq!(id.len(), "smoke-".len() + 12);
        assert!(id["smoke-".len()..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn local_args_have_no_remote_flag() {
        let engine = test_engine("/opt/jmeter", "/var/loadmeter");
        let artifacts = TaskArtifacts::new("/var/loadmeter");
        let args = engine.build_args("smoke", "smoke-240101010101", &artifacts, None);

        let rendered: Vec<String> =
            args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(rendered[0], "-n");
        assert!(rendered.contains(&"/var/loadmeter/smoke/plan.jmx".to_string()));
        assert!(rendered
            .contains(&"/var/loadmeter/smoke/report/smoke-240101010101/result.jtl".to_string()));
        assert!(rendered
            .contains(&"/var/loadmeter/smoke/log/smoke-240101010101/result.log".to_string()));
        assert!(!rendered.contains(&"-R".to_string()));
    }

    #[test]
    fn remote_args_append_hosts() {
        let engine = test_engine("/opt/jmeter", "/var/loadmeter");
        let artifacts = TaskArtifacts::new("/var/loadmeter");
        let args = engine.build_args(
            "smoke",
            "smoke-240101010101",
            &artifacts,
            Some("10.0.0.1:1099,10.0.0.2:1099"),
        );
        let rendered: Vec<String> =
            args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        let r = rendered.iter().position(|a| a == "-R").unwrap();
        assert_eq!(rendered[r + 1], "10.0.0.1:1099,10.0.0.2:1099");
    }

    #[rstest]
    #[case("remote_hosts=10.0.0.1:1099,10.0.0.2:1099", vec!["10.0.0.1:1099", "10.0.0.2:1099"])]
    #[case("  remote_hosts = 10.0.0.1 , 10.0.0.2 ", vec!["10.0.0.1", "10.0.0.2"])]
    #[case("remote_hosts=", vec![])]
    #[case("# remote_hosts=commented\nremote_hosts=10.0.0.9", vec!["10.0.0.9"])]
    #[case("server.rmi.ssl.disable=true", vec![])]
    fn parses_remote_hosts_lines(#[case] input: &str, #[case] expected: Vec<&str>) {
        assert_eq!(parse_remote_hosts(input), expected);
    }

    #[rstest]
    #[case("jmeter.properties", true)]
    #[case("user.properties", true)]
    #[case("../secrets", false)]
    #[case("a/b.properties", false)]
    #[case("", false)]
    fn bin_file_names_are_validated(#[case] name: &str, #[case] ok: bool) {
        assert_eq!(validate_file_name(name).is_ok(), ok);
    }

    #[tokio::test]
    async fn missing_properties_file_yields_empty_hosts() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(dir.path().to_str().unwrap(), "/var/loadmeter");
        assert!(engine.remote_hosts().await.is_empty());
    }

    async fn store_with_task(dir: &tempfile::TempDir, plan: &str, task: &str) -> Store {
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        let store = Store::connect(&url).await.unwrap();
        store
            .tasks()
            .create(&NewTask {
                plan: plan.into(),
                task: task.into(),
                model: RunMode::Local,
                threads: 10,
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn finalize_records_counts_from_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_task(&dir, "smoke", "smoke-1").await;
        let artifacts = TaskArtifacts::new(dir.path());

        tokio::fs::create_dir_all(artifacts.report_dir("smoke", "smoke-1")).await.unwrap();
        tokio::fs::write(
            artifacts.statistics_file("smoke", "smoke-1"),
            r#"{"Total": {"sampleCount": 100, "errorCount": 5}}"#,
        )
        .await
        .unwrap();

        finalize_run(&store, &artifacts, "smoke", "smoke-1", true).await.unwrap();

        let row = store.tasks().find_one("smoke", "smoke-1").await.unwrap().unwrap();
        assert_eq!(row.status, "Done");
        assert_eq!(row.success_num, 95);
        assert_eq!(row.fail_num, 5);
    }

    #[tokio::test]
    async fn finalize_marks_error_without_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_task(&dir, "smoke", "smoke-2").await;
        let artifacts = TaskArtifacts::new(dir.path());

        finalize_run(&store, &artifacts, "smoke", "smoke-2", true).await.unwrap();

        let row = store.tasks().find_one("smoke", "smoke-2").await.unwrap().unwrap();
        assert_eq!(row.status, "Error");
    }

    #[tokio::test]
    async fn finalize_marks_error_on_bad_exit() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_task(&dir, "smoke", "smoke-3").await;
        let artifacts = TaskArtifacts::new(dir.path());

        finalize_run(&store, &artifacts, "smoke", "smoke-3", false).await.unwrap();

        let row = store.tasks().find_one("smoke", "smoke-3").await.unwrap().unwrap();
        assert_eq!(row.status, "Error");
    }

    #[tokio::test]
    async fn remote_hosts_read_from_bin_properties() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        tokio::fs::create_dir_all(&bin).await.unwrap();
        tokio::fs::write(
            bin.join("jmeter.properties"),
            "# config\nremote_hosts=192.168.30.132:1099,192.168.30.130:1099\n",
        )
        .await
        .unwrap();

        let engine = test_engine(dir.path().to_str().unwrap(), "/var/loadmeter");
        assert_eq!(
            engine.remote_hosts().await,
            vec!["192.168.30.132:1099".to_string(), "192.168.30.130:1099".to_string()]
        );
    }
}
