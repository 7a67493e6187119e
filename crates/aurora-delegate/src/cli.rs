//! Delegate that shells out to the aurora command-line client.

use aurora_types::{CommandDelegate, CommandError, Instances, JobKey, JobSpec};
use std::io::Write;
use std::process::{Command, Output};

/// Line the aurora client prints when the scheduler accepted a request.
pub const SCHEDULER_OK: &str = "Response from scheduler: OK";

const CLIENT_ERROR: &str = "Error reported by aurora client:";

/// Runs one aurora client process per call. Stateless, so safe to share.
#[derive(Debug, Clone)]
pub struct AuroraCliDelegate {
    command: String,
}

impl AuroraCliDelegate {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    fn run(&self, args: &[String]) -> Result<Output, CommandError> {
        tracing::debug!(command = %self.command, ?args, "invoking aurora client");
        Command::new(&self.command)
            .args(args)
            .output()
            .map_err(|e| CommandError::Invocation(format!("{}: {}", self.command, e)))
    }

    /// Run a mutating command; succeed only on exit 0 with the scheduler OK line.
    fn run_checked(&self, action: &str, key: &JobKey, args: &[String]) -> Result<(), CommandError> {
        let output = self.run(args)?;
        let lines = output_lines(&output);
        if !output.status.success() {
            tracing::warn!(
                key = %key,
                status = ?output.status.code(),
                "aurora client {} failed, details follow",
                action
            );
            for line in &lines {
                tracing::warn!("> {}", line);
            }
            return Err(CommandError::Client {
                context: CLIENT_ERROR.to_string(),
                output: lines,
            });
        }
        for line in &lines {
            tracing::info!("  > {}", line);
        }
        if lines.iter().any(|l| l.contains(SCHEDULER_OK)) {
            tracing::info!(key = %key, "aurora {} successful", action);
            Ok(())
        } else {
            tracing::warn!(key = %key, "aurora {} failed", action);
            Err(CommandError::Client {
                context: CLIENT_ERROR.to_string(),
                output: lines,
            })
        }
    }
}

/// The client only reads job configs from files, never stdin.
fn write_spec(spec: &JobSpec) -> Result<tempfile::NamedTempFile, CommandError> {
    let mut file = tempfile::Builder::new()
        .suffix(".aurora")
        .tempfile()
        .map_err(|e| CommandError::Invocation(format!("cannot create job spec file: {}", e)))?;
    file.write_all(spec.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| CommandError::Invocation(format!("cannot write job spec file: {}", e)))?;
    Ok(file)
}

fn log_spec(spec: &JobSpec) {
    tracing::info!("  job spec:");
    for (lineno, line) in spec.lines_lossy().iter().enumerate() {
        tracing::info!("  {:3}: {}", lineno + 1, line);
    }
}

fn output_lines(output: &Output) -> Vec<String> {
    let mut lines: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(String::from)
        .collect();
    lines.extend(
        String::from_utf8_lossy(&output.stderr)
            .lines()
            .map(String::from),
    );
    lines
}

fn path_arg(file: &tempfile::NamedTempFile) -> String {
    file.path().to_string_lossy().into_owned()
}

fn shards_flag(instances: &Instances) -> Option<String> {
    (!instances.is_all()).then(|| format!("--shards={}", instances.joined()))
}

impl CommandDelegate for AuroraCliDelegate {
    fn list_jobs(&self, cluster: &str, role: &str) -> Result<Vec<String>, CommandError> {
        let key = JobKey::role(cluster, role);
        tracing::info!(key = %key, "request to list jobs");

        let output = self.run(&["list_jobs".to_string(), key.to_string()])?;
        if !output.status.success() {
            tracing::warn!(key = %key, status = ?output.status.code(), "failed to list aurora jobs");
            let mut detail: Vec<String> = String::from_utf8_lossy(&output.stderr)
                .lines()
                .map(String::from)
                .collect();
            if detail.is_empty() {
                detail.push(format!("exit status: {:?}", output.status.code()));
            }
            return Err(CommandError::Client {
                context: "Exception when listing aurora jobs".to_string(),
                output: detail,
            });
        }

        let jobs: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        if jobs.is_empty() {
            tracing::info!(key = %key, "no jobs found");
        }
        for job in &jobs {
            tracing::info!("> {}", job);
        }
        Ok(jobs)
    }

    fn create_job(&self, key: &JobKey, spec: &JobSpec) -> Result<(), CommandError> {
        tracing::info!(key = %key, "request to create job");
        log_spec(spec);
        let file = write_spec(spec)?;
        self.run_checked(
            "create job",
            key,
            &["create".to_string(), key.to_string(), path_arg(&file)],
        )
    }

    fn update_job(
        &self,
        key: &JobKey,
        spec: &JobSpec,
        instances: &Instances,
    ) -> Result<(), CommandError> {
        tracing::info!(key = %key, instances = %instances.joined(), "request to update job");
        log_spec(spec);
        let file = write_spec(spec)?;
        let mut args = vec!["update".to_string()];
        args.extend(shards_flag(instances));
        args.push(key.to_string());
        args.push(path_arg(&file));
        self.run_checked("update job", key, &args)
    }

    fn cancel_update(&self, key: &JobKey, spec: Option<&JobSpec>) -> Result<(), CommandError> {
        tracing::info!(key = %key, "request to cancel update of job");
        let file = spec.map(write_spec).transpose()?;
        let mut args = vec!["cancel_update".to_string(), key.to_string()];
        args.extend(file.as_ref().map(path_arg));
        self.run_checked("cancel update", key, &args)
    }

    fn restart_job(
        &self,
        key: &JobKey,
        spec: Option<&JobSpec>,
        instances: &Instances,
    ) -> Result<(), CommandError> {
        tracing::info!(key = %key, instances = %instances.joined(), "request to restart job");
        let file = spec.map(write_spec).transpose()?;
        let mut args = vec!["restart".to_string()];
        args.extend(shards_flag(instances));
        args.push(key.to_string());
        args.extend(file.as_ref().map(path_arg));
        self.run_checked("restart job", key, &args)
    }

    fn delete_job(
        &self,
        key: &JobKey,
        _spec: Option<&JobSpec>,
        instances: &Instances,
    ) -> Result<Vec<String>, CommandError> {
        tracing::info!(key = %key, instances = %instances.joined(), "request to delete job");
        let args = if instances.is_all() {
            vec!["killall".to_string(), key.to_string()]
        } else {
            vec![
                "kill".to_string(),
                format!("{}/{}", key, instances.joined()),
            ]
        };
        self.run_checked("kill job", key, &args)?;
        Ok(vec![key.to_string()])
    }
}
