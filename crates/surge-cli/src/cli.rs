use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use surge_core::check::StatusCheck;
use surge_core::scenario::{parse_duration, read_scenario, ScenarioConfig, Stage};
use surge_core::SurgeError;

#[derive(Parser, Debug)]
#[command(name = "surge", version)]
#[command(about = "Staged HTTP load generator", long_about = None)]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a load test
    Run(RunArgs),
    /// Check a scenario file without sending any request
    Validate {
        /// Scenario file (JSON)
        scenario: PathBuf,
    },
    /// Write a starter scenario file
    Init {
        /// Output path
        #[arg(default_value = "scenario.json")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario file (JSON); flags below override its values
    pub scenario: Option<PathBuf>,

    /// Target URL
    #[arg(long, env = "SURGE_URL")]
    pub url: Option<String>,

    /// Scenario name shown in reports
    #[arg(long)]
    pub name: Option<String>,

    /// Ramp stage as <duration>:<target>, e.g. 30s:5000 (repeatable, replaces file stages)
    #[arg(long = "stage", value_parser = parse_stage_arg)]
    pub stages: Vec<Stage>,

    /// Expected status: 200, 200-299 or 200,204
    #[arg(long, value_parser = parse_check_arg)]
    pub expect_status: Option<StatusCheck>,

    /// Idle delay between iterations of one virtual user
    #[arg(long, env = "SURGE_THINK_TIME", value_parser = parse_duration_arg)]
    pub think_time: Option<Duration>,

    /// Per-request timeout
    #[arg(long, env = "SURGE_TIMEOUT", value_parser = parse_duration_arg)]
    pub timeout: Option<Duration>,

    /// Scheduler tick interval
    #[arg(long, value_parser = parse_duration_arg)]
    pub tick: Option<Duration>,

    /// Report format printed to stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Also write the summary to this file (.json or .csv)
    #[arg(long)]
    pub summary_export: Option<PathBuf>,

    /// Suppress per-tick progress logging
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_stage_arg(s: &str) -> Result<Stage, String> {
    Stage::parse(s).ok_or_else(|| format!("invalid stage '{s}', expected <duration>:<target>"))
}

fn parse_check_arg(s: &str) -> Result<StatusCheck, String> {
    StatusCheck::parse(s).ok_or_else(|| format!("invalid status check '{s}'"))
}

fn parse_duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).ok_or_else(|| format!("invalid duration '{s}'"))
}

impl RunArgs {
    /// Load the scenario file, if any, and apply flag overrides.
    pub async fn build_scenario(&self) -> Result<ScenarioConfig, SurgeError> {
        let mut config = match &self.scenario {
            Some(path) => read_scenario(path).await?,
            None => {
                let url = self.url.clone().ok_or_else(|| {
                    SurgeError::Config(
                        "either a scenario file or --url is required".to_string(),
                    )
                })?;
                ScenarioConfig::new(url, Vec::new())
            }
        };
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut ScenarioConfig) {
        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if !self.stages.is_empty() {
            config.stages = self.stages.clone();
        }
        if let Some(check) = &self.expect_status {
            config.check = check.clone();
        }
        if let Some(think) = self.think_time {
            config.settings.think_time = think;
        }
        if let Some(timeout) = self.timeout {
            config.settings.request_timeout = timeout;
        }
        if let Some(tick) = self.tick {
            config.settings.tick_interval = tick;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use surge_core::scenario::write_scenario;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments should parse")
    }

    fn run_args(cli: Cli) -> RunArgs {
        match cli.command {
            Command::Run(args) => args,
            other => panic!("expected run command, got {other:?}"),
        }
    }

    #[test]
    fn run_flags_parse() {
        let args = run_args(parse(&[
            "surge",
            "run",
            "--url",
            "http://localhost:8080/",
            "--stage",
            "30s:5000",
            "--stage",
            "30s:10000",
            "--stage",
            "30s:0",
            "--expect-status",
            "200-299",
            "--think-time",
            "500ms",
            "--format",
            "json",
        ]));
        assert_eq!(args.stages.len(), 3);
        assert_eq!(args.stages[1], Stage::new(Duration::from_secs(30), 10000));
        assert_eq!(args.expect_status, Some(StatusCheck::Range { min: 200, max: 299 }));
        assert_eq!(args.think_time, Some(Duration::from_millis(500)));
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn bad_stage_is_a_usage_error() {
        let result = Cli::try_parse_from(["surge", "run", "--stage", "forever"]);
        assert!(result.is_err());
        let result = Cli::try_parse_from(["surge", "run", "--stage", "1e30s:5"]);
        assert!(result.is_err());
        let result = Cli::try_parse_from(["surge", "run", "--timeout", "99999999999999999999999h"]);
        assert!(result.is_err());
    }

    #[test]
    fn init_defaults_path() {
        match parse(&["surge", "init"]).command {
            Command::Init { path, force } => {
                assert_eq!(path, PathBuf::from("scenario.json"));
                assert!(!force);
            }
            other => panic!("expected init, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn flags_alone_build_a_scenario() {
        let args = run_args(parse(&[
            "surge",
            "run",
            "--url",
            "http://localhost:9000/health",
            "--stage",
            "10s:5",
            "--timeout",
            "2s",
        ]));
        let config = args.build_scenario().await.expect("should build");
        assert_eq!(config.url, "http://localhost:9000/health");
        assert_eq!(config.stages, vec![Stage::new(Duration::from_secs(10), 5)]);
        assert_eq!(config.settings.request_timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn missing_url_and_file_is_config_error() {
        let args = run_args(parse(&["surge", "run", "--stage", "10s:5"]));
        let err = args.build_scenario().await.unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn flags_override_file_values() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("scenario.json");
        write_scenario(&ScenarioConfig::healthcheck_template(), &path)
            .await
            .expect("write should succeed");

        let path_str = path.to_string_lossy().to_string();
        let args = run_args(parse(&[
            "surge",
            "run",
            &path_str,
            "--stage",
            "5s:10",
            "--name",
            "smoke",
        ]));
        let config = args.build_scenario().await.expect("should build");
        assert_eq!(config.url, "http://localhost:8080/");
        assert_eq!(config.name, "smoke");
        assert_eq!(config.stages.len(), 1);
        assert_eq!(config.settings.think_time, Duration::from_secs(1));
    }
}
