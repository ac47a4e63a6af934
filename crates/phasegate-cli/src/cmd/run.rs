use crate::executor::ClaudeExecutor;
use crate::output::{or_dash, print_json, print_table, truncate};
use anyhow::Context;
use claude_agent::{PermissionMode, QueryOptions};
use clap::Args;
use phasegate_core::config::{AgentConfig, Config, WarnLevel};
use phasegate_core::notify::{FanoutSink, LogSink, WebhookSink};
use phasegate_core::runner::{ExecutionLoop, SessionLimits, SessionReport, StopSignal};
use phasegate_core::store::FileStore;
use std::path::Path;
use std::time::Duration;

#[derive(Args)]
pub struct RunArgs {
    /// Stop after this many tasks (overrides session.max_tasks)
    #[arg(long)]
    pub max_tasks: Option<u32>,

    /// Turn budget per task (overrides session.max_turns)
    #[arg(long)]
    pub max_turns: Option<u32>,

    /// Claude model (overrides agent.model)
    #[arg(long)]
    pub model: Option<String>,

    /// Move blocked tasks back to todo before starting
    #[arg(long)]
    pub retry_blocked: bool,
}

pub fn run(root: &Path, args: RunArgs, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    if let Some(err) = config
        .validate()
        .into_iter()
        .find(|w| w.level == WarnLevel::Error)
    {
        anyhow::bail!("invalid config: {}", err.message);
    }

    let limits = session_limits(&config, &args);
    let mut opts = query_options(&config.agent)?;
    if args.model.is_some() {
        opts.model = args.model;
    }

    let exe = opts.path_to_executable.as_deref().unwrap_or("claude");
    which::which(exe).with_context(|| {
        format!("'{exe}' not found; install the claude CLI or set agent.path_to_executable")
    })?;

    let mut store = FileStore::open(root).context("failed to open task store")?;
    let mut sink = FanoutSink::new().with(LogSink);
    if let Some(url) = &config.notify.webhook_url {
        let timeout = Duration::from_secs(config.notify.timeout_seconds);
        let webhook =
            WebhookSink::new(url.as_str(), timeout).context("failed to build webhook client")?;
        sink = sink.with(webhook);
    }

    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        rt.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("stop requested; finishing the current task");
                stop.stop();
            }
        });
    }

    let mut executor = ClaudeExecutor::new(rt.handle().clone(), opts, root);
    let report = ExecutionLoop::new(&mut store, &mut executor, &sink, limits)
        .project(config.project.name.clone())
        .run(&stop)
        .context("session could not start")?;

    if json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }

    if report.halt.is_failure() {
        anyhow::bail!("session halted: {}", report.halt);
    }
    Ok(())
}

fn session_limits(config: &Config, args: &RunArgs) -> SessionLimits {
    let mut limits = SessionLimits::from(&config.session);
    if args.max_tasks.is_some() {
        limits.max_tasks = args.max_tasks;
    }
    if let Some(turns) = args.max_turns {
        limits.max_turns = turns;
    }
    limits.retry_blocked |= args.retry_blocked;
    limits
}

fn query_options(agent: &AgentConfig) -> anyhow::Result<QueryOptions> {
    let permission_mode: PermissionMode = agent
        .permission_mode
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    Ok(QueryOptions {
        model: agent.model.clone(),
        allowed_tools: agent.allowed_tools.clone(),
        permission_mode,
        path_to_executable: agent.path_to_executable.clone(),
        ..QueryOptions::default()
    })
}

fn print_report(report: &SessionReport) {
    if !report.executed.is_empty() {
        let rows: Vec<Vec<String>> = report
            .executed
            .iter()
            .map(|r| {
                vec![
                    r.id.clone(),
                    r.status.to_string(),
                    r.attempts.to_string(),
                    r.turns.map(|t| t.to_string()).unwrap_or_else(|| "-".into()),
                    truncate(&r.title, 50),
                ]
            })
            .collect();
        println!("Executed:");
        print_table(&["ID", "STATUS", "ATTEMPTS", "TURNS", "TITLE"], &rows);
        println!();
    }

    if !report.pending.is_empty() {
        let rows: Vec<Vec<String>> = report
            .pending
            .iter()
            .map(|p| {
                let waiting: Vec<String> = p
                    .waiting_on
                    .iter()
                    .map(|b| format!("{}({})", b.id, b.status))
                    .collect();
                vec![
                    p.id.clone(),
                    p.status.to_string(),
                    or_dash(Some(waiting.join(", ").as_str())),
                    truncate(&or_dash(p.reason.as_deref()), 40),
                    truncate(&p.title, 50),
                ]
            })
            .collect();
        println!("Remaining:");
        print_table(&["ID", "STATUS", "WAITING ON", "REASON", "TITLE"], &rows);
        println!();
    }

    println!("Session halted: {}", report.halt);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> RunArgs {
        RunArgs {
            max_tasks: None,
            max_turns: None,
            model: None,
            retry_blocked: false,
        }
    }

    #[test]
    fn flags_override_config() {
        let mut config = Config::new("p");
        config.session.max_tasks = Some(10);
        config.session.retry_blocked = true;

        let limits = session_limits(
            &config,
            &RunArgs {
                max_tasks: Some(2),
                max_turns: Some(30),
                ..args()
            },
        );
        assert_eq!(limits.max_tasks, Some(2));
        assert_eq!(limits.max_turns, 30);
        assert!(limits.retry_blocked);

        let limits = session_limits(&config, &args());
        assert_eq!(limits.max_tasks, Some(10));
        assert_eq!(limits.max_turns, config.session.max_turns);
    }

    #[test]
    fn agent_config_maps_to_query_options() {
        let config = Config::new("p");
        let opts = query_options(&config.agent).unwrap();
        assert_eq!(opts.permission_mode, PermissionMode::AcceptEdits);
        assert_eq!(opts.allowed_tools, config.agent.allowed_tools);

        let mut bad = config.agent.clone();
        bad.permission_mode = "yolo".into();
        assert!(query_options(&bad).is_err());
    }
}
