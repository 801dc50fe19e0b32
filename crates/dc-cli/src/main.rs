//! `dreamcanvas`: command-line front end over the workbench state core

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use dc_bridge::{select_bridge, FileStorage, HostEnvironment};
use dc_client::{
    BackendHealth, CreateTaskRequest, HealthMonitor, HealthProbe, HttpTaskClient, TaskClient,
};
use dc_model::{CanvasSnapshot, GenerationTask};
use dc_store::{
    Autosave, DreamCanvasConfig, ProjectStore, StoreEvent, TaskPoller, TokioDebouncer,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn cli() -> Command {
    Command::new("dreamcanvas")
        .version(dc_model::VERSION)
        .about("DreamCanvas creative workbench")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Path to a TOML config file"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(Command::new("projects").about("List stored projects"))
        .subcommand(
            Command::new("create")
                .about("Create a project and print its id")
                .arg(Arg::new("name").required(true).help("Project name")),
        )
        .subcommand(
            Command::new("generate")
                .about("Submit a prompt, wait for the result and store it in a project")
                .arg(Arg::new("prompt").required(true).help("Prompt text"))
                .arg(Arg::new("model").long("model").help("Model name"))
                .arg(Arg::new("size").long("size").help("Output size, WIDTHxHEIGHT"))
                .arg(
                    Arg::new("batch")
                        .long("batch")
                        .value_parser(value_parser!(u32))
                        .help("Number of images"),
                )
                .arg(
                    Arg::new("project")
                        .long("project")
                        .help("Project id (defaults to the first listed project)"),
                )
                .arg(
                    Arg::new("timeout-secs")
                        .long("timeout-secs")
                        .default_value("300")
                        .value_parser(value_parser!(u64))
                        .help("Give up waiting after this many seconds"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Fetch a task's current status")
                .arg(Arg::new("task-id").required(true)),
        )
        .subcommand(
            Command::new("cancel")
                .about("Request cancellation of a task")
                .arg(Arg::new("task-id").required(true)),
        )
        .subcommand(
            Command::new("import-canvas")
                .about("Replace a project's canvas with a JSON document and autosave it")
                .arg(Arg::new("project-id").required(true))
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("health")
                .about("Probe the task queue backend")
                .arg(
                    Arg::new("watch")
                        .long("watch")
                        .action(ArgAction::SetTrue)
                        .help("Keep probing every health.interval_ms and report changes"),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Everything a command needs, resolved once at startup
struct Workbench {
    config: DreamCanvasConfig,
    client: Arc<HttpTaskClient>,
    store: Arc<ProjectStore>,
}

impl Workbench {
    fn open(config: DreamCanvasConfig) -> Result<Self> {
        let env = HostEnvironment::from_projects_dir(config.storage.host_projects_dir.clone())
            .context("cannot open native projects directory")?;
        let storage = Arc::new(FileStorage::new(&config.storage.local_dir));
        let bridge = select_bridge(&env, storage);

        let client = Arc::new(
            HttpTaskClient::new(&config.api.base_url, config.request_timeout())
                .context("cannot build task client")?,
        );
        tracing::debug!("Task queue at {}", client.base_url());
        let store = ProjectStore::new(bridge, client.clone());
        Ok(Self {
            config,
            client,
            store,
        })
    }

    /// Fail with the store's error banner, if set
    fn check(&self, action: &str) -> Result<()> {
        match self.store.error() {
            Some(error) => bail!("{action} failed: {error}"),
            None => Ok(()),
        }
    }

    async fn open_project(&self, project_id: Option<&str>) -> Result<()> {
        self.store.initialize().await;
        self.check("loading projects")?;
        if let Some(project_id) = project_id {
            self.store.select_project(project_id).await;
            self.check("opening project")?;
        }
        if self.store.current_project().is_none() {
            bail!("no project to work in; create one first");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    let config = DreamCanvasConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))
        .context("invalid configuration")?;

    if let Some(("health", args)) = matches.subcommand() {
        if args.get_flag("watch") {
            return watch_health(&config).await;
        }
        return health(&config).await;
    }

    let workbench = Workbench::open(config)?;
    match matches.subcommand() {
        Some(("projects", _)) => projects(&workbench).await,
        Some(("create", args)) => create(&workbench, required(args, "name")?).await,
        Some(("generate", args)) => generate(&workbench, args).await,
        Some(("status", args)) => {
            let task = workbench.store.reload_task(required(args, "task-id")?).await?;
            print_task(&task)
        }
        Some(("cancel", args)) => {
            let task = workbench.store.cancel_task(required(args, "task-id")?).await?;
            print_task(&task)
        }
        Some(("import-canvas", args)) => {
            let file = args
                .get_one::<PathBuf>("file")
                .context("missing canvas file")?;
            import_canvas(&workbench, required(args, "project-id")?, file).await
        }
        _ => bail!("unknown command; see --help"),
    }
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing <{name}>"))
}

async fn projects(workbench: &Workbench) -> Result<()> {
    workbench.store.initialize().await;
    workbench.check("listing projects")?;

    for summary in workbench.store.projects() {
        println!(
            "{}\t{}\tassets={}\thistory={}\tupdated={}",
            summary.manifest.id,
            summary.manifest.name,
            summary.assets,
            summary.history,
            summary.manifest.updated_at
        );
    }
    Ok(())
}

async fn create(workbench: &Workbench, name: &str) -> Result<()> {
    workbench.store.create_new_project(name).await;
    workbench.check("creating project")?;
    let project = workbench
        .store
        .current_project()
        .context("created project was not opened")?;
    println!("{}", project.manifest.id);
    Ok(())
}

async fn generate(workbench: &Workbench, args: &ArgMatches) -> Result<()> {
    let store = &workbench.store;
    workbench
        .open_project(args.get_one::<String>("project").map(String::as_str))
        .await?;

    let mut request = CreateTaskRequest::new(required(args, "prompt")?);
    request.model = args.get_one::<String>("model").cloned();
    request.size = args.get_one::<String>("size").cloned();
    request.batch = args.get_one::<u32>("batch").copied();
    let timeout = Duration::from_secs(*args.get_one::<u64>("timeout-secs").unwrap_or(&300));

    let client: Arc<dyn TaskClient> = workbench.client.clone();
    let poller = TaskPoller::spawn(store.clone(), client, workbench.config.poll_interval());
    let mut subscription = store.subscribe();

    let task = store.dispatch_task(request).await?;
    println!("submitted {} ({})", task.task_id, task.status);

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    let finished = loop {
        if let Some(current) = store.task(&task.task_id).filter(GenerationTask::is_terminal) {
            break current;
        }
        tokio::select! {
            event = subscription.events.recv() => {
                if event.is_none() {
                    bail!("store closed while waiting for {}", task.task_id);
                }
            }
            () = &mut deadline => {
                bail!("timed out after {}s waiting for {}", timeout.as_secs(), task.task_id);
            }
        }
    };
    poller.shutdown();
    store.unsubscribe(subscription.id);

    store.persist().await;
    workbench.check("saving project")?;

    print_task(&finished)?;
    if let Some(project) = store.current_project() {
        for asset in project
            .assets
            .iter()
            .filter(|asset| asset.id == dc_model::asset_id_for(&finished.task_id))
        {
            println!("asset {} -> {}", asset.id, asset.uri);
        }
    }
    Ok(())
}

async fn import_canvas(workbench: &Workbench, project_id: &str, file: &Path) -> Result<()> {
    let store = &workbench.store;
    workbench.open_project(Some(project_id)).await?;

    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let document: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("{} is not JSON", file.display()))?;

    let debounce = workbench.config.autosave_debounce();
    let autosave = Autosave::spawn(store.clone(), Arc::new(TokioDebouncer::new()), debounce);
    let mut subscription = store.subscribe();

    store.update_canvas(Some(CanvasSnapshot::new(document)));
    if !store.has_unsaved_changes() {
        println!("canvas unchanged");
        return Ok(());
    }

    let limit = debounce + workbench.config.request_timeout();
    let persisted = tokio::time::timeout(limit, async {
        while let Some(event) = subscription.events.recv().await {
            match event {
                StoreEvent::Persisted { checksum } => return Ok(checksum),
                StoreEvent::ErrorChanged if store.error().is_some() => {
                    return Err(anyhow::anyhow!(store.error().unwrap_or_default()));
                }
                _ => {}
            }
        }
        bail!("store closed before the canvas was saved")
    })
    .await
    .context("autosave did not complete in time")??;
    autosave.shutdown();

    println!("saved canvas {persisted}");
    Ok(())
}

async fn health(config: &DreamCanvasConfig) -> Result<()> {
    let probe = HealthProbe::new(&config.api.base_url, config.request_timeout())?;
    match probe.probe().await {
        Ok(status) => {
            println!(
                "online status={} phase={} version={}",
                status.status, status.phase, status.version
            );
            Ok(())
        }
        Err(err) => bail!("offline: {err}"),
    }
}

async fn watch_health(config: &DreamCanvasConfig) -> Result<()> {
    let probe = HealthProbe::new(&config.api.base_url, config.request_timeout())?;
    let monitor = HealthMonitor::spawn(probe, config.health_interval());
    let mut updates = monitor.subscribe();
    let mut last_label = None;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let label = health_label(&updates.borrow_and_update());
                if last_label.as_ref() != Some(&label) {
                    println!("{label}");
                    last_label = Some(label);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    monitor.stop();
    Ok(())
}

fn health_label(health: &BackendHealth) -> String {
    match (&health.status, &health.error) {
        (Some(status), None) => format!("online status={} phase={}", status.status, status.phase),
        (_, Some(error)) => format!("offline: {error}"),
        (None, None) => "unknown".to_string(),
    }
}

fn print_task(task: &GenerationTask) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(task)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn generate_parses_options() {
        let matches = cli()
            .try_get_matches_from([
                "dreamcanvas",
                "generate",
                "future city",
                "--model",
                "sdxl",
                "--batch",
                "2",
            ])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "generate");
        assert_eq!(required(args, "prompt").unwrap(), "future city");
        assert_eq!(args.get_one::<u32>("batch"), Some(&2));
        assert_eq!(args.get_one::<u64>("timeout-secs"), Some(&300));
    }

    #[test]
    fn health_watch_flag_parses() {
        let matches = cli()
            .try_get_matches_from(["dreamcanvas", "health", "--watch"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert!(args.get_flag("watch"));
    }

    #[test]
    fn health_label_reports_transitions() {
        let online = BackendHealth {
            status: Some(dc_client::HealthStatus {
                status: "ok".into(),
                phase: "P1".into(),
                version: "0.1.0".into(),
            }),
            last_checked: Some(1),
            error: None,
        };
        let offline = BackendHealth {
            status: None,
            last_checked: Some(2),
            error: Some("connection refused".into()),
        };
        assert_eq!(health_label(&online), "online status=ok phase=P1");
        assert_eq!(health_label(&offline), "offline: connection refused");
        assert_eq!(health_label(&BackendHealth::default()), "unknown");
    }

    #[test]
    fn config_flag_is_global() {
        let matches = cli()
            .try_get_matches_from(["dreamcanvas", "projects", "--config", "/tmp/dc.toml"])
            .unwrap();
        assert_eq!(
            matches.get_one::<PathBuf>("config"),
            Some(&PathBuf::from("/tmp/dc.toml"))
        );
    }
}
