use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use vm_console::constants::{defaults, polling};
use vm_console::{
    ConfigManager, CronClock, ExecutionMonitor, HttpTransport, JobKey, Notifier,
    OperationDispatcher, PollRegistry, ReportExporter, ReportKind, Schedule, ScheduleStore,
    SnapshotLifecycle, VmApi, VmOperation,
};

#[derive(Parser)]
#[command(name = "vm-console", version, about = "Operate VMs through their subscription")]
struct Cli {
    /// Directory holding main.toml
    #[arg(long, default_value = defaults::CONFIG_DIR)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// CRON helpers
    Cron {
        #[command(subcommand)]
        command: CronCommand,
    },
    /// Recurring operations of a VM
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommand,
    },
    /// Execute a power operation now
    Execute {
        vm: String,
        operation: VmOperation,
        /// Follow the execution until the VM reports completion
        #[arg(long)]
        track: bool,
    },
    /// Snapshots of a VM
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommand,
    },
    /// Download CSV history reports
    Report {
        #[command(subcommand)]
        command: ReportCommand,
        /// Directory receiving the file
        #[arg(long, global = true, default_value = ".")]
        output: PathBuf,
    },
}

#[derive(Subcommand)]
enum CronCommand {
    /// Print the next fire times of an expression
    Next {
        expression: String,
        #[arg(long, default_value_t = 5)]
        count: usize,
    },
}

#[derive(Subcommand)]
enum ScheduleCommand {
    List {
        vm: String,
    },
    /// Create a schedule, or update it when --id is given
    Save {
        vm: String,
        operation: VmOperation,
        /// Quartz-style CRON, 6 or 7 fields
        #[arg(long, default_value = defaults::CRON)]
        cron: String,
        #[arg(long)]
        id: Option<u32>,
    },
    Delete {
        vm: String,
        id: u32,
    },
}

#[derive(Subcommand)]
enum SnapshotCommand {
    List {
        vm: String,
    },
    Create {
        vm: String,
        /// Stop the VM before taking the snapshot
        #[arg(long)]
        stop: bool,
    },
    Delete {
        vm: String,
        snapshot: String,
    },
    Restore {
        vm: String,
        snapshot: String,
    },
    /// Follow a pending snapshot job, if any
    Watch {
        vm: String,
    },
}

#[derive(Subcommand)]
enum ReportCommand {
    /// Execution history of a VM
    Executions { vm: String },
    /// Schedules of all the VMs of a node, e.g. service:vm:vcloud
    Schedules { node: String },
}

struct Services {
    api: VmApi,
    registry: PollRegistry,
    notifier: Notifier,
}

impl Services {
    async fn load(config_dir: &Path) -> Result<Self> {
        let config_manager = ConfigManager::new(config_dir)
            .await
            .with_context(|| format!("Failed to load configuration from {}", config_dir.display()))?;
        let config = config_manager.get_current_config();

        let transport = HttpTransport::new(&config).context("Failed to create HTTP transport")?;
        let api = VmApi::new(Arc::new(transport));
        let registry = PollRegistry::new(config.poll_interval());
        let notifier = Notifier::new();

        let mut receiver = notifier.subscribe();
        tokio::spawn(async move {
            while let Ok(notification) = receiver.recv().await {
                info!("{:?}", notification);
            }
        });

        Ok(Self {
            api,
            registry,
            notifier,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::from_default_env()
        .add_directive("vm_console=info".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Cron { command } => run_cron(command),
        Command::Schedule { command } => run_schedule(Services::load(&cli.config).await?, command).await,
        Command::Execute {
            vm,
            operation,
            track,
        } => run_execute(Services::load(&cli.config).await?, &vm, operation, track).await,
        Command::Snapshot { command } => run_snapshot(Services::load(&cli.config).await?, command).await,
        Command::Report { command, output } => {
            run_report(Services::load(&cli.config).await?, command, &output).await
        }
    }
}

fn run_cron(command: CronCommand) -> Result<()> {
    match command {
        CronCommand::Next { expression, count } => {
            for time in CronClock::next_fire_times(&expression, Utc::now(), count)? {
                println!("{}", time.to_rfc3339());
            }
        }
    }
    Ok(())
}

async fn run_schedule(services: Services, command: ScheduleCommand) -> Result<()> {
    match command {
        ScheduleCommand::List { vm } => {
            let store = ScheduleStore::new(vm, services.api, services.notifier);
            store.reload().await?;
            for schedule in store.list().await {
                let next = schedule
                    .next_fire()
                    .map(|time| time.to_rfc3339())
                    .unwrap_or_else(|e| format!("invalid ({})", e));
                println!(
                    "{:>6}  {:<8}  {:<24}  next: {}",
                    schedule.id.map(|id| id.to_string()).unwrap_or_default(),
                    schedule.operation,
                    schedule.cron,
                    next
                );
            }
        }
        ScheduleCommand::Save {
            vm,
            operation,
            cron,
            id,
        } => {
            let store = ScheduleStore::new(vm, services.api, services.notifier);
            let mut schedule = Schedule::new(operation, cron);
            schedule.id = id;
            let saved = store.upsert(schedule).await?;
            println!(
                "Saved schedule {} ({} '{}')",
                saved.id.unwrap_or_default(),
                saved.operation,
                saved.cron
            );
        }
        ScheduleCommand::Delete { vm, id } => {
            let store = ScheduleStore::new(vm, services.api, services.notifier);
            store.remove(id).await?;
            println!(
                "Deleted schedule {} of {}, {} left",
                id,
                store.vm_id(),
                store.list().await.len()
            );
        }
    }
    Ok(())
}

async fn run_execute(
    services: Services,
    vm: &str,
    operation: VmOperation,
    track: bool,
) -> Result<()> {
    let dispatcher = OperationDispatcher::new(services.api.clone(), services.notifier.clone());
    let submission = dispatcher.execute(vm, operation).await?;
    println!("{} accepted for {}", submission.operation, submission.vm_id);

    if track {
        let monitor = ExecutionMonitor::new(services.api, services.registry.clone(), services.notifier);
        monitor.track(vm).await;
        wait_for(&services.registry, &JobKey::execution(vm).to_string()).await;
        if let Some(task) = monitor.latest(vm).await {
            println!(
                "Execution {}",
                if task.failed { "failed" } else { "finished" }
            );
        }
        if let Some(configuration) = monitor.configuration(vm).await {
            println!("{} schedules configured", configuration.schedules.len());
        }
    }
    Ok(())
}

async fn run_snapshot(services: Services, command: SnapshotCommand) -> Result<()> {
    let vm = match &command {
        SnapshotCommand::List { vm }
        | SnapshotCommand::Create { vm, .. }
        | SnapshotCommand::Delete { vm, .. }
        | SnapshotCommand::Restore { vm, .. }
        | SnapshotCommand::Watch { vm } => vm.clone(),
    };
    let lifecycle = SnapshotLifecycle::new(
        vm,
        services.api,
        services.registry.clone(),
        services.notifier,
    );

    match command {
        SnapshotCommand::List { .. } => {
            lifecycle.reload().await?;
            print_snapshots(&lifecycle).await;
        }
        SnapshotCommand::Create { stop, .. } => {
            lifecycle.create(stop).await?;
            follow_snapshot(&lifecycle, &services.registry).await;
        }
        SnapshotCommand::Delete { snapshot, .. } => {
            lifecycle.reload().await?;
            lifecycle.delete(&snapshot).await?;
            follow_snapshot(&lifecycle, &services.registry).await;
        }
        SnapshotCommand::Restore { snapshot, .. } => {
            lifecycle.restore(&snapshot).await?;
            println!("Restoring {} from {}", lifecycle.vm_id(), snapshot);
        }
        SnapshotCommand::Watch { .. } => {
            lifecycle.load().await?;
            if lifecycle.is_polling().await {
                lifecycle.check_now().await?;
            }
            if lifecycle.is_polling().await {
                follow_snapshot(&lifecycle, &services.registry).await;
            } else {
                println!("No pending snapshot for {}", lifecycle.vm_id());
            }
        }
    }
    Ok(())
}

async fn run_report(services: Services, command: ReportCommand, output: &Path) -> Result<()> {
    let kind = match command {
        ReportCommand::Executions { vm } => ReportKind::Executions { vm_id: vm },
        ReportCommand::Schedules { node } => ReportKind::Schedules { node_id: node },
    };
    let path = ReportExporter::new(services.api).export(&kind, output).await?;
    println!("{}", path.display());
    Ok(())
}

async fn follow_snapshot(lifecycle: &SnapshotLifecycle, registry: &PollRegistry) {
    let key = lifecycle.key().to_string();
    let mut last_progress = None;

    while registry.is_active(&key).await {
        let progress = lifecycle.progress().await;
        if progress.is_some() && progress != last_progress {
            if let Some(progress) = &progress {
                println!("{}", progress);
            }
            last_progress = progress;
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, no longer following {}", key);
                registry.stop_all().await;
                return;
            }
            _ = sleep(polling::IDLE_WAIT_INTERVAL) => {}
        }
    }

    if let Some(outcome) = lifecycle.last_outcome().await {
        println!("Snapshot job ended: {:?}", outcome);
    }
    print_snapshots(lifecycle).await;
}

async fn wait_for(registry: &PollRegistry, key: &str) {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, no longer following {}", key);
            registry.stop_all().await;
        }
        _ = registry.wait_idle(key, polling::IDLE_WAIT_INTERVAL) => {}
    }
}

async fn print_snapshots(lifecycle: &SnapshotLifecycle) {
    for row in lifecycle.table().rows().await {
        let snapshot = &row.snapshot;
        println!(
            "{:<24}  {:<10}  {:<24}  {}",
            snapshot.id.as_deref().unwrap_or("-"),
            format!("{:?}", snapshot.state()).to_lowercase(),
            snapshot.name.as_deref().unwrap_or(""),
            snapshot.status_text.as_deref().unwrap_or("")
        );
    }
}
