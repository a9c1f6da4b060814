pub mod agent_engine;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;

use std::sync::Arc;

use crate::agent_engine::arbiter::{ArbiterConfig, DualModelArbiter};
use crate::agent_engine::engine::{ControlLoop, LoopSettings};
use crate::agent_engine::memory::SharedMemory;
use crate::agent_engine::state::{IterationReport, LoopCommand};
use crate::errors::SeeShotResult;
use crate::executor::dispatcher::DesktopExecutor;
use crate::executor::input::EnigoConnector;
use crate::llm::models::{AimingModel, GameplayModel};
use crate::llm::registry::{ProviderRegistry, Role};
use crate::llm::tools::load_gameplay_tools;
use crate::perception::screenshot::XcapFrameSource;

pub async fn run() -> SeeShotResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let cfg = config::load_config()?;
    let profile = cfg.agent.side.profile();
    tracing::info!(
        side = ?profile.side,
        team_choice = profile.team_choice,
        skin_choice = profile.skin_choice,
        "side profile resolved"
    );

    let registry = ProviderRegistry::from_config(&cfg)?;
    tracing::debug!(providers = ?registry.list_names(), "LLM registry ready");

    let (aim_provider, aim_call) = registry.call_config_for_role(Role::Aiming)?;
    let aiming = AimingModel::new(aim_provider, aim_call, profile.aiming_prompt)?;

    let (gameplay_provider, gameplay_call) = registry.call_config_for_role(Role::Gameplay)?;
    let gameplay = GameplayModel::new(gameplay_provider, gameplay_call, load_gameplay_tools()?);

    let arbiter = DualModelArbiter::new(
        Arc::new(aiming),
        Arc::new(gameplay),
        ArbiterConfig {
            drain_grace: cfg.agent.drain_grace(),
            aiming_timeout: cfg.agent.aiming_timeout(),
            gameplay_timeout: cfg.agent.gameplay_timeout(),
        },
    );

    let executor = Arc::new(DesktopExecutor::new(
        Arc::new(EnigoConnector),
        cfg.agent.click_interval_ms,
    ));
    if cfg.agent.join_team {
        executor.join_team(&profile).await?;
    }
    let frame_source = Arc::new(XcapFrameSource::new(&cfg.capture));
    let memory = SharedMemory::new(cfg.agent.memory_capacity)?;

    let mut control = ControlLoop::new(
        frame_source,
        arbiter,
        executor,
        memory,
        LoopSettings::from_config(&cfg.agent, cfg.compression),
    );

    let stop_tx = control.bus().command_sender();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, stopping after the current iteration");
            let _ = stop_tx.send(LoopCommand::Stop).await;
        }
    });

    let reports = control.run().await;
    log_summary(&reports);
    Ok(())
}

fn log_summary(reports: &[IterationReport]) {
    let aimed = reports.iter().filter(|r| r.coords.is_some()).count();
    let tooled = reports.iter().filter(|r| !r.tool_calls.is_empty()).count();
    let failed = reports.iter().filter(|r| r.error.is_some()).count();
    tracing::info!(
        iterations = reports.len(),
        aimed,
        tool_calls = tooled,
        failed,
        "run summary"
    );
}
