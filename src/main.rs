use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::info;

use seqdock::config::{Cli, Command, Settings};
use seqdock::db::open::open_db;
use seqdock::http::{create_router, AppState};
use seqdock::submit::orchestrator::Orchestrator;
use seqdock::tree::build_tree;
use seqdock::worker::http::HttpWorker;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("terve! starting up :)");

    let cli = Cli::parse();
    match cli.command {
        Command::Serve => serve(&cli.settings).await,
        Command::Tree { dir, name } => {
            let name = match name {
                Some(name) => name,
                None => dir
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .ok_or_else(|| anyhow!("can't name the root of {}", dir.display()))?,
            };
            let tree = build_tree(&dir, &name, &cli.settings.data_dir, cli.settings.tree_limits())
                .with_context(|| format!("walking {}", dir.display()))?
                .ok_or_else(|| anyhow!("{} does not exist", dir.display()))?;
            println!("{}", serde_json::to_string_pretty(&tree)?);
            Ok(())
        }
        Command::Submit { project } => {
            let handle = orchestrator(&cli.settings)?.submit(project).await?;
            println!("{}", serde_json::to_string_pretty(&handle)?);
            Ok(())
        }
        Command::Rerun { project } => {
            let handle = orchestrator(&cli.settings)?.rerun(project).await?;
            println!("{}", serde_json::to_string_pretty(&handle)?);
            Ok(())
        }
        Command::Status { project } => {
            let status = orchestrator(&cli.settings)?.refresh(project).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
    }
}

fn orchestrator(settings: &Settings) -> Result<Orchestrator> {
    let wd = settings.working_directory();
    let store = open_db(&wd).context("opening the record store")?;
    let worker = HttpWorker::new(settings.worker_url.clone());
    Ok(Orchestrator::new(Arc::new(store), Arc::new(worker), wd, settings.stability()))
}

async fn serve(settings: &Settings) -> Result<()> {
    let wd = settings.working_directory();
    let store = Arc::new(open_db(&wd).context("opening the record store")?);
    let worker = Arc::new(HttpWorker::new(settings.worker_url.clone()));
    let orchestrator = Arc::new(Orchestrator::new(store.clone(), worker, wd.clone(), settings.stability()));

    tokio::fs::create_dir_all(&settings.upload_tmp)
        .await
        .with_context(|| format!("creating {}", settings.upload_tmp.display()))?;

    let state = AppState {
        store,
        orchestrator,
        wd,
        upload_tmp: settings.upload_tmp.clone(),
        tree_limits: settings.tree_limits(),
    };

    let listener = tokio::net::TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("binding {}", settings.bind))?;
    info!("Listening on {}", settings.bind);
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
