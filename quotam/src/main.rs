mod client;
mod config;
mod errors;
mod manager;
mod retry;
mod sink;

use client::KubeQuotaClient;
use config::Args;
use config::Config;
use errors::Error;
use manager::QuotaManager;
use sink::LogSink;

use clap::Parser;
use kube::Client as KubeClient;
use log;
use std::process::ExitCode;
use std::sync::Arc;

async fn start(args: Args) -> Result<(), Error> {
    let conf = Config::try_from(args)?;
    let kube_client = KubeClient::try_default().await?;

    let mgr = QuotaManager::new(Arc::new(KubeQuotaClient::new(kube_client)), conf, Arc::new(LogSink));
    tokio::select! {
	res = mgr.serve() => res,

	// handle CTRL^C as gracefully as we can.
	_ = tokio::signal::ctrl_c() => {
	    log::info!("interrupted, shutting down");
	    Ok(())
	},
    }
}

/*
 * quotam watches namespaces and creates the default ResourceQuota in every
 * active one that is selected and not excluded.
 *
 * Any fatal error (cluster unreachable, watch error, failed create) ends the
 * process with a non-zero status. When the API server closes the watch a
 * new one is opened, so the process otherwise runs until interrupted.
 */
#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Err(err) = start(args).await {
	log::error!("quota manager failed: {}", err);
	return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
