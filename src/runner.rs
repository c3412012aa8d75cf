use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use bypass_hunter::bypass::{BypassEngine, BypassTarget, Catalog, CandidateRecord, TargetUrl};
use bypass_hunter::output::{print_bypass_report, read_candidates, write_results};
use bypass_hunter::Config;

use crate::cli::{Cli, Commands, Tuning};

fn init_tracing(debug: bool, verbose: bool) {
    // Keep reqwest/hyper at INFO so per-probe traffic does not flood the CLI.
    use tracing_subscriber::EnvFilter;
    let crate_level = if debug { "debug" } else if verbose { "info" } else { "warn" };
    let filter_str = format!("bypass_hunter={crate},reqwest=info,hyper=info,h2=info", crate = crate_level);
    let env_filter = EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new(crate_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(true)
        .with_target(false)
        .init();
}

pub async fn run_from_cli(cli: Cli) -> anyhow::Result<()> {
    init_tracing(cli.debug, cli.verbose);

    match cli.command {
        Commands::Run { input, out, tuning } => run_batch(&input, out, &tuning).await,
        Commands::Probe { url, status, tuning } => probe_single(url, status, &tuning).await,
        Commands::Techniques { url, catalog } => list_techniques(&url, catalog.as_deref()),
    }
}

fn build_config(tuning: &Tuning) -> anyhow::Result<Config> {
    let mut config = match &tuning.config {
        Some(path) => Config::from_file(path).with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(c) = tuning.concurrency {
        config.concurrency = c;
    }
    if let Some(t) = tuning.timeout {
        config.timeout_secs = t;
    }
    if let Some(d) = tuning.delay {
        config.technique_delay_ms = d;
    }
    if let Some(methods) = &tuning.methods {
        config.fallback_methods = methods.clone();
    }
    if let Some(catalog) = &tuning.catalog {
        config.catalog_path = Some(catalog.clone());
    }
    config.validate()?;
    Ok(config)
}

async fn run_batch(input: &Path, out: Option<PathBuf>, tuning: &Tuning) -> anyhow::Result<()> {
    let config = build_config(tuning)?;
    let records = read_candidates(input).with_context(|| format!("reading candidates from {}", input.display()))?;
    let engine = BypassEngine::new(&config)?;

    let targets = BypassEngine::select_targets(&records);
    println!("[>] Candidates: {} ({} restricted)", records.len(), targets.len());
    println!("[~] Techniques: {} (concurrency: {})", engine.prober().catalog().len(), config.concurrency);
    if targets.is_empty() {
        println!("[*] No 403/401 responses to attempt bypass on");
        return Ok(());
    }

    let started = Instant::now();
    let results = engine.run_targets(targets).await;
    let stats = engine.prober().stats();
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        catalog_requests = stats.catalog_requests,
        fallback_requests = stats.fallback_requests,
        transport_errors = stats.transport_errors,
        peak_in_flight = engine.pool().peak_in_flight(),
        "batch finished"
    );

    print_bypass_report(&results);

    if let Some(path) = out {
        write_results(&path, &results).with_context(|| format!("writing {}", path.display()))?;
        println!("[=] Results saved to: {}", path.display());
    }
    Ok(())
}

async fn probe_single(url: String, status: u16, tuning: &Tuning) -> anyhow::Result<()> {
    anyhow::ensure!(
        BypassTarget::is_restricted(status),
        "only 401 and 403 responses are probed, got {}",
        status
    );
    let config = build_config(tuning)?;
    let engine = BypassEngine::new(&config)?;
    let results = engine.run(&[CandidateRecord { url, status }]).await;
    print_bypass_report(&results);
    Ok(())
}

fn list_techniques(url: &str, catalog: Option<&Path>) -> anyhow::Result<()> {
    let target = TargetUrl::parse(url)?;
    let catalog = match catalog {
        Some(path) => Catalog::from_file(path)?,
        None => Catalog::standard(),
    };
    for (i, request) in catalog.instantiate(&target).iter().enumerate() {
        println!("{:>2}. {}", i + 1, request.name);
        println!("    GET {}", request.url);
        for (name, value) in request.headers.iter() {
            println!("    {}: {}", name, value.to_str().unwrap_or("<binary>"));
        }
    }
    Ok(())
}
