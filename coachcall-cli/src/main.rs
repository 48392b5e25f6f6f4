use std::time::Duration;

use anyhow::Context;
use coachcall_core::config::AppConfig;
use coachcall_engine::controller::EndedCall;
use coachcall_runtime::config_store::ConfigStore;
use coachcall_runtime::defaults::default_app_config;
use coachcall_runtime::history::HistoryStore;
use coachcall_runtime::runtime_engine::{RuntimeOptions, build_runtime_from_config};

const DEFAULT_CALL_SECS: u64 = 6;

fn env_flag(name: &str) -> Option<bool> {
    let v = std::env::var(name).ok()?;
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn load_config() -> anyhow::Result<(AppConfig, Option<HistoryStore>)> {
    let (mut cfg, history) = match std::env::var("COACHCALL_CONFIG") {
        Ok(path) if !path.trim().is_empty() => {
            let store = ConfigStore::at_path(path);
            let cfg = store.load_or_init()?;
            (cfg, Some(HistoryStore::at_path(store.history_path())))
        }
        _ => (default_app_config(), None),
    };

    if let Ok(v) = std::env::var("COACHCALL_USER_ID") {
        cfg.user_id = v;
    }
    if let Ok(v) = std::env::var("COACHCALL_BACKEND_URL") {
        cfg.backend_base_url = v;
    }
    if let Some(offline) = env_flag("COACHCALL_OFFLINE") {
        cfg.offline_mode = offline;
    }
    Ok((cfg, history))
}

fn ended_line(call: &EndedCall) -> String {
    format!(
        "ended: call_id={} entries={} duration={}s submitted={}",
        call.call_id.as_ref().map(|c| c.as_str()).unwrap_or("-"),
        call.transcript.len(),
        call.duration_seconds,
        call.record_submitted
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (cfg, history) = load_config()?;
    let call_secs = match std::env::var("COACHCALL_CALL_SECS") {
        Ok(v) => v
            .trim()
            .parse::<u64>()
            .with_context(|| format!("invalid COACHCALL_CALL_SECS: {v}"))?,
        Err(_) => DEFAULT_CALL_SECS,
    };

    let rt = build_runtime_from_config(
        cfg,
        RuntimeOptions {
            history,
            simulated_script: None,
        },
    )
    .await?;
    let controller = &rt.controller;

    controller.start().await?;
    tokio::time::sleep(Duration::from_secs(call_secs)).await;

    let status = controller.status().await;
    println!("status={} duration={}s", status.status_label, status.duration_seconds);
    for line in controller.transcript().snapshot().iter() {
        println!("  [{:?}] {}", line.role, line.content);
    }

    controller.stop().await;
    let mut ended = controller.subscribe_ended();
    let reported = tokio::time::timeout(
        Duration::from_secs(10),
        ended.wait_for(|e| e.as_ref().is_some_and(|e| e.session_id == status.session_id)),
    )
    .await
    .is_ok_and(|r| r.is_ok());
    if !reported {
        log::warn!("call did not report its end in time");
    }
    controller.flush().await;

    if let Some(call) = controller.last_call() {
        println!("{}", ended_line(&call));
    }

    if rt.config().offline_mode {
        log::info!("offline mode; skipping results");
        return Ok(());
    }

    match rt.results_request() {
        Some(req) => {
            let results = rt.orchestrator.resolve(&req).await;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        None => println!("no results: the call produced nothing to analyze"),
    }

    Ok(())
}
