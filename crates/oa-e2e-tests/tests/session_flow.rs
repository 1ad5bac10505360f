//! E2E tests for the happy path: prompt → generate → gate → execute → history.

mod helpers;

use oa_agent::cache::generation_key;
use oa_agent::session::SessionOptions;
use oa_protocol::ContextSnapshot;

use helpers::{TestHarness, output};

/// The canonical flow: a safe command runs without a prompt, its output is
/// cached under the literal command, and history records it.
#[tokio::test]
async fn e2e_list_all_pods() {
    let h = TestHarness::start().await;
    h.reply("get pods|||Lists pods in demo namespace|||1").await;

    let mut session = h.session("list all pods\nexit\n");
    let summary = session.run().await.unwrap();
    let out = output(&session);

    assert_eq!(summary.iterations, 1);
    assert_eq!(summary.executed, 1);
    assert!(out.starts_with("[c1/demo] "));
    assert!(out.contains("Command: oc get pods\n"));
    assert!(out.contains("Explanation: Lists pods in demo namespace\n"));
    assert!(out.contains("Safety Level: 1/5\n"));
    assert!(!out.contains("Execute?"));
    assert!(out.contains("web-7d4b9c6f5d-x2k8p"));

    // Executor output is cached under the command alone.
    let cached = h.execution_cache.get("get pods").unwrap();
    assert!(cached.contains("db-0"));

    // Generation is cached under prompt + context.
    let ctx = ContextSnapshot::new("c1", "demo", "admin", "https://api.c1.example.com:6443");
    let key = generation_key("list all pods", &ctx);
    assert_eq!(h.generation_cache.get(&key).unwrap().command, "get pods");

    let entries = h.history_entries(1).await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].tool, "oc");
    assert_eq!(entries[0].command, "get pods");
}

/// The generator prompt carries the live cluster context.
#[tokio::test]
async fn e2e_context_reaches_generator() {
    let h = TestHarness::start().await;
    h.reply("get pods|||x|||1").await;

    h.session("list all pods\nexit\n").run().await.unwrap();

    let requests = h.server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let system = body["messages"][0]["content"].as_str().unwrap();
    assert!(system.contains("- Cluster: c1"));
    assert!(system.contains("- Namespace: demo"));
    assert!(system.contains("- Server: https://api.c1.example.com:6443"));
    assert_eq!(body["messages"][1]["content"], "list all pods");
}

/// Repeating a prompt makes no second generator request and no second
/// executor call.
#[tokio::test]
async fn e2e_repeat_prompt_hits_both_caches() {
    let h = TestHarness::start().await;
    h.reply("get pods|||x|||1").await;

    let mut session = h.session("list all pods\nlist all pods\nexit\n");
    let summary = session.run().await.unwrap();

    assert_eq!(summary.executed, 2);
    assert_eq!(h.generator_requests().await, 1);
    assert_eq!(h.cli.execution_count("get pods"), 1);
    assert!(output(&session).contains("Output (cached):\n"));
}

/// Two prompts resolving to the same command share the execution cache
/// entry; the cache hit neither re-runs the command nor writes history.
#[tokio::test]
async fn e2e_execution_cache_hit_skips_history() {
    let h = TestHarness::start().await;
    h.cli
        .add_output("get pods -n demo", "NAME    READY   STATUS\nweb-0   1/1     Running\n");
    h.reply_to("list pods in demo", "get pods -n demo|||x|||1").await;
    h.reply_to("show demo pods", "oc get pods -n demo|||x|||1").await;

    let mut first = h.session("list pods in demo\nexit\n");
    first.run().await.unwrap();
    assert_eq!(h.history_entries(1).await.len(), 1);

    let mut second = h.session("show demo pods\nexit\n");
    second.run().await.unwrap();

    assert_eq!(h.generator_requests().await, 2);
    assert_eq!(h.cli.execution_count("get pods -n demo"), 1);

    let out = output(&second);
    assert!(out.contains("Command: oc get pods -n demo\n"));
    assert!(out.contains("Output (cached):\nNAME    READY   STATUS\nweb-0   1/1     Running\n"));

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(h.history.load().await.len(), 1);
}

/// A risky command waits for confirmation; `y` runs it.
#[tokio::test]
async fn e2e_confirmed_risky_command() {
    let h = TestHarness::start().await;
    h.cli.add_output("delete pod web-0", "pod \"web-0\" deleted\n");
    h.reply("delete pod web-0|||Deletes pod web-0|||4").await;

    let mut session = h.session("delete the web pod\ny\nexit\n");
    let summary = session.run().await.unwrap();
    let out = output(&session);

    assert!(out.contains("Safety Level: 4/5\n"));
    assert!(out.contains("Execute? [y/N/r (run/revise)]: "));
    assert!(out.contains("pod \"web-0\" deleted"));
    assert_eq!(summary.executed, 1);

    let entries = h.history_entries(1).await;
    assert_eq!(entries[0].command, "delete pod web-0");
}

/// Revising replaces the generated command; the replacement goes through
/// the execution pipeline (cache + history) without a new generation.
#[tokio::test]
async fn e2e_revised_command() {
    let h = TestHarness::start().await;
    h.reply("delete pods --all|||Deletes every pod|||5").await;

    let mut session = h.session("clean up\nr\noc get pods\nexit\n");
    let summary = session.run().await.unwrap();

    assert_eq!(summary.executed, 1);
    assert_eq!(h.cli.executed(), vec!["get pods".to_string()]);
    assert_eq!(h.generator_requests().await, 1);
    assert!(h.execution_cache.get("get pods").is_some());

    let entries = h.history_entries(1).await;
    assert_eq!(entries[0].command, "get pods");
}

/// `--dry-run` shows the command and never touches the cluster.
#[tokio::test]
async fn e2e_dry_run() {
    let h = TestHarness::start().await;
    h.reply("delete ns staging|||Deletes staging|||5").await;

    let options = SessionOptions {
        dry_run: true,
        auto_confirm: true,
        ..SessionOptions::default()
    };
    let mut session = h.session_with("drop staging\nexit\n", options);
    session.run().await.unwrap();

    assert!(output(&session).contains("Dry run - command not executed"));
    assert!(h.cli.executed().is_empty());
    assert!(h.history.load().await.is_empty());
}

/// The one-shot path runs a single prompt through the same pipelines.
#[tokio::test]
async fn e2e_one_shot_auto_confirmed() {
    let h = TestHarness::start().await;
    h.cli.add_output("scale deploy web --replicas=3", "deployment.apps/web scaled\n");
    h.reply("scale deploy web --replicas=3|||Scales web to 3|||3").await;

    let options = SessionOptions {
        auto_confirm: true,
        ..SessionOptions::default()
    };
    let mut session = h.session_with("", options);
    let summary = session.run_once("scale web to three").await.unwrap();

    assert_eq!(summary.executed, 1);
    assert!(output(&session).contains("deployment.apps/web scaled"));
    assert_eq!(
        h.history_entries(1).await[0].command,
        "scale deploy web --replicas=3"
    );
}
