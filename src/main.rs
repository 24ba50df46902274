//! Hive - 命令行 REPL
//!
//! 入口：初始化日志、加载配置、组装编排图与会话存储，逐行读取用户输入并输出回复。
//! 命令：/trace 打印上一轮推理轨迹，/quit 退出。

use anyhow::Context;
use hive::agent::{build_graph, build_tool_registry, create_session_store, process_message};
use hive::config::load_config;
use hive::llm::create_llm_from_config;
use hive::react::{ReactEvent, ReasoningStep, StepKind};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

fn print_trace(trace: &[ReasoningStep]) {
    if trace.is_empty() {
        println!("(no trace yet)");
        return;
    }
    for (i, step) in trace.iter().enumerate() {
        let line = match &step.kind {
            StepKind::Think { content } => format!("think    {}", content),
            StepKind::Act { tool, args } => format!("act      {} {}", tool, args),
            StepKind::Observe { tool, content, is_error } => {
                let mark = if *is_error { " (error)" } else { "" };
                format!("observe  {}{}: {}", tool, mark, content)
            }
            StepKind::Answer { content } => format!("answer   {}", content),
        };
        println!("{:>2}. [{}] {}", i + 1, step.timestamp.format("%H:%M:%S%.3f"), line);
    }
}

fn describe_event(ev: &ReactEvent) -> Option<String> {
    match ev {
        ReactEvent::Compressed { before, after } => {
            Some(format!("compressed history {} -> {} messages", before, after))
        }
        ReactEvent::Routed {
            destination,
            secondary,
            confidence,
        } => Some(format!(
            "routed to {} (secondary: {:?}, confidence {:.2})",
            destination, secondary, confidence
        )),
        ReactEvent::Thinking {
            iteration,
            max_iterations,
        } => Some(format!("thinking {}/{}", iteration, max_iterations)),
        ReactEvent::ToolCall { tool, args } => Some(format!("calling {} {}", tool, args)),
        ReactEvent::Observation { tool, preview, is_error } => Some(format!(
            "{} {}: {}",
            if *is_error { "failed" } else { "observed" },
            tool,
            preview
        )),
        ReactEvent::Error { text } => Some(format!("error: {}", text)),
        ReactEvent::ThoughtContent { .. } | ReactEvent::Answer { .. } => None,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hive::observability::init();

    let cfg = load_config(None).context("Failed to load configuration")?;
    let store = create_session_store(&cfg).context("Failed to create session store")?;

    let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(ev) = event_rx.recv().await {
            if let Some(text) = describe_event(&ev) {
                eprintln!("  · {}", text);
            }
        }
    });

    let llm = create_llm_from_config(&cfg);
    let graph = build_graph(llm, &cfg, build_tool_registry(&cfg), Some(event_tx));

    let session_id = uuid::Uuid::new_v4().to_string();
    println!("Hive session {} (type /trace or /quit)", session_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut last_trace: Vec<ReasoningStep> = Vec::new();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/trace" => {
                print_trace(&last_trace);
                continue;
            }
            _ => {}
        }

        match process_message(&graph, store.as_ref(), Some(&session_id), input).await {
            Ok(output) => {
                println!("{}", output.answer());
                last_trace = output.state.reasoning_trace;
            }
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                println!("Sorry, the language model is unavailable right now ({}).", e);
                if let Some(record) = e.partial_record() {
                    last_trace = record.reasoning_trace.clone();
                }
            }
        }
    }

    Ok(())
}
