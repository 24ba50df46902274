//! 编排集成测试：Mock LLM 驱动完整的 Router -> ReasoningLoop -> SessionStore 链路

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value;

    use hive::agent::process_message;
    use hive::core::{GraphBuilder, FALLBACK_RESPONSE};
    use hive::llm::MockLlmClient;
    use hive::memory::{InMemorySessionStore, JsonFileSessionStore, Role, SessionStore};
    use hive::react::{LoopState, ReactConfig, ABORTED_PREFIX};
    use hive::router::Domain;
    use hive::tools::{Tool, ToolRegistry};

    struct StockLookup;

    #[async_trait]
    impl Tool for StockLookup {
        fn name(&self) -> &str {
            "stock_lookup"
        }

        fn description(&self) -> &str {
            "Current stock for a SKU. Args: {\"sku\": \"A-12\"}"
        }

        fn domain(&self) -> Option<Domain> {
            Some(Domain::Erp)
        }

        async fn execute(&self, args: Value) -> Result<String, String> {
            match args.get("sku").and_then(|v| v.as_str()) {
                Some("A-12") => Ok("A-12: 12 units in warehouse 3".to_string()),
                Some(other) => Err(format!("unknown sku {}", other)),
                None => Err("missing sku".to_string()),
            }
        }
    }

    struct TicketSearch;

    #[async_trait]
    impl Tool for TicketSearch {
        fn name(&self) -> &str {
            "ticket_search"
        }

        fn description(&self) -> &str {
            "Search IT tickets"
        }

        fn domain(&self) -> Option<Domain> {
            Some(Domain::ItOps)
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            Ok("no open tickets".to_string())
        }
    }

    fn tools() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(TicketSearch);
        registry.register(StockLookup);
        registry
    }

    const ROUTE_ERP: &str = r#"{"destination":"erp_agent","reasoning":"inventory question","secondary_domains":["it_ops_agent"],"confidence":0.85}"#;

    #[tokio::test]
    async fn test_two_turns_share_history_through_store() {
        let llm = Arc::new(MockLlmClient::with_responses([
            ROUTE_ERP,
            r#"{"reasoning":"look up stock","action":"tool","tool":"stock_lookup","args":{"sku":"A-12"}}"#,
            "```json\n{\"reasoning\":\"have it\",\"action\":\"answer\",\"response\":\"There are 12 units of A-12.\"}\n```",
            ROUTE_ERP,
            r#"{"reasoning":"from history","action":"answer","response":"Warehouse 3."}"#,
        ]));
        let graph = GraphBuilder::new(llm.clone()).with_tools(tools()).build();
        let store = InMemorySessionStore::new();

        let first = process_message(&graph, &store, Some("sess-1"), "How many A-12 do we have?")
            .await
            .unwrap();
        assert_eq!(first.answer(), "There are 12 units of A-12.");
        assert_eq!(first.loop_state, LoopState::Answered);
        assert_eq!(first.state.tool_call_count, 1);
        assert_eq!(first.record.completion_calls, 3);

        // 工具列表：主领域工具在前，次要领域工具标注为 related
        let loop_prompt = &llm.recorded_prompts()[1];
        let system = &loop_prompt[0].content;
        assert!(system.find("stock_lookup").unwrap() < system.find("ticket_search").unwrap());
        assert!(system.contains("[related: it_ops]"));

        let second = process_message(&graph, &store, Some("sess-1"), "Which warehouse?")
            .await
            .unwrap();
        assert_eq!(second.answer(), "Warehouse 3.");
        let roles: Vec<Role> = second.state.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);

        let turns = store.list_turns("sess-1").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].reasoning_trace.len(), 5);
        assert_eq!(turns[1].current_agent, "erp_agent");
    }

    #[tokio::test]
    async fn test_unconfident_route_answers_with_clarification() {
        let llm = Arc::new(MockLlmClient::with_responses([
            r#"{"destination":"hr_agent","reasoning":"maybe","confidence":0.05}"#,
        ]));
        let graph = GraphBuilder::new(llm.clone()).with_tools(tools()).build();
        let store = InMemorySessionStore::new();

        let out = process_message(&graph, &store, None, "hmm").await.unwrap();
        assert_eq!(out.answer(), FALLBACK_RESPONSE);
        assert_eq!(out.state.confidence, 0.0);
        assert_eq!(llm.call_count(), 1);
        // 无 session_id 的调用不写入存储
        assert!(store.load_messages("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_turn_is_persisted_to_json_store() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::always(
            r#"{"reasoning":"again","action":"tool","tool":"stock_lookup","args":{"sku":"Z-9"}}"#,
        ));
        llm.push_text(ROUTE_ERP);
        let graph = GraphBuilder::new(llm.clone())
            .with_tools(tools())
            .with_react(ReactConfig {
                max_iterations: 3,
                ..ReactConfig::default()
            })
            .build();
        let store = JsonFileSessionStore::new(dir.path());

        let out = process_message(&graph, &store, Some("sess-2"), "stock of Z-9?")
            .await
            .unwrap();
        assert_eq!(out.loop_state, LoopState::Exhausted);
        assert_eq!(out.state.reasoning_trace.len(), 3 * 3 + 1);
        assert!(out
            .answer()
            .ends_with("Error executing `stock_lookup`: unknown sku Z-9"));

        let history = store.load_messages("sess-2").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, out.answer());
        assert!(dir.path().join("sess-2.json").exists());
    }

    #[tokio::test]
    async fn test_completion_outage_is_single_error_and_still_persisted() {
        let llm = Arc::new(MockLlmClient::with_responses([ROUTE_ERP]));
        llm.push_failure("connection reset");
        let graph = GraphBuilder::new(llm).with_tools(tools()).build();
        let store = InMemorySessionStore::new();

        let err = process_message(&graph, &store, Some("sess-3"), "stock?")
            .await
            .unwrap_err();
        assert!(err.is_completion_failure());

        let turns = store.list_turns("sess-3").await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].loop_state, LoopState::Failed);
        let history = store.load_messages("sess-3").await.unwrap();
        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert!(history[1].content.starts_with(ABORTED_PREFIX));
    }

    #[tokio::test]
    async fn test_outage_after_tool_call_keeps_audit_trail() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::with_responses([
            ROUTE_ERP,
            r#"{"reasoning":"look up stock","action":"tool","tool":"stock_lookup","args":{"sku":"A-12"}}"#,
        ]));
        llm.push_failure("upstream 502");
        let graph = GraphBuilder::new(llm.clone()).with_tools(tools()).build();
        let store = JsonFileSessionStore::new(dir.path());

        let err = process_message(&graph, &store, Some("sess-4"), "How many A-12 do we have?")
            .await
            .unwrap_err();
        assert!(err.is_completion_failure());
        assert_eq!(llm.call_count(), 3);

        let turns = store.list_turns("sess-4").await.unwrap();
        assert_eq!(turns.len(), 1);
        let turn = &turns[0];
        let labels: Vec<&str> = turn.reasoning_trace.iter().map(|s| s.label()).collect();
        assert_eq!(labels, vec!["think", "act", "observe", "answer"]);
        assert_eq!(turn.tool_call_count, 1);
        assert_eq!(turn.completion_calls, 3);
        assert_eq!(turn.loop_state, LoopState::Failed);
        assert_eq!(turn.current_agent, "erp_agent");

        // 下一轮能看到失败轮次的问题与说明
        let history = store.load_messages("sess-4").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "How many A-12 do we have?");
        assert!(history[1].content.contains("upstream 502"));
    }

    #[tokio::test]
    async fn test_corrupt_session_file_does_not_block_persistence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sess-5.json"), "[{\"truncated\":").unwrap();
        let llm = Arc::new(MockLlmClient::with_responses([
            ROUTE_ERP,
            r#"{"reasoning":"known","action":"answer","response":"12 units."}"#,
            ROUTE_ERP,
            r#"{"reasoning":"history","action":"answer","response":"Still 12."}"#,
        ]));
        let graph = GraphBuilder::new(llm).with_tools(tools()).build();
        let store = JsonFileSessionStore::new(dir.path());

        process_message(&graph, &store, Some("sess-5"), "A-12 stock?").await.unwrap();
        let second = process_message(&graph, &store, Some("sess-5"), "And now?").await.unwrap();

        assert_eq!(second.state.messages.len(), 4);
        assert_eq!(store.list_turns("sess-5").await.unwrap().len(), 2);
    }
}
