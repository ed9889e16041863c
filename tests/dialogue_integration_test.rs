//! 单轮对话集成测试：Mock LLM + 内存实现的 Gmail / Calendar / 长期记忆

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use chrono_tz::Tz;
    use serde_json::json;

    use jarvis::core::ToolError;
    use jarvis::dialogue::{AgentContext, DialogueController};
    use jarvis::llm::{Completion, MockLlmClient, ToolCall};
    use jarvis::memory::{
        InMemoryStore, MemoryError, MemoryRecord, MemoryStore, Message, Role,
    };
    use jarvis::services::{
        CalendarEvent, CalendarService, MailMessage, MailService, NewEvent, OutgoingMail,
        ServiceError,
    };
    use jarvis::tools::{
        CalendarTools, MailSendTool, MailUnreadTool, ToolExecutor, ToolRegistry,
    };

    #[derive(Default)]
    struct RecordingMail {
        sent: Mutex<Vec<OutgoingMail>>,
    }

    #[async_trait]
    impl MailService for RecordingMail {
        async fn send(&self, mail: &OutgoingMail) -> Result<String, ServiceError> {
            let mut sent = self.sent.lock().unwrap();
            sent.push(mail.clone());
            Ok(format!("msg-{}", sent.len()))
        }

        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<MailMessage>, ServiceError> {
            Ok(vec![])
        }

        async fn unread(&self, _limit: usize) -> Result<Vec<MailMessage>, ServiceError> {
            Ok(vec![MailMessage {
                id: "m1".into(),
                from: Some("pepper@stark.com".into()),
                subject: Some("Board meeting".into()),
                date: None,
                body: Some("Friday at ten.".into()),
            }])
        }
    }

    #[derive(Default)]
    struct RecordingCalendar {
        created: Mutex<Vec<NewEvent>>,
    }

    #[async_trait]
    impl CalendarService for RecordingCalendar {
        async fn upcoming(&self, _limit: usize) -> Result<Vec<CalendarEvent>, ServiceError> {
            Ok(vec![CalendarEvent {
                id: "e1".into(),
                summary: "Expo keynote".into(),
                start: "2025-09-10T10:00:00Z".into(),
                end: None,
                location: None,
                description: None,
            }])
        }

        async fn search(
            &self,
            _query: &str,
            _limit: usize,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> Result<Vec<CalendarEvent>, ServiceError> {
            Ok(vec![])
        }

        async fn create(&self, event: &NewEvent) -> Result<CalendarEvent, ServiceError> {
            self.created.lock().unwrap().push(event.clone());
            Ok(CalendarEvent {
                id: "created-1".into(),
                summary: event.summary.clone(),
                start: event.start.to_rfc3339(),
                end: Some(event.end.to_rfc3339()),
                location: None,
                description: None,
            })
        }

        async fn delete(&self, _event_id: &str) -> Result<(), ServiceError> {
            Ok(())
        }
    }

    /// 按开关让 search / add 失败；add 记录收到的交互
    #[derive(Default)]
    struct FlakyMemory {
        fail_search: bool,
        fail_add: bool,
        added: Mutex<Vec<(Vec<Message>, String)>>,
    }

    #[async_trait]
    impl MemoryStore for FlakyMemory {
        async fn search(
            &self,
            _query: &str,
            _user_id: &str,
            _limit: usize,
        ) -> Result<Vec<MemoryRecord>, MemoryError> {
            if self.fail_search {
                return Err(MemoryError::Backend("index offline".into()));
            }
            Ok(vec![])
        }

        async fn add(
            &self,
            interaction: &[Message],
            user_id: &str,
        ) -> Result<Vec<MemoryRecord>, MemoryError> {
            self.added
                .lock()
                .unwrap()
                .push((interaction.to_vec(), user_id.to_string()));
            if self.fail_add {
                return Err(MemoryError::Backend("disk full".into()));
            }
            Ok(vec![MemoryRecord::new(user_id, "saved")])
        }
    }

    struct Harness {
        llm: Arc<MockLlmClient>,
        mail: Arc<RecordingMail>,
        calendar: Arc<RecordingCalendar>,
        controller: DialogueController,
    }

    fn harness(replies: Vec<Completion>, memory: Arc<dyn MemoryStore>) -> Harness {
        let llm = Arc::new(MockLlmClient::scripted(replies.into_iter().map(Ok)));
        let mail = Arc::new(RecordingMail::default());
        let calendar = Arc::new(RecordingCalendar::default());

        let mail_service: Arc<dyn MailService> = mail.clone();
        let calendar_service: Arc<dyn CalendarService> = calendar.clone();
        let calendar_tools = CalendarTools::new(Some(calendar_service), 10, 30, "UTC")
            .with_now(Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap());

        let mut registry = ToolRegistry::new();
        registry.register(MailSendTool::new(Some(mail_service.clone()))).unwrap();
        registry.register(MailUnreadTool::new(Some(mail_service), 5)).unwrap();
        registry.register(calendar_tools.upcoming()).unwrap();
        registry.register(calendar_tools.create()).unwrap();
        let executor = Arc::new(ToolExecutor::new(registry, 10));

        let ctx = AgentContext::new(llm.clone(), memory, executor).with_user_id("tony");
        Harness {
            llm,
            mail,
            calendar,
            controller: DialogueController::new(ctx),
        }
    }

    fn send_call() -> ToolCall {
        ToolCall::new(
            "mail_send",
            json!({"to": "happy@stark.com", "subject": "Car", "body": "Bring the Audi."}),
        )
    }

    #[tokio::test]
    async fn test_direct_text_is_returned_untouched() {
        let reply = "  Good evening, sir.\nAll systems nominal.  ";
        let mut h = harness(
            vec![Completion::text(reply)],
            Arc::new(InMemoryStore::default()),
        );
        let outcome = h.controller.answer_turn("status?").await;

        assert_eq!(outcome.answer, reply);
        assert!(outcome.tool_results.is_empty());
        let requests = h.llm.requests();
        assert_eq!(requests.len(), 1, "refiner must not run without tool calls");
        let tools = requests[0].tool_names.clone().unwrap();
        assert!(tools.contains(&"mail_send".to_string()));
    }

    #[tokio::test]
    async fn test_text_is_ignored_when_tool_calls_present() {
        let mut first = Completion::tool_calls(vec![ToolCall::new("mail_unread", json!({}))]);
        first.text = "I will not be shown".into();
        let mut h = harness(
            vec![first, Completion::text("One unread mail from Pepper, sir.")],
            Arc::new(InMemoryStore::default()),
        );
        let answer = h.controller.answer("any mail?").await;
        assert_eq!(answer, "One unread mail from Pepper, sir.");
    }

    #[tokio::test]
    async fn test_tool_results_keep_request_order() {
        let calls = vec![
            ToolCall::new("calendar_upcoming", json!({})),
            ToolCall::new("mail_unread", json!({})),
            ToolCall::new("calendar.upcoming", json!({"limit": 1})),
        ];
        let mut h = harness(
            vec![Completion::tool_calls(calls.clone()), Completion::text("Summary")],
            Arc::new(InMemoryStore::default()),
        );
        let outcome = h.controller.answer_turn("what's on today?").await;

        let executed: Vec<ToolCall> = outcome.tool_results.iter().map(|r| r.call.clone()).collect();
        assert_eq!(executed, calls);
        assert!(outcome.tool_results.iter().all(|r| r.is_ok()));

        let refine_prompt = &h.llm.requests()[1].messages[1].content;
        let first = refine_prompt.find("[calendar_upcoming]").unwrap();
        let second = refine_prompt.find("[mail_unread]").unwrap();
        let third = refine_prompt.find("[calendar.upcoming]").unwrap();
        assert!(first < second && second < third);
    }

    #[tokio::test]
    async fn test_unknown_tool_only_fails_its_own_call() {
        let calls = vec![
            ToolCall::new("mail_unread", json!({})),
            ToolCall::new("suit.deploy", json!({"mark": 42})),
            ToolCall::new("calendar_upcoming", json!({})),
        ];
        let mut h = harness(
            vec![Completion::tool_calls(calls), Completion::text("Done")],
            Arc::new(InMemoryStore::default()),
        );
        let outcome = h.controller.answer_turn("brief me").await;

        assert_eq!(outcome.answer, "Done");
        assert_eq!(outcome.tool_results.len(), 3);
        assert!(outcome.tool_results[0].output.contains("Board meeting"));
        assert_eq!(
            outcome.tool_results[1].error,
            Some(ToolError::NotFound("suit.deploy".into()))
        );
        assert!(outcome.tool_results[2].output.contains("Expo keynote"));

        let refine_prompt = &h.llm.requests()[1].messages[1].content;
        assert!(refine_prompt.contains("Error: Tool not found: suit.deploy"));
        assert!(refine_prompt.contains("Expo keynote"));
    }

    #[tokio::test]
    async fn test_calendar_create_defaults_end_to_one_hour_later() {
        let call = ToolCall::new(
            "calendar_create",
            json!({
                "summary": "Mark 42 test flight",
                "start": "8th Sep 2025 at 23:30",
                "timezone": "Asia/Kolkata"
            }),
        );
        let mut h = harness(
            vec![Completion::tool_calls(vec![call]), Completion::text("Scheduled, sir.")],
            Arc::new(InMemoryStore::default()),
        );
        h.controller.answer("schedule the test flight").await;

        let created = h.calendar.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        let event = &created[0];
        let kolkata: Tz = "Asia/Kolkata".parse().unwrap();
        assert_eq!(event.start, kolkata.with_ymd_and_hms(2025, 9, 8, 23, 30, 0).unwrap());
        assert_eq!(event.end - event.start, Duration::hours(1));
        assert_eq!(event.end.timezone(), kolkata);
        assert_eq!(event.end.to_rfc3339(), "2025-09-09T00:30:00+05:30");
    }

    #[tokio::test]
    async fn test_unparseable_date_fails_only_that_call() {
        let calls = vec![
            ToolCall::new("calendar_create", json!({"summary": "x", "start": "after the party"})),
            ToolCall::new("calendar_upcoming", json!({})),
        ];
        let mut h = harness(
            vec![Completion::tool_calls(calls), Completion::text("ok")],
            Arc::new(InMemoryStore::default()),
        );
        let outcome = h.controller.answer_turn("plan it").await;
        assert!(matches!(
            outcome.tool_results[0].error,
            Some(ToolError::InvalidArguments { .. })
        ));
        assert!(outcome.tool_results[1].is_ok());
        assert!(h.calendar.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_search_failure_does_not_abort_the_turn() {
        let memory = Arc::new(FlakyMemory {
            fail_search: true,
            ..Default::default()
        });
        let mut h = harness(vec![Completion::text("At your service.")], memory.clone());
        let outcome = h.controller.answer_turn("hello jarvis").await;

        assert_eq!(outcome.answer, "At your service.");
        assert_eq!(outcome.memory_hits, 0);
        assert!(outcome.persisted);

        let prompt = &h.llm.requests()[0].messages;
        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[0].role, Role::System);
        assert!(!prompt[0].content.contains("Relevant memories"));
        assert_eq!(prompt[1], Message::user("hello jarvis"));
    }

    #[tokio::test]
    async fn test_memory_add_failure_keeps_the_answer() {
        let memory = Arc::new(FlakyMemory {
            fail_add: true,
            ..Default::default()
        });
        let mut h = harness(
            vec![Completion::text("Reactor at 400 percent.")],
            memory.clone(),
        );
        let outcome = h.controller.answer_turn("reactor status?").await;

        assert_eq!(outcome.answer, "Reactor at 400 percent.");
        assert!(!outcome.persisted);
        assert_eq!(memory.added.lock().unwrap().len(), 1);
        assert_eq!(
            h.controller.history().messages(),
            [
                Message::user("reactor status?"),
                Message::assistant("Reactor at 400 percent.")
            ]
        );
    }

    #[tokio::test]
    async fn test_mail_send_is_not_deduplicated() {
        let mut h = harness(
            vec![
                Completion::tool_calls(vec![send_call(), send_call()]),
                Completion::text("Sent twice."),
                Completion::tool_calls(vec![send_call()]),
                Completion::text("Sent again."),
            ],
            Arc::new(InMemoryStore::default()),
        );
        let outcome = h.controller.answer_turn("tell Happy to bring the car").await;
        assert_eq!(outcome.tool_results[0].output, "Mail sent to happy@stark.com (id: msg-1)");
        assert_eq!(outcome.tool_results[1].output, "Mail sent to happy@stark.com (id: msg-2)");

        h.controller.answer("tell Happy to bring the car").await;
        let sent = h.mail.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|m| m == &sent[0]));
    }

    #[tokio::test]
    async fn test_exact_pair_is_forwarded_to_memory() {
        let memory = Arc::new(FlakyMemory::default());
        let mut h = harness(
            vec![Completion::text("Your suit is charged, sir.")],
            memory.clone(),
        );
        let answer = h.controller.answer("is my suit charged?").await;

        let added = memory.added.lock().unwrap();
        assert_eq!(added.len(), 1);
        let (interaction, user_id) = &added[0];
        assert_eq!(user_id, "tony");
        assert_eq!(
            interaction.as_slice(),
            [Message::user("is my suit charged?"), Message::assistant(answer)]
        );
    }

    #[tokio::test]
    async fn test_saved_interaction_is_found_again() {
        let memory = Arc::new(InMemoryStore::default());
        let mut h = harness(
            vec![Completion::text("Noted: the Mark 42 is in the lab.")],
            memory.clone(),
        );
        h.controller.answer("where is the Mark 42 armor?").await;

        let hits = memory
            .search("where is the Mark 42 armor? tell me again", "tony", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("user: where is the Mark 42 armor?"));
        assert!(hits[0].content.contains("assistant: Noted: the Mark 42 is in the lab."));
        assert!(memory.search("Mark 42", "someone-else", 5).await.unwrap().is_empty());
    }
}
