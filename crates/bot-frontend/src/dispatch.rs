//! Update dispatch: commands, run flow, and the publish flow.

use rand::Rng;
use shared_types::{ResultCard, RunEventType, Test, TestType};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api_client::ApiPort;
use crate::config::BotConfig;
use crate::deep_link::{format_start_param, parse_start_param, RunLink};
use crate::error::BotError;
use crate::publish::{parse_publish_args, PublishStore};
use crate::session::{RunSession, SessionStore};
use crate::transport::{
    CallbackQuery, ChatMessage, ChatTransport, InlineButton, InlineKeyboard, Update,
};

const ANSWER_CALLBACK: &str = "ans:";
const PUBLISH_CONFIRM: &str = "pub:confirm";
const PUBLISH_CANCEL: &str = "pub:cancel";

pub struct Dispatcher {
    transport: Arc<dyn ChatTransport>,
    api: Arc<dyn ApiPort>,
    sessions: SessionStore,
    publish: PublishStore,
    config: BotConfig,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        api: Arc<dyn ApiPort>,
        config: BotConfig,
    ) -> Self {
        Self {
            transport,
            api,
            sessions: SessionStore::default(),
            publish: PublishStore::default(),
            config,
        }
    }

    pub async fn handle_update(&self, update: Update) -> Result<(), BotError> {
        if let Some(message) = update.message {
            return self.handle_message(message).await;
        }
        if let Some(callback) = update.callback_query {
            return self.handle_callback(callback).await;
        }
        Ok(())
    }

    async fn handle_message(&self, message: ChatMessage) -> Result<(), BotError> {
        let Some(text) = message.text.clone() else {
            return Ok(());
        };
        let chat_id = message.chat.id.to_string();
        let Some(user) = message.from.clone() else {
            return Ok(());
        };

        if let Some(payload) = text.strip_prefix("/start") {
            let payload = payload.trim();
            match parse_start_param(payload) {
                Some(link) => return self.start_run(&chat_id, user.id, link).await,
                None => {
                    self.transport
                        .send_message(
                            &chat_id,
                            "Hi! Open a test link to take a quiz here.",
                            None,
                        )
                        .await?;
                    return Ok(());
                }
            }
        }
        if text.trim() == "/admin" {
            return self.handle_admin(&chat_id, user.id).await;
        }
        if let Some(args) = text.strip_prefix("/publish") {
            return self.handle_publish_command(&chat_id, user.id, args).await;
        }
        Ok(())
    }

    async fn handle_admin(&self, chat_id: &str, user_id: i64) -> Result<(), BotError> {
        if !session_auth::is_platform_admin(user_id, &self.config.admin_ids) {
            self.transport
                .send_message(chat_id, "This command is for platform admins.", None)
                .await?;
            return Ok(());
        }
        let keyboard = self.config.webapp_url.as_ref().map(|url| InlineKeyboard {
            inline_keyboard: vec![vec![InlineButton::link("Open creator tool", url)]],
        });
        self.transport
            .send_message(chat_id, "Creator tools:", keyboard)
            .await?;
        Ok(())
    }

    async fn handle_publish_command(
        &self,
        chat_id: &str,
        user_id: i64,
        args: &str,
    ) -> Result<(), BotError> {
        if !session_auth::is_platform_admin(user_id, &self.config.admin_ids) {
            self.transport
                .send_message(chat_id, "This command is for platform admins.", None)
                .await?;
            return Ok(());
        }
        let request = match parse_publish_args(args) {
            Ok(request) => request,
            Err(e) => {
                self.transport
                    .send_message(chat_id, &e.to_string(), None)
                    .await?;
                return Ok(());
            }
        };
        // The test must exist and be published before we announce it.
        let test = match self.api.get_public_test(&request.slug).await {
            Ok(test) => test,
            Err(e) => {
                warn!(error = %e, slug = %request.slug, "publish lookup failed");
                self.transport
                    .send_message(chat_id, "That test is not available (is it published?).", None)
                    .await?;
                return Ok(());
            }
        };
        let summary = format!(
            "Publish \"{}\" to {}?",
            test.title,
            request.target.as_api_target()
        );
        self.publish.stage(user_id, request);
        let keyboard = InlineKeyboard {
            inline_keyboard: vec![vec![
                InlineButton::callback("Publish", PUBLISH_CONFIRM),
                InlineButton::callback("Cancel", PUBLISH_CANCEL),
            ]],
        };
        self.transport
            .send_message(chat_id, &summary, Some(keyboard))
            .await?;
        Ok(())
    }

    async fn start_run(&self, chat_id: &str, user_id: i64, link: RunLink) -> Result<(), BotError> {
        let test = match self.api.get_public_test(&link.slug).await {
            Ok(test) => test,
            Err(e) => {
                warn!(error = %e, slug = %link.slug, "test fetch failed");
                self.transport
                    .send_message(chat_id, "Sorry, that test is not available.", None)
                    .await?;
                return Ok(());
            }
        };
        self.report_run(&link.slug, user_id, RunEventType::Open, link.source_chat_id)
            .await;

        match test.test_type {
            TestType::Cards => {
                self.run_card_draw(chat_id, user_id, test, link.source_chat_id)
                    .await
            }
            TestType::Single | TestType::Multi => {
                if test.questions.is_empty() {
                    self.transport
                        .send_message(chat_id, "This test has no questions yet.", None)
                        .await?;
                    return Ok(());
                }
                let session = RunSession::new(test, link.source_chat_id);
                self.send_question(chat_id, &session).await?;
                self.sessions.start(user_id, session);
                Ok(())
            }
        }
    }

    /// Card draw: one random question-less answer, revealed immediately.
    async fn run_card_draw(
        &self,
        chat_id: &str,
        user_id: i64,
        test: Test,
        source_chat_id: Option<i64>,
    ) -> Result<(), BotError> {
        let Some(card) = pick_random(&test.answers) else {
            self.transport
                .send_message(chat_id, "This deck has no cards yet.", None)
                .await?;
            return Ok(());
        };
        let title = card
            .explanation_title
            .clone()
            .or_else(|| card.text.clone())
            .unwrap_or_else(|| "Your card".into());
        let body = card.explanation_text.clone().unwrap_or_default();
        let text = if body.is_empty() {
            title
        } else {
            format!("{title}\n\n{body}")
        };
        match &card.image_url {
            Some(url) => {
                self.transport
                    .send_photo(chat_id, url, &text, None)
                    .await?;
            }
            None => {
                self.transport.send_message(chat_id, &text, None).await?;
            }
        }
        self.report_run(&test.slug, user_id, RunEventType::Complete, source_chat_id)
            .await;
        Ok(())
    }

    async fn send_question(&self, chat_id: &str, session: &RunSession) -> Result<(), BotError> {
        let question = &session.test.questions[session.question_index];
        let keyboard = InlineKeyboard {
            inline_keyboard: question
                .answers
                .iter()
                .enumerate()
                .map(|(i, answer)| {
                    vec![InlineButton::callback(
                        answer.text.clone().unwrap_or_else(|| format!("Option {}", i + 1)),
                        format!("{ANSWER_CALLBACK}{i}"),
                    )]
                })
                .collect(),
        };
        let text = format!(
            "{} / {}\n\n{}",
            session.question_index + 1,
            session.test.questions.len(),
            question.text
        );
        match &question.image_url {
            Some(url) => {
                self.transport
                    .send_photo(chat_id, url, &text, Some(keyboard))
                    .await?;
            }
            None => {
                self.transport
                    .send_message(chat_id, &text, Some(keyboard))
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_callback(&self, callback: CallbackQuery) -> Result<(), BotError> {
        // Acknowledge first so the client stops its spinner even when the
        // handler below fails.
        self.transport.answer_callback_query(&callback.id).await?;

        let Some(data) = callback.data.clone() else {
            return Ok(());
        };
        let chat_id = callback
            .message
            .as_ref()
            .map(|m| m.chat.id.to_string())
            .unwrap_or_else(|| callback.from.id.to_string());

        if let Some(index) = data.strip_prefix(ANSWER_CALLBACK) {
            let Ok(index) = index.parse::<usize>() else {
                return Ok(());
            };
            return self.handle_answer(&chat_id, callback.from.id, index).await;
        }
        match data.as_str() {
            PUBLISH_CONFIRM => self.finish_publish(&chat_id, callback.from.id).await,
            PUBLISH_CANCEL => {
                self.publish.take(callback.from.id);
                self.transport
                    .send_message(&chat_id, "Publish cancelled.", None)
                    .await?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn handle_answer(
        &self,
        chat_id: &str,
        user_id: i64,
        index: usize,
    ) -> Result<(), BotError> {
        let Some(mut session) = self.sessions.take(user_id) else {
            return Ok(());
        };
        let question = &session.test.questions[session.question_index];
        let Some(answer) = question.answers.get(index) else {
            self.sessions.put_back(user_id, session);
            return Ok(());
        };
        session.score += answer.weight.unwrap_or(0);
        if let Some(result_id) = answer.result_id {
            session.picked_results.push(result_id);
        }
        session.question_index += 1;

        if session.question_index < session.test.questions.len() {
            self.send_question(chat_id, &session).await?;
            self.sessions.put_back(user_id, session);
            return Ok(());
        }

        let result = pick_result(&session.test, &session.picked_results, session.score);
        let text = build_result_text(&session.test, result, session.score);
        match result.and_then(|r| r.image_url.clone()) {
            Some(url) => {
                self.transport
                    .send_photo(chat_id, &url, &text, None)
                    .await?;
            }
            None => {
                self.transport.send_message(chat_id, &text, None).await?;
            }
        }
        self.report_run(
            &session.test.slug,
            user_id,
            RunEventType::Complete,
            session.source_chat_id,
        )
        .await;
        info!(slug = %session.test.slug, user_id, "run completed");
        self.sessions.end(user_id);
        Ok(())
    }

    async fn finish_publish(&self, chat_id: &str, user_id: i64) -> Result<(), BotError> {
        let Some(request) = self.publish.take(user_id) else {
            self.transport
                .send_message(chat_id, "Nothing staged to publish.", None)
                .await?;
            return Ok(());
        };
        let test = self.api.get_public_test(&request.slug).await?;
        let target_chat = self
            .transport
            .get_chat(&request.target.as_api_target())
            .await?;
        let me = self.transport.get_me().await?;
        let bot_name = me
            .username
            .ok_or_else(|| BotError::Chat("bot has no username".into()))?;

        let param = format_start_param(&request.slug, Some(target_chat.id));
        let url = format!("https://t.me/{bot_name}?start={param}");
        let caption = request.caption.unwrap_or_else(|| {
            match &test.description {
                Some(description) => format!("{}\n\n{}", test.title, description),
                None => test.title.clone(),
            }
        });
        let keyboard = InlineKeyboard {
            inline_keyboard: vec![vec![InlineButton::link("Take the test", url)]],
        };
        self.transport
            .send_message(&target_chat.id.to_string(), &caption, Some(keyboard))
            .await?;
        self.transport
            .send_message(chat_id, "Published.", None)
            .await?;
        info!(slug = %request.slug, target = target_chat.id, "test published");
        Ok(())
    }

    /// Best-effort run logging.
    async fn report_run(
        &self,
        slug: &str,
        user_id: i64,
        event_type: RunEventType,
        source_chat_id: Option<i64>,
    ) {
        if let Err(e) = self
            .api
            .record_run(slug, user_id, event_type, source_chat_id)
            .await
        {
            warn!(error = %e, slug, "run log dropped");
        }
    }
}

fn pick_random<T>(items: &[T]) -> Option<&T> {
    if items.is_empty() {
        return None;
    }
    let index = rand::thread_rng().gen_range(0..items.len());
    items.get(index)
}

/// Choose the result card: most-voted mapped result first, score range as
/// the fallback.
pub fn pick_result<'a>(test: &'a Test, picked: &[Uuid], score: i64) -> Option<&'a ResultCard> {
    if !picked.is_empty() {
        let mut votes: HashMap<Uuid, usize> = HashMap::new();
        for id in picked {
            *votes.entry(*id).or_default() += 1;
        }
        // Ties break toward the card that appears first in display order.
        let winner = test
            .results
            .iter()
            .filter_map(|card| votes.get(&card.id).map(|count| (*count, card)))
            .max_by_key(|(count, card)| (*count, std::cmp::Reverse(card.order_num)));
        if let Some((_, card)) = winner {
            return Some(card);
        }
    }
    test.results.iter().find(|card| {
        if card.min_score.is_none() && card.max_score.is_none() {
            return false;
        }
        card.min_score.map_or(true, |min| score >= min)
            && card.max_score.map_or(true, |max| score <= max)
    })
}

/// Final message shown when a run finishes.
pub fn build_result_text(test: &Test, result: Option<&ResultCard>, score: i64) -> String {
    match result {
        Some(card) => match &card.description {
            Some(description) => format!("{}\n\n{}", card.title, description),
            None => card.title.clone(),
        },
        None => format!("You finished \"{}\"! Score: {score}", test.title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChatInfo, ChatUser};
    use async_trait::async_trait;
    use chrono::Utc;
    use shared_types::{Answer, LeadSettings, Question};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct Sent {
        chat_id: String,
        text: String,
        keyboard: Option<InlineKeyboard>,
    }

    #[derive(Default)]
    struct MockTransport {
        sent: Mutex<Vec<Sent>>,
    }

    #[async_trait]
    impl ChatTransport for MockTransport {
        async fn get_updates(&self, _: i64, _: u64) -> Result<Vec<Update>, BotError> {
            Ok(vec![])
        }

        async fn send_message(
            &self,
            chat_id: &str,
            text: &str,
            keyboard: Option<InlineKeyboard>,
        ) -> Result<ChatMessage, BotError> {
            self.sent.lock().unwrap().push(Sent {
                chat_id: chat_id.to_string(),
                text: text.to_string(),
                keyboard,
            });
            Ok(ChatMessage {
                message_id: 1,
                from: None,
                chat: ChatInfo {
                    id: chat_id.parse().unwrap_or(0),
                    kind: None,
                    title: None,
                    username: None,
                },
                text: Some(text.to_string()),
            })
        }

        async fn send_photo(
            &self,
            chat_id: &str,
            _photo_url: &str,
            caption: &str,
            keyboard: Option<InlineKeyboard>,
        ) -> Result<ChatMessage, BotError> {
            self.send_message(chat_id, caption, keyboard).await
        }

        async fn edit_message_text(
            &self,
            _: &str,
            _: i64,
            _: &str,
            _: Option<InlineKeyboard>,
        ) -> Result<(), BotError> {
            Ok(())
        }

        async fn answer_callback_query(&self, _: &str) -> Result<(), BotError> {
            Ok(())
        }

        async fn get_chat(&self, _: &str) -> Result<ChatInfo, BotError> {
            Ok(ChatInfo {
                id: -100555,
                kind: Some("channel".into()),
                title: Some("My Channel".into()),
                username: Some("my_channel".into()),
            })
        }

        async fn get_me(&self) -> Result<ChatUser, BotError> {
            Ok(ChatUser {
                id: 1,
                username: Some("quizbot".into()),
                first_name: None,
            })
        }
    }

    struct FakeApi {
        test: Test,
        runs: Mutex<Vec<(String, i64, RunEventType, Option<i64>)>>,
    }

    #[async_trait]
    impl ApiPort for FakeApi {
        async fn get_public_test(&self, slug: &str) -> Result<Test, BotError> {
            if slug == self.test.slug {
                Ok(self.test.clone())
            } else {
                Err(BotError::Gateway {
                    status: 404,
                    message: "test unavailable".into(),
                })
            }
        }

        async fn record_run(
            &self,
            slug: &str,
            user_id: i64,
            event_type: RunEventType,
            source_chat_id: Option<i64>,
        ) -> Result<(), BotError> {
            self.runs.lock().unwrap().push((
                slug.to_string(),
                user_id,
                event_type,
                source_chat_id,
            ));
            Ok(())
        }
    }

    fn quiz_test() -> Test {
        let test_id = Uuid::new_v4();
        let fire = ResultCard {
            id: Uuid::new_v4(),
            test_id,
            order_num: 1,
            title: "Fire".into(),
            description: Some("You burn bright.".into()),
            min_score: None,
            max_score: None,
            image_url: None,
        };
        let water = ResultCard {
            id: Uuid::new_v4(),
            test_id,
            order_num: 2,
            title: "Water".into(),
            description: None,
            min_score: None,
            max_score: None,
            image_url: None,
        };
        let question_id = Uuid::new_v4();
        let answer = |i: i64, text: &str, result_id: Uuid| Answer {
            id: Uuid::new_v4(),
            test_id,
            question_id: Some(question_id),
            result_id: Some(result_id),
            order_num: i,
            text: Some(text.into()),
            image_url: None,
            weight: None,
            is_correct: None,
            explanation_title: None,
            explanation_text: None,
        };
        Test {
            id: test_id,
            slug: "hero".into(),
            title: "Which hero are you?".into(),
            test_type: TestType::Single,
            description: None,
            is_public: true,
            bg_color: None,
            created_by: 1,
            created_by_username: None,
            created_at: Utc::now(),
            lead: LeadSettings::default(),
            questions: vec![Question {
                id: question_id,
                test_id,
                order_num: 1,
                text: "Pick a color".into(),
                image_url: None,
                answers: vec![
                    answer(1, "Red", fire.id),
                    answer(2, "Blue", water.id),
                ],
            }],
            answers: vec![],
            results: vec![fire, water],
        }
    }

    fn dispatcher_with(test: Test) -> (Dispatcher, Arc<MockTransport>, Arc<FakeApi>) {
        let transport = Arc::new(MockTransport::default());
        let api = Arc::new(FakeApi {
            test,
            runs: Mutex::new(vec![]),
        });
        let config = BotConfig {
            bot_token: "t".into(),
            admin_ids: vec![99],
            webapp_url: Some("https://example.com/app".into()),
            ..BotConfig::default()
        };
        (
            Dispatcher::new(transport.clone(), api.clone(), config),
            transport,
            api,
        )
    }

    fn message_update(user_id: i64, text: &str) -> Update {
        Update {
            update_id: 1,
            message: Some(ChatMessage {
                message_id: 1,
                from: Some(ChatUser {
                    id: user_id,
                    username: None,
                    first_name: None,
                }),
                chat: ChatInfo {
                    id: user_id,
                    kind: Some("private".into()),
                    title: None,
                    username: None,
                },
                text: Some(text.to_string()),
            }),
            callback_query: None,
        }
    }

    fn callback_update(user_id: i64, data: &str) -> Update {
        Update {
            update_id: 2,
            message: None,
            callback_query: Some(CallbackQuery {
                id: "cb".into(),
                from: ChatUser {
                    id: user_id,
                    username: None,
                    first_name: None,
                },
                message: Some(ChatMessage {
                    message_id: 1,
                    from: None,
                    chat: ChatInfo {
                        id: user_id,
                        kind: Some("private".into()),
                        title: None,
                        username: None,
                    },
                    text: None,
                }),
                data: Some(data.to_string()),
            }),
        }
    }

    #[tokio::test]
    async fn deep_link_runs_a_single_question_test() {
        let (dispatcher, transport, api) = dispatcher_with(quiz_test());

        dispatcher
            .handle_update(message_update(42, "/start run_test-hero__src_-777"))
            .await
            .unwrap();

        {
            let sent = transport.sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert!(sent[0].text.contains("Pick a color"));
            let keyboard = sent[0].keyboard.as_ref().unwrap();
            assert_eq!(keyboard.inline_keyboard.len(), 2);
        }

        dispatcher
            .handle_update(callback_update(42, "ans:0"))
            .await
            .unwrap();

        let sent = transport.sent.lock().unwrap();
        let last = sent.last().unwrap();
        assert!(last.text.contains("Fire"));
        assert!(last.text.contains("You burn bright."));

        let runs = api.runs.lock().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].2, RunEventType::Open);
        assert_eq!(runs[0].3, Some(-777));
        assert_eq!(runs[1].2, RunEventType::Complete);
        assert_eq!(runs[1].3, Some(-777));
    }

    #[tokio::test]
    async fn stray_callback_without_session_is_ignored() {
        let (dispatcher, transport, _) = dispatcher_with(quiz_test());
        dispatcher
            .handle_update(callback_update(42, "ans:0"))
            .await
            .unwrap();
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn admin_command_gates_on_allow_list() {
        let (dispatcher, transport, _) = dispatcher_with(quiz_test());

        dispatcher
            .handle_update(message_update(42, "/admin"))
            .await
            .unwrap();
        dispatcher
            .handle_update(message_update(99, "/admin"))
            .await
            .unwrap();

        let sent = transport.sent.lock().unwrap();
        assert!(sent[0].text.contains("platform admins"));
        assert!(sent[1].keyboard.is_some());
    }

    #[tokio::test]
    async fn publish_flow_posts_attributed_deep_link() {
        let (dispatcher, transport, _) = dispatcher_with(quiz_test());

        dispatcher
            .handle_update(message_update(99, "/publish hero @my_channel Try it!"))
            .await
            .unwrap();
        dispatcher
            .handle_update(callback_update(99, "pub:confirm"))
            .await
            .unwrap();

        let sent = transport.sent.lock().unwrap();
        // Confirmation prompt, channel post, admin ack.
        assert_eq!(sent.len(), 3);
        let post = &sent[1];
        assert_eq!(post.chat_id, "-100555");
        assert_eq!(post.text, "Try it!");
        let url = post.keyboard.as_ref().unwrap().inline_keyboard[0][0]
            .url
            .clone()
            .unwrap();
        assert_eq!(
            url,
            "https://t.me/quizbot?start=run_test-hero__src_-100555"
        );
    }

    #[test]
    fn result_votes_beat_score_ranges() {
        let test = quiz_test();
        let fire = test.results[0].id;
        let water = test.results[1].id;

        let picked = vec![water, fire, water];
        assert_eq!(pick_result(&test, &picked, 0).unwrap().title, "Water");

        // Tie goes to display order.
        let picked = vec![water, fire];
        assert_eq!(pick_result(&test, &picked, 0).unwrap().title, "Fire");
    }

    #[test]
    fn score_range_fallback() {
        let mut test = quiz_test();
        test.results[0].min_score = Some(0);
        test.results[0].max_score = Some(2);
        test.results[1].min_score = Some(3);
        test.results[1].max_score = None;

        assert_eq!(pick_result(&test, &[], 1).unwrap().title, "Fire");
        assert_eq!(pick_result(&test, &[], 10).unwrap().title, "Water");

        test.results[0].min_score = None;
        test.results[0].max_score = None;
        test.results[1].min_score = None;
        assert!(pick_result(&test, &[], 1).is_none());
        let text = build_result_text(&test, None, 1);
        assert!(text.contains("Score: 1"));
    }
}
