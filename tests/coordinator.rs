//! End-to-end coordinator tests driving two participants through a duel
//! with a paused clock, an in-memory store, and fake result sinks.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime},
};

use axum::extract::ws::Message;
use futures::future::BoxFuture;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use uuid::Uuid;

use quiz_duel_back::{
    config::AppConfig,
    dao::{
        challenge_store::{ChallengeStore, memory::InMemoryChallengeStore},
        models::{
            ChallengeEntity, ChallengeStatus, ParticipantRefEntity, QuestionEntity, QuestionKind,
            QuizEntity,
        },
    },
    dto::ws::ServerMessage,
    error::ServiceError,
    services::{
        coordinator,
        results::{QuizAttempt, ResultSink, ResultSinkError},
    },
    state::{AppState, SharedState},
};

const ALICE: Uuid = Uuid::from_u128(1);
const BOB: Uuid = Uuid::from_u128(2);
const CAROL: Uuid = Uuid::from_u128(3);

/// Sink that records every persisted attempt and always succeeds.
#[derive(Default)]
struct RecordingSink {
    attempts: Mutex<Vec<QuizAttempt>>,
}

impl ResultSink for RecordingSink {
    fn persist(&self, attempt: QuizAttempt) -> BoxFuture<'static, Result<Uuid, ResultSinkError>> {
        self.attempts.lock().unwrap().push(attempt);
        Box::pin(async { Ok(Uuid::new_v4()) })
    }
}

/// Sink that rejects the first `n` persists, then succeeds.
struct FlakySink {
    failures_left: AtomicUsize,
}

impl FlakySink {
    fn failing_once() -> Self {
        Self {
            failures_left: AtomicUsize::new(1),
        }
    }
}

/// Sink whose second persist stalls for `delay` before succeeding.
struct SlowSecondSink {
    calls: AtomicUsize,
    delay: Duration,
}

impl SlowSecondSink {
    fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }
}

impl ResultSink for SlowSecondSink {
    fn persist(&self, _attempt: QuizAttempt) -> BoxFuture<'static, Result<Uuid, ResultSinkError>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay;
        Box::pin(async move {
            if call > 0 {
                tokio::time::sleep(delay).await;
            }
            Ok(Uuid::new_v4())
        })
    }
}

impl ResultSink for FlakySink {
    fn persist(&self, _attempt: QuizAttempt) -> BoxFuture<'static, Result<Uuid, ResultSinkError>> {
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        Box::pin(async move {
            if fail {
                Err(ResultSinkError::Rejected {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                })
            } else {
                Ok(Uuid::new_v4())
            }
        })
    }
}

fn quiz(question_count: usize) -> QuizEntity {
    let questions = (0..question_count)
        .map(|n| QuestionEntity {
            id: Uuid::from_u128(0x1000 + n as u128),
            text: format!("question {n}"),
            kind: QuestionKind::MultipleChoice {
                options: vec!["Paris".into(), "London".into(), "Rome".into()],
            },
            correct_answer: "Paris".into(),
        })
        .collect();
    QuizEntity {
        id: Uuid::from_u128(0x9000),
        title: "capitals".into(),
        questions,
    }
}

fn active_challenge(id: Uuid, quiz_id: Uuid, creator: Uuid, opponent: Uuid) -> ChallengeEntity {
    let now = SystemTime::now();
    ChallengeEntity {
        id,
        quiz_id,
        creator: ParticipantRefEntity {
            user_id: creator,
            username: "alice".into(),
        },
        opponent: ParticipantRefEntity {
            user_id: opponent,
            username: "bob".into(),
        },
        status: ChallengeStatus::Active,
        creator_outcome: None,
        opponent_outcome: None,
        winner: None,
        created_at: now,
        updated_at: now,
    }
}

/// Build a state with one active challenge over a quiz of `question_count`
/// questions, wired to the given sink.
async fn setup(
    sink: Arc<dyn ResultSink>,
    question_count: usize,
) -> (SharedState, Arc<InMemoryChallengeStore>, Uuid) {
    let state = AppState::new(AppConfig::default(), sink);
    let store = Arc::new(InMemoryChallengeStore::new());
    state.install_challenge_store(store.clone()).await;

    let quiz = quiz(question_count);
    let challenge_id = Uuid::from_u128(0x5000);
    let challenge = active_challenge(challenge_id, quiz.id, ALICE, BOB);
    store.save_quiz(quiz).await.unwrap();
    store.save_challenge(challenge).await.unwrap();

    (state, store, challenge_id)
}

fn connection() -> (mpsc::UnboundedSender<Message>, mpsc::UnboundedReceiver<Message>) {
    mpsc::unbounded_channel()
}

/// Pull every queued frame off a connection and decode it.
fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        if let Message::Text(text) = frame {
            out.push(serde_json::from_str(text.as_str()).unwrap());
        }
    }
    out
}

async fn join(
    state: &SharedState,
    challenge_id: Uuid,
    user_id: Uuid,
    username: &str,
) -> (mpsc::UnboundedReceiver<Message>, Result<(), ServiceError>) {
    let (tx, rx) = connection();
    let outcome = coordinator::join(state, challenge_id, user_id, username.into(), tx).await;
    (rx, outcome)
}

/// Join both players and let the countdown elapse, leaving the match
/// in progress with both inboxes drained.
async fn start_match(
    state: &SharedState,
    challenge_id: Uuid,
) -> (
    mpsc::UnboundedReceiver<Message>,
    mpsc::UnboundedReceiver<Message>,
) {
    let (mut alice_rx, outcome) = join(state, challenge_id, ALICE, "alice").await;
    outcome.unwrap();
    let (mut bob_rx, outcome) = join(state, challenge_id, BOB, "bob").await;
    outcome.unwrap();

    tokio::time::sleep(Duration::from_secs(4)).await;

    let alice_events = drain(&mut alice_rx);
    assert!(
        alice_events
            .iter()
            .any(|e| matches!(e, ServerMessage::ChallengeStart)),
        "countdown should have started the match: {alice_events:?}"
    );
    drain(&mut bob_rx);

    (alice_rx, bob_rx)
}

async fn answer(
    state: &SharedState,
    challenge_id: Uuid,
    user_id: Uuid,
    index: usize,
    answer: &str,
    time_taken: u32,
) {
    coordinator::submit_answer(
        state,
        challenge_id,
        user_id,
        Uuid::from_u128(0x1000 + index as u128),
        answer.into(),
        time_taken,
        index,
    )
    .await
    .unwrap();
}

#[tokio::test(start_paused = true)]
async fn join_sequence_fires_ready_exactly_once() {
    let (state, _store, challenge_id) = setup(Arc::new(RecordingSink::default()), 3).await;

    let (mut alice_rx, outcome) = join(&state, challenge_id, ALICE, "alice").await;
    outcome.unwrap();
    let events = drain(&mut alice_rx);
    assert!(matches!(events[..], [ServerMessage::WaitingForOpponent]));

    let (mut bob_rx, outcome) = join(&state, challenge_id, BOB, "bob").await;
    outcome.unwrap();

    // The earlier joiner learns about the opponent, then both get ready.
    let alice_events = drain(&mut alice_rx);
    assert!(matches!(
        alice_events[..],
        [
            ServerMessage::OpponentJoined { user_id },
            ServerMessage::BothPlayersReady
        ] if user_id == BOB
    ));
    let bob_events = drain(&mut bob_rx);
    assert!(matches!(bob_events[..], [ServerMessage::BothPlayersReady]));

    // A reconnect during the countdown must not re-fire the ready sequence;
    // only the rejoining client gets a phase resync.
    let (mut bob_rx2, outcome) = join(&state, challenge_id, BOB, "bob").await;
    outcome.unwrap();
    assert!(drain(&mut alice_rx).is_empty());
    let bob_events = drain(&mut bob_rx2);
    assert!(matches!(bob_events[..], [ServerMessage::BothPlayersReady]));

    tokio::time::sleep(Duration::from_secs(4)).await;
    let alice_events = drain(&mut alice_rx);
    assert!(matches!(alice_events[..], [ServerMessage::ChallengeStart]));
    let bob_events = drain(&mut bob_rx2);
    assert!(matches!(bob_events[..], [ServerMessage::ChallengeStart]));
}

#[tokio::test(start_paused = true)]
async fn join_rejects_outsiders_and_unaccepted_challenges() {
    let (state, store, challenge_id) = setup(Arc::new(RecordingSink::default()), 3).await;

    let (_rx, outcome) = join(&state, challenge_id, CAROL, "carol").await;
    assert!(matches!(outcome, Err(ServiceError::Unauthorized(_))));

    let mut pending = store.find_challenge(challenge_id).await.unwrap().unwrap();
    pending.status = ChallengeStatus::Pending;
    store.save_challenge(pending).await.unwrap();

    let (_rx, outcome) = join(&state, challenge_id, ALICE, "alice").await;
    assert!(matches!(outcome, Err(ServiceError::InvalidState(_))));
    assert!(state.sessions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn duplicate_submission_is_scored_once() {
    let (state, _store, challenge_id) = setup(Arc::new(RecordingSink::default()), 3).await;
    let (mut alice_rx, mut bob_rx) = start_match(&state, challenge_id).await;

    answer(&state, challenge_id, ALICE, 0, "Paris", 5).await;
    // Retransmission of the same index must be dropped silently.
    answer(&state, challenge_id, ALICE, 0, "Paris", 5).await;

    let alice_events = drain(&mut alice_rx);
    let scored: Vec<_> = alice_events
        .iter()
        .filter(|e| matches!(e, ServerMessage::ChallengeAnswerResult { .. }))
        .collect();
    assert_eq!(scored.len(), 1);
    assert!(matches!(
        scored[0],
        ServerMessage::ChallengeAnswerResult {
            correct: true,
            new_score: 10,
            ..
        }
    ));

    let bob_events = drain(&mut bob_rx);
    let progress: Vec<_> = bob_events
        .iter()
        .filter(|e| matches!(e, ServerMessage::OpponentProgress { .. }))
        .collect();
    assert_eq!(progress.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn empty_answer_advances_without_private_feedback() {
    let (state, _store, challenge_id) = setup(Arc::new(RecordingSink::default()), 3).await;
    let (mut alice_rx, mut bob_rx) = start_match(&state, challenge_id).await;

    answer(&state, challenge_id, ALICE, 0, "", 30).await;

    let alice_events = drain(&mut alice_rx);
    assert!(
        alice_events.is_empty(),
        "an unattempted question gets no answer feedback: {alice_events:?}"
    );
    let bob_events = drain(&mut bob_rx);
    assert!(matches!(
        bob_events[..],
        [ServerMessage::OpponentProgress {
            current_question: 1,
            score: 0,
            is_correct: false,
            ..
        }]
    ));
}

#[tokio::test(start_paused = true)]
async fn full_duel_resolves_with_faster_player_winning() {
    let sink = Arc::new(RecordingSink::default());
    let (state, store, challenge_id) = setup(sink.clone(), 5).await;
    let (mut alice_rx, mut bob_rx) = start_match(&state, challenge_id).await;

    // Both answer all five correctly; alice is faster (50s vs 70s).
    for index in 0..5 {
        answer(&state, challenge_id, ALICE, index, "Paris", 10).await;
        answer(&state, challenge_id, BOB, index, "Paris", 14).await;
    }

    let bob_events = drain(&mut bob_rx);
    assert!(
        bob_events
            .iter()
            .any(|e| matches!(e, ServerMessage::OpponentFinished { user_id, score: 50, time: 50 } if *user_id == ALICE))
    );
    let finished = bob_events
        .iter()
        .find_map(|e| match e {
            ServerMessage::ChallengeFinished {
                winner_id,
                result,
                participants,
            } => Some((winner_id, result, participants)),
            _ => None,
        })
        .expect("second finisher resolves the match");
    assert_eq!(*finished.0, Some(ALICE));
    assert!(!finished.1.draw);
    assert_eq!(finished.2.len(), 2);
    assert!(finished.2.iter().all(|p| p.result_id.is_some()));

    let alice_events = drain(&mut alice_rx);
    assert!(
        alice_events
            .iter()
            .any(|e| matches!(e, ServerMessage::ChallengeFinished { winner_id: Some(id), .. } if *id == ALICE))
    );

    // Both results persisted, session gone, challenge record resolved.
    assert_eq!(sink.attempts.lock().unwrap().len(), 2);
    assert!(state.sessions().is_empty());
    let challenge = store.find_challenge(challenge_id).await.unwrap().unwrap();
    assert_eq!(challenge.status, ChallengeStatus::Completed);
    assert_eq!(challenge.winner, Some(ALICE));
    assert!(challenge.creator_outcome.unwrap().result_id.is_some());
    assert!(challenge.opponent_outcome.unwrap().result_id.is_some());
}

#[tokio::test(start_paused = true)]
async fn equal_scores_and_times_resolve_as_draw() {
    let (state, store, challenge_id) = setup(Arc::new(RecordingSink::default()), 2).await;
    let (mut alice_rx, _bob_rx) = start_match(&state, challenge_id).await;

    for index in 0..2 {
        answer(&state, challenge_id, ALICE, index, "Paris", 10).await;
        answer(&state, challenge_id, BOB, index, "Paris", 10).await;
    }

    let alice_events = drain(&mut alice_rx);
    let finished = alice_events
        .iter()
        .find_map(|e| match e {
            ServerMessage::ChallengeFinished {
                winner_id, result, ..
            } => Some((winner_id, result)),
            _ => None,
        })
        .unwrap();
    assert_eq!(*finished.0, None);
    assert!(finished.1.draw);

    let challenge = store.find_challenge(challenge_id).await.unwrap().unwrap();
    assert_eq!(challenge.winner, None);
    assert_eq!(challenge.status, ChallengeStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn stalled_opponent_is_force_ended_after_grace() {
    let sink = Arc::new(RecordingSink::default());
    let (state, store, challenge_id) = setup(sink.clone(), 3).await;
    let (mut alice_rx, mut bob_rx) = start_match(&state, challenge_id).await;

    // Bob answers one question then stalls; alice finishes everything.
    answer(&state, challenge_id, BOB, 0, "Paris", 8).await;
    for index in 0..3 {
        answer(&state, challenge_id, ALICE, index, "Paris", 10).await;
    }
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    // The grace period expires with bob unfinished.
    tokio::time::sleep(Duration::from_secs(31)).await;

    let bob_events = drain(&mut bob_rx);
    assert!(
        bob_events
            .iter()
            .any(|e| matches!(e, ServerMessage::ForceChallengeEnd { reason, .. } if reason == "grace_period_expired"))
    );
    let finished = bob_events
        .iter()
        .find_map(|e| match e {
            ServerMessage::ChallengeFinished {
                winner_id,
                participants,
                ..
            } => Some((winner_id, participants)),
            _ => None,
        })
        .expect("force-end must still resolve the match");
    assert_eq!(*finished.0, Some(ALICE));

    // Bob keeps his partial score but gets no persisted result.
    let bob_result = finished.1.iter().find(|p| p.user_id == BOB).unwrap();
    assert_eq!(bob_result.score, 10);
    assert!(bob_result.result_id.is_none());

    let alice_events = drain(&mut alice_rx);
    assert!(
        alice_events
            .iter()
            .any(|e| matches!(e, ServerMessage::ChallengeFinished { .. }))
    );

    // Only alice's attempt reached the result API.
    assert_eq!(sink.attempts.lock().unwrap().len(), 1);
    assert!(state.sessions().is_empty());
    let challenge = store.find_challenge(challenge_id).await.unwrap().unwrap();
    assert_eq!(challenge.status, ChallengeStatus::Completed);
    assert_eq!(challenge.winner, Some(ALICE));
    assert!(challenge.opponent_outcome.unwrap().result_id.is_none());
}

#[tokio::test(start_paused = true)]
async fn grace_timer_is_cancelled_when_opponent_finishes_in_time() {
    let (state, _store, challenge_id) = setup(Arc::new(RecordingSink::default()), 2).await;
    let (mut alice_rx, mut bob_rx) = start_match(&state, challenge_id).await;

    for index in 0..2 {
        answer(&state, challenge_id, ALICE, index, "Paris", 5).await;
    }
    // Bob finishes 10 virtual seconds into the 30 second grace window.
    tokio::time::sleep(Duration::from_secs(10)).await;
    for index in 0..2 {
        answer(&state, challenge_id, BOB, index, "Paris", 20).await;
    }

    // Long after the original grace deadline no force-end may appear.
    tokio::time::sleep(Duration::from_secs(120)).await;

    for events in [drain(&mut alice_rx), drain(&mut bob_rx)] {
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, ServerMessage::ForceChallengeEnd { .. })),
            "no force end after a natural finish: {events:?}"
        );
        assert!(
            events
                .iter()
                .any(|e| matches!(e, ServerMessage::ChallengeFinished { .. }))
        );
    }
}

#[tokio::test(start_paused = true)]
async fn failed_result_persistence_is_retryable() {
    let sink = Arc::new(FlakySink::failing_once());
    let (state, _store, challenge_id) = setup(sink, 1).await;
    let (mut alice_rx, mut bob_rx) = start_match(&state, challenge_id).await;

    // The finishing submission trips the sink failure.
    let outcome = coordinator::submit_answer(
        &state,
        challenge_id,
        ALICE,
        Uuid::from_u128(0x1000),
        "Paris".into(),
        12,
        0,
    )
    .await;
    assert!(matches!(
        outcome,
        Err(ServiceError::ResultPersistence(_))
    ));
    let alice_events = drain(&mut alice_rx);
    assert!(
        alice_events
            .iter()
            .any(|e| matches!(e, ServerMessage::Error { .. }))
    );
    // The match is still live for the retry.
    assert!(!state.sessions().is_empty());

    // Explicit completion retries the persist and succeeds this time.
    coordinator::complete(&state, challenge_id, ALICE, 12)
        .await
        .unwrap();
    let bob_events = drain(&mut bob_rx);
    assert!(
        bob_events
            .iter()
            .any(|e| matches!(e, ServerMessage::OpponentFinished { user_id, .. } if *user_id == ALICE))
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_sessions_never_leak_events() {
    let sink: Arc<dyn ResultSink> = Arc::new(RecordingSink::default());
    let state = AppState::new(AppConfig::default(), sink);
    let store = Arc::new(InMemoryChallengeStore::new());
    state.install_challenge_store(store.clone()).await;

    let quiz = quiz(1);
    store.save_quiz(quiz.clone()).await.unwrap();
    let first = Uuid::from_u128(0x5001);
    let second = Uuid::from_u128(0x5002);
    let dave = Uuid::from_u128(4);
    store
        .save_challenge(active_challenge(first, quiz.id, ALICE, BOB))
        .await
        .unwrap();
    store
        .save_challenge(active_challenge(second, quiz.id, CAROL, dave))
        .await
        .unwrap();

    let (mut alice_rx, outcome) = join(&state, first, ALICE, "alice").await;
    outcome.unwrap();
    let (_bob_rx, outcome) = join(&state, first, BOB, "bob").await;
    outcome.unwrap();
    let (mut carol_rx, outcome) = join(&state, second, CAROL, "carol").await;
    outcome.unwrap();
    assert_eq!(state.sessions().len(), 2);

    // Carol is still waiting: nothing from the other match may reach her.
    let carol_events = drain(&mut carol_rx);
    assert!(matches!(carol_events[..], [ServerMessage::WaitingForOpponent]));

    tokio::time::sleep(Duration::from_secs(4)).await;
    let alice_events = drain(&mut alice_rx);
    assert!(
        alice_events
            .iter()
            .any(|e| matches!(e, ServerMessage::ChallengeStart))
    );
    let carol_events = drain(&mut carol_rx);
    assert!(
        carol_events.is_empty(),
        "solo session must not start: {carol_events:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn waiting_session_dissolves_when_the_only_player_leaves() {
    let (state, _store, challenge_id) = setup(Arc::new(RecordingSink::default()), 1).await;

    let (_rx, outcome) = join(&state, challenge_id, ALICE, "alice").await;
    outcome.unwrap();
    assert_eq!(state.sessions().len(), 1);

    coordinator::leave(&state, challenge_id, ALICE).await;
    assert!(state.sessions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn late_persist_cannot_reopen_a_force_ended_match() {
    let sink = Arc::new(SlowSecondSink::new(Duration::from_secs(40)));
    let (state, store, challenge_id) = setup(sink, 1).await;
    let (mut alice_rx, mut bob_rx) = start_match(&state, challenge_id).await;

    answer(&state, challenge_id, ALICE, 0, "Paris", 10).await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    // Bob finishes, but his persist outlives the 30 second grace window
    // opened by alice's finish, so the grace timer resolves the match while
    // the persist is still in flight.
    coordinator::complete(&state, challenge_id, BOB, 35)
        .await
        .unwrap();

    let alice_events = drain(&mut alice_rx);
    let bob_events = drain(&mut bob_rx);
    for events in [&alice_events, &bob_events] {
        let resolutions = events
            .iter()
            .filter(|e| matches!(e, ServerMessage::ChallengeFinished { .. }))
            .count();
        assert_eq!(
            resolutions, 1,
            "resolution must broadcast exactly once: {events:?}"
        );
    }
    assert!(
        bob_events
            .iter()
            .any(|e| matches!(e, ServerMessage::ForceChallengeEnd { .. }))
    );

    // The force-end outcome stands; the late persist attaches nothing.
    let challenge = store.find_challenge(challenge_id).await.unwrap().unwrap();
    assert_eq!(challenge.status, ChallengeStatus::Completed);
    assert_eq!(challenge.winner, Some(ALICE));
    assert!(challenge.opponent_outcome.unwrap().result_id.is_none());
    assert!(state.sessions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rejoin_mid_match_resyncs_the_client() {
    let (state, _store, challenge_id) = setup(Arc::new(RecordingSink::default()), 2).await;
    let (mut alice_rx, _bob_rx) = start_match(&state, challenge_id).await;

    let (mut bob_rx2, outcome) = join(&state, challenge_id, BOB, "bob").await;
    outcome.unwrap();
    let bob_events = drain(&mut bob_rx2);
    assert!(matches!(bob_events[..], [ServerMessage::ChallengeStart]));
    assert!(drain(&mut alice_rx).is_empty());

    // Progress continues on the replacement connection.
    answer(&state, challenge_id, BOB, 0, "Paris", 6).await;
    let bob_events = drain(&mut bob_rx2);
    assert!(
        bob_events
            .iter()
            .any(|e| matches!(e, ServerMessage::ChallengeAnswerResult { correct: true, .. }))
    );
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_grace_still_force_resolves() {
    let sink = Arc::new(RecordingSink::default());
    let (state, _store, challenge_id) = setup(sink, 1).await;
    let (mut alice_rx, mut bob_rx) = start_match(&state, challenge_id).await;

    answer(&state, challenge_id, ALICE, 0, "Paris", 7).await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    // Both connections drop while the grace timer is pending; the session
    // must survive and still resolve from last-known scores.
    coordinator::leave(&state, challenge_id, BOB).await;
    coordinator::leave(&state, challenge_id, ALICE).await;
    assert_eq!(state.sessions().len(), 1);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(state.sessions().is_empty());
}
