use super::{ReplyClassifier, ReplyIntent, Resolution, Role, SecurityChallenge, SessionError, SessionRegistry, SessionState, VerificationSession};

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use chrono::{TimeDelta, Utc};
use rust_decimal::Decimal;

use crate::config::FraudConfig;
use crate::models::{RiskRule, RiskVerdict, Transaction, TransactionStatus};

fn flagged_transaction(transaction_id: &str) -> Result<Transaction> {
    let mut transaction = Transaction::new(transaction_id, "U001", Decimal::from_str("6000")?, "USD", "fraud_shop", Utc::now());
    transaction.apply_verdict(&RiskVerdict::from_matches(vec![RiskRule::HighAmount]), Utc::now())?;
    Ok(transaction)
}

fn open_session(transaction_id: &str) -> Result<VerificationSession> {
    Ok(VerificationSession::create(&flagged_transaction(transaction_id)?, "amount exceeds normal range", None, 3, Utc::now())?)
}

fn challenge_session(transaction_id: &str, max_attempts: u32) -> Result<VerificationSession> {
    let challenge = SecurityChallenge::new("What is your mother's maiden name?", "Smith");
    Ok(VerificationSession::create(&flagged_transaction(transaction_id)?, "amount exceeds normal range", Some(challenge), max_attempts, Utc::now())?)
}

#[test]
fn test_classifier_rule_order_is_fixed() {
    assert_eq!(
        ReplyClassifier::confirmation().order(),
        vec![ReplyIntent::Confirm, ReplyIntent::Deny, ReplyIntent::Explain, ReplyIntent::Unrecognized]
    );
    assert_eq!(
        ReplyClassifier::challenge().order(),
        vec![ReplyIntent::Deny, ReplyIntent::AnswerChallenge, ReplyIntent::Explain, ReplyIntent::Unrecognized]
    );
}

#[test]
fn test_classifier_normalizes_tokens() {
    let classifier = ReplyClassifier::confirmation();

    for text in ["YES", "yes", " Yes ", "y", "\tY\n"] {
        assert_eq!(classifier.classify(text, None), ReplyIntent::Confirm, "{text:?}");
    }

    for text in ["no", "N", "  No  "] {
        assert_eq!(classifier.classify(text, None), ReplyIntent::Deny, "{text:?}");
    }

    assert_eq!(classifier.classify("why was this flagged", None), ReplyIntent::Explain);
    assert_eq!(classifier.classify("What's the REASON?", None), ReplyIntent::Explain);
    assert_eq!(classifier.classify("yes please", None), ReplyIntent::Unrecognized);
    assert_eq!(classifier.classify("maybe", None), ReplyIntent::Unrecognized);
}

#[test]
fn test_session_greets_with_merchant_amount_and_reason() -> Result<()> {
    let session = open_session("tx-1")?;

    assert_eq!(session.state(), SessionState::Greeting);
    assert_eq!(session.turns().len(), 1);
    assert_eq!(session.turns()[0].role(), Role::Assistant);
    assert!(session.greeting().contains("fraud_shop"));
    assert!(session.greeting().contains("6000 USD"));
    assert!(session.greeting().contains("amount exceeds normal range"));

    Ok(())
}

#[test]
fn test_session_requires_flagged_pending_transaction() -> Result<()> {
    let transaction = Transaction::new("tx-1", "U001", Decimal::from(10), "USD", "Amazon", Utc::now());
    let result = VerificationSession::create(&transaction, "within normal parameters", None, 3, Utc::now());

    assert!(matches!(result, Err(SessionError::NotFlagged { .. })));

    Ok(())
}

#[test]
fn test_yes_variants_resolve_approved() -> Result<()> {
    for text in ["YES", "yes", " Yes "] {
        let mut session = open_session("tx-1")?;
        let outcome = session.submit_reply(text, Utc::now())?;

        assert_eq!(outcome.resolution, Some(Resolution::Confirmed));
        assert_eq!(outcome.resolution.map(|resolution| resolution.final_status()), Some(TransactionStatus::Approved));
        assert!(outcome.reply.contains("approved"));
        assert_eq!(session.state(), SessionState::ResolvedApproved);
    }

    Ok(())
}

#[test]
fn test_no_resolves_blocked() -> Result<()> {
    let mut session = open_session("tx-1")?;
    let outcome = session.submit_reply("no", Utc::now())?;

    assert_eq!(outcome.resolution, Some(Resolution::Denied));
    assert_eq!(outcome.resolution.map(|resolution| resolution.final_status()), Some(TransactionStatus::Blocked));
    assert!(outcome.reply.contains("blocked"));
    assert_eq!(session.state(), SessionState::ResolvedBlocked);

    Ok(())
}

#[test]
fn test_explanation_request_keeps_session_open() -> Result<()> {
    let mut session = open_session("tx-1")?;
    let outcome = session.submit_reply("why was this flagged", Utc::now())?;

    assert!(outcome.resolution.is_none());
    assert!(outcome.reply.contains("amount exceeds normal range"));
    assert_eq!(session.state(), SessionState::AwaitingResponse);

    let outcome = session.submit_reply("hmm, not sure", Utc::now())?;

    assert!(outcome.resolution.is_none());
    assert!(outcome.reply.contains("YES"));
    assert_eq!(session.state(), SessionState::AwaitingResponse);

    Ok(())
}

#[test]
fn test_every_reply_appends_one_user_and_one_assistant_turn() -> Result<()> {
    let mut session = open_session("tx-1")?;

    session.submit_reply("why?", Utc::now())?;
    session.submit_reply("what?", Utc::now())?;
    session.submit_reply("yes", Utc::now())?;

    let roles: Vec<Role> = session.turns().iter().map(|turn| turn.role()).collect();

    assert_eq!(roles, vec![
        Role::Assistant,
        Role::User, Role::Assistant,
        Role::User, Role::Assistant,
        Role::User, Role::Assistant
    ]);
    assert!(session.turns().windows(2).all(|pair| pair[0].timestamp() <= pair[1].timestamp()));

    Ok(())
}

#[test]
fn test_resolved_session_rejects_further_replies() -> Result<()> {
    let mut session = open_session("tx-1")?;
    session.submit_reply("yes", Utc::now())?;
    let turns = session.turns().len();

    let result = session.submit_reply("yes", Utc::now());

    assert!(matches!(result, Err(SessionError::SessionTerminal { state: SessionState::ResolvedApproved, .. })));
    assert_eq!(session.turns().len(), turns);

    Ok(())
}

#[test]
fn test_empty_reply_appends_only_the_user_turn() -> Result<()> {
    let mut session = open_session("tx-1")?;
    let result = session.submit_reply("   ", Utc::now());

    assert!(matches!(result, Err(SessionError::EmptyReply { .. })));
    assert_eq!(session.turns().len(), 2);
    assert_eq!(session.state(), SessionState::AwaitingResponse);

    Ok(())
}

#[test]
fn test_replay_returns_recorded_answer_for_same_turn() -> Result<()> {
    let mut session = open_session("tx-1")?;

    assert_eq!(session.replay(1, "YES")?, None);

    let outcome = session.submit_reply("YES", Utc::now())?;

    assert_eq!(session.replay(1, " YES ")?, Some(outcome.reply));
    assert!(matches!(session.replay(1, "NO"), Err(SessionError::TurnConflict { turn: 1, .. })));
    assert!(matches!(session.replay(3, "YES"), Err(SessionError::TurnConflict { turn: 3, .. })));
    assert!(matches!(session.replay(0, "YES"), Err(SessionError::TurnConflict { turn: 0, .. })));

    Ok(())
}

#[test]
fn test_challenge_answer_approves_through_verification() -> Result<()> {
    let mut session = challenge_session("tx-1", 3)?;

    assert!(session.greeting().contains("mother's maiden name"));

    let outcome = session.submit_reply("yes", Utc::now())?;
    assert!(outcome.resolution.is_none());
    assert!(outcome.reply.contains("2 attempt(s) left"));

    let outcome = session.submit_reply("  SMITH ", Utc::now())?;
    assert_eq!(outcome.resolution, Some(Resolution::ChallengePassed));
    assert_eq!(session.state(), SessionState::ResolvedApproved);

    Ok(())
}

#[test]
fn test_challenge_blocks_after_max_failed_attempts() -> Result<()> {
    let mut session = challenge_session("tx-1", 2)?;

    let outcome = session.submit_reply("jones", Utc::now())?;
    assert!(outcome.resolution.is_none());

    let outcome = session.submit_reply("why was this flagged?", Utc::now())?;
    assert!(outcome.resolution.is_none());
    assert!(outcome.reply.contains("amount exceeds normal range"));

    let outcome = session.submit_reply("brown", Utc::now())?;
    assert_eq!(outcome.resolution, Some(Resolution::ChallengeFailed));
    assert_eq!(session.state(), SessionState::ResolvedBlocked);

    Ok(())
}

#[test]
fn test_challenge_answer_is_redacted_from_debug_output() {
    let challenge = SecurityChallenge::new("First pet?", "Fluffy");

    assert!(!format!("{challenge:?}").contains("luffy"));
    assert!(challenge.get(0).is_some_and(|question| question.accepts("fluffy")));
    assert!(!SecurityChallenge::new("First pet?", "  ").get(0).is_some_and(|question| question.accepts("")));
}

#[test]
fn test_every_security_question_must_be_answered() -> Result<()> {
    let challenge = SecurityChallenge::new("First pet?", "Rex")
        .with_question("City of birth?", "Toronto");
    assert_eq!(challenge.question_count(), 2);

    let mut session = VerificationSession::create(&flagged_transaction("tx-1")?, "amount exceeds normal range", Some(challenge), 3, Utc::now())?;
    assert!(session.greeting().contains("First pet?"));

    let outcome = session.submit_reply("toronto", Utc::now())?;
    assert!(outcome.resolution.is_none());
    assert!(outcome.reply.contains("First pet?"));

    let outcome = session.submit_reply("rex", Utc::now())?;
    assert!(outcome.resolution.is_none());
    assert!(outcome.reply.contains("City of birth?"));
    assert_eq!(session.state(), SessionState::AwaitingResponse);

    let outcome = session.submit_reply("why was this flagged?", Utc::now())?;
    assert!(outcome.reply.contains("City of birth?"));

    let outcome = session.submit_reply("Toronto", Utc::now())?;
    assert_eq!(outcome.resolution, Some(Resolution::ChallengePassed));
    assert_eq!(session.state(), SessionState::ResolvedApproved);

    Ok(())
}

#[test]
fn test_failed_attempts_count_across_security_questions() -> Result<()> {
    let challenge = SecurityChallenge::new("First pet?", "Rex")
        .with_question("City of birth?", "Toronto");
    let mut session = VerificationSession::create(&flagged_transaction("tx-1")?, "amount exceeds normal range", Some(challenge), 2, Utc::now())?;

    assert!(session.submit_reply("max", Utc::now())?.resolution.is_none());
    assert!(session.submit_reply("rex", Utc::now())?.resolution.is_none());

    let outcome = session.submit_reply("ottawa", Utc::now())?;
    assert_eq!(outcome.resolution, Some(Resolution::ChallengeFailed));
    assert_eq!(session.state(), SessionState::ResolvedBlocked);

    Ok(())
}

#[test]
fn test_idle_detection_and_expiry() -> Result<()> {
    let mut session = open_session("tx-1")?;
    let later = session.last_activity() + TimeDelta::seconds(120);

    assert!(!session.is_idle(later, Duration::from_secs(300)));
    assert!(session.is_idle(later, Duration::from_secs(60)));
    assert!(session.expire());
    assert_eq!(session.state(), SessionState::Expired);
    assert!(!session.expire());
    assert!(!session.is_idle(later, Duration::from_secs(60)));

    Ok(())
}

#[tokio::test]
async fn test_registry_rejects_second_open_session() -> Result<()> {
    let registry = SessionRegistry::new(&FraudConfig::default());

    registry.put(open_session("tx-1")?).await?;
    let result = registry.put(open_session("tx-1")?).await;

    assert!(matches!(result, Err(SessionError::AlreadyActive { .. })));
    assert_eq!(registry.active_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_registry_archives_resolved_sessions_and_allows_replacement() -> Result<()> {
    let registry = SessionRegistry::new(&FraudConfig::default());
    registry.put(open_session("tx-1")?).await?;

    let mut session = registry.get("tx-1").await.ok_or_else(|| anyhow::anyhow!("session missing"))?;
    session.submit_reply("no", Utc::now())?;
    registry.update(session).await?;

    assert_eq!(registry.active_count(), 0);
    assert_eq!(registry.archived_count().await, 1);
    assert!(matches!(registry.get("tx-1").await, Some(session) if session.state() == SessionState::ResolvedBlocked));

    registry.put(open_session("tx-1")?).await?;

    assert!(matches!(registry.get("tx-1").await, Some(session) if session.state() == SessionState::Greeting));
    assert_eq!(registry.archived_count().await, 0);

    Ok(())
}

#[tokio::test]
async fn test_registry_update_requires_open_session() -> Result<()> {
    let registry = SessionRegistry::new(&FraudConfig::default());
    let result = registry.update(open_session("tx-1")?).await;

    assert!(matches!(result, Err(SessionError::NoActiveSession { .. })));

    Ok(())
}

#[tokio::test]
async fn test_registry_sweep_only_expires_idle_open_sessions() -> Result<()> {
    let config = FraudConfig::default().with_session_idle_timeout(Duration::from_secs(60));
    let registry = SessionRegistry::new(&config);

    registry.put(open_session("tx-idle")?).await?;
    registry.put(open_session("tx-done")?).await?;

    let mut done = registry.get("tx-done").await.ok_or_else(|| anyhow::anyhow!("session missing"))?;
    done.submit_reply("yes", Utc::now())?;
    registry.update(done).await?;

    assert!(registry.sweep_expired(Utc::now()).await.is_empty());

    let expired = registry.sweep_expired(Utc::now() + TimeDelta::seconds(120)).await;

    assert_eq!(expired, vec!["tx-idle".to_string()]);
    assert!(matches!(registry.get("tx-idle").await, Some(session) if session.state() == SessionState::Expired));
    assert!(matches!(registry.get("tx-done").await, Some(session) if session.state() == SessionState::ResolvedApproved));

    Ok(())
}
