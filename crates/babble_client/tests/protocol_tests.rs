mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};

use babble_client::auth::{AuthError, AuthState};
use babble_client::{ClientError, Delegation, ProtocolClient};
use babble_crypto::address;
use babble_proto::api::MailboxMessage;
use babble_proto::build_envelope;
use common::{connect, identities, try_connect, FakeAuth, FakeRelay, CHAIN_ID};

const ALPHA: &str = "the wise mans fear none name the man the";
const BETA: &str = "the name of the wind man fear the man the";

fn fixtures() -> (Arc<FakeAuth>, Arc<FakeRelay>) {
    (Arc::new(FakeAuth::long_lived()), Arc::new(FakeRelay::default()))
}

#[tokio::test]
async fn two_parties_exchange_messages() {
    let (auth, relay) = fixtures();
    let mut alpha = connect(ALPHA, &auth, &relay).await;
    let mut beta = connect(BETA, &auth, &relay).await;

    alpha.send(beta.delegate_address(), "why hello there").await.unwrap();

    let inbox = beta.receive().await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].text, "why hello there");
    assert_eq!(inbox[0].sender, alpha.delegate_address());
    assert_eq!(inbox[0].sender_public_key, alpha.identity().public_key());
    assert_eq!(inbox[0].target, beta.delegate_address());

    let reply = format!("thanks for the message: {}", inbox[0].text);
    beta.send(alpha.delegate_address(), &reply).await.unwrap();

    let inbox = alpha.receive().await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].text, "thanks for the message: why hello there");
    assert_eq!(inbox[0].sender_public_key, beta.identity().public_key());
    assert!(inbox[0].sent_at < inbox[0].expires_at);
}

#[tokio::test]
async fn high_water_mark_tracks_newest_message() {
    let (auth, relay) = fixtures();
    let mut alpha = connect(ALPHA, &auth, &relay).await;
    let mut beta = connect(BETA, &auth, &relay).await;
    assert_eq!(beta.last_seen(), None);

    let mut sent = Vec::new();
    for text in ["one", "two", "three"] {
        sent.push(alpha.send(beta.delegate_address(), text).await.unwrap());
    }
    assert!(sent[0].sent_at < sent[1].sent_at && sent[1].sent_at < sent[2].sent_at);

    let inbox = beta.receive().await.unwrap();
    let texts: Vec<_> = inbox.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["one", "two", "three"]);
    assert_eq!(beta.last_seen(), Some(sent[2].sent_at));

    assert!(beta.receive().await.unwrap().is_empty());
    assert_eq!(beta.last_seen(), Some(sent[2].sent_at));

    let later = alpha.send(beta.delegate_address(), "four").await.unwrap();
    let inbox = beta.receive().await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].id, later.id);
    assert_eq!(beta.last_seen(), Some(later.sent_at));
}

#[tokio::test]
async fn new_instance_reobserves_unexpired_messages() {
    let (auth, relay) = fixtures();
    let mut alpha = connect(ALPHA, &auth, &relay).await;
    let mut beta = connect(BETA, &auth, &relay).await;

    alpha.send(beta.delegate_address(), "hello").await.unwrap();
    assert_eq!(beta.receive().await.unwrap().len(), 1);

    let mut restarted = connect(BETA, &auth, &relay).await;
    assert_eq!(restarted.receive().await.unwrap().len(), 1);
}

#[tokio::test]
async fn sender_ignores_its_own_outgoing_messages() {
    let (auth, relay) = fixtures();
    let mut alpha = connect(ALPHA, &auth, &relay).await;
    let beta = connect(BETA, &auth, &relay).await;

    alpha.send(beta.delegate_address(), "hello").await.unwrap();
    assert!(alpha.receive().await.unwrap().is_empty());
    assert_eq!(alpha.last_seen(), None);
}

#[tokio::test]
async fn fresh_token_is_reused() {
    let (auth, relay) = fixtures();
    let mut alpha = connect(ALPHA, &auth, &relay).await;
    let beta = connect(BETA, &auth, &relay).await;
    let before = auth.challenges();

    alpha.send(beta.delegate_address(), "hello").await.unwrap();
    alpha.receive().await.unwrap();

    assert_eq!(auth.challenges(), before);
    assert!(matches!(alpha.auth().state(), AuthState::Authenticated(_)));
}

#[tokio::test]
async fn stale_token_is_renewed_before_each_operation() {
    // Two-minute tokens are always inside the five-minute renewal buffer.
    let auth = Arc::new(FakeAuth::new(Duration::minutes(2)));
    let relay = Arc::new(FakeRelay::default());
    let mut beta = connect(BETA, &auth, &relay).await;

    let before = auth.challenges();
    beta.receive().await.unwrap();
    assert_eq!(auth.challenges(), before + 1);

    let token = beta.auth().token().unwrap();
    assert_eq!(token.address, beta.identity().address());
    assert!(token.expires_at > Utc::now());
}

#[tokio::test]
async fn bad_address_prefix_fails_before_network() {
    let (auth, relay) = fixtures();
    let (delegate, account) = identities(ALPHA);
    let mut delegation = Delegation::new(&delegate, &account).unwrap();
    delegation.address = address::from_public_key("cosmos", delegate.public_key_bytes()).unwrap();

    let err = ProtocolClient::connect(
        delegation,
        account,
        CHAIN_ID,
        &Default::default(),
        auth.clone(),
        relay.clone(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ClientError::AddressFormat(_)));
    assert_eq!(auth.challenges(), 0);
    assert_eq!(relay.lookups(), 0);
}

#[tokio::test]
async fn delegation_for_another_account_is_rejected() {
    let (auth, relay) = fixtures();
    let (delegate, account) = identities(ALPHA);
    let (_, other_account) = identities(BETA);
    let delegation = Delegation::new(&delegate, &other_account).unwrap();

    let err = ProtocolClient::connect(
        delegation,
        account,
        CHAIN_ID,
        &Default::default(),
        auth.clone(),
        relay.clone(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ClientError::Crypto(_)));
    assert_eq!(auth.challenges(), 0);
}

#[tokio::test]
async fn send_to_malformed_address_is_rejected() {
    let (auth, relay) = fixtures();
    let mut alpha = connect(ALPHA, &auth, &relay).await;
    let lookups = relay.lookups();

    let err = alpha.send("fetch1notanaddress", "hi").await.unwrap_err();
    assert!(matches!(err, ClientError::AddressFormat(_)));
    assert_eq!(relay.lookups(), lookups);
}

#[tokio::test]
async fn unregistered_target_is_a_routing_error() {
    let (auth, relay) = fixtures();
    let mut alpha = connect(ALPHA, &auth, &relay).await;
    let (stranger, _) = identities("nobody registered this one");

    let err = alpha.send(stranger.address(), "hi").await.unwrap_err();
    assert!(matches!(err, ClientError::Routing(ref addr) if addr == stranger.address()));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn token_for_another_key_is_fatal() {
    let (_, impostor) = identities(BETA);
    let auth = Arc::new(FakeAuth::long_lived().issuing_for(&impostor.public_key()));
    let relay = Arc::new(FakeRelay::default());

    let err = try_connect(ALPHA, &auth, &relay).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Authentication(AuthError::IdentityMismatch { .. })
    ));
    assert!(!err.is_transport());
    assert_eq!(relay.lookups(), 0);
}

#[tokio::test]
async fn undecodable_messages_are_isolated() {
    let (auth, relay) = fixtures();
    let mut alpha = connect(ALPHA, &auth, &relay).await;
    let mut beta = connect(BETA, &auth, &relay).await;

    alpha.send(beta.delegate_address(), "before").await.unwrap();
    let junk = relay.inject(alpha.delegate_address(), beta.delegate_address(), "%%% not base64");
    alpha.send(beta.delegate_address(), "after").await.unwrap();

    let batch = beta.receive_batch().await.unwrap();
    let texts: Vec<_> = batch.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["before", "after"]);
    assert_eq!(batch.failures.len(), 1);
    assert_eq!(batch.failures[0].id, junk.id);
    assert!(matches!(batch.failures[0].error, ClientError::Codec(_)));

    assert!(beta.receive_batch().await.unwrap().failures.is_empty());
}

#[tokio::test]
async fn message_for_another_key_is_a_decryption_failure() {
    let (auth, relay) = fixtures();
    let alpha = connect(ALPHA, &auth, &relay).await;
    let mut beta = connect(BETA, &auth, &relay).await;
    let (_, gamma) = identities("gamma");

    let contents = build_envelope(alpha.identity(), &gamma.public_key(), "not for beta", 1, Utc::now())
        .unwrap()
        .encode()
        .unwrap();
    let stray = relay.inject(alpha.delegate_address(), beta.delegate_address(), &contents);

    let batch = beta.receive_batch().await.unwrap();
    assert!(batch.messages.is_empty());
    assert!(matches!(
        &batch.failures[0].error,
        ClientError::Decryption { id } if *id == stray.id
    ));
    assert!(beta.receive().await.unwrap().is_empty());
}

#[tokio::test]
async fn network_failures_are_transport_errors() {
    let (auth, relay) = fixtures();
    let mut beta = connect(BETA, &auth, &relay).await;

    relay.set_offline(true);
    let err = beta.receive().await.unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
    assert!(err.is_transport());

    let offline_auth = Arc::new(FakeAuth::offline());
    let err = try_connect(ALPHA, &offline_auth, &relay).await.unwrap_err();
    assert!(matches!(err, ClientError::Authentication(_)));
    assert!(err.is_transport());
}

#[tokio::test]
async fn registration_happens_once() {
    let (auth, relay) = fixtures();
    let mut alpha = connect(ALPHA, &auth, &relay).await;
    assert_eq!(relay.registrations(), 1);

    assert!(!alpha.ensure_registration().await.unwrap());
    let _again = connect(ALPHA, &auth, &relay).await;
    assert_eq!(relay.registrations(), 1);
    let own_address = alpha.delegate_address().to_string();
    let own_key = alpha.identity().public_key();
    assert_eq!(
        alpha.lookup_public_key(&own_address).await.unwrap(),
        Some(own_key)
    );
}

#[tokio::test]
async fn unreadable_timestamp_reported_once() {
    let (auth, relay) = fixtures();
    let mut beta = connect(BETA, &auth, &relay).await;
    relay.inject_record(MailboxMessage {
        id: "far-future".into(),
        group_id: None,
        sender: "fetch1sender".into(),
        target: beta.delegate_address().to_string(),
        contents: String::new(),
        commit_timestamp: i64::MAX,
        expiry_timestamp: i64::MAX,
    });

    let first = beta.receive_batch().await.unwrap();
    assert_eq!(first.failures.len(), 1);
    assert_eq!(first.failures[0].id, "far-future");
    assert!(matches!(first.failures[0].error, ClientError::Codec(_)));

    for _ in 0..2 {
        let again = beta.receive_batch().await.unwrap();
        assert!(again.failures.is_empty());
        assert!(again.messages.is_empty());
    }
    assert_eq!(beta.last_seen(), None);
}

#[tokio::test]
async fn refused_token_forces_sign_in() {
    let (auth, relay) = fixtures();
    let mut beta = connect(BETA, &auth, &relay).await;
    let before = auth.challenges();

    relay.revoke_token();
    let err = beta.receive().await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(beta.auth().state(), &AuthState::Unauthenticated);

    beta.receive().await.unwrap();
    assert_eq!(auth.challenges(), before + 1);
    assert!(matches!(beta.auth().state(), AuthState::Authenticated(_)));
}

#[tokio::test]
async fn agent_address_carrying_raw_key_is_accepted() {
    let (auth, relay) = fixtures();
    let (delegate, account) = identities(ALPHA);
    let mut delegation = Delegation::new(&delegate, &account).unwrap();
    delegation.address =
        address::encode(address::AGENT_PREFIX, delegate.public_key_bytes()).unwrap();
    let agent_address = delegation.address.clone();

    let client = ProtocolClient::connect(
        delegation,
        account,
        CHAIN_ID,
        &Default::default(),
        auth.clone(),
        relay.clone(),
    )
    .await
    .unwrap();
    assert_eq!(client.delegate_address(), agent_address);
}

#[tokio::test]
async fn address_of_another_key_is_rejected() {
    let (auth, relay) = fixtures();
    let (delegate, account) = identities(ALPHA);
    let (stranger, _) = identities(BETA);
    let mut delegation = Delegation::new(&delegate, &account).unwrap();
    delegation.address =
        address::encode(address::AGENT_PREFIX, stranger.public_key_bytes()).unwrap();

    let err = ProtocolClient::connect(
        delegation,
        account,
        CHAIN_ID,
        &Default::default(),
        auth.clone(),
        relay.clone(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ClientError::AddressFormat(_)));
    assert_eq!(auth.challenges(), 0);
}
