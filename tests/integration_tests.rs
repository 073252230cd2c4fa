//! End-to-end gRPC tests against a server on an ephemeral port.

use std::sync::Arc;

use schnorr_login::proto::auth_service_client::AuthServiceClient;
use schnorr_login::proto::auth_service_server::AuthServiceServer;
use schnorr_login::proto::{
    ChallengeRequest, RegisterRequest, ValidateTokenRequest, VerifyRequest,
};
use schnorr_login::server::{AuthServiceImpl, RateLimiter};
use rand_core::OsRng;
use schnorr_login::{
    Credential, GroupParams, LoginAttempt, MemoryChallengeStore, MemoryIdentityStore,
    ProtocolEngine, Scalar, SigningKey, TokenIssuer, TokenValidator,
};
use tonic::transport::{Channel, Server};
use tonic::Code;

const CHALLENGE_TTL_SECS: u64 = 300;
const TOKEN_LIFETIME_SECS: u64 = 3600;

async fn start_test_server() -> (AuthServiceClient<Channel>, tokio::task::JoinHandle<()>) {
    let group = Arc::new(GroupParams::modp_2048());
    let engine = ProtocolEngine::new(
        Arc::clone(&group),
        MemoryIdentityStore::new(),
        MemoryChallengeStore::new(),
        CHALLENGE_TTL_SECS,
    );

    let key = Arc::new(SigningKey::random());
    let issuer = TokenIssuer::new(Arc::clone(&key), TOKEN_LIFETIME_SECS);
    let validator = TokenValidator::new(key);
    let service = AuthServiceImpl::new(engine, issuer, validator, RateLimiter::new(60_000, 2000));

    let addr: std::net::SocketAddr = "127.0.0.1:0".parse().unwrap();
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    let local_addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        Server::builder()
            .add_service(AuthServiceServer::new(service))
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    let client = AuthServiceClient::connect(format!("http://{local_addr}"))
        .await
        .expect("Failed to connect to server");

    (client, handle)
}

#[tokio::test]
async fn full_authentication_flow() {
    let (mut client, _handle) = start_test_server().await;

    let group = GroupParams::modp_2048();
    let mut rng = OsRng;
    let credential = Credential::generate(&group, &mut rng);

    let register = client
        .register(RegisterRequest {
            username: "alice".to_string(),
            public_key_y: credential.public_key().to_hex(),
            salt: "salt".to_string(),
        })
        .await
        .expect("Registration should succeed")
        .into_inner();
    assert!(register.success);

    let attempt = LoginAttempt::begin(&group, &mut rng);
    let challenge = client
        .create_challenge(ChallengeRequest {
            username: "alice".to_string(),
            client_r: attempt.commitment().to_hex(),
        })
        .await
        .expect("Challenge creation should succeed")
        .into_inner();

    assert_eq!(challenge.expires_in, CHALLENGE_TTL_SECS);
    assert!(challenge.challenge_id.len() >= 32);

    let c = Scalar::from_hex(&challenge.c).expect("Challenge value should parse");
    let s = attempt.respond(&group, &credential, &c);

    let verified = client
        .verify_proof(VerifyRequest {
            challenge_id: challenge.challenge_id,
            s: s.to_hex(),
            client_r: attempt.commitment().to_hex(),
            username: "alice".to_string(),
        })
        .await
        .expect("Verification should succeed")
        .into_inner();

    assert_eq!(verified.expires_in, TOKEN_LIFETIME_SECS);

    let validated = client
        .validate_token(ValidateTokenRequest {
            token: verified.token,
        })
        .await
        .expect("Token validation should succeed")
        .into_inner();
    assert_eq!(validated.username, "alice");
}

#[tokio::test]
async fn duplicate_registration_is_already_exists() {
    let (mut client, _handle) = start_test_server().await;

    let group = GroupParams::modp_2048();
    let mut rng = OsRng;
    let credential = Credential::generate(&group, &mut rng);

    let request = RegisterRequest {
        username: "alice".to_string(),
        public_key_y: credential.public_key().to_hex(),
        salt: String::new(),
    };

    client.register(request.clone()).await.unwrap();
    let status = client.register(request).await.unwrap_err();
    assert_eq!(status.code(), Code::AlreadyExists);
}

#[tokio::test]
async fn invalid_public_key_is_invalid_argument() {
    let (mut client, _handle) = start_test_server().await;

    // 1 is the identity element and must be rejected at registration.
    let status = client
        .register(RegisterRequest {
            username: "alice".to_string(),
            public_key_y: "01".to_string(),
            salt: String::new(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let status = client
        .register(RegisterRequest {
            username: "alice".to_string(),
            public_key_y: "zz-not-hex".to_string(),
            salt: String::new(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn challenge_for_unknown_user_is_not_found() {
    let (mut client, _handle) = start_test_server().await;

    let group = GroupParams::modp_2048();
    let mut rng = OsRng;
    let attempt = LoginAttempt::begin(&group, &mut rng);

    let status = client
        .create_challenge(ChallengeRequest {
            username: "nobody".to_string(),
            client_r: attempt.commitment().to_hex(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);
}

#[tokio::test]
async fn bad_proof_and_replay_are_unauthenticated() {
    let (mut client, _handle) = start_test_server().await;

    let group = GroupParams::modp_2048();
    let mut rng = OsRng;
    let credential = Credential::generate(&group, &mut rng);

    client
        .register(RegisterRequest {
            username: "alice".to_string(),
            public_key_y: credential.public_key().to_hex(),
            salt: String::new(),
        })
        .await
        .unwrap();

    let attempt = LoginAttempt::begin(&group, &mut rng);
    let challenge = client
        .create_challenge(ChallengeRequest {
            username: "alice".to_string(),
            client_r: attempt.commitment().to_hex(),
        })
        .await
        .unwrap()
        .into_inner();

    // A garbage response consumes the challenge and fails closed.
    let status = client
        .verify_proof(VerifyRequest {
            challenge_id: challenge.challenge_id.clone(),
            s: "deadbeef".to_string(),
            client_r: attempt.commitment().to_hex(),
            username: "alice".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);

    // The correct proof now reports a replay, still unauthenticated.
    let c = Scalar::from_hex(&challenge.c).unwrap();
    let s = attempt.respond(&group, &credential, &c);
    let status = client
        .verify_proof(VerifyRequest {
            challenge_id: challenge.challenge_id,
            s: s.to_hex(),
            client_r: attempt.commitment().to_hex(),
            username: "alice".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);
    assert!(status.message().contains("already used"));
}

#[tokio::test]
async fn undecodable_response_is_invalid_argument_and_keeps_the_challenge() {
    let (mut client, _handle) = start_test_server().await;

    let group = GroupParams::modp_2048();
    let mut rng = OsRng;
    let credential = Credential::generate(&group, &mut rng);

    client
        .register(RegisterRequest {
            username: "alice".to_string(),
            public_key_y: credential.public_key().to_hex(),
            salt: String::new(),
        })
        .await
        .unwrap();

    let attempt = LoginAttempt::begin(&group, &mut rng);
    let challenge = client
        .create_challenge(ChallengeRequest {
            username: "alice".to_string(),
            client_r: attempt.commitment().to_hex(),
        })
        .await
        .unwrap()
        .into_inner();

    // Non-hex s never reaches the engine and must not retire the challenge.
    let status = client
        .verify_proof(VerifyRequest {
            challenge_id: challenge.challenge_id.clone(),
            s: "zz-not-hex".to_string(),
            client_r: attempt.commitment().to_hex(),
            username: "alice".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    // The challenge is still redeemable with the real proof.
    let c = Scalar::from_hex(&challenge.c).unwrap();
    let s = attempt.respond(&group, &credential, &c);
    client
        .verify_proof(VerifyRequest {
            challenge_id: challenge.challenge_id,
            s: s.to_hex(),
            client_r: attempt.commitment().to_hex(),
            username: "alice".to_string(),
        })
        .await
        .expect("Verification should succeed after a malformed attempt");
}

#[tokio::test]
async fn tampered_token_is_unauthenticated() {
    let (mut client, _handle) = start_test_server().await;

    let status = client
        .validate_token(ValidateTokenRequest {
            token: "abcd.ef01".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);
}

#[tokio::test]
async fn malformed_username_is_rejected_up_front() {
    let (mut client, _handle) = start_test_server().await;

    let status = client
        .register(RegisterRequest {
            username: "white space".to_string(),
            public_key_y: "02".to_string(),
            salt: String::new(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
}
