use clap::Parser;
use crypto_bigint::U2048;
use schnorr_login::proto::auth_service_client::AuthServiceClient;
use schnorr_login::proto::{
    ChallengeRequest, RegisterRequest, ValidateTokenRequest, VerifyRequest,
};
use rand_core::OsRng;
use schnorr_login::{Credential, GroupParams, LoginAttempt, Scalar};
use sha2::{Digest, Sha256};
use tonic::Code;

#[derive(Parser, Debug)]
#[command(name = "client")]
#[command(about = "Schnorr zero-knowledge login client", long_about = None)]
#[command(version)]
struct Args {
    /// Server URL
    #[arg(short, long, env = "AUTH_SERVER_URL", default_value = "http://127.0.0.1:50051")]
    server: String,

    /// Username to register and log in as
    #[arg(short, long, default_value = "testuser")]
    username: String,

    /// Derive the secret deterministically from the username instead of
    /// generating a random one (repeatable demo logins)
    #[arg(long)]
    deterministic: bool,

    /// Opaque salt submitted at registration
    #[arg(long, default_value = "test_salt_12345")]
    salt: String,
}

/// Demo-only secret derivation: x = SHA-256("private_key_<username>").
///
/// A 256-bit digest is always canonical mod the 2047-bit q. Real deployments
/// generate and store a random secret instead.
fn deterministic_secret(username: &str) -> Scalar {
    let digest = Sha256::digest(format!("private_key_{username}").as_bytes());

    let mut wide = [0u8; 256];
    wide[256 - 32..].copy_from_slice(&digest);
    Scalar::new(U2048::from_be_slice(&wide))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let group = GroupParams::modp_2048();
    let mut rng = OsRng;

    let credential = if args.deterministic {
        Credential::from_secret(&group, deterministic_secret(&args.username))
    } else {
        Credential::generate(&group, &mut rng)
    };

    println!("User: {}", args.username);
    println!("Connecting to {}", args.server);

    let mut client = AuthServiceClient::connect(args.server.clone()).await?;

    // Step 1: register Y = g^x mod p. An existing registration is fine for
    // deterministic demo credentials; the stored key is identical.
    let register = client
        .register(RegisterRequest {
            username: args.username.clone(),
            public_key_y: credential.public_key().to_hex(),
            salt: args.salt.clone(),
        })
        .await;

    match register {
        Ok(response) => println!("Registered: {}", response.into_inner().message),
        Err(status) if status.code() == Code::AlreadyExists && args.deterministic => {
            println!("Already registered, continuing with login");
        }
        Err(status) => return Err(status.into()),
    }

    // Step 2: commit to R = g^k mod p and request a challenge.
    let attempt = LoginAttempt::begin(&group, &mut rng);

    let challenge = client
        .create_challenge(ChallengeRequest {
            username: args.username.clone(),
            client_r: attempt.commitment().to_hex(),
        })
        .await?
        .into_inner();

    println!(
        "Challenge received: id={}... expires in {}s",
        &challenge.challenge_id[..16.min(challenge.challenge_id.len())],
        challenge.expires_in
    );

    // Step 3: answer with s = (k + c*x) mod q.
    let c = Scalar::from_hex(&challenge.c).map_err(|_| "server sent an invalid challenge")?;
    let s = attempt.respond(&group, &credential, &c);

    let verified = client
        .verify_proof(VerifyRequest {
            challenge_id: challenge.challenge_id,
            s: s.to_hex(),
            client_r: attempt.commitment().to_hex(),
            username: args.username.clone(),
        })
        .await?
        .into_inner();

    println!("Login succeeded, token valid for {}s", verified.expires_in);
    println!("Token: {}", verified.token);

    // Step 4: round-trip the token the way protected services would.
    let validated = client
        .validate_token(ValidateTokenRequest {
            token: verified.token,
        })
        .await?
        .into_inner();

    println!("Token validates as '{}'", validated.username);
    Ok(())
}
