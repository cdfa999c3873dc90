use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use lift_rooms::config::AppConfig;
use lift_rooms::identity::{AuthFlows, GoTrueClient, IdentityProvider};
use lift_rooms::navigator::{AdvanceOutcome, SceneNavigator};
use lift_rooms::profile::ProfileProvisioner;
use lift_rooms::store::{Database, LibSqlBackend};

const HELP: &str = "\
Triggers: next, back, go-left, go-right, enter-lift, call-lift, exit-lift, floor-select, exit
Commands:
  /login <email> <password>
  /signup <email> <password> [username]
  /oauth <provider>          print the sign-in URL
  /token <access-token>      finish an OAuth sign-in
  /reset <email>
  /password <new-password>
  /logout
  /whoami
  /quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;
    let Some(auth_config) = config.auth.clone() else {
        eprintln!("Error: LIFT_ROOMS_AUTH_URL not set");
        eprintln!("  export LIFT_ROOMS_AUTH_URL=https://<project>.supabase.co");
        eprintln!("  export LIFT_ROOMS_AUTH_KEY=<anon key>");
        std::process::exit(1);
    };

    eprintln!("🛗 lift-rooms v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Session: {}", config.session_key);

    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);
    let gotrue = Arc::new(GoTrueClient::new(&auth_config)?);
    let identity: Arc<dyn IdentityProvider> = gotrue.clone();
    let provisioner = Arc::new(ProfileProvisioner::new(
        Arc::clone(&db),
        config.provisioner.clone(),
    ));

    let flows = AuthFlows::new(Arc::clone(&identity), Arc::clone(&provisioner));
    let navigator = SceneNavigator::open(
        Arc::clone(&db),
        identity,
        provisioner,
        config.session_key.clone(),
    )
    .await?;

    eprintln!("   Scene: {}\n", navigator.current_scene().await);
    eprintln!("{HELP}\n");
    eprint!("> ");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            eprint!("> ");
            continue;
        }
        if line == "/quit" {
            break;
        }

        if let Some(command) = line.strip_prefix('/') {
            run_command(command, &flows, &gotrue).await;
        } else {
            match navigator.advance_label(line).await {
                Ok(AdvanceOutcome::Moved { from, to }) => println!("{from} → {to}"),
                Ok(AdvanceOutcome::Ignored) => println!("Nothing happens."),
                Ok(AdvanceOutcome::Busy) => println!("Still checking, hold on."),
                Ok(AdvanceOutcome::AuthenticationRequired) => {
                    println!("Please sign in first to continue (/login or /oauth).")
                }
                Err(e) => println!("Error: {e}"),
            }
            let exits: Vec<String> = navigator
                .state()
                .await
                .successors()
                .iter()
                .map(|(trigger, scene)| format!("{trigger} → {scene}"))
                .collect();
            println!("[{}] {}", navigator.current_scene().await, exits.join(", "));
        }
        eprint!("> ");
    }

    navigator.settle().await;
    Ok(())
}

async fn run_command(command: &str, flows: &AuthFlows, gotrue: &GoTrueClient) {
    let parts: Vec<&str> = command.split_whitespace().collect();
    let result = match parts.as_slice() {
        ["login", email, password] => flows.sign_in(email, password).await.map(|outcome| {
            let username = outcome
                .profile
                .map(|p| p.username)
                .unwrap_or_else(|| "(no profile)".into());
            if outcome.first_login {
                format!("Welcome, {username}! This is your first visit.")
            } else {
                format!("Signed in as {username}.")
            }
        }),
        ["signup", email, password, rest @ ..] => flows
            .sign_up(email, password, rest.first().copied())
            .await
            .map(|outcome| outcome.message),
        ["oauth", provider] => flows.oauth_url(provider, None).await,
        ["token", token] => {
            gotrue.set_session(token).await;
            flows.complete_oauth().await.map(|profile| match profile {
                Some(p) => format!("Signed in as {}.", p.username),
                None => "Token did not yield a session.".into(),
            })
        }
        ["reset", email] => flows
            .reset_password(email)
            .await
            .map(|_| "Check your inbox for a reset link.".to_string()),
        ["password", new_password] => flows
            .update_password(new_password)
            .await
            .map(|_| "Password updated!".to_string()),
        ["logout"] => flows.sign_out().await.map(|_| "Signed out.".to_string()),
        ["whoami"] => Ok(flows
            .session_label()
            .await
            .unwrap_or_else(|| "Not signed in.".into())),
        _ => Ok(HELP.to_string()),
    };

    match result {
        Ok(message) => println!("{message}"),
        Err(e) => println!("Error: {e}"),
    }
}
