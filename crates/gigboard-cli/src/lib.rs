#![allow(clippy::print_stdout)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::panic))]

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use gigboard_client_core::{
    ApiRequest, AuthSessionManager, DurableStorage, FileStorage, GatewayConfig, HttpMethod,
    ReqwestTransport, RequestGateway, Role, TokenStore, TracingErrorSink,
};
use gigboard_web_shell::{
    MemoryNavigation, Page, PageRenderer, SessionBootstrapper, TracingBusyIndicator,
};

const STATE_FILE_NAME: &str = "session.json";

#[derive(Parser)]
#[command(name = "gigboard")]
#[command(about = "Gigboard marketplace client")]
pub struct GigboardCli {
    /// API base URL, e.g. http://127.0.0.1:80/api (overrides GIGBOARD_API_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// File holding tokens, role and user id between runs
    #[arg(long, global = true)]
    pub state_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and resolve the account role
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Register a contractor account from a JSON profile
    RegisterContractor(ProfileArgs),
    /// Register a contractee account from a JSON profile
    RegisterContractee(ProfileArgs),
    /// Sign out and forget the local session
    Logout,
    /// Show the current user's role as reported by the server
    Whoami,
    /// Send an API request through the authenticated gateway
    Request(RequestArgs),
    /// Show which page a fragment resolves to for the stored role
    Route {
        /// Navigation fragment, e.g. `#order/42`
        fragment: String,
    },
    /// Show local session state
    Status,
}

#[derive(Args)]
pub struct ProfileArgs {
    /// Registration payload as a JSON object
    #[arg(long)]
    pub profile: String,
}

#[derive(Args)]
pub struct RequestArgs {
    /// GET, POST, PATCH, PUT or DELETE
    pub method: String,
    /// Path below the API base, e.g. /orders
    pub path: String,
    /// JSON request body
    #[arg(long, conflicts_with = "form")]
    pub json: Option<String>,
    /// Url-encoded form field as key=value; repeatable
    #[arg(long)]
    pub form: Vec<String>,
    /// Send without the access token
    #[arg(long)]
    pub no_auth: bool,
}

struct Session {
    storage: Rc<FileStorage>,
    config: GatewayConfig,
    gateway: Rc<RequestGateway>,
    auth: AuthSessionManager,
}

impl Session {
    fn open(cli: &GigboardCli) -> anyhow::Result<Self> {
        let (env_config, source) = GatewayConfig::from_env().context("invalid gateway configuration")?;
        let config = match &cli.base_url {
            Some(base_url) => GatewayConfig::new(base_url)
                .context("invalid --base-url")?
                .with_refresh_cycle_limit(env_config.refresh_cycle_limit),
            None => env_config,
        };
        tracing::debug!(base_url = %config.base_url, source, "Resolved API base URL");

        let path = cli.state_file.clone().unwrap_or_else(default_state_path);
        let storage = Rc::new(FileStorage::open(path));
        let tokens = Rc::new(TokenStore::load(storage.clone()));
        let gateway = Rc::new(RequestGateway::new(
            config.clone(),
            tokens.clone(),
            Rc::new(ReqwestTransport::new()),
            Rc::new(TracingErrorSink),
        ));
        let auth = AuthSessionManager::new(gateway.clone(), tokens, storage.clone());
        Ok(Self {
            storage,
            config,
            gateway,
            auth,
        })
    }
}

pub async fn run() -> anyhow::Result<()> {
    let cli = GigboardCli::parse();
    execute(&cli).await
}

pub async fn execute(cli: &GigboardCli) -> anyhow::Result<()> {
    let session = Session::open(cli)?;
    match &cli.command {
        Commands::Login { username, password } => {
            session.auth.login(username, password).await?;
            let role = session.auth.resolve_role().await?;
            println!("Signed in as {role}");
        }
        Commands::RegisterContractor(args) => {
            session.auth.register_contractor(parse_profile(&args.profile)?).await?;
            let role = session.auth.resolve_role().await?;
            println!("Registered and signed in as {role}");
        }
        Commands::RegisterContractee(args) => {
            session.auth.register_contractee(parse_profile(&args.profile)?).await?;
            let role = session.auth.resolve_role().await?;
            println!("Registered and signed in as {role}");
        }
        Commands::Logout => {
            let outcome = session.auth.logout().await;
            println!("Local session cleared");
            outcome?;
        }
        Commands::Whoami => {
            let role = session.auth.resolve_role().await.inspect_err(|error| {
                if error.is_refresh_failure() {
                    session.auth.forget_local_session();
                }
            })?;
            let user_id = session.auth.user_id().unwrap_or_else(|| "-".to_string());
            println!("{role} (user {user_id})");
        }
        Commands::Request(args) => {
            let request = build_request(args)?;
            let response = session.gateway.send(request).await.inspect_err(|error| {
                if error.is_refresh_failure() {
                    session.auth.forget_local_session();
                }
            });
            match response? {
                Some(body) => println!("{}", serde_json::to_string_pretty(&body)?),
                None => println!("(no JSON body)"),
            }
        }
        Commands::Route { fragment } => {
            let (role, page) = preview_route(session.storage.clone(), fragment)?;
            println!("{role} -> {}", serde_json::to_string(&page)?);
        }
        Commands::Status => {
            let credentials = session.gateway.tokens().snapshot();
            println!("base url:      {}", session.config.base_url);
            println!("state file:    {}", session.storage.path().display());
            println!("role:          {}", session.auth.current_role());
            println!(
                "user id:       {}",
                session.auth.user_id().unwrap_or_else(|| "-".to_string())
            );
            println!("access token:  {}", presence(credentials.access_token.as_ref()));
            println!("refresh token: {}", presence(credentials.refresh_token.as_ref()));
        }
    }
    Ok(())
}

fn presence(token: Option<&String>) -> &'static str {
    if token.is_some() { "present" } else { "absent" }
}

fn default_state_path() -> PathBuf {
    if let Some(mut data_dir) = dirs::data_local_dir() {
        data_dir.push("gigboard");
        data_dir.push(STATE_FILE_NAME);
        return data_dir;
    }
    if let Some(mut home_dir) = dirs::home_dir() {
        home_dir.push(".gigboard");
        home_dir.push(STATE_FILE_NAME);
        return home_dir;
    }
    PathBuf::from(STATE_FILE_NAME)
}

fn parse_profile(raw: &str) -> anyhow::Result<serde_json::Value> {
    let profile: serde_json::Value = serde_json::from_str(raw).context("profile is not valid JSON")?;
    if !profile.is_object() {
        bail!("profile must be a JSON object");
    }
    Ok(profile)
}

fn build_request(args: &RequestArgs) -> anyhow::Result<ApiRequest> {
    let Some(method) = HttpMethod::parse(&args.method) else {
        bail!("unsupported method `{}`", args.method);
    };
    let path = if args.path.starts_with('/') {
        args.path.clone()
    } else {
        format!("/{}", args.path)
    };

    let mut request = ApiRequest::new(method, path);
    if let Some(raw) = &args.json {
        let body = serde_json::from_str(raw).context("--json is not valid JSON")?;
        request = request.json(body);
    } else if !args.form.is_empty() {
        let mut pairs = Vec::with_capacity(args.form.len());
        for field in &args.form {
            let Some((key, value)) = field.split_once('=') else {
                bail!("form field `{field}` must be key=value");
            };
            pairs.push((key, value));
        }
        request = request.form(pairs);
    }
    if args.no_auth {
        request = request.without_auth();
    }
    Ok(request)
}

#[derive(Default)]
struct LastPage(RefCell<Option<(Role, Page)>>);

impl PageRenderer for LastPage {
    fn render(&self, role: Role, page: Page) -> anyhow::Result<()> {
        self.0.replace(Some((role, page)));
        Ok(())
    }
}

/// Boots the shell for the stored role on an in-memory navigation host and
/// reports the page `fragment` renders.
fn preview_route(storage: Rc<dyn DurableStorage>, fragment: &str) -> anyhow::Result<(Role, Page)> {
    let renderer = Rc::new(LastPage::default());
    let bootstrapper = SessionBootstrapper::new(
        storage,
        Rc::new(MemoryNavigation::new(fragment)),
        Rc::new(TracingBusyIndicator),
        renderer.clone(),
    );
    bootstrapper.boot()?;
    bootstrapper.shutdown();
    renderer
        .0
        .take()
        .context("no page was rendered for this fragment")
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use clap::error::ErrorKind;
    use gigboard_client_core::{MemoryStorage, RequestBody};

    use super::*;

    #[test]
    fn cli_requires_subcommand() {
        let err = match GigboardCli::try_parse_from(["gigboard"]) {
            Ok(_) => panic!("expected missing subcommand parse error"),
            Err(err) => err,
        };
        assert_eq!(err.kind(), ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand);
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = GigboardCli::try_parse_from([
            "gigboard",
            "status",
            "--base-url",
            "http://localhost:8000/api",
            "--state-file",
            "/tmp/gigboard.json",
        ])
        .expect("parsed");
        assert_eq!(cli.base_url.as_deref(), Some("http://localhost:8000/api"));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn json_and_form_bodies_conflict() {
        let result = GigboardCli::try_parse_from([
            "gigboard", "request", "POST", "/orders", "--json", "{}", "--form", "a=b",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn request_args_build_form_requests() {
        let args = RequestArgs {
            method: "post".to_string(),
            path: "auth/login".to_string(),
            json: None,
            form: vec!["username=ivan".to_string(), "password=a=b".to_string()],
            no_auth: true,
        };
        let request = build_request(&args).expect("built");
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.path, "/auth/login");
        assert_eq!(
            request.body,
            RequestBody::Text("username=ivan&password=a%3Db".to_string())
        );
        assert!(!request.require_auth);
    }

    #[test]
    fn request_args_reject_unknown_method_and_bad_fields() {
        let mut args = RequestArgs {
            method: "TRACE".to_string(),
            path: "/orders".to_string(),
            json: None,
            form: Vec::new(),
            no_auth: false,
        };
        assert!(build_request(&args).is_err());

        args.method = "POST".to_string();
        args.form = vec!["missing-separator".to_string()];
        assert!(build_request(&args).is_err());
    }

    #[test]
    fn profile_must_be_an_object() {
        assert!(parse_profile(r#"{"email":"a@b.c"}"#).is_ok());
        assert!(parse_profile("[1,2]").is_err());
        assert!(parse_profile("not json").is_err());
    }

    #[test]
    fn route_preview_uses_stored_role() {
        let storage = Rc::new(MemoryStorage::with_entries([("role", "contractor")]));
        let (role, page) = preview_route(storage, "#order/42").expect("rendered");
        assert_eq!(role, Role::Contractor);
        assert_eq!(page, Page::Order { id: Some(42.0) });

        let guest = Rc::new(MemoryStorage::new());
        let (role, page) = preview_route(guest, "#create-order").expect("rendered");
        assert_eq!(role, Role::Guest);
        assert_eq!(page, Page::Landing);
    }

    #[test]
    fn state_file_round_trips_between_sessions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("session.json");
        let cli = GigboardCli::try_parse_from([
            "gigboard",
            "status",
            "--base-url",
            "http://localhost:8000/api/",
            "--state-file",
            path.to_str().expect("utf-8 path"),
        ])
        .expect("parsed");

        let session = Session::open(&cli).expect("opened");
        assert_eq!(session.config.base_url, "http://localhost:8000/api");
        session.storage.set("role", "admin");

        let reopened = Session::open(&cli).expect("reopened");
        assert_eq!(reopened.auth.current_role(), Role::Admin);
    }
}
