//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::ClientConfig;
use crate::error::{Error, Result, ResultExt};
use crate::http::retry_rate_limited;
use crate::pagination::{CollectionError, PaginationConfig, PaginationEngine, RemoteCollection};
use crate::session::SessionManager;
use crate::types::Method;
use serde_json::{json, Value};
use tracing::{info, warn};

/// Environment variable holding the account password
pub const PASSWORD_ENV: &str = "VOYAGER_PASSWORD";

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Login { password, force } => self.login(password.as_deref(), *force).await,
            Commands::Restore => self.restore().await,
            Commands::Logout => self.logout().await,
            Commands::Get { path } => self.get(path).await,
            Commands::Collect {
                path,
                limit,
                page_size,
                params,
                allow_partial,
            } => {
                self.collect(path, *limit, *page_size, params, *allow_partial)
                    .await
            }
        }
    }

    /// Load configuration
    fn load_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.cli.config {
            Some(path) => ClientConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ClientConfig::default(),
        };
        if let Some(dir) = &self.cli.cookies_dir {
            config.storage_root = Some(dir.clone());
        }
        Ok(config)
    }

    fn session(&self) -> Result<SessionManager> {
        SessionManager::from_config(self.load_config()?)
    }

    fn user(&self) -> Result<&str> {
        self.cli
            .user
            .as_deref()
            .ok_or_else(|| Error::config("Account not specified (use -u flag)"))
    }

    fn password(flag: Option<&str>) -> Option<String> {
        flag.map(String::from)
            .or_else(|| std::env::var(PASSWORD_ENV).ok())
            .filter(|p| !p.is_empty())
    }

    /// Restore the stored session, or log in when a password is available
    async fn establish(&self, session: &SessionManager) -> Result<()> {
        let user = self.user()?;
        if let Some(password) = Self::password(None) {
            return session.login(user, &password).await;
        }
        match session.restore_session(user).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::config(format!(
                "No stored session for '{user}'; run `login` first or set {PASSWORD_ENV}"
            ))),
            Err(e) => Err(e),
        }
    }

    /// Log in
    async fn login(&self, password: Option<&str>, force: bool) -> Result<()> {
        let user = self.user()?;
        let password = Self::password(password)
            .ok_or_else(|| Error::config(format!("Password not given (use --password or {PASSWORD_ENV})")))?;
        let session = self.session()?;

        if force {
            session.authenticate(user, &password).await?;
        } else {
            session.login(user, &password).await?;
        }

        info!(user, "logged in");
        self.output_message(&json!({
            "type": "LOGIN",
            "user": user,
            "state": session.state().await.to_string(),
            "cookies_path": session.store().record_path(user)?,
        }));
        Ok(())
    }

    /// Check the stored session
    async fn restore(&self) -> Result<()> {
        let user = self.user()?;
        let session = self.session()?;

        let (restored, expired) = match session.restore_session(user).await {
            Ok(restored) => (restored, false),
            Err(Error::SessionExpired { .. }) => (false, true),
            Err(e) => return Err(e),
        };

        self.output_message(&json!({
            "type": "RESTORE",
            "user": user,
            "restored": restored,
            "expired": expired,
        }));
        Ok(())
    }

    /// Delete the stored session
    async fn logout(&self) -> Result<()> {
        let user = self.user()?;
        let session = self.session()?;
        session
            .store()
            .delete(user)
            .await
            .context("Failed to delete stored session")?;

        self.output_message(&json!({ "type": "LOGOUT", "user": user }));
        Ok(())
    }

    /// Issue one authorized GET
    async fn get(&self, path: &str) -> Result<()> {
        let session = self.session()?;
        self.establish(&session).await?;

        let config = session.config();
        let response = retry_rate_limited(&config.retry_backoff, config.rate_limit_retries, || {
            session.request_with_reauth(Method::GET, path, None)
        })
        .await?;

        let body = response
            .json::<Value>()
            .unwrap_or_else(|_| Value::String(response.text()));
        self.output_message(&json!({
            "type": "RESPONSE",
            "status": response.status,
            "body": body,
        }));
        Ok(())
    }

    /// Fetch a paged collection
    async fn collect(
        &self,
        path: &str,
        limit: Option<usize>,
        page_size: Option<usize>,
        params: &[String],
        allow_partial: bool,
    ) -> Result<()> {
        let session = self.session()?;
        self.establish(&session).await?;

        let config = session.config();
        let page_size = page_size.unwrap_or(config.page_size);
        let engine = PaginationEngine::new(PaginationConfig::from(config));

        let mut collection = RemoteCollection::new(&session, path);
        for param in params {
            let (key, value) = parse_param(param)?;
            collection = collection.param(key, value);
        }

        let collection = &collection;
        let engine = &engine;
        let (aggregate, failure) =
            retry_rate_limited(&config.retry_backoff, config.rate_limit_retries, move || async move {
                match collection.collect(engine, page_size, limit).await {
                    Ok(aggregate) => Ok((aggregate, None)),
                    Err(CollectionError::Partial(partial))
                        if allow_partial && !partial.cause.is_rate_limited() =>
                    {
                        Ok((partial.partial, Some(partial.cause)))
                    }
                    Err(e) => Err(Error::from(e)),
                }
            })
            .await?;

        if let Some(cause) = &failure {
            warn!(error = %cause, fetched = aggregate.fetched_count, "returning partial collection");
        }

        let mut message = serde_json::to_value(&aggregate)?;
        if let Value::Object(map) = &mut message {
            map.insert("type".to_string(), json!("COLLECTION"));
            map.insert("path".to_string(), json!(path));
            if let Some(cause) = failure {
                map.insert("error".to_string(), json!(cause.to_string()));
            }
        }
        self.output_message(&message);
        Ok(())
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Split a `key=value` query parameter
fn parse_param(param: &str) -> Result<(&str, &str)> {
    match param.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => Err(Error::config(format!(
            "Invalid parameter '{param}', expected key=value"
        ))),
    }
}
