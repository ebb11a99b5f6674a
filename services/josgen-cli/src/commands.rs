//! Sub-commands and their execution

use anyhow::{Context, Result};
use clap::Subcommand;
use common::Secret;
use josgen_gateway::{
    ApiRequest, AuthGateway, Credentials, PasswordChange, PasswordReset, ProfileUpdate,
    Registration,
};
use serde_json::{Value, json};

use crate::config::Config;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in and store the session tokens
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "JOSGEN_PASSWORD", hide_env_values = true)]
        password: String,
        /// Ask the backend for a long-lived session
        #[arg(long)]
        remember: bool,
    },
    /// Create an account and store the session tokens
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "JOSGEN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Show the signed-in user and their permissions
    Me,
    /// End the session; local tokens are removed even if the backend call fails
    Logout,
    ChangePassword {
        #[arg(long, env = "JOSGEN_PASSWORD", hide_env_values = true)]
        current: String,
        #[arg(long = "new", env = "JOSGEN_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    ResetPassword {
        #[arg(long)]
        token: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "JOSGEN_NEW_PASSWORD", hide_env_values = true)]
        password: String,
    },
    UpdateProfile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// GET an API path, e.g. `get /divisions --query page=2`
    Get {
        path: String,
        #[arg(long = "query", value_parser = parse_pair)]
        query: Vec<(String, String)>,
    },
    /// POST a JSON body to an API path
    Post {
        path: String,
        #[arg(long, default_value = "{}")]
        data: String,
    },
    /// PUT a JSON body to an API path
    Put {
        path: String,
        #[arg(long, default_value = "{}")]
        data: String,
    },
    Delete { path: String },
    /// Show whether a session is stored locally
    Status,
}

/// Parse `key=value` query arguments.
pub fn parse_pair(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got `{raw}`")),
    }
}

fn parse_body(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("--data is not valid JSON: {raw}"))
}

/// Run a command and return what should be printed.
pub async fn run(command: Command, gateway: &AuthGateway, config: &Config) -> Result<Value> {
    let output = match command {
        Command::Login {
            email,
            password,
            remember,
        } => {
            let password = Secret::new(password);
            let session = gateway
                .login(&Credentials {
                    email: &email,
                    password: password.expose(),
                    remember,
                })
                .await?;
            json!({
                "user": session.user,
                "avatar_url": session.user.avatar_url(&config.storage.base_url),
                "token_type": session.tokens.token_type,
                "expires_in": session.tokens.expires_in,
            })
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            let password = Secret::new(password);
            let session = gateway
                .register(&Registration {
                    name: &name,
                    email: &email,
                    password: password.expose(),
                    password_confirmation: password.expose(),
                })
                .await?;
            json!({ "user": session.user })
        }
        Command::Me => {
            let me = gateway.me().await?;
            json!({
                "user": me.user,
                "avatar_url": me.user.avatar_url(&config.storage.base_url),
                "permissions": me.permissions,
            })
        }
        Command::Logout => {
            // Local session is already gone; the backend error is informational
            let result = gateway.logout().await;
            json!({
                "logged_out": true,
                "backend_error": result.err().map(|e| e.to_string()),
            })
        }
        Command::ChangePassword {
            current,
            new_password,
        } => {
            let current = Secret::new(current);
            let new_password = Secret::new(new_password);
            let message = gateway
                .change_password(&PasswordChange {
                    current_password: current.expose(),
                    password: new_password.expose(),
                    password_confirmation: new_password.expose(),
                })
                .await?;
            json!({ "message": message })
        }
        Command::ForgotPassword { email } => {
            json!({ "message": gateway.forgot_password(&email).await? })
        }
        Command::ResetPassword {
            token,
            email,
            password,
        } => {
            let password = Secret::new(password);
            let message = gateway
                .reset_password(&PasswordReset {
                    token: &token,
                    email: &email,
                    password: password.expose(),
                    password_confirmation: password.expose(),
                })
                .await?;
            json!({ "message": message })
        }
        Command::UpdateProfile { name, email, phone } => {
            let message = gateway
                .update_profile(&ProfileUpdate { name, email, phone })
                .await?;
            json!({ "message": message })
        }
        Command::Get { path, query } => {
            let request = query
                .into_iter()
                .fold(ApiRequest::get(path), |req, (k, v)| req.query(k, v));
            gateway.send(request).await?
        }
        Command::Post { path, data } => {
            let request = ApiRequest::post(path).json(&parse_body(&data)?)?;
            gateway.send(request).await?
        }
        Command::Put { path, data } => {
            let request = ApiRequest::put(path).json(&parse_body(&data)?)?;
            gateway.send(request).await?
        }
        Command::Delete { path } => gateway.send(ApiRequest::delete(path)).await?,
        Command::Status => json!({
            "authenticated": gateway.is_authenticated(),
            "api": config.api.base_url,
            "token_file": config.token_file().display().to_string(),
        }),
    };
    Ok(output)
}
