//! Account endpoints: registration, login, the current user, and role
//! assignment by staff.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::account::{self, Account};
use crate::auth::{self, MIN_PASSWORD_LENGTH};
use crate::permission::{Denial, Role};
use crate::response::{self, HttpResponse};
use crate::router::{Context, Router};
use crate::{Error, Module, Result, roles};

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    username: String,
    password: String,
    #[serde(default)]
    email: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse<'a> {
    token: String,
    user: &'a Account,
}

#[derive(Debug, Serialize)]
struct Me<'a> {
    #[serde(flatten)]
    account: &'a Account,
    roles: BTreeSet<Role>,
}

#[derive(Debug, Deserialize)]
struct AssignRoles {
    roles: Vec<Role>,
}

async fn register(ctx: Context) -> Result<HttpResponse> {
    let req: RegisterRequest = ctx.json()?;
    let username = req.username.trim();
    if username.is_empty() {
        return Err(Error::BadRequest("username must not be blank".into()));
    }
    if req.password.len() < MIN_PASSWORD_LENGTH {
        return Err(Error::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    let hash = auth::hash_password_async(req.password).await?;

    let db = ctx.require_db()?;
    let conn = db.lock().await;
    let account = account::create(&conn, username, req.email.trim(), &hash, false).await?;
    drop(conn);

    let token = auth::create_token(&ctx.config.auth, &account.id.to_string())?;
    response::created(&TokenResponse {
        token,
        user: &account,
    })
}

async fn login(ctx: Context) -> Result<HttpResponse> {
    let req: LoginRequest = ctx.json()?;

    let db = ctx.require_db()?;
    let found = {
        let conn = db.lock().await;
        account::find_by_username(&conn, &req.username).await?
    };
    let Some(account) = found else {
        tracing::debug!(username = %req.username, "login for unknown user");
        return Err(Error::InvalidCredentials);
    };

    let candidate = account.clone();
    let valid = tokio::task::spawn_blocking(move || auth::verify_password(&candidate, &req.password))
        .await
        .map_err(|e| Error::Internal(format!("Verification task failed: {e}")))?;
    if !valid {
        tracing::warn!(user = %account.id, "failed login");
        return Err(Error::InvalidCredentials);
    }

    let token = auth::create_token(&ctx.config.auth, &account.id.to_string())?;
    response::ok(&TokenResponse {
        token,
        user: &account,
    })
}

async fn me(ctx: Context) -> Result<HttpResponse> {
    let principal = ctx.authenticate().await?.ok_or(Denial::Unauthenticated)?;

    let db = ctx.require_db()?;
    let conn = db.lock().await;
    let account = account::find(&conn, principal.id)
        .await?
        .ok_or(Denial::Unauthenticated)?;
    response::ok(&Me {
        account: &account,
        roles: principal.roles,
    })
}

/// `PUT /api/users/{id}/roles`: replace a user's role groups. Staff only.
async fn assign_roles(ctx: Context) -> Result<HttpResponse> {
    let principal = ctx.authenticate().await?.ok_or(Denial::Unauthenticated)?;
    if !principal.is_staff {
        tracing::warn!(user = %principal.id, "non-staff role assignment attempt");
        return Err(Error::Forbidden {
            resource: "roles".into(),
            action: "assign".into(),
        });
    }
    let user_id = ctx.require_id()?;
    let req: AssignRoles = ctx.json()?;

    let db = ctx.require_db()?;
    let conn = db.lock().await;
    let account = account::find(&conn, user_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("user {user_id}")))?;
    roles::seed(&conn).await?;
    roles::assign(&conn, account.id, &req.roles).await?;
    let current = roles::of_user(&conn, account.id).await?;

    tracing::info!(by = %principal.id, user = %account.id, roles = ?current, "assigned roles");
    response::ok(&Me {
        account: &account,
        roles: current,
    })
}

pub struct AccountsModule;

impl Module for AccountsModule {
    fn name(&self) -> &'static str {
        "accounts"
    }

    fn routes(&self, router: &mut Router) {
        router.post("/api/auth/register", register);
        router.post("/api/auth/token", login);
        router.get("/api/auth/me", me);
        router.put("/api/users/{id}/roles", assign_roles);
    }
}
