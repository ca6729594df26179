// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::clock;
use crate::database::{self, CreateProfileError, NewProfile};
use crate::handlers::AppError;
use crate::state::AppState;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::extract::{FromRequestParts, Json, State};
use axum::http::{header, request::Parts, HeaderMap, StatusCode};
use chrono::Utc;
use chrono_tz::Tz;
use common::{Profile, SignInResponse, SigninPayload, SignupPayload};
use tracing::{debug, info};

/// The authenticated caller, resolved from the `Authorization: Bearer`
/// header. Handlers that take this parameter are auth-gated by
/// construction; the token is kept so signout can revoke it.
pub struct CurrentUser {
    pub profile: Profile,
    pub token: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, "Missing session token."))?
            .to_string();

        let profile = database::get_session_profile(&state.pool, &token)
            .await?
            .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, "Invalid session token."))?;

        Ok(CurrentUser { profile, token })
    }
}

fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow::anyhow!("Failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Handler for creating an account.
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupPayload>,
) -> Result<(StatusCode, Json<Profile>), AppError> {
    debug!("Received signup request for {}", payload.email);

    if payload.username.trim().is_empty()
        || payload.email.trim().is_empty()
        || payload.password.is_empty()
    {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "Username, email and password cannot be empty.",
        ));
    }

    let timezone = payload.timezone.unwrap_or_else(|| "UTC".to_string());
    if timezone.parse::<Tz>().is_err() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "Timezone must be a valid IANA name like Europe/Paris.",
        ));
    }

    let password_hash = hash_password(&payload.password)?;

    let profile = database::create_profile(
        &state.pool,
        NewProfile {
            username: payload.username,
            email: payload.email,
            password_hash,
            mobile: payload.mobile,
            timezone,
        },
    )
    .await
    .map_err(|err| match err {
        CreateProfileError::EmailTaken => AppError::new(
            StatusCode::CONFLICT,
            "An account with this email already exists.",
        ),
        CreateProfileError::Database(db_err) => {
            AppError::from(anyhow::Error::new(db_err).context("Failed to create profile"))
        }
    })?;

    info!("Profile created successfully with ID: {}", profile.id);

    Ok((StatusCode::CREATED, Json(profile)))
}

/// Handler for signing in. Verifies the credentials, opens a session,
/// and runs the session-start streak-break check so the profile in the
/// response already reflects any reset.
pub async fn signin(
    State(state): State<AppState>,
    Json(payload): Json<SigninPayload>,
) -> Result<Json<SignInResponse>, AppError> {
    let profile = database::get_profile_by_email(&state.pool, &payload.email).await?;

    // One message for both failure modes; the response must not reveal
    // whether the email exists.
    let Some(mut profile) = profile else {
        return Err(AppError::new(
            StatusCode::UNAUTHORIZED,
            "Invalid email or password.",
        ));
    };
    if !verify_password(&payload.password, &profile.password_hash) {
        return Err(AppError::new(
            StatusCode::UNAUTHORIZED,
            "Invalid email or password.",
        ));
    }

    let token = database::create_session(&state.pool, profile.id).await?;

    let tz = clock::timezone_or_utc(&profile.timezone);
    let today = clock::calendar_date(Utc::now(), tz);
    profile.current_streak =
        database::check_and_reset_streak(&state.pool, profile.id, today).await?;

    info!("Profile {} signed in.", profile.id);

    Ok(Json(SignInResponse { token, profile }))
}

/// Handler for revoking the caller's session.
pub async fn signout(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<StatusCode, AppError> {
    database::delete_session(&state.pool, &user.token).await?;
    info!("Profile {} signed out.", user.profile.id);
    Ok(StatusCode::NO_CONTENT)
}

/// Handler returning the caller's profile. Clients hit this whenever
/// they boot with a stored session, so it re-runs the same break check
/// as signin.
pub async fn me(State(state): State<AppState>, user: CurrentUser) -> Result<Json<Profile>, AppError> {
    let mut profile = user.profile;

    let tz = clock::timezone_or_utc(&profile.timezone);
    let today = clock::calendar_date(Utc::now(), tz);
    profile.current_streak =
        database::check_and_reset_streak(&state.pool, profile.id, today).await?;

    Ok(Json(profile))
}
