//! Optional sign-in before any export work.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{BrowserPage, WaitUntil};
use crate::scripting::at_stage;
use crate::target::{is_signin_location, signin_url};
use crate::wait::poll_until;
use crate::{Result, Stage};

/// Username field selectors, tried in order.
pub const USERNAME_SELECTORS: &[&str] = &[
    "#username",
    "input[name=\"username\"]",
    "#email",
    "#emailAddress",
    "input[type=\"email\"]",
    "input[name=\"email\"]",
];

pub const PASSWORD_SELECTORS: &[&str] = &[
    "#password",
    "input[name=\"password\"]",
    "input[type=\"password\"]",
];

/// Submit controls, tried in order. Without one, Enter is pressed in the
/// password field.
pub const SUBMIT_SELECTORS: &[&str] = &[
    "button[type=\"submit\"]",
    "button:has-text(\"Sign in\")",
    "input[type=\"submit\"]",
    "button:has-text(\"Se connecter\")",
];

/// Element only present once the user is signed in.
pub const DASHBOARD_SELECTOR: &str = "div#dashboard";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Credentials are only usable when both halves are present.
    pub fn from_parts(username: Option<String>, password: Option<String>) -> Option<Self> {
        match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some(Self::new(u, p)),
            _ => None,
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AuthOutcome {
    /// No credentials were supplied.
    Skipped,
    /// The sign-in form could not be found; `location` is where the page was.
    FieldsNotFound { location: String },
    SignedIn,
    /// The form was submitted but the page never left the sign-in screen.
    Unconfirmed,
}

/// Signs in when credentials are present.
///
/// Only a failure to load the sign-in page is fatal. A missing form or an
/// unconfirmed sign-in is logged and the job carries on; the viewer will
/// simply fail discovery if the session really is anonymous.
pub async fn authenticate<P>(
    page: &P,
    target: &Url,
    credentials: Option<&Credentials>,
    navigation_timeout: Duration,
    login_timeout: Duration,
    interval: Duration,
) -> Result<AuthOutcome>
where
    P: BrowserPage + ?Sized,
{
    let Some(credentials) = credentials else {
        return Ok(AuthOutcome::Skipped);
    };

    let signin = signin_url(target)?;
    info!(" - Signing in via {signin}");
    page.goto(signin.as_str(), WaitUntil::NetworkIdle, navigation_timeout)
        .await
        .map_err(|err| at_stage(err, Stage::SignIn))?;

    let username_field = first_present(page, USERNAME_SELECTORS).await?;
    let password_field = first_present(page, PASSWORD_SELECTORS).await?;
    let (Some(username_field), Some(password_field)) = (username_field, password_field) else {
        let location = page
            .current_url()
            .await
            .map_err(|err| at_stage(err, Stage::SignIn))?;
        warn!("Sign-in form not found at {location}; continuing without signing in");
        return Ok(AuthOutcome::FieldsNotFound { location });
    };

    page.fill(username_field, &credentials.username)
        .await
        .map_err(|err| at_stage(err, Stage::SignIn))?;
    page.fill(password_field, credentials.password())
        .await
        .map_err(|err| at_stage(err, Stage::SignIn))?;

    let submitted = match first_present(page, SUBMIT_SELECTORS).await? {
        Some(submit) => page.click(submit).await,
        None => page.press(password_field, "Enter").await,
    };
    submitted.map_err(|err| at_stage(err, Stage::SignIn))?;

    // Submitting usually navigates; checks that race the redirect just retry.
    let confirmed = poll_until(interval, login_timeout, || async move {
        match signin_confirmed(page).await {
            Ok(true) => Ok(Some(())),
            Ok(false) => Ok(None),
            Err(err) => {
                debug!("sign-in check failed, retrying: {err}");
                Ok(None)
            }
        }
    })
    .await?;

    if confirmed.is_some() {
        info!(" - Signed in as {}", credentials.username);
        Ok(AuthOutcome::SignedIn)
    } else {
        warn!(
            "Sign-in not confirmed after {:?}; continuing anyway",
            login_timeout
        );
        Ok(AuthOutcome::Unconfirmed)
    }
}

async fn signin_confirmed<P>(page: &P) -> Result<bool>
where
    P: BrowserPage + ?Sized,
{
    let location = page.current_url().await?;
    Ok(!is_signin_location(&location) || page.has_selector(DASHBOARD_SELECTOR).await?)
}

async fn first_present<P>(page: &P, selectors: &[&'static str]) -> Result<Option<&'static str>>
where
    P: BrowserPage + ?Sized,
{
    for &selector in selectors {
        if page
            .has_selector(selector)
            .await
            .map_err(|err| at_stage(err, Stage::SignIn))?
        {
            return Ok(Some(selector));
        }
    }
    Ok(None)
}
