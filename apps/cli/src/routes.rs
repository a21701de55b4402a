//! Entry routing: whether the user lands on the sign-in gate or at home.

use crate::config::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SignIn,
    Home,
}

pub fn initial_route(settings: &Settings, has_credential: bool) -> Route {
    if has_credential || settings.bypass_auth {
        Route::Home
    } else {
        Route::SignIn
    }
}

pub const SIGN_IN_HELP: &str = "Not signed in. Sign in with your identity provider and pass the \
session token with --token or the QUIZ_BEARER_TOKEN environment variable.";
