// Sign-in/sign-up flows and the persisted signed-in user.

use std::path::{Path, PathBuf};

use anyhow::Context;

use super::*;

use crate::api::SignUpForm;

pub const USER_FILE_NAME: &str = "user.json";

const SAVE_FAILED_TOAST: &str = "Unable to process your request.";

fn user_path(data_dir: &str) -> PathBuf {
    Path::new(data_dir).join(USER_FILE_NAME)
}

/// The user saved by the last successful sign-in, if any.
pub fn load_saved_user(data_dir: &str) -> Option<UserRecord> {
    let path = user_path(data_dir);
    let bytes = std::fs::read(&path).ok()?;
    match serde_json::from_slice::<UserRecord>(&bytes) {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::warn!(%e, path = %path.display(), "ignoring malformed saved user");
            None
        }
    }
}

pub fn save_user(data_dir: &str, user: &UserRecord) -> anyhow::Result<()> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("create data dir {data_dir}"))?;
    let path = user_path(data_dir);
    let json = serde_json::to_vec_pretty(user).context("encode user")?;
    std::fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn clear_saved_user(data_dir: &str) -> anyhow::Result<()> {
    let path = user_path(data_dir);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
    }
}

impl AppCore {
    pub(super) fn restore_session(&mut self) {
        if let Some(user) = load_saved_user(&self.data_dir) {
            tracing::info!(user_id = %user.id, "restoring saved session");
            self.start_session(user);
        }
    }

    pub(super) fn start_session(&mut self, user: UserRecord) {
        self.stop_chat();
        self.session_token = self.session_token.wrapping_add(1);
        self.user = Some(user.clone());
        self.initials_mobile = None;

        tracing::info!(user_id = %user.id, "start_session");
        self.state.auth = AuthState::LoggedIn { user };
        self.state.router.default_screen = Screen::Home;
        self.state.router.screen_stack.clear();
        self.state.threads.clear();
        self.state.visible_threads.clear();
        self.state.thread_query.clear();
        self.state.sign_in_initials = None;
        self.emit_state();

        self.refresh_threads();
    }

    pub(super) fn sign_out(&mut self) {
        if let Err(e) = clear_saved_user(&self.data_dir) {
            tracing::warn!(err = %format!("{e:#}"), "failed to clear saved user");
        }
        tracing::info!("sign_out");
        self.reset_to_signed_out();
        self.emit_state();
    }

    pub(super) fn sign_in(&mut self, mobile: String, password: String) {
        if self.is_logged_in() {
            tracing::debug!("already signed in; ignoring sign in");
            return;
        }
        if self.state.busy.signing_in {
            return;
        }
        let mobile = mobile.trim().to_string();
        if mobile.is_empty() || password.is_empty() {
            self.toast("Please enter your mobile number and password.");
            return;
        }
        self.set_busy(|b| b.signing_in = true);

        let session_token = self.session_token;
        let api = self.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.sign_in(&mobile, &password).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::SignInFinished {
                session_token,
                result,
            })));
        });
    }

    pub(super) fn finish_sign_in(
        &mut self,
        session_token: u64,
        result: Result<UserRecord, ApiError>,
    ) {
        // A sign-out since the request went out wins over its result.
        if session_token != self.session_token {
            tracing::debug!(session_token, "dropping sign in result from old session");
            return;
        }
        self.state.busy.signing_in = false;
        match result {
            Ok(user) => {
                let saved = save_user(&self.data_dir, &user);
                self.start_session(user);
                if let Err(e) = saved {
                    // Signed in for this run; it just won't be restored next launch.
                    tracing::error!(err = %format!("{e:#}"), "failed to save user");
                    self.toast(SAVE_FAILED_TOAST);
                }
            }
            Err(e) => {
                tracing::warn!(%e, kind = e.kind(), "sign in failed");
                self.toast_api_error(&e);
            }
        }
    }

    pub(super) fn sign_up(
        &mut self,
        mobile: String,
        first_name: String,
        last_name: String,
        password: String,
        avatar_path: Option<String>,
    ) {
        if self.state.busy.signing_up {
            return;
        }
        let mobile = mobile.trim().to_string();
        let first_name = first_name.trim().to_string();
        let last_name = last_name.trim().to_string();
        if mobile.is_empty() || first_name.is_empty() || last_name.is_empty() || password.is_empty()
        {
            self.toast("Please fill in all fields.");
            return;
        }

        let avatar_jpeg = match avatar_path.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(path) => match std::fs::read(path) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!(%e, path, "failed to read avatar");
                    self.toast("Unable to read the selected image.");
                    return;
                }
            },
            None => None,
        };

        self.set_busy(|b| b.signing_up = true);
        let form = SignUpForm {
            mobile,
            first_name,
            last_name,
            password,
            avatar_jpeg,
        };
        let api = self.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.sign_up(form).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::SignUpFinished {
                result,
            })));
        });
    }

    pub(super) fn finish_sign_up(&mut self, result: Result<String, ApiError>) {
        self.state.busy.signing_up = false;
        match result {
            Ok(message) => {
                tracing::info!("sign up accepted");
                // Back to the sign-in screen; the new account still has to sign in.
                self.state.router.screen_stack.clear();
                self.toast(message);
            }
            Err(e) => {
                tracing::warn!(%e, kind = e.kind(), "sign up failed");
                self.toast_api_error(&e);
            }
        }
    }

    pub(super) fn lookup_initials(&mut self, mobile: String) {
        let mobile = mobile.trim().to_string();
        if mobile.chars().count() != 10 {
            self.initials_mobile = None;
            if self.state.sign_in_initials.take().is_some() {
                self.emit_state();
            }
            return;
        }
        if self.initials_mobile.as_deref() == Some(mobile.as_str()) {
            return;
        }
        self.initials_mobile = Some(mobile.clone());

        let api = self.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.lookup_initials(&mobile).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::InitialsFetched {
                mobile,
                result,
            })));
        });
    }

    pub(super) fn finish_initials_lookup(&mut self, mobile: String, result: Result<String, ApiError>) {
        if self.is_logged_in() || self.initials_mobile.as_deref() != Some(mobile.as_str()) {
            return;
        }
        match result {
            Ok(letters) => {
                let letters = letters.trim().to_string();
                let next = (!letters.is_empty()).then_some(letters);
                if next != self.state.sign_in_initials {
                    self.state.sign_in_initials = next;
                    self.emit_state();
                }
            }
            Err(e) => tracing::debug!(%e, "initials lookup failed"),
        }
    }
}
