//! Per-user interaction state.

use medhist_common::{MedHistError, PatientId, Result, Turn};
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::Authenticator;
use crate::orchestrator::QueryReply;
use crate::profile::PatientProfile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthState {
    Unauthenticated,
    Authenticated { username: String },
}

/// Outcome of asking to see the selected patient's profile.
#[derive(Debug)]
pub enum ProfileView {
    /// Generated earlier in this session.
    Cached(PatientProfile),
    /// Summarized by the model from the patient's stored memories.
    Summarized(QueryReply),
    NotFound(String),
}

/// One user's login state, selected patient, cached profile and transcript.
///
/// Login is the only operation available before authentication; everything
/// else fails with [`MedHistError::Unauthenticated`].
#[derive(Debug)]
pub struct Session {
    auth: AuthState,
    patient: Option<PatientId>,
    profile: Option<PatientProfile>,
    transcript: Vec<Turn>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            auth: AuthState::Unauthenticated,
            patient: None,
            profile: None,
            transcript: Vec::new(),
        }
    }

    /// Authenticate this session. Once authenticated, further calls succeed
    /// without consulting the authenticator.
    pub fn login(
        &mut self,
        authenticator: &dyn Authenticator,
        username: &str,
        password: &str,
    ) -> Result<()> {
        if self.is_authenticated() {
            return Ok(());
        }
        if !authenticator.authenticate(username, password) {
            warn!(username, "Login rejected");
            return Err(MedHistError::InvalidCredentials);
        }
        info!(username, "Login successful");
        self.auth = AuthState::Authenticated {
            username: username.to_string(),
        };
        Ok(())
    }

    pub fn auth_state(&self) -> &AuthState {
        &self.auth
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.auth, AuthState::Authenticated { .. })
    }

    pub fn ensure_authenticated(&self) -> Result<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(MedHistError::Unauthenticated)
        }
    }

    /// Validate and select a patient. Empty input clears the selection.
    ///
    /// Selecting a different patient drops the cached profile.
    pub fn select_patient(&mut self, raw: &str) -> Result<Option<&PatientId>> {
        self.ensure_authenticated()?;
        let selected = PatientId::parse(raw)?;

        if selected != self.patient {
            self.profile = None;
        }
        self.patient = selected;
        Ok(self.patient.as_ref())
    }

    pub fn patient(&self) -> Result<Option<&PatientId>> {
        self.ensure_authenticated()?;
        Ok(self.patient.as_ref())
    }

    /// The selected patient, or [`MedHistError::NoPatientSelected`].
    pub fn require_patient(&self) -> Result<&PatientId> {
        self.ensure_authenticated()?;
        self.patient.as_ref().ok_or(MedHistError::NoPatientSelected)
    }

    pub fn profile(&self) -> Result<Option<&PatientProfile>> {
        self.ensure_authenticated()?;
        Ok(self.profile.as_ref())
    }

    pub fn transcript(&self) -> Result<&[Turn]> {
        self.ensure_authenticated()?;
        Ok(&self.transcript)
    }

    pub(crate) fn cache_profile(&mut self, profile: PatientProfile) {
        self.profile = Some(profile);
    }

    pub(crate) fn push_turn(&mut self, turn: Turn) {
        self.transcript.push(turn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticCredentials;
    use medhist_common::PatientIdError;

    fn logged_in() -> Session {
        let mut session = Session::new();
        session
            .login(&StaticCredentials::default(), "admin", "admin")
            .unwrap();
        session
    }

    #[test]
    fn starts_unauthenticated() {
        let session = Session::new();
        assert_eq!(session.auth_state(), &AuthState::Unauthenticated);
        assert!(matches!(session.patient(), Err(MedHistError::Unauthenticated)));
        assert!(matches!(session.transcript(), Err(MedHistError::Unauthenticated)));
        assert!(matches!(session.profile(), Err(MedHistError::Unauthenticated)));
    }

    #[test]
    fn select_patient_requires_login() {
        let mut session = Session::new();
        let err = session.select_patient("PAT-12345").unwrap_err();
        assert!(matches!(err, MedHistError::Unauthenticated));
    }

    #[test]
    fn bad_credentials_keep_session_locked() {
        let mut session = Session::new();
        let err = session
            .login(&StaticCredentials::default(), "admin", "nope")
            .unwrap_err();
        assert!(matches!(err, MedHistError::InvalidCredentials));
        assert_eq!(
            err.to_string(),
            "Invalid username or password. Please try again."
        );
        assert!(!session.is_authenticated());
    }

    #[test]
    fn login_is_terminal() {
        let mut session = logged_in();
        // A second attempt with bad credentials neither fails nor logs out.
        session
            .login(&StaticCredentials::default(), "x", "y")
            .unwrap();
        assert_eq!(
            session.auth_state(),
            &AuthState::Authenticated {
                username: "admin".into()
            }
        );
    }

    #[test]
    fn select_patient_normalizes() {
        let mut session = logged_in();
        let selected = session.select_patient("  pat-ab123 ").unwrap().cloned();
        assert_eq!(selected.unwrap().as_str(), "PAT-AB123");
        assert_eq!(session.require_patient().unwrap().as_str(), "PAT-AB123");
    }

    #[test]
    fn invalid_patient_is_rejected_and_selection_kept() {
        let mut session = logged_in();
        session.select_patient("PAT-12345").unwrap();

        let err = session.select_patient("12345").unwrap_err();
        assert!(matches!(
            err,
            MedHistError::Validation(PatientIdError::InvalidFormat)
        ));
        assert_eq!(session.require_patient().unwrap().as_str(), "PAT-12345");
    }

    #[test]
    fn empty_input_clears_selection() {
        let mut session = logged_in();
        session.select_patient("PAT-12345").unwrap();
        assert!(session.select_patient("").unwrap().is_none());
        assert!(matches!(
            session.require_patient(),
            Err(MedHistError::NoPatientSelected)
        ));
    }

    #[test]
    fn changing_patient_drops_cached_profile() {
        use crate::profile::VisitSchedule;
        use chrono::NaiveDate;

        let mut session = logged_in();
        let patient = session.select_patient("PAT-12345").unwrap().cloned().unwrap();
        session.cache_profile(PatientProfile {
            patient_id: patient,
            schedule: VisitSchedule::around(NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()),
            content: "profile".into(),
        });

        // Same patient in another spelling keeps the cache.
        session.select_patient("pat-12345").unwrap();
        assert!(session.profile().unwrap().is_some());

        session.select_patient("PAT-99999").unwrap();
        assert!(session.profile().unwrap().is_none());
    }
}
