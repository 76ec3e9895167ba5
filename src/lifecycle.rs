//! Per-lead action flows: rescore, message generation and interaction logging.
//!
//! Each flow calls the backend through [`LeadApiClient`] and, on success, applies
//! one targeted patch to the [`LeadStore`](crate::store::LeadStore). Flows track
//! their own state per lead id, so actions on different leads never block each
//! other. A second submission of the same action for the same lead is refused
//! while the first one is in flight.

use crate::config::FailurePolicy;
use crate::errors::{AppError, ResultExt};
use crate::gateway_client::LeadApiClient;
use crate::models::{
    Direction, InteractionDraft, InteractionRequest, LeadId, MessageEvaluation, Stage, Weights,
};
use crate::notifications::{Notification, Notifier};
use crate::store::SharedLeadStore;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

// ============ Action state ============

/// The three per-lead actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadAction {
    Rescore,
    Message,
    Interaction,
}

/// Where a lead's action currently stands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ActionState {
    #[default]
    Idle,
    Submitting,
    /// Only recorded under [`FailurePolicy::Surface`].
    Failed { reason: String },
}

/// State machine for one action type, addressed by lead id.
#[derive(Debug)]
pub struct ActionTracker {
    action: LeadAction,
    states: Mutex<HashMap<LeadId, ActionState>>,
}

impl ActionTracker {
    pub fn new(action: LeadAction) -> Self {
        Self {
            action,
            states: Mutex::new(HashMap::new()),
        }
    }

    fn states(&self) -> MutexGuard<'_, HashMap<LeadId, ActionState>> {
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self, id: LeadId) -> ActionState {
        self.states().get(&id).cloned().unwrap_or_default()
    }

    pub fn is_busy(&self, id: LeadId) -> bool {
        matches!(self.states().get(&id), Some(ActionState::Submitting))
    }

    /// Read-only copy of every non-idle state.
    pub fn snapshot(&self) -> HashMap<LeadId, ActionState> {
        self.states().clone()
    }

    /// Moves `id` to `Submitting`. Returns `None` if it is already in flight.
    pub fn begin(&self, id: LeadId) -> Option<InFlight<'_>> {
        let mut states = self.states();
        if matches!(states.get(&id), Some(ActionState::Submitting)) {
            return None;
        }
        states.insert(id, ActionState::Submitting);
        tracing::debug!("{:?} for lead {} is in flight", self.action, id);
        Some(InFlight {
            tracker: self,
            id,
            settled: false,
        })
    }

    fn settle(&self, id: LeadId, next: ActionState) {
        let mut states = self.states();
        match next {
            ActionState::Idle => {
                states.remove(&id);
            }
            other => {
                states.insert(id, other);
            }
        }
    }
}

/// Busy marker for one in-flight action. Dropping it without settling returns
/// the lead to `Idle`, so an abandoned call never leaves the flag stuck.
pub struct InFlight<'a> {
    tracker: &'a ActionTracker,
    id: LeadId,
    settled: bool,
}

impl InFlight<'_> {
    fn succeed(mut self) {
        self.settled = true;
        self.tracker.settle(self.id, ActionState::Idle);
    }

    fn fail(mut self, policy: FailurePolicy, reason: String) {
        self.settled = true;
        let next = match policy {
            FailurePolicy::LogAndRetainPriorState => ActionState::Idle,
            FailurePolicy::Surface => ActionState::Failed { reason },
        };
        self.tracker.settle(self.id, next);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.tracker.settle(self.id, ActionState::Idle);
        }
    }
}

// ============ Outcomes ============

/// Result of submitting a per-lead action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    ScoreUpdated {
        lead_id: LeadId,
        score: f64,
    },
    MessageUpdated {
        lead_id: LeadId,
        message: String,
        evaluation: Option<MessageEvaluation>,
    },
    StageUpdated {
        lead_id: LeadId,
        stage: Stage,
        notification: Notification,
    },
    /// The backend accepted the call but returned nothing to apply.
    Acknowledged { lead_id: LeadId },
    /// Refused client-side; no request was sent.
    Suppressed { lead_id: LeadId, reason: String },
    /// The same action is already in flight for this lead.
    Busy { lead_id: LeadId },
    /// The backend call failed; local state was left as it was.
    Failed { lead_id: LeadId, error: String },
}

/// Which pending-input surface is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorKind {
    Rescore,
    Interaction,
}

// ============ Controller ============

pub struct LifecycleController {
    client: LeadApiClient,
    store: SharedLeadStore,
    notifier: Notifier,
    policy: FailurePolicy,
    rescore: ActionTracker,
    message: ActionTracker,
    interaction: ActionTracker,
    weight_drafts: Mutex<HashMap<LeadId, Weights>>,
    interaction_drafts: Mutex<HashMap<LeadId, InteractionDraft>>,
    open_editors: Mutex<HashMap<EditorKind, LeadId>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl LifecycleController {
    pub fn new(
        client: LeadApiClient,
        store: SharedLeadStore,
        notifier: Notifier,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            client,
            store,
            notifier,
            policy,
            rescore: ActionTracker::new(LeadAction::Rescore),
            message: ActionTracker::new(LeadAction::Message),
            interaction: ActionTracker::new(LeadAction::Interaction),
            weight_drafts: Mutex::new(HashMap::new()),
            interaction_drafts: Mutex::new(HashMap::new()),
            open_editors: Mutex::new(HashMap::new()),
        }
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn tracker(&self, action: LeadAction) -> &ActionTracker {
        match action {
            LeadAction::Rescore => &self.rescore,
            LeadAction::Message => &self.message,
            LeadAction::Interaction => &self.interaction,
        }
    }

    pub fn is_busy(&self, action: LeadAction, id: LeadId) -> bool {
        self.tracker(action).is_busy(id)
    }

    // ---- editors and drafts ----

    pub fn open_editor(&self, kind: EditorKind, id: LeadId) {
        lock(&self.open_editors).insert(kind, id);
    }

    /// Closes the editor of `kind` if it is open for `id`.
    pub fn dismiss_editor(&self, kind: EditorKind, id: LeadId) {
        let mut editors = lock(&self.open_editors);
        if editors.get(&kind) == Some(&id) {
            editors.remove(&kind);
        }
    }

    pub fn open_editors(&self) -> HashMap<EditorKind, LeadId> {
        lock(&self.open_editors).clone()
    }

    pub fn update_weights(&self, id: LeadId, weights: Weights) {
        lock(&self.weight_drafts).insert(id, weights);
    }

    pub fn pending_weights(&self, id: LeadId) -> Weights {
        lock(&self.weight_drafts).get(&id).copied().unwrap_or_default()
    }

    pub fn update_interaction(&self, id: LeadId, draft: InteractionDraft) {
        lock(&self.interaction_drafts).insert(id, draft);
    }

    pub fn pending_interaction(&self, id: LeadId) -> InteractionDraft {
        lock(&self.interaction_drafts)
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    // ---- flows ----

    /// Rescores a lead with its pending weights.
    ///
    /// Requires at least one pending weight. The rescore editor is dismissed as
    /// soon as the request is about to be sent.
    pub async fn submit_rescore(&self, id: LeadId) -> Result<ActionOutcome, AppError> {
        let weights = self.pending_weights(id);
        if !weights.has_any() {
            tracing::warn!("No weights provided for rescoring lead {}", id);
            return Ok(ActionOutcome::Suppressed {
                lead_id: id,
                reason: "no weights provided".to_string(),
            });
        }

        self.dismiss_editor(EditorKind::Rescore, id);

        let Some(in_flight) = self.rescore.begin(id) else {
            tracing::warn!("Rescore already in flight for lead {}", id);
            return Ok(ActionOutcome::Busy { lead_id: id });
        };

        match self
            .client
            .rescore_lead(id, weights)
            .await
            .with_context(|| format!("Rescoring lead {}", id))
        {
            Ok(response) => {
                lock(&self.weight_drafts).remove(&id);
                let outcome = match response.score {
                    Some(score) => {
                        self.store.write().await.patch_score(id, score);
                        tracing::info!("✓ Lead {} rescored: {}", id, score);
                        ActionOutcome::ScoreUpdated { lead_id: id, score }
                    }
                    None => {
                        tracing::warn!("Rescore response for lead {} carried no score", id);
                        ActionOutcome::Acknowledged { lead_id: id }
                    }
                };
                in_flight.succeed();
                Ok(outcome)
            }
            Err(e) => self.handle_failure(in_flight, id, e),
        }
    }

    /// Generates a fresh outreach message and stores it as the lead's last message.
    pub async fn generate_message(&self, id: LeadId) -> Result<ActionOutcome, AppError> {
        let Some(in_flight) = self.message.begin(id) else {
            tracing::warn!("Message generation already in flight for lead {}", id);
            return Ok(ActionOutcome::Busy { lead_id: id });
        };

        match self
            .client
            .generate_message(id)
            .await
            .with_context(|| format!("Generating message for lead {}", id))
        {
            Ok(response) => {
                let outcome = match response.message.filter(|m| !m.is_empty()) {
                    Some(message) => {
                        self.store.write().await.patch_message(id, message.clone());
                        tracing::info!("✓ Message generated for lead {}", id);
                        ActionOutcome::MessageUpdated {
                            lead_id: id,
                            message,
                            evaluation: response.evaluation,
                        }
                    }
                    None => {
                        tracing::warn!("Message response for lead {} was empty", id);
                        ActionOutcome::Acknowledged { lead_id: id }
                    }
                };
                in_flight.succeed();
                Ok(outcome)
            }
            Err(e) => self.handle_failure(in_flight, id, e),
        }
    }

    /// Records the pending interaction and moves the lead to the stage implied by
    /// its direction.
    ///
    /// Requires a non-empty message and a direction; otherwise nothing is sent
    /// and the editor stays open.
    pub async fn submit_interaction(&self, id: LeadId) -> Result<ActionOutcome, AppError> {
        let draft = self.pending_interaction(id);
        let Some((message, direction)) = draft.ready() else {
            tracing::warn!("Missing interaction data for lead {}", id);
            return Ok(ActionOutcome::Suppressed {
                lead_id: id,
                reason: "message and direction are required".to_string(),
            });
        };

        self.dismiss_editor(EditorKind::Interaction, id);

        let Some(in_flight) = self.interaction.begin(id) else {
            tracing::warn!("Interaction already in flight for lead {}", id);
            return Ok(ActionOutcome::Busy { lead_id: id });
        };

        let request = interaction_request(message, direction);
        match self
            .client
            .add_interaction(id, &request)
            .await
            .with_context(|| format!("Adding interaction for lead {}", id))
        {
            Ok(()) => {
                lock(&self.interaction_drafts).remove(&id);

                let stage = direction.resulting_stage();
                self.store.write().await.patch_stage(id, stage.clone());
                let notification = self
                    .notifier
                    .push(format!(
                        "Interaction added! Lead stage updated to {}",
                        stage.label()
                    ))
                    .await;
                tracing::info!("✓ Interaction added for lead {}, stage now {}", id, stage);

                in_flight.succeed();
                Ok(ActionOutcome::StageUpdated {
                    lead_id: id,
                    stage,
                    notification,
                })
            }
            Err(e) => self.handle_failure(in_flight, id, e),
        }
    }

    fn handle_failure(
        &self,
        in_flight: InFlight<'_>,
        id: LeadId,
        error: AppError,
    ) -> Result<ActionOutcome, AppError> {
        tracing::error!("{}", error);
        in_flight.fail(self.policy, error.to_string());

        match self.policy {
            FailurePolicy::LogAndRetainPriorState => Ok(ActionOutcome::Failed {
                lead_id: id,
                error: error.to_string(),
            }),
            FailurePolicy::Surface => Err(error),
        }
    }
}

/// Builds the interaction body, stamped with the current time.
pub fn interaction_request(message: &str, direction: Direction) -> InteractionRequest {
    InteractionRequest {
        message: message.to_string(),
        direction,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}
