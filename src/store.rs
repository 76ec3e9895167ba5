//! In-memory lead collection.
//!
//! The store hands out `Arc` snapshots. Every mutation builds a new collection
//! and swaps it in, so a snapshot taken before a patch never observes it.

use crate::models::{Lead, LeadId, Stage};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Store shared between the session, the lifecycle controller and the view.
pub type SharedLeadStore = Arc<RwLock<LeadStore>>;

#[derive(Debug, Clone, Default)]
pub struct LeadStore {
    leads: Arc<Vec<Lead>>,
}

impl LeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedLeadStore {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Current collection, in the order of the last full fetch.
    pub fn snapshot(&self) -> Arc<Vec<Lead>> {
        Arc::clone(&self.leads)
    }

    pub fn get(&self, id: LeadId) -> Option<&Lead> {
        self.leads.iter().find(|lead| lead.id == id)
    }

    pub fn len(&self) -> usize {
        self.leads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leads.is_empty()
    }

    /// Replaces the whole collection with a fresh fetch result.
    pub fn replace_all(&mut self, records: Vec<Lead>) {
        tracing::debug!("Replacing lead collection: {} record(s)", records.len());
        self.leads = Arc::new(records);
    }

    /// Sets `score` on the lead with `id`. Returns `false` when no lead matched.
    pub fn patch_score(&mut self, id: LeadId, score: f64) -> bool {
        self.patch(id, |lead| lead.score = Some(score))
    }

    /// Overwrites `last_message` on the lead with `id`.
    pub fn patch_message(&mut self, id: LeadId, message: impl Into<String>) -> bool {
        let message = message.into();
        self.patch(id, move |lead| lead.last_message = Some(message))
    }

    /// Sets `stage` on the lead with `id`.
    pub fn patch_stage(&mut self, id: LeadId, stage: Stage) -> bool {
        self.patch(id, move |lead| lead.stage = Some(stage))
    }

    fn patch<F>(&mut self, id: LeadId, apply: F) -> bool
    where
        F: FnOnce(&mut Lead),
    {
        let Some(index) = self.leads.iter().position(|lead| lead.id == id) else {
            tracing::debug!("Patch skipped: lead {} is not in the collection", id);
            return false;
        };

        let mut next: Vec<Lead> = self.leads.as_ref().clone();
        apply(&mut next[index]);
        self.leads = Arc::new(next);
        true
    }
}
