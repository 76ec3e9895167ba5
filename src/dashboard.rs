//! Read-only derivations over a lead snapshot: aggregate stats, lead cards and the
//! generated-messages feed. Everything here is recomputed on demand.

use crate::lifecycle::{ActionState, EditorKind, LeadAction, LifecycleController};
use crate::models::{Lead, LeadId, Stage};
use crate::notifications::Notification;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// Aggregates over the whole collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_leads: usize,
    pub potential_leads: usize,
    pub reached_out_leads: usize,
    pub response_received_leads: usize,
    /// Leads in a stage this client does not know, keyed by raw stage name.
    pub other_stages: BTreeMap<String, usize>,
    /// Leads without a stage.
    pub unstaged_leads: usize,
    pub total_budget: i64,
}

impl DashboardStats {
    pub fn from_leads(leads: &[Lead]) -> Self {
        let mut stats = DashboardStats {
            total_leads: leads.len(),
            ..Default::default()
        };

        for lead in leads {
            match &lead.stage {
                Some(Stage::PotentialLead) => stats.potential_leads += 1,
                Some(Stage::ReachedOut) => stats.reached_out_leads += 1,
                Some(Stage::ResponseReceived) => stats.response_received_leads += 1,
                Some(Stage::Other(raw)) => *stats.other_stages.entry(raw.clone()).or_default() += 1,
                None => stats.unstaged_leads += 1,
            }
            stats.total_budget = stats
                .total_budget
                .saturating_add(parse_budget(lead.budget.as_ref()));
        }

        stats
    }
}

fn leading_integer() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([+-]?\d+)").expect("leading integer pattern is valid"))
}

/// Reads a budget as an integer the way a lenient integer parse would: leading
/// digits of a text value, the truncated value of a number, zero otherwise.
pub fn parse_budget(budget: Option<&Value>) -> i64 {
    match budget {
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() => f.trunc() as i64,
                    _ => 0,
                }
            }
        }
        Some(Value::String(text)) => leading_integer()
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .unwrap_or(0),
        _ => 0,
    }
}

/// Budget as shown on a card: the raw value, integral numbers without decimals.
pub fn display_budget(budget: Option<&Value>) -> String {
    match budget {
        Some(Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Some(Value::String(text)) => text.clone(),
        _ => String::new(),
    }
}

/// Label of a stage, or `fallback` when the stage is missing or blank.
fn label_or(stage: Option<&Stage>, fallback: &str) -> String {
    stage
        .map(Stage::label)
        .filter(|label| !label.trim().is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Stage label for lead cards. Unstaged leads read as "Prospect".
pub fn stage_label(stage: Option<&Stage>) -> String {
    label_or(stage, "Prospect")
}

/// Score badge colour band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreTier {
    High,
    Medium,
    Low,
}

impl ScoreTier {
    pub fn of(score: Option<f64>) -> Self {
        match score {
            Some(s) if s >= 8.0 => ScoreTier::High,
            Some(s) if s >= 6.0 => ScoreTier::Medium,
            _ => ScoreTier::Low,
        }
    }
}

/// Score text: `N/A` for a missing or zero score.
pub fn display_score(score: Option<f64>) -> String {
    match score {
        Some(s) if s != 0.0 && !s.is_nan() => {
            if s.fract() == 0.0 {
                format!("{}", s as i64)
            } else {
                s.to_string()
            }
        }
        _ => "N/A".to_string(),
    }
}

/// One lead as presented in the pipeline list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadCard {
    pub id: LeadId,
    pub name: String,
    pub company: String,
    pub industry: String,
    pub needs: String,
    pub budget: String,
    pub stage: Option<Stage>,
    pub stage_label: String,
    pub score: Option<f64>,
    pub score_display: String,
    pub score_tier: ScoreTier,
    pub last_message: Option<String>,
    pub interaction_log: Option<String>,
    pub actions: HashMap<LeadAction, ActionState>,
}

impl LeadCard {
    pub fn from_lead(lead: &Lead, actions: HashMap<LeadAction, ActionState>) -> Self {
        Self {
            id: lead.id,
            name: lead.name.clone(),
            company: lead.company.clone(),
            industry: lead.industry.clone(),
            needs: lead.needs.clone(),
            budget: display_budget(lead.budget.as_ref()),
            stage: lead.stage.clone(),
            stage_label: stage_label(lead.stage.as_ref()),
            score: lead.score,
            score_display: display_score(lead.score),
            score_tier: ScoreTier::of(lead.score),
            last_message: lead.last_message.clone(),
            interaction_log: lead.interaction_log.clone(),
            actions,
        }
    }
}

/// Entry of the generated-messages feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedMessage {
    pub lead_id: LeadId,
    pub name: String,
    pub company: String,
    pub industry: String,
    pub budget: String,
    pub stage_label: String,
    pub score_display: String,
    pub score_tier: ScoreTier,
    pub message: String,
    pub interaction_log: Option<String>,
    /// Display ordinal, highest for the newest entry.
    pub number: usize,
    pub latest: bool,
}

/// Leads with a generated message, newest (last in collection order) first.
pub fn generated_messages(leads: &[Lead]) -> Vec<GeneratedMessage> {
    let with_message: Vec<(&Lead, &str)> = leads
        .iter()
        .rev()
        .filter_map(|lead| {
            lead.last_message
                .as_deref()
                .filter(|m| !m.is_empty())
                .map(|m| (lead, m))
        })
        .collect();
    let count = with_message.len();

    with_message
        .into_iter()
        .enumerate()
        .map(|(index, (lead, message))| GeneratedMessage {
            lead_id: lead.id,
            name: lead.name.clone(),
            company: lead.company.clone(),
            industry: lead.industry.clone(),
            budget: display_budget(lead.budget.as_ref()),
            stage_label: label_or(lead.stage.as_ref(), "Unknown"),
            score_display: display_score(lead.score),
            score_tier: ScoreTier::of(lead.score),
            message: message.to_string(),
            interaction_log: lead.interaction_log.clone(),
            number: count - index,
            latest: index == 0,
        })
        .collect()
}

/// Load state of the full collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadStatus {
    #[default]
    Loading,
    Ready,
    Failed { error: String },
}

/// Everything the presentation layer needs to draw the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    #[serde(flatten)]
    pub status: LoadStatus,
    pub search: String,
    pub stats: DashboardStats,
    pub leads: Vec<LeadCard>,
    pub open_editors: HashMap<EditorKind, LeadId>,
    pub notifications: Vec<Notification>,
}

impl DashboardView {
    pub fn build(
        status: LoadStatus,
        search: String,
        leads: &[Lead],
        controller: &LifecycleController,
    ) -> Self {
        let actions = [
            LeadAction::Rescore,
            LeadAction::Message,
            LeadAction::Interaction,
        ];
        let states: Vec<(LeadAction, HashMap<LeadId, ActionState>)> = actions
            .iter()
            .map(|action| (*action, controller.tracker(*action).snapshot()))
            .collect();

        let cards = leads
            .iter()
            .map(|lead| {
                let per_lead = states
                    .iter()
                    .map(|(action, by_id)| {
                        (*action, by_id.get(&lead.id).cloned().unwrap_or_default())
                    })
                    .collect();
                LeadCard::from_lead(lead, per_lead)
            })
            .collect();

        Self {
            status,
            search,
            stats: DashboardStats::from_leads(leads),
            leads: cards,
            open_editors: controller.open_editors(),
            notifications: controller.notifier().active(),
        }
    }
}
