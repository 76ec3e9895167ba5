use crate::config::Config;
use crate::dashboard::{generated_messages, DashboardView, GeneratedMessage, LoadStatus};
use crate::errors::{AppError, ResultExt};
use crate::gateway_client::LeadApiClient;
use crate::lifecycle::LifecycleController;
use crate::models::{CreatedLead, NewLead};
use crate::notifications::Notifier;
use crate::store::{LeadStore, SharedLeadStore};
use std::sync::Arc;
use tokio::sync::RwLock;

/// One user's dashboard: the lead collection, its load status, the active
/// search, and the lifecycle controller acting on it.
///
/// The collection is fully reloaded only on initial load, explicit retry,
/// search change and lead creation. Everything else goes through the
/// controller's targeted patches.
pub struct DashboardSession {
    client: LeadApiClient,
    store: SharedLeadStore,
    controller: Arc<LifecycleController>,
    status: RwLock<LoadStatus>,
    search: RwLock<String>,
}

impl DashboardSession {
    pub fn new(client: LeadApiClient, config: &Config) -> Self {
        let store = LeadStore::shared();
        let notifier = Notifier::new(config.notification_ttl());
        let controller = Arc::new(LifecycleController::new(
            client.clone(),
            Arc::clone(&store),
            notifier,
            config.failure_policy,
        ));

        Self {
            client,
            store,
            controller,
            status: RwLock::new(LoadStatus::Loading),
            search: RwLock::new(String::new()),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let client = LeadApiClient::new(config.api_url.clone())?;
        Ok(Self::new(client, config))
    }

    pub fn client(&self) -> &LeadApiClient {
        &self.client
    }

    pub fn store(&self) -> &SharedLeadStore {
        &self.store
    }

    pub fn controller(&self) -> &Arc<LifecycleController> {
        &self.controller
    }

    pub async fn status(&self) -> LoadStatus {
        self.status.read().await.clone()
    }

    pub async fn search(&self) -> String {
        self.search.read().await.clone()
    }

    /// Fetches the collection for the current search and replaces the store.
    ///
    /// On failure the store keeps its previous contents and the status becomes
    /// `Failed`, which the view turns into a retry prompt.
    pub async fn reload(&self) -> Result<usize, AppError> {
        *self.status.write().await = LoadStatus::Loading;
        let search = self.search().await;
        tracing::info!("Search query: {:?}", search);

        match self.client.fetch_leads(Some(&search)).await {
            Ok(leads) => {
                let count = leads.len();
                self.store.write().await.replace_all(leads);
                *self.status.write().await = LoadStatus::Ready;
                Ok(count)
            }
            Err(e) => {
                tracing::error!("Error fetching leads: {}", e);
                *self.status.write().await = LoadStatus::Failed {
                    error: e.to_string(),
                };
                Err(e)
            }
        }
    }

    /// Changes the search term and reloads.
    pub async fn set_search(&self, query: impl Into<String>) -> Result<usize, AppError> {
        *self.search.write().await = query.into();
        self.reload().await
    }

    /// Creates a lead on the backend, then reloads the whole collection.
    pub async fn create_lead(&self, lead: NewLead) -> Result<CreatedLead, AppError> {
        if lead.name.trim().is_empty() || lead.company.trim().is_empty() {
            return Err(AppError::BadRequest(
                "name and company are required".to_string(),
            ));
        }

        let created = self
            .client
            .create_lead(&lead)
            .await
            .context("Creating lead")?;
        self.reload().await?;
        Ok(created)
    }

    pub async fn view(&self) -> DashboardView {
        let leads = self.store.read().await.snapshot();
        DashboardView::build(
            self.status().await,
            self.search().await,
            &leads,
            &self.controller,
        )
    }

    pub async fn messages(&self) -> Vec<GeneratedMessage> {
        let leads = self.store.read().await.snapshot();
        generated_messages(&leads)
    }
}
