//! Application state shared by all handlers

use std::sync::Arc;

use crate::infrastructure::llm::ProviderRegistry;
use crate::infrastructure::services::QueryService;
use crate::infrastructure::usage::CostAccountant;

#[derive(Debug, Clone)]
pub struct AppState {
    pub query_service: QueryService,
    pub accountant: Arc<CostAccountant>,
}

impl AppState {
    pub fn new(query_service: QueryService, accountant: Arc<CostAccountant>) -> Self {
        Self {
            query_service,
            accountant,
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        self.query_service.registry()
    }
}
