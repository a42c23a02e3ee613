use std::sync::Arc;

use crate::gateways::FlightStatusGateway;
use crate::lifecycle::PolicyLifecycle;
use crate::promo::PromoCodeEngine;
use crate::store::PolicyStore;

/// Shared handler state. The flight gateway is optional: without an API
/// key the status endpoint answers 502 instead of guessing.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PolicyStore>,
    pub lifecycle: Arc<PolicyLifecycle>,
    pub promo: Arc<PromoCodeEngine>,
    pub flight: Option<Arc<dyn FlightStatusGateway>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PolicyStore>,
        promo: Arc<PromoCodeEngine>,
        flight: Option<Arc<dyn FlightStatusGateway>>,
    ) -> Self {
        let lifecycle = Arc::new(PolicyLifecycle::new(store.clone()));
        Self {
            store,
            lifecycle,
            promo,
            flight,
        }
    }
}
