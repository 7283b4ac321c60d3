use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, MethodRouter},
    Router,
};
use tracing::debug;

use crate::auth::Authenticator;
use crate::database::{Collection, DocumentStore};
use crate::dsl::{Resource, ResourceKind, Settings, SettingsError, Verb};
use crate::handlers::{list, simple, Endpoint};
use crate::middleware::{require_permission, ResourceGuard};
use crate::records::{RecordOperations, SimulatedUpdate};
use crate::validation::Validator;

/// What every compiled resource shares.
#[derive(Clone)]
pub struct Wiring {
    pub store: Arc<dyn DocumentStore>,
    pub validator: Validator,
    pub authenticator: Authenticator,
    pub scratch: Arc<dyn Collection>,
}

/// Builds the authenticated routes of one resource.
pub fn compile(key: &str, resource: &Resource, settings: &Settings, wiring: &Wiring) -> Result<Router, SettingsError> {
    let collection = wiring.store.collection(&resource.table.database, &resource.table.collection);
    let endpoint = Arc::new(Endpoint {
        key: key.to_string(),
        verbs: resource.effective_verbs(),
        records: RecordOperations::new(key, resource, collection)?,
        simulation: SimulatedUpdate::new(wiring.scratch.clone(), resource.model.clone()),
        model: resource.model.clone(),
        validator: wiring.validator.clone(),
        store: wiring.store.clone(),
        methods: resource.methods.clone(),
        item_methods: resource.item_methods.clone(),
        list_max_results: settings.list_max_results(resource),
    });

    let routes = match resource.kind {
        ResourceKind::Simple => simple_routes(key, &endpoint.verbs),
        ResourceKind::List => list_routes(key, &endpoint.verbs),
    };
    debug!("Compiled {:?} resource {} over {} with verbs {:?}", resource.kind, key, resource.table, endpoint.verbs);

    let guard = Arc::new(ResourceGuard { authenticator: wiring.authenticator.clone(), resource: key.to_string() });
    Ok(routes
        .route_layer(from_fn_with_state(guard, require_permission))
        .with_state(endpoint))
}

fn simple_routes(key: &str, verbs: &BTreeSet<Verb>) -> Router<Arc<Endpoint>> {
    let mut document = MethodRouter::new();
    if verbs.contains(&Verb::Read) {
        document = document.get(simple::read);
    }
    if verbs.contains(&Verb::Create) {
        document = document.post(simple::create);
    }
    if verbs.contains(&Verb::Update) {
        document = document.patch(simple::update);
    }
    if verbs.contains(&Verb::Replace) {
        document = document.put(simple::replace);
    }
    if verbs.contains(&Verb::Delete) {
        document = document.delete(simple::delete);
    }

    Router::new()
        .route(&format!("/{}", key), document)
        .route(&format!("/{}/:method", key), get(simple::view).post(simple::operation))
}

fn list_routes(key: &str, verbs: &BTreeSet<Verb>) -> Router<Arc<Endpoint>> {
    let mut collection = MethodRouter::new();
    if verbs.contains(&Verb::List) {
        collection = collection.get(list::list);
    }
    if verbs.contains(&Verb::Create) {
        collection = collection.post(list::create);
    }

    let mut target = get(list::read_or_view).post(list::operation);
    if verbs.contains(&Verb::Update) {
        target = target.patch(list::update);
    }
    if verbs.contains(&Verb::Replace) {
        target = target.put(list::replace);
    }
    if verbs.contains(&Verb::Delete) {
        target = target.delete(list::delete);
    }

    Router::new()
        .route(&format!("/{}", key), collection)
        .route(&format!("/{}/:target", key), target)
        .route(&format!("/{}/:id/:method", key), get(list::item_view).post(list::item_operation))
}
