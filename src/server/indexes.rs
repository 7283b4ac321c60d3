use tracing::info;

use crate::auth::API_KEY_FIELD;
use crate::database::{DocumentStore, IndexModel, StoreError};
use crate::dsl::Settings;

/// Creates the token lookup index and every declared resource index.
/// Safe to repeat on every start.
pub async fn ensure_indexes(store: &dyn DocumentStore, settings: &Settings) -> Result<(), StoreError> {
    let tokens = store.collection(&settings.auth.database, &settings.auth.collection);
    tokens
        .create_index(&IndexModel::new(API_KEY_FIELD, &[API_KEY_FIELD], true))
        .await?;

    for (key, resource) in &settings.resources {
        let collection = store.collection(&resource.table.database, &resource.table.collection);
        for (name, spec) in &resource.indexes {
            let fields: Vec<&str> = spec.fields.iter().map(String::as_str).collect();
            collection.create_index(&IndexModel::new(name.as_str(), &fields, spec.unique)).await?;
            info!("Index {} ready for resource {}", name, key);
        }
    }
    Ok(())
}
