use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::types::{Document, ObjectId, ID_FIELD};
use crate::validation::{Validation, Validator, Violation};

/// Domain type stored by a resource.
///
/// Decoding and encoding go through serde; `validate` declares the field
/// rules checked before every create, replace and update.
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn validate(&self, validation: &mut Validation<'_>) {
        let _ = validation;
    }

    fn identity(&self) -> Option<ObjectId> {
        None
    }

    fn set_identity(&mut self, id: ObjectId) {
        let _ = id;
    }
}

/// Schemaless resources store plain documents.
impl Model for Document {
    fn identity(&self) -> Option<ObjectId> {
        self.get(ID_FIELD)?.as_str()?.parse().ok()
    }

    fn set_identity(&mut self, id: ObjectId) {
        self.insert(ID_FIELD.to_string(), Value::from(id));
    }
}

/// A decoded model value with its concrete type erased.
pub trait Instance: Send + Sync {
    fn check(&self, validator: &Validator) -> Result<(), Vec<Violation>>;

    fn identity(&self) -> Option<ObjectId>;

    fn set_identity(&mut self, id: ObjectId);

    fn to_document(&self) -> Result<Document, serde_json::Error>;
}

impl<T: Model> Instance for T {
    fn check(&self, validator: &Validator) -> Result<(), Vec<Violation>> {
        let mut validation = Validation::new(validator);
        self.validate(&mut validation);
        validation.finish()
    }

    fn identity(&self) -> Option<ObjectId> {
        Model::identity(self)
    }

    fn set_identity(&mut self, id: ObjectId) {
        Model::set_identity(self, id)
    }

    fn to_document(&self) -> Result<Document, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(doc) => Ok(doc),
            _ => Err(serde::ser::Error::custom("model must serialize to a JSON object")),
        }
    }
}

/// Binds a resource to its model type.
pub trait ModelBinding: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn decode(&self, document: Document) -> Result<Box<dyn Instance>, serde_json::Error>;
}

struct Binding<T>(PhantomData<fn() -> T>);

impl<T: Model> ModelBinding for Binding<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn decode(&self, document: Document) -> Result<Box<dyn Instance>, serde_json::Error> {
        let value: T = serde_json::from_value(Value::Object(document))?;
        Ok(Box::new(value))
    }
}

pub fn model<T: Model>() -> Arc<dyn ModelBinding> {
    Arc::new(Binding::<T>(PhantomData))
}
