//! Serialization boundary between caller types and BSON documents.

use bson::{Bson, Document, oid::ObjectId};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{MongoError, MongoResult};

/// Encode a caller value as a document.
///
/// Values that do not serialize to a document (numbers, strings, arrays)
/// are rejected.
pub fn to_document<T: Serialize + ?Sized>(value: &T) -> MongoResult<Document> {
    Ok(bson::to_document(value)?)
}

/// Encode a slice of caller values.
pub fn to_documents<T: Serialize>(values: &[T]) -> MongoResult<Vec<Document>> {
    values.iter().map(to_document).collect()
}

/// Decode a document into a caller type.
pub fn from_document<T: DeserializeOwned>(doc: Document) -> MongoResult<T> {
    Ok(bson::from_document(doc)?)
}

/// Extract an ObjectId from a generated identifier.
pub fn expect_object_id(id: &Bson) -> MongoResult<ObjectId> {
    id.as_object_id()
        .ok_or_else(|| MongoError::InvalidObjectId(format!("expected ObjectId, got {}", id)))
}

/// Parse an ObjectId from a string.
pub fn parse_object_id(s: &str) -> MongoResult<ObjectId> {
    ObjectId::parse_str(s).map_err(MongoError::from)
}

/// Whether an admin command reply reports success (`ok` equal to 1).
pub fn command_succeeded(reply: &Document) -> bool {
    match reply.get("ok") {
        Some(Bson::Int32(v)) => *v == 1,
        Some(Bson::Int64(v)) => *v == 1,
        Some(Bson::Double(v)) => *v == 1.0,
        _ => false,
    }
}

/// The `errmsg` of an admin command reply.
pub fn command_error(reply: &Document) -> String {
    match reply.get("errmsg") {
        Some(Bson::String(msg)) => msg.clone(),
        Some(other) => other.to_string(),
        None => "unknown error".to_string(),
    }
}
