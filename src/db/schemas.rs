//! MongoDB index definitions per collection
//!
//! Logical ids are unique in every collection; foreign keys used for lookups get plain
//! indexes.

use bson::{doc, Document};
use mongodb::options::IndexOptions;

use crate::db::Collection;

/// Schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices(&self) -> Vec<(Document, Option<IndexOptions>)>;
}

fn unique(name: &str) -> Option<IndexOptions> {
    Some(
        IndexOptions::builder()
            .unique(true)
            .name(name.to_string())
            .build(),
    )
}

fn named(name: &str) -> Option<IndexOptions> {
    Some(IndexOptions::builder().name(name.to_string()).build())
}

impl IntoIndexes for Collection {
    fn into_indices(&self) -> Vec<(Document, Option<IndexOptions>)> {
        let id_field = self.logical_id_field();
        let mut indices = vec![(doc! { id_field: 1 }, unique(&format!("{}_unique", id_field)))];

        match self {
            Collection::Citizens => {
                // Empty emails are allowed to repeat
                indices.push((
                    doc! { "email": 1 },
                    Some(
                        IndexOptions::builder()
                            .unique(true)
                            .name("email_unique".to_string())
                            .partial_filter_expression(doc! { "email": { "$gt": "" } })
                            .build(),
                    ),
                ));
                indices.push((doc! { "aadhaar_number": 1 }, named("aadhaar_index")));
            }
            Collection::Applications => {
                indices.push((doc! { "status": 1 }, named("status_index")));
                indices.push((doc! { "citizen_id": 1 }, named("citizen_index")));
            }
            Collection::Payments => {
                // One payment per application
                indices.push((doc! { "application_id": 1 }, unique("application_unique")));
            }
            Collection::Notifications => {
                indices.push((doc! { "user_id": 1, "created_at": -1 }, named("user_feed_index")));
            }
            Collection::StatusHistory => {
                indices.push((
                    doc! { "application_id": 1, "created_at": 1 },
                    named("application_history_index"),
                ));
            }
        }

        indices
    }
}
