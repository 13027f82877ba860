use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, FindOptions, IndexOptions};
use mongodb::sync::{Client, Database};
use mongodb::IndexModel;

use crate::models::itinerary::{Filters, Itinerary, ItineraryForm, ItineraryUpdate, TrekDetails};
use crate::models::user::{
    NewUser, Preferences, ProfileUpdate, Subscription, SubscriptionUpdate, User, STATUS_FREE,
};

use super::Store;

/// MongoDB-backed implementation of the Store trait.
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    /// Create a new MongoStore by connecting to the given URI and database name.
    pub fn new(uri: &str, db_name: &str) -> Result<Self, String> {
        let client_options = ClientOptions::parse(uri).map_err(|e| e.to_string())?;
        let client = Client::with_options(client_options).map_err(|e| e.to_string())?;
        let db = client.database(db_name);
        Ok(Self { db })
    }

    // ── Helper: get next auto-increment ID for a collection ──
    fn next_id(&self, collection_name: &str) -> Result<i64, String> {
        let counters = self.db.collection::<Document>("_counters");
        let filter = doc! { "_id": collection_name };
        let update = doc! { "$inc": { "seq": 1_i64 } };
        let opts = mongodb::options::FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(mongodb::options::ReturnDocument::After)
            .build();
        let result = counters
            .find_one_and_update(filter, update, opts)
            .map_err(|e| e.to_string())?;
        match result {
            Some(d) => d
                .get_i64("seq")
                .map_err(|e| format!("Failed to get seq: {}", e)),
            None => Err("Failed to generate ID".to_string()),
        }
    }

    fn find_user(&self, filter: Document) -> Option<User> {
        let coll = self.db.collection::<Document>("users");
        let doc = coll.find_one(filter, None).ok()??;
        doc_to_user(&doc)
    }

    fn find_itinerary(&self, filter: Document) -> Option<Itinerary> {
        let coll = self.db.collection::<Document>("itineraries");
        let doc = coll.find_one(filter, None).ok()??;
        doc_to_itinerary(&doc)
    }

    fn set_fields(&self, collection: &str, id: i64, update: Document) -> Result<(), String> {
        if update.is_empty() {
            return Ok(());
        }
        self.db
            .collection::<Document>(collection)
            .update_one(doc! { "id": id }, update, None)
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

impl Store for MongoStore {
    // ── Lifecycle ───────────────────────────────────────────────────

    fn backend(&self) -> &'static str {
        "mongo"
    }

    fn run_migrations(&self) -> Result<(), String> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.db
            .collection::<Document>("users")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "firebase_uid": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .map_err(|e| e.to_string())?;
        self.db
            .collection::<Document>("users")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "subscription.stripe_subscription_id": 1 })
                    .build(),
                None,
            )
            .map_err(|e| e.to_string())?;

        let itineraries = self.db.collection::<Document>("itineraries");
        itineraries
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "created_at": -1 })
                    .build(),
                None,
            )
            .map_err(|e| e.to_string())?;
        // A popular trek can be saved once per user; custom itineraries carry no trek_id.
        itineraries
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "trek_id": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .partial_filter_expression(doc! { "trek_id": { "$type": "string" } })
                            .build(),
                    )
                    .build(),
                None,
            )
            .map_err(|e| e.to_string())?;

        self.db
            .collection::<Document>("generations")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "created_at": 1 })
                    .build(),
                None,
            )
            .map_err(|e| e.to_string())?;

        Ok(())
    }

    fn ping(&self) -> Result<(), String> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .map_err(|e| format!("MongoDB ping failed: {}", e))?;
        Ok(())
    }

    // ── Users ───────────────────────────────────────────────────────

    fn user_get_by_id(&self, id: i64) -> Option<User> {
        self.find_user(doc! { "id": id })
    }

    fn user_get_by_firebase_uid(&self, uid: &str) -> Option<User> {
        self.find_user(doc! { "firebase_uid": uid })
    }

    fn user_get_by_subscription_id(&self, subscription_id: &str) -> Option<User> {
        self.find_user(doc! { "subscription.stripe_subscription_id": subscription_id })
    }

    fn user_create(&self, new: &NewUser) -> Result<i64, String> {
        let id = self.next_id("users")?;
        let now = crate::models::now();
        let coll = self.db.collection::<Document>("users");
        coll.insert_one(
            doc! {
                "id": id,
                "firebase_uid": &new.firebase_uid,
                "email": &new.email,
                "first_name": &new.first_name,
                "last_name": &new.last_name,
                "subscription": {
                    "status": STATUS_FREE,
                    "billing_interval": "",
                    "start_date": &now,
                    "end_date": Bson::Null,
                    "stripe_customer_id": Bson::Null,
                    "stripe_subscription_id": Bson::Null,
                },
                "preferences": {
                    "dark_mode": false,
                    "default_difficulty": "",
                    "default_accommodation": "",
                },
                "created_at": &now,
                "last_login_at": &now,
            },
            None,
        )
        .map_err(|e| e.to_string())?;
        Ok(id)
    }

    fn user_touch_last_login(&self, id: i64) -> Result<(), String> {
        self.set_fields(
            "users",
            id,
            doc! { "$set": { "last_login_at": crate::models::now() } },
        )
    }

    fn user_update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<(), String> {
        let mut set = Document::new();
        if let Some(ref first) = update.first_name {
            set.insert("first_name", first.trim());
        }
        if let Some(ref last) = update.last_name {
            set.insert("last_name", last.trim());
        }
        if let Some(ref prefs) = update.preferences {
            set.insert(
                "preferences",
                doc! {
                    "dark_mode": prefs.dark_mode,
                    "default_difficulty": &prefs.default_difficulty,
                    "default_accommodation": &prefs.default_accommodation,
                },
            );
        }
        if set.is_empty() {
            return Ok(());
        }
        self.set_fields("users", id, doc! { "$set": set })
    }

    fn user_set_stripe_customer(&self, id: i64, customer_id: &str) -> Result<(), String> {
        self.set_fields(
            "users",
            id,
            doc! { "$set": { "subscription.stripe_customer_id": customer_id } },
        )
    }

    fn user_update_subscription(
        &self,
        id: i64,
        update: &SubscriptionUpdate,
    ) -> Result<(), String> {
        let mut set = Document::new();
        if let Some(ref status) = update.status {
            set.insert("subscription.status", status.as_str());
        }
        if let Some(ref interval) = update.billing_interval {
            set.insert("subscription.billing_interval", interval.as_str());
        }
        if let Some(ref start) = update.start_date {
            set.insert("subscription.start_date", start.as_str());
        }
        if let Some(ref end) = update.end_date {
            set.insert("subscription.end_date", end.as_str());
        }
        if !update.clear_subscription_id {
            if let Some(ref sub_id) = update.stripe_subscription_id {
                set.insert("subscription.stripe_subscription_id", sub_id.as_str());
            }
        }

        let mut change = Document::new();
        if !set.is_empty() {
            change.insert("$set", set);
        }
        if update.clear_subscription_id {
            change.insert("$unset", doc! { "subscription.stripe_subscription_id": "" });
        }
        self.set_fields("users", id, change)
    }

    fn user_delete(&self, id: i64) -> Result<(), String> {
        self.db
            .collection::<Document>("itineraries")
            .delete_many(doc! { "user_id": id }, None)
            .map_err(|e| e.to_string())?;
        self.db
            .collection::<Document>("generations")
            .delete_many(doc! { "user_id": id }, None)
            .map_err(|e| e.to_string())?;
        self.db
            .collection::<Document>("users")
            .delete_one(doc! { "id": id }, None)
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    // ── Itineraries ─────────────────────────────────────────────────

    fn itinerary_list_for_user(&self, user_id: i64) -> Vec<Itinerary> {
        let coll = self.db.collection::<Document>("itineraries");
        let opts = FindOptions::builder()
            .sort(doc! { "created_at": -1, "id": -1 })
            .build();
        let cursor = match coll.find(doc! { "user_id": user_id }, opts) {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        cursor
            .filter_map(|r| r.ok())
            .filter_map(|d| doc_to_itinerary(&d))
            .collect()
    }

    fn itinerary_find_by_id(&self, id: i64) -> Option<Itinerary> {
        self.find_itinerary(doc! { "id": id })
    }

    fn itinerary_find_by_trek(&self, user_id: i64, trek_id: &str) -> Option<Itinerary> {
        self.find_itinerary(doc! { "user_id": user_id, "trek_id": trek_id })
    }

    fn itinerary_create(&self, user_id: i64, form: &ItineraryForm) -> Result<i64, String> {
        let id = self.next_id("itineraries")?;
        let now = crate::models::now();
        let details = form.trek_details.as_ref().map(|d| {
            doc! {
                "country": &d.country,
                "region": &d.region,
                "max_elevation": d.max_elevation,
                "distance": d.distance,
                "summary": &d.summary,
                "duration": d.duration,
            }
        });
        let coll = self.db.collection::<Document>("itineraries");
        coll.insert_one(
            doc! {
                "id": id,
                "user_id": user_id,
                "title": form.title.trim(),
                "location": form.location.trim(),
                "filters": filters_to_doc(&form.filters),
                "comments": form.comments.trim(),
                "content": &form.content,
                "kind": form.kind(),
                "trek_id": form.trek_id(),
                "trek_details": details,
                "created_at": &now,
                "last_viewed": &now,
            },
            None,
        )
        .map_err(|e| e.to_string())?;
        Ok(id)
    }

    fn itinerary_update(&self, id: i64, update: &ItineraryUpdate) -> Result<(), String> {
        let mut set = Document::new();
        if let Some(ref title) = update.title {
            set.insert("title", title.trim());
        }
        if let Some(ref location) = update.location {
            set.insert("location", location.trim());
        }
        if let Some(ref comments) = update.comments {
            set.insert("comments", comments.trim());
        }
        if let Some(ref content) = update.content {
            set.insert("content", content.as_str());
        }
        if let Some(ref filters) = update.filters {
            set.insert("filters", filters_to_doc(filters));
        }
        if set.is_empty() {
            return Ok(());
        }
        self.set_fields("itineraries", id, doc! { "$set": set })
    }

    fn itinerary_touch_viewed(&self, id: i64) -> Result<(), String> {
        self.set_fields(
            "itineraries",
            id,
            doc! { "$set": { "last_viewed": crate::models::now() } },
        )
    }

    fn itinerary_delete(&self, id: i64) -> Result<(), String> {
        self.db
            .collection::<Document>("itineraries")
            .delete_one(doc! { "id": id }, None)
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    fn itinerary_count_for_user(&self, user_id: i64) -> i64 {
        self.db
            .collection::<Document>("itineraries")
            .count_documents(doc! { "user_id": user_id }, None)
            .unwrap_or(0) as i64
    }

    // ── Generation log ──────────────────────────────────────────────

    fn generation_record(&self, user_id: i64) -> Result<(), String> {
        self.db
            .collection::<Document>("generations")
            .insert_one(
                doc! { "user_id": user_id, "created_at": crate::models::now() },
                None,
            )
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    fn generation_count_since(&self, user_id: i64, since: &str) -> i64 {
        self.db
            .collection::<Document>("generations")
            .count_documents(
                doc! { "user_id": user_id, "created_at": { "$gte": since } },
                None,
            )
            .unwrap_or(0) as i64
    }
}

// ── Helper: BSON <-> models ──────────────────────────────────────────

fn opt_str(doc: &Document, key: &str) -> Option<String> {
    doc.get_str(key).ok().map(|s| s.to_string())
}

fn str_or_empty(doc: &Document, key: &str) -> String {
    doc.get_str(key).ok().unwrap_or("").to_string()
}

fn opt_number(doc: &Document, key: &str) -> Option<f64> {
    match doc.get(key)? {
        Bson::Double(v) => Some(*v),
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        _ => None,
    }
}

fn filters_to_doc(filters: &Filters) -> Document {
    doc! {
        "accommodation": &filters.accommodation,
        "difficulty": &filters.difficulty,
        "technical": &filters.technical,
        "altitude": &filters.altitude,
    }
}

fn doc_to_user(doc: &Document) -> Option<User> {
    let empty = Document::new();
    let sub = doc.get_document("subscription").unwrap_or(&empty);
    let prefs = doc.get_document("preferences").unwrap_or(&empty);
    Some(User {
        id: doc.get_i64("id").ok()?,
        firebase_uid: doc.get_str("firebase_uid").ok()?.to_string(),
        email: str_or_empty(doc, "email"),
        first_name: str_or_empty(doc, "first_name"),
        last_name: str_or_empty(doc, "last_name"),
        subscription: Subscription {
            status: sub.get_str("status").ok().unwrap_or(STATUS_FREE).to_string(),
            billing_interval: str_or_empty(sub, "billing_interval"),
            start_date: opt_str(sub, "start_date"),
            end_date: opt_str(sub, "end_date"),
            stripe_customer_id: opt_str(sub, "stripe_customer_id"),
            stripe_subscription_id: opt_str(sub, "stripe_subscription_id"),
        },
        preferences: Preferences {
            dark_mode: prefs.get_bool("dark_mode").unwrap_or(false),
            default_difficulty: str_or_empty(prefs, "default_difficulty"),
            default_accommodation: str_or_empty(prefs, "default_accommodation"),
        },
        created_at: str_or_empty(doc, "created_at"),
        last_login_at: opt_str(doc, "last_login_at"),
    })
}

fn doc_to_itinerary(doc: &Document) -> Option<Itinerary> {
    let empty = Document::new();
    let filters = doc.get_document("filters").unwrap_or(&empty);
    let trek_details = doc.get_document("trek_details").ok().map(|d| TrekDetails {
        country: str_or_empty(d, "country"),
        region: str_or_empty(d, "region"),
        max_elevation: opt_number(d, "max_elevation"),
        distance: opt_number(d, "distance"),
        summary: str_or_empty(d, "summary"),
        duration: opt_number(d, "duration"),
    });
    Some(Itinerary {
        id: doc.get_i64("id").ok()?,
        user_id: doc.get_i64("user_id").ok()?,
        title: str_or_empty(doc, "title"),
        location: str_or_empty(doc, "location"),
        filters: Filters {
            accommodation: str_or_empty(filters, "accommodation"),
            difficulty: str_or_empty(filters, "difficulty"),
            technical: str_or_empty(filters, "technical"),
            altitude: str_or_empty(filters, "altitude"),
        },
        comments: str_or_empty(doc, "comments"),
        content: str_or_empty(doc, "content"),
        kind: doc
            .get_str("kind")
            .ok()
            .unwrap_or(crate::models::itinerary::KIND_CUSTOM)
            .to_string(),
        trek_id: opt_str(doc, "trek_id"),
        trek_details,
        created_at: str_or_empty(doc, "created_at"),
        last_viewed: str_or_empty(doc, "last_viewed"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_document_with_missing_parts_uses_defaults() {
        let d = doc! { "id": 7_i64, "firebase_uid": "abc", "email": "a@b.c" };
        let user = doc_to_user(&d).unwrap();
        assert_eq!(user.subscription.status, "free");
        assert_eq!(user.subscription.stripe_subscription_id, None);
        assert!(!user.preferences.dark_mode);
    }

    #[test]
    fn user_document_without_uid_is_rejected() {
        assert!(doc_to_user(&doc! { "id": 7_i64 }).is_none());
    }

    #[test]
    fn itinerary_document_reads_nested_fields() {
        let d = doc! {
            "id": 3_i64,
            "user_id": 7_i64,
            "title": "Annapurna",
            "filters": { "difficulty": "challenging" },
            "kind": "popular-trek",
            "trek_id": "abc",
            "trek_details": { "country": "Nepal", "max_elevation": 5416_i32, "distance": 160.5 },
        };
        let it = doc_to_itinerary(&d).unwrap();
        assert_eq!(it.filters.difficulty, "challenging");
        assert_eq!(it.kind, "popular-trek");
        let details = it.trek_details.unwrap();
        assert_eq!(details.max_elevation, Some(5416.0));
        assert_eq!(details.distance, Some(160.5));
        assert_eq!(details.duration, None);
    }

    #[test]
    fn null_trek_id_reads_as_none() {
        let d = doc! { "id": 1_i64, "user_id": 2_i64, "trek_id": Bson::Null };
        assert_eq!(doc_to_itinerary(&d).unwrap().trek_id, None);
    }
}
