use log::{error, info};
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Database, IndexModel};
use rocket::fairing::AdHoc;
use thiserror::Error;

pub mod records;

pub const RECORDS: &str = "verification_records";
pub const ADDRESSES: &str = "addresses";
pub const DRAFTS: &str = "form_drafts";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("database error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("could not encode update: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),
}

pub fn init() -> AdHoc {
    AdHoc::on_ignite("MongoDB", |rocket| async {
        match connect().await {
            Ok(database) => {
                info!("✓ MongoDB connected successfully");
                if let Err(e) = ensure_indexes(&database).await {
                    error!("✗ Failed to create indexes: {}", e);
                }
                rocket.manage(database)
            }
            Err(e) => {
                error!("✗ Failed to connect to MongoDB: {}", e);
                rocket
            }
        }
    })
}

async fn connect() -> Result<Database, mongodb::error::Error> {
    let uri = crate::config::Config::mongodb_uri();
    let client = Client::with_uri_str(&uri).await?;

    // Test connection
    client
        .database("admin")
        .run_command(doc! {"ping": 1}, None)
        .await?;

    Ok(client.database(&crate::config::Config::mongodb_database()))
}

fn unique(keys: mongodb::bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

/// One record per (owner, flow) and one draft per (owner, flow name).
async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    db.collection::<mongodb::bson::Document>(RECORDS)
        .create_index(unique(doc! { "owner_id": 1, "flow": 1 }), None)
        .await?;
    db.collection::<mongodb::bson::Document>(DRAFTS)
        .create_index(unique(doc! { "owner_id": 1, "flow_name": 1 }), None)
        .await?;
    db.collection::<mongodb::bson::Document>(ADDRESSES)
        .create_index(IndexModel::builder().keys(doc! { "owner_id": 1 }).build(), None)
        .await?;
    Ok(())
}

pub type DbConn = Database;
