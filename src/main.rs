#[macro_use]
extern crate rocket;

mod config;
mod db;
mod guards;
mod models;
mod routes;
mod services;
mod utils;
mod verification;

use dotenvy::dotenv;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;
use rocket::serde::json::{json, Value};
use rocket::{Build, Request, Response, Rocket};
use rocket_okapi::openapi_get_routes;
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};

/* ----------------------------- CORS ----------------------------- */

pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        if let Some(origin) = request.headers().get_one("Origin") {
            response.set_header(Header::new("Access-Control-Allow-Origin", origin));
        }

        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, DELETE, OPTIONS",
        ));

        response.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));

        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

/* ----------------------------- OPTIONS ----------------------------- */

#[options("/<_..>")]
fn options_handler() {}

/* ----------------------------- ERRORS ----------------------------- */

fn envelope(message: &str) -> Value {
    json!({ "success": false, "message": message })
}

#[catch(401)]
fn unauthorized() -> Value {
    envelope("Missing or invalid bearer token")
}

#[catch(403)]
fn forbidden() -> Value {
    envelope("Not allowed for this account")
}

#[catch(404)]
fn not_found() -> Value {
    envelope("Resource not found (check /api/v1 prefix)")
}

#[catch(422)]
fn unprocessable() -> Value {
    envelope("Request body does not match the expected shape")
}

#[catch(500)]
fn internal_error() -> Value {
    envelope("Internal server error")
}

/* ----------------------------- SWAGGER ----------------------------- */

fn swagger_config() -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: "/api/v1/openapi.json".to_string(),
        ..Default::default()
    }
}

/* ----------------------------- LAUNCH ----------------------------- */

#[launch]
fn rocket() -> Rocket<Build> {
    dotenv().ok();
    env_logger::init();

    if !config::Config::is_registry_enabled() {
        log::warn!("registry_base_url not set: field confirmation will answer 503");
    }
    log::info!("Bazaar onboarding API starting; Swagger UI at /api/docs");

    rocket::build()
        .attach(db::init())
        .attach(CORS)
        .mount("/", routes![options_handler])
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Verification wizard
                routes::verification::get_verification,
                routes::verification::get_step,
                routes::verification::save_step,
                routes::verification::next_step,
                routes::verification::previous_step,
                routes::verification::jump_to_step,
                routes::verification::submit_verification,
                routes::verification::check_field,
                routes::verification::confirm_field,
                // Admin review
                routes::admin::list_verifications,
                routes::admin::get_for_review,
                routes::admin::mark_reviewed,
                routes::admin::verify_document,
                routes::admin::unverify_document,
                // Addresses
                routes::address::list_addresses,
                routes::address::create_address,
                routes::address::update_address,
                routes::address::delete_address,
                routes::address::set_default_address,
                // Drafts
                routes::draft::get_draft,
                routes::draft::save_draft,
                routes::draft::delete_draft,
            ],
        )
        .mount("/api/docs", make_swagger_ui(&swagger_config()))
        .register("/", catchers![unauthorized, forbidden, not_found, unprocessable, internal_error])
}
