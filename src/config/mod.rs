use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use rocket::Config as RocketConfig;
use std::env;

pub struct Config;

impl Config {
    fn figment() -> Figment {
        // Get the current profile
        let profile = env::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string());

        Figment::from(RocketConfig::default())
            .merge(Toml::file("Rocket.toml").nested())
            .select(&profile)
            // ROCKET_JWT_SECRET -> jwt_secret
            .merge(Env::prefixed("ROCKET_").ignore(&["PROFILE"]).global())
    }

    pub fn jwt_secret() -> String {
        Self::figment()
            .extract_inner("jwt_secret")
            .unwrap_or_else(|_| "default-secret".to_string())
    }

    pub fn jwt_expiry() -> i64 {
        Self::figment()
            .extract_inner("jwt_expiry")
            .unwrap_or(900)
    }

    pub fn mongodb_uri() -> String {
        Self::figment()
            .extract_inner("mongodb_uri")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string())
    }

    pub fn mongodb_database() -> String {
        Self::figment()
            .extract_inner("mongodb_database")
            .unwrap_or_else(|_| "bazaar-onboarding".to_string())
    }

    pub fn registry_base_url() -> Option<String> {
        Self::figment()
            .extract_inner::<String>("registry_base_url")
            .ok()
            .filter(|url| !url.trim().is_empty())
    }

    pub fn registry_api_key() -> Option<String> {
        Self::figment()
            .extract_inner("registry_api_key")
            .ok()
    }

    pub fn registry_timeout_secs() -> u64 {
        Self::figment()
            .extract_inner("registry_timeout_secs")
            .unwrap_or(10)
    }

    pub fn is_registry_enabled() -> bool {
        Self::registry_base_url().is_some()
    }

    pub fn draft_ttl_hours() -> i64 {
        Self::figment()
            .extract_inner("draft_ttl_hours")
            .unwrap_or(72)
    }
}
