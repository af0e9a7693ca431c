// HTTP handlers module for Rivio Core
pub mod analytics;
pub mod auth;
pub mod billing;
pub mod entitlements;
pub mod health;
pub mod history;
pub mod matches;
pub mod me;
pub mod rankings;
pub mod security_headers;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check));
    auth::routes(cfg);
    me::routes(cfg);
    matches::routes(cfg);
    rankings::routes(cfg);
    history::routes(cfg);
    analytics::routes(cfg);
    billing::routes(cfg);
    entitlements::routes(cfg);
}
