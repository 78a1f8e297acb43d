use actix_web::error::InternalError;
use actix_web::{web, HttpResponse};
use log::warn;

use super::handlers::{self, StatusResponse};

/// Malformed JSON bodies get the same `fail` reply as rejected transactions
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        warn!("ERROR: bad request body: {}", err);
        InternalError::from_response(err, HttpResponse::BadRequest().json(StatusResponse::fail()))
            .into()
    })
}

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/", web::get().to(handlers::get_chain))
        .service(
            web::resource("/transactions")
                .route(web::get().to(handlers::get_transactions))
                .route(web::post().to(handlers::create_transaction)),
        )
        .route("/mine", web::get().to(handlers::mine))
        .route("/mine/start", web::get().to(handlers::start_mine))
        .route("/amount", web::get().to(handlers::get_amount))
        .route("/consensus", web::put().to(handlers::consensus))
        .route("/wallet", web::post().to(handlers::create_wallet))
        .route("/wallet/transaction", web::post().to(handlers::wallet_transaction));
}
