use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use log::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use std::sync::Arc;

mod api;
mod blockchain;
mod config;
mod network;
mod node;

use config::NodeConfig;
use network::HttpPeerClient;
use node::Node;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_chain,
        api::handlers::get_transactions,
        api::handlers::create_transaction,
        api::handlers::mine,
        api::handlers::start_mine,
        api::handlers::get_amount,
        api::handlers::consensus,
        api::handlers::create_wallet,
        api::handlers::wallet_transaction
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            blockchain::BlockHash,
            network::ChainResponse,
            api::handlers::TransactionPoolResponse,
            api::handlers::TransactionRequest,
            api::handlers::StatusResponse,
            api::handlers::AmountResponse,
            api::handlers::WalletResponse,
            api::handlers::WalletTransactionRequest
        )
    ),
    tags(
        (name = "ledger", description = "Proof-of-work ledger node endpoints")
    ),
    info(
        title = "Ledger Node API",
        version = "0.1.0",
        description = "A proof-of-work ledger node with longest-chain consensus",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = NodeConfig::parse();
    let port = config.port;

    // The node mines into this wallet
    let miner = blockchain::Wallet::new().context("failed to create miner wallet")?;
    info!("private_key {}", miner.private_key_hex());
    info!("public_key {}", miner.public_key());
    info!("blockchain_address {}", miner.address());

    let client = HttpPeerClient::new(config.peer_timeout()).context("failed to build peer client")?;
    let node = Node::new(config, miner.address(), Arc::new(client));

    let starter = node.clone();
    tokio::spawn(async move { starter.start().await });

    let stopper = node.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutting down background loops");
            stopper.shutdown();
        }
    });

    info!("Starting HTTP server at http://0.0.0.0:{}", port);

    let data = web::Data::new(node);
    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(data.clone())
            .configure(api::configure_routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .bind(("0.0.0.0", port))
    .with_context(|| format!("failed to bind port {}", port))?
    .run()
    .await?;

    Ok(())
}
