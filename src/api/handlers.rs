use actix_web::{web, HttpResponse, Responder};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::{IntoParams, ToSchema};

use crate::blockchain::crypto::{validate_address, CryptoError};
use crate::blockchain::{PublicKey, Signature, Transaction, TransactionError, Wallet};
use crate::network::ChainResponse;
use crate::node::Node;

/// Shared node handle
pub type NodeData = web::Data<Node>;

/// Why a transaction request was turned away
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// `{"message": "success" | "fail"}`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    /// The message
    pub message: String,
}

impl StatusResponse {
    pub fn success() -> Self {
        StatusResponse {
            message: "success".to_string(),
        }
    }

    pub fn fail() -> Self {
        StatusResponse {
            message: "fail".to_string(),
        }
    }
}

/// Response for the transaction pool endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionPoolResponse {
    /// Pending transactions
    pub transactions: Vec<Transaction>,

    /// Number of pending transactions
    pub length: usize,
}

/// Request for the transaction endpoint. Every field is required.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    pub sender_blockchain_address: Option<String>,
    pub receiver_blockchain_address: Option<String>,

    /// Hex `X || Y` coordinates of the sender's P-256 key
    pub sender_public_key: Option<String>,

    pub value: Option<f64>,

    /// Hex `r || s` signature over the canonical transaction
    pub signature: Option<String>,
}

impl TransactionRequest {
    /// Checks every field is present and submits the transaction
    fn submit(&self, node: &Node) -> Result<(), RequestError> {
        let sender = required(&self.sender_blockchain_address, "sender_blockchain_address")?;
        let recipient = required(&self.receiver_blockchain_address, "receiver_blockchain_address")?;
        let public_key = required(&self.sender_public_key, "sender_public_key")?;
        let value = self.value.ok_or(RequestError::MissingField("value"))?;
        let signature = required(&self.signature, "signature")?;
        check_recipient(recipient)?;

        let public_key = PublicKey::from_hex(public_key)?;
        let signature = Signature::from_hex(signature)?;

        node.blockchain()
            .add_transaction(sender, recipient, value, Some(&public_key), Some(&signature))?;
        Ok(())
    }
}

fn required<'a>(field: &'a Option<String>, name: &'static str) -> Result<&'a str, RequestError> {
    field.as_deref().ok_or(RequestError::MissingField(name))
}

/// Rejects recipients whose version byte or checksum does not hold
fn check_recipient(recipient: &str) -> Result<(), RequestError> {
    if validate_address(recipient) {
        Ok(())
    } else {
        Err(RequestError::InvalidRecipient(recipient.to_string()))
    }
}

/// Query for the amount endpoint
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AmountQuery {
    /// Address whose balance is requested
    pub blockchin_address: Option<String>,
}

/// Response for the amount endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AmountResponse {
    /// Committed balance
    pub amount: f64,
}

/// Response for the create wallet endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    /// The wallet's private key (hex encoded)
    pub private_key: String,

    /// The wallet's public key (hex `X || Y`)
    pub public_key: String,

    /// The wallet's address
    pub blockchain_address: String,
}

/// Request for the wallet transaction endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WalletTransactionRequest {
    /// The sender's private key (hex), used for signing only
    pub sender_private_key: String,
    pub sender_blockchain_address: String,
    pub recipient_blockchain_address: String,
    pub value: f64,
}

impl WalletTransactionRequest {
    /// Signs the transaction with the sender's private key and submits it
    fn sign_and_submit(&self, node: &Node) -> Result<(), RequestError> {
        check_recipient(&self.recipient_blockchain_address)?;
        let wallet = Wallet::from_private_key_hex(&self.sender_private_key)?;

        let transaction = Transaction::new(
            self.sender_blockchain_address.as_str(),
            self.recipient_blockchain_address.as_str(),
            self.value,
        );
        let signature = transaction.sign(&wallet);

        node.blockchain().add_transaction(
            &transaction.sender,
            &transaction.recipient,
            transaction.value,
            Some(wallet.public_key()),
            Some(&signature),
        )?;
        Ok(())
    }
}

/// Get the full blockchain
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(node: NodeData) -> impl Responder {
    let chain = node.blockchain().chain();

    HttpResponse::Ok().json(ChainResponse {
        blocks: chain.to_vec(),
    })
}

/// Get all pending transactions
#[utoipa::path(
    get,
    path = "/transactions",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = TransactionPoolResponse)
    )
)]
pub async fn get_transactions(node: NodeData) -> impl Responder {
    let transactions = node.blockchain().transaction_pool();

    HttpResponse::Ok().json(TransactionPoolResponse {
        length: transactions.len(),
        transactions,
    })
}

/// Submit a signed transaction
///
/// The transaction enters the pool if the signature matches the sender
/// address and the sender's committed balance covers the value
#[utoipa::path(
    post,
    path = "/transactions",
    request_body = TransactionRequest,
    responses(
        (status = 200, description = "Transaction added to the pool", body = StatusResponse),
        (status = 400, description = "Missing field, bad address, bad signature or insufficient funds",
            body = StatusResponse)
    )
)]
pub async fn create_transaction(
    node: NodeData,
    request: web::Json<TransactionRequest>,
) -> impl Responder {
    match request.submit(&node) {
        Ok(()) => HttpResponse::Ok().json(StatusResponse::success()),
        Err(err) => {
            warn!("ERROR: transaction rejected: {}", err);
            HttpResponse::BadRequest().json(StatusResponse::fail())
        }
    }
}

/// Mine one block now
#[utoipa::path(
    get,
    path = "/mine",
    responses(
        (status = 200, description = "success if a block was mined, fail if the pool was empty", body = StatusResponse)
    )
)]
pub async fn mine(node: NodeData) -> impl Responder {
    if node.mine().await {
        HttpResponse::Ok().json(StatusResponse::success())
    } else {
        HttpResponse::Ok().json(StatusResponse::fail())
    }
}

/// Start the periodic mining loop
#[utoipa::path(
    get,
    path = "/mine/start",
    responses(
        (status = 200, description = "Mining loop running", body = StatusResponse)
    )
)]
pub async fn start_mine(node: NodeData) -> impl Responder {
    node.start_mining();
    HttpResponse::Ok().json(StatusResponse::success())
}

/// Get the committed balance of an address
#[utoipa::path(
    get,
    path = "/amount",
    params(AmountQuery),
    responses(
        (status = 200, description = "Balance computed from the committed chain", body = AmountResponse),
        (status = 400, description = "Missing address", body = StatusResponse)
    )
)]
pub async fn get_amount(node: NodeData, query: web::Query<AmountQuery>) -> impl Responder {
    match query.blockchin_address.as_deref() {
        Some(address) => HttpResponse::Ok().json(AmountResponse {
            amount: node.blockchain().calculate_total_amount(address),
        }),
        None => {
            warn!("ERROR: missing blockchin_address");
            HttpResponse::BadRequest().json(StatusResponse::fail())
        }
    }
}

/// Resolve conflicts against every neighbor
#[utoipa::path(
    put,
    path = "/consensus",
    responses(
        (status = 200, description = "success if the local chain was replaced, otherwise fail", body = StatusResponse)
    )
)]
pub async fn consensus(node: NodeData) -> impl Responder {
    if node.resolve_conflicts().await {
        HttpResponse::Ok().json(StatusResponse::success())
    } else {
        HttpResponse::Ok().json(StatusResponse::fail())
    }
}

/// Create a new wallet
///
/// The private key is returned once and never stored by the node
#[utoipa::path(
    post,
    path = "/wallet",
    responses(
        (status = 200, description = "Wallet created successfully", body = WalletResponse),
        (status = 500, description = "Key generation failed", body = StatusResponse)
    )
)]
pub async fn create_wallet() -> impl Responder {
    match Wallet::new() {
        Ok(wallet) => HttpResponse::Ok().json(WalletResponse {
            private_key: wallet.private_key_hex(),
            public_key: wallet.public_key().to_hex(),
            blockchain_address: wallet.address().to_string(),
        }),
        Err(err) => {
            error!("Failed to create wallet: {}", err);
            HttpResponse::InternalServerError().json(StatusResponse::fail())
        }
    }
}

/// Sign a transaction with the given private key and submit it
#[utoipa::path(
    post,
    path = "/wallet/transaction",
    request_body = WalletTransactionRequest,
    responses(
        (status = 200, description = "Transaction signed and added to the pool", body = StatusResponse),
        (status = 400, description = "Bad key or transaction rejected", body = StatusResponse)
    )
)]
pub async fn wallet_transaction(
    node: NodeData,
    request: web::Json<WalletTransactionRequest>,
) -> impl Responder {
    match request.sign_and_submit(&node) {
        Ok(()) => {
            info!("wallet transaction from {} accepted", request.sender_blockchain_address);
            HttpResponse::Ok().json(StatusResponse::success())
        }
        Err(err) => {
            warn!("ERROR: wallet transaction rejected: {}", err);
            HttpResponse::BadRequest().json(StatusResponse::fail())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::configure_routes;
    use crate::blockchain::MINING_SENDER;
    use crate::config::NodeConfig;
    use crate::network::HttpPeerClient;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use clap::Parser;

    use std::sync::Arc;
    use std::time::Duration;

    fn test_node() -> Node {
        let config = NodeConfig::parse_from(["pow_ledger", "--mining-difficulty", "2"]);
        let client = HttpPeerClient::new(Duration::from_millis(100)).unwrap();
        Node::new(config, "miner", Arc::new(client))
    }

    fn fund(node: &Node, address: &str, value: f64) {
        node.blockchain()
            .add_transaction(MINING_SENDER, address, value, None, None)
            .unwrap();
        node.blockchain().mining().unwrap();
    }

    fn signed_request(wallet: &Wallet, recipient: &str, value: f64) -> TransactionRequest {
        let transaction = Transaction::new(wallet.address(), recipient, value);

        TransactionRequest {
            sender_blockchain_address: Some(wallet.address().to_string()),
            receiver_blockchain_address: Some(recipient.to_string()),
            sender_public_key: Some(wallet.public_key().to_hex()),
            value: Some(value),
            signature: Some(transaction.sign(wallet).to_hex()),
        }
    }

    /// Flips the last character of an address to another Base58 digit
    fn corrupt(address: &str) -> String {
        let mut chars: Vec<char> = address.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '2' { '3' } else { '2' };
        chars.into_iter().collect()
    }

    #[actix_web::test]
    async fn test_get_chain() {
        let node = test_node();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(node.clone()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/").to_request();
        let body: ChainResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.blocks.len(), 1);
        assert_eq!(body.blocks[0], node.blockchain().chain()[0]);
    }

    #[actix_web::test]
    async fn test_post_transaction_then_list_pool() {
        let node = test_node();
        let alice = Wallet::new().unwrap();
        let bob = Wallet::new().unwrap();
        fund(&node, alice.address(), 2.0);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(node.clone()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/transactions")
            .set_json(signed_request(&alice, bob.address(), 1.5))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: StatusResponse = test::read_body_json(resp).await;
        assert_eq!(body.message, "success");

        let req = test::TestRequest::get().uri("/transactions").to_request();
        let body: TransactionPoolResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.length, 1);
        assert_eq!(
            body.transactions[0],
            Transaction::new(alice.address(), bob.address(), 1.5)
        );
    }

    #[actix_web::test]
    async fn test_post_transaction_failures() {
        let node = test_node();
        let alice = Wallet::new().unwrap();
        let bob = Wallet::new().unwrap();
        fund(&node, alice.address(), 1.0);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(node.clone()))
                .configure(configure_routes),
        )
        .await;

        let mut missing = signed_request(&alice, bob.address(), 0.5);
        missing.signature = None;

        let mut tampered = signed_request(&alice, bob.address(), 0.5);
        tampered.value = Some(0.9);

        let overdrawn = signed_request(&alice, bob.address(), 5.0);

        for request in [missing, tampered, overdrawn] {
            let req = test::TestRequest::post()
                .uri("/transactions")
                .set_json(request)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: StatusResponse = test::read_body_json(resp).await;
            assert_eq!(body.message, "fail");
        }

        let req = test::TestRequest::post()
            .uri("/transactions")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: StatusResponse = test::read_body_json(resp).await;
        assert_eq!(body.message, "fail");

        assert!(node.blockchain().transaction_pool().is_empty());
    }

    #[actix_web::test]
    async fn test_post_transaction_to_corrupted_address_fails() {
        let node = test_node();
        let alice = Wallet::new().unwrap();
        let bob = Wallet::new().unwrap();
        fund(&node, alice.address(), 1.0);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(node.clone()))
                .configure(configure_routes),
        )
        .await;

        // Correctly signed, but the recipient's checksum no longer holds
        let typo = corrupt(bob.address());
        let req = test::TestRequest::post()
            .uri("/transactions")
            .set_json(signed_request(&alice, &typo, 0.5))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: StatusResponse = test::read_body_json(resp).await;
        assert_eq!(body.message, "fail");

        let req = test::TestRequest::post()
            .uri("/transactions")
            .set_json(signed_request(&alice, "bob", 0.5))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        assert!(node.blockchain().transaction_pool().is_empty());
    }

    #[actix_web::test]
    async fn test_mine_and_amount() {
        let node = test_node();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(node.clone()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/mine").to_request();
        let body: StatusResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.message, "fail");

        node.blockchain()
            .add_transaction(MINING_SENDER, "alice", 3.0, None, None)
            .unwrap();
        let req = test::TestRequest::get().uri("/mine").to_request();
        let body: StatusResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.message, "success");

        let req = test::TestRequest::get()
            .uri("/amount?blockchin_address=alice")
            .to_request();
        let body: AmountResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.amount, 3.0);

        let req = test::TestRequest::get().uri("/amount").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_consensus_without_neighbors_fails() {
        let node = test_node();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(node.clone()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::put().uri("/consensus").to_request();
        let body: StatusResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.message, "fail");
        assert_eq!(node.blockchain().chain().len(), 1);
    }

    #[actix_web::test]
    async fn test_wallet_create_and_spend() {
        let node = test_node();
        let bob = Wallet::new().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(node.clone()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post().uri("/wallet").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let wallet: WalletResponse = test::read_body_json(resp).await;
        assert_eq!(
            Wallet::from_private_key_hex(&wallet.private_key).unwrap().address(),
            wallet.blockchain_address
        );

        fund(&node, &wallet.blockchain_address, 1.0);

        let req = test::TestRequest::post()
            .uri("/wallet/transaction")
            .set_json(WalletTransactionRequest {
                sender_private_key: wallet.private_key.clone(),
                sender_blockchain_address: wallet.blockchain_address.clone(),
                recipient_blockchain_address: bob.address().to_string(),
                value: 0.25,
            })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        // Someone else's key cannot spend from this address
        let thief = Wallet::new().unwrap();
        let req = test::TestRequest::post()
            .uri("/wallet/transaction")
            .set_json(WalletTransactionRequest {
                sender_private_key: thief.private_key_hex(),
                sender_blockchain_address: wallet.blockchain_address.clone(),
                recipient_blockchain_address: thief.address().to_string(),
                value: 0.25,
            })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/wallet/transaction")
            .set_json(WalletTransactionRequest {
                sender_private_key: wallet.private_key.clone(),
                sender_blockchain_address: wallet.blockchain_address.clone(),
                recipient_blockchain_address: corrupt(bob.address()),
                value: 0.25,
            })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        assert_eq!(node.blockchain().transaction_pool().len(), 1);
    }

    #[actix_web::test]
    async fn test_start_mine_reports_success() {
        let node = test_node();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(node.clone()))
                .configure(configure_routes),
        )
        .await;

        for _ in 0..2 {
            let req = test::TestRequest::get().uri("/mine/start").to_request();
            let body: StatusResponse = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body.message, "success");
        }

        node.shutdown();
    }
}
