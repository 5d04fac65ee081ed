//! Tests for fee estimation, transaction tracking, ENS and simulation

mod common;

use common::*;
use ethers::abi::Token;
use ethers::types::U256;
use serde_json::json;

use evm_wallet_mcp::blockchain::{
    error::ClientError,
    models::{ChainReceipt, ChainTransaction, TransactionStatus},
    services::transactions::ContractTarget,
    wallet_store::MOCK_ADDRESSES,
};

const TOKEN: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

fn transfer_args() -> Vec<serde_json::Value> {
    vec![json!(SECOND_ADDRESS), json!("1000")]
}

fn transfer_target(args: &[serde_json::Value]) -> ContractTarget<'_> {
    ContractTarget {
        contract: "erc20",
        address: Some(TOKEN),
        function: "transfer",
        args,
    }
}

#[tokio::test]
async fn gas_cost_is_exact() {
    let h = harness();
    let fees = h
        .container
        .transactions()
        .estimate_gas(SECOND_ADDRESS, Some("1"), None, Some(DEV_ADDRESS))
        .await
        .unwrap();
    assert_eq!(fees.estimated_gas, U256::from(21_000u64));
    assert_eq!(fees.gas_price, U256::from(20_000_000_000u64));
    assert_eq!(fees.total_fee, U256::from(420_000_000_000_000u64));
    assert_eq!(fees.total_fee_formatted, "0.00042");
    assert_eq!(fees.denom, "ETH");

    let rendered = serde_json::to_value(&fees).unwrap();
    assert_eq!(rendered["totalFee"], "420000000000000");
    assert_eq!(rendered["totalFeeFormatted"], "0.00042");
}

#[tokio::test]
async fn estimate_needs_a_sender() {
    let h = harness();
    let txs = h.container.transactions();
    assert!(txs
        .estimate_gas(SECOND_ADDRESS, None, None, None)
        .await
        .unwrap_err()
        .is_validation());

    h.container.wallet().connect_wallet(MOCK_ADDRESSES[0]).await.unwrap();
    assert!(txs.estimate_gas(SECOND_ADDRESS, None, Some("0x"), None).await.is_ok());
    assert!(txs
        .estimate_gas(SECOND_ADDRESS, Some("-1"), None, None)
        .await
        .unwrap_err()
        .is_validation());
}

#[tokio::test]
async fn status_walks_through_three_states() {
    let h = harness();
    let txs = h.container.transactions();
    let unknown = txs.get_transaction_status(&hash_str(1)).await.unwrap();
    assert_eq!(unknown, TransactionStatus::NotFound { hash: hash_str(1) });
    assert_eq!(serde_json::to_value(&unknown).unwrap()["status"], "not_found");

    let mut tx = ChainTransaction {
        hash: hash(2),
        block_number: None,
        from: addr(DEV_ADDRESS),
        to: Some(addr(SECOND_ADDRESS)),
        value: U256::one(),
    };
    h.client.transactions.lock().unwrap().insert(hash(2), tx.clone());
    assert_eq!(
        txs.get_transaction_status(&hash_str(2)).await.unwrap(),
        TransactionStatus::Pending { hash: hash_str(2) }
    );

    tx.block_number = Some(42);
    h.client.transactions.lock().unwrap().insert(hash(2), tx);
    let confirmed = txs.get_transaction_status(&hash_str(2)).await.unwrap();
    assert_eq!(
        confirmed,
        TransactionStatus::Confirmed {
            hash: hash_str(2),
            block_number: 42
        }
    );
    let rendered = serde_json::to_value(&confirmed).unwrap();
    assert_eq!(rendered["status"], "confirmed");
    assert_eq!(rendered["blockNumber"], 42);
}

#[tokio::test]
async fn status_propagates_transport_failures() {
    let h = harness();
    *h.client.transport_failure.lock().unwrap() = Some("timeout".to_string());
    let err = h
        .container
        .transactions()
        .get_transaction_status(&hash_str(1))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "timeout");
}

#[tokio::test]
async fn malformed_hash_is_rejected() {
    let h = harness();
    assert!(h
        .container
        .transactions()
        .get_transaction_status("0x1234")
        .await
        .unwrap_err()
        .is_validation());
}

#[tokio::test]
async fn receipt_is_none_until_mined() {
    let h = harness();
    let txs = h.container.transactions();
    assert!(txs.get_transaction_receipt(&hash_str(3)).await.unwrap().is_none());

    h.client.receipts.lock().unwrap().insert(
        hash(3),
        ChainReceipt {
            transaction_hash: hash(3),
            block_number: Some(7),
            from: addr(DEV_ADDRESS),
            to: Some(addr(SECOND_ADDRESS)),
            contract_address: None,
            gas_used: U256::from(21_000u64),
            effective_gas_price: U256::from(20_000_000_000u64),
            status: Some(1),
        },
    );
    let receipt = txs.get_transaction_receipt(&hash_str(3)).await.unwrap().unwrap();
    assert_eq!(receipt.success, Some(true));
    assert_eq!(receipt.cost, U256::from(420_000_000_000_000u64));
    assert_eq!(receipt.cost_formatted, "0.00042");
    assert_eq!(receipt.symbol, "ETH");
    assert_eq!(receipt.from, DEV_ADDRESS);
}

#[tokio::test]
async fn ens_requires_mainnet() {
    let h = harness();
    h.container.wallet().switch_chain(10).await.unwrap();
    let err = h
        .container
        .transactions()
        .resolve_ens_name("vitalik.eth")
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert_eq!(h.factory.fresh_count(), 0);
}

#[tokio::test]
async fn ens_uses_a_fresh_mainnet_client() {
    let h = harness();
    h.client
        .ens
        .lock()
        .unwrap()
        .insert("vitalik.eth".to_string(), addr(SECOND_ADDRESS));

    let txs = h.container.transactions();
    let resolved = txs.resolve_ens_name("vitalik.eth").await.unwrap();
    assert_eq!(resolved.address.as_deref(), Some(SECOND_ADDRESS));
    let missing = txs.resolve_ens_name("nobody.eth").await.unwrap();
    assert!(missing.address.is_none());

    assert_eq!(h.factory.fresh_count(), 2);
    assert_eq!(*h.factory.fresh_chain_ids.lock().unwrap(), vec![1, 1]);
}

#[tokio::test]
async fn successful_simulation_decodes_output() {
    let h = harness();
    h.container.wallet().connect_wallet(MOCK_ADDRESSES[0]).await.unwrap();
    h.client.respond("transfer", Ok(vec![Token::Bool(true)]));

    let args = transfer_args();
    let sim = h
        .container
        .transactions()
        .simulate_transaction(transfer_target(&args), Some("0"))
        .await
        .unwrap();
    assert!(sim.success);
    assert!(!sim.will_revert);
    assert_eq!(sim.result, Some(json!(true)));
    assert_eq!(sim.contract, TOKEN);

    let calls = h.client.calls.lock().unwrap();
    assert_eq!(calls[0].from, Some(addr(MOCK_ADDRESSES[0])));
    assert_eq!(calls[0].args[1], Token::Uint(U256::from(1000u64)));
}

#[tokio::test]
async fn revert_marker_sets_will_revert() {
    let h = harness();
    let args = transfer_args();
    let txs = h.container.transactions();

    h.client.respond(
        "transfer",
        Err(ClientError::Transport(
            "execution reverted: ERC20: transfer amount exceeds balance".to_string(),
        )),
    );
    let sim = txs.simulate_transaction(transfer_target(&args), None).await.unwrap();
    assert!(!sim.success);
    assert!(sim.will_revert);
    assert!(sim.error.unwrap().contains("exceeds balance"));

    h.client.respond("transfer", Err(ClientError::Reverted("0x08c379a0".to_string())));
    let sim = txs.simulate_transaction(transfer_target(&args), None).await.unwrap();
    assert!(sim.will_revert);
}

#[tokio::test]
async fn transport_failure_is_not_a_revert() {
    let h = harness();
    let args = transfer_args();
    h.client
        .respond("transfer", Err(ClientError::Transport("connection refused".to_string())));
    let sim = h
        .container
        .transactions()
        .simulate_transaction(transfer_target(&args), None)
        .await
        .unwrap();
    assert!(!sim.success);
    assert!(!sim.will_revert);
}

#[tokio::test]
async fn unknown_function_is_not_found() {
    let h = harness();
    let err = h
        .container
        .transactions()
        .simulate_transaction(
            ContractTarget {
                contract: "erc20",
                address: Some(TOKEN),
                function: "mint",
                args: &[],
            },
            None,
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(h.client.calls.lock().unwrap().is_empty());
}
