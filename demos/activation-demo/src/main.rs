//! Walks a stake-and-weight constraint through its activation transitions.
//!
//! Run with `cargo run -p activation-demo`. Set `RUST_LOG=permgate_network=debug`
//! to also see propagation batches.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use permgate::prelude::*;
use permgate::{console, Fact};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    console::init();

    let provider = Arc::new(InMemoryFactProvider::with_facts([
        Fact::new(FactKey::stake_of("acct1"), 500u128),
        Fact::new(FactKey::weight_set("g", "acct1"), 10u128),
        Fact::new(FactKey::permission_enabled("42"), false),
    ]));
    let service = permgate::start(provider.clone());

    let constraint = Constraint::new(
        "p1",
        BoolExpr::and(
            BoolExpr::comp(CompOp::Gte, NumExpr::stake_of("acct1"), NumExpr::literal(1000)),
            BoolExpr::or(
                BoolExpr::comp(CompOp::Gte, NumExpr::weight_set("g", "acct1"), NumExpr::literal(30)),
                BoolExpr::and(
                    BoolExpr::base(BaseConstraint::permission_enabled("42")),
                    BoolExpr::comp(CompOp::Gt, NumExpr::block_number(), NumExpr::literal(2_000_000)),
                ),
            ),
        ),
    );
    println!("{}", constraint.to_json()?);

    let id = service.add(constraint).await?.constraint_id;
    let mut transitions = service.subscribe_transitions();

    provider.set(FactKey::stake_of("acct1"), 1500u128);
    provider.set(FactKey::weight_set("g", "acct1"), 35u128);

    let record = tokio::time::timeout(Duration::from_secs(2), transitions.recv()).await??;
    println!("{} -> {} at {}", record.from_state, record.to_state, record.at);

    let status = service.check_activation(&id).await?;
    println!("{id}: {}", status.state);
    println!("{}", serde_json::to_string_pretty(&service.get_activations(&id)?)?);
    print!("{}", service.get_network_state().render());
    Ok(())
}
