//! # Integration Test Flows
//!
//! Tests that the transfer engine, delegated-call engine, fee ledger, and
//! access control work together correctly through the public `RelayApi`.
//!
//! ## Flows Tested:
//!
//! 1. **Operator lifecycle**: fee setup → paid batch → withdrawal → two-phase handoff
//! 2. **Hostile registry**: a failing probe mid-batch rolls the whole invocation back
//! 3. **Dyn-dispatch multicall**: tolerant and value-forwarding batches via `Arc<dyn RelayApi>`
//! 4. **Pause window**: transfers gated, operator dispatch unaffected

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use batch_relay::prelude::*;
    use batch_relay::service::create_test_service;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const ENGINE: u8 = 0xee;
    const OPERATOR: u8 = 0x01;
    const USER: u8 = 0x10;
    const RECIPIENT: u8 = 0x20;
    const REGISTRY: u8 = 0x30;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    /// Engine over a world with one registry, `items` items owned by the
    /// user, and funded user/operator accounts.
    fn fixture(items: u64) -> (Arc<RelayService<InMemoryWorld>>, Arc<InMemoryWorld>) {
        let (service, world) = create_test_service(addr(ENGINE), addr(OPERATOR));
        world.register_registry(addr(REGISTRY));
        for item in 0..items {
            world.mint(addr(REGISTRY), U256::from(item), addr(USER));
        }
        world.set_balance(addr(USER), U256::from(10_000));
        world.set_balance(addr(OPERATOR), U256::from(10_000));
        (Arc::new(service), world)
    }

    fn request(items: u64) -> TransferRequest {
        TransferRequest {
            registries: vec![addr(REGISTRY); items as usize],
            item_ids: (0..items).map(U256::from).collect(),
            recipient: addr(RECIPIENT),
            deadline: 1_000,
        }
    }

    fn user_ctx(value: u64) -> CallContext {
        CallContext::new(addr(USER))
            .with_value(U256::from(value))
            .at_time(1_000)
    }

    fn operator_ctx(value: u64) -> CallContext {
        CallContext::new(addr(OPERATOR)).with_value(U256::from(value))
    }

    // =============================================================================
    // FLOW 1: OPERATOR LIFECYCLE
    // =============================================================================

    #[tokio::test]
    async fn test_fee_batch_withdraw_handoff_lifecycle() {
        let (service, world) = fixture(2);

        // Operator prices the service.
        service
            .set_fee(&operator_ctx(0), U256::from(25))
            .await
            .unwrap();

        // User pays fee + 75 excess for a two-item batch.
        let receipt = service
            .send_batch(&user_ctx(100), &request(2))
            .await
            .unwrap();
        assert!(check_transfer_completeness(&request(2), &receipt));
        assert_eq!(receipt.refunded, U256::from(75));
        assert_eq!(
            world.owner_of(addr(REGISTRY), U256::from(1)),
            Some(addr(RECIPIENT))
        );
        // Net user spend is exactly the fee.
        assert_eq!(world.balance_of(addr(USER)), U256::from(9_975));

        // Operator drains the collected fee.
        service
            .withdraw(&operator_ctx(0), U256::from(25))
            .await
            .unwrap();
        assert_eq!(world.balance_of(addr(OPERATOR)), U256::from(10_025));
        assert_eq!(service.status().await.collected, U256::zero());

        // Two-phase handoff to a new operator.
        let successor = addr(0x02);
        service
            .propose_handoff(&operator_ctx(0), successor)
            .await
            .unwrap();
        service
            .accept_handoff(&CallContext::new(successor))
            .await
            .unwrap();

        // The old operator lost its privileges; the new one has them.
        assert!(matches!(
            service.set_fee(&operator_ctx(0), U256::from(1)).await,
            Err(EngineError::Access(AccessError::NotOperator { .. }))
        ));
        assert!(service
            .set_fee(&CallContext::new(successor), U256::from(1))
            .await
            .is_ok());
    }

    // =============================================================================
    // FLOW 2: HOSTILE REGISTRY ROLLS THE BATCH BACK
    // =============================================================================

    #[tokio::test]
    async fn test_hostile_registry_mid_batch_rolls_back_everything() {
        let (service, world) = fixture(3);
        service
            .set_fee(&operator_ctx(0), U256::from(25))
            .await
            .unwrap();

        // A second registry whose probe throws, holding the middle item.
        let hostile = addr(0x31);
        world.make_probe_fail(hostile);
        world.mint(hostile, U256::from(99), addr(USER));

        let mixed = TransferRequest {
            registries: vec![addr(REGISTRY), hostile, addr(REGISTRY)],
            item_ids: vec![U256::from(0), U256::from(99), U256::from(2)],
            recipient: addr(RECIPIENT),
            deadline: 1_000,
        };

        let err = service.send_batch(&user_ctx(25), &mixed).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Transfer(TransferError::InterfaceCheckFailed { registry })
                if registry == hostile
        ));

        // Item 0 moved before the probe failure, then rolled back with it.
        assert_eq!(world.owner_of(addr(REGISTRY), U256::zero()), Some(addr(USER)));
        // No fee kept, payment returned in full.
        assert_eq!(service.status().await.collected, U256::zero());
        assert_eq!(world.balance_of(addr(USER)), U256::from(10_000));
    }

    // =============================================================================
    // FLOW 3: MULTICALL THROUGH THE API TRAIT OBJECT
    // =============================================================================

    #[tokio::test]
    async fn test_multicall_flows_via_dyn_api() {
        let (service, world) = fixture(0);
        world.script_target(
            addr(0x50),
            TargetScript::Succeed {
                output: Bytes::from_slice(&[0x42]),
            },
        );
        world.script_target(
            addr(0x51),
            TargetScript::Fail {
                output: Bytes::from_slice(&[0xff]),
            },
        );

        let api: Arc<dyn RelayApi> = service;

        // Tolerant batch: the flagged failure lands in its slot.
        let tolerant = [
            TolerantCall {
                target: addr(0x50),
                allow_failure: false,
                payload: Bytes::new(),
            },
            TolerantCall {
                target: addr(0x51),
                allow_failure: true,
                payload: Bytes::new(),
            },
        ];
        let receipt = api
            .execute_all_tolerant(&operator_ctx(0), &tolerant)
            .await
            .unwrap();
        assert!(check_result_alignment(2, &receipt));
        assert_eq!(receipt.outcomes[0].output.as_slice(), &[0x42]);
        assert!(!receipt.outcomes[1].success);

        // Value batch: exact payment, value lands on the target.
        let valued = [ValueCall {
            target: addr(0x50),
            allow_failure: false,
            value: U256::from(500),
            payload: Bytes::new(),
        }];
        let receipt = api
            .execute_all_tolerant_with_value(&operator_ctx(500), &valued)
            .await
            .unwrap();
        assert!(check_value_conservation(U256::from(500), &receipt));
        assert_eq!(world.balance_of(addr(0x50)), U256::from(500));

        // Inexact payment never commits.
        assert!(matches!(
            api.execute_all_tolerant_with_value(&operator_ctx(501), &valued)
                .await,
            Err(EngineError::Multicall(MulticallError::ValueMismatch { .. }))
        ));
        assert_eq!(world.balance_of(addr(0x50)), U256::from(500));
    }

    // =============================================================================
    // FLOW 4: PAUSE WINDOW
    // =============================================================================

    #[tokio::test]
    async fn test_pause_window_gates_transfers_only() {
        let (service, _world) = fixture(1);

        service.pause(&operator_ctx(0)).await.unwrap();

        assert!(matches!(
            service.send_batch(&user_ctx(0), &request(1)).await,
            Err(EngineError::Paused)
        ));

        // Operator dispatch is not pause-gated.
        let calls = [Call {
            target: addr(0x50),
            payload: Bytes::new(),
        }];
        assert!(service.execute_all(&operator_ctx(0), &calls).await.is_ok());

        // The same transfer goes through after unpausing.
        service.unpause(&operator_ctx(0)).await.unwrap();
        let receipt = service.send_batch(&user_ctx(0), &request(1)).await.unwrap();
        assert_eq!(receipt.transferred.len(), 1);
    }
}
