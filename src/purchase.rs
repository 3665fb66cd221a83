use crate::{
    api::{
        AccountApi,
        ApiError,
        PurchaseRequest,
    },
    config::UPGRADE_COST,
    scheduler::refresh_snapshot,
    snapshot::AccountSnapshot,
    store::{
        Clock,
        StateStore,
    },
};
use std::sync::Arc;
use tracing::{
    info,
    warn,
};

/// Number of upgrade units the droplet balance can pay for.
pub fn amount_to_buy(snapshot: &AccountSnapshot) -> u64 {
    snapshot.droplets / UPGRADE_COST
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PurchaseOutcome {
    /// `refreshed` is false when the follow-up status fetch failed
    Purchased { amount: u64, refreshed: bool },
    Rejected { status: u16 },
    NothingAffordable,
}

pub struct PurchaseFlow<A> {
    api: Arc<A>,
    store: StateStore,
    clock: Arc<dyn Clock>,
}

impl<A> Clone for PurchaseFlow<A> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            store: self.store.clone(),
            clock: self.clock.clone(),
        }
    }
}

impl<A: AccountApi> PurchaseFlow<A> {
    pub fn new(api: Arc<A>, store: StateStore, clock: Arc<dyn Clock>) -> Self {
        Self { api, store, clock }
    }

    pub fn amount_to_buy(&self) -> u64 {
        amount_to_buy(&self.store.current().snapshot)
    }

    /// Buys `amount` upgrade units, then refreshes the snapshot.
    ///
    /// A rejected purchase leaves the stored snapshot untouched. Transport
    /// failures are returned as errors.
    pub async fn buy_upgrade(&self, amount: u64) -> Result<PurchaseOutcome, ApiError> {
        if amount == 0 {
            return Ok(PurchaseOutcome::NothingAffordable);
        }
        match self.api.purchase(&PurchaseRequest::upgrade(amount)).await {
            Ok(()) => {}
            Err(ApiError::Status { status, .. }) => {
                warn!(amount, status, "upgrade purchase rejected");
                return Ok(PurchaseOutcome::Rejected { status });
            }
            Err(err) => return Err(err),
        }
        info!(amount, "upgrade purchased");

        let refreshed =
            match refresh_snapshot(self.api.as_ref(), &self.store, self.clock.as_ref())
                .await
            {
                Ok(()) => true,
                Err(err) => {
                    warn!(?err, "status refresh after purchase failed");
                    false
                }
            };
        Ok(PurchaseOutcome::Purchased { amount, refreshed })
    }

    /// Buys as many upgrades as the current balance allows. Does no network
    /// work when nothing is affordable.
    pub async fn invoke(&self) -> Result<PurchaseOutcome, ApiError> {
        let amount = self.amount_to_buy();
        if amount == 0 {
            return Ok(PurchaseOutcome::NothingAffordable);
        }
        self.buy_upgrade(amount).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        store::ManualClock,
        test_helpers::{
            FakeAccountApi,
            FakeStatus,
        },
    };
    use proptest::prelude::*;

    fn flow(
        api: FakeAccountApi,
        snapshot: AccountSnapshot,
        clock: &ManualClock,
    ) -> (PurchaseFlow<FakeAccountApi>, Arc<FakeAccountApi>, StateStore) {
        let api = Arc::new(api);
        let store = StateStore::new_with_state(snapshot, clock.now_ms());
        let flow = PurchaseFlow::new(api.clone(), store.clone(), Arc::new(clock.clone()));
        (flow, api, store)
    }

    #[test]
    fn amount_to_buy__floors_droplets_by_upgrade_cost() {
        assert_eq!(amount_to_buy(&AccountSnapshot::new(0.0, 0, 0, 0)), 0);
        assert_eq!(amount_to_buy(&AccountSnapshot::new(0.0, 0, 0, 499)), 0);
        assert_eq!(amount_to_buy(&AccountSnapshot::new(0.0, 0, 0, 500)), 1);
        assert_eq!(amount_to_buy(&AccountSnapshot::new(0.0, 0, 0, 1_999)), 3);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn amount_to_buy__is_monotonic_in_droplets(a in 0u64..10_000_000, b in 0u64..10_000_000) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let low_amount = amount_to_buy(&AccountSnapshot::new(0.0, 0, 0, low));
            let high_amount = amount_to_buy(&AccountSnapshot::new(0.0, 0, 0, high));

            prop_assert!(low_amount <= high_amount);
            prop_assert_eq!(high_amount, high / 500);
        }
    }

    #[tokio::test]
    async fn invoke__does_no_network_work_when_nothing_is_affordable() {
        // given
        let clock = ManualClock::new(1_000);
        let (flow, api, _store) =
            flow(FakeAccountApi::new(), AccountSnapshot::new(5.0, 5, 0, 499), &clock);

        // when
        let outcome = flow.invoke().await.unwrap();

        // then
        assert_eq!(outcome, PurchaseOutcome::NothingAffordable);
        assert!(api.purchases().is_empty());
        assert_eq!(api.status_calls(), 0);
    }

    #[tokio::test]
    async fn invoke__buys_every_affordable_unit_and_refreshes() {
        // given
        let clock = ManualClock::new(1_000);
        let api = FakeAccountApi::new();
        let after = AccountSnapshot::new(5.0, 15, 30_000, 0);
        api.push_status(FakeStatus::Snapshot(after.clone()));
        let (flow, api, store) =
            flow(api, AccountSnapshot::new(5.0, 5, 30_000, 1_000), &clock);
        clock.advance(250);

        // when
        let outcome = flow.invoke().await.unwrap();

        // then
        assert_eq!(
            outcome,
            PurchaseOutcome::Purchased {
                amount: 2,
                refreshed: true
            }
        );
        assert_eq!(api.purchases(), vec![PurchaseRequest::upgrade(2)]);
        let state = store.current();
        assert_eq!(state.snapshot, after);
        assert_eq!(state.fetched_at_ms, 1_250);
    }

    #[tokio::test]
    async fn buy_upgrade__rejection_leaves_state_untouched() {
        // given
        let clock = ManualClock::new(1_000);
        let api = FakeAccountApi::new();
        api.push_purchase_status(400);
        let (flow, api, store) =
            flow(api, AccountSnapshot::new(2.0, 5, 30_000, 600), &clock);
        let before = store.current();
        clock.advance(5_000);

        // when
        let outcome = flow.buy_upgrade(1).await.unwrap();

        // then
        assert_eq!(outcome, PurchaseOutcome::Rejected { status: 400 });
        assert_eq!(store.current(), before);
        assert_eq!(api.status_calls(), 0);
    }

    #[tokio::test]
    async fn buy_upgrade__reports_success_even_when_follow_up_refresh_fails() {
        // given
        let clock = ManualClock::new(1_000);
        let api = FakeAccountApi::new();
        api.push_status(FakeStatus::Fail(502));
        let snapshot = AccountSnapshot::new(2.0, 5, 30_000, 600);
        let (flow, _api, store) = flow(api, snapshot.clone(), &clock);

        // when
        let outcome = flow.buy_upgrade(1).await.unwrap();

        // then
        assert_eq!(
            outcome,
            PurchaseOutcome::Purchased {
                amount: 1,
                refreshed: false
            }
        );
        assert_eq!(store.current().snapshot, snapshot);
    }
}
