//! Ingest API: the mutation half of the facade, each call paired with the
//! Delta Engine so mutations return the loops they affect synchronously

use tl_common::{
    DeltaEvent, DeltaKind, EngineError, ItemId, Seq, TenantId, TradeLoop, ValueEstimate, WalletId,
};
use tl_graph_store::{GraphSnapshot, RejectionTarget};
use tl_persistence::{GraphRecord, WalletRecord};

use crate::TradeLoopEngine;

/// An NFT being listed via `add_nft`: its identity plus the optional
/// valuation metadata the scoring engine uses for fairness/value-efficiency
#[derive(Clone, Debug)]
pub struct NftListing {
    /// The item's opaque id
    pub item_id: ItemId,
    /// The collection this item belongs to, if known
    pub collection: Option<String>,
    /// An estimated value for this item, if known
    pub estimated_value: Option<ValueEstimate>,
}

impl NftListing {
    /// An NFT listing with no valuation metadata
    pub fn new(item_id: impl Into<ItemId>) -> Self {
        Self { item_id: item_id.into(), collection: None, estimated_value: None }
    }
}

/// The result of an ingest mutation that can invalidate loops
pub struct InvalidatedLoops {
    /// Loops invalidated by the mutation, in their final (`Cancelled`)
    /// state
    pub invalidated: Vec<TradeLoop>,
}

/// A raw mutation arriving through the Ingest API, tagged by kind, checked
/// before it is admitted to the graph store
///
/// Every ingest call builds one of these and validates it first: non-empty
/// ids, no self-want (a wallet cannot want an item it already owns), and no
/// owned/wanted overlap introduced by a new listing. Malformed input is
/// rejected with `EngineError::InvariantViolation` rather than silently
/// corrected.
enum IngestRecord<'a> {
    NftListed { wallet: &'a WalletId, item: &'a ItemId },
    NftDelisted { wallet: &'a WalletId, item: &'a ItemId },
    WantAdded { wallet: &'a WalletId, item: &'a ItemId },
    WantRemoved { wallet: &'a WalletId, item: &'a ItemId },
    ItemRejected { wallet: &'a WalletId, item: &'a ItemId },
    PeerRejected { wallet: &'a WalletId, peer: &'a WalletId },
}

impl IngestRecord<'_> {
    /// Check id emptiness, self-reference, and (for a new want) ownership
    /// overlap against `snapshot`
    fn validate(&self, snapshot: &GraphSnapshot) -> Result<(), EngineError> {
        match *self {
            IngestRecord::NftListed { wallet, item } => {
                non_empty_wallet(wallet)?;
                non_empty_item(item)?;
                if let (Some(wallet_ix), Some(item_ix)) =
                    (snapshot.wallet_ix(wallet), snapshot.item_ix(item))
                {
                    if snapshot.wanted(wallet_ix).contains(&item_ix) {
                        return Err(EngineError::InvariantViolation(format!(
                            "{wallet} cannot list {item}, which it already wants"
                        )));
                    }
                }
            }
            IngestRecord::NftDelisted { wallet, item } | IngestRecord::ItemRejected { wallet, item } => {
                non_empty_wallet(wallet)?;
                non_empty_item(item)?;
            }
            IngestRecord::WantAdded { wallet, item } => {
                non_empty_wallet(wallet)?;
                non_empty_item(item)?;
                if let (Some(wallet_ix), Some(item_ix)) =
                    (snapshot.wallet_ix(wallet), snapshot.item_ix(item))
                {
                    if snapshot.owned(wallet_ix).contains(&item_ix) {
                        return Err(EngineError::InvariantViolation(format!(
                            "{wallet} cannot want {item}, which it already owns"
                        )));
                    }
                }
            }
            IngestRecord::WantRemoved { wallet, item } => {
                non_empty_wallet(wallet)?;
                non_empty_item(item)?;
            }
            IngestRecord::PeerRejected { wallet, peer } => {
                non_empty_wallet(wallet)?;
                non_empty_wallet(peer)?;
                if wallet == peer {
                    return Err(EngineError::InvariantViolation(format!(
                        "{wallet} cannot reject itself as a peer"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn non_empty_wallet(wallet: &WalletId) -> Result<(), EngineError> {
    if wallet.0.is_empty() {
        return Err(EngineError::InvariantViolation("wallet id must not be empty".to_string()));
    }
    Ok(())
}

fn non_empty_item(item: &ItemId) -> Result<(), EngineError> {
    if item.0.is_empty() {
        return Err(EngineError::InvariantViolation("item id must not be empty".to_string()));
    }
    Ok(())
}

impl TradeLoopEngine {
    /// List an NFT into `wallet`'s owned set, returning any loops the
    /// listing newly enables
    pub async fn add_nft(
        &self,
        tenant: &TenantId,
        wallet: &WalletId,
        listing: NftListing,
    ) -> Result<Vec<TradeLoop>, EngineError> {
        let handle = self.registry().get_or_create(tenant);
        IngestRecord::NftListed { wallet, item: &listing.item_id }.validate(&handle.store.snapshot())?;
        handle.store.add_owned(wallet, &listing.item_id)?;
        if let Some(value) = listing.estimated_value {
            handle.store.set_item_value(&listing.item_id, value)?;
        }
        if let Some(collection) = listing.collection {
            handle.store.set_item_collection(&listing.item_id, collection)?;
        }

        let event = DeltaEvent {
            tenant: tenant.clone(),
            wallet: wallet.clone(),
            kind: DeltaKind::NftAdded { item: listing.item_id },
            seq: Seq::ZERO,
        };
        let outcome = self.apply_event(event).await;
        Ok(outcome.added)
    }

    /// Remove an NFT from `wallet`'s owned set, returning the loops it
    /// invalidated
    pub async fn remove_nft(
        &self,
        tenant: &TenantId,
        wallet: &WalletId,
        item_id: &ItemId,
    ) -> Result<InvalidatedLoops, EngineError> {
        let handle = self.registry().get_or_create(tenant);
        IngestRecord::NftDelisted { wallet, item: item_id }.validate(&handle.store.snapshot())?;
        handle.store.remove_owned(wallet, item_id)?;

        let event = DeltaEvent {
            tenant: tenant.clone(),
            wallet: wallet.clone(),
            kind: DeltaKind::NftRemoved { item: item_id.clone() },
            seq: Seq::ZERO,
        };
        let outcome = self.apply_event(event).await;
        Ok(InvalidatedLoops { invalidated: outcome.invalidated })
    }

    /// Record that `wallet` wants `item_id`, returning any loops the want
    /// newly enables
    pub async fn add_want(
        &self,
        tenant: &TenantId,
        wallet: &WalletId,
        item_id: &ItemId,
    ) -> Result<Vec<TradeLoop>, EngineError> {
        let handle = self.registry().get_or_create(tenant);
        IngestRecord::WantAdded { wallet, item: item_id }.validate(&handle.store.snapshot())?;
        handle.store.add_want(wallet, item_id)?;

        let event = DeltaEvent {
            tenant: tenant.clone(),
            wallet: wallet.clone(),
            kind: DeltaKind::WantAdded { item: item_id.clone() },
            seq: Seq::ZERO,
        };
        let outcome = self.apply_event(event).await;
        Ok(outcome.added)
    }

    /// Remove `wallet`'s want for `item_id`, returning the loops it
    /// invalidated
    pub async fn remove_want(
        &self,
        tenant: &TenantId,
        wallet: &WalletId,
        item_id: &ItemId,
    ) -> Result<InvalidatedLoops, EngineError> {
        let handle = self.registry().get_or_create(tenant);
        IngestRecord::WantRemoved { wallet, item: item_id }.validate(&handle.store.snapshot())?;
        handle.store.remove_want(wallet, item_id)?;

        let event = DeltaEvent {
            tenant: tenant.clone(),
            wallet: wallet.clone(),
            kind: DeltaKind::WantRemoved { item: item_id.clone() },
            seq: Seq::ZERO,
        };
        let outcome = self.apply_event(event).await;
        Ok(InvalidatedLoops { invalidated: outcome.invalidated })
    }

    /// Record that `wallet` refuses `target` as a counterparty or item,
    /// returning the loops the rejection invalidated
    ///
    /// A rejection can strand a loop just as removing an item or want
    /// can (scenario: rejecting a peer prunes every loop that routed
    /// through them), so it is run through the Delta Engine too.
    pub async fn add_rejection(
        &self,
        tenant: &TenantId,
        wallet: &WalletId,
        target: RejectionTarget,
    ) -> Result<InvalidatedLoops, EngineError> {
        let handle = self.registry().get_or_create(tenant);
        let record = match &target {
            RejectionTarget::Item(item) => IngestRecord::ItemRejected { wallet, item },
            RejectionTarget::Peer(peer) => IngestRecord::PeerRejected { wallet, peer },
        };
        record.validate(&handle.store.snapshot())?;
        let kind = match &target {
            RejectionTarget::Item(item) => DeltaKind::ItemRejected { item: item.clone() },
            RejectionTarget::Peer(peer) => DeltaKind::PeerRejected { peer: peer.clone() },
        };
        handle.store.reject(wallet, target)?;

        let event = DeltaEvent { tenant: tenant.clone(), wallet: wallet.clone(), kind, seq: Seq::ZERO };
        let outcome = self.apply_event(event).await;
        Ok(InvalidatedLoops { invalidated: outcome.invalidated })
    }

    /// Convenience: reject a specific item outright
    pub async fn reject_item(
        &self,
        tenant: &TenantId,
        wallet: &WalletId,
        item_id: ItemId,
    ) -> Result<InvalidatedLoops, EngineError> {
        self.add_rejection(tenant, wallet, RejectionTarget::Item(item_id)).await
    }

    /// Convenience: reject a specific peer outright
    pub async fn reject_peer(
        &self,
        tenant: &TenantId,
        wallet: &WalletId,
        peer: WalletId,
    ) -> Result<InvalidatedLoops, EngineError> {
        self.add_rejection(tenant, wallet, RejectionTarget::Peer(peer)).await
    }
}

/// Flatten a graph snapshot into its on-disk wallet-record form
pub(crate) fn snapshot_to_record(snapshot: &GraphSnapshot) -> GraphRecord {
    let wallets = snapshot
        .all_wallets()
        .map(|ix| {
            let id = snapshot.wallet_id(ix).cloned().unwrap_or_else(|| WalletId::from(""));
            WalletRecord {
                id,
                owned: snapshot
                    .owned(ix)
                    .into_iter()
                    .filter_map(|item| snapshot.item_id(item).cloned())
                    .collect(),
                wanted: snapshot
                    .wanted(ix)
                    .into_iter()
                    .filter_map(|item| snapshot.item_id(item).cloned())
                    .collect(),
                rejected_items: snapshot
                    .rejected_items(ix)
                    .into_iter()
                    .filter_map(|item| snapshot.item_id(item).cloned())
                    .collect(),
                rejected_peers: snapshot
                    .rejected_peers(ix)
                    .into_iter()
                    .filter_map(|peer| snapshot.wallet_id(peer).cloned())
                    .collect(),
            }
        })
        .collect();

    GraphRecord { wallets }
}

#[cfg(test)]
mod test {
    use super::*;
    use tl_config::EngineConfig;

    fn engine() -> TradeLoopEngine {
        let config = EngineConfig { parallel_workers: 2, ..EngineConfig::default() };
        TradeLoopEngine::new(config)
    }

    #[tokio::test]
    async fn add_nft_and_want_completes_a_three_party_cycle() {
        let engine = engine();
        let tenant = TenantId::from("t1");

        engine.add_nft(&tenant, &"A".into(), NftListing::new("a1")).await.unwrap();
        engine.add_nft(&tenant, &"B".into(), NftListing::new("b1")).await.unwrap();
        engine.add_nft(&tenant, &"C".into(), NftListing::new("c1")).await.unwrap();
        engine.add_want(&tenant, &"A".into(), &"b1".into()).await.unwrap();
        engine.add_want(&tenant, &"B".into(), &"c1".into()).await.unwrap();
        let added = engine.add_want(&tenant, &"C".into(), &"a1".into()).await.unwrap();

        assert_eq!(added.len(), 1);
        assert_eq!(engine.active_loops(&tenant).len(), 1);
        engine.shutdown();
    }

    #[tokio::test]
    async fn remove_nft_invalidates_the_loop_it_completed() {
        let engine = engine();
        let tenant = TenantId::from("t1");

        engine.add_nft(&tenant, &"A".into(), NftListing::new("a1")).await.unwrap();
        engine.add_nft(&tenant, &"B".into(), NftListing::new("b1")).await.unwrap();
        engine.add_want(&tenant, &"A".into(), &"b1".into()).await.unwrap();
        engine.add_want(&tenant, &"B".into(), &"a1".into()).await.unwrap();
        assert_eq!(engine.active_loops(&tenant).len(), 1);

        let result = engine.remove_nft(&tenant, &"A".into(), &"a1".into()).await.unwrap();
        assert_eq!(result.invalidated.len(), 1);
        assert!(engine.active_loops(&tenant).is_empty());
        engine.shutdown();
    }

    #[tokio::test]
    async fn rejecting_a_peer_prunes_the_loop_that_routed_through_them() {
        let engine = engine();
        let tenant = TenantId::from("t1");

        engine.add_nft(&tenant, &"A".into(), NftListing::new("a1")).await.unwrap();
        engine.add_nft(&tenant, &"B".into(), NftListing::new("b1")).await.unwrap();
        engine.add_nft(&tenant, &"C".into(), NftListing::new("c1")).await.unwrap();
        engine.add_want(&tenant, &"A".into(), &"b1".into()).await.unwrap();
        engine.add_want(&tenant, &"B".into(), &"c1".into()).await.unwrap();
        engine.add_want(&tenant, &"C".into(), &"a1".into()).await.unwrap();
        assert_eq!(engine.active_loops(&tenant).len(), 1);

        let result = engine.reject_peer(&tenant, &"A".into(), "B".into()).await.unwrap();
        assert_eq!(result.invalidated.len(), 1);
        assert!(engine.active_loops(&tenant).is_empty());
        engine.shutdown();
    }

    #[tokio::test]
    async fn add_nft_with_empty_item_id_is_rejected() {
        let engine = engine();
        let tenant = TenantId::from("t1");

        let err = engine.add_nft(&tenant, &"A".into(), NftListing::new("")).await.unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
        engine.shutdown();
    }

    #[tokio::test]
    async fn add_want_for_an_already_owned_item_is_rejected() {
        let engine = engine();
        let tenant = TenantId::from("t1");

        engine.add_nft(&tenant, &"A".into(), NftListing::new("a1")).await.unwrap();
        let err = engine.add_want(&tenant, &"A".into(), &"a1".into()).await.unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
        engine.shutdown();
    }

    #[tokio::test]
    async fn rejecting_oneself_as_a_peer_is_rejected() {
        let engine = engine();
        let tenant = TenantId::from("t1");

        let err = engine.reject_peer(&tenant, &"A".into(), "A".into()).await.unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
        engine.shutdown();
    }
}
