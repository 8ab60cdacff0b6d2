//! Data model and error taxonomy for the trade loop discovery engine
#![deny(missing_docs)]

pub mod delta;
pub mod error;
pub mod ids;
pub mod item;
pub mod trade_loop;
pub mod wallet;

pub use delta::{DeltaEvent, DeltaKind};
pub use error::EngineError;
pub use ids::{CanonicalId, ItemId, ItemIx, Seq, TenantId, Timestamp, WalletId, WalletIx};
pub use item::{Item, ValueEstimate, ValueProvenance};
pub use trade_loop::{LoopStatus, TradeLoop, TradeStep};
pub use wallet::{RejectionKind, Wallet};
